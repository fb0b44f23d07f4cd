// Copyright 2026 ZoneCache Contributors.
//
// This software is licensed under the General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, this software is
// distributed under the GPL Licence on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. Please review the Licence
// for the specific language governing permissions and limitations relating to
// use of this software.

//! Explicit length-prefixed framing for every inter-node message
//! (the C source relies on
//! microsleeps between sends, which is not a framing mechanism).
//!
//! Every frame on the wire is a `u32` big-endian length followed by
//! exactly that many bytes.

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};

/// Frames larger than this are rejected outright; no legitimate zone,
/// endpoint-pair or verb frame approaches it, and it bounds how much a
/// misbehaving peer can make us buffer.
pub const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

pub async fn write_frame<W: AsyncWrite + Unpin>(w: &mut W, payload: &[u8]) -> Result<()> {
    let len = u32::try_from(payload.len()).map_err(|_| Error::FrameTooLarge {
        len: u32::MAX,
    })?;
    w.write_all(&len.to_be_bytes()).await?;
    w.write_all(payload).await?;
    w.flush().await?;
    Ok(())
}

pub async fn write_text_frame<W: AsyncWrite + Unpin>(w: &mut W, s: &str) -> Result<()> {
    write_frame(w, s.as_bytes()).await
}

pub async fn read_frame<R: AsyncRead + Unpin>(r: &mut R) -> Result<Bytes> {
    let mut len_buf = [0u8; 4];
    match r.read_exact(&mut len_buf).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(Error::UnexpectedEof)
        }
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_LEN {
        return Err(Error::FrameTooLarge { len });
    }
    let mut buf = vec![0u8; len as usize];
    r.read_exact(&mut buf).await?;
    Ok(Bytes::from(buf))
}

pub async fn read_text_frame<R: AsyncRead + Unpin>(r: &mut R) -> Result<String> {
    let bytes = read_frame(r).await?;
    String::from_utf8(bytes.to_vec()).map_err(|e| Error::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_text_frame() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        write_text_frame(&mut client, "hello world").await.unwrap();
        let got = read_text_frame(&mut server).await.unwrap();
        assert_eq!(got, "hello world");
    }

    #[tokio::test]
    async fn rejects_oversized_frame() {
        let (mut client, mut server) = tokio::io::duplex(16);
        let len = (MAX_FRAME_LEN + 1).to_be_bytes();
        tokio::io::AsyncWriteExt::write_all(&mut client, &len)
            .await
            .unwrap();
        let err = read_frame(&mut server).await.unwrap_err();
        assert!(matches!(err, Error::FrameTooLarge { .. }));
    }

    #[tokio::test]
    async fn eof_before_length_is_unexpected_eof() {
        let (client, mut server) = tokio::io::duplex(16);
        drop(client);
        let err = read_frame(&mut server).await.unwrap_err();
        assert!(matches!(err, Error::UnexpectedEof));
    }
}
