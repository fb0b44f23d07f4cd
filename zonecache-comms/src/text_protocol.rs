// Copyright 2026 ZoneCache Contributors.
//
// This software is licensed under the General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, this software is
// distributed under the GPL Licence on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. Please review the Licence
// for the specific language governing permissions and limitations relating to
// use of this software.

//! The client-facing protocol: the classic memcache text-protocol
//! superset of the classic command set, plus the `die` verb that initiates
//! `DepartureProtocol`. Parsing only — dispatch and the cache engine
//! itself live in `zonecache-routing`/`zonecache-cache`.

use bytes::Bytes;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct StoreArgs {
    pub key: Bytes,
    pub flags: u32,
    pub exptime: u32,
    pub data: Bytes,
    pub noreply: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CasArgs {
    pub store: StoreArgs,
    pub cas_unique: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Get { keys: Vec<Bytes> },
    Gets { keys: Vec<Bytes> },
    Set(StoreArgs),
    Add(StoreArgs),
    Replace(StoreArgs),
    Append(StoreArgs),
    Prepend(StoreArgs),
    Cas(CasArgs),
    Incr { key: Bytes, delta: u64, noreply: bool },
    Decr { key: Bytes, delta: u64, noreply: bool },
    Delete { key: Bytes, noreply: bool },
    Touch { key: Bytes, exptime: u32, noreply: bool },
    FlushAll,
    Stats,
    Version,
    Quit,
    /// Not part of the classic protocol: initiates `DepartureProtocol`.
    Die,
}

/// Reads one command off the wire, including any trailing data block for
/// the storage commands. Returns `Ok(None)` on a clean EOF between
/// commands.
pub async fn read_command<R: AsyncBufRead + Unpin>(r: &mut R) -> Result<Option<Command>> {
    let Some(line) = read_line(r).await? else {
        return Ok(None);
    };
    if line.is_empty() {
        return Ok(None);
    }
    let mut parts = line.split_whitespace();
    let verb = parts.next().unwrap_or_default();
    let rest: Vec<&str> = parts.collect();

    let cmd = match verb {
        "get" => Command::Get {
            keys: rest.iter().map(|k| Bytes::from(k.as_bytes().to_vec())).collect(),
        },
        "gets" => Command::Gets {
            keys: rest.iter().map(|k| Bytes::from(k.as_bytes().to_vec())).collect(),
        },
        "set" | "add" | "replace" | "append" | "prepend" => {
            let store = read_store_args(r, &rest).await?;
            match verb {
                "set" => Command::Set(store),
                "add" => Command::Add(store),
                "replace" => Command::Replace(store),
                "append" => Command::Append(store),
                _ => Command::Prepend(store),
            }
        }
        "cas" => {
            if rest.len() < 5 {
                return Err(Error::Malformed("cas: too few arguments".into()));
            }
            let cas_unique: u64 = rest[4]
                .parse()
                .map_err(|_| Error::Malformed("cas: bad cas_unique".into()))?;
            let store = read_store_args(r, &rest[..4]).await?;
            Command::Cas(CasArgs { store, cas_unique })
        }
        "incr" | "decr" => {
            if rest.len() < 2 {
                return Err(Error::Malformed(format!("{verb}: too few arguments")));
            }
            let key = Bytes::from(rest[0].as_bytes().to_vec());
            let delta: u64 = rest[1]
                .parse()
                .map_err(|_| Error::Malformed(format!("{verb}: bad delta")))?;
            let noreply = rest.get(2) == Some(&"noreply");
            if verb == "incr" {
                Command::Incr { key, delta, noreply }
            } else {
                Command::Decr { key, delta, noreply }
            }
        }
        "delete" => {
            let key = rest
                .first()
                .ok_or_else(|| Error::Malformed("delete: missing key".into()))?;
            let noreply = rest.get(1) == Some(&"noreply");
            Command::Delete {
                key: Bytes::from(key.as_bytes().to_vec()),
                noreply,
            }
        }
        "touch" => {
            if rest.len() < 2 {
                return Err(Error::Malformed("touch: too few arguments".into()));
            }
            let exptime: u32 = rest[1]
                .parse()
                .map_err(|_| Error::Malformed("touch: bad exptime".into()))?;
            let noreply = rest.get(2) == Some(&"noreply");
            Command::Touch {
                key: Bytes::from(rest[0].as_bytes().to_vec()),
                exptime,
                noreply,
            }
        }
        "flush_all" => Command::FlushAll,
        "stats" => Command::Stats,
        "version" => Command::Version,
        "quit" => Command::Quit,
        "die" => Command::Die,
        other => return Err(Error::Malformed(format!("unknown command {other:?}"))),
    };
    Ok(Some(cmd))
}

async fn read_store_args<R: AsyncBufRead + Unpin>(r: &mut R, head: &[&str]) -> Result<StoreArgs> {
    if head.len() < 4 {
        return Err(Error::Malformed("store command: too few arguments".into()));
    }
    let key = Bytes::from(head[0].as_bytes().to_vec());
    let flags: u32 = head[1]
        .parse()
        .map_err(|_| Error::Malformed("store command: bad flags".into()))?;
    let exptime: u32 = head[2]
        .parse()
        .map_err(|_| Error::Malformed("store command: bad exptime".into()))?;
    let len: usize = head[3]
        .parse()
        .map_err(|_| Error::Malformed("store command: bad length".into()))?;
    let noreply = head.get(4) == Some(&"noreply");

    let mut data = vec![0u8; len];
    tokio::io::AsyncReadExt::read_exact(r, &mut data).await?;
    // consume the trailing "\r\n" after the data block.
    let _ = read_line(r).await?;

    Ok(StoreArgs {
        key,
        flags,
        exptime,
        data: Bytes::from(data),
        noreply,
    })
}

async fn read_line<R: AsyncBufRead + Unpin>(r: &mut R) -> Result<Option<String>> {
    let mut buf = String::new();
    let n = r.read_line(&mut buf).await?;
    if n == 0 {
        return Ok(None);
    }
    while buf.ends_with('\n') || buf.ends_with('\r') {
        buf.pop();
    }
    Ok(Some(buf))
}

/// The standard response tokens for the commands above.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Stored,
    NotStored,
    Exists,
    NotFound,
    Deleted,
    Touched,
    Value { key: Bytes, flags: u32, cas: Option<u64>, data: Bytes },
    EndOfValues,
    NumericValue(u64),
    Ok,
    Error,
    ClientError(String),
    ServerError(String),
    Version(String),
    DieConfirmation,
}

impl Response {
    pub async fn write<W: AsyncWrite + Unpin>(&self, w: &mut W) -> Result<()> {
        match self {
            Response::Stored => write_line(w, "STORED").await,
            Response::NotStored => write_line(w, "NOT_STORED").await,
            Response::Exists => write_line(w, "EXISTS").await,
            Response::NotFound => write_line(w, "NOT_FOUND").await,
            Response::Deleted => write_line(w, "DELETED").await,
            Response::Touched => write_line(w, "TOUCHED").await,
            Response::Value { key, flags, cas, data } => {
                let key = String::from_utf8_lossy(key);
                let head = match cas {
                    Some(cas) => format!("VALUE {key} {flags} {} {cas}", data.len()),
                    None => format!("VALUE {key} {flags} {}", data.len()),
                };
                write_line(w, &head).await?;
                w.write_all(data).await?;
                write_line(w, "").await
            }
            Response::EndOfValues => write_line(w, "END").await,
            Response::NumericValue(v) => write_line(w, &v.to_string()).await,
            Response::Ok => write_line(w, "OK").await,
            Response::Error => write_line(w, "ERROR").await,
            Response::ClientError(msg) => write_line(w, &format!("CLIENT_ERROR {msg}")).await,
            Response::ServerError(msg) => write_line(w, &format!("SERVER_ERROR {msg}")).await,
            Response::Version(v) => write_line(w, &format!("VERSION {v}")).await,
            Response::DieConfirmation => write_line(w, "OK departed, goodbye").await,
        }
    }
}

async fn write_line<W: AsyncWrite + Unpin>(w: &mut W, s: &str) -> Result<()> {
    w.write_all(s.as_bytes()).await?;
    w.write_all(b"\r\n").await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    async fn parse(input: &str) -> Command {
        let mut r = BufReader::new(input.as_bytes());
        read_command(&mut r).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn parses_get_with_multiple_keys() {
        let cmd = parse("get a b c\r\n").await;
        assert_eq!(
            cmd,
            Command::Get {
                keys: vec![Bytes::from_static(b"a"), Bytes::from_static(b"b"), Bytes::from_static(b"c")]
            }
        );
    }

    #[tokio::test]
    async fn parses_set_with_data_block() {
        let cmd = parse("set k 0 0 5\r\nhello\r\n").await;
        assert_eq!(
            cmd,
            Command::Set(StoreArgs {
                key: Bytes::from_static(b"k"),
                flags: 0,
                exptime: 0,
                data: Bytes::from_static(b"hello"),
                noreply: false,
            })
        );
    }

    #[tokio::test]
    async fn parses_zero_length_value() {
        let cmd = parse("set k 0 0 0\r\n\r\n").await;
        assert_eq!(
            cmd,
            Command::Set(StoreArgs {
                key: Bytes::from_static(b"k"),
                flags: 0,
                exptime: 0,
                data: Bytes::new(),
                noreply: false,
            })
        );
    }

    #[tokio::test]
    async fn parses_die() {
        assert_eq!(parse("die\r\n").await, Command::Die);
    }

    #[tokio::test]
    async fn parses_delete_with_noreply() {
        let cmd = parse("delete k noreply\r\n").await;
        assert_eq!(
            cmd,
            Command::Delete {
                key: Bytes::from_static(b"k"),
                noreply: true,
            }
        );
    }

    #[tokio::test]
    async fn eof_yields_none() {
        let mut r = BufReader::new(&b""[..]);
        assert_eq!(read_command(&mut r).await.unwrap(), None);
    }
}
