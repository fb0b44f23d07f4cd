// Copyright 2026 ZoneCache Contributors.
//
// This software is licensed under the General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, this software is
// distributed under the GPL Licence on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. Please review the Licence
// for the specific language governing permissions and limitations relating to
// use of this software.

//! Inter-node wire messages: the forwarding protocol, neighbour gossip,
//! and the bootstrap directory's internal
//! area-refresh query (DESIGN.md, Q3). Every message is a short sequence
//! of frames written through [`crate::framing`].

use std::net::SocketAddr;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};
use zonecache_core::Rectangle;

use crate::error::{Error, Result};
use crate::framing::{read_frame, read_text_frame, write_frame, write_text_frame};

/// A request forwarded to a neighbour on its `propagate_ep`: verb, then
/// argument(s).
#[derive(Debug, Clone, PartialEq)]
pub enum ForwardRequest {
    Get { key: Bytes },
    Set { key: Bytes, flags: u32, exptime: u32, value: Bytes },
    Delete { key: Bytes },
}

impl ForwardRequest {
    pub async fn write<W: AsyncWrite + Unpin>(&self, w: &mut W) -> Result<()> {
        match self {
            ForwardRequest::Get { key } => {
                write_text_frame(w, "get").await?;
                write_frame(w, key).await?;
            }
            ForwardRequest::Set {
                key,
                flags,
                exptime,
                value,
            } => {
                write_text_frame(w, "set").await?;
                write_text_frame(w, &format!("{key} {flags} {exptime}", key = String::from_utf8_lossy(key))).await?;
                write_frame(w, value).await?;
            }
            ForwardRequest::Delete { key } => {
                write_text_frame(w, "delete").await?;
                write_frame(w, key).await?;
            }
        }
        Ok(())
    }

    pub async fn read<R: AsyncRead + Unpin>(r: &mut R) -> Result<ForwardRequest> {
        let verb = read_text_frame(r).await?;
        match verb.as_str() {
            "get" => {
                let key = read_frame(r).await?;
                Ok(ForwardRequest::Get { key })
            }
            "delete" => {
                let key = read_frame(r).await?;
                Ok(ForwardRequest::Delete { key })
            }
            "set" => {
                let head = read_text_frame(r).await?;
                let mut parts = head.split_whitespace();
                let key = parts
                    .next()
                    .ok_or_else(|| Error::Malformed("set: missing key".into()))?
                    .as_bytes()
                    .to_vec();
                let flags: u32 = parts
                    .next()
                    .ok_or_else(|| Error::Malformed("set: missing flags".into()))?
                    .parse()
                    .map_err(|_| Error::Malformed("set: bad flags".into()))?;
                let exptime: u32 = parts
                    .next()
                    .ok_or_else(|| Error::Malformed("set: missing exptime".into()))?
                    .parse()
                    .map_err(|_| Error::Malformed("set: bad exptime".into()))?;
                let value = read_frame(r).await?;
                Ok(ForwardRequest::Set {
                    key: Bytes::from(key),
                    flags,
                    exptime,
                    value,
                })
            }
            other => Err(Error::Malformed(format!("unknown forward verb {other:?}"))),
        }
    }
}

/// The reply half of the forwarding exchange. `Found` carries no key:
/// forwarding is always a single request per connection (one hop, no
/// pipelining), so the caller already knows which key it asked for and
/// re-attaches it itself rather than reading it back off the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum ForwardReply {
    NotFound,
    Found { flags: u32, exptime: u32, value: Bytes },
    Stored,
    Deleted,
}

impl ForwardReply {
    pub async fn write<W: AsyncWrite + Unpin>(&self, w: &mut W) -> Result<()> {
        match self {
            ForwardReply::NotFound => write_text_frame(w, "NOT FOUND").await,
            ForwardReply::Found {
                flags,
                exptime,
                value,
            } => {
                write_text_frame(w, &format!("FOUND {flags} {exptime}")).await?;
                write_frame(w, value).await
            }
            ForwardReply::Stored => write_text_frame(w, "STORED").await,
            ForwardReply::Deleted => write_text_frame(w, "DELETED").await,
        }
    }

    pub async fn read<R: AsyncRead + Unpin>(r: &mut R) -> Result<ForwardReply> {
        let head = read_text_frame(r).await?;
        if head == "NOT FOUND" {
            return Ok(ForwardReply::NotFound);
        }
        if head == "STORED" {
            return Ok(ForwardReply::Stored);
        }
        if head == "DELETED" {
            return Ok(ForwardReply::Deleted);
        }
        if let Some(rest) = head.strip_prefix("FOUND ") {
            let mut parts = rest.split_whitespace();
            let flags: u32 = parts
                .next()
                .ok_or_else(|| Error::Malformed("FOUND: missing flags".into()))?
                .parse()
                .map_err(|_| Error::Malformed("FOUND: bad flags".into()))?;
            let exptime: u32 = parts
                .next()
                .ok_or_else(|| Error::Malformed("FOUND: missing exptime".into()))?
                .parse()
                .map_err(|_| Error::Malformed("FOUND: bad exptime".into()))?;
            let value = read_frame(r).await?;
            return Ok(ForwardReply::Found {
                flags,
                exptime,
                value,
            });
        }
        Err(Error::Malformed(format!("unknown forward reply {head:?}")))
    }
}

/// Neighbour gossip verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GossipVerb {
    AddNeighbour,
    RemoveNeighbour,
    UpdateNeighbour,
}

impl GossipVerb {
    fn as_str(self) -> &'static str {
        match self {
            GossipVerb::AddNeighbour => "ADD_NEIGHBOUR",
            GossipVerb::RemoveNeighbour => "REMOVE_NEIGHBOUR",
            GossipVerb::UpdateNeighbour => "UPDATE_NEIGHBOUR",
        }
    }

    fn from_str(s: &str) -> Option<GossipVerb> {
        match s {
            "ADD_NEIGHBOUR" => Some(GossipVerb::AddNeighbour),
            "REMOVE_NEIGHBOUR" => Some(GossipVerb::RemoveNeighbour),
            "UPDATE_NEIGHBOUR" => Some(GossipVerb::UpdateNeighbour),
            _ => None,
        }
    }
}

/// A gossip message: verb, endpoint pair, and the affected zone.
#[derive(Debug, Clone, PartialEq)]
pub struct GossipMessage {
    pub verb: GossipVerb,
    pub propagate_ep: SocketAddr,
    pub removal_ep: SocketAddr,
    pub zone: Rectangle,
}

impl GossipMessage {
    pub async fn write<W: AsyncWrite + Unpin>(&self, w: &mut W) -> Result<()> {
        write_text_frame(w, self.verb.as_str()).await?;
        write_text_frame(w, &format!("{} {}", self.propagate_ep, self.removal_ep)).await?;
        write_text_frame(w, &self.zone.to_wire_string()).await?;
        Ok(())
    }

    pub async fn read<R: AsyncRead + Unpin>(r: &mut R) -> Result<GossipMessage> {
        let verb_str = read_text_frame(r).await?;
        let verb = GossipVerb::from_str(&verb_str)
            .ok_or_else(|| Error::Malformed(format!("unknown gossip verb {verb_str:?}")))?;
        let eps = read_text_frame(r).await?;
        let mut parts = eps.split_whitespace();
        let propagate_ep: SocketAddr = parts
            .next()
            .ok_or_else(|| Error::Malformed("gossip: missing propagate_ep".into()))?
            .parse()
            .map_err(|_| Error::Malformed("gossip: bad propagate_ep".into()))?;
        let removal_ep: SocketAddr = parts
            .next()
            .ok_or_else(|| Error::Malformed("gossip: missing removal_ep".into()))?
            .parse()
            .map_err(|_| Error::Malformed("gossip: bad removal_ep".into()))?;
        let zone_str = read_text_frame(r).await?;
        let zone = Rectangle::from_wire_string(&zone_str)
            .ok_or_else(|| Error::Malformed(format!("gossip: bad zone {zone_str:?}")))?;
        Ok(GossipMessage {
            verb,
            propagate_ep,
            removal_ep,
            zone,
        })
    }
}

/// Bootstrap's internal parent-area refresh query (DESIGN.md, Q3): not
/// named alongside the other wire verbs because it never crosses the client-visible
/// protocol boundary, only the directory-to-node one.
pub mod query_area {
    use super::*;

    pub async fn write_request<W: AsyncWrite + Unpin>(w: &mut W) -> Result<()> {
        write_text_frame(w, "QUERY_AREA").await
    }

    pub async fn read_request<R: AsyncRead + Unpin>(r: &mut R) -> Result<()> {
        let verb = read_text_frame(r).await?;
        if verb == "QUERY_AREA" {
            Ok(())
        } else {
            Err(Error::Malformed(format!("expected QUERY_AREA, got {verb:?}")))
        }
    }

    pub async fn write_reply<W: AsyncWrite + Unpin>(w: &mut W, area: f64) -> Result<()> {
        write_text_frame(w, &area.to_string()).await
    }

    pub async fn read_reply<R: AsyncRead + Unpin>(r: &mut R) -> Result<f64> {
        let s = read_text_frame(r).await?;
        s.parse().map_err(|_| Error::Malformed(format!("bad area reply {s:?}")))
    }
}

/// What can arrive on a node's `propagate_ep`: a forwarded client
/// request, a neighbour gossip update, or bootstrap's area probe. All
/// three share the same first frame (a verb token), so a listener reads
/// that token once and hands the rest of the stream to the matching
/// parser instead of guessing from the connecting peer.
#[derive(Debug, Clone, PartialEq)]
pub enum PropagateMessage {
    Forward(ForwardRequest),
    Gossip(GossipMessage),
    QueryArea,
}

impl PropagateMessage {
    pub async fn read<R: AsyncRead + Unpin>(r: &mut R) -> Result<PropagateMessage> {
        let verb = read_text_frame(r).await?;
        match verb.as_str() {
            "get" => Ok(PropagateMessage::Forward(read_forward_body(r, ForwardVerb::Get).await?)),
            "set" => Ok(PropagateMessage::Forward(read_forward_body(r, ForwardVerb::Set).await?)),
            "delete" => Ok(PropagateMessage::Forward(read_forward_body(r, ForwardVerb::Delete).await?)),
            "QUERY_AREA" => Ok(PropagateMessage::QueryArea),
            _ => {
                let verb = GossipVerb::from_str(&verb)
                    .ok_or_else(|| Error::Malformed(format!("unknown propagate verb {verb:?}")))?;
                Ok(PropagateMessage::Gossip(read_gossip_body(r, verb).await?))
            }
        }
    }
}

enum ForwardVerb {
    Get,
    Set,
    Delete,
}

async fn read_forward_body<R: AsyncRead + Unpin>(r: &mut R, verb: ForwardVerb) -> Result<ForwardRequest> {
    match verb {
        ForwardVerb::Get => Ok(ForwardRequest::Get { key: read_frame(r).await? }),
        ForwardVerb::Delete => Ok(ForwardRequest::Delete { key: read_frame(r).await? }),
        ForwardVerb::Set => {
            let head = read_text_frame(r).await?;
            let mut parts = head.split_whitespace();
            let key = parts
                .next()
                .ok_or_else(|| Error::Malformed("set: missing key".into()))?
                .as_bytes()
                .to_vec();
            let flags: u32 = parts
                .next()
                .ok_or_else(|| Error::Malformed("set: missing flags".into()))?
                .parse()
                .map_err(|_| Error::Malformed("set: bad flags".into()))?;
            let exptime: u32 = parts
                .next()
                .ok_or_else(|| Error::Malformed("set: missing exptime".into()))?
                .parse()
                .map_err(|_| Error::Malformed("set: bad exptime".into()))?;
            let value = read_frame(r).await?;
            Ok(ForwardRequest::Set { key: Bytes::from(key), flags, exptime, value })
        }
    }
}

async fn read_gossip_body<R: AsyncRead + Unpin>(r: &mut R, verb: GossipVerb) -> Result<GossipMessage> {
    let eps = read_text_frame(r).await?;
    let mut parts = eps.split_whitespace();
    let propagate_ep: SocketAddr = parts
        .next()
        .ok_or_else(|| Error::Malformed("gossip: missing propagate_ep".into()))?
        .parse()
        .map_err(|_| Error::Malformed("gossip: bad propagate_ep".into()))?;
    let removal_ep: SocketAddr = parts
        .next()
        .ok_or_else(|| Error::Malformed("gossip: missing removal_ep".into()))?
        .parse()
        .map_err(|_| Error::Malformed("gossip: bad removal_ep".into()))?;
    let zone_str = read_text_frame(r).await?;
    let zone = Rectangle::from_wire_string(&zone_str)
        .ok_or_else(|| Error::Malformed(format!("gossip: bad zone {zone_str:?}")))?;
    Ok(GossipMessage { verb, propagate_ep, removal_ep, zone })
}

#[cfg(test)]
mod tests {
    use super::*;
    use zonecache_core::Point;

    #[tokio::test]
    async fn forward_get_round_trip() {
        let (mut a, mut b) = tokio::io::duplex(4096);
        let req = ForwardRequest::Get {
            key: Bytes::from_static(b"k"),
        };
        req.write(&mut a).await.unwrap();
        let got = ForwardRequest::read(&mut b).await.unwrap();
        assert_eq!(got, req);
    }

    #[tokio::test]
    async fn forward_set_round_trip() {
        let (mut a, mut b) = tokio::io::duplex(4096);
        let req = ForwardRequest::Set {
            key: Bytes::from_static(b"k"),
            flags: 7,
            exptime: 0,
            value: Bytes::from_static(b"value bytes"),
        };
        req.write(&mut a).await.unwrap();
        let got = ForwardRequest::read(&mut b).await.unwrap();
        assert_eq!(got, req);
    }

    #[tokio::test]
    async fn forward_reply_found_round_trip() {
        let (mut a, mut b) = tokio::io::duplex(4096);
        let reply = ForwardReply::Found {
            flags: 1,
            exptime: 0,
            value: Bytes::from_static(b"v"),
        };
        reply.write(&mut a).await.unwrap();
        let got = ForwardReply::read(&mut b).await.unwrap();
        assert_eq!(got, reply);
    }

    #[tokio::test]
    async fn gossip_round_trip() {
        let (mut a, mut b) = tokio::io::duplex(4096);
        let msg = GossipMessage {
            verb: GossipVerb::AddNeighbour,
            propagate_ep: "127.0.0.1:9001".parse().unwrap(),
            removal_ep: "127.0.0.1:9002".parse().unwrap(),
            zone: Rectangle::new(Point::new(0.0, 0.0), Point::new(10.0, 10.0)).unwrap(),
        };
        msg.write(&mut a).await.unwrap();
        let got = GossipMessage::read(&mut b).await.unwrap();
        assert_eq!(got, msg);
    }

    #[tokio::test]
    async fn query_area_round_trip() {
        let (mut a, mut b) = tokio::io::duplex(4096);
        query_area::write_request(&mut a).await.unwrap();
        query_area::read_request(&mut b).await.unwrap();
        query_area::write_reply(&mut b, 625.0).await.unwrap();
        let area = query_area::read_reply(&mut a).await.unwrap();
        assert_eq!(area, 625.0);
    }
}
