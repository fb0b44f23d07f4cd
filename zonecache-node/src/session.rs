// Copyright 2026 ZoneCache Contributors.
//
// This software is licensed under the General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, this software is
// distributed under the GPL Licence on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. Please review the Licence
// for the specific language governing permissions and limitations relating to
// use of this software.

//! One client connection's command loop. Conditional verbs
//! (add/replace/append/prepend/cas/incr/decr/touch) are resolved here by
//! composing `route_get` and `route_store` rather than inside the
//! router, per the router's own documented simplification: a write is
//! either locally owned (served in full) or forwarded as a plain set,
//! so any verb-specific conditional check has to happen before the
//! router sees a plain get/set/delete.

use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{info, warn};

use zonecache_comms::text_protocol::{read_command, CasArgs, Command, Response, StoreArgs};
use zonecache_routing::router::{route_delete, route_get, route_store, DeleteOutcome, GetOutcome};
use zonecache_routing::{departure, Node};

use crate::cas_table::CasTable;

pub async fn run(node: Arc<Node>, cas_table: Arc<CasTable>, stream: TcpStream) {
    let peer = stream.peer_addr().ok();
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    loop {
        match read_command(&mut reader).await {
            Ok(Some(Command::Quit)) | Ok(None) => break,
            Ok(Some(cmd)) => {
                if let Err(err) = dispatch(&node, &cas_table, cmd, &mut write_half).await {
                    warn!(?peer, %err, "client session error, closing connection");
                    break;
                }
            }
            Err(err) => {
                warn!(?peer, %err, "malformed client command, closing connection");
                let _ = Response::ClientError(err.to_string()).write(&mut write_half).await;
                break;
            }
        }
    }
}

async fn dispatch<W: AsyncWrite + Unpin>(
    node: &Arc<Node>,
    cas_table: &CasTable,
    cmd: Command,
    w: &mut W,
) -> zonecache_comms::Result<()> {
    match cmd {
        Command::Get { keys } => get_many(node, cas_table, &keys, false, w).await,
        Command::Gets { keys } => get_many(node, cas_table, &keys, true, w).await,
        Command::Set(args) => store(node, cas_table, args, StoreKind::Unconditional, w).await,
        Command::Add(args) => store(node, cas_table, args, StoreKind::Add, w).await,
        Command::Replace(args) => store(node, cas_table, args, StoreKind::Replace, w).await,
        Command::Append(args) => concat(node, cas_table, args, true, w).await,
        Command::Prepend(args) => concat(node, cas_table, args, false, w).await,
        Command::Cas(args) => cas(node, cas_table, args, w).await,
        Command::Incr { key, delta, noreply } => incr_decr(node, cas_table, &key, delta, true, noreply, w).await,
        Command::Decr { key, delta, noreply } => incr_decr(node, cas_table, &key, delta, false, noreply, w).await,
        Command::Delete { key, noreply } => delete(node, cas_table, &key, noreply, w).await,
        Command::Touch { key, exptime, noreply } => touch(node, cas_table, &key, exptime, noreply, w).await,
        Command::FlushAll => flush_all(node, w).await,
        Command::Stats => stats(w).await,
        Command::Version => Response::Version(env!("CARGO_PKG_VERSION").to_string()).write(w).await,
        Command::Quit => Ok(()),
        Command::Die => die(node, w).await,
    }
}

async fn get_many<W: AsyncWrite + Unpin>(
    node: &Node,
    cas_table: &CasTable,
    keys: &[Bytes],
    with_cas: bool,
    w: &mut W,
) -> zonecache_comms::Result<()> {
    for key in keys {
        match route_get(node, key).await {
            // `key` here is the one this loop is already iterating, not
            // anything read back from a forwarded reply (`ForwardReply::Found`
            // carries no key of its own).
            Ok(GetOutcome::Hit { flags, exptime: _, value }) => {
                let cas = if with_cas { cas_table.current(key) } else { None };
                Response::Value { key: key.clone(), flags, cas, data: value }.write(w).await?;
            }
            Ok(GetOutcome::Miss) => {}
            Err(err) => {
                warn!(%err, "get: routing failure, treating as miss");
            }
        }
    }
    Response::EndOfValues.write(w).await
}

enum StoreKind {
    Unconditional,
    Add,
    Replace,
}

async fn store<W: AsyncWrite + Unpin>(
    node: &Node,
    cas_table: &CasTable,
    args: StoreArgs,
    kind: StoreKind,
    w: &mut W,
) -> zonecache_comms::Result<()> {
    let existing = matches!(route_get(node, &args.key).await, Ok(GetOutcome::Hit { .. }));
    let blocked = match kind {
        StoreKind::Unconditional => false,
        StoreKind::Add => existing,
        StoreKind::Replace => !existing,
    };
    if blocked {
        return reply(w, args.noreply, Response::NotStored).await;
    }

    match route_store(node, &args.key, args.flags, args.exptime, args.data).await {
        Ok(outcome) => {
            cas_table.bump(&args.key);
            reply(w, args.noreply, to_store_response(outcome)).await
        }
        Err(err) => {
            warn!(%err, "store: routing failure");
            reply(w, args.noreply, Response::ServerError(err.to_string())).await
        }
    }
}

async fn concat<W: AsyncWrite + Unpin>(
    node: &Node,
    cas_table: &CasTable,
    args: StoreArgs,
    append: bool,
    w: &mut W,
) -> zonecache_comms::Result<()> {
    let current = match route_get(node, &args.key).await {
        Ok(GetOutcome::Hit { flags, exptime, value }) => (flags, exptime, value),
        Ok(GetOutcome::Miss) => return reply(w, args.noreply, Response::NotStored).await,
        Err(err) => return reply(w, args.noreply, Response::ServerError(err.to_string())).await,
    };
    let (flags, exptime, existing) = current;
    let mut combined = Vec::with_capacity(existing.len() + args.data.len());
    if append {
        combined.extend_from_slice(&existing);
        combined.extend_from_slice(&args.data);
    } else {
        combined.extend_from_slice(&args.data);
        combined.extend_from_slice(&existing);
    }

    match route_store(node, &args.key, flags, exptime, Bytes::from(combined)).await {
        Ok(outcome) => {
            cas_table.bump(&args.key);
            reply(w, args.noreply, to_store_response(outcome)).await
        }
        Err(err) => reply(w, args.noreply, Response::ServerError(err.to_string())).await,
    }
}

async fn cas<W: AsyncWrite + Unpin>(
    node: &Node,
    cas_table: &CasTable,
    args: CasArgs,
    w: &mut W,
) -> zonecache_comms::Result<()> {
    let noreply = args.store.noreply;
    match route_get(node, &args.store.key).await {
        Ok(GetOutcome::Miss) => return reply(w, noreply, Response::NotFound).await,
        Err(err) => return reply(w, noreply, Response::ServerError(err.to_string())).await,
        Ok(GetOutcome::Hit { .. }) => {}
    }
    if cas_table.current(&args.store.key) != Some(args.cas_unique) {
        return reply(w, noreply, Response::Exists).await;
    }

    let StoreArgs { key, flags, exptime, data, .. } = args.store;
    match route_store(node, &key, flags, exptime, data).await {
        Ok(outcome) => {
            cas_table.bump(&key);
            reply(w, noreply, to_store_response(outcome)).await
        }
        Err(err) => reply(w, noreply, Response::ServerError(err.to_string())).await,
    }
}

async fn incr_decr<W: AsyncWrite + Unpin>(
    node: &Node,
    cas_table: &CasTable,
    key: &[u8],
    delta: u64,
    increment: bool,
    noreply: bool,
    w: &mut W,
) -> zonecache_comms::Result<()> {
    let (flags, exptime, existing) = match route_get(node, key).await {
        Ok(GetOutcome::Hit { flags, exptime, value }) => (flags, exptime, value),
        Ok(GetOutcome::Miss) => return reply(w, noreply, Response::NotFound).await,
        Err(err) => return reply(w, noreply, Response::ServerError(err.to_string())).await,
    };
    let Ok(current) = std::str::from_utf8(&existing).unwrap_or_default().trim().parse::<u64>() else {
        return reply(w, noreply, Response::ClientError("cannot increment or decrement non-numeric value".into())).await;
    };
    let updated = if increment { current.saturating_add(delta) } else { current.saturating_sub(delta) };

    match route_store(node, key, flags, exptime, Bytes::from(updated.to_string())).await {
        Ok(_) => {
            cas_table.bump(key);
            reply(w, noreply, Response::NumericValue(updated)).await
        }
        Err(err) => reply(w, noreply, Response::ServerError(err.to_string())).await,
    }
}

async fn delete<W: AsyncWrite + Unpin>(
    node: &Node,
    cas_table: &CasTable,
    key: &[u8],
    noreply: bool,
    w: &mut W,
) -> zonecache_comms::Result<()> {
    match route_delete(node, key).await {
        Ok(DeleteOutcome::Deleted) => {
            cas_table.remove(key);
            reply(w, noreply, Response::Deleted).await
        }
        Ok(DeleteOutcome::NotFound) => reply(w, noreply, Response::NotFound).await,
        Err(err) => reply(w, noreply, Response::ServerError(err.to_string())).await,
    }
}

async fn touch<W: AsyncWrite + Unpin>(
    node: &Node,
    cas_table: &CasTable,
    key: &[u8],
    exptime: u32,
    noreply: bool,
    w: &mut W,
) -> zonecache_comms::Result<()> {
    let (flags, value) = match route_get(node, key).await {
        Ok(GetOutcome::Hit { flags, value, .. }) => (flags, value),
        Ok(GetOutcome::Miss) => return reply(w, noreply, Response::NotFound).await,
        Err(err) => return reply(w, noreply, Response::ServerError(err.to_string())).await,
    };
    match route_store(node, key, flags, exptime, value).await {
        Ok(_) => {
            cas_table.bump(key);
            reply(w, noreply, Response::Touched).await
        }
        Err(err) => reply(w, noreply, Response::ServerError(err.to_string())).await,
    }
}

/// Local-only: clears this node's own cache engine without forwarding,
/// matching classic memcached's single-server `flush_all`.
async fn flush_all<W: AsyncWrite + Unpin>(node: &Node, w: &mut W) -> zonecache_comms::Result<()> {
    for key in node.cache().iter_keys() {
        node.cache().delete(&key);
    }
    Response::Ok.write(w).await
}

async fn stats<W: AsyncWrite + Unpin>(w: &mut W) -> zonecache_comms::Result<()> {
    w.write_all(format!("STAT version {}\r\n", env!("CARGO_PKG_VERSION")).as_bytes()).await?;
    w.write_all(b"END\r\n").await?;
    Ok(())
}

/// `die`: runs `DepartureProtocol`, reports the departure onward to
/// bootstrap is the *absorbing* node's job, not this one's — this node
/// is about to exit. A failed departure (no adjacent neighbour willing
/// to merge) leaves the node running and reports the failure back to
/// the client that asked for it.
async fn die<W: AsyncWrite + Unpin>(node: &Arc<Node>, w: &mut W) -> zonecache_comms::Result<()> {
    match departure::depart(node).await {
        Ok(()) => {
            Response::DieConfirmation.write(w).await?;
            w.flush().await?;
            info!("departure complete, exiting");
            std::process::exit(0);
        }
        Err(err) => {
            warn!(%err, "die: departure failed, remaining in the cluster");
            Response::ServerError(err.to_string()).write(w).await
        }
    }
}

fn to_store_response(outcome: zonecache_cache::StoreOutcome) -> Response {
    match outcome {
        zonecache_cache::StoreOutcome::Stored => Response::Stored,
        zonecache_cache::StoreOutcome::NotStored => Response::NotStored,
        zonecache_cache::StoreOutcome::Exists => Response::Exists,
    }
}

async fn reply<W: AsyncWrite + Unpin>(w: &mut W, noreply: bool, response: Response) -> zonecache_comms::Result<()> {
    if noreply {
        return Ok(());
    }
    response.write(w).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;
    use zonecache_cache::CacheAdapter;
    use zonecache_core::geometry::{Point, Rectangle};

    fn world() -> Rectangle {
        Rectangle::world(Point::new(0.0, 0.0), Point::new(8.0, 8.0)).unwrap()
    }

    fn single_node() -> Arc<Node> {
        let cache: Arc<dyn CacheAdapter> = Arc::new(zonecache_cache::MemEngine::new());
        let addr: std::net::SocketAddr = "127.0.0.1:1".parse().unwrap();
        Arc::new(Node::new(addr, addr, addr, world(), world(), 10, cache))
    }

    // A single node owning the whole world never forwards, so exercising
    // the session dispatch loop against it tests the client protocol
    // without dragging a second node's listeners into the test.
    async fn serve_one_connection(node: Arc<Node>) -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let cas_table = Arc::new(CasTable::new());
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            run(node, cas_table, stream).await;
        });
        addr
    }

    /// Reads exactly `expected.len()` bytes and compares, rather than
    /// trusting a single `read()` call to return a whole multi-line
    /// reply in one go.
    async fn expect_reply(stream: &mut TcpStream, expected: &[u8]) {
        let mut buf = vec![0u8; expected.len()];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, expected);
    }

    #[tokio::test]
    async fn set_then_get_round_trips_the_value() {
        let addr = serve_one_connection(single_node()).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        stream.write_all(b"set mykey 0 0 5\r\nhello\r\n").await.unwrap();
        expect_reply(&mut stream, b"STORED\r\n").await;

        stream.write_all(b"get mykey\r\n").await.unwrap();
        expect_reply(&mut stream, b"VALUE mykey 0 5\r\nhello\r\nEND\r\n").await;
    }

    #[tokio::test]
    async fn add_fails_once_key_already_exists() {
        let addr = serve_one_connection(single_node()).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        stream.write_all(b"add k 0 0 1\r\nx\r\n").await.unwrap();
        expect_reply(&mut stream, b"STORED\r\n").await;

        stream.write_all(b"add k 0 0 1\r\ny\r\n").await.unwrap();
        expect_reply(&mut stream, b"NOT_STORED\r\n").await;
    }

    #[tokio::test]
    async fn delete_missing_key_reports_not_found() {
        let addr = serve_one_connection(single_node()).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        stream.write_all(b"delete nope\r\n").await.unwrap();
        expect_reply(&mut stream, b"NOT_FOUND\r\n").await;
    }

    #[tokio::test]
    async fn incr_adds_delta_to_numeric_value() {
        let addr = serve_one_connection(single_node()).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        stream.write_all(b"set n 0 0 1\r\n5\r\n").await.unwrap();
        expect_reply(&mut stream, b"STORED\r\n").await;

        stream.write_all(b"incr n 3\r\n").await.unwrap();
        expect_reply(&mut stream, b"8\r\n").await;
    }

    #[tokio::test]
    async fn version_reports_the_crate_version() {
        let addr = serve_one_connection(single_node()).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        stream.write_all(b"version\r\n").await.unwrap();
        let expected = format!("VERSION {}\r\n", env!("CARGO_PKG_VERSION"));
        expect_reply(&mut stream, expected.as_bytes()).await;
    }

    #[tokio::test]
    async fn flush_all_clears_the_local_cache() {
        let addr = serve_one_connection(single_node()).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        stream.write_all(b"set k 0 0 1\r\nx\r\n").await.unwrap();
        expect_reply(&mut stream, b"STORED\r\n").await;

        stream.write_all(b"flush_all\r\n").await.unwrap();
        expect_reply(&mut stream, b"OK\r\n").await;

        stream.write_all(b"get k\r\n").await.unwrap();
        expect_reply(&mut stream, b"END\r\n").await;
    }
}
