// Copyright 2026 ZoneCache Contributors.
//
// This software is licensed under the General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, this software is
// distributed under the GPL Licence on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. Please review the Licence
// for the specific language governing permissions and limitations relating to
// use of this software.

//! Node startup and the three long-lived accept loops (`propagate_ep`,
//! `removal_ep`, `join_ep`) plus the client-facing `client_ep` loop
//! (DESIGN.md, Q5). `propagate_ep` and `removal_ep` are bound before
//! this node has even picked a `join_ep`, since another node could
//! gossip or query our area the moment bootstrap hands out our address.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use zonecache_cache::CacheAdapter;
use zonecache_comms::wire::{query_area, ForwardReply, PropagateMessage};
use zonecache_core::geometry::{Point, Rectangle};
use zonecache_routing::router::serve_forward_request;
use zonecache_routing::{departure, gossip, join, Node};

use crate::bootstrap_client;
use crate::cas_table::CasTable;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::session;

pub async fn run(config: Config) -> Result<()> {
    let config = Arc::new(config);

    let propagate_listener = TcpListener::bind(config.propagate_ep()).await?;
    let removal_listener = TcpListener::bind(config.removal_ep()).await?;
    info!(propagate_ep = %config.propagate_ep(), removal_ep = %config.removal_ep(), "bound propagate/removal listeners");

    let (join_ep, world, zone, parent_join_ep) = discover_topology(&config).await?;

    let cache: Arc<dyn CacheAdapter> = Arc::new(zonecache_cache::MemEngine::new());
    let node = Arc::new(Node::new(
        join_ep,
        config.propagate_ep(),
        config.removal_ep(),
        world,
        zone,
        config.neighbour_capacity,
        cache,
    ));
    let cas_table = Arc::new(CasTable::new());

    if let Some(parent_join_ep) = parent_join_ep {
        join::child_run_join(&node, parent_join_ep).await?;
    }
    bootstrap_client::push_update(&config, &node).await?;

    let join_listener = TcpListener::bind(join_ep).await?;
    let client_listener = TcpListener::bind(config.client_ep()).await?;
    info!(%join_ep, client_ep = %config.client_ep(), "node ready, serving clients");

    tokio::join!(
        propagate_loop(propagate_listener, node.clone()),
        removal_loop(removal_listener, node.clone(), config.clone()),
        join_loop(join_listener, node.clone(), config.clone()),
        client_loop(client_listener, node.clone(), cas_table.clone()),
    );
    Ok(())
}

/// Either self-assigns the whole world (`--first`) or dials bootstrap's
/// ADDITION endpoint for an assigned `join_ep` port, the world
/// rectangle, and our parent (if any).
async fn discover_topology(config: &Config) -> Result<(SocketAddr, Rectangle, Rectangle, Option<SocketAddr>)> {
    if config.first {
        let (fx, fy, tx, ty) = match (config.world_from_x, config.world_from_y, config.world_to_x, config.world_to_y) {
            (Some(fx), Some(fy), Some(tx), Some(ty)) => (fx, fy, tx, ty),
            _ => {
                return Err(Error::BootstrapProtocol(
                    "--first requires --world-from-x/--world-from-y/--world-to-x/--world-to-y".into(),
                ))
            }
        };
        let world = Rectangle::world(Point::new(fx, fy), Point::new(tx, ty))?;
        return Ok((config.join_ep(), world, world, None));
    }

    let addition = bootstrap_client::request_addition(config).await?;
    let join_ep = SocketAddr::new(config.bind_addr, addition.assigned_join_port);
    let zone = addition.world;
    Ok((join_ep, addition.world, zone, addition.parent_join_ep))
}

async fn propagate_loop(listener: TcpListener, node: Arc<Node>) {
    loop {
        let Ok((mut stream, peer)) = listener.accept().await else { continue };
        let node = node.clone();
        tokio::spawn(async move {
            match PropagateMessage::read(&mut stream).await {
                Ok(PropagateMessage::Forward(request)) => {
                    let reply = serve_forward_request(&node, request);
                    if let Err(err) = reply.write(&mut stream).await {
                        warn!(%peer, %err, "propagate: failed to write forward reply");
                    }
                }
                Ok(PropagateMessage::Gossip(msg)) => {
                    let mut neighbours = node.neighbours_mut().await;
                    gossip::apply(&mut neighbours, &msg);
                }
                Ok(PropagateMessage::QueryArea) => {
                    let area = node.zone().await.area();
                    if let Err(err) = query_area::write_reply(&mut stream, area).await {
                        warn!(%peer, %err, "propagate: failed to answer query_area");
                    }
                }
                Err(err) => {
                    debug!(%peer, %err, "propagate: malformed message");
                }
            }
        });
    }
}

async fn removal_loop(listener: TcpListener, node: Arc<Node>, config: Arc<Config>) {
    loop {
        let Ok((stream, peer)) = listener.accept().await else { continue };
        let node = node.clone();
        let config = config.clone();
        tokio::spawn(async move {
            match departure::accept_departure(&node, stream).await {
                Ok(departed) => {
                    if let Err(err) = bootstrap_client::push_departure(&config, departed.join_ep, &node).await {
                        warn!(%err, "removal: failed to report departure to bootstrap");
                    }
                }
                Err(err) => warn!(%peer, %err, "removal: departure merge failed"),
            }
        });
    }
}

async fn join_loop(listener: TcpListener, node: Arc<Node>, config: Arc<Config>) {
    loop {
        let Ok((stream, peer)) = listener.accept().await else { continue };
        let node = node.clone();
        let config = config.clone();
        tokio::spawn(async move {
            match join::parent_handle_join(&node, stream).await {
                Ok(()) => {
                    if let Err(err) = bootstrap_client::push_update(&config, &node).await {
                        warn!(%err, "join: failed to report updated zone to bootstrap");
                    }
                }
                Err(err) => warn!(%peer, %err, "join: split handshake failed"),
            }
        });
    }
}

async fn client_loop(listener: TcpListener, node: Arc<Node>, cas_table: Arc<CasTable>) {
    loop {
        let Ok((stream, _peer)) = listener.accept().await else { continue };
        let node = node.clone();
        let cas_table = cas_table.clone();
        tokio::spawn(async move {
            session::run(node, cas_table, stream).await;
        });
    }
}
