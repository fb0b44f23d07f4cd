// Copyright 2026 ZoneCache Contributors.
//
// This software is licensed under the General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, this software is
// distributed under the GPL Licence on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. Please review the Licence
// for the specific language governing permissions and limitations relating to
// use of this software.

use std::net::IpAddr;
use std::sync::Arc;

use clap::Parser;
use eyre::{Result, WrapErr};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use zonecache_bootstrap::Directory;
use zonecache_core::geometry::{Point, Rectangle};

/// The bootstrap directory: a standalone service that hands newly
/// started nodes their join endpoint and tells them either that they
/// are the cluster's first node, or who to join.
#[derive(Parser, Debug)]
#[command(name = "bootstrapd")]
struct Config {
    /// World rectangle, `x1 y1 x2 y2`.
    #[arg(long, num_args = 4)]
    world: Vec<f64>,

    #[arg(long, default_value = "0.0.0.0")]
    bind_addr: IpAddr,

    #[arg(long, default_value_t = 11311)]
    addition_port: u16,

    #[arg(long, default_value_t = 11312)]
    update_port: u16,

    #[arg(long, default_value_t = 11313)]
    departure_port: u16,

    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let config = Config::parse();

    let filter = config
        .log_level
        .clone()
        .map(tracing_subscriber::EnvFilter::new)
        .unwrap_or_else(|| tracing_subscriber::EnvFilter::new("info,zonecache_bootstrap=debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if config.world.len() != 4 {
        eyre::bail!("--world takes exactly four values: x1 y1 x2 y2");
    }
    let world = Rectangle::world(
        Point::new(config.world[0], config.world[1]),
        Point::new(config.world[2], config.world[3]),
    )
    .wrap_err("invalid world rectangle")?;

    let directory = Arc::new(Directory::new(world, config.bind_addr));
    info!(?world, bind_addr = %config.bind_addr, "bootstrap directory starting");

    let addition = spawn_addition_loop(directory.clone(), config.bind_addr, config.addition_port);
    let update = spawn_update_loop(directory.clone(), config.bind_addr, config.update_port);
    let departure = spawn_departure_loop(directory, config.bind_addr, config.departure_port);

    let (a, u, d) = tokio::join!(addition, update, departure);
    a.wrap_err("addition loop failed")?;
    u.wrap_err("update loop failed")?;
    d.wrap_err("departure loop failed")?;
    Ok(())
}

async fn spawn_addition_loop(directory: Arc<Directory>, bind_addr: IpAddr, port: u16) -> Result<()> {
    let listener = TcpListener::bind((bind_addr, port)).await.wrap_err("binding addition listener")?;
    info!(%port, "addition loop listening");
    loop {
        let (mut stream, peer) = listener.accept().await?;
        let directory = directory.clone();
        tokio::spawn(async move {
            if let Err(err) = directory.handle_addition(&mut stream).await {
                warn!(%peer, %err, "addition request failed");
            }
        });
    }
}

async fn spawn_update_loop(directory: Arc<Directory>, bind_addr: IpAddr, port: u16) -> Result<()> {
    let listener = TcpListener::bind((bind_addr, port)).await.wrap_err("binding update listener")?;
    info!(%port, "update loop listening");
    loop {
        let (mut stream, peer) = listener.accept().await?;
        let directory = directory.clone();
        tokio::spawn(async move {
            if let Err(err) = directory.handle_update(&mut stream).await {
                warn!(%peer, %err, "update request failed");
            }
        });
    }
}

async fn spawn_departure_loop(directory: Arc<Directory>, bind_addr: IpAddr, port: u16) -> Result<()> {
    let listener = TcpListener::bind((bind_addr, port)).await.wrap_err("binding departure listener")?;
    info!(%port, "departure loop listening");
    loop {
        let (mut stream, peer) = listener.accept().await?;
        let directory = directory.clone();
        tokio::spawn(async move {
            if let Err(err) = directory.handle_departure(&mut stream).await {
                error!(%peer, %err, "departure request failed");
            }
        });
    }
}
