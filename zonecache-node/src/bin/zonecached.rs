// Copyright 2026 ZoneCache Contributors.
//
// This software is licensed under the General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, this software is
// distributed under the GPL Licence on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. Please review the Licence
// for the specific language governing permissions and limitations relating to
// use of this software.

//! zonecached is the node binary: a memcache-protocol-compatible cache
//! server that owns a rectangle of a shared 2-D keyspace and grows,
//! shrinks, and migrates keys as nodes join and leave.

use clap::Parser;
use eyre::{Result, WrapErr};
use file_rotate::compression::Compression;
use file_rotate::suffix::CountSuffix;
use file_rotate::{ContentLimit, FileRotate};
use tracing_appender::non_blocking::NonBlockingBuilder;
use tracing_subscriber::EnvFilter;

use zonecache_node::Config;

fn main() -> Result<()> {
    color_eyre::install()?;

    let handle = std::thread::Builder::new()
        .name("zonecached".to_string())
        .stack_size(16 * 1024 * 1024)
        .spawn(move || -> Result<()> {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run())
        })
        .wrap_err("failed to spawn node thread")?;

    match handle.join() {
        Ok(result) => result,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

async fn run() -> Result<()> {
    let config = Config::parse();

    let filter = config
        .log_level
        .clone()
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::new("info,zonecache_node=debug,zonecache_routing=debug"));

    let _log_guard = match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).wrap_err("creating log directory")?;
            let rotate = FileRotate::new(
                dir.join("zonecached.log"),
                CountSuffix::new(9),
                ContentLimit::Bytes(10 * 1024 * 1024),
                Compression::OnRotate(1),
            );
            let (non_blocking, guard) = NonBlockingBuilder::default().lossy(false).finish(rotate);
            tracing_subscriber::fmt().with_env_filter(filter).with_writer(non_blocking).init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    };

    tracing::info!(
        join_ep = %config.join_ep(),
        bootstrap = %config.bootstrap,
        first = config.first,
        "zonecached starting"
    );

    zonecache_node::listeners::run(config).await.wrap_err("node terminated")
}
