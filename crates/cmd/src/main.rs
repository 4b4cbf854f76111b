// Copyright 2025 Cronwheel Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use cronwheel_base::KeyLayout;
use cronwheel_coordinator::{CoordinatorConfig, EtcdEngine, KvEngine};
use cronwheel_master::{Master, MasterConfig};
use cronwheel_telemetry::{logging, panic_hook};
use cronwheel_worker::{LockFlavor, WorkerApp, WorkerConfig};
use snafu::{ResultExt, Whatever};
use tracing::info;

#[derive(Debug, Parser)]
#[clap(
    name = "cronwheel",
    about = "distributed cron job scheduler",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Master(MasterArgs),
    Worker(WorkerArgs),
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Starts the cronwheel master: job APIs, lock endpoints and the
worker event stream.

Examples:

cronwheel master --bind 0.0.0.0:8220 --etcd 127.0.0.1:2379

")]
struct MasterArgs {
    /// Address to bind the HTTP server.
    #[arg(long, default_value = "127.0.0.1:8220")]
    bind: String,

    /// Coordinator endpoints.
    #[arg(long = "etcd", default_value = "127.0.0.1:2379")]
    etcd: Vec<String>,

    /// Root of the coordinator key layout.
    #[arg(long, default_value = "/crontab")]
    root: String,
}

impl MasterArgs {
    async fn run(self) -> Result<(), Whatever> {
        let _guards = logging::init_tracing_subscriber("cronwheel-master");
        panic_hook::set_panic_hook();

        let engine: Arc<dyn KvEngine> = Arc::new(
            EtcdEngine::connect(&CoordinatorConfig {
                endpoints: self.etcd,
                ..CoordinatorConfig::default()
            })
            .await
            .whatever_context("failed to connect to the coordinator")?,
        );

        let config = MasterConfig {
            bind_address: self.bind,
            layout: KeyLayout::new(self.root),
            ..MasterConfig::default()
        };
        let handle = Master::new(config, engine)
            .start()
            .await
            .whatever_context("failed to start the master")?;

        let token = handle.shutdown_token();
        tokio::spawn(async move {
            shutdown_signal().await;
            info!("termination signal received");
            token.cancel();
        });

        handle
            .run_until_stopped()
            .await
            .whatever_context("master terminated abnormally")
    }
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Starts a cronwheel worker: subscribes to the master's event stream,
schedules jobs locally and runs them under coordinator locks.

Examples:

cronwheel worker --name worker-1 --master-url http://127.0.0.1:8220

")]
struct WorkerArgs {
    /// Name this worker registers under.
    #[arg(long, default_value = "worker-1")]
    name: String,

    /// The master's HTTP root.
    #[arg(long, default_value = "http://127.0.0.1:8220")]
    master_url: String,

    /// Coordinator endpoints.
    #[arg(long = "etcd", default_value = "127.0.0.1:2379")]
    etcd: Vec<String>,

    /// Root of the coordinator key layout.
    #[arg(long, default_value = "/crontab")]
    root: String,

    /// Lock flavor: cas (worker-held lease) or proxy (master-held).
    #[arg(long, default_value = "cas")]
    lock_flavor: String,
}

impl WorkerArgs {
    async fn run(self) -> Result<(), Whatever> {
        let _guards = logging::init_tracing_subscriber("cronwheel-worker");
        panic_hook::set_panic_hook();

        let lock_flavor = match self.lock_flavor.as_str() {
            "cas" => LockFlavor::Cas,
            "proxy" => LockFlavor::Proxy,
            other => snafu::whatever!("unknown lock flavor {other:?}, expected cas or proxy"),
        };

        let config = WorkerConfig {
            name: self.name,
            master_url: self.master_url,
            coordinator: CoordinatorConfig {
                endpoints: self.etcd,
                ..CoordinatorConfig::default()
            },
            layout: KeyLayout::new(self.root),
            lock_flavor,
            ..WorkerConfig::default()
        };

        WorkerApp::new(config)
            .run()
            .await
            .whatever_context("worker terminated abnormally")
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

#[tokio::main]
async fn main() -> Result<(), Whatever> {
    let cli = Cli::parse();
    match cli.commands {
        Commands::Master(args) => args.run().await,
        Commands::Worker(args) => args.run().await,
    }
}
