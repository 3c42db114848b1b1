use anyhow::Context;
use clap::Parser;
use log::{info, warn};
use sdrcore::Shutdown;
use std::path::PathBuf;
use tokio::runtime::Builder as TokioBuilder;
use workflow::config::{parse_company_id, NodeConfig, Overrides};
use workflow::runner::{RunMode, Runner};

mod collaborators;
mod generator;
mod status_bridge;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Disaster-node SDR recorder")]
struct Args {
    /// Load the node config from YAML
    #[arg(long)]
    config: Option<PathBuf>,
    /// Manufacturer id of the beacon, in hex
    #[arg(long, value_parser = parse_company_id)]
    company_id: Option<u16>,
    #[arg(long)]
    cooldown_secs: Option<u64>,
    #[arg(long)]
    poll_secs: Option<u64>,
    #[arg(long, env = "SDRNODE_DEVICE_TOKEN", hide_env_values = true)]
    device_token: Option<String>,
    /// Replace the radio scanner with a synthetic beacon
    #[arg(long, default_value_t = false)]
    simulate: bool,
    /// Expose coordinator status over HTTP
    #[arg(long, default_value_t = false)]
    serve: bool,
    /// Exit after the first completed recording
    #[arg(long, default_value_t = false)]
    once: bool,
}

async fn wait_for_signal(shutdown: Shutdown) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                    _ = shutdown.wait() => return,
                }
            }
            Err(err) => {
                warn!("[node] SIGTERM handler unavailable: {}", err);
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = shutdown.wait() => return,
                }
            }
        }
    }
    #[cfg(not(unix))]
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = shutdown.wait() => return,
    }
    info!("[node] stop requested, finishing current work");
    shutdown.trigger();
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let overrides = Overrides {
        company_id: args.company_id,
        cooldown_secs: args.cooldown_secs,
        poll_secs: args.poll_secs,
        device_token: args.device_token,
    };
    let config = match args.config {
        Some(path) => {
            let mut config = NodeConfig::load(path)?;
            config.apply(&overrides);
            config
        }
        None => NodeConfig::from_args(&overrides),
    };
    if config.dashboard.device_token.is_empty() {
        warn!("[node] no dashboard device token configured");
    }

    let runner = Runner::new(
        config,
        RunMode {
            simulate: args.simulate,
            serve: args.serve,
            once: args.once,
        },
    );
    let runtime = TokioBuilder::new_multi_thread()
        .enable_all()
        .build()
        .context("creating node runtime")?;

    let runs = runtime.block_on(async {
        let shutdown = Shutdown::new();
        tokio::spawn(wait_for_signal(shutdown.clone()));
        runner.run(shutdown).await
    })?;
    info!("[node] completed {} recordings", runs);
    Ok(())
}
