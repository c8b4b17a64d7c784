use anyhow::Context;
use bridge::model::StatusModel;
use bridge::status::{status_bind_address, StatusBridge};
use clap::Parser;
use optimizer::PresenceMode;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use workflow::config::SimulationConfig;
use workflow::runner::Runner;

mod bridge;
mod generator;
mod optimizer;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Radar data manager simulator")]
struct Args {
    /// Load a simulation config from YAML
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, default_value_t = 64)]
    frames: usize,
    #[arg(long, default_value_t = 2)]
    consumers: usize,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    #[arg(long, value_enum, default_value_t = PresenceMode::MicroIfMacro)]
    mode: PresenceMode,
    /// Keep the status endpoint alive after the run
    #[arg(long, default_value_t = false)]
    serve: bool,
    #[arg(long, default_value_t = 9000)]
    port: u16,
    /// Append a one-line summary to this file
    #[arg(long)]
    report: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = if let Some(path) = args.config {
        SimulationConfig::load(path)?
    } else {
        SimulationConfig::from_args(args.frames, args.consumers, args.seed, args.mode)
    };

    let bridge = StatusBridge::new();
    if args.serve {
        bridge.serve(status_bind_address(args.port))?;
    }
    bridge.publish_status(&format!(
        "running {} frames through {} consumer(s)",
        config.frames, config.consumers
    ));

    let result = Runner::new(config.clone())
        .execute()
        .context("running simulation")?;

    println!(
        "Simulation -> emitted {}, dropped {}, compactions {}, anomalies {}, frame rate {:?} ({} switches)",
        result.frames_emitted,
        result.frames_dropped,
        result.metrics.compactions,
        result.metrics.anomalies,
        result.frame_rate,
        result.rate_switches
    );
    bridge.publish(&StatusModel::from_result(&result))?;

    if let Some(report_path) = args.report {
        let report = format!(
            "frames={} emitted={} dropped={} windows={:?} compactions={} wakes={}\n",
            config.frames,
            result.frames_emitted,
            result.frames_dropped,
            result.consumers.iter().map(|c| c.windows).collect::<Vec<_>>(),
            result.metrics.compactions,
            result.metrics.interrupt_wakes + result.metrics.task_wakes
        );
        if let Some(parent) = report_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&report_path)
            .with_context(|| format!("opening report {}", report_path.display()))?;
        file.write_all(report.as_bytes())?;
    }

    if args.serve {
        bridge.publish_status("status bridge running (Ctrl+C to stop)...");
        let runtime = TokioBuilder::new_current_thread()
            .enable_all()
            .build()
            .context("creating runtime for signal handling")?;
        runtime.block_on(async {
            signal::ctrl_c().await.context("awaiting Ctrl+C to exit")?;
            Ok::<(), anyhow::Error>(())
        })?;
    }

    Ok(())
}
