mod config;
mod journal;
mod simulated;
mod supervisor;

use std::sync::Arc;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use self_protect::{
    ConstantProvider, GuardCapabilities, GuardContext, MachineCodeSource, ProcessExit,
};
use shroud_host::{HttpTransport, NeverVisible, SystemClock};

use config::AgentConfig;
use simulated::{simulated_host, SIMULATED_IMAGE_BASE};
use supervisor::{PollSettings, Supervisor};

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let config = AgentConfig::load()?;

    let capabilities = GuardCapabilities {
        clock: Arc::new(SystemClock::new()),
        transport: Box::new(HttpTransport::new().context("failed building collector client")?),
        routines: Box::new(MachineCodeSource::default()),
        terminator: Box::new(ProcessExit::default()),
    };
    let ctx = GuardContext::new(config.guard_config(), capabilities);

    info!(
        host_id = %config.host_id,
        telemetry = config.telemetry_enabled,
        collector = %config.collector_url,
        max_polls = config.max_polls,
        "shroud agent started"
    );

    let host = simulated_host(config.simulated_records, &mut ConstantProvider::new());
    let settings = PollSettings {
        candidate_intervals: config.poll_intervals(),
        max_polls: config.max_polls,
        image_base: SIMULATED_IMAGE_BASE,
        records: config.simulated_records,
        target_quantity: config.target_quantity,
    };
    let mut supervisor = Supervisor::new(ctx, host, NeverVisible, settings, StdRng::from_entropy());
    let summary = supervisor.run()?;

    info!(
        polls = summary.polls,
        edits = summary.edits,
        journaled = supervisor.memory().journaled(),
        flushes = supervisor.context().telemetry().flush_count(),
        "shroud agent stopped"
    );
    Ok(())
}
