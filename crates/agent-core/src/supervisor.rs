use std::time::Duration;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{debug, info, warn};

use self_protect::{wrap, ConstantId, FatalReason, GuardContext, GuardError, GuardResult, Guarded};
use shroud_host::{HostMemory, InspectionUi, MemoryEntry, MemoryValue, ValueKind};

use crate::journal::JournaledMemory;
use crate::simulated::RecordLayout;

const FALLBACK_POLL_INTERVAL: Duration = Duration::from_millis(900);

#[derive(Debug, Clone)]
pub struct PollSettings {
    pub candidate_intervals: Vec<Duration>,
    pub max_polls: u64,
    pub image_base: u64,
    pub records: u32,
    pub target_quantity: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollReport {
    pub poll: u64,
    pub purged: usize,
    pub score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub polls: u64,
    pub edits: u64,
    pub purged: usize,
}

/// Drives the host workflow: every edit goes through the guarded memory and
/// every poll re-checks the environment before sleeping.
pub struct Supervisor<M, U> {
    ctx: GuardContext,
    memory: Guarded<JournaledMemory<M>>,
    ui: U,
    settings: PollSettings,
    rng: StdRng,
    polls: u64,
}

impl<M: HostMemory, U: InspectionUi> Supervisor<M, U> {
    pub fn new(ctx: GuardContext, memory: M, ui: U, settings: PollSettings, rng: StdRng) -> Self {
        Self {
            ctx,
            memory: wrap(JournaledMemory::new(memory)),
            ui,
            settings,
            rng,
            polls: 0,
        }
    }

    pub fn context(&self) -> &GuardContext {
        &self.ctx
    }

    pub fn memory(&self) -> &JournaledMemory<M> {
        self.memory.inner()
    }

    #[cfg(test)]
    pub(crate) fn ui(&self) -> &U {
        &self.ui
    }

    /// Picks the next sleep from the candidate list.
    pub fn next_interval(&mut self) -> Duration {
        self.settings
            .candidate_intervals
            .choose(&mut self.rng)
            .copied()
            .unwrap_or(FALLBACK_POLL_INTERVAL)
    }

    /// Runs the session. A host failure ends it through the abort path, so
    /// edits are rolled back and queued telemetry is flushed before the error
    /// is returned.
    pub fn run(&mut self) -> Result<RunSummary> {
        match self.run_session() {
            Ok(summary) => Ok(summary),
            Err(err) if err.downcast_ref::<GuardError>().is_some() => Err(err),
            Err(err) => {
                let reason = format!("host failure: {:#}", err);
                warn!(reason = %reason, "aborting session");
                self.abort_input(&reason);
                Err(err)
            }
        }
    }

    fn run_session(&mut self) -> Result<RunSummary> {
        self.ctx.protect_constants();
        self.verify_target()?;

        let mut summary = RunSummary::default();
        while self.polls < self.settings.max_polls {
            let report = self.poll_once()?;
            summary.purged += report.purged;
            debug!(poll = report.poll, score = report.score, "poll checkpoint passed");

            if self.settings.records > 0 {
                let record = ((report.poll - 1) % u64::from(self.settings.records)) as u32;
                let written = self.set_quantity(record, self.settings.target_quantity)?;
                summary.edits += 1;
                debug!(record, quantity = written, "record quantity updated");
            }

            if self.polls < self.settings.max_polls {
                let wait = self.next_interval();
                self.ctx.clock().sleep(wait);
            }
        }
        summary.polls = self.polls;

        self.ctx.note(&format!(
            "session finished polls={} edits={}",
            summary.polls, summary.edits
        ));
        self.ctx.flush_telemetry();
        info!(
            polls = summary.polls,
            edits = summary.edits,
            purged = summary.purged,
            "supervisor finished"
        );
        Ok(summary)
    }

    /// One supervision step: inspection UI, checkpoint, expiry sweep.
    pub fn poll_once(&mut self) -> GuardResult<PollReport> {
        self.polls += 1;
        if self.ui.is_visible() {
            warn!(poll = self.polls, "inspection ui visible while armed");
            return Err(self
                .ctx
                .terminate_fatally(FatalReason::InspectionUiVisible, self.memory.inner_mut()));
        }

        let report = self.ctx.checkpoint(self.memory.inner_mut())?;
        let purged = self.ctx.store_mut().purge_expired();
        if purged > 0 {
            debug!(purged, "expired secure values purged");
        }
        Ok(PollReport {
            poll: self.polls,
            purged,
            score: report.verdict.score,
        })
    }

    /// Writes a capped quantity into one record and returns what was written.
    pub fn set_quantity(&mut self, record: u32, desired: u32) -> Result<u32> {
        let entry = MemoryEntry::new(self.layout().quantity_address(record), ValueKind::Dword);
        let quantity = desired.min(self.ctx.constant(ConstantId::QuantityCap));
        self.memory
            .call(&mut self.ctx, |memory| {
                memory.write(&[(entry, MemoryValue::Dword(quantity))])
            })?
            .with_context(|| format!("failed writing quantity at {}", entry))?;
        Ok(quantity)
    }

    pub fn abort_input(&mut self, reason: &str) -> GuardError {
        self.ctx.abort_input(reason, self.memory.inner_mut())
    }

    fn layout(&mut self) -> RecordLayout {
        let ctx = &mut self.ctx;
        RecordLayout::resolve(self.settings.image_base, |id| ctx.constant(id))
    }

    fn verify_target(&mut self) -> Result<()> {
        let header = MemoryEntry::new(self.settings.image_base, ValueKind::Dword);
        let values = self
            .memory
            .call(&mut self.ctx, |memory| memory.read(&[header]))?
            .context("failed reading target header")?;
        let expected = self.ctx.constant(ConstantId::HeaderMagic);
        match values.first() {
            Some(MemoryValue::Dword(magic)) if *magic == expected => Ok(()),
            other => {
                let reason = format!("unexpected target header {:?}", other);
                Err(self.abort_input(&reason).into())
            }
        }
    }
}

impl<M, U> std::fmt::Debug for Supervisor<M, U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("ctx", &self.ctx)
            .field("settings", &self.settings)
            .field("polls", &self.polls)
            .finish()
    }
}
