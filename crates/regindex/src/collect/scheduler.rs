//! Cycle / idle loop with cooperative shutdown.

use tokio::sync::watch;
use tokio::time::{Instant, sleep_until};

use super::context::CollectorContext;
use super::cycle::run_cycle;
use super::progress::{CollectProgress, ProgressCallback, emit};
use super::CollectError;

/// What the scheduler is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Collecting,
    Idle,
}

/// Runs a cycle, waits `update_interval`, and repeats until shutdown.
///
/// Shutdown is observed between cycles and while idle. A cycle in progress
/// always runs to completion.
pub struct Scheduler {
    context: CollectorContext,
    shutdown: watch::Receiver<bool>,
    cycles: u64,
    state: SchedulerState,
}

impl Scheduler {
    /// `shutdown` flips to `true` when the process should stop.
    pub fn new(context: CollectorContext, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            context,
            shutdown,
            cycles: 0,
            state: SchedulerState::Idle,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Cycles started so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn context(&self) -> &CollectorContext {
        &self.context
    }

    fn shutdown_requested(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Loop until shutdown. Returns the number of cycles run.
    ///
    /// A fatal error (rejected token) ends the loop immediately. Any other
    /// cycle failure is logged and the next cycle runs after the interval.
    pub async fn run(&mut self, on_progress: Option<&ProgressCallback>) -> Result<u64, CollectError> {
        let interval = self.context.options().update_interval;

        loop {
            if self.shutdown_requested() {
                break;
            }

            self.cycles += 1;
            self.state = SchedulerState::Collecting;
            match run_cycle(&self.context, self.cycles, on_progress).await {
                Ok(report) => {
                    if report.has_errors() {
                        tracing::warn!(
                            cycle = self.cycles,
                            errors = report.failed_count(),
                            "Cycle finished with item errors"
                        );
                    }
                }
                Err(e) if e.is_fatal() => {
                    self.state = SchedulerState::Idle;
                    tracing::error!(cycle = self.cycles, error = %e, "Stopping collector");
                    return Err(e);
                }
                Err(e) => {
                    tracing::error!(cycle = self.cycles, error = %e, "Cycle failed, retrying next interval");
                }
            }
            self.state = SchedulerState::Idle;

            if self.shutdown_requested() {
                break;
            }

            tracing::info!(next_cycle_in_secs = interval.as_secs(), "Waiting for next cycle");
            emit(on_progress, CollectProgress::Idle { next_cycle_in: interval });
            self.idle(Instant::now() + interval).await;
        }

        tracing::info!(cycles = self.cycles, "Collector shutting down");
        emit(on_progress, CollectProgress::ShuttingDown { cycles: self.cycles });
        Ok(self.cycles)
    }

    /// Sleep until `deadline` or until shutdown is requested.
    async fn idle(&mut self, deadline: Instant) {
        loop {
            tokio::select! {
                () = sleep_until(deadline) => return,
                changed = self.shutdown.changed() => match changed {
                    Ok(()) if *self.shutdown.borrow_and_update() => return,
                    Ok(()) => {}
                    Err(_) => {
                        // nobody can request shutdown any more
                        sleep_until(deadline).await;
                        return;
                    }
                },
            }
        }
    }
}
