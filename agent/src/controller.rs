use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::capture::FrameSource;
use crate::readiness::ReadinessChecker;
use crate::upload::Uploader;

/// Where the loop is within one poll / capture / send cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Polling,
    Capturing,
    Sending,
    PacedWait,
    Terminated,
}

/// How a single cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    NotReady,
    CaptureFailed,
    Sent,
    SendFailed,
}

/// Consecutive send failures. Capture failures never touch it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureCounter {
    count: u32,
    threshold: u32,
}

impl FailureCounter {
    /// A threshold of zero is treated as one.
    pub fn new(threshold: u32) -> Self {
        Self {
            count: 0,
            threshold: threshold.max(1),
        }
    }

    pub fn record_failure(&mut self) -> u32 {
        self.count = self.count.saturating_add(1);
        self.count
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn is_exhausted(&self) -> bool {
        self.count >= self.threshold
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub cycles: u64,
    pub not_ready: u64,
    pub capture_failures: u64,
    pub frames_sent: u64,
    pub send_failures: u64,
}

/// Returned once the failure threshold has been reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Termination {
    pub consecutive_failures: u32,
    pub stats: LoopStats,
}

/// Sequences readiness poll, capture and upload, one cycle at a time, with a
/// fixed sleep between cycles. Stops for good once `threshold` sends in a row
/// have failed.
pub struct LoopController<R, S, U> {
    readiness: R,
    source: S,
    uploader: U,
    failures: FailureCounter,
    poll_interval: Duration,
    state: LoopState,
    stats: LoopStats,
}

impl<R, S, U> LoopController<R, S, U>
where
    R: ReadinessChecker,
    S: FrameSource,
    U: Uploader,
{
    pub fn new(
        readiness: R,
        source: S,
        uploader: U,
        poll_interval: Duration,
        max_consecutive_failures: u32,
    ) -> Self {
        Self {
            readiness,
            source,
            uploader,
            failures: FailureCounter::new(max_consecutive_failures),
            poll_interval,
            state: LoopState::Polling,
            stats: LoopStats::default(),
        }
    }

    /// Run cycles until the failure threshold is reached.
    pub async fn run(&mut self) -> Termination {
        loop {
            if self.run_cycle().await.is_none() || self.state == LoopState::Terminated {
                let termination = Termination {
                    consecutive_failures: self.failures.count(),
                    stats: self.stats,
                };
                error!(
                    consecutive_failures = termination.consecutive_failures,
                    cycles = self.stats.cycles,
                    frames_sent = self.stats.frames_sent,
                    send_failures = self.stats.send_failures,
                    capture_failures = self.stats.capture_failures,
                    not_ready = self.stats.not_ready,
                    "max consecutive send failures reached, stopping"
                );
                return termination;
            }

            tokio::time::sleep(self.poll_interval).await;
            self.transition(LoopState::Polling);
        }
    }

    /// Run one cycle from `Polling` up to the end of `PacedWait` (excluding
    /// the sleep). Returns `None` without touching any collaborator once the
    /// loop has terminated.
    pub async fn run_cycle(&mut self) -> Option<CycleOutcome> {
        if self.state == LoopState::Terminated {
            return None;
        }
        self.transition(LoopState::Polling);
        self.stats.cycles += 1;

        let outcome = self.poll_capture_send().await;

        if self.failures.is_exhausted() {
            self.transition(LoopState::Terminated);
        } else {
            self.transition(LoopState::PacedWait);
        }
        Some(outcome)
    }

    async fn poll_capture_send(&mut self) -> CycleOutcome {
        if !self.readiness.is_ready().await {
            info!("backend not ready, waiting");
            self.stats.not_ready += 1;
            return CycleOutcome::NotReady;
        }

        info!("backend is ready, capturing frame");
        self.transition(LoopState::Capturing);
        let frame = match self.source.capture().await {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, source = self.source.name(), "failed to capture frame");
                self.stats.capture_failures += 1;
                return CycleOutcome::CaptureFailed;
            }
        };

        info!(seq = frame.seq, "frame captured, sending to backend");
        self.transition(LoopState::Sending);
        let result = self.uploader.send_frame(&frame).await;

        let path = frame.path().to_path_buf();
        match frame.discard() {
            Ok(true) => debug!(path = %path.display(), "frame artifact removed"),
            Ok(false) => debug!(path = %path.display(), "frame artifact already gone"),
            Err(e) => warn!(error = %e, path = %path.display(), "failed to remove frame artifact"),
        }

        match result {
            Ok(receipt) => {
                self.failures.reset();
                self.stats.frames_sent += 1;
                info!(
                    frame_id = receipt.frame_id,
                    backend_message = receipt.message.as_deref(),
                    "frame sent successfully"
                );
                CycleOutcome::Sent
            }
            Err(e) => {
                let count = self.failures.record_failure();
                self.stats.send_failures += 1;
                warn!(
                    error = %e,
                    consecutive_failures = count,
                    threshold = self.failures.threshold(),
                    "failed to send frame"
                );
                CycleOutcome::SendFailed
            }
        }
    }

    fn transition(&mut self, next: LoopState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "state transition");
            self.state = next;
        }
    }
}
