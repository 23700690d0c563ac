//! Orientation Guard
//!
//! Makes orientation changes reversible. A change to anything other than the
//! confirmed orientation (or `normal`) starts a countdown; if the user does
//! not confirm before it expires the output is rotated back.
//!
//! At most one [`OrientationTimer`] is alive per session. A new request
//! supersedes the running timer, which can then never revert or confirm.
//! The guard decides when to rotate and revert; it does not render or
//! notify, callers map the returned outcomes to notifications.

use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::display::backend::{DisplayBackend, OutputCommand};
use crate::display::types::Orientation;
use crate::display::{DisplayError, Result};

/// Countdown length before an unconfirmed orientation is reverted
pub const DEFAULT_REVERT_SECONDS: u32 = 10;

/// Lifecycle of an [`OrientationTimer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerStatus {
    /// Counting down
    Running,
    /// Kept by the user
    Confirmed,
    /// Expired and rotated back
    Reverted,
    /// Replaced by a newer request before it finished
    Superseded,
}

/// One pending orientation change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrientationTimer {
    /// Monotonic id within the session
    pub id: u64,
    /// Output being rotated
    pub target_display: String,
    /// Newly requested orientation
    pub pending_orientation: Orientation,
    /// Last confirmed orientation, restored on expiry
    pub baseline_orientation: Orientation,
    /// Seconds until revert
    pub remaining_seconds: u32,
    /// Current status
    pub status: TimerStatus,
}

/// Result of [`OrientationGuard::request`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Safe orientation applied and confirmed without a countdown
    Applied {
        /// Orientation now confirmed
        orientation: Orientation,
        /// Timer cancelled by this request
        superseded: Option<OrientationTimer>,
    },

    /// Orientation applied, countdown running
    CountdownStarted {
        /// The new running timer
        timer: OrientationTimer,
        /// Timer cancelled by this request
        superseded: Option<OrientationTimer>,
    },
}

/// Result of one [`OrientationGuard::tick`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardTick {
    /// No timer running
    Idle,

    /// Timer still counting
    Counting {
        /// Running timer after the decrement
        timer: OrientationTimer,
    },

    /// Timer expired; the revert command was issued
    Reverted {
        /// The finished timer
        timer: OrientationTimer,
        /// Outcome of the revert command
        result: Result<()>,
    },
}

/// Session-scoped orientation state machine
#[derive(Debug)]
pub struct OrientationGuard {
    /// Countdown length for new timers
    revert_seconds: u32,

    /// Last confirmed orientation per output
    confirmed: HashMap<String, Orientation>,

    /// The single running timer
    active: Option<OrientationTimer>,

    /// Most recently finished timer
    last_retired: Option<OrientationTimer>,

    next_id: u64,
}

impl Default for OrientationGuard {
    fn default() -> Self {
        Self::new(DEFAULT_REVERT_SECONDS)
    }
}

impl OrientationGuard {
    /// Create a guard with the given countdown length
    pub fn new(revert_seconds: u32) -> Self {
        Self {
            revert_seconds: revert_seconds.max(1),
            confirmed: HashMap::new(),
            active: None,
            last_retired: None,
            next_id: 1,
        }
    }

    /// Record the live orientation of an output as confirmed
    pub fn record_confirmed(&mut self, output: &str, orientation: Orientation) {
        self.confirmed.insert(output.to_string(), orientation);
    }

    /// Last confirmed orientation of `output`; unknown outputs are normal
    pub fn confirmed_orientation(&self, output: &str) -> Orientation {
        self.confirmed.get(output).copied().unwrap_or_default()
    }

    /// Orientation `output` is currently showing
    pub fn effective_orientation(&self, output: &str) -> Orientation {
        match &self.active {
            Some(timer) if timer.target_display == output => timer.pending_orientation,
            _ => self.confirmed_orientation(output),
        }
    }

    /// The running timer, if any
    pub fn active(&self) -> Option<&OrientationTimer> {
        self.active.as_ref()
    }

    /// Whether a countdown is running
    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// Most recently confirmed, reverted or superseded timer
    pub fn last_retired(&self) -> Option<&OrientationTimer> {
        self.last_retired.as_ref()
    }

    /// Rotate `output`, starting a countdown unless the orientation is safe
    ///
    /// `normal` and the already-confirmed orientation are safe and confirm
    /// themselves. Any running timer is superseded either way.
    ///
    /// # Errors
    ///
    /// Returns [`DisplayError::CommandFailed`] if the rotation command fails;
    /// guard state is left untouched in that case.
    pub async fn request(
        &mut self,
        backend: &dyn DisplayBackend,
        output: &str,
        orientation: Orientation,
    ) -> Result<RequestOutcome> {
        backend
            .execute(&OutputCommand::SetRotation {
                output: output.to_string(),
                orientation,
            })
            .await?;

        let superseded = self.supersede();
        let baseline = self.confirmed_orientation(output);

        if orientation == Orientation::Normal || orientation == baseline {
            self.record_confirmed(output, orientation);
            info!("Orientation of {} set to {} (no confirmation needed)", output, orientation);
            return Ok(RequestOutcome::Applied {
                orientation,
                superseded,
            });
        }

        let timer = OrientationTimer {
            id: self.next_id,
            target_display: output.to_string(),
            pending_orientation: orientation,
            baseline_orientation: baseline,
            remaining_seconds: self.revert_seconds,
            status: TimerStatus::Running,
        };
        self.next_id += 1;

        info!(
            "Orientation of {} changed to {}, reverting to {} in {}s unless confirmed",
            output, orientation, baseline, self.revert_seconds
        );
        self.active = Some(timer.clone());

        Ok(RequestOutcome::CountdownStarted { timer, superseded })
    }

    /// Advance the running timer by one second
    ///
    /// On expiry the revert command is issued exactly once and the timer is
    /// retired as reverted, whether or not the command succeeded.
    pub async fn tick(&mut self, backend: &dyn DisplayBackend) -> GuardTick {
        let Some(timer) = self.active.as_mut() else {
            return GuardTick::Idle;
        };

        timer.remaining_seconds = timer.remaining_seconds.saturating_sub(1);
        if timer.remaining_seconds > 0 {
            return GuardTick::Counting {
                timer: timer.clone(),
            };
        }

        let Some(mut timer) = self.active.take() else {
            return GuardTick::Idle;
        };
        let (timer, result) = self.revert(backend, &mut timer).await;
        GuardTick::Reverted { timer, result }
    }

    /// Revert the running timer immediately (session teardown)
    pub async fn revert_now(
        &mut self,
        backend: &dyn DisplayBackend,
    ) -> Option<(OrientationTimer, Result<()>)> {
        let mut timer = self.active.take()?;
        timer.remaining_seconds = 0;
        Some(self.revert(backend, &mut timer).await)
    }

    /// Keep the pending orientation
    ///
    /// # Errors
    ///
    /// Returns [`DisplayError::NoPendingOrientation`] when no timer is running.
    pub fn confirm(&mut self) -> Result<OrientationTimer> {
        let mut timer = self.active.take().ok_or(DisplayError::NoPendingOrientation)?;
        timer.status = TimerStatus::Confirmed;
        timer.baseline_orientation = timer.pending_orientation;
        self.record_confirmed(&timer.target_display, timer.pending_orientation);

        info!(
            "Orientation of {} confirmed as {}",
            timer.target_display, timer.pending_orientation
        );
        self.last_retired = Some(timer.clone());
        Ok(timer)
    }

    async fn revert(
        &mut self,
        backend: &dyn DisplayBackend,
        timer: &mut OrientationTimer,
    ) -> (OrientationTimer, Result<()>) {
        let result = backend
            .execute(&OutputCommand::SetRotation {
                output: timer.target_display.clone(),
                orientation: timer.baseline_orientation,
            })
            .await;

        match &result {
            Ok(()) => info!(
                "Orientation of {} reverted to {}",
                timer.target_display, timer.baseline_orientation
            ),
            Err(e) => warn!("Revert of {} failed: {}", timer.target_display, e),
        }

        timer.status = TimerStatus::Reverted;
        self.last_retired = Some(timer.clone());
        (timer.clone(), result)
    }

    fn supersede(&mut self) -> Option<OrientationTimer> {
        let mut timer = self.active.take()?;
        timer.status = TimerStatus::Superseded;
        debug!(
            "Timer {} for {} superseded with {}s left",
            timer.id, timer.target_display, timer.remaining_seconds
        );
        self.last_retired = Some(timer.clone());
        Some(timer)
    }
}
