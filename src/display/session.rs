//! Display Session
//!
//! The session context object owns every piece of mutable display state
//! (snapshot, desired layout, orientation guard, hotplug tracking) and is the
//! only thing that mutates it. Once started it runs as a single task that
//! multiplexes three event sources:
//!
//! ```text
//!              ┌──────────────────────────────────────────────┐
//!   hotplug ──>│                                              │
//!   (2s)       │  DisplaySession::run                         │──> SessionObserver
//!   guard   ──>│   select! { poll | guard tick | request }    │    (callbacks)
//!   (1s)       │                                              │
//!   requests ─>│                                              │──> DisplayBackend
//!   (mpsc)     └──────────────────────────────────────────────┘
//! ```
//!
//! The guard interval only fires while a countdown is running and is reset
//! whenever a new countdown starts, so a revert lands a full countdown after
//! the request that caused it.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::DisplayConfig;
use crate::display::applier::{ApplyOutcome, LayoutApplier};
use crate::display::backend::{DisplayBackend, ModeSelection, OutputCommand};
use crate::display::guard::{GuardTick, OrientationGuard, OrientationTimer, RequestOutcome};
use crate::display::inventory::InventoryReader;
use crate::display::reconciler::{HotplugReconciler, ReconcileOutcome};
use crate::display::types::{
    DesiredLayoutState, DisplayOutput, LayoutRequest, Orientation, Resolution, TopologySnapshot,
};
use crate::display::{DisplayError, Result};

/// Request channel depth
const REQUEST_QUEUE: usize = 16;

/// User-visible message emitted by the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A countdown started
    CountdownStarted {
        /// Rotated output
        display: String,
        /// Pending orientation
        orientation: Orientation,
        /// Countdown length
        seconds: u32,
    },

    /// An orientation became permanent
    OrientationConfirmed {
        /// Rotated output
        display: String,
        /// Kept orientation
        orientation: Orientation,
    },

    /// A countdown expired and the output was rotated back
    OrientationReverted {
        /// Rotated output
        display: String,
        /// Restored orientation
        orientation: Orientation,
    },

    /// A secondary output went away and was powered off
    DisplayDisconnected(String),

    /// A mutating command failed
    CommandFailed(DisplayError),
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::CountdownStarted {
                orientation,
                seconds,
                ..
            } => write!(
                f,
                "Orientation changed to {}. Reverting in {} seconds.",
                orientation, seconds
            ),
            Notification::OrientationConfirmed { orientation, .. } => {
                write!(f, "Orientation set to {} permanently.", orientation)
            }
            Notification::OrientationReverted { orientation, .. } => {
                write!(f, "Orientation reverted to {}.", orientation)
            }
            Notification::DisplayDisconnected(name) => {
                write!(f, "Display {} disconnected and turned off.", name)
            }
            Notification::CommandFailed(e) => write!(f, "{}", e),
        }
    }
}

/// Receives UI-relevant state changes from a running session
///
/// All methods default to no-ops. Calls are made from the session task and
/// must not block.
pub trait SessionObserver: Send + Sync {
    /// The set of connected secondary outputs changed
    fn on_external_displays(&self, _displays: &[String]) {}

    /// Candidate modes of the tracked secondary
    fn on_resolutions(&self, _display: &str, _resolutions: &[Resolution]) {}

    /// The desired layout fell back to primary-only
    fn on_layout_reset(&self) {}

    /// A countdown started or advanced
    fn on_countdown(&self, _timer: &OrientationTimer) {}

    /// A user-visible message
    fn on_notification(&self, _notification: &Notification) {}
}

/// Observer that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl SessionObserver for NullObserver {}

enum SessionRequest {
    Apply {
        request: LayoutRequest,
        reply: oneshot::Sender<Result<ApplyOutcome>>,
    },
    Confirm {
        reply: oneshot::Sender<Result<OrientationTimer>>,
    },
    Snapshot {
        reply: oneshot::Sender<TopologySnapshot>,
    },
    DesiredState {
        reply: oneshot::Sender<DesiredLayoutState>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable handle to a running session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    requests: mpsc::Sender<SessionRequest>,
}

impl fmt::Debug for SessionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionRequest::Apply { .. } => "Apply",
            SessionRequest::Confirm { .. } => "Confirm",
            SessionRequest::Snapshot { .. } => "Snapshot",
            SessionRequest::DesiredState { .. } => "DesiredState",
            SessionRequest::Shutdown { .. } => "Shutdown",
        };
        f.write_str(name)
    }
}

impl SessionHandle {
    async fn call<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SessionRequest,
    ) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(build(reply))
            .await
            .map_err(|_| DisplayError::SessionClosed)?;
        response.await.map_err(|_| DisplayError::SessionClosed)
    }

    /// Apply a layout request
    ///
    /// # Errors
    ///
    /// Returns the applier's error, or [`DisplayError::SessionClosed`] if
    /// the session has stopped.
    pub async fn apply(&self, request: LayoutRequest) -> Result<ApplyOutcome> {
        self.call(|reply| SessionRequest::Apply { request, reply })
            .await?
    }

    /// Keep the pending orientation
    pub async fn confirm(&self) -> Result<OrientationTimer> {
        self.call(|reply| SessionRequest::Confirm { reply }).await?
    }

    /// Latest inventory snapshot
    pub async fn snapshot(&self) -> Result<TopologySnapshot> {
        self.call(|reply| SessionRequest::Snapshot { reply }).await
    }

    /// Current desired layout
    pub async fn desired_state(&self) -> Result<DesiredLayoutState> {
        self.call(|reply| SessionRequest::DesiredState { reply }).await
    }

    /// Stop the session, reverting any unconfirmed orientation
    pub async fn shutdown(&self) -> Result<()> {
        self.call(|reply| SessionRequest::Shutdown { reply }).await
    }
}

/// Display-management session context
pub struct DisplaySession {
    backend: Arc<dyn DisplayBackend>,
    reader: InventoryReader,
    observer: Arc<dyn SessionObserver>,

    /// Primary output, fixed for the session
    main: String,

    /// Latest successful inventory read
    snapshot: TopologySnapshot,

    state: DesiredLayoutState,
    guard: OrientationGuard,
    reconciler: HotplugReconciler,
    applier: LayoutApplier,

    poll_interval: Duration,
}

impl DisplaySession {
    /// Read the inventory and capture the initial layout
    ///
    /// If a secondary output is connected it is brought up in auto mode and
    /// its candidate modes are published to the observer.
    ///
    /// # Errors
    ///
    /// - [`DisplayError::QueryFailed`] if the first inventory read fails
    /// - [`DisplayError::NoPrimaryDetected`] if no output is connected
    pub async fn start(
        backend: Arc<dyn DisplayBackend>,
        config: &DisplayConfig,
        observer: Arc<dyn SessionObserver>,
    ) -> Result<Self> {
        let reader = InventoryReader::new(backend.clone());
        let snapshot = reader.read().await?;

        let primary = snapshot
            .primary_output()
            .cloned()
            .ok_or(DisplayError::NoPrimaryDetected)?;

        let secondaries: Vec<String> = snapshot
            .outputs
            .iter()
            .filter(|o| o.connected && o.name != primary.name)
            .map(|o| o.name.clone())
            .collect();

        let tracked = secondaries
            .first()
            .and_then(|name| snapshot.output(name))
            .cloned();

        let state = match &tracked {
            Some(secondary) => {
                let mut state = DesiredLayoutState::capture(
                    primary.orientation,
                    Some(snapshot.placement(&primary.name, &secondary.name)),
                    secondary.current_mode.or(secondary.resolution),
                );
                state.requested.display = Some(secondary.name.clone());
                state
            }
            None => DesiredLayoutState::capture(primary.orientation, None, None),
        };

        let mut guard = OrientationGuard::new(config.revert_timeout_secs);
        guard.record_confirmed(&primary.name, primary.orientation);

        info!(
            "Display session started: primary={} ({}), secondary={:?}",
            primary.name, primary.orientation, secondaries
        );

        let session = Self {
            backend,
            reader,
            observer,
            main: primary.name.clone(),
            reconciler: HotplugReconciler::new(secondaries.clone(), config.default_position),
            snapshot,
            state,
            guard,
            applier: LayoutApplier::new(),
            poll_interval: config.poll_interval(),
        };

        if let Some(secondary) = tracked {
            session
                .execute_reported(OutputCommand::SetMode {
                    output: secondary.name.clone(),
                    mode: ModeSelection::Auto,
                })
                .await;
            session.observer.on_external_displays(&secondaries);
            session
                .observer
                .on_resolutions(&secondary.name, &secondary.available_resolutions);
        }

        Ok(session)
    }

    /// Primary output name
    pub fn main_display(&self) -> &str {
        &self.main
    }

    /// Latest inventory snapshot
    pub fn snapshot(&self) -> &TopologySnapshot {
        &self.snapshot
    }

    /// Current desired layout
    pub fn desired_state(&self) -> &DesiredLayoutState {
        &self.state
    }

    /// Running orientation countdown, if any
    pub fn pending_orientation(&self) -> Option<&OrientationTimer> {
        self.guard.active()
    }

    /// Apply a layout request
    ///
    /// The request replaces the desired layout. Orientation always targets
    /// the primary; position and resolution target `request.display`
    /// (the primary when unset).
    ///
    /// # Errors
    ///
    /// - [`DisplayError::InvalidRequest`] for an unknown output or a mode
    ///   the output does not offer
    /// - [`DisplayError::CommandFailed`] from the first failing command; a
    ///   notification is emitted as well
    pub async fn apply(&mut self, request: LayoutRequest) -> Result<ApplyOutcome> {
        self.validate(&request)?;
        self.state.requested = request;

        let main = self
            .snapshot
            .output(&self.main)
            .cloned()
            .unwrap_or_else(|| DisplayOutput::new(self.main.clone()));

        let result = self
            .applier
            .apply(
                self.backend.as_ref(),
                &mut self.state,
                &main,
                &mut self.guard,
            )
            .await;

        match &result {
            Ok(ApplyOutcome::Applied {
                orientation: Some(outcome),
                ..
            }) => self.announce(outcome),
            Ok(_) => {}
            Err(e) => self.notify(Notification::CommandFailed(e.clone())),
        }

        result
    }

    /// Keep the pending orientation
    ///
    /// # Errors
    ///
    /// Returns [`DisplayError::NoPendingOrientation`] when nothing is pending.
    pub fn confirm(&mut self) -> Result<OrientationTimer> {
        let timer = self.guard.confirm()?;
        self.notify(Notification::OrientationConfirmed {
            display: timer.target_display.clone(),
            orientation: timer.pending_orientation,
        });
        Ok(timer)
    }

    /// One hotplug reconcile pass
    pub async fn poll(&mut self) {
        let Some(outcome) = self
            .reconciler
            .tick(
                &self.reader,
                self.backend.as_ref(),
                &self.main,
                &mut self.state,
            )
            .await
        else {
            return;
        };

        let ReconcileOutcome {
            snapshot,
            removed,
            failures,
            adopted,
            resolutions,
            reset,
        } = outcome;
        self.snapshot = snapshot;

        for name in removed {
            self.notify(Notification::DisplayDisconnected(name));
        }
        for failure in failures {
            self.notify(Notification::CommandFailed(failure));
        }
        if reset {
            self.observer.on_layout_reset();
        }
        if let Some(displays) = adopted {
            self.observer.on_external_displays(&displays);
            if let Some(first) = displays.first() {
                self.observer.on_resolutions(first, &resolutions);
            }
        }
    }

    /// Advance the orientation countdown by one second
    pub async fn tick_guard(&mut self) {
        match self.guard.tick(self.backend.as_ref()).await {
            GuardTick::Idle => {}
            GuardTick::Counting { timer } => self.observer.on_countdown(&timer),
            GuardTick::Reverted { timer, result } => self.finish_revert(timer, result),
        }
    }

    /// Revert any unconfirmed orientation before the session ends
    pub async fn shutdown(&mut self) {
        if let Some((timer, result)) = self.guard.revert_now(self.backend.as_ref()).await {
            self.finish_revert(timer, result);
        }
        info!("Display session stopped");
    }

    /// Split into a handle and the session loop future
    ///
    /// The loop runs until [`SessionHandle::shutdown`] is called or every
    /// handle is dropped.
    pub fn into_runner(self) -> (SessionHandle, impl Future<Output = Result<()>> + Send) {
        let (requests, receiver) = mpsc::channel(REQUEST_QUEUE);
        (SessionHandle { requests }, self.run(receiver))
    }

    async fn run(mut self, mut requests: mpsc::Receiver<SessionRequest>) -> Result<()> {
        let mut hotplug = tokio::time::interval(self.poll_interval);
        hotplug.set_missed_tick_behavior(MissedTickBehavior::Delay);
        hotplug.reset();

        let mut countdown = tokio::time::interval(Duration::from_secs(1));
        countdown.set_missed_tick_behavior(MissedTickBehavior::Delay);
        countdown.reset();

        loop {
            tokio::select! {
                _ = hotplug.tick() => self.poll().await,

                _ = countdown.tick(), if self.guard.is_running() => self.tick_guard().await,

                request = requests.recv() => {
                    let Some(request) = request else {
                        debug!("All session handles dropped");
                        self.shutdown().await;
                        break;
                    };

                    match request {
                        SessionRequest::Apply { request, reply } => {
                            let before = self.guard.active().map(|t| t.id);
                            let result = self.apply(request).await;
                            let after = self.guard.active().map(|t| t.id);
                            if after.is_some() && after != before {
                                countdown.reset();
                            }
                            let _ = reply.send(result);
                        }
                        SessionRequest::Confirm { reply } => {
                            let _ = reply.send(self.confirm());
                        }
                        SessionRequest::Snapshot { reply } => {
                            let _ = reply.send(self.snapshot.clone());
                        }
                        SessionRequest::DesiredState { reply } => {
                            let _ = reply.send(self.state.clone());
                        }
                        SessionRequest::Shutdown { reply } => {
                            self.shutdown().await;
                            let _ = reply.send(());
                            break;
                        }
                    }
                }
            }
        }

        Ok(())
    }

    fn validate(&self, request: &LayoutRequest) -> Result<()> {
        let target = request.display.as_deref().unwrap_or(&self.main);

        let output = match self.snapshot.output(target) {
            Some(output) if output.connected => output,
            _ => {
                return Err(DisplayError::InvalidRequest(format!(
                    "{} is not a connected output",
                    target
                )))
            }
        };

        if let Some(resolution) = request.resolution {
            if !output.available_resolutions.is_empty()
                && !output.available_resolutions.contains(&resolution)
            {
                return Err(DisplayError::InvalidRequest(format!(
                    "{} does not offer {}",
                    target, resolution
                )));
            }
        }

        Ok(())
    }

    fn announce(&self, outcome: &RequestOutcome) {
        match outcome {
            RequestOutcome::Applied { orientation, .. } => {
                self.notify(Notification::OrientationConfirmed {
                    display: self.main.clone(),
                    orientation: *orientation,
                })
            }
            RequestOutcome::CountdownStarted { timer, .. } => {
                self.observer.on_countdown(timer);
                self.notify(Notification::CountdownStarted {
                    display: timer.target_display.clone(),
                    orientation: timer.pending_orientation,
                    seconds: timer.remaining_seconds,
                });
            }
        }
    }

    fn finish_revert(&mut self, timer: OrientationTimer, result: Result<()>) {
        match result {
            Ok(()) => {
                self.state.requested.orientation = timer.baseline_orientation;
                self.state.baseline.orientation = timer.baseline_orientation;
                self.notify(Notification::OrientationReverted {
                    display: timer.target_display,
                    orientation: timer.baseline_orientation,
                });
            }
            Err(e) => self.notify(Notification::CommandFailed(e)),
        }
    }

    async fn execute_reported(&self, command: OutputCommand) {
        if let Err(e) = self.backend.execute(&command).await {
            warn!("{}", e);
            self.notify(Notification::CommandFailed(e));
        }
    }

    fn notify(&self, notification: Notification) {
        info!("{}", notification);
        self.observer.on_notification(&notification);
    }
}
