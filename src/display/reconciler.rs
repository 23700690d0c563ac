//! Hotplug Reconciler
//!
//! Polls the inventory and folds connect/disconnect events into the desired
//! layout. Removed outputs are powered off and the layout falls back to the
//! primary; a new secondary set is adopted and its first output is brought
//! up in auto mode.
//!
//! ```text
//! tick ──> InventoryReader::read ──(error)──> keep last snapshot, no-op
//!               │
//!               ├─ for each removed: power off, reset layout
//!               └─ set changed:
//!                    ├─ non-empty: auto first, publish modes, track it
//!                    └─ empty:     reset layout (once per tick)
//! ```

use std::time::Duration;
use tracing::{debug, info, warn};

use crate::display::backend::{DisplayBackend, ModeSelection, OutputCommand, PowerState};
use crate::display::inventory::InventoryReader;
use crate::display::types::{DesiredLayoutState, RelativePosition, Resolution, TopologySnapshot};
use crate::display::DisplayError;

/// Default hotplug poll period
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// What one successful reconcile pass observed and did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Fresh inventory
    pub snapshot: TopologySnapshot,

    /// Outputs that disappeared since the last pass
    pub removed: Vec<String>,

    /// Commands that failed during the pass
    pub failures: Vec<DisplayError>,

    /// New secondary set, when it differs from the previous one
    pub adopted: Option<Vec<String>>,

    /// Candidate modes of the first adopted secondary
    pub resolutions: Vec<Resolution>,

    /// The layout was reset to primary-only
    pub reset: bool,
}

impl ReconcileOutcome {
    fn unchanged(snapshot: TopologySnapshot) -> Self {
        Self {
            snapshot,
            removed: Vec::new(),
            failures: Vec::new(),
            adopted: None,
            resolutions: Vec::new(),
            reset: false,
        }
    }

    /// Whether the secondary set changed
    pub fn is_change(&self) -> bool {
        !self.removed.is_empty() || self.adopted.is_some()
    }
}

/// Tracks the secondary set between polls
#[derive(Debug, Clone)]
pub struct HotplugReconciler {
    /// Secondary outputs seen on the last successful pass
    known: Vec<String>,

    /// Relation offered when a new secondary's placement is not classifiable
    default_position: RelativePosition,
}

impl HotplugReconciler {
    /// Start tracking from an initial secondary set
    pub fn new(known: Vec<String>, default_position: RelativePosition) -> Self {
        Self {
            known,
            default_position,
        }
    }

    /// Secondary outputs currently tracked
    pub fn known(&self) -> &[String] {
        &self.known
    }

    /// Run one reconcile pass against `main`
    ///
    /// Returns `None` when the inventory could not be read; the previous
    /// state is kept untouched in that case.
    pub async fn tick(
        &mut self,
        reader: &InventoryReader,
        backend: &dyn DisplayBackend,
        main: &str,
        state: &mut DesiredLayoutState,
    ) -> Option<ReconcileOutcome> {
        let snapshot = match reader.read().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Hotplug poll skipped: {}", e);
                return None;
            }
        };

        let current: Vec<String> = snapshot
            .outputs
            .iter()
            .filter(|o| o.connected && o.name != main)
            .map(|o| o.name.clone())
            .collect();

        if current == self.known {
            return Some(ReconcileOutcome::unchanged(snapshot));
        }

        let mut outcome = ReconcileOutcome::unchanged(snapshot);

        outcome.removed = self
            .known
            .iter()
            .filter(|name| !current.contains(name))
            .cloned()
            .collect();

        for name in &outcome.removed {
            info!("Display {} disconnected", name);
            if let Err(e) = backend
                .execute(&OutputCommand::SetPower {
                    output: name.clone(),
                    state: PowerState::Off,
                })
                .await
            {
                outcome.failures.push(e);
            }
            state.reset_to_primary();
            outcome.reset = true;
        }

        self.known = current.clone();

        match current.first() {
            Some(first) => {
                info!("Secondary displays now {:?}", current);
                if let Err(e) = backend
                    .execute(&OutputCommand::SetMode {
                        output: first.clone(),
                        mode: ModeSelection::Auto,
                    })
                    .await
                {
                    outcome.failures.push(e);
                }
                self.track(first, &outcome.snapshot, main, state);
                outcome.resolutions = outcome
                    .snapshot
                    .output(first)
                    .map(|o| o.available_resolutions.clone())
                    .unwrap_or_default();
            }
            None if !outcome.reset => {
                debug!("No secondary displays left");
                state.reset_to_primary();
                outcome.reset = true;
            }
            None => {}
        }

        outcome.adopted = Some(current);
        Some(outcome)
    }

    /// Point the desired layout at a newly adopted secondary
    fn track(
        &self,
        name: &str,
        snapshot: &TopologySnapshot,
        main: &str,
        state: &mut DesiredLayoutState,
    ) {
        let secondary = snapshot.output(name);
        let relation = snapshot.placement(main, name);
        let resolution = secondary.and_then(|o| o.available_resolutions.first().copied());

        state.requested.display = Some(name.to_string());
        state.requested.resolution = resolution;
        state.baseline.resolution = resolution;
        state.baseline.position = Some(relation);
        state.requested.position = Some(if relation.is_placeable() {
            relation
        } else {
            self.default_position
        });

        debug!(
            "Tracking {}: relation={}, resolution={:?}",
            name, relation, resolution
        );
    }
}
