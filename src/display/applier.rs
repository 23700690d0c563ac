//! Layout Applier
//!
//! Turns a [`DesiredLayoutState`] into an ordered command sequence. Order
//! matters: auto mode first, then placement, then an explicit mode that
//! overrides the negotiated one, and finally orientation through the
//! [`OrientationGuard`].

use tracing::{debug, info};

use crate::display::backend::{DisplayBackend, ModeSelection, OutputCommand};
use crate::display::guard::{OrientationGuard, RequestOutcome};
use crate::display::types::{DesiredLayoutState, DisplayOutput, RelativePosition};
use crate::display::Result;

/// Result of [`LayoutApplier::apply`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Nothing differed from the baseline; no command was issued
    Unchanged,

    /// Commands were issued
    Applied {
        /// Number of layout commands issued (excluding rotation)
        commands: usize,
        /// Outcome of the orientation request, if orientation changed
        orientation: Option<RequestOutcome>,
    },
}

/// Applies desired layouts against the primary output
#[derive(Debug, Clone, Copy, Default)]
pub struct LayoutApplier;

impl LayoutApplier {
    /// Create an applier
    pub fn new() -> Self {
        Self
    }

    /// Apply `state` relative to `main`
    ///
    /// No-op unless orientation, position or resolution differs from the
    /// baseline, so re-applying an unchanged state issues zero commands. On
    /// success the baseline is advanced to the request.
    ///
    /// # Errors
    ///
    /// Stops at the first failing command and returns
    /// [`DisplayError::CommandFailed`](crate::display::DisplayError::CommandFailed).
    /// Baseline fields for the failed stage are not advanced, so the same
    /// request can be retried.
    pub async fn apply(
        &self,
        backend: &dyn DisplayBackend,
        state: &mut DesiredLayoutState,
        main: &DisplayOutput,
        guard: &mut OrientationGuard,
    ) -> Result<ApplyOutcome> {
        if !state.has_changed() {
            debug!("Layout unchanged, nothing to apply");
            return Ok(ApplyOutcome::Unchanged);
        }

        let target = state
            .requested
            .display
            .clone()
            .unwrap_or_else(|| main.name.clone());
        let requested = state.requested.clone();

        let layout_changed = requested.position != state.baseline.position
            || requested.resolution != state.baseline.resolution;

        let mut commands = 0;
        if layout_changed {
            info!(
                "Applying layout to {}: position={:?}, resolution={:?}",
                target, requested.position, requested.resolution
            );

            backend
                .execute(&OutputCommand::SetMode {
                    output: target.clone(),
                    mode: ModeSelection::Auto,
                })
                .await?;
            commands += 1;

            match requested.position {
                Some(RelativePosition::SameAs) => {
                    backend
                        .execute(&OutputCommand::SetPosition {
                            output: target.clone(),
                            relation: RelativePosition::SameAs,
                            reference: main.name.clone(),
                        })
                        .await?;
                    commands += 1;
                }
                Some(relation) if relation.is_placeable() && target != main.name => {
                    backend
                        .execute(&OutputCommand::SetPosition {
                            output: target.clone(),
                            relation,
                            reference: main.name.clone(),
                        })
                        .await?;
                    commands += 1;
                }
                other => debug!("No placement for {} ({:?})", target, other),
            }

            if requested.resolution != state.baseline.resolution {
                if let Some(resolution) = requested.resolution {
                    backend
                        .execute(&OutputCommand::SetMode {
                            output: target.clone(),
                            mode: ModeSelection::Explicit(resolution),
                        })
                        .await?;
                    commands += 1;
                }
            }

            state.baseline.position = requested.position;
            state.baseline.resolution = requested.resolution;
        }

        let mut orientation = None;
        if requested.orientation != state.baseline.orientation {
            let outcome = guard
                .request(backend, &main.name, requested.orientation)
                .await?;
            state.baseline.orientation = requested.orientation;
            orientation = Some(outcome);
        }

        Ok(ApplyOutcome::Applied {
            commands,
            orientation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::backend::testing::ScriptedBackend;
    use crate::display::backend::DisplayBackend;
    use crate::display::types::{Orientation, Resolution};
    use crate::display::DisplayError;
    use async_trait::async_trait;
    use mockall::mock;

    mock! {
        Backend {}

        #[async_trait]
        impl DisplayBackend for Backend {
            async fn list_outputs(&self) -> Result<String>;
            async fn list_outputs_verbose(&self) -> Result<String>;
            async fn execute(&self, command: &OutputCommand) -> Result<()>;
        }
    }

    fn main_output() -> DisplayOutput {
        DisplayOutput::new("eDP-1")
            .with_geometry(1920, 1080, 0, 0)
            .as_primary()
    }

    fn dual_state() -> DesiredLayoutState {
        let mut state = DesiredLayoutState::capture(
            Orientation::Normal,
            Some(RelativePosition::RightOf),
            Some(Resolution::new(1920, 1080)),
        );
        state.requested.display = Some("HDMI-1".into());
        state
    }

    #[tokio::test]
    async fn test_unchanged_state_issues_no_commands() {
        let backend = ScriptedBackend::default();
        let mut guard = OrientationGuard::default();
        let mut state = dual_state();

        let outcome = LayoutApplier::new()
            .apply(&backend, &mut state, &main_output(), &mut guard)
            .await
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::Unchanged);
        assert!(backend.commands().is_empty());
    }

    #[tokio::test]
    async fn test_reapply_is_idempotent() {
        let backend = ScriptedBackend::default();
        let mut guard = OrientationGuard::default();
        let mut state = dual_state();
        state.requested.position = Some(RelativePosition::LeftOf);
        state.requested.resolution = Some(Resolution::new(1280, 720));
        state.requested.orientation = Orientation::Left;

        let applier = LayoutApplier::new();
        applier
            .apply(&backend, &mut state, &main_output(), &mut guard)
            .await
            .unwrap();
        backend.take_commands();

        for _ in 0..3 {
            let outcome = applier
                .apply(&backend, &mut state, &main_output(), &mut guard)
                .await
                .unwrap();
            assert_eq!(outcome, ApplyOutcome::Unchanged);
        }
        assert!(backend.commands().is_empty());
    }

    #[tokio::test]
    async fn test_command_order() {
        let backend = ScriptedBackend::default();
        let mut guard = OrientationGuard::default();
        let mut state = dual_state();
        state.requested.position = Some(RelativePosition::Above);
        state.requested.resolution = Some(Resolution::new(1280, 720));
        state.requested.orientation = Orientation::Right;

        let outcome = LayoutApplier::new()
            .apply(&backend, &mut state, &main_output(), &mut guard)
            .await
            .unwrap();

        assert_eq!(
            backend.commands(),
            vec![
                OutputCommand::SetMode {
                    output: "HDMI-1".into(),
                    mode: ModeSelection::Auto
                },
                OutputCommand::SetPosition {
                    output: "HDMI-1".into(),
                    relation: RelativePosition::Above,
                    reference: "eDP-1".into()
                },
                OutputCommand::SetMode {
                    output: "HDMI-1".into(),
                    mode: ModeSelection::Explicit(Resolution::new(1280, 720))
                },
                OutputCommand::SetRotation {
                    output: "eDP-1".into(),
                    orientation: Orientation::Right
                },
            ]
        );
        match outcome {
            ApplyOutcome::Applied {
                commands,
                orientation: Some(RequestOutcome::CountdownStarted { .. }),
            } => assert_eq!(commands, 3),
            other => panic!("unexpected {:?}", other),
        }
        assert!(guard.is_running());
        assert!(!state.has_changed());
    }

    #[tokio::test]
    async fn test_same_as_mirrors_primary() {
        let backend = ScriptedBackend::default();
        let mut guard = OrientationGuard::default();
        let mut state = dual_state();
        state.requested.position = Some(RelativePosition::SameAs);

        LayoutApplier::new()
            .apply(&backend, &mut state, &main_output(), &mut guard)
            .await
            .unwrap();

        assert_eq!(
            backend.commands(),
            vec![
                OutputCommand::SetMode {
                    output: "HDMI-1".into(),
                    mode: ModeSelection::Auto
                },
                OutputCommand::SetPosition {
                    output: "HDMI-1".into(),
                    relation: RelativePosition::SameAs,
                    reference: "eDP-1".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_orientation_only_change_leaves_layout_alone() {
        let backend = ScriptedBackend::default();
        let mut guard = OrientationGuard::default();
        let mut state = dual_state();
        state.requested.orientation = Orientation::Inverted;

        let outcome = LayoutApplier::new()
            .apply(&backend, &mut state, &main_output(), &mut guard)
            .await
            .unwrap();

        assert_eq!(
            backend.commands(),
            vec![OutputCommand::SetRotation {
                output: "eDP-1".into(),
                orientation: Orientation::Inverted
            }]
        );
        assert!(matches!(outcome, ApplyOutcome::Applied { commands: 0, .. }));
    }

    #[tokio::test]
    async fn test_unknown_relation_is_not_placed() {
        let backend = ScriptedBackend::default();
        let mut guard = OrientationGuard::default();
        let mut state = dual_state();
        state.requested.position = Some(RelativePosition::Unknown);

        LayoutApplier::new()
            .apply(&backend, &mut state, &main_output(), &mut guard)
            .await
            .unwrap();

        assert_eq!(
            backend.commands(),
            vec![OutputCommand::SetMode {
                output: "HDMI-1".into(),
                mode: ModeSelection::Auto
            }]
        );
    }

    #[tokio::test]
    async fn test_failure_is_reported_and_baseline_kept() {
        let mut backend = MockBackend::new();
        backend
            .expect_execute()
            .withf(|c| matches!(c, OutputCommand::SetMode { mode: ModeSelection::Auto, .. }))
            .times(2)
            .returning(|_| Ok(()));
        backend
            .expect_execute()
            .withf(|c| matches!(c, OutputCommand::SetPosition { .. }))
            .times(2)
            .returning(|c| {
                Err(DisplayError::CommandFailed {
                    action: c.action(),
                    output: c.output().to_string(),
                    message: "BadMatch".into(),
                })
            });

        let mut guard = OrientationGuard::default();
        let mut state = dual_state();
        state.requested.position = Some(RelativePosition::Below);
        let applier = LayoutApplier::new();

        let err = applier
            .apply(&backend, &mut state, &main_output(), &mut guard)
            .await
            .unwrap_err();
        assert_eq!(err.output(), Some("HDMI-1"));
        assert_eq!(state.baseline.position, Some(RelativePosition::RightOf));

        // Still pending, so a retry issues the sequence again
        assert!(state.has_changed());
        assert!(applier
            .apply(&backend, &mut state, &main_output(), &mut guard)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_primary_only_layout_skips_placement() {
        let backend = ScriptedBackend::default();
        let mut guard = OrientationGuard::default();
        let mut state = DesiredLayoutState::capture(Orientation::Normal, None, None);
        state.requested.resolution = Some(Resolution::new(1280, 720));

        LayoutApplier::new()
            .apply(&backend, &mut state, &main_output(), &mut guard)
            .await
            .unwrap();

        assert_eq!(
            backend.commands(),
            vec![
                OutputCommand::SetMode {
                    output: "eDP-1".into(),
                    mode: ModeSelection::Auto
                },
                OutputCommand::SetMode {
                    output: "eDP-1".into(),
                    mode: ModeSelection::Explicit(Resolution::new(1280, 720))
                },
            ]
        );
    }
}
