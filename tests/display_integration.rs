//! End-to-end tests of the public display API against an in-memory xrandr

use async_trait::async_trait;
use lamco_display_ctl::config::Config;
use lamco_display_ctl::display::{
    DisplayBackend, DisplayError, DisplaySession, InventoryReader, LayoutRequest, ModeSelection,
    Notification, Orientation, OutputCommand, PowerState, RelativePosition, Resolution,
    SessionObserver, XrandrBackend,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const LAPTOP_ONLY: &str = "\
Screen 0: minimum 320 x 200, current 1920 x 1080, maximum 16384 x 16384
eDP-1 connected primary 1920x1080+0+0 (normal left inverted right x axis y axis) 344mm x 194mm
   1920x1080     60.01*+  59.97
   1280x720      60.00
HDMI-1 disconnected (normal left inverted right x axis y axis)
";

const DOCKED: &str = "\
Screen 0: minimum 320 x 200, current 4480 x 1440, maximum 16384 x 16384
eDP-1 connected primary 1920x1080+2560+0 (normal left inverted right x axis y axis) 344mm x 194mm
   1920x1080     60.01*+  59.97
   1280x720      60.00
HDMI-1 connected 2560x1440+0+0 (normal left inverted right x axis y axis) 597mm x 336mm
   2560x1440     59.95*+
   1920x1080     60.00    50.00
   1280x720      60.00
";

const DOCKED_VERBOSE: &str = "\
Screen 0: minimum 320 x 200, current 4480 x 1440, maximum 16384 x 16384
eDP-1 connected primary 1920x1080+2560+0 (0x4a) left (normal left inverted right x axis y axis) 344mm x 194mm
\tIdentifier: 0x42
HDMI-1 connected 2560x1440+0+0 (0x50) normal (normal left inverted right x axis y axis) 597mm x 336mm
\tIdentifier: 0x43
";

/// Serves a mutable report pair and records commands
#[derive(Default)]
struct FakeXrandr {
    report: Mutex<(String, String)>,
    commands: Mutex<Vec<OutputCommand>>,
}

impl FakeXrandr {
    fn new(query: &str, verbose: &str) -> Arc<Self> {
        let fake = Arc::new(Self::default());
        fake.set_report(query, verbose);
        fake
    }

    fn set_report(&self, query: &str, verbose: &str) {
        *self.report.lock() = (query.to_string(), verbose.to_string());
    }

    fn take_commands(&self) -> Vec<OutputCommand> {
        std::mem::take(&mut *self.commands.lock())
    }
}

#[async_trait]
impl DisplayBackend for FakeXrandr {
    async fn list_outputs(&self) -> Result<String, DisplayError> {
        Ok(self.report.lock().0.clone())
    }

    async fn list_outputs_verbose(&self) -> Result<String, DisplayError> {
        Ok(self.report.lock().1.clone())
    }

    async fn execute(&self, command: &OutputCommand) -> Result<(), DisplayError> {
        command.to_xrandr_args()?;
        self.commands.lock().push(command.clone());
        Ok(())
    }
}

#[derive(Default)]
struct Notes(Mutex<Vec<String>>);

impl SessionObserver for Notes {
    fn on_notification(&self, notification: &Notification) {
        self.0.lock().push(notification.to_string());
    }
}

#[tokio::test]
async fn test_inventory_queries() {
    let fake = FakeXrandr::new(DOCKED, DOCKED_VERBOSE);
    let reader = InventoryReader::new(fake);

    let main = reader.main_display().await.unwrap().unwrap();
    assert_eq!(main, "eDP-1");
    assert_eq!(reader.external_displays(&main).await.unwrap(), vec!["HDMI-1"]);
    assert_eq!(
        reader.available_resolutions("HDMI-1").await.unwrap(),
        vec!["2560x1440", "1920x1080", "1280x720"]
    );
    assert_eq!(
        reader.current_mode("HDMI-1").await.unwrap(),
        Some(Resolution::new(2560, 1440))
    );
    assert!(reader.available_resolutions("DP-7").await.unwrap().is_empty());

    let snapshot = reader.read().await.unwrap();
    assert_eq!(snapshot.primary_output().unwrap().orientation, Orientation::Left);
}

#[tokio::test]
async fn test_laptop_only_has_no_external_displays() {
    let reader = InventoryReader::new(FakeXrandr::new(LAPTOP_ONLY, ""));
    assert!(reader.external_displays("eDP-1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_docked_session_starts_from_live_layout() {
    let fake = FakeXrandr::new(DOCKED, DOCKED_VERBOSE);
    let config = Config::default_config().unwrap();
    let session = DisplaySession::start(fake.clone(), &config.display, Arc::new(Notes::default()))
        .await
        .unwrap();

    let state = session.desired_state();
    assert_eq!(state.requested.orientation, Orientation::Left);
    assert_eq!(state.requested.display.as_deref(), Some("HDMI-1"));
    assert_eq!(state.requested.position, Some(RelativePosition::LeftOf));
    assert_eq!(state.requested.resolution, Some(Resolution::new(2560, 1440)));
    assert!(!state.has_changed());
}

#[tokio::test(start_paused = true)]
async fn test_dock_rotate_confirm_and_undock() {
    let fake = FakeXrandr::new(LAPTOP_ONLY, "");
    let notes = Arc::new(Notes::default());
    let config = Config::default_config().unwrap();

    let session = DisplaySession::start(fake.clone(), &config.display, notes.clone())
        .await
        .unwrap();
    assert!(fake.take_commands().is_empty());

    let (handle, session_loop) = session.into_runner();
    let task = tokio::spawn(session_loop);

    // Dock: picked up on the next poll
    fake.set_report(DOCKED, "");
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(
        fake.take_commands(),
        vec![OutputCommand::SetMode {
            output: "HDMI-1".into(),
            mode: ModeSelection::Auto
        }]
    );
    let state = handle.desired_state().await.unwrap();
    assert_eq!(state.requested.display.as_deref(), Some("HDMI-1"));
    assert_eq!(state.requested.resolution, Some(Resolution::new(2560, 1440)));

    // Move it above the laptop panel at a smaller mode
    let request = LayoutRequest {
        position: Some(RelativePosition::Above),
        resolution: Some(Resolution::new(1920, 1080)),
        ..state.requested.clone()
    };
    handle.apply(request.clone()).await.unwrap();
    assert_eq!(
        fake.take_commands(),
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
                mode: ModeSelection::Explicit(Resolution::new(1920, 1080))
            },
        ]
    );

    // Rotate the panel and keep it
    handle
        .apply(LayoutRequest {
            orientation: Orientation::Inverted,
            ..request
        })
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(4)).await;
    handle.confirm().await.unwrap();
    tokio::time::sleep(Duration::from_secs(15)).await;

    // Undock
    fake.set_report(LAPTOP_ONLY, "");
    tokio::time::sleep(Duration::from_secs(2)).await;

    handle.shutdown().await.unwrap();
    task.await.unwrap().unwrap();

    let commands = fake.take_commands();
    assert_eq!(
        commands,
        vec![
            OutputCommand::SetRotation {
                output: "eDP-1".into(),
                orientation: Orientation::Inverted
            },
            OutputCommand::SetPower {
                output: "HDMI-1".into(),
                state: PowerState::Off
            },
        ]
    );

    let notes = notes.0.lock().clone();
    assert_eq!(
        notes,
        vec![
            "Orientation changed to inverted. Reverting in 10 seconds.".to_string(),
            "Orientation set to inverted permanently.".to_string(),
            "Display HDMI-1 disconnected and turned off.".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_configured_missing_binary_fails_query() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "[display]\nxrandr_path = \"/nonexistent/xrandr\"\ncommand_timeout_ms = 500\n",
    )
    .unwrap();

    let config = Config::load(&path).unwrap();
    let backend = Arc::new(XrandrBackend::from_config(&config.display));
    let result = DisplaySession::start(backend, &config.display, Arc::new(Notes::default())).await;
    assert!(matches!(result, Err(DisplayError::QueryFailed(_))));
}
