//! Display Topology Types
//!
//! Strongly-typed records produced by the inventory parser. Nothing past the
//! parser ever sees raw xrandr text.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::display::topology::classify;
use crate::display::DisplayError;

/// Output dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Resolution {
    /// Create a new resolution
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = DisplayError;

    /// Parses the strict `WIDTHxHEIGHT` form. Interlaced or annotated modes
    /// such as `1920x1080i` are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .trim()
            .split_once('x')
            .ok_or_else(|| DisplayError::ParseAmbiguous(format!("not a resolution: {s}")))?;

        let parse = |part: &str| -> Result<u32, DisplayError> {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(DisplayError::ParseAmbiguous(format!("not a resolution: {s}")));
            }
            part.parse()
                .map_err(|_| DisplayError::ParseAmbiguous(format!("resolution out of range: {s}")))
        };

        Ok(Self::new(parse(w)?, parse(h)?))
    }
}

/// Top-left offset in the virtual screen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// X offset in pixels (may be negative)
    pub x: i32,
    /// Y offset in pixels (may be negative)
    pub y: i32,
}

impl Position {
    /// Create a new position
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Rotation of an output's image
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Unrotated
    #[default]
    Normal,
    /// Rotated 90° counter-clockwise
    Left,
    /// Rotated 90° clockwise
    Right,
    /// Rotated 180°
    Inverted,
}

impl Orientation {
    /// All orientations in selector order
    pub const ALL: [Orientation; 4] = [
        Orientation::Normal,
        Orientation::Left,
        Orientation::Right,
        Orientation::Inverted,
    ];

    /// Keyword used by xrandr for this orientation
    pub fn as_str(self) -> &'static str {
        match self {
            Orientation::Normal => "normal",
            Orientation::Left => "left",
            Orientation::Right => "right",
            Orientation::Inverted => "inverted",
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Orientation {
    type Err = DisplayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(Orientation::Normal),
            "left" => Ok(Orientation::Left),
            "right" => Ok(Orientation::Right),
            "inverted" => Ok(Orientation::Inverted),
            other => Err(DisplayError::InvalidRequest(format!(
                "unknown orientation: {other}"
            ))),
        }
    }
}

/// Spatial relationship of a secondary output to the primary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelativePosition {
    /// Left edge at or past the primary's right edge
    RightOf,
    /// Right edge at or before the primary's left edge
    LeftOf,
    /// Bottom edge at or above the primary's top edge
    Above,
    /// Top edge at or below the primary's bottom edge
    Below,
    /// Same origin (mirrored)
    SameAs,
    /// Overlapping without a clean axis relation
    Unknown,
}

impl RelativePosition {
    /// Positions a user may request
    pub const SELECTABLE: [RelativePosition; 5] = [
        RelativePosition::RightOf,
        RelativePosition::LeftOf,
        RelativePosition::Above,
        RelativePosition::Below,
        RelativePosition::SameAs,
    ];

    /// Relation keyword, also the xrandr flag without leading dashes
    pub fn as_str(self) -> &'static str {
        match self {
            RelativePosition::RightOf => "right-of",
            RelativePosition::LeftOf => "left-of",
            RelativePosition::Above => "above",
            RelativePosition::Below => "below",
            RelativePosition::SameAs => "same-as",
            RelativePosition::Unknown => "unknown",
        }
    }

    /// Whether a layout command can express this relation
    pub fn is_placeable(self) -> bool {
        self != RelativePosition::Unknown
    }
}

impl fmt::Display for RelativePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelativePosition {
    type Err = DisplayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "right-of" => Ok(RelativePosition::RightOf),
            "left-of" => Ok(RelativePosition::LeftOf),
            "above" => Ok(RelativePosition::Above),
            "below" => Ok(RelativePosition::Below),
            "same-as" => Ok(RelativePosition::SameAs),
            "unknown" => Ok(RelativePosition::Unknown),
            other => Err(DisplayError::InvalidRequest(format!(
                "unknown relative position: {other}"
            ))),
        }
    }
}

/// One display port as reported by the display-configuration utility
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayOutput {
    /// Port label (e.g. "eDP-1", "HDMI-1")
    pub name: String,

    /// A monitor is attached
    pub connected: bool,

    /// Explicitly marked primary by the utility
    pub primary: bool,

    /// Active geometry size, None when the output is not driven
    pub resolution: Option<Resolution>,

    /// Top-left offset in the virtual screen
    pub position: Position,

    /// Candidate modes in report order, deduplicated
    pub available_resolutions: Vec<Resolution>,

    /// Mode flagged active in the candidate list
    pub current_mode: Option<Resolution>,

    /// Current rotation
    pub orientation: Orientation,
}

impl DisplayOutput {
    /// Create a connected, undriven output with no modes
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            connected: true,
            primary: false,
            resolution: None,
            position: Position::default(),
            available_resolutions: Vec::new(),
            current_mode: None,
            orientation: Orientation::Normal,
        }
    }

    /// Set geometry (builder style)
    pub fn with_geometry(mut self, width: u32, height: u32, x: i32, y: i32) -> Self {
        self.resolution = Some(Resolution::new(width, height));
        self.position = Position::new(x, y);
        self
    }

    /// Mark as primary (builder style)
    pub fn as_primary(mut self) -> Self {
        self.primary = true;
        self
    }
}

/// Result of one inventory read. Re-derived on every read, never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologySnapshot {
    /// Primary output name, None if no output is connected
    pub primary: Option<String>,

    /// Connected non-primary outputs, in report order
    pub secondary: Vec<String>,

    /// Every output in report order, connected or not
    pub outputs: Vec<DisplayOutput>,
}

impl TopologySnapshot {
    /// Look up an output by name
    pub fn output(&self, name: &str) -> Option<&DisplayOutput> {
        self.outputs.iter().find(|o| o.name == name)
    }

    /// Primary output record
    pub fn primary_output(&self) -> Option<&DisplayOutput> {
        self.primary.as_deref().and_then(|name| self.output(name))
    }

    /// Secondary name to record mapping
    pub fn secondary_outputs(&self) -> HashMap<&str, &DisplayOutput> {
        self.secondary
            .iter()
            .filter_map(|name| self.output(name).map(|o| (name.as_str(), o)))
            .collect()
    }

    /// First secondary by report order, the one automatic actions apply to
    pub fn first_secondary(&self) -> Option<&DisplayOutput> {
        self.secondary.first().and_then(|name| self.output(name))
    }

    /// Placement of `secondary` relative to `primary`
    ///
    /// An output that is missing or not driven has no geometry in the
    /// report and is unknown.
    pub fn placement(&self, primary: &str, secondary: &str) -> RelativePosition {
        match (self.output(primary), self.output(secondary)) {
            (Some(p), Some(s)) if p.resolution.is_some() && s.resolution.is_some() => {
                classify(p, s)
            }
            _ => RelativePosition::Unknown,
        }
    }
}

/// Values a layout change is compared against
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayoutBaseline {
    /// Last applied orientation of the primary
    pub orientation: Orientation,
    /// Last applied relation of the tracked secondary
    pub position: Option<RelativePosition>,
    /// Last applied mode of the tracked output
    pub resolution: Option<Resolution>,
}

/// What the user last asked for
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayoutRequest {
    /// Output being configured, None means the primary
    pub display: Option<String>,
    /// Requested orientation of the primary
    pub orientation: Orientation,
    /// Requested relation to the primary
    pub position: Option<RelativePosition>,
    /// Requested mode, None means auto
    pub resolution: Option<Resolution>,
}

/// Session-wide desired layout plus the baseline used for change detection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredLayoutState {
    /// Current request
    pub requested: LayoutRequest,
    /// Last applied values
    pub baseline: LayoutBaseline,
}

impl DesiredLayoutState {
    /// Start a session with request and baseline both equal to what is live
    pub fn capture(
        orientation: Orientation,
        position: Option<RelativePosition>,
        resolution: Option<Resolution>,
    ) -> Self {
        Self {
            requested: LayoutRequest {
                display: None,
                orientation,
                position,
                resolution,
            },
            baseline: LayoutBaseline {
                orientation,
                position,
                resolution,
            },
        }
    }

    /// True when any of orientation, position or resolution differs from
    /// the baseline
    pub fn has_changed(&self) -> bool {
        self.requested.orientation != self.baseline.orientation
            || self.requested.position != self.baseline.position
            || self.requested.resolution != self.baseline.resolution
    }

    /// Drop every secondary-display selection, keeping orientation
    pub fn reset_to_primary(&mut self) {
        self.requested.display = None;
        self.requested.position = None;
        self.requested.resolution = None;
        self.baseline.position = None;
        self.baseline.resolution = None;
    }

    /// Whether the state is the primary-only default
    pub fn is_primary_only(&self) -> bool {
        self.requested.display.is_none()
            && self.requested.position.is_none()
            && self.requested.resolution.is_none()
            && self.baseline.position.is_none()
            && self.baseline.resolution.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_parse_strict() {
        assert_eq!("1920x1080".parse::<Resolution>().unwrap(), Resolution::new(1920, 1080));
        assert!("1920x1080i".parse::<Resolution>().is_err());
        assert!("x1080".parse::<Resolution>().is_err());
        assert!("60.00*+".parse::<Resolution>().is_err());
    }

    #[test]
    fn test_orientation_round_trips_through_keyword() {
        for o in Orientation::ALL {
            assert_eq!(o.as_str().parse::<Orientation>().unwrap(), o);
        }
        assert!("sideways".parse::<Orientation>().is_err());
    }

    #[test]
    fn test_relative_position_keywords() {
        assert_eq!("same-as".parse::<RelativePosition>().unwrap(), RelativePosition::SameAs);
        assert_eq!(RelativePosition::LeftOf.to_string(), "left-of");
        assert!(!RelativePosition::Unknown.is_placeable());
    }

    #[test]
    fn test_desired_state_change_detection() {
        let mut state = DesiredLayoutState::capture(
            Orientation::Normal,
            Some(RelativePosition::RightOf),
            Some(Resolution::new(1920, 1080)),
        );
        assert!(!state.has_changed());

        state.requested.resolution = Some(Resolution::new(1280, 720));
        assert!(state.has_changed());

        state.reset_to_primary();
        assert!(state.is_primary_only());
        assert!(!state.has_changed());
    }

    #[test]
    fn test_snapshot_lookup() {
        let snapshot = TopologySnapshot {
            primary: Some("eDP-1".into()),
            secondary: vec!["HDMI-1".into()],
            outputs: vec![
                DisplayOutput::new("eDP-1").with_geometry(1920, 1080, 0, 0).as_primary(),
                DisplayOutput::new("HDMI-1").with_geometry(1920, 1080, 1920, 0),
            ],
        };

        assert_eq!(snapshot.primary_output().unwrap().name, "eDP-1");
        assert_eq!(snapshot.first_secondary().unwrap().name, "HDMI-1");
        assert_eq!(snapshot.secondary_outputs().len(), 1);
        assert!(snapshot.output("DP-1").is_none());
    }

    #[test]
    fn test_snapshot_placement() {
        let snapshot = TopologySnapshot {
            primary: Some("eDP-1".into()),
            secondary: vec!["HDMI-1".into(), "DP-1".into()],
            outputs: vec![
                DisplayOutput::new("eDP-1").with_geometry(1920, 1080, 0, 0).as_primary(),
                DisplayOutput::new("HDMI-1").with_geometry(2560, 1440, 1920, 0),
                DisplayOutput::new("DP-1"),
            ],
        };

        assert_eq!(snapshot.placement("eDP-1", "HDMI-1"), RelativePosition::RightOf);
        // Undriven: no geometry in the report, even though its origin defaults to 0,0
        assert_eq!(snapshot.placement("eDP-1", "DP-1"), RelativePosition::Unknown);
        assert_eq!(snapshot.placement("eDP-1", "VGA-1"), RelativePosition::Unknown);
    }
}
