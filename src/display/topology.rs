//! Topology Calculator
//!
//! Classifies where a secondary output sits relative to the primary.

use crate::display::types::{DisplayOutput, RelativePosition};

/// Classify `secondary` against `primary`
///
/// An identical origin is same-as whatever the resolutions. Otherwise rules
/// are evaluated in order: fully right, fully left, fully above, fully
/// below, otherwise unknown. An output without a known resolution and a
/// different origin classifies as unknown.
pub fn classify(primary: &DisplayOutput, secondary: &DisplayOutput) -> RelativePosition {
    if primary.position == secondary.position {
        return RelativePosition::SameAs;
    }

    let (Some(p_res), Some(s_res)) = (primary.resolution, secondary.resolution) else {
        return RelativePosition::Unknown;
    };

    // i64 so offsets near i32::MAX cannot overflow
    let (px, py) = (primary.position.x as i64, primary.position.y as i64);
    let (pw, ph) = (p_res.width as i64, p_res.height as i64);
    let (sx, sy) = (secondary.position.x as i64, secondary.position.y as i64);
    let (sw, sh) = (s_res.width as i64, s_res.height as i64);

    if sx >= px + pw {
        RelativePosition::RightOf
    } else if sx + sw <= px {
        RelativePosition::LeftOf
    } else if sy + sh <= py {
        RelativePosition::Above
    } else if sy >= py + ph {
        RelativePosition::Below
    } else {
        RelativePosition::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::types::Position;
    use proptest::prelude::*;

    fn output(name: &str, w: u32, h: u32, x: i32, y: i32) -> DisplayOutput {
        DisplayOutput::new(name).with_geometry(w, h, x, y)
    }

    #[test]
    fn test_side_by_side() {
        let primary = output("eDP-1", 1920, 1080, 0, 0);
        assert_eq!(
            classify(&primary, &output("HDMI-1", 1920, 1080, 1920, 0)),
            RelativePosition::RightOf
        );
        assert_eq!(
            classify(&primary, &output("HDMI-1", 1280, 1024, -1280, 0)),
            RelativePosition::LeftOf
        );
    }

    #[test]
    fn test_stacked() {
        let primary = output("eDP-1", 1920, 1080, 0, 1080);
        assert_eq!(
            classify(&primary, &output("HDMI-1", 1920, 1080, 0, 0)),
            RelativePosition::Above
        );
        assert_eq!(
            classify(&primary, &output("HDMI-1", 1920, 1080, 0, 2160)),
            RelativePosition::Below
        );
    }

    #[test]
    fn test_mirrored() {
        let primary = output("eDP-1", 1920, 1080, 0, 0);
        assert_eq!(
            classify(&primary, &output("HDMI-1", 1280, 720, 0, 0)),
            RelativePosition::SameAs
        );
    }

    #[test]
    fn test_overlap_is_unknown() {
        let primary = output("eDP-1", 1920, 1080, 0, 0);
        assert_eq!(
            classify(&primary, &output("HDMI-1", 1920, 1080, 100, 100)),
            RelativePosition::Unknown
        );
    }

    #[test]
    fn test_missing_resolution_is_unknown() {
        let primary = output("eDP-1", 1920, 1080, 0, 0);
        let mut undriven = DisplayOutput::new("HDMI-1");
        undriven.position = Position::new(1920, 0);
        assert_eq!(classify(&primary, &undriven), RelativePosition::Unknown);
    }

    #[test]
    fn test_identical_origin_without_resolution_is_same_as() {
        let primary = output("eDP-1", 1920, 1080, 0, 0);
        let undriven = DisplayOutput::new("HDMI-1");
        assert_eq!(classify(&primary, &undriven), RelativePosition::SameAs);
        assert_eq!(
            classify(&DisplayOutput::new("eDP-1"), &undriven),
            RelativePosition::SameAs
        );
    }

    #[test]
    fn test_right_takes_precedence_over_below() {
        // Diagonal placement satisfies both; horizontal rules win
        let primary = output("eDP-1", 1920, 1080, 0, 0);
        assert_eq!(
            classify(&primary, &output("HDMI-1", 1920, 1080, 1920, 1080)),
            RelativePosition::RightOf
        );
    }

    proptest! {
        #[test]
        fn prop_right_of(
            px in -5000i32..5000, py in -5000i32..5000,
            pw in 1u32..8000, ph in 1u32..8000,
            gap in 0i32..5000, sy in -5000i32..5000,
            sw in 1u32..8000, sh in 1u32..8000,
        ) {
            let primary = output("p", pw, ph, px, py);
            let secondary = output("s", sw, sh, px + pw as i32 + gap, sy);
            prop_assert_eq!(classify(&primary, &secondary), RelativePosition::RightOf);
        }

        #[test]
        fn prop_left_of(
            px in -5000i32..5000, py in -5000i32..5000,
            pw in 1u32..8000, ph in 1u32..8000,
            gap in 0i32..5000, sy in -5000i32..5000,
            sw in 1u32..8000, sh in 1u32..8000,
        ) {
            let primary = output("p", pw, ph, px, py);
            let secondary = output("s", sw, sh, px - sw as i32 - gap, sy);
            prop_assert_eq!(classify(&primary, &secondary), RelativePosition::LeftOf);
        }

        #[test]
        fn prop_above(
            px in -5000i32..5000, py in -5000i32..5000,
            pw in 1u32..8000, ph in 1u32..8000,
            dx in 0u32..8000, gap in 0i32..5000,
            sw in 1u32..8000, sh in 1u32..8000,
        ) {
            // Horizontally overlapping so the left/right rules do not fire
            let sx = px + (dx % pw) as i32;
            let primary = output("p", pw, ph, px, py);
            let secondary = output("s", sw, sh, sx, py - sh as i32 - gap);
            prop_assert_eq!(classify(&primary, &secondary), RelativePosition::Above);
        }

        #[test]
        fn prop_below(
            px in -5000i32..5000, py in -5000i32..5000,
            pw in 1u32..8000, ph in 1u32..8000,
            dx in 0u32..8000, gap in 0i32..5000,
            sw in 1u32..8000, sh in 1u32..8000,
        ) {
            let sx = px + (dx % pw) as i32;
            let primary = output("p", pw, ph, px, py);
            let secondary = output("s", sw, sh, sx, py + ph as i32 + gap);
            prop_assert_eq!(classify(&primary, &secondary), RelativePosition::Below);
        }

        #[test]
        fn prop_same_origin_is_same_as(
            x in -5000i32..5000, y in -5000i32..5000,
            pw in 1u32..8000, ph in 1u32..8000,
            sw in 1u32..8000, sh in 1u32..8000,
        ) {
            let primary = output("p", pw, ph, x, y);
            let secondary = output("s", sw, sh, x, y);
            prop_assert_eq!(classify(&primary, &secondary), RelativePosition::SameAs);
        }
    }
}
