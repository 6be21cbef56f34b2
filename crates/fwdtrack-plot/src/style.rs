use fwdtrack_core::{Binning, TrackVariable};
use plotters::style::{HSLColor, RGBColor, BLUE, RED};

/// Size of single-chart images.
pub const PLOT_SIZE: (u32, u32) = (800, 600);
/// Size of multi-panel images.
pub const PANEL_SIZE: (u32, u32) = (1200, 1000);
/// Size of heat-map images, including the color scale.
pub const MAP_SIZE: (u32, u32) = (900, 650);
/// Width reserved for the color scale of a heat map.
pub const COLOR_SCALE_WIDTH: u32 = 110;

/// Font family of every caption and label.
pub const FONT: &str = "sans-serif";
/// Caption size of single-chart images.
pub const TITLE_SIZE: u32 = 24;
/// Caption size of each panel in a multi-panel image.
pub const PANEL_TITLE_SIZE: u32 = 18;

/// Color of efficiency curves.
pub const EFFICIENCY_COLOR: RGBColor = BLUE;
/// Color of purity curves.
pub const PURITY_COLOR: RGBColor = RED;

/// Upper edge of every ratio axis.
pub const RATIO_MAX: f64 = 1.05;

/// `true` if `variable` is drawn on a logarithmic axis.
pub fn is_log_axis(variable: TrackVariable) -> bool {
    variable == TrackVariable::Pt
}

/// The drawn extent of `binning`. A logarithmic axis starting at or below zero is moved up
/// to a fraction of the first positive edge.
pub fn axis_extent(binning: &Binning, log: bool) -> (f64, f64) {
    let (min, max) = binning.limits();
    if !log || min > 0.0 {
        return (min, max);
    }
    let floor = binning
        .bin_edges()
        .into_iter()
        .find(|edge| *edge > 0.0)
        .map_or(1e-3, |edge| 0.4 * edge);
    (floor, max.max(10.0 * floor))
}

/// Blue (0) to red (1) color of a ratio in a heat map. Values are clamped to `[0, 1]`.
pub fn heat_color(value: f64) -> HSLColor {
    let value = if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    };
    HSLColor((1.0 - value) * 240.0 / 360.0, 0.85, 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_extent_is_the_binning() {
        let binning = Binning::uniform(10, -3.6, -2.5);
        assert_eq!(axis_extent(&binning, false), (-3.6, -2.5));
    }

    #[test]
    fn test_log_extent_skips_zero() {
        let binning = Binning::edges([0.0, 0.5, 1.0, 5.0]);
        let (min, max) = axis_extent(&binning, true);
        assert!(min > 0.0 && min < 0.5);
        assert_eq!(max, 5.0);
        let positive = Binning::edges([0.5, 1.0, 5.0]);
        assert_eq!(axis_extent(&positive, true), (0.5, 5.0));
    }

    #[test]
    fn test_heat_color_is_clamped() {
        assert_eq!(heat_color(-1.0).0, heat_color(0.0).0);
        assert_eq!(heat_color(2.0).0, 0.0);
        assert_eq!(heat_color(f64::NAN).0, heat_color(0.0).0);
        assert!(is_log_axis(TrackVariable::Pt));
        assert!(!is_log_axis(TrackVariable::Eta));
    }
}
