//! Relative difference between an analysis and a reference configuration
//!
//! Values are signed so that a positive percentage always means the analysis
//! verifies better than the reference, whatever the statistic's orientation.

use crate::plot::colorbar::{ColorBar, Palette};

/// Cells where either value is this close to zero (in the statistic's own
/// units) are left missing.
pub const NEAR_ZERO: f64 = 0.1;

/// Fixed breakpoint ladder of the diverging colour bar, in percent.
pub const LADDER: [f64; 10] = [-100.0, -50.0, -25.0, -15.0, -0.1, 0.1, 15.0, 25.0, 50.0, 100.0];

/// Statistics where smaller is better.
pub const ERROR_POSITIVE_STATS: &[&str] = &[
    "RMSE", "MSE", "BCMSE", "MAE", "ESTDEV", "FBS", "MAD", "IQR", "E10", "E25", "E50", "E75",
    "E90",
];

/// Whether larger values of a statistic mean a better forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    SkillPositive,
    ErrorPositive,
}

impl Orientation {
    pub fn of(stat: &str) -> Self {
        let base = stat
            .strip_suffix("_BCL")
            .or_else(|| stat.strip_suffix("_BCU"))
            .or_else(|| stat.strip_suffix("_NCL"))
            .or_else(|| stat.strip_suffix("_NCU"))
            .unwrap_or(stat);
        if ERROR_POSITIVE_STATS.contains(&base.to_ascii_uppercase().as_str()) {
            Orientation::ErrorPositive
        } else {
            Orientation::SkillPositive
        }
    }
}

/// `100 (A - R) / R` for skill-positive statistics, `100 (R - A) / R` for
/// error-positive ones. `None` when either value is missing or near zero.
pub fn relative_difference(analysis: f64, reference: f64, orientation: Orientation) -> Option<f64> {
    if analysis.is_nan()
        || reference.is_nan()
        || analysis.abs() <= NEAR_ZERO
        || reference.abs() <= NEAR_ZERO
    {
        return None;
    }
    let diff = match orientation {
        Orientation::SkillPositive => analysis - reference,
        Orientation::ErrorPositive => reference - analysis,
    };
    Some(100.0 * diff / reference)
}

/// Diverging colour bar over [`LADDER`]. When any value lies beyond
/// +/-100 % an overflow bin is added at each end, reaching the next
/// multiple of 50 above the largest magnitude.
pub fn diverging_colorbar(values: &[f64]) -> ColorBar {
    let extent = values
        .iter()
        .filter(|v| v.is_finite())
        .fold(0.0_f64, |acc, v| acc.max(v.abs()));
    let mut bounds = LADDER.to_vec();
    if extent > 100.0 {
        let edge = (extent / 50.0).ceil() * 50.0;
        let edge = if edge > 100.0 { edge } else { 150.0 };
        bounds.insert(0, -edge);
        bounds.push(edge);
    }
    let colors = Palette::RdBu.colors(bounds.len() - 1);
    ColorBar {
        bounds,
        colors,
        labels: Vec::new(),
    }
}

/// Bin of the diverging bar holding zero (no change).
pub fn neutral_bin(colorbar: &ColorBar) -> usize {
    colorbar.bin(0.0).unwrap_or(0)
}

/// Whether `value` falls in the skill-gain half of a diverging bar.
pub fn is_skill_gain(colorbar: &ColorBar, value: f64) -> bool {
    colorbar
        .bin(value)
        .map_or(false, |b| b > neutral_bin(colorbar))
}
