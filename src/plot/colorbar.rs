//! Colour-bar selection
//!
//! A colour bar is described either explicitly (boundaries, bin labels and a
//! palette) or implicitly (a bin count, optional limits, an optional
//! percentile). Resolution against the plotted values turns either form into
//! a [`ColorBar`]: concrete boundaries and one colour per bin. Layout code
//! only ever sees the resolved form.

use crate::errors::{Result, VerifError};
use plotters::style::RGBColor;
use serde::Deserialize;

/// Named palettes; each maps a bin count to that many colours.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Palette {
    Viridis,
    Blues,
    YlGnBu,
    Greys,
    /// Diverging red (low) to blue (high).
    RdBu,
    /// Diverging brown (low) to teal (high).
    BrBG,
}

impl Palette {
    fn stops(self) -> &'static [(u8, u8, u8)] {
        match self {
            Palette::Viridis => &[
                (68, 1, 84),
                (59, 82, 139),
                (33, 145, 140),
                (94, 201, 98),
                (253, 231, 37),
            ],
            Palette::Blues => &[(247, 251, 255), (158, 202, 225), (66, 146, 198), (8, 48, 107)],
            Palette::YlGnBu => &[(255, 255, 217), (161, 218, 180), (65, 182, 196), (37, 52, 148)],
            Palette::Greys => &[(255, 255, 255), (150, 150, 150), (0, 0, 0)],
            Palette::RdBu => &[
                (103, 0, 31),
                (214, 96, 77),
                (247, 247, 247),
                (67, 147, 195),
                (5, 48, 97),
            ],
            Palette::BrBG => &[
                (84, 48, 5),
                (191, 129, 45),
                (245, 245, 245),
                (53, 151, 143),
                (0, 60, 48),
            ],
        }
    }

    /// `n` colours sampled evenly along the palette.
    pub fn colors(self, n: usize) -> Vec<RGBColor> {
        let stops = self.stops();
        (0..n)
            .map(|i| {
                let t = if n <= 1 { 0.5 } else { i as f64 / (n - 1) as f64 };
                interpolate(stops, t)
            })
            .collect()
    }
}

fn interpolate(stops: &[(u8, u8, u8)], t: f64) -> RGBColor {
    let scaled = t.clamp(0.0, 1.0) * (stops.len() - 1) as f64;
    let lo = (scaled.floor() as usize).min(stops.len() - 1);
    let hi = (lo + 1).min(stops.len() - 1);
    let frac = scaled - lo as f64;
    let mix = |a: u8, b: u8| (f64::from(a) + (f64::from(b) - f64::from(a)) * frac).round() as u8;
    RGBColor(
        mix(stops[lo].0, stops[hi].0),
        mix(stops[lo].1, stops[hi].1),
        mix(stops[lo].2, stops[hi].2),
    )
}

/// Colour-bar descriptor as written in a plot request.
#[derive(Clone, PartialEq, Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColorBarSpec {
    /// Caller-supplied boundaries (n + 1) and bin labels (n).
    Explicit {
        bounds: Vec<f64>,
        #[serde(default)]
        labels: Vec<String>,
        palette: Palette,
    },
    /// `count` evenly spaced bins between `min` and `max`. Missing limits
    /// come from the (alpha/2, 100 - alpha/2) percentiles of the data, or
    /// its extremes when `alpha` is absent.
    Implicit {
        count: usize,
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
        #[serde(default)]
        alpha: Option<f64>,
        palette: Palette,
    },
}

impl ColorBarSpec {
    pub fn check(&self) -> Result<()> {
        match self {
            ColorBarSpec::Explicit { bounds, labels, .. } => {
                if bounds.len() < 2 {
                    return Err(VerifError::config(
                        "colorbar bounds",
                        format!("{:?}", bounds),
                        "need at least two boundaries",
                    ));
                }
                if bounds.windows(2).any(|w| w[0] >= w[1]) {
                    return Err(VerifError::config(
                        "colorbar bounds",
                        format!("{:?}", bounds),
                        "must be strictly increasing",
                    ));
                }
                if !labels.is_empty() && labels.len() != bounds.len() - 1 {
                    return Err(VerifError::config(
                        "colorbar labels",
                        labels.len(),
                        format!("expected {} labels for {} boundaries", bounds.len() - 1, bounds.len()),
                    ));
                }
            }
            ColorBarSpec::Implicit {
                count,
                min,
                max,
                alpha,
                ..
            } => {
                if *count == 0 {
                    return Err(VerifError::config("colorbar count", count, "must be positive"));
                }
                if let (Some(lo), Some(hi)) = (min, max) {
                    if lo >= hi {
                        return Err(VerifError::config(
                            "colorbar min",
                            lo,
                            format!("must be below max {}", hi),
                        ));
                    }
                }
                if let Some(a) = alpha {
                    if !(*a > 0.0 && *a < 100.0) {
                        return Err(VerifError::config("colorbar alpha", a, "must lie in (0, 100)"));
                    }
                }
            }
        }
        Ok(())
    }

    /// Resolves the descriptor against the values to be drawn (NaN ignored).
    pub fn resolve(&self, values: &[f64]) -> Result<ColorBar> {
        self.check()?;
        match self {
            ColorBarSpec::Explicit {
                bounds,
                labels,
                palette,
            } => Ok(ColorBar {
                bounds: bounds.clone(),
                colors: palette.colors(bounds.len() - 1),
                labels: labels.clone(),
            }),
            ColorBarSpec::Implicit {
                count,
                min,
                max,
                alpha,
                palette,
            } => {
                let mut finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
                finite.sort_by(f64::total_cmp);
                let (lo_pct, hi_pct) = match alpha {
                    Some(a) => (a / 2.0, 100.0 - a / 2.0),
                    None => (0.0, 100.0),
                };
                let lo = match min {
                    Some(v) => *v,
                    None => percentile_sorted(&finite, lo_pct).ok_or_else(|| {
                        VerifError::Data("no finite values to derive colour-bar minimum".to_string())
                    })?,
                };
                let hi = match max {
                    Some(v) => *v,
                    None => percentile_sorted(&finite, hi_pct).ok_or_else(|| {
                        VerifError::Data("no finite values to derive colour-bar maximum".to_string())
                    })?,
                };
                let (lo, hi) = if lo < hi { (lo, hi) } else { (lo - 0.5, lo + 0.5) };
                Ok(ColorBar {
                    bounds: linspace(lo, hi, count + 1),
                    colors: palette.colors(*count),
                    labels: Vec::new(),
                })
            }
        }
    }
}

/// Linear-interpolated percentile (`0 <= pct <= 100`) of ascending values.
pub fn percentile_sorted(sorted: &[f64], pct: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = (pct / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64))
}

pub fn linspace(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![lo],
        _ => (0..n)
            .map(|i| lo + (hi - lo) * i as f64 / (n - 1) as f64)
            .collect(),
    }
}

/// A resolved colour bar: `bounds.len() == colors.len() + 1`.
#[derive(Clone, PartialEq, Debug)]
pub struct ColorBar {
    pub bounds: Vec<f64>,
    pub colors: Vec<RGBColor>,
    /// Per-bin labels; empty means label the boundaries.
    pub labels: Vec<String>,
}

impl ColorBar {
    pub fn bins(&self) -> usize {
        self.colors.len()
    }

    /// Bin holding `value`. Values beyond the ends fall into the end bins;
    /// NaN has no bin.
    pub fn bin(&self, value: f64) -> Option<usize> {
        if value.is_nan() || self.colors.is_empty() {
            return None;
        }
        let inner = &self.bounds[1..self.bounds.len() - 1];
        Some(inner.iter().take_while(|b| value >= **b).count())
    }

    pub fn color(&self, value: f64) -> Option<RGBColor> {
        self.bin(value).map(|b| self.colors[b])
    }

    /// Boundary tick labels, trimmed of trailing zeros.
    pub fn bound_labels(&self) -> Vec<String> {
        self.bounds.iter().map(|b| format_tick(*b)).collect()
    }
}

/// Compact number formatting for ticks and cell annotations.
pub fn format_tick(value: f64) -> String {
    let text = format!("{:.2}", value);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" {
        "0".to_string()
    } else {
        text.to_string()
    }
}
