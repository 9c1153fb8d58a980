//! Figure models
//!
//! Each plot kind is first built as one of these plain structures and only
//! then handed to the renderer, so everything a figure shows (panels, lines,
//! markers, ticks, cells, colour bar) can be inspected without drawing.

use crate::plot::colorbar::ColorBar;
use ndarray::Array2;
use plotters::style::{Color, HSLColor, RGBColor};

/// Regular polygon marker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Marker {
    pub sides: u32,
    pub rotation_deg: f64,
}

impl Marker {
    /// Marker of the `index`-th line (0-based): a polygon with
    /// `index + 3` sides, so the first line gets a triangle.
    pub fn for_line(index: usize) -> Self {
        Marker {
            sides: index as u32 + 3,
            rotation_deg: 0.0,
        }
    }

    /// Vertex offsets in pixels around the marker centre.
    pub fn vertices(&self, radius: f64) -> Vec<(i32, i32)> {
        let sides = self.sides.max(3);
        (0..sides)
            .map(|k| {
                let angle = (self.rotation_deg - 90.0).to_radians()
                    + 2.0 * std::f64::consts::PI * f64::from(k) / f64::from(sides);
                (
                    (radius * angle.cos()).round() as i32,
                    (radius * angle.sin()).round() as i32,
                )
            })
            .collect()
    }
}

/// Colour of line `index` out of `count`, evenly spaced in hue.
pub fn line_color(index: usize, count: usize) -> RGBColor {
    let hue = index as f64 / count.max(1) as f64;
    let (r, g, b) = HSLColor(hue, 0.65, 0.45).rgb();
    RGBColor(r, g, b)
}

/// One plotted line with an optional confidence band.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub label: String,
    pub color: RGBColor,
    pub marker: Marker,
    /// (lead hours, value)
    pub points: Vec<(f64, f64)>,
    /// (lead hours, lower, upper)
    pub band: Vec<(f64, f64, f64)>,
}

impl Line {
    /// Splits the points into runs over consecutive `ticks`, so a missing
    /// lead breaks the line instead of being bridged.
    pub fn segments(&self, ticks: &[u32]) -> Vec<Vec<(f64, f64)>> {
        runs(&self.points, |p| p.0, ticks)
    }

    /// Band points split the same way as [`Line::segments`].
    pub fn band_segments(&self, ticks: &[u32]) -> Vec<Vec<(f64, f64, f64)>> {
        runs(&self.band, |b| b.0, ticks)
    }
}

fn runs<T: Copy>(items: &[T], lead: impl Fn(&T) -> f64, ticks: &[u32]) -> Vec<Vec<T>> {
    let position = |x: f64| ticks.iter().position(|t| f64::from(*t) == x);
    let mut out: Vec<Vec<T>> = Vec::new();
    let mut last: Option<usize> = None;
    for item in items {
        let pos = position(lead(item));
        let contiguous = matches!((last, pos), (Some(a), Some(b)) if b == a + 1);
        match out.last_mut() {
            Some(run) if contiguous => run.push(*item),
            _ => out.push(vec![*item]),
        }
        last = pos;
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinePanel {
    pub stat: String,
    pub lines: Vec<Line>,
    pub y_limits: Option<(f64, f64)>,
}

impl LinePanel {
    /// Caller limits, else the data range padded by 5 %.
    pub fn y_range(&self) -> (f64, f64) {
        if let Some(limits) = self.y_limits {
            return limits;
        }
        let values = self.lines.iter().flat_map(|l| {
            l.points
                .iter()
                .map(|p| p.1)
                .chain(l.band.iter().flat_map(|b| [b.1, b.2]))
        });
        let (lo, hi) = values
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
        if !lo.is_finite() {
            return (0.0, 1.0);
        }
        let pad = if hi > lo { (hi - lo) * 0.05 } else { 0.5 };
        (lo - pad, hi + pad)
    }
}

/// Line plot: one or two stacked panels sharing the lead axis.
#[derive(Debug, Clone, PartialEq)]
pub struct LineFigure {
    pub title: String,
    pub panels: Vec<LinePanel>,
    /// Lead hours shown on the shared x-axis.
    pub x_ticks: Vec<u32>,
}

/// Heatmap with row 0 drawn at the top.
#[derive(Debug, Clone, PartialEq)]
pub struct HeatmapFigure {
    pub title: String,
    pub x_title: String,
    pub y_title: String,
    pub x_labels: Vec<String>,
    pub y_labels: Vec<String>,
    /// rows x columns, NaN for missing cells
    pub values: Array2<f64>,
    /// Per-cell numbers written inside the cells.
    pub annotations: Option<Array2<f64>>,
    pub colorbar: ColorBar,
    /// Every `x_label_step`-th x label is shown.
    pub x_label_step: usize,
}

impl HeatmapFigure {
    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }
}

/// Show every other date label once there are ten or more.
pub fn date_label_step(count: usize) -> usize {
    if count >= 10 {
        2
    } else {
        1
    }
}
