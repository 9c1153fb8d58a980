//! Line plots of statistics against forecast lead

use crate::config::CiMode;
use crate::errors::{Result, VerifError};
use crate::plot::figure::{line_color, Line, LineFigure, LinePanel, Marker};
use crate::plot::loader::SourceData;
use crate::timeutil::lead_hours;
use log::warn;

/// Builds a line figure with one panel per statistic and one line per
/// source. Missing values leave gaps; a source with no value in a panel is
/// left out of that panel. Interval bands are added when `ci` names columns
/// the source carries.
pub fn build_line_figure(
    data: &[SourceData],
    stats: &[&str],
    leads: &[String],
    valid_end: &str,
    threshold: Option<&str>,
    ci: CiMode,
    y_limits: &[(f64, f64)],
    title: &str,
) -> Result<LineFigure> {
    let x_ticks: Vec<u32> = leads.iter().filter_map(|l| lead_hours(l)).collect();
    let count = data.len();
    let mut panels = Vec::with_capacity(stats.len());

    for (p, stat) in stats.iter().enumerate() {
        let mut lines = Vec::new();
        for (i, source) in data.iter().enumerate() {
            let mut points = Vec::new();
            let mut band = Vec::new();
            let ci_columns = ci.suffixes().map(|(lo, hi)| (format!("{}{}", stat, lo), format!("{}{}", stat, hi)));

            for lead in leads {
                let Some(hours) = lead_hours(lead) else {
                    continue;
                };
                let x = f64::from(hours);
                if let Some(v) = source.value(valid_end, lead, threshold, stat) {
                    points.push((x, v));
                }
                if let Some((lo_col, hi_col)) = &ci_columns {
                    let lo = source.value(valid_end, lead, threshold, lo_col);
                    let hi = source.value(valid_end, lead, threshold, hi_col);
                    if let (Some(lo), Some(hi)) = (lo, hi) {
                        band.push((x, lo, hi));
                    }
                }
            }

            if points.is_empty() {
                warn!(
                    "{}",
                    VerifError::Data(format!("no {} values for {} at {}", stat, source.source.label, valid_end))
                );
                continue;
            }
            lines.push(Line {
                label: source.source.label.clone(),
                color: line_color(i, count),
                marker: Marker::for_line(i),
                points,
                band,
            });
        }

        if lines.is_empty() {
            return Err(VerifError::Data(format!("no {} values to plot at {}", stat, valid_end)));
        }
        panels.push(LinePanel {
            stat: stat.to_string(),
            lines,
            y_limits: y_limits.get(p).copied(),
        });
    }

    Ok(LineFigure {
        title: title.to_string(),
        panels,
        x_ticks,
    })
}
