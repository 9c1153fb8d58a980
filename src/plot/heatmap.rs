//! Heatmap figures: lead against valid date, lead against threshold, and
//! the relative difference of two configurations.

use crate::errors::{Result, VerifError};
use crate::ordering::{compare_leads, compare_thresholds};
use crate::plot::colorbar::ColorBarSpec;
use crate::plot::figure::{date_label_step, HeatmapFigure};
use crate::plot::loader::SourceData;
use crate::plot::reldiff::{diverging_colorbar, relative_difference, Orientation};
use crate::timeutil::{lead_hours, valid_end_string};
use chrono::NaiveDateTime;
use ndarray::Array2;

/// Leads sorted longest first, for top-down rows.
fn descending_leads(leads: &[String]) -> Vec<String> {
    let mut rows = leads.to_vec();
    rows.sort_by(|a, b| compare_leads(b, a));
    rows
}

fn lead_label(lead: &str) -> String {
    lead_hours(lead).map_or_else(|| lead.to_string(), |h| h.to_string())
}

fn date_label(valid: &NaiveDateTime) -> String {
    valid.format("%Y%m%d%H").to_string()
}

fn ensure_some_values(values: &Array2<f64>, what: &str) -> Result<()> {
    if values.iter().all(|v| v.is_nan()) {
        return Err(VerifError::Data(format!("no values for {}", what)));
    }
    Ok(())
}

/// Lead (rows, longest on top) against valid date (columns) for one source.
pub fn build_date_lead(
    data: &SourceData,
    stat: &str,
    valids: &[NaiveDateTime],
    leads: &[String],
    threshold: Option<&str>,
    colorbar: &ColorBarSpec,
    title: &str,
) -> Result<HeatmapFigure> {
    let rows = descending_leads(leads);
    let valid_ends: Vec<String> = valids.iter().map(valid_end_string).collect();
    let values = Array2::from_shape_fn((rows.len(), valids.len()), |(r, c)| {
        data.value(&valid_ends[c], &rows[r], threshold, stat)
            .unwrap_or(f64::NAN)
    });
    ensure_some_values(&values, &format!("{} of {}", stat, data.source.label))?;
    let cells: Vec<f64> = values.iter().copied().collect();

    Ok(HeatmapFigure {
        title: title.to_string(),
        x_title: "Valid date".to_string(),
        y_title: "Forecast lead (h)".to_string(),
        x_labels: valids.iter().map(date_label).collect(),
        y_labels: rows.iter().map(|l| lead_label(l)).collect(),
        colorbar: colorbar.resolve(&cells)?,
        values,
        annotations: None,
        x_label_step: date_label_step(valids.len()),
    })
}

/// Threshold (rows, largest on top) against lead (columns) at one valid time.
pub fn build_threshold_lead(
    data: &SourceData,
    stat: &str,
    valid: &NaiveDateTime,
    thresholds: &[String],
    leads: &[String],
    colorbar: &ColorBarSpec,
    title: &str,
) -> Result<HeatmapFigure> {
    let mut rows = thresholds.to_vec();
    rows.sort_by(|a, b| compare_thresholds(b, a));
    let valid_end = valid_end_string(valid);
    let values = Array2::from_shape_fn((rows.len(), leads.len()), |(r, c)| {
        data.value(&valid_end, &leads[c], Some(rows[r].as_str()), stat)
            .unwrap_or(f64::NAN)
    });
    ensure_some_values(&values, &format!("{} of {}", stat, data.source.label))?;
    let cells: Vec<f64> = values.iter().copied().collect();

    Ok(HeatmapFigure {
        title: title.to_string(),
        x_title: "Forecast lead (h)".to_string(),
        y_title: "Threshold".to_string(),
        x_labels: leads.iter().map(|l| lead_label(l)).collect(),
        y_labels: rows,
        colorbar: colorbar.resolve(&cells)?,
        values,
        annotations: None,
        x_label_step: 1,
    })
}

/// Signed relative difference (percent) of `analysis` against `reference`,
/// lead against valid date. Reference values are annotated in the cells.
pub fn build_relative_difference(
    analysis: &SourceData,
    reference: &SourceData,
    stat: &str,
    valids: &[NaiveDateTime],
    leads: &[String],
    threshold: Option<&str>,
    title: &str,
) -> Result<HeatmapFigure> {
    let rows = descending_leads(leads);
    let valid_ends: Vec<String> = valids.iter().map(valid_end_string).collect();
    let orientation = Orientation::of(stat);
    let shape = (rows.len(), valids.len());

    let reference_values = Array2::from_shape_fn(shape, |(r, c)| {
        reference
            .value(&valid_ends[c], &rows[r], threshold, stat)
            .unwrap_or(f64::NAN)
    });
    let values = Array2::from_shape_fn(shape, |(r, c)| {
        let a = analysis
            .value(&valid_ends[c], &rows[r], threshold, stat)
            .unwrap_or(f64::NAN);
        relative_difference(a, reference_values[[r, c]], orientation).unwrap_or(f64::NAN)
    });
    ensure_some_values(
        &values,
        &format!("{} difference of {} and {}", stat, analysis.source.label, reference.source.label),
    )?;
    let cells: Vec<f64> = values.iter().copied().collect();

    Ok(HeatmapFigure {
        title: title.to_string(),
        x_title: "Valid date".to_string(),
        y_title: "Forecast lead (h)".to_string(),
        x_labels: valids.iter().map(date_label).collect(),
        y_labels: rows.iter().map(|l| lead_label(l)).collect(),
        colorbar: diverging_colorbar(&cells),
        values,
        annotations: Some(reference_values),
        x_label_step: date_label_step(valids.len()),
    })
}
