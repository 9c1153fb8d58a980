//! Plot driver
//!
//! A [`PlotRequest`] is turned into exactly one figure: rows are loaded from
//! the per-initialization bundles, the kind-specific builder produces a
//! figure model, and the model is drawn to the path given by the request's
//! output template.

pub mod colorbar;
pub mod figure;
pub mod heatmap;
pub mod labels;
pub mod line;
pub mod loader;
pub mod reldiff;
pub mod render;
pub mod template;

use crate::config::{PlotKind, PlotRequest};
use crate::errors::{Result, VerifError};
use crate::timeutil::{format_cycle, lead_hours, valid_end_string};
use chrono::NaiveDateTime;
use colorbar::{ColorBarSpec, Palette};
use figure::{HeatmapFigure, LineFigure};
use loader::{enumerate_leads, BundleLoader, LeadMerge, Source, SourceData};
use log::info;
use std::fs;
use std::path::PathBuf;
use template::TemplateValues;

/// A built, not yet drawn, figure.
#[derive(Debug, Clone, PartialEq)]
pub enum Figure {
    Line(LineFigure),
    Heatmap(HeatmapFigure),
}

/// Colour bar used when a heatmap request does not name one.
pub fn default_colorbar() -> ColorBarSpec {
    ColorBarSpec::Implicit {
        count: 10,
        min: None,
        max: None,
        alpha: Some(5.0),
        palette: Palette::Viridis,
    }
}

/// Builds and draws the figure of `request`; returns the written path.
pub fn render_request(request: &PlotRequest) -> Result<PathBuf> {
    let figure = build_figure(request)?;
    let path = output_path(request)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    match &figure {
        Figure::Line(f) => render::render_line_figure(f, &path)?,
        Figure::Heatmap(f) => render::render_heatmap(f, &path)?,
    }
    info!("Wrote {} figure {}", request.kind.as_str(), path.display());
    if request.show {
        println!("{}", path.display());
    }
    Ok(path)
}

/// Output path of `request`: its template expanded below `out_root`.
pub fn output_path(request: &PlotRequest) -> Result<PathBuf> {
    let valids = request.valid.valid_times()?;
    let valid = match (valids.first(), valids.last()) {
        (Some(first), Some(last)) if first != last => {
            format!("{}-{}", format_cycle(first), format_cycle(last))
        }
        (Some(first), _) => format_cycle(first),
        _ => String::new(),
    };
    let values = TemplateValues::new()
        .set("case", request.case.as_str())
        .set("stat", stats_of(request).join("-"))
        .set("mask", request.mask.as_str())
        .set("valid", valid)
        .set("kind", request.kind.as_str())
        .set("family", request.family.as_str())
        .threshold(request.threshold.as_deref())
        .label(&request.filename_label);
    let relative = template::expand(&request.output_template, &values)?;
    Ok(request.out_root.join(relative))
}

fn stats_of(request: &PlotRequest) -> Vec<&str> {
    let count = match request.kind {
        PlotKind::DualLine => 2,
        _ => 1,
    };
    request.statistics.iter().take(count).map(String::as_str).collect()
}

fn title(request: &PlotRequest, stats: &[&str], what: &str) -> String {
    let mut title = format!(
        "{} {} {} vs {}, {}",
        request.family,
        stats.join("/"),
        request.mask,
        request.reference,
        what
    );
    if let Some(t) = &request.threshold {
        title.push_str(&format!(" ({})", t));
    }
    title.push_str(&request.labels.suffix);
    title
}

/// Leads of `data` inside the request's lead window.
fn window_leads(request: &PlotRequest, data: &[SourceData], merge: LeadMerge) -> Result<Vec<String>> {
    let allowed = request.valid.lead_hours()?;
    let leads: Vec<String> = enumerate_leads(data, request.valid.max_lead_hours()?, merge)
        .into_iter()
        .filter(|l| lead_hours(l).map_or(false, |h| allowed.contains(&h)))
        .collect();
    if leads.is_empty() {
        return Err(VerifError::Data(format!(
            "no leads within {}..{} h for {}",
            request.valid.min_lead, request.valid.max_lead, request.case
        )));
    }
    Ok(leads)
}

fn first_valid(valids: &[NaiveDateTime]) -> Result<NaiveDateTime> {
    valids
        .first()
        .copied()
        .ok_or_else(|| VerifError::Data("empty valid window".to_string()))
}

/// First source of configuration `config`.
fn source_of(sources: &[Source], config: usize) -> Result<&Source> {
    sources
        .iter()
        .find(|s| s.config == config)
        .ok_or_else(|| VerifError::config("configurations", config, "configuration not found"))
}

fn single(mut data: Vec<SourceData>, source: &Source) -> Result<SourceData> {
    data.pop().ok_or_else(|| {
        VerifError::Data(format!("no usable rows for {}", source.label))
    })
}

/// Loads the rows `request` needs and builds its figure model.
pub fn build_figure(request: &PlotRequest) -> Result<Figure> {
    let valids = request.valid.valid_times()?;
    let lead_candidates = request.valid.lead_hours()?;
    let stats = stats_of(request);
    let sources = loader::sources(request);
    let mut loader = BundleLoader::new(request);
    let colorbar = request.colorbar.clone().unwrap_or_else(default_colorbar);

    match request.kind {
        PlotKind::Line | PlotKind::DualLine => {
            let valid = first_valid(&valids)?;
            let data = loader.load_all(&sources, &[valid], &lead_candidates, &stats)?;
            if data.is_empty() {
                return Err(VerifError::Data(format!(
                    "no configuration has {} rows valid at {}",
                    request.family,
                    format_cycle(&valid)
                )));
            }
            for d in &data {
                d.require_single_threshold(request.threshold.as_deref())?;
            }
            let leads = window_leads(request, &data, LeadMerge::Union)?;
            let figure = line::build_line_figure(
                &data,
                &stats,
                &leads,
                &valid_end_string(&valid),
                request.threshold.as_deref(),
                request.ci,
                &request.y_limits,
                &title(request, &stats, &format!("valid {}", format_cycle(&valid))),
            )?;
            Ok(Figure::Line(figure))
        }
        PlotKind::DateLeadHeatmap => {
            let source = source_of(&sources, 0)?;
            let data = single(
                loader.load_all(std::slice::from_ref(source), &valids, &lead_candidates, &stats)?,
                source,
            )?;
            data.require_single_threshold(request.threshold.as_deref())?;
            let leads = window_leads(request, std::slice::from_ref(&data), LeadMerge::Union)?;
            let what = format!("{}, {}", source.label, valid_range(&valids));
            let figure = heatmap::build_date_lead(
                &data,
                stats[0],
                &valids,
                &leads,
                request.threshold.as_deref(),
                &colorbar,
                &title(request, &stats, &what),
            )?;
            Ok(Figure::Heatmap(figure))
        }
        PlotKind::ThresholdLeadHeatmap => {
            let valid = first_valid(&valids)?;
            let source = source_of(&sources, 0)?;
            let data = single(
                loader.load_all(std::slice::from_ref(source), &[valid], &lead_candidates, &stats)?,
                source,
            )?;
            let leads = window_leads(request, std::slice::from_ref(&data), LeadMerge::Union)?;
            let thresholds = if request.thresholds.is_empty() {
                data.thresholds()
            } else {
                request.thresholds.clone()
            };
            let what = format!("{}, valid {}", source.label, format_cycle(&valid));
            let figure = heatmap::build_threshold_lead(
                &data,
                stats[0],
                &valid,
                &thresholds,
                &leads,
                &colorbar,
                &title(request, &stats, &what),
            )?;
            Ok(Figure::Heatmap(figure))
        }
        PlotKind::RelativeDifference => {
            let analysis_source = source_of(&sources, 0)?;
            let reference_source = source_of(&sources, 1)?;
            let analysis = single(
                loader.load_all(std::slice::from_ref(analysis_source), &valids, &lead_candidates, &stats)?,
                analysis_source,
            )?;
            let reference = single(
                loader.load_all(std::slice::from_ref(reference_source), &valids, &lead_candidates, &stats)?,
                reference_source,
            )?;
            let pair = [analysis, reference];
            for d in &pair {
                d.require_single_threshold(request.threshold.as_deref())?;
            }
            let leads = window_leads(request, &pair, LeadMerge::Intersection)?;
            let what = format!(
                "{} relative to {} (%), {}",
                analysis_source.label,
                reference_source.label,
                valid_range(&valids)
            );
            let figure = heatmap::build_relative_difference(
                &pair[0],
                &pair[1],
                stats[0],
                &valids,
                &leads,
                request.threshold.as_deref(),
                &title(request, &stats, &what),
            )?;
            Ok(Figure::Heatmap(figure))
        }
    }
}

fn valid_range(valids: &[NaiveDateTime]) -> String {
    match (valids.first(), valids.last()) {
        (Some(a), Some(b)) if a != b => format!("valid {} to {}", format_cycle(a), format_cycle(b)),
        (Some(a), _) => format!("valid {}", format_cycle(a)),
        _ => String::new(),
    }
}
