//! Drawing of figure models with plotters

use crate::errors::{Result, VerifError};
use crate::plot::colorbar::{format_tick, ColorBar};
use crate::plot::figure::{HeatmapFigure, LineFigure, LinePanel};
use plotters::coord::combinators::BindKeyPoints;
use plotters::coord::Shift;
use plotters::prelude::*;
use std::path::Path;

const LINE_PANEL_SIZE: (u32, u32) = (1000, 450);
const HEATMAP_SIZE: (u32, u32) = (1200, 720);
const COLORBAR_WIDTH: i32 = 150;
const MARKER_RADIUS: f64 = 6.0;
const MISSING_CELL: RGBColor = RGBColor(225, 225, 225);

fn plot_error<E: std::fmt::Display>(e: E) -> VerifError {
    VerifError::Plot(e.to_string())
}

/// Output format, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Png,
    Svg,
}

impl OutputFormat {
    pub fn for_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("png") => Ok(OutputFormat::Png),
            Some("svg") => Ok(OutputFormat::Svg),
            _ => Err(VerifError::config(
                "output template",
                path.display(),
                "output must end in .png or .svg",
            )),
        }
    }
}

pub fn render_line_figure(figure: &LineFigure, path: &Path) -> Result<()> {
    let size = (LINE_PANEL_SIZE.0, LINE_PANEL_SIZE.1 * figure.panels.len().max(1) as u32);
    match OutputFormat::for_path(path)? {
        OutputFormat::Png => draw_line_figure(BitMapBackend::new(path, size).into_drawing_area(), figure),
        OutputFormat::Svg => draw_line_figure(SVGBackend::new(path, size).into_drawing_area(), figure),
    }
}

pub fn render_heatmap(figure: &HeatmapFigure, path: &Path) -> Result<()> {
    match OutputFormat::for_path(path)? {
        OutputFormat::Png => draw_heatmap(BitMapBackend::new(path, HEATMAP_SIZE).into_drawing_area(), figure),
        OutputFormat::Svg => draw_heatmap(SVGBackend::new(path, HEATMAP_SIZE).into_drawing_area(), figure),
    }
}

fn draw_line_figure<DB: DrawingBackend>(root: DrawingArea<DB, Shift>, figure: &LineFigure) -> Result<()> {
    root.fill(&WHITE).map_err(plot_error)?;
    let titled = root
        .titled(&figure.title, ("sans-serif", 22))
        .map_err(plot_error)?;
    let panels = titled.split_evenly((figure.panels.len().max(1), 1));
    for (area, panel) in panels.iter().zip(&figure.panels) {
        draw_line_panel(area, panel, &figure.x_ticks)?;
    }
    root.present().map_err(plot_error)?;
    Ok(())
}

fn draw_line_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    panel: &LinePanel,
    ticks: &[u32],
) -> Result<()> {
    let first = ticks.first().copied().unwrap_or(0);
    let last = ticks.last().copied().unwrap_or(first + 1).max(first + 1);
    let pad = f64::from(last - first) * 0.03;
    // One labelled tick per lead, no automatic ticks in between
    let x_range = ((f64::from(first) - pad)..(f64::from(last) + pad))
        .with_key_points(ticks.iter().map(|t| f64::from(*t)).collect());
    let (y_lo, y_hi) = panel.y_range();

    let mut chart = ChartBuilder::on(area)
        .margin(12)
        .caption(&panel.stat, ("sans-serif", 18))
        .x_label_area_size(40)
        .y_label_area_size(64)
        .build_cartesian_2d(x_range, y_lo..y_hi)
        .map_err(plot_error)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(ticks.len().max(1))
        .x_label_formatter(&|v| format!("{:.0}", v))
        .x_desc("Forecast lead (h)")
        .y_desc(panel.stat.as_str())
        .draw()
        .map_err(plot_error)?;

    for line in &panel.lines {
        let color = line.color;
        for run in line.band_segments(ticks).into_iter().filter(|run| run.len() > 1) {
            let mut outline: Vec<(f64, f64)> = run.iter().map(|b| (b.0, b.2)).collect();
            outline.extend(run.iter().rev().map(|b| (b.0, b.1)));
            chart
                .draw_series(std::iter::once(Polygon::new(outline, color.mix(0.5).filled())))
                .map_err(plot_error)?;
        }

        let mut labelled = false;
        for run in line.segments(ticks) {
            let series = chart
                .draw_series(LineSeries::new(run, color.stroke_width(2)))
                .map_err(plot_error)?;
            if !labelled {
                series
                    .label(line.label.as_str())
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 24, y)], color.stroke_width(2)));
                labelled = true;
            }
        }

        let vertices = line.marker.vertices(MARKER_RADIUS);
        chart
            .draw_series(
                line.points
                    .iter()
                    .map(|&p| EmptyElement::at(p) + Polygon::new(vertices.clone(), color.filled())),
            )
            .map_err(plot_error)?;
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK.mix(0.4))
        .position(SeriesLabelPosition::UpperRight)
        .draw()
        .map_err(plot_error)?;
    Ok(())
}

fn draw_heatmap<DB: DrawingBackend>(root: DrawingArea<DB, Shift>, figure: &HeatmapFigure) -> Result<()> {
    root.fill(&WHITE).map_err(plot_error)?;
    let titled = root
        .titled(&figure.title, ("sans-serif", 22))
        .map_err(plot_error)?;
    let (width, _) = titled.dim_in_pixel();
    let (main, bar) = titled.split_horizontally(width as i32 - COLORBAR_WIDTH);

    let (rows, cols) = figure.shape();
    let step = figure.x_label_step.max(1);
    // Cell (r, c) spans [c, c + 1) x [rows - 1 - r, rows - r); labels sit at cell centres
    let x_centres: Vec<f64> = (0..cols).step_by(step).map(|c| c as f64 + 0.5).collect();
    let y_centres: Vec<f64> = (0..rows).map(|r| r as f64 + 0.5).collect();
    let mut chart = ChartBuilder::on(&main)
        .margin(12)
        .x_label_area_size(70)
        .y_label_area_size(70)
        .build_cartesian_2d(
            (0f64..cols as f64).with_key_points(x_centres),
            (0f64..rows as f64).with_key_points(y_centres),
        )
        .map_err(plot_error)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(cols.max(1))
        .y_labels(rows.max(1))
        .x_label_formatter(&|x| {
            let idx = x.floor() as usize;
            figure.x_labels.get(idx).cloned().unwrap_or_default()
        })
        .y_label_formatter(&|y| {
            let from_bottom = y.floor() as usize;
            rows.checked_sub(from_bottom + 1)
                .and_then(|idx| figure.y_labels.get(idx).cloned())
                .unwrap_or_default()
        })
        .x_desc(figure.x_title.as_str())
        .y_desc(figure.y_title.as_str())
        .draw()
        .map_err(plot_error)?;

    for ((r, c), value) in figure.values.indexed_iter() {
        let (x, y) = (c as f64, (rows - 1 - r) as f64);
        let color = figure.colorbar.color(*value).unwrap_or(MISSING_CELL);
        chart
            .draw_series(std::iter::once(Rectangle::new([(x, y), (x + 1.0, y + 1.0)], color.filled())))
            .map_err(plot_error)?;
        if let Some(annotations) = &figure.annotations {
            let note = annotations[[r, c]];
            if note.is_finite() {
                chart
                    .draw_series(std::iter::once(
                        EmptyElement::at((x, y + 1.0)) + Text::new(format_tick(note), (4, 4), ("sans-serif", 11)),
                    ))
                    .map_err(plot_error)?;
            }
        }
    }

    draw_colorbar(&bar, &figure.colorbar)?;
    root.present().map_err(plot_error)?;
    Ok(())
}

fn draw_colorbar<DB: DrawingBackend>(area: &DrawingArea<DB, Shift>, colorbar: &ColorBar) -> Result<()> {
    let bins = colorbar.bins();
    let bound_labels = colorbar.bound_labels();
    let mut chart = ChartBuilder::on(area)
        .margin(12)
        .margin_bottom(80)
        .y_label_area_size(60)
        .build_cartesian_2d(0i32..1, (0i32..bins as i32).with_key_points((0..=bins as i32).collect()))
        .map_err(plot_error)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .disable_x_axis()
        .y_labels(bins + 1)
        .y_label_formatter(&|y| {
            if colorbar.labels.is_empty() {
                bound_labels.get(*y as usize).cloned().unwrap_or_default()
            } else {
                String::new()
            }
        })
        .draw()
        .map_err(plot_error)?;

    chart
        .draw_series(
            colorbar
                .colors
                .iter()
                .enumerate()
                .map(|(b, color)| Rectangle::new([(0, b as i32), (1, b as i32 + 1)], color.filled())),
        )
        .map_err(plot_error)?;

    if !colorbar.labels.is_empty() {
        chart
            .draw_series(colorbar.labels.iter().enumerate().map(|(b, label)| {
                EmptyElement::at((0, b as i32 + 1)) + Text::new(label.clone(), (4, 4), ("sans-serif", 11))
            }))
            .map_err(plot_error)?;
    }
    Ok(())
}
