//! Plot driver tests: bundles are written to a temp dir and figure models are
//! built from YAML requests. The rendering tests draw SVG and read back the
//! text elements.

use chrono::Duration;
use float_cmp::approx_eq;
use grid_stat_vis::config::{PlotKind, PlotRequest};
use grid_stat_vis::errors::VerifError;
use grid_stat_vis::ingest::{bundle_path, parse_stat_text, write_bundle, StatBundle, TableParse};
use grid_stat_vis::plot::figure::{HeatmapFigure, LineFigure};
use grid_stat_vis::plot::reldiff::{is_skill_gain, LADDER};
use grid_stat_vis::plot::render::OutputFormat;
use grid_stat_vis::plot::{build_figure, output_path, render_request, Figure};
use grid_stat_vis::timeutil::{format_cycle, lead_string, parse_cycle, valid_end_string};
use std::collections::BTreeMap;
use std::path::Path;
use tempfile::tempdir;

const PREFIX: &str = "grid_stat_QPF_24hr";
const CNT_HEADER: &str = "VX_MASK FCST_LEAD FCST_VALID_END RMSE RMSE_BCL RMSE_BCU PR_CORR";
const NBRCNT_HEADER: &str = "VX_MASK FCST_LEAD FCST_VALID_END FCST_THRESH FSS";

/// Stat rows grouped by (run, init) and family, written as bundles.
#[derive(Default)]
struct Tables {
    rows: BTreeMap<(String, String), BTreeMap<String, Vec<String>>>,
}

impl Tables {
    /// Adds a `CA_All` row valid at `valid` with lead `lead`; `cells` holds
    /// the columns after `FCST_VALID_END`.
    fn add(&mut self, run: &str, family: &str, lead: u32, valid: &str, cells: &str) {
        let valid = parse_cycle("valid", valid).expect("valid");
        let init = valid - Duration::hours(i64::from(lead));
        let row = format!("CA_All {} {} {}", lead_string(lead), valid_end_string(&valid), cells);
        self.rows
            .entry((run.to_string(), format_cycle(&init)))
            .or_default()
            .entry(family.to_string())
            .or_default()
            .push(row);
    }

    fn add_cnt(&mut self, run: &str, lead: u32, valid: &str, rmse: f64, corr: f64) {
        let cells = format!("{} {} {} {}", rmse, rmse - 1.0, rmse + 1.0, corr);
        self.add(run, "cnt", lead, valid, &cells);
    }

    fn write(&self, root: &Path) {
        for ((run, init), families) in &self.rows {
            let mut bundle = StatBundle::new();
            for (family, rows) in families {
                let header = if family == "nbrcnt" { NBRCNT_HEADER } else { CNT_HEADER };
                let text = format!("{}\n{}\n", header, rows.join("\n"));
                let TableParse::Rows(frame) = parse_stat_text(&text, 0) else {
                    panic!("expected rows for {} {}", run, init);
                };
                bundle.insert(family.clone(), frame);
            }
            let init = parse_cycle("init", init).expect("init");
            let path = bundle_path(&root.join("bundles"), "VD", run, &init, "", PREFIX);
            write_bundle(&path, &bundle).expect("Failed to write bundle");
        }
    }
}

fn plot_request(root: &Path, body: &str) -> PlotRequest {
    let yaml = format!(
        "case: VD\nprefix: {}\nbundle_root: '{}'\nout_root: '{}'\nreference: StageIV\n{}",
        PREFIX,
        root.join("bundles").display(),
        root.join("figures").display(),
        body
    );
    serde_yaml::from_str(&yaml).expect("Failed to parse request")
}

fn line_figure(request: &PlotRequest) -> LineFigure {
    match build_figure(request).expect("Failed to build figure") {
        Figure::Line(figure) => figure,
        other => panic!("expected a line figure, got {:?}", other),
    }
}

fn heatmap_figure(request: &PlotRequest) -> HeatmapFigure {
    match build_figure(request).expect("Failed to build figure") {
        Figure::Heatmap(figure) => figure,
        other => panic!("expected a heatmap, got {:?}", other),
    }
}

fn close(a: f64, b: f64) -> bool {
    approx_eq!(f64, a, b, epsilon = 1e-9)
}

const DUAL_LINE: &str = "\
kind: dual_line
statistics: [RMSE, PR_CORR]
family: cnt
mask: CA_All
configurations:
  - name: NAM
  - name: RAP
valid:
  start: '2022122800'
  max_lead: '24'
  lead_increment: '12'
";

const DATE_LEAD: &str = "\
kind: date_lead_heatmap
statistics: [RMSE]
family: cnt
mask: CA_All
configurations:
  - name: NAM
colorbar:
  kind: implicit
  count: 4
  alpha: 10.0
  palette: viridis
valid:
  start: '2022122800'
  stop: '2022123100'
  increment: '24'
  max_lead: '24'
  lead_increment: '12'
";

const THRESHOLD_LEAD: &str = "\
kind: threshold_lead_heatmap
statistics: [FSS]
family: nbrcnt
mask: CA_All
configurations:
  - name: NAM
valid:
  start: '2022122800'
  max_lead: '24'
  lead_increment: '12'
";

const RELATIVE_DIFFERENCE: &str = "\
kind: relative_difference
statistics: [RMSE]
family: cnt
mask: CA_All
configurations:
  - name: NAM
  - name: RAP
valid:
  start: '2022122800'
  max_lead: '24'
  lead_increment: '12'
";

fn dual_line_tables() -> Tables {
    let mut tables = Tables::default();
    tables.add_cnt("NAM", 12, "2022122800", 11.0, 0.75);
    tables.add_cnt("NAM", 24, "2022122800", 12.0, 0.5);
    tables.add_cnt("RAP", 12, "2022122800", 13.0, 0.625);
    tables.add_cnt("RAP", 24, "2022122800", 14.0, 0.375);
    // Same initializations, other valid time: never selected
    tables.add_cnt("NAM", 12, "2022122712", 99.0, 0.0);
    tables
}

const DATE_LEAD_VALIDS: [&str; 4] = ["2022122800", "2022122900", "2022123000", "2022123100"];

fn date_lead_tables() -> Tables {
    let mut tables = Tables::default();
    for (day, valid) in DATE_LEAD_VALIDS.iter().enumerate() {
        for lead in [12u32, 24] {
            tables.add_cnt("NAM", lead, valid, f64::from(lead) + day as f64, 0.5);
        }
    }
    tables
}

fn threshold_tables() -> Tables {
    let mut tables = Tables::default();
    for (thresh, base) in [(">=10.0", 0.75), (">=25.4", 0.5), (">=101.6", 0.25)] {
        for lead in [12u32, 24] {
            let fss = base - f64::from(lead) / 96.0;
            tables.add("NAM", "nbrcnt", lead, "2022122800", &format!("{} {}", thresh, fss));
        }
    }
    tables
}

/// Analysis RMSE 8 against reference 10 at 24 h; a near-zero analysis at 12 h.
fn relative_difference_tables() -> Tables {
    let mut tables = Tables::default();
    tables.add_cnt("NAM", 0, "2022122800", 9.0, 0.5);
    tables.add_cnt("NAM", 12, "2022122800", 0.05, 0.5);
    tables.add_cnt("NAM", 24, "2022122800", 8.0, 0.5);
    tables.add_cnt("RAP", 12, "2022122800", 10.0, 0.5);
    tables.add_cnt("RAP", 24, "2022122800", 10.0, 0.5);
    tables
}

#[test]
fn test_dual_line_panels_and_markers() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    dual_line_tables().write(temp_dir.path());
    let request = plot_request(temp_dir.path(), DUAL_LINE);
    assert_eq!(request.kind, PlotKind::DualLine);

    let figure = line_figure(&request);
    assert_eq!(figure.x_ticks, vec![12, 24]);
    assert_eq!(figure.panels.len(), 2);
    assert_eq!(figure.panels[0].stat, "RMSE");
    assert_eq!(figure.panels[1].stat, "PR_CORR");

    for panel in &figure.panels {
        let labels: Vec<&str> = panel.lines.iter().map(|l| l.label.as_str()).collect();
        assert_eq!(labels, vec!["NAM", "RAP"]);
        let sides: Vec<u32> = panel.lines.iter().map(|l| l.marker.sides).collect();
        assert_eq!(sides, vec![3, 4]);
        assert_ne!(panel.lines[0].color, panel.lines[1].color);
    }

    let nam = &figure.panels[0].lines[0];
    assert_eq!(nam.points.len(), 2);
    assert!(close(nam.points[0].0, 12.0) && close(nam.points[0].1, 11.0));
    assert!(close(nam.points[1].0, 24.0) && close(nam.points[1].1, 12.0));
    assert!(nam.band.is_empty());

    let rap_corr = &figure.panels[1].lines[1];
    assert!(close(rap_corr.points[1].1, 0.375));
    assert!(figure.title.contains("RMSE/PR_CORR"));

    let path = output_path(&request).expect("Failed to expand output path");
    assert_eq!(
        path,
        temp_dir
            .path()
            .join("figures")
            .join("VD/dual_line_cnt_RMSE-PR_CORR_CA_All_2022122800.png")
    );
}

#[test]
fn test_line_with_bootstrap_band_and_gaps() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let mut tables = Tables::default();
    for (lead, rmse) in [(6, 4.0), (12, 6.0), (24, 8.0)] {
        tables.add_cnt("NAM", lead, "2022122800", rmse, 0.5);
    }
    for (lead, rmse) in [(6, 5.0), (24, 9.0)] {
        tables.add_cnt("RAP", lead, "2022122800", rmse, 0.5);
    }
    tables.write(temp_dir.path());

    let body = "\
kind: line
statistics: [RMSE]
family: cnt
ci: bootstrap
mask: CA_All
configurations:
  - name: NAM
  - name: RAP
y_limits: [[0.0, 12.0]]
valid:
  start: '2022122800'
  max_lead: '24'
  lead_increment: '6'
";
    let figure = line_figure(&plot_request(temp_dir.path(), body));
    assert_eq!(figure.x_ticks, vec![6, 12, 24]);
    let panel = &figure.panels[0];
    assert_eq!(panel.y_range(), (0.0, 12.0));

    let nam = &panel.lines[0];
    assert_eq!(nam.band.len(), 3);
    let (x, lo, hi) = nam.band[0];
    assert!(close(x, 6.0) && close(lo, 3.0) && close(hi, 5.0));
    assert_eq!(nam.segments(&figure.x_ticks).len(), 1);

    // RAP has no 12 h value: the line breaks there
    let rap = &panel.lines[1];
    assert_eq!(rap.points.len(), 2);
    assert_eq!(rap.segments(&figure.x_ticks).len(), 2);

    // The band breaks at the same lead, so no band spans 6 to 24 h
    let bands = rap.band_segments(&figure.x_ticks);
    assert_eq!(bands.len(), 2);
    assert!(bands.iter().all(|run| run.len() == 1));
    assert_eq!(nam.band_segments(&figure.x_ticks).len(), 1);
}

#[test]
fn test_date_lead_heatmap_rows_and_colorbar() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let valids = DATE_LEAD_VALIDS;
    date_lead_tables().write(temp_dir.path());

    let request = plot_request(temp_dir.path(), DATE_LEAD);
    let figure = heatmap_figure(&request);
    assert_eq!(figure.shape(), (2, 4));
    assert_eq!(figure.y_labels, vec!["24", "12"]);
    assert_eq!(figure.x_labels, valids.to_vec());
    assert_eq!(figure.x_label_step, 1);
    assert!(close(figure.values[[0, 0]], 24.0));
    assert!(close(figure.values[[0, 3]], 27.0));
    assert!(close(figure.values[[1, 3]], 15.0));
    assert!(figure.annotations.is_none());

    // Bounds span the 5th to 95th percentile of the eight cells
    let bounds = &figure.colorbar.bounds;
    assert_eq!(bounds.len(), 5);
    assert_eq!(figure.colorbar.bins(), 4);
    assert!(close(bounds[0], 12.35));
    assert!(close(bounds[4], 26.65));

    let path = output_path(&request).expect("Failed to expand output path");
    assert!(path.ends_with("VD/date_lead_cnt_RMSE_CA_All_2022122800-2022123100.png"));
}

#[test]
fn test_threshold_lead_heatmap_orders_thresholds() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    threshold_tables().write(temp_dir.path());

    let figure = heatmap_figure(&plot_request(temp_dir.path(), THRESHOLD_LEAD));
    assert_eq!(figure.y_labels, vec![">=101.6", ">=25.4", ">=10.0"]);
    assert_eq!(figure.x_labels, vec!["12", "24"]);
    assert_eq!(figure.shape(), (3, 2));
    assert!(close(figure.values[[0, 0]], 0.125));
    assert!(close(figure.values[[2, 1]], 0.5));
}

#[test]
fn test_relative_difference_sign_and_suppression() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    relative_difference_tables().write(temp_dir.path());

    let figure = heatmap_figure(&plot_request(temp_dir.path(), RELATIVE_DIFFERENCE));

    // Lead 0 exists only for the analysis and is left out
    assert_eq!(figure.y_labels, vec!["24", "12"]);
    assert_eq!(figure.shape(), (2, 1));

    // Smaller RMSE than the reference is a positive difference
    let gain = figure.values[[0, 0]];
    assert!(close(gain, 20.0));
    assert!(is_skill_gain(&figure.colorbar, gain));
    assert!(figure.values[[1, 0]].is_nan());

    let annotations = figure.annotations.as_ref().expect("annotations");
    assert!(close(annotations[[0, 0]], 10.0));
    assert!(close(annotations[[1, 0]], 10.0));
    assert_eq!(figure.colorbar.bounds, LADDER.to_vec());
}

#[test]
fn test_unknown_mask_is_config_error() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    dual_line_tables().write(temp_dir.path());
    let request = plot_request(temp_dir.path(), &DUAL_LINE.replace("mask: CA_All", "mask: Nowhere"));

    let err = build_figure(&request).expect_err("Unknown mask must fail");
    assert!(matches!(err, VerifError::Config { .. }));
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn test_missing_bundles_is_data_error() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    std::fs::create_dir_all(temp_dir.path().join("bundles")).expect("Failed to create root");
    let request = plot_request(temp_dir.path(), DUAL_LINE);

    let err = build_figure(&request).expect_err("No rows must fail");
    assert!(matches!(err, VerifError::Data(_)));
    assert!(!err.is_fatal());
}

#[test]
fn test_output_path_threshold_and_label() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let body = format!("{}threshold: '>=25.4'\nfilename_label: exp\n", DUAL_LINE);
    let request = plot_request(temp_dir.path(), &body);
    let path = output_path(&request).expect("Failed to expand output path");
    assert_eq!(
        path.file_name().and_then(|n| n.to_str()),
        Some("dual_line_cnt_RMSE-PR_CORR_CA_All_2022122800_ge25.4_exp.png")
    );

    let body = format!("{}output_template: '{{case}}/{{region}}.png'\n", DUAL_LINE);
    let err = output_path(&plot_request(temp_dir.path(), &body)).expect_err("Unknown placeholder");
    assert!(matches!(err, VerifError::Config { .. }));

    assert_eq!(OutputFormat::for_path(Path::new("a/b.SVG")).ok(), Some(OutputFormat::Svg));
    assert!(OutputFormat::for_path(Path::new("a/b.pdf")).is_err());
}

#[test]
fn test_request_validation() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    std::fs::create_dir_all(temp_dir.path().join("bundles")).expect("Failed to create root");

    let ok = plot_request(temp_dir.path(), DUAL_LINE);
    ok.check().expect("Request should be valid");

    let one_stat = plot_request(
        temp_dir.path(),
        &DUAL_LINE.replace("[RMSE, PR_CORR]", "[RMSE]"),
    );
    assert!(matches!(one_stat.check(), Err(VerifError::Config { .. })));

    let bad_family = plot_request(temp_dir.path(), &DUAL_LINE.replace("family: cnt", "family: mpr"));
    assert!(matches!(bad_family.check(), Err(VerifError::Config { .. })));

    let mut missing_root = ok.clone();
    missing_root.bundle_root = temp_dir.path().join("absent");
    assert!(matches!(
        missing_root.check(),
        Err(VerifError::MissingDirectory { .. })
    ));

    let unknown_key = format!("{}colour: red\n", DUAL_LINE);
    let yaml = format!(
        "case: VD\nprefix: p\nbundle_root: x\nout_root: y\nreference: StageIV\n{}",
        unknown_key
    );
    assert!(serde_yaml::from_str::<PlotRequest>(&yaml).is_err());
}

#[test]
fn test_several_thresholds_need_a_threshold() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let mut tables = Tables::default();
    tables.add("NAM", "nbrcnt", 24, "2022122800", ">=101.6 0.1");
    tables.add("NAM", "nbrcnt", 24, "2022122800", ">=10.0 0.9");
    tables.write(temp_dir.path());

    let body = "\
kind: line
statistics: [FSS]
family: nbrcnt
mask: CA_All
configurations:
  - name: NAM
valid:
  start: '2022122800'
  max_lead: '24'
  lead_increment: '24'
";
    let err = build_figure(&plot_request(temp_dir.path(), body)).expect_err("Ambiguous threshold must fail");
    match &err {
        VerifError::Config { field, .. } => assert_eq!(field, "threshold"),
        other => panic!("expected a config error, got {:?}", other),
    }
    assert_eq!(err.exit_code(), 2);

    let chosen = format!("{}threshold: '>=10.0'\n", body);
    let figure = line_figure(&plot_request(temp_dir.path(), &chosen));
    let points = &figure.panels[0].lines[0].points;
    assert_eq!(points.len(), 1);
    assert!(close(points[0].0, 24.0) && close(points[0].1, 0.9));
}

/// Contents of the `<text>` elements of an SVG file, unescaped.
fn svg_texts(path: &Path) -> Vec<String> {
    let svg = std::fs::read_to_string(path).expect("Failed to read SVG");
    svg.split("</text>")
        .filter_map(|chunk| chunk.rfind('>').map(|i| chunk[i + 1..].trim().to_string()))
        .map(|t| t.replace("&gt;", ">").replace("&lt;", "<").replace("&amp;", "&"))
        .collect()
}

fn render_svg(root: &Path, body: &str) -> Vec<String> {
    let body = format!("{}output_template: '{{case}}/{{kind}}.svg'\n", body);
    let path = render_request(&plot_request(root, &body)).expect("Failed to render figure");
    assert!(path.is_file());
    assert_eq!(path.extension().and_then(|e| e.to_str()), Some("svg"));
    svg_texts(&path)
}

fn assert_labels(texts: &[String], labels: &[&str]) {
    for label in labels {
        assert!(
            texts.iter().any(|t| t == label),
            "label {} not drawn; texts: {:?}",
            label,
            texts
        );
    }
}

#[test]
fn test_render_line_labels_every_lead() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    dual_line_tables().write(temp_dir.path());
    let texts = render_svg(temp_dir.path(), DUAL_LINE);
    assert_labels(&texts, &["12", "24", "NAM", "RAP", "RMSE", "PR_CORR"]);
}

#[test]
fn test_render_heatmaps_label_rows_and_columns() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    date_lead_tables().write(temp_dir.path());
    let texts = render_svg(temp_dir.path(), DATE_LEAD);
    assert_labels(&texts, &["24", "12"]);
    assert_labels(&texts, &DATE_LEAD_VALIDS);

    let temp_dir = tempdir().expect("Failed to create temp dir");
    threshold_tables().write(temp_dir.path());
    let texts = render_svg(temp_dir.path(), THRESHOLD_LEAD);
    assert_labels(&texts, &[">=101.6", ">=25.4", ">=10.0", "12", "24"]);

    let temp_dir = tempdir().expect("Failed to create temp dir");
    relative_difference_tables().write(temp_dir.path());
    let texts = render_svg(temp_dir.path(), RELATIVE_DIFFERENCE);
    assert_labels(&texts, &["24", "12", "2022122800"]);
}
