//! Job configuration
//!
//! Ingest, concatenation and plot jobs are described by YAML files that map
//! one-to-one onto the structures below. `serde` enforces the closed option
//! set (unknown keys are rejected) and each job's `check` validates the
//! values that types alone cannot: date and hour strings, lead bounds,
//! colour-bar consistency, stat family and mask.

use crate::errors::{Result, VerifError};
use crate::plot::colorbar::ColorBarSpec;
use crate::timeutil::{cycle_range, parse_cycle, parse_hours, parse_step_hours};
use chrono::{Duration, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Stat families (line types) the upstream verifier writes.
pub const KNOWN_FAMILIES: &[&str] = &[
    "cnt", "nbrcnt", "nbrcts", "nbrctc", "cts", "ctc", "sl1l2", "fho", "grad",
];

/// Reads and deserializes a YAML job file.
pub fn load_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data = fs::read(path).map_err(|e| {
        VerifError::config("configuration file", path.display(), e.to_string())
    })?;
    serde_yaml::from_slice(data.as_slice())
        .map_err(|e| VerifError::config("configuration file", path.display(), e.to_string()))
}

/// One forecast configuration: a name, an optional display label, and the
/// grids and ensemble members it was run on.
#[derive(Clone, PartialEq, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigDescriptor {
    pub name: String,

    /// Display label. When absent the label is synthesized from `name`.
    #[serde(default)]
    pub label: Option<String>,

    #[serde(default)]
    pub grids: Vec<String>,

    #[serde(default)]
    pub members: Vec<String>,
}

impl ConfigDescriptor {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            label: None,
            grids: Vec::new(),
            members: Vec::new(),
        }
    }

    /// Grid identifiers, or a single empty placeholder.
    pub fn grid_list(&self) -> Vec<String> {
        placeholder_if_empty(&self.grids)
    }

    /// Ensemble member identifiers, or a single empty placeholder.
    pub fn member_list(&self) -> Vec<String> {
        placeholder_if_empty(&self.members)
    }

    /// Directory/run name of one member of this configuration.
    pub fn run_name(&self, member: &str) -> String {
        if member.is_empty() {
            self.name.clone()
        } else {
            format!("{}_{}", self.name, member)
        }
    }
}

fn placeholder_if_empty(values: &[String]) -> Vec<String> {
    if values.is_empty() {
        vec![String::new()]
    } else {
        values.to_vec()
    }
}

/// Forecast initialization window.
#[derive(Clone, PartialEq, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InitWindow {
    /// First initialization, `YYYYMMDDHH`.
    pub start: String,

    /// Last initialization (inclusive), `YYYYMMDDHH`.
    pub stop: String,

    /// Hours between initializations, `HH`. Defaults to `24`.
    #[serde(default = "InitWindow::default_increment")]
    pub increment: String,
}

impl InitWindow {
    fn default_increment() -> String {
        "24".to_string()
    }

    /// All initialization instants in the window.
    pub fn cycles(&self) -> Result<Vec<NaiveDateTime>> {
        let (start, stop) = self.bounds()?;
        let step = parse_step_hours("init increment", &self.increment)?;
        Ok(cycle_range(start, stop, step))
    }

    pub fn bounds(&self) -> Result<(NaiveDateTime, NaiveDateTime)> {
        let start = parse_cycle("init start", &self.start)?;
        let stop = parse_cycle("init stop", &self.stop)?;
        if stop < start {
            return Err(VerifError::config(
                "init stop",
                &self.stop,
                format!("precedes init start {}", self.start),
            ));
        }
        Ok((start, stop))
    }
}

/// Parameters of an ingest job.
#[derive(Clone, PartialEq, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IngestConfig {
    pub case: String,

    /// Root of the ASCII stat tables.
    pub in_root: PathBuf,

    /// Root of the per-initialization bundles.
    pub out_root: PathBuf,

    /// Filename prefix of the stat tables, e.g. `grid_stat_QPF_24hr`.
    pub prefix: String,

    pub configurations: Vec<ConfigDescriptor>,

    pub inits: InitWindow,

    /// Worker threads. Defaults to host CPU count minus one.
    #[serde(default)]
    pub threads: Option<usize>,
}

impl IngestConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let config: IngestConfig = load_yaml(path)?;
        config.check()?;
        Ok(config)
    }

    pub fn check(&self) -> Result<()> {
        check_non_empty("case", &self.case)?;
        check_non_empty("prefix", &self.prefix)?;
        check_configurations(&self.configurations)?;
        self.inits.cycles()?;
        if !self.in_root.is_dir() {
            return Err(VerifError::MissingDirectory {
                path: self.in_root.clone(),
            });
        }
        Ok(())
    }
}

/// Parameters of a concatenation job.
#[derive(Clone, PartialEq, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConcatConfig {
    pub cases: Vec<String>,

    /// Root of the per-initialization bundles.
    pub bundle_root: PathBuf,

    /// Directory receiving the concatenated store and its log.
    pub out_root: PathBuf,

    /// File stem of the concatenated store.
    #[serde(default = "ConcatConfig::default_label")]
    pub label: String,

    pub configurations: Vec<ConfigDescriptor>,

    pub prefixes: Vec<String>,

    pub inits: InitWindow,

    /// Statistics kept next to the key columns.
    pub statistics: Vec<String>,

    /// Ordered threshold levels. Empty keeps every threshold.
    #[serde(default)]
    pub thresholds: Vec<String>,
}

impl ConcatConfig {
    fn default_label() -> String {
        "concat".to_string()
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let config: ConcatConfig = load_yaml(path)?;
        config.check()?;
        Ok(config)
    }

    pub fn check(&self) -> Result<()> {
        if self.cases.is_empty() {
            return Err(VerifError::config("cases", "[]", "at least one case is required"));
        }
        if self.prefixes.is_empty() {
            return Err(VerifError::config("prefixes", "[]", "at least one prefix is required"));
        }
        check_configurations(&self.configurations)?;
        self.inits.cycles()?;
        if !self.bundle_root.is_dir() {
            return Err(VerifError::MissingDirectory {
                path: self.bundle_root.clone(),
            });
        }
        Ok(())
    }

    pub fn store_path(&self) -> PathBuf {
        self.out_root.join(format!("{}.json", self.label))
    }
}

/// Confidence-interval mode of a plot.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CiMode {
    Bootstrap,
    Normal,
    #[default]
    None,
}

impl CiMode {
    /// Lower/upper column suffixes, if any.
    pub fn suffixes(self) -> Option<(&'static str, &'static str)> {
        match self {
            CiMode::Bootstrap => Some(("_BCL", "_BCU")),
            CiMode::Normal => Some(("_NCL", "_NCU")),
            CiMode::None => None,
        }
    }
}

/// The figure a plot request renders.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlotKind {
    /// One statistic against lead.
    Line,
    /// Two statistics against lead, stacked panels with a shared x-axis.
    DualLine,
    /// Lead against valid date for one configuration.
    DateLeadHeatmap,
    /// Lead against threshold for one configuration and valid date.
    ThresholdLeadHeatmap,
    /// Signed relative difference of two configurations, lead against valid date.
    RelativeDifference,
}

impl PlotKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PlotKind::Line => "line",
            PlotKind::DualLine => "dual_line",
            PlotKind::DateLeadHeatmap => "date_lead",
            PlotKind::ThresholdLeadHeatmap => "thresh_lead",
            PlotKind::RelativeDifference => "rel_diff",
        }
    }
}

/// Switches controlling how configuration labels are synthesized.
#[derive(Clone, PartialEq, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LabelOptions {
    /// Indices of the `_`-separated name components to keep.
    #[serde(default)]
    pub indices: Vec<usize>,

    /// Append the grid identifier.
    #[serde(default)]
    pub grid: bool,

    /// Append the ensemble member identifier.
    #[serde(default)]
    pub member: bool,

    /// Text appended to every title.
    #[serde(default)]
    pub suffix: String,
}

/// Window of valid times and leads a plot covers.
#[derive(Clone, PartialEq, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidWindow {
    /// Valid instant (or first of a range), `YYYYMMDDHH`.
    pub start: String,

    /// Last valid instant of a range, `YYYYMMDDHH`.
    #[serde(default)]
    pub stop: Option<String>,

    /// Hours between valid instants, `HH`.
    #[serde(default = "ValidWindow::default_increment")]
    pub increment: String,

    /// Shortest lead in hours, `HH`.
    #[serde(default = "ValidWindow::default_min_lead")]
    pub min_lead: String,

    /// Longest lead in hours, `HH`.
    pub max_lead: String,

    /// Hours between leads, `HH`.
    #[serde(default = "ValidWindow::default_increment")]
    pub lead_increment: String,

    /// Accumulation interval in hours, `HH`.
    #[serde(default = "ValidWindow::default_increment")]
    pub accumulation: String,
}

impl ValidWindow {
    fn default_increment() -> String {
        "24".to_string()
    }

    fn default_min_lead() -> String {
        "0".to_string()
    }

    pub fn valid_times(&self) -> Result<Vec<NaiveDateTime>> {
        let start = parse_cycle("valid start", &self.start)?;
        let stop = match &self.stop {
            Some(s) => parse_cycle("valid stop", s)?,
            None => start,
        };
        if stop < start {
            return Err(VerifError::config(
                "valid stop",
                stop.format("%Y%m%d%H"),
                "precedes valid start",
            ));
        }
        let step = parse_step_hours("valid increment", &self.increment)?;
        Ok(cycle_range(start, stop, step))
    }

    /// Candidate leads in hours: `min_lead, min_lead + inc, ..., <= max_lead`.
    pub fn lead_hours(&self) -> Result<Vec<u32>> {
        let min = parse_hours("min lead", &self.min_lead)?;
        let max = parse_hours("max lead", &self.max_lead)?;
        let inc = parse_step_hours("lead increment", &self.lead_increment)?;
        if min > max {
            return Err(VerifError::config(
                "min lead",
                &self.min_lead,
                format!("exceeds max lead {}", self.max_lead),
            ));
        }
        Ok((min..=max).step_by(inc as usize).collect())
    }

    pub fn max_lead_hours(&self) -> Result<u32> {
        parse_hours("max lead", &self.max_lead)
    }

    pub fn accumulation_hours(&self) -> Result<u32> {
        parse_hours("accumulation", &self.accumulation)
    }
}

/// A complete plot request.
#[derive(Clone, PartialEq, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlotRequest {
    pub case: String,

    pub kind: PlotKind,

    /// Statistics to plot; dual-panel plots take two.
    pub statistics: Vec<String>,

    /// Stat family, e.g. `cnt` or `nbrcnt`.
    pub family: String,

    #[serde(default)]
    pub ci: CiMode,

    /// Configurations to plot. Relative-difference plots take the analysis
    /// first and the reference second.
    pub configurations: Vec<ConfigDescriptor>,

    /// Filename prefix the bundles were ingested under.
    pub prefix: String,

    /// Root of the per-initialization bundles.
    pub bundle_root: PathBuf,

    /// Root of rendered figures.
    pub out_root: PathBuf,

    /// Output path below `out_root`, with `{placeholder}` substitution.
    #[serde(default = "PlotRequest::default_template")]
    pub output_template: String,

    /// Restricts which initializations may contribute.
    #[serde(default)]
    pub inits: Option<InitWindow>,

    pub valid: ValidWindow,

    /// Threshold filter, e.g. `">=25.4"`.
    #[serde(default)]
    pub threshold: Option<String>,

    /// Thresholds shown by threshold x lead heatmaps. Empty uses every
    /// threshold found in the data.
    #[serde(default)]
    pub thresholds: Vec<String>,

    pub mask: String,

    /// Tag of the reference analysis, e.g. `StageIV`.
    pub reference: String,

    #[serde(default)]
    pub colorbar: Option<ColorBarSpec>,

    /// Per-panel y-axis limits.
    #[serde(default)]
    pub y_limits: Vec<(f64, f64)>,

    #[serde(default)]
    pub labels: LabelOptions,

    /// Extra label inserted in output filenames.
    #[serde(default)]
    pub filename_label: String,

    /// Report the figure location once rendered.
    #[serde(default)]
    pub show: bool,
}

impl PlotRequest {
    fn default_template() -> String {
        "{case}/{kind}_{family}_{stat}_{mask}_{valid}{thresh}{label}.png".to_string()
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let request: PlotRequest = load_yaml(path)?;
        request.check()?;
        Ok(request)
    }

    pub fn check(&self) -> Result<()> {
        check_non_empty("case", &self.case)?;
        check_non_empty("mask", &self.mask)?;
        if !KNOWN_FAMILIES.contains(&self.family.as_str()) {
            return Err(VerifError::config(
                "stat family",
                &self.family,
                format!("expected one of {}", KNOWN_FAMILIES.join(", ")),
            ));
        }
        let wanted_stats = match self.kind {
            PlotKind::DualLine => 2,
            _ => 1,
        };
        if self.statistics.len() < wanted_stats {
            return Err(VerifError::config(
                "statistics",
                self.statistics.join(","),
                format!("{} plots need {} statistic(s)", self.kind.as_str(), wanted_stats),
            ));
        }
        check_configurations(&self.configurations)?;
        let wanted_configs = match self.kind {
            PlotKind::RelativeDifference => 2,
            _ => 1,
        };
        if self.configurations.len() < wanted_configs {
            return Err(VerifError::config(
                "configurations",
                self.configurations.len(),
                format!("{} plots need {} configuration(s)", self.kind.as_str(), wanted_configs),
            ));
        }
        if let Some(inits) = &self.inits {
            inits.cycles()?;
        }
        self.valid.valid_times()?;
        self.valid.lead_hours()?;
        self.valid.accumulation_hours()?;
        if let Some(colorbar) = &self.colorbar {
            colorbar.check()?;
        }
        if !self.bundle_root.is_dir() {
            return Err(VerifError::MissingDirectory {
                path: self.bundle_root.clone(),
            });
        }
        Ok(())
    }

    /// Earliest and latest initialization allowed to contribute.
    pub fn init_bounds(&self) -> Result<Option<(NaiveDateTime, NaiveDateTime)>> {
        self.inits.as_ref().map(InitWindow::bounds).transpose()
    }

    /// Initialization of the forecast valid at `valid` with lead `lead_hours`.
    pub fn init_for(valid: NaiveDateTime, lead_hours: u32) -> NaiveDateTime {
        valid - Duration::hours(i64::from(lead_hours))
    }
}

fn check_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(VerifError::config(field, value, "must not be empty"));
    }
    Ok(())
}

fn check_configurations(configs: &[ConfigDescriptor]) -> Result<()> {
    if configs.is_empty() {
        return Err(VerifError::config(
            "configurations",
            "[]",
            "at least one configuration is required",
        ));
    }
    for config in configs {
        check_non_empty("configuration name", &config.name)?;
    }
    Ok(())
}
