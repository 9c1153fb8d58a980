//! Bundle loading and row selection for plots
//!
//! A forecast valid at V with lead L was initialized at V - L, so the rows a
//! plot needs are spread over many per-initialization bundles. The loader
//! reads each bundle at most once, keeps the rows of the requested stat
//! family and mask, and answers point lookups by (valid end, lead, threshold).

use crate::config::{ConfigDescriptor, PlotRequest};
use crate::errors::{Result, VerifError};
use crate::frame::{StatFrame, COL_LEAD, COL_MASK, COL_THRESH, COL_VALID_END};
use crate::ingest::{bundle_path, read_bundle, StatBundle};
use crate::ordering::{compare_leads, sort_leads, sort_thresholds};
use crate::plot::labels::descriptor_label;
use crate::timeutil::{lead_hours, valid_end_string};
use chrono::NaiveDateTime;
use log::{debug, warn};
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

/// One plotted line or panel: a configuration member on one grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    pub config: usize,
    pub run: String,
    pub member: String,
    pub grid: String,
    pub label: String,
}

/// Expands the request's configurations into sources, in request order.
pub fn sources(request: &PlotRequest) -> Vec<Source> {
    let mut out = Vec::new();
    for (idx, descriptor) in request.configurations.iter().enumerate() {
        out.extend(descriptor_sources(idx, descriptor, request));
    }
    out
}

fn descriptor_sources(idx: usize, descriptor: &ConfigDescriptor, request: &PlotRequest) -> Vec<Source> {
    let mut out = Vec::new();
    for member in descriptor.member_list() {
        for grid in descriptor.grid_list() {
            out.push(Source {
                config: idx,
                run: descriptor.run_name(&member),
                label: descriptor_label(descriptor, &member, &grid, &request.labels),
                member: member.clone(),
                grid,
            });
        }
    }
    out
}

/// Rows of one source, restricted to the request's family and mask.
#[derive(Debug, Clone)]
pub struct SourceData {
    pub source: Source,
    pub frame: StatFrame,
}

impl SourceData {
    fn row(&self, valid_end: &str, lead: &str, threshold: Option<&str>) -> Option<usize> {
        (0..self.frame.len()).find(|&r| {
            self.frame.text(COL_VALID_END, r).as_deref() == Some(valid_end)
                && self.frame.text(COL_LEAD, r).as_deref() == Some(lead)
                && threshold.map_or(true, |t| self.frame.text(COL_THRESH, r).as_deref() == Some(t))
        })
    }

    /// Value of `stat` at (valid end, lead, threshold), if present.
    pub fn value(&self, valid_end: &str, lead: &str, threshold: Option<&str>, stat: &str) -> Option<f64> {
        let row = self.row(valid_end, lead, threshold)?;
        self.frame.float(stat, row)
    }

    /// Lead strings present, in lead order.
    pub fn leads(&self) -> Vec<String> {
        let mut leads = self.frame.distinct_text(COL_LEAD);
        sort_leads(&mut leads);
        leads
    }

    /// Threshold strings present, in threshold order.
    pub fn thresholds(&self) -> Vec<String> {
        let mut thresholds = self.frame.distinct_text(COL_THRESH);
        sort_thresholds(&mut thresholds);
        thresholds
    }

    pub fn has_stat(&self, stat: &str) -> bool {
        self.frame.has_column(stat)
    }

    /// Without a requested threshold every (valid, lead) cell must come from
    /// a single threshold; rows carrying several make the plot ambiguous.
    pub fn require_single_threshold(&self, threshold: Option<&str>) -> Result<()> {
        if threshold.is_some() {
            return Ok(());
        }
        let found = self.thresholds();
        if found.len() > 1 {
            return Err(VerifError::config(
                "threshold",
                "<unset>",
                format!(
                    "{} rows of {} carry thresholds {}; name one",
                    self.frame.len(),
                    self.source.label,
                    found.join(", ")
                ),
            ));
        }
        Ok(())
    }
}

/// Reads bundles for a plot request, caching by path.
pub struct BundleLoader<'a> {
    request: &'a PlotRequest,
    cache: HashMap<PathBuf, Option<StatBundle>>,
}

impl<'a> BundleLoader<'a> {
    pub fn new(request: &'a PlotRequest) -> Self {
        Self {
            request,
            cache: HashMap::new(),
        }
    }

    fn bundle(&mut self, source: &Source, init: &NaiveDateTime) -> Option<&StatBundle> {
        let request = self.request;
        let path = bundle_path(
            &request.bundle_root,
            &request.case,
            &source.run,
            init,
            &source.grid,
            &request.prefix,
        );
        self.cache
            .entry(path)
            .or_insert_with_key(|path| match read_bundle(path) {
                Ok(bundle) => {
                    debug!("Loaded bundle {}", path.display());
                    Some(bundle)
                }
                Err(e) => {
                    warn!("{}", e);
                    None
                }
            })
            .as_ref()
    }

    /// Loads the family rows of `source` for every (valid, lead) pair. Rows
    /// are filtered to the request's mask and, when set, its threshold.
    ///
    /// Fails with a configuration error when rows were found but none of them
    /// carry the requested mask.
    pub fn load(&mut self, source: &Source, valids: &[NaiveDateTime], leads: &[u32]) -> Result<SourceData> {
        let request = self.request;
        let bounds = request.init_bounds()?;
        let mut inits = BTreeSet::new();
        for valid in valids {
            for lead in leads {
                let init = PlotRequest::init_for(*valid, *lead);
                if bounds.map_or(true, |(lo, hi)| init >= lo && init <= hi) {
                    inits.insert(init);
                }
            }
        }

        let valid_ends: Vec<String> = valids.iter().map(valid_end_string).collect();
        let mut family_rows = StatFrame::default();
        let mut masks_seen: BTreeSet<String> = BTreeSet::new();
        for init in &inits {
            let Some(bundle) = self.bundle(source, init) else {
                continue;
            };
            let Some(frame) = bundle.get(&request.family) else {
                continue;
            };
            masks_seen.extend(frame.distinct_text(COL_MASK));
            let rows = frame.filter(|f, r| {
                f.text(COL_MASK, r).as_deref() == Some(request.mask.as_str())
                    && f.text(COL_VALID_END, r)
                        .map_or(false, |v| valid_ends.contains(&v))
                    && request
                        .threshold
                        .as_deref()
                        .map_or(true, |t| f.text(COL_THRESH, r).as_deref() == Some(t))
            });
            family_rows.append(&rows);
        }

        if family_rows.is_empty() && !masks_seen.is_empty() && !masks_seen.contains(&request.mask) {
            return Err(VerifError::config(
                "mask",
                &request.mask,
                format!(
                    "not present in {} rows (found {})",
                    request.family,
                    masks_seen.into_iter().collect::<Vec<_>>().join(", ")
                ),
            ));
        }
        Ok(SourceData {
            source: source.clone(),
            frame: family_rows,
        })
    }

    /// Loads every source and drops those without rows or without `stats`,
    /// reporting each as a data warning.
    pub fn load_all(
        &mut self,
        sources: &[Source],
        valids: &[NaiveDateTime],
        leads: &[u32],
        stats: &[&str],
    ) -> Result<Vec<SourceData>> {
        let mut out = Vec::new();
        for source in sources {
            let data = self.load(source, valids, leads)?;
            if data.frame.is_empty() {
                warn!("{}", no_rows_error(self.request, source));
                continue;
            }
            if let Some(missing) = stats.iter().find(|s| !data.has_stat(s)) {
                warn!(
                    "{}",
                    VerifError::Data(format!(
                        "statistic {} absent from {} rows of {}",
                        missing, self.request.family, source.label
                    ))
                );
                continue;
            }
            out.push(data);
        }
        Ok(out)
    }
}

fn no_rows_error(request: &PlotRequest, source: &Source) -> VerifError {
    VerifError::Data(format!(
        "no {} rows for {} with mask {}{}",
        request.family,
        source.label,
        request.mask,
        request
            .threshold
            .as_deref()
            .map(|t| format!(" and threshold {}", t))
            .unwrap_or_default()
    ))
}

/// How lead sets of several sources combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadMerge {
    /// Leads present in any source (side-by-side lines).
    Union,
    /// Leads present in every source (differences).
    Intersection,
}

/// Sorted lead strings of `data`, combined per `merge` and trimmed to
/// leads of at most `max_lead` hours.
pub fn enumerate_leads(data: &[SourceData], max_lead: u32, merge: LeadMerge) -> Vec<String> {
    let mut sets = data.iter().map(|d| d.leads().into_iter().collect::<BTreeSet<String>>());
    let Some(first) = sets.next() else {
        return Vec::new();
    };
    let combined = sets.fold(first, |acc, set| match merge {
        LeadMerge::Union => acc.union(&set).cloned().collect(),
        LeadMerge::Intersection => acc.intersection(&set).cloned().collect(),
    });
    let mut leads: Vec<String> = combined
        .into_iter()
        .filter(|l| lead_hours(l).map_or(false, |h| h <= max_lead))
        .collect();
    leads.sort_by(|a, b| compare_leads(a, b));
    leads
}
