//! Bundle concatenation
//!
//! Loads the per-initialization bundles of a cases x configurations x grids x
//! prefixes cross product and folds them into one denormalized frame per stat
//! family, tagged with where every row came from.

use crate::config::ConcatConfig;
use crate::errors::Result;
use crate::frame::{SortKey, StatFrame, COL_LEAD, COL_MASK, COL_THRESH, COL_VALID_END};
use crate::ingest::{bundle_path, read_bundle, write_bundle, StatBundle};
use crate::joblog::JobLog;
use crate::ordering::sort_thresholds;
use std::path::PathBuf;

pub const TAG_CASE: &str = "CASE";
pub const TAG_CONFIG: &str = "CFG";
pub const TAG_GRID: &str = "GRID";
pub const TAG_PREFIX: &str = "PREFIX";

/// Row-origin tags, in output column order.
pub const TAG_COLUMNS: [&str; 4] = [TAG_CASE, TAG_CONFIG, TAG_GRID, TAG_PREFIX];

/// Key columns kept from every frame.
pub const KEY_COLUMNS: [&str; 4] = [COL_MASK, COL_VALID_END, COL_LEAD, COL_THRESH];

/// Name of the per-run concatenation log.
pub const CONCAT_LOG: &str = "concat.log";

/// Where a bundle came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleTags {
    pub case: String,
    pub config: String,
    pub grid: String,
    pub prefix: String,
}

/// Statistic columns to keep for `statistics`: each statistic plus whichever
/// of its interval columns the frame carries.
pub fn statistic_columns(frame: &StatFrame, statistics: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    for stat in statistics {
        out.push(stat.clone());
        for suffix in ["_BCL", "_BCU", "_NCL", "_NCU"] {
            let name = format!("{}{}", stat, suffix);
            if frame.has_column(&name) {
                out.push(name);
            }
        }
    }
    out
}

/// Key and statistic columns of `frame`, prefixed with the origin tags.
pub fn tag_frame(frame: &StatFrame, statistics: &[String], tags: &BundleTags) -> StatFrame {
    let stats = statistic_columns(frame, statistics);
    let mut tagged = frame.clone();
    tagged.set_constant_text(TAG_CASE, &tags.case);
    tagged.set_constant_text(TAG_CONFIG, &tags.config);
    tagged.set_constant_text(TAG_GRID, &tags.grid);
    tagged.set_constant_text(TAG_PREFIX, &tags.prefix);

    let order: Vec<&str> = TAG_COLUMNS
        .iter()
        .chain(KEY_COLUMNS.iter())
        .copied()
        .chain(stats.iter().map(String::as_str))
        .collect();
    tagged.select(&order)
}

/// Applies the end-of-run rules to one concatenated frame: ordered
/// threshold categorical, blank-column removal, float coercion of
/// statistics, sort, and a 1-based index.
pub fn finalize_frame(frame: &mut StatFrame, thresholds: &[String]) {
    let levels = if thresholds.is_empty() {
        let mut found = frame.distinct_text(COL_THRESH);
        sort_thresholds(&mut found);
        found
    } else {
        thresholds.to_vec()
    };
    frame.to_category(COL_THRESH, &levels);
    frame.drop_blank_columns();

    let stat_names: Vec<String> = frame
        .column_names()
        .into_iter()
        .filter(|n| !TAG_COLUMNS.contains(n) && !KEY_COLUMNS.contains(n))
        .map(str::to_string)
        .collect();
    for name in &stat_names {
        frame.coerce_float(name);
    }

    frame.sort_by_keys(&[
        SortKey::Text(TAG_CASE),
        SortKey::Text(TAG_CONFIG),
        SortKey::Text(TAG_GRID),
        SortKey::Text(TAG_PREFIX),
        SortKey::Text(COL_MASK),
        SortKey::Text(COL_VALID_END),
        SortKey::Lead(COL_LEAD),
        SortKey::Category(COL_THRESH),
    ]);
    frame.reset_index(1);
}

/// Folds tagged bundles into one frame per family and finalizes them.
pub fn concat_tagged<I>(bundles: I, statistics: &[String], thresholds: &[String]) -> StatBundle
where
    I: IntoIterator<Item = (BundleTags, StatBundle)>,
{
    let mut out = StatBundle::new();
    for (tags, bundle) in bundles {
        for (family, frame) in &bundle {
            let tagged = tag_frame(frame, statistics, &tags);
            match out.get_mut(family) {
                Some(existing) => existing.append(&tagged),
                None => {
                    out.insert(family.clone(), tagged);
                }
            }
        }
    }
    for frame in out.values_mut() {
        finalize_frame(frame, thresholds);
    }
    out
}

/// Loads every bundle named by `config`. Unreadable bundles are logged and
/// skipped.
pub fn load_bundles(config: &ConcatConfig, log: &JobLog) -> Result<Vec<(BundleTags, StatBundle)>> {
    let cycles = config.inits.cycles()?;
    let mut loaded = Vec::new();
    for case in &config.cases {
        for descriptor in &config.configurations {
            for member in descriptor.member_list() {
                let run = descriptor.run_name(&member);
                for grid in descriptor.grid_list() {
                    for prefix in &config.prefixes {
                        for init in &cycles {
                            let path = bundle_path(&config.bundle_root, case, &run, init, &grid, prefix);
                            match read_bundle(&path) {
                                Ok(bundle) => loaded.push((
                                    BundleTags {
                                        case: case.clone(),
                                        config: run.clone(),
                                        grid: grid.clone(),
                                        prefix: prefix.clone(),
                                    },
                                    bundle,
                                )),
                                Err(e) => log.warn(&e.to_string()),
                            }
                        }
                    }
                }
            }
        }
    }
    Ok(loaded)
}

/// Runs a concatenation job and writes the store. Returns its path.
pub fn run_concat(config: &ConcatConfig) -> Result<PathBuf> {
    let log = JobLog::create(&config.out_root.join(CONCAT_LOG))?;
    let loaded = load_bundles(config, &log)?;
    log.info(&format!("Loaded {} bundles", loaded.len()));

    let store = concat_tagged(loaded, &config.statistics, &config.thresholds);
    for (family, frame) in &store {
        log.info(&format!("{}: {} rows, {} columns", family, frame.len(), frame.columns.len()));
    }

    let path = config.store_path();
    write_bundle(&path, &store)?;
    log.info(&format!("Wrote {}", path.display()));
    log.finish();
    Ok(path)
}
