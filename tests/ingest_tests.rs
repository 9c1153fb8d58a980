//! Ingest and concatenation tests on stat tables written to temp dirs.

use float_cmp::approx_eq;
use grid_stat_vis::concat::{concat_tagged, run_concat, BundleTags, TAG_CONFIG};
use grid_stat_vis::config::{ConcatConfig, ConfigDescriptor, IngestConfig, InitWindow};
use grid_stat_vis::errors::VerifError;
use grid_stat_vis::frame::{ColumnData, COL_LEAD, COL_THRESH};
use grid_stat_vis::ingest::{
    bundle_path, collect_bundle, find_stat_files, ingest_init, parse_stat_text, read_bundle,
    run_ingest, write_bundle, StatBundle, TableParse, INGEST_LOG,
};
use grid_stat_vis::joblog::JobLog;
use grid_stat_vis::parallel::ParallelConfig;
use grid_stat_vis::timeutil::parse_cycle;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const PREFIX: &str = "grid_stat_QPF_24hr";

const CNT_TABLE: &str = "\
VX_MASK FCST_LEAD FCST_VALID_END RMSE PR_CORR
CA_All  240000    20221228_000000 12.3 0.87
";

fn write_table(dir: &Path, name: &str, text: &str) {
    fs::create_dir_all(dir).expect("Failed to create table dir");
    fs::write(dir.join(name), text).expect("Failed to write table");
}

fn frame_bundle(text: &str) -> StatBundle {
    let TableParse::Rows(frame) = parse_stat_text(text, 0) else {
        panic!("expected rows");
    };
    let mut bundle = StatBundle::new();
    bundle.insert("cnt".to_string(), frame);
    bundle
}

fn tags(config: &str) -> BundleTags {
    BundleTags {
        case: "VD".to_string(),
        config: config.to_string(),
        grid: String::new(),
        prefix: PREFIX.to_string(),
    }
}

#[test]
fn test_ingest_single_cnt_table() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let in_dir = temp_dir.path().join("in");
    let out_dir = temp_dir.path().join("out");
    write_table(
        &in_dir,
        "grid_stat_QPF_24hr_240000L_20221228_000000V_cnt.txt",
        CNT_TABLE,
    );

    let outcome = ingest_init(&in_dir, &out_dir, PREFIX).expect("Ingest failed");
    assert_eq!(outcome.files, 1);
    assert_eq!(outcome.skipped, 0);
    assert_eq!(outcome.families, vec!["cnt".to_string()]);
    let path = outcome.bundle.expect("Bundle should be written");
    assert_eq!(path, out_dir.join("grid_stat_QPF_24hr.json"));
    assert!(out_dir.join(INGEST_LOG).is_file());

    let bundle = read_bundle(&path).expect("Failed to read bundle");
    let frame = &bundle["cnt"];
    assert_eq!(frame.len(), 1);
    assert_eq!(frame.index, vec![0]);
    assert_eq!(frame.text("VX_MASK", 0).as_deref(), Some("CA_All"));
    assert_eq!(frame.text(COL_LEAD, 0).as_deref(), Some("240000"));
    let rmse = frame.float("RMSE", 0).expect("RMSE missing");
    assert!(approx_eq!(f64, rmse, 12.3, epsilon = 1e-12));
    let corr = frame.float("PR_CORR", 0).expect("PR_CORR missing");
    assert!(approx_eq!(f64, corr, 0.87, epsilon = 1e-12));
}

#[test]
fn test_parse_missing_tokens_and_short_rows() {
    let text = "\
VX_MASK FCST_LEAD FCST_VALID_END RMSE PR_CORR
CA_All 60000 20221228_000000 NA 0.5
CA_All 120000 20221228_000000 3.5
";
    let TableParse::Rows(frame) = parse_stat_text(text, 7) else {
        panic!("expected rows");
    };
    assert_eq!(frame.index, vec![7, 8]);
    assert!(matches!(frame.column("RMSE").map(|c| &c.data), Some(ColumnData::Float(_))));
    assert_eq!(frame.float("RMSE", 0), None);
    assert_eq!(frame.float("RMSE", 1), Some(3.5));
    assert_eq!(frame.float("PR_CORR", 1), None);
    assert_eq!(frame.text(COL_LEAD, 0).as_deref(), Some("60000"));

    assert_eq!(parse_stat_text("\n  \n", 0), TableParse::Empty);
    assert_eq!(
        parse_stat_text("VX_MASK FCST_LEAD RMSE\n\n", 0),
        TableParse::HeaderOnly
    );
}

#[test]
fn test_collect_bundle_skips_empty_tables() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let dir = temp_dir.path();
    write_table(dir, "grid_stat_QPF_24hr_120000L_20221228_000000V_cnt.txt", CNT_TABLE);
    write_table(dir, "grid_stat_QPF_24hr_240000L_20221228_000000V_cnt.txt", CNT_TABLE);
    write_table(dir, "grid_stat_QPF_24hr_240000L_20221228_000000V_nbrcnt.txt", "");
    write_table(
        dir,
        "grid_stat_QPF_24hr_240000L_20221228_000000V_cts.txt",
        "VX_MASK FCST_LEAD FCST_THRESH CSI\n",
    );
    write_table(dir, "other_prefix_240000L_cnt.txt", CNT_TABLE);

    let log = JobLog::create(&dir.join("collect.log")).expect("Failed to create log");
    let (bundle, files, skipped) = collect_bundle(dir, PREFIX, &log).expect("Collect failed");
    assert_eq!(files, 4);
    assert_eq!(skipped, 2);
    assert_eq!(log.warning_count(), 2);
    assert_eq!(bundle.keys().collect::<Vec<_>>(), vec!["cnt"]);

    // Two tables of one family share a running index
    assert_eq!(bundle["cnt"].index, vec![0, 1]);
}

#[test]
fn test_find_stat_files_errors() {
    let temp_dir = tempdir().expect("Failed to create temp dir");

    let missing = find_stat_files(&temp_dir.path().join("absent"), PREFIX)
        .expect_err("Missing directory must fail");
    assert!(matches!(missing, VerifError::MissingDirectory { .. }));
    assert_eq!(missing.exit_code(), 3);

    let empty = find_stat_files(temp_dir.path(), PREFIX).expect_err("Empty directory must fail");
    assert!(matches!(empty, VerifError::NoMatchingFiles { .. }));
    assert_eq!(empty.exit_code(), 4);
}

#[test]
fn test_bundle_round_trip_keeps_missing_values() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let bundle = frame_bundle(
        "VX_MASK FCST_LEAD FCST_VALID_END RMSE\nCA_All 240000 20221228_000000 NA\n",
    );
    let path = temp_dir.path().join("nested").join("bundle.json");
    write_bundle(&path, &bundle).expect("Failed to write bundle");

    let back = read_bundle(&path).expect("Failed to read bundle");
    assert_eq!(back, bundle);
    assert_eq!(back["cnt"].float("RMSE", 0), None);

    fs::write(&path, b"not json").expect("Failed to corrupt bundle");
    let err = read_bundle(&path).expect_err("Corrupt bundle must fail");
    assert!(matches!(err, VerifError::Bundle { .. }));
    assert!(!err.is_fatal());
}

#[test]
fn test_run_ingest_over_init_window() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let in_root = temp_dir.path().join("tables");
    let out_root = temp_dir.path().join("bundles");
    let inits = ["2022122700", "2022122800"];
    for init in inits {
        write_table(
            &in_root.join("VD").join("NAM").join(init),
            "grid_stat_QPF_24hr_240000L_20221228_000000V_cnt.txt",
            CNT_TABLE,
        );
    }

    let config = IngestConfig {
        case: "VD".to_string(),
        in_root,
        out_root: out_root.clone(),
        prefix: PREFIX.to_string(),
        configurations: vec![ConfigDescriptor::new("NAM")],
        inits: InitWindow {
            start: inits[0].to_string(),
            stop: inits[1].to_string(),
            increment: "24".to_string(),
        },
        threads: Some(2),
    };
    config.check().expect("Config should be valid");

    let summary = run_ingest(&config, &ParallelConfig::with_threads(2)).expect("Ingest failed");
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.written.len(), 2);
    for init in inits {
        let init = parse_cycle("init", init).expect("init");
        let path = bundle_path(&out_root, "VD", "NAM", &init, "", PREFIX);
        assert!(summary.written.contains(&path), "missing {}", path.display());
    }
}

#[test]
fn test_run_ingest_reports_missing_init_directory() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let in_root = temp_dir.path().join("tables");
    write_table(
        &in_root.join("VD").join("NAM").join("2022122700"),
        "grid_stat_QPF_24hr_240000L_20221228_000000V_cnt.txt",
        CNT_TABLE,
    );

    let config = IngestConfig {
        case: "VD".to_string(),
        in_root,
        out_root: temp_dir.path().join("bundles"),
        prefix: PREFIX.to_string(),
        configurations: vec![ConfigDescriptor::new("NAM")],
        inits: InitWindow {
            start: "2022122700".to_string(),
            stop: "2022122800".to_string(),
            increment: "24".to_string(),
        },
        threads: None,
    };
    let err = run_ingest(&config, &ParallelConfig::with_threads(1))
        .expect_err("Missing init directory must fail the run");
    assert!(matches!(err, VerifError::MissingDirectory { .. }));
}

#[test]
fn test_concat_orders_configurations() {
    let rap = frame_bundle(
        "VX_MASK FCST_LEAD FCST_VALID_END RMSE\nCA_All 240000 20221228_000000 9.0\n",
    );
    let nam = frame_bundle(
        "VX_MASK FCST_LEAD FCST_VALID_END RMSE\n\
         CA_All 240000 20221228_000000 11.0\n\
         CA_All 60000 20221228_000000 10.0\n",
    );
    let stats = vec!["RMSE".to_string()];
    let store = concat_tagged(vec![(tags("RAP"), rap), (tags("NAM"), nam)], &stats, &[]);

    let frame = &store["cnt"];
    assert_eq!(frame.len(), 3);
    assert_eq!(frame.index, vec![1, 2, 3]);
    let configs: Vec<String> = (0..3).filter_map(|r| frame.text(TAG_CONFIG, r)).collect();
    assert_eq!(configs, vec!["NAM", "NAM", "RAP"]);
    let leads: Vec<String> = (0..3).filter_map(|r| frame.text(COL_LEAD, r)).collect();
    assert_eq!(leads, vec!["60000", "240000", "240000"]);
    assert_eq!(frame.float("RMSE", 2), Some(9.0));

    // Tables without thresholds yield no threshold column
    assert!(!frame.has_column(COL_THRESH));
}

#[test]
fn test_concat_threshold_levels() {
    let cts = frame_bundle(
        "VX_MASK FCST_LEAD FCST_VALID_END FCST_THRESH CSI\n\
         CA_All 240000 20221228_000000 >=25.4 0.3\n\
         CA_All 240000 20221228_000000 >=101.6 0.1\n\
         CA_All 240000 20221228_000000 >=10.0 0.5\n\
         CA_All 240000 20221228_000000 >=50.8 0.2\n",
    );
    let levels = vec![">=10.0".to_string(), ">=25.4".to_string(), ">=101.6".to_string()];
    let store = concat_tagged(vec![(tags("NAM"), cts)], &["CSI".to_string()], &levels);

    let frame = &store["cnt"];
    assert_eq!(frame.len(), 3);
    let thresholds: Vec<String> = (0..3).filter_map(|r| frame.text(COL_THRESH, r)).collect();
    assert_eq!(thresholds, levels);
    assert_eq!(frame.float("CSI", 0), Some(0.5));
}

#[test]
fn test_run_concat_writes_store() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let bundle_root = temp_dir.path().join("bundles");
    let init = parse_cycle("init", "2022122700").expect("init");
    for config in ["NAM", "RAP"] {
        let path = bundle_path(&bundle_root, "VD", config, &init, "", PREFIX);
        write_bundle(&path, &frame_bundle(CNT_TABLE)).expect("Failed to write bundle");
    }

    let config = ConcatConfig {
        cases: vec!["VD".to_string()],
        bundle_root,
        out_root: temp_dir.path().join("store"),
        label: "vd_concat".to_string(),
        configurations: vec![ConfigDescriptor::new("RAP"), ConfigDescriptor::new("NAM")],
        prefixes: vec![PREFIX.to_string()],
        inits: InitWindow {
            start: "2022122700".to_string(),
            stop: "2022122800".to_string(),
            increment: "24".to_string(),
        },
        statistics: vec!["RMSE".to_string()],
        thresholds: Vec::new(),
    };
    config.check().expect("Config should be valid");

    let path = run_concat(&config).expect("Concat failed");
    assert_eq!(path, temp_dir.path().join("store").join("vd_concat.json"));
    let store = read_bundle(&path).expect("Failed to read store");
    let frame = &store["cnt"];
    assert_eq!(frame.len(), 2);
    assert_eq!(frame.text(TAG_CONFIG, 0).as_deref(), Some("NAM"));
    assert_eq!(frame.text(TAG_CONFIG, 1).as_deref(), Some("RAP"));
    assert!(!frame.has_column("PR_CORR"));

    let log = fs::read_to_string(temp_dir.path().join("store").join("concat.log"))
        .expect("Failed to read concat log");
    assert!(log.contains("Loaded 2 bundles"));
    // The 2022122800 bundles are absent and only warned about
    assert!(log.contains("WARN"));
}
