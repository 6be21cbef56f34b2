use std::fs;

use approx::assert_relative_eq;
use fwdtrack::{
    data::{write_parquet, DatasetReadOptions},
    read_results_json, run_pipeline, AnalysisConfig, FwdTrackError, TrackVariable,
};
use fwdtrack_core::data::test_dataset;
use tempfile::tempdir;

fn config_in(dir: &std::path::Path) -> AnalysisConfig {
    AnalysisConfig {
        output_dir: dir.join("output").to_string_lossy().into_owned(),
        render_plots: false,
        ..Default::default()
    }
}

#[test]
fn test_pipeline_on_parquet_directory() {
    let dir = tempdir().unwrap();
    let tables = dir.path().join("tables");
    let tables = tables.to_string_lossy();
    write_parquet(&test_dataset(), &tables, &DatasetReadOptions::default()).unwrap();
    assert!(dir.path().join("tables").join("O2fwdtrack.parquet").is_file());

    let config = config_in(dir.path());
    let output = run_pipeline(&*tables, &config).unwrap();
    assert!(output.images.is_empty());
    assert_eq!(output.data_files.len(), 2);
    assert_eq!(output.report.n_tracks, 9);

    let results = output.report.efficiency.as_ref().unwrap();
    assert_relative_eq!(results.efficiency, 0.5);
    assert_relative_eq!(results.purity, 0.75);
    assert_relative_eq!(results.scan.best_threshold, 3.0);

    let reloaded = read_results_json(&dir.path().join("output").join("results.json")).unwrap();
    let reloaded = reloaded.efficiency.unwrap();
    assert_eq!(reloaded.counts, results.counts);
    assert_eq!(
        reloaded.efficiency_curves[&TrackVariable::Eta].points.len(),
        1
    );
    assert!(dir
        .path()
        .join("output")
        .join("efficiency_bins.parquet")
        .is_file());
}

#[test]
fn test_results_file_override() {
    let dir = tempdir().unwrap();
    let tables = dir.path().join("tables").to_string_lossy().into_owned();
    write_parquet(&test_dataset(), &tables, &DatasetReadOptions::default()).unwrap();

    let results_file = dir.path().join("summary").join("run.json");
    let config = AnalysisConfig {
        results_file: Some(results_file.to_string_lossy().into_owned()),
        ..config_in(dir.path())
    };
    let output = run_pipeline(&tables, &config).unwrap();
    assert_eq!(output.data_files[0], results_file);
    assert!(results_file.is_file());
}

#[test]
fn test_pipeline_without_truth_labels() {
    let dir = tempdir().unwrap();
    let tables = dir.path().join("tables");
    let tables_str = tables.to_string_lossy().into_owned();
    write_parquet(&test_dataset(), &tables_str, &DatasetReadOptions::default()).unwrap();
    fs::remove_file(tables.join("O2mcfwdtracklabel.parquet")).unwrap();

    let output = run_pipeline(&tables_str, &config_in(dir.path())).unwrap();
    assert!(output.report.efficiency.is_none());
    assert_eq!(output.report.distributions.len(), 10);
    // only the JSON results, no efficiency table
    assert_eq!(output.data_files.len(), 1);
}

#[test]
fn test_pipeline_without_track_table_fails() {
    let dir = tempdir().unwrap();
    let tables = dir.path().join("tables");
    let tables_str = tables.to_string_lossy().into_owned();
    write_parquet(&test_dataset(), &tables_str, &DatasetReadOptions::default()).unwrap();
    fs::remove_file(tables.join("O2fwdtrack.parquet")).unwrap();

    let result = run_pipeline(&tables_str, &config_in(dir.path()));
    assert!(matches!(result, Err(FwdTrackError::MissingTable { .. })));
    assert!(!dir.path().join("output").join("results.json").exists());
}
