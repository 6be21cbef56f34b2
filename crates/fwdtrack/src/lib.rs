//! `fwdtrack` measures how well forward muon tracks are matched to tracks of the Muon Forward
//! Tracker (MFT). It reads the forward-track, truth-label and MFT-track tables of a simulated
//! dataset, selects the best match for every reference track, and derives the matching
//! efficiency and purity as functions of the track kinematics, together with a scan of the
//! matching-$`\chi^2`$ cut.
//!
//! # Table of Contents
//! - [Key Features](#key-features)
//! - [Installation](#installation)
//! - [Quick Start](#quick-start)
//! - [Data Format](#data-format)
//! - [Configuration](#configuration)
//! - [Outputs](#outputs)
//!
//! # Key Features
//! * Reading ROOT files (through [`oxyroot`](https://github.com/m-dupont/oxyroot)) or
//!   directories of Parquet tables, with a converter from the former to the latter.
//! * Best-match selection of global muons by matching $`\chi^2`$, grouped by their reference
//!   standalone muon.
//! * Efficiency and purity in transverse momentum, pseudorapidity, azimuth, cluster count and
//!   fit $`\chi^2`$, with Clopper-Pearson intervals, and in pairs of these as 2-D maps.
//! * A scan of the matching-$`\chi^2`$ cut which recomputes efficiency and purity at every
//!   threshold.
//! * Per-type distributions of the raw track columns.
//! * JSON and Parquet results, plus PNG plots of everything above.
//!
//! # Installation
//! The command line tool is installed with `cargo`:
//! ```shell
//! cargo install fwdtrack
//! ```
//!
//! # Quick Start
//! ```shell
//! fwdtrack run AO2D.root --config analysis.yaml
//! fwdtrack convert AO2D.root tables/
//! fwdtrack run tables/ --no-plots --output summary.json
//! ```
//! The same pipeline is available as a library:
//! ```rust,no_run
//! use fwdtrack::{run_pipeline, AnalysisConfig};
//!
//! let config = AnalysisConfig::default();
//! let output = run_pipeline("AO2D.root", &config).unwrap();
//! if let Some(results) = &output.report.efficiency {
//!     println!("efficiency = {:.3}, purity = {:.3}", results.efficiency, results.purity);
//! }
//! ```
//!
//! # Data Format
//! Three tables are read, either as trees of a ROOT file (optionally inside a single `DF_*`
//! directory, which is found automatically) or as `<tree>.parquet` files of one directory:
//!
//! | Table               | Column                           | Interpretation                         |
//! | ------------------- | -------------------------------- | -------------------------------------- |
//! | `O2fwdtrack`        | `fX`, `fY`, `fZ`                 | Track position                          |
//! |                     | `fPhi`, `fTgl`, `fSigned1Pt`     | Azimuth, dip tangent, signed $`1/p_T`$  |
//! |                     | `fNClusters`, `fChi2`            | Cluster count and fit $`\chi^2`$        |
//! |                     | `fTrackType`                     | Track type code                         |
//! |                     | `fChi2MatchMCHMID`               | MCH-MID matching $`\chi^2`$             |
//! |                     | `fChi2MatchMCHMFT`               | MCH-MFT matching $`\chi^2`$             |
//! |                     | `fMatchScoreMCHMFT`              | MCH-MFT matching score                  |
//! |                     | `fIndexMFTTracks`                | Row of the matched MFT track            |
//! |                     | `fIndexFwdTracks_MatchMCHTrack`  | Row of the reference track              |
//! | `O2mcfwdtracklabel` | `fMcMask`                        | Truth mask, `0` for a true match        |
//! | `O2mfttrack_001`    | `fMFTClusterSizesAndTrackFlags`  | Packed per-layer cluster sizes          |
//!
//! Only the track table is mandatory. Without truth labels only the distributions are produced;
//! without MFT tracks the cluster counts of global muons are not extended.
//!
//! # Configuration
//! Every setting has a default and can be overridden by a YAML file, see [`AnalysisConfig`].
//!
//! # Outputs
//! Everything is written to `output/` unless configured otherwise: `results.json` holds the
//! whole [`AnalysisReport`], `efficiency_bins.parquet` one row per efficiency or purity bin, and
//! the PNG images are drawn by [`fwdtrack_plot`].
#![warn(clippy::perf, clippy::style, missing_docs)]

use std::path::{Path, PathBuf};

use log::info;

/// Methods for loading and holding the input tables.
pub mod data {
    pub use fwdtrack_core::data::io::{
        convert_root_to_parquet, read_parquet, read_root, write_parquet,
    };
    pub use fwdtrack_core::data::{
        read_dataset, DatasetReadOptions, ForwardDataset, McLabelTable, MftTable, TrackRecord,
        TrackTable,
    };
}
/// Best-match selection and efficiency/purity accumulation.
pub mod matching {
    pub use fwdtrack_core::efficiency::*;
    pub use fwdtrack_core::matching::*;
    pub use fwdtrack_core::optimize::*;
}
/// Binomial intervals and efficiency curves.
pub mod stats {
    pub use fwdtrack_core::stats::*;
}
/// Utility functions, enums, and histogram containers
pub mod utils {
    pub use fwdtrack_core::utils::*;
}
/// PNG rendering of results.
pub mod plot {
    pub use fwdtrack_plot::*;
}

pub use fwdtrack_core::analysis::{
    run_analysis, run_efficiency, AnalysisReport, EfficiencyResults,
};
pub use fwdtrack_core::config::AnalysisConfig;
pub use fwdtrack_core::distributions::{fill_distributions, ColumnDistributions};
pub use fwdtrack_core::output::{read_results_json, write_report, write_results_json};
pub use fwdtrack_core::{
    Binning, EfficiencyCurve, EfficiencyMap, ForwardDataset, FwdTrackError, FwdTrackResult,
    Histogram1D, Histogram2D, ThresholdScan, ThresholdScanResult, TrackColumn, TrackType,
    TrackVariable,
};

/// Everything a call to [`run_pipeline`] produced.
#[derive(Clone, Debug)]
pub struct PipelineOutput {
    /// The analysis results.
    pub report: AnalysisReport,
    /// The JSON and Parquet files that were written.
    pub data_files: Vec<PathBuf>,
    /// The images that were rendered (empty when rendering is disabled).
    pub images: Vec<PathBuf>,
}

/// Read `input`, run every analysis stage, and write the results described by `config`.
///
/// Plotting failures only produce warnings.
///
/// # Errors
///
/// Fails if the input cannot be read, if the configuration is invalid, or if a results file
/// cannot be written.
pub fn run_pipeline<P: AsRef<Path>>(
    input: P,
    config: &AnalysisConfig,
) -> FwdTrackResult<PipelineOutput> {
    let input = input.as_ref().to_string_lossy();
    info!("Reading {input}");
    let dataset = data::read_dataset(&input, &config.input)?;
    let report = run_analysis(&dataset, config)?;
    log_summary(&report);

    let data_files = write_report(&report, config)?;
    let images = if config.render_plots {
        fwdtrack_plot::render_report(&report, &config.output_dir_path()?)
    } else {
        info!("Plot rendering disabled");
        Vec::new()
    };
    Ok(PipelineOutput {
        report,
        data_files,
        images,
    })
}

fn log_summary(report: &AnalysisReport) {
    info!("Processed {} forward tracks", report.n_tracks);
    if let Some(results) = &report.efficiency {
        let counts = &results.counts;
        info!(
            "Efficiency: {:.4} ({} / {} reference tracks)",
            results.efficiency, counts.matched_reference, counts.total_reference
        );
        info!(
            "Purity: {:.4} ({} / {} global muons)",
            results.purity, counts.true_global, counts.total_global
        );
        info!(
            "Best chi2 threshold: {} (efficiency × purity = {:.4})",
            results.scan.best_threshold, results.scan.best_product
        );
    }
}
