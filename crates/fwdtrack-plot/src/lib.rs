//! # fwdtrack-plot
//!
//! PNG rendering for `fwdtrack` results: efficiency and purity curves, their 2-D maps, the
//! matching-$`\chi^2`$ threshold scan and the per-type raw-column distributions. Every image
//! is drawn with [`plotters`] on a bitmap backend.
#![warn(clippy::perf, clippy::style, missing_docs)]

use std::{
    fs,
    path::{Path, PathBuf},
};

use fwdtrack_core::{
    analysis::{AnalysisReport, EfficiencyResults},
    distributions::ColumnDistributions,
    EffPurityHists2D, EfficiencyCurve, EfficiencyMap, FwdTrackError, FwdTrackResult,
    ThresholdScanResult, TrackVariable,
};
use indexmap::IndexMap;
use log::{info, warn};

/// Efficiency and purity curves, alone, combined, and as a summary panel.
pub mod curves;
/// Raw-column distribution panels.
pub mod distributions;
/// 2-D heat maps.
pub mod maps;
/// The threshold-scan curve.
pub mod scan;
/// Shared sizes, colors and axis helpers.
pub mod style;

/// Subdirectory of the output directory holding the distribution images.
pub const TRACK_CLASS_DIR: &str = "track_class";

pub(crate) type PlotResult<T> = Result<T, Box<dyn std::error::Error>>;

fn to_fwdtrack<T>(result: PlotResult<T>) -> FwdTrackResult<T> {
    result.map_err(|err| FwdTrackError::Plot(err.to_string()))
}

/// Draw the efficiency vs `variable` with asymmetric interval bars.
pub fn plot_efficiency(
    path: &Path,
    variable: TrackVariable,
    curve: &EfficiencyCurve,
) -> FwdTrackResult<()> {
    to_fwdtrack(curves::render_efficiency(path, variable, curve))
}

/// Draw the purity vs `variable` with asymmetric interval bars.
pub fn plot_purity(
    path: &Path,
    variable: TrackVariable,
    curve: &EfficiencyCurve,
) -> FwdTrackResult<()> {
    to_fwdtrack(curves::render_purity(path, variable, curve))
}

/// Draw efficiency and purity vs `variable` on one chart.
pub fn plot_combined(
    path: &Path,
    variable: TrackVariable,
    efficiency: &EfficiencyCurve,
    purity: &EfficiencyCurve,
) -> FwdTrackResult<()> {
    to_fwdtrack(curves::render_combined(path, variable, efficiency, purity))
}

/// Draw the efficiency curves of [`curves::SUMMARY_VARIABLES`] as a 2×2 panel.
pub fn plot_summary(
    path: &Path,
    curves: &IndexMap<TrackVariable, EfficiencyCurve>,
) -> FwdTrackResult<()> {
    to_fwdtrack(curves::render_summary(path, curves))
}

/// Draw a 2-D efficiency or purity map. `x` decides whether the x axis is logarithmic.
pub fn plot_map(
    path: &Path,
    x: TrackVariable,
    map: &EfficiencyMap,
    value_label: &str,
) -> FwdTrackResult<()> {
    to_fwdtrack(maps::render_map(path, map, value_label, style::is_log_axis(x)))
}

/// Draw the threshold scan with its maximum marked.
pub fn plot_threshold_scan(path: &Path, scan: &ThresholdScanResult) -> FwdTrackResult<()> {
    to_fwdtrack(scan::render_threshold_scan(path, scan))
}

/// Draw one panel per track type for a raw column.
pub fn plot_distributions(path: &Path, distributions: &ColumnDistributions) -> FwdTrackResult<()> {
    to_fwdtrack(distributions::render_distributions(path, distributions))
}

/// Collects the paths of successfully drawn images and logs the failures.
struct Renderer {
    written: Vec<PathBuf>,
    failed: usize,
}

impl Renderer {
    fn attempt(&mut self, path: PathBuf, draw: impl FnOnce(&Path) -> FwdTrackResult<()>) {
        match draw(&path) {
            Ok(()) => self.written.push(path),
            Err(err) => {
                warn!("Failed to render {}: {err}", path.display());
                self.failed += 1;
            }
        }
    }

    fn efficiency_images(
        &mut self,
        results: &EfficiencyResults,
        output_dir: &Path,
        pairs: &[(TrackVariable, TrackVariable)],
    ) {
        for variable in results.histograms.hists.keys().copied() {
            let efficiency = results.efficiency_curves.get(&variable);
            let purity = results.purity_curves.get(&variable);
            match efficiency {
                Some(curve) => {
                    let path = output_dir.join(format!("Efficiency_{variable}.png"));
                    self.attempt(path, |path| plot_efficiency(path, variable, curve));
                }
                None => warn!("No efficiency curve for {variable}, skipping its plot"),
            }
            match purity {
                Some(curve) => {
                    let path = output_dir.join(format!("Purity_{variable}.png"));
                    self.attempt(path, |path| plot_purity(path, variable, curve));
                }
                None => warn!("No purity curve for {variable}, skipping its plot"),
            }
            if let (Some(efficiency), Some(purity)) = (efficiency, purity) {
                self.attempt(output_dir.join(format!("Combined_{variable}.png")), |path| {
                    plot_combined(path, variable, efficiency, purity)
                });
            }
        }

        if results.efficiency_curves.is_empty() {
            warn!("No efficiency curves, skipping the summary plot");
        } else {
            self.attempt(output_dir.join("Summary_Efficiency.png"), |path| {
                plot_summary(path, &results.efficiency_curves)
            });
        }

        for &(x, y) in pairs {
            let pair = EffPurityHists2D::pair_name(x, y);
            let efficiency = results
                .efficiency_maps
                .iter()
                .find(|map| map.name == format!("eff2D_{pair}"));
            match efficiency {
                Some(map) => {
                    let path = output_dir.join(format!("Eff2D_{pair}.png"));
                    self.attempt(path, |path| plot_map(path, x, map, "Efficiency"));
                }
                None => warn!("No efficiency map for {pair}, skipping its plot"),
            }
            let purity = results
                .purity_maps
                .iter()
                .find(|map| map.name == format!("pur2D_{pair}"));
            match purity {
                Some(map) => {
                    let path = output_dir.join(format!("Pur2D_{pair}.png"));
                    self.attempt(path, |path| plot_map(path, x, map, "Purity"));
                }
                None => warn!("No purity map for {pair}, skipping its plot"),
            }
        }

        self.attempt(output_dir.join("Chi2Optimization.png"), |path| {
            plot_threshold_scan(path, &results.scan)
        });
    }
}

/// Render every image of `report` into `output_dir` and return the paths that were written.
///
/// Failures of individual images are logged and skipped.
pub fn render_report(report: &AnalysisReport, output_dir: &Path) -> Vec<PathBuf> {
    let mut renderer = Renderer {
        written: Vec::new(),
        failed: 0,
    };
    let track_class_dir = output_dir.join(TRACK_CLASS_DIR);
    if let Err(err) = fs::create_dir_all(&track_class_dir) {
        warn!("Cannot create {}: {err}", track_class_dir.display());
        return renderer.written;
    }

    for distributions in &report.distributions {
        let path = track_class_dir.join(format!("{}.png", distributions.column.branch_name()));
        renderer.attempt(path, |path| plot_distributions(path, distributions));
    }
    match &report.efficiency {
        Some(results) => renderer.efficiency_images(results, output_dir, &report.config.pairs),
        None => warn!("No efficiency results, skipping efficiency and purity plots"),
    }

    info!(
        "Rendered {} images into {} ({} failed)",
        renderer.written.len(),
        output_dir.display(),
        renderer.failed
    );
    renderer.written
}

#[cfg(test)]
mod tests {
    use super::*;
    use fwdtrack_core::{data::test_dataset, run_analysis, AnalysisConfig, Binning, Histogram1D};
    use tempfile::tempdir;

    #[test]
    fn test_render_report_never_fails() {
        let dir = tempdir().unwrap();
        let report = run_analysis(&test_dataset(), &AnalysisConfig::default()).unwrap();
        let written = render_report(&report, dir.path());
        assert!(dir.path().join(TRACK_CLASS_DIR).is_dir());
        // drawing may fail on hosts without fonts, but whatever was reported exists
        assert!(written.iter().all(|path| path.is_file()));
        assert!(written.iter().all(|path| path.starts_with(dir.path())));
    }

    #[test]
    fn test_render_without_efficiency() {
        let dir = tempdir().unwrap();
        let mut dataset = test_dataset();
        dataset.labels = None;
        let report = run_analysis(&dataset, &AnalysisConfig::default()).unwrap();
        let written = render_report(&report, dir.path());
        assert!(written
            .iter()
            .all(|path| path.parent() == Some(dir.path().join(TRACK_CLASS_DIR).as_path())));
    }

    #[test]
    fn test_plot_errors_become_fwdtrack_errors() {
        let scan = ThresholdScanResult {
            histogram: Histogram1D::new("h", "h", Binning::uniform(1, 0.0, 1.0)),
            points: Vec::new(),
            best_threshold: 0.0,
            best_product: 0.0,
        };
        let dir = tempdir().unwrap();
        let result = plot_threshold_scan(&dir.path().join("scan.png"), &scan);
        assert!(matches!(result, Err(FwdTrackError::Plot(_))));
    }
}
