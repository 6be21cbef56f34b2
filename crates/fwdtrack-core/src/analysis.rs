use indexmap::IndexMap;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    config::AnalysisConfig,
    data::ForwardDataset,
    distributions::{fill_distributions, ColumnDistributions},
    efficiency::{EffPurityHists2D, EfficiencyHistograms, MatchCounts},
    matching::{collect_match_candidates, select_best_matches},
    optimize::ThresholdScanResult,
    stats::{EfficiencyCurve, EfficiencyMap},
    utils::variables::TrackVariable,
    FwdTrackError, FwdTrackResult,
};

/// The products of the efficiency/purity stage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyResults {
    /// The matching-$`\chi^2`$ threshold used for best-match selection.
    pub chi2_threshold: f64,
    /// Scalar counts over the acceptance.
    pub counts: MatchCounts,
    /// Overall matching efficiency.
    pub efficiency: f64,
    /// Overall matching purity.
    pub purity: f64,
    /// Every accumulated histogram.
    pub histograms: EfficiencyHistograms,
    /// `eff_<var>` for each variable with a non-empty denominator.
    pub efficiency_curves: IndexMap<TrackVariable, EfficiencyCurve>,
    /// `pur_<var>` for each variable with a non-empty denominator.
    pub purity_curves: IndexMap<TrackVariable, EfficiencyCurve>,
    /// `eff2D_<x>_vs_<y>` for each pair with a non-empty denominator.
    pub efficiency_maps: Vec<EfficiencyMap>,
    /// `pur2D_<x>_vs_<y>` for each pair with a non-empty denominator.
    pub purity_maps: Vec<EfficiencyMap>,
    /// The matching-$`\chi^2`$ threshold scan.
    pub scan: ThresholdScanResult,
}

/// Everything a batch run produces.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// The configuration of the run.
    pub config: AnalysisConfig,
    /// Number of rows in the track table.
    pub n_tracks: usize,
    /// Raw-column distributions per track type.
    pub distributions: Vec<ColumnDistributions>,
    /// Efficiency and purity, absent when the input had no truth labels.
    pub efficiency: Option<EfficiencyResults>,
}

/// Run every analysis stage on `dataset`.
///
/// A dataset without truth labels still yields the distributions; the efficiency stage is
/// skipped with an error message.
///
/// # Errors
///
/// Fails on an invalid configuration or on any error other than missing labels.
pub fn run_analysis(
    dataset: &ForwardDataset,
    config: &AnalysisConfig,
) -> FwdTrackResult<AnalysisReport> {
    config.validate()?;
    info!("Filling track-class distributions");
    let distributions = fill_distributions(
        dataset,
        &config.distribution_types,
        config.normalize_distributions,
    );

    info!("Computing matching efficiency and purity");
    let efficiency = match run_efficiency(dataset, config) {
        Ok(results) => Some(results),
        Err(FwdTrackError::MissingTable { name }) => {
            error!(
                "Cannot compute efficiency: {name} not available (expected table \"{}\")",
                config.input.labels_tree
            );
            None
        }
        Err(err) => return Err(err),
    };

    Ok(AnalysisReport {
        config: config.clone(),
        n_tracks: dataset.n_tracks(),
        distributions,
        efficiency,
    })
}

/// Select best matches, accumulate histograms, derive curves and maps, and run the scan.
pub fn run_efficiency(
    dataset: &ForwardDataset,
    config: &AnalysisConfig,
) -> FwdTrackResult<EfficiencyResults> {
    let candidates = collect_match_candidates(dataset, config.chi2_threshold)?;
    let best_matches = select_best_matches(&candidates, config.chi2_threshold);
    info!(
        "Selected {} best matches out of {} candidate groups",
        best_matches.len(),
        candidates.len()
    );

    let mut histograms = EfficiencyHistograms::new(&config.variables, &config.pairs)?;
    histograms.fill(dataset, &best_matches, config.combine_mft_clusters)?;

    let level = config.confidence_level;
    let mut efficiency_curves = IndexMap::new();
    let mut purity_curves = IndexMap::new();
    for (variable, hists) in &histograms.hists {
        if hists.eff_den.integral() > 0.0 {
            let curve = EfficiencyCurve::from_histograms(
                format!("eff_{variable}"),
                format!("Matching efficiency vs {variable}"),
                &hists.eff_num,
                &hists.eff_den,
                level,
            )?;
            efficiency_curves.insert(*variable, curve);
        } else {
            warn!("Efficiency denominator for {variable} is empty, skipping");
        }
        if hists.purity_total.integral() > 0.0 {
            let curve = EfficiencyCurve::from_histograms(
                format!("pur_{variable}"),
                format!("Matching purity vs {variable}"),
                &hists.purity_true,
                &hists.purity_total,
                level,
            )?;
            purity_curves.insert(*variable, curve);
        } else {
            warn!("Purity denominator for {variable} is empty, skipping");
        }
    }

    let mut efficiency_maps = Vec::new();
    let mut purity_maps = Vec::new();
    for hists in &histograms.hists_2d {
        let pair = EffPurityHists2D::pair_name(hists.x, hists.y);
        if hists.eff_den.integral() > 0.0 {
            efficiency_maps.push(EfficiencyMap::from_histograms(
                format!("eff2D_{pair}"),
                format!("Matching efficiency, {} vs {}", hists.x, hists.y),
                &hists.eff_num,
                &hists.eff_den,
                level,
            )?);
        } else {
            warn!("Efficiency denominator for {pair} is empty, skipping");
        }
        if hists.purity_total.integral() > 0.0 {
            purity_maps.push(EfficiencyMap::from_histograms(
                format!("pur2D_{pair}"),
                format!("Matching purity, {} vs {}", hists.x, hists.y),
                &hists.purity_true,
                &hists.purity_total,
                level,
            )?);
        } else {
            warn!("Purity denominator for {pair} is empty, skipping");
        }
    }

    info!("Scanning the matching chi2 threshold");
    let scan = config.scan.run(dataset)?;

    Ok(EfficiencyResults {
        chi2_threshold: config.chi2_threshold,
        counts: histograms.counts,
        efficiency: histograms.counts.efficiency(),
        purity: histograms.counts.purity(),
        histograms,
        efficiency_curves,
        purity_curves,
        efficiency_maps,
        purity_maps,
        scan,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_dataset;
    use approx::assert_relative_eq;

    #[test]
    fn test_full_analysis() {
        let report = run_analysis(&test_dataset(), &AnalysisConfig::default()).unwrap();
        assert_eq!(report.n_tracks, 9);
        assert_eq!(report.distributions.len(), 10);
        let efficiency = report.efficiency.unwrap();
        assert_relative_eq!(efficiency.efficiency, 0.5);
        assert_relative_eq!(efficiency.purity, 0.75);
        assert_eq!(efficiency.efficiency_curves.len(), 5);
        assert_eq!(efficiency.efficiency_maps.len(), 6);
        assert_eq!(efficiency.efficiency_curves[&TrackVariable::Pt].name, "eff_pt");
        assert_eq!(efficiency.purity_maps[0].name, "pur2D_pt_vs_phi");
        assert_relative_eq!(efficiency.scan.best_threshold, 3.0);
    }

    #[test]
    fn test_missing_labels_skip_efficiency() {
        let mut dataset = test_dataset();
        dataset.labels = None;
        let report = run_analysis(&dataset, &AnalysisConfig::default()).unwrap();
        assert!(report.efficiency.is_none());
        assert_eq!(report.distributions.len(), 10);
    }

    #[test]
    fn test_empty_denominators_are_skipped() {
        let mut dataset = test_dataset();
        // make every row a global muon, leaving no reference tracks
        dataset.tracks.track_type.iter_mut().for_each(|t| *t = 0);
        let efficiency = run_analysis(&dataset, &AnalysisConfig::default())
            .unwrap()
            .efficiency
            .unwrap();
        assert!(efficiency.efficiency_curves.is_empty());
        assert!(efficiency.efficiency_maps.is_empty());
        assert_eq!(efficiency.purity_curves.len(), 5);
        assert_relative_eq!(efficiency.efficiency, 0.0);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = AnalysisConfig {
            confidence_level: 0.0,
            ..Default::default()
        };
        assert!(run_analysis(&test_dataset(), &config).is_err());
    }
}
