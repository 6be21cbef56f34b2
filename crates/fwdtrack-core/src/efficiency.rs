use indexmap::IndexMap;
use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    data::ForwardDataset,
    matching::BestMatches,
    utils::{
        enums::TrackType,
        variables::{is_in_acceptance, TrackKinematics, TrackVariable},
        Binning, Histogram1D, Histogram2D,
    },
    FwdTrackError, FwdTrackResult,
};

/// The four efficiency/purity histograms of one variable.
///
/// The efficiency denominator counts standalone reference tracks and the numerator those of
/// them whose best match is a true match. The purity histograms count global muons and the
/// correctly matched ones among them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EffPurityHists {
    /// The binned variable.
    pub variable: TrackVariable,
    /// `hEffDen_<var>`
    pub eff_den: Histogram1D,
    /// `hEffNum_<var>`
    pub eff_num: Histogram1D,
    /// `hPurityTrue_<var>`
    pub purity_true: Histogram1D,
    /// `hPurityTotal_<var>`
    pub purity_total: Histogram1D,
}

impl EffPurityHists {
    /// Book empty histograms for `variable` with the given binning.
    pub fn new(variable: TrackVariable, binning: &Binning) -> Self {
        let name = variable.name();
        let book = |prefix: &str, title: &str| {
            Histogram1D::new(
                format!("{prefix}_{name}"),
                format!("{title} vs {name}"),
                binning.clone(),
            )
            .with_x_label(variable.axis_label())
        };
        Self {
            variable,
            eff_den: book("hEffDen", "Efficiency denominator"),
            eff_num: book("hEffNum", "Efficiency numerator"),
            purity_true: book("hPurityTrue", "True matches"),
            purity_total: book("hPurityTotal", "All matches"),
        }
    }

    fn fill_reference(&mut self, kinematics: &TrackKinematics, matched: bool) {
        let value = self.variable.value(kinematics);
        self.eff_den.fill(value);
        if matched {
            self.eff_num.fill(value);
        }
    }

    fn fill_global(&mut self, kinematics: &TrackKinematics, correct: bool) {
        let value = self.variable.value(kinematics);
        self.purity_total.fill(value);
        if correct {
            self.purity_true.fill(value);
        }
    }
}

/// The four efficiency/purity histograms of one pair of variables.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EffPurityHists2D {
    /// The variable on the x axis.
    pub x: TrackVariable,
    /// The variable on the y axis.
    pub y: TrackVariable,
    /// `hEffDen_<x>_vs_<y>`
    pub eff_den: Histogram2D,
    /// `hEffNum_<x>_vs_<y>`
    pub eff_num: Histogram2D,
    /// `hPurityTrue_<x>_vs_<y>`
    pub purity_true: Histogram2D,
    /// `hPurityTotal_<x>_vs_<y>`
    pub purity_total: Histogram2D,
}

impl EffPurityHists2D {
    /// Book empty histograms for the pair `(x, y)`.
    pub fn new(
        x: TrackVariable,
        x_binning: &Binning,
        y: TrackVariable,
        y_binning: &Binning,
    ) -> Self {
        let template = Histogram2D::new(
            format!("hEffDen_{}", Self::pair_name(x, y)),
            format!("Efficiency denominator, {x} vs {y}"),
            x_binning.clone(),
            y_binning.clone(),
        )
        .with_labels(x.axis_label(), y.axis_label());
        let book = |prefix: &str, title: &str| {
            let mut hist = template.empty_like(format!("{prefix}_{}", Self::pair_name(x, y)));
            hist.title = format!("{title}, {x} vs {y}");
            hist
        };
        Self {
            x,
            y,
            eff_num: book("hEffNum", "Efficiency numerator"),
            purity_true: book("hPurityTrue", "True matches"),
            purity_total: book("hPurityTotal", "All matches"),
            eff_den: template,
        }
    }

    /// The `<x>_vs_<y>` suffix used in names.
    pub fn pair_name(x: TrackVariable, y: TrackVariable) -> String {
        format!("{x}_vs_{y}")
    }

    fn fill_reference(&mut self, kinematics: &TrackKinematics, matched: bool) {
        let (x, y) = (self.x.value(kinematics), self.y.value(kinematics));
        self.eff_den.fill(x, y);
        if matched {
            self.eff_num.fill(x, y);
        }
    }

    fn fill_global(&mut self, kinematics: &TrackKinematics, correct: bool) {
        let (x, y) = (self.x.value(kinematics), self.y.value(kinematics));
        self.purity_total.fill(x, y);
        if correct {
            self.purity_true.fill(x, y);
        }
    }
}

/// Scalar match counts over the acceptance.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchCounts {
    /// Standalone reference tracks.
    pub total_reference: u64,
    /// Reference tracks whose best match is a true match.
    pub matched_reference: u64,
    /// Global muons.
    pub total_global: u64,
    /// Correctly matched global muons.
    pub true_global: u64,
}

impl MatchCounts {
    /// Fraction of reference tracks with a true best match, 0 without reference tracks.
    pub fn efficiency(&self) -> f64 {
        if self.total_reference == 0 {
            0.0
        } else {
            self.matched_reference as f64 / self.total_reference as f64
        }
    }

    /// Fraction of correct global muons, 0 without global muons.
    pub fn purity(&self) -> f64 {
        if self.total_global == 0 {
            0.0
        } else {
            self.true_global as f64 / self.total_global as f64
        }
    }
}

/// Every efficiency/purity histogram of an analysis together with the scalar counts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyHistograms {
    /// One set of 1-D histograms per variable, in configuration order.
    pub hists: IndexMap<TrackVariable, EffPurityHists>,
    /// One set of 2-D histograms per variable pair, in configuration order.
    pub hists_2d: Vec<EffPurityHists2D>,
    /// Scalar counts.
    pub counts: MatchCounts,
}

impl EfficiencyHistograms {
    /// Book histograms for every variable and pair.
    ///
    /// # Errors
    ///
    /// Fails if a binning is invalid or a pair names a variable without a binning.
    pub fn new(
        variables: &IndexMap<TrackVariable, Binning>,
        pairs: &[(TrackVariable, TrackVariable)],
    ) -> FwdTrackResult<Self> {
        let mut hists = IndexMap::with_capacity(variables.len());
        for (variable, binning) in variables {
            binning.validate(variable.name())?;
            hists.insert(*variable, EffPurityHists::new(*variable, binning));
        }
        let lookup = |variable: TrackVariable| {
            variables
                .get(&variable)
                .ok_or_else(|| FwdTrackError::UnknownVariable {
                    name: variable.name().to_string(),
                })
        };
        let hists_2d = pairs
            .iter()
            .map(|&(x, y)| Ok(EffPurityHists2D::new(x, lookup(x)?, y, lookup(y)?)))
            .collect::<FwdTrackResult<Vec<_>>>()?;
        Ok(Self {
            hists,
            hists_2d,
            counts: MatchCounts::default(),
        })
    }

    /// Accumulate every in-acceptance row of `dataset` in a single pass.
    ///
    /// Reference (standalone MCH-MID) rows fill the efficiency histograms, counting as matched
    /// when `best_matches` holds a true match for the row. Global-muon rows fill the purity
    /// histograms using their own truth mask.
    ///
    /// # Errors
    ///
    /// Returns [`FwdTrackError::MissingTable`] if the dataset has no truth labels.
    pub fn fill(
        &mut self,
        dataset: &ForwardDataset,
        best_matches: &BestMatches,
        combine_mft_clusters: bool,
    ) -> FwdTrackResult<()> {
        let labels = dataset.require_labels()?;
        for (row, track) in dataset.tracks.iter() {
            let is_reference = track.is(TrackType::MuonStandalone);
            let is_global = track.is(TrackType::GlobalMuon);
            if !(is_reference || is_global) {
                continue;
            }
            let kinematics = dataset.kinematics(row, &track, combine_mft_clusters);
            if !is_in_acceptance(kinematics.eta) {
                continue;
            }
            if is_reference {
                let matched = best_matches
                    .get(&row)
                    .is_some_and(|candidate| candidate.mc_mask == 0);
                self.counts.total_reference += 1;
                if matched {
                    self.counts.matched_reference += 1;
                }
                self.hists
                    .values_mut()
                    .for_each(|h| h.fill_reference(&kinematics, matched));
                self.hists_2d
                    .iter_mut()
                    .for_each(|h| h.fill_reference(&kinematics, matched));
            } else {
                let correct = labels.mc_mask[row] == 0;
                self.counts.total_global += 1;
                if correct {
                    self.counts.true_global += 1;
                }
                self.hists
                    .values_mut()
                    .for_each(|h| h.fill_global(&kinematics, correct));
                self.hists_2d
                    .iter_mut()
                    .for_each(|h| h.fill_global(&kinematics, correct));
            }
        }
        info!(
            "Matching efficiency: {}/{} = {:.4}, purity: {}/{} = {:.4}",
            self.counts.matched_reference,
            self.counts.total_reference,
            self.counts.efficiency(),
            self.counts.true_global,
            self.counts.total_global,
            self.counts.purity()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data::test_dataset,
        matching::{collect_match_candidates, select_best_matches},
    };
    use approx::assert_relative_eq;

    fn default_variables() -> IndexMap<TrackVariable, Binning> {
        TrackVariable::ALL
            .into_iter()
            .map(|variable| (variable, variable.default_binning()))
            .collect()
    }

    fn filled() -> EfficiencyHistograms {
        let dataset = test_dataset();
        let candidates = collect_match_candidates(&dataset, 100.0).unwrap();
        let best = select_best_matches(&candidates, 100.0);
        let mut hists = EfficiencyHistograms::new(
            &default_variables(),
            &[
                (TrackVariable::Pt, TrackVariable::Phi),
                (TrackVariable::Eta, TrackVariable::NClusters),
            ],
        )
        .unwrap();
        hists.fill(&dataset, &best, true).unwrap();
        hists
    }

    #[test]
    fn test_scalar_counts() {
        let hists = filled();
        assert_eq!(
            hists.counts,
            MatchCounts {
                total_reference: 2,
                matched_reference: 1,
                total_global: 4,
                true_global: 3,
            }
        );
        assert_relative_eq!(hists.counts.efficiency(), 0.5);
        assert_relative_eq!(hists.counts.purity(), 0.75);
    }

    #[test]
    fn test_empty_counts_are_zero() {
        let counts = MatchCounts::default();
        assert_relative_eq!(counts.efficiency(), 0.0);
        assert_relative_eq!(counts.purity(), 0.0);
    }

    #[test]
    fn test_numerators_never_exceed_denominators() {
        let hists = filled();
        for h in hists.hists.values() {
            for bin in 0..h.eff_den.n_bins() {
                assert!(h.eff_num.bin_content(bin) <= h.eff_den.bin_content(bin));
                assert!(h.purity_true.bin_content(bin) <= h.purity_total.bin_content(bin));
            }
        }
        for h in &hists.hists_2d {
            for (num, den) in h.eff_num.counts.iter().zip(&h.eff_den.counts) {
                assert!(num <= den);
            }
            for (num, den) in h.purity_true.counts.iter().zip(&h.purity_total.counts) {
                assert!(num <= den);
            }
        }
    }

    #[test]
    fn test_histogram_contents() {
        let hists = filled();
        let pt = &hists.hists[&TrackVariable::Pt];
        assert_eq!(pt.eff_den.name, "hEffDen_pt");
        assert_eq!(pt.eff_den.x_label, "pT (GeV/c)");
        // every fixture track sits at pT = 2, the [2, 4) bin
        assert_relative_eq!(pt.eff_den.bin_content(6), 2.0);
        assert_relative_eq!(pt.eff_num.bin_content(6), 1.0);
        assert_relative_eq!(pt.purity_total.bin_content(6), 4.0);
        assert_relative_eq!(pt.purity_true.bin_content(6), 3.0);

        // global muons: 16, 11, 16 and 10 clusters; standalone: 14
        let ncl = &hists.hists[&TrackVariable::NClusters];
        assert_relative_eq!(ncl.purity_total.bin_content(8), 2.0);
        assert_relative_eq!(ncl.purity_total.bin_content(7), 2.0);
        assert_relative_eq!(ncl.purity_total.overflow, 0.0);
        assert_relative_eq!(ncl.eff_den.bin_content(7), 2.0);

        let pair = &hists.hists_2d[1];
        assert_eq!(pair.eff_den.name, "hEffDen_eta_vs_nClusters");
        assert_eq!(pair.purity_true.name, "hPurityTrue_eta_vs_nClusters");
        assert_relative_eq!(pair.purity_total.integral(), 4.0);
    }

    #[test]
    fn test_unknown_pair_variable() {
        let mut variables = default_variables();
        variables.shift_remove(&TrackVariable::Chi2);
        let result =
            EfficiencyHistograms::new(&variables, &[(TrackVariable::Pt, TrackVariable::Chi2)]);
        assert!(matches!(
            result,
            Err(FwdTrackError::UnknownVariable { name }) if name == "chi2"
        ));
    }

    #[test]
    fn test_fill_requires_labels() {
        let mut dataset = test_dataset();
        dataset.labels = None;
        let mut hists = EfficiencyHistograms::new(&default_variables(), &[]).unwrap();
        assert!(hists.fill(&dataset, &BestMatches::new(), true).is_err());
    }
}
