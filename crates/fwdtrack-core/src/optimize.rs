use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    data::ForwardDataset,
    matching::{collect_match_candidates, select_best_matches},
    utils::{
        enums::TrackType,
        variables::{is_in_acceptance, pseudorapidity},
        Binning, Histogram1D,
    },
    FwdTrackError, FwdTrackResult,
};

/// Upper bound on the number of thresholds in one scan.
pub const MAX_SCAN_POINTS: usize = 10_000;

/// An evenly spaced list of matching-$`\chi^2`$ thresholds, `start..=stop` in steps of `step`.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdScan {
    /// First threshold.
    pub start: f64,
    /// Last threshold (inclusive).
    pub stop: f64,
    /// Spacing between thresholds.
    pub step: f64,
}

impl Default for ThresholdScan {
    fn default() -> Self {
        Self {
            start: 1.0,
            stop: 50.0,
            step: 1.0,
        }
    }
}

/// Efficiency and purity at one threshold.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThresholdPoint {
    /// The matching-$`\chi^2`$ threshold.
    pub threshold: f64,
    /// Fraction of reference tracks whose best match below the threshold is a true match.
    pub efficiency: f64,
    /// Fraction of true matches among global muons with a matching $`\chi^2`$ below the
    /// threshold.
    pub purity: f64,
    /// `efficiency * purity`
    pub product: f64,
}

/// The outcome of a [`ThresholdScan`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThresholdScanResult {
    /// `hChi2Optimization`: the product at each threshold, one bin per threshold.
    pub histogram: Histogram1D,
    /// Every scanned threshold, in scan order.
    pub points: Vec<ThresholdPoint>,
    /// The first threshold at which the product is largest.
    pub best_threshold: f64,
    /// The largest product.
    pub best_product: f64,
}

impl ThresholdScan {
    /// Check that the scan describes at least one positive threshold.
    pub fn validate(&self) -> FwdTrackResult<()> {
        if !(self.step > 0.0 && self.step.is_finite()) {
            return Err(FwdTrackError::Custom(format!(
                "threshold scan step must be positive, got {}",
                self.step
            )));
        }
        if !(self.start > 0.0 && self.start.is_finite() && self.stop.is_finite())
            || self.stop < self.start
        {
            return Err(FwdTrackError::Custom(format!(
                "threshold scan range [{}, {}] must be positive and non-empty",
                self.start, self.stop
            )));
        }
        if self.is_empty() {
            return Err(FwdTrackError::Custom(format!(
                "threshold scan [{}, {}] in steps of {} has more than {MAX_SCAN_POINTS} points",
                self.start, self.stop, self.step
            )));
        }
        Ok(())
    }

    /// The number of thresholds, or 0 if the range is reversed, not finite, or holds more than
    /// [`MAX_SCAN_POINTS`] thresholds.
    pub fn len(&self) -> usize {
        let steps = ((self.stop - self.start) / self.step + 1e-9).floor();
        if steps >= 0.0 && steps < MAX_SCAN_POINTS as f64 {
            steps as usize + 1
        } else {
            0
        }
    }

    /// `true` if the scan has no thresholds (never, for a valid scan).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The thresholds, in increasing order.
    pub fn thresholds(&self) -> Vec<f64> {
        (0..self.len())
            .map(|i| self.start + i as f64 * self.step)
            .collect()
    }

    /// One bin centered on each threshold.
    pub fn binning(&self) -> Binning {
        let half = 0.5 * self.step;
        Binning::uniform(
            self.len(),
            self.start - half,
            self.start + self.len().saturating_sub(1) as f64 * self.step + half,
        )
    }

    /// Recompute the best matches, efficiency and purity at every threshold of the scan.
    ///
    /// Candidates are collected once without an upper bound and reselected per threshold.
    ///
    /// # Errors
    ///
    /// Fails if the scan is invalid or the dataset has no truth labels.
    pub fn run(&self, dataset: &ForwardDataset) -> FwdTrackResult<ThresholdScanResult> {
        self.validate()?;
        let labels = dataset.require_labels()?;
        let candidates = collect_match_candidates(dataset, f64::INFINITY)?;

        let mut references = Vec::new();
        let mut globals = Vec::new();
        for (row, track) in dataset.tracks.iter() {
            if !is_in_acceptance(pseudorapidity(track.tgl)) {
                continue;
            }
            if track.is(TrackType::MuonStandalone) {
                references.push(row);
            } else if track.is(TrackType::GlobalMuon) {
                globals.push((track.chi2_match_mch_mft, labels.mc_mask[row] == 0));
            }
        }

        let mut histogram = Histogram1D::new(
            "hChi2Optimization",
            "Efficiency × purity vs matching χ² threshold",
            self.binning(),
        )
        .with_x_label("χ² threshold");
        let mut points = Vec::with_capacity(self.len());
        for threshold in self.thresholds() {
            let best_matches = select_best_matches(&candidates, threshold);
            let matched = references
                .iter()
                .filter(|row| best_matches.get(*row).is_some_and(|c| c.mc_mask == 0))
                .count();
            let efficiency = ratio(matched, references.len());

            let (mut selected, mut correct) = (0usize, 0usize);
            for &(chi2, is_true) in &globals {
                if chi2 >= 0.0 && chi2 < threshold {
                    selected += 1;
                    if is_true {
                        correct += 1;
                    }
                }
            }
            let purity = ratio(correct, selected);
            let product = efficiency * purity;
            debug!(
                "chi2 < {threshold}: efficiency = {efficiency:.4}, purity = {purity:.4}, product = {product:.4}"
            );
            histogram.fill_weighted(threshold, product);
            points.push(ThresholdPoint {
                threshold,
                efficiency,
                purity,
                product,
            });
        }

        let best = points
            .iter()
            .fold(None::<&ThresholdPoint>, |best, point| match best {
                Some(b) if b.product >= point.product => Some(b),
                _ => Some(point),
            })
            .copied()
            .ok_or_else(|| FwdTrackError::Custom("threshold scan is empty".to_string()))?;
        info!(
            "Best matching chi2 threshold: {} (efficiency × purity = {:.4})",
            best.threshold, best.product
        );
        Ok(ThresholdScanResult {
            histogram,
            points,
            best_threshold: best.threshold,
            best_product: best.product,
        })
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
