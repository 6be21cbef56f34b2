use serde::{Deserialize, Serialize};
use statrs::distribution::{Beta, ContinuousCDF};

use crate::{
    utils::{Binning, Histogram1D, Histogram2D},
    FwdTrackError, FwdTrackResult,
};

/// Confidence level of a $`\pm 1\sigma`$ band, used when none is configured.
pub const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.68;

fn beta_quantile(a: f64, b: f64, probability: f64) -> FwdTrackResult<f64> {
    let beta = Beta::new(a, b).map_err(|err| FwdTrackError::Statistics(err.to_string()))?;
    Ok(beta.inverse_cdf(probability))
}

/// The central Clopper-Pearson interval for `passed` successes out of `total` trials.
///
/// Returns `(lower, upper)` such that each tail outside the interval has probability
/// $`(1 - \text{level})/2`$. The interval is closed at 0 when nothing passed and at 1 when
/// everything passed.
///
/// # Errors
///
/// Returns [`FwdTrackError::Statistics`] if `total` is zero, `passed > total`, or
/// `confidence_level` is not in `(0, 1)`.
pub fn clopper_pearson(
    passed: u64,
    total: u64,
    confidence_level: f64,
) -> FwdTrackResult<(f64, f64)> {
    if total == 0 || passed > total {
        return Err(FwdTrackError::Statistics(format!(
            "cannot build an interval for {passed} passed out of {total}"
        )));
    }
    if !(confidence_level > 0.0 && confidence_level < 1.0) {
        return Err(FwdTrackError::Statistics(format!(
            "confidence level {confidence_level} is not in (0, 1)"
        )));
    }
    let alpha = (1.0 - confidence_level) / 2.0;
    let (k, n) = (passed as f64, total as f64);
    let lower = if passed == 0 {
        0.0
    } else {
        beta_quantile(k, n - k + 1.0, alpha)?
    };
    let upper = if passed == total {
        1.0
    } else {
        beta_quantile(k + 1.0, n - k, 1.0 - alpha)?
    };
    Ok((lower, upper))
}

/// One bin of an [`EfficiencyCurve`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyPoint {
    /// Index of the bin in the source histograms.
    pub bin: usize,
    /// Bin center.
    pub x: f64,
    /// Lower bin edge.
    pub x_low: f64,
    /// Upper bin edge.
    pub x_high: f64,
    /// Entries which passed.
    pub passed: u64,
    /// All entries.
    pub total: u64,
    /// `passed / total`.
    pub value: f64,
    /// Lower end of the confidence interval.
    pub lower: f64,
    /// Upper end of the confidence interval.
    pub upper: f64,
}

impl EfficiencyPoint {
    /// Distance from the value down to the lower end of the interval.
    pub fn error_low(&self) -> f64 {
        self.value - self.lower
    }

    /// Distance from the value up to the upper end of the interval.
    pub fn error_high(&self) -> f64 {
        self.upper - self.value
    }
}

/// A binned ratio of two histograms with binomial intervals. Bins with an empty denominator
/// carry no point.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyCurve {
    /// The name the curve is stored under.
    pub name: String,
    /// A human-readable title.
    pub title: String,
    /// Label of the binned quantity.
    pub x_label: String,
    /// Binning of the source histograms.
    pub binning: Binning,
    /// Confidence level of the intervals.
    pub confidence_level: f64,
    /// Non-empty bins, in bin order.
    pub points: Vec<EfficiencyPoint>,
}

fn as_count(value: f64) -> u64 {
    value.max(0.0).round() as u64
}

impl EfficiencyCurve {
    /// Divide `passed` by `total` bin by bin.
    ///
    /// # Errors
    ///
    /// Fails if the two histograms are binned differently or a bin has more passed than total
    /// entries.
    pub fn from_histograms(
        name: impl Into<String>,
        title: impl Into<String>,
        passed: &Histogram1D,
        total: &Histogram1D,
        confidence_level: f64,
    ) -> FwdTrackResult<Self> {
        if passed.binning != total.binning {
            return Err(FwdTrackError::Custom(format!(
                "histograms \"{}\" and \"{}\" are binned differently",
                passed.name, total.name
            )));
        }
        let mut points = Vec::new();
        for bin in 0..total.n_bins() {
            let n_total = as_count(total.bin_content(bin));
            if n_total == 0 {
                continue;
            }
            let n_passed = as_count(passed.bin_content(bin));
            let (lower, upper) = clopper_pearson(n_passed, n_total, confidence_level)?;
            let (x_low, x_high) = total.binning.bin_bounds(bin);
            points.push(EfficiencyPoint {
                bin,
                x: 0.5 * (x_low + x_high),
                x_low,
                x_high,
                passed: n_passed,
                total: n_total,
                value: n_passed as f64 / n_total as f64,
                lower,
                upper,
            });
        }
        Ok(Self {
            name: name.into(),
            title: title.into(),
            x_label: total.x_label.clone(),
            binning: total.binning.clone(),
            confidence_level,
            points,
        })
    }

    /// `true` if no bin had any denominator entries.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The point for bin `bin`, if that bin was non-empty.
    pub fn point(&self, bin: usize) -> Option<&EfficiencyPoint> {
        self.points.iter().find(|point| point.bin == bin)
    }
}

/// One non-empty cell of an [`EfficiencyMap`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyCell {
    /// Bin index along x.
    pub ix: usize,
    /// Bin index along y.
    pub iy: usize,
    /// Entries which passed.
    pub passed: u64,
    /// All entries.
    pub total: u64,
    /// `passed / total`.
    pub value: f64,
    /// Lower end of the confidence interval.
    pub lower: f64,
    /// Upper end of the confidence interval.
    pub upper: f64,
}

/// A two-dimensional binned ratio.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyMap {
    /// The name the map is stored under.
    pub name: String,
    /// A human-readable title.
    pub title: String,
    /// Label of the quantity on the x axis.
    pub x_label: String,
    /// Label of the quantity on the y axis.
    pub y_label: String,
    /// The x axis definition.
    pub x_binning: Binning,
    /// The y axis definition.
    pub y_binning: Binning,
    /// Confidence level of the intervals.
    pub confidence_level: f64,
    /// Cells with a non-empty denominator.
    pub cells: Vec<EfficiencyCell>,
}

impl EfficiencyMap {
    /// Divide `passed` by `total` cell by cell.
    pub fn from_histograms(
        name: impl Into<String>,
        title: impl Into<String>,
        passed: &Histogram2D,
        total: &Histogram2D,
        confidence_level: f64,
    ) -> FwdTrackResult<Self> {
        if passed.x_binning != total.x_binning || passed.y_binning != total.y_binning {
            return Err(FwdTrackError::Custom(format!(
                "histograms \"{}\" and \"{}\" are binned differently",
                passed.name, total.name
            )));
        }
        let mut cells = Vec::new();
        for iy in 0..total.ny() {
            for ix in 0..total.nx() {
                let n_total = as_count(total.bin_content(ix, iy));
                if n_total == 0 {
                    continue;
                }
                let n_passed = as_count(passed.bin_content(ix, iy));
                let (lower, upper) = clopper_pearson(n_passed, n_total, confidence_level)?;
                cells.push(EfficiencyCell {
                    ix,
                    iy,
                    passed: n_passed,
                    total: n_total,
                    value: n_passed as f64 / n_total as f64,
                    lower,
                    upper,
                });
            }
        }
        Ok(Self {
            name: name.into(),
            title: title.into(),
            x_label: total.x_label.clone(),
            y_label: total.y_label.clone(),
            x_binning: total.x_binning.clone(),
            y_binning: total.y_binning.clone(),
            confidence_level,
            cells,
        })
    }

    /// The ratio in cell `(ix, iy)`, or `None` if its denominator is empty.
    pub fn value(&self, ix: usize, iy: usize) -> Option<f64> {
        self.cells
            .iter()
            .find(|cell| cell.ix == ix && cell.iy == iy)
            .map(|cell| cell.value)
    }

    /// `true` if every cell had an empty denominator.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_clopper_pearson_edges() {
        // with nothing passed the upper bound solves (1 - p)^n = alpha
        let alpha: f64 = 0.16;
        let (lower, upper) = clopper_pearson(0, 10, 0.68).unwrap();
        assert_relative_eq!(lower, 0.0);
        assert_relative_eq!(upper, 1.0 - alpha.powf(0.1), epsilon = 1e-4);
        let (lower, upper) = clopper_pearson(10, 10, 0.68).unwrap();
        assert_relative_eq!(lower, alpha.powf(0.1), epsilon = 1e-4);
        assert_relative_eq!(upper, 1.0);
    }

    #[test]
    fn test_clopper_pearson_contains_estimate() {
        for (passed, total) in [(1, 2), (3, 7), (45, 50), (1, 1000)] {
            let (lower, upper) = clopper_pearson(passed, total, 0.68).unwrap();
            let value = passed as f64 / total as f64;
            assert!(lower < value && value < upper);
            let (wide_lower, wide_upper) = clopper_pearson(passed, total, 0.95).unwrap();
            assert!(wide_lower < lower && upper < wide_upper);
        }
    }

    #[test]
    fn test_clopper_pearson_rejects_bad_input() {
        assert!(clopper_pearson(0, 0, 0.68).is_err());
        assert!(clopper_pearson(3, 2, 0.68).is_err());
        assert!(clopper_pearson(1, 2, 1.0).is_err());
    }

    #[test]
    fn test_curve_skips_empty_bins() {
        let binning = Binning::uniform(3, 0.0, 3.0);
        let mut total = Histogram1D::new("den", "den", binning.clone()).with_x_label("x");
        let mut passed = Histogram1D::new("num", "num", binning);
        for x in [0.5, 0.5, 0.5, 0.5, 2.5] {
            total.fill(x);
        }
        for x in [0.5, 0.5, 0.5] {
            passed.fill(x);
        }
        let curve = EfficiencyCurve::from_histograms("eff", "Efficiency", &passed, &total, 0.68)
            .unwrap();
        assert_eq!(curve.points.len(), 2);
        assert_eq!(curve.x_label, "x");
        assert_relative_eq!(curve.points[0].value, 0.75);
        assert!(curve.point(1).is_none());
        let last = curve.point(2).unwrap();
        assert_relative_eq!(last.value, 0.0);
        assert_relative_eq!(last.error_low(), 0.0);
        assert!(last.error_high() > 0.0);
    }

    #[test]
    fn test_curve_requires_matching_binning() {
        let total = Histogram1D::new("den", "den", Binning::uniform(3, 0.0, 3.0));
        let passed = Histogram1D::new("num", "num", Binning::uniform(4, 0.0, 3.0));
        assert!(EfficiencyCurve::from_histograms("eff", "", &passed, &total, 0.68).is_err());
    }

    #[test]
    fn test_map_cells() {
        let total = {
            let mut h = Histogram2D::new(
                "den",
                "",
                Binning::uniform(2, 0.0, 2.0),
                Binning::uniform(2, 0.0, 2.0),
            );
            h.fill(0.5, 0.5);
            h.fill(0.5, 0.5);
            h.fill(1.5, 1.5);
            h
        };
        let mut passed = total.empty_like("num");
        passed.fill(0.5, 0.5);
        let map = EfficiencyMap::from_histograms("eff2D", "", &passed, &total, 0.68).unwrap();
        assert_eq!(map.cells.len(), 2);
        assert_relative_eq!(map.value(0, 0).unwrap(), 0.5);
        assert_relative_eq!(map.value(1, 1).unwrap(), 0.0);
        assert!(map.value(1, 0).is_none());
    }
}
