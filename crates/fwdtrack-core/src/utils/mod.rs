use serde::{Deserialize, Serialize};

use crate::{FwdTrackError, FwdTrackResult};

/// Track-type and column enumerations shared by readers and analysis stages.
pub mod enums;
/// Kinematic variables derived from a [`TrackRecord`](crate::data::TrackRecord) and the
/// detector acceptance.
pub mod variables;

/// A helper method to get histogram edges from evenly-spaced `bins` over a given `range`
/// # See Also
/// [`Histogram1D`]
/// [`get_bin_index`]
pub fn get_bin_edges(bins: usize, range: (f64, f64)) -> Vec<f64> {
    let bin_width = (range.1 - range.0) / (bins as f64);
    (0..=bins)
        .map(|i| range.0 + (i as f64 * bin_width))
        .collect()
}

/// A helper method to obtain the index of a bin where a value should go in a histogram with evenly
/// spaced `bins` over a given `range`
///
/// # See Also
/// [`Histogram1D`]
/// [`get_bin_edges`]
pub fn get_bin_index(value: f64, bins: usize, limits: (f64, f64)) -> Option<usize> {
    if value >= limits.0 && value < limits.1 {
        let bin_width = (limits.1 - limits.0) / bins as f64;
        let bin_index = ((value - limits.0) / bin_width).floor() as usize;
        Some(bin_index.min(bins - 1))
    } else {
        None
    }
}

/// The axis definition of a histogram: either evenly spaced bins over a range or an explicit
/// list of increasing bin edges.
///
/// Bins are half-open, `[low, high)`, so a value equal to the upper edge of the axis is an
/// overflow.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Binning {
    /// `bins` evenly spaced bins over `[min, max)`.
    Uniform {
        /// Number of bins
        bins: usize,
        /// Lower edge of the first bin
        min: f64,
        /// Upper edge of the last bin
        max: f64,
    },
    /// Variable-width bins given by their edges (one more edge than bins).
    Edges {
        /// Bin edges in strictly increasing order
        edges: Vec<f64>,
    },
}

/// Where a value lands relative to a [`Binning`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinLocation {
    /// Below the lowest edge.
    Underflow,
    /// Inside the bin with the given index.
    Bin(usize),
    /// At or above the highest edge (`NaN` also lands here).
    Overflow,
}

impl Binning {
    /// Construct evenly spaced bins over `[min, max)`.
    pub fn uniform(bins: usize, min: f64, max: f64) -> Self {
        Self::Uniform { bins, min, max }
    }

    /// Construct variable-width bins from their edges.
    pub fn edges<T: AsRef<[f64]>>(edges: T) -> Self {
        Self::Edges {
            edges: edges.as_ref().to_vec(),
        }
    }

    /// Check that the axis can actually be binned, using `name` in the error message.
    pub fn validate(&self, name: &str) -> FwdTrackResult<()> {
        let invalid = |reason: String| FwdTrackError::InvalidBinning {
            name: name.to_string(),
            reason,
        };
        match self {
            Self::Uniform { bins, min, max } => {
                if *bins == 0 {
                    return Err(invalid("number of bins must be greater than zero".into()));
                }
                if !(min.is_finite() && max.is_finite()) || max <= min {
                    return Err(invalid(format!(
                        "range [{min}, {max}) must be finite and non-empty"
                    )));
                }
            }
            Self::Edges { edges } => {
                if edges.len() < 2 {
                    return Err(invalid("at least two edges are required".into()));
                }
                if edges.iter().any(|edge| !edge.is_finite()) {
                    return Err(invalid("edges must be finite".into()));
                }
                if edges.windows(2).any(|pair| pair[1] <= pair[0]) {
                    return Err(invalid("edges must be strictly increasing".into()));
                }
            }
        }
        Ok(())
    }

    /// The number of (in-range) bins.
    pub fn n_bins(&self) -> usize {
        match self {
            Self::Uniform { bins, .. } => *bins,
            Self::Edges { edges } => edges.len().saturating_sub(1),
        }
    }

    /// All bin edges, including the upper edge of the last bin.
    pub fn bin_edges(&self) -> Vec<f64> {
        match self {
            Self::Uniform { bins, min, max } => get_bin_edges(*bins, (*min, *max)),
            Self::Edges { edges } => edges.clone(),
        }
    }

    /// The lower and upper edge of the whole axis.
    pub fn limits(&self) -> (f64, f64) {
        match self {
            Self::Uniform { min, max, .. } => (*min, *max),
            Self::Edges { edges } => (edges[0], edges[edges.len() - 1]),
        }
    }

    /// The `[low, high)` edges of bin `index`.
    pub fn bin_bounds(&self, index: usize) -> (f64, f64) {
        match self {
            Self::Uniform { bins, min, max } => {
                let width = (max - min) / *bins as f64;
                (min + index as f64 * width, min + (index + 1) as f64 * width)
            }
            Self::Edges { edges } => (edges[index], edges[index + 1]),
        }
    }

    /// The midpoint of bin `index`.
    pub fn bin_center(&self, index: usize) -> f64 {
        let (low, high) = self.bin_bounds(index);
        0.5 * (low + high)
    }

    /// Locate `value` on this axis.
    pub fn locate(&self, value: f64) -> BinLocation {
        if value.is_nan() {
            return BinLocation::Overflow;
        }
        let (low, high) = self.limits();
        if value < low {
            return BinLocation::Underflow;
        }
        if value >= high {
            return BinLocation::Overflow;
        }
        match self {
            Self::Uniform { bins, min, max } => get_bin_index(value, *bins, (*min, *max))
                .map_or(BinLocation::Overflow, BinLocation::Bin),
            Self::Edges { edges } => {
                // first edge strictly above `value`, minus one
                let upper = edges.partition_point(|edge| *edge <= value);
                BinLocation::Bin(upper - 1)
            }
        }
    }

    /// The in-range bin index of `value`, if any.
    pub fn find_bin(&self, value: f64) -> Option<usize> {
        match self.locate(value) {
            BinLocation::Bin(index) => Some(index),
            _ => None,
        }
    }
}

/// A one-dimensional histogram with unit or weighted fills.
///
/// Out-of-range fills are kept in separate underflow and overflow counters, and every fill
/// counts towards [`Histogram1D::entries`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Histogram1D {
    /// The name the histogram is stored under.
    pub name: String,
    /// A human-readable title.
    pub title: String,
    /// Label of the binned quantity.
    pub x_label: String,
    /// The axis definition.
    pub binning: Binning,
    /// The (weighted) counts in each bin.
    pub counts: Vec<f64>,
    /// The sum of squared weights in each bin.
    pub sumw2: Vec<f64>,
    /// Weighted count below the lowest edge.
    pub underflow: f64,
    /// Weighted count at or above the highest edge.
    pub overflow: f64,
    /// Number of fill calls, including out-of-range ones.
    pub entries: u64,
}

impl Histogram1D {
    /// Create an empty histogram.
    pub fn new(name: impl Into<String>, title: impl Into<String>, binning: Binning) -> Self {
        let n_bins = binning.n_bins();
        Self {
            name: name.into(),
            title: title.into(),
            x_label: String::new(),
            binning,
            counts: vec![0.0; n_bins],
            sumw2: vec![0.0; n_bins],
            underflow: 0.0,
            overflow: 0.0,
            entries: 0,
        }
    }

    /// Builder-style setter for the axis label.
    pub fn with_x_label(mut self, label: impl Into<String>) -> Self {
        self.x_label = label.into();
        self
    }

    /// Add one unit-weight entry at `value`.
    pub fn fill(&mut self, value: f64) {
        self.fill_weighted(value, 1.0);
    }

    /// Add one entry of weight `weight` at `value`.
    pub fn fill_weighted(&mut self, value: f64, weight: f64) {
        self.entries += 1;
        match self.binning.locate(value) {
            BinLocation::Bin(index) => {
                self.counts[index] += weight;
                self.sumw2[index] += weight * weight;
            }
            BinLocation::Underflow => self.underflow += weight,
            BinLocation::Overflow => self.overflow += weight,
        }
    }

    /// The count in bin `index`.
    pub fn bin_content(&self, index: usize) -> f64 {
        self.counts[index]
    }

    /// The number of in-range bins.
    pub fn n_bins(&self) -> usize {
        self.counts.len()
    }

    /// Sum of the in-range bin contents.
    pub fn integral(&self) -> f64 {
        self.counts.iter().sum()
    }

    /// `true` if nothing was ever filled.
    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Multiply every content (and the squared-weight sums accordingly) by `factor`.
    pub fn scale(&mut self, factor: f64) {
        for (count, w2) in self.counts.iter_mut().zip(self.sumw2.iter_mut()) {
            *count *= factor;
            *w2 *= factor * factor;
        }
        self.underflow *= factor;
        self.overflow *= factor;
    }

    /// Scale to unit in-range area. Histograms with zero integral are left untouched.
    pub fn normalize(&mut self) {
        let integral = self.integral();
        if integral > 0.0 {
            self.scale(1.0 / integral);
        }
    }

    /// The index of the first bin holding the largest content.
    pub fn maximum_bin(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (index, count) in self.counts.iter().enumerate() {
            match best {
                Some(b) if self.counts[b] >= *count => {}
                _ => best = Some(index),
            }
        }
        best
    }

    /// The largest bin content (0 for a histogram without bins).
    pub fn maximum(&self) -> f64 {
        self.maximum_bin().map_or(0.0, |index| self.counts[index])
    }

    /// Bin centers paired with contents, in bin order.
    pub fn points(&self) -> Vec<(f64, f64)> {
        (0..self.n_bins())
            .map(|index| (self.binning.bin_center(index), self.counts[index]))
            .collect()
    }
}

/// A two-dimensional histogram with unit fills.
///
/// Fills outside either axis only increase [`Histogram2D::outside`] and
/// [`Histogram2D::entries`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Histogram2D {
    /// The name the histogram is stored under.
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
    /// Counts stored row-major in y, i.e. `counts[iy * nx + ix]`.
    pub counts: Vec<f64>,
    /// Weighted count of fills outside the in-range grid.
    pub outside: f64,
    /// Number of fill calls, including out-of-range ones.
    pub entries: u64,
}

impl Histogram2D {
    /// Create an empty histogram.
    pub fn new(
        name: impl Into<String>,
        title: impl Into<String>,
        x_binning: Binning,
        y_binning: Binning,
    ) -> Self {
        let n_cells = x_binning.n_bins() * y_binning.n_bins();
        Self {
            name: name.into(),
            title: title.into(),
            x_label: String::new(),
            y_label: String::new(),
            x_binning,
            y_binning,
            counts: vec![0.0; n_cells],
            outside: 0.0,
            entries: 0,
        }
    }

    /// Builder-style setter for both axis labels.
    pub fn with_labels(mut self, x_label: impl Into<String>, y_label: impl Into<String>) -> Self {
        self.x_label = x_label.into();
        self.y_label = y_label.into();
        self
    }

    /// An empty histogram with the same axes and labels, stored under `name`.
    pub fn empty_like(&self, name: impl Into<String>) -> Self {
        let mut clone = self.clone();
        clone.name = name.into();
        clone.counts.iter_mut().for_each(|count| *count = 0.0);
        clone.outside = 0.0;
        clone.entries = 0;
        clone
    }

    /// Number of bins along x.
    pub fn nx(&self) -> usize {
        self.x_binning.n_bins()
    }

    /// Number of bins along y.
    pub fn ny(&self) -> usize {
        self.y_binning.n_bins()
    }

    /// Add one unit-weight entry at `(x, y)`.
    pub fn fill(&mut self, x: f64, y: f64) {
        self.entries += 1;
        match (self.x_binning.find_bin(x), self.y_binning.find_bin(y)) {
            (Some(ix), Some(iy)) => {
                let nx = self.nx();
                self.counts[iy * nx + ix] += 1.0;
            }
            _ => self.outside += 1.0,
        }
    }

    /// The count in cell `(ix, iy)`.
    pub fn bin_content(&self, ix: usize, iy: usize) -> f64 {
        self.counts[iy * self.nx() + ix]
    }

    /// Sum of the in-range cell contents.
    pub fn integral(&self) -> f64 {
        self.counts.iter().sum()
    }

    /// `true` if nothing was ever filled.
    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_binning() {
        let bin_index = get_bin_index(0.5, 3, (0.0, 1.0));
        assert_eq!(bin_index, Some(1));
        let bin_index = get_bin_index(0.0, 3, (0.0, 1.0));
        assert_eq!(bin_index, Some(0));
        let bin_index = get_bin_index(0.1, 3, (0.0, 1.0));
        assert_eq!(bin_index, Some(0));
        let bin_index = get_bin_index(0.9, 3, (0.0, 1.0));
        assert_eq!(bin_index, Some(2));
        let bin_index = get_bin_index(1.0, 3, (0.0, 1.0));
        assert_eq!(bin_index, None);
        let bin_index = get_bin_index(2.0, 3, (0.0, 1.0));
        assert_eq!(bin_index, None);
    }

    #[test]
    fn test_variable_edges_locate() {
        let binning = Binning::edges([0.0, 1.0, 2.0, 5.0, 10.0]);
        assert_eq!(binning.locate(-0.1), BinLocation::Underflow);
        assert_eq!(binning.locate(0.0), BinLocation::Bin(0));
        assert_eq!(binning.locate(1.0), BinLocation::Bin(1));
        assert_eq!(binning.locate(4.999), BinLocation::Bin(2));
        assert_eq!(binning.locate(9.0), BinLocation::Bin(3));
        assert_eq!(binning.locate(10.0), BinLocation::Overflow);
        assert_eq!(binning.locate(f64::NAN), BinLocation::Overflow);
        assert_eq!(binning.locate(f64::INFINITY), BinLocation::Overflow);
        assert_eq!(binning.n_bins(), 4);
        assert_relative_eq!(binning.bin_center(2), 3.5);
    }

    #[test]
    fn test_uniform_bounds() {
        let binning = Binning::uniform(11, -3.6, -2.5);
        let (low, high) = binning.bin_bounds(0);
        assert_relative_eq!(low, -3.6);
        assert_relative_eq!(high, -3.5, epsilon = 1e-12);
        assert_eq!(binning.find_bin(-2.95), Some(6));
        assert_eq!(binning.find_bin(-2.5), None);
        assert_eq!(binning.bin_edges().len(), 12);
    }

    #[test]
    fn test_binning_validation() {
        assert!(Binning::uniform(0, 0.0, 1.0).validate("x").is_err());
        assert!(Binning::uniform(10, 1.0, 1.0).validate("x").is_err());
        assert!(Binning::edges([0.0]).validate("x").is_err());
        assert!(Binning::edges([0.0, 2.0, 1.0]).validate("x").is_err());
        assert!(Binning::edges([0.0, 1.0, 2.0]).validate("x").is_ok());
        assert!(Binning::uniform(36, -3.14, 3.14).validate("phi").is_ok());
    }

    #[test]
    fn test_histogram_fill_and_flow() {
        let mut hist = Histogram1D::new("h", "test", Binning::uniform(3, 0.0, 1.0));
        hist.fill(0.5);
        hist.fill(0.5);
        hist.fill(-1.0);
        hist.fill(1.0);
        hist.fill_weighted(0.1, 0.5);
        assert_eq!(hist.entries, 5);
        assert_eq!(hist.counts, vec![0.5, 2.0, 0.0]);
        assert_eq!(hist.sumw2, vec![0.25, 2.0, 0.0]);
        assert_relative_eq!(hist.underflow, 1.0);
        assert_relative_eq!(hist.overflow, 1.0);
        assert_relative_eq!(hist.integral(), 2.5);
        assert_eq!(hist.maximum_bin(), Some(1));
    }

    #[test]
    fn test_histogram_normalize() {
        let mut hist = Histogram1D::new("h", "test", Binning::uniform(2, 0.0, 2.0));
        hist.fill(0.5);
        hist.fill(1.5);
        hist.fill(1.5);
        hist.fill(1.5);
        hist.normalize();
        assert_relative_eq!(hist.integral(), 1.0);
        assert_relative_eq!(hist.bin_content(1), 0.75);
        let mut empty = Histogram1D::new("e", "empty", Binning::uniform(2, 0.0, 2.0));
        empty.normalize();
        assert_relative_eq!(empty.integral(), 0.0);
    }

    #[test]
    fn test_maximum_bin_prefers_first() {
        let mut hist = Histogram1D::new("h", "test", Binning::uniform(4, 0.0, 4.0));
        hist.fill(1.5);
        hist.fill(3.5);
        assert_eq!(hist.maximum_bin(), Some(1));
        assert_relative_eq!(hist.maximum(), 1.0);
    }

    #[test]
    fn test_histogram_2d() {
        let mut hist = Histogram2D::new(
            "h2",
            "test",
            Binning::uniform(2, 0.0, 2.0),
            Binning::edges([0.0, 1.0, 10.0]),
        );
        hist.fill(0.5, 5.0);
        hist.fill(1.5, 0.5);
        hist.fill(3.0, 0.5);
        assert_eq!(hist.entries, 3);
        assert_relative_eq!(hist.bin_content(0, 1), 1.0);
        assert_relative_eq!(hist.bin_content(1, 0), 1.0);
        assert_relative_eq!(hist.outside, 1.0);
        let empty = hist.empty_like("h2_clone");
        assert_eq!(empty.name, "h2_clone");
        assert!(empty.is_empty());
        assert_relative_eq!(empty.integral(), 0.0);
    }
}
