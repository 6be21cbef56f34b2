use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    data::ForwardDataset,
    utils::{
        enums::{TrackColumn, TrackType},
        Binning, Histogram1D,
    },
};

/// Number of bins of every per-type distribution.
pub const DISTRIBUTION_BINS: usize = 100;

/// The per-type distributions of one raw column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnDistributions {
    /// The column.
    pub column: TrackColumn,
    /// One histogram per requested track type, in request order.
    pub histograms: Vec<(u8, Histogram1D)>,
}

impl ColumnDistributions {
    /// The histogram of track type `track_type`, if it was requested.
    pub fn for_type(&self, track_type: u8) -> Option<&Histogram1D> {
        self.histograms
            .iter()
            .find(|(t, _)| *t == track_type)
            .map(|(_, hist)| hist)
    }
}

fn type_label(track_type: u8) -> String {
    TrackType::from_code(track_type)
        .map_or_else(|| format!("type {track_type}"), |t| t.to_string())
}

/// Histogram every column of [`TrackColumn::ALL`] for each of `track_types`, over all rows of
/// that type. No acceptance cut is applied.
///
/// With `normalize`, every non-empty histogram is scaled to unit area.
pub fn fill_distributions(
    dataset: &ForwardDataset,
    track_types: &[u8],
    normalize: bool,
) -> Vec<ColumnDistributions> {
    let mut distributions: Vec<ColumnDistributions> = TrackColumn::ALL
        .into_iter()
        .map(|column| ColumnDistributions {
            column,
            histograms: track_types
                .iter()
                .map(|&track_type| {
                    let (min, max) = column.distribution_range(track_type);
                    let hist = Histogram1D::new(
                        format!("h_FWD_{}_type{track_type}", column.branch_name()),
                        format!("{} ({})", column.branch_name(), type_label(track_type)),
                        Binning::uniform(DISTRIBUTION_BINS, min, max),
                    )
                    .with_x_label(column.branch_name());
                    (track_type, hist)
                })
                .collect(),
        })
        .collect();

    for (_, track) in dataset.tracks.iter() {
        let Some(slot) = track_types.iter().position(|&t| t == track.track_type) else {
            continue;
        };
        for distribution in distributions.iter_mut() {
            let value = distribution.column.value(&track);
            distribution.histograms[slot].1.fill(value);
        }
    }

    for &track_type in track_types {
        let count = dataset
            .tracks
            .iter()
            .filter(|(_, track)| track.track_type == track_type)
            .count();
        if count == 0 {
            warn!("No tracks of {} in the input", type_label(track_type));
        } else {
            info!("{count} tracks of {}", type_label(track_type));
        }
    }

    if normalize {
        distributions
            .iter_mut()
            .flat_map(|d| d.histograms.iter_mut())
            .for_each(|(_, hist)| hist.normalize());
    }
    distributions
}
