use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    utils::{
        enums::TrackType,
        variables::{mft_cluster_count, TrackKinematics},
    },
    FwdTrackError, FwdTrackResult,
};

/// Table I/O for ROOT and Parquet inputs.
pub mod io;

pub use io::{read_dataset, DatasetReadOptions};

/// One reconstructed forward track, as stored in a single row of the track table.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    /// `fX`
    pub x: f64,
    /// `fY`
    pub y: f64,
    /// `fZ`
    pub z: f64,
    /// `fPhi`
    pub phi: f64,
    /// `fTgl`, the tangent of the dip angle.
    pub tgl: f64,
    /// `fSigned1Pt`, charge over transverse momentum.
    pub signed_1pt: f64,
    /// `fChi2`, the track-fit $`\chi^2`$.
    pub chi2: f64,
    /// `fChi2MatchMCHMID`
    pub chi2_match_mch_mid: f64,
    /// `fChi2MatchMCHMFT`
    pub chi2_match_mch_mft: f64,
    /// `fMatchScoreMCHMFT`
    pub match_score_mch_mft: f64,
    /// `fNClusters`
    pub n_clusters: i32,
    /// `fTrackType`, see [`TrackType`].
    pub track_type: u8,
    /// `fIndexMFTTracks`, a row of the MFT table or negative if there is none.
    pub index_mft_track: i64,
    /// `fIndexFwdTracks_MatchMCHTrack`, the row of the standalone track this track was matched
    /// to, or negative if there is none.
    pub index_match_mch_track: i64,
}

impl TrackRecord {
    /// The decoded track type, if the code is a known one.
    pub fn kind(&self) -> Option<TrackType> {
        TrackType::from_code(self.track_type)
    }

    /// `true` if this row has the given type.
    pub fn is(&self, track_type: TrackType) -> bool {
        self.track_type == track_type.code()
    }
}

/// The forward-track table, stored column by column.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackTable {
    pub(crate) x: Vec<f64>,
    pub(crate) y: Vec<f64>,
    pub(crate) z: Vec<f64>,
    pub(crate) phi: Vec<f64>,
    pub(crate) tgl: Vec<f64>,
    pub(crate) signed_1pt: Vec<f64>,
    pub(crate) chi2: Vec<f64>,
    pub(crate) chi2_match_mch_mid: Vec<f64>,
    pub(crate) chi2_match_mch_mft: Vec<f64>,
    pub(crate) match_score_mch_mft: Vec<f64>,
    pub(crate) n_clusters: Vec<i32>,
    pub(crate) track_type: Vec<u8>,
    pub(crate) index_mft_track: Vec<i64>,
    pub(crate) index_match_mch_track: Vec<i64>,
}

impl TrackTable {
    /// An empty table with room for `capacity` rows.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            x: Vec::with_capacity(capacity),
            y: Vec::with_capacity(capacity),
            z: Vec::with_capacity(capacity),
            phi: Vec::with_capacity(capacity),
            tgl: Vec::with_capacity(capacity),
            signed_1pt: Vec::with_capacity(capacity),
            chi2: Vec::with_capacity(capacity),
            chi2_match_mch_mid: Vec::with_capacity(capacity),
            chi2_match_mch_mft: Vec::with_capacity(capacity),
            match_score_mch_mft: Vec::with_capacity(capacity),
            n_clusters: Vec::with_capacity(capacity),
            track_type: Vec::with_capacity(capacity),
            index_mft_track: Vec::with_capacity(capacity),
            index_match_mch_track: Vec::with_capacity(capacity),
        }
    }

    /// Build a table from row records.
    pub fn from_records<I: IntoIterator<Item = TrackRecord>>(records: I) -> Self {
        let iter = records.into_iter();
        let mut table = Self::with_capacity(iter.size_hint().0);
        for record in iter {
            table.push(record);
        }
        table
    }

    /// Append one row.
    pub fn push(&mut self, record: TrackRecord) {
        self.x.push(record.x);
        self.y.push(record.y);
        self.z.push(record.z);
        self.phi.push(record.phi);
        self.tgl.push(record.tgl);
        self.signed_1pt.push(record.signed_1pt);
        self.chi2.push(record.chi2);
        self.chi2_match_mch_mid.push(record.chi2_match_mch_mid);
        self.chi2_match_mch_mft.push(record.chi2_match_mch_mft);
        self.match_score_mch_mft.push(record.match_score_mch_mft);
        self.n_clusters.push(record.n_clusters);
        self.track_type.push(record.track_type);
        self.index_mft_track.push(record.index_mft_track);
        self.index_match_mch_track.push(record.index_match_mch_track);
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.track_type.len()
    }

    /// `true` if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Gather the row at `row`, or `None` past the end of the table.
    pub fn get(&self, row: usize) -> Option<TrackRecord> {
        (row < self.len()).then(|| TrackRecord {
            x: self.x[row],
            y: self.y[row],
            z: self.z[row],
            phi: self.phi[row],
            tgl: self.tgl[row],
            signed_1pt: self.signed_1pt[row],
            chi2: self.chi2[row],
            chi2_match_mch_mid: self.chi2_match_mch_mid[row],
            chi2_match_mch_mft: self.chi2_match_mch_mft[row],
            match_score_mch_mft: self.match_score_mch_mft[row],
            n_clusters: self.n_clusters[row],
            track_type: self.track_type[row],
            index_mft_track: self.index_mft_track[row],
            index_match_mch_track: self.index_match_mch_track[row],
        })
    }

    /// Iterate over `(row, record)` pairs in table order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, TrackRecord)> + '_ {
        (0..self.len()).filter_map(move |row| self.get(row).map(|record| (row, record)))
    }

    /// Check that every column has the same number of rows.
    pub(crate) fn check_lengths(&self) -> FwdTrackResult<()> {
        let expected = self.len();
        let lengths = [
            ("fX", self.x.len()),
            ("fY", self.y.len()),
            ("fZ", self.z.len()),
            ("fPhi", self.phi.len()),
            ("fTgl", self.tgl.len()),
            ("fSigned1Pt", self.signed_1pt.len()),
            ("fChi2", self.chi2.len()),
            ("fChi2MatchMCHMID", self.chi2_match_mch_mid.len()),
            ("fChi2MatchMCHMFT", self.chi2_match_mch_mft.len()),
            ("fMatchScoreMCHMFT", self.match_score_mch_mft.len()),
            ("fNClusters", self.n_clusters.len()),
            ("fIndexMFTTracks", self.index_mft_track.len()),
            ("fIndexFwdTracks_MatchMCHTrack", self.index_match_mch_track.len()),
        ];
        for (name, actual) in lengths {
            if actual != expected {
                return Err(FwdTrackError::LengthMismatch {
                    context: format!("Column '{name}'"),
                    expected,
                    actual,
                });
            }
        }
        Ok(())
    }
}

/// Monte Carlo truth labels, one per track row.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct McLabelTable {
    /// `fMcMask`: 0 marks a correct match, any set bit marks a fake or mismatched component.
    pub mc_mask: Vec<u8>,
}

impl McLabelTable {
    /// Wrap a column of masks.
    pub fn new(mc_mask: Vec<u8>) -> Self {
        Self { mc_mask }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.mc_mask.len()
    }

    /// `true` if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.mc_mask.is_empty()
    }
}

/// The MFT track table, of which only the packed cluster word is needed.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MftTable {
    /// `fMFTClusterSizesAndTrackFlags`
    pub cluster_sizes_and_flags: Vec<u64>,
}

impl MftTable {
    /// Wrap a column of packed cluster words.
    pub fn new(cluster_sizes_and_flags: Vec<u64>) -> Self {
        Self {
            cluster_sizes_and_flags,
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.cluster_sizes_and_flags.len()
    }

    /// `true` if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.cluster_sizes_and_flags.is_empty()
    }

    /// The number of MFT clusters of the track at `index`, or `None` for a negative or
    /// out-of-range index.
    pub fn cluster_count(&self, index: i64) -> Option<u32> {
        let row = usize::try_from(index).ok()?;
        self.cluster_sizes_and_flags
            .get(row)
            .copied()
            .map(mft_cluster_count)
    }
}

/// The three tables of one input, joined by row index.
///
/// Only the track table is mandatory. Without labels the efficiency stage cannot run; without
/// the MFT table cluster counts are not combined.
#[derive(Clone, Debug, Default)]
pub struct ForwardDataset {
    /// The forward tracks.
    pub tracks: TrackTable,
    /// Truth labels aligned with [`ForwardDataset::tracks`].
    pub labels: Option<McLabelTable>,
    /// MFT tracks referenced by `index_mft_track`.
    pub mft: Option<MftTable>,
}

impl ForwardDataset {
    /// Join the tables, checking that the labels cover every track row.
    pub fn new(
        tracks: TrackTable,
        labels: Option<McLabelTable>,
        mft: Option<MftTable>,
    ) -> FwdTrackResult<Self> {
        tracks.check_lengths()?;
        if let Some(labels) = &labels {
            if labels.len() != tracks.len() {
                return Err(FwdTrackError::LengthMismatch {
                    context: "Truth-label table".to_string(),
                    expected: tracks.len(),
                    actual: labels.len(),
                });
            }
        }
        Ok(Self {
            tracks,
            labels,
            mft,
        })
    }

    /// Number of track rows.
    pub fn n_tracks(&self) -> usize {
        self.tracks.len()
    }

    /// The truth labels, or [`FwdTrackError::MissingTable`] if none were loaded.
    pub fn require_labels(&self) -> FwdTrackResult<&McLabelTable> {
        self.labels.as_ref().ok_or_else(|| FwdTrackError::MissingTable {
            name: "MC truth labels".to_string(),
        })
    }

    /// The truth mask of `row`, if labels were loaded.
    pub fn mc_mask(&self, row: usize) -> Option<u8> {
        self.labels
            .as_ref()
            .and_then(|labels| labels.mc_mask.get(row).copied())
    }

    /// MFT clusters to add to `track`'s own count. Only global muons carry a companion MFT
    /// track; a dangling index contributes nothing.
    pub fn extra_clusters(&self, row: usize, track: &TrackRecord) -> u32 {
        if !track.is(TrackType::GlobalMuon) || track.index_mft_track < 0 {
            return 0;
        }
        let Some(mft) = &self.mft else {
            return 0;
        };
        match mft.cluster_count(track.index_mft_track) {
            Some(count) => count,
            None => {
                debug!(
                    "Track {row} references MFT track {} but the MFT table has {} rows",
                    track.index_mft_track,
                    mft.len()
                );
                0
            }
        }
    }

    /// Derived kinematics of `track` (stored at `row`), optionally combining MFT clusters.
    pub fn kinematics(
        &self,
        row: usize,
        track: &TrackRecord,
        combine_mft: bool,
    ) -> TrackKinematics {
        let extra = if combine_mft {
            self.extra_clusters(row, track)
        } else {
            0
        };
        TrackKinematics::new(track, extra)
    }
}

/// A global muon at $`\eta = -3`$, $`p_T = 2`$ GeV/c, used as a building block in tests.
pub fn test_track() -> TrackRecord {
    TrackRecord {
        x: 1.25,
        y: -0.75,
        z: -45.0,
        phi: 0.5,
        tgl: -10.017874927409903, // sinh(-3)
        signed_1pt: -0.5,
        chi2: 1.5,
        chi2_match_mch_mid: 0.8,
        chi2_match_mch_mft: 5.0,
        match_score_mch_mft: 0.9,
        n_clusters: 10,
        track_type: TrackType::GlobalMuon.code(),
        index_mft_track: -1,
        index_match_mch_track: -1,
    }
}

/// A small dataset exercising every branch of the matching and accumulation logic.
///
/// | row | type | η | χ²(MCH-MFT) | match target | MFT | mask |
/// |-----|------|------|-----|----|----|---|
/// | 0 | 3 | -3 | | | | 0 |
/// | 1 | 0 | -3 | 5 | 0 | 0 | 0 |
/// | 2 | 0 | -3 | 3 | 0 | 1 | 1 |
/// | 3 | 3 | -3 | | | | 0 |
/// | 4 | 0 | -3 | 2 | 3 | 0 | 0 |
/// | 5 | 3 | -4 | | | | 0 |
/// | 6 | 2 | -3 | | | | 0 |
/// | 7 | 4 | -3 | | | | 0 |
/// | 8 | 0 | -3 | 150 | 5 | 9 | 0 |
///
/// Standalone rows 0 and 3 are in acceptance, of which only row 3 gets a correct best
/// match. Four global muons are in acceptance and three of them are correct. Row 8 points at
/// an MFT row that does not exist.
pub fn test_dataset() -> ForwardDataset {
    let base = test_track();
    let standalone = |tgl: f64| TrackRecord {
        tgl,
        chi2_match_mch_mft: -1.0,
        match_score_mch_mft: -1.0,
        n_clusters: 14,
        track_type: TrackType::MuonStandalone.code(),
        ..base
    };
    let global = |chi2_match: f64, target: i64, mft: i64| TrackRecord {
        chi2_match_mch_mft: chi2_match,
        index_match_mch_track: target,
        index_mft_track: mft,
        ..base
    };
    let records = vec![
        standalone(base.tgl),
        global(5.0, 0, 0),
        global(3.0, 0, 1),
        standalone(base.tgl),
        global(2.0, 3, 0),
        standalone(-27.28991719712775), // sinh(-4)
        TrackRecord {
            track_type: TrackType::GlobalForward.code(),
            chi2_match_mch_mid: -1.0,
            ..base
        },
        TrackRecord {
            track_type: TrackType::MchStandalone.code(),
            chi2_match_mch_mft: -1.0,
            chi2_match_mch_mid: -1.0,
            ..base
        },
        global(150.0, 5, 9),
    ];
    let labels = McLabelTable::new(vec![0, 0, 1, 0, 0, 0, 0, 0, 0]);
    // six and one clusters
    let mft = MftTable::new(vec![0x0011_1111, 0x0000_0001]);
    ForwardDataset {
        tracks: TrackTable::from_records(records),
        labels: Some(labels),
        mft: Some(mft),
    }
}
