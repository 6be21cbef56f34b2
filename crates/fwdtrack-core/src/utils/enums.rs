use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{data::TrackRecord, FwdTrackError};

/// Reconstruction categories of forward tracks, as stored in the `fTrackType` column.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackType {
    /// A muon-spectrometer track matched to an MFT track (MFT-MCH-MID), the "fused" track
    /// whose purity is measured.
    GlobalMuon,
    /// A global muon built from a non-leading MFT match candidate.
    GlobalMuonOtherMatch,
    /// An MFT-MCH track without MID confirmation.
    GlobalForward,
    /// A standalone MCH-MID track. These are the reference tracks for matching efficiency.
    MuonStandalone,
    /// A standalone MCH track.
    MchStandalone,
}

impl TrackType {
    /// Every category, ordered by code.
    pub const ALL: [TrackType; 5] = [
        TrackType::GlobalMuon,
        TrackType::GlobalMuonOtherMatch,
        TrackType::GlobalForward,
        TrackType::MuonStandalone,
        TrackType::MchStandalone,
    ];

    /// The integer code stored in the track table.
    pub fn code(&self) -> u8 {
        match self {
            TrackType::GlobalMuon => 0,
            TrackType::GlobalMuonOtherMatch => 1,
            TrackType::GlobalForward => 2,
            TrackType::MuonStandalone => 3,
            TrackType::MchStandalone => 4,
        }
    }

    /// The category for an integer code, if it is a known one.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|track_type| track_type.code() == code)
    }
}

impl Display for TrackType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackType::GlobalMuon => write!(f, "GlobalMuon"),
            TrackType::GlobalMuonOtherMatch => write!(f, "GlobalMuonOtherMatch"),
            TrackType::GlobalForward => write!(f, "GlobalForward"),
            TrackType::MuonStandalone => write!(f, "MuonStandalone"),
            TrackType::MchStandalone => write!(f, "MCHStandalone"),
        }
    }
}

impl FromStr for TrackType {
    type Err = FwdTrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "0" | "globalmuon" | "global" | "mft-mch-mid" => Ok(Self::GlobalMuon),
            "1" | "globalmuonothermatch" => Ok(Self::GlobalMuonOtherMatch),
            "2" | "globalforward" | "mft-mch" => Ok(Self::GlobalForward),
            "3" | "muonstandalone" | "mch-mid" => Ok(Self::MuonStandalone),
            "4" | "mchstandalone" | "mch" => Ok(Self::MchStandalone),
            _ => Err(FwdTrackError::ParseError {
                name: s.to_string(),
                object: "TrackType".to_string(),
            }),
        }
    }
}

/// Raw floating-point columns of the track table which get per-type distributions.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackColumn {
    /// `fX`
    X,
    /// `fY`
    Y,
    /// `fZ`
    Z,
    /// `fPhi`
    Phi,
    /// `fTgl`
    Tgl,
    /// `fSigned1Pt`
    Signed1Pt,
    /// `fChi2`
    Chi2,
    /// `fChi2MatchMCHMID`
    Chi2MatchMchMid,
    /// `fChi2MatchMCHMFT`
    Chi2MatchMchMft,
    /// `fMatchScoreMCHMFT`
    MatchScoreMchMft,
}

impl TrackColumn {
    /// Every column, in the order the distributions are produced.
    pub const ALL: [TrackColumn; 10] = [
        TrackColumn::X,
        TrackColumn::Y,
        TrackColumn::Z,
        TrackColumn::Phi,
        TrackColumn::Tgl,
        TrackColumn::Signed1Pt,
        TrackColumn::Chi2,
        TrackColumn::Chi2MatchMchMid,
        TrackColumn::Chi2MatchMchMft,
        TrackColumn::MatchScoreMchMft,
    ];

    /// The branch (column) name in the input tables.
    pub fn branch_name(&self) -> &'static str {
        match self {
            TrackColumn::X => "fX",
            TrackColumn::Y => "fY",
            TrackColumn::Z => "fZ",
            TrackColumn::Phi => "fPhi",
            TrackColumn::Tgl => "fTgl",
            TrackColumn::Signed1Pt => "fSigned1Pt",
            TrackColumn::Chi2 => "fChi2",
            TrackColumn::Chi2MatchMchMid => "fChi2MatchMCHMID",
            TrackColumn::Chi2MatchMchMft => "fChi2MatchMCHMFT",
            TrackColumn::MatchScoreMchMft => "fMatchScoreMCHMFT",
        }
    }

    /// `true` for the fit and matching $`\chi^2`$ columns.
    pub fn is_chi2(&self) -> bool {
        matches!(
            self,
            TrackColumn::Chi2 | TrackColumn::Chi2MatchMchMid | TrackColumn::Chi2MatchMchMft
        )
    }

    /// Read this column from a track.
    pub fn value(&self, track: &TrackRecord) -> f64 {
        match self {
            TrackColumn::X => track.x,
            TrackColumn::Y => track.y,
            TrackColumn::Z => track.z,
            TrackColumn::Phi => track.phi,
            TrackColumn::Tgl => track.tgl,
            TrackColumn::Signed1Pt => track.signed_1pt,
            TrackColumn::Chi2 => track.chi2,
            TrackColumn::Chi2MatchMchMid => track.chi2_match_mch_mid,
            TrackColumn::Chi2MatchMchMft => track.chi2_match_mch_mft,
            TrackColumn::MatchScoreMchMft => track.match_score_mch_mft,
        }
    }

    /// Histogram range used for this column's distribution of tracks with type code
    /// `track_type`. Matching and fit $`\chi^2`$ are much narrower for standalone tracks.
    pub fn distribution_range(&self, track_type: u8) -> (f64, f64) {
        match self {
            TrackColumn::Z => (-1000.0, 1000.0),
            TrackColumn::Signed1Pt => (-0.01, 0.01),
            c if c.is_chi2() && track_type <= 2 => (0.0, 50.0),
            c if c.is_chi2() => (0.0, 2.0),
            TrackColumn::MatchScoreMchMft => (0.0, 2.0),
            _ => (-10.0, 10.0),
        }
    }
}

impl Display for TrackColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.branch_name())
    }
}

impl FromStr for TrackColumn {
    type Err = FwdTrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        let bare = lower.strip_prefix('f').unwrap_or(&lower);
        Self::ALL
            .into_iter()
            .find(|column| {
                let name = column.branch_name().to_lowercase();
                name == lower || name[1..] == *bare
            })
            .ok_or_else(|| FwdTrackError::ParseError {
                name: s.to_string(),
                object: "TrackColumn".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_type_codes() {
        for track_type in TrackType::ALL {
            assert_eq!(TrackType::from_code(track_type.code()), Some(track_type));
        }
        assert_eq!(TrackType::from_code(7), None);
        assert_eq!("3".parse::<TrackType>().unwrap(), TrackType::MuonStandalone);
        assert_eq!(
            "GlobalMuon".parse::<TrackType>().unwrap(),
            TrackType::GlobalMuon
        );
        assert!("muon".parse::<TrackType>().is_err());
        assert_eq!(TrackType::MchStandalone.to_string(), "MCHStandalone");
    }

    #[test]
    fn test_track_column_parse() {
        assert_eq!("fX".parse::<TrackColumn>().unwrap(), TrackColumn::X);
        assert_eq!(
            "chi2matchmchmft".parse::<TrackColumn>().unwrap(),
            TrackColumn::Chi2MatchMchMft
        );
        assert_eq!(
            "fSigned1Pt".parse::<TrackColumn>().unwrap(),
            TrackColumn::Signed1Pt
        );
        assert!("fNClusters".parse::<TrackColumn>().is_err());
        assert_eq!(TrackColumn::Phi.to_string(), "fPhi");
    }

    #[test]
    fn test_distribution_ranges() {
        assert_eq!(TrackColumn::Z.distribution_range(0), (-1000.0, 1000.0));
        assert_eq!(TrackColumn::Signed1Pt.distribution_range(3), (-0.01, 0.01));
        assert_eq!(TrackColumn::Chi2.distribution_range(2), (0.0, 50.0));
        assert_eq!(TrackColumn::Chi2MatchMchMid.distribution_range(3), (0.0, 2.0));
        assert_eq!(TrackColumn::MatchScoreMchMft.distribution_range(0), (0.0, 2.0));
        assert_eq!(TrackColumn::Tgl.distribution_range(4), (-10.0, 10.0));
        assert_eq!(TrackColumn::X.distribution_range(0), (-10.0, 10.0));
    }
}
