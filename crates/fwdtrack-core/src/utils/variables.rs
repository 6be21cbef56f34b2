use std::{f64::consts::PI, fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{data::TrackRecord, utils::Binning, FwdTrackError};

/// Lower (exclusive) pseudorapidity edge of the forward acceptance.
pub const ETA_MIN: f64 = -3.6;
/// Upper (exclusive) pseudorapidity edge of the forward acceptance.
pub const ETA_MAX: f64 = -2.5;

/// Number of 4-bit cluster-size slots packed into an MFT track's cluster word.
pub const MFT_CLUSTER_SLOTS: usize = 10;

/// Pseudorapidity from the tangent of the dip angle, $`\eta = \sinh^{-1}(\tan\lambda)`$.
pub fn pseudorapidity(tgl: f64) -> f64 {
    tgl.asinh()
}

/// Transverse momentum from the signed inverse transverse momentum. A zero input gives
/// `+inf`, which lands in the overflow of any histogram.
pub fn transverse_momentum(signed_1pt: f64) -> f64 {
    1.0 / signed_1pt.abs()
}

/// `true` if `eta` lies strictly inside the forward acceptance window.
pub fn is_in_acceptance(eta: f64) -> bool {
    eta > ETA_MIN && eta < ETA_MAX
}

/// Count the MFT layers with a cluster: the number of non-zero 4-bit sizes among the lowest
/// [`MFT_CLUSTER_SLOTS`] nibbles of the packed word. Upper bits carry flags and are ignored.
pub fn mft_cluster_count(cluster_sizes_and_flags: u64) -> u32 {
    (0..MFT_CLUSTER_SLOTS)
        .filter(|slot| (cluster_sizes_and_flags >> (slot * 4)) & 0xF != 0)
        .count() as u32
}

/// Quantities of one track which efficiency and purity are binned in.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TrackKinematics {
    /// Transverse momentum.
    pub pt: f64,
    /// Pseudorapidity.
    pub eta: f64,
    /// Azimuth.
    pub phi: f64,
    /// Track-fit $`\chi^2`$.
    pub chi2: f64,
    /// Number of clusters, including MFT clusters when combined.
    pub n_clusters: f64,
}

impl TrackKinematics {
    /// Derive the kinematics of `track`, adding `extra_clusters` (from a companion MFT track)
    /// to its own cluster count.
    pub fn new(track: &TrackRecord, extra_clusters: u32) -> Self {
        Self {
            pt: transverse_momentum(track.signed_1pt),
            eta: pseudorapidity(track.tgl),
            phi: track.phi,
            chi2: track.chi2,
            n_clusters: (track.n_clusters as i64 + extra_clusters as i64) as f64,
        }
    }
}

/// The variables efficiency and purity can be binned in.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackVariable {
    /// Transverse momentum, $`p_T = 1/|q/p_T|`$.
    #[serde(rename = "pt")]
    Pt,
    /// Track-fit $`\chi^2`$.
    #[serde(rename = "chi2")]
    Chi2,
    /// Number of clusters attached to the track.
    #[serde(rename = "nClusters")]
    NClusters,
    /// Azimuthal angle.
    #[serde(rename = "phi")]
    Phi,
    /// Pseudorapidity.
    #[serde(rename = "eta")]
    Eta,
}

impl TrackVariable {
    /// Every variable, in the default booking order.
    pub const ALL: [TrackVariable; 5] = [
        TrackVariable::Pt,
        TrackVariable::Chi2,
        TrackVariable::NClusters,
        TrackVariable::Phi,
        TrackVariable::Eta,
    ];

    /// Short name used in histogram and file names.
    pub fn name(&self) -> &'static str {
        match self {
            TrackVariable::Pt => "pt",
            TrackVariable::Chi2 => "chi2",
            TrackVariable::NClusters => "nClusters",
            TrackVariable::Phi => "phi",
            TrackVariable::Eta => "eta",
        }
    }

    /// Formatted axis title.
    pub fn axis_label(&self) -> &'static str {
        match self {
            TrackVariable::Pt => "pT (GeV/c)",
            TrackVariable::Chi2 => "χ²/ndf",
            TrackVariable::NClusters => "N clusters",
            TrackVariable::Phi => "φ (rad)",
            TrackVariable::Eta => "η",
        }
    }

    /// The binning used when none is configured.
    pub fn default_binning(&self) -> Binning {
        match self {
            TrackVariable::Pt => Binning::edges([
                0.0, 0.05, 0.1, 0.2, 0.5, 1.0, 2.0, 4.0, 6.0, 8.0, 12.0, 20.0, 50.0,
            ]),
            TrackVariable::Chi2 => Binning::edges([0.0, 1.0, 2.0, 5.0, 10.0, 20.0, 50.0, 100.0]),
            TrackVariable::NClusters => {
                Binning::edges([0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 7.0, 10.0, 15.0, 20.0])
            }
            TrackVariable::Phi => Binning::uniform(36, -PI, PI),
            TrackVariable::Eta => Binning::uniform(11, ETA_MIN, ETA_MAX),
        }
    }

    /// Pick this variable out of a track's kinematics.
    pub fn value(&self, kinematics: &TrackKinematics) -> f64 {
        match self {
            TrackVariable::Pt => kinematics.pt,
            TrackVariable::Chi2 => kinematics.chi2,
            TrackVariable::NClusters => kinematics.n_clusters,
            TrackVariable::Phi => kinematics.phi,
            TrackVariable::Eta => kinematics.eta,
        }
    }
}

impl Display for TrackVariable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for TrackVariable {
    type Err = FwdTrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pt" | "p_t" => Ok(Self::Pt),
            "chi2" => Ok(Self::Chi2),
            "nclusters" | "nclus" => Ok(Self::NClusters),
            "phi" => Ok(Self::Phi),
            "eta" => Ok(Self::Eta),
            _ => Err(FwdTrackError::ParseError {
                name: s.to_string(),
                object: "TrackVariable".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_track;
    use approx::assert_relative_eq;

    #[test]
    fn test_acceptance_window() {
        assert!(is_in_acceptance(-3.0));
        assert!(!is_in_acceptance(-4.0));
        assert!(!is_in_acceptance(-2.5));
        assert!(!is_in_acceptance(-3.6));
        assert!(is_in_acceptance(-3.5999));
        assert!(!is_in_acceptance(f64::NAN));
    }

    #[test]
    fn test_pseudorapidity() {
        assert_relative_eq!(pseudorapidity(0.0), 0.0);
        assert_relative_eq!(pseudorapidity(-10.0178749), -3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_transverse_momentum() {
        assert_relative_eq!(transverse_momentum(-0.5), 2.0);
        assert_relative_eq!(transverse_momentum(0.25), 4.0);
        assert!(transverse_momentum(0.0).is_infinite());
    }

    #[test]
    fn test_mft_cluster_count() {
        assert_eq!(mft_cluster_count(0), 0);
        assert_eq!(mft_cluster_count(0x1), 1);
        assert_eq!(mft_cluster_count(0x0102_0304_05), 5);
        assert_eq!(mft_cluster_count(0xFFFF_FFFF_FF), 10);
        // flag bits above the cluster nibbles do not count
        assert_eq!(mft_cluster_count(0xF000_0000_0000_0001), 1);
    }

    #[test]
    fn test_kinematics_combines_clusters() {
        let track = test_track();
        let kinematics = TrackKinematics::new(&track, 7);
        assert_relative_eq!(kinematics.n_clusters, (track.n_clusters + 7) as f64);
        assert_relative_eq!(kinematics.pt, 1.0 / track.signed_1pt.abs());
        assert_relative_eq!(TrackVariable::Eta.value(&kinematics), track.tgl.asinh());
    }

    #[test]
    fn test_variable_parse() {
        assert_eq!("nClusters".parse::<TrackVariable>().unwrap(), TrackVariable::NClusters);
        assert_eq!("PT".parse::<TrackVariable>().unwrap(), TrackVariable::Pt);
        assert!("rapidity".parse::<TrackVariable>().is_err());
        for variable in TrackVariable::ALL {
            assert_eq!(variable.name().parse::<TrackVariable>().unwrap(), variable);
            assert!(variable.default_binning().validate(variable.name()).is_ok());
        }
    }
}
