use std::{
    fs,
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    data::DatasetReadOptions,
    matching::DEFAULT_CHI2_THRESHOLD,
    optimize::ThresholdScan,
    stats::DEFAULT_CONFIDENCE_LEVEL,
    utils::{enums::TrackType, variables::TrackVariable, Binning},
    FwdTrackError, FwdTrackResult,
};

/// Name of the aggregate results file inside the output directory.
pub const RESULTS_FILE_NAME: &str = "results.json";

/// Everything that steers an analysis run. Fields missing from a YAML file keep their
/// defaults.
///
/// ```yaml
/// chi2_threshold: 50.0
/// variables:
///   pt: { edges: [0.0, 1.0, 2.0, 5.0, 20.0] }
///   eta: { bins: 11, min: -3.6, max: -2.5 }
/// pairs:
///   - [pt, eta]
/// scan: { start: 1.0, stop: 20.0, step: 0.5 }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Table names and ROOT directory.
    pub input: DatasetReadOptions,
    /// Upper (exclusive) matching $`\chi^2`$ of an acceptable best match.
    pub chi2_threshold: f64,
    /// Confidence level of the efficiency intervals.
    pub confidence_level: f64,
    /// Variables to bin efficiency and purity in, with their binning.
    pub variables: IndexMap<TrackVariable, Binning>,
    /// Variable pairs for 2-D efficiency and purity maps.
    pub pairs: Vec<(TrackVariable, TrackVariable)>,
    /// Thresholds of the matching-$`\chi^2`$ scan.
    pub scan: ThresholdScan,
    /// Directory receiving every output file.
    pub output_dir: String,
    /// Path of the results file, `<output_dir>/results.json` when absent.
    pub results_file: Option<String>,
    /// Whether to render PNG images.
    pub render_plots: bool,
    /// Scale each track-class distribution to unit area.
    pub normalize_distributions: bool,
    /// Add MFT clusters to the cluster count of global muons.
    pub combine_mft_clusters: bool,
    /// Track-type codes which get raw-column distributions.
    pub distribution_types: Vec<u8>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            input: DatasetReadOptions::default(),
            chi2_threshold: DEFAULT_CHI2_THRESHOLD,
            confidence_level: DEFAULT_CONFIDENCE_LEVEL,
            variables: TrackVariable::ALL
                .into_iter()
                .map(|variable| (variable, variable.default_binning()))
                .collect(),
            pairs: vec![
                (TrackVariable::Pt, TrackVariable::Phi),
                (TrackVariable::Eta, TrackVariable::Phi),
                (TrackVariable::Pt, TrackVariable::NClusters),
                (TrackVariable::Pt, TrackVariable::Chi2),
                (TrackVariable::Eta, TrackVariable::NClusters),
                (TrackVariable::Eta, TrackVariable::Chi2),
            ],
            scan: ThresholdScan::default(),
            output_dir: "output".to_string(),
            results_file: None,
            render_plots: true,
            normalize_distributions: false,
            combine_mft_clusters: true,
            distribution_types: vec![
                TrackType::GlobalMuon.code(),
                TrackType::GlobalForward.code(),
                TrackType::MuonStandalone.code(),
                TrackType::MchStandalone.code(),
            ],
        }
    }
}

impl AnalysisConfig {
    /// Read a YAML configuration file and validate it.
    pub fn load<P: AsRef<Path>>(path: P) -> FwdTrackResult<Self> {
        let path = path.as_ref();
        let expanded = PathBuf::from(&*shellexpand::full(&path.to_string_lossy())?);
        let contents = fs::read_to_string(&expanded)?;
        let config: AnalysisConfig = serde_yaml::from_str(&contents)?;
        config.validate()?;
        debug!("Loaded configuration from {}", expanded.display());
        Ok(config)
    }

    /// Check every binning, pair, threshold and level.
    pub fn validate(&self) -> FwdTrackResult<()> {
        for (variable, binning) in &self.variables {
            binning.validate(variable.name())?;
        }
        for (x, y) in &self.pairs {
            for variable in [x, y] {
                if !self.variables.contains_key(variable) {
                    return Err(FwdTrackError::UnknownVariable {
                        name: variable.name().to_string(),
                    });
                }
            }
        }
        if !(self.chi2_threshold > 0.0) {
            return Err(FwdTrackError::Custom(format!(
                "chi2_threshold must be positive, got {}",
                self.chi2_threshold
            )));
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(FwdTrackError::Custom(format!(
                "confidence_level must lie in (0, 1), got {}",
                self.confidence_level
            )));
        }
        self.scan.validate()
    }

    /// The output directory with `~` and environment variables expanded.
    pub fn output_dir_path(&self) -> FwdTrackResult<PathBuf> {
        Ok(PathBuf::from(&*shellexpand::full(&self.output_dir)?))
    }

    /// Where the results file goes.
    pub fn results_path(&self) -> FwdTrackResult<PathBuf> {
        match &self.results_file {
            Some(file) => Ok(PathBuf::from(&*shellexpand::full(file)?)),
            None => Ok(self.output_dir_path()?.join(RESULTS_FILE_NAME)),
        }
    }

    /// The binning of `variable`, if it is analysed.
    pub fn binning(&self, variable: TrackVariable) -> Option<&Binning> {
        self.variables.get(&variable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.variables.len(), 5);
        assert_eq!(config.pairs.len(), 6);
        assert_eq!(config.distribution_types, vec![0, 2, 3, 4]);
        assert_eq!(
            config.results_path().unwrap(),
            PathBuf::from("output").join("results.json")
        );
    }

    #[test]
    fn test_load_partial_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"chi2_threshold: 50.0\n\
              variables:\n  pt: { edges: [0.0, 1.0, 5.0] }\n  eta: { bins: 5, min: -3.6, max: -2.5 }\n\
              pairs:\n  - [pt, eta]\n\
              scan: { stop: 10.0 }\n\
              input: { directory: DF_2336986643568128 }\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let config = AnalysisConfig::load(&path).unwrap();
        assert_eq!(config.chi2_threshold, 50.0);
        assert_eq!(config.variables.len(), 2);
        assert_eq!(
            config.binning(TrackVariable::Pt),
            Some(&Binning::edges([0.0, 1.0, 5.0]))
        );
        assert_eq!(
            config.binning(TrackVariable::Eta),
            Some(&Binning::uniform(5, -3.6, -2.5))
        );
        assert_eq!(config.pairs, vec![(TrackVariable::Pt, TrackVariable::Eta)]);
        assert_eq!(config.scan.len(), 10);
        assert_eq!(config.input.tracks_tree, "O2fwdtrack");
        assert_eq!(config.input.directory.as_deref(), Some("DF_2336986643568128"));
        assert!(config.render_plots);
    }

    #[test]
    fn test_pairs_must_reference_variables() {
        let mut config = AnalysisConfig::default();
        config.variables.shift_remove(&TrackVariable::Phi);
        assert!(matches!(
            config.validate(),
            Err(FwdTrackError::UnknownVariable { name }) if name == "phi"
        ));
    }

    #[test]
    fn test_rejects_bad_values() {
        let config = AnalysisConfig {
            chi2_threshold: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        let config = AnalysisConfig {
            confidence_level: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        let mut config = AnalysisConfig::default();
        config
            .variables
            .insert(TrackVariable::Pt, Binning::edges([1.0, 0.5]));
        assert!(matches!(
            config.validate(),
            Err(FwdTrackError::InvalidBinning { .. })
        ));
    }

    #[test]
    fn test_unknown_yaml_variable_fails() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"variables:\n  rapidity: { bins: 5, min: 0.0, max: 1.0 }\n")
            .unwrap();
        let path = temp.into_temp_path();
        assert!(matches!(
            AnalysisConfig::load(&path),
            Err(FwdTrackError::YamlError(_))
        ));
    }
}
