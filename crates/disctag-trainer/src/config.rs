//! Training job configuration, loaded from JSON.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use disctag_core::{Averaging, DecoderConfig, TagSetOptions};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, TrainerError};

/// Update rule applied to each training sentence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Update whenever the best path differs from gold.
    #[default]
    Perceptron,
    /// Update unless gold beats every competitor by `required_margin`.
    Margin,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Perceptron => write!(f, "perceptron"),
            Mode::Margin => write!(f, "margin"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerConfig {
    pub tag_set_file: PathBuf,
    pub features_file: PathBuf,
    pub training_file: PathBuf,
    pub model_file: PathBuf,

    #[serde(default = "default_epochs")]
    pub epochs: usize,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default = "default_required_margin")]
    pub required_margin: f64,
    #[serde(default)]
    pub averaging: Averaging,
    /// Eager averaging only: sum the weights every this many sentences.
    #[serde(default = "default_granularity")]
    pub weightsum_granularity: usize,

    #[serde(default = "default_true")]
    pub generate_st_co_suffix: bool,
    #[serde(default)]
    pub learn_transitions: bool,
    #[serde(default)]
    pub seed_features: bool,
    #[serde(default)]
    pub add_hyp_features: bool,

    #[serde(default)]
    pub randomize: bool,
    #[serde(default)]
    pub seed: u64,

    /// Stop once an epoch reaches this sentence accuracy.
    #[serde(default = "default_min_tot")]
    pub min_tot: f64,
    /// Stop once accuracy improves by less than this between epochs.
    #[serde(default)]
    pub min_change: f64,
    #[serde(default)]
    pub write_every_epoch: bool,
}

fn default_epochs() -> usize {
    5
}

fn default_required_margin() -> f64 {
    1.0
}

fn default_granularity() -> usize {
    1
}

fn default_true() -> bool {
    true
}

fn default_min_tot() -> f64 {
    1.0
}

impl TrainerConfig {
    /// A configuration with every optional setting at its default.
    pub fn new(
        tag_set_file: impl Into<PathBuf>,
        features_file: impl Into<PathBuf>,
        training_file: impl Into<PathBuf>,
        model_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            tag_set_file: tag_set_file.into(),
            features_file: features_file.into(),
            training_file: training_file.into(),
            model_file: model_file.into(),
            epochs: default_epochs(),
            mode: Mode::default(),
            required_margin: default_required_margin(),
            averaging: Averaging::default(),
            weightsum_granularity: default_granularity(),
            generate_st_co_suffix: true,
            learn_transitions: false,
            seed_features: false,
            add_hyp_features: false,
            randomize: false,
            seed: 0,
            min_tot: default_min_tot(),
            min_change: 0.0,
            write_every_epoch: false,
        }
    }

    /// Parse and validate a JSON configuration. Relative paths are resolved
    /// against the directory holding the file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let mut config = Self::from_json(&text)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        debug!(path = %path.display(), ?config, "loaded trainer configuration");
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(TrainerError::Config("epochs must be at least 1".into()));
        }
        if self.required_margin.is_nan() || self.required_margin <= 0.0 {
            return Err(TrainerError::Config(format!(
                "required_margin must be positive, got {}",
                self.required_margin
            )));
        }
        if self.weightsum_granularity == 0 {
            return Err(TrainerError::Config(
                "weightsum_granularity must be at least 1".into(),
            ));
        }
        if !self.min_tot.is_finite() || !self.min_change.is_finite() {
            return Err(TrainerError::Config(
                "min_tot and min_change must be finite".into(),
            ));
        }
        Ok(())
    }

    fn resolve_paths(&mut self, base: &Path) {
        for path in [
            &mut self.tag_set_file,
            &mut self.features_file,
            &mut self.training_file,
            &mut self.model_file,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }

    pub fn tag_set_options(&self) -> TagSetOptions {
        TagSetOptions::default().with_st_co_suffix(self.generate_st_co_suffix)
    }

    pub fn decoder_config(&self) -> DecoderConfig {
        DecoderConfig::new()
            .with_add_hyp_features(self.add_hyp_features)
            .with_averaging(self.averaging)
    }

    /// Settings a model must be decoded with, recorded as `*` lines in the
    /// model header and checked when the model is read back.
    pub fn consistency_parameters(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (
                "tag_set_file".to_string(),
                self.tag_set_file.display().to_string(),
            ),
            (
                "features_file".to_string(),
                self.features_file.display().to_string(),
            ),
            (
                "generate_st_co_suffix".to_string(),
                self.generate_st_co_suffix.to_string(),
            ),
        ])
    }

    /// Path of the snapshot written after `epoch` (1-based).
    pub fn epoch_model_file(&self, epoch: usize) -> PathBuf {
        suffixed(&self.model_file, &format!("-epoch-{epoch}"))
    }

    pub fn transitions_file(&self) -> PathBuf {
        suffixed(&self.model_file, "-transitions")
    }
}

fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}
