//! Decoding with a trained model.

use std::fmt;
use std::sync::Arc;

use disctag_core::{
    BlockTable, Decoder, DiscTagError, FeatureTypeRegistry, FeatureTypeSet, Symbol, TagSet,
};
use tracing::{debug, info};

use crate::config::TrainerConfig;
use crate::error::Result;
use crate::features::standard_registry;
use crate::token::{TokenObservation, observations};

/// A tagged sentence with its path score and min-margin confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedSentence {
    pub words: Vec<String>,
    pub tags: Vec<Symbol>,
    pub score: f64,
    /// `None` when no position had an alternative tag.
    pub margin: Option<f64>,
}

impl fmt::Display for TaggedSentence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (word, tag) in self.words.iter().zip(&self.tags) {
            writeln!(f, "{word}/{tag}")?;
        }
        match self.margin {
            Some(margin) => write!(f, "# score {:.6} margin {margin:.6}", self.score),
            None => write!(f, "# score {:.6} margin none", self.score),
        }
    }
}

/// Decoder over a block table read from a model file.
pub struct Tagger {
    decoder: Decoder<TokenObservation>,
}

impl Tagger {
    pub fn new(decoder: Decoder<TokenObservation>) -> Self {
        Self { decoder }
    }

    /// Load the model named by `config` with the bundled feature types.
    pub fn load(config: &TrainerConfig) -> Result<Self> {
        Self::load_with_registry(config, &standard_registry()?)
    }

    /// Load the tag set, the feature list, the learned transitions when
    /// `learn_transitions` is set, and the model weights as a block table.
    pub fn load_with_registry(
        config: &TrainerConfig,
        registry: &FeatureTypeRegistry<TokenObservation>,
    ) -> Result<Self> {
        let mut tag_set = TagSet::from_file(&config.tag_set_file, config.tag_set_options())?;
        if config.learn_transitions {
            let transitions = config.transitions_file();
            if !transitions.exists() {
                return Err(DiscTagError::ModelLoad(format!(
                    "model was trained with learned transitions but '{}' is missing",
                    transitions.display()
                ))
                .into());
            }
            tag_set.read_transitions(&transitions)?;
            debug!(path = %transitions.display(), "read transitions");
        }
        let feature_types = FeatureTypeSet::from_file(&config.features_file, registry)?;
        let table = BlockTable::read(
            &config.model_file,
            &tag_set,
            &feature_types,
            &config.consistency_parameters(),
        )?;
        info!(
            path = %config.model_file.display(),
            n_contexts = table.n_contexts(),
            n_entries = table.n_entries(),
            "loaded model"
        );

        let decoder = Decoder::new(
            Arc::new(tag_set),
            Arc::new(feature_types),
            table,
            config.decoder_config(),
        )?;
        Ok(Self::new(decoder))
    }

    pub fn decoder(&self) -> &Decoder<TokenObservation> {
        &self.decoder
    }

    pub fn tag<S: AsRef<str>>(&mut self, words: &[S]) -> Result<TaggedSentence> {
        let result = self.decoder.decode_all_tags(&observations(words))?;
        let tag_set = self.decoder.tag_set();
        let n = result.best.tags.len();
        let tags = result.best.tags[1..n - 1]
            .iter()
            .map(|&t| tag_set.symbol(t).clone())
            .collect();
        Ok(TaggedSentence {
            words: words.iter().map(|w| w.as_ref().to_string()).collect(),
            tags,
            score: result.best.score,
            margin: result.margin,
        })
    }
}
