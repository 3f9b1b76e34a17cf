//! # Disctag Core
//!
//! A discriminative sequence tagger: a BIO tag set with a learned transition
//! relation, pluggable feature extractors, sparse and block weight storage,
//! and a Viterbi decoder with margins and averaged-perceptron training.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use disctag_core::{
//!     Decoder, DecoderConfig, Feature, FeatureType, FeatureTypeSet, State, Symbol, TagSet,
//!     TagSetOptions, WeightMap,
//! };
//!
//! struct Word(Symbol);
//!
//! impl FeatureType<String> for Word {
//!     fn name(&self) -> &Symbol {
//!         &self.0
//!     }
//!
//!     fn extract(&self, state: &State<'_, String>, out: &mut Vec<Feature>) {
//!         let word = Symbol::from(state.current().as_str());
//!         out.push(Feature::new(self.0.clone(), state.tag().clone(), vec![word]));
//!     }
//! }
//!
//! let tag_set = Arc::new(TagSet::new(&["PER"], TagSetOptions::default()).unwrap());
//! let types = FeatureTypeSet::new().with(Arc::new(Word(Symbol::new("word")))).unwrap();
//! let mut decoder = Decoder::new(
//!     tag_set.clone(),
//!     Arc::new(types),
//!     WeightMap::new(),
//!     DecoderConfig::default(),
//! )
//! .unwrap();
//!
//! let sentence: Vec<String> = ["<s>", "Alice", "</s>"].iter().map(|s| s.to_string()).collect();
//! let gold = [
//!     tag_set.start_index().unwrap(),
//!     tag_set.index("PER-ST").unwrap(),
//!     tag_set.end_index().unwrap(),
//! ];
//! decoder.train(&sentence, &gold, 1).unwrap();
//!
//! let decoded = decoder.decode(&sentence).unwrap();
//! assert_eq!(decoded.tags, gold);
//! ```
pub mod decoder;
pub mod error;
pub mod feature;
pub mod feature_type;
pub mod model_file;
pub mod split;
pub mod storage;
pub mod symbol;
pub mod tagset;
pub mod weight;

#[cfg(test)]
pub(crate) mod testing;

// Re-export primary API
pub use decoder::{
    Constraint, Decoded, Decoder, DecoderConfig, MarginOutcome, MarginResult, TrainOutcome,
};
pub use error::{DiscTagError, Result};
pub use feature::{Feature, FeatureContext};
pub use feature_type::{FeatureType, FeatureTypeRegistry, FeatureTypeSet, State};
pub use model_file::{ModelFile, ModelHeader};
pub use split::FeatureTypeSplit;
pub use storage::{BlockTable, WeightMap, WeightStorage, WriteMode};
pub use symbol::Symbol;
pub use tagset::{BioRole, Tag, TagKind, TagSet, TagSetOptions};
pub use weight::{Averaging, Weight};
