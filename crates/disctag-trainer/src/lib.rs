//! # Disctag Trainer
//!
//! Front end for the disctag engine: JSON training configuration, a
//! tagged-corpus reader, token feature types, the epoch-driven training
//! loop and model loading for decoding.

pub mod config;
pub mod corpus;
pub mod error;
pub mod features;
pub mod tagger;
pub mod token;
pub mod trainer;

pub use config::{Mode, TrainerConfig};
pub use corpus::{Sentence, parse_corpus, read_corpus};
pub use error::{Result, TrainerError};
pub use features::standard_registry;
pub use tagger::{TaggedSentence, Tagger};
pub use token::{BOUNDARY, TokenObservation, WordObservation, observations};
pub use trainer::{EpochStats, Trainer, TrainingReport};
