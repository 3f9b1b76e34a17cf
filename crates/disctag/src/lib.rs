//! # Disctag
//!
//! Discriminative sequence tagging: the engine from `disctag-core` and the
//! training and decoding front end from `disctag-trainer`.

pub use disctag_core::*;

pub mod trainer {
    pub use disctag_trainer::*;
}
