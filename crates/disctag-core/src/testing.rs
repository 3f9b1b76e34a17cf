//! Toy observations and feature types shared by the unit tests.

use std::sync::Arc;

use crate::feature::Feature;
use crate::feature_type::{FeatureType, FeatureTypeRegistry, FeatureTypeSet, State};
use crate::symbol::Symbol;

pub const BOUNDARY: &str = "<boundary>";

#[derive(Debug, Clone)]
pub struct Token {
    pub word: String,
}

/// A padded observation sequence: boundary, words..., boundary.
pub fn tokens(words: &[&str]) -> Vec<Token> {
    std::iter::once(BOUNDARY)
        .chain(words.iter().copied())
        .chain(std::iter::once(BOUNDARY))
        .map(|w| Token {
            word: w.to_string(),
        })
        .collect()
}

macro_rules! named_type {
    ($ty:ident, $name:literal) => {
        pub struct $ty {
            name: Symbol,
        }

        impl Default for $ty {
            fn default() -> Self {
                Self {
                    name: Symbol::new($name),
                }
            }
        }
    };
}

named_type!(WordType, "word");
named_type!(CapitalizedType, "cap");
named_type!(PrevTagType, "prev-tag");

impl FeatureType<Token> for WordType {
    fn name(&self) -> &Symbol {
        &self.name
    }

    fn extract(&self, state: &State<'_, Token>, out: &mut Vec<Feature>) {
        out.push(Feature::new(
            self.name.clone(),
            state.tag().clone(),
            vec![Symbol::from(state.current().word.as_str())],
        ));
    }
}

impl FeatureType<Token> for CapitalizedType {
    fn name(&self) -> &Symbol {
        &self.name
    }

    fn extract(&self, state: &State<'_, Token>, out: &mut Vec<Feature>) {
        if state
            .current()
            .word
            .chars()
            .next()
            .is_some_and(char::is_uppercase)
        {
            out.push(Feature::new(
                self.name.clone(),
                state.tag().clone(),
                Vec::new(),
            ));
        }
    }
}

impl FeatureType<Token> for PrevTagType {
    fn name(&self) -> &Symbol {
        &self.name
    }

    fn uses_previous_tag(&self) -> bool {
        true
    }

    fn extract(&self, state: &State<'_, Token>, out: &mut Vec<Feature>) {
        if let Some(prev) = state.prev_tag() {
            out.push(Feature::new(
                self.name.clone(),
                state.tag().clone(),
                vec![prev.clone()],
            ));
        }
    }
}

/// Registry with every test feature type.
pub fn registry() -> FeatureTypeRegistry<Token> {
    let mut registry = FeatureTypeRegistry::new();
    registry.register("word", || Arc::new(WordType::default()));
    registry.register("cap", || Arc::new(CapitalizedType::default()));
    registry.register("prev-tag", || Arc::new(PrevTagType::default()));
    registry
}

/// `word` and `cap`: observation-only.
pub fn word_and_cap() -> FeatureTypeSet<Token> {
    FeatureTypeSet::new()
        .with(Arc::new(WordType::default()))
        .and_then(|s| s.with(Arc::new(CapitalizedType::default())))
        .unwrap()
}

/// `word`, `cap` and `prev-tag`.
pub fn all_types() -> FeatureTypeSet<Token> {
    word_and_cap()
        .with(Arc::new(PrevTagType::default()))
        .unwrap()
}
