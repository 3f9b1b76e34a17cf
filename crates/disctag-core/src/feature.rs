//! Feature identity.
//!
//! A [`Feature`] is `(feature type, payload, tag)`. Its derived `Eq`/`Hash`
//! give the with-tag identity used by the sparse weight map; its
//! [`FeatureContext`] is the without-tag identity used by the block table.
//! Two features equal with tag always share a context, so both contracts
//! stay consistent.

use std::fmt;

use crate::symbol::Symbol;

/// The tag-independent part of a feature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureContext {
    pub type_name: Symbol,
    pub payload: Vec<Symbol>,
}

impl FeatureContext {
    /// Context keyed by `type_name` and `payload`.
    pub fn new(type_name: Symbol, payload: Vec<Symbol>) -> Self {
        Self { type_name, payload }
    }
}

impl fmt::Display for FeatureContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name)?;
        for item in &self.payload {
            write!(f, " {item}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Feature {
    pub context: FeatureContext,
    pub tag: Symbol,
}

impl Feature {
    /// Feature of type `type_name` for `tag`, keyed by `payload`.
    pub fn new(type_name: Symbol, tag: Symbol, payload: Vec<Symbol>) -> Self {
        Self {
            context: FeatureContext::new(type_name, payload),
            tag,
        }
    }

    /// Name of the feature type that produced this feature.
    pub fn type_name(&self) -> &Symbol {
        &self.context.type_name
    }

    /// Everything in the key beyond the type name.
    pub fn payload(&self) -> &[Symbol] {
        &self.context.payload
    }

    /// Without-tag equality.
    pub fn same_context(&self, other: &Feature) -> bool {
        self.context == other.context
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.context.type_name, self.tag)?;
        for item in &self.context.payload {
            write!(f, " {item}")?;
        }
        Ok(())
    }
}
