//! Feature extractors and the sets and registries that hold them.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::error::{DiscTagError, Result};
use crate::feature::Feature;
use crate::symbol::Symbol;
use crate::tagset::TagSet;

/// The view of one scored transition handed to feature extractors.
///
/// Built fresh for every `(position, tag, previous tag)` the decoder scores.
pub struct State<'a, O> {
    tag_set: &'a TagSet,
    tag: usize,
    prev_tag: Option<usize>,
    index: usize,
    observations: &'a [O],
}

impl<'a, O> State<'a, O> {
    /// View of `tag` (after `prev_tag`) at `index` of `observations`.
    pub fn new(
        tag_set: &'a TagSet,
        tag: usize,
        prev_tag: Option<usize>,
        index: usize,
        observations: &'a [O],
    ) -> Self {
        Self {
            tag_set,
            tag,
            prev_tag,
            index,
            observations,
        }
    }

    /// Index of the tag being scored.
    pub fn tag_index(&self) -> usize {
        self.tag
    }

    /// Full symbol of the tag being scored, e.g. `PER-ST`.
    pub fn tag(&self) -> &'a Symbol {
        self.tag_set.symbol(self.tag)
    }

    /// Entity type of the tag being scored, e.g. `PER`.
    pub fn reduced_tag(&self) -> &'a Symbol {
        self.tag_set.reduced(self.tag)
    }

    /// Semi-reduced symbol of the tag being scored.
    pub fn semi_reduced_tag(&self) -> &'a Symbol {
        self.tag_set.semi_reduced(self.tag)
    }

    /// Symbol of the previous tag. `None` when the feature type being
    /// evaluated does not depend on it.
    pub fn prev_tag(&self) -> Option<&'a Symbol> {
        self.prev_tag.map(|t| self.tag_set.symbol(t))
    }

    /// Position in the padded observation sequence.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The whole padded sequence.
    pub fn observations(&self) -> &'a [O] {
        self.observations
    }

    /// Observation at the current position.
    pub fn current(&self) -> &'a O {
        &self.observations[self.index]
    }

    /// Observation at `index + offset`, if inside the padded sequence.
    pub fn at_offset(&self, offset: isize) -> Option<&'a O> {
        self.index
            .checked_add_signed(offset)
            .and_then(|i| self.observations.get(i))
    }

    /// Tags being decoded over.
    pub fn tag_set(&self) -> &'a TagSet {
        self.tag_set
    }
}

/// A feature extractor.
///
/// Extractors that do not use the previous tag must produce contexts that
/// are independent of the tag being scored: the decoder evaluates them
/// once per position and reads the weights of every tag from that context.
pub trait FeatureType<O>: Send + Sync {
    fn name(&self) -> &Symbol;

    /// Whether the extracted features depend on the previous tag.
    fn uses_previous_tag(&self) -> bool {
        false
    }

    /// Append the features active in `state` to `out`.
    fn extract(&self, state: &State<'_, O>, out: &mut Vec<Feature>);
}

/// An ordered collection of feature types.
pub struct FeatureTypeSet<O> {
    types: Vec<Arc<dyn FeatureType<O>>>,
}

impl<O> Clone for FeatureTypeSet<O> {
    fn clone(&self) -> Self {
        Self {
            types: self.types.clone(),
        }
    }
}

impl<O> fmt::Debug for FeatureTypeSet<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.types.iter().map(|t| t.name()))
            .finish()
    }
}

impl<O> Default for FeatureTypeSet<O> {
    fn default() -> Self {
        Self { types: Vec::new() }
    }
}

impl<O> FeatureTypeSet<O> {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a feature type. Names must be unique within a set.
    pub fn push(&mut self, feature_type: Arc<dyn FeatureType<O>>) -> Result<()> {
        if self.get(feature_type.name()).is_some() {
            return Err(DiscTagError::Configuration(format!(
                "duplicate feature type '{}'",
                feature_type.name()
            )));
        }
        self.types.push(feature_type);
        Ok(())
    }

    /// Builder form of [`FeatureTypeSet::push`].
    pub fn with(mut self, feature_type: Arc<dyn FeatureType<O>>) -> Result<Self> {
        self.push(feature_type)?;
        Ok(self)
    }

    /// Number of feature types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether no feature types are set.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Feature types in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn FeatureType<O>>> {
        self.types.iter()
    }

    /// Feature types as a slice, in declaration order.
    pub fn types(&self) -> &[Arc<dyn FeatureType<O>>] {
        &self.types
    }

    /// Look up a feature type by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn FeatureType<O>>> {
        self.types.iter().find(|t| t.name() == name)
    }

    /// Whether a type named `name` is in the set.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Build a set from a feature-type list: a count followed by that many
    /// names, each resolved through `registry`.
    pub fn parse(text: &str, registry: &FeatureTypeRegistry<O>) -> Result<Self> {
        let mut tokens = text.split_whitespace();
        let count: usize = tokens
            .next()
            .ok_or_else(|| DiscTagError::Configuration("empty feature type list".into()))?
            .parse()
            .map_err(|_| {
                DiscTagError::Configuration(
                    "feature type list must start with a feature type count".into(),
                )
            })?;
        let names: Vec<&str> = tokens.collect();
        if names.len() != count {
            return Err(DiscTagError::Configuration(format!(
                "feature type list declares {count} types but names {}",
                names.len()
            )));
        }

        let mut set = Self::new();
        for name in names {
            set.push(registry.build(name)?)?;
        }
        debug!(n_types = set.len(), "built feature type set");
        Ok(set)
    }

    /// Read a feature-type list from `path`. See [`FeatureTypeSet::parse`].
    pub fn from_file<P: AsRef<Path>>(path: P, registry: &FeatureTypeRegistry<O>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            DiscTagError::Configuration(format!(
                "unable to read feature type list '{}': {e}",
                path.display()
            ))
        })?;
        Self::parse(&text, registry)
    }
}

type Constructor<O> = Box<dyn Fn() -> Arc<dyn FeatureType<O>> + Send + Sync>;

/// Name-to-constructor table used to resolve feature-type lists.
///
/// Callers build one and pass it explicitly wherever a list is loaded.
pub struct FeatureTypeRegistry<O> {
    constructors: HashMap<Symbol, Constructor<O>>,
}

impl<O> Default for FeatureTypeRegistry<O> {
    fn default() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }
}

impl<O> FeatureTypeRegistry<O> {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `constructor` under `name`, replacing any earlier entry.
    pub fn register<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn() -> Arc<dyn FeatureType<O>> + Send + Sync + 'static,
    {
        self.constructors
            .insert(Symbol::new(name), Box::new(constructor));
    }

    /// Instantiate the feature type registered as `name`.
    pub fn build(&self, name: &str) -> Result<Arc<dyn FeatureType<O>>> {
        self.constructors
            .get(name)
            .map(|constructor| constructor())
            .ok_or_else(|| DiscTagError::Configuration(format!("unknown feature type '{name}'")))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&Symbol> {
        let mut names: Vec<&Symbol> = self.constructors.keys().collect();
        names.sort();
        names
    }

    /// A set holding every registered type, in name order.
    pub fn build_all(&self) -> Result<FeatureTypeSet<O>> {
        let mut set = FeatureTypeSet::new();
        for name in self.names() {
            set.push(self.build(name)?)?;
        }
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tagset::TagSetOptions;
    use crate::testing::{Token, WordType, registry, tokens};

    #[test]
    fn test_state_accessors() {
        let ts = TagSet::new(&["PER"], TagSetOptions::default()).unwrap();
        let obs = tokens(&["John", "Smith"]);
        let per_co = ts.index("PER-CO").unwrap();
        let per_st = ts.index("PER-ST").unwrap();
        let state = State::new(&ts, per_co, Some(per_st), 2, &obs);

        assert_eq!(state.tag(), "PER-CO");
        assert_eq!(state.reduced_tag(), "PER");
        assert_eq!(state.semi_reduced_tag(), "PER");
        assert_eq!(state.prev_tag().unwrap(), "PER-ST");
        assert_eq!(state.current().word, "Smith");
        assert_eq!(state.at_offset(-1).unwrap().word, "John");
        assert!(state.at_offset(-3).is_none());
        assert!(state.at_offset(2).is_none());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let set: FeatureTypeSet<Token> = FeatureTypeSet::new()
            .with(Arc::new(WordType::default()))
            .unwrap();
        let err = set.with(Arc::new(WordType::default())).unwrap_err();
        assert!(matches!(err, DiscTagError::Configuration(_)));
    }

    #[test]
    fn test_parse_with_registry() {
        let set = FeatureTypeSet::parse("3\nword\ncap\nprev-tag\n", &registry()).unwrap();
        assert_eq!(set.len(), 3);
        assert!(set.contains("cap"));
        assert!(set.get("prev-tag").unwrap().uses_previous_tag());
        assert!(!set.get("word").unwrap().uses_previous_tag());
    }

    #[test]
    fn test_parse_errors() {
        let err = FeatureTypeSet::parse("2 word", &registry()).unwrap_err();
        assert!(err.to_string().contains("declares 2"));

        let err = FeatureTypeSet::parse("1 shape", &registry()).unwrap_err();
        assert!(err.to_string().contains("unknown feature type 'shape'"));
    }

    #[test]
    fn test_build_all() {
        let set = registry().build_all().unwrap();
        let names: Vec<&str> = set.iter().map(|t| t.name().as_str()).collect();
        assert_eq!(names, ["cap", "prev-tag", "word"]);
    }
}
