//! Feature-type partitioning and buffered scoring.
//!
//! Feature types are split once into observation-only types and types that
//! read the previous tag. The decoder scores the former once per
//! `(position, tag)` and the latter once per `(position, prev tag, tag)`.

use crate::feature::Feature;
use crate::feature_type::{FeatureTypeSet, State};
use crate::storage::WeightStorage;
use crate::tagset::TagSet;

/// Indices into a [`FeatureTypeSet`], grouped by dependence on the previous tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureTypeSplit {
    observation_only: Vec<usize>,
    with_prev_tag: Vec<usize>,
}

impl FeatureTypeSplit {
    /// Classify each type of `feature_types`.
    pub fn new<O>(feature_types: &FeatureTypeSet<O>) -> Self {
        let mut split = Self::default();
        for (i, feature_type) in feature_types.iter().enumerate() {
            if feature_type.uses_previous_tag() {
                split.with_prev_tag.push(i);
            } else {
                split.observation_only.push(i);
            }
        }
        split
    }

    /// Types evaluated once per position.
    pub fn observation_only(&self) -> &[usize] {
        &self.observation_only
    }

    /// Types evaluated once per (position, previous tag) pair.
    pub fn with_prev_tag(&self) -> &[usize] {
        &self.with_prev_tag
    }

    /// Total number of feature types.
    pub fn len(&self) -> usize {
        self.observation_only.len() + self.with_prev_tag.len()
    }

    /// Whether both groups are empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Scores states against one weight storage.
pub(crate) struct Scorer<'a, O> {
    pub tag_set: &'a TagSet,
    pub feature_types: &'a FeatureTypeSet<O>,
    pub split: &'a FeatureTypeSplit,
    pub storage: &'a WeightStorage,
}

impl<O> Scorer<'_, O> {
    fn extract(
        &self,
        group: &[usize],
        state: &State<'_, O>,
        features: &mut Vec<Feature>,
    ) {
        let types = self.feature_types.types();
        for &i in group {
            types[i].extract(state, features);
        }
    }

    /// Fill `scores[tag]` with the observation-only score of every tag in
    /// `tags` at `index`. Other entries of `scores` are unspecified.
    pub fn observation_scores(
        &self,
        observations: &[O],
        index: usize,
        tags: &[usize],
        scores: &mut [f64],
        features: &mut Vec<Feature>,
    ) {
        let Some(&first) = tags.first() else {
            return;
        };
        match self.storage {
            WeightStorage::Sparse(map) => {
                for &tag in tags {
                    features.clear();
                    let state = State::new(self.tag_set, tag, None, index, observations);
                    self.extract(&self.split.observation_only, &state, features);
                    scores[tag] = features.iter().map(|f| map.value(f)).sum();
                }
            }
            WeightStorage::Block(table) => {
                // Contexts do not depend on the tag, so one extraction serves
                // every tag.
                features.clear();
                let state = State::new(self.tag_set, first, None, index, observations);
                self.extract(&self.split.observation_only, &state, features);
                let mut contexts = features.iter().map(|f| &f.context);
                match contexts.next() {
                    Some(first) => {
                        table.load(first, scores);
                        for context in contexts {
                            table.accumulate(context, scores);
                        }
                    }
                    None => scores.fill(0.0),
                }
            }
        }
    }

    /// Score of the previous-tag features for `prev -> tag` at `index`.
    pub fn transition_score(
        &self,
        observations: &[O],
        index: usize,
        tag: usize,
        prev: usize,
        features: &mut Vec<Feature>,
    ) -> f64 {
        if self.split.with_prev_tag.is_empty() {
            return 0.0;
        }
        features.clear();
        let state = State::new(self.tag_set, tag, Some(prev), index, observations);
        self.extract(&self.split.with_prev_tag, &state, features);
        match self.storage {
            WeightStorage::Sparse(map) => features.iter().map(|f| map.value(f)).sum(),
            WeightStorage::Block(table) => features
                .iter()
                .map(|f| table.weight(&f.context, tag))
                .sum(),
        }
    }

    /// Append every feature active when `tag` follows `prev` at `index`.
    pub fn state_features(
        &self,
        observations: &[O],
        index: usize,
        tag: usize,
        prev: usize,
        features: &mut Vec<Feature>,
    ) {
        let state = State::new(self.tag_set, tag, None, index, observations);
        self.extract(&self.split.observation_only, &state, features);
        let state = State::new(self.tag_set, tag, Some(prev), index, observations);
        self.extract(&self.split.with_prev_tag, &state, features);
    }
}
