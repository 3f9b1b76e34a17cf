//! # Viterbi Decoding and Perceptron Training
//!
//! The decoder labels a padded observation sequence (boundary sentinel,
//! tokens, boundary sentinel) with the highest scoring tag sequence that
//! starts at `START`, ends at `END` and respects the tag set's transition
//! relation. It also provides forward/backward margins, constrained
//! decoding and the perceptron updates that train a sparse weight map.
//!
//! The `END` transition is never feature-scored, so a forward score plus a
//! backward score at any cell is the score of the best path through it.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{DiscTagError, Result};
use crate::feature::Feature;
use crate::feature_type::FeatureTypeSet;
use crate::split::{FeatureTypeSplit, Scorer};
use crate::storage::{WeightMap, WeightStorage};
use crate::symbol::Symbol;
use crate::tagset::{TagKind, TagSet};
use crate::weight::Averaging;

/// Per-position constraint: `None` leaves the position free, `Some(tag)`
/// forces it. A forced `NONE` tag accepts any `NONE` tag.
pub type Constraint = Option<usize>;

/// Decoder settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Add unseen features of wrong hypotheses to the weight map at `-delta`.
    pub add_hyp_features: bool,
    pub averaging: Averaging,
}

impl DecoderConfig {
    /// Default settings: no hypothesis features, lazy averaging.
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle adding wrong-hypothesis features during training.
    pub fn with_add_hyp_features(mut self, enabled: bool) -> Self {
        self.add_hyp_features = enabled;
        self
    }

    /// Choose how the running average is kept.
    pub fn with_averaging(mut self, averaging: Averaging) -> Self {
        self.averaging = averaging;
        self
    }
}

/// A decoded tag sequence, sentinels included.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub tags: Vec<usize>,
    pub score: f64,
}

/// Best path plus the competitor built around the least confident position.
#[derive(Debug, Clone, PartialEq)]
pub struct MarginResult {
    pub best: Decoded,
    /// Best path forced through the runner-up tag at `position`.
    pub second_best: Option<Decoded>,
    /// `best.score - second_best.score`; `None` when no position has an
    /// alternative tag.
    pub margin: Option<f64>,
    /// The minimum-margin position.
    pub position: Option<usize>,
}

/// Outcome of one perceptron step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainOutcome {
    /// The decoded path matched gold on the scored range.
    pub correct: bool,
    /// Positions where the decoded tag differed from gold.
    pub n_errors: usize,
}

/// Outcome of one margin-perceptron step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarginOutcome {
    /// The best path matched gold.
    pub correct: bool,
    /// Gold minus best when wrong, best minus second best when right.
    pub margin: f64,
    pub updated: bool,
}

/// Viterbi cell, as in a classic dp table of path states.
#[derive(Debug, Clone, Copy)]
struct Cell {
    score: f64,
    active: bool,
    pointer: Option<usize>,
}

impl Cell {
    const INACTIVE: Cell = Cell {
        score: f64::NEG_INFINITY,
        active: false,
        pointer: None,
    };
}

/// Dense `(position, tag)` table, reused across calls.
#[derive(Debug, Clone, Default)]
struct Trellis {
    n_tags: usize,
    cells: Vec<Cell>,
}

impl Trellis {
    fn reset(&mut self, len: usize, n_tags: usize) {
        self.n_tags = n_tags;
        self.cells.clear();
        self.cells.resize(len * n_tags, Cell::INACTIVE);
    }

    fn cell(&self, pos: usize, tag: usize) -> &Cell {
        &self.cells[pos * self.n_tags + tag]
    }

    fn cell_mut(&mut self, pos: usize, tag: usize) -> &mut Cell {
        &mut self.cells[pos * self.n_tags + tag]
    }

    fn set(&mut self, pos: usize, tag: usize, score: f64, pointer: Option<usize>) {
        *self.cell_mut(pos, tag) = Cell {
            score,
            active: true,
            pointer,
        };
    }

    fn is_active(&self, pos: usize, tag: usize) -> bool {
        self.cell(pos, tag).active
    }

    fn score(&self, pos: usize, tag: usize) -> f64 {
        self.cell(pos, tag).score
    }

    fn pointer(&self, pos: usize, tag: usize) -> Option<usize> {
        self.cell(pos, tag).pointer
    }
}

/// The read-only parts of a decoder.
struct Model<O> {
    tag_set: Arc<TagSet>,
    feature_types: Arc<FeatureTypeSet<O>>,
    storage: WeightStorage,
    split: FeatureTypeSplit,
    predecessors: Vec<Vec<usize>>,
    successors: Vec<Vec<usize>>,
    token_tags: Vec<usize>,
    start: usize,
    end: usize,
}

/// Per-call buffers.
#[derive(Default)]
struct Scratch {
    forward: Trellis,
    backward: Trellis,
    obs_scores: Vec<f64>,
    active: Vec<usize>,
    features: Vec<Feature>,
}

/// Best and runner-up tag at one position, by forward+backward total.
#[derive(Debug, Clone, Copy)]
struct PositionMargin {
    best_tag: usize,
    second_tag: usize,
    second_total: f64,
    margin: f64,
}

/// Viterbi decoder and perceptron trainer over one tag set, feature-type
/// set and weight storage.
///
/// A decoder owns its scratch buffers; decoders sharing a block table can
/// run on separate threads.
pub struct Decoder<O> {
    model: Model<O>,
    scratch: Scratch,
    config: DecoderConfig,
    n_examples: u64,
}

impl<O> Decoder<O> {
    /// Build a decoder over `storage`.
    ///
    /// Fails when the tag set has no START/END sentinels, or when a block
    /// table was built for a different number of tags.
    pub fn new(
        tag_set: Arc<TagSet>,
        feature_types: Arc<FeatureTypeSet<O>>,
        storage: impl Into<WeightStorage>,
        config: DecoderConfig,
    ) -> Result<Self> {
        let storage = storage.into();
        let (Some(start), Some(end)) = (tag_set.start_index(), tag_set.end_index()) else {
            return Err(DiscTagError::Configuration(
                "decoding requires a tag set with START and END tags".into(),
            ));
        };
        if let WeightStorage::Block(table) = &storage {
            if table.n_tags() != tag_set.len() {
                return Err(DiscTagError::Configuration(format!(
                    "block table was built for {} tags but the tag set has {}",
                    table.n_tags(),
                    tag_set.len()
                )));
            }
        }

        let predecessors = tag_set.effective_predecessors();
        let mut successors = vec![Vec::new(); tag_set.len()];
        for (next, preds) in predecessors.iter().enumerate() {
            for &prev in preds {
                successors[prev].push(next);
            }
        }
        let split = FeatureTypeSplit::new(feature_types.as_ref());
        let token_tags: Vec<usize> = tag_set.token_tags().collect();

        debug!(
            n_tags = tag_set.len(),
            n_feature_types = feature_types.len(),
            n_observation_only = split.observation_only().len(),
            n_with_prev_tag = split.with_prev_tag().len(),
            trainable = storage.is_trainable(),
            "built decoder"
        );

        let n_tags = tag_set.len();
        Ok(Self {
            model: Model {
                tag_set,
                feature_types,
                storage,
                split,
                predecessors,
                successors,
                token_tags,
                start,
                end,
            },
            scratch: Scratch {
                obs_scores: vec![0.0; n_tags],
                ..Scratch::default()
            },
            config,
            n_examples: 0,
        })
    }

    /// Tags this decoder labels with.
    pub fn tag_set(&self) -> &Arc<TagSet> {
        &self.model.tag_set
    }

    /// Feature types this decoder extracts.
    pub fn feature_types(&self) -> &Arc<FeatureTypeSet<O>> {
        &self.model.feature_types
    }

    /// The weights being scored with.
    pub fn storage(&self) -> &WeightStorage {
        &self.model.storage
    }

    /// Settings this decoder was built with.
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Feature types grouped by dependence on the previous tag.
    pub fn split(&self) -> &FeatureTypeSplit {
        &self.model.split
    }

    /// Number of training examples processed so far.
    pub fn n_examples(&self) -> u64 {
        self.n_examples
    }

    /// Give up the weights, e.g. to build a block table or write them out.
    pub fn into_storage(self) -> WeightStorage {
        self.model.storage
    }

    /// Highest scoring tag sequence.
    pub fn decode(&mut self, observations: &[O]) -> Result<Decoded> {
        self.model.forward(&mut self.scratch, observations, None)?;
        self.model.trace_best(&self.scratch, observations.len())
    }

    /// Highest scoring tag sequence that satisfies `constraints`, one entry
    /// per observation.
    pub fn constrained_decode(
        &mut self,
        observations: &[O],
        constraints: &[Constraint],
    ) -> Result<Decoded> {
        self.model.check_constraints(observations.len(), constraints)?;
        self.model
            .forward(&mut self.scratch, observations, Some(constraints))?;
        self.model.trace_best(&self.scratch, observations.len())
    }

    /// Forward and backward passes with the min-margin second-best path.
    pub fn decode_all_tags(&mut self, observations: &[O]) -> Result<MarginResult> {
        let (best, margins) = self.all_margins(observations, None)?;
        let position = min_margin_position(&margins, |_, _| true);
        self.model.margin_result(&self.scratch, best, &margins, position)
    }

    /// As [`Decoder::decode_all_tags`], but the min-margin search only
    /// considers positions whose best tag reduces to `reduced`.
    pub fn decode_all_tags_for_type(
        &mut self,
        observations: &[O],
        reduced: &str,
    ) -> Result<MarginResult> {
        let (best, margins) = self.all_margins(observations, None)?;
        let tag_set = &self.model.tag_set;
        let position =
            min_margin_position(&margins, |_, m| tag_set.reduced(m.best_tag) == reduced);
        self.model.margin_result(&self.scratch, best, &margins, position)
    }

    /// Constrained decoding with margins searched over free positions only.
    pub fn constrained_decode_all_tags(
        &mut self,
        observations: &[O],
        constraints: &[Constraint],
    ) -> Result<MarginResult> {
        self.model.check_constraints(observations.len(), constraints)?;
        let (best, margins) = self.all_margins(observations, Some(constraints))?;
        let position = min_margin_position(&margins, |pos, _| constraints[pos].is_none());
        self.model.margin_result(&self.scratch, best, &margins, position)
    }

    /// Smallest margin per entity type, over positions whose best tag has
    /// that type. Types never predicted map to `None`.
    pub fn type_margins(&mut self, observations: &[O]) -> Result<BTreeMap<Symbol, Option<f64>>> {
        let (_, margins) = self.all_margins(observations, None)?;
        let tag_set = &self.model.tag_set;

        let mut by_type: BTreeMap<Symbol, Option<f64>> = tag_set
            .reduced_tags()
            .iter()
            .map(|t| (t.clone(), None))
            .collect();
        for margin in margins.iter().flatten() {
            let tag = &tag_set.tags()[margin.best_tag];
            if tag.kind != TagKind::Regular {
                continue;
            }
            if let Some(slot) = by_type.get_mut(&tag.reduced) {
                *slot = Some(slot.map_or(margin.margin, |m: f64| m.min(margin.margin)));
            }
        }
        Ok(by_type)
    }

    fn all_margins(
        &mut self,
        observations: &[O],
        constraints: Option<&[Constraint]>,
    ) -> Result<(Decoded, Vec<Option<PositionMargin>>)> {
        self.model
            .both_passes(&mut self.scratch, observations, constraints)?;
        let best = self.model.trace_best(&self.scratch, observations.len())?;
        let margins = self.model.position_margins(&self.scratch, &best.tags);
        Ok((best, margins))
    }

    /// Model score of an arbitrary tag sequence.
    pub fn score_path(&mut self, observations: &[O], tags: &[usize]) -> Result<f64> {
        self.model.check_path(observations.len(), tags)?;
        Ok(self
            .model
            .path_score(&mut self.scratch.features, observations, tags))
    }

    /// Register every feature on a gold path at weight 0. Returns how many
    /// were new.
    pub fn add_features(&mut self, observations: &[O], gold: &[usize]) -> Result<usize> {
        self.ensure_trainable()?;
        self.model.check_path(observations.len(), gold)?;
        let n = observations.len();
        self.scratch.features.clear();
        {
            let scorer = self.model.scorer();
            for i in 1..n - 1 {
                scorer.state_features(observations, i, gold[i], gold[i - 1], &mut self.scratch.features);
            }
        }
        let map = self.model.storage.trainable_mut()?;
        let mut added = 0;
        for feature in self.scratch.features.drain(..) {
            if map.insert_zero(feature) {
                added += 1;
            }
        }
        Ok(added)
    }

    /// One structured-perceptron step. The first and last `n_ignore`
    /// observations (at least the sentinels) are neither compared nor
    /// updated.
    pub fn train(&mut self, observations: &[O], gold: &[usize], n_ignore: usize) -> Result<TrainOutcome> {
        self.ensure_trainable()?;
        self.model.check_path(observations.len(), gold)?;
        let decoded = self.decode(observations)?;
        let n = observations.len();
        let range = n_ignore.max(1)..n.saturating_sub(n_ignore).min(n - 1);

        let n_errors = self.update(observations, gold, &decoded.tags, range)?;
        self.n_examples += 1;
        trace!(n_errors, example = self.n_examples, "perceptron step");
        Ok(TrainOutcome {
            correct: n_errors == 0,
            n_errors,
        })
    }

    /// One margin-perceptron step: update unless gold wins by at least
    /// `required_margin`.
    pub fn train_with_margin(
        &mut self,
        observations: &[O],
        gold: &[usize],
        required_margin: f64,
    ) -> Result<MarginOutcome> {
        self.ensure_trainable()?;
        self.model.check_path(observations.len(), gold)?;
        let result = self.decode_all_tags(observations)?;
        let gold_score = self
            .model
            .path_score(&mut self.scratch.features, observations, gold);
        let correct = result.best.tags == gold;

        let (margin, wrong) = if !correct {
            (gold_score - result.best.score, Some(result.best.tags))
        } else {
            match result.second_best {
                Some(second) => (result.best.score - second.score, Some(second.tags)),
                None => (f64::INFINITY, None),
            }
        };

        let mut updated = false;
        if margin < required_margin {
            if let Some(wrong) = wrong {
                let n = observations.len();
                updated = self.update(observations, gold, &wrong, 1..n - 1)? > 0;
            }
        }
        self.n_examples += 1;
        trace!(margin, updated, example = self.n_examples, "margin step");
        Ok(MarginOutcome {
            correct,
            margin,
            updated,
        })
    }

    /// Eager averaging step.
    pub fn add_weights_to_sum(&mut self) -> Result<()> {
        self.ensure_trainable()?;
        self.model.storage.trainable_mut()?.add_to_sum();
        Ok(())
    }

    /// Replace every weight with its averaged value. Decoding afterwards
    /// uses the averaged weights; further training is refused.
    pub fn finalize_weights(&mut self) -> Result<()> {
        let averaging = self.config.averaging;
        let n = self.n_examples;
        self.model.storage.trainable_mut()?.finalize(averaging, n);
        Ok(())
    }

    /// Current training weights, if this decoder is trainable.
    pub fn weights(&self) -> Option<&WeightMap> {
        self.model.storage.as_sparse()
    }

    fn ensure_trainable(&mut self) -> Result<()> {
        let map = self.model.storage.trainable_mut()?;
        if map.is_finalized() {
            return Err(DiscTagError::Configuration(
                "cannot train after weights have been finalized".into(),
            ));
        }
        Ok(())
    }

    /// `+1` to gold features and `-1` to hypothesis features at every
    /// position of `range` that is wrong. A position following a mismatch
    /// counts as wrong too. Returns the number of mismatches.
    fn update(
        &mut self,
        observations: &[O],
        gold: &[usize],
        hyp: &[usize],
        range: std::ops::Range<usize>,
    ) -> Result<usize> {
        let mut gold_features = Vec::new();
        let mut hyp_features = Vec::new();
        let mut n_errors = 0;
        {
            let scorer = self.model.scorer();
            let mut prev_wrong = false;
            for i in range {
                let mismatch = gold[i] != hyp[i];
                if mismatch {
                    n_errors += 1;
                }
                if mismatch || prev_wrong {
                    scorer.state_features(observations, i, gold[i], gold[i - 1], &mut gold_features);
                    scorer.state_features(observations, i, hyp[i], hyp[i - 1], &mut hyp_features);
                }
                prev_wrong = mismatch;
            }
        }
        if n_errors == 0 {
            return Ok(0);
        }

        let example = self.n_examples;
        let averaging = self.config.averaging;
        let add_hyp = self.config.add_hyp_features;
        let map = self.model.storage.trainable_mut()?;
        for feature in &gold_features {
            map.adjust(feature, 1.0, example, averaging, true);
        }
        for feature in &hyp_features {
            map.adjust(feature, -1.0, example, averaging, add_hyp);
        }
        Ok(n_errors)
    }
}

fn min_margin_position<F>(margins: &[Option<PositionMargin>], mut keep: F) -> Option<usize>
where
    F: FnMut(usize, &PositionMargin) -> bool,
{
    let mut best: Option<(usize, f64)> = None;
    for (pos, margin) in margins.iter().enumerate() {
        let Some(margin) = margin else { continue };
        if !keep(pos, margin) {
            continue;
        }
        if best.is_none_or(|(_, m)| margin.margin < m) {
            best = Some((pos, margin.margin));
        }
    }
    best.map(|(pos, _)| pos)
}

impl<O> Model<O> {
    fn scorer(&self) -> Scorer<'_, O> {
        Scorer {
            tag_set: &self.tag_set,
            feature_types: &self.feature_types,
            split: &self.split,
            storage: &self.storage,
        }
    }

    fn allowable(&self, tag: usize, constraint: Constraint) -> bool {
        match constraint {
            None => true,
            Some(forced) => {
                tag == forced || (self.tag_set.is_none(tag) && self.tag_set.is_none(forced))
            }
        }
    }

    fn check_length(&self, n: usize) -> Result<()> {
        if n < 2 {
            return Err(DiscTagError::Configuration(format!(
                "observation sequence of length {n} lacks its boundary sentinels"
            )));
        }
        Ok(())
    }

    fn check_constraints(&self, n: usize, constraints: &[Constraint]) -> Result<()> {
        if constraints.len() != n {
            return Err(DiscTagError::InvalidConstraint(format!(
                "{} constraints for {n} observations",
                constraints.len()
            )));
        }
        let n_tags = self.tag_set.len();
        if let Some((pos, tag)) = constraints
            .iter()
            .enumerate()
            .find_map(|(pos, c)| c.filter(|&t| t >= n_tags).map(|t| (pos, t)))
        {
            return Err(DiscTagError::InvalidConstraint(format!(
                "position {pos} forces tag {tag} outside tag set of size {n_tags}"
            )));
        }
        Ok(())
    }

    fn check_path(&self, n: usize, tags: &[usize]) -> Result<()> {
        self.check_length(n)?;
        if tags.len() != n {
            return Err(DiscTagError::Consistency(format!(
                "{} tags for {n} observations",
                tags.len()
            )));
        }
        if tags[0] != self.start || tags[n - 1] != self.end {
            return Err(DiscTagError::Consistency(
                "tag sequence must start with START and end with END".into(),
            ));
        }
        if let Some(&bad) = tags[1..n - 1]
            .iter()
            .find(|&&t| t >= self.tag_set.len() || self.tag_set.is_start(t) || self.tag_set.is_end(t))
        {
            return Err(DiscTagError::Consistency(format!(
                "tag index {bad} is not a token tag of this {}-tag set",
                self.tag_set.len()
            )));
        }
        Ok(())
    }

    fn constraint_at(constraints: Option<&[Constraint]>, pos: usize) -> Constraint {
        constraints.and_then(|c| c[pos])
    }

    /// Candidate tags at a position.
    fn candidates(&self, pos: usize, n: usize) -> &[usize] {
        if pos == 0 {
            std::slice::from_ref(&self.start)
        } else if pos == n - 1 {
            std::slice::from_ref(&self.end)
        } else {
            &self.token_tags
        }
    }

    fn forward(
        &self,
        scratch: &mut Scratch,
        observations: &[O],
        constraints: Option<&[Constraint]>,
    ) -> Result<()> {
        let n = observations.len();
        self.check_length(n)?;
        let n_tags = self.tag_set.len();
        let scorer = self.scorer();
        let Scratch {
            forward,
            obs_scores,
            active,
            features,
            ..
        } = scratch;
        forward.reset(n, n_tags);
        obs_scores.resize(n_tags, 0.0);

        if self.allowable(self.start, Self::constraint_at(constraints, 0)) {
            forward.set(0, self.start, 0.0, None);
        }

        for i in 1..n - 1 {
            let constraint = Self::constraint_at(constraints, i);
            active.clear();
            for &tag in &self.token_tags {
                let preds = &self.predecessors[tag];
                if preds.is_empty() || !self.allowable(tag, constraint) {
                    continue;
                }
                let mut best: Option<(f64, usize)> = None;
                for &prev in preds {
                    if !forward.is_active(i - 1, prev) {
                        continue;
                    }
                    let score = forward.score(i - 1, prev)
                        + scorer.transition_score(observations, i, tag, prev, features);
                    if best.is_none_or(|(s, _)| score > s) {
                        best = Some((score, prev));
                    }
                }
                if let Some((score, prev)) = best {
                    forward.set(i, tag, score, Some(prev));
                    active.push(tag);
                }
            }

            scorer.observation_scores(observations, i, active, obs_scores, features);
            for &tag in active.iter() {
                forward.cell_mut(i, tag).score += obs_scores[tag];
            }
        }

        // END: propagate the best predecessor without scoring.
        let last = n - 1;
        if self.allowable(self.end, Self::constraint_at(constraints, last)) {
            let best = self.predecessors[self.end]
                .iter()
                .filter(|&&prev| forward.is_active(last - 1, prev))
                .map(|&prev| (forward.score(last - 1, prev), prev))
                .fold(None, |best: Option<(f64, usize)>, cand| match best {
                    Some(b) if b.0 >= cand.0 => Some(b),
                    _ => Some(cand),
                });
            if let Some((score, prev)) = best {
                forward.set(last, self.end, score, Some(prev));
            }
        }

        if !forward.is_active(last, self.end) {
            return Err(DiscTagError::NoPath { length: n });
        }
        Ok(())
    }

    fn backward(
        &self,
        scratch: &mut Scratch,
        observations: &[O],
        constraints: Option<&[Constraint]>,
    ) -> Result<()> {
        let n = observations.len();
        self.check_length(n)?;
        let n_tags = self.tag_set.len();
        let scorer = self.scorer();
        let Scratch {
            backward,
            obs_scores,
            active,
            features,
            ..
        } = scratch;
        backward.reset(n, n_tags);
        obs_scores.resize(n_tags, 0.0);

        let last = n - 1;
        if self.allowable(self.end, Self::constraint_at(constraints, last)) {
            backward.set(last, self.end, 0.0, None);
        }

        // The position before END: reaching END is free.
        if backward.is_active(last, self.end) {
            let i = last - 1;
            let constraint = Self::constraint_at(constraints, i);
            for &tag in self.candidates(i, n) {
                if self.allowable(tag, constraint) && self.successors[tag].contains(&self.end) {
                    backward.set(i, tag, 0.0, Some(self.end));
                }
            }
        }

        for i in (0..last.saturating_sub(1)).rev() {
            let next = i + 1;
            active.clear();
            active.extend(
                self.candidates(next, n)
                    .iter()
                    .copied()
                    .filter(|&t| backward.is_active(next, t)),
            );
            scorer.observation_scores(observations, next, active, obs_scores, features);

            let constraint = Self::constraint_at(constraints, i);
            for &tag in self.candidates(i, n) {
                if !self.allowable(tag, constraint) {
                    continue;
                }
                let mut best: Option<(f64, usize)> = None;
                for &succ in &self.successors[tag] {
                    if !backward.is_active(next, succ) {
                        continue;
                    }
                    let score = backward.score(next, succ)
                        + obs_scores[succ]
                        + scorer.transition_score(observations, next, succ, tag, features);
                    if best.is_none_or(|(s, _)| score > s) {
                        best = Some((score, succ));
                    }
                }
                if let Some((score, succ)) = best {
                    backward.set(i, tag, score, Some(succ));
                }
            }
        }

        if !backward.is_active(0, self.start) {
            return Err(DiscTagError::NoPath { length: n });
        }
        Ok(())
    }

    fn both_passes(
        &self,
        scratch: &mut Scratch,
        observations: &[O],
        constraints: Option<&[Constraint]>,
    ) -> Result<()> {
        self.forward(scratch, observations, constraints)?;
        self.backward(scratch, observations, constraints)
    }

    /// Follow forward pointers from `(pos, tag)` back to `START`.
    fn trace_back(&self, forward: &Trellis, pos: usize, tag: usize, path: &mut [usize]) -> Result<()> {
        path[pos] = tag;
        for i in (1..=pos).rev() {
            path[i - 1] = forward
                .pointer(i, path[i])
                .ok_or(DiscTagError::NoPath { length: path.len() })?;
        }
        Ok(())
    }

    /// Follow backward pointers from `(pos, tag)` forward to `END`.
    fn trace_forward(&self, backward: &Trellis, pos: usize, tag: usize, path: &mut [usize]) -> Result<()> {
        path[pos] = tag;
        for i in pos..path.len() - 1 {
            path[i + 1] = backward
                .pointer(i, path[i])
                .ok_or(DiscTagError::NoPath { length: path.len() })?;
        }
        Ok(())
    }

    fn trace_best(&self, scratch: &Scratch, n: usize) -> Result<Decoded> {
        let mut tags = vec![self.end; n];
        self.trace_back(&scratch.forward, n - 1, self.end, &mut tags)?;
        Ok(Decoded {
            tags,
            score: scratch.forward.score(n - 1, self.end),
        })
    }

    /// Margin between the best path's tag and the runner-up at every token
    /// position that has one.
    fn position_margins(&self, scratch: &Scratch, best: &[usize]) -> Vec<Option<PositionMargin>> {
        let n = best.len();
        let total = |pos: usize, tag: usize| {
            scratch.forward.score(pos, tag) + scratch.backward.score(pos, tag)
        };
        let mut margins = vec![None; n];
        for pos in 1..n.saturating_sub(1) {
            let best_tag = best[pos];
            let mut second: Option<(f64, usize)> = None;
            for &tag in &self.token_tags {
                if tag == best_tag
                    || !scratch.forward.is_active(pos, tag)
                    || !scratch.backward.is_active(pos, tag)
                {
                    continue;
                }
                let t = total(pos, tag);
                if second.is_none_or(|(s, _)| t > s) {
                    second = Some((t, tag));
                }
            }
            if let Some((second_total, second_tag)) = second {
                margins[pos] = Some(PositionMargin {
                    best_tag,
                    second_tag,
                    second_total,
                    margin: total(pos, best_tag) - second_total,
                });
            }
        }
        margins
    }

    fn margin_result(
        &self,
        scratch: &Scratch,
        best: Decoded,
        margins: &[Option<PositionMargin>],
        position: Option<usize>,
    ) -> Result<MarginResult> {
        let Some((pos, m)) = position.and_then(|pos| margins[pos].map(|m| (pos, m))) else {
            return Ok(MarginResult {
                best,
                second_best: None,
                margin: None,
                position: None,
            });
        };

        let mut tags = vec![self.end; best.tags.len()];
        self.trace_back(&scratch.forward, pos, m.second_tag, &mut tags)?;
        self.trace_forward(&scratch.backward, pos, m.second_tag, &mut tags)?;
        let second = Decoded {
            tags,
            score: m.second_total,
        };
        Ok(MarginResult {
            margin: Some(best.score - second.score),
            best,
            second_best: Some(second),
            position: Some(pos),
        })
    }

    /// Sum of observation-only and transition scores over the token
    /// positions of `tags`.
    fn path_score(&self, features: &mut Vec<Feature>, observations: &[O], tags: &[usize]) -> f64 {
        let scorer = self.scorer();
        let mut scores = vec![0.0; self.tag_set.len()];
        let mut total = 0.0;
        for i in 1..tags.len() - 1 {
            scorer.observation_scores(observations, i, &tags[i..=i], &mut scores, features);
            total += scores[tags[i]];
            total += scorer.transition_score(observations, i, tags[i], tags[i - 1], features);
        }
        total
    }
}
