//! # Tag Sets and Transition Model
//!
//! Defines the closed tag vocabulary a tagger labels tokens with, using the
//! ST/CO (start-of-span / continue-span) variant of BIO tagging, and the
//! sparse relation of legal tag transitions.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use tracing::debug;

use crate::error::{DiscTagError, Result};
use crate::symbol::Symbol;

pub const NONE_TAG: &str = "NONE";
pub const START_TAG: &str = "START";
pub const END_TAG: &str = "END";

/// Coarse classification of a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    /// Sentinel tag of the first (padding) observation.
    Start,
    /// Sentinel tag of the last (padding) observation.
    End,
    /// Token outside any span.
    None,
    /// Token inside a typed span.
    Regular,
}

/// Position of a tag within its span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BioRole {
    /// First token of a span (`-ST`).
    Start,
    /// Any later token of a span (`-CO`).
    Continue,
}

impl BioRole {
    /// `-ST` or `-CO`.
    pub fn suffix(&self) -> &'static str {
        match self {
            BioRole::Start => "-ST",
            BioRole::Continue => "-CO",
        }
    }
}

impl fmt::Display for BioRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// One entry of the tag vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub symbol: Symbol,
    /// Entity type without the BIO suffix.
    pub reduced: Symbol,
    /// Secondary lookup key for models trained at another tag granularity.
    pub semi_reduced: Symbol,
    pub kind: TagKind,
    pub role: Option<BioRole>,
    /// The `-CO` tag of an `-ST` tag and vice versa.
    pub partner: Option<usize>,
}

/// How a [`TagSet`] expands its reduced tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagSetOptions {
    /// Generate `X-ST`/`X-CO` pairs for every reduced tag `X`.
    pub generate_st_co_suffix: bool,
    /// Append the `START` and `END` sentinel tags.
    pub add_start_end_tags: bool,
}

impl Default for TagSetOptions {
    fn default() -> Self {
        Self {
            generate_st_co_suffix: true,
            add_start_end_tags: true,
        }
    }
}

impl TagSetOptions {
    /// Default options: ST/CO suffixes and START/END sentinels.
    pub fn new() -> Self {
        Self::default()
    }

    /// Split every entity type into `-ST`/`-CO` tags.
    pub fn with_st_co_suffix(mut self, enabled: bool) -> Self {
        self.generate_st_co_suffix = enabled;
        self
    }

    /// Add the START and END sentinels.
    pub fn with_start_end_tags(mut self, enabled: bool) -> Self {
        self.add_start_end_tags = enabled;
        self
    }
}

/// The tag vocabulary plus the relation of legal transitions between tags.
///
/// The relation is mutable while a training run learns it and is treated as
/// read-only once a decoder has been built over the tag set. An empty
/// relation means every transition is legal.
#[derive(Debug, Clone)]
pub struct TagSet {
    tags: Vec<Tag>,
    by_symbol: HashMap<Symbol, usize>,
    reduced_tags: Vec<Symbol>,
    start: Option<usize>,
    end: Option<usize>,
    successors: Vec<BTreeSet<usize>>,
    predecessors: Vec<BTreeSet<usize>>,
    options: TagSetOptions,
}

impl TagSet {
    /// Build a tag set from reduced tag names (entity types).
    ///
    /// `NONE` tags come first, then the given types in order, then `START`
    /// and `END`. Duplicate names are ignored.
    pub fn new<S: AsRef<str>>(reduced_tags: &[S], options: TagSetOptions) -> Result<Self> {
        let mut tag_set = Self {
            tags: Vec::new(),
            by_symbol: HashMap::new(),
            reduced_tags: Vec::new(),
            start: None,
            end: None,
            successors: Vec::new(),
            predecessors: Vec::new(),
            options,
        };

        tag_set.push_reduced(Symbol::new(NONE_TAG), TagKind::None);
        for name in reduced_tags {
            let name = name.as_ref();
            if name == NONE_TAG || name == START_TAG || name == END_TAG {
                return Err(DiscTagError::Configuration(format!(
                    "cannot add reserved tag name '{name}' to tag set"
                )));
            }
            let symbol = Symbol::new(name);
            if tag_set.reduced_tags.contains(&symbol) {
                continue;
            }
            tag_set.push_reduced(symbol, TagKind::Regular);
        }

        if options.add_start_end_tags {
            tag_set.start = Some(tag_set.push_tag(Tag {
                symbol: Symbol::new(START_TAG),
                reduced: Symbol::new(START_TAG),
                semi_reduced: Symbol::new(START_TAG),
                kind: TagKind::Start,
                role: None,
                partner: None,
            }));
            tag_set.end = Some(tag_set.push_tag(Tag {
                symbol: Symbol::new(END_TAG),
                reduced: Symbol::new(END_TAG),
                semi_reduced: Symbol::new(END_TAG),
                kind: TagKind::End,
                role: None,
                partner: None,
            }));
        }

        tag_set.successors = vec![BTreeSet::new(); tag_set.tags.len()];
        tag_set.predecessors = vec![BTreeSet::new(); tag_set.tags.len()];
        tag_set.setup_default_transitions();

        debug!(
            n_tags = tag_set.len(),
            n_reduced = tag_set.reduced_tags.len(),
            "built tag set"
        );
        Ok(tag_set)
    }

    /// Read a tag-set file: the number of reduced tags followed by that many
    /// whitespace-separated reduced tag names.
    pub fn from_file<P: AsRef<Path>>(path: P, options: TagSetOptions) -> Result<Self> {
        let path = path.as_ref();
        let mut text = String::new();
        File::open(path)
            .map_err(|e| {
                DiscTagError::ModelLoad(format!(
                    "unable to open tag set file '{}': {e}",
                    path.display()
                ))
            })?
            .read_to_string(&mut text)?;
        Self::parse(&text, options).map_err(|e| match e {
            DiscTagError::ModelLoad(msg) => {
                DiscTagError::ModelLoad(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    /// Parse the contents of a tag-set file.
    pub fn parse(text: &str, options: TagSetOptions) -> Result<Self> {
        let mut tokens = text.split_whitespace();
        let count: usize = tokens
            .next()
            .ok_or_else(|| DiscTagError::ModelLoad("empty tag set file".into()))?
            .parse()
            .map_err(|_| DiscTagError::ModelLoad("tag set file must start with a tag count".into()))?;
        let names: Vec<&str> = tokens.by_ref().take(count).collect();
        if names.len() != count {
            return Err(DiscTagError::ModelLoad(format!(
                "tag set file declares {count} tags but lists {}",
                names.len()
            )));
        }
        Self::new(&names, options)
    }

    fn push_tag(&mut self, tag: Tag) -> usize {
        let index = self.tags.len();
        self.by_symbol.insert(tag.symbol.clone(), index);
        self.tags.push(tag);
        index
    }

    fn push_reduced(&mut self, reduced: Symbol, kind: TagKind) {
        if kind == TagKind::Regular {
            self.reduced_tags.push(reduced.clone());
        }
        if self.options.generate_st_co_suffix {
            let st = self.push_tag(Tag {
                symbol: Symbol::from(format!("{reduced}{}", BioRole::Start)),
                reduced: reduced.clone(),
                semi_reduced: reduced.clone(),
                kind,
                role: Some(BioRole::Start),
                partner: None,
            });
            let co = self.push_tag(Tag {
                symbol: Symbol::from(format!("{reduced}{}", BioRole::Continue)),
                reduced: reduced.clone(),
                semi_reduced: reduced,
                kind,
                role: Some(BioRole::Continue),
                partner: Some(st),
            });
            self.tags[st].partner = Some(co);
        } else {
            self.push_tag(Tag {
                symbol: reduced.clone(),
                reduced: reduced.clone(),
                semi_reduced: reduced,
                kind,
                role: None,
                partner: None,
            });
        }
    }

    /// Install the structural ST/CO relation. Without suffixes the relation
    /// stays empty, which leaves the tag set unconstrained.
    fn setup_default_transitions(&mut self) {
        self.reset_transitions();
        if !self.options.generate_st_co_suffix {
            return;
        }

        let n = self.tags.len();
        if let Some(start) = self.start {
            for i in 0..n {
                if self.is_st(i) {
                    self.link(start, i);
                }
            }
        }
        if let Some(end) = self.end {
            for j in 0..n {
                if j != end {
                    self.link(j, end);
                }
            }
        }

        for i in 0..n {
            if self.is_st(i) {
                if let Some(co) = self.tags[i].partner {
                    self.link(i, co);
                }
                for j in 0..n {
                    if self.is_st(j) {
                        self.link(i, j);
                    }
                    if i != j && Some(j) != self.end {
                        self.link(j, i);
                    }
                }
            }
            if self.is_co(i) {
                self.link(i, i);
            }
        }
    }

    fn link(&mut self, prev: usize, next: usize) {
        self.successors[prev].insert(next);
        self.predecessors[next].insert(prev);
    }

    /// Total number of tags, sentinels included.
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Whether the set has no tags.
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Options the set was built with.
    pub fn options(&self) -> TagSetOptions {
        self.options
    }

    /// All tags in index order.
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Tag at `index`, if any.
    pub fn get(&self, index: usize) -> Option<&Tag> {
        self.tags.get(index)
    }

    /// Look up a tag by its full symbol.
    pub fn index(&self, symbol: &str) -> Option<usize> {
        self.by_symbol.get(symbol).copied()
    }

    /// Reduced tag names (entity types), excluding `NONE`.
    pub fn reduced_tags(&self) -> &[Symbol] {
        &self.reduced_tags
    }

    /// Indices of the tags that can label a real token (everything except
    /// the sentinels).
    pub fn token_tags(&self) -> impl Iterator<Item = usize> + '_ {
        self.tags
            .iter()
            .enumerate()
            .filter(|(_, tag)| matches!(tag.kind, TagKind::None | TagKind::Regular))
            .map(|(i, _)| i)
    }

    /// Full symbol of tag `index`. Panics when out of range.
    pub fn symbol(&self, index: usize) -> &Symbol {
        &self.tags[index].symbol
    }

    /// Entity type of tag `index`, with any suffix removed.
    ///
    /// ```rust
    /// use disctag_core::{TagSet, TagSetOptions};
    ///
    /// let tags = TagSet::new(&["PER"], TagSetOptions::default()).unwrap();
    /// let per_co = tags.index("PER-CO").unwrap();
    /// assert_eq!(tags.symbol(per_co).as_str(), "PER-CO");
    /// assert_eq!(tags.reduced(per_co).as_str(), "PER");
    /// ```
    pub fn reduced(&self, index: usize) -> &Symbol {
        &self.tags[index].reduced
    }

    /// Secondary lookup key of tag `index`, used to resolve weight files
    /// trained at a different tag granularity.
    pub fn semi_reduced(&self, index: usize) -> &Symbol {
        &self.tags[index].semi_reduced
    }

    /// Index of the START sentinel.
    pub fn start_index(&self) -> Option<usize> {
        self.start
    }

    /// Index of the END sentinel.
    pub fn end_index(&self) -> Option<usize> {
        self.end
    }

    /// Index of the tag a token outside any span starts with.
    pub fn none_index(&self) -> Option<usize> {
        self.tags
            .iter()
            .position(|tag| tag.kind == TagKind::None && tag.role != Some(BioRole::Continue))
    }

    /// Whether `index` is the START sentinel.
    pub fn is_start(&self, index: usize) -> bool {
        self.tags.get(index).is_some_and(|t| t.kind == TagKind::Start)
    }

    /// Whether `index` is the END sentinel.
    pub fn is_end(&self, index: usize) -> bool {
        self.tags.get(index).is_some_and(|t| t.kind == TagKind::End)
    }

    /// Whether the tag belongs to the `NONE` class, either role.
    pub fn is_none(&self, index: usize) -> bool {
        self.tags.get(index).is_some_and(|t| t.kind == TagKind::None)
    }

    /// Whether the tag opens a span (`-ST`).
    pub fn is_st(&self, index: usize) -> bool {
        self.tags
            .get(index)
            .is_some_and(|t| t.role == Some(BioRole::Start))
    }

    /// Whether the tag continues a span (`-CO`).
    pub fn is_co(&self, index: usize) -> bool {
        self.tags
            .get(index)
            .is_some_and(|t| t.role == Some(BioRole::Continue))
    }

    /// The tag that starts a span of the given reduced type.
    pub fn st_index(&self, reduced: &str) -> Option<usize> {
        self.tags
            .iter()
            .position(|t| t.reduced == reduced && t.role != Some(BioRole::Continue))
            .filter(|&i| matches!(self.tags[i].kind, TagKind::None | TagKind::Regular))
    }

    /// The tag that continues a span of the given reduced type.
    pub fn co_index(&self, reduced: &str) -> Option<usize> {
        self.tags
            .iter()
            .position(|t| t.reduced == reduced && t.role == Some(BioRole::Continue))
    }

    /// Tags allowed directly before `index` in the stored relation.
    pub fn predecessors(&self, index: usize) -> &BTreeSet<usize> {
        &self.predecessors[index]
    }

    /// Tags allowed directly after `index` in the stored relation.
    pub fn successors(&self, index: usize) -> &BTreeSet<usize> {
        &self.successors[index]
    }

    /// Whether any transition is registered. An empty relation leaves the
    /// decoder unconstrained.
    pub fn has_transitions(&self) -> bool {
        self.successors.iter().any(|s| !s.is_empty())
    }

    /// Number of registered `(prev, next)` pairs.
    pub fn n_transitions(&self) -> usize {
        self.successors.iter().map(BTreeSet::len).sum()
    }

    /// Whether `prev -> next` is legal under the current relation.
    pub fn allows(&self, prev: usize, next: usize) -> bool {
        if !self.has_transitions() {
            return !self.is_end(prev) && !self.is_start(next);
        }
        self.successors
            .get(prev)
            .is_some_and(|succs| succs.contains(&next))
    }

    /// Predecessor lists as seen by a decoder: the registered relation, or
    /// every non-sentinel tag (plus `START`) when the relation is empty.
    pub fn effective_predecessors(&self) -> Vec<Vec<usize>> {
        if self.has_transitions() {
            return self
                .predecessors
                .iter()
                .map(|preds| preds.iter().copied().collect())
                .collect();
        }

        let mut open: Vec<usize> = self.start.into_iter().collect();
        open.extend(self.token_tags());
        (0..self.len())
            .map(|i| if self.is_start(i) { Vec::new() } else { open.clone() })
            .collect()
    }

    /// Allow `prev` to be followed by `next`.
    pub fn add_transition(&mut self, prev: usize, next: usize) -> Result<()> {
        let n = self.len();
        if prev >= n || next >= n {
            return Err(DiscTagError::Consistency(format!(
                "transition {prev} -> {next} outside tag set of size {n}"
            )));
        }
        self.link(prev, next);
        Ok(())
    }

    /// Like [`TagSet::add_transition`], naming both tags by symbol.
    pub fn add_transition_symbols(&mut self, prev: &str, next: &str) -> Result<()> {
        let prev_index = self.index(prev).ok_or_else(|| {
            DiscTagError::ModelLoad(format!("transition names unknown tag '{prev}'"))
        })?;
        let next_index = self.index(next).ok_or_else(|| {
            DiscTagError::ModelLoad(format!("transition names unknown tag '{next}'"))
        })?;
        self.link(prev_index, next_index);
        Ok(())
    }

    /// Clear the relation.
    pub fn reset_transitions(&mut self) {
        for set in self.successors.iter_mut().chain(self.predecessors.iter_mut()) {
            set.clear();
        }
    }

    /// Reset the relation and rebuild it from gold tag sequences.
    ///
    /// Each sequence holds the tags of real tokens only; `START -> first`
    /// and `last -> END` are registered implicitly.
    pub fn learn_transitions<'a, I>(&mut self, sequences: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a [usize]>,
    {
        let (start, end) = match (self.start, self.end) {
            (Some(start), Some(end)) => (start, end),
            _ => {
                return Err(DiscTagError::Configuration(
                    "learning transitions requires START and END tags".into(),
                ));
            }
        };

        self.reset_transitions();
        let mut n_sequences = 0usize;
        for sequence in sequences {
            let mut prev = start;
            for &tag in sequence {
                if self.get(tag).is_none() || self.is_start(tag) || self.is_end(tag) {
                    return Err(DiscTagError::Consistency(format!(
                        "training sequence {n_sequences} uses tag index {tag}, \
                         which is not a token tag of this {}-tag set",
                        self.len()
                    )));
                }
                self.link(prev, tag);
                prev = tag;
            }
            self.link(prev, end);
            n_sequences += 1;
        }

        debug!(
            n_sequences,
            n_transitions = self.n_transitions(),
            "learned transitions"
        );
        Ok(())
    }

    /// Write the relation: the pair count, then one `prev next` line per pair.
    pub fn write_transitions_to<W: Write>(&self, mut out: W) -> Result<()> {
        writeln!(out, "{}", self.n_transitions())?;
        for (prev, succs) in self.successors.iter().enumerate() {
            for &next in succs {
                writeln!(out, "{} {}", self.symbol(prev), self.symbol(next))?;
            }
        }
        out.flush()?;
        Ok(())
    }

    /// Write the relation to `path` as a pair count followed by one
    /// `prev next` line per pair.
    pub fn write_transitions<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())?;
        self.write_transitions_to(BufWriter::new(file))
    }

    /// Replace the relation with the one stored in a transition file.
    pub fn read_transitions_from<R: BufRead>(&mut self, mut input: R) -> Result<()> {
        let mut text = String::new();
        input.read_to_string(&mut text)?;
        let mut tokens = text.split_whitespace();
        let count: usize = tokens
            .next()
            .ok_or_else(|| DiscTagError::ModelLoad("empty transition file".into()))?
            .parse()
            .map_err(|_| {
                DiscTagError::ModelLoad("transition file must start with a pair count".into())
            })?;

        self.reset_transitions();
        for i in 0..count {
            match (tokens.next(), tokens.next()) {
                (Some(prev), Some(next)) => self.add_transition_symbols(prev, next)?,
                _ => {
                    return Err(DiscTagError::ModelLoad(format!(
                        "transition file declares {count} pairs but ends after {i}"
                    )));
                }
            }
        }
        if tokens.next().is_some() {
            return Err(DiscTagError::ModelLoad(format!(
                "transition file has more than the declared {count} pairs"
            )));
        }
        Ok(())
    }

    /// Replace the relation with the one stored at `path`.
    pub fn read_transitions<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            DiscTagError::ModelLoad(format!(
                "unable to open transition file '{}': {e}",
                path.display()
            ))
        })?;
        self.read_transitions_from(BufReader::new(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn per_org() -> TagSet {
        TagSet::new(&["PER", "ORG"], TagSetOptions::default()).unwrap()
    }

    #[test]
    fn test_tag_layout() {
        let ts = per_org();
        let symbols: Vec<&str> = ts.tags().iter().map(|t| t.symbol.as_str()).collect();
        assert_eq!(
            symbols,
            ["NONE-ST", "NONE-CO", "PER-ST", "PER-CO", "ORG-ST", "ORG-CO", "START", "END"]
        );
        assert_eq!(ts.start_index(), Some(6));
        assert_eq!(ts.end_index(), Some(7));
        assert_eq!(ts.token_tags().count(), 6);
    }

    #[test]
    fn test_roles_and_reduction() {
        let ts = per_org();
        let per_st = ts.index("PER-ST").unwrap();
        let per_co = ts.index("PER-CO").unwrap();
        assert!(ts.is_st(per_st));
        assert!(ts.is_co(per_co));
        assert!(!ts.is_none(per_st));
        assert!(ts.is_none(ts.index("NONE-CO").unwrap()));
        assert_eq!(ts.reduced(per_co), "PER");
        assert_eq!(ts.semi_reduced(per_co), "PER");
        assert_eq!(ts.get(per_st).unwrap().partner, Some(per_co));
        assert_eq!(ts.st_index("ORG"), ts.index("ORG-ST"));
        assert_eq!(ts.co_index("NONE"), ts.index("NONE-CO"));
        assert_eq!(ts.none_index(), ts.index("NONE-ST"));
    }

    #[test]
    fn test_reserved_names_rejected() {
        let err = TagSet::new(&["PER", "END"], TagSetOptions::default()).unwrap_err();
        assert!(matches!(err, DiscTagError::Configuration(_)));
    }

    #[test]
    fn test_default_transitions() {
        let ts = per_org();
        let idx = |s: &str| ts.index(s).unwrap();
        assert!(ts.allows(idx("START"), idx("PER-ST")));
        assert!(ts.allows(idx("PER-ST"), idx("PER-CO")));
        assert!(ts.allows(idx("PER-CO"), idx("PER-CO")));
        assert!(ts.allows(idx("PER-CO"), idx("ORG-ST")));
        assert!(ts.allows(idx("ORG-CO"), idx("END")));
        assert!(ts.allows(idx("START"), idx("END")));

        assert!(!ts.allows(idx("START"), idx("PER-CO")));
        assert!(!ts.allows(idx("NONE-ST"), idx("PER-CO")));
        assert!(!ts.allows(idx("PER-CO"), idx("ORG-CO")));
        assert!(!ts.allows(idx("END"), idx("PER-ST")));
        assert!(ts.predecessors(idx("START")).is_empty());
    }

    #[test]
    fn test_unconstrained_without_suffixes() {
        let ts = TagSet::new(&["PER"], TagSetOptions::new().with_st_co_suffix(false)).unwrap();
        assert_eq!(ts.len(), 4);
        assert!(!ts.has_transitions());
        let per = ts.index("PER").unwrap();
        let none = ts.index("NONE").unwrap();
        assert!(ts.allows(per, none));
        assert!(!ts.allows(ts.end_index().unwrap(), per));

        let preds = ts.effective_predecessors();
        assert!(preds[ts.start_index().unwrap()].is_empty());
        assert!(preds[per].contains(&ts.start_index().unwrap()));
        assert!(preds[ts.end_index().unwrap()].contains(&none));
    }

    #[test]
    fn test_learn_transitions() {
        let mut ts = per_org();
        let [start, end, per_st, per_co, none_st, org_st] =
            ["START", "END", "PER-ST", "PER-CO", "NONE-ST", "ORG-ST"].map(|s| ts.index(s).unwrap());
        let gold = vec![per_st, per_co, none_st];
        ts.learn_transitions([gold.as_slice()]).unwrap();

        assert_eq!(ts.n_transitions(), 4);
        assert!(ts.allows(start, per_st));
        assert!(ts.allows(per_co, none_st));
        assert!(ts.allows(none_st, end));
        assert!(!ts.allows(start, org_st));
    }

    #[test]
    fn test_learn_transitions_rejects_foreign_tags() {
        let mut ts = per_org();
        let bad = [99usize];
        let err = ts.learn_transitions([&bad[..]]).unwrap_err();
        assert!(matches!(err, DiscTagError::Consistency(_)));

        let sentinel = [ts.end_index().unwrap()];
        assert!(ts.learn_transitions([&sentinel[..]]).is_err());
    }

    #[test]
    fn test_transition_file_roundtrip() {
        let ts = per_org();
        let mut buf = Vec::new();
        ts.write_transitions_to(&mut buf).unwrap();

        let text = String::from_utf8(buf.clone()).unwrap();
        assert_eq!(
            text.lines().next().unwrap(),
            ts.n_transitions().to_string()
        );

        let mut other = per_org();
        other.reset_transitions();
        other.read_transitions_from(buf.as_slice()).unwrap();
        for i in 0..ts.len() {
            assert_eq!(ts.successors(i), other.successors(i));
            assert_eq!(ts.predecessors(i), other.predecessors(i));
        }
    }

    #[test]
    fn test_transition_file_errors() {
        let mut ts = per_org();
        let err = ts
            .read_transitions_from("2\nSTART PER-ST\nPER-ST LOC-CO\n".as_bytes())
            .unwrap_err();
        assert!(matches!(err, DiscTagError::ModelLoad(_)));

        let err = ts
            .read_transitions_from("3\nSTART PER-ST\n".as_bytes())
            .unwrap_err();
        assert!(err.to_string().contains("declares 3"));
    }

    #[test]
    fn test_parse_tag_set_file() {
        let ts = TagSet::parse("2\nPER\nLOC\n", TagSetOptions::default()).unwrap();
        assert_eq!(ts.reduced_tags(), &[Symbol::new("PER"), Symbol::new("LOC")]);

        let err = TagSet::parse("3 PER LOC", TagSetOptions::default()).unwrap_err();
        assert!(matches!(err, DiscTagError::ModelLoad(_)));
    }

    #[test]
    fn test_display_suffix() {
        assert_eq!(BioRole::Start.to_string(), "-ST");
        assert_eq!(BioRole::Continue.suffix(), "-CO");
    }
}
