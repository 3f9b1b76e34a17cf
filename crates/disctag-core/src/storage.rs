//! Weight storage: the trainable sparse map and the decode-only block table.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{DiscTagError, Result};
use crate::feature::{Feature, FeatureContext};
use crate::feature_type::FeatureTypeSet;
use crate::model_file::{ModelFile, ModelHeader, write_record};
use crate::tagset::TagSet;
use crate::weight::{Averaging, Weight};

/// Which value of each weight a weight file records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// The current (or finalized) value.
    Current,
    /// The eager running sum.
    Sum,
    /// The lazy sum after the given number of examples.
    LazySum(u64),
}

impl WriteMode {
    fn value_of(self, weight: &Weight) -> f64 {
        match self {
            WriteMode::Current => weight.value(),
            WriteMode::Sum => weight.sum(),
            WriteMode::LazySum(n) => weight.lazy_sum(n),
        }
    }
}

/// Sparse with-tag feature to weight map. The only trainable storage.
#[derive(Debug, Clone, Default)]
pub struct WeightMap {
    weights: HashMap<Feature, Weight>,
    finalized: bool,
}

impl WeightMap {
    /// Empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty map with room for `capacity` features.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            weights: HashMap::with_capacity(capacity),
            finalized: false,
        }
    }

    /// Number of stored features.
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Whether the map holds no features.
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Whether averaging has been applied.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Stored weight of `feature`, if present.
    pub fn get(&self, feature: &Feature) -> Option<&Weight> {
        self.weights.get(feature)
    }

    /// Current value of a feature; unseen features weigh 0.
    pub fn value(&self, feature: &Feature) -> f64 {
        self.weights.get(feature).map_or(0.0, Weight::value)
    }

    /// Whether `feature` is stored.
    pub fn contains(&self, feature: &Feature) -> bool {
        self.weights.contains_key(feature)
    }

    /// Stored weights, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&Feature, &Weight)> {
        self.weights.iter()
    }

    /// Register a feature at weight 0. Returns whether it was new.
    pub fn insert_zero(&mut self, feature: Feature) -> bool {
        if self.weights.contains_key(&feature) {
            return false;
        }
        self.weights.insert(feature, Weight::default());
        true
    }

    /// Set a weight outright.
    pub fn set(&mut self, feature: Feature, value: f64) {
        self.weights.entry(feature).or_default().set(value);
    }

    /// Apply a training update. Unseen features are created only when
    /// `add_if_missing` is set. Returns whether a weight changed.
    pub fn adjust(
        &mut self,
        feature: &Feature,
        delta: f64,
        example: u64,
        averaging: Averaging,
        add_if_missing: bool,
    ) -> bool {
        if let Some(weight) = self.weights.get_mut(feature) {
            weight.adjust(delta, example, averaging);
            return true;
        }
        if !add_if_missing {
            return false;
        }
        let mut weight = Weight::default();
        weight.adjust(delta, example, averaging);
        self.weights.insert(feature.clone(), weight);
        true
    }

    /// Eager averaging step over every live weight.
    pub fn add_to_sum(&mut self) {
        for weight in self.weights.values_mut() {
            weight.add_to_sum();
        }
    }

    /// Replace every value with its averaged value after `n` examples.
    /// Later calls are no-ops.
    pub fn finalize(&mut self, averaging: Averaging, n: u64) {
        if self.finalized {
            debug!("weights already finalized");
            return;
        }
        for weight in self.weights.values_mut() {
            let averaged = weight.averaged(averaging, n);
            weight.set(averaged);
        }
        self.finalized = true;
        debug!(n_weights = self.len(), n_examples = n, ?averaging, "finalized weights");
    }

    /// Features in a stable order, for writing.
    fn sorted(&self) -> Vec<(&Feature, &Weight)> {
        let mut entries: Vec<_> = self.weights.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }

    /// Write `header` and then one record per feature, sorted.
    ///
    /// Zero weights are skipped unless `write_zero_weights` is set. Returns
    /// the number of records written.
    pub fn write_to<W: Write>(
        &self,
        mut out: W,
        header: &ModelHeader,
        mode: WriteMode,
        write_zero_weights: bool,
    ) -> Result<usize> {
        header.write_to(&mut out)?;
        let mut written = 0;
        for (feature, weight) in self.sorted() {
            let value = mode.value_of(weight);
            if value != 0.0 || write_zero_weights {
                write_record(&mut out, feature, value)?;
                written += 1;
            }
        }
        out.flush()?;
        Ok(written)
    }

    /// Create `path` and write the weights to it with [`WeightMap::write_to`].
    pub fn write<P: AsRef<Path>>(
        &self,
        path: P,
        header: &ModelHeader,
        mode: WriteMode,
        write_zero_weights: bool,
    ) -> Result<usize> {
        let path = path.as_ref();
        let file = File::create(path)?;
        let written = self.write_to(BufWriter::new(file), header, mode, write_zero_weights)?;
        debug!(path = %path.display(), written, ?mode, "wrote weights");
        Ok(written)
    }

    /// Build a map from parsed records, rejecting feature types that are
    /// not in `feature_types`.
    pub fn from_model_file<O>(file: ModelFile, feature_types: &FeatureTypeSet<O>) -> Result<Self> {
        let mut map = Self::with_capacity(file.records.len());
        for (feature, value) in file.records {
            check_type(&feature, feature_types)?;
            map.set(feature, value);
        }
        Ok(map)
    }

    /// Read a weight file, warning about consistency parameters that differ
    /// from `current`.
    pub fn read<P: AsRef<Path>, O>(
        path: P,
        feature_types: &FeatureTypeSet<O>,
        current: &BTreeMap<String, String>,
    ) -> Result<Self> {
        let file = open_model_file(path.as_ref(), current)?;
        Self::from_model_file(file, feature_types)
    }
}

fn check_type<O>(feature: &Feature, feature_types: &FeatureTypeSet<O>) -> Result<()> {
    if feature_types.contains(feature.type_name()) {
        Ok(())
    } else {
        Err(DiscTagError::ModelLoad(format!(
            "weight file names unknown feature type '{}'",
            feature.type_name()
        )))
    }
}

fn open_model_file(path: &Path, current: &BTreeMap<String, String>) -> Result<ModelFile> {
    let file = File::open(path).map_err(|e| {
        DiscTagError::ModelLoad(format!("unable to open weight file '{}': {e}", path.display()))
    })?;
    let model = ModelFile::read_from(BufReader::new(file))?;
    model.header.check_consistency(current, path);
    if model.records.is_empty() {
        warn!(path = %path.display(), "weight file contains no records");
    }
    debug!(path = %path.display(), n_records = model.records.len(), "read weight file");
    Ok(model)
}

/// Decode-only table from a tag-independent feature context to the weight
/// of every tag that context was trained with.
///
/// Built once and never mutated; share it between decoders with an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct BlockTable {
    n_tags: usize,
    blocks: HashMap<FeatureContext, Vec<(usize, f64)>>,
}

impl BlockTable {
    /// Build from a (normally finalized) weight map.
    ///
    /// Features are inserted in sorted order, so when several features
    /// resolve to the same `(context, tag)` the outcome is deterministic:
    /// the last one wins.
    pub fn from_weight_map(weights: &WeightMap, tag_set: &TagSet) -> Result<Self> {
        Self::from_records(
            weights.sorted().into_iter().map(|(f, w)| (f, w.value())),
            tag_set,
        )
    }

    /// Group `(feature, weight)` records by context.
    ///
    /// A record whose tag is a reduced or semi-reduced name applies to every
    /// tag that maps to it. A later record for the same context and tag
    /// overwrites the earlier one.
    pub fn from_records<'a, I>(records: I, tag_set: &TagSet) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a Feature, f64)>,
    {
        let mut table = Self {
            n_tags: tag_set.len(),
            blocks: HashMap::new(),
        };
        let mut resolved = Vec::new();
        for (feature, value) in records {
            resolve_tag(tag_set, &feature.tag, &mut resolved)?;
            let block = table.blocks.entry(feature.context.clone()).or_default();
            for &tag in &resolved {
                match block.iter_mut().find(|(t, _)| *t == tag) {
                    Some(entry) => entry.1 = value,
                    None => block.push((tag, value)),
                }
            }
        }
        debug!(
            n_contexts = table.blocks.len(),
            n_entries = table.n_entries(),
            "built block table"
        );
        Ok(table)
    }

    /// Read a weight file straight into a block table.
    pub fn read<P: AsRef<Path>, O>(
        path: P,
        tag_set: &TagSet,
        feature_types: &FeatureTypeSet<O>,
        current: &BTreeMap<String, String>,
    ) -> Result<Self> {
        let file = open_model_file(path.as_ref(), current)?;
        for (feature, _) in &file.records {
            check_type(feature, feature_types)?;
        }
        Self::from_records(file.records.iter().map(|(f, w)| (f, *w)), tag_set)
    }

    /// Size of the tag set the table was built for.
    pub fn n_tags(&self) -> usize {
        self.n_tags
    }

    /// Number of distinct contexts.
    pub fn n_contexts(&self) -> usize {
        self.blocks.len()
    }

    /// Total `(tag, weight)` entries over all contexts.
    pub fn n_entries(&self) -> usize {
        self.blocks.values().map(Vec::len).sum()
    }

    /// Zero `scores`, then write the weight of every tag trained with
    /// `context`. Returns whether the context was found.
    ///
    /// Decoding loads the first observation feature of a position with this
    /// and adds the rest with [`BlockTable::accumulate`].
    pub fn load(&self, context: &FeatureContext, scores: &mut [f64]) -> bool {
        scores.fill(0.0);
        self.accumulate(context, scores)
    }

    /// Add the weights of `context` to `scores`. Returns whether the
    /// context was found.
    pub fn accumulate(&self, context: &FeatureContext, scores: &mut [f64]) -> bool {
        match self.blocks.get(context) {
            Some(block) => {
                for &(tag, weight) in block {
                    scores[tag] += weight;
                }
                true
            }
            None => false,
        }
    }

    /// Weight of one `(context, tag)` pair.
    pub fn weight(&self, context: &FeatureContext, tag: usize) -> f64 {
        self.blocks
            .get(context)
            .and_then(|block| block.iter().find(|(t, _)| *t == tag))
            .map_or(0.0, |&(_, w)| w)
    }
}

/// Resolve a tag symbol from a weight file: exact symbol first, then every
/// tag whose reduced or semi-reduced symbol matches.
fn resolve_tag(tag_set: &TagSet, symbol: &str, out: &mut Vec<usize>) -> Result<()> {
    out.clear();
    if let Some(index) = tag_set.index(symbol) {
        out.push(index);
        return Ok(());
    }
    out.extend(
        (0..tag_set.len())
            .filter(|&i| tag_set.reduced(i) == symbol || tag_set.semi_reduced(i) == symbol),
    );
    if out.is_empty() {
        return Err(DiscTagError::ModelLoad(format!(
            "no corresponding tag index for tag '{symbol}'"
        )));
    }
    Ok(())
}

/// The weights a decoder scores with.
#[derive(Debug, Clone)]
pub enum WeightStorage {
    /// Trainable; owned by one decoder.
    Sparse(WeightMap),
    /// Decode-only; shareable.
    Block(Arc<BlockTable>),
}

impl WeightStorage {
    /// Whether updates are possible.
    pub fn is_trainable(&self) -> bool {
        matches!(self, WeightStorage::Sparse(_))
    }

    /// The sparse map, if this is one.
    pub fn as_sparse(&self) -> Option<&WeightMap> {
        match self {
            WeightStorage::Sparse(map) => Some(map),
            WeightStorage::Block(_) => None,
        }
    }

    /// The sparse map, or a configuration error for a block table.
    pub fn trainable_mut(&mut self) -> Result<&mut WeightMap> {
        match self {
            WeightStorage::Sparse(map) => Ok(map),
            WeightStorage::Block(_) => Err(DiscTagError::Configuration(
                "cannot train a decoder backed by a block table".into(),
            )),
        }
    }

    /// The block table, if this is one.
    pub fn as_block(&self) -> Option<&Arc<BlockTable>> {
        match self {
            WeightStorage::Block(table) => Some(table),
            WeightStorage::Sparse(_) => None,
        }
    }
}

impl From<WeightMap> for WeightStorage {
    fn from(map: WeightMap) -> Self {
        WeightStorage::Sparse(map)
    }
}

impl From<BlockTable> for WeightStorage {
    fn from(table: BlockTable) -> Self {
        WeightStorage::Block(Arc::new(table))
    }
}

impl From<Arc<BlockTable>> for WeightStorage {
    fn from(table: Arc<BlockTable>) -> Self {
        WeightStorage::Block(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tagset::TagSetOptions;
    use crate::testing::registry;

    fn tag_set() -> TagSet {
        TagSet::new(&["PER"], TagSetOptions::default()).unwrap()
    }

    fn word(tag: &str, w: &str) -> Feature {
        Feature::new("word".into(), tag.into(), vec![w.into()])
    }

    #[test]
    fn test_adjust_respects_add_if_missing() {
        let mut map = WeightMap::new();
        assert!(!map.adjust(&word("PER-ST", "John"), -1.0, 0, Averaging::Lazy, false));
        assert!(map.is_empty());
        assert!(map.adjust(&word("PER-ST", "John"), -1.0, 0, Averaging::Lazy, true));
        assert_eq!(map.value(&word("PER-ST", "John")), -1.0);

        assert!(map.insert_zero(word("NONE-ST", "went")));
        assert!(!map.insert_zero(word("NONE-ST", "went")));
        assert!(map.adjust(&word("NONE-ST", "went"), 2.0, 1, Averaging::Lazy, false));
        assert_eq!(map.value(&word("NONE-ST", "went")), 2.0);
    }

    #[test]
    fn test_finalize_lazy_once() {
        let mut map = WeightMap::new();
        map.adjust(&word("PER-ST", "John"), 1.0, 1, Averaging::Lazy, true);
        map.finalize(Averaging::Lazy, 4);
        assert!(map.is_finalized());
        assert_eq!(map.value(&word("PER-ST", "John")), 3.0);
        map.finalize(Averaging::Lazy, 4);
        assert_eq!(map.value(&word("PER-ST", "John")), 3.0);
    }

    #[test]
    fn test_write_modes_and_zero_filtering() {
        let mut map = WeightMap::new();
        map.adjust(&word("PER-ST", "John"), 1.0, 1, Averaging::Lazy, true);
        map.insert_zero(word("NONE-ST", "went"));

        let mut buf = Vec::new();
        let n = map
            .write_to(&mut buf, &ModelHeader::new(), WriteMode::LazySum(3), false)
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(String::from_utf8(buf).unwrap(), "((word PER-ST John) 2)\n");

        let mut buf = Vec::new();
        let n = map
            .write_to(&mut buf, &ModelHeader::new(), WriteMode::Current, true)
            .unwrap();
        assert_eq!(n, 2);
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("((word NONE-ST went) 0)"));
    }

    #[test]
    fn test_unknown_feature_type_rejected() {
        let file = ModelFile::read_from("((shape PER-ST Xx) 1)".as_bytes()).unwrap();
        let types = registry().build_all().unwrap();
        let err = WeightMap::from_model_file(file, &types).unwrap_err();
        assert!(err.to_string().contains("unknown feature type 'shape'"));
    }

    #[test]
    fn test_block_table_load() {
        let ts = tag_set();
        let mut map = WeightMap::new();
        map.set(word("PER-ST", "John"), 2.0);
        map.set(word("NONE-ST", "John"), -1.0);
        map.set(word("NONE-ST", "went"), 3.0);

        let table = BlockTable::from_weight_map(&map, &ts).unwrap();
        assert_eq!(table.n_contexts(), 2);
        assert_eq!(table.n_entries(), 3);

        let mut scores = vec![9.0; ts.len()];
        assert!(table.load(&word("PER-ST", "John").context, &mut scores));
        assert_eq!(scores[ts.index("PER-ST").unwrap()], 2.0);
        assert_eq!(scores[ts.index("NONE-ST").unwrap()], -1.0);
        assert_eq!(scores[ts.index("PER-CO").unwrap()], 0.0);

        assert!(!table.load(&word("PER-ST", "Mary").context, &mut scores));
        assert!(scores.iter().all(|&s| s == 0.0));

        table.accumulate(&word("X", "went").context, &mut scores);
        table.accumulate(&word("X", "went").context, &mut scores);
        assert_eq!(scores[ts.index("NONE-ST").unwrap()], 6.0);
        assert_eq!(table.weight(&word("X", "went").context, ts.index("NONE-ST").unwrap()), 3.0);
    }

    #[test]
    fn test_block_table_reduced_tag_fallback() {
        let ts = tag_set();
        let mut map = WeightMap::new();
        map.set(word("PER", "Smith"), 1.5);
        map.set(word("PER-CO", "Smith"), 4.0);
        let table = BlockTable::from_weight_map(&map, &ts).unwrap();

        let context = word("", "Smith").context;
        assert_eq!(table.weight(&context, ts.index("PER-ST").unwrap()), 1.5);
        // "PER-CO" sorts after "PER", so the exact record overwrites the fallback.
        assert_eq!(table.weight(&context, ts.index("PER-CO").unwrap()), 4.0);
    }

    #[test]
    fn test_block_table_unresolvable_tag() {
        let ts = tag_set();
        let mut map = WeightMap::new();
        map.set(word("LOC-ST", "Paris"), 1.0);
        let err = BlockTable::from_weight_map(&map, &ts).unwrap_err();
        assert!(matches!(err, DiscTagError::ModelLoad(_)));
        assert!(err.to_string().contains("no corresponding tag index"));
    }

    #[test]
    fn test_block_storage_is_not_trainable() {
        let mut storage = WeightStorage::from(BlockTable::default());
        assert!(!storage.is_trainable());
        assert!(matches!(
            storage.trainable_mut(),
            Err(DiscTagError::Configuration(_))
        ));
        let mut storage = WeightStorage::from(WeightMap::new());
        assert!(storage.trainable_mut().is_ok());
    }
}
