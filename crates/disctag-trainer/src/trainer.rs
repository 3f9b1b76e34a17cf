//! Epoch-driven training loop.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use disctag_core::{
    Averaging, Decoder, FeatureTypeRegistry, FeatureTypeSet, ModelHeader, TagSet, WeightMap,
    WriteMode,
};
use oorandom::Rand64;
use tracing::{debug, info};

use crate::config::{Mode, TrainerConfig};
use crate::corpus::{Sentence, read_corpus};
use crate::error::{Result, TrainerError};
use crate::features::standard_registry;
use crate::token::TokenObservation;

/// Sentences between progress lines.
const PROGRESS_EVERY: usize = 1000;

/// Summary of one pass over the corpus.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochStats {
    /// 1-based.
    pub epoch: usize,
    pub n_sentences: usize,
    /// Sentences whose best path already matched gold before the update.
    pub n_correct: usize,
    pub n_updates: usize,
    pub accuracy: f64,
}

#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub epochs: Vec<EpochStats>,
    /// Whether `min_tot` or `min_change` ended training before `epochs`.
    pub stopped_early: bool,
    pub n_examples: u64,
    pub n_weights: usize,
    pub n_written: usize,
    pub model_file: PathBuf,
    pub transitions_file: Option<PathBuf>,
}

struct Example {
    observations: Vec<TokenObservation>,
    gold: Vec<usize>,
}

pub struct Trainer {
    config: TrainerConfig,
    decoder: Decoder<TokenObservation>,
    examples: Vec<Example>,
    rng: Rand64,
}

impl Trainer {
    /// Load the tag set, feature list and corpus named by `config`, resolving
    /// feature types through the bundled registry.
    pub fn from_config(config: TrainerConfig) -> Result<Self> {
        let registry = standard_registry()?;
        Self::with_registry(config, &registry)
    }

    pub fn with_registry(
        config: TrainerConfig,
        registry: &FeatureTypeRegistry<TokenObservation>,
    ) -> Result<Self> {
        config.validate()?;
        let tag_set = TagSet::from_file(&config.tag_set_file, config.tag_set_options())?;
        let feature_types = FeatureTypeSet::from_file(&config.features_file, registry)?;
        let sentences = read_corpus(&config.training_file, &tag_set)?;
        Self::new(config, tag_set, feature_types, sentences)
    }

    /// Prepare a run over already loaded parts. Learns transitions and
    /// seeds features when the configuration asks for it.
    pub fn new(
        config: TrainerConfig,
        mut tag_set: TagSet,
        feature_types: FeatureTypeSet<TokenObservation>,
        sentences: Vec<Sentence>,
    ) -> Result<Self> {
        config.validate()?;
        if sentences.is_empty() {
            return Err(TrainerError::Config(
                "training corpus contains no sentences".into(),
            ));
        }

        if config.learn_transitions {
            tag_set.learn_transitions(sentences.iter().map(Sentence::token_tags))?;
            info!(
                n_transitions = tag_set.n_transitions(),
                "learned transitions from training data"
            );
        }

        let mut decoder = Decoder::new(
            Arc::new(tag_set),
            Arc::new(feature_types),
            WeightMap::new(),
            config.decoder_config(),
        )?;

        let examples: Vec<Example> = sentences
            .into_iter()
            .map(|sentence| Example {
                observations: sentence.observations(),
                gold: sentence.gold,
            })
            .collect();

        if config.seed_features {
            let mut n_added = 0;
            for example in &examples {
                n_added += decoder.add_features(&example.observations, &example.gold)?;
            }
            info!(n_features = n_added, "seeded features from gold paths");
        }

        let rng = Rand64::new(u128::from(config.seed));
        Ok(Self {
            config,
            decoder,
            examples,
            rng,
        })
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    pub fn decoder(&self) -> &Decoder<TokenObservation> {
        &self.decoder
    }

    pub fn n_sentences(&self) -> usize {
        self.examples.len()
    }

    /// One pass over the corpus, shuffled first when `randomize` is set.
    pub fn train_epoch(&mut self, epoch: usize) -> Result<EpochStats> {
        let mut order: Vec<usize> = (0..self.examples.len()).collect();
        if self.config.randomize {
            shuffle(&mut order, &mut self.rng);
        }

        let mut n_correct = 0;
        let mut n_updates = 0;
        for (step, &i) in order.iter().enumerate() {
            let example = &self.examples[i];
            let (correct, updated) = match self.config.mode {
                Mode::Perceptron => {
                    let outcome = self.decoder.train(&example.observations, &example.gold, 1)?;
                    (outcome.correct, !outcome.correct)
                }
                Mode::Margin => {
                    let outcome = self.decoder.train_with_margin(
                        &example.observations,
                        &example.gold,
                        self.config.required_margin,
                    )?;
                    (outcome.correct, outcome.updated)
                }
            };
            n_correct += usize::from(correct);
            n_updates += usize::from(updated);

            if self.config.averaging == Averaging::Eager
                && self.decoder.n_examples() % self.config.weightsum_granularity as u64 == 0
            {
                self.decoder.add_weights_to_sum()?;
            }

            if (step + 1) % PROGRESS_EVERY == 0 {
                debug!(
                    epoch,
                    step = step + 1,
                    n_sentences = order.len(),
                    n_correct,
                    "training progress"
                );
            }
        }

        let n_sentences = order.len();
        let stats = EpochStats {
            epoch,
            n_sentences,
            n_correct,
            n_updates,
            accuracy: n_correct as f64 / n_sentences as f64,
        };
        info!(
            epoch,
            accuracy = stats.accuracy,
            n_correct,
            n_sentences,
            n_updates,
            n_weights = self.n_weights(),
            "epoch complete"
        );
        Ok(stats)
    }

    /// Train for up to `epochs` passes, then write the averaged weights and,
    /// when they were learned, the transitions.
    pub fn run(mut self) -> Result<TrainingReport> {
        info!(
            n_sentences = self.examples.len(),
            epochs = self.config.epochs,
            mode = %self.config.mode,
            "starting training"
        );
        create_parent_dir(&self.config.model_file)?;

        let mut epochs: Vec<EpochStats> = Vec::with_capacity(self.config.epochs);
        let mut stopped_early = false;
        for epoch in 1..=self.config.epochs {
            let stats = self.train_epoch(epoch)?;
            if self.config.write_every_epoch {
                self.write_snapshot(epoch)?;
            }

            let previous = epochs.last().map(|s| s.accuracy);
            let accuracy = stats.accuracy;
            epochs.push(stats);

            if let Some(previous) = previous {
                if accuracy >= self.config.min_tot {
                    info!(epoch, accuracy, "reached target accuracy");
                    stopped_early = epoch < self.config.epochs;
                    break;
                }
                if accuracy - previous < self.config.min_change {
                    info!(epoch, accuracy, previous, "accuracy stopped improving");
                    stopped_early = epoch < self.config.epochs;
                    break;
                }
            }
        }

        self.decoder.finalize_weights()?;
        let header = self.header(None);
        let n_weights = self.n_weights();
        let n_written = match self.decoder.weights() {
            Some(weights) => {
                weights.write(&self.config.model_file, &header, WriteMode::Current, false)?
            }
            None => 0,
        };
        info!(
            path = %self.config.model_file.display(),
            n_written,
            n_weights,
            "wrote model"
        );

        let transitions_file = if self.config.learn_transitions {
            let path = self.config.transitions_file();
            self.decoder.tag_set().write_transitions(&path)?;
            info!(path = %path.display(), "wrote transitions");
            Some(path)
        } else {
            let stale = self.config.transitions_file();
            if stale.exists() {
                fs::remove_file(&stale)?;
                info!(path = %stale.display(), "removed transitions from an earlier run");
            }
            None
        };

        Ok(TrainingReport {
            epochs,
            stopped_early,
            n_examples: self.decoder.n_examples(),
            n_weights,
            n_written,
            model_file: self.config.model_file.clone(),
            transitions_file,
        })
    }

    fn n_weights(&self) -> usize {
        self.decoder.weights().map_or(0, WeightMap::len)
    }

    /// Write the averaged weights as they stand after `epoch`, leaving the
    /// training state untouched.
    fn write_snapshot(&self, epoch: usize) -> Result<()> {
        let Some(weights) = self.decoder.weights() else {
            return Ok(());
        };
        let mode = match self.config.averaging {
            Averaging::Lazy => WriteMode::LazySum(self.decoder.n_examples()),
            Averaging::Eager => WriteMode::Sum,
        };
        let path = self.config.epoch_model_file(epoch);
        let written = weights.write(&path, &self.header(Some(epoch)), mode, false)?;
        debug!(epoch, path = %path.display(), written, "wrote epoch snapshot");
        Ok(())
    }

    fn header(&self, epoch: Option<usize>) -> ModelHeader {
        let config = &self.config;
        let written_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let mut header = ModelHeader::new()
            .note(format!("disctag model written at unix time {written_at}"))
            .note(format!("trained on {}", config.training_file.display()));
        if let Some(epoch) = epoch {
            header = header.note(format!("snapshot after epoch {epoch}"));
        }
        header = header
            .parameter("epochs", config.epochs)
            .parameter("mode", config.mode)
            .parameter("required_margin", config.required_margin)
            .parameter("averaging", format!("{:?}", config.averaging).to_lowercase())
            .parameter("weightsum_granularity", config.weightsum_granularity)
            .parameter("learn_transitions", config.learn_transitions)
            .parameter("seed_features", config.seed_features)
            .parameter("add_hyp_features", config.add_hyp_features)
            .parameter("randomize", config.randomize)
            .parameter("seed", config.seed)
            .parameter("n_examples", self.decoder.n_examples());
        for (key, value) in config.consistency_parameters() {
            header = header.consistency_parameter(key, value);
        }
        header
    }
}

/// Fisher-Yates shuffle.
fn shuffle<T>(items: &mut [T], rng: &mut Rand64) {
    for i in (1..items.len()).rev() {
        let j = rng.rand_range(0..(i as u64 + 1)) as usize;
        items.swap(i, j);
    }
}

fn create_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::parse_corpus;
    use disctag_core::{ModelFile, TagSetOptions};
    use std::io::BufReader;

    const CORPUS: &str = "\
John\tB-PER
Smith\tI-PER
went\tO
home\tO

the\tO
dog\tO
barked\tO

went\tO
home\tO
early\tO
";

    fn parts(features: &str) -> (TagSet, FeatureTypeSet<TokenObservation>, Vec<Sentence>) {
        let tag_set = TagSet::new(&["PER"], TagSetOptions::default()).unwrap();
        let registry = standard_registry().unwrap();
        let types = FeatureTypeSet::parse(features, &registry).unwrap();
        let sentences = parse_corpus(CORPUS, Path::new("corpus"), &tag_set).unwrap();
        (tag_set, types, sentences)
    }

    fn config(dir: &Path) -> TrainerConfig {
        TrainerConfig::new("tags", "features", "corpus", dir.join("model"))
    }

    #[test]
    fn test_shuffle_is_seeded_permutation() {
        let shuffled = |seed| {
            let mut items: Vec<usize> = (0..20).collect();
            shuffle(&mut items, &mut Rand64::new(seed));
            items
        };
        let a = shuffled(7);
        assert_eq!(a, shuffled(7));
        let mut sorted = a.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_empty_corpus_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (tag_set, types, _) = parts("1 lc-word");
        let err = Trainer::new(config(dir.path()), tag_set, types, Vec::new())
            .err()
            .unwrap();
        assert!(matches!(err, TrainerError::Config(_)));
    }

    #[test]
    fn test_training_reaches_target_accuracy_and_stops() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.epochs = 10;
        let (tag_set, types, sentences) = parts("1 lc-word");

        let report = Trainer::new(config.clone(), tag_set, types, sentences)
            .unwrap()
            .run()
            .unwrap();
        let last = report.epochs.last().unwrap();
        assert_eq!(last.accuracy, 1.0);
        assert_eq!(last.n_updates, 0);
        assert!(report.stopped_early);
        assert!(report.epochs.len() >= 2);
        assert_eq!(report.n_examples, 3 * report.epochs.len() as u64);
        assert!(report.n_written > 0);
        assert!(report.transitions_file.is_none());

        let file = fs::File::open(&config.model_file).unwrap();
        let model = ModelFile::read_from(BufReader::new(file)).unwrap();
        assert_eq!(model.records.len(), report.n_written);
        assert!(
            model
                .header
                .consistency
                .iter()
                .any(|(k, v)| k == "generate_st_co_suffix" && v == "true")
        );
        assert!(model.records.iter().all(|(_, w)| *w != 0.0));
    }

    #[test]
    fn test_min_change_stops_after_second_epoch() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.epochs = 5;
        config.min_tot = 2.0;
        config.min_change = 2.0;
        let (tag_set, types, sentences) = parts("2 lc-word prev-tag");

        let report = Trainer::new(config, tag_set, types, sentences)
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(report.epochs.len(), 2);
        assert!(report.stopped_early);
    }

    #[test]
    fn test_snapshots_transitions_and_eager_summing() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.epochs = 3;
        config.min_tot = 2.0;
        config.min_change = -1.0;
        config.averaging = Averaging::Eager;
        config.weightsum_granularity = 2;
        config.learn_transitions = true;
        config.seed_features = true;
        config.randomize = true;
        config.seed = 42;
        config.write_every_epoch = true;
        let (tag_set, types, sentences) = parts("3 lc-word shape prev-tag");

        let trainer = Trainer::new(config.clone(), tag_set, types, sentences).unwrap();
        let tags = trainer.decoder().tag_set().clone();
        assert!(tags.has_transitions());
        assert!(!tags.allows(
            tags.index("NONE-CO").unwrap(),
            tags.index("PER-ST").unwrap()
        ));

        let report = trainer.run().unwrap();
        assert_eq!(report.epochs.len(), 3);
        assert!(!report.stopped_early);
        for epoch in 1..=3 {
            assert!(config.epoch_model_file(epoch).exists());
        }
        let transitions = report.transitions_file.unwrap();
        let mut reloaded = TagSet::new(&["PER"], TagSetOptions::default()).unwrap();
        reloaded.read_transitions(&transitions).unwrap();
        assert_eq!(reloaded.n_transitions(), tags.n_transitions());
    }

    #[test]
    fn test_margin_mode_counts_updates() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.mode = Mode::Margin;
        config.epochs = 1;
        let (tag_set, types, sentences) = parts("2 lc-word prev-tag");

        let mut trainer = Trainer::new(config, tag_set, types, sentences).unwrap();
        let stats = trainer.train_epoch(1).unwrap();
        assert_eq!(stats.n_sentences, 3);
        assert!(stats.n_updates >= 1);
        assert_eq!(trainer.decoder().n_examples(), 3);
    }
}
