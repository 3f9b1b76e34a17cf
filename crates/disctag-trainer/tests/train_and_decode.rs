use std::fs;
use std::path::Path;

use disctag_core::DiscTagError;
use disctag_trainer::{Mode, Tagger, Trainer, TrainerConfig, TrainerError};

const TAGS: &str = "1\nPER\n";

const CORPUS: &str = "\
# toy corpus
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

fn write_job(dir: &Path, features: &str, extra: &str) -> std::path::PathBuf {
    fs::write(dir.join("tags.txt"), TAGS).unwrap();
    fs::write(dir.join("features.txt"), features).unwrap();
    fs::write(dir.join("train.bio"), CORPUS).unwrap();
    let config = format!(
        r#"{{
            "tag_set_file": "tags.txt",
            "features_file": "features.txt",
            "training_file": "train.bio",
            "model_file": "out/model",
            "epochs": 10{extra}
        }}"#
    );
    let path = dir.join("job.json");
    fs::write(&path, config).unwrap();
    path
}

#[test]
fn test_trained_model_tags_training_sentence() {
    let dir = tempfile::tempdir().unwrap();
    let job = write_job(dir.path(), "1\nlc-word\n", "");

    let config = TrainerConfig::from_file(&job).unwrap();
    assert_eq!(config.model_file, dir.path().join("out/model"));
    let report = Trainer::from_config(config.clone()).unwrap().run().unwrap();
    assert_eq!(report.epochs.last().unwrap().accuracy, 1.0);
    assert!(config.model_file.exists());

    let mut tagger = Tagger::load(&config).unwrap();
    let tagged = tagger.tag(&["John", "Smith", "went", "home"]).unwrap();
    let tags: Vec<&str> = tagged.tags.iter().map(|t| t.as_str()).collect();
    assert_eq!(tags, ["PER-ST", "PER-CO", "NONE-ST", "NONE-CO"]);
    assert!(tagged.score > 0.0);
    assert!(tagged.margin.is_some_and(|m| m > 0.0));

    let unseen = tagger.tag(&["Mary", "sang"]).unwrap();
    assert_eq!(unseen.tags.len(), 2);
}

#[test]
fn test_learned_transitions_are_reloaded_for_decoding() {
    let dir = tempfile::tempdir().unwrap();
    let job = write_job(
        dir.path(),
        "3\nlc-word\nshape\nprev-tag\n",
        r#", "learn_transitions": true, "mode": "margin", "randomize": true, "seed": 3"#,
    );
    let config = TrainerConfig::from_file(&job).unwrap();
    assert_eq!(config.mode, Mode::Margin);

    let report = Trainer::from_config(config.clone()).unwrap().run().unwrap();
    assert_eq!(report.transitions_file, Some(config.transitions_file()));

    let tagger = Tagger::load(&config).unwrap();
    let tag_set = tagger.decoder().tag_set();
    let none_co = tag_set.index("NONE-CO").unwrap();
    let per_st = tag_set.index("PER-ST").unwrap();
    assert!(!tag_set.allows(none_co, per_st));
    assert!(tag_set.allows(tag_set.start_index().unwrap(), per_st));
}

#[test]
fn test_corpus_errors_surface_with_location() {
    let dir = tempfile::tempdir().unwrap();
    let job = write_job(dir.path(), "1\nlc-word\n", "");
    fs::write(dir.path().join("train.bio"), "Paris\tB-LOC\n").unwrap();

    let config = TrainerConfig::from_file(&job).unwrap();
    let err = Trainer::from_config(config).err().unwrap();
    assert!(matches!(err, TrainerError::Corpus { line: 1, .. }));
}

#[test]
fn test_unknown_feature_type_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let job = write_job(dir.path(), "1\ngazetteer\n", "");

    let config = TrainerConfig::from_file(&job).unwrap();
    let err = Trainer::from_config(config).err().unwrap();
    assert!(matches!(err, TrainerError::Engine(_)));
}

#[test]
fn test_retraining_without_learned_transitions_drops_old_relation() {
    let dir = tempfile::tempdir().unwrap();
    let job = write_job(dir.path(), "1\nlc-word\n", r#", "learn_transitions": true"#);
    fs::write(dir.path().join("train.bio"), "the\tO\ndog\tO\n\nit\tO\nran\tO\n").unwrap();
    let learned = TrainerConfig::from_file(&job).unwrap();
    Trainer::from_config(learned.clone()).unwrap().run().unwrap();
    assert!(learned.transitions_file().exists());

    let mut config = learned.clone();
    config.learn_transitions = false;
    fs::write(
        dir.path().join("train.bio"),
        "John\tB-PER\nwent\tO\n\nMary\tB-PER\nsang\tO\n",
    )
    .unwrap();
    let report = Trainer::from_config(config.clone()).unwrap().run().unwrap();
    assert_eq!(report.epochs.last().unwrap().accuracy, 1.0);
    assert!(report.transitions_file.is_none());
    assert!(!config.transitions_file().exists());

    let mut tagger = Tagger::load(&config).unwrap();
    let tagged = tagger.tag(&["John", "went"]).unwrap();
    assert_eq!(tagged.tags[0].as_str(), "PER-ST");

    let err = Tagger::load(&learned).err().unwrap();
    assert!(matches!(err, TrainerError::Engine(DiscTagError::ModelLoad(_))));
}
