//! Reader for tagged training sentences.
//!
//! One `token<TAB>TAG` pair per line, a blank line between sentences, and
//! `#` lines ignored. Tags are either tag-set names (`PER-ST`, `NONE-CO`) or
//! BIO labels (`B-PER`, `I-PER`, `O`), which are mapped onto the tag set.

use std::fs;
use std::path::{Path, PathBuf};

use disctag_core::TagSet;
use disctag_core::tagset::NONE_TAG;
use tracing::debug;

use crate::error::{Result, TrainerError};
use crate::token::{TokenObservation, observations};

/// A training sentence with its gold tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence {
    pub words: Vec<String>,
    /// Gold tag indices padded with START and END.
    pub gold: Vec<usize>,
    /// Line of the sentence's first token.
    pub line: usize,
}

impl Sentence {
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn observations(&self) -> Vec<TokenObservation> {
        observations(&self.words)
    }

    /// Gold tags of the tokens, without the sentinels.
    pub fn token_tags(&self) -> &[usize] {
        &self.gold[1..self.gold.len() - 1]
    }
}

/// Read every sentence of a corpus file, resolving tags against `tag_set`.
pub fn read_corpus<P: AsRef<Path>>(path: P, tag_set: &TagSet) -> Result<Vec<Sentence>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let sentences = parse_corpus(&text, path, tag_set)?;
    debug!(
        path = %path.display(),
        n_sentences = sentences.len(),
        n_tokens = sentences.iter().map(Sentence::len).sum::<usize>(),
        "read corpus"
    );
    Ok(sentences)
}

/// Parse corpus text. `source` only labels errors.
pub fn parse_corpus(text: &str, source: &Path, tag_set: &TagSet) -> Result<Vec<Sentence>> {
    let (Some(start), Some(end)) = (tag_set.start_index(), tag_set.end_index()) else {
        return Err(TrainerError::Config(
            "training requires a tag set with START and END tags".into(),
        ));
    };
    let mut reader = SentenceBuilder {
        tag_set,
        source,
        start,
        end,
        words: Vec::new(),
        gold: vec![start],
        first_line: 0,
    };
    let mut sentences = Vec::new();

    for (i, line) in text.lines().enumerate() {
        let line_no = i + 1;
        let line = line.trim();

        if line.is_empty() {
            sentences.extend(reader.finish());
            continue;
        }
        if line.starts_with('#') {
            continue;
        }

        let Some((word, label)) = line.split_once('\t') else {
            return Err(reader.error(line_no, "expected 'token<TAB>tag'"));
        };
        let (word, label) = (word.trim(), label.trim());
        if word.is_empty() || label.is_empty() {
            return Err(reader.error(line_no, "expected 'token<TAB>tag'"));
        }
        reader.push(line_no, word, label)?;
    }
    sentences.extend(reader.finish());
    Ok(sentences)
}

struct SentenceBuilder<'a> {
    tag_set: &'a TagSet,
    source: &'a Path,
    start: usize,
    end: usize,
    words: Vec<String>,
    gold: Vec<usize>,
    first_line: usize,
}

impl SentenceBuilder<'_> {
    fn error(&self, line: usize, message: impl Into<String>) -> TrainerError {
        TrainerError::Corpus {
            path: PathBuf::from(self.source),
            line,
            message: message.into(),
        }
    }

    fn push(&mut self, line: usize, word: &str, label: &str) -> Result<()> {
        let prev = self.gold.last().copied().filter(|&t| t != self.start);
        let name = tag_name(self.tag_set, label, prev);
        let tag = self
            .tag_set
            .index(&name)
            .filter(|&t| t != self.start && t != self.end)
            .ok_or_else(|| self.error(line, format!("unknown tag '{label}'")))?;

        if self.words.is_empty() {
            self.first_line = line;
        }
        self.words.push(word.to_string());
        self.gold.push(tag);
        Ok(())
    }

    fn finish(&mut self) -> Option<Sentence> {
        if self.words.is_empty() {
            return None;
        }
        let mut gold = std::mem::replace(&mut self.gold, vec![self.start]);
        gold.push(self.end);
        Some(Sentence {
            words: std::mem::take(&mut self.words),
            gold,
            line: self.first_line,
        })
    }
}

/// Map a corpus label onto a tag-set name. `prev` is the previous token's
/// tag within the sentence.
fn tag_name(tag_set: &TagSet, label: &str, prev: Option<usize>) -> String {
    let suffixed = tag_set.options().generate_st_co_suffix;
    let continues = |reduced: &str| prev.is_some_and(|p| tag_set.reduced(p) == reduced);

    let (reduced, inside) = if label == "O" {
        (NONE_TAG, true)
    } else if let Some(reduced) = label.strip_prefix("B-") {
        (reduced, false)
    } else if let Some(reduced) = label.strip_prefix("I-") {
        (reduced, true)
    } else {
        return label.to_string();
    };

    if !suffixed {
        reduced.to_string()
    } else if inside && continues(reduced) {
        format!("{reduced}-CO")
    } else {
        format!("{reduced}-ST")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use disctag_core::TagSetOptions;

    fn tag_set() -> TagSet {
        TagSet::new(&["PER", "ORG"], TagSetOptions::default()).unwrap()
    }

    fn names(ts: &TagSet, sentence: &Sentence) -> Vec<String> {
        sentence
            .token_tags()
            .iter()
            .map(|&t| ts.symbol(t).to_string())
            .collect()
    }

    #[test]
    fn test_full_tag_names() {
        let ts = tag_set();
        let text = "John\tPER-ST\nSmith\tPER-CO\nwent\tNONE-ST\n\nhome\tNONE-ST\n";
        let sentences = parse_corpus(text, Path::new("t"), &ts).unwrap();
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[0].words, ["John", "Smith", "went"]);
        assert_eq!(names(&ts, &sentences[0]), ["PER-ST", "PER-CO", "NONE-ST"]);
        assert_eq!(sentences[0].gold[0], ts.start_index().unwrap());
        assert_eq!(*sentences[0].gold.last().unwrap(), ts.end_index().unwrap());
        assert_eq!(sentences[1].line, 5);
    }

    #[test]
    fn test_bio_labels() {
        let ts = tag_set();
        let text = "# header\nthe\tO\nAcme\tB-ORG\nCorp\tI-ORG\nhired\tO\nsome\tO\nAnn\tI-PER\nBob\tB-PER\n";
        let sentences = parse_corpus(text, Path::new("t"), &ts).unwrap();
        assert_eq!(sentences.len(), 1);
        assert_eq!(
            names(&ts, &sentences[0]),
            ["NONE-ST", "ORG-ST", "ORG-CO", "NONE-ST", "NONE-CO", "PER-ST", "PER-ST"]
        );
        assert_eq!(sentences[0].line, 2);
    }

    #[test]
    fn test_bio_labels_without_suffixes() {
        let ts = TagSet::new(&["PER"], TagSetOptions::default().with_st_co_suffix(false)).unwrap();
        let text = "Ann\tB-PER\nLee\tI-PER\nsmiled\tO\n";
        let sentences = parse_corpus(text, Path::new("t"), &ts).unwrap();
        assert_eq!(names(&ts, &sentences[0]), ["PER", "PER", "NONE"]);
    }

    #[test]
    fn test_errors_carry_line_numbers() {
        let ts = tag_set();
        let err = parse_corpus("John\tPER-ST\nSmith PER-CO\n", Path::new("c.bio"), &ts)
            .unwrap_err();
        assert_eq!(err.to_string(), "c.bio:2: expected 'token<TAB>tag'");

        let err = parse_corpus("\n\nParis\tB-LOC\n", Path::new("c.bio"), &ts).unwrap_err();
        assert_eq!(err.to_string(), "c.bio:3: unknown tag 'B-LOC'");

        let err = parse_corpus("x\tSTART\n", Path::new("c.bio"), &ts).unwrap_err();
        assert!(matches!(err, TrainerError::Corpus { line: 1, .. }));
    }

    #[test]
    fn test_blank_runs_and_trailing_sentence() {
        let ts = tag_set();
        let sentences = parse_corpus("\n\na\tO\n\n\n\nb\tO", Path::new("t"), &ts).unwrap();
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[1].observations().len(), 3);
    }
}
