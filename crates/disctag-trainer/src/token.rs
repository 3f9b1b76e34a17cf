//! The token observation the bundled feature types read.

/// Word used for the padding observations at both ends of a sentence.
pub const BOUNDARY: &str = "<boundary>";

/// Read access to the surface form of an observation.
///
/// The bundled feature types work over any observation type that
/// implements this.
pub trait WordObservation {
    fn word(&self) -> &str;

    fn lowercase(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenObservation {
    word: String,
    lowercase: String,
}

impl TokenObservation {
    pub fn new(word: impl Into<String>) -> Self {
        let word = word.into();
        let lowercase = word.to_lowercase();
        Self { word, lowercase }
    }

    pub fn boundary() -> Self {
        Self::new(BOUNDARY)
    }
}

impl WordObservation for TokenObservation {
    fn word(&self) -> &str {
        &self.word
    }

    fn lowercase(&self) -> &str {
        &self.lowercase
    }
}

/// Observations for a sentence, padded with a boundary token at each end
/// so that position 0 and the last position line up with START and END.
pub fn observations<S: AsRef<str>>(words: &[S]) -> Vec<TokenObservation> {
    let mut out = Vec::with_capacity(words.len() + 2);
    out.push(TokenObservation::boundary());
    out.extend(words.iter().map(|w| TokenObservation::new(w.as_ref())));
    out.push(TokenObservation::boundary());
    out
}
