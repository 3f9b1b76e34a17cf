//! Token feature types and the registry that resolves feature-type lists.

use std::sync::Arc;

use disctag_core::{Feature, FeatureType, FeatureTypeRegistry, State, Symbol};
use regex::Regex;

use crate::error::Result;
use crate::token::WordObservation;

macro_rules! feature_type {
    ($(#[$meta:meta])* $ty:ident, $name:literal) => {
        $(#[$meta])*
        pub struct $ty {
            name: Symbol,
        }

        impl $ty {
            pub const NAME: &'static str = $name;
        }

        impl Default for $ty {
            fn default() -> Self {
                Self {
                    name: Symbol::new($name),
                }
            }
        }
    };
}

feature_type!(
    /// The word as written.
    WordType,
    "word"
);
feature_type!(
    /// The lowercased word.
    LowercaseWordType,
    "lc-word"
);
feature_type!(PrevWordType, "prev-word");
feature_type!(NextWordType, "next-word");
feature_type!(
    /// Last three characters of the lowercased word.
    SuffixType,
    "suffix"
);
feature_type!(
    /// The previous tag, i.e. a learned transition weight.
    PrevTagType,
    "prev-tag"
);
feature_type!(
    /// The previous tag paired with the lowercased word.
    WordPrevTagType,
    "word-prev-tag"
);

fn emit<O>(name: &Symbol, state: &State<'_, O>, payload: Vec<Symbol>, out: &mut Vec<Feature>) {
    out.push(Feature::new(name.clone(), state.tag().clone(), payload));
}

impl<O: WordObservation> FeatureType<O> for WordType {
    fn name(&self) -> &Symbol {
        &self.name
    }

    fn extract(&self, state: &State<'_, O>, out: &mut Vec<Feature>) {
        emit(&self.name, state, vec![state.current().word().into()], out);
    }
}

impl<O: WordObservation> FeatureType<O> for LowercaseWordType {
    fn name(&self) -> &Symbol {
        &self.name
    }

    fn extract(&self, state: &State<'_, O>, out: &mut Vec<Feature>) {
        emit(&self.name, state, vec![state.current().lowercase().into()], out);
    }
}

impl<O: WordObservation> FeatureType<O> for PrevWordType {
    fn name(&self) -> &Symbol {
        &self.name
    }

    fn extract(&self, state: &State<'_, O>, out: &mut Vec<Feature>) {
        if let Some(prev) = state.at_offset(-1) {
            emit(&self.name, state, vec![prev.lowercase().into()], out);
        }
    }
}

impl<O: WordObservation> FeatureType<O> for NextWordType {
    fn name(&self) -> &Symbol {
        &self.name
    }

    fn extract(&self, state: &State<'_, O>, out: &mut Vec<Feature>) {
        if let Some(next) = state.at_offset(1) {
            emit(&self.name, state, vec![next.lowercase().into()], out);
        }
    }
}

impl<O: WordObservation> FeatureType<O> for SuffixType {
    fn name(&self) -> &Symbol {
        &self.name
    }

    fn extract(&self, state: &State<'_, O>, out: &mut Vec<Feature>) {
        let word = state.current().lowercase();
        let n_chars = word.chars().count();
        if n_chars > 3 {
            let suffix: String = word.chars().skip(n_chars - 3).collect();
            emit(&self.name, state, vec![suffix.into()], out);
        }
    }
}

impl<O: WordObservation> FeatureType<O> for PrevTagType {
    fn name(&self) -> &Symbol {
        &self.name
    }

    fn uses_previous_tag(&self) -> bool {
        true
    }

    fn extract(&self, state: &State<'_, O>, out: &mut Vec<Feature>) {
        if let Some(prev) = state.prev_tag() {
            emit(&self.name, state, vec![prev.clone()], out);
        }
    }
}

impl<O: WordObservation> FeatureType<O> for WordPrevTagType {
    fn name(&self) -> &Symbol {
        &self.name
    }

    fn uses_previous_tag(&self) -> bool {
        true
    }

    fn extract(&self, state: &State<'_, O>, out: &mut Vec<Feature>) {
        if let Some(prev) = state.prev_tag() {
            let word = Symbol::from(state.current().lowercase());
            emit(&self.name, state, vec![prev.clone(), word], out);
        }
    }
}

/// Coarse orthographic class of the word: capitalization, digits,
/// punctuation.
pub struct ShapeType {
    name: Symbol,
    re_all_caps: Regex,
    re_init_cap: Regex,
    re_lower: Regex,
    re_digits: Regex,
    re_has_digit: Regex,
    re_punct: Regex,
}

impl ShapeType {
    pub const NAME: &'static str = "shape";

    pub fn new() -> Result<Self> {
        Ok(Self {
            name: Symbol::new(Self::NAME),
            re_all_caps: Regex::new(r"^\p{Lu}+$")?,
            re_init_cap: Regex::new(r"^\p{Lu}\p{Ll}+$")?,
            re_lower: Regex::new(r"^\p{Ll}+$")?,
            re_digits: Regex::new(r"^\p{Nd}+$")?,
            re_has_digit: Regex::new(r"\p{Nd}")?,
            re_punct: Regex::new(r"^[\p{P}\p{S}]+$")?,
        })
    }

    pub fn classify(&self, word: &str) -> &'static str {
        if self.re_all_caps.is_match(word) {
            "all-caps"
        } else if self.re_init_cap.is_match(word) {
            "init-cap"
        } else if self.re_lower.is_match(word) {
            "lower"
        } else if self.re_digits.is_match(word) {
            "digits"
        } else if self.re_has_digit.is_match(word) {
            "has-digit"
        } else if self.re_punct.is_match(word) {
            "punct"
        } else {
            "mixed"
        }
    }
}

impl<O: WordObservation> FeatureType<O> for ShapeType {
    fn name(&self) -> &Symbol {
        &self.name
    }

    fn extract(&self, state: &State<'_, O>, out: &mut Vec<Feature>) {
        let shape = self.classify(state.current().word());
        emit(&self.name, state, vec![shape.into()], out);
    }
}

/// Registry with every bundled feature type.
pub fn standard_registry<O: WordObservation + 'static>() -> Result<FeatureTypeRegistry<O>> {
    let mut registry = FeatureTypeRegistry::new();
    registry.register(WordType::NAME, || Arc::new(WordType::default()));
    registry.register(LowercaseWordType::NAME, || {
        Arc::new(LowercaseWordType::default())
    });
    registry.register(PrevWordType::NAME, || Arc::new(PrevWordType::default()));
    registry.register(NextWordType::NAME, || Arc::new(NextWordType::default()));
    registry.register(SuffixType::NAME, || Arc::new(SuffixType::default()));
    registry.register(PrevTagType::NAME, || Arc::new(PrevTagType::default()));
    registry.register(WordPrevTagType::NAME, || {
        Arc::new(WordPrevTagType::default())
    });

    // Compiled once, shared by every set built from this registry.
    let shape = Arc::new(ShapeType::new()?);
    registry.register(ShapeType::NAME, move || {
        Arc::clone(&shape) as Arc<dyn FeatureType<O>>
    });
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{TokenObservation, observations};
    use disctag_core::{FeatureTypeSet, TagSet, TagSetOptions};

    fn extract(name: &str, obs: &[TokenObservation], index: usize, prev: Option<&str>) -> Vec<String> {
        let ts = TagSet::new(&["PER"], TagSetOptions::default()).unwrap();
        let registry = standard_registry::<TokenObservation>().unwrap();
        let feature_type = registry.build(name).unwrap();
        let tag = ts.index("PER-ST").unwrap();
        let prev = prev.map(|p| ts.index(p).unwrap());
        let state = State::new(&ts, tag, prev, index, obs);
        let mut out = Vec::new();
        feature_type.extract(&state, &mut out);
        out.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_word_features() {
        let obs = observations(&["John", "Smith", "ran"]);
        assert_eq!(extract("word", &obs, 1, None), ["word PER-ST John"]);
        assert_eq!(extract("lc-word", &obs, 1, None), ["lc-word PER-ST john"]);
        assert_eq!(
            extract("prev-word", &obs, 1, None),
            ["prev-word PER-ST <boundary>"]
        );
        assert_eq!(extract("next-word", &obs, 2, None), ["next-word PER-ST ran"]);
        assert_eq!(extract("suffix", &obs, 2, None), ["suffix PER-ST ith"]);
        assert!(extract("suffix", &obs, 3, None).is_empty());
    }

    #[test]
    fn test_previous_tag_features() {
        let obs = observations(&["John", "Smith"]);
        assert!(extract("prev-tag", &obs, 1, None).is_empty());
        assert_eq!(
            extract("prev-tag", &obs, 1, Some("START")),
            ["prev-tag PER-ST START"]
        );
        assert_eq!(
            extract("word-prev-tag", &obs, 2, Some("PER-ST")),
            ["word-prev-tag PER-ST PER-ST smith"]
        );
    }

    #[test]
    fn test_shapes() {
        let shape = ShapeType::new().unwrap();
        assert_eq!(shape.classify("IBM"), "all-caps");
        assert_eq!(shape.classify("John"), "init-cap");
        assert_eq!(shape.classify("went"), "lower");
        assert_eq!(shape.classify("1999"), "digits");
        assert_eq!(shape.classify("A4"), "has-digit");
        assert_eq!(shape.classify("--"), "punct");
        assert_eq!(shape.classify("McDonald"), "mixed");
    }

    #[test]
    fn test_registry_resolves_feature_list() {
        let registry = standard_registry::<TokenObservation>().unwrap();
        let set = FeatureTypeSet::parse("3\nlc-word\nshape\nprev-tag\n", &registry).unwrap();
        assert_eq!(set.len(), 3);
        assert!(set.get("prev-tag").unwrap().uses_previous_tag());
        assert!(!set.get("shape").unwrap().uses_previous_tag());
        assert_eq!(registry.names().len(), 8);
        assert!(registry.build("gazetteer").is_err());
    }
}
