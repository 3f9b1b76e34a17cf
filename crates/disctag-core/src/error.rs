use thiserror::Error;

/// Errors that can occur while building, training or running a tagger.
#[derive(Debug, Error)]
pub enum DiscTagError {
    /// The engine was asked to do something its setup does not allow,
    /// such as training a decoder backed by a block table.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A weight, transition, tag-set or feature file could not be loaded.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// Training data disagrees with the declared tag vocabulary.
    #[error("consistency error: {0}")]
    Consistency(String),

    /// A constraint array is malformed or names a tag outside the tag set.
    #[error("invalid constraint: {0}")]
    InvalidConstraint(String),

    /// No tag sequence of this length is reachable under the transition
    /// relation and the supplied constraints.
    #[error("no legal tag sequence for an observation sequence of length {length}")]
    NoPath {
        /// Length of the observation sequence, sentinels included.
        length: usize,
    },

    /// Underlying file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for disctag operations.
pub type Result<T> = std::result::Result<T, DiscTagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let err = DiscTagError::Configuration("cannot train a block table".into());
        assert_eq!(
            err.to_string(),
            "configuration error: cannot train a block table"
        );

        let err = DiscTagError::NoPath { length: 7 };
        assert!(err.to_string().contains("length 7"));
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.weights");
        let err: DiscTagError = io.into();
        assert!(matches!(err, DiscTagError::Io(_)));
        assert!(err.to_string().contains("missing.weights"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DiscTagError>();
    }
}
