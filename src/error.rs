//! Error taxonomy for the engine boundary.
//!
//! The mixing core itself never fails: bad clips are skipped and empty
//! stems are replaced with silence. Errors only arise where audio or
//! configuration crosses the filesystem or a codec.

use std::path::PathBuf;

/// Convenience result type used across the crate.
pub type MixResult<T> = Result<T, MixError>;

#[derive(thiserror::Error, Debug)]
pub enum MixError {
    /// Filesystem failure, with the path involved.
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// WAV container could not be read or written.
    #[error("wav error: {0}")]
    Wav(#[from] hound::Error),

    /// Settings or feature data failed to (de)serialise.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Audio decoded but in a shape the engine cannot use.
    #[error("decode error: {0}")]
    Decode(String),

    /// A caller-supplied value is out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl MixError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(MixError::decode("x").to_string().starts_with("decode error:"));
        assert!(
            MixError::invalid_argument("x")
                .to_string()
                .starts_with("invalid argument:")
        );
        let io = MixError::io("clips/a.wav", std::io::Error::other("boom"));
        let msg = io.to_string();
        assert!(msg.contains("clips/a.wav"));
        assert!(msg.contains("boom"));
    }

    #[test]
    fn json_errors_convert() {
        let err: MixError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(err.to_string().starts_with("serialization error:"));
    }
}
