use std::{io, path::PathBuf};

use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("could not read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not fetch {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: BoxError,
    },

    #[error("malformed base64 payload: {0}")]
    Decode(#[from] base64::DecodeError),
}

impl FetchError {
    pub fn network(url: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Network {
            url: url.into(),
            source: source.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unsupported or malformed image: {0}")]
    InvalidFormat(#[from] image::ImageError),
}

impl From<io::Error> for DecodeError {
    fn from(error: io::Error) -> Self {
        Self::InvalidFormat(image::ImageError::IoError(error))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("neither imageUrl nor imageData is set")]
    NoSourceProvided,
}

/// Everything that can end a load. `Cancelled` is a suppressed outcome, never reported.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("load was superseded by a newer request")]
    Cancelled,
}

impl LoadError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
