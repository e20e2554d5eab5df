use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// DNS, connection, or timeout failure while fetching the manifest
    #[error("{0}")]
    Transport(String),

    #[error("Unexpected HTTP {0}")]
    HttpStatus(u16),

    #[error("Manifest response was empty.")]
    EmptyManifest,

    #[error("Manifest response could not be decoded: {0}")]
    ManifestFormat(String),

    #[error("Manifest belongs to '{found}', expected '{expected}'")]
    SlugMismatch { expected: String, found: String },

    #[error("Failed to move '{}' to '{}': {reason}", .from.display(), .to.display())]
    Relocation {
        from: PathBuf,
        to: PathBuf,
        reason: String,
    },

    #[error("Invalid configuration: {0}\n\n\
             Hint: Run `globalblocks-updater config init` to write a default config,\n\
             then set [package] slug and [remote] manifest_url.")]
    InvalidConfig(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Network-level failure: the manifest could not be retrieved at all
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Http(_))
    }

    /// The server answered, but not with a usable manifest for this package
    pub fn is_manifest_format(&self) -> bool {
        matches!(
            self,
            Error::HttpStatus(_)
                | Error::EmptyManifest
                | Error::ManifestFormat(_)
                | Error::SlugMismatch { .. }
                | Error::Json(_)
        )
    }
}
