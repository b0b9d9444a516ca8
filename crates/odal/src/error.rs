//! Result and Error types for the crate.
use std::fmt;

use miette::Diagnostic;
use thiserror::Error;

/// Result containing an error variant from this module.
pub type Result<T> = std::result::Result<T, Error>;

/// Which of the two layers a file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKind {
    /// The shared configuration in the main directory.
    Main,
    /// The device specific overlay on top of the main configuration.
    Overlay,
}

impl fmt::Display for ConfigKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigKind::Main => f.write_str("main"),
            ConfigKind::Overlay => f.write_str("overlay"),
        }
    }
}

/// Configuration error, tagged with the name of the config that failed.
#[derive(Error, Diagnostic, Debug)]
#[error("config `{name}`: {kind}")]
pub struct Error {
    /// [`Config::PATH`](crate::Config::PATH) of the failing config.
    pub name: &'static str,
    #[source]
    pub kind: ErrorKind,
}

/// Configuration error variants
#[derive(Error, Diagnostic, Debug)]
pub enum ErrorKind {
    /// The file could not be read.
    #[error("failed to read {config_kind} config from `{path}`")]
    Load {
        path: String,
        config_kind: ConfigKind,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML, or does not match the config struct.
    #[error("failed to parse {config_kind} config `{path}`")]
    #[diagnostic(help("check the file against the fields of the config struct"))]
    Parse {
        path: String,
        config_kind: ConfigKind,
        #[source]
        source: toml::de::Error,
    },

    /// The merged table could not be turned into the config struct.
    #[error("merged config does not match the config struct")]
    Deserialize(#[source] toml::de::Error),

    /// The config struct could not be turned into TOML.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// The config struct serialized into something other than a table.
    #[error("config does not serialize into a TOML table")]
    NotATable,

    /// The overlay could not be written.
    #[error("failed to write overlay to `{path}`")]
    Store {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
