//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("invalid manifest: {message}")]
    InvalidManifest { message: String },

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid schema for argument {name:?}: {message}")]
    InvalidSchema { name: String, message: String },

    #[error("argument {path:?} failed schema validation: {message}")]
    SchemaValidation { path: String, message: String },

    #[error("absolute keyword location {location:?} does not reference manifest.yaml")]
    MissingManifestPrefix { location: String },

    #[error("{message}, at {file}:{line}")]
    BlockSyntax {
        message: String,
        file: String,
        line: usize,
    },

    #[error("path {path:?} escapes the working directory")]
    SandboxEscape { path: String },

    #[error("failed to access {path:?}: {message}")]
    FileAccess { path: String, message: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;
