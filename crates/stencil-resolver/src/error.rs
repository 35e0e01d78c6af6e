//! Resolver error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResolverError {
    #[error("failed to resolve module '{name}' with constraints\n{chain}: no version found matching criteria")]
    ConstraintUnsatisfiable { name: String, chain: String },

    #[error("module '{name}' requested with channel '{requested}' but previously resolved with channel '{existing}'")]
    ChannelConflict {
        name: String,
        requested: String,
        existing: String,
    },

    #[error("module '{name}' not found in any configured source")]
    ModuleNotFound { name: String },

    #[error("version '{version}' of module '{name}' is not available")]
    VersionNotFound { name: String, version: String },

    #[error(transparent)]
    Core(#[from] stencil_core::CoreError),
}

pub type Result<T> = std::result::Result<T, ResolverError>;
