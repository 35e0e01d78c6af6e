//! CLI error type with exit code mapping

use thiserror::Error;

use crate::exit_codes;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] stencil_core::CoreError),

    #[error(transparent)]
    Resolver(#[from] stencil_resolver::ResolverError),

    #[error(transparent)]
    Engine(#[from] stencil_engine::EngineError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{message}")]
    Other { message: String },
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Core(stencil_core::CoreError::InvalidManifest { .. })
            | Self::Core(stencil_core::CoreError::YamlParse(_)) => exit_codes::MANIFEST_ERROR,
            Self::Core(_) => exit_codes::ERROR,
            Self::Resolver(_) => exit_codes::RESOLVE_ERROR,
            Self::Engine(_) => exit_codes::TEMPLATE_ERROR,
            Self::Io(_) => exit_codes::IO_ERROR,
            Self::Other { .. } => exit_codes::ERROR,
        }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;
