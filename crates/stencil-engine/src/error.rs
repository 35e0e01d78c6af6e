//! Engine error types
//!
//! Template failures carry the template source and, when the template engine
//! reports one, the offending line as a miette span. Failures raised by the
//! template-scoped API (argument lookups, hook misuse, sandbox violations)
//! surface through the template engine as render errors; they are
//! re-categorised here by message so callers can tell the kinds apart.

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Main engine error type
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Template(Box<TemplateError>),

    #[error("directory replacement of {expression} to {rendered} contains path separator in output")]
    DirReplacementIllegal { expression: String, rendered: String },

    #[error("render cancelled")]
    Cancelled,

    #[error(transparent)]
    Core(#[from] stencil_core::CoreError),
}

impl From<TemplateError> for EngineError {
    fn from(err: TemplateError) -> Self {
        Self::Template(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Category of a template failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum TemplateErrorKind {
    Parse,
    Render,
    UnknownArgument,
    SchemaValidation,
    InvalidFrom,
    HookMisuse,
    DuplicateGlobal,
    SandboxEscape,
    BlockSyntax,
}

impl TemplateErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parse => "parse",
            Self::Render => "render",
            Self::UnknownArgument => "unknown_argument",
            Self::SchemaValidation => "schema_validation",
            Self::InvalidFrom => "invalid_from",
            Self::HookMisuse => "hook_misuse",
            Self::DuplicateGlobal => "duplicate_global",
            Self::SandboxEscape => "sandbox_escape",
            Self::BlockSyntax => "block_syntax",
        }
    }
}

/// A template parse or render failure with source context
#[derive(Error, Debug, Diagnostic, Clone)]
#[error("{message}")]
#[diagnostic(code(stencil::template))]
pub struct TemplateError {
    /// Error message
    pub message: String,

    /// Failure category
    pub kind: TemplateErrorKind,

    /// Template source
    #[source_code]
    pub src: NamedSource<String>,

    /// Location of the failing line, when the engine reports one
    #[label("error occurred here")]
    pub span: Option<SourceSpan>,
}

impl TemplateError {
    /// Wrap a template-engine parse failure
    pub fn parse(err: minijinja::Error, template_name: &str, template_source: &str) -> Self {
        let span = err
            .line()
            .and_then(|line| calculate_span(template_source, line));
        Self {
            message: format!("failed to parse template {template_name:?}: {err}"),
            kind: TemplateErrorKind::Parse,
            src: NamedSource::new(template_name, template_source.to_string()),
            span,
        }
    }

    /// Wrap a template-engine render failure, categorising API errors
    pub fn render(err: minijinja::Error, template_name: &str, template_source: &str) -> Self {
        let detailed = format!("{err:#}");
        let kind = categorize(&err, &detailed);
        let span = err
            .line()
            .and_then(|line| calculate_span(template_source, line));
        Self {
            message: format!("failed to render template {template_name:?}: {detailed}"),
            kind,
            src: NamedSource::new(template_name, template_source.to_string()),
            span,
        }
    }

    pub fn kind(&self) -> TemplateErrorKind {
        self.kind
    }
}

/// Categorise a template-engine error into our kinds
///
/// API methods raise errors with recognisable phrasing; everything else is a
/// plain render failure.
fn categorize(err: &minijinja::Error, detailed: &str) -> TemplateErrorKind {
    if err.kind() == minijinja::ErrorKind::SyntaxError {
        return TemplateErrorKind::Parse;
    }
    if detailed.contains("unknown argument") {
        TemplateErrorKind::UnknownArgument
    } else if detailed.contains("failed schema validation") {
        TemplateErrorKind::SchemaValidation
    } else if detailed.contains("invalid from") {
        TemplateErrorKind::InvalidFrom
    } else if detailed.contains("supported type is") {
        TemplateErrorKind::HookMisuse
    } else if detailed.contains("already set by template") {
        TemplateErrorKind::DuplicateGlobal
    } else if detailed.contains("escapes the working directory") {
        TemplateErrorKind::SandboxEscape
    } else if detailed.contains("invalid Block") || detailed.contains("invalid EndBlock") {
        TemplateErrorKind::BlockSyntax
    } else {
        TemplateErrorKind::Render
    }
}

/// Span covering a 1-indexed line of the template source
fn calculate_span(source: &str, line: usize) -> Option<SourceSpan> {
    let mut offset = 0usize;
    for (i, text) in source.lines().enumerate() {
        if i + 1 == line {
            return Some(SourceSpan::new(offset.into(), text.len()));
        }
        offset += text.len() + 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render_err(message: &str) -> minijinja::Error {
        minijinja::Error::new(minijinja::ErrorKind::InvalidOperation, message.to_string())
    }

    #[test]
    fn test_categorize_api_errors() {
        let cases = [
            ("unknown argument \"x\"", TemplateErrorKind::UnknownArgument),
            (
                "argument \"x\" failed schema validation: 1 is not a string",
                TemplateErrorKind::SchemaValidation,
            ),
            (
                "invalid from: argument \"x\" defers to an unresolved module",
                TemplateErrorKind::InvalidFrom,
            ),
            (
                "unsupported module hook data type map, supported type is list",
                TemplateErrorKind::HookMisuse,
            ),
            (
                "global \"m/g\" already set by template \"m/templates/a.tpl\"",
                TemplateErrorKind::DuplicateGlobal,
            ),
            (
                "path \"../x\" escapes the working directory",
                TemplateErrorKind::SandboxEscape,
            ),
            (
                "invalid EndBlock when not inside of a block, at f:2",
                TemplateErrorKind::BlockSyntax,
            ),
            ("something else went wrong", TemplateErrorKind::Render),
        ];

        for (message, expected) in cases {
            let err = TemplateError::render(render_err(message), "m/templates/t.tpl", "src");
            assert_eq!(err.kind(), expected, "message: {message}");
        }
    }

    #[test]
    fn test_parse_kind_and_span() {
        let mut env = minijinja::Environment::new();
        let source = "line one\n{% if %}\n";
        let err = env
            .add_template_owned("t.tpl".to_string(), source.to_string())
            .unwrap_err();

        let wrapped = TemplateError::parse(err, "m/templates/t.tpl", source);
        assert_eq!(wrapped.kind(), TemplateErrorKind::Parse);
        assert!(wrapped.span.is_some());
    }

    #[test]
    fn test_calculate_span_offsets() {
        let source = "abc\ndefgh\ni";
        assert_eq!(calculate_span(source, 1), Some(SourceSpan::new(0.into(), 3)));
        assert_eq!(calculate_span(source, 2), Some(SourceSpan::new(4.into(), 5)));
        assert_eq!(calculate_span(source, 9), None);
    }
}
