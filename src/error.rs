//! Rich diagnostic error types for the storyline pipeline.
//!
//! Two families exist. [`StoryError`] covers document-level structural failures and
//! propagates to the caller. [`CollaboratorError`] covers failures of external models
//! (NER, coreference, summarizer, description enricher); the pipeline recovers from
//! those locally and never surfaces them as a document failure.

use miette::Diagnostic;
use thiserror::Error;

/// Document-level errors returned by the pipeline and the CLI.
#[derive(Debug, Error, Diagnostic)]
pub enum StoryError {
    #[error("unsupported content format: \"{origin}\"")]
    #[diagnostic(
        code(storyline::unsupported_format),
        help(
            "Supported inputs are PDF documents (.pdf) and positioned-fragment \
             dumps (.json). Check the file extension."
        )
    )]
    UnsupportedFormat { origin: String },

    #[error("empty document: no text extracted from \"{origin}\"")]
    #[diagnostic(
        code(storyline::empty_document),
        help(
            "Segmentation produced no text. The file may be empty, image-only \
             without OCR output, or contain only whitespace."
        )
    )]
    EmptyDocument { origin: String },

    #[error("parse error in {format} document: {message}")]
    #[diagnostic(
        code(storyline::parse_error),
        help(
            "The document could not be parsed. Verify the file is valid {format} \
             and not corrupted."
        )
    )]
    Parse { format: String, message: String },

    #[error("invalid configuration: {message}")]
    #[diagnostic(
        code(storyline::config),
        help("Fix the offending value in the TOML configuration, or remove it to use the default.")
    )]
    Config { message: String },

    #[error("I/O error on \"{path}\": {source}")]
    #[diagnostic(
        code(storyline::io),
        help("A filesystem operation failed. Check file paths and permissions.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failures of external model collaborators.
///
/// These are always recovered by substituting an empty result or a placeholder.
#[derive(Debug, Error, Diagnostic)]
pub enum CollaboratorError {
    #[error("{service} is not available")]
    #[diagnostic(
        code(storyline::collab::unavailable),
        help("Configure the service URL under [services], or run without it for degraded output.")
    )]
    Unavailable { service: String },

    #[error("{service} request failed: {message}")]
    #[diagnostic(
        code(storyline::collab::request_failed),
        help("Check that the service is running and reachable.")
    )]
    RequestFailed { service: String, message: String },

    #[error("{service} request timed out after {timeout_secs}s")]
    #[diagnostic(
        code(storyline::collab::timeout),
        help("Increase services.timeout_secs or use a smaller model.")
    )]
    Timeout { service: String, timeout_secs: u64 },

    #[error("{service} returned malformed output: {message}")]
    #[diagnostic(
        code(storyline::collab::malformed),
        help("The service replied with a response that does not match its documented shape.")
    )]
    MalformedOutput { service: String, message: String },
}

/// Convenience alias for document-level results.
pub type StoryResult<T> = std::result::Result<T, StoryError>;

/// Convenience alias for collaborator call results.
pub type CollaboratorResult<T> = std::result::Result<T, CollaboratorError>;
