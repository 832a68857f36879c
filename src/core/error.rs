//! Error handling for metricmat
//!
//! This module provides the error taxonomy of a materialization pass and the
//! user-facing error reporting used by the command-line surface. The design
//! follows two principles:
//! 1. **Strongly-typed errors** ([`MaterializeError`]) so callers can match on the
//!    precise failure mode of a pass
//! 2. **User-friendly messages** ([`ErrorContext`]) with details and suggestions
//!    for people running the CLI
//!
//! # Error Categories
//!
//! - **Invocation text**: [`MaterializeError::Syntax`], [`MaterializeError::Parse`],
//!   [`MaterializeError::InvalidArguments`]
//! - **Graph**: [`MaterializeError::UnknownDependency`], [`MaterializeError::EntityNotFound`],
//!   [`MaterializeError::CycleDetected`], [`MaterializeError::ManifestParse`]
//! - **Rendering**: [`MaterializeError::Render`]
//! - **Persistent cache**: [`MaterializeError::CacheIo`]
//! - **Configuration**: [`MaterializeError::Config`]
//!
//! Failures tied to one invocation are wrapped in [`MaterializeError::Invocation`],
//! which carries the consuming node id and the raw invocation text so the
//! message points at the exact call that broke the pass.
//!
//! # Examples
//!
//! ```rust,no_run
//! use metricmat::core::{MaterializeError, user_friendly_error};
//!
//! let error = MaterializeError::UnknownDependency {
//!     node_id: "model.shop.orders_report".to_string(),
//!     name: "revenu".to_string(),
//! };
//!
//! let ctx = user_friendly_error(anyhow::Error::from(error));
//! ctx.display(); // coloured output on stderr
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for materialization operations.
///
/// Every stage of a pass reports through this enum. Stages that fail for one
/// invocation are wrapped by the orchestrator in [`MaterializeError::Invocation`]
/// before they reach the caller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MaterializeError {
    /// The invocation text is not a syntactically valid call expression.
    ///
    /// Raised for unbalanced tokens that slipped past extraction, malformed
    /// literals, or repeated keyword arguments.
    #[error("Invalid call syntax in `{text}`: {reason}")]
    Syntax {
        /// The offending text
        text: String,
        /// What the parser expected
        reason: String,
    },

    /// An argument is well formed but is not a literal expression.
    ///
    /// Variable references, arithmetic, function calls and positional
    /// arguments all land here.
    #[error("Unsupported argument `{text}`: {reason}")]
    Parse {
        /// The offending argument text
        text: String,
        /// Why it was rejected
        reason: String,
    },

    /// Arguments are literals but do not describe a valid metric query.
    #[error("Invalid materialize arguments in `{text}`: {reason}")]
    InvalidArguments {
        /// The invocation text
        text: String,
        /// What is wrong with the arguments
        reason: String,
    },

    /// A referenced producer name has no resolvable entity id.
    #[error("Node '{node_id}' references unknown metric '{name}'")]
    UnknownDependency {
        /// Consumer node that referenced the name
        node_id: String,
        /// The unresolved producer name
        name: String,
    },

    /// An entity id was looked up but does not exist in the graph.
    #[error("Entity not found: {id}")]
    EntityNotFound {
        /// The missing id
        id: String,
    },

    /// The external renderer failed.
    #[error("Rendering failed: {reason}")]
    Render {
        /// Renderer-provided failure description
        reason: String,
    },

    /// Local cache storage failed.
    ///
    /// The orchestrator never aborts on this error; it logs it and renders
    /// without caching.
    #[error("Cache {operation} failed for {path}: {reason}")]
    CacheIo {
        /// Operation that failed ("read", "write", "evict", ...)
        operation: String,
        /// Path involved
        path: String,
        /// Underlying IO error text
        reason: String,
    },

    /// Contextual wrapper for a failure while processing one invocation.
    #[error("Error generating SQL for {node_id}, for the following metric invocation:\n\n{text}")]
    Invocation {
        /// Consumer node containing the invocation
        node_id: String,
        /// Raw invocation text as extracted
        text: String,
        /// The underlying stage failure
        #[source]
        source: Box<MaterializeError>,
    },

    /// The dependency graph contains a cycle.
    #[error("Circular dependency detected: {path}")]
    CycleDetected {
        /// Cycle rendered as `a → b → a`
        path: String,
    },

    /// A manifest artifact could not be interpreted.
    #[error("Failed to parse manifest {path}: {reason}")]
    ManifestParse {
        /// Manifest path
        path: String,
        /// What was wrong
        reason: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error
        message: String,
    },

    /// Any other failure, shown as-is
    #[error("{message}")]
    Other {
        /// Full error message, including context lines
        message: String,
    },
}

impl MaterializeError {
    /// Wrap a stage failure with the invocation it came from.
    #[must_use]
    pub fn for_invocation(self, node_id: &str, text: &str) -> Self {
        Self::Invocation {
            node_id: node_id.to_string(),
            text: text.to_string(),
            source: Box::new(self),
        }
    }

    /// Returns the innermost stage failure, unwrapping invocation context.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::Invocation { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Error context wrapper that provides user-friendly error information.
///
/// Combines a [`MaterializeError`] with optional details and a suggestion so
/// the CLI can print something actionable instead of a bare error chain.
///
/// # Examples
///
/// ```rust,no_run
/// use metricmat::core::{ErrorContext, MaterializeError};
///
/// let ctx = ErrorContext::new(MaterializeError::Config {
///     message: "unknown patch mode 'loose'".to_string(),
/// })
/// .with_suggestion("Use mode = \"strict\" or mode = \"lenient\"");
///
/// ctx.display();
/// ```
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: MaterializeError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context without details or suggestion.
    #[must_use]
    pub const fn new(error: MaterializeError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Attach a suggestion for resolving the error.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Attach additional details about the error.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr with terminal colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] with a suggestion where one is known.
///
/// Walks the `anyhow` chain looking for a [`MaterializeError`]; IO and TOML
/// errors get generic advice, anything else is reported verbatim.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    for cause in error.chain() {
        if let Some(err) = cause.downcast_ref::<MaterializeError>() {
            let ctx = create_error_context(err);
            // Keep the outer anyhow context lines, they name the file or command
            return if cause.to_string() == error.to_string() {
                ctx
            } else {
                ctx.with_details(format!("{error:#}"))
            };
        }
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        if io_error.kind() == std::io::ErrorKind::PermissionDenied {
            return ErrorContext::new(MaterializeError::CacheIo {
                operation: "access".to_string(),
                path: "unknown".to_string(),
                reason: io_error.to_string(),
            })
            .with_suggestion("Check file ownership and permissions of the working directory");
        }
    }

    if let Some(toml_error) = error.downcast_ref::<toml::de::Error>() {
        return ErrorContext::new(MaterializeError::Config {
            message: toml_error.to_string(),
        })
        .with_suggestion("Check the TOML syntax in metricmat.toml");
    }

    ErrorContext::new(MaterializeError::Other {
        message: format!("{error:#}"),
    })
}

fn create_error_context(error: &MaterializeError) -> ErrorContext {
    let ctx = ErrorContext::new(error.clone());
    match error.root_cause() {
        MaterializeError::Parse { .. } => ctx.with_suggestion(
            "Only literal keyword arguments are supported: strings, numbers, booleans, none and lists",
        ),
        MaterializeError::Syntax { .. } => ctx.with_suggestion("Check quotes, brackets and commas in the materialize call"),
        MaterializeError::InvalidArguments { .. } => ctx.with_suggestion(
            "Valid keywords are metrics, dimensions, group_by, limit, time_start, time_end, where, order_by",
        ),
        MaterializeError::UnknownDependency { .. } => ctx.with_suggestion(
            "Check the metric name for typos or run with patch mode \"lenient\" to skip unknown metrics",
        ),
        MaterializeError::Render { .. } => ctx.with_suggestion("Run the renderer command by hand to see its full output"),
        MaterializeError::CycleDetected { .. } => ctx.with_details(
            "A materialized metric depends, directly or transitively, on the model that consumes it",
        ),
        MaterializeError::CacheIo { .. } => ctx.with_suggestion("Run `metricmat cache clean` to reset the local cache"),
        _ => ctx,
    }
}
