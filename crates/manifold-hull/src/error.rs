//! Error types for manifold operations.
//!
//! Only programming-contract violations and I/O failures surface here.
//! Geometric degeneracy (coincident, colinear, coplanar input) is an
//! expected data-dependent outcome and is reported through
//! [`Degeneracy`](crate::Degeneracy) predicates instead — see the crate
//! docs for the distinction.

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias for manifold operations.
pub type HullResult<T> = Result<T, HullError>;

/// Errors raised by manifold serialization.
#[derive(Debug, Error, Diagnostic)]
pub enum HullError {
    /// A marshalled manifold referenced an id that was never declared.
    ///
    /// Raised during [`import_data`](crate::Manifold::import_data) when
    /// an edge or face row names a vertex that has no point entry.
    #[error("marshalled data references unknown {kind} id {id}")]
    #[diagnostic(code(hull::unknown_id))]
    UnknownId {
        /// Entity kind of the missing reference.
        kind: &'static str,
        /// The id that failed to resolve.
        id: i64,
    },

    /// The marshalled text form could not be parsed.
    #[error("failed to parse manifold text at line {line}: {reason}")]
    #[diagnostic(code(hull::parse))]
    Parse {
        /// 1-based line number of the offending input line.
        line: usize,
        /// What was wrong with it.
        reason: String,
    },

    /// An underlying I/O operation failed.
    #[error("I/O error")]
    #[diagnostic(code(hull::io))]
    Io(#[from] std::io::Error),
}
