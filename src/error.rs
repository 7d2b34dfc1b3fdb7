//! Translator error types.

use datalog_ast::SrcLocation;
use thiserror::Error;

/// Fatal translation faults. Any of these aborts `translate_unit` without
/// producing a partial IR program.
#[derive(Error, Debug)]
pub enum TranslatorError {
    /// A value expression referenced a variable with no binding point
    /// recorded in the clause's value index.
    #[error("ungrounded variable '{variable}' at {location}")]
    UngroundedVariable {
        variable: String,
        location: SrcLocation,
    },

    /// An operator-nesting entry was neither an atom nor a record.
    #[error("unsupported node in scan nesting at {location}")]
    UnsupportedNodeInScanNesting { location: SrcLocation },

    /// An aggregate body contained more than one atom.
    #[error("aggregate body with more than one atom at {location}")]
    AggregateBodyMalformed { location: SrcLocation },

    /// A user-defined functor has no matching declaration on the program.
    #[error("unknown functor '@{name}' at {location}")]
    UnknownFunctor { name: String, location: SrcLocation },

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] figment::Error),
}

pub type Result<T> = std::result::Result<T, TranslatorError>;
