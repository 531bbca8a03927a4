//! Error taxonomy for catalogue and protocol operations.
//!
//! Every variant renders as the error line sent back to a directly-connected
//! client; peers never receive these (malformed peer relays are logged and
//! dropped).

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// Bad clause structure in a search request.
    #[error("invalid search request")]
    MalformedSearch,

    /// A command carried the wrong number of fields.
    #[error("wrong number of fields")]
    WrongFieldCount,

    /// A quoted field was never closed.
    #[error("unterminated quote")]
    UnterminatedQuote,

    /// A range clause was not followed by a comparison and a value.
    #[error("not enough parameters")]
    NotEnoughParameters,

    #[error("\"{0}\" is an unknown comparison")]
    UnknownComparison(String),

    #[error("{0} is an invalid type")]
    InvalidType(String),

    /// The owner already shares a file with this basename.
    #[error("duplicate file")]
    DuplicateFile,

    #[error("you may only share {0} files")]
    ShareLimit(usize),

    #[error("{0} is not currently online")]
    NoSuchUser(String),

    #[error("nickname already in use")]
    NickTaken,

    #[error("invalid nickname")]
    InvalidNick,

    #[error("you are not logged in")]
    NotLoggedIn,
}

pub type Result<T> = std::result::Result<T, DirectoryError>;
