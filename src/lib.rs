//! Federated Directory Service Library
//!
//! This library crate defines the core modules of one directory node in a
//! peer-to-peer file-sharing overlay. It serves as the foundation for the
//! binary executable (`main.rs`).
//!
//! ## Architecture Modules
//! The system is composed of six loosely coupled subsystems:
//!
//! - **`search`**: The local inverted index. Shared filenames are tokenized
//!   into posting lists; the query evaluator AND-matches tokens and field
//!   filters against the smallest candidate list, and a periodic garbage
//!   collector reclaims invalidated entries.
//! - **`federation`**: Scatter/gather bookkeeping. Searches that the local
//!   catalogue cannot satisfy fan out to peer nodes; partial results and
//!   end markers are correlated by search identifier until completion.
//! - **`node`**: The dispatch core. One task owns all catalogue state and
//!   processes decoded command frames to completion, one at a time.
//! - **`protocol`**: Frame encoding and the space-separated/quoted argument
//!   grammar shared by every command.
//! - **`transport`**: The TCP layer: framing, per-connection reader/writer
//!   tasks and peer dialing.
//! - **`library`**: Optional file-backed snapshot of local users' shares,
//!   reapplied when they log back in.

pub mod error;
pub mod federation;
pub mod library;
pub mod node;
pub mod protocol;
pub mod search;
pub mod transport;
