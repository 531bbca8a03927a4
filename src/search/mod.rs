//! Local Search Engine Module
//!
//! The inverted-index catalogue of one directory node and the query
//! evaluator that runs against it.
//!
//! ## Overview
//! Every node indexes only the files volunteered by its directly-connected
//! users. Shared filenames are tokenized into word postings; a search picks
//! the smallest candidate posting list and intersects it against the
//! remaining tokens and the caller's field filters. Queries that cannot be
//! satisfied locally are scattered to peer nodes by the `federation` module.
//!
//! ## Responsibilities
//! - **Tokenization**: Splitting filenames and query clauses into
//!   normalized word tokens, minus a fixed stop-word list.
//! - **Catalogue lifecycle**: Insertion, duplicate detection, invalidation
//!   and deferred reclamation of file records.
//! - **Evaluation**: AND-matching with bitrate / sample-rate / link-speed /
//!   content-type filters and a hard result cap.
//!
//! ## Submodules
//! - **`tokenizer`**: Text processing (normalization, stop words, dedup).
//! - **`index`**: The record arena, posting tables and garbage collector.
//! - **`query`**: The search clause grammar and the evaluator.
//! - **`types`**: File records, content types and encoding class tables.

pub mod index;
pub mod query;
pub mod tokenizer;
pub mod types;
