//! Distributed Search Module
//!
//! Bookkeeping for scatter/gather searches across the overlay.
//!
//! ## Overview
//! A search that cannot be satisfied from the local catalogue is scattered
//! to every peer link (except the one it arrived on). Each peer evaluates
//! independently and streams tagged partial results followed by an
//! end-of-search marker. The coordinator correlates those messages by
//! search identifier and decides when the search is complete.
//!
//! ## Completion accounting
//! A pending search expects one end-of-search reply per peer it was
//! scattered to. A peer that disconnects mid-search counts as an implicit
//! empty reply: its slot is subtracted from the expected count and any
//! search thereby satisfied finalizes immediately. There is deliberately no
//! timeout; a peer that stalls without disconnecting leaves the search
//! pending forever (known gap, inherited behavior).
//!
//! ## Submodules
//! - **`coordinator`**: The pending-search table and its transitions.
//! - **`types`**: Pending-search records and identifier generation.

pub mod coordinator;
pub mod types;

#[cfg(test)]
mod tests;
