//! Directory Node Module
//!
//! The dispatch core of one server node.
//!
//! ## Overview
//! A node owns a local catalogue plus the bookkeeping that ties it to the
//! overlay: the user table, the connection registry and the pending-search
//! table. Decoded command frames arrive as events from the transport and are
//! dispatched one at a time to completion, so every catalogue operation is
//! atomic with respect to every other without locks. Only the connection
//! registry is shared with other tasks, and it carries nothing but outbound
//! queues.
//!
//! ## Submodules
//! - **`dispatch`**: The `DirectoryNode` state machine and command handlers.
//! - **`links`**: The shared connection registry and send/broadcast helpers.
//! - **`users`**: Local and remote users visible in the overlay.
//! - **`types`**: Connection identity, events and node configuration.

pub mod dispatch;
pub mod links;
pub mod types;
pub mod users;

#[cfg(test)]
mod tests;
