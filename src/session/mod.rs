//! # Session Layer
//!
//! Everything that lives for exactly one live connection: the reader-owned
//! session state, the serialized writer over the duplex channel, the
//! outstanding-work tracker that gates finalization, and the per-utterance
//! analysis pipeline.
//!
//! ## Ownership Rules:
//! - `SessionState` is mutated only by the connection's reader task.
//! - Pipeline tasks receive owned copies of utterance bytes plus cloned
//!   handles to the writer and tracker; they never touch reader state.
//! - All writes to the client go through `ResultWriter`, which holds the
//!   session mutex across each full message send.

pub mod pipeline;  // Per-utterance analysis fan-out
pub mod state;     // Reader-owned per-connection state
pub mod tracker;   // Outstanding pipeline counter with an idle barrier
pub mod writer;    // Serialized outbound channel writer
