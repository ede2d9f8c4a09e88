//! Bus description model, DBC parser and validator
//!
//! This module contains the parser for the restricted DBC dialect and the
//! validated model it produces.

pub mod database;
pub mod dbc;
pub mod fields;
pub mod validate;

// Re-export key types for convenience
pub use database::{
    Config, DatabaseStats, Endianness, Message, Node, Signal, SignalTopic, FRAME_BITS, MAX_DLC,
};
pub use dbc::{classify_lines, parse, parse_file, parse_reader, RecordGroup};
pub use validate::BitLayout;
