//! Shared utility modules used across Blockpost components.

pub mod varint;
