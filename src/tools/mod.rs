//! Helper structures used by the codec modules.

pub mod bit_io;
pub mod dictionary;
pub mod recency;
