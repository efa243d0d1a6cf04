//! Data Transfer Objects
//!
//! Compact representations optimized for network transfer. A batch refers to
//! its strings by ordinal and has to be expanded by the codec before use.

pub mod batch;
