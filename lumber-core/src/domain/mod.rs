//! Core domain types
//!
//! This module contains the structures shared by the producing side (which
//! builds batches from them) and the receiving side (which hands them to the
//! local logging pipeline after decoding).

pub mod log;
