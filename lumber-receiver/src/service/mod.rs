//! Service Module
//!
//! Business logic layer for the receiver.

pub mod forwarding;

pub use forwarding::{BatchLimits, ForwardError, ForwardingEndpoint};
