//! Request extractors.

pub mod actor;
