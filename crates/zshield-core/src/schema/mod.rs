//! Serialized schema/data contracts.

/// Network consensus parameters and builder configuration.
pub mod config;
