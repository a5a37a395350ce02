//! Storage and read-time normalization of feature flag records.
//!
//! Records written before per-environment settings existed are kept as they
//! are on disk and upgraded in memory by [`normalize::Normalizer`] whenever the
//! [`db::Database`] returns them.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod normalize;
