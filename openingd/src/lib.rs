//! Channel-opening engine library: the BOLT-2 negotiation state machines,
//! key derivation, commitment construction, and the two framed protocols
//! (peer wire, supervisor control wire) they run over. `main.rs` is a thin
//! shell around [`engine::run`]; the fuzz targets and integration tests
//! exercise this crate directly.

pub mod chan_utils;
pub mod config;
pub mod engine;
pub mod error;
pub mod fundee;
pub mod funder;
pub mod keys;
pub mod msgs;
pub mod peer;
pub mod ser;
pub mod shachain;
pub mod supervisor;
pub mod validate;
