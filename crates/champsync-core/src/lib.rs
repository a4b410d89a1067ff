//! champsync core: change-aware concurrent sync of wiki champion assets.
//!
//! A run loads the fingerprint store, hands the manifest to `engine::SyncEngine`,
//! and saves the store back. Everything network-facing goes through
//! `transport::Transport`.

pub mod checksum;
pub mod config;
pub mod control;
pub mod engine;
pub mod fingerprint;
pub mod logging;
pub mod manifest;
pub mod report;
pub mod retry;
pub mod storage;
pub mod transport;
