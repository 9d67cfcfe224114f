//! hubcache - Crash-safe shared module cache
//!
//! Resolves module handles to local directories. URL handles are downloaded
//! once into a cache directory that any number of processes, on one host or
//! many sharing a filesystem, may populate concurrently.

pub mod cache;
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod resolver;
pub mod storage;
pub mod ui;

pub use error::{HubError, HubResult};
