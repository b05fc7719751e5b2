#![allow(non_snake_case)]

// Declare the modules that form the library's public API.
// The document write services embed `producer`; the worker binary drives
// `worker` and `sweep`.
pub mod config;
pub mod documents;
pub mod error;
pub mod language;
pub mod localized;
pub mod metrics;
pub mod producer;
pub mod provider;
pub mod queue;
pub mod store;
pub mod sweep;
pub mod task;
pub mod worker;
