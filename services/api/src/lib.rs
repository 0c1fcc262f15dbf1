//! services/api/src/lib.rs
//!
//! The library half of the API service. The binaries under `src/bin` wire
//! these pieces into processes.

pub mod adapters;
pub mod codes;
pub mod config;
pub mod error;
pub mod retention;
pub mod web;
