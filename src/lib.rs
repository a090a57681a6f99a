//! Diigo library sync
//!
//! Imports a Diigo bookmark library into a semantic graph store. This module
//! exports the job and its collaborators for the binary and for tests.

pub mod cli;
pub mod config;
pub mod db;
pub mod diigo;
pub mod error;
pub mod format;
pub mod logging;
pub mod repository;
pub mod sync;
pub mod types;
