//! Conveyor Core
//!
//! Core types and rules for the Conveyor pipeline editor.
//!
//! This crate contains:
//! - Domain types: the pipeline-under-edit (stages, key/value lists) and run records
//! - DTOs: the wire payloads exchanged with the pipeline server
//! - Validation of pipeline definitions before submission
//! - Run history aggregation and time formatting
//! - The single-slot notification scheduler
//!
//! Note: Nothing here talks to the network; see `conveyor-client`.

pub mod domain;
pub mod dto;
pub mod error;
pub mod format;
pub mod history;
pub mod listing;
pub mod notification;
pub mod validate;

pub use error::{ModelError, ValidationError};
