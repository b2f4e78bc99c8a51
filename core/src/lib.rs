//! Core of goalrun: plan model, validation, scheduling and the execution engine.
//!
//! Most callers only need [`api`].

pub mod api;
pub mod config;
pub mod error;
pub mod executor;
