//! Core types for pixelhub: canvas store, wire protocol, config, and errors.

pub mod canvas;
pub mod config;
pub mod error;
pub mod protocol;
