//! services/api/src/lib.rs
//!
//! Library crate for the hospital chat API service.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
