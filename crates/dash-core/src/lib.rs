//! Core types and trait definitions for the dashboard backend.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it: the storage backend implements
//! [`store::DashboardStore`], the service adapters implement the traits in
//! [`service`], and the API is written against both.

// Native `async fn` in traits (stabilised in Rust 1.75); the store trait spells
// out `Send` futures explicitly.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod model;
pub mod query;
pub mod service;
pub mod store;

pub use error::{Entity, Error, Result, ServiceError};
