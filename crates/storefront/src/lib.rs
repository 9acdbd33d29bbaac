//! E-Store storefront library.
//!
//! Carts, checkout and sessions behind role-based authorization. The binary
//! in `main.rs` wires this to Postgres; tests drive it against in-memory
//! stores.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
