//! Bloomtable admin library.
//!
//! This crate provides the admin API as a library so the CLI and the
//! integration tests can reuse its repositories and diagnostics.
//!
//! # Security
//!
//! This crate holds the only write access to the catalog, site content,
//! settings and order lifecycle. Every `/api` route requires the admin
//! bearer token.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
