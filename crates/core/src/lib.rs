//! Bloomtable Core - Shared domain types.
//!
//! This crate provides common types used across all Bloomtable components:
//! - `storefront` - Public JSON API for the shop and restaurant menu
//! - `admin` - Administration API (catalog, content, orders, diagnostics)
//! - `cli` - Command-line tools for migrations and management
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and allows it to be used
//! anywhere.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, prices, emails, slugs, statuses, setting keys
//!   and business hours

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
