//! Core types for Bloomtable.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod hours;
pub mod id;
pub mod price;
pub mod setting;
pub mod slug;
pub mod status;

pub use email::{Email, EmailError};
pub use hours::{BusinessHours, DayHours, HoursError};
pub use id::*;
pub use price::{CurrencyCode, Price};
pub use setting::{SettingKey, SettingKeyError, default_setting, setting_keys};
pub use slug::{Slug, SlugError};
pub use status::*;
