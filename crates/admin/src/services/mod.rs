//! Business logic services for admin.
//!
//! - `debounce` - per-key quiet-period scheduling for setting drafts
//! - `diagnostics` - database self-test

pub mod debounce;
pub mod diagnostics;

pub use debounce::Debouncer;
pub use diagnostics::{DiagnosticCheck, DiagnosticReport, DiagnosticResult, DiagnosticRunner};
