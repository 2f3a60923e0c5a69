//! Write-Path Guard
//!
//! Enforcement between the application's database layer and storage:
//! classify the SQL, then reject writes on replicas and during
//! split-brain, before anything executes.

mod errors;
mod write_guard;

pub use errors::{GuardError, GuardErrorKind, GuardResult};
pub use write_guard::WriteGuard;
