//! Write-Path Guard
//!
//! Intercepts statement execution. For anything that would mutate state
//! the guard checks, in an order that must not vary:
//!
//! 1. split-brain (when a detector is wired),
//! 2. role,
//! 3. only then execution.
//!
//! Scripts are all-or-nothing: every statement is classified first, and a
//! single write statement guards the whole script before anything runs.
//!
//! Detection failures here are fail-closed: refusing a write is cheaper
//! than diverging two primaries. Read statements bypass both checks.

use std::sync::Arc;

use crate::cluster::SplitBrainDetector;
use crate::role::{RoleCheck, RoleResolver};
use crate::sql::{is_write, split_statements};

use super::errors::{GuardError, GuardResult};

/// Guard in front of the database layer.
pub struct WriteGuard {
    role: Arc<RoleResolver>,
    detector: Option<Arc<SplitBrainDetector>>,
}

impl WriteGuard {
    /// Guard with the role check only.
    pub fn new(role: Arc<RoleResolver>) -> Self {
        Self {
            role,
            detector: None,
        }
    }

    /// Guard that also checks for split-brain before the role check.
    pub fn with_detector(role: Arc<RoleResolver>, detector: Arc<SplitBrainDetector>) -> Self {
        Self {
            role,
            detector: Some(detector),
        }
    }

    /// Check a single statement. Reads pass without further checks.
    pub fn check_statement(&self, sql: &str) -> GuardResult<()> {
        if !is_write(sql) {
            return Ok(());
        }
        self.enforce()
    }

    /// Check a statement executed with a batch of parameter sets. The
    /// statement text decides; parameters cannot change a read into a
    /// write.
    pub fn check_batch(&self, sql: &str) -> GuardResult<()> {
        self.check_statement(sql)
    }

    /// Check a multi-statement script. If any statement is a write the
    /// whole script is guarded; no statement may run before this returns.
    pub fn check_script(&self, script: &str) -> GuardResult<()> {
        let has_write = split_statements(script).iter().any(|stmt| is_write(stmt));
        if !has_write {
            return Ok(());
        }
        self.enforce()
    }

    /// Check then execute a single statement.
    pub fn run_statement<T>(&self, sql: &str, execute: impl FnOnce() -> T) -> GuardResult<T> {
        self.check_statement(sql)?;
        Ok(execute())
    }

    /// Check then execute a script.
    pub fn run_script<T>(&self, script: &str, execute: impl FnOnce() -> T) -> GuardResult<T> {
        self.check_script(script)?;
        Ok(execute())
    }

    /// Split-brain first, then role. Both must hold before any execution.
    fn enforce(&self) -> GuardResult<()> {
        if let Some(detector) = &self.detector {
            let status = detector.status().map_err(GuardError::detection)?;
            if status.is_split_brain {
                return Err(GuardError::split_brain(&status.leaders));
            }
        }

        match self.role.check() {
            RoleCheck::Primary => Ok(()),
            RoleCheck::Replica | RoleCheck::Unknown => Err(GuardError::not_primary()),
        }
    }
}
