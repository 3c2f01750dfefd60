// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-pass run statistics.

use serde::Serialize;

/// Counters aggregated over one sync pass.
///
/// Ephemeral: reported to the caller when the pass ends, never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Accounts whose pass completed (checkpoint advanced)
    pub accounts: u32,
    /// Activity records created
    pub created: u32,
    /// Activity records enriched with detail data
    pub updated: u32,
    /// Record- and account-level errors
    pub errors: u32,
}

impl RunStats {
    /// Whether any error was recorded during the pass.
    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }
}
