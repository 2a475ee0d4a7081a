// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Rejections raised while applying a lifecycle command.

use bidflow_domain::DomainError;

/// Why `apply` refused a lifecycle command.
///
/// A rejected command never produces a new state or an audit event; the
/// caller keeps the state it passed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// The command broke a bid rule: an illegal status move, a locked bid,
    /// an unbalanced sample grid, incomplete responses or an unusable
    /// final CPI.
    DomainViolation(DomainError),
}

impl CoreError {
    /// The bid rule that rejected the command.
    #[must_use]
    pub const fn domain_error(&self) -> &DomainError {
        match self {
            Self::DomainViolation(err) => err,
        }
    }
}

impl std::fmt::Display for CoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DomainViolation(err) => write!(f, "Lifecycle command rejected: {err}"),
        }
    }
}

impl std::error::Error for CoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.domain_error())
    }
}

impl From<DomainError> for CoreError {
    fn from(err: DomainError) -> Self {
        Self::DomainViolation(err)
    }
}
