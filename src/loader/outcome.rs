//! The three-way result of resolving one logical name.

#![allow(missing_docs)]

use serde::Serialize;

/// What happened when a loading context resolved one logical name.
///
/// Infrastructure failures are not represented here; they travel as
/// [`VciError`](crate::core::errors::VciError) and abort the scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LoadOutcome {
    /// The artifact (and everything it needed at load time) resolved.
    Loaded,
    /// The artifact's binary layout is invalid. Reportable.
    Corrupt { reason: String },
    /// Some other name needed at load time is not in this root. Suppressed.
    UnresolvedReference { missing: String },
}

impl LoadOutcome {
    #[must_use]
    pub fn corrupt(reason: impl Into<String>) -> Self {
        Self::Corrupt {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn unresolved(missing: impl Into<String>) -> Self {
        Self::UnresolvedReference {
            missing: missing.into(),
        }
    }

    #[must_use]
    pub const fn is_corrupt(&self) -> bool {
        matches!(self, Self::Corrupt { .. })
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Loaded => "loaded",
            Self::Corrupt { .. } => "corrupt",
            Self::UnresolvedReference { .. } => "unresolved_reference",
        }
    }
}
