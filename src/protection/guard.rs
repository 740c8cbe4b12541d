//! Call-site adapter between game actions and the registry.
//!
//! The host maps each event to an [`ActionKind`]; the guard picks the radius,
//! runs the check and reduces the answer to a [`Verdict`]. A check that
//! fails in storage denies the action, so claims stay protected while the
//! database is unreachable.

use serde::{Deserialize, Serialize};

use super::geometry::Coordinate;
use super::registry::ProtectionRegistry;
use crate::config::ProtectionSettings;
use crate::storage::StorageError;
use crate::Identity;

/// Severity class of an action, which decides how far claims reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Unattributed world effects: fluid flow, fire spread, growth.
    Natural,
    /// Breaking or interacting with blocks.
    Read,
    /// Placing blocks.
    Write,
}

impl ActionKind {
    pub fn radius(self, settings: &ProtectionSettings) -> i32 {
        match self {
            Self::Natural => settings.natural_radius,
            Self::Read => settings.read_radius,
            Self::Write => settings.write_radius,
        }
    }

    /// Stable lowercase name, used in logs and metrics.
    pub fn label(self) -> &'static str {
        match self {
            Self::Natural => "natural",
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

impl std::str::FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "natural" => Ok(Self::Natural),
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            _ => Err(format!("unknown action kind: {s}")),
        }
    }
}

/// Outcome of authorizing an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "lowercase")]
pub enum Verdict {
    Allowed,
    /// A claim of `owner` is in range.
    Blocked { owner: Identity },
    /// The check could not be completed.
    Unavailable,
}

impl Verdict {
    fn from_check(kind: ActionKind, result: Result<Option<Identity>, StorageError>) -> Self {
        match result {
            Ok(None) => Self::Allowed,
            Ok(Some(owner)) => Self::Blocked { owner },
            Err(e) => {
                tracing::warn!(
                    kind = kind.label(),
                    error = %e,
                    "Ownership check failed, denying action"
                );
                Self::Unavailable
            }
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    /// Anything but [`Verdict::Allowed`] denies.
    pub fn is_denied(&self) -> bool {
        !self.is_allowed()
    }

    /// The owner to report to the actor, if a claim blocked the action.
    pub fn owner(&self) -> Option<Identity> {
        match self {
            Self::Blocked { owner } => Some(*owner),
            Self::Allowed | Self::Unavailable => None,
        }
    }
}

/// Fail-closed authorization on top of [`ProtectionRegistry`].
#[derive(Clone)]
pub struct ActionGuard {
    registry: ProtectionRegistry,
}

impl ActionGuard {
    pub fn new(registry: ProtectionRegistry) -> Self {
        Self { registry }
    }

    /// Authorize `actor` (or a natural effect, when `None`) to perform an
    /// action of `kind` at `coordinate`.
    pub async fn authorize(
        &self,
        kind: ActionKind,
        coordinate: Coordinate,
        actor: Option<Identity>,
    ) -> Verdict {
        let result = self.registry.check_owner_for(kind, coordinate, actor).await;
        Verdict::from_check(kind, result)
    }

    /// Blocking variant of [`authorize`](Self::authorize) for plain threads.
    ///
    /// # Panics
    ///
    /// Panics when called from inside an async runtime; use
    /// [`authorize`](Self::authorize) there.
    pub fn authorize_blocking(
        &self,
        kind: ActionKind,
        coordinate: Coordinate,
        actor: Option<Identity>,
    ) -> Verdict {
        let result = self.registry.check_owner_for(kind, coordinate, actor).wait();
        Verdict::from_check(kind, result)
    }
}
