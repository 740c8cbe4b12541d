//! Claim protection: geometry, statement builders, the registry, and the
//! guard that hosts call before letting an action through.

pub mod geometry;
pub mod guard;
mod query;
pub mod registry;

pub use geometry::{BoundingBox, Coordinate};
pub use guard::{ActionGuard, ActionKind, Verdict};
pub use registry::{Claim, Placement, ProtectionRegistry};
