//! Player-to-player access grants.
//!
//! A grant is one-directional: when A grants B, B is no longer blocked by
//! A's claims and A's claims count toward promotion of B's placements.
//! A gains nothing over B.

pub mod list;

pub use list::AccessList;
