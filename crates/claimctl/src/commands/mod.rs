//! Command implementations for claimctl.

pub mod access;
pub mod check;
pub mod claims;
