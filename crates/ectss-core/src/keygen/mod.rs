//! Distributed key generation
//!
//! Joint-Feldman DKG on top of Shamir secret sharing: N dealers each share
//! a random secret, recipients verify every share against the dealers'
//! polynomial commitments, and the per-party aggregates form a (t, N)
//! sharing of the never-materialized group secret key.

mod dkg;
pub mod shamir;

pub use dkg::{run_dkg, verify_share};
