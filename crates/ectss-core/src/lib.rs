//! # ECTSS Core
//!
//! Threshold ECDSA signing over a caller-supplied short-Weierstrass
//! curve: N parties hold Shamir shares of a signing key such that any t
//! of them can cooperatively produce a signature, while fewer than t
//! learn nothing.
//!
//! This crate provides the building blocks for:
//! - Hand-rolled curve group arithmetic ([`curve`])
//! - Joint-Feldman verifiable distributed key generation ([`keygen`])
//! - Two partial-signature protocols with Lagrange-weighted combination
//!   ([`sign`])
//! - A signer-pool coordinator that drives signing rounds over
//!   cooperating local tasks ([`coordinator`])
//!
//! ## Example
//!
//! ```rust,ignore
//! use ectss_core::{keygen, Coordinator, CurveParams, ProtocolConfig, ProtocolKind};
//!
//! let curve = CurveParams::secp256k1();
//! let config = ProtocolConfig::new(10, 7)?;
//! let output = keygen::run_dkg(&curve, &config, &mut rng)?;
//!
//! let mut coordinator = Coordinator::spawn(curve, output)?;
//! let signature = coordinator
//!     .sign(ProtocolKind::NonceAggregated, digest, &[1, 2, 3, 5, 6, 8, 10])
//!     .await?;
//! ```

pub mod coordinator;
pub mod curve;
pub mod error;
pub mod keygen;
pub mod sign;
pub mod types;

pub use coordinator::{Coordinator, RoundRequest};
pub use curve::{CurveParams, Point, Uint};
pub use error::{Error, Result};
pub use sign::{
    BlindedSignature, EcdsaSignature, PartialSignature, ProtocolKind, SigningProtocol,
    ThresholdSignature,
};
pub use types::{DkgOutput, KeyShare, PartyId, ProtocolConfig, PublicKeyMaterial};

/// Protocol version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
