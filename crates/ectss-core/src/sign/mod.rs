//! Threshold signing protocols
//!
//! Two interchangeable partial-signature strategies behind the
//! [`SigningProtocol`] trait:
//!
//! - [`NonceAggregated`]: signers pool their nonces behind a rendezvous
//!   barrier and the combined (r, s) verifies as a standard ECDSA
//!   signature against the group public key.
//! - [`Blinded`]: each signer blinds its private nonce so partial
//!   signatures are self-verifiable without any cross-signer
//!   synchronization; the combined signature verifies against this
//!   protocol's own equation, not a generic ECDSA verifier.
//!
//! Signer-side computations live in the [`blinded`] and [`nonce_agg`]
//! modules; the trait covers combination and final verification.

pub mod blinded;
pub mod nonce_agg;

use crate::curve::{CurveParams, Point, Uint};
use crate::error::{Error, Result};
use crate::types::{PartyId, PublicKeyMaterial};
use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};

/// Upper bound on r = 0 nonce retries before a round is given up.
pub(crate) const NONCE_RETRY_LIMIT: usize = 64;

/// One signer's contribution in the blinded protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindedPartial {
    /// Contributing signer
    pub signer: PartyId,
    /// x-coordinate of the signer's nonce point, mod p
    pub r: Uint,
    /// l = alpha*r + e*chi*sk mod n
    pub l: Uint,
    /// Blinding remainder, chosen so k = alpha*r + beta*e mod n
    pub beta: Uint,
}

/// One signer's contribution in the nonce-aggregated protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoncePartial {
    /// Contributing signer
    pub signer: PartyId,
    /// This signer's post-barrier view of r = x(kG) mod p; all honest
    /// signers of a round agree on it
    pub r: Uint,
    /// s_i = k^-1 * (e + r*sk_i) mod n
    pub s: Uint,
}

/// A partial signature of either protocol variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartialSignature {
    Blinded(BlindedPartial),
    NonceAggregated(NoncePartial),
}

impl PartialSignature {
    /// The contributing signer.
    pub fn signer(&self) -> PartyId {
        match self {
            PartialSignature::Blinded(partial) => partial.signer,
            PartialSignature::NonceAggregated(partial) => partial.signer,
        }
    }
}

/// A classic (r, s) ECDSA signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcdsaSignature {
    pub r: Uint,
    pub s: Uint,
}

/// The blinded protocol's combined signature (r, l, beta).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindedSignature {
    pub r: Uint,
    pub l: Uint,
    pub beta: Uint,
}

/// A combined threshold signature of either protocol variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThresholdSignature {
    Ecdsa(EcdsaSignature),
    Blinded(BlindedSignature),
}

/// Which signing protocol a round runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolKind {
    Blinded,
    NonceAggregated,
}

impl ProtocolKind {
    /// The protocol implementation for this kind.
    pub fn protocol(&self) -> &'static dyn SigningProtocol {
        match self {
            ProtocolKind::Blinded => &Blinded,
            ProtocolKind::NonceAggregated => &NonceAggregated,
        }
    }
}

/// Combination and final verification of one signing strategy.
pub trait SigningProtocol: Send + Sync {
    /// Combine t accepted partial signatures into a threshold signature.
    fn combine(
        &self,
        curve: &CurveParams,
        public: &PublicKeyMaterial,
        digest: Uint,
        signer_ids: &[PartyId],
        partials: &[PartialSignature],
    ) -> Result<ThresholdSignature>;

    /// Verify a combined signature against the group public key.
    fn verify(
        &self,
        curve: &CurveParams,
        group_public_key: &Point,
        digest: Uint,
        signature: &ThresholdSignature,
    ) -> Result<bool>;
}

/// The blinded strategy.
pub struct Blinded;

impl SigningProtocol for Blinded {
    fn combine(
        &self,
        curve: &CurveParams,
        public: &PublicKeyMaterial,
        digest: Uint,
        signer_ids: &[PartyId],
        partials: &[PartialSignature],
    ) -> Result<ThresholdSignature> {
        let partials = partials
            .iter()
            .map(|partial| match partial {
                PartialSignature::Blinded(partial) => Ok(partial.clone()),
                PartialSignature::NonceAggregated(_) => Err(Error::InvalidConfig(
                    "Mixed partial signature variants".into(),
                )),
            })
            .collect::<Result<Vec<_>>>()?;
        blinded::combine_partials(curve, public, digest, signer_ids, &partials)
            .map(ThresholdSignature::Blinded)
    }

    fn verify(
        &self,
        curve: &CurveParams,
        group_public_key: &Point,
        digest: Uint,
        signature: &ThresholdSignature,
    ) -> Result<bool> {
        match signature {
            ThresholdSignature::Blinded(signature) => {
                blinded::verify_signature(curve, group_public_key, digest, signature)
            }
            ThresholdSignature::Ecdsa(_) => Err(Error::InvalidConfig(
                "Signature was produced by a different protocol".into(),
            )),
        }
    }
}

/// The nonce-aggregated strategy.
pub struct NonceAggregated;

impl SigningProtocol for NonceAggregated {
    fn combine(
        &self,
        curve: &CurveParams,
        _public: &PublicKeyMaterial,
        _digest: Uint,
        signer_ids: &[PartyId],
        partials: &[PartialSignature],
    ) -> Result<ThresholdSignature> {
        let partials = partials
            .iter()
            .map(|partial| match partial {
                PartialSignature::NonceAggregated(partial) => Ok(partial.clone()),
                PartialSignature::Blinded(_) => Err(Error::InvalidConfig(
                    "Mixed partial signature variants".into(),
                )),
            })
            .collect::<Result<Vec<_>>>()?;
        nonce_agg::combine_partials(curve, signer_ids, &partials)
            .map(ThresholdSignature::Ecdsa)
    }

    fn verify(
        &self,
        curve: &CurveParams,
        group_public_key: &Point,
        digest: Uint,
        signature: &ThresholdSignature,
    ) -> Result<bool> {
        match signature {
            ThresholdSignature::Ecdsa(signature) => {
                ecdsa_verify(curve, group_public_key, digest, signature)
            }
            ThresholdSignature::Blinded(_) => Err(Error::InvalidConfig(
                "Signature was produced by a different protocol".into(),
            )),
        }
    }
}

/// Plain single-key ECDSA signing, used as the baseline the
/// nonce-aggregated protocol must be indistinguishable from.
pub fn ecdsa_sign(
    curve: &CurveParams,
    secret_key: &Uint,
    digest: Uint,
    rng: &mut impl CryptoRngCore,
) -> Result<EcdsaSignature> {
    let e = curve.scalar_reduce(&digest);
    for _ in 0..NONCE_RETRY_LIMIT {
        let k = curve.random_scalar(rng);
        let point = curve.multiply_point(&k, &curve.g)?;
        let Some(&r) = point.x() else { continue };
        if r == Uint::ZERO {
            continue;
        }
        let k_inv = curve
            .scalar_invert(&k)
            .ok_or_else(|| Error::Internal("Nonzero nonce must be invertible".into()))?;
        let r_scalar = curve.scalar_reduce(&r);
        let s = curve.scalar_mul(
            &k_inv,
            &curve.scalar_add(&e, &curve.scalar_mul(&r_scalar, secret_key)),
        );
        if s == Uint::ZERO {
            continue;
        }
        return Ok(EcdsaSignature { r, s });
    }
    Err(Error::DegenerateSignature)
}

/// Standard ECDSA verification: accept iff x(u1*G + u2*Q) mod p == r
/// with u1 = e*s^-1 and u2 = r*s^-1 mod n.
pub fn ecdsa_verify(
    curve: &CurveParams,
    public_key: &Point,
    digest: Uint,
    signature: &EcdsaSignature,
) -> Result<bool> {
    if signature.r == Uint::ZERO {
        return Ok(false);
    }
    let Some(s_inv) = curve.scalar_invert(&signature.s) else {
        return Ok(false);
    };
    let e = curve.scalar_reduce(&digest);
    let r_scalar = curve.scalar_reduce(&signature.r);

    let u1 = curve.scalar_mul(&e, &s_inv);
    let u2 = curve.scalar_mul(&r_scalar, &s_inv);
    let p1 = curve.multiply_point_or_identity(&u1, &curve.g)?;
    let p2 = curve.multiply_point_or_identity(&u2, public_key)?;
    let combined = curve.add_points(&p1, &p2)?;
    Ok(combined.x() == Some(&signature.r))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn ecdsa_round_trip() {
        let curve = CurveParams::secp256k1();
        let mut rng = ChaCha20Rng::seed_from_u64(21);
        let secret_key = curve.random_scalar(&mut rng);
        let public_key = curve.multiply_point(&secret_key, &curve.g).unwrap();
        let digest = Uint::from_u64(12345);

        let signature = ecdsa_sign(&curve, &secret_key, digest, &mut rng).unwrap();
        assert!(ecdsa_verify(&curve, &public_key, digest, &signature).unwrap());
        assert!(!ecdsa_verify(&curve, &public_key, Uint::from_u64(12346), &signature).unwrap());
    }

    #[test]
    fn ecdsa_rejects_wrong_key() {
        let curve = CurveParams::secp256k1();
        let mut rng = ChaCha20Rng::seed_from_u64(22);
        let secret_key = curve.random_scalar(&mut rng);
        let other_key = curve.random_scalar(&mut rng);
        let other_public = curve.multiply_point(&other_key, &curve.g).unwrap();
        let digest = Uint::from_u64(99);

        let signature = ecdsa_sign(&curve, &secret_key, digest, &mut rng).unwrap();
        assert!(!ecdsa_verify(&curve, &other_public, digest, &signature).unwrap());
    }

    #[test]
    fn zero_components_never_verify() {
        let curve = CurveParams::secp256k1();
        let mut rng = ChaCha20Rng::seed_from_u64(23);
        let secret_key = curve.random_scalar(&mut rng);
        let public_key = curve.multiply_point(&secret_key, &curve.g).unwrap();
        let digest = Uint::from_u64(7);

        let zero_r = EcdsaSignature {
            r: Uint::ZERO,
            s: Uint::ONE,
        };
        let zero_s = EcdsaSignature {
            r: Uint::ONE,
            s: Uint::ZERO,
        };
        assert!(!ecdsa_verify(&curve, &public_key, digest, &zero_r).unwrap());
        assert!(!ecdsa_verify(&curve, &public_key, digest, &zero_s).unwrap());
    }
}
