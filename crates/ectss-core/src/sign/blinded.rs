//! Blinded partial signatures
//!
//! Each signer draws a private nonce k and a blinding scalar alpha, then
//! publishes (r, l, beta) with
//!
//!   r    = x(kG) mod p
//!   beta = (k - alpha*r) * e^-1 mod n     (so k = alpha*r + beta*e)
//!   l    = alpha*r + e*chi*sk mod n
//!
//! where chi is the signer's Lagrange coefficient over the active id set.
//! A partial is self-verifiable: gamma = l + beta*e recovers the nonce
//! point as gamma*G - (e*chi)*PK, whose x-coordinate must equal r. No
//! cross-signer synchronization is needed because every nonce stays
//! private to its signer.
//!
//! Combination verifies every partial (rejecting the whole round on the
//! first failure), sums l and beta mod n, and takes r from the aggregate
//! of the recovered nonce points. The combined signature verifies against
//! this protocol's own equation only; it is deliberately not
//! interoperable with a generic ECDSA verifier, and its security against
//! malicious signers beyond the per-signer check is not established.

use super::{BlindedPartial, BlindedSignature, NONCE_RETRY_LIMIT};
use crate::curve::{CurveParams, Point, Uint};
use crate::error::{Error, Result};
use crate::keygen::shamir::lagrange_coefficient;
use crate::types::{PartyId, PublicKeyMaterial};
use rand_core::CryptoRngCore;
use tracing::debug;

/// Produce one signer's blinded partial signature.
pub fn sign_partial(
    curve: &CurveParams,
    digest: Uint,
    signer: PartyId,
    secret_share: &Uint,
    signer_ids: &[PartyId],
    rng: &mut impl CryptoRngCore,
) -> Result<BlindedPartial> {
    let e = curve.scalar_reduce(&digest);
    if e == Uint::ZERO {
        return Err(Error::InvalidConfig(
            "Message digest reduces to zero".into(),
        ));
    }
    let e_inv = curve
        .scalar_invert(&e)
        .ok_or_else(|| Error::Internal("Nonzero digest must be invertible".into()))?;
    let chi = lagrange_coefficient(curve, signer, signer_ids)?;

    for attempt in 0..NONCE_RETRY_LIMIT {
        let k = curve.random_scalar(rng);
        let nonce_point = curve.multiply_point(&k, &curve.g)?;
        let Some(&r) = nonce_point.x() else { continue };
        if r == Uint::ZERO {
            debug!(signer, attempt, "Retrying zero r");
            continue;
        }
        let r_scalar = curve.scalar_reduce(&r);

        let alpha = curve.random_scalar(rng);
        let alpha_r = curve.scalar_mul(&alpha, &r_scalar);
        let beta = curve.scalar_mul(&curve.scalar_sub(&k, &alpha_r), &e_inv);

        // The scheme's core invariant: the blinding pair recombines to
        // exactly the nonce.
        debug_assert_eq!(
            k,
            curve.scalar_add(&alpha_r, &curve.scalar_mul(&beta, &e))
        );

        let l = curve.scalar_add(
            &alpha_r,
            &curve.scalar_mul(&curve.scalar_mul(&e, &chi), secret_share),
        );
        return Ok(BlindedPartial {
            signer,
            r,
            l,
            beta,
        });
    }
    Err(Error::DegenerateSignature)
}

/// Verify one partial signature and recover the signer's nonce point
/// V = gamma*G - (e*chi)*PK. Fails with
/// [`Error::InvalidPartialSignature`] naming the signer if x(V) != r.
pub fn verify_partial(
    curve: &CurveParams,
    public_share: &Point,
    digest: Uint,
    signer_ids: &[PartyId],
    partial: &BlindedPartial,
) -> Result<Point> {
    let e = curve.scalar_reduce(&digest);
    let chi = lagrange_coefficient(curve, partial.signer, signer_ids)?;

    let gamma = curve.scalar_add(
        &curve.scalar_reduce(&partial.l),
        &curve.scalar_mul(&partial.beta, &e),
    );
    let gamma_point = curve.multiply_point_or_identity(&gamma, &curve.g)?;
    let masked_key = curve.multiply_point_or_identity(&curve.scalar_mul(&e, &chi), public_share)?;
    let nonce_point = curve.subtract_points(&gamma_point, &masked_key)?;

    if nonce_point.x() == Some(&partial.r) && partial.r != Uint::ZERO {
        Ok(nonce_point)
    } else {
        Err(Error::InvalidPartialSignature(partial.signer))
    }
}

/// Combine t accepted partial signatures. Every partial is verified
/// first; a single failure rejects the whole round rather than dropping
/// the offending contributor.
pub fn combine_partials(
    curve: &CurveParams,
    public: &PublicKeyMaterial,
    digest: Uint,
    signer_ids: &[PartyId],
    partials: &[BlindedPartial],
) -> Result<BlindedSignature> {
    if signer_ids.is_empty() {
        return Err(Error::DegenerateIdSet("empty signer id set".into()));
    }
    if partials.len() != signer_ids.len() {
        return Err(Error::ThresholdNotMet {
            required: signer_ids.len(),
            actual: partials.len(),
        });
    }

    let mut aggregate_nonce = Point::Identity;
    let mut l = Uint::ZERO;
    let mut beta = Uint::ZERO;
    for (idx, partial) in partials.iter().enumerate() {
        if !signer_ids.contains(&partial.signer)
            || partials[..idx].iter().any(|p| p.signer == partial.signer)
        {
            return Err(Error::DegenerateIdSet(format!(
                "unexpected contribution from signer {}",
                partial.signer
            )));
        }
        let public_share = public.public_share(partial.signer).ok_or_else(|| {
            Error::InvalidConfig(format!("No public key for signer {}", partial.signer))
        })?;
        let nonce_point = verify_partial(curve, public_share, digest, signer_ids, partial)?;

        aggregate_nonce = curve.add_points(&aggregate_nonce, &nonce_point)?;
        l = curve.scalar_add(&l, &curve.scalar_reduce(&partial.l));
        beta = curve.scalar_add(&beta, &curve.scalar_reduce(&partial.beta));
    }

    let Some(&r) = aggregate_nonce.x() else {
        return Err(Error::DegenerateSignature);
    };
    if r == Uint::ZERO {
        return Err(Error::DegenerateSignature);
    }
    Ok(BlindedSignature { r, l, beta })
}

/// Verify a combined signature against the group public key:
/// gamma = l + beta*e mod n, accept iff x(gamma*G - e*Q) mod p == r.
pub fn verify_signature(
    curve: &CurveParams,
    group_public_key: &Point,
    digest: Uint,
    signature: &BlindedSignature,
) -> Result<bool> {
    if signature.r == Uint::ZERO {
        return Ok(false);
    }
    let e = curve.scalar_reduce(&digest);
    let gamma = curve.scalar_add(
        &curve.scalar_reduce(&signature.l),
        &curve.scalar_mul(&signature.beta, &e),
    );
    let gamma_point = curve.multiply_point_or_identity(&gamma, &curve.g)?;
    let masked_key = curve.multiply_point_or_identity(&e, group_public_key)?;
    let combined = curve.subtract_points(&gamma_point, &masked_key)?;
    Ok(combined.x() == Some(&signature.r))
}
