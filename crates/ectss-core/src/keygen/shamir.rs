//! Shamir secret sharing over Z_n
//!
//! Polynomial sampling and evaluation, Lagrange coefficients and secret
//! reconstruction, all mod the curve group order.

use crate::curve::{CurveParams, Uint};
use crate::error::{Error, Result};
use crate::types::PartyId;
use rand_core::CryptoRngCore;

/// Sample a random polynomial of degree t-1 with the given constant term.
pub fn random_polynomial(
    curve: &CurveParams,
    secret: Uint,
    threshold: usize,
    rng: &mut impl CryptoRngCore,
) -> Vec<Uint> {
    debug_assert!(threshold >= 1);
    let mut coefficients = Vec::with_capacity(threshold);
    coefficients.push(secret);
    for _ in 1..threshold {
        coefficients.push(curve.random_scalar(rng));
    }
    coefficients
}

/// Evaluate a polynomial at a party id (Horner's method, mod n).
pub fn evaluate_polynomial(curve: &CurveParams, coefficients: &[Uint], x: PartyId) -> Uint {
    let x = curve.scalar_reduce(&Uint::from_u64(x as u64));
    let mut result = Uint::ZERO;
    for coefficient in coefficients.iter().rev() {
        result = curve.scalar_add(&curve.scalar_mul(&result, &x), coefficient);
    }
    result
}

/// Split a secret into N shares recoverable by any t of them.
pub fn share_secret(
    curve: &CurveParams,
    secret: Uint,
    n_parties: usize,
    threshold: usize,
    rng: &mut impl CryptoRngCore,
) -> Vec<(PartyId, Uint)> {
    let coefficients = random_polynomial(curve, secret, threshold, rng);
    (1..=n_parties)
        .map(|id| (id, evaluate_polynomial(curve, &coefficients, id)))
        .collect()
}

/// Lagrange coefficient for index i over the signer-id set `ids`:
/// prod_{j in ids, j != i} (-j / (i - j)) mod n.
pub fn lagrange_coefficient(curve: &CurveParams, i: PartyId, ids: &[PartyId]) -> Result<Uint> {
    if i == 0 {
        return Err(Error::DegenerateIdSet("party id 0 is reserved".into()));
    }
    if ids.is_empty() {
        return Err(Error::DegenerateIdSet("empty signer id set".into()));
    }
    for (idx, j) in ids.iter().enumerate() {
        if *j == 0 {
            return Err(Error::DegenerateIdSet("party id 0 is reserved".into()));
        }
        if ids[..idx].contains(j) {
            return Err(Error::DegenerateIdSet(format!("duplicate id {j}")));
        }
    }

    let mut numerator = Uint::ONE;
    let mut denominator = Uint::ONE;
    for &j in ids {
        if j == i {
            continue;
        }
        let j_scalar = curve.scalar_reduce(&Uint::from_u64(j as u64));
        numerator = curve.scalar_mul(&numerator, &curve.scalar_neg(&j_scalar));
        let difference = if i > j {
            curve.scalar_reduce(&Uint::from_u64((i - j) as u64))
        } else {
            curve.scalar_neg(&curve.scalar_reduce(&Uint::from_u64((j - i) as u64)))
        };
        denominator = curve.scalar_mul(&denominator, &difference);
    }
    let inverse = curve
        .scalar_invert(&denominator)
        .ok_or_else(|| Error::DegenerateIdSet("signer ids collide mod n".into()))?;
    Ok(curve.scalar_mul(&numerator, &inverse))
}

/// Reconstruct the polynomial's constant term from t shares.
pub fn reconstruct_secret(curve: &CurveParams, shares: &[(PartyId, Uint)]) -> Result<Uint> {
    let ids: Vec<PartyId> = shares.iter().map(|(id, _)| *id).collect();
    let mut secret = Uint::ZERO;
    for (id, value) in shares {
        let lambda = lagrange_coefficient(curve, *id, &ids)?;
        secret = curve.scalar_add(&secret, &curve.scalar_mul(&lambda, value));
    }
    Ok(secret)
}
