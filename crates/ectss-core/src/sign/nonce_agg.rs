//! Nonce-aggregated, ECDSA-shaped partial signatures
//!
//! The t active signers of a round pool their nonces: k = sum k_i mod n
//! (a deliberate plain sum, kept for compatibility with the combined
//! signature's test vectors rather than any published threshold-ECDSA
//! design). Every signer independently recomputes k from the shared
//! collection once all t nonces are published, derives r = x(kG) mod p,
//! and contributes s_i = k^-1 * (e + r*sk_i) mod n. The combined
//! s = sum lambda_i * s_i verifies as a standard ECDSA signature against
//! the group public key.
//!
//! The protocol only works if no signer computes from a partial nonce
//! set, which is why the coordinator runs a rendezvous barrier between
//! nonce publication and partial-signature computation. Each partial
//! carries its signer's view of r; combination rejects the round on any
//! disagreement.

use super::{EcdsaSignature, NoncePartial};
use crate::curve::{CurveParams, Uint};
use crate::error::{Error, Result};
use crate::keygen::shamir::lagrange_coefficient;
use crate::types::PartyId;

/// Sum the published nonces mod n.
pub fn aggregate_nonces(curve: &CurveParams, nonces: &[(PartyId, Uint)]) -> Uint {
    let mut aggregate = Uint::ZERO;
    for (_, nonce) in nonces {
        aggregate = curve.scalar_add(&aggregate, &curve.scalar_reduce(nonce));
    }
    aggregate
}

/// Produce one signer's partial signature from the aggregate nonce.
///
/// Fails with [`Error::DegenerateSignature`] if the aggregate nonce or
/// the resulting r is zero; the whole round must then be retried with
/// fresh nonces.
pub fn sign_partial(
    curve: &CurveParams,
    digest: Uint,
    signer: PartyId,
    secret_share: &Uint,
    aggregate_nonce: &Uint,
) -> Result<NoncePartial> {
    let k = curve.scalar_reduce(aggregate_nonce);
    if k == Uint::ZERO {
        return Err(Error::DegenerateSignature);
    }
    let nonce_point = curve.multiply_point(&k, &curve.g)?;
    let Some(&r) = nonce_point.x() else {
        return Err(Error::DegenerateSignature);
    };
    if r == Uint::ZERO {
        return Err(Error::DegenerateSignature);
    }

    let e = curve.scalar_reduce(&digest);
    let k_inv = curve
        .scalar_invert(&k)
        .ok_or_else(|| Error::Internal("Nonzero nonce must be invertible".into()))?;
    let r_scalar = curve.scalar_reduce(&r);
    let s = curve.scalar_mul(
        &k_inv,
        &curve.scalar_add(&e, &curve.scalar_mul(&r_scalar, secret_share)),
    );
    Ok(NoncePartial { signer, r, s })
}

/// Combine the partial signatures with Lagrange weights over the active
/// signer-id set: s = sum lambda_i * s_i mod n, r taken unchanged from
/// the signers' shared view.
pub fn combine_partials(
    curve: &CurveParams,
    signer_ids: &[PartyId],
    partials: &[NoncePartial],
) -> Result<EcdsaSignature> {
    if signer_ids.is_empty() {
        return Err(Error::DegenerateIdSet("empty signer id set".into()));
    }
    if partials.len() != signer_ids.len() {
        return Err(Error::ThresholdNotMet {
            required: signer_ids.len(),
            actual: partials.len(),
        });
    }

    let r = partials[0].r;
    let mut s = Uint::ZERO;
    for (idx, partial) in partials.iter().enumerate() {
        if !signer_ids.contains(&partial.signer)
            || partials[..idx].iter().any(|p| p.signer == partial.signer)
        {
            return Err(Error::DegenerateIdSet(format!(
                "unexpected contribution from signer {}",
                partial.signer
            )));
        }
        // A diverging r means this signer aggregated a partial nonce set.
        if partial.r != r {
            return Err(Error::InvalidPartialSignature(partial.signer));
        }
        let lambda = lagrange_coefficient(curve, partial.signer, signer_ids)?;
        s = curve.scalar_add(&s, &curve.scalar_mul(&lambda, &curve.scalar_reduce(&partial.s)));
    }

    if r == Uint::ZERO || s == Uint::ZERO {
        return Err(Error::DegenerateSignature);
    }
    Ok(EcdsaSignature { r, s })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keygen::run_dkg;
    use crate::sign::ecdsa_verify;
    use crate::types::{DkgOutput, ProtocolConfig};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn fixture(n: usize, t: usize, seed: u64) -> (CurveParams, DkgOutput, ChaCha20Rng) {
        let curve = CurveParams::secp256k1();
        let config = ProtocolConfig::new(n, t).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let output = run_dkg(&curve, &config, &mut rng).unwrap();
        (curve, output, rng)
    }

    fn run_round(
        curve: &CurveParams,
        output: &DkgOutput,
        digest: Uint,
        signer_ids: &[PartyId],
        rng: &mut ChaCha20Rng,
    ) -> Vec<NoncePartial> {
        let nonces: Vec<(PartyId, Uint)> = signer_ids
            .iter()
            .map(|&id| (id, curve.random_scalar(rng)))
            .collect();
        let k = aggregate_nonces(curve, &nonces);
        signer_ids
            .iter()
            .map(|&id| {
                let share = &output.key_shares[id - 1];
                sign_partial(curve, digest, id, &share.secret_share, &k).unwrap()
            })
            .collect()
    }

    #[test]
    fn round_trip_with_ten_parties() {
        let (curve, output, mut rng) = fixture(10, 7, 41);
        let digest = Uint::from_u64(12345);
        let signer_ids = [1, 3, 4, 6, 7, 8, 10];
        let partials = run_round(&curve, &output, digest, &signer_ids, &mut rng);

        let signature = combine_partials(&curve, &signer_ids, &partials).unwrap();
        assert!(ecdsa_verify(&curve, &output.public.group_public_key, digest, &signature).unwrap());

        // flipping one bit of the digest must fail verification
        let flipped = Uint::from_u64(12345 ^ 1);
        assert!(
            !ecdsa_verify(&curve, &output.public.group_public_key, flipped, &signature).unwrap()
        );
    }

    #[test]
    fn all_signers_agree_on_r() {
        let (curve, output, mut rng) = fixture(5, 3, 42);
        let digest = Uint::from_u64(500);
        let partials = run_round(&curve, &output, digest, &[1, 2, 3], &mut rng);
        assert!(partials.iter().all(|partial| partial.r == partials[0].r));
    }

    #[test]
    fn diverging_r_rejects_the_round() {
        let (curve, output, mut rng) = fixture(5, 3, 43);
        let digest = Uint::from_u64(500);
        let signer_ids = [1, 2, 3];
        let mut partials = run_round(&curve, &output, digest, &signer_ids, &mut rng);
        partials[2].r = curve.scalar_add(&curve.scalar_reduce(&partials[2].r), &Uint::ONE);

        assert!(matches!(
            combine_partials(&curve, &signer_ids, &partials),
            Err(Error::InvalidPartialSignature(3))
        ));
    }

    #[test]
    fn combination_is_deterministic() {
        let (curve, output, mut rng) = fixture(5, 3, 44);
        let digest = Uint::from_u64(616);
        let signer_ids = [2, 4, 5];
        let partials = run_round(&curve, &output, digest, &signer_ids, &mut rng);

        let first = combine_partials(&curve, &signer_ids, &partials).unwrap();
        let second = combine_partials(&curve, &signer_ids, &partials).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn zero_aggregate_nonce_is_degenerate() {
        let (curve, output, _) = fixture(5, 3, 45);
        let share = &output.key_shares[0];
        let result = sign_partial(
            &curve,
            Uint::from_u64(1),
            1,
            &share.secret_share,
            &Uint::ZERO,
        );
        assert!(matches!(result, Err(Error::DegenerateSignature)));
    }

    #[test]
    fn threshold_mismatch_is_rejected() {
        let (curve, output, mut rng) = fixture(5, 3, 46);
        let digest = Uint::from_u64(7);
        let signer_ids = [1, 2, 3];
        let partials = run_round(&curve, &output, digest, &signer_ids, &mut rng);
        assert!(matches!(
            combine_partials(&curve, &signer_ids, &partials[..2]),
            Err(Error::ThresholdNotMet {
                required: 3,
                actual: 2
            })
        ));
    }
}
