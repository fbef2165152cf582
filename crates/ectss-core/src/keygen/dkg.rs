//! Joint-Feldman distributed key generation
//!
//! Each of the N dealers shares a uniformly random secret with a
//! degree-(t-1) polynomial and publishes one commitment point per
//! coefficient. Every recipient verifies every received share against the
//! dealer's commitments before anything is aggregated; a single bad share
//! aborts the whole cohort. The group secret key (the sum of all dealers'
//! constant terms) is never materialized.

use crate::curve::{CurveParams, Point, Uint};
use crate::error::{Error, Result};
use crate::keygen::shamir;
use crate::types::{DkgOutput, KeyShare, PartyId, ProtocolConfig, PublicKeyMaterial};
use rand_core::CryptoRngCore;
use tracing::{debug, info, instrument};

/// Verify a share against a dealer's coefficient commitments:
/// s*G == sum_mu (j^mu mod n) * C_mu for recipient j.
pub fn verify_share(
    curve: &CurveParams,
    share: &Uint,
    recipient: PartyId,
    commitments: &[Point],
) -> Result<bool> {
    let share = curve.scalar_reduce(share);
    if share == Uint::ZERO || recipient == 0 || commitments.is_empty() {
        return Ok(false);
    }
    let expected = curve.multiply_point(&share, &curve.g)?;

    let j = curve.scalar_reduce(&Uint::from_u64(recipient as u64));
    let mut actual = Point::Identity;
    let mut j_power = Uint::ONE;
    for commitment in commitments {
        let term = curve.multiply_point_or_identity(&j_power, commitment)?;
        actual = curve.add_points(&actual, &term)?;
        j_power = curve.scalar_mul(&j_power, &j);
    }
    Ok(expected == actual)
}

/// Run the joint-Feldman DKG for all parties.
///
/// Returns one key share per party plus the public key material. Fails
/// closed with [`Error::ShareVerificationFailure`] if any share does not
/// match its dealer's commitments.
#[instrument(skip_all, fields(n_parties = config.n_parties, threshold = config.threshold))]
pub fn run_dkg(
    curve: &CurveParams,
    config: &ProtocolConfig,
    rng: &mut impl CryptoRngCore,
) -> Result<DkgOutput> {
    info!("Starting DKG");
    let ids = config.party_ids();

    // Every dealer draws a secret polynomial, evaluates it at all party
    // ids and commits to its coefficients.
    let mut dealer_shares: Vec<Vec<Uint>> = Vec::with_capacity(ids.len());
    let mut dealer_commitments: Vec<Vec<Point>> = Vec::with_capacity(ids.len());
    for dealer in &ids {
        let secret = curve.random_scalar(rng);
        let coefficients = shamir::random_polynomial(curve, secret, config.threshold, rng);
        let commitments = coefficients
            .iter()
            .map(|coefficient| curve.multiply_point(coefficient, &curve.g))
            .collect::<Result<Vec<_>>>()?;
        let shares = ids
            .iter()
            .map(|&j| shamir::evaluate_polynomial(curve, &coefficients, j))
            .collect();
        debug!(dealer, "Dealer committed to polynomial");
        dealer_shares.push(shares);
        dealer_commitments.push(commitments);
    }

    // Every recipient checks every received share.
    for (dealer_idx, dealer) in ids.iter().enumerate() {
        for (recipient_idx, recipient) in ids.iter().enumerate() {
            let share = &dealer_shares[dealer_idx][recipient_idx];
            if !verify_share(curve, share, *recipient, &dealer_commitments[dealer_idx])? {
                return Err(Error::ShareVerificationFailure {
                    dealer: *dealer,
                    recipient: *recipient,
                });
            }
        }
    }

    // Group public key: sum of all dealers' constant-term commitments.
    let mut group_public_key = Point::Identity;
    for commitments in &dealer_commitments {
        group_public_key = curve.add_points(&group_public_key, &commitments[0])?;
    }

    // Per-party aggregation: signing-key share = sum of received shares.
    let mut key_shares = Vec::with_capacity(ids.len());
    let mut public_shares = Vec::with_capacity(ids.len());
    for (recipient_idx, &party_id) in ids.iter().enumerate() {
        let mut secret_share = Uint::ZERO;
        for shares in &dealer_shares {
            secret_share = curve.scalar_add(&secret_share, &shares[recipient_idx]);
        }
        let public_share = curve.multiply_point(&secret_share, &curve.g)?;
        public_shares.push((party_id, public_share));
        key_shares.push(KeyShare {
            party_id,
            n_parties: config.n_parties,
            threshold: config.threshold,
            secret_share,
            public_share,
            group_public_key,
        });
    }

    info!("DKG completed successfully");
    Ok(DkgOutput {
        key_shares,
        public: PublicKeyMaterial {
            public_shares,
            group_public_key,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keygen::shamir::{lagrange_coefficient, reconstruct_secret};
    use crypto_bigint::Encoding;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn dkg_fixture(n: usize, t: usize, seed: u64) -> (CurveParams, DkgOutput) {
        let curve = CurveParams::secp256k1();
        let config = ProtocolConfig::new(n, t).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let output = run_dkg(&curve, &config, &mut rng).unwrap();
        (curve, output)
    }

    #[test]
    fn honest_shares_pass_feldman_check() {
        let curve = CurveParams::secp256k1();
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let secret = curve.random_scalar(&mut rng);
        let coefficients = shamir::random_polynomial(&curve, secret, 3, &mut rng);
        let commitments: Vec<Point> = coefficients
            .iter()
            .map(|c| curve.multiply_point(c, &curve.g).unwrap())
            .collect();

        for recipient in 1..=5 {
            let share = shamir::evaluate_polynomial(&curve, &coefficients, recipient);
            assert!(verify_share(&curve, &share, recipient, &commitments).unwrap());
        }
    }

    #[test]
    fn corrupted_share_fails_feldman_check() {
        let curve = CurveParams::secp256k1();
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let secret = curve.random_scalar(&mut rng);
        let coefficients = shamir::random_polynomial(&curve, secret, 3, &mut rng);
        let commitments: Vec<Point> = coefficients
            .iter()
            .map(|c| curve.multiply_point(c, &curve.g).unwrap())
            .collect();

        let share = shamir::evaluate_polynomial(&curve, &coefficients, 2);
        let mut bytes = share.to_be_bytes();
        bytes[31] ^= 0x01;
        let corrupted = Uint::from_be_bytes(bytes);
        assert!(!verify_share(&curve, &corrupted, 2, &commitments).unwrap());
        // the right share under the wrong id fails too
        assert!(!verify_share(&curve, &share, 3, &commitments).unwrap());
    }

    #[test]
    fn any_t_subset_reconstructs_the_group_key() {
        let (curve, output) = dkg_fixture(5, 3, 3);
        let shares: Vec<(PartyId, Uint)> = output
            .key_shares
            .iter()
            .map(|share| (share.party_id, share.secret_share))
            .collect();

        for subset in [[0usize, 1, 2], [0, 2, 4], [1, 3, 4]] {
            let selected: Vec<_> = subset.iter().map(|&idx| shares[idx]).collect();
            let secret = reconstruct_secret(&curve, &selected).unwrap();
            let public = curve.multiply_point(&secret, &curve.g).unwrap();
            assert_eq!(public, output.public.group_public_key);
        }
    }

    #[test]
    fn fewer_than_t_shares_do_not_reconstruct() {
        let (curve, output) = dkg_fixture(5, 3, 4);
        let shares: Vec<(PartyId, Uint)> = output
            .key_shares
            .iter()
            .map(|share| (share.party_id, share.secret_share))
            .collect();

        let secret = reconstruct_secret(&curve, &shares[..2]).unwrap();
        let public = curve.multiply_point(&secret, &curve.g).unwrap();
        assert_ne!(public, output.public.group_public_key);
    }

    #[test]
    fn public_shares_interpolate_to_the_group_key() {
        let (curve, output) = dkg_fixture(5, 3, 5);
        let ids = [2, 3, 5];
        let mut combined = Point::Identity;
        for &id in &ids {
            let lambda = lagrange_coefficient(&curve, id, &ids).unwrap();
            let share = output.public.public_share(id).unwrap();
            let term = curve.multiply_point_or_identity(&lambda, share).unwrap();
            combined = curve.add_points(&combined, &term).unwrap();
        }
        assert_eq!(combined, output.public.group_public_key);
    }

    #[test]
    fn key_shares_carry_consistent_public_material() {
        let (curve, output) = dkg_fixture(4, 2, 6);
        for share in &output.key_shares {
            let public = curve.multiply_point(&share.secret_share, &curve.g).unwrap();
            assert_eq!(public, share.public_share);
            assert_eq!(
                output.public.public_share(share.party_id),
                Some(&share.public_share)
            );
            assert_eq!(share.group_public_key, output.public.group_public_key);
        }
    }
}
