//! Core types shared across key generation and signing

use crate::curve::{Point, Uint};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Unique identifier for a party, in [1, N]. Zero is reserved as
/// "no contribution" and is never a valid id.
pub type PartyId = usize;

/// Static (t, N) protocol configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Total number of parties
    pub n_parties: usize,

    /// Threshold (t-of-n)
    pub threshold: usize,
}

impl ProtocolConfig {
    /// Create a new protocol configuration.
    pub fn new(n_parties: usize, threshold: usize) -> Result<Self> {
        if threshold > n_parties {
            return Err(Error::InvalidConfig(
                "Threshold cannot exceed number of parties".into(),
            ));
        }
        if threshold < 2 {
            return Err(Error::InvalidConfig(
                "Threshold must be at least 2".into(),
            ));
        }
        Ok(Self {
            n_parties,
            threshold,
        })
    }

    /// The ids of all parties, 1 through N.
    pub fn party_ids(&self) -> Vec<PartyId> {
        (1..=self.n_parties).collect()
    }
}

/// Key share held by a party after DKG.
///
/// The secret share is owned exclusively by the party and is wiped on
/// drop; everything else is public material.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct KeyShare {
    /// This party's ID
    #[zeroize(skip)]
    pub party_id: PartyId,

    /// Total number of parties
    #[zeroize(skip)]
    pub n_parties: usize,

    /// Threshold
    #[zeroize(skip)]
    pub threshold: usize,

    /// This party's aggregate signing-key share (mod n)
    pub secret_share: Uint,

    /// This party's public key (secret_share * G)
    #[zeroize(skip)]
    pub public_share: Point,

    /// The group public key
    #[zeroize(skip)]
    pub group_public_key: Point,
}

/// Public output of the DKG, handed to external key storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyMaterial {
    /// Per-party public keys
    pub public_shares: Vec<(PartyId, Point)>,

    /// Group public key (sum of all dealers' constant-term commitments)
    pub group_public_key: Point,
}

impl PublicKeyMaterial {
    /// Public key of a single party.
    pub fn public_share(&self, party_id: PartyId) -> Option<&Point> {
        self.public_shares
            .iter()
            .find(|(id, _)| *id == party_id)
            .map(|(_, point)| point)
    }
}

/// Everything produced by a completed DKG: one key share per party plus
/// the public key material.
#[derive(Clone, Serialize, Deserialize)]
pub struct DkgOutput {
    /// One key share per party, ordered by party id
    pub key_shares: Vec<KeyShare>,

    /// Public material for verification and external storage
    pub public: PublicKeyMaterial,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_validation() {
        assert!(ProtocolConfig::new(5, 3).is_ok());
        assert!(ProtocolConfig::new(3, 5).is_err());
        assert!(ProtocolConfig::new(5, 1).is_err());
    }

    #[test]
    fn party_ids_are_one_based() {
        let config = ProtocolConfig::new(3, 2).unwrap();
        assert_eq!(config.party_ids(), vec![1, 2, 3]);
    }
}
