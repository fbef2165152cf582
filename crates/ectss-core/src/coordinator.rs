//! Signer pool and round coordination
//!
//! One async task per party (each exclusively owning its key share) plus a
//! coordinator that fans out round requests and collects contributions.
//! Round state is coordinator-owned and created fresh for every round;
//! signers can only reach it through the round request, so two rounds'
//! collections can never mix. Rounds are strictly sequential.
//!
//! The nonce-aggregated protocol additionally runs a two-phase rendezvous:
//! every active signer publishes its nonce under the round mutex, then
//! waits at a barrier until all t nonces are in before computing its
//! partial signature from the aggregate. The coordinator collects
//! contributions monitor-style: signers notify after appending, the
//! coordinator re-checks the completion predicate on every wakeup.

use std::mem;
use std::sync::Arc;
use std::time::Duration;

use crypto_bigint::Encoding;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{watch, Barrier, Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::curve::{CurveParams, Point, Uint};
use crate::error::{Error, Result};
use crate::sign::{blinded, nonce_agg, PartialSignature, ProtocolKind, ThresholdSignature};
use crate::types::{DkgOutput, KeyShare, PartyId, PublicKeyMaterial};

/// Default bound on how long a round may wait for contributions.
pub const DEFAULT_ROUND_TIMEOUT: Duration = Duration::from_secs(10);

/// A signing request fanned out to the signer pool.
pub struct RoundRequest {
    /// Monotonic round number
    pub round: u64,
    /// Which protocol this round runs
    pub kind: ProtocolKind,
    /// Message digest, reduced mod n
    pub digest: Uint,
    /// The active signer subset (exactly t ids)
    pub signer_ids: Vec<PartyId>,
    state: Arc<RoundState>,
}

/// Round-scoped shared state. Never reused across rounds.
struct RoundState {
    /// Phase-1/phase-2 rendezvous for the nonce-aggregated protocol
    barrier: Barrier,
    /// Published nonces, appended under lock
    nonces: Mutex<Vec<(PartyId, Uint)>>,
    /// Collected contributions, appended under lock
    contributions: Mutex<Vec<(PartyId, Result<PartialSignature>)>>,
    /// Signaled by signers after appending a contribution
    progress: Notify,
}

/// What the coordinator last broadcast to the pool.
#[derive(Clone)]
enum Trigger {
    Idle,
    Round(Arc<RoundRequest>),
    Shutdown,
}

/// Drives a fixed pool of signer tasks through sequential signing rounds.
pub struct Coordinator {
    curve: Arc<CurveParams>,
    public: Arc<PublicKeyMaterial>,
    threshold: usize,
    party_ids: Vec<PartyId>,
    round_timeout: Duration,
    rounds: u64,
    trigger: watch::Sender<Trigger>,
    signers: Vec<JoinHandle<()>>,
}

impl Coordinator {
    /// Spawn one signer task per key share. Must be called within a Tokio
    /// runtime.
    pub fn spawn(curve: CurveParams, output: DkgOutput) -> Result<Self> {
        let threshold = output
            .key_shares
            .first()
            .map(|share| share.threshold)
            .ok_or_else(|| Error::InvalidConfig("No key shares to spawn signers for".into()))?;
        let curve = Arc::new(curve);
        let public = Arc::new(output.public);
        let (trigger, _) = watch::channel(Trigger::Idle);

        let mut party_ids = Vec::with_capacity(output.key_shares.len());
        let mut signers = Vec::with_capacity(output.key_shares.len());
        for share in output.key_shares {
            party_ids.push(share.party_id);
            let task_curve = Arc::clone(&curve);
            let receiver = trigger.subscribe();
            signers.push(tokio::spawn(signer_task(task_curve, share, receiver)));
        }
        info!(parties = party_ids.len(), threshold, "Signer pool started");

        Ok(Self {
            curve,
            public,
            threshold,
            party_ids,
            round_timeout: DEFAULT_ROUND_TIMEOUT,
            rounds: 0,
            trigger,
            signers,
        })
    }

    /// Replace the round deadline.
    pub fn with_round_timeout(mut self, round_timeout: Duration) -> Self {
        self.round_timeout = round_timeout;
        self
    }

    /// The curve the pool signs over.
    pub fn curve(&self) -> &CurveParams {
        &self.curve
    }

    /// Public key material of the pool.
    pub fn public_material(&self) -> &PublicKeyMaterial {
        &self.public
    }

    /// The group public key.
    pub fn group_public_key(&self) -> &Point {
        &self.public.group_public_key
    }

    /// Ids of all spawned signers.
    pub fn party_ids(&self) -> &[PartyId] {
        &self.party_ids
    }

    /// The signing threshold.
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Run one signing round over the given active signer subset.
    ///
    /// Blocks until all t contributions arrive, then combines them and
    /// sanity-verifies the result against the group public key. Surfaces
    /// signer-side failures ([`Error::DegenerateSignature`] means the
    /// caller should retry with fresh randomness) and
    /// [`Error::RoundTimeout`] when contributions are missing at the
    /// deadline.
    #[instrument(skip(self, digest), fields(round = self.rounds + 1))]
    pub async fn sign(
        &mut self,
        kind: ProtocolKind,
        digest: Uint,
        signer_ids: &[PartyId],
    ) -> Result<ThresholdSignature> {
        if signer_ids.len() < self.threshold {
            return Err(Error::ThresholdNotMet {
                required: self.threshold,
                actual: signer_ids.len(),
            });
        }
        if signer_ids.len() > self.threshold {
            return Err(Error::InvalidConfig(
                "Active signer set exceeds the threshold".into(),
            ));
        }
        for (idx, id) in signer_ids.iter().enumerate() {
            if *id == 0 || signer_ids[..idx].contains(id) {
                return Err(Error::DegenerateIdSet(format!("bad signer id {id}")));
            }
            if !self.party_ids.contains(id) {
                // No task will answer for this id; the round can only end
                // in a timeout, which is the caller's signal.
                warn!(id, "Requested signer is not part of the pool");
            }
        }

        let digest = self.curve.scalar_reduce(&digest);
        let required = signer_ids.len();
        self.rounds += 1;

        let state = Arc::new(RoundState {
            barrier: Barrier::new(required),
            nonces: Mutex::new(Vec::with_capacity(required)),
            contributions: Mutex::new(Vec::with_capacity(required)),
            progress: Notify::new(),
        });
        let request = Arc::new(RoundRequest {
            round: self.rounds,
            kind,
            digest,
            signer_ids: signer_ids.to_vec(),
            state: Arc::clone(&state),
        });
        debug!(signers = ?signer_ids, "Fanning out round request");
        self.trigger
            .send(Trigger::Round(request))
            .map_err(|_| Error::Internal("Signer pool is gone".into()))?;

        // Monitor-style wait: check the predicate first, then sleep until
        // the next append or the deadline.
        let deadline = tokio::time::Instant::now() + self.round_timeout;
        let mut collected = loop {
            let notified = state.progress.notified();
            {
                let mut contributions = state.contributions.lock().await;
                if contributions.len() >= required {
                    break mem::take(&mut *contributions);
                }
            }
            tokio::select! {
                _ = notified => {}
                _ = tokio::time::sleep_until(deadline) => {
                    let collected = state.contributions.lock().await.len();
                    // Release any signers still parked on the abandoned
                    // round before surfacing the timeout.
                    let _ = self.trigger.send(Trigger::Idle);
                    warn!(collected, required, "Round timed out");
                    return Err(Error::RoundTimeout { collected, required });
                }
            }
        };
        let _ = self.trigger.send(Trigger::Idle);

        collected.sort_by_key(|(id, _)| *id);
        let mut partials = Vec::with_capacity(collected.len());
        for (_, outcome) in collected {
            partials.push(outcome?);
        }

        let protocol = kind.protocol();
        let signature = protocol.combine(&self.curve, &self.public, digest, signer_ids, &partials)?;
        if !protocol.verify(&self.curve, &self.public.group_public_key, digest, &signature)? {
            return Err(Error::Internal(
                "Combined signature failed verification".into(),
            ));
        }
        match &signature {
            ThresholdSignature::Ecdsa(signature) => info!(
                r = hex::encode(signature.r.to_be_bytes()),
                s = hex::encode(signature.s.to_be_bytes()),
                "Round completed"
            ),
            ThresholdSignature::Blinded(signature) => info!(
                r = hex::encode(signature.r.to_be_bytes()),
                "Round completed"
            ),
        }
        Ok(signature)
    }

    /// Verify a combined signature against the pool's group public key.
    pub fn verify(
        &self,
        kind: ProtocolKind,
        digest: Uint,
        signature: &ThresholdSignature,
    ) -> Result<bool> {
        let digest = self.curve.scalar_reduce(&digest);
        kind.protocol()
            .verify(&self.curve, &self.public.group_public_key, digest, signature)
    }

    /// Signal "no more rounds" and wait for every signer task to exit.
    pub async fn shutdown(mut self) {
        info!("Shutting down signer pool");
        let _ = self.trigger.send(Trigger::Shutdown);
        for handle in self.signers.drain(..) {
            let _ = handle.await;
        }
    }
}

/// The per-party signer loop: wait for a round request, contribute if
/// selected, exit on shutdown (or when the coordinator is dropped).
async fn signer_task(
    curve: Arc<CurveParams>,
    share: KeyShare,
    mut trigger: watch::Receiver<Trigger>,
) {
    let mut rng = StdRng::from_entropy();
    let me = share.party_id;
    debug!(party_id = me, "Signer task started");

    // A round abandoned mid-wait hands the trigger value it observed back
    // to this loop so no transition is lost.
    let mut pending: Option<Trigger> = None;
    loop {
        let current = match pending.take() {
            Some(trigger_value) => trigger_value,
            None => {
                if trigger.changed().await.is_err() {
                    break;
                }
                trigger.borrow_and_update().clone()
            }
        };
        match current {
            Trigger::Shutdown => break,
            Trigger::Idle => continue,
            Trigger::Round(request) => {
                if !request.signer_ids.contains(&me) {
                    continue;
                }
                pending = run_round(&curve, &share, &request, &mut rng, &mut trigger).await;
            }
        }
    }
    debug!(party_id = me, "Signer task stopped");
}

/// Participate in one round. Returns the trigger transition observed while
/// waiting, if the round was abandoned because of it.
async fn run_round(
    curve: &CurveParams,
    share: &KeyShare,
    request: &RoundRequest,
    rng: &mut StdRng,
    trigger: &mut watch::Receiver<Trigger>,
) -> Option<Trigger> {
    let me = share.party_id;
    let outcome = match request.kind {
        ProtocolKind::Blinded => blinded::sign_partial(
            curve,
            request.digest,
            me,
            &share.secret_share,
            &request.signer_ids,
            rng,
        )
        .map(PartialSignature::Blinded),
        ProtocolKind::NonceAggregated => {
            match nonce_aggregated_round(curve, share, request, rng, trigger).await {
                Ok(outcome) => outcome.map(PartialSignature::NonceAggregated),
                // Round abandoned mid-barrier; nothing is contributed.
                Err(observed) => return Some(observed),
            }
        }
    };
    if let Err(error) = &outcome {
        debug!(party_id = me, round = request.round, %error, "Contributing failure");
    }
    {
        let mut contributions = request.state.contributions.lock().await;
        contributions.push((me, outcome));
    }
    request.state.progress.notify_one();
    None
}

/// The two-phase nonce-aggregated flow: publish a nonce, rendezvous until
/// all t are published, then sign with the aggregate. `Err` carries the
/// trigger transition that interrupted the rendezvous.
async fn nonce_aggregated_round(
    curve: &CurveParams,
    share: &KeyShare,
    request: &RoundRequest,
    rng: &mut StdRng,
    trigger: &mut watch::Receiver<Trigger>,
) -> std::result::Result<Result<crate::sign::NoncePartial>, Trigger> {
    let nonce = curve.random_scalar(rng);
    {
        let mut nonces = request.state.nonces.lock().await;
        nonces.push((share.party_id, nonce));
    }

    // Nobody proceeds until every active signer has published its nonce;
    // an aggregate over a partial set would produce an unverifiable
    // signature instead of an error.
    tokio::select! {
        _ = request.state.barrier.wait() => {}
        _ = trigger.changed() => {
            debug!(party_id = share.party_id, round = request.round, "Abandoning round mid-rendezvous");
            return Err(trigger.borrow_and_update().clone());
        }
    }

    let aggregate = {
        let nonces = request.state.nonces.lock().await;
        debug_assert_eq!(nonces.len(), request.signer_ids.len());
        nonce_agg::aggregate_nonces(curve, &nonces)
    };
    Ok(nonce_agg::sign_partial(
        curve,
        request.digest,
        share.party_id,
        &share.secret_share,
        &aggregate,
    ))
}
