//! ECTSS Simulation CLI
//!
//! Simulates a full threshold-ECDSA deployment inside one process:
//! - Runs distributed key generation for N parties
//! - Spawns the signer pool and drives signing rounds over random
//!   messages, selecting a fresh t-subset of signers per round
//! - Verifies every combined signature against the group public key

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use crypto_bigint::Encoding;
use ectss_core::{
    keygen, Coordinator, CurveParams, Error, PartyId, ProtocolConfig, ProtocolKind,
    ThresholdSignature, Uint,
};
use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use sha2::{Digest, Sha256};
use tracing::{info, warn, Level};

/// How often a degenerate round is retried with fresh randomness before
/// giving up.
const ROUND_RETRY_LIMIT: usize = 3;

/// ECTSS Sim - local threshold signing simulation
#[derive(Parser)]
#[command(name = "ectss-sim")]
#[command(about = "Threshold ECDSA signing simulation")]
#[command(version)]
struct Cli {
    /// Number of parties
    #[arg(short = 'n', long, env = "ECTSS_PARTIES", default_value_t = 10)]
    parties: usize,

    /// Threshold (t-of-n)
    #[arg(short = 't', long, env = "ECTSS_THRESHOLD", default_value_t = 7)]
    threshold: usize,

    /// Number of signing rounds to run
    #[arg(short, long, default_value_t = 5)]
    rounds: usize,

    /// Which signing protocol to exercise
    #[arg(long, value_enum, default_value = "both")]
    variant: Variant,

    /// Seed for reproducible key generation and signer selection
    #[arg(long, env = "ECTSS_SEED")]
    seed: Option<u64>,

    /// Per-round deadline in seconds
    #[arg(long, default_value_t = 10)]
    round_timeout: u64,

    /// Directory for key-share files (written only when given)
    #[arg(short, long, env = "ECTSS_DEST")]
    dest: Option<PathBuf>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Variant {
    /// Blinded partial signatures, no signer synchronization
    Blinded,
    /// Nonce aggregation behind a rendezvous barrier, classic ECDSA shape
    NonceAggregated,
    /// Alternate between both protocols each round
    Both,
}

impl Variant {
    fn kinds(&self) -> &'static [ProtocolKind] {
        match self {
            Variant::Blinded => &[ProtocolKind::Blinded],
            Variant::NonceAggregated => &[ProtocolKind::NonceAggregated],
            Variant::Both => &[ProtocolKind::NonceAggregated, ProtocolKind::Blinded],
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let config = ProtocolConfig::new(cli.parties, cli.threshold)?;
    let curve = CurveParams::secp256k1();

    let mut rng: ChaCha20Rng = match cli.seed {
        Some(seed) => ChaCha20Rng::seed_from_u64(seed),
        None => ChaCha20Rng::from_rng(OsRng)?,
    };

    info!(
        parties = config.n_parties,
        threshold = config.threshold,
        "Running DKG"
    );
    let output = keygen::run_dkg(&curve, &config, &mut rng)?;

    if let Some(dest) = &cli.dest {
        write_key_material(dest, &output)?;
    }
    println!(
        "Group public key: {}",
        point_hex(&output.public.group_public_key)
    );

    let mut coordinator = Coordinator::spawn(curve, output)?
        .with_round_timeout(Duration::from_secs(cli.round_timeout));

    let mut completed = 0usize;
    for round in 1..=cli.rounds {
        let message = random_message(&mut rng, 10);
        let digest: [u8; 32] = Sha256::digest(message.as_bytes()).into();
        let scalar = coordinator.curve().scalar_from_digest(&digest);
        let signer_ids = select_signers(&mut rng, coordinator.party_ids(), cli.threshold);

        for &kind in cli.variant.kinds() {
            let signature =
                sign_with_retry(&mut coordinator, kind, scalar, &signer_ids).await?;
            anyhow::ensure!(
                coordinator.verify(kind, scalar, &signature)?,
                "combined signature failed verification"
            );
            print_signature(round, &message, &signer_ids, &signature);
            completed += 1;
        }
    }

    coordinator.shutdown().await;
    info!(rounds = cli.rounds, signatures = completed, "Simulation finished");
    Ok(())
}

/// Run one round, retrying degenerate signatures with fresh randomness.
async fn sign_with_retry(
    coordinator: &mut Coordinator,
    kind: ProtocolKind,
    digest: Uint,
    signer_ids: &[PartyId],
) -> Result<ThresholdSignature> {
    for attempt in 1..=ROUND_RETRY_LIMIT {
        match coordinator.sign(kind, digest, signer_ids).await {
            Err(Error::DegenerateSignature) => {
                warn!(attempt, "Degenerate signature, retrying round");
            }
            other => return Ok(other?),
        }
    }
    anyhow::bail!("round stayed degenerate after {ROUND_RETRY_LIMIT} attempts")
}

/// Pick a random t-subset of the pool, sorted for readable logs.
fn select_signers(rng: &mut impl RngCore, party_ids: &[PartyId], t: usize) -> Vec<PartyId> {
    let mut selected: Vec<PartyId> = party_ids.choose_multiple(rng, t).copied().collect();
    selected.sort_unstable();
    selected
}

/// Random alphanumeric message of the given length.
fn random_message(rng: &mut impl Rng, length: usize) -> String {
    (0..length)
        .map(|_| rng.sample(rand::distributions::Alphanumeric) as char)
        .collect()
}

fn write_key_material(dest: &PathBuf, output: &ectss_core::DkgOutput) -> Result<()> {
    std::fs::create_dir_all(dest)?;
    for share in &output.key_shares {
        let path = dest.join(format!("keyshare.{}.json", share.party_id));
        std::fs::write(&path, serde_json::to_string_pretty(share)?)?;
    }
    let public_path = dest.join("public.json");
    std::fs::write(&public_path, serde_json::to_string_pretty(&output.public)?)?;
    info!(path = ?dest, shares = output.key_shares.len(), "Key material saved");
    Ok(())
}

fn point_hex(point: &ectss_core::Point) -> String {
    match point {
        ectss_core::Point::Identity => "identity".into(),
        ectss_core::Point::Affine { x, y } => format!(
            "({}, {})",
            hex::encode(x.to_be_bytes()),
            hex::encode(y.to_be_bytes())
        ),
    }
}

fn print_signature(
    round: usize,
    message: &str,
    signer_ids: &[PartyId],
    signature: &ThresholdSignature,
) {
    println!("Round {round} ({message:?}, signers {signer_ids:?}):");
    match signature {
        ThresholdSignature::Ecdsa(signature) => {
            println!("  protocol: nonce-aggregated");
            println!("  r: {}", hex::encode(signature.r.to_be_bytes()));
            println!("  s: {}", hex::encode(signature.s.to_be_bytes()));
        }
        ThresholdSignature::Blinded(signature) => {
            println!("  protocol: blinded");
            println!("  r: {}", hex::encode(signature.r.to_be_bytes()));
            println!("  l: {}", hex::encode(signature.l.to_be_bytes()));
            println!("  b: {}", hex::encode(signature.beta.to_be_bytes()));
        }
    }
}
