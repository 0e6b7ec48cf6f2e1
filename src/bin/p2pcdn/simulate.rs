//! Scripted end-to-end session against an in-memory authority.

use crate::cli::Scenario;
use color_eyre::eyre::{eyre, Result};
use k256::ecdsa::SigningKey;
use p2pcdn_escrow::crypto::keytree::{apply_keystream, descend, symmetric_key};
use p2pcdn_escrow::crypto::merkle::chunk_hash;
use p2pcdn_escrow::crypto::signature::{address_of, signing_key_from_secret};
use p2pcdn_escrow::crypto::{keccak256, vpke, ContentPackage, Packed, SecretKey};
use p2pcdn_escrow::market::delivery::{sign_first_chunk, sign_receipt};
use p2pcdn_escrow::market::dispute::sign_chunk;
use p2pcdn_escrow::market::reveal::{build_reveal, locate_leaf, reveal_plan};
use p2pcdn_escrow::{
    Address, Clock, ConsumeParams, DisputeBundle, EscrowBuilder, Hash, ManualClock, MarketConfig,
    StartParams,
};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

const PAYMENT_PD: u128 = 20;
const PAYMENT_PC: u128 = 200;
const OFFER: u128 = 300;
const WORDS_PER_CHUNK: u64 = 4;
const SID: u64 = 1;

/// Parameters of one simulated session.
#[derive(Debug, Clone, Copy)]
pub struct Script {
    pub scenario: Scenario,
    pub chunks: u64,
    pub start_index: u64,
    pub acknowledge: u64,
}

struct Party {
    key: SigningKey,
    address: Address,
}

impl Party {
    fn new(name: &str) -> Result<Self> {
        let key = signing_key_from_secret(&keccak256(name.as_bytes()))?;
        let address = address_of(key.verifying_key());
        Ok(Self { key, address })
    }
}

fn chunk_words(index: u64) -> Vec<Hash> {
    (0..WORDS_PER_CHUNK)
        .map(|j| Packed::new().string("chunk").uint(index).uint(j).digest())
        .collect()
}

/// Run the script, printing every event the authority emits.
pub async fn run(config: MarketConfig, script: Script) -> Result<()> {
    if script.chunks == 0 {
        return Err(eyre!("content needs at least one chunk"));
    }
    let n = script.chunks;
    let a = script.start_index;
    let ctr = script.acknowledge;
    if a == 0 || a > ctr || ctr > n {
        return Err(eyre!("need 1 <= start-index <= acknowledge <= chunks"));
    }

    let provider = Party::new("provider")?;
    let deliverers = [Party::new("deliverer-1")?, Party::new("deliverer-2")?];
    let consumer = Party::new("consumer")?;
    let consumer_enc =
        SecretKey::from_seed(b"consumer-reveal").ok_or_else(|| eyre!("degenerate reveal key"))?;

    let package = ContentPackage::new(b"simulation-master", (1..=n).map(chunk_words).collect())
        .ok_or_else(|| eyre!("empty content"))?;
    let root = package.root();

    let clock = ManualClock::new(u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0));
    let dispute_window = config.dispute_window_secs;
    let authority = EscrowBuilder::new(config)
        .clock(Arc::new(clock.clone()))
        .build();

    let mut events = authority
        .events()
        .ok_or_else(|| eyre!("event receiver already taken"))?;
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => println!("  event: {event:?}"),
                Err(RecvError::Lagged(missed)) => warn!("Missed {missed} events"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    info!("Simulating {:?} session over {n} chunks", script.scenario);

    // Listing
    authority.with(|c| {
        c.start(
            provider.address,
            StartParams {
                root_m: root,
                n,
                payment_pd: PAYMENT_PD,
                payment_pc: PAYMENT_PC,
            },
            u128::from(n) * PAYMENT_PD,
        )?;
        for (d, bid) in deliverers.iter().zip([18, 15]) {
            c.join(d.address, bid)?;
        }
        c.join_stop(provider.address)?;
        for (k, d) in deliverers.iter().enumerate() {
            c.deliverers_prepared(d.address, &format!("http://deliverer-{k}.local"))?;
        }
        c.prepared(provider.address)
    })?;

    // Purchase and delivery
    let requested = n - a + 1;
    let courier = &deliverers[1];
    authority.with(|c| {
        c.consume(
            consumer.address,
            ConsumeParams {
                consumer: consumer.address,
                payment_cp: OFFER,
                start_index: a,
                content_hash: root,
                encryption_key: consumer_enc.public_point(),
            },
            u128::from(requested) * OFFER,
        )?;
        c.select(
            provider.address,
            &[deliverers[0].address, courier.address],
            &[18, 15],
        )?;
        let m1 = package
            .chunk_hash(a)
            .ok_or_else(|| p2pcdn_escrow::Error::InvalidArgument("no first chunk".into()))?;
        let sig = sign_first_chunk(&courier.key, SID, a, &m1)?;
        c.upload_first_chunk(courier.address, SID, a, m1, sig)?;
        c.verify_first_chunk(consumer.address, SID)?;
        c.delivered(consumer.address)?;
        let receipt = sign_receipt(&consumer.key, SID, ctr, &courier.address, &consumer.address)?;
        c.verify_podq_proof(courier.address, SID, ctr, &receipt)
    })?;

    // What the consumer received, chunk by chunk
    let corrupted = (script.scenario == Scenario::Dispute).then_some(ctr);
    let mut served = Vec::new();
    for i in a..=ctr {
        let cipher = if corrupted == Some(i) {
            let mut words = chunk_words(i);
            words[0] = keccak256(b"garbage");
            package
                .key_tree()
                .encrypt_chunk(i, &words)
                .ok_or_else(|| eyre!("chunk {i} outside tree"))?
        } else {
            package
                .encrypted_chunk(i)
                .ok_or_else(|| eyre!("chunk {i} outside tree"))?
        };
        let sig = sign_chunk(&provider.key, &root, i, &cipher)?;
        served.push((i, cipher, sig));
    }

    // Key reveal
    let plan = reveal_plan(n, a, ctr);
    let (positions, c1, c2) = build_reveal(
        package.key_tree(),
        &consumer_enc.public_point(),
        &plan,
        b"simulation-nonce",
    )
    .ok_or_else(|| eyre!("cannot build reveal"))?;
    let revealed = authority.with(|c| -> p2pcdn_escrow::Result<_> {
        c.reveal_keys(provider.address, &positions, &c1, &c2)?;
        Ok(c.revealed_keys().to_vec())
    })?;

    // Consumer checks every chunk against the content root
    let mut bad_chunk = None;
    for (i, cipher, sig) in &served {
        let (erk, steps) =
            locate_leaf(n, *i, &revealed).ok_or_else(|| eyre!("chunk {i} not covered"))?;
        let rk = vpke::decrypt(&consumer_enc, &erk).ok_or_else(|| eyre!("undecryptable key"))?;
        let halves = descend(&rk.halves, &steps).ok_or_else(|| eyre!("bad descent"))?;
        let plain = apply_keystream(&symmetric_key(&halves), cipher);
        let expected = package
            .chunk_hash(*i)
            .ok_or_else(|| eyre!("chunk {i} outside tree"))?;
        if chunk_hash(&plain) == expected {
            println!("  chunk {i}: ok");
        } else {
            println!("  chunk {i}: MISMATCH");
            let proof = vpke::prove(&consumer_enc, &erk, &rk).ok_or_else(|| eyre!("no proof"))?;
            bad_chunk = Some(DisputeBundle {
                steps,
                chunk_ciphertext: cipher.clone(),
                provider_signature: sig.clone(),
                claimed_hash: expected,
                merkle_proof: package
                    .merkle_proof(*i)
                    .ok_or_else(|| eyre!("chunk {i} outside tree"))?,
                submitted_erk: vec![erk],
                submitted_rk: vec![rk],
                vpke_proofs: vec![proof],
            });
        }
    }

    match bad_chunk {
        Some(bundle) => {
            let verdict = authority.with(|c| -> p2pcdn_escrow::Result<_> {
                c.wrong_rk(consumer.address)?;
                c.pom(consumer.address, &bundle)
            })?;
            println!("Dispute verdict: {verdict:?}");
        }
        None => {
            clock.advance(dispute_window);
            authority.with(|c| c.dispute_timeout(provider.address))?;
            println!("Dispute window lapsed at {}", clock.now());
        }
    }

    let session = authority.session();
    let summary = authority.with(|c| {
        let ledger = c.ledger();
        [
            ("provider", provider.address),
            ("deliverer-2", courier.address),
            ("consumer", consumer.address),
        ]
        .map(|(name, addr)| (name, ledger.paid_out(&addr), ledger.balance(&addr)))
    });
    println!("Outcome: {:?}", session.outcome);
    for (name, paid, held) in summary {
        println!("  {name:<12} paid out {paid:>6}, still escrowed {held:>6}");
    }

    authority.with(|c| c.reset(provider.address))?;
    drop(authority);
    printer.await?;
    Ok(())
}
