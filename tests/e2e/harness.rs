//! Session harness that drives an escrow authority through the protocol.
//!
//! The `SessionHarness` owns the authority, a manual clock, the in-memory
//! registries and a full cast of signing parties, and exposes each protocol
//! step as one call so tests can stop anywhere along the way.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use k256::ecdsa::SigningKey;
use p2pcdn_escrow::crypto::signature::{address_of, signing_key_from_secret};
use p2pcdn_escrow::crypto::{keccak256, vpke, ContentPackage, Packed, SecretKey};
use p2pcdn_escrow::event::SessionEventsChannel;
use p2pcdn_escrow::market::delivery::{sign_first_chunk, sign_receipt};
use p2pcdn_escrow::market::dispute::sign_chunk;
use p2pcdn_escrow::market::reveal::{build_reveal, locate_leaf, reveal_plan};
use p2pcdn_escrow::market::{Registries, SessionController};
use p2pcdn_escrow::{
    Address, Amount, ConsumeParams, DisputeBundle, EscrowAuthority, EscrowBuilder, Hash,
    ManualClock, MarketConfig, Result, SessionEvent, StartParams,
};
use parking_lot::MutexGuard;
use std::sync::Arc;

/// Per-chunk deliverer price.
pub const PAYMENT_PD: Amount = 20;
/// Per-chunk price the owner advertises.
pub const PAYMENT_PC: Amount = 200;
/// Consumer's per-chunk offer.
pub const OFFER: Amount = 300;
/// Dispute window in seconds.
pub const DISPUTE_WINDOW: u64 = 600;
/// Proof window in seconds.
pub const POM_WINDOW: u64 = 300;
/// Clock reading when the harness starts.
pub const START_TIME: u64 = 1_700_000_000;
/// Session id the first deliverer uploads under.
pub const SID: u64 = 42;
/// Deliverer bids, in join order.
pub const BIDS: [Amount; 2] = [18, 15];

/// A party with a deterministic signing key.
pub struct Party {
    /// Signing key.
    pub key: SigningKey,
    /// Address derived from the key.
    pub address: Address,
}

impl Party {
    /// Derive a party from a name.
    #[must_use]
    pub fn named(name: &str) -> Self {
        let key = signing_key_from_secret(&keccak256(name.as_bytes())).unwrap();
        let address = address_of(key.verifying_key());
        Self { key, address }
    }
}

/// Plaintext words of chunk `index`.
#[must_use]
pub fn chunk_words(index: u64) -> Vec<Hash> {
    (0..3u64)
        .map(|j| Packed::new().string("e2e").uint(index).uint(j).digest())
        .collect()
}

/// Harness around one authority.
pub struct SessionHarness {
    /// Authority under test.
    pub authority: EscrowAuthority,
    /// Clock the authority reads.
    pub clock: ManualClock,
    /// Registries the authority reports to.
    pub registries: Registries,
    /// Party that starts the session and posts the bond.
    pub owner: Party,
    /// Joining deliverers.
    pub deliverers: Vec<Party>,
    /// Paying consumer.
    pub consumer: Party,
    /// Consumer's key-reveal secret.
    pub consumer_enc: SecretKey,
    /// The content being sold.
    pub package: ContentPackage,
    events: SessionEventsChannel,
}

impl SessionHarness {
    /// Harness over `n` chunks.
    #[must_use]
    pub fn new(n: u64) -> Self {
        let clock = ManualClock::new(START_TIME);
        let registries = Registries::in_memory();
        let config = MarketConfig {
            dispute_window_secs: DISPUTE_WINDOW,
            pom_window_secs: POM_WINDOW,
            ..MarketConfig::default()
        };
        let authority = EscrowBuilder::new(config)
            .clock(Arc::new(clock.clone()))
            .registries(registries.clone())
            .build();
        let events = authority.events().unwrap();
        let package =
            ContentPackage::new(b"e2e-master", (1..=n).map(chunk_words).collect()).unwrap();

        Self {
            authority,
            clock,
            registries,
            owner: Party::named("owner"),
            deliverers: vec![Party::named("deliverer-a"), Party::named("deliverer-b")],
            consumer: Party::named("consumer"),
            consumer_enc: SecretKey::from_seed(b"consumer-reveal").unwrap(),
            package,
            events,
        }
    }

    /// Exclusive access to the controller.
    pub fn controller(&self) -> MutexGuard<'_, SessionController> {
        self.authority.lock()
    }

    /// Chunk count.
    #[must_use]
    pub fn n(&self) -> u64 {
        self.package.len()
    }

    /// Active provider.
    #[must_use]
    pub fn provider(&self) -> Address {
        self.authority.session().provider
    }

    /// Every event emitted since the last drain.
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }

    /// Start the session with the exact bond.
    pub fn start(&self) -> Result<()> {
        let n = self.n();
        self.controller().start(
            self.owner.address,
            StartParams {
                root_m: self.package.root(),
                n,
                payment_pd: PAYMENT_PD,
                payment_pc: PAYMENT_PC,
            },
            Amount::from(n) * PAYMENT_PD,
        )
    }

    /// Start, collect bids, prepare every deliverer and list the content.
    pub fn list(&self) -> Result<()> {
        self.start()?;
        let mut c = self.controller();
        for (d, bid) in self.deliverers.iter().zip(BIDS) {
            c.join(d.address, bid)?;
        }
        c.join_stop(self.owner.address)?;
        for d in &self.deliverers {
            c.deliverers_prepared(d.address, "http://cdn.local")?;
        }
        c.prepared(self.owner.address)
    }

    /// Consume request for chunks `a..=n` at [`OFFER`].
    #[must_use]
    pub fn consume_params(&self, a: u64) -> ConsumeParams {
        ConsumeParams {
            consumer: self.consumer.address,
            payment_cp: OFFER,
            start_index: a,
            content_hash: self.package.root(),
            encryption_key: self.consumer_enc.public_point(),
        }
    }

    /// Exact payment for chunks `a..=n` at [`OFFER`].
    #[must_use]
    pub fn consume_value(&self, a: u64) -> Amount {
        Amount::from(self.n() - a + 1) * OFFER
    }

    /// Pay for chunks `a..=n`.
    pub fn consume(&self, a: u64) -> Result<()> {
        self.controller().consume(
            self.consumer.address,
            self.consume_params(a),
            self.consume_value(a),
        )
    }

    /// Active provider shortlists both deliverers at their bids.
    pub fn select_all(&self) -> Result<()> {
        let addresses: Vec<Address> = self.deliverers.iter().map(|d| d.address).collect();
        let provider = self.provider();
        self.controller().select(provider, &addresses, &BIDS)
    }

    /// First deliverer uploads the first chunk, the consumer verifies it and
    /// marks delivery done.
    pub fn deliver(&self) -> Result<()> {
        let a = self.authority.session().a;
        let courier = &self.deliverers[0];
        let m1 = self.package.chunk_hash(a).unwrap();
        let sig = sign_first_chunk(&courier.key, SID, a, &m1)?;
        let mut c = self.controller();
        c.upload_first_chunk(courier.address, SID, a, m1, sig)?;
        c.verify_first_chunk(self.consumer.address, SID)?;
        c.delivered(self.consumer.address)
    }

    /// Receipt for chunks up to `i` signed by `signer`.
    #[must_use]
    pub fn receipt(&self, i: u64, signer: &SigningKey) -> Vec<u8> {
        sign_receipt(
            signer,
            SID,
            i,
            &self.deliverers[0].address,
            &self.consumer.address,
        )
        .unwrap()
    }

    /// First deliverer settles with a consumer receipt for chunks up to `i`.
    pub fn settle(&self, i: u64) -> Result<()> {
        let sig = self.receipt(i, &self.consumer.key);
        self.controller()
            .verify_podq_proof(self.deliverers[0].address, SID, i, &sig)
    }

    /// Active provider reveals the planned keys.
    pub fn reveal(&self) -> Result<()> {
        let session = self.authority.session();
        let plan = reveal_plan(session.n, session.a, session.ctr);
        let (positions, c1, c2) = build_reveal(
            self.package.key_tree(),
            &self.consumer_enc.public_point(),
            &plan,
            b"e2e-nonce",
        )
        .unwrap();
        self.controller()
            .reveal_keys(session.provider, &positions, &c1, &c2)
    }

    /// List, buy `a..=n`, deliver and settle at `i`.
    pub fn run_to_revealing(&self, a: u64, i: u64) -> Result<()> {
        self.list()?;
        self.consume(a)?;
        self.select_all()?;
        self.deliver()?;
        self.settle(i)
    }

    /// [`Self::run_to_revealing`] followed by the key reveal.
    pub fn run_to_revealed(&self, a: u64, i: u64) -> Result<()> {
        self.run_to_revealing(a, i)?;
        self.reveal()
    }

    /// Proof-of-misbehavior bundle for `chunk` as served by `signer`.
    ///
    /// When `corrupt` is set the served chunk decrypts to the wrong words.
    #[must_use]
    pub fn dispute_bundle(&self, chunk: u64, corrupt: bool, signer: &SigningKey) -> DisputeBundle {
        let mut words = chunk_words(chunk);
        if corrupt {
            words[1] = keccak256(b"not the content");
        }
        let cipher = self
            .package
            .key_tree()
            .encrypt_chunk(chunk, &words)
            .unwrap();
        let root = self.package.root();
        let signature = sign_chunk(signer, &root, chunk, &cipher).unwrap();

        let revealed = self.controller().revealed_keys().to_vec();
        let (erk, steps) = locate_leaf(self.n(), chunk, &revealed).unwrap();
        let rk = vpke::decrypt(&self.consumer_enc, &erk).unwrap();
        let proof = vpke::prove(&self.consumer_enc, &erk, &rk).unwrap();

        DisputeBundle {
            steps,
            chunk_ciphertext: cipher,
            provider_signature: signature,
            claimed_hash: self.package.chunk_hash(chunk).unwrap(),
            merkle_proof: self.package.merkle_proof(chunk).unwrap(),
            submitted_erk: vec![erk],
            submitted_rk: vec![rk],
            vpke_proofs: vec![proof],
        }
    }
}
