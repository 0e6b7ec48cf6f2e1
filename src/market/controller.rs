//! The session state machine.
//!
//! Every entry point follows the same shape: check the round, check the
//! caller, validate arguments, then mutate. Nothing is written until every
//! check has passed, and ledger movements go through a single
//! [`Settlement`], so a failed call leaves no trace.

use crate::clock::Clock;
use crate::config::MarketConfig;
use crate::crypto::tree::MAX_CHUNKS;
use crate::crypto::vpke::ErkEntry;
use crate::crypto::ProofBackend;
use crate::error::{Error, Result};
use crate::event::{SessionEvent, SessionEventsChannel, SessionEventsSender};
use crate::ledger::{Ledger, Settlement};
use crate::market::bidding::{BidBook, CandidateDeliverer, SelectedDeliverer};
use crate::market::delivery::{first_chunk_digest, receipt_digest, split_bond, ChunkReceipt};
use crate::market::dispute::{adjudicate, DisputeBundle, DisputeContext, Verdict};
use crate::market::ops::select_provider;
use crate::market::reveal::{check_reveal, reveal_plan};
use crate::market::{Outcome, Round, Session, StartParams};
use crate::registry::{
    ConsumerRegistry, ContentRegistry, DelivererRegistry, InMemoryConsumerRegistry,
    InMemoryContentRegistry, InMemoryDelivererRegistry, InMemoryProviderRegistry,
    ProviderRegistry,
};
use crate::types::{Address, Amount, CurvePoint, Hash, Timestamp};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Collaborator registries the session reports to.
#[derive(Clone)]
pub struct Registries {
    /// Content root → providers.
    pub content: Arc<dyn ContentRegistry>,
    /// Provider reputation and prices.
    pub providers: Arc<dyn ProviderRegistry>,
    /// Deliverer reputation.
    pub deliverers: Arc<dyn DelivererRegistry>,
    /// Consumer reputation.
    pub consumers: Arc<dyn ConsumerRegistry>,
}

impl Registries {
    /// Fresh in-memory registries.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            content: Arc::new(InMemoryContentRegistry::new()),
            providers: Arc::new(InMemoryProviderRegistry::new()),
            deliverers: Arc::new(InMemoryDelivererRegistry::new()),
            consumers: Arc::new(InMemoryConsumerRegistry::new()),
        }
    }
}

impl std::fmt::Debug for Registries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registries").finish_non_exhaustive()
    }
}

/// Arguments to `consume`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumeParams {
    /// Paying consumer; must be the caller.
    pub consumer: Address,
    /// Highest per-chunk price the consumer accepts.
    pub payment_cp: Amount,
    /// First requested chunk (1-based).
    pub start_index: u64,
    /// Content root being requested.
    pub content_hash: Hash,
    /// Public key revealed node keys are encrypted to.
    pub encryption_key: CurvePoint,
}

/// Owns the session and every table hanging off it.
pub struct SessionController {
    dispute_window: u64,
    pom_window: u64,
    session: Session,
    ledger: Ledger,
    bids: BidBook,
    receipts: BTreeMap<u64, ChunkReceipt>,
    revealed: Vec<ErkEntry>,
    registries: Registries,
    clock: Arc<dyn Clock>,
    backend: Arc<dyn ProofBackend>,
    events_tx: SessionEventsSender,
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("session", &self.session)
            .field("ledger", &self.ledger)
            .finish_non_exhaustive()
    }
}

fn require_round(operation: &'static str, actual: Round, expected: Round) -> Result<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(Error::InvalidTransition {
            operation,
            round: actual,
        })
    }
}

fn require_caller(operation: &'static str, caller: Address, expected: Address) -> Result<()> {
    if caller == expected {
        Ok(())
    } else {
        Err(Error::Unauthorized { operation, caller })
    }
}

fn require_value(required: Amount, provided: Amount) -> Result<()> {
    if provided < required {
        Err(Error::InsufficientPayment { required, provided })
    } else if provided > required {
        Err(Error::InvalidArgument(format!(
            "overpayment: required {required}, provided {provided}"
        )))
    } else {
        Ok(())
    }
}

fn times(count: u64, price: Amount) -> Result<Amount> {
    Amount::from(count).checked_mul(price).ok_or(Error::Overflow)
}

fn deadline(now: Timestamp, window: u64) -> Result<Timestamp> {
    now.checked_add(window).ok_or(Error::Overflow)
}

impl SessionController {
    /// Create an idle controller.
    #[must_use]
    pub fn new(
        config: &MarketConfig,
        registries: Registries,
        clock: Arc<dyn Clock>,
        backend: Arc<dyn ProofBackend>,
        events_tx: SessionEventsSender,
    ) -> Self {
        Self {
            dispute_window: config.dispute_window_secs,
            pom_window: config.pom_window_secs,
            session: Session::default(),
            ledger: Ledger::new(),
            bids: BidBook::default(),
            receipts: BTreeMap::new(),
            revealed: Vec::new(),
            registries,
            clock,
            backend,
            events_tx,
        }
    }

    // ---- views ----

    /// Current session.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Escrow ledger.
    #[must_use]
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Registries the controller reports to.
    #[must_use]
    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    /// Deliverers that joined, in join order.
    #[must_use]
    pub fn candidates(&self) -> Vec<CandidateDeliverer> {
        self.bids.candidates()
    }

    /// Deliverers that confirmed readiness, in join order.
    #[must_use]
    pub fn prepared_candidates(&self) -> Vec<CandidateDeliverer> {
        self.bids.prepared()
    }

    /// Shortlisted deliverers.
    #[must_use]
    pub fn selected_deliverers(&self) -> Vec<SelectedDeliverer> {
        self.bids.selected()
    }

    /// First-chunk receipt stored under `sid`.
    #[must_use]
    pub fn receipt(&self, sid: u64) -> Option<&ChunkReceipt> {
        self.receipts.get(&sid)
    }

    /// Key material revealed this session.
    #[must_use]
    pub fn revealed_keys(&self) -> &[ErkEntry] {
        &self.revealed
    }

    /// Subscribe to session events.
    #[must_use]
    pub fn subscribe(&self) -> SessionEventsChannel {
        self.events_tx.subscribe()
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events_tx.send(event);
    }

    fn transition(&mut self, to: Round) {
        let from = self.session.round;
        self.session.round = to;
        info!("Session round {from} -> {to}");
        self.emit(SessionEvent::RoundChanged { from, to });
    }

    fn apply_settlement(&mut self, plan: &Settlement) -> Result<()> {
        self.ledger.apply(plan)?;
        for (to, amount) in &plan.releases {
            info!("Released {amount} to {to}");
            self.emit(SessionEvent::FundsReleased {
                to: *to,
                amount: *amount,
            });
        }
        Ok(())
    }

    // ---- setup and bidding ----

    /// Open a session and post the delivery bond `n × payment_pd`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidTransition`] unless idle
    /// - [`Error::InvalidArgument`] for zero or more than [`MAX_CHUNKS`]
    ///   chunks, zero price or overpayment
    /// - [`Error::InsufficientPayment`] if the bond is short
    pub fn start(&mut self, caller: Address, params: StartParams, value: Amount) -> Result<()> {
        require_round("start", self.session.round, Round::Idle)?;
        if params.n == 0 {
            return Err(Error::InvalidArgument("content has no chunks".into()));
        }
        if params.n > MAX_CHUNKS {
            return Err(Error::InvalidArgument(format!(
                "{} chunks exceeds the maximum of {MAX_CHUNKS}",
                params.n
            )));
        }
        if params.payment_pd == 0 {
            return Err(Error::InvalidArgument("deliverer price is zero".into()));
        }
        require_value(times(params.n, params.payment_pd)?, value)?;

        self.ledger.deposit(caller, value)?;
        self.registries.providers.initialize(caller);
        self.registries
            .providers
            .set_payment(caller, params.payment_pd, params.payment_pc);

        self.session = Session {
            root_m: params.root_m,
            n: params.n,
            payment_pd: params.payment_pd,
            payment_pc: params.payment_pc,
            owner: caller,
            provider: caller,
            ..Session::default()
        };
        info!(
            "Session started by {caller}: {} chunks of {}, bond {value}",
            params.n,
            hex::encode(params.root_m)
        );
        self.transition(Round::Joining);
        Ok(())
    }

    /// Bid to deliver at `bid` per chunk.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidTransition`] outside `Joining`
    /// - [`Error::BidTooHigh`] if `bid` exceeds the deliverer price
    pub fn join(&mut self, caller: Address, bid: Amount) -> Result<()> {
        require_round("join", self.session.round, Round::Joining)?;
        self.bids.join(caller, bid, self.session.payment_pd)?;
        self.registries.deliverers.initialize(caller);
        debug!("Deliverer {caller} joined with bid {bid}");
        Ok(())
    }

    /// Close bidding.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidTransition`] outside `Joining`
    /// - [`Error::Unauthorized`] unless called by the provider
    pub fn join_stop(&mut self, caller: Address) -> Result<()> {
        require_round("join_stop", self.session.round, Round::Joining)?;
        require_caller("join_stop", caller, self.session.provider)?;
        self.transition(Round::Ready);
        Ok(())
    }

    /// A candidate confirms it holds the content and serves it at `url`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidTransition`] outside `Ready`
    /// - [`Error::Unauthorized`] if the caller never joined
    pub fn deliverers_prepared(&mut self, caller: Address, url: &str) -> Result<()> {
        require_round("deliverers_prepared", self.session.round, Round::Ready)?;
        if self.bids.mark_prepared(caller, url)? {
            info!("Deliverer {caller} prepared at {url}");
        } else {
            debug!("Deliverer {caller} already prepared");
        }
        Ok(())
    }

    /// List the content so consumers can request it.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidTransition`] outside `Ready`, or if already listed
    /// - [`Error::Unauthorized`] unless called by the provider
    /// - [`Error::NotPrepared`] if no deliverer is prepared
    pub fn prepared(&mut self, caller: Address) -> Result<()> {
        require_round("prepared", self.session.round, Round::Ready)?;
        require_caller("prepared", caller, self.session.provider)?;
        if self.session.listed {
            return Err(Error::InvalidTransition {
                operation: "prepared",
                round: self.session.round,
            });
        }
        if !self.bids.any_prepared() {
            return Err(Error::NotPrepared(Address::ZERO));
        }

        self.registries
            .content
            .add_provider_to_content_hash(self.session.root_m, caller);
        self.registries.providers.record_content_type(caller);
        self.session.listed = true;
        info!("Content {} listed by {caller}", hex::encode(self.session.root_m));
        Ok(())
    }

    /// Alias of [`Self::prepared`].
    ///
    /// # Errors
    ///
    /// See [`Self::prepared`].
    pub fn ready(&mut self, caller: Address) -> Result<()> {
        self.prepared(caller)
    }

    /// Request chunks `start_index..=n`, paying `(n - start_index + 1) ×
    /// payment_cp` into escrow. The best registered provider at or below the
    /// offer serves the session.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidTransition`] unless `Ready` and listed
    /// - [`Error::Unauthorized`] if the caller is not `params.consumer`
    /// - [`Error::InvalidArgument`] for a wrong root, start index or key,
    ///   or overpayment
    /// - [`Error::InsufficientPayment`] if the payment is short
    /// - [`Error::NoEligibleProvider`] if nobody serves at the offer
    pub fn consume(&mut self, caller: Address, params: ConsumeParams, value: Amount) -> Result<()> {
        require_round("consume", self.session.round, Round::Ready)?;
        require_caller("consume", caller, params.consumer)?;
        if !self.session.listed {
            return Err(Error::InvalidTransition {
                operation: "consume",
                round: self.session.round,
            });
        }
        if params.content_hash != self.session.root_m {
            return Err(Error::InvalidArgument(format!(
                "unknown content {}",
                hex::encode(params.content_hash)
            )));
        }
        if params.start_index == 0 || params.start_index > self.session.n {
            return Err(Error::InvalidArgument(format!(
                "start index {} outside 1..={}",
                params.start_index, self.session.n
            )));
        }
        if !self.backend.is_on_curve(&params.encryption_key) {
            return Err(Error::InvalidArgument(
                "encryption key is not a curve point".into(),
            ));
        }
        let requested = self.session.n - params.start_index + 1;
        require_value(times(requested, params.payment_cp)?, value)?;

        let offer = select_provider(
            self.registries.content.as_ref(),
            self.registries.providers.as_ref(),
            &params.content_hash,
            params.payment_cp,
        )?;

        self.ledger.deposit(caller, value)?;
        self.registries.consumers.initialize(caller);
        self.session.consumer = caller;
        self.session.payment_cp = params.payment_cp;
        self.session.a = params.start_index;
        self.session.encryption_key = params.encryption_key;
        self.session.provider = offer.provider;
        self.session.payment_pc = offer.payment_pc;
        info!(
            "Consumer {caller} requested chunks {}..={} from {} at {} per chunk",
            params.start_index, self.session.n, offer.provider, offer.payment_pc
        );
        self.transition(Round::Initiated);
        Ok(())
    }

    /// Shortlist deliverers at agreed bids.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidTransition`] outside `Initiated`
    /// - [`Error::Unauthorized`] unless called by the provider
    /// - see [`BidBook::validate_selection`]
    pub fn select(&mut self, caller: Address, addresses: &[Address], bids: &[Amount]) -> Result<()> {
        require_round("select", self.session.round, Round::Initiated)?;
        require_caller("select", caller, self.session.provider)?;
        let selection = self.bids.validate_selection(addresses, bids)?;
        info!("Provider {caller} selected {} deliverers", selection.len());
        self.bids.commit_selection(selection);
        self.transition(Round::Selected);
        Ok(())
    }

    // ---- delivery ----

    /// Record a selected deliverer's signed first chunk under `sid`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidTransition`] outside `Selected`
    /// - [`Error::Unauthorized`] unless the caller is selected
    /// - [`Error::InvalidArgument`] if `start_chunk` is not the requested start
    /// - [`Error::SessionIdInUse`] if `sid` already has a receipt
    /// - [`Error::BadSignature`] unless the signature recovers to the caller
    pub fn upload_first_chunk(
        &mut self,
        caller: Address,
        sid: u64,
        start_chunk: u64,
        m1: Hash,
        signature: Vec<u8>,
    ) -> Result<()> {
        require_round("upload_first_chunk", self.session.round, Round::Selected)?;
        if !self.bids.is_selected(&caller) {
            return Err(Error::Unauthorized {
                operation: "upload_first_chunk",
                caller,
            });
        }
        if start_chunk != self.session.a {
            return Err(Error::InvalidArgument(format!(
                "first chunk {start_chunk} is not requested start {}",
                self.session.a
            )));
        }
        if self.receipts.contains_key(&sid) {
            return Err(Error::SessionIdInUse(sid));
        }
        let digest = first_chunk_digest(sid, start_chunk, &m1);
        let signer = self.backend.recover_signer(&digest, &signature)?;
        if signer != caller {
            warn!("First chunk for sid {sid} signed by {signer}, uploaded by {caller}");
            return Err(Error::BadSignature(format!(
                "signer mismatch: expected {caller}, recovered {signer}"
            )));
        }

        self.receipts.insert(
            sid,
            ChunkReceipt {
                start_chunk,
                m1,
                signature,
                deliverer: caller,
                verified: false,
                start_time: 0,
            },
        );
        debug!("Stored first chunk receipt for sid {sid} from {caller}");
        Ok(())
    }

    /// The consumer accepts the first chunk uploaded under `sid`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidTransition`] outside `Selected`
    /// - [`Error::Unauthorized`] unless called by the consumer
    /// - [`Error::NotUploaded`] if `sid` has no receipt
    pub fn verify_first_chunk(&mut self, caller: Address, sid: u64) -> Result<()> {
        require_round("verify_first_chunk", self.session.round, Round::Selected)?;
        require_caller("verify_first_chunk", caller, self.session.consumer)?;
        let now = self.clock.now();
        let receipt = self.receipts.get_mut(&sid).ok_or(Error::NotUploaded(sid))?;
        receipt.verified = true;
        receipt.start_time = now;
        info!("Consumer verified first chunk for sid {sid}");
        self.transition(Round::FirstChunkVerified);
        Ok(())
    }

    /// Mark delivery finished. The provider may call this if the consumer
    /// does not.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidTransition`] outside `FirstChunkVerified`
    /// - [`Error::Unauthorized`] unless called by the consumer or provider
    pub fn delivered(&mut self, caller: Address) -> Result<()> {
        require_round("delivered", self.session.round, Round::FirstChunkVerified)?;
        if caller != self.session.consumer && caller != self.session.provider {
            return Err(Error::Unauthorized {
                operation: "delivered",
                caller,
            });
        }
        self.transition(Round::Delivered);
        Ok(())
    }

    /// Settle the delivery bond against a consumer receipt for chunks
    /// `a..=i`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidTransition`] outside `Delivered`
    /// - [`Error::NotUploaded`] if `sid` has no verified receipt
    /// - [`Error::Unauthorized`] unless the caller uploaded that receipt
    /// - [`Error::InvalidArgument`] unless `a ≤ i ≤ n`
    /// - [`Error::BadSignature`] unless the consumer signed the receipt
    pub fn verify_podq_proof(
        &mut self,
        caller: Address,
        sid: u64,
        i: u64,
        signature: &[u8],
    ) -> Result<()> {
        require_round("verify_podq_proof", self.session.round, Round::Delivered)?;
        let receipt = self
            .receipts
            .get(&sid)
            .filter(|r| r.verified)
            .ok_or(Error::NotUploaded(sid))?;
        require_caller("verify_podq_proof", caller, receipt.deliverer)?;

        let split = split_bond(
            self.session.owner,
            caller,
            self.session.n,
            self.session.a,
            i,
            self.session.payment_pd,
        )?;
        let digest = receipt_digest(sid, i, &caller, &self.session.consumer);
        let signer = self.backend.recover_signer(&digest, signature)?;
        if signer != self.session.consumer {
            warn!("Receipt for sid {sid} signed by {signer}, not the consumer");
            return Err(Error::BadSignature(format!(
                "signer mismatch: expected {}, recovered {signer}",
                self.session.consumer
            )));
        }

        self.apply_settlement(&split.plan)?;
        let now = self.clock.now();
        self.session.ctr = i;
        self.session.delivered_chunks = split.omega;
        self.session.settled_deliverer = caller;
        self.session.settled_at = now;
        info!(
            "Delivery settled: {} chunks, {} to {caller}, {} back to {}",
            split.omega, split.deliverer_payment, split.provider_refund, self.session.owner
        );
        self.emit(SessionEvent::PaymentSettled {
            deliverer: caller,
            deliverer_payment: split.deliverer_payment,
            provider: self.session.owner,
            provider_refund: split.provider_refund,
            omega: split.omega,
        });
        self.transition(Round::Revealing);
        Ok(())
    }

    // ---- key reveal ----

    /// Publish encrypted node keys for the owed chunks.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidTransition`] outside `Revealing`
    /// - [`Error::Unauthorized`] unless called by the provider
    /// - see [`check_reveal`]
    pub fn reveal_keys(
        &mut self,
        caller: Address,
        positions: &[u64],
        c1: &[CurvePoint],
        c2: &[CurvePoint],
    ) -> Result<()> {
        require_round("reveal_keys", self.session.round, Round::Revealing)?;
        require_caller("reveal_keys", caller, self.session.provider)?;
        let plan = reveal_plan(self.session.n, self.session.a, self.session.ctr);
        let entries = check_reveal(positions, c1, c2, &plan, self.backend.as_ref())?;
        let now = self.clock.now();
        let timeout_dispute = deadline(now, self.dispute_window)?;

        for entry in &entries {
            self.emit(SessionEvent::KeyRevealed {
                position: entry.position,
                c1: entry.c1,
                c2: entry.c2,
            });
        }
        info!(
            "Provider revealed {} node keys, dispute window closes at {timeout_dispute}",
            entries.len()
        );
        self.revealed = entries;
        self.session.timeout_dispute = timeout_dispute;
        self.transition(Round::Revealed);
        Ok(())
    }

    // ---- disputes ----

    /// The consumer contests the revealed keys.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidTransition`] outside `Revealed`
    /// - [`Error::Unauthorized`] unless called by the consumer
    /// - [`Error::DeadlinePassed`] once the dispute window has closed
    pub fn wrong_rk(&mut self, caller: Address) -> Result<()> {
        require_round("wrong_rk", self.session.round, Round::Revealed)?;
        require_caller("wrong_rk", caller, self.session.consumer)?;
        let now = self.clock.now();
        if now >= self.session.timeout_dispute {
            return Err(Error::DeadlinePassed {
                now,
                deadline: self.session.timeout_dispute,
            });
        }
        let timeout_pom = deadline(now, self.pom_window)?;

        self.registries
            .providers
            .record_misbehave(self.session.provider);
        self.session.timeout_pom = timeout_pom;
        warn!(
            "Consumer {caller} disputed keys from {}, proof due by {timeout_pom}",
            self.session.provider
        );
        self.emit(SessionEvent::DisputeFiled {
            consumer: caller,
            timeout_pom,
        });
        self.transition(Round::Disputed);
        Ok(())
    }

    /// Submit a proof of misbehavior and settle the dispute.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidTransition`] outside `Disputed`
    /// - [`Error::Unauthorized`] unless called by the provider or consumer
    /// - [`Error::ProofInvalid`] for a malformed bundle, with no state change
    pub fn pom(&mut self, caller: Address, bundle: &DisputeBundle) -> Result<Verdict> {
        require_round("pom", self.session.round, Round::Disputed)?;
        if caller != self.session.consumer && caller != self.session.provider {
            return Err(Error::Unauthorized {
                operation: "pom",
                caller,
            });
        }
        let ctx = DisputeContext {
            root_m: &self.session.root_m,
            n: self.session.n,
            a: self.session.a,
            ctr: self.session.ctr,
            provider: &self.session.provider,
            encryption_key: &self.session.encryption_key,
            revealed: &self.revealed,
        };
        let verdict = adjudicate(&ctx, bundle, self.backend.as_ref())?;
        self.resolve(verdict)?;
        Ok(verdict)
    }

    /// Close an abandoned dispute in the provider's favor.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidTransition`] outside `Disputed`
    /// - [`Error::TimeoutNotReached`] before the proof deadline
    pub fn pom_timeout(&mut self, caller: Address) -> Result<()> {
        require_round("pom_timeout", self.session.round, Round::Disputed)?;
        let now = self.clock.now();
        if now < self.session.timeout_pom {
            return Err(Error::TimeoutNotReached {
                now,
                deadline: self.session.timeout_pom,
            });
        }
        debug!("Proof window expired, closed by {caller}");
        self.resolve(Verdict::ClaimRejected)
    }

    fn resolve(&mut self, verdict: Verdict) -> Result<()> {
        let session = &self.session;
        let (plan, outcome) = match verdict {
            Verdict::ProviderAtFault { .. } => {
                let unfulfilled = session.requested_chunks() - session.delivered_chunks;
                let refund = times(unfulfilled, session.payment_pc)?;
                (
                    Settlement::new()
                        .debit(session.consumer, refund)
                        .release(session.consumer, refund),
                    Outcome::NotSold,
                )
            }
            Verdict::ClaimRejected => {
                let payment = times(session.delivered_chunks, session.payment_pc)?;
                (
                    Settlement::new()
                        .debit(session.consumer, payment)
                        .release(session.provider, payment),
                    Outcome::Sold,
                )
            }
        };
        self.apply_settlement(&plan)?;

        match verdict {
            Verdict::ProviderAtFault { chunk } => {
                // The provisional misbehavior from wrong_rk stands
                warn!(
                    "Provider {} at fault on chunk {chunk}",
                    self.session.provider
                );
            }
            Verdict::ClaimRejected => {
                self.registries
                    .consumers
                    .record_misbehave(self.session.consumer);
                self.registries
                    .providers
                    .retract_misbehave(self.session.provider);
                info!("Dispute by {} rejected", self.session.consumer);
            }
        }
        self.session.outcome = outcome;
        self.emit(SessionEvent::DisputeResolved { verdict, outcome });
        self.transition(Round::Resolved);
        Ok(())
    }

    /// Close an undisputed session once the dispute window has passed.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidTransition`] outside `Revealed`
    /// - [`Error::TimeoutNotReached`] before the dispute deadline
    pub fn dispute_timeout(&mut self, caller: Address) -> Result<()> {
        require_round("dispute_timeout", self.session.round, Round::Revealed)?;
        let now = self.clock.now();
        if now < self.session.timeout_dispute {
            return Err(Error::TimeoutNotReached {
                now,
                deadline: self.session.timeout_dispute,
            });
        }
        let omega = self.session.delivered_chunks;
        let payment = times(omega, self.session.payment_pc)?;
        let deliverer_payment = times(omega, self.session.payment_pd)?;
        let plan = Settlement::new()
            .debit(self.session.consumer, payment)
            .release(self.session.provider, payment);
        self.apply_settlement(&plan)?;

        let involved = self.bids.selected().len() as u64;
        let settled = self.session.settled_deliverer;
        let started = self
            .receipts
            .values()
            .find(|r| r.verified && r.deliverer == settled)
            .map_or(self.session.settled_at, |r| r.start_time);
        let elapsed = self.session.settled_at.saturating_sub(started);

        self.registries
            .providers
            .record_provide(self.session.provider, involved);
        // Shortlisted deliverers that never settled earn no delivery record
        self.registries
            .deliverers
            .record_delivery(settled, omega, deliverer_payment, elapsed);
        self.registries
            .consumers
            .record_download(self.session.consumer);

        self.session.outcome = Outcome::Sold;
        info!("Session finalized by {caller}: provider paid {payment}");
        self.transition(Round::Finalized);
        Ok(())
    }

    // ---- reset ----

    /// Return leftover escrow and clear the session.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidTransition`] unless `Resolved` or `Finalized`
    pub fn reset(&mut self, caller: Address) -> Result<()> {
        if !self.session.round.is_terminal() {
            return Err(Error::InvalidTransition {
                operation: "reset",
                round: self.session.round,
            });
        }
        let released = self.ledger.release_all()?;
        for (to, amount) in released {
            info!("Returned {amount} to {to}");
            self.emit(SessionEvent::FundsReleased { to, amount });
        }

        self.bids.clear();
        self.receipts.clear();
        self.revealed.clear();
        self.transition(Round::Idle);
        self.session = Session::default();
        info!("Session reset by {caller}");
        self.emit(SessionEvent::SessionReset);
        Ok(())
    }
}
