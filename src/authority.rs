//! Escrow authority - a shareable handle around the session controller.

use crate::clock::{Clock, SystemClock};
use crate::config::MarketConfig;
use crate::crypto::{ProofBackend, Secp256k1Backend};
use crate::event::{create_event_channel, SessionEventsChannel, SessionEventsSender};
use crate::market::{Registries, Session, SessionController};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use tracing::info;

/// Builder for constructing an escrow authority.
pub struct EscrowBuilder {
    config: MarketConfig,
    registries: Option<Registries>,
    clock: Option<Arc<dyn Clock>>,
    backend: Option<Arc<dyn ProofBackend>>,
}

impl EscrowBuilder {
    /// Create a new builder with the given configuration.
    #[must_use]
    pub fn new(config: MarketConfig) -> Self {
        Self {
            config,
            registries: None,
            clock: None,
            backend: None,
        }
    }

    /// Report to these registries instead of fresh in-memory ones.
    #[must_use]
    pub fn registries(mut self, registries: Registries) -> Self {
        self.registries = Some(registries);
        self
    }

    /// Read deadlines from this clock instead of the wall clock.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Verify proofs with this backend instead of secp256k1.
    #[must_use]
    pub fn backend(mut self, backend: Arc<dyn ProofBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Build the authority.
    #[must_use]
    pub fn build(self) -> EscrowAuthority {
        info!(
            "Building escrow authority: dispute window {}s, proof window {}s",
            self.config.dispute_window_secs, self.config.pom_window_secs
        );

        let (events_tx, events_rx) = create_event_channel(self.config.event_capacity);
        let controller = SessionController::new(
            &self.config,
            self.registries.unwrap_or_else(Registries::in_memory),
            self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            self.backend.unwrap_or_else(|| Arc::new(Secp256k1Backend)),
            events_tx.clone(),
        );

        EscrowAuthority {
            config: self.config,
            controller: Arc::new(Mutex::new(controller)),
            events_tx,
            events_rx: Arc::new(Mutex::new(Some(events_rx))),
        }
    }
}

/// Shared escrow authority.
///
/// Clones share one controller. Each call takes the lock once and runs to
/// completion, so entry points never interleave.
#[derive(Clone)]
pub struct EscrowAuthority {
    config: MarketConfig,
    controller: Arc<Mutex<SessionController>>,
    events_tx: SessionEventsSender,
    events_rx: Arc<Mutex<Option<SessionEventsChannel>>>,
}

impl EscrowAuthority {
    /// Configuration the authority was built with.
    #[must_use]
    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    /// Run `f` with exclusive access to the controller.
    pub fn with<R>(&self, f: impl FnOnce(&mut SessionController) -> R) -> R {
        f(&mut self.controller.lock())
    }

    /// Exclusive access to the controller until the guard drops.
    pub fn lock(&self) -> MutexGuard<'_, SessionController> {
        self.controller.lock()
    }

    /// Snapshot of the current session.
    #[must_use]
    pub fn session(&self) -> Session {
        self.controller.lock().session().clone()
    }

    /// Get the receiver created with the authority.
    ///
    /// Note: Can only be called once. Subsequent calls return None.
    pub fn events(&self) -> Option<SessionEventsChannel> {
        self.events_rx.lock().take()
    }

    /// Subscribe to session events.
    #[must_use]
    pub fn subscribe_events(&self) -> SessionEventsChannel {
        self.events_tx.subscribe()
    }
}

impl std::fmt::Debug for EscrowAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EscrowAuthority")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
