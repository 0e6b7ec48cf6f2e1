//! # p2pcdn-escrow
//!
//! Escrow and dispute authority for a trust-minimized peer-to-peer content
//! delivery market.
//!
//! A provider publishes content as a Merkle root over encrypted chunks and
//! posts a bond to pay deliverers. Deliverers bid, a consumer pays into
//! escrow, and the best-ranked provider serves it through shortlisted
//! deliverers. The consumer's signed receipt releases the deliverers' pay;
//! the provider then reveals the content keys, encrypted to the consumer,
//! and is paid once the dispute window closes. A consumer handed bad keys
//! can prove it cryptographically and get its money back.
//!
//! ## Layout
//!
//! - [`market`]: the session state machine and its components
//! - [`ledger`]: escrowed balances and atomic settlements
//! - [`crypto`]: signatures, Merkle proofs, key trees and decryption proofs
//! - [`registry`]: reputation and content registries
//! - [`authority`]: a shareable, locked handle for running a session
//!
//! ## Example
//!
//! ```no_run
//! use p2pcdn_escrow::{EscrowBuilder, MarketConfig};
//!
//! let authority = EscrowBuilder::new(MarketConfig::default()).build();
//! let mut events = authority.subscribe_events();
//! println!("round: {}", authority.session().round);
//! # let _ = events.try_recv();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod authority;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod error;
pub mod event;
pub mod ledger;
pub mod market;
pub mod registry;
pub mod types;

pub use authority::{EscrowAuthority, EscrowBuilder};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::MarketConfig;
pub use error::{Error, Result};
pub use event::{create_event_channel, SessionEvent};
pub use ledger::{Ledger, Settlement};
pub use market::controller::ConsumeParams;
pub use market::{DisputeBundle, Outcome, Round, Session, SessionController, StartParams, Verdict};
pub use types::{Address, Amount, CurvePoint, Hash, Timestamp};
