//! Provider selection when several providers serve the same content.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::harness::{DISPUTE_WINDOW, PAYMENT_PC, PAYMENT_PD};
use crate::{Party, SessionHarness};
use p2pcdn_escrow::{Amount, Error, Round};

/// Register `party` as a second provider of the harness content.
fn register_competitor(h: &SessionHarness, party: &Party, payment_pc: Amount) {
    let registries = &h.registries;
    registries.providers.initialize(party.address);
    registries
        .providers
        .set_payment(party.address, PAYMENT_PD, payment_pc);
    registries
        .content
        .add_provider_to_content_hash(h.package.root(), party.address);
}

#[test]
fn test_cheaper_provider_serves_the_session() {
    let h = SessionHarness::new(8);
    let rival = Party::named("rival-provider");
    h.list().unwrap();
    register_competitor(&h, &rival, 150);

    h.consume(1).unwrap();
    let session = h.authority.session();
    assert_eq!(session.provider, rival.address);
    assert_eq!(session.owner, h.owner.address);
    assert_eq!(session.payment_pc, 150);

    // Only the serving provider shortlists and reveals
    let addresses: Vec<_> = h.deliverers.iter().map(|d| d.address).collect();
    assert!(matches!(
        h.controller().select(h.owner.address, &addresses, &[18, 15]),
        Err(Error::Unauthorized { .. })
    ));
    h.select_all().unwrap();
    h.deliver().unwrap();
    h.settle(8).unwrap();
    h.reveal().unwrap();

    h.clock.advance(DISPUTE_WINDOW);
    h.controller().dispute_timeout(rival.address).unwrap();
    let c = h.controller();
    assert_eq!(c.session().round, Round::Finalized);
    assert_eq!(c.ledger().paid_out(&rival.address), 8 * 150);
    assert_eq!(c.ledger().paid_out(&h.owner.address), 0);
    assert_eq!(c.ledger().paid_out(&h.deliverers[0].address), 8 * PAYMENT_PD);
}

#[test]
fn test_credibility_outranks_price() {
    let h = SessionHarness::new(4);
    let rival = Party::named("rival-provider");
    h.list().unwrap();
    register_competitor(&h, &rival, 150);
    h.registries.providers.record_provide(h.owner.address, 1);

    h.consume(1).unwrap();
    let session = h.authority.session();
    assert_eq!(session.provider, h.owner.address);
    assert_eq!(session.payment_pc, PAYMENT_PC);
}

#[test]
fn test_provider_above_offer_is_skipped() {
    let h = SessionHarness::new(4);
    let rival = Party::named("rival-provider");
    h.list().unwrap();
    register_competitor(&h, &rival, 10_000);

    h.consume(1).unwrap();
    assert_eq!(h.provider(), h.owner.address);
}

#[test]
fn test_offer_below_every_price_fails_cleanly() {
    let h = SessionHarness::new(4);
    h.list().unwrap();

    let mut params = h.consume_params(1);
    params.payment_cp = PAYMENT_PC - 1;
    let value = 4 * params.payment_cp;
    assert!(matches!(
        h.controller().consume(h.consumer.address, params, value),
        Err(Error::NoEligibleProvider)
    ));

    let c = h.controller();
    assert_eq!(c.session().round, Round::Ready);
    assert_eq!(c.ledger().balance(&h.consumer.address), 0);
}

#[test]
fn test_selection_must_come_from_prepared_candidates() {
    let h = SessionHarness::new(4);
    h.list().unwrap();
    h.consume(1).unwrap();
    let stranger = Party::named("stranger");

    let provider = h.provider();
    assert!(matches!(
        h.controller()
            .select(provider, &[h.deliverers[0].address, stranger.address], &[18, 15]),
        Err(Error::NotPrepared(_))
    ));
    assert!(matches!(
        h.controller().select(provider, &[h.deliverers[0].address], &[18, 15]),
        Err(Error::LengthMismatch { .. })
    ));
    assert_eq!(h.authority.session().round, Round::Initiated);
}
