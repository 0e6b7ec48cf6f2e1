//! Honest sessions from listing to reset.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::harness::{DISPUTE_WINDOW, OFFER, PAYMENT_PC, PAYMENT_PD, SID};
use crate::{Party, SessionHarness};
use p2pcdn_escrow::market::delivery::sign_first_chunk;
use p2pcdn_escrow::registry::DEFAULT_CRED;
use p2pcdn_escrow::{Error, Outcome, Round, Session, SessionEvent};

#[test]
fn test_full_delivery_pays_deliverer_whole_bond() {
    let mut h = SessionHarness::new(8);
    h.run_to_revealing(1, 8).unwrap();

    let owner = h.owner.address;
    let courier = h.deliverers[0].address;
    let consumer = h.consumer.address;
    {
        let c = h.controller();
        assert_eq!(c.session().round, Round::Revealing);
        assert_eq!(c.session().ctr, 8);
        assert_eq!(c.session().delivered_chunks, 8);
        assert_eq!(c.ledger().paid_out(&courier), 160);
        assert_eq!(c.ledger().paid_out(&owner), 0);
        assert_eq!(c.ledger().balance(&owner), 0);
        assert_eq!(c.ledger().balance(&consumer), 8 * OFFER);
    }

    let settled = h
        .drain_events()
        .into_iter()
        .find(|e| matches!(e, SessionEvent::PaymentSettled { .. }))
        .unwrap();
    assert_eq!(
        settled,
        SessionEvent::PaymentSettled {
            deliverer: courier,
            deliverer_payment: 160,
            provider: owner,
            provider_refund: 0,
            omega: 8,
        }
    );
}

/// Listed, bought from chunk `a` and shortlisted, but nothing uploaded.
fn selected(n: u64, a: u64) -> SessionHarness {
    let h = SessionHarness::new(n);
    h.list().unwrap();
    h.consume(a).unwrap();
    h.select_all().unwrap();
    h
}

fn assert_nothing_uploaded(h: &SessionHarness) {
    let c = h.controller();
    assert_eq!(c.session().round, Round::Selected);
    assert!(c.receipt(SID).is_none());
}

#[test]
fn test_first_chunk_signed_by_another_deliverer_is_rejected() {
    let h = selected(8, 1);
    let courier = &h.deliverers[0];
    let m1 = h.package.chunk_hash(1).unwrap();
    let sig = sign_first_chunk(&h.deliverers[1].key, SID, 1, &m1).unwrap();

    let err = h
        .controller()
        .upload_first_chunk(courier.address, SID, 1, m1, sig)
        .unwrap_err();
    assert!(matches!(err, Error::BadSignature(_)), "{err}");
    assert_nothing_uploaded(&h);
}

#[test]
fn test_first_chunk_from_unselected_deliverer_is_rejected() {
    let h = selected(8, 1);
    let stranger = Party::named("stranger");
    let m1 = h.package.chunk_hash(1).unwrap();
    let sig = sign_first_chunk(&stranger.key, SID, 1, &m1).unwrap();

    let err = h
        .controller()
        .upload_first_chunk(stranger.address, SID, 1, m1, sig)
        .unwrap_err();
    assert!(matches!(err, Error::Unauthorized { .. }), "{err}");
    assert_nothing_uploaded(&h);
}

#[test]
fn test_first_chunk_must_be_requested_start() {
    let h = selected(8, 3);
    let courier = &h.deliverers[0];
    let m1 = h.package.chunk_hash(1).unwrap();
    let sig = sign_first_chunk(&courier.key, SID, 1, &m1).unwrap();

    let err = h
        .controller()
        .upload_first_chunk(courier.address, SID, 1, m1, sig)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)), "{err}");
    assert_nothing_uploaded(&h);
}

#[test]
fn test_session_id_cannot_be_reused() {
    let h = selected(8, 1);
    let m1 = h.package.chunk_hash(1).unwrap();
    let first = &h.deliverers[0];
    let second = &h.deliverers[1];

    let sig = sign_first_chunk(&first.key, SID, 1, &m1).unwrap();
    h.controller()
        .upload_first_chunk(first.address, SID, 1, m1, sig)
        .unwrap();

    let sig = sign_first_chunk(&second.key, SID, 1, &m1).unwrap();
    let err = h
        .controller()
        .upload_first_chunk(second.address, SID, 1, m1, sig)
        .unwrap_err();
    assert!(matches!(err, Error::SessionIdInUse(id) if id == SID), "{err}");

    let c = h.controller();
    assert_eq!(c.session().round, Round::Selected);
    let receipt = c.receipt(SID).unwrap();
    assert_eq!(receipt.deliverer, first.address);
    assert!(!receipt.verified);
}

#[test]
fn test_verifying_missing_upload_fails() {
    let h = selected(8, 1);
    let err = h
        .controller()
        .verify_first_chunk(h.consumer.address, SID)
        .unwrap_err();
    assert!(matches!(err, Error::NotUploaded(id) if id == SID), "{err}");
    assert_nothing_uploaded(&h);
}

#[test]
fn test_receipt_signed_by_wrong_key_is_rejected() {
    let h = SessionHarness::new(8);
    h.list().unwrap();
    h.consume(1).unwrap();
    h.select_all().unwrap();
    h.deliver().unwrap();

    let forged = h.receipt(8, &h.deliverers[1].key);
    let err = h
        .controller()
        .verify_podq_proof(h.deliverers[0].address, SID, 8, &forged)
        .unwrap_err();
    assert!(matches!(err, Error::BadSignature(_)));

    let c = h.controller();
    assert_eq!(c.session().round, Round::Delivered);
    assert_eq!(c.ledger().balance(&h.owner.address), 8 * PAYMENT_PD);
    assert_eq!(c.ledger().total_released(), 0);
}

#[test]
fn test_only_uploading_deliverer_settles() {
    let h = SessionHarness::new(4);
    h.list().unwrap();
    h.consume(1).unwrap();
    h.select_all().unwrap();
    h.deliver().unwrap();

    let sig = h.receipt(4, &h.consumer.key);
    let err = h
        .controller()
        .verify_podq_proof(h.deliverers[1].address, SID, 4, &sig)
        .unwrap_err();
    assert!(matches!(err, Error::Unauthorized { .. }));

    let err = h
        .controller()
        .verify_podq_proof(h.deliverers[0].address, SID + 1, 4, &sig)
        .unwrap_err();
    assert!(matches!(err, Error::NotUploaded(_)));
}

#[test]
fn test_dispute_window_must_lapse_before_finalizing() {
    let h = SessionHarness::new(8);
    h.run_to_revealed(1, 8).unwrap();
    let owner = h.owner.address;

    h.clock.advance(DISPUTE_WINDOW - 1);
    assert!(matches!(
        h.controller().dispute_timeout(owner),
        Err(Error::TimeoutNotReached { .. })
    ));
    assert_eq!(h.authority.session().round, Round::Revealed);

    h.clock.advance(1);
    h.controller().dispute_timeout(owner).unwrap();
    {
        let c = h.controller();
        assert_eq!(c.session().round, Round::Finalized);
        assert_eq!(c.session().outcome, Outcome::Sold);
        assert_eq!(c.ledger().paid_out(&owner), 8 * PAYMENT_PC);
        assert_eq!(
            c.ledger().balance(&h.consumer.address),
            8 * (OFFER - PAYMENT_PC)
        );
    }

    // Finalizing twice must not pay twice
    assert!(matches!(
        h.controller().dispute_timeout(owner),
        Err(Error::InvalidTransition { .. })
    ));
    assert_eq!(h.controller().ledger().paid_out(&owner), 8 * PAYMENT_PC);

    let providers = h.registries.providers.info(&owner).unwrap();
    assert_eq!(providers.provide_times, 1);
    assert_eq!(providers.involve_del, 2);
    let courier = h
        .registries
        .deliverers
        .info(&h.deliverers[0].address)
        .unwrap();
    assert_eq!(courier.chunks, 8);
    assert_eq!(courier.earned, 160);
    assert_eq!(courier.deliver_times, 1);
    // Shortlisted but never settled: no delivery credit
    let idle = h
        .registries
        .deliverers
        .info(&h.deliverers[1].address)
        .unwrap();
    assert_eq!(idle.deliver_times, 0);
    assert_eq!(idle.cred, DEFAULT_CRED);
    let consumer = h.registries.consumers.info(&h.consumer.address).unwrap();
    assert_eq!(consumer.dl_times, 1);
}

#[test]
fn test_partial_delivery_refunds_owner_and_reveals_subtree() {
    let h = SessionHarness::new(8);
    h.run_to_revealing(3, 5).unwrap();
    let owner = h.owner.address;

    {
        let c = h.controller();
        assert_eq!(c.session().requested_chunks(), 6);
        assert_eq!(c.session().delivered_chunks, 3);
        assert_eq!(c.ledger().paid_out(&h.deliverers[0].address), 60);
        assert_eq!(c.ledger().paid_out(&owner), 100);
    }

    h.reveal().unwrap();
    let positions: Vec<u64> = h
        .controller()
        .revealed_keys()
        .iter()
        .map(|erk| erk.position)
        .collect();
    // Chunks 3 and 4 share node 4; chunk 5 is leaf 11
    assert_eq!(positions, vec![4, 11]);

    h.clock.advance(DISPUTE_WINDOW);
    h.controller().dispute_timeout(owner).unwrap();
    let c = h.controller();
    assert_eq!(c.ledger().paid_out(&owner), 100 + 3 * PAYMENT_PC);
    assert_eq!(
        c.ledger().balance(&h.consumer.address),
        6 * OFFER - 3 * PAYMENT_PC
    );
}

#[test]
fn test_reveal_must_follow_plan() {
    let h = SessionHarness::new(8);
    h.run_to_revealing(1, 8).unwrap();
    let provider = h.controller().session().provider;

    let err = h
        .controller()
        .reveal_keys(provider, &[1], &[], &[])
        .unwrap_err();
    assert!(matches!(err, Error::LengthMismatch { .. }));
    assert!(matches!(
        h.controller().reveal_keys(h.consumer.address, &[0], &[], &[]),
        Err(Error::Unauthorized { .. })
    ));
    assert_eq!(h.authority.session().round, Round::Revealing);
}

#[test]
fn test_reset_returns_leftovers_and_clears_session() {
    let mut h = SessionHarness::new(8);
    h.run_to_revealed(1, 8).unwrap();
    h.clock.advance(DISPUTE_WINDOW);
    let owner = h.owner.address;
    h.controller().dispute_timeout(owner).unwrap();
    h.drain_events();

    h.controller().reset(owner).unwrap();
    {
        let c = h.controller();
        assert_eq!(c.session(), &Session::default());
        assert_eq!(c.ledger().total_held(), 0);
        assert_eq!(c.ledger().total_deposited(), c.ledger().total_released());
        assert_eq!(
            c.ledger().paid_out(&h.consumer.address),
            8 * (OFFER - PAYMENT_PC)
        );
        assert!(c.candidates().is_empty());
        assert!(c.selected_deliverers().is_empty());
        assert!(c.receipt(SID).is_none());
        assert!(c.revealed_keys().is_empty());
    }

    let events = h.drain_events();
    assert_eq!(events.last(), Some(&SessionEvent::SessionReset));
    assert!(events.contains(&SessionEvent::RoundChanged {
        from: Round::Finalized,
        to: Round::Idle,
    }));

    // A second session starts from scratch
    h.run_to_revealing(2, 8).unwrap();
    assert_eq!(h.authority.session().delivered_chunks, 7);
}
