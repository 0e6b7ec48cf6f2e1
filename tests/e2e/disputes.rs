//! Disputes over revealed keys and proofs of misbehavior.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::harness::{DISPUTE_WINDOW, OFFER, PAYMENT_PC, PAYMENT_PD, POM_WINDOW, START_TIME};
use crate::SessionHarness;
use p2pcdn_escrow::registry::DEFAULT_CRED;
use p2pcdn_escrow::{DisputeBundle, Error, Outcome, Round, SessionEvent, Verdict};

/// Chunks 1..=5 of 8 delivered and revealed, then disputed.
fn disputed() -> SessionHarness {
    let h = SessionHarness::new(8);
    h.run_to_revealed(1, 5).unwrap();
    h.controller().wrong_rk(h.consumer.address).unwrap();
    h
}

#[test]
fn test_corrupted_chunk_refunds_consumer() {
    let mut h = disputed();
    let owner = h.owner.address;
    let consumer = h.consumer.address;
    let bundle = h.dispute_bundle(3, true, &h.owner.key);
    assert_eq!(bundle.steps, vec![1, 4, 9]);

    let verdict = h.controller().pom(consumer, &bundle).unwrap();
    assert_eq!(verdict, Verdict::ProviderAtFault { chunk: 3 });

    {
        let c = h.controller();
        assert_eq!(c.session().round, Round::Resolved);
        assert_eq!(c.session().outcome, Outcome::NotSold);
        // Three requested chunks were never acknowledged
        assert_eq!(c.ledger().paid_out(&consumer), 3 * PAYMENT_PC);
        assert_eq!(c.ledger().paid_out(&owner), 3 * PAYMENT_PD);
    }
    let provider = h.registries.providers.info(&owner).unwrap();
    assert_eq!(provider.misbehave_times, 1);
    assert_eq!(provider.cred, DEFAULT_CRED - 10);

    let events = h.drain_events();
    assert!(events.contains(&SessionEvent::DisputeFiled {
        consumer,
        timeout_pom: START_TIME + POM_WINDOW,
    }));
    assert!(events.contains(&SessionEvent::DisputeResolved {
        verdict,
        outcome: Outcome::NotSold,
    }));

    h.controller().reset(owner).unwrap();
    let c = h.controller();
    assert_eq!(c.ledger().paid_out(&consumer), 8 * OFFER);
    assert_eq!(c.ledger().total_held(), 0);
}

#[test]
fn test_honest_chunk_rejects_claim() {
    let h = disputed();
    let owner = h.owner.address;
    let consumer = h.consumer.address;
    let bundle = h.dispute_bundle(3, false, &h.owner.key);

    let verdict = h.controller().pom(owner, &bundle).unwrap();
    assert_eq!(verdict, Verdict::ClaimRejected);

    {
        let c = h.controller();
        assert_eq!(c.session().round, Round::Resolved);
        assert_eq!(c.session().outcome, Outcome::Sold);
        assert_eq!(c.ledger().paid_out(&owner), 3 * PAYMENT_PD + 5 * PAYMENT_PC);
        assert_eq!(c.ledger().balance(&consumer), 8 * OFFER - 5 * PAYMENT_PC);
    }
    let provider = h.registries.providers.info(&owner).unwrap();
    assert_eq!(provider.misbehave_times, 0);
    assert_eq!(provider.cred, DEFAULT_CRED);
    let buyer = h.registries.consumers.info(&consumer).unwrap();
    assert_eq!(buyer.misbehave_times, 1);
}

#[test]
fn test_chunk_signed_by_someone_else_rejects_claim() {
    let h = disputed();
    let bundle = h.dispute_bundle(3, true, &h.deliverers[0].key);
    let verdict = h.controller().pom(h.consumer.address, &bundle).unwrap();
    assert_eq!(verdict, Verdict::ClaimRejected);
}

#[test]
fn test_malformed_bundle_leaves_dispute_open() {
    let h = disputed();
    let consumer = h.consumer.address;
    let good = h.dispute_bundle(3, true, &h.owner.key);

    let mut no_steps = good.clone();
    no_steps.steps.clear();
    let mut broken_descent = good.clone();
    broken_descent.steps = vec![1, 5];
    let mut misaligned = good.clone();
    misaligned.vpke_proofs.clear();

    for bundle in [no_steps, broken_descent, misaligned] {
        let err = h.controller().pom(consumer, &bundle).unwrap_err();
        assert!(matches!(err, Error::ProofInvalid(_)), "{err}");
    }

    {
        let c = h.controller();
        assert_eq!(c.session().round, Round::Disputed);
        assert_eq!(c.session().outcome, Outcome::Pending);
        assert_eq!(c.ledger().paid_out(&consumer), 0);
    }

    // The well-formed bundle still settles it
    assert!(matches!(
        h.controller().pom(consumer, &good),
        Ok(Verdict::ProviderAtFault { chunk: 3 })
    ));
}

#[test]
fn test_outsider_cannot_submit_proof() {
    let h = disputed();
    let bundle = h.dispute_bundle(3, true, &h.owner.key);
    assert!(matches!(
        h.controller().pom(h.deliverers[0].address, &bundle),
        Err(Error::Unauthorized { .. })
    ));
}

#[test]
fn test_abandoned_dispute_times_out_for_provider() {
    let h = disputed();
    let owner = h.owner.address;

    h.clock.advance(POM_WINDOW - 1);
    assert!(matches!(
        h.controller().pom_timeout(owner),
        Err(Error::TimeoutNotReached { .. })
    ));

    h.clock.advance(1);
    h.controller().pom_timeout(owner).unwrap();
    let c = h.controller();
    assert_eq!(c.session().round, Round::Resolved);
    assert_eq!(c.session().outcome, Outcome::Sold);
    assert_eq!(c.ledger().paid_out(&owner), 3 * PAYMENT_PD + 5 * PAYMENT_PC);
}

#[test]
fn test_dispute_after_window_is_too_late() {
    let h = SessionHarness::new(8);
    h.run_to_revealed(1, 5).unwrap();
    h.clock.advance(DISPUTE_WINDOW);

    assert!(matches!(
        h.controller().wrong_rk(h.consumer.address),
        Err(Error::DeadlinePassed { .. })
    ));
    assert_eq!(h.authority.session().round, Round::Revealed);
    assert!(matches!(
        h.controller().wrong_rk(h.owner.address),
        Err(Error::Unauthorized { .. })
    ));
}

#[test]
fn test_bundle_survives_json() {
    let h = disputed();
    let bundle = h.dispute_bundle(3, true, &h.owner.key);
    let json = serde_json::to_string(&bundle).unwrap();
    let decoded: DisputeBundle = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded, bundle);

    assert!(matches!(
        h.controller().pom(h.consumer.address, &decoded),
        Ok(Verdict::ProviderAtFault { chunk: 3 })
    ));
}
