//! Reconciliation pipeline tests: idempotence under redelivery, the
//! subscription/trial/one-off decision tree, mutation events, and the
//! soft payment-ledger dependency.

mod common;

use common::*;
use snapmenu_billing::error::AppError;
use snapmenu_billing::handlers::webhooks::common::{
    process_charge_failed, process_charge_success, process_subscription_disabled,
    process_will_not_renew,
};

const PROVIDER: PaymentProvider = PaymentProvider::Paystack;

// ============ Idempotence ============

/// Replaying the same success event N times yields exactly one
/// subscription row (by code) and at most one payment row (by reference).
#[test]
fn test_replayed_success_event_converges_to_one_row() {
    let conn = setup_test_db();
    let (user, _) = create_test_user(&conn, "replay@example.com");

    let charge = recurring_charge("ref_replay", &user.id, "pro", "monthly");

    for _ in 0..5 {
        process_charge_success(&conn, None, PROVIDER, &charge).expect("Replay should succeed");
    }

    assert_eq!(
        queries::count_subscriptions_by_code(&conn, "sub_ref_replay").unwrap(),
        1,
        "Redeliveries must converge on one subscription row"
    );
    assert_eq!(
        queries::count_payments_for_user(&conn, &user.id).unwrap(),
        1,
        "Redeliveries must not duplicate the payment row"
    );
}

#[test]
fn test_explicit_subscription_code_wins_over_synthesized() {
    let conn = setup_test_db();
    let (user, _) = create_test_user(&conn, "explicit@example.com");

    let mut charge = recurring_charge("ref_x", &user.id, "pro", "monthly");
    charge.subscription_code = Some("SUB_explicit".to_string());

    process_charge_success(&conn, None, PROVIDER, &charge).unwrap();

    assert!(queries::get_subscription_by_code(&conn, "SUB_explicit")
        .unwrap()
        .is_some());
    assert!(queries::get_subscription_by_code(&conn, "sub_ref_x")
        .unwrap()
        .is_none());
}

// ============ Scenario A: recurring yearly success ============

#[test]
fn test_yearly_recurring_success_activates_subscription() {
    let conn = setup_test_db();
    let (user, _) = create_test_user(&conn, "yearly@example.com");

    let charge = recurring_charge("ref_yearly", &user.id, "business", "yearly");
    let before = now();
    process_charge_success(&conn, None, PROVIDER, &charge).unwrap();
    let after = now();

    let sub = queries::get_subscription_by_code(&conn, "sub_ref_yearly")
        .unwrap()
        .expect("Subscription row should exist");

    assert_eq!(sub.status, SubscriptionStatus::Active);
    assert_eq!(sub.plan, PlanTier::Business);
    assert!(!sub.cancel_at_period_end);
    assert!(sub.current_period_end > sub.current_period_start);
    // One calendar year out: between 365 and 366 days from now
    assert!(sub.current_period_end >= before + 365 * ONE_DAY);
    assert!(sub.current_period_end <= after + 366 * ONE_DAY);

    let user = queries::get_user_by_id(&conn, &user.id).unwrap().unwrap();
    assert_eq!(
        user.subscription_tier,
        PlanTier::Business,
        "Entitlement must be updated in the same step as the subscription"
    );
}

// ============ Scenario B: paid trial ============

#[test]
fn test_trial_charge_creates_trialing_subscription() {
    let conn = setup_test_db();
    let (user, _) = create_test_user(&conn, "trial@example.com");

    let charge = one_off_charge("r1", &user.id, "pro", "trial");
    let before = now();
    process_charge_success(&conn, None, PROVIDER, &charge).unwrap();
    let after = now();

    let sub = queries::get_subscription_by_code(&conn, "trial_r1")
        .unwrap()
        .expect("Trial subscription should be keyed on trial_{reference}");

    assert_eq!(sub.status, SubscriptionStatus::Trialing);
    assert!(sub.cancel_at_period_end, "Trials lapse unless upgraded");
    // Default trial length is 7 days
    assert!(sub.current_period_end >= before + 7 * ONE_DAY);
    assert!(sub.current_period_end <= after + 7 * ONE_DAY + 1);

    let user = queries::get_user_by_id(&conn, &user.id).unwrap().unwrap();
    assert_eq!(user.subscription_tier, PlanTier::Pro);
}

#[test]
fn test_trial_days_override_is_clamped() {
    let conn = setup_test_db();
    let (user, _) = create_test_user(&conn, "trial45@example.com");

    let charge = one_off_charge("r45", &user.id, "pro", "trial");
    let before = now();
    process_charge_success(&conn, Some(45), PROVIDER, &charge).unwrap();
    let after = now();

    let sub = queries::get_subscription_by_code(&conn, "trial_r45")
        .unwrap()
        .unwrap();
    assert!(sub.current_period_end >= before + 31 * ONE_DAY);
    assert!(sub.current_period_end <= after + 31 * ONE_DAY + 1);
}

// ============ One-off charges ============

#[test]
fn test_one_off_charge_writes_no_subscription() {
    let conn = setup_test_db();
    let (user, _) = create_test_user(&conn, "oneoff@example.com");

    // No recurring plan, not a trial: a plain one-time charge
    let charge = one_off_charge("ref_oneoff", &user.id, "pro", "monthly");
    process_charge_success(&conn, None, PROVIDER, &charge).unwrap();

    assert!(
        queries::get_subscription_by_code(&conn, "sub_ref_oneoff")
            .unwrap()
            .is_none(),
        "One-off charges imply no recurring entitlement"
    );
    // The charge itself is still recorded
    assert!(queries::get_payment_by_reference(&conn, "ref_oneoff")
        .unwrap()
        .is_some());
    // Entitlement untouched
    let user = queries::get_user_by_id(&conn, &user.id).unwrap().unwrap();
    assert_eq!(user.subscription_tier, PlanTier::Free);
}

// ============ Metadata gate ============

#[test]
fn test_missing_user_id_is_validation_error_with_zero_writes() {
    let conn = setup_test_db();
    let (user, _) = create_test_user(&conn, "gate@example.com");

    let mut charge = recurring_charge("ref_gate", &user.id, "pro", "monthly");
    charge.metadata.user_id = None;

    let err = process_charge_success(&conn, None, PROVIDER, &charge)
        .expect_err("Missing user_id must be rejected");
    assert!(matches!(err, AppError::Validation(_)));

    assert_eq!(
        queries::count_subscriptions_by_code(&conn, "sub_ref_gate").unwrap(),
        0
    );
    assert!(queries::get_payment_by_reference(&conn, "ref_gate")
        .unwrap()
        .is_none());
}

#[test]
fn test_missing_plan_is_validation_error_with_zero_writes() {
    let conn = setup_test_db();
    let (user, _) = create_test_user(&conn, "gate2@example.com");

    let mut charge = recurring_charge("ref_gate2", &user.id, "pro", "monthly");
    charge.metadata.plan = None;

    let err = process_charge_success(&conn, None, PROVIDER, &charge)
        .expect_err("Missing plan must be rejected");
    assert!(matches!(err, AppError::Validation(_)));
    assert!(queries::get_payment_by_reference(&conn, "ref_gate2")
        .unwrap()
        .is_none());
}

#[test]
fn test_unknown_user_is_not_found() {
    let conn = setup_test_db();

    let charge = recurring_charge("ref_ghost", "sm_usr_does_not_exist", "pro", "monthly");
    let err = process_charge_success(&conn, None, PROVIDER, &charge)
        .expect_err("Unknown user must be rejected");
    assert!(matches!(err, AppError::NotFound(_)));
}

// ============ Scenario C + mutation events ============

#[test]
fn test_disable_cancels_subscription_and_downgrades_entitlement() {
    let conn = setup_test_db();
    let (user, _) = create_test_user(&conn, "cancel@example.com");

    let charge = recurring_charge("ref_cancel", &user.id, "pro", "monthly");
    process_charge_success(&conn, None, PROVIDER, &charge).unwrap();

    process_subscription_disabled(&conn, PROVIDER, "sub_ref_cancel").unwrap();

    let sub = queries::get_subscription_by_code(&conn, "sub_ref_cancel")
        .unwrap()
        .unwrap();
    assert_eq!(sub.status, SubscriptionStatus::Canceled);

    let user = queries::get_user_by_id(&conn, &user.id).unwrap().unwrap();
    assert_eq!(user.subscription_tier, PlanTier::Free);
}

#[test]
fn test_disable_unknown_code_is_not_found_with_no_mutation() {
    let conn = setup_test_db();
    let (user, _) = create_test_user(&conn, "nomut@example.com");
    queries::set_user_tier(&conn, &user.id, PlanTier::Pro).unwrap();

    let err = process_subscription_disabled(&conn, PROVIDER, "sub_unknown")
        .expect_err("Unknown code must 404");
    assert!(matches!(err, AppError::NotFound(_)));

    // No user mutation happened
    let user = queries::get_user_by_id(&conn, &user.id).unwrap().unwrap();
    assert_eq!(user.subscription_tier, PlanTier::Pro);
}

/// A provider may deliver a disable, then retry an earlier success for the
/// same code. The stale success must not resurrect the canceled row or
/// re-entitle the user.
#[test]
fn test_stale_success_retry_does_not_resurrect_canceled_subscription() {
    let conn = setup_test_db();
    let (user, _) = create_test_user(&conn, "stale@example.com");

    let charge = recurring_charge("ref_stale", &user.id, "pro", "monthly");
    process_charge_success(&conn, None, PROVIDER, &charge).unwrap();
    process_subscription_disabled(&conn, PROVIDER, "sub_ref_stale").unwrap();

    // Late retry of the original success event
    process_charge_success(&conn, None, PROVIDER, &charge).unwrap();

    let sub = queries::get_subscription_by_code(&conn, "sub_ref_stale")
        .unwrap()
        .unwrap();
    assert_eq!(
        sub.status,
        SubscriptionStatus::Canceled,
        "Stale success retry must not resurrect a canceled subscription"
    );

    let user = queries::get_user_by_id(&conn, &user.id).unwrap().unwrap();
    assert_eq!(
        user.subscription_tier,
        PlanTier::Free,
        "Stale success retry must not re-entitle a canceled user"
    );
}

#[test]
fn test_will_not_renew_sets_flag_only() {
    let conn = setup_test_db();
    let (user, _) = create_test_user(&conn, "nonrenew@example.com");

    let charge = recurring_charge("ref_nr", &user.id, "pro", "monthly");
    process_charge_success(&conn, None, PROVIDER, &charge).unwrap();

    process_will_not_renew(&conn, PROVIDER, "sub_ref_nr").unwrap();

    let sub = queries::get_subscription_by_code(&conn, "sub_ref_nr")
        .unwrap()
        .unwrap();
    assert!(sub.cancel_at_period_end);
    assert_eq!(
        sub.status,
        SubscriptionStatus::Active,
        "Will-not-renew owns only the flag, never the status"
    );

    // Entitlement untouched until the period actually lapses
    let user = queries::get_user_by_id(&conn, &user.id).unwrap().unwrap();
    assert_eq!(user.subscription_tier, PlanTier::Pro);
}

#[test]
fn test_will_not_renew_unknown_code_is_not_found() {
    let conn = setup_test_db();
    let err = process_will_not_renew(&conn, PROVIDER, "sub_missing")
        .expect_err("Unknown code must 404");
    assert!(matches!(err, AppError::NotFound(_)));
}

#[test]
fn test_charge_failed_marks_subscription_past_due() {
    let conn = setup_test_db();
    let (user, _) = create_test_user(&conn, "pastdue@example.com");

    let charge = recurring_charge("ref_pd", &user.id, "pro", "monthly");
    process_charge_success(&conn, None, PROVIDER, &charge).unwrap();

    process_charge_failed(&conn, PROVIDER, Some("sub_ref_pd")).unwrap();

    let sub = queries::get_subscription_by_code(&conn, "sub_ref_pd")
        .unwrap()
        .unwrap();
    assert_eq!(sub.status, SubscriptionStatus::PastDue);
}

#[test]
fn test_charge_failed_without_code_is_noop() {
    let conn = setup_test_db();
    // A failed one-off/trial charge has no canonical code to match
    process_charge_failed(&conn, PROVIDER, None).expect("No code means nothing to transition");
}

#[test]
fn test_charge_failed_unknown_code_is_not_found() {
    let conn = setup_test_db();
    let err = process_charge_failed(&conn, PROVIDER, Some("sub_missing"))
        .expect_err("Unknown code must 404");
    assert!(matches!(err, AppError::NotFound(_)));
}

// ============ Soft payment-ledger dependency ============

/// If the payments store is not provisioned, the subscription and
/// entitlement writes must still land.
#[test]
fn test_ledger_failure_does_not_abort_subscription_write() {
    let conn = setup_test_db();
    let (user, _) = create_test_user(&conn, "soft@example.com");

    conn.execute_batch("DROP TABLE payments").unwrap();

    let charge = recurring_charge("ref_soft", &user.id, "pro", "monthly");
    process_charge_success(&conn, None, PROVIDER, &charge)
        .expect("Ledger failure is soft and must not propagate");

    let sub = queries::get_subscription_by_code(&conn, "sub_ref_soft")
        .unwrap()
        .unwrap();
    assert_eq!(sub.status, SubscriptionStatus::Active);

    let user = queries::get_user_by_id(&conn, &user.id).unwrap().unwrap();
    assert_eq!(user.subscription_tier, PlanTier::Pro);
}

// ============ Ledger contents ============

#[test]
fn test_payment_row_matches_charge() {
    let conn = setup_test_db();
    let (user, _) = create_test_user(&conn, "ledger@example.com");

    let charge = recurring_charge("ref_ledger", &user.id, "pro", "monthly");
    process_charge_success(&conn, None, PROVIDER, &charge).unwrap();

    let payment = queries::get_payment_by_reference(&conn, "ref_ledger")
        .unwrap()
        .expect("Payment row should exist");
    assert_eq!(payment.user_id, user.id);
    assert_eq!(payment.amount_cents, 999_000);
    assert_eq!(payment.currency, "NGN");
    assert_eq!(payment.provider, "paystack");
    assert_eq!(payment.status, "success");
}
