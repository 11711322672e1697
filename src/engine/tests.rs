use std::sync::Arc;

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use ulid::Ulid;

use super::*;
use crate::clock::{Clock, FixedClock};
use crate::config::EngineSettings;
use crate::model::*;
use crate::notify::NotifyHub;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn guest(id: &str) -> GuestProfile {
    GuestProfile {
        guest_id: id.into(),
        first_name: "Mia".into(),
        last_name: "Jensen".into(),
        email: "mia@example.com".into(),
        phone: "+4520000000".into(),
        nationality: "DK".into(),
        passport_number: Some("208123456".into()),
        visa_type: Some("dtv".into()),
        visa_expiry: Some(d(2026, 1, 1)),
        thai_address: Some("88/12 Soi Sukhumvit 31, Bangkok".into()),
        guest_score: Some(87.5),
        previous_bookings: 2,
        verified: true,
    }
}

fn pricing(total: i64) -> PricingBreakdown {
    PricingBreakdown::compute(PricingInput {
        base_rent: Decimal::new(total, 0),
        deposit_required: Decimal::new(total / 3, 0),
        ..Default::default()
    })
    .unwrap()
}

fn details(check_in: NaiveDate, check_out: NaiveDate) -> BookingDetails {
    BookingDetails::new(check_in, check_out, 2).unwrap()
}

fn test_engine(today: NaiveDate) -> (Engine, Arc<FixedClock>) {
    test_engine_with(today, EngineSettings::default())
}

fn test_engine_with(today: NaiveDate, settings: EngineSettings) -> (Engine, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::at_date(today));
    let engine = Engine::new(settings, clock.clone(), Arc::new(NotifyHub::new()));
    (engine, clock)
}

async fn book(
    engine: &Engine,
    property: &str,
    check_in: NaiveDate,
    check_out: NaiveDate,
) -> Result<Booking, EngineError> {
    engine
        .create_booking(property, guest("g1"), details(check_in, check_out), pricing(60_000))
        .await
}

// ── Creation ─────────────────────────────────────────────

#[tokio::test]
async fn engine_create_booking_starts_pending() {
    let (engine, _) = test_engine(d(2025, 1, 1));
    let b = book(&engine, "P1", d(2025, 3, 1), d(2025, 4, 15)).await.unwrap();

    assert_eq!(b.status, BookingStatus::Pending);
    assert_eq!(b.payment_status, PaymentStatus::Pending);
    assert_eq!(b.details.stay_duration_days(), 45);
    assert_eq!(b.created_at, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
    assert!(b.confirmed_at.is_none());
    assert!(!b.tm30_filed && !b.contract_signed && !b.deposit_paid);
    assert!(!engine.check_availability("P1", d(2025, 3, 1), d(2025, 4, 15)).await);

    let stored = engine.get_booking(b.booking_id).await.unwrap();
    assert_eq!(stored, b);
}

#[tokio::test]
async fn engine_minimum_stay_enforced() {
    let (engine, _) = test_engine(d(2025, 1, 1));
    let result = book(&engine, "P1", d(2025, 3, 1), d(2025, 3, 30)).await;
    assert!(matches!(result, Err(EngineError::ComplianceViolation(_))));
    // Nothing was blocked.
    assert!(engine.check_availability("P1", d(2025, 3, 1), d(2025, 3, 30)).await);

    // Exactly 30 nights is fine.
    assert!(book(&engine, "P1", d(2025, 3, 1), d(2025, 3, 31)).await.is_ok());
}

#[tokio::test]
async fn engine_overlapping_booking_conflicts() {
    let (engine, _) = test_engine(d(2025, 1, 1));
    book(&engine, "P1", d(2025, 3, 1), d(2025, 4, 15)).await.unwrap();

    let result = book(&engine, "P1", d(2025, 3, 20), d(2025, 4, 25)).await;
    assert_eq!(
        result,
        Err(EngineError::AvailabilityConflict { property_id: "P1".into(), date: d(2025, 3, 20) })
    );

    // Same dates, different property.
    assert!(book(&engine, "P2", d(2025, 3, 20), d(2025, 4, 25)).await.is_ok());
    // Starts on the previous check-out day.
    assert!(book(&engine, "P1", d(2025, 4, 15), d(2025, 5, 20)).await.is_ok());
}

#[tokio::test]
async fn engine_rejects_bad_property_id_and_guest() {
    let (engine, _) = test_engine(d(2025, 1, 1));
    let result = book(&engine, "  ", d(2025, 3, 1), d(2025, 4, 15)).await;
    assert!(matches!(result, Err(EngineError::InvalidInput(_))));

    let long = "p".repeat(crate::limits::MAX_PROPERTY_ID_LEN + 1);
    let result = book(&engine, &long, d(2025, 3, 1), d(2025, 4, 15)).await;
    assert!(matches!(result, Err(EngineError::LimitExceeded(_))));

    let g = guest("  ");
    let result = engine
        .create_booking("P1", g, details(d(2025, 3, 1), d(2025, 4, 15)), pricing(1_000))
        .await;
    assert!(matches!(result, Err(EngineError::InvalidInput(_))));
}

#[tokio::test]
async fn engine_booking_ids_are_unique() {
    let (engine, _) = test_engine(d(2025, 1, 1));
    let mut ids = std::collections::HashSet::new();
    for i in 0..20 {
        let b = book(&engine, &format!("P{i}"), d(2025, 3, 1), d(2025, 4, 1)).await.unwrap();
        assert!(ids.insert(b.booking_id));
    }
}

// ── Transitions ──────────────────────────────────────────

#[tokio::test]
async fn engine_confirm_then_check_in_then_check_out() {
    let (engine, clock) = test_engine(d(2025, 1, 1));
    let b = book(&engine, "P1", d(2025, 3, 1), d(2025, 4, 15)).await.unwrap();

    let confirmed = engine.confirm_booking(b.booking_id).await.unwrap();
    assert_eq!(confirmed.status, BookingStatus::Confirmed);
    assert!(confirmed.confirmed_at.is_some());
    assert!(confirmed.confirmation_sent);
    assert!(!confirmed.check_in_instructions_sent);

    clock.set_date(d(2025, 3, 1));
    let checked_in = engine.check_in_guest(b.booking_id, CheckInData::default()).await.unwrap();
    assert_eq!(checked_in.status, BookingStatus::CheckedIn);
    assert_eq!(checked_in.checked_in_at, Some(clock.now()));
    assert!(checked_in.tm30_filed);
    assert!(checked_in.check_in_instructions_sent);
    assert_eq!(checked_in.tm30_address, checked_in.guest.thai_address);

    clock.set_date(d(2025, 4, 15));
    let out = engine.check_out_guest(b.booking_id).await.unwrap();
    assert_eq!(out.status, BookingStatus::CheckedOut);
    assert!(out.checked_out_at.is_some());
    // Past stays stay on the calendar.
    assert!(!engine.check_availability("P1", d(2025, 3, 1), d(2025, 4, 15)).await);
}

#[tokio::test]
async fn engine_check_in_uses_supplied_arrival_and_address() {
    let (engine, _) = test_engine(d(2025, 1, 1));
    let b = book(&engine, "P1", d(2025, 3, 1), d(2025, 4, 15)).await.unwrap();
    engine.confirm_booking(b.booking_id).await.unwrap();

    let arrived = Utc.with_ymd_and_hms(2025, 3, 1, 15, 30, 0).unwrap();
    let data = CheckInData {
        arrived_at: Some(arrived),
        tm30_address: Some("Unit 4B, 9 Nimman Rd, Chiang Mai".into()),
    };
    let checked_in = engine.check_in_guest(b.booking_id, data).await.unwrap();
    assert_eq!(checked_in.checked_in_at, Some(arrived));
    assert_eq!(checked_in.tm30_address.as_deref(), Some("Unit 4B, 9 Nimman Rd, Chiang Mai"));
}

#[tokio::test]
async fn engine_confirm_requires_pending() {
    let (engine, _) = test_engine(d(2025, 1, 1));
    let b = book(&engine, "P1", d(2025, 3, 1), d(2025, 4, 15)).await.unwrap();
    engine.confirm_booking(b.booking_id).await.unwrap();

    let again = engine.confirm_booking(b.booking_id).await;
    assert_eq!(
        again,
        Err(EngineError::InvalidStateTransition {
            from: BookingStatus::Confirmed,
            transition: Transition::Confirm,
        })
    );
}

#[tokio::test]
async fn engine_check_in_requires_confirmed() {
    let (engine, _) = test_engine(d(2025, 1, 1));
    let b = book(&engine, "P1", d(2025, 3, 1), d(2025, 4, 15)).await.unwrap();
    let result = engine.check_in_guest(b.booking_id, CheckInData::default()).await;
    assert!(matches!(
        result,
        Err(EngineError::InvalidStateTransition { from: BookingStatus::Pending, .. })
    ));
    let unchanged = engine.get_booking(b.booking_id).await.unwrap();
    assert_eq!(unchanged.status, BookingStatus::Pending);
    assert!(!unchanged.tm30_filed);
}

#[tokio::test]
async fn engine_unknown_booking_not_found() {
    let (engine, _) = test_engine(d(2025, 1, 1));
    let id = Ulid::new();
    assert_eq!(engine.get_booking(id).await, Err(EngineError::NotFound(id)));
    assert_eq!(engine.confirm_booking(id).await, Err(EngineError::NotFound(id)));
    assert!(matches!(engine.cancel_booking(id, "x").await, Err(EngineError::NotFound(_))));
    assert!(matches!(
        engine.check_in_guest(id, CheckInData::default()).await,
        Err(EngineError::NotFound(_))
    ));
}

#[tokio::test]
async fn engine_deposit_gate_on_confirm() {
    let settings = EngineSettings {
        require_deposit_before_confirm: true,
        ..Default::default()
    };
    let (engine, _) = test_engine_with(d(2025, 1, 1), settings);
    let b = book(&engine, "P1", d(2025, 3, 1), d(2025, 4, 15)).await.unwrap();

    assert_eq!(
        engine.confirm_booking(b.booking_id).await,
        Err(EngineError::PaymentRequired(b.booking_id))
    );

    let paid = engine.record_deposit(b.booking_id).await.unwrap();
    assert!(paid.deposit_paid);
    assert_eq!(paid.payment_status, PaymentStatus::Partial);

    let confirmed = engine.confirm_booking(b.booking_id).await.unwrap();
    assert_eq!(confirmed.status, BookingStatus::Confirmed);
}

#[tokio::test]
async fn engine_full_deposit_marks_paid() {
    let (engine, _) = test_engine(d(2025, 1, 1));
    let full = PricingBreakdown::compute(PricingInput {
        base_rent: Decimal::new(40_000, 0),
        deposit_required: Decimal::new(40_000, 0),
        ..Default::default()
    })
    .unwrap();
    let b = engine
        .create_booking("P1", guest("g1"), details(d(2025, 3, 1), d(2025, 4, 1)), full)
        .await
        .unwrap();
    let paid = engine.record_deposit(b.booking_id).await.unwrap();
    assert_eq!(paid.payment_status, PaymentStatus::Paid);
}

#[tokio::test]
async fn engine_contract_and_deposit_rejected_when_closed() {
    let (engine, _) = test_engine(d(2025, 1, 1));
    let b = book(&engine, "P1", d(2025, 3, 1), d(2025, 4, 15)).await.unwrap();
    assert!(engine.sign_contract(b.booking_id).await.unwrap().contract_signed);

    engine.cancel_booking(b.booking_id, "guest_request").await.unwrap();
    assert!(matches!(engine.sign_contract(b.booking_id).await, Err(EngineError::InvalidInput(_))));
    assert!(matches!(engine.record_deposit(b.booking_id).await, Err(EngineError::InvalidInput(_))));
}

// ── Cancellation ─────────────────────────────────────────

#[tokio::test]
async fn engine_cancel_refund_uses_injected_today() {
    let (engine, clock) = test_engine(d(2025, 1, 1));
    let cases = [
        (d(2025, 1, 30), 30, 95),
        (d(2025, 1, 31), 29, 75),
        (d(2025, 2, 15), 14, 75),
        (d(2025, 2, 22), 7, 50),
        (d(2025, 2, 23), 6, 25),
        (d(2025, 3, 5), -4, 25),
    ];
    for (i, (today, expected_days, percent)) in cases.into_iter().enumerate() {
        clock.set_date(d(2025, 1, 1));
        let property = format!("P{i}");
        let b = book(&engine, &property, d(2025, 3, 1), d(2025, 4, 15)).await.unwrap();
        clock.set_date(today);

        let outcome = engine.cancel_booking(b.booking_id, "guest_request").await.unwrap();
        assert_eq!(outcome.days_until_checkin, expected_days);
        assert_eq!(outcome.refund_amount, Decimal::new(60_000 * percent / 100, 0));
        assert_eq!(outcome.reason, "guest_request");
        assert_eq!(outcome.cancelled_at, clock.now());
    }
}

#[tokio::test]
async fn engine_cancel_releases_dates() {
    let (engine, _) = test_engine(d(2025, 1, 1));
    let b = book(&engine, "P1", d(2025, 3, 1), d(2025, 4, 15)).await.unwrap();
    engine.cancel_booking(b.booking_id, "owner_request").await.unwrap();

    assert!(engine.check_availability("P1", d(2025, 3, 1), d(2025, 4, 15)).await);
    let cancelled = engine.get_booking(b.booking_id).await.unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert_eq!(cancelled.cancellation_reason.as_deref(), Some("owner_request"));
    assert!(cancelled.cancelled_at.is_some());
}

#[tokio::test]
async fn engine_double_cancel_does_not_release_new_booking() {
    let (engine, _) = test_engine(d(2025, 1, 1));
    let first = book(&engine, "P1", d(2025, 3, 1), d(2025, 4, 15)).await.unwrap();
    engine.cancel_booking(first.booking_id, "guest_request").await.unwrap();

    let second = book(&engine, "P1", d(2025, 3, 10), d(2025, 4, 20)).await.unwrap();

    let again = engine.cancel_booking(first.booking_id, "guest_request").await;
    assert_eq!(
        again,
        Err(EngineError::InvalidStateTransition {
            from: BookingStatus::Cancelled,
            transition: Transition::Cancel,
        })
    );
    // The second booking still owns its nights.
    assert!(!engine.check_availability("P1", d(2025, 3, 10), d(2025, 4, 20)).await);
    assert_eq!(engine.get_booking(second.booking_id).await.unwrap().status, BookingStatus::Pending);
}

#[tokio::test]
async fn engine_cancel_after_check_out_rejected() {
    let (engine, _) = test_engine(d(2025, 1, 1));
    let b = book(&engine, "P1", d(2025, 3, 1), d(2025, 4, 15)).await.unwrap();
    engine.confirm_booking(b.booking_id).await.unwrap();
    engine.check_in_guest(b.booking_id, CheckInData::default()).await.unwrap();
    engine.check_out_guest(b.booking_id).await.unwrap();

    let result = engine.cancel_booking(b.booking_id, "late").await;
    assert!(matches!(
        result,
        Err(EngineError::InvalidStateTransition { from: BookingStatus::CheckedOut, .. })
    ));
}

#[tokio::test]
async fn engine_cancel_checked_in_stay() {
    let (engine, clock) = test_engine(d(2025, 1, 1));
    let b = book(&engine, "P1", d(2025, 3, 1), d(2025, 4, 15)).await.unwrap();
    engine.confirm_booking(b.booking_id).await.unwrap();
    clock.set_date(d(2025, 3, 1));
    engine.check_in_guest(b.booking_id, CheckInData::default()).await.unwrap();

    clock.set_date(d(2025, 3, 10));
    let outcome = engine.cancel_booking(b.booking_id, "early_departure").await.unwrap();
    assert_eq!(outcome.refund_amount, Decimal::new(15_000, 0));
    assert!(engine.check_availability("P1", d(2025, 3, 1), d(2025, 4, 15)).await);
}

#[tokio::test]
async fn engine_cancel_reason_too_long() {
    let (engine, _) = test_engine(d(2025, 1, 1));
    let b = book(&engine, "P1", d(2025, 3, 1), d(2025, 4, 15)).await.unwrap();
    let reason = "x".repeat(crate::limits::MAX_REASON_LEN + 1);
    let result = engine.cancel_booking(b.booking_id, &reason).await;
    assert!(matches!(result, Err(EngineError::LimitExceeded(_))));
    assert_eq!(engine.get_booking(b.booking_id).await.unwrap().status, BookingStatus::Pending);
}

// ── No-show ──────────────────────────────────────────────

#[tokio::test]
async fn engine_no_show_frees_dates_and_is_terminal() {
    let (engine, _) = test_engine(d(2025, 1, 1));
    let b = book(&engine, "P1", d(2025, 3, 1), d(2025, 4, 15)).await.unwrap();

    // Only confirmed bookings can be no-shows.
    assert!(engine.mark_no_show(b.booking_id).await.is_err());

    engine.confirm_booking(b.booking_id).await.unwrap();
    let ns = engine.mark_no_show(b.booking_id).await.unwrap();
    assert_eq!(ns.status, BookingStatus::NoShow);
    assert!(engine.check_availability("P1", d(2025, 3, 1), d(2025, 4, 15)).await);

    assert!(matches!(
        engine.cancel_booking(b.booking_id, "x").await,
        Err(EngineError::InvalidStateTransition { from: BookingStatus::NoShow, .. })
    ));
}

#[tokio::test]
async fn engine_collect_no_shows_respects_grace() {
    let settings = EngineSettings {
        no_show_grace_days: 2,
        ..Default::default()
    };
    let (engine, _) = test_engine_with(d(2025, 1, 1), settings);
    let b = book(&engine, "P1", d(2025, 3, 1), d(2025, 4, 15)).await.unwrap();
    engine.confirm_booking(b.booking_id).await.unwrap();

    assert!(engine.collect_no_shows(d(2025, 3, 3)).await.is_empty());
    assert_eq!(engine.collect_no_shows(d(2025, 3, 4)).await, vec![b.booking_id]);
}

#[tokio::test]
async fn engine_collect_no_shows_out_of_range_grace() {
    for grace in [1_000_000_000, i64::MAX] {
        let settings = EngineSettings {
            no_show_grace_days: grace,
            ..Default::default()
        };
        let (engine, _) = test_engine_with(d(2025, 1, 1), settings);
        let b = book(&engine, "P1", d(2025, 3, 1), d(2025, 4, 15)).await.unwrap();
        engine.confirm_booking(b.booking_id).await.unwrap();

        assert!(engine.collect_no_shows(d(2025, 6, 1)).await.is_empty());
        assert_eq!(crate::sweeper::sweep_once(&engine).await, 0);
        assert_eq!(engine.get_booking(b.booking_id).await.unwrap().status, BookingStatus::Confirmed);
    }
}

// ── Manual holds ─────────────────────────────────────────

#[tokio::test]
async fn engine_hold_blocks_bookings_until_released() {
    let (engine, _) = test_engine(d(2025, 1, 1));
    let hold = engine
        .hold_dates("P1", DateSpan::new(d(2025, 3, 10), d(2025, 3, 15)), Some("aircon repair".into()))
        .await
        .unwrap();

    let result = book(&engine, "P1", d(2025, 3, 1), d(2025, 4, 15)).await;
    assert!(matches!(result, Err(EngineError::AvailabilityConflict { .. })));
    assert_eq!(engine.holds_for_property("P1").await, vec![hold.clone()]);

    engine.release_hold("P1", hold.hold_id).await.unwrap();
    assert!(engine.holds_for_property("P1").await.is_empty());
    assert!(book(&engine, "P1", d(2025, 3, 1), d(2025, 4, 15)).await.is_ok());

    // Released twice.
    assert_eq!(
        engine.release_hold("P1", hold.hold_id).await,
        Err(EngineError::NotFound(hold.hold_id))
    );
}

#[tokio::test]
async fn engine_hold_cannot_cover_booking() {
    let (engine, _) = test_engine(d(2025, 1, 1));
    book(&engine, "P1", d(2025, 3, 1), d(2025, 4, 15)).await.unwrap();
    let result = engine
        .hold_dates("P1", DateSpan::new(d(2025, 4, 14), d(2025, 4, 20)), None)
        .await;
    assert_eq!(
        result,
        Err(EngineError::AvailabilityConflict { property_id: "P1".into(), date: d(2025, 4, 14) })
    );

    let empty = engine.hold_dates("P1", DateSpan::new(d(2025, 5, 1), d(2025, 5, 1)), None).await;
    assert!(matches!(empty, Err(EngineError::InvalidInput(_))));
}

// ── Queries ──────────────────────────────────────────────

#[tokio::test]
async fn engine_bookings_for_property_ordered_by_check_in() {
    let (engine, _) = test_engine(d(2025, 1, 1));
    let later = book(&engine, "P1", d(2025, 6, 1), d(2025, 7, 15)).await.unwrap();
    let earlier = book(&engine, "P1", d(2025, 3, 1), d(2025, 4, 15)).await.unwrap();
    book(&engine, "P2", d(2025, 3, 1), d(2025, 4, 15)).await.unwrap();

    let ids: Vec<_> = engine
        .bookings_for_property("P1")
        .await
        .iter()
        .map(|b| b.booking_id)
        .collect();
    assert_eq!(ids, vec![earlier.booking_id, later.booking_id]);
    assert!(engine.bookings_for_property("P3").await.is_empty());
}

#[tokio::test]
async fn engine_analytics_empty() {
    let (engine, _) = test_engine(d(2025, 1, 1));
    let a = engine.get_booking_analytics().await;
    assert_eq!(a.total_bookings, 0);
    assert_eq!(a.confirmation_rate, 0.0);
    assert_eq!(a.total_revenue, Decimal::ZERO);
    assert_eq!(a.average_booking_value, Decimal::ZERO);
    assert_eq!(a.average_stay_duration, 0.0);
    assert!(a.by_status.values().all(|n| *n == 0));
}

#[tokio::test]
async fn engine_analytics_aggregate() {
    let (engine, _) = test_engine(d(2025, 1, 1));
    // 45 nights, confirmed
    let a = book(&engine, "P1", d(2025, 3, 1), d(2025, 4, 15)).await.unwrap();
    engine.confirm_booking(a.booking_id).await.unwrap();
    // 31 nights, pending
    book(&engine, "P2", d(2025, 3, 1), d(2025, 4, 1)).await.unwrap();
    // 59 nights, cancelled
    let c = book(&engine, "P3", d(2025, 3, 1), d(2025, 4, 29)).await.unwrap();
    engine.cancel_booking(c.booking_id, "guest_request").await.unwrap();
    // 45 nights, confirmed
    let e = book(&engine, "P4", d(2025, 3, 1), d(2025, 4, 15)).await.unwrap();
    engine.confirm_booking(e.booking_id).await.unwrap();

    let stats = engine.get_booking_analytics().await;
    assert_eq!(stats.total_bookings, 4);
    assert_eq!(stats.confirmed_bookings, 2);
    assert_eq!(stats.by_status[&BookingStatus::Confirmed], 2);
    assert_eq!(stats.by_status[&BookingStatus::Pending], 1);
    assert_eq!(stats.by_status[&BookingStatus::Cancelled], 1);
    assert!((stats.confirmation_rate - 0.5).abs() < f64::EPSILON);
    assert_eq!(stats.total_revenue, Decimal::new(180_000, 0));
    assert_eq!(stats.average_booking_value, Decimal::new(90_000, 0));
    assert!((stats.average_stay_duration - 45.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn engine_analytics_revenue_saturates() {
    let (engine, _) = test_engine(d(2025, 1, 1));
    let huge = PricingBreakdown::compute(PricingInput {
        base_rent: Decimal::MAX,
        ..Default::default()
    })
    .unwrap();
    for property in ["P1", "P2"] {
        engine
            .create_booking(property, guest("g1"), details(d(2025, 3, 1), d(2025, 4, 15)), huge.clone())
            .await
            .unwrap();
    }

    let stats = engine.get_booking_analytics().await;
    assert_eq!(stats.total_bookings, 2);
    assert_eq!(stats.total_revenue, Decimal::MAX);
    assert_eq!(stats.average_booking_value, Decimal::MAX);
}

// ── Notifications ────────────────────────────────────────

#[tokio::test]
async fn engine_lifecycle_events_are_broadcast() {
    let (engine, clock) = test_engine(d(2025, 1, 1));
    let mut rx = engine.notify.subscribe("P1");

    let b = book(&engine, "P1", d(2025, 3, 1), d(2025, 4, 15)).await.unwrap();
    engine.confirm_booking(b.booking_id).await.unwrap();
    // 19 days out, 75% tier.
    clock.advance(Duration::days(40));
    engine.cancel_booking(b.booking_id, "guest_request").await.unwrap();

    assert_eq!(
        rx.recv().await.unwrap(),
        BookingEvent::Created {
            booking_id: b.booking_id,
            property_id: "P1".into(),
            span: DateSpan::new(d(2025, 3, 1), d(2025, 4, 15)),
        }
    );
    assert_eq!(rx.recv().await.unwrap(), BookingEvent::Confirmed { booking_id: b.booking_id });
    assert_eq!(
        rx.recv().await.unwrap(),
        BookingEvent::Cancelled {
            booking_id: b.booking_id,
            refund_amount: Decimal::new(45_000, 0),
            reason: "guest_request".into(),
        }
    );
}

// ── Concurrency ──────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn engine_concurrent_overlapping_creates_one_wins() {
    let (engine, _) = test_engine(d(2025, 1, 1));
    let engine = Arc::new(engine);

    let mut handles = Vec::new();
    for i in 0..32u32 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            // All ranges overlap on March 20-31.
            let start = d(2025, 3, 1) + Duration::days(i64::from(i % 20));
            book(&engine, "P1", start, start + Duration::days(31)).await
        }));
    }

    let mut wins = 0;
    let mut conflicts = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(_) => wins += 1,
            Err(EngineError::AvailabilityConflict { .. }) => conflicts += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(wins, 1);
    assert_eq!(conflicts, 31);
    assert_eq!(engine.store.booking_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn engine_concurrent_cancels_only_one_succeeds() {
    let (engine, _) = test_engine(d(2025, 1, 1));
    let engine = Arc::new(engine);
    let b = book(&engine, "P1", d(2025, 3, 1), d(2025, 4, 15)).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let engine = engine.clone();
        let id = b.booking_id;
        handles.push(tokio::spawn(async move { engine.cancel_booking(id, "dup").await }));
    }
    let mut ok = 0;
    for h in handles {
        if h.await.unwrap().is_ok() {
            ok += 1;
        }
    }
    assert_eq!(ok, 1);
}

fn condo(id: &str) -> PropertyCompliance {
    PropertyCompliance {
        property_id: id.into(),
        property_type: PropertyType::Condo,
        chanote_title: Some("4471".into()),
        juristic_person_approval: true,
        minimum_stay_days: 30,
        compliance_check: None,
    }
}

#[tokio::test]
async fn engine_validate_compliance_records_outcome() {
    let (engine, clock) = test_engine(d(2025, 1, 1));
    engine.register_property(condo("P1")).unwrap();
    assert_eq!(engine.property_compliance("P1").unwrap().compliance_check, None);

    let report = engine.validate_compliance("P1").unwrap();
    assert!(report.compliant);
    assert!(report.issues.is_empty());
    assert_eq!(report.property_id, "P1");
    assert_eq!(report.checked_at, clock.now());
    assert_eq!(engine.property_compliance("P1").unwrap().compliance_check, Some(true));
}

#[tokio::test]
async fn engine_validate_compliance_reports_each_issue() {
    let (engine, _) = test_engine(d(2025, 1, 1));
    let cases = [
        (
            PropertyCompliance { minimum_stay_days: 14, ..condo("short") },
            ComplianceIssue::MinimumStayTooShort { minimum_stay_days: 14 },
        ),
        (
            PropertyCompliance { chanote_title: None, ..condo("no-chanote") },
            ComplianceIssue::MissingChanoteTitle,
        ),
        (
            PropertyCompliance { juristic_person_approval: false, ..condo("no-approval") },
            ComplianceIssue::MissingJuristicApproval,
        ),
    ];
    for (record, issue) in cases {
        let id = record.property_id.clone();
        engine.register_property(record).unwrap();
        let report = engine.validate_compliance(&id).unwrap();
        assert!(!report.compliant, "{id}");
        assert_eq!(report.issues, vec![issue], "{id}");
        assert_eq!(engine.property_compliance(&id).unwrap().compliance_check, Some(false));
    }
}

#[tokio::test]
async fn engine_reregistering_clears_previous_check() {
    let (engine, _) = test_engine(d(2025, 1, 1));
    engine.register_property(condo("P1")).unwrap();
    engine.validate_compliance("P1").unwrap();

    engine
        .register_property(PropertyCompliance { chanote_title: None, ..condo("P1") })
        .unwrap();
    assert_eq!(engine.property_compliance("P1").unwrap().compliance_check, None);
    assert!(!engine.validate_compliance("P1").unwrap().compliant);
}

#[tokio::test]
async fn engine_validate_compliance_unknown_property() {
    let (engine, _) = test_engine(d(2025, 1, 1));
    assert_eq!(
        engine.validate_compliance("ghost"),
        Err(EngineError::PropertyNotFound("ghost".into()))
    );
    assert!(matches!(
        engine.register_property(condo("")),
        Err(EngineError::InvalidInput(_))
    ));
}
