use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Cancellation schedule for long stays: `(minimum days before check-in,
/// refund percent)`. First matching band wins.
const REFUND_TIERS: [(i64, i64); 3] = [(30, 95), (14, 75), (7, 50)];
const LATE_CANCEL_PERCENT: i64 = 25;

pub fn days_until_checkin(check_in: NaiveDate, today: NaiveDate) -> i64 {
    (check_in - today).num_days()
}

/// Fraction of the total returned to the guest. Negative `days_until_checkin`
/// (cancelling after the check-in date) gets the late rate.
pub fn refund_fraction(days_until_checkin: i64) -> Decimal {
    let percent = REFUND_TIERS
        .iter()
        .find(|(min_days, _)| days_until_checkin >= *min_days)
        .map_or(LATE_CANCEL_PERCENT, |(_, percent)| *percent);
    Decimal::new(percent, 2)
}

/// Refund in the booking currency, rounded to 2 decimal places.
pub fn refund_amount(days_until_checkin: i64, total_amount: Decimal) -> Decimal {
    (total_amount * refund_fraction(days_until_checkin)).round_dp(2)
}
