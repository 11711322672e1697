use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::engine::EngineError;
use crate::limits::*;

/// Opaque property key. The catalog lives outside this crate.
pub type PropertyId = String;

pub type BookingId = Ulid;

/// Half-open date range `[start, end)`. The `end` night is not occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateSpan {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateSpan {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Number of occupied nights. Zero for empty or inverted spans.
    pub fn nights(&self) -> i64 {
        (self.end - self.start).num_days().max(0)
    }

    pub fn overlaps(&self, other: &DateSpan) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.start < other.end
            && other.start < self.end
    }

    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }

    /// Every occupied date, in order.
    pub fn days(self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d < end)
    }
}

impl fmt::Display for DateSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

// ── Lifecycle enums ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    CheckedIn,
    CheckedOut,
    Cancelled,
    NoShow,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 6] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::CheckedIn,
        BookingStatus::CheckedOut,
        BookingStatus::Cancelled,
        BookingStatus::NoShow,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::CheckedOut | BookingStatus::Cancelled | BookingStatus::NoShow
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::CheckedIn => "checked_in",
            BookingStatus::CheckedOut => "checked_out",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::NoShow => "no_show",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events that move a booking between statuses. Creation is not a transition:
/// every booking starts in `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Confirm,
    CheckIn,
    CheckOut,
    Cancel,
    NoShow,
}

impl Transition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::Confirm => "confirm",
            Transition::CheckIn => "check_in",
            Transition::CheckOut => "check_out",
            Transition::Cancel => "cancel",
            Transition::NoShow => "no_show",
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Money state of the booking as reported by the payment side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Partial,
    Paid,
    Refunded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StayPurpose {
    #[default]
    Tourism,
    Business,
    Education,
    Medical,
}

// ── Guest ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuestProfile {
    pub guest_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    /// ISO 3166-1 alpha-2, e.g. `TH`.
    pub nationality: String,
    #[serde(default)]
    pub passport_number: Option<String>,
    #[serde(default)]
    pub visa_type: Option<String>,
    #[serde(default)]
    pub visa_expiry: Option<NaiveDate>,
    /// Address reported on the TM30 form.
    #[serde(default)]
    pub thai_address: Option<String>,
    /// 0-100.
    #[serde(default)]
    pub guest_score: Option<f64>,
    #[serde(default)]
    pub previous_bookings: u32,
    #[serde(default)]
    pub verified: bool,
}

impl GuestProfile {
    /// TM30 applies to every non-Thai guest.
    pub fn is_foreign(&self) -> bool {
        !self.nationality.eq_ignore_ascii_case("TH")
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.guest_id.trim().is_empty() {
            return Err(EngineError::InvalidInput("guest_id is empty"));
        }
        if self.nationality.trim().is_empty() {
            return Err(EngineError::InvalidInput("nationality is empty"));
        }
        if let Some(score) = self.guest_score
            && !(0.0..=MAX_GUEST_SCORE).contains(&score)
        {
            return Err(EngineError::InvalidInput("guest_score out of range"));
        }
        Ok(())
    }
}

// ── Booking details ──────────────────────────────────────────────

/// Raw dates and headcount as submitted by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests_count: u8,
    #[serde(default)]
    pub purpose: StayPurpose,
    #[serde(default)]
    pub special_requests: Option<String>,
}

/// Stay dates with their derived durations. The durations can only change
/// through [`BookingDetails::set_dates`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BookingRequest")]
pub struct BookingDetails {
    check_in: NaiveDate,
    check_out: NaiveDate,
    guests_count: u8,
    pub purpose: StayPurpose,
    pub special_requests: Option<String>,
    stay_duration_days: i64,
    stay_duration_months: f64,
}

impl BookingDetails {
    pub fn new(check_in: NaiveDate, check_out: NaiveDate, guests_count: u8) -> Result<Self, EngineError> {
        Self::try_from(BookingRequest {
            check_in,
            check_out,
            guests_count,
            purpose: StayPurpose::default(),
            special_requests: None,
        })
    }

    pub fn with_purpose(mut self, purpose: StayPurpose) -> Self {
        self.purpose = purpose;
        self
    }

    pub fn set_dates(&mut self, check_in: NaiveDate, check_out: NaiveDate) -> Result<(), EngineError> {
        if check_out <= check_in {
            return Err(EngineError::InvalidInput("check_out must be after check_in"));
        }
        let days = (check_out - check_in).num_days();
        if days > MAX_STAY_DAYS {
            return Err(EngineError::LimitExceeded("stay too long"));
        }
        self.check_in = check_in;
        self.check_out = check_out;
        self.stay_duration_days = days;
        self.stay_duration_months = days as f64 / 30.0;
        Ok(())
    }

    pub fn check_in(&self) -> NaiveDate {
        self.check_in
    }

    pub fn check_out(&self) -> NaiveDate {
        self.check_out
    }

    pub fn guests_count(&self) -> u8 {
        self.guests_count
    }

    pub fn stay_duration_days(&self) -> i64 {
        self.stay_duration_days
    }

    pub fn stay_duration_months(&self) -> f64 {
        self.stay_duration_months
    }

    pub fn span(&self) -> DateSpan {
        DateSpan::new(self.check_in, self.check_out)
    }
}

impl TryFrom<BookingRequest> for BookingDetails {
    type Error = EngineError;

    fn try_from(req: BookingRequest) -> Result<Self, Self::Error> {
        if !(MIN_GUESTS..=MAX_GUESTS).contains(&req.guests_count) {
            return Err(EngineError::InvalidInput("guests_count must be between 1 and 10"));
        }
        if let Some(ref s) = req.special_requests
            && s.len() > MAX_SPECIAL_REQUESTS_LEN
        {
            return Err(EngineError::LimitExceeded("special_requests too long"));
        }
        let mut details = Self {
            check_in: req.check_in,
            check_out: req.check_in,
            guests_count: req.guests_count,
            purpose: req.purpose,
            special_requests: req.special_requests,
            stay_duration_days: 0,
            stay_duration_months: 0.0,
        };
        details.set_dates(req.check_in, req.check_out)?;
        Ok(details)
    }
}

// ── Pricing ──────────────────────────────────────────────────────

/// Caller-supplied price components. Totals are never taken from input.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingInput {
    pub base_rent: Decimal,
    pub cleaning_fee: Decimal,
    pub service_fee: Decimal,
    pub security_deposit: Decimal,
    pub taxes: Decimal,
    pub long_stay_discount: Decimal,
    /// Signed: positive in high season, negative in low season.
    pub seasonal_adjustment: Decimal,
    pub deposit_required: Decimal,
}

/// Computed price. `total_amount = subtotal + taxes - long_stay_discount`
/// holds for every value of this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PricingInput")]
pub struct PricingBreakdown {
    base_rent: Decimal,
    cleaning_fee: Decimal,
    service_fee: Decimal,
    security_deposit: Decimal,
    taxes: Decimal,
    long_stay_discount: Decimal,
    seasonal_adjustment: Decimal,
    subtotal: Decimal,
    total_amount: Decimal,
    deposit_required: Decimal,
    balance_due: Decimal,
}

impl PricingBreakdown {
    pub fn compute(input: PricingInput) -> Result<Self, EngineError> {
        let non_negative = [
            input.base_rent,
            input.cleaning_fee,
            input.service_fee,
            input.security_deposit,
            input.taxes,
            input.long_stay_discount,
            input.deposit_required,
        ];
        if non_negative.iter().any(|v| *v < Decimal::ZERO) {
            return Err(EngineError::InvalidInput("price components must not be negative"));
        }

        const OVERFLOW: EngineError = EngineError::InvalidInput("price overflow");
        let subtotal = input
            .base_rent
            .checked_add(input.cleaning_fee)
            .and_then(|v| v.checked_add(input.service_fee))
            .and_then(|v| v.checked_add(input.seasonal_adjustment))
            .ok_or(OVERFLOW)?;
        let total_amount = subtotal
            .checked_add(input.taxes)
            .and_then(|v| v.checked_sub(input.long_stay_discount))
            .ok_or(OVERFLOW)?;
        if total_amount < Decimal::ZERO {
            return Err(EngineError::InvalidInput("total_amount is negative"));
        }
        if input.deposit_required > total_amount {
            return Err(EngineError::InvalidInput("deposit_required exceeds total_amount"));
        }

        Ok(Self {
            base_rent: input.base_rent,
            cleaning_fee: input.cleaning_fee,
            service_fee: input.service_fee,
            security_deposit: input.security_deposit,
            taxes: input.taxes,
            long_stay_discount: input.long_stay_discount,
            seasonal_adjustment: input.seasonal_adjustment,
            subtotal,
            total_amount,
            deposit_required: input.deposit_required,
            balance_due: total_amount - input.deposit_required,
        })
    }

    pub fn base_rent(&self) -> Decimal {
        self.base_rent
    }

    pub fn cleaning_fee(&self) -> Decimal {
        self.cleaning_fee
    }

    pub fn service_fee(&self) -> Decimal {
        self.service_fee
    }

    pub fn security_deposit(&self) -> Decimal {
        self.security_deposit
    }

    pub fn taxes(&self) -> Decimal {
        self.taxes
    }

    pub fn long_stay_discount(&self) -> Decimal {
        self.long_stay_discount
    }

    pub fn seasonal_adjustment(&self) -> Decimal {
        self.seasonal_adjustment
    }

    pub fn subtotal(&self) -> Decimal {
        self.subtotal
    }

    pub fn total_amount(&self) -> Decimal {
        self.total_amount
    }

    pub fn deposit_required(&self) -> Decimal {
        self.deposit_required
    }

    pub fn balance_due(&self) -> Decimal {
        self.balance_due
    }
}

impl TryFrom<PricingInput> for PricingBreakdown {
    type Error = EngineError;

    fn try_from(input: PricingInput) -> Result<Self, Self::Error> {
        Self::compute(input)
    }
}

// ── Property compliance ──────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    Condo,
    Apartment,
    House,
    Villa,
    Townhouse,
    Studio,
}

/// Legal paperwork and house rules a listing is checked against before it may
/// take long-stay bookings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyCompliance {
    pub property_id: PropertyId,
    pub property_type: PropertyType,
    /// Chanote (title deed) number.
    #[serde(default)]
    pub chanote_title: Option<String>,
    /// Condo building's juristic person has approved renting out the unit.
    #[serde(default)]
    pub juristic_person_approval: bool,
    /// Shortest stay the owner accepts.
    pub minimum_stay_days: i64,
    /// Result of the last compliance check. `None` until checked.
    #[serde(default)]
    pub compliance_check: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum ComplianceIssue {
    MinimumStayTooShort { minimum_stay_days: i64 },
    MissingChanoteTitle,
    MissingJuristicApproval,
}

impl fmt::Display for ComplianceIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComplianceIssue::MinimumStayTooShort { minimum_stay_days } => write!(
                f,
                "minimum stay must be {MIN_STAY_DAYS}+ days for legal compliance, listing allows {minimum_stay_days}"
            ),
            ComplianceIssue::MissingChanoteTitle => f.write_str("chanote title required for verification"),
            ComplianceIssue::MissingJuristicApproval => {
                f.write_str("juristic person approval required for condo rentals")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub property_id: PropertyId,
    pub compliant: bool,
    pub issues: Vec<ComplianceIssue>,
    pub checked_at: DateTime<Utc>,
}

// ── Booking ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub booking_id: BookingId,
    pub property_id: PropertyId,
    pub guest: GuestProfile,
    pub details: BookingDetails,
    pub pricing: PricingBreakdown,

    pub status: BookingStatus,
    pub payment_status: PaymentStatus,

    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub checked_out_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,

    pub contract_signed: bool,
    pub tm30_filed: bool,
    /// Address reported to immigration when the guest checked in.
    pub tm30_address: Option<String>,
    pub deposit_paid: bool,

    pub confirmation_sent: bool,
    pub check_in_instructions_sent: bool,

    pub cancellation_reason: Option<String>,
}

impl Booking {
    pub(crate) fn new(
        booking_id: BookingId,
        property_id: PropertyId,
        guest: GuestProfile,
        details: BookingDetails,
        pricing: PricingBreakdown,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            booking_id,
            property_id,
            guest,
            details,
            pricing,
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Pending,
            created_at,
            confirmed_at: None,
            checked_in_at: None,
            checked_out_at: None,
            cancelled_at: None,
            contract_signed: false,
            tm30_filed: false,
            tm30_address: None,
            deposit_paid: false,
            confirmation_sent: false,
            check_in_instructions_sent: false,
            cancellation_reason: None,
        }
    }

    pub fn span(&self) -> DateSpan {
        self.details.span()
    }
}

/// Data collected at the front desk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInData {
    /// Actual arrival; defaults to the time of the call.
    pub arrived_at: Option<DateTime<Utc>>,
    /// Overrides the guest's profile address on the TM30 report.
    pub tm30_address: Option<String>,
}

/// Who holds a calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Occupant {
    Booking(BookingId),
    /// Manual block placed by the owner (maintenance, personal use).
    Hold(Ulid),
}

/// Lifecycle notifications, broadcast per property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BookingEvent {
    Created {
        booking_id: BookingId,
        property_id: PropertyId,
        span: DateSpan,
    },
    Confirmed {
        booking_id: BookingId,
    },
    Cancelled {
        booking_id: BookingId,
        refund_amount: Decimal,
        reason: String,
    },
    CheckedIn {
        booking_id: BookingId,
        tm30_filed: bool,
    },
    CheckedOut {
        booking_id: BookingId,
    },
    NoShow {
        booking_id: BookingId,
    },
    DatesHeld {
        hold_id: Ulid,
        property_id: PropertyId,
        span: DateSpan,
    },
    HoldReleased {
        hold_id: Ulid,
        property_id: PropertyId,
    },
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancellationOutcome {
    pub booking_id: BookingId,
    pub cancelled_at: DateTime<Utc>,
    pub days_until_checkin: i64,
    pub refund_amount: Decimal,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualHold {
    pub hold_id: Ulid,
    pub span: DateSpan,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingAnalytics {
    pub total_bookings: usize,
    pub by_status: BTreeMap<BookingStatus, usize>,
    pub confirmed_bookings: usize,
    pub confirmation_rate: f64,
    /// Sum of `total_amount` over every booking that is not cancelled.
    pub total_revenue: Decimal,
    /// `total_revenue / max(confirmed_bookings, 1)`.
    pub average_booking_value: Decimal,
    pub average_stay_duration: f64,
}
