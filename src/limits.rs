/// Thai law: short-term (< 30 night) letting of condos and houses is not allowed.
pub const MIN_STAY_DAYS: i64 = 30;
/// Ten years. Longer requests are almost certainly bad input.
pub const MAX_STAY_DAYS: i64 = 3_650;

pub const MIN_GUESTS: u8 = 1;
pub const MAX_GUESTS: u8 = 10;

pub const MAX_PROPERTY_ID_LEN: usize = 128;
pub const MAX_REASON_LEN: usize = 512;
pub const MAX_SPECIAL_REQUESTS_LEN: usize = 2_000;

pub const MAX_GUEST_SCORE: f64 = 100.0;
