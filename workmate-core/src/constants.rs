/// Days of history fetched from a remote calendar on each sync pass.
pub const DEFAULT_LOOKBACK_DAYS: i64 = 30;

/// Days of future events fetched from a remote calendar on each sync pass.
pub const DEFAULT_LOOKAHEAD_DAYS: i64 = 90;

/// Upper bound on events requested from a provider per pass.
pub const DEFAULT_MAX_RESULTS: usize = 250;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

// QA gate on AI confidence
pub const CONFIDENCE_LOW: f64 = 0.40;
pub const CONFIDENCE_MEDIUM: f64 = 0.65;
pub const CONFIDENCE_HIGH: f64 = 0.85;

/// Document title is replaced by the AI title only above this confidence.
pub const TITLE_PROMOTION_CONFIDENCE: f64 = 0.6;

/// Document type is replaced by the AI type only above this confidence.
pub const TYPE_PROMOTION_CONFIDENCE: f64 = 0.7;

/// Medium-tier QA review kicks in above this amount.
pub const REVIEW_AMOUNT: f64 = 500.0;

/// High-tier QA review for critical documents kicks in above this amount.
pub const CRITICAL_REVIEW_AMOUNT: f64 = 1000.0;

pub const DEFAULT_CURRENCY: &str = "EUR";

pub const DEFAULT_SNOOZE_MINUTES: i64 = 60;

pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_API_BASE: &str = "https://www.googleapis.com/calendar/v3";
