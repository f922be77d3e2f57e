/// Campaign tuning defaults

pub const DEFAULT_MAX_CAMPAIGN_EMAILS_PER_DAY: u32 = 1000;
pub const DEFAULT_MAX_SENDER_EMAILS_PER_DAY: u32 = 100;

/// Pacing window between consecutive sends (4 to 5 minutes)
pub const DEFAULT_MIN_SEND_INTERVAL_SECONDS: u64 = 4 * 60;
pub const DEFAULT_MAX_SEND_INTERVAL_SECONDS: u64 = 5 * 60;

pub const DEFAULT_LEADS_PER_RUN: u32 = 10;

/// Leads of this property type are never fetched
pub const DEFAULT_EXCLUDED_PROPERTY_TYPE: &str = "Vacant Land";

pub const DEFAULT_EMAIL_SUBJECT: &str = "Regarding Your Property";
pub const DEFAULT_CONTACT_NAME: &str = "Valued Contact";

/// Characters of the rendered body stored in the send log
pub const BODY_PREVIEW_CHARS: usize = 255;

/// Content-ID referenced by email templates as `cid:company_logo`
pub const BRANDING_CONTENT_ID: &str = "company_logo";

/// Date format used in letters, e.g. "May 01, 2024"
pub const LETTER_DATE_FORMAT: &str = "%B %d, %Y";
