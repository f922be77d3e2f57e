//! Service modules for message preparation

pub mod currency;
pub mod email_validator;
pub mod personalization;
pub mod template_renderer;

// Re-export service types
pub use currency::{format_currency, parse_currency};
pub use email_validator::is_valid_email;
pub use personalization::PersonalizationData;
pub use template_renderer::{EmailTemplate, TemplateRenderer};
