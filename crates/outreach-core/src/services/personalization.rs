//! Placeholder values for one lead and sender

use crate::constants::LETTER_DATE_FORMAT;
use crate::services::currency::format_currency;
use crate::types::{Lead, SenderIdentity};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Key/value pairs shared by the email body, subject and letter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersonalizationData {
    values: BTreeMap<String, String>,
}

impl PersonalizationData {
    pub fn build(lead: &Lead, sender: &SenderIdentity, now: DateTime<Utc>) -> Self {
        let mut values = BTreeMap::new();
        let today = now.format(LETTER_DATE_FORMAT).to_string();

        values.insert("contact_name".to_string(), lead.contact_name().to_string());
        values.insert("contact_email".to_string(), lead.contact_email().to_string());
        values.insert("property_address".to_string(), text(&lead.property_address));
        values.insert("property_city".to_string(), text(&lead.property_city));
        values.insert("property_state".to_string(), text(&lead.property_state));
        values.insert("property_postal_code".to_string(), text(&lead.property_postal_code));
        values.insert("property_zip_code".to_string(), text(&lead.property_postal_code));
        values.insert("property_type".to_string(), text(&lead.property_type));
        values.insert("market_region".to_string(), text(&lead.market_region));

        values.insert("beds".to_string(), number(lead.beds));
        values.insert("baths".to_string(), number(lead.baths));
        values.insert("year_built".to_string(), number(lead.year_built));
        values.insert("square_footage".to_string(), number(lead.square_footage));

        values.insert("assessed_total".to_string(), format_currency(lead.assessed_total));
        values.insert("offer_price".to_string(), format_currency(lead.wholesale_value));
        values.insert("wholesale_value".to_string(), format_currency(lead.wholesale_value));

        values.insert("sender_name".to_string(), sender.name.clone());
        values.insert("sender_email".to_string(), sender.email.clone());
        values.insert("current_date".to_string(), today.clone());
        values.insert("date_generated".to_string(), today);

        Self { values }
    }

    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.values).unwrap_or(serde_json::Value::Null)
    }
}

fn text(value: &Option<String>) -> String {
    value.as_deref().map(str::trim).unwrap_or("").to_string()
}

// Whole numbers print without a trailing ".0"
fn number(value: Option<f64>) -> String {
    match value {
        Some(v) if v.fract() == 0.0 => format!("{}", v as i64),
        Some(v) => format!("{}", v),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_build_formats_lead_fields() {
        let lead = Lead {
            id: 1,
            contact_name: Some("Ada Lovelace".into()),
            contact_email: Some("ada@example.com".into()),
            property_address: Some(" 12 Main St ".into()),
            beds: Some(3.0),
            baths: Some(2.5),
            wholesale_value: Some(150_000.0),
            ..Default::default()
        };
        let sender = SenderIdentity::new("Jane Doe", "jane@company.com");
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        let data = PersonalizationData::build(&lead, &sender, now);
        assert_eq!(data.get("property_address"), Some("12 Main St"));
        assert_eq!(data.get("beds"), Some("3"));
        assert_eq!(data.get("baths"), Some("2.5"));
        assert_eq!(data.get("offer_price"), Some("$150,000.00"));
        assert_eq!(data.get("assessed_total"), Some("$0.00"));
        assert_eq!(data.get("current_date"), Some("May 01, 2024"));
        assert_eq!(data.get("sender_name"), Some("Jane Doe"));
        assert_eq!(data.get("year_built"), Some(""));
    }

    #[test]
    fn test_to_json_is_flat_object() {
        let data = PersonalizationData::build(&Lead::default(), &SenderIdentity::new("a", "a@b.co"), Utc::now());
        let json = data.to_json();
        assert_eq!(json["contact_name"], "Valued Contact");
    }
}
