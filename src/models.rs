use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::rate_limit::normalize_email;

// Booking form as posted by the site. Everything optional, scalars of any type
// accepted. Two spellings: dates | checkin+checkout, participants | people,
// message | additional
#[derive(Deserialize, Debug, Clone, Default)]
pub struct BookingRequest {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub base: Option<String>, // venue id: moscow, volgograd, sochi, ...
    #[serde(default, deserialize_with = "lenient_string")]
    pub dates: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub checkin: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub checkout: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub participants: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub people: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub sport: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub additional: Option<String>,
}

impl BookingRequest {
    // Body must be a JSON object; the derived struct visitor would also
    // fill fields from an array by position
    pub fn from_json(body: &[u8]) -> Result<Self, String> {
        match serde_json::from_slice::<Value>(body).map_err(|e| e.to_string())? {
            object @ Value::Object(_) => serde_json::from_value(object).map_err(|e| e.to_string()),
            other => Err(format!("expected a JSON object, got {}", json_kind(&other))),
        }
    }

    // Email as used for rate limiting
    pub fn normalized_email(&self) -> Option<String> {
        self.email.as_deref().and_then(normalize_email)
    }

    // aliases flattened, missing values become ""
    pub fn into_payload(self) -> SheetsPayload {
        let dates = match filled(self.dates) {
            Some(dates) => dates,
            None => match (filled(self.checkin), filled(self.checkout)) {
                (None, None) => String::new(),
                (checkin, checkout) => format!(
                    "{} - {}",
                    checkin.unwrap_or_default(),
                    checkout.unwrap_or_default()
                ),
            },
        };

        SheetsPayload {
            name: self.name.unwrap_or_default(),
            email: self.email.unwrap_or_default(),
            phone: self.phone.unwrap_or_default(),
            base: self.base.unwrap_or_default(),
            dates,
            participants: first_filled(self.participants, self.people),
            sport: self.sport.unwrap_or_default(),
            additional: first_filled(self.message, self.additional),
        }
    }
}

// Row appended to the bookings spreadsheet
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetsPayload {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub base: String,
    pub dates: String,
    pub participants: String,
    pub sport: String,
    pub additional: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct SubmitResponse {
    pub success: bool,
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn filled(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

// First non-empty of the two spellings, or ""
fn first_filled(primary: Option<String>, fallback: Option<String>) -> String {
    filled(primary).or_else(|| filled(fallback)).unwrap_or_default()
}

// Accepts strings, numbers and booleans; anything else counts as missing
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}
