// ABOUTME: Request log submissions and the row shape the external log store expects
// ABOUTME: Validates required fields and fills in the default agent name

use serde::{Deserialize, Deserializer, Serialize};

/// Agent name recorded when the caller does not supply one
pub const DEFAULT_AGENT_NAME: &str = "System";

/// Body of a log submission as sent by clients. Every field is optional here so
/// that missing fields surface as validation errors rather than parse errors.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogSubmission {
    #[serde(default, deserialize_with = "phone_text")]
    pub phone: Option<String>,
    pub category: Option<String>,
    pub notes: Option<String>,
    pub agent_name: Option<String>,
}

/// Row written to the request log store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestLogEntry {
    pub phone: String,
    pub category: Option<String>,
    pub notes: String,
    pub agent_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Phone and notes are required")]
pub struct MissingLogFields {
    pub phone: bool,
    pub notes: bool,
}

/// Phone numbers arrive as strings or as bare JSON numbers; both are kept as text
fn phone_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Phone {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(Option::<Phone>::deserialize(deserializer)?.map(|phone| match phone {
        Phone::Text(text) => text,
        Phone::Number(number) => number.to_string(),
    }))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl LogSubmission {
    pub fn into_entry(self) -> Result<RequestLogEntry, MissingLogFields> {
        let phone = non_blank(self.phone);
        let notes = non_blank(self.notes);

        let (Some(phone), Some(notes)) = (phone.clone(), notes.clone()) else {
            return Err(MissingLogFields {
                phone: phone.is_none(),
                notes: notes.is_none(),
            });
        };

        Ok(RequestLogEntry {
            phone,
            category: non_blank(self.category),
            notes,
            agent_name: non_blank(self.agent_name)
                .unwrap_or_else(|| DEFAULT_AGENT_NAME.to_string()),
        })
    }
}
