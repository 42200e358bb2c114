use serde::{Deserialize, Deserializer, Serialize};

/// Identity payload returned by a backend that recognised the session.
///
/// Only presence matters to the session engine; the fields are carried through
/// for display. Anything the backend sends beyond id/name/email lands in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserSummary {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    #[serde(default, alias = "display_name")]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl UserSummary {
    pub fn new<S: Into<String>>(id: S, name: S) -> Self {
        Self { id: id.into(), name: name.into(), ..Default::default() }
    }

    /// Name to show in a header; falls back to the id when the backend sent no name.
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() { &self.id } else { &self.name }
    }
}

// Backends disagree on whether ids are numbers or strings.
fn id_as_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    let v = serde_json::Value::deserialize(d)?;
    match v {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("unsupported user id: {}", other))),
    }
}
