//! Data Transfer Objects for talking to the pipeline server
//!
//! This module contains the wire shapes sent to and received from the
//! pipeline server, and the conversions between them and the in-memory
//! definition the editor works on.

pub mod pipeline;

use serde::{Deserialize, Deserializer};

/// Server message body, e.g. `{"msg": "Pipeline registered"}`
#[derive(Debug, Clone, Default, serde::Serialize, Deserialize)]
pub struct ApiMessage {
    #[serde(default, alias = "error")]
    pub msg: String,
}

/// Decode `null` as the type's default
///
/// The server encodes unset lists and maps as `null`.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_message_accepts_error_key() {
        let msg: ApiMessage = serde_json::from_str(r#"{"error": "bad body"}"#).unwrap();
        assert_eq!(msg.msg, "bad body");

        let msg: ApiMessage = serde_json::from_str(r#"{"msg": "Pipeline deleted"}"#).unwrap();
        assert_eq!(msg.msg, "Pipeline deleted");
    }
}
