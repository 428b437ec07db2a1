use crate::constants::CUSTOM_SERVER_OPTION;
use crate::models::{BoundingBox, Coordinates};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// One routing server from the published server list, or a user-supplied
/// custom server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerRecord {
    /// Assigned by the store; `None` until persisted and for custom servers.
    pub id: Option<i64>,
    pub region: String,
    #[serde(with = "time::serde::timestamp")]
    pub updated_at: OffsetDateTime,
    /// Service area; `None` means unbounded (never auto-detected).
    pub bounds: Option<BoundingBox>,
    pub center: Option<Coordinates>,
    pub base_url: String,
}

impl ServerRecord {
    /// Record for a base URL the user typed in.
    pub fn custom(base_url: impl Into<String>) -> Self {
        ServerRecord {
            id: None,
            region: CUSTOM_SERVER_OPTION.to_string(),
            updated_at: OffsetDateTime::now_utc(),
            bounds: None,
            center: None,
            base_url: base_url.into(),
        }
    }

    pub fn is_custom(&self) -> bool {
        self.id.is_none() && self.bounds.is_none()
    }

    /// Equality ignoring the store-assigned identity.
    pub fn same_content(&self, other: &ServerRecord) -> bool {
        self.region == other.region
            && self.updated_at == other.updated_at
            && self.bounds == other.bounds
            && self.center == other.center
            && self.base_url == other.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_server_is_unbounded_and_unsaved() {
        let server = ServerRecord::custom("http://otp.example.org/otp");
        assert!(server.is_custom());
        assert_eq!(server.id, None);
        assert_eq!(server.region, CUSTOM_SERVER_OPTION);
        assert_eq!(server.base_url, "http://otp.example.org/otp");
    }

    #[test]
    fn serializes_timestamp_as_unix_seconds() {
        let server = ServerRecord {
            id: Some(3),
            region: "Tampa".to_string(),
            updated_at: OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap(),
            bounds: None,
            center: None,
            base_url: "http://tampa.example.org/otp".to_string(),
        };

        let json = serde_json::to_value(&server).unwrap();
        assert_eq!(json["updated_at"], 1_700_000_000);
        assert_eq!(json["region"], "Tampa");
        assert!(json["bounds"].is_null());
    }
}
