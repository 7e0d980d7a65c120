use serde::{Deserialize, Serialize};

use crate::frames::PlayerTrack;

/// Body of `POST /upload_items/`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UploadItems {
    pub players: Vec<PlayerTrack>,
}

/// Body of `POST /upload_raw/`. The blob format belongs to the client.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UploadRaw {
    pub raw_data: String,
}

pub fn get_items_from_bytes(bytes: &[u8]) -> Result<UploadItems, serde_json::Error> {
    serde_json::from_slice(bytes)
}

pub fn get_raw_from_bytes(bytes: &[u8]) -> Result<UploadRaw, serde_json::Error> {
    serde_json::from_slice(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_items() {
        let body = br#"{"players": [[{"time": 0, "head": 1, "shoulder": 2, "chest": 3,
            "front": 4, "skirt": 5, "leg": 6, "shoes": 7, "weap_1": 8, "weap_2": 9}], []]}"#;

        let items = get_items_from_bytes(body).unwrap();

        assert_eq!(items.players.len(), 2);
        assert!(items.players[1].frames.is_empty());
    }

    #[test]
    fn test_items_missing_players() {
        assert!(get_items_from_bytes(br#"{"raw_data": "x"}"#).is_err());
        assert!(get_items_from_bytes(b"not json").is_err());
    }

    #[test]
    fn test_raw() {
        let raw = get_raw_from_bytes(br#"{"raw_data": "AAEC", "other": 1}"#).unwrap();
        assert_eq!(raw.raw_data, "AAEC");

        assert!(get_raw_from_bytes(br#"{"raw_data": 5}"#).is_err());
        assert!(get_raw_from_bytes(br#"{}"#).is_err());
    }
}
