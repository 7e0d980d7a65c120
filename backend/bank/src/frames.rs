//! # Frames
//!
//! A snapshot is a list of players, a player is a list of frames, and a frame
//! is one timestamped set of body-part colors.
//!
//! The same structs serve the JSON API (serde) and redis storage (prost), so
//! there is no conversion layer between the two.
//!
//! ## JSON
//! - Frame: object with all 10 integer fields, extra fields ignored
//! - Player: bare array of frames
//! - Players: array of players, index is the player id
//!
//! ## Storage
//! - `StoredPlayers` is the value of one snapshot field in redis
//! - `Credential` is the value of one user in the credentials hash
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, prost::Message)]
pub struct PlayerFrame {
    #[prost(int64, tag = "1")]
    pub time: i64,
    #[prost(int64, tag = "2")]
    pub head: i64,
    #[prost(int64, tag = "3")]
    pub shoulder: i64,
    #[prost(int64, tag = "4")]
    pub chest: i64,
    #[prost(int64, tag = "5")]
    pub front: i64,
    #[prost(int64, tag = "6")]
    pub skirt: i64,
    #[prost(int64, tag = "7")]
    pub leg: i64,
    #[prost(int64, tag = "8")]
    pub shoes: i64,
    #[prost(int64, tag = "9")]
    pub weap_1: i64,
    #[prost(int64, tag = "10")]
    pub weap_2: i64,
}

/// One performer's timeline. Frame order is authoritative, `time` is not used
/// for sorting.
#[derive(Clone, PartialEq, Serialize, Deserialize, prost::Message)]
#[serde(transparent)]
pub struct PlayerTrack {
    #[prost(message, repeated, tag = "1")]
    pub frames: Vec<PlayerFrame>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct StoredPlayers {
    #[prost(message, repeated, tag = "1")]
    pub players: Vec<PlayerTrack>,
}

#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct Credential {
    #[prost(string, tag = "1")]
    pub username: String,
    #[prost(string, tag = "2")]
    pub password: String,
    #[prost(bool, tag = "3")]
    pub disabled: bool,
}
