//! Shared data model for the light-show backend.
//!
//! - [`frames`]: per-player frame records, in both JSON and stored (protobuf) form
//! - [`payloads`]: upload request bodies
//! - [`lightlist`]: synthetic light lists for testing boards and clients
use prost::{DecodeError, Message, bytes::Buf};

pub mod frames;
pub mod lightlist;
pub mod payloads;

use frames::{PlayerTrack, StoredPlayers};

pub fn get_players_from_bytes<B: Buf>(buf: B) -> Result<Vec<PlayerTrack>, DecodeError> {
    StoredPlayers::decode(buf).map(|stored| stored.players)
}

pub fn players_to_bytes(players: Vec<PlayerTrack>) -> Vec<u8> {
    StoredPlayers { players }.encode_to_vec()
}
