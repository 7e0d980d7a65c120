//! # Light Lists
//!
//! Synthetic color timelines used to exercise boards and clients without a
//! saved choreography.
//!
//! ## Variants
//! - Seeded: reproducible for a given (count, seed), channels `front`, `skirt`, `leg`
//! - Random: fresh entropy every call, channels `arm_waist`, `leg1`, `leg2`
//! - Pattern: no randomness, every channel cycles through [`PALETTE`] at a different rate
//!
//! The seeded and random channel names differ. Existing clients read each
//! endpoint with its own field names, so both sets are kept.
//!
//! All values are sent as decimal strings.
use rand::{Rng, SeedableRng, seq::index::sample};
use rand_pcg::Pcg32;
use serde::Serialize;
use thiserror::Error;

/// Times are drawn from `0..TIME_RANGE`.
pub const TIME_RANGE: usize = 1500;
pub const MAX_COUNT: usize = 1500;
pub const PATTERN_CHUNK_SIZE: usize = 100;

const CHANNEL_MAX: u32 = i32::MAX as u32;

pub const BLACK: i64 = 0x000000FF;
pub const RED: i64 = 0xFF0000FF;
pub const GREEN: i64 = 0x00FF00FF;
pub const BLUE: i64 = 0x0000FFFF;
pub const YELLOW: i64 = 0xFFFF00FF;
pub const CYAN: i64 = 0x00FFFFFF;
pub const PURPLE: i64 = 0xFF00FFFF;
pub const WHITE: i64 = 0xFFFFFFFF;
pub const PALETTE: [i64; 8] = [BLACK, RED, GREEN, BLUE, YELLOW, CYAN, PURPLE, WHITE];

const PALETTE_OFFSET: i64 = 250;

/// Bit shifts for head, shoulder, chest, arm_waist, leg1, leg2, shoes.
const PATTERN_SHIFTS: [usize; 7] = [8, 6, 4, 2, 12, 10, 0];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LightListError {
    #[error("cnt must be between 1 and {MAX_COUNT}, got {0}")]
    CountOutOfRange(usize),
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SeededLight {
    pub time: String,
    pub head: String,
    pub shoulder: String,
    pub chest: String,
    pub front: String,
    pub skirt: String,
    pub leg: String,
    pub shoes: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Light {
    pub time: String,
    pub head: String,
    pub shoulder: String,
    pub chest: String,
    pub arm_waist: String,
    pub leg1: String,
    pub leg2: String,
    pub shoes: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct LightList<T> {
    pub color_data: Vec<T>,
}

impl<T> From<Vec<T>> for LightList<T> {
    fn from(color_data: Vec<T>) -> Self {
        Self { color_data }
    }
}

pub fn check_count(cnt: usize) -> Result<(), LightListError> {
    if (1..=MAX_COUNT).contains(&cnt) {
        Ok(())
    } else {
        Err(LightListError::CountOutOfRange(cnt))
    }
}

pub fn create_rng(seed: u64) -> Pcg32 {
    Pcg32::seed_from_u64(seed)
}

fn sorted_times<R: Rng>(rng: &mut R, cnt: usize) -> Vec<usize> {
    let mut times = sample(rng, TIME_RANGE, cnt).into_vec();
    times.sort_unstable();
    times
}

fn channels<R: Rng>(rng: &mut R) -> [String; 7] {
    std::array::from_fn(|_| rng.gen_range(0..=CHANNEL_MAX).to_string())
}

pub fn seeded_lights(cnt: usize, seed: u64) -> Result<Vec<SeededLight>, LightListError> {
    check_count(cnt)?;

    let mut rng = create_rng(seed);
    let times = sorted_times(&mut rng, cnt);

    Ok(times
        .into_iter()
        .map(|time| {
            let [head, shoulder, chest, front, skirt, leg, shoes] = channels(&mut rng);
            SeededLight {
                time: time.to_string(),
                head,
                shoulder,
                chest,
                front,
                skirt,
                leg,
                shoes,
            }
        })
        .collect())
}

pub fn random_lights(cnt: usize) -> Result<Vec<Light>, LightListError> {
    check_count(cnt)?;

    let mut rng = rand::thread_rng();
    let times = sorted_times(&mut rng, cnt);

    Ok(times
        .into_iter()
        .map(|time| {
            let [head, shoulder, chest, arm_waist, leg1, leg2, shoes] = channels(&mut rng);
            Light {
                time: time.to_string(),
                head,
                shoulder,
                chest,
                arm_waist,
                leg1,
                leg2,
                shoes,
            }
        })
        .collect())
}

/// Channel values of pattern record `index`, in the order head, shoulder,
/// chest, arm_waist, leg1, leg2, shoes.
pub fn pattern_channels(index: usize) -> [i64; 7] {
    PATTERN_SHIFTS.map(|shift| PALETTE[(index >> shift) & 3] - PALETTE_OFFSET)
}

pub fn pattern_light(index: usize) -> Light {
    let [head, shoulder, chest, arm_waist, leg1, leg2, shoes] =
        pattern_channels(index).map(|value| value.to_string());

    Light {
        time: index.to_string(),
        head,
        shoulder,
        chest,
        arm_waist,
        leg1,
        leg2,
        shoes,
    }
}

pub fn pattern_lights(cnt: usize) -> Result<Vec<Light>, LightListError> {
    check_count(cnt)?;

    Ok((0..cnt).map(pattern_light).collect())
}

/// Records `[chunk * 100, min((chunk + 1) * 100, cnt))`, empty past the end.
pub fn pattern_chunk(cnt: usize, chunk: usize) -> Result<Vec<Light>, LightListError> {
    check_count(cnt)?;

    let Some(start) = chunk.checked_mul(PATTERN_CHUNK_SIZE) else {
        return Ok(Vec::new());
    };
    let end = start.saturating_add(PATTERN_CHUNK_SIZE).min(cnt);

    Ok((start..end).map(pattern_light).collect())
}
