//! Game constants mirrored from the deployed contract.

use crate::commitment::Flow;

/// Commit-to-reveal window for a level 1 subject in a battle.
pub const BATTLE_REVEAL_DELAY_BASE_MS: u64 = 30_000;

/// Commit-to-reveal window for a level 1 subject in a capture.
pub const CAPTURE_REVEAL_DELAY_BASE_MS: u64 = 30_000;

/// Minimum time between opponent re-rolls for a level 1 subject.
pub const ENCOUNTER_COOLDOWN_BASE_MS: u64 = 60_000;

/// Price of a freshly minted asset, in the smallest ledger unit.
pub const ASSET_PRICE: u64 = 1_000_000_000;

/// Fee attached to every capture commit.
pub const CAPTURE_FEE: u64 = 500_000_000;

/// Fixed gas budget attached to transactions that set one explicitly.
pub const GAS_BUDGET: u64 = 50_000_000;

/// `base * 2^(level - 1)`, saturating at `u64::MAX`. Levels 0 and 1 both yield `base`.
pub fn exponential_delay(base_ms: u64, level: u8) -> u64 {
    let exponent = u32::from(level.max(1) - 1);
    1u64.checked_shl(exponent)
        .and_then(|multiplier| base_ms.checked_mul(multiplier))
        .unwrap_or(u64::MAX)
}

/// Reveal window for `flow` using the contract's default bases.
pub fn reveal_delay(flow: Flow, level: u8) -> u64 {
    let base = match flow {
        Flow::Battle => BATTLE_REVEAL_DELAY_BASE_MS,
        Flow::Capture => CAPTURE_REVEAL_DELAY_BASE_MS,
    };
    exponential_delay(base, level)
}

pub fn encounter_cooldown(level: u8) -> u64 {
    exponential_delay(ENCOUNTER_COOLDOWN_BASE_MS, level)
}

/// Element of an asset or encounter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Element {
    Metal = 0,
    Wood = 1,
    Water = 2,
    Fire = 3,
    Earth = 4,
}

impl Element {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Metal),
            1 => Some(Self::Wood),
            2 => Some(Self::Water),
            3 => Some(Self::Fire),
            4 => Some(Self::Earth),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Metal => "metal",
            Self::Wood => "wood",
            Self::Water => "water",
            Self::Fire => "fire",
            Self::Earth => "earth",
        }
    }
}

/// Visual category of an asset or encounter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Category {
    Beam = 0,
    Marble = 1,
    Pixel = 2,
    Sunset = 3,
    Bauhaus = 4,
    Ring = 5,
}

impl Category {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Beam),
            1 => Some(Self::Marble),
            2 => Some(Self::Pixel),
            3 => Some(Self::Sunset),
            4 => Some(Self::Bauhaus),
            5 => Some(Self::Ring),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Beam => "beam",
            Self::Marble => "marble",
            Self::Pixel => "pixel",
            Self::Sunset => "sunset",
            Self::Bauhaus => "bauhaus",
            Self::Ring => "ring",
        }
    }
}
