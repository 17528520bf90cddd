//! Denominations of the native asset.

pub const NANO: u64 = 1;
pub const MICRO: u64 = 1_000 * NANO;
pub const MILLI: u64 = 1_000 * MICRO;
pub const COIN: u64 = 1_000 * MILLI;
pub const KILO_COIN: u64 = 1_000 * COIN;
pub const MEGA_COIN: u64 = 1_000 * KILO_COIN;

/// Smallest quantum the workload moves around in transfers and mints.
pub const DUST: u64 = 49_463 * NANO;
