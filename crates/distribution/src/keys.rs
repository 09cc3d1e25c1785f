//! Store layout of the distribution module.
//!
//! Every record lives under a single-byte prefix followed by fixed-width
//! fields: 20-byte addresses, big-endian heights and timestamps (so range
//! scans walk them in order) and little-endian historical periods.

use chrono::{DateTime, Utc};
use meridian_types::{AccAddress, ValAddress, ADDRESS_BYTES};

pub const POOLS_KEY: &[u8] = &[0x00];
pub const PREVIOUS_PROPOSER_KEY: &[u8] = &[0x01];
pub const OUTSTANDING_REWARDS_PREFIX: u8 = 0x02;
pub const DELEGATOR_WITHDRAW_ADDR_PREFIX: u8 = 0x03;
pub const DELEGATOR_STARTING_INFO_PREFIX: u8 = 0x04;
pub const VALIDATOR_HISTORICAL_REWARDS_PREFIX: u8 = 0x05;
pub const VALIDATOR_CURRENT_REWARDS_PREFIX: u8 = 0x06;
pub const VALIDATOR_ACCUMULATED_COMMISSION_PREFIX: u8 = 0x07;
pub const VALIDATOR_SLASH_EVENT_PREFIX: u8 = 0x08;
pub const VALIDATOR_LOCKED_REWARDS_PREFIX: u8 = 0x09;
pub const REWARDS_UNLOCK_QUEUE_PREFIX: u8 = 0x0A;
pub const DELEGATOR_REWARDS_BANK_PREFIX: u8 = 0x0B;
pub const PARAMS_KEY: &[u8] = &[0x0C];

/// Highest prefix owned by this module; everything in `0x00..=LAST_PREFIX`
/// is distribution state.
pub const LAST_PREFIX: u8 = 0x0C;

const TIME_KEY_BYTES: usize = 12;

fn key(prefix: u8, parts: &[&[u8]]) -> Vec<u8> {
    let len = 1 + parts.iter().map(|p| p.len()).sum::<usize>();
    let mut out = Vec::with_capacity(len);
    out.push(prefix);
    for part in parts {
        out.extend_from_slice(part);
    }
    out
}

pub fn outstanding_rewards_key(val: &ValAddress) -> Vec<u8> {
    key(OUTSTANDING_REWARDS_PREFIX, &[val.as_bytes()])
}

pub fn delegator_withdraw_addr_key(del: &AccAddress) -> Vec<u8> {
    key(DELEGATOR_WITHDRAW_ADDR_PREFIX, &[del.as_bytes()])
}

pub fn delegator_starting_info_key(val: &ValAddress, del: &AccAddress) -> Vec<u8> {
    key(
        DELEGATOR_STARTING_INFO_PREFIX,
        &[val.as_bytes(), del.as_bytes()],
    )
}

pub fn validator_historical_rewards_prefix(val: &ValAddress) -> Vec<u8> {
    key(VALIDATOR_HISTORICAL_REWARDS_PREFIX, &[val.as_bytes()])
}

pub fn validator_historical_rewards_key(val: &ValAddress, period: u64) -> Vec<u8> {
    key(
        VALIDATOR_HISTORICAL_REWARDS_PREFIX,
        &[val.as_bytes(), &period.to_le_bytes()],
    )
}

pub fn validator_current_rewards_key(val: &ValAddress) -> Vec<u8> {
    key(VALIDATOR_CURRENT_REWARDS_PREFIX, &[val.as_bytes()])
}

pub fn validator_accumulated_commission_key(val: &ValAddress) -> Vec<u8> {
    key(VALIDATOR_ACCUMULATED_COMMISSION_PREFIX, &[val.as_bytes()])
}

pub fn validator_slash_event_prefix(val: &ValAddress) -> Vec<u8> {
    key(VALIDATOR_SLASH_EVENT_PREFIX, &[val.as_bytes()])
}

/// Prefix of every slash event of `val` recorded at `height`.
pub fn validator_slash_event_height_prefix(val: &ValAddress, height: u64) -> Vec<u8> {
    key(
        VALIDATOR_SLASH_EVENT_PREFIX,
        &[val.as_bytes(), &height.to_be_bytes()],
    )
}

pub fn validator_slash_event_key(val: &ValAddress, height: u64, period: u64) -> Vec<u8> {
    key(
        VALIDATOR_SLASH_EVENT_PREFIX,
        &[val.as_bytes(), &height.to_be_bytes(), &period.to_be_bytes()],
    )
}

pub fn validator_locked_rewards_key(val: &ValAddress) -> Vec<u8> {
    key(VALIDATOR_LOCKED_REWARDS_PREFIX, &[val.as_bytes()])
}

/// Unlock queue key: seconds with the sign bit flipped, then nanoseconds,
/// both big-endian, so byte order matches chronological order.
pub fn rewards_unlock_queue_key(time: &DateTime<Utc>) -> Vec<u8> {
    let secs = (time.timestamp() as u64) ^ (1 << 63);
    key(
        REWARDS_UNLOCK_QUEUE_PREFIX,
        &[
            &secs.to_be_bytes(),
            &time.timestamp_subsec_nanos().to_be_bytes(),
        ],
    )
}

pub fn delegator_rewards_bank_key(del: &AccAddress) -> Vec<u8> {
    key(DELEGATOR_REWARDS_BANK_PREFIX, &[del.as_bytes()])
}

// -----------------------------------------------------------------------------
// Key parsing
// -----------------------------------------------------------------------------

fn split_address(raw: &[u8]) -> Option<([u8; ADDRESS_BYTES], &[u8])> {
    if raw.len() < ADDRESS_BYTES {
        return None;
    }
    let (addr, rest) = raw.split_at(ADDRESS_BYTES);
    Some((addr.try_into().ok()?, rest))
}

fn read_u64_be(raw: &[u8]) -> Option<u64> {
    Some(u64::from_be_bytes(raw.try_into().ok()?))
}

/// Address suffix of a single-address key (outstanding, commission, ...).
pub fn parse_address_key(key: &[u8]) -> Option<[u8; ADDRESS_BYTES]> {
    let (addr, rest) = split_address(key.get(1..)?)?;
    rest.is_empty().then_some(addr)
}

pub fn parse_delegator_starting_info_key(key: &[u8]) -> Option<(ValAddress, AccAddress)> {
    let (val, rest) = split_address(key.get(1..)?)?;
    let (del, rest) = split_address(rest)?;
    rest.is_empty()
        .then_some((ValAddress::new(val), AccAddress::new(del)))
}

pub fn parse_validator_historical_rewards_key(key: &[u8]) -> Option<(ValAddress, u64)> {
    let (val, rest) = split_address(key.get(1..)?)?;
    let period = u64::from_le_bytes(rest.try_into().ok()?);
    Some((ValAddress::new(val), period))
}

pub fn parse_validator_slash_event_key(key: &[u8]) -> Option<(ValAddress, u64, u64)> {
    let (val, rest) = split_address(key.get(1..)?)?;
    if rest.len() != 16 {
        return None;
    }
    let height = read_u64_be(&rest[..8])?;
    let period = read_u64_be(&rest[8..])?;
    Some((ValAddress::new(val), height, period))
}

pub fn parse_rewards_unlock_queue_key(key: &[u8]) -> Option<DateTime<Utc>> {
    let raw = key.get(1..)?;
    if raw.len() != TIME_KEY_BYTES {
        return None;
    }
    let secs = (read_u64_be(&raw[..8])? ^ (1 << 63)) as i64;
    let nanos = u32::from_be_bytes(raw[8..].try_into().ok()?);
    DateTime::<Utc>::from_timestamp(secs, nanos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_slash_event_keys_sort_by_height() {
        let val = ValAddress::new([7; ADDRESS_BYTES]);
        let low = validator_slash_event_key(&val, 5, 900);
        let high = validator_slash_event_key(&val, 256, 1);
        assert!(low < high);
        assert_eq!(parse_validator_slash_event_key(&high), Some((val, 256, 1)));
        assert!(high.starts_with(&validator_slash_event_height_prefix(&val, 256)));
    }

    #[test]
    fn test_historical_key_uses_little_endian_period() {
        let val = ValAddress::new([1; ADDRESS_BYTES]);
        let key = validator_historical_rewards_key(&val, 1);
        assert_eq!(&key[21..], &[1, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(parse_validator_historical_rewards_key(&key), Some((val, 1)));
    }

    #[test]
    fn test_unlock_queue_keys_are_chronological() {
        let before_epoch = Utc.timestamp_opt(-10, 0).unwrap();
        let epoch = Utc.timestamp_opt(0, 0).unwrap();
        let later = Utc.timestamp_opt(0, 5).unwrap();
        let much_later = Utc.timestamp_opt(1_800_000_000, 0).unwrap();

        let keys: Vec<Vec<u8>> = [before_epoch, epoch, later, much_later]
            .iter()
            .map(rewards_unlock_queue_key)
            .collect();
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(parse_rewards_unlock_queue_key(&keys[2]), Some(later));
        assert_eq!(parse_rewards_unlock_queue_key(&keys[0]), Some(before_epoch));
    }

    #[test]
    fn test_starting_info_key_roundtrip() {
        let val = ValAddress::new([2; ADDRESS_BYTES]);
        let del = AccAddress::new([3; ADDRESS_BYTES]);
        let key = delegator_starting_info_key(&val, &del);
        assert_eq!(parse_delegator_starting_info_key(&key), Some((val, del)));
        assert_eq!(parse_address_key(&outstanding_rewards_key(&val)), Some([2; 20]));
    }
}
