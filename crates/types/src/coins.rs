//! Integral and fractional multi-denomination amounts.
//!
//! `Coins` are what accounts hold; `DecCoins` are what the reward ledger
//! tracks internally. Both keep their entries sorted by denomination and never
//! store zero entries, so equality is structural. Neither type can go
//! negative: subtraction is checked and returns `None` when any denomination
//! would drop below zero.

use crate::decimal::Dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoinsError {
    #[error("invalid denomination: {0:?}")]
    InvalidDenom(String),
    #[error("duplicate denomination: {0}")]
    DuplicateDenom(String),
    #[error("invalid coin expression: {0:?}")]
    Parse(String),
}

/// Denominations are 3-64 characters: a lowercase letter followed by
/// lowercase letters, digits or `/`.
pub fn validate_denom(denom: &str) -> Result<(), CoinsError> {
    let mut chars = denom.chars();
    let valid = (3..=64).contains(&denom.len())
        && chars.next().is_some_and(|c| c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '/');
    if valid {
        Ok(())
    } else {
        Err(CoinsError::InvalidDenom(denom.to_string()))
    }
}

mod amount_str {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &u128, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&v.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u128, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    #[serde(with = "amount_str")]
    pub amount: u128,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: u128) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Coins(Vec<Coin>);

impl Coins {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Build a sorted set, dropping zero amounts and rejecting duplicates.
    pub fn new(coins: Vec<Coin>) -> Result<Self, CoinsError> {
        let mut map = BTreeMap::new();
        for coin in coins {
            validate_denom(&coin.denom)?;
            if map.insert(coin.denom.clone(), coin.amount).is_some() {
                return Err(CoinsError::DuplicateDenom(coin.denom));
            }
        }
        Ok(Self::from_map(map))
    }

    /// Single-denomination convenience constructor.
    pub fn from_coin(denom: impl Into<String>, amount: u128) -> Self {
        let mut map = BTreeMap::new();
        map.insert(denom.into(), amount);
        Self::from_map(map)
    }

    fn from_map(map: BTreeMap<String, u128>) -> Self {
        Self(
            map.into_iter()
                .filter(|(_, amount)| *amount > 0)
                .map(|(denom, amount)| Coin { denom, amount })
                .collect(),
        )
    }

    fn to_map(&self) -> BTreeMap<String, u128> {
        self.0
            .iter()
            .map(|c| (c.denom.clone(), c.amount))
            .collect()
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Coin> {
        self.0.iter()
    }

    pub fn amount_of(&self, denom: &str) -> u128 {
        self.0
            .iter()
            .find(|c| c.denom == denom)
            .map(|c| c.amount)
            .unwrap_or(0)
    }

    /// Re-check denomination rules, e.g. after deserialising untrusted input.
    pub fn validate(&self) -> Result<(), CoinsError> {
        let mut previous: Option<&str> = None;
        for coin in &self.0 {
            validate_denom(&coin.denom)?;
            if let Some(prev) = previous {
                if prev >= coin.denom.as_str() {
                    return Err(CoinsError::DuplicateDenom(coin.denom.clone()));
                }
            }
            if coin.amount == 0 {
                return Err(CoinsError::Parse(coin.to_string()));
            }
            previous = Some(&coin.denom);
        }
        Ok(())
    }

    pub fn add(&self, other: &Coins) -> Coins {
        let mut map = self.to_map();
        for coin in &other.0 {
            let entry = map.entry(coin.denom.clone()).or_insert(0);
            *entry = entry.saturating_add(coin.amount);
        }
        Self::from_map(map)
    }

    /// `self - other`, or `None` if any denomination would go negative.
    pub fn checked_sub(&self, other: &Coins) -> Option<Coins> {
        let mut map = self.to_map();
        for coin in &other.0 {
            let have = map.get(&coin.denom).copied().unwrap_or(0);
            map.insert(coin.denom.clone(), have.checked_sub(coin.amount)?);
        }
        Some(Self::from_map(map))
    }

    pub fn is_all_gte(&self, other: &Coins) -> bool {
        self.checked_sub(other).is_some()
    }

    pub fn to_dec_coins(&self) -> DecCoins {
        DecCoins::from(self)
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join(","))
    }
}

impl FromStr for Coins {
    type Err = CoinsError;

    /// Parses `"10stake,5xfi"`; the empty string is the empty set.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Coins::empty());
        }
        let mut coins = Vec::new();
        for part in s.split(',') {
            let part = part.trim();
            let split = part
                .find(|c: char| !c.is_ascii_digit())
                .ok_or_else(|| CoinsError::Parse(part.to_string()))?;
            let (amount, denom) = part.split_at(split);
            let amount: u128 = amount
                .parse()
                .map_err(|_| CoinsError::Parse(part.to_string()))?;
            coins.push(Coin::new(denom, amount));
        }
        Coins::new(coins)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DecCoin {
    pub denom: String,
    pub amount: Dec,
}

impl DecCoin {
    pub fn new(denom: impl Into<String>, amount: Dec) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }
}

impl fmt::Display for DecCoin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DecCoins(Vec<DecCoin>);

impl DecCoins {
    pub fn zero() -> Self {
        Self(Vec::new())
    }

    pub fn from_dec_coin(denom: impl Into<String>, amount: Dec) -> Self {
        let mut map = BTreeMap::new();
        map.insert(denom.into(), amount);
        Self::from_map(map)
    }

    fn from_map(map: BTreeMap<String, Dec>) -> Self {
        Self(
            map.into_iter()
                .filter(|(_, amount)| !amount.is_zero())
                .map(|(denom, amount)| DecCoin { denom, amount })
                .collect(),
        )
    }

    fn to_map(&self) -> BTreeMap<String, Dec> {
        self.0
            .iter()
            .map(|c| (c.denom.clone(), c.amount.clone()))
            .collect()
    }

    fn map_amounts(&self, f: impl Fn(&Dec) -> Dec) -> DecCoins {
        Self::from_map(
            self.0
                .iter()
                .map(|c| (c.denom.clone(), f(&c.amount)))
                .collect(),
        )
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DecCoin> {
        self.0.iter()
    }

    pub fn amount_of(&self, denom: &str) -> Dec {
        self.0
            .iter()
            .find(|c| c.denom == denom)
            .map(|c| c.amount.clone())
            .unwrap_or_default()
    }

    pub fn is_any_negative(&self) -> bool {
        self.0.iter().any(|c| c.amount.is_negative())
    }

    pub fn add(&self, other: &DecCoins) -> DecCoins {
        let mut map = self.to_map();
        for coin in &other.0 {
            *map.entry(coin.denom.clone()).or_default() += &coin.amount;
        }
        Self::from_map(map)
    }

    /// `self - other`, or `None` if any denomination would go negative.
    pub fn checked_sub(&self, other: &DecCoins) -> Option<DecCoins> {
        let mut map = self.to_map();
        for coin in &other.0 {
            let entry = map.entry(coin.denom.clone()).or_default();
            *entry -= &coin.amount;
            if entry.is_negative() {
                return None;
            }
        }
        Some(Self::from_map(map))
    }

    /// `self - other` where the caller guarantees `self >= other`.
    ///
    /// # Panics
    /// If the result would be negative; callers only use this on amounts the
    /// ledger itself derived from `self`.
    pub fn sub(&self, other: &DecCoins) -> DecCoins {
        match self.checked_sub(other) {
            Some(result) => result,
            None => panic!("negative coin amount: {self} - {other}"),
        }
    }

    pub fn is_all_gte(&self, other: &DecCoins) -> bool {
        self.checked_sub(other).is_some()
    }

    /// Per-denomination minimum of both sets.
    pub fn intersect(&self, other: &DecCoins) -> DecCoins {
        let theirs = other.to_map();
        Self::from_map(
            self.0
                .iter()
                .filter_map(|c| {
                    theirs
                        .get(&c.denom)
                        .map(|amount| (c.denom.clone(), c.amount.clone().min(amount.clone())))
                })
                .collect(),
        )
    }

    pub fn mul_dec(&self, d: &Dec) -> DecCoins {
        self.map_amounts(|a| a.mul(d))
    }

    pub fn mul_dec_truncate(&self, d: &Dec) -> DecCoins {
        self.map_amounts(|a| a.mul_truncate(d))
    }

    pub fn quo_dec(&self, d: &Dec) -> DecCoins {
        self.map_amounts(|a| a.quo(d))
    }

    pub fn quo_dec_truncate(&self, d: &Dec) -> DecCoins {
        self.map_amounts(|a| a.quo_truncate(d))
    }

    /// Split into whole coins and the fractional change left behind.
    pub fn truncate_decimal(&self) -> (Coins, DecCoins) {
        let mut whole = BTreeMap::new();
        let mut change = BTreeMap::new();
        for coin in &self.0 {
            let truncated = coin.amount.truncate_dec();
            let amount = truncated.truncate_u128().unwrap_or(0);
            change.insert(coin.denom.clone(), &coin.amount - &truncated);
            whole.insert(coin.denom.clone(), amount);
        }
        (Coins::from_map(whole), DecCoins::from_map(change))
    }
}

impl From<&Coins> for DecCoins {
    fn from(coins: &Coins) -> Self {
        DecCoins::from_map(
            coins
                .iter()
                .map(|c| (c.denom.clone(), Dec::from_u128(c.amount)))
                .collect(),
        )
    }
}

impl From<Coins> for DecCoins {
    fn from(coins: Coins) -> Self {
        DecCoins::from(&coins)
    }
}

impl fmt::Display for DecCoins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join(","))
    }
}
