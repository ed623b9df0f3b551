use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

const BASIS_POINTS: u32 = 10_000;

/// Arbitrary-precision voting power. Serialized as a decimal string so
/// on-chain balances survive JSON round trips without float coercion.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VotingPower(BigInt);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VotingPowerParseError {
    #[error("voting power is empty")]
    Empty,
    #[error("invalid voting power '{0}'")]
    Invalid(String),
}

impl VotingPower {
    pub fn zero() -> Self {
        Self(BigInt::zero())
    }

    pub fn from_bigint(value: BigInt) -> Self {
        Self(value)
    }

    pub fn as_bigint(&self) -> &BigInt {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_negative()
    }

    /// `self - other`, floored at zero.
    pub fn saturating_sub(&self, other: &Self) -> Self {
        let difference = &self.0 - &other.0;
        if difference.is_negative() {
            Self::zero()
        } else {
            Self(difference)
        }
    }

    /// Share of `total` as a percentage with two decimals, computed in
    /// integer basis points rounded half up and clamped to `0..=100`.
    pub fn share_percent(&self, total: &Self) -> f64 {
        if !total.0.is_positive() || !self.0.is_positive() {
            return 0.0;
        }
        let doubled_total = &total.0 * BigInt::from(2u32);
        let basis_points =
            (&self.0 * BigInt::from(2 * BASIS_POINTS) + &total.0) / doubled_total;
        let basis_points = basis_points
            .to_u32()
            .unwrap_or(BASIS_POINTS)
            .min(BASIS_POINTS);
        f64::from(basis_points) / 100.0
    }
}

impl From<u64> for VotingPower {
    fn from(value: u64) -> Self {
        Self(BigInt::from(value))
    }
}

impl From<u128> for VotingPower {
    fn from(value: u128) -> Self {
        Self(BigInt::from(value))
    }
}

impl FromStr for VotingPower {
    type Err = VotingPowerParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(VotingPowerParseError::Empty);
        }
        BigInt::from_str(trimmed)
            .map(Self)
            .map_err(|_| VotingPowerParseError::Invalid(trimmed.to_owned()))
    }
}

impl fmt::Display for VotingPower {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Add for VotingPower {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl<'a> Add<&'a VotingPower> for &'a VotingPower {
    type Output = VotingPower;

    fn add(self, rhs: &'a VotingPower) -> Self::Output {
        VotingPower(&self.0 + &rhs.0)
    }
}

impl AddAssign<&VotingPower> for VotingPower {
    fn add_assign(&mut self, rhs: &VotingPower) {
        self.0 += &rhs.0;
    }
}

impl<'a> Sum<&'a VotingPower> for VotingPower {
    fn sum<I: Iterator<Item = &'a VotingPower>>(iter: I) -> Self {
        iter.fold(Self::zero(), |mut total, value| {
            total += value;
            total
        })
    }
}

impl Serialize for VotingPower {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for VotingPower {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(VotingPowerVisitor)
    }
}

struct VotingPowerVisitor;

impl Visitor<'_> for VotingPowerVisitor {
    type Value = VotingPower;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a decimal integer string or an integer")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
        value.parse().map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
        Ok(VotingPower::from(value))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
        Ok(VotingPower(BigInt::from(value)))
    }

    fn visit_u128<E: de::Error>(self, value: u128) -> Result<Self::Value, E> {
        Ok(VotingPower::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_balances_beyond_u128() {
        let raw = "340282366920938463463374607431768211456000";
        let power: VotingPower = raw.parse().expect("parse");
        assert_eq!(power.to_string(), raw);

        let doubled = &power + &power;
        assert_eq!(doubled.to_string(), "680564733841876926926749214863536422912000");
    }

    #[test]
    fn rejects_empty_and_fractional_values() {
        assert_eq!("  ".parse::<VotingPower>(), Err(VotingPowerParseError::Empty));
        assert!(matches!(
            "12.5".parse::<VotingPower>(),
            Err(VotingPowerParseError::Invalid(_))
        ));
    }

    #[test]
    fn saturating_sub_floors_at_zero() {
        let small = VotingPower::from(10u64);
        let large = VotingPower::from(25u64);
        assert_eq!(large.saturating_sub(&small), VotingPower::from(15u64));
        assert!(small.saturating_sub(&large).is_zero());
    }

    #[test]
    fn share_percent_uses_basis_points() {
        let part = VotingPower::from(1u64);
        let total = VotingPower::from(3u64);
        assert_eq!(part.share_percent(&total), 33.33);
        assert_eq!(total.share_percent(&total), 100.0);
        assert_eq!(part.share_percent(&VotingPower::zero()), 0.0);
        assert_eq!(total.share_percent(&part), 100.0);
    }

    #[test]
    fn share_percent_rounds_half_up() {
        let total = VotingPower::from(3u64);
        assert_eq!(VotingPower::from(2u64).share_percent(&total), 66.67);

        let total = VotingPower::from(80_000u64);
        assert_eq!(VotingPower::from(1u64).share_percent(&total), 0.0);
        assert_eq!(VotingPower::from(4u64).share_percent(&total), 0.01);
    }

    #[test]
    fn json_accepts_strings_and_integers() {
        let from_string: VotingPower = serde_json::from_str("\"1000000000000\"").expect("string");
        let from_number: VotingPower = serde_json::from_str("1000000000000").expect("number");
        assert_eq!(from_string, from_number);
        assert_eq!(
            serde_json::to_string(&from_number).expect("serialize"),
            "\"1000000000000\""
        );
        assert!(serde_json::from_str::<VotingPower>("1.5").is_err());
    }
}
