use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Sub},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CNY_CURRENCY_CODE: &str = "CNY";

//--------------------------------------        Fen         ---------------------------------------------------------
/// An amount in the minor currency unit (1/100 yuan), which is how the payment provider reports all amounts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fen(i64);

impl Add for Fen {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Fen {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Sum for Fen {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in fen: {0}")]
pub struct FenConversionError(String);

impl From<i64> for Fen {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<u64> for Fen {
    type Error = FenConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        i64::try_from(value).map(Self).map_err(|_| FenConversionError(format!("{value} is too large")))
    }
}

impl Display for Fen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}¥{}.{:02}", abs / 100, abs % 100)
    }
}

impl Fen {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_yuan(yuan: i64) -> Self {
        Self(yuan * 100)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(Fen::from(1).to_string(), "¥0.01");
        assert_eq!(Fen::from_yuan(12).to_string(), "¥12.00");
        assert_eq!(Fen::from(-250).to_string(), "-¥2.50");
    }

    #[test]
    fn arithmetic() {
        let total: Fen = [Fen::from(100), Fen::from(250)].into_iter().sum();
        assert_eq!(total, Fen::from(350));
        assert_eq!(total - Fen::from(50), Fen::from(300));
        assert!(Fen::try_from(u64::MAX).is_err());
    }
}
