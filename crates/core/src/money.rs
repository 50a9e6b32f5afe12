//! Exact monetary amounts and whole-unit quantities.
//!
//! Both types validate at construction and keep their invariant (non-negative)
//! through every arithmetic operation: operations that could leave the valid
//! range are `checked_*` and return `None` instead of wrapping or going
//! negative.
//!
//! Amounts are held at a fixed scale of [`Amount::SCALE`] decimal places, the
//! scale of the money columns in storage, so a value reads back exactly as it
//! was written.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// Non-negative exact-decimal monetary amount with two decimal places.
///
/// Serialized as a decimal string (e.g. `"12.50"`) so no precision is lost
/// crossing the transport boundary.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    /// Decimal places every amount carries.
    pub const SCALE: u32 = 2;

    pub const ZERO: Amount = Amount(Decimal::from_parts(0, 0, 0, false, Self::SCALE));

    /// Validate and wrap a decimal value.
    ///
    /// Trailing zeros beyond [`Amount::SCALE`] are accepted (`1.500` is
    /// `1.50`); any further significant digit is rejected rather than rounded.
    pub fn new(value: Decimal) -> DomainResult<Self> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(DomainError::validation(format!(
                "amount cannot be negative (got {value})"
            )));
        }
        let mut value = value.normalize();
        if value.scale() > Self::SCALE {
            return Err(DomainError::validation(format!(
                "amount cannot have more than {} decimal places (got {value})",
                Self::SCALE
            )));
        }
        value.rescale(Self::SCALE);
        Ok(Self(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// Subtract, returning `None` if the result would be negative.
    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        let diff = self.0.checked_sub(other.0)?;
        if diff.is_sign_negative() && !diff.is_zero() {
            None
        } else {
            Some(Amount(diff.normalize_zero()))
        }
    }

    pub fn mul_quantity(self, quantity: Quantity) -> Option<Amount> {
        self.0
            .checked_mul(Decimal::from(quantity.get()))
            .map(Amount)
    }
}

trait NormalizeZero {
    fn normalize_zero(self) -> Self;
}

impl NormalizeZero for Decimal {
    // `-0` and `0` must compare and print identically.
    fn normalize_zero(mut self) -> Self {
        if self.is_zero() {
            self.set_sign_positive(true);
        }
        self
    }
}

impl ValueObject for Amount {}

impl TryFrom<Decimal> for Amount {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Amount::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(value: Amount) -> Self {
        value.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Non-negative whole-unit quantity.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    pub const ZERO: Quantity = Quantity(0);

    /// Validate a raw count (must be `>= 0` and fit in `u32`).
    pub fn new(value: i64) -> DomainResult<Self> {
        if value < 0 {
            return Err(DomainError::validation(format!(
                "quantity cannot be negative (got {value})"
            )));
        }
        u32::try_from(value)
            .map(Self)
            .map_err(|_| DomainError::validation(format!("quantity out of range (got {value})")))
    }

    /// Validate a raw count that must be strictly positive.
    pub fn positive(value: i64) -> DomainResult<Self> {
        if value <= 0 {
            return Err(DomainError::validation(format!(
                "quantity must be positive (got {value})"
            )));
        }
        Self::new(value)
    }

    pub const fn from_u32(value: u32) -> Self {
        Self(value)
    }

    pub const fn get(&self) -> u32 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Quantity) -> Option<Quantity> {
        self.0.checked_add(other.0).map(Quantity)
    }

    pub fn saturating_sub(self, other: Quantity) -> Quantity {
        Quantity(self.0.saturating_sub(other.0))
    }
}

impl ValueObject for Quantity {}

impl TryFrom<i64> for Quantity {
    type Error = DomainError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Quantity::new(value)
    }
}

impl From<Quantity> for u32 {
    fn from(value: Quantity) -> Self {
        value.0
    }
}

impl From<Quantity> for i64 {
    fn from(value: Quantity) -> Self {
        i64::from(value.0)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
