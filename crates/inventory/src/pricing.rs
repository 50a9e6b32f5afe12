use serde::{Deserialize, Serialize};

use procura_core::{Amount, DomainError, DomainResult, ValueObject};

/// Whole-percent tax rate in `0..=100`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct TaxRate(u8);

impl TaxRate {
    pub fn new(percent: i64) -> DomainResult<Self> {
        if !(0..=100).contains(&percent) {
            return Err(DomainError::validation(format!(
                "tax rate must be between 0 and 100 (got {percent})"
            )));
        }
        Ok(Self(percent as u8))
    }

    pub fn percent(&self) -> u8 {
        self.0
    }
}

impl ValueObject for TaxRate {}

impl TryFrom<i64> for TaxRate {
    type Error = DomainError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        TaxRate::new(value)
    }
}

impl From<TaxRate> for u8 {
    fn from(value: TaxRate) -> Self {
        value.0
    }
}

/// Rental and sale attributes a stock line carries.
///
/// Copied from the purchase line item when the stock line is first opened;
/// later receipts never overwrite them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockPricing {
    pub rental_rate: Amount,
    pub replacement_cost: Amount,
    pub late_fee_rate: Amount,
    pub rent_tax_rate: TaxRate,
    pub rentable: bool,
    pub selling_price: Amount,
    pub sell_tax_rate: TaxRate,
    pub sellable: bool,
}

impl Default for StockPricing {
    fn default() -> Self {
        Self {
            rental_rate: Amount::ZERO,
            replacement_cost: Amount::ZERO,
            late_fee_rate: Amount::ZERO,
            rent_tax_rate: TaxRate::default(),
            rentable: true,
            selling_price: Amount::ZERO,
            sell_tax_rate: TaxRate::default(),
            sellable: false,
        }
    }
}

impl ValueObject for StockPricing {}
