use serde::{Deserialize, Serialize};

use procura_core::{DomainError, DomainResult, ValueObject};

/// Unit of a warranty duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarrantyPeriodType {
    Days,
    Months,
    Years,
}

impl WarrantyPeriodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarrantyPeriodType::Days => "DAYS",
            WarrantyPeriodType::Months => "MONTHS",
            WarrantyPeriodType::Years => "YEARS",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s {
            "DAYS" => Ok(WarrantyPeriodType::Days),
            "MONTHS" => Ok(WarrantyPeriodType::Months),
            "YEARS" => Ok(WarrantyPeriodType::Years),
            other => Err(DomainError::validation(format!(
                "unknown warranty period type '{other}'"
            ))),
        }
    }
}

/// Warranty coverage: a positive duration in a given unit.
///
/// Type and duration are only ever present together; see [`WarrantyPeriod::from_parts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WarrantyPeriod {
    period_type: WarrantyPeriodType,
    period: u32,
}

impl WarrantyPeriod {
    pub fn new(period_type: WarrantyPeriodType, period: u32) -> DomainResult<Self> {
        if period == 0 {
            return Err(DomainError::validation(
                "warranty period must be a positive integer",
            ));
        }
        Ok(Self {
            period_type,
            period,
        })
    }

    /// Build an optional warranty from two optional halves (both-or-neither).
    pub fn from_parts(
        period_type: Option<WarrantyPeriodType>,
        period: Option<u32>,
    ) -> DomainResult<Option<Self>> {
        match (period_type, period) {
            (None, None) => Ok(None),
            (Some(t), Some(p)) => Self::new(t, p).map(Some),
            (None, Some(_)) => Err(DomainError::validation(
                "warranty period type is required when warranty period is specified",
            )),
            (Some(_), None) => Err(DomainError::validation(
                "warranty period is required when warranty period type is specified",
            )),
        }
    }

    pub fn period_type(&self) -> WarrantyPeriodType {
        self.period_type
    }

    pub fn period(&self) -> u32 {
        self.period
    }
}

impl ValueObject for WarrantyPeriod {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_or_neither() {
        assert_eq!(WarrantyPeriod::from_parts(None, None).unwrap(), None);
        assert!(WarrantyPeriod::from_parts(Some(WarrantyPeriodType::Months), None).is_err());
        assert!(WarrantyPeriod::from_parts(None, Some(12)).is_err());

        let w = WarrantyPeriod::from_parts(Some(WarrantyPeriodType::Months), Some(12))
            .unwrap()
            .unwrap();
        assert_eq!(w.period_type(), WarrantyPeriodType::Months);
        assert_eq!(w.period(), 12);
    }

    #[test]
    fn zero_period_is_rejected() {
        assert!(WarrantyPeriod::new(WarrantyPeriodType::Days, 0).is_err());
    }

    #[test]
    fn unknown_period_type_is_rejected() {
        assert!(WarrantyPeriodType::parse("WEEKS").is_err());
    }
}
