use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypesError;
use crate::money::Money;

/// Categorical level controlling the maximum task complexity an agent may attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Novice,
    Established,
    Advanced,
    Expert,
    Master,
}

impl Tier {
    /// Maximum complexity level (1-5) this tier is allowed to attempt.
    pub fn max_complexity(self) -> u8 {
        match self {
            Tier::Novice => 2,
            Tier::Established => 3,
            Tier::Advanced => 4,
            Tier::Expert => 5,
            Tier::Master => 5,
        }
    }
}

/// Financial fields of an agent record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Financials {
    pub balance: Money,
    pub escrow: Money,
    pub lifetime_earnings: Money,
    /// Always <= 0; balance must never fall below this.
    pub debt_ceiling: Money,
}

impl Financials {
    pub fn validate(&self) -> Result<(), TypesError> {
        if self.debt_ceiling.hundredths() > 0 {
            return Err(TypesError::InvalidRecord("debt_ceiling must be <= 0".into()));
        }
        if self.balance < self.debt_ceiling {
            return Err(TypesError::InvalidRecord(
                "balance below debt_ceiling".into(),
            ));
        }
        if self.escrow.hundredths() < 0 {
            return Err(TypesError::InvalidRecord("escrow must be >= 0".into()));
        }
        if self.lifetime_earnings.hundredths() < 0 {
            return Err(TypesError::InvalidRecord(
                "lifetime_earnings must be >= 0".into(),
            ));
        }
        Ok(())
    }
}

/// Unit-interval score. Construction is fallible because invariants require
/// rates and reputation to stay within `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitInterval(f64);

impl UnitInterval {
    pub fn new(value: f64) -> Result<Self, TypesError> {
        if (0.0..=1.0).contains(&value) {
            Ok(UnitInterval(value))
        } else {
            Err(TypesError::InvalidRecord(format!(
                "value {value} outside [0,1]"
            )))
        }
    }

    pub fn get(self) -> f64 {
        self.0
    }
}

/// Performance fields of an agent record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Performance {
    pub streak: u32,
    pub success_rate: UnitInterval,
    pub avg_efficiency: UnitInterval,
    pub reputation: UnitInterval,
}

/// Non-financial, non-performance metadata of an agent record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMetadata {
    pub tier: Tier,
    pub base_rate: Money,
    pub last_active: DateTime<Utc>,
}

/// Full agent record persisted by the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub financials: Financials,
    pub performance: Performance,
    pub metadata: AgentMetadata,
    pub active: bool,
}

impl AgentRecord {
    pub fn validate(&self) -> Result<(), TypesError> {
        self.financials.validate()
    }
}
