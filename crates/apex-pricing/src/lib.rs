//! Pure compensation, tax, and tier-access formulas consumed by the hook
//! pipeline's `PRE_TOOL`/`POST_TOOL` stages. Nothing here performs I/O or
//! consults global state: every function takes its inputs explicitly and
//! returns a value, so it is trivially unit-testable and reusable from any
//! hook without a ledger handle.

use apex_types::{Money, Tier};
use serde::{Deserialize, Serialize};

/// Qualitative task complexity, driving the compensation multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Simple,
    Medium,
    Complex,
    Expert,
}

impl Complexity {
    /// Multiplier `C` in the compensation formula.
    pub fn multiplier(self) -> f64 {
        match self {
            Complexity::Simple => 1.0,
            Complexity::Medium => 1.5,
            Complexity::Complex => 2.5,
            Complexity::Expert => 5.0,
        }
    }

    /// Numeric complexity level (1-5) checked against a tier's ceiling by
    /// [`tier_allows`]. Complex and Expert both sit above the mid tiers so
    /// that `advanced`/`expert`/`master` agents are the ones cleared for
    /// them.
    pub fn level(self) -> u8 {
        match self {
            Complexity::Simple => 1,
            Complexity::Medium => 2,
            Complexity::Complex => 4,
            Complexity::Expert => 5,
        }
    }
}

/// `S(s) = min(2.0, 1.0 + log10(s + 1))`, the streak bonus.
pub fn streak_bonus(streak: u32) -> f64 {
    (1.0 + ((streak as f64) + 1.0).log10()).min(2.0)
}

/// `tier_allows(tier, complexity)`: whether an agent of `tier` may attempt
/// a task at the given numeric complexity level.
pub fn tier_allows(tier: Tier, complexity_level: u8) -> bool {
    complexity_level <= tier.max_complexity()
}

fn money_from_f64(apx: f64) -> Money {
    Money::from_hundredths((apx * 100.0).round() as i64)
}

/// `P = (B · C · S(s)) − token_cost − ΣF`.
///
/// `token_cost` and `fines` are supplied as already-computed [`Money`]
/// values (see [`token_cost`] and the caller's fine ledger) rather than raw
/// scalars, so this function stays purely arithmetic.
pub fn compensation(
    base_rate: Money,
    complexity: Complexity,
    streak: u32,
    token_cost: Money,
    fines: Money,
) -> Money {
    let gross = base_rate.hundredths() as f64 / 100.0 * complexity.multiplier() * streak_bonus(streak);
    money_from_f64(gross) - token_cost - fines
}

/// `T · μ`: the straightforward token-count cost term in the compensation
/// formula. `mu` is the per-token rate in fractional APX (default 0.01).
pub fn token_cost(tokens: u64, mu: f64) -> Money {
    money_from_f64(tokens as f64 * mu)
}

/// Task kinds with a known reference token count, used by [`token_tax`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    PythonUnitTest,
    BugFix,
    FeatureImplementation,
}

impl TaskKind {
    /// Reference token count for this task kind.
    pub fn benchmark(self) -> u64 {
        match self {
            TaskKind::PythonUnitTest => 450,
            TaskKind::BugFix => 300,
            TaskKind::FeatureImplementation => 800,
        }
    }
}

/// Default per-token tax rate applied to benchmark overage, in fractional
/// APX per token.
pub const DEFAULT_TOKEN_TAX_RATE: f64 = 0.01;

/// `tax(type, actual_tokens) = max(0, actual − benchmark(type)) · rate`.
pub fn token_tax(kind: TaskKind, actual_tokens: u64, rate: f64) -> Money {
    let overage = actual_tokens.saturating_sub(kind.benchmark());
    money_from_f64(overage as f64 * rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streak_bonus_boundary_values() {
        assert!((streak_bonus(0) - 1.0).abs() < 1e-9);
        assert!((streak_bonus(10) - 1.0413927).abs() < 1e-4);
        assert!((streak_bonus(99) - 2.0).abs() < 1e-9);
        // Cap holds well past the point log10 alone would exceed 2.0.
        assert_eq!(streak_bonus(10_000), 2.0);
    }

    #[test]
    fn tier_allows_matches_ceiling_table() {
        assert!(tier_allows(Tier::Novice, 2));
        assert!(!tier_allows(Tier::Novice, 3));
        assert!(tier_allows(Tier::Master, 5));
        assert!(tier_allows(Tier::Expert, 5));
        assert!(!tier_allows(Tier::Advanced, 5));
    }

    #[test]
    fn compensation_applies_complexity_and_streak() {
        let p = compensation(
            Money::from_apx(10),
            Complexity::Medium,
            0,
            Money::ZERO,
            Money::ZERO,
        );
        assert_eq!(p, Money::from_apx(15));
    }

    #[test]
    fn compensation_subtracts_token_cost_and_fines() {
        let p = compensation(
            Money::from_apx(10),
            Complexity::Simple,
            0,
            Money::from_hundredths(200),
            Money::from_hundredths(100),
        );
        assert_eq!(p, Money::from_hundredths(700));
    }

    #[test]
    fn token_tax_is_zero_under_benchmark() {
        assert_eq!(token_tax(TaskKind::BugFix, 200, 0.01), Money::ZERO);
    }

    #[test]
    fn token_tax_charges_only_the_overage() {
        let tax = token_tax(TaskKind::BugFix, 400, 0.01);
        assert_eq!(tax, Money::from_hundredths(100));
    }
}
