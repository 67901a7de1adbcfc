// Fixed-scale decimal arithmetic for balance mutation.
//
// Pure, no I/O: same input always yields the same output. Mirrors the
// teacher's checked-arithmetic idiom (see escrow::auto_release's
// `checked_add`/`checked_sub`/`ok_or(BlockchainError::BalanceOverflow)`
// chains) but operates on an explicit mantissa+scale pair instead of a
// bare u64, since balances here are signed-by-kind and scale-tagged per
// asset rather than always-positive integer minor units.

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A fixed-scale decimal: `mantissa * 10^-scale`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FixedDecimal {
    mantissa: i128,
    scale: u32,
}

impl FixedDecimal {
    pub const fn new(mantissa: i128, scale: u32) -> Self {
        Self { mantissa, scale }
    }

    pub const fn zero(scale: u32) -> Self {
        Self { mantissa: 0, scale }
    }

    pub fn mantissa(&self) -> i128 {
        self.mantissa
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn is_negative(&self) -> bool {
        self.mantissa < 0
    }

    fn checked_combine(
        &self,
        other: &FixedDecimal,
        op: impl Fn(i128, i128) -> Option<i128>,
    ) -> Result<FixedDecimal, PipelineError> {
        if self.scale != other.scale {
            return Err(PipelineError::ScaleMismatch {
                expected: self.scale,
                got: other.scale,
            });
        }
        let mantissa = op(self.mantissa, other.mantissa).ok_or(PipelineError::Overflow)?;
        Ok(FixedDecimal {
            mantissa,
            scale: self.scale,
        })
    }

    pub fn checked_add(&self, other: &FixedDecimal) -> Result<FixedDecimal, PipelineError> {
        self.checked_combine(other, |a, b| a.checked_add(b))
    }

    pub fn checked_sub(&self, other: &FixedDecimal) -> Result<FixedDecimal, PipelineError> {
        self.checked_combine(other, |a, b| a.checked_sub(b))
    }
}

impl fmt::Display for FixedDecimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale == 0 {
            return write!(f, "{}", self.mantissa);
        }
        let negative = self.mantissa < 0;
        let abs = self.mantissa.unsigned_abs();
        let divisor = 10u128.pow(self.scale);
        let whole = abs / divisor;
        let frac = abs % divisor;
        write!(
            f,
            "{}{}.{:0width$}",
            if negative { "-" } else { "" },
            whole,
            frac,
            width = self.scale as usize
        )
    }
}

/// The arithmetic effect an intent has on a balance, distinct from the
/// persisted `Operation::Type` (SPEC_FULL.md §3 / §4.1): a single ledger
/// operation such as "place a hold" has a balance effect that moves money
/// between `available` and `onHold` even though the caller records it as a
/// DEBIT-typed operation row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntentKind {
    /// Reduce `available` (a plain commit-time debit).
    Debit,
    /// Reduce `onHold` (drawing a previously-held amount into a commit).
    DebitFromHold,
    /// Increase `available`.
    Credit,
    /// Move `amount` from `available` into `onHold`.
    Hold,
    /// Move `amount` from `onHold` back into `available`.
    Release,
}

/// The available/on-hold pair for one balance, independent of identity or version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceAmounts {
    pub available: FixedDecimal,
    pub on_hold: FixedDecimal,
}

/// Compute the post-balance for applying `(kind, amount)` to `pre`.
///
/// Fails with `InvalidAmount` if the result would go negative for a kind
/// that forbids it (DEBIT family, HOLD, RELEASE all require non-negative
/// remaining balances on the side they draw from), `ScaleMismatch` if the
/// amount's scale disagrees with the pre-balance's, or `Overflow` on
/// mantissa overflow.
pub fn apply(
    pre: &BalanceAmounts,
    kind: IntentKind,
    amount: &FixedDecimal,
) -> Result<BalanceAmounts, PipelineError> {
    if amount.is_negative() {
        return Err(PipelineError::InvalidAmount(format!(
            "amount must be non-negative, got {amount}"
        )));
    }

    let post = match kind {
        IntentKind::Debit => {
            let available = pre.available.checked_sub(amount)?;
            reject_if_negative(available, "available")?;
            BalanceAmounts {
                available,
                on_hold: pre.on_hold,
            }
        }
        IntentKind::DebitFromHold => {
            let on_hold = pre.on_hold.checked_sub(amount)?;
            reject_if_negative(on_hold, "onHold")?;
            BalanceAmounts {
                available: pre.available,
                on_hold,
            }
        }
        IntentKind::Credit => {
            let available = pre.available.checked_add(amount)?;
            BalanceAmounts {
                available,
                on_hold: pre.on_hold,
            }
        }
        IntentKind::Hold => {
            let available = pre.available.checked_sub(amount)?;
            reject_if_negative(available, "available")?;
            let on_hold = pre.on_hold.checked_add(amount)?;
            BalanceAmounts { available, on_hold }
        }
        IntentKind::Release => {
            let on_hold = pre.on_hold.checked_sub(amount)?;
            reject_if_negative(on_hold, "onHold")?;
            let available = pre.available.checked_add(amount)?;
            BalanceAmounts { available, on_hold }
        }
    };

    Ok(post)
}

fn reject_if_negative(value: FixedDecimal, side: &str) -> Result<(), PipelineError> {
    if value.is_negative() {
        return Err(PipelineError::InvalidAmount(format!(
            "resulting {side} would be negative: {value}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(mantissa: i128) -> FixedDecimal {
        FixedDecimal::new(mantissa, 2)
    }

    #[test]
    fn debit_reduces_available() {
        let pre = BalanceAmounts {
            available: d(1000),
            on_hold: d(0),
        };
        let post = apply(&pre, IntentKind::Debit, &d(200)).unwrap();
        assert_eq!(post.available, d(800));
        assert_eq!(post.on_hold, d(0));
    }

    #[test]
    fn credit_increases_available() {
        let pre = BalanceAmounts {
            available: d(500),
            on_hold: d(0),
        };
        let post = apply(&pre, IntentKind::Credit, &d(200)).unwrap();
        assert_eq!(post.available, d(700));
    }

    #[test]
    fn hold_moves_available_to_on_hold() {
        let pre = BalanceAmounts {
            available: d(1000),
            on_hold: d(0),
        };
        let post = apply(&pre, IntentKind::Hold, &d(300)).unwrap();
        assert_eq!(post.available, d(700));
        assert_eq!(post.on_hold, d(300));
    }

    #[test]
    fn release_moves_on_hold_to_available() {
        let pre = BalanceAmounts {
            available: d(700),
            on_hold: d(300),
        };
        let post = apply(&pre, IntentKind::Release, &d(300)).unwrap();
        assert_eq!(post.available, d(1000));
        assert_eq!(post.on_hold, d(0));
    }

    #[test]
    fn debit_from_hold_draws_commit() {
        let pre = BalanceAmounts {
            available: d(700),
            on_hold: d(300),
        };
        let post = apply(&pre, IntentKind::DebitFromHold, &d(300)).unwrap();
        assert_eq!(post.available, d(700));
        assert_eq!(post.on_hold, d(0));
    }

    #[test]
    fn debit_beyond_available_is_invalid() {
        let pre = BalanceAmounts {
            available: d(100),
            on_hold: d(0),
        };
        let err = apply(&pre, IntentKind::Debit, &d(200)).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidAmount(_)));
    }

    #[test]
    fn scale_mismatch_is_rejected() {
        let pre = BalanceAmounts {
            available: d(100),
            on_hold: d(0),
        };
        let err = apply(&pre, IntentKind::Credit, &FixedDecimal::new(1, 3)).unwrap_err();
        assert!(matches!(err, PipelineError::ScaleMismatch { .. }));
    }

    #[test]
    fn overflow_is_detected() {
        let pre = BalanceAmounts {
            available: FixedDecimal::new(i128::MAX, 2),
            on_hold: d(0),
        };
        let err = apply(&pre, IntentKind::Credit, &d(1)).unwrap_err();
        assert!(matches!(err, PipelineError::Overflow));
    }
}
