//! # Hint helpers
//! Read-only helpers that let callers compute good hints before they send an operation. None of them change the
//! ledger.

use crate::errors::*;
use crate::ledger::TroveLedger;
use crate::price_feed::PriceFeed;
use crate::redemptions::{RedemptionHintsReturn, StepKind};
use crate::shared_structs::TroveId;
use crate::storage::LedgerStore;
use scrypto::prelude::*;

/// Approximate hint for `icr`.
#[derive(ScryptoSbor, Clone, Debug)]
pub struct ApproxHint {
    pub hint: Option<TroveId>,
    /// Distance between the hint's current ICR and `icr`.
    pub diff: Decimal,
    /// Seed to pass to the next call.
    pub latest_random_seed: u64,
}

impl<S: LedgerStore> TroveLedger<S> {
    /// Samples `num_trials` pseudo-random active troves, keeps the one whose current ICR is closest to `icr` and
    /// walks up to `num_trials` further nodes towards `icr`. A good choice for `num_trials` is `15 * sqrt(n)`.
    pub fn get_approx_hint<P: PriceFeed>(
        &self,
        icr: Decimal,
        num_trials: u32,
        random_seed: u64,
        prices: &P,
    ) -> LedgerResult<ApproxHint> {
        let Some(tail) = self.sorted_troves.last() else {
            return Ok(ApproxHint {
                hint: None,
                diff: Decimal::ZERO,
                latest_random_seed: random_seed,
            });
        };

        let mut hint = tail.clone();
        let mut hint_icr = self.current_icr(&hint, prices)?;
        let mut diff = icr_diff(hint_icr, icr);
        let mut latest_random_seed = random_seed;
        let owner_count = self.troves.owner_count();

        for _ in 0..num_trials {
            latest_random_seed = next_random_seed(latest_random_seed);
            let Some(candidate) = self.troves.owner_at(&self.store, latest_random_seed % owner_count) else {
                continue;
            };
            let candidate_icr = self.current_icr(&candidate, prices)?;
            if icr_diff(candidate_icr, icr) < diff {
                diff = icr_diff(candidate_icr, icr);
                hint = candidate;
                hint_icr = candidate_icr;
            }
        }

        for _ in 0..num_trials {
            let neighbour = if hint_icr > icr {
                self.next_trove(&hint)
            } else if hint_icr < icr {
                self.prev_trove(&hint)
            } else {
                None
            };
            let Some(neighbour) = neighbour else {
                break;
            };
            let neighbour_icr = self.current_icr(&neighbour, prices)?;
            if icr_diff(neighbour_icr, icr) >= diff {
                break;
            }
            diff = icr_diff(neighbour_icr, icr);
            hint = neighbour;
            hint_icr = neighbour_icr;
        }

        Ok(ApproxHint {
            hint: Some(hint),
            diff,
            latest_random_seed,
        })
    }

    /// Dry run of a redemption of `amount` without any hints. Returns the first trove the redemption would
    /// touch, the ICR the last trove would end at if it stays open, and how much of `amount` can be redeemed.
    pub fn get_redemption_hints<P: PriceFeed>(
        &self,
        amount: Decimal,
        max_iterations: u32,
        prices: &P,
    ) -> LedgerResult<RedemptionHintsReturn> {
        let first = self.first_redemption_trove(None, prices)?;
        let steps = self.plan_redemption(first.clone(), amount, None, max_iterations, prices)?;

        let partial_redemption_hint_icr = match steps.last().map(|step| &step.kind) {
            Some(StepKind::Reinsert { new_icr, .. }) => *new_icr,
            _ => Decimal::ZERO,
        };
        let truncated_amount = steps
            .iter()
            .fold(Decimal::ZERO, |sum, step| sum + step.lot);

        Ok(RedemptionHintsReturn {
            first_redemption_hint: first,
            partial_redemption_hint_icr,
            truncated_amount,
        })
    }
}

fn icr_diff(a: Decimal, b: Decimal) -> Decimal {
    if a > b {
        a - b
    } else {
        b - a
    }
}

/// Next link of the blake2b seed chain.
pub fn next_random_seed(seed: u64) -> u64 {
    let digest = hash(seed.to_le_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest.0[..8]);
    u64::from_le_bytes(bytes)
}
