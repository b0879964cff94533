//! # Reward accumulator
//!
//! Liquidated collateral and debt are not pushed to every open trove. Instead a cumulative per-stake value
//! `L[C][R]` is raised for every collateral type `C` that receives part of reward token `R`. A trove owes or
//! receives `(L[C][R] - snapshot[C][R]) * stake[C]`, summed over its collateral types, and settles this lazily
//! the next time it is touched.
//!
//! Stakes are corrected for earlier redistributions:
//! `stake = collateral * total_stakes_snapshot / total_collateral_snapshot`, so a trove opened after a
//! liquidation does not share in rewards that were handed out before it existed.
//!
//! Increments are truncated toward zero. The truncation remainder of every `(C, R)` pair is carried into the
//! next redistribution of that pair.

use crate::errors::*;
use crate::shared_structs::*;
use crate::token_amounts::TokenAmounts;
use scrypto::prelude::*;

#[derive(ScryptoSbor, Clone, Debug, Default, PartialEq, Eq)]
pub struct RewardAccumulator {
    /// `L[C][R]`
    l: HashMap<ResourceAddress, HashMap<ResourceAddress, Decimal>>,
    /// Numerator left over by the last truncated increment of each `(C, R)` pair.
    last_error: HashMap<ResourceAddress, HashMap<ResourceAddress, Decimal>>,
    total_stakes: TokenAmounts,
    total_stakes_snapshot: TokenAmounts,
    total_collateral_snapshot: TokenAmounts,
}

/// What a single liquidation hands over to the remaining troves.
#[derive(Clone, Debug)]
pub struct Redistribution<'a> {
    pub collateral: &'a TokenAmounts,
    pub debt: &'a TokenAmounts,
    /// USD value of each collateral token the liquidated trove held. Decides how its debt is split.
    pub trove_collateral_usd: &'a TokenAmounts,
    /// USD value of the collateral held by the pool per token. Decides where orphaned shares go.
    pub pool_collateral_usd: &'a TokenAmounts,
}

impl RewardAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn l_value(&self, collateral: &ResourceAddress, reward: &ResourceAddress) -> Decimal {
        self.l
            .get(collateral)
            .and_then(|row| row.get(reward))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    pub fn last_error(&self, collateral: &ResourceAddress, reward: &ResourceAddress) -> Decimal {
        self.last_error
            .get(collateral)
            .and_then(|row| row.get(reward))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    pub fn total_stakes(&self, collateral: &ResourceAddress) -> Decimal {
        self.total_stakes.get(collateral)
    }

    pub fn total_stakes_snapshot(&self, collateral: &ResourceAddress) -> Decimal {
        self.total_stakes_snapshot.get(collateral)
    }

    pub fn total_collateral_snapshot(&self, collateral: &ResourceAddress) -> Decimal {
        self.total_collateral_snapshot.get(collateral)
    }

    /// Stake a trove holding `amount` of `collateral` gets right now.
    pub fn compute_new_stake(&self, collateral: &ResourceAddress, amount: Decimal) -> Decimal {
        let collateral_snapshot = self.total_collateral_snapshot.get(collateral);
        if collateral_snapshot.is_zero() {
            amount
        } else {
            amount * self.total_stakes_snapshot.get(collateral) / collateral_snapshot
        }
    }

    /// Rewards a trove has accrued since its last snapshot, per reward token. Collateral and debt tokens are
    /// mixed; the caller splits them by token kind.
    pub fn pending_rewards(&self, trove: &Trove) -> TokenAmounts {
        let mut pending = TokenAmounts::new();
        for (collateral, stake) in trove.stakes.iter() {
            let Some(row) = self.l.get(collateral) else {
                continue;
            };
            let snapshots = trove.reward_snapshots.get(collateral);
            for (reward, l_value) in row.iter() {
                let snapshot = snapshots
                    .and_then(|snapshots| snapshots.get(reward))
                    .copied()
                    .unwrap_or(Decimal::ZERO);
                let reward_per_stake = *l_value - snapshot;
                if reward_per_stake.is_positive() {
                    pending.add(*reward, *stake * reward_per_stake);
                }
            }
        }
        pending
    }

    /// Brings the trove's reward snapshots up to the current `L` values of its staked collateral types.
    pub fn update_snapshots(&self, trove: &mut Trove) {
        trove.reward_snapshots = trove
            .stakes
            .iter()
            .map(|(collateral, _)| {
                (
                    *collateral,
                    self.l.get(collateral).cloned().unwrap_or_default(),
                )
            })
            .collect();
    }

    /// Recomputes the trove's stakes from its recorded collateral and adjusts the totals.
    pub fn update_stakes(&mut self, trove: &mut Trove) {
        let mut new_stakes = TokenAmounts::new();
        for (collateral, amount) in trove.collateral.iter() {
            new_stakes.set(*collateral, self.compute_new_stake(collateral, *amount));
        }

        for (collateral, old_stake) in trove.stakes.iter() {
            let total = self.total_stakes.get(collateral);
            self.total_stakes.set(*collateral, total - *old_stake);
        }
        for (collateral, new_stake) in new_stakes.iter() {
            self.total_stakes.add(*collateral, *new_stake);
        }
        trove.stakes = new_stakes;
    }

    /// Takes the trove's stakes out of the totals and zeroes them.
    pub fn remove_stakes(&mut self, trove: &mut Trove) {
        for (collateral, stake) in trove.stakes.iter() {
            let total = self.total_stakes.get(collateral);
            self.total_stakes.set(*collateral, total - *stake);
        }
        trove.stakes = TokenAmounts::new();
    }

    /// Raises `L` so that the remaining stakers absorb the liquidated collateral and debt.
    ///
    /// Must be called after the liquidated trove's stakes were removed. Fails with `OnlyOneTroveInSystem` if
    /// nobody is left to receive the redistribution.
    pub fn redistribute(&mut self, redistribution: Redistribution) -> LedgerResult<()> {
        if redistribution.collateral.is_empty() && redistribution.debt.is_empty() {
            return Ok(());
        }

        let receivers: Vec<ResourceAddress> = self
            .total_stakes
            .iter()
            .filter(|(_, stakes)| stakes.is_positive())
            .map(|(collateral, _)| *collateral)
            .collect();
        if receivers.is_empty() {
            return Err(LedgerError::OnlyOneTroveInSystem);
        }

        let spread = Self::spread_weights(&receivers, redistribution.pool_collateral_usd);

        for (token, amount) in redistribution.collateral.iter() {
            if self.total_stakes.get(token).is_positive() {
                self.add_increment(*token, *token, *amount)?;
            } else {
                for (receiver, weight) in spread.iter() {
                    self.add_increment(*receiver, *token, *amount * *weight)?;
                }
            }
        }

        let debt_weights =
            Self::debt_weights(&receivers, &spread, redistribution.trove_collateral_usd);
        for (token, amount) in redistribution.debt.iter() {
            for (receiver, weight) in debt_weights.iter() {
                self.add_increment(*receiver, *token, *amount * *weight)?;
            }
        }

        Ok(())
    }

    /// Whether anyone would still receive a redistribution once `stakes` are taken out of the totals.
    pub fn has_receivers_without(&self, stakes: &TokenAmounts) -> bool {
        self.total_stakes
            .iter()
            .any(|(collateral, total)| (*total - stakes.get(collateral)).is_positive())
    }

    /// Refreshes the snapshots new stakes are computed against. `system_collateral` is the active plus pending
    /// collateral of the pool after the liquidation.
    ///
    /// A collateral type nobody stakes any more gets empty snapshots: its pending balance was spread over other
    /// collateral types, and the next trove holding it starts over with `stake = collateral`.
    pub fn update_system_snapshots(&mut self, system_collateral: &TokenAmounts) {
        let mut collaterals = system_collateral.tokens();
        for collateral in self.total_stakes_snapshot.tokens() {
            if !collaterals.contains(&collateral) {
                collaterals.push(collateral);
            }
        }

        for collateral in collaterals {
            let total_stakes = self.total_stakes.get(&collateral);
            let total_collateral = if total_stakes.is_zero() {
                Decimal::ZERO
            } else {
                system_collateral.get(&collateral)
            };
            self.total_stakes_snapshot.set(collateral, total_stakes);
            self.total_collateral_snapshot
                .set(collateral, total_collateral);
        }
    }

    fn add_increment(
        &mut self,
        collateral: ResourceAddress,
        reward: ResourceAddress,
        numerator: Decimal,
    ) -> LedgerResult<()> {
        let total_stakes = self.total_stakes.get(&collateral);
        if !total_stakes.is_positive() {
            return Err(LedgerError::OnlyOneTroveInSystem);
        }

        let numerator = numerator + self.last_error(&collateral, &reward);
        let increment = numerator
            .checked_div(total_stakes)
            .ok_or(LedgerError::Overflow)?;
        let error = numerator - increment * total_stakes;

        *self
            .l
            .entry(collateral)
            .or_default()
            .entry(reward)
            .or_insert(Decimal::ZERO) += increment;
        self.last_error
            .entry(collateral)
            .or_default()
            .insert(reward, error);
        Ok(())
    }

    /// Weights for collateral that has no stakers left: proportional to each receiver's pool USD value, or an
    /// even split when none of them has a price.
    fn spread_weights(
        receivers: &[ResourceAddress],
        pool_collateral_usd: &TokenAmounts,
    ) -> Vec<(ResourceAddress, Decimal)> {
        let total: Decimal = receivers
            .iter()
            .map(|receiver| pool_collateral_usd.get(receiver))
            .fold(Decimal::ZERO, |sum, value| sum + value);

        receivers
            .iter()
            .map(|receiver| {
                let weight = if total.is_positive() {
                    pool_collateral_usd.get(receiver) / total
                } else {
                    Decimal::ONE / Decimal::from(receivers.len() as u64)
                };
                (*receiver, weight)
            })
            .collect()
    }

    /// Each receiver's share of the liquidated debt: the USD share its collateral had in the trove, plus its
    /// part of the shares whose collateral type has no stakers left.
    fn debt_weights(
        receivers: &[ResourceAddress],
        spread: &[(ResourceAddress, Decimal)],
        trove_collateral_usd: &TokenAmounts,
    ) -> Vec<(ResourceAddress, Decimal)> {
        let total: Decimal = trove_collateral_usd
            .iter()
            .fold(Decimal::ZERO, |sum, (_, value)| sum + *value);
        if !total.is_positive() {
            return spread.to_vec();
        }

        let mut orphaned = Decimal::ZERO;
        for (collateral, value) in trove_collateral_usd.iter() {
            if !receivers.contains(collateral) {
                orphaned += *value / total;
            }
        }

        spread
            .iter()
            .map(|(receiver, spread_weight)| {
                let own = trove_collateral_usd.get(receiver) / total;
                (*receiver, own + orphaned * *spread_weight)
            })
            .collect()
    }
}
