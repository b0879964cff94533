//! # Liquidations
//!
//! A trove is liquidatable when its ICR is below the MCR, or, in recovery mode, below the TCR. Its entire
//! collateral and debt (recorded plus pending) are taken out of the active bucket and handed to the remaining
//! troves through the reward accumulator. Which part is redistributed depends on how deep the trove is under
//! water:
//!
//! - `ICR < 100%`: everything is redistributed, the liquidator gets nothing and the stable gas compensation
//!   reserve is burned.
//! - `100% <= ICR < MCR`: the liquidator receives `coll_gas_compensation_percentage` of every collateral token
//!   (capped in USD) plus the stable gas compensation. The rest is redistributed.
//! - recovery mode and `MCR <= ICR < TCR`: only collateral worth `debt * MCR` is seized. The owner can claim the
//!   rest from the surplus pool.
//!
//! The stable gas compensation is never redistributed as debt.

use crate::errors::*;
use crate::ledger::TroveLedger;
use crate::price_feed::PriceFeed;
use crate::reward_accumulator::Redistribution;
use crate::shared_structs::*;
use crate::storage::LedgerStore;
use crate::storage_pool::{PoolBucket, PoolCaller};
use crate::token_amounts::TokenAmounts;
use scrypto::prelude::*;

const CALLER: PoolCaller = PoolCaller::LiquidationEngine;

/// What happened to a single liquidated trove.
#[derive(ScryptoSbor, Clone, Debug)]
pub struct LiquidationOutcome {
    pub trove_id: TroveId,
    pub mode: LiquidationMode,
    pub icr: Decimal,
    /// Entire collateral and debt of the trove at the time of liquidation.
    pub collateral: TokenAmounts,
    pub debt: TokenAmounts,
    /// Collateral paid to the liquidator.
    pub coll_gas_compensation: TokenAmounts,
    /// Stable tokens paid to the liquidator out of the reserve.
    pub stable_gas_compensation: Decimal,
    /// Stable tokens of the reserve that are burned instead.
    pub gas_compensation_burned: Decimal,
    pub redistributed_collateral: TokenAmounts,
    pub redistributed_debt: TokenAmounts,
    /// Collateral left to the owner in the surplus pool.
    pub collateral_surplus: TokenAmounts,
}

/// Aggregate over all troves liquidated by one call.
#[derive(ScryptoSbor, Clone, Debug)]
pub struct LiquidationTotals {
    pub recovery_mode_at_start: bool,
    pub tcr_at_start: Decimal,
    pub liquidated_collateral: TokenAmounts,
    pub liquidated_debt: TokenAmounts,
    pub coll_gas_compensation: TokenAmounts,
    pub stable_gas_compensation: Decimal,
    pub gas_compensation_burned: Decimal,
    pub redistributed_collateral: TokenAmounts,
    pub redistributed_debt: TokenAmounts,
    pub collateral_surplus: TokenAmounts,
    pub outcomes: Vec<LiquidationOutcome>,
}

impl LiquidationTotals {
    fn new(recovery: &RecoveryModeCheck) -> Self {
        Self {
            recovery_mode_at_start: recovery.in_recovery_mode,
            tcr_at_start: recovery.tcr,
            liquidated_collateral: TokenAmounts::new(),
            liquidated_debt: TokenAmounts::new(),
            coll_gas_compensation: TokenAmounts::new(),
            stable_gas_compensation: Decimal::ZERO,
            gas_compensation_burned: Decimal::ZERO,
            redistributed_collateral: TokenAmounts::new(),
            redistributed_debt: TokenAmounts::new(),
            collateral_surplus: TokenAmounts::new(),
            outcomes: vec![],
        }
    }

    fn add(&mut self, outcome: LiquidationOutcome) {
        self.liquidated_collateral.add_all(&outcome.collateral);
        self.liquidated_debt.add_all(&outcome.debt);
        self.coll_gas_compensation
            .add_all(&outcome.coll_gas_compensation);
        self.stable_gas_compensation += outcome.stable_gas_compensation;
        self.gas_compensation_burned += outcome.gas_compensation_burned;
        self.redistributed_collateral
            .add_all(&outcome.redistributed_collateral);
        self.redistributed_debt.add_all(&outcome.redistributed_debt);
        self.collateral_surplus.add_all(&outcome.collateral_surplus);
        self.outcomes.push(outcome);
    }

    pub fn liquidated_troves(&self) -> Vec<TroveId> {
        self.outcomes
            .iter()
            .map(|outcome| outcome.trove_id.clone())
            .collect()
    }
}

impl<S: LedgerStore> TroveLedger<S> {
    /// Liquidates a single trove.
    pub fn liquidate<P: PriceFeed>(&mut self, id: &TroveId, prices: &P) -> LedgerResult<LiquidationTotals> {
        if self.freeze_switches.liquidation {
            return Err(LedgerError::LiquidationFrozen);
        }
        self.active_trove(id)?;
        if self.troves.owner_count() <= 1 {
            return Err(LedgerError::OnlyOneTroveInSystem);
        }
        self.atomically(|ledger| ledger.liquidate_batch(&[id.clone()], prices))
    }

    /// Liquidates every liquidatable trove in `ids`. Unknown, closed and healthy troves are skipped. Recovery
    /// mode and the TCR are evaluated once, before the first liquidation.
    pub fn batch_liquidate_troves<P: PriceFeed>(
        &mut self,
        ids: &[TroveId],
        prices: &P,
    ) -> LedgerResult<LiquidationTotals> {
        self.atomically(|ledger| ledger.liquidate_batch(ids, prices))
    }

    /// Liquidates up to `n` troves starting at the riskiest end of the sorted list, stopping at the first one
    /// that is not liquidatable.
    pub fn liquidate_troves<P: PriceFeed>(&mut self, n: u32, prices: &P) -> LedgerResult<LiquidationTotals> {
        if self.freeze_switches.liquidation {
            return Err(LedgerError::LiquidationFrozen);
        }

        let recovery = self.check_recovery_mode(prices)?;
        let mut candidates = vec![];
        let mut current = self.sorted_troves.last().cloned();
        while let Some(id) = current {
            if candidates.len() as u32 >= n {
                break;
            }
            if !self.is_liquidatable(self.current_icr(&id, prices)?, &recovery) {
                break;
            }
            current = self.prev_trove(&id);
            candidates.push(id);
        }

        if candidates.is_empty() {
            return Err(LedgerError::NoLiquidatableTrove);
        }
        self.atomically(|ledger| ledger.liquidate_batch(&candidates, prices))
    }

    fn liquidate_batch<P: PriceFeed>(&mut self, ids: &[TroveId], prices: &P) -> LedgerResult<LiquidationTotals> {
        if self.freeze_switches.liquidation {
            return Err(LedgerError::LiquidationFrozen);
        }
        if ids.is_empty() {
            return Err(LedgerError::EmptyTroveArray);
        }

        let recovery = self.check_recovery_mode(prices)?;
        let mut totals = LiquidationTotals::new(&recovery);
        let mut last_trove_left = false;

        for id in ids {
            if !self.troves.is_active(&self.store, id) {
                continue;
            }
            let icr = self.current_icr(id, prices)?;
            if !self.is_liquidatable(icr, &recovery) {
                continue;
            }
            let stakes = self.active_trove(id)?.stakes;
            if self.troves.owner_count() <= 1 || !self.rewards.has_receivers_without(&stakes) {
                last_trove_left = true;
                break;
            }

            let outcome = self.liquidate_single(id, icr, &recovery, prices)?;
            totals.add(outcome);
        }

        if totals.outcomes.is_empty() {
            return Err(if last_trove_left {
                LedgerError::OnlyOneTroveInSystem
            } else {
                LedgerError::NoLiquidatableTrove
            });
        }
        Ok(totals)
    }

    fn is_liquidatable(&self, icr: Decimal, recovery: &RecoveryModeCheck) -> bool {
        icr < self.parameters.mcr || (recovery.in_recovery_mode && icr < recovery.tcr)
    }

    fn liquidate_single<P: PriceFeed>(
        &mut self,
        id: &TroveId,
        icr: Decimal,
        recovery: &RecoveryModeCheck,
        prices: &P,
    ) -> LedgerResult<LiquidationOutcome> {
        let entire = self.entire_trove(id)?;
        let stable = self.stable_token()?;
        let gas_compensation = self.parameters.stable_gas_compensation;
        let mode = if recovery.in_recovery_mode {
            LiquidationMode::Recovery
        } else {
            LiquidationMode::Normal
        };

        let mut redistributed_debt = entire.debt.clone();
        redistributed_debt.sub(stable, gas_compensation)?;

        let (seized, collateral_surplus) = if icr < self.parameters.mcr {
            (entire.collateral.clone(), TokenAmounts::new())
        } else {
            let collateral_usd = prices.total_usd_value(&entire.collateral)?;
            let debt_usd = prices.total_usd_value(&entire.debt)?;
            let seize_fraction = (debt_usd * self.parameters.mcr / collateral_usd).min(Decimal::ONE);
            let seized = entire.collateral.scaled(seize_fraction);
            let mut surplus = entire.collateral.clone();
            surplus.sub_all(&seized)?;
            (seized, surplus)
        };

        let (coll_gas_compensation, stable_gas_compensation, gas_compensation_burned) =
            if icr < Decimal::ONE {
                (TokenAmounts::new(), Decimal::ZERO, gas_compensation)
            } else {
                (
                    self.coll_gas_compensation(&seized, prices)?,
                    gas_compensation,
                    Decimal::ZERO,
                )
            };

        let mut redistributed_collateral = seized;
        redistributed_collateral.sub_all(&coll_gas_compensation)?;
        let trove_collateral_usd = self.usd_values(prices, &entire.collateral)?;

        self.apply_pending_rewards(id, CALLER)?;
        self.remove_stakes(id)?;
        self.sorted_troves.remove(&mut self.store, id)?;

        for (token, amount) in entire.collateral.iter() {
            self.pool
                .subtract_value(CALLER, *token, true, PoolBucket::Active, *amount)?;
        }
        for (token, amount) in redistributed_collateral.iter() {
            self.pool
                .add_value(CALLER, *token, true, PoolBucket::Pending, *amount)?;
        }
        for (token, amount) in entire.debt.iter() {
            self.pool
                .subtract_value(CALLER, *token, false, PoolBucket::Active, *amount)?;
        }
        for (token, amount) in redistributed_debt.iter() {
            self.pool
                .add_value(CALLER, *token, false, PoolBucket::Pending, *amount)?;
        }
        self.pool
            .release_gas_compensation(CALLER, stable, gas_compensation)?;

        let pool_collateral_usd = self.usd_values(prices, &self.pool.total_collateral())?;
        self.rewards.redistribute(Redistribution {
            collateral: &redistributed_collateral,
            debt: &redistributed_debt,
            trove_collateral_usd: &trove_collateral_usd,
            pool_collateral_usd: &pool_collateral_usd,
        })?;
        self.rewards
            .update_system_snapshots(&self.pool.total_collateral());

        self.troves
            .close(&mut self.store, id, TroveStatus::ClosedByLiquidation(mode))?;
        self.surplus
            .account_surplus(&mut self.store, id, &collateral_surplus);

        Ok(LiquidationOutcome {
            trove_id: id.clone(),
            mode,
            icr,
            collateral: entire.collateral,
            debt: entire.debt,
            coll_gas_compensation,
            stable_gas_compensation,
            gas_compensation_burned,
            redistributed_collateral,
            redistributed_debt,
            collateral_surplus,
        })
    }

    /// `coll_gas_compensation_percentage` of every collateral token, scaled down together if their USD value
    /// exceeds `max_coll_gas_compensation_usd`.
    fn coll_gas_compensation<P: PriceFeed>(
        &self,
        collateral: &TokenAmounts,
        prices: &P,
    ) -> LedgerResult<TokenAmounts> {
        let compensation = collateral.scaled(self.parameters.coll_gas_compensation_percentage);
        let compensation_usd = prices.total_usd_value(&compensation)?;
        if compensation_usd > self.parameters.max_coll_gas_compensation_usd {
            Ok(compensation.scaled(self.parameters.max_coll_gas_compensation_usd / compensation_usd))
        } else {
            Ok(compensation)
        }
    }
}
