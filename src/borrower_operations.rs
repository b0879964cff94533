//! # Borrower operations
//! Opening, adjusting and closing troves.
//!
//! Every trove carries `stable_gas_compensation` of extra stable debt from the moment it opens. The matching
//! stable tokens are minted into a reserve that pays the liquidator, or is burned when the owner closes.

use crate::errors::*;
use crate::fees::{require_user_accepts_fee, require_valid_max_fee};
use crate::ledger::{compute_icr, TroveLedger};
use crate::price_feed::PriceFeed;
use crate::shared_structs::*;
use crate::storage::LedgerStore;
use crate::storage_pool::{PoolBucket, PoolCaller};
use crate::token_amounts::TokenAmounts;
use scrypto::prelude::*;

const CALLER: PoolCaller = PoolCaller::BorrowerOperations;

/// A change to an existing trove. Every part may be empty, but not all of them.
#[derive(ScryptoSbor, Clone, Debug, Default)]
pub struct TroveAdjustment {
    pub collateral_deposits: TokenAmounts,
    pub collateral_withdrawals: TokenAmounts,
    pub debt_increases: TokenAmounts,
    pub debt_repayments: TokenAmounts,
}

impl TroveAdjustment {
    pub fn is_empty(&self) -> bool {
        self.collateral_deposits.is_empty()
            && self.collateral_withdrawals.is_empty()
            && self.debt_increases.is_empty()
            && self.debt_repayments.is_empty()
    }
}

/// Outcome of an open or an adjustment.
#[derive(ScryptoSbor, Clone, Debug)]
pub struct TroveUpdate {
    pub trove_id: TroveId,
    pub collateral: TokenAmounts,
    pub debt: TokenAmounts,
    pub stakes: TokenAmounts,
    pub icr: Decimal,
    /// Fee added to the debt per debt token. The tokens are minted for the protocol.
    pub borrowing_fees: TokenAmounts,
    /// Stable gas compensation reserved by this update.
    pub gas_compensation: Decimal,
}

/// Outcome of closing a trove.
#[derive(ScryptoSbor, Clone, Debug)]
pub struct TroveClosure {
    pub trove_id: TroveId,
    /// Collateral handed back to the owner.
    pub collateral: TokenAmounts,
    /// Debt the owner has to pay back. The gas compensation is excluded; it is burned from the reserve.
    pub debt_to_repay: TokenAmounts,
    pub gas_compensation_burned: Decimal,
}

impl<S: LedgerStore> TroveLedger<S> {
    pub fn open_trove<P: PriceFeed>(
        &mut self,
        id: &TroveId,
        collateral: TokenAmounts,
        debts: TokenAmounts,
        max_fee_percentage: Decimal,
        hints: &InsertHints,
        prices: &P,
        now: Instant,
    ) -> LedgerResult<TroveUpdate> {
        self.atomically(|ledger| {
            ledger.try_open_trove(id, collateral, debts, max_fee_percentage, hints, prices, now)
        })
    }

    pub fn adjust_trove<P: PriceFeed>(
        &mut self,
        id: &TroveId,
        adjustment: TroveAdjustment,
        max_fee_percentage: Decimal,
        hints: &InsertHints,
        prices: &P,
        now: Instant,
    ) -> LedgerResult<TroveUpdate> {
        self.atomically(|ledger| ledger.try_adjust_trove(id, adjustment, max_fee_percentage, hints, prices, now))
    }

    /// Closes a trove. The owner repays everything except the gas compensation and gets all collateral back.
    pub fn close_trove<P: PriceFeed>(&mut self, id: &TroveId, prices: &P) -> LedgerResult<TroveClosure> {
        self.atomically(|ledger| ledger.try_close_trove(id, prices))
    }

    /// Hands out the surplus collateral a closed trove left behind.
    pub fn claim_collateral(&mut self, id: &TroveId) -> LedgerResult<TokenAmounts> {
        self.atomically(|ledger| ledger.surplus.claim(&mut ledger.store, id))
    }

    fn try_open_trove<P: PriceFeed>(
        &mut self,
        id: &TroveId,
        collateral: TokenAmounts,
        debts: TokenAmounts,
        max_fee_percentage: Decimal,
        hints: &InsertHints,
        prices: &P,
        now: Instant,
    ) -> LedgerResult<TroveUpdate> {
        if self.freeze_switches.minting {
            return Err(LedgerError::MintingFrozen);
        }
        if self.troves.is_active(&self.store, id) {
            return Err(LedgerError::TroveAlreadyActive(id.clone()));
        }
        if collateral.is_empty() {
            return Err(LedgerError::EmptyCollateral);
        }
        for token in collateral.tokens() {
            self.require_collateral(&token)?;
        }
        for token in debts.tokens() {
            self.require_debt_token(&token)?;
        }

        let stable = self.stable_token()?;
        let mut priced_tokens = collateral.tokens();
        priced_tokens.extend(debts.tokens());
        priced_tokens.push(stable);
        prices.require_trusted(&priced_tokens)?;

        let recovery = self.check_recovery_mode(prices)?;
        let fee_rate = self.borrowing_fee_rate(recovery.in_recovery_mode, max_fee_percentage, now)?;
        let borrowing_fees = debts.scaled(fee_rate);

        let gas_compensation = self.parameters.stable_gas_compensation;
        let mut debt = debts;
        debt.add_all(&borrowing_fees);
        debt.add(stable, gas_compensation);

        self.require_at_least_min_net_debt(prices, &debt)?;

        let icr = compute_icr(prices, &collateral, &debt)?;
        if recovery.in_recovery_mode {
            if icr < self.parameters.ccr {
                return Err(LedgerError::IcrBelowCcr { icr });
            }
        } else {
            if icr < self.parameters.mcr {
                return Err(LedgerError::IcrBelowMcr { icr });
            }
            let new_tcr = Self::tcr_after_change(
                &recovery,
                Decimal::ZERO,
                Decimal::ZERO,
                prices.total_usd_value(&collateral)?,
                prices.total_usd_value(&debt)?,
            );
            if new_tcr < self.parameters.ccr {
                return Err(LedgerError::TcrBelowCcr);
            }
        }

        let (prev, next) = self.find_insert_position(icr, hints, prices)?;

        if !borrowing_fees.is_empty() {
            self.base_rate
                .decay(now, self.parameters.base_rate_half_life_minutes)?;
        }

        self.troves
            .activate(&mut self.store, id, collateral.clone(), debt.clone())?;
        self.refresh_stakes(id)?;
        self.sorted_troves.insert(&mut self.store, id, prev, next)?;

        for (token, amount) in collateral.iter() {
            self.pool
                .add_value(CALLER, *token, true, PoolBucket::Active, *amount)?;
        }
        for (token, amount) in debt.iter() {
            self.pool
                .add_value(CALLER, *token, false, PoolBucket::Active, *amount)?;
        }
        self.pool
            .reserve_gas_compensation(CALLER, stable, gas_compensation)?;
        self.protocol_fees.add_all(&borrowing_fees);

        let stakes = self.active_trove(id)?.stakes;
        Ok(TroveUpdate {
            trove_id: id.clone(),
            collateral,
            debt,
            stakes,
            icr,
            borrowing_fees,
            gas_compensation,
        })
    }

    fn try_adjust_trove<P: PriceFeed>(
        &mut self,
        id: &TroveId,
        adjustment: TroveAdjustment,
        max_fee_percentage: Decimal,
        hints: &InsertHints,
        prices: &P,
        now: Instant,
    ) -> LedgerResult<TroveUpdate> {
        self.active_trove(id)?;
        if adjustment.is_empty() {
            return Err(LedgerError::EmptyAdjustment);
        }
        if adjustment
            .collateral_deposits
            .tokens()
            .iter()
            .any(|token| adjustment.collateral_withdrawals.contains(token))
            || adjustment
                .debt_increases
                .tokens()
                .iter()
                .any(|token| adjustment.debt_repayments.contains(token))
        {
            return Err(LedgerError::ConflictingAdjustment);
        }

        let is_debt_increase = !adjustment.debt_increases.is_empty();
        if is_debt_increase && self.freeze_switches.minting {
            return Err(LedgerError::MintingFrozen);
        }
        for token in adjustment
            .collateral_deposits
            .tokens()
            .into_iter()
            .chain(adjustment.collateral_withdrawals.tokens())
        {
            self.require_collateral(&token)?;
        }
        for token in adjustment
            .debt_increases
            .tokens()
            .into_iter()
            .chain(adjustment.debt_repayments.tokens())
        {
            self.require_debt_token(&token)?;
        }

        let entire = self.entire_trove(id)?;
        let stable = self.stable_token()?;

        if is_debt_increase {
            let mut priced_tokens = entire.collateral.tokens();
            priced_tokens.extend(entire.debt.tokens());
            priced_tokens.extend(adjustment.collateral_deposits.tokens());
            priced_tokens.extend(adjustment.debt_increases.tokens());
            prices.require_trusted(&priced_tokens)?;
        }

        let recovery = self.check_recovery_mode(prices)?;
        if recovery.in_recovery_mode && !adjustment.collateral_withdrawals.is_empty() {
            return Err(LedgerError::CollateralWithdrawalInRecoveryMode);
        }

        let borrowing_fees = if is_debt_increase {
            let fee_rate =
                self.borrowing_fee_rate(recovery.in_recovery_mode, max_fee_percentage, now)?;
            adjustment.debt_increases.scaled(fee_rate)
        } else {
            TokenAmounts::new()
        };

        let mut new_collateral = entire.collateral.clone();
        new_collateral.add_all(&adjustment.collateral_deposits);
        new_collateral.sub_all(&adjustment.collateral_withdrawals)?;
        if new_collateral.is_empty() {
            return Err(LedgerError::EmptyCollateral);
        }

        let mut new_debt = entire.debt.clone();
        new_debt.add_all(&adjustment.debt_increases);
        new_debt.add_all(&borrowing_fees);
        new_debt.sub_all(&adjustment.debt_repayments)?;
        if new_debt.get(&stable) < self.parameters.stable_gas_compensation {
            return Err(LedgerError::RepaysGasCompensation);
        }
        if is_debt_increase || !adjustment.debt_repayments.is_empty() {
            self.require_at_least_min_net_debt(prices, &new_debt)?;
        }

        let old_icr = compute_icr(prices, &entire.collateral, &entire.debt)?;
        let new_icr = compute_icr(prices, &new_collateral, &new_debt)?;
        if recovery.in_recovery_mode {
            if is_debt_increase {
                if new_icr < self.parameters.ccr {
                    return Err(LedgerError::IcrBelowCcr { icr: new_icr });
                }
                if new_icr < old_icr {
                    return Err(LedgerError::IcrDecreasedInRecoveryMode);
                }
            }
        } else {
            if new_icr < self.parameters.mcr {
                return Err(LedgerError::IcrBelowMcr { icr: new_icr });
            }
            let new_tcr = Self::tcr_after_change(
                &recovery,
                prices.total_usd_value(&entire.collateral)?,
                prices.total_usd_value(&entire.debt)?,
                prices.total_usd_value(&new_collateral)?,
                prices.total_usd_value(&new_debt)?,
            );
            if new_tcr < self.parameters.ccr {
                return Err(LedgerError::TcrBelowCcr);
            }
        }

        self.reinsert_trove(id, new_icr, hints, prices)?;

        if !borrowing_fees.is_empty() {
            self.base_rate
                .decay(now, self.parameters.base_rate_half_life_minutes)?;
        }

        self.apply_pending_rewards(id, CALLER)?;
        let mut trove = self.active_trove(id)?;
        trove.collateral = new_collateral.clone();
        trove.debt = new_debt.clone();
        self.save_trove(id, trove)?;
        self.refresh_stakes(id)?;

        for (token, amount) in adjustment.collateral_deposits.iter() {
            self.pool
                .add_value(CALLER, *token, true, PoolBucket::Active, *amount)?;
        }
        for (token, amount) in adjustment.collateral_withdrawals.iter() {
            self.pool
                .subtract_value(CALLER, *token, true, PoolBucket::Active, *amount)?;
        }
        for (token, amount) in adjustment
            .debt_increases
            .iter()
            .chain(borrowing_fees.iter())
        {
            self.pool
                .add_value(CALLER, *token, false, PoolBucket::Active, *amount)?;
        }
        for (token, amount) in adjustment.debt_repayments.iter() {
            self.pool
                .subtract_value(CALLER, *token, false, PoolBucket::Active, *amount)?;
        }
        self.protocol_fees.add_all(&borrowing_fees);

        let stakes = self.active_trove(id)?.stakes;
        Ok(TroveUpdate {
            trove_id: id.clone(),
            collateral: new_collateral,
            debt: new_debt,
            stakes,
            icr: new_icr,
            borrowing_fees,
            gas_compensation: Decimal::ZERO,
        })
    }

    pub fn add_collateral<P: PriceFeed>(
        &mut self,
        id: &TroveId,
        deposits: TokenAmounts,
        hints: &InsertHints,
        prices: &P,
        now: Instant,
    ) -> LedgerResult<TroveUpdate> {
        let adjustment = TroveAdjustment {
            collateral_deposits: deposits,
            ..Default::default()
        };
        self.adjust_trove(id, adjustment, Decimal::ONE, hints, prices, now)
    }

    pub fn withdraw_collateral<P: PriceFeed>(
        &mut self,
        id: &TroveId,
        withdrawals: TokenAmounts,
        hints: &InsertHints,
        prices: &P,
        now: Instant,
    ) -> LedgerResult<TroveUpdate> {
        let adjustment = TroveAdjustment {
            collateral_withdrawals: withdrawals,
            ..Default::default()
        };
        self.adjust_trove(id, adjustment, Decimal::ONE, hints, prices, now)
    }

    pub fn increase_debt<P: PriceFeed>(
        &mut self,
        id: &TroveId,
        debts: TokenAmounts,
        max_fee_percentage: Decimal,
        hints: &InsertHints,
        prices: &P,
        now: Instant,
    ) -> LedgerResult<TroveUpdate> {
        let adjustment = TroveAdjustment {
            debt_increases: debts,
            ..Default::default()
        };
        self.adjust_trove(id, adjustment, max_fee_percentage, hints, prices, now)
    }

    pub fn repay_debt<P: PriceFeed>(
        &mut self,
        id: &TroveId,
        repayments: TokenAmounts,
        hints: &InsertHints,
        prices: &P,
        now: Instant,
    ) -> LedgerResult<TroveUpdate> {
        let adjustment = TroveAdjustment {
            debt_repayments: repayments,
            ..Default::default()
        };
        self.adjust_trove(id, adjustment, Decimal::ONE, hints, prices, now)
    }

    fn try_close_trove<P: PriceFeed>(&mut self, id: &TroveId, prices: &P) -> LedgerResult<TroveClosure> {
        self.active_trove(id)?;
        let recovery = self.check_recovery_mode(prices)?;
        if recovery.in_recovery_mode {
            return Err(LedgerError::CloseInRecoveryMode);
        }
        if self.troves.owner_count() <= 1 {
            return Err(LedgerError::OnlyOneTroveInSystem);
        }

        let entire = self.entire_trove(id)?;
        let new_tcr = Self::tcr_after_change(
            &recovery,
            prices.total_usd_value(&entire.collateral)?,
            prices.total_usd_value(&entire.debt)?,
            Decimal::ZERO,
            Decimal::ZERO,
        );
        if new_tcr < self.parameters.ccr {
            return Err(LedgerError::TcrBelowCcr);
        }

        let stable = self.stable_token()?;
        let gas_compensation = self.parameters.stable_gas_compensation;
        let mut debt_to_repay = entire.debt.clone();
        debt_to_repay.sub(stable, gas_compensation)?;

        self.apply_pending_rewards(id, CALLER)?;
        self.remove_stakes(id)?;
        self.sorted_troves.remove(&mut self.store, id)?;

        for (token, amount) in entire.collateral.iter() {
            self.pool
                .subtract_value(CALLER, *token, true, PoolBucket::Active, *amount)?;
        }
        for (token, amount) in entire.debt.iter() {
            self.pool
                .subtract_value(CALLER, *token, false, PoolBucket::Active, *amount)?;
        }
        self.pool
            .release_gas_compensation(CALLER, stable, gas_compensation)?;
        self.troves
            .close(&mut self.store, id, TroveStatus::ClosedByOwner)?;

        Ok(TroveClosure {
            trove_id: id.clone(),
            collateral: entire.collateral,
            debt_to_repay,
            gas_compensation_burned: gas_compensation,
        })
    }

    /// Current borrowing fee rate, without charging anything.
    pub fn get_borrowing_rate(&self, now: Instant) -> LedgerResult<Decimal> {
        self.base_rate.borrowing_rate(
            now,
            self.parameters.borrowing_fee_floor,
            self.parameters.max_borrowing_fee,
            self.parameters.base_rate_half_life_minutes,
        )
    }

    fn borrowing_fee_rate(
        &self,
        in_recovery_mode: bool,
        max_fee_percentage: Decimal,
        now: Instant,
    ) -> LedgerResult<Decimal> {
        if in_recovery_mode {
            if max_fee_percentage > Decimal::ONE {
                return Err(LedgerError::MaxFeeOutOfRange);
            }
            return Ok(Decimal::ZERO);
        }

        require_valid_max_fee(max_fee_percentage, self.parameters.borrowing_fee_floor)?;
        let fee_rate = self.get_borrowing_rate(now)?;
        require_user_accepts_fee(fee_rate, max_fee_percentage)?;
        Ok(fee_rate)
    }

    fn require_at_least_min_net_debt<P: PriceFeed>(
        &self,
        prices: &P,
        debt: &TokenAmounts,
    ) -> LedgerResult<()> {
        let net_debt = self.net_debt_usd(prices, debt)?;
        if net_debt < self.parameters.min_net_debt_usd {
            return Err(LedgerError::NetDebtTooSmall {
                net_debt,
                minimum: self.parameters.min_net_debt_usd,
            });
        }
        Ok(())
    }

    fn tcr_after_change(
        check: &RecoveryModeCheck,
        old_collateral_usd: Decimal,
        old_debt_usd: Decimal,
        new_collateral_usd: Decimal,
        new_debt_usd: Decimal,
    ) -> Decimal {
        let total_collateral = check.total_coll_usd - old_collateral_usd + new_collateral_usd;
        let total_debt = check.total_debt_usd - old_debt_usd + new_debt_usd;
        if total_debt.is_zero() {
            Decimal::MAX
        } else {
            total_collateral / total_debt
        }
    }
}
