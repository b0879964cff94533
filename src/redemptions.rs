//! # Redemptions
//!
//! Anyone can swap the stable token for collateral at the oracle price of the stable token. The debt is
//! bought back from the riskiest troves first, walking the sorted list from the tail towards the head.
//!
//! Only the part of a trove's stable debt above the gas compensation can be redeemed. A trove whose redeemable
//! debt is fully redeemed and that owes nothing else is closed; its remaining collateral goes to the surplus
//! pool. Any other trove stays open and has to be moved in the sorted list, which ends the walk: the move needs
//! `partial_redemption_hint_icr` to match the new ICR and a valid position from the partial hints. If either
//! check fails, or the trove would end up below the minimum net debt, that step is dropped and the unredeemed
//! rest is handed back.
//!
//! The redemption fee is charged in collateral. Every redemption pushes the base rate up by the redeemed share
//! of the stable supply.

use crate::errors::*;
use crate::fees::{require_user_accepts_fee, require_valid_max_fee};
use crate::ledger::{compute_icr, EntireTrove, TroveLedger};
use crate::price_feed::PriceFeed;
use crate::shared_structs::*;
use crate::storage::LedgerStore;
use crate::storage_pool::{PoolBucket, PoolCaller};
use crate::token_amounts::TokenAmounts;
use scrypto::prelude::*;

const CALLER: PoolCaller = PoolCaller::RedemptionEngine;

/// Hints for a redemption, usually taken from `get_redemption_hints`.
#[derive(ScryptoSbor, Clone, Debug, Default)]
pub struct RedemptionHints {
    /// First trove to redeem from. `None` starts at the tail.
    pub first_redemption_hint: Option<TroveId>,
    pub upper_partial_hint: Option<TroveId>,
    pub lower_partial_hint: Option<TroveId>,
    /// Expected ICR of the trove that is redeemed partially.
    pub partial_redemption_hint_icr: Decimal,
}

#[derive(ScryptoSbor, Clone, Debug)]
pub struct RedemptionOutcome {
    /// Stable tokens taken from the redeemer and burned.
    pub redeemed: Decimal,
    /// Part of the requested amount that could not be redeemed.
    pub unredeemed: Decimal,
    pub collateral_drawn: TokenAmounts,
    pub fee_rate: Decimal,
    /// Part of the drawn collateral kept by the protocol.
    pub fee: TokenAmounts,
    pub collateral_to_redeemer: TokenAmounts,
    /// Reserve tokens burned for the troves closed by this redemption.
    pub gas_compensation_burned: Decimal,
    pub redeemed_troves: Vec<(TroveId, Decimal)>,
    pub closed_troves: Vec<TroveId>,
    pub base_rate: Decimal,
}

/// Dry run of a redemption.
#[derive(ScryptoSbor, Clone, Debug)]
pub struct RedemptionHintsReturn {
    pub first_redemption_hint: Option<TroveId>,
    /// New ICR of the trove that stays open, zero if every step closes its trove.
    pub partial_redemption_hint_icr: Decimal,
    /// The part of the requested amount that can actually be redeemed.
    pub truncated_amount: Decimal,
}

#[derive(Clone, Debug)]
pub(crate) struct RedemptionStep {
    pub(crate) trove_id: TroveId,
    pub(crate) lot: Decimal,
    pub(crate) drawn: TokenAmounts,
    pub(crate) entire: EntireTrove,
    pub(crate) kind: StepKind,
}

#[derive(Clone, Debug)]
pub(crate) enum StepKind {
    Close {
        surplus: TokenAmounts,
    },
    Reinsert {
        new_icr: Decimal,
        new_collateral: TokenAmounts,
        new_debt: TokenAmounts,
    },
}

impl<S: LedgerStore> TroveLedger<S> {
    pub fn redeem_collateral<P: PriceFeed>(
        &mut self,
        amount: Decimal,
        max_fee_percentage: Decimal,
        hints: &RedemptionHints,
        max_iterations: u32,
        prices: &P,
        now: Instant,
    ) -> LedgerResult<RedemptionOutcome> {
        self.atomically(|ledger| {
            ledger.try_redeem_collateral(amount, max_fee_percentage, hints, max_iterations, prices, now)
        })
    }

    fn try_redeem_collateral<P: PriceFeed>(
        &mut self,
        amount: Decimal,
        max_fee_percentage: Decimal,
        hints: &RedemptionHints,
        max_iterations: u32,
        prices: &P,
        now: Instant,
    ) -> LedgerResult<RedemptionOutcome> {
        if self.freeze_switches.redemption {
            return Err(LedgerError::RedemptionFrozen);
        }
        require_valid_max_fee(max_fee_percentage, self.parameters.redemption_fee_floor)?;
        if !amount.is_positive() {
            return Err(LedgerError::ZeroAmount);
        }

        let stable = self.stable_token()?;
        let recovery = self.check_recovery_mode(prices)?;
        if recovery.tcr < self.parameters.mcr {
            return Err(LedgerError::TcrBelowMcr);
        }
        let stable_supply = self.pool.get_total(&stable, false);
        if amount > stable_supply {
            return Err(LedgerError::ExceedsTotalDebt);
        }

        let first = self.first_redemption_trove(hints.first_redemption_hint.as_ref(), prices)?;
        let steps = self.plan_redemption(
            first,
            amount,
            Some(hints.partial_redemption_hint_icr),
            max_iterations,
            prices,
        )?;
        let planned: Decimal = steps
            .iter()
            .fold(Decimal::ZERO, |sum, step| sum + step.lot);
        if planned.is_zero() {
            return Err(LedgerError::UnableToRedeemAnyAmount);
        }

        let half_life = self.parameters.base_rate_half_life_minutes;
        let spike_k = self.parameters.redemption_spike_k;
        let mut planned_base_rate = self.base_rate;
        planned_base_rate.update_from_redemption(now, half_life, planned / stable_supply, spike_k)?;
        require_user_accepts_fee(
            planned_base_rate.redemption_rate(self.parameters.redemption_fee_floor),
            max_fee_percentage,
        )?;

        let mut redeemed = Decimal::ZERO;
        let mut collateral_drawn = TokenAmounts::new();
        let mut gas_compensation_burned = Decimal::ZERO;
        let mut redeemed_troves = vec![];
        let mut closed_troves = vec![];

        for step in steps {
            let applied = match &step.kind {
                StepKind::Close { surplus } => {
                    self.close_redeemed_trove(&step, surplus, stable)?;
                    gas_compensation_burned += self.parameters.stable_gas_compensation;
                    closed_troves.push(step.trove_id.clone());
                    true
                }
                StepKind::Reinsert {
                    new_icr,
                    new_collateral,
                    new_debt,
                } => self.reinsert_redeemed_trove(
                    &step,
                    *new_icr,
                    new_collateral,
                    new_debt,
                    hints,
                    stable,
                    prices,
                )?,
            };
            if applied {
                redeemed += step.lot;
                collateral_drawn.add_all(&step.drawn);
                redeemed_troves.push((step.trove_id.clone(), step.lot));
            }
        }

        if redeemed.is_zero() {
            return Err(LedgerError::UnableToRedeemAnyAmount);
        }

        let base_rate =
            self.base_rate
                .update_from_redemption(now, half_life, redeemed / stable_supply, spike_k)?;
        let fee_rate = self
            .base_rate
            .redemption_rate(self.parameters.redemption_fee_floor);
        let fee = collateral_drawn.scaled(fee_rate);
        let mut collateral_to_redeemer = collateral_drawn.clone();
        collateral_to_redeemer.sub_all(&fee)?;
        self.protocol_fees.add_all(&fee);

        Ok(RedemptionOutcome {
            redeemed,
            unredeemed: amount - redeemed,
            collateral_drawn,
            fee_rate,
            fee,
            collateral_to_redeemer,
            gas_compensation_burned,
            redeemed_troves,
            closed_troves,
            base_rate,
        })
    }

    /// Current redemption fee rate after decay, without changing anything.
    pub fn get_redemption_rate(&self, now: Instant) -> LedgerResult<Decimal> {
        let decayed = self
            .base_rate
            .decayed(now, self.parameters.base_rate_half_life_minutes)?;
        Ok((self.parameters.redemption_fee_floor + decayed).min(Decimal::ONE))
    }

    /// Validates the first hint, or finds the first trove with `ICR >= MCR` from the tail.
    pub(crate) fn first_redemption_trove<P: PriceFeed>(
        &self,
        hint: Option<&TroveId>,
        prices: &P,
    ) -> LedgerResult<Option<TroveId>> {
        if let Some(hint) = hint {
            if !self.is_listed(hint) {
                return Err(LedgerError::HintUnknown(hint.clone()));
            }
            if !self.is_redeemable(hint, prices)? {
                return Err(LedgerError::InvalidRedemptionHint);
            }
            if let Some(lower) = self.next_trove(hint) {
                if self.current_icr(&lower, prices)? >= self.parameters.mcr {
                    return Err(LedgerError::InvalidHintLowerCRExists);
                }
            }
            return Ok(Some(hint.clone()));
        }

        let mut current = self.sorted_troves.last().cloned();
        while let Some(id) = current {
            if self.is_redeemable(&id, prices)? {
                return Ok(Some(id));
            }
            current = self.prev_trove(&id);
        }
        Ok(None)
    }

    /// Walks the list from `first` towards the head and works out every step without touching any state.
    ///
    /// With `partial_hint_icr` set, a trove that stays open but whose new ICR differs from it is not redeemed.
    pub(crate) fn plan_redemption<P: PriceFeed>(
        &self,
        first: Option<TroveId>,
        amount: Decimal,
        partial_hint_icr: Option<Decimal>,
        max_iterations: u32,
        prices: &P,
    ) -> LedgerResult<Vec<RedemptionStep>> {
        let stable = self.stable_token()?;
        let stable_price = prices.get_price(stable)?.price;
        let gas_compensation = self.parameters.stable_gas_compensation;

        let mut steps = vec![];
        let mut remaining = amount;
        let mut iterations = 0u32;
        let mut current = first;

        while let Some(id) = current {
            if remaining.is_zero() || (max_iterations > 0 && iterations >= max_iterations) {
                break;
            }
            iterations += 1;
            current = self.prev_trove(&id);

            if !self.is_redeemable(&id, prices)? {
                continue;
            }
            let entire = self.entire_trove(&id)?;
            let redeemable = entire.debt.get(&stable) - gas_compensation;
            if !redeemable.is_positive() {
                continue;
            }

            let lot = remaining.min(redeemable);
            let collateral_usd = prices.total_usd_value(&entire.collateral)?;
            let draw_fraction = if collateral_usd.is_zero() {
                Decimal::ONE
            } else {
                (lot * stable_price / collateral_usd).min(Decimal::ONE)
            };
            let drawn = entire.collateral.scaled(draw_fraction);

            let mut new_collateral = entire.collateral.clone();
            new_collateral.sub_all(&drawn)?;
            let mut new_debt = entire.debt.clone();
            new_debt.sub(stable, lot)?;

            let closes = lot == redeemable && new_debt.iter().all(|(token, _)| *token == stable);
            if closes {
                steps.push(RedemptionStep {
                    trove_id: id,
                    lot,
                    drawn,
                    entire,
                    kind: StepKind::Close {
                        surplus: new_collateral,
                    },
                });
                remaining -= lot;
                continue;
            }

            let new_icr = compute_icr(prices, &new_collateral, &new_debt)?;
            let hint_matches = partial_hint_icr.map_or(true, |hint_icr| hint_icr == new_icr);
            let net_debt = self.net_debt_usd(prices, &new_debt)?;
            if hint_matches && net_debt >= self.parameters.min_net_debt_usd && !new_collateral.is_empty() {
                steps.push(RedemptionStep {
                    trove_id: id,
                    lot,
                    drawn,
                    entire,
                    kind: StepKind::Reinsert {
                        new_icr,
                        new_collateral,
                        new_debt,
                    },
                });
            }
            break;
        }

        Ok(steps)
    }

    /// A trove can be redeemed from when its ICR is at least the MCR, or when it is the only trove left.
    fn is_redeemable<P: PriceFeed>(&self, id: &TroveId, prices: &P) -> LedgerResult<bool> {
        Ok(self.troves.owner_count() == 1 || self.current_icr(id, prices)? >= self.parameters.mcr)
    }

    fn close_redeemed_trove(
        &mut self,
        step: &RedemptionStep,
        surplus: &TokenAmounts,
        stable: ResourceAddress,
    ) -> LedgerResult<()> {
        let id = &step.trove_id;
        self.apply_pending_rewards(id, CALLER)?;
        self.remove_stakes(id)?;
        self.sorted_troves.remove(&mut self.store, id)?;

        for (token, amount) in step.entire.collateral.iter() {
            self.pool
                .subtract_value(CALLER, *token, true, PoolBucket::Active, *amount)?;
        }
        for (token, amount) in step.entire.debt.iter() {
            self.pool
                .subtract_value(CALLER, *token, false, PoolBucket::Active, *amount)?;
        }
        self.pool.release_gas_compensation(
            CALLER,
            stable,
            self.parameters.stable_gas_compensation,
        )?;

        self.troves
            .close(&mut self.store, id, TroveStatus::ClosedByRedemption)?;
        self.surplus.account_surplus(&mut self.store, id, surplus);
        Ok(())
    }

    /// Moves the trove first; a move without a reachable position skips the step. Returns whether the step
    /// happened.
    fn reinsert_redeemed_trove<P: PriceFeed>(
        &mut self,
        step: &RedemptionStep,
        new_icr: Decimal,
        new_collateral: &TokenAmounts,
        new_debt: &TokenAmounts,
        hints: &RedemptionHints,
        stable: ResourceAddress,
        prices: &P,
    ) -> LedgerResult<bool> {
        let id = &step.trove_id;
        let partial_hints = InsertHints::new(
            hints.upper_partial_hint.clone(),
            hints.lower_partial_hint.clone(),
        );
        match self.reinsert_trove(id, new_icr, &partial_hints, prices) {
            Ok(()) => {}
            Err(LedgerError::StaleInsertHint) => return Ok(false),
            Err(error) => return Err(error),
        }

        self.apply_pending_rewards(id, CALLER)?;
        let mut trove = self.active_trove(id)?;
        trove.collateral = new_collateral.clone();
        trove.debt = new_debt.clone();
        self.save_trove(id, trove)?;
        self.refresh_stakes(id)?;

        for (token, amount) in step.drawn.iter() {
            self.pool
                .subtract_value(CALLER, *token, true, PoolBucket::Active, *amount)?;
        }
        self.pool
            .subtract_value(CALLER, stable, false, PoolBucket::Active, step.lot)?;
        Ok(true)
    }
}
