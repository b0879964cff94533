//! # Trove ledger
//!
//! [`TroveLedger`] wires the trove store, reward accumulator, sorted list, storage pool, surplus pool and base
//! rate together. It knows nothing about vaults or buckets: the `TroveManager` blueprint keeps one in its state
//! and moves tokens according to the outcomes the ledger returns.
//!
//! The engines live in their own modules as further `impl TroveLedger` blocks:
//! `borrower_operations`, `liquidations`, `redemptions` and `hint_helpers`.
//!
//! Per-trove state sits in a [`LedgerStore`] behind a [`StagedStore`]. Every public mutating operation runs
//! through `TroveLedger::atomically`: its store writes are buffered and committed only when it succeeds, and the
//! rest of the ledger is restored from a checkpoint when it fails.

use crate::errors::*;
use crate::fees::BaseRate;
use crate::price_feed::PriceFeed;
use crate::reward_accumulator::RewardAccumulator;
use crate::shared_structs::*;
use crate::sorted_troves::SortedTroves;
use crate::storage::{LedgerStore, MemoryStore, StagedStore};
use crate::storage_pool::{PoolBucket, PoolCaller, StoragePool};
use crate::surplus_pool::SurplusPool;
use crate::token_amounts::TokenAmounts;
use crate::trove_store::TroveStore;
use scrypto::prelude::*;

/// A trove's balances including everything redistributed to it but not yet settled.
#[derive(ScryptoSbor, Clone, Debug, Default, PartialEq, Eq)]
pub struct EntireTrove {
    pub collateral: TokenAmounts,
    pub debt: TokenAmounts,
    pub pending_collateral: TokenAmounts,
    pub pending_debt: TokenAmounts,
}

#[derive(ScryptoSbor, Clone, Debug, PartialEq, Eq)]
pub struct TroveLedger<S> {
    pub parameters: ProtocolParameters,
    pub freeze_switches: FreezeSwitches,
    tokens: Vec<(ResourceAddress, TokenKind)>,
    pub(crate) troves: TroveStore,
    pub(crate) rewards: RewardAccumulator,
    pub(crate) sorted_troves: SortedTroves,
    pub(crate) pool: StoragePool,
    pub(crate) surplus: SurplusPool,
    pub(crate) base_rate: BaseRate,
    pub(crate) protocol_fees: TokenAmounts,
    pub(crate) store: StagedStore<S>,
}

/// Everything an operation can change outside the store.
struct Checkpoint {
    troves: TroveStore,
    rewards: RewardAccumulator,
    sorted_troves: SortedTroves,
    pool: StoragePool,
    surplus: SurplusPool,
    base_rate: BaseRate,
    protocol_fees: TokenAmounts,
}

impl TroveLedger<MemoryStore> {
    pub fn new(parameters: ProtocolParameters, now: Instant) -> Self {
        Self::with_store(parameters, now, MemoryStore::new())
    }
}

impl<S: LedgerStore> TroveLedger<S> {
    pub fn with_store(parameters: ProtocolParameters, now: Instant, store: S) -> Self {
        Self {
            parameters,
            freeze_switches: FreezeSwitches::default(),
            tokens: vec![],
            troves: TroveStore::new(),
            rewards: RewardAccumulator::new(),
            sorted_troves: SortedTroves::new(),
            pool: StoragePool::new(),
            surplus: SurplusPool::new(),
            base_rate: BaseRate::new(now),
            protocol_fees: TokenAmounts::new(),
            store: StagedStore::new(store),
        }
    }

    /// Runs `operation` as a unit. On success its store writes are committed; on failure they are dropped and
    /// the rest of the ledger is put back the way it was.
    pub(crate) fn atomically<T>(
        &mut self,
        operation: impl FnOnce(&mut Self) -> LedgerResult<T>,
    ) -> LedgerResult<T> {
        let checkpoint = Checkpoint {
            troves: self.troves.clone(),
            rewards: self.rewards.clone(),
            sorted_troves: self.sorted_troves.clone(),
            pool: self.pool.clone(),
            surplus: self.surplus.clone(),
            base_rate: self.base_rate,
            protocol_fees: self.protocol_fees.clone(),
        };

        match operation(self) {
            Ok(value) => {
                self.store.commit();
                Ok(value)
            }
            Err(error) => {
                self.store.discard();
                self.troves = checkpoint.troves;
                self.rewards = checkpoint.rewards;
                self.sorted_troves = checkpoint.sorted_troves;
                self.pool = checkpoint.pool;
                self.surplus = checkpoint.surplus;
                self.base_rate = checkpoint.base_rate;
                self.protocol_fees = checkpoint.protocol_fees;
                Err(error)
            }
        }
    }

    //token registry

    pub fn register_collateral(&mut self, token: ResourceAddress) -> LedgerResult<()> {
        self.register_token(token, TokenKind::Collateral)
    }

    /// Registers a debt token. Only one of them can be the stable token.
    pub fn register_debt_token(&mut self, token: ResourceAddress, is_stable: bool) -> LedgerResult<()> {
        if is_stable && self.stable_token().is_ok() {
            return Err(LedgerError::TokenAlreadyRegistered(token));
        }
        self.register_token(token, TokenKind::Debt { is_stable })
    }

    fn register_token(&mut self, token: ResourceAddress, kind: TokenKind) -> LedgerResult<()> {
        if self.tokens.iter().any(|(address, _)| *address == token) {
            return Err(LedgerError::TokenAlreadyRegistered(token));
        }
        self.tokens.push((token, kind));
        Ok(())
    }

    pub fn token_kind(&self, token: &ResourceAddress) -> LedgerResult<TokenKind> {
        self.tokens
            .iter()
            .find(|(address, _)| address == token)
            .map(|(_, kind)| *kind)
            .ok_or(LedgerError::UnknownToken(*token))
    }

    pub fn is_collateral(&self, token: &ResourceAddress) -> bool {
        matches!(self.token_kind(token), Ok(TokenKind::Collateral))
    }

    pub fn require_collateral(&self, token: &ResourceAddress) -> LedgerResult<()> {
        match self.token_kind(token)? {
            TokenKind::Collateral => Ok(()),
            TokenKind::Debt { .. } => Err(LedgerError::NotCollateral(*token)),
        }
    }

    pub fn require_debt_token(&self, token: &ResourceAddress) -> LedgerResult<()> {
        match self.token_kind(token)? {
            TokenKind::Debt { .. } => Ok(()),
            TokenKind::Collateral => Err(LedgerError::NotDebtToken(*token)),
        }
    }

    pub fn stable_token(&self) -> LedgerResult<ResourceAddress> {
        self.tokens
            .iter()
            .find(|(_, kind)| *kind == TokenKind::Debt { is_stable: true })
            .map(|(address, _)| *address)
            .ok_or(LedgerError::NoStableToken)
    }

    pub fn collateral_tokens(&self) -> Vec<ResourceAddress> {
        self.tokens
            .iter()
            .filter(|(_, kind)| *kind == TokenKind::Collateral)
            .map(|(address, _)| *address)
            .collect()
    }

    pub fn debt_tokens(&self) -> Vec<ResourceAddress> {
        self.tokens
            .iter()
            .filter(|(_, kind)| matches!(kind, TokenKind::Debt { .. }))
            .map(|(address, _)| *address)
            .collect()
    }

    //views

    pub fn trove_status(&self, id: &TroveId) -> TroveStatus {
        self.troves.status(&self.store, id)
    }

    pub fn trove(&self, id: &TroveId) -> Option<Trove> {
        self.troves.get(&self.store, id)
    }

    pub fn active_trove_count(&self) -> u64 {
        self.troves.owner_count()
    }

    /// Active troves in owner array order.
    pub fn owners(&self) -> Vec<TroveId> {
        self.troves.owners(&self.store)
    }

    pub fn sorted_troves(&self) -> &SortedTroves {
        &self.sorted_troves
    }

    /// Troves in list order, safest first.
    pub fn sorted_trove_ids(&self) -> Vec<TroveId> {
        self.sorted_troves.iter(&self.store).collect()
    }

    pub fn is_listed(&self, id: &TroveId) -> bool {
        self.sorted_troves.contains(&self.store, id)
    }

    /// Neighbour of `id` towards the tail of the sorted list.
    pub fn next_trove(&self, id: &TroveId) -> Option<TroveId> {
        self.sorted_troves.next(&self.store, id)
    }

    /// Neighbour of `id` towards the head of the sorted list.
    pub fn prev_trove(&self, id: &TroveId) -> Option<TroveId> {
        self.sorted_troves.prev(&self.store, id)
    }

    pub fn store(&self) -> &StagedStore<S> {
        &self.store
    }

    pub fn rewards(&self) -> &RewardAccumulator {
        &self.rewards
    }

    pub fn pool(&self) -> &StoragePool {
        &self.pool
    }

    pub fn surplus(&self) -> &SurplusPool {
        &self.surplus
    }

    /// Collateral the owner of `id` can claim from the surplus pool.
    pub fn claimable_collateral(&self, id: &TroveId) -> TokenAmounts {
        self.surplus.claimable(&self.store, id)
    }

    pub fn base_rate(&self) -> BaseRate {
        self.base_rate
    }

    pub fn protocol_fees(&self) -> &TokenAmounts {
        &self.protocol_fees
    }

    /// Pending collateral and pending debt of an active trove.
    pub fn pending_rewards(&self, id: &TroveId) -> LedgerResult<(TokenAmounts, TokenAmounts)> {
        let trove = self.active_trove(id)?;
        Ok(self.split_rewards(&self.rewards.pending_rewards(&trove)))
    }

    pub fn entire_trove(&self, id: &TroveId) -> LedgerResult<EntireTrove> {
        let trove = self.active_trove(id)?;
        let (pending_collateral, pending_debt) =
            self.split_rewards(&self.rewards.pending_rewards(&trove));

        let mut collateral = trove.collateral.clone();
        collateral.add_all(&pending_collateral);
        let mut debt = trove.debt.clone();
        debt.add_all(&pending_debt);

        Ok(EntireTrove {
            collateral,
            debt,
            pending_collateral,
            pending_debt,
        })
    }

    /// ICR of an active trove including its pending rewards.
    pub fn current_icr<P: PriceFeed>(&self, id: &TroveId, prices: &P) -> LedgerResult<Decimal> {
        let entire = self.entire_trove(id)?;
        compute_icr(prices, &entire.collateral, &entire.debt)
    }

    pub fn check_recovery_mode<P: PriceFeed>(&self, prices: &P) -> LedgerResult<RecoveryModeCheck> {
        self.pool.check_recovery_mode(prices, self.parameters.ccr)
    }

    pub fn trove_info<P: PriceFeed>(&self, id: &TroveId, prices: &P) -> LedgerResult<TroveInfoReturn> {
        let trove = self.active_trove(id)?;
        let entire = self.entire_trove(id)?;
        Ok(TroveInfoReturn {
            trove_id: id.clone(),
            status: trove.status,
            collateral: entire.collateral.to_vec(),
            debt: entire.debt.to_vec(),
            pending_collateral: entire.pending_collateral.to_vec(),
            pending_debt: entire.pending_debt.to_vec(),
            stakes: trove.stakes.to_vec(),
            icr: compute_icr(prices, &entire.collateral, &entire.debt)?,
        })
    }

    /// Position for a trove with `icr`, checked against the current ICR of its would-be neighbours.
    pub fn find_insert_position<P: PriceFeed>(
        &self,
        icr: Decimal,
        hints: &InsertHints,
        prices: &P,
    ) -> LedgerResult<(Option<TroveId>, Option<TroveId>)> {
        self.sorted_troves.find_insert_position(
            &self.store,
            icr,
            hints.upper_hint.as_ref(),
            hints.lower_hint.as_ref(),
            self.parameters.max_hint_walk,
            &|other: &TroveId| self.current_icr(other, prices),
        )
    }

    //owner operations

    pub fn set_freeze_switches(&mut self, freeze_switches: FreezeSwitches) {
        self.freeze_switches = freeze_switches;
    }

    /// Takes all fees collected so far.
    pub fn collect_fees(&mut self) -> TokenAmounts {
        std::mem::take(&mut self.protocol_fees)
    }

    //shared helpers for the engines

    /// Splits mixed pending rewards into collateral and debt.
    pub(crate) fn split_rewards(&self, rewards: &TokenAmounts) -> (TokenAmounts, TokenAmounts) {
        let mut collateral = TokenAmounts::new();
        let mut debt = TokenAmounts::new();
        for (token, amount) in rewards.iter() {
            if self.is_collateral(token) {
                collateral.add(*token, *amount);
            } else {
                debt.add(*token, *amount);
            }
        }
        (collateral, debt)
    }

    pub(crate) fn active_trove(&self, id: &TroveId) -> LedgerResult<Trove> {
        self.troves.active(&self.store, id)
    }

    pub(crate) fn save_trove(&mut self, id: &TroveId, trove: Trove) -> LedgerResult<()> {
        self.troves.save(&mut self.store, id, trove)
    }

    /// Moves a trove's pending rewards from the pending buckets into the trove and the active buckets, then
    /// refreshes its snapshots.
    pub(crate) fn apply_pending_rewards(&mut self, id: &TroveId, caller: PoolCaller) -> LedgerResult<()> {
        let mut trove = self.active_trove(id)?;
        let (pending_collateral, pending_debt) =
            self.split_rewards(&self.rewards.pending_rewards(&trove));

        for (token, amount) in pending_collateral.iter() {
            self.pool.transfer_between_buckets(
                caller,
                *token,
                true,
                PoolBucket::Pending,
                PoolBucket::Active,
                *amount,
            )?;
        }
        for (token, amount) in pending_debt.iter() {
            self.pool.transfer_between_buckets(
                caller,
                *token,
                false,
                PoolBucket::Pending,
                PoolBucket::Active,
                *amount,
            )?;
        }

        trove.collateral.add_all(&pending_collateral);
        trove.debt.add_all(&pending_debt);
        self.rewards.update_snapshots(&mut trove);
        self.save_trove(id, trove)
    }

    /// Recomputes the stakes of a trove after its collateral changed and snapshots the accumulator for it.
    pub(crate) fn refresh_stakes(&mut self, id: &TroveId) -> LedgerResult<()> {
        let mut trove = self.active_trove(id)?;
        self.rewards.update_stakes(&mut trove);
        self.rewards.update_snapshots(&mut trove);
        self.save_trove(id, trove)
    }

    pub(crate) fn remove_stakes(&mut self, id: &TroveId) -> LedgerResult<()> {
        let mut trove = self.active_trove(id)?;
        self.rewards.remove_stakes(&mut trove);
        self.save_trove(id, trove)
    }

    /// Links a trove that is not in the list yet at the position of `icr`.
    pub(crate) fn insert_trove<P: PriceFeed>(
        &mut self,
        id: &TroveId,
        icr: Decimal,
        hints: &InsertHints,
        prices: &P,
    ) -> LedgerResult<()> {
        let (prev, next) = self.find_insert_position(icr, hints, prices)?;
        self.sorted_troves.insert(&mut self.store, id, prev, next)
    }

    /// Moves a listed trove to the position of `new_icr`. If no valid position is within reach the trove keeps
    /// its old place.
    pub(crate) fn reinsert_trove<P: PriceFeed>(
        &mut self,
        id: &TroveId,
        new_icr: Decimal,
        hints: &InsertHints,
        prices: &P,
    ) -> LedgerResult<()> {
        let old_prev = self.sorted_troves.prev(&self.store, id);
        let old_next = self.sorted_troves.next(&self.store, id);
        self.sorted_troves.remove(&mut self.store, id)?;

        let position = self.find_insert_position(new_icr, hints, prices);
        match position {
            Ok((prev, next)) => self.sorted_troves.insert(&mut self.store, id, prev, next),
            Err(error) => {
                self.sorted_troves
                    .insert(&mut self.store, id, old_prev, old_next)?;
                Err(error)
            }
        }
    }

    /// USD value of each token in `amounts`.
    pub(crate) fn usd_values<P: PriceFeed>(&self, prices: &P, amounts: &TokenAmounts) -> LedgerResult<TokenAmounts> {
        let mut values = TokenAmounts::new();
        for (token, amount) in amounts.iter() {
            values.set(*token, prices.get_usd_value(*token, *amount)?);
        }
        Ok(values)
    }

    /// Net debt in USD: total debt value minus the stable gas compensation.
    pub(crate) fn net_debt_usd<P: PriceFeed>(&self, prices: &P, debt: &TokenAmounts) -> LedgerResult<Decimal> {
        let gas_compensation_usd = prices.get_usd_value(
            self.stable_token()?,
            self.parameters.stable_gas_compensation,
        )?;
        Ok(prices.total_usd_value(debt)? - gas_compensation_usd)
    }
}

/// `collateral_usd / debt_usd`, or `Decimal::MAX` for a trove without debt.
pub fn compute_icr<P: PriceFeed>(
    prices: &P,
    collateral: &TokenAmounts,
    debt: &TokenAmounts,
) -> LedgerResult<Decimal> {
    let debt_usd = prices.total_usd_value(debt)?;
    if debt_usd.is_zero() {
        return Ok(Decimal::MAX);
    }
    Ok(prices.total_usd_value(collateral)? / debt_usd)
}
