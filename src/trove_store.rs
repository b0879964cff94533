//! # Trove store
//! Every trove ever opened, keyed by its [`TroveId`], plus the unordered array of active owners that hint
//! sampling draws from. Both tables live in the [`LedgerStore`]; only the owner count is kept here. Closing a
//! trove swap-removes it from the owner array in constant time.

use crate::errors::*;
use crate::shared_structs::*;
use crate::storage::LedgerStore;
use crate::token_amounts::TokenAmounts;
use scrypto::prelude::*;

#[derive(ScryptoSbor, Clone, Debug, Default, PartialEq, Eq)]
pub struct TroveStore {
    owner_count: u64,
}

impl TroveStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<S: LedgerStore>(&self, store: &S, id: &TroveId) -> Option<Trove> {
        store.trove(id)
    }

    pub fn status<S: LedgerStore>(&self, store: &S, id: &TroveId) -> TroveStatus {
        store
            .trove(id)
            .map(|trove| trove.status)
            .unwrap_or(TroveStatus::NonExistent)
    }

    pub fn is_active<S: LedgerStore>(&self, store: &S, id: &TroveId) -> bool {
        self.status(store, id).is_active()
    }

    /// Returns the trove if it is active, `TroveNotActive` otherwise.
    pub fn active<S: LedgerStore>(&self, store: &S, id: &TroveId) -> LedgerResult<Trove> {
        match store.trove(id) {
            Some(trove) if trove.status.is_active() => Ok(trove),
            _ => Err(LedgerError::TroveNotActive(id.clone())),
        }
    }

    /// Writes back an active trove.
    pub fn save<S: LedgerStore>(&self, store: &mut S, id: &TroveId, trove: Trove) -> LedgerResult<()> {
        if !trove.status.is_active() {
            return Err(LedgerError::TroveNotActive(id.clone()));
        }
        store.insert_trove(id.clone(), trove);
        Ok(())
    }

    /// Activates a trove under `id`, reusing the record of a closed trove with the same badge.
    pub fn activate<S: LedgerStore>(
        &mut self,
        store: &mut S,
        id: &TroveId,
        collateral: TokenAmounts,
        debt: TokenAmounts,
    ) -> LedgerResult<Trove> {
        if self.is_active(store, id) {
            return Err(LedgerError::TroveAlreadyActive(id.clone()));
        }

        let array_index = self.owner_count;
        store.insert_owner(array_index, id.clone());
        self.owner_count += 1;

        let mut trove = store.trove(id).unwrap_or_else(Trove::new);
        trove.status = TroveStatus::Active;
        trove.array_index = array_index;
        trove.collateral = collateral;
        trove.debt = debt;
        trove.stakes = TokenAmounts::new();
        trove.reward_snapshots = HashMap::new();
        store.insert_trove(id.clone(), trove.clone());
        Ok(trove)
    }

    /// Closes an active trove: zeroes its balances, stores the closing status and swap-removes it from the
    /// owner array. Stakes must already have been removed from the totals.
    pub fn close<S: LedgerStore>(&mut self, store: &mut S, id: &TroveId, status: TroveStatus) -> LedgerResult<()> {
        let mut trove = self.active(store, id)?;
        let index = trove.array_index;
        let last_index = self.owner_count - 1;

        if store.owner(index).as_ref() != Some(id) {
            return Err(LedgerError::ArrayIndexMismatch(id.clone()));
        }

        if index != last_index {
            let moved = store
                .owner(last_index)
                .ok_or(LedgerError::ArrayIndexMismatch(id.clone()))?;
            if let Some(mut moved_trove) = store.trove(&moved) {
                moved_trove.array_index = index;
                store.insert_trove(moved.clone(), moved_trove);
            }
            store.insert_owner(index, moved);
        }
        store.remove_owner(last_index);
        self.owner_count -= 1;

        trove.status = status;
        trove.array_index = 0;
        trove.collateral = TokenAmounts::new();
        trove.debt = TokenAmounts::new();
        trove.stakes = TokenAmounts::new();
        trove.reward_snapshots = HashMap::new();
        store.insert_trove(id.clone(), trove);
        Ok(())
    }

    pub fn owner_count(&self) -> u64 {
        self.owner_count
    }

    pub fn owner_at<S: LedgerStore>(&self, store: &S, index: u64) -> Option<TroveId> {
        if index >= self.owner_count {
            return None;
        }
        store.owner(index)
    }

    /// All active troves in owner array order.
    pub fn owners<S: LedgerStore>(&self, store: &S) -> Vec<TroveId> {
        (0..self.owner_count)
            .filter_map(|index| store.owner(index))
            .collect()
    }
}
