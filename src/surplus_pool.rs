//! # Surplus pool
//! Collateral left over after a capped recovery mode liquidation or a full redemption. The owner of the trove
//! claims it with the trove's borrower badge. Claims are kept per trove in the [`LedgerStore`].

use crate::errors::*;
use crate::shared_structs::TroveId;
use crate::storage::LedgerStore;
use crate::token_amounts::TokenAmounts;
use scrypto::prelude::*;

#[derive(ScryptoSbor, Clone, Debug, Default, PartialEq, Eq)]
pub struct SurplusPool {
    total: TokenAmounts,
}

impl SurplusPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn account_surplus<S: LedgerStore>(&mut self, store: &mut S, id: &TroveId, amounts: &TokenAmounts) {
        if amounts.is_empty() {
            return;
        }
        let mut claimable = store.claim(id).unwrap_or_default();
        claimable.add_all(amounts);
        store.insert_claim(id.clone(), claimable);
        self.total.add_all(amounts);
    }

    pub fn claimable<S: LedgerStore>(&self, store: &S, id: &TroveId) -> TokenAmounts {
        store.claim(id).unwrap_or_default()
    }

    /// Takes everything `id` can claim. Fails with `NothingToClaim` if that is nothing.
    pub fn claim<S: LedgerStore>(&mut self, store: &mut S, id: &TroveId) -> LedgerResult<TokenAmounts> {
        let amounts = match store.claim(id) {
            Some(amounts) if !amounts.is_empty() => amounts,
            _ => return Err(LedgerError::NothingToClaim),
        };
        self.total.sub_all(&amounts).map_err(|error| match error {
            LedgerError::InsufficientBalance { token, .. } => LedgerError::PoolUnderflow(token),
            other => other,
        })?;
        store.remove_claim(id);
        Ok(amounts)
    }

    pub fn total(&self) -> &TokenAmounts {
        &self.total
    }
}
