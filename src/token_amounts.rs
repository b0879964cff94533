//! # Token amounts
//! A small ordered map of `(ResourceAddress, Decimal)` pairs used for a trove's collateral, debt and stakes.
//! Tokens are unique and zero entries are never stored.

use crate::errors::*;
use scrypto::prelude::*;

#[derive(ScryptoSbor, Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenAmounts(Vec<(ResourceAddress, Decimal)>);

impl TokenAmounts {
    pub fn new() -> Self {
        Self(vec![])
    }

    /// Builds the map from caller supplied pairs, rejecting repeated tokens and non-positive amounts.
    pub fn from_pairs(pairs: Vec<(ResourceAddress, Decimal)>) -> LedgerResult<Self> {
        let mut amounts = Self::new();
        for (token, amount) in pairs {
            if !amount.is_positive() {
                return Err(LedgerError::ZeroAmount);
            }
            amounts.insert(token, amount)?;
        }
        Ok(amounts)
    }

    pub fn get(&self, token: &ResourceAddress) -> Decimal {
        self.0
            .iter()
            .find(|(address, _)| address == token)
            .map(|(_, amount)| *amount)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn contains(&self, token: &ResourceAddress) -> bool {
        self.0.iter().any(|(address, _)| address == token)
    }

    /// Adds a new entry. Fails if the token is already present.
    pub fn insert(&mut self, token: ResourceAddress, amount: Decimal) -> LedgerResult<()> {
        if self.contains(&token) {
            return Err(LedgerError::DuplicateToken(token));
        }
        if !amount.is_zero() {
            self.0.push((token, amount));
        }
        Ok(())
    }

    /// Overwrites the amount of a token, dropping the entry when the amount is zero.
    pub fn set(&mut self, token: ResourceAddress, amount: Decimal) {
        match self.0.iter().position(|(address, _)| *address == token) {
            Some(index) if amount.is_zero() => {
                self.0.remove(index);
            }
            Some(index) => self.0[index].1 = amount,
            None if amount.is_zero() => {}
            None => self.0.push((token, amount)),
        }
    }

    pub fn add(&mut self, token: ResourceAddress, amount: Decimal) {
        let current = self.get(&token);
        self.set(token, current + amount);
    }

    pub fn sub(&mut self, token: ResourceAddress, amount: Decimal) -> LedgerResult<()> {
        let current = self.get(&token);
        if amount > current {
            return Err(LedgerError::InsufficientBalance {
                token,
                requested: amount,
                available: current,
            });
        }
        self.set(token, current - amount);
        Ok(())
    }

    pub fn add_all(&mut self, other: &TokenAmounts) {
        for (token, amount) in other.iter() {
            self.add(*token, *amount);
        }
    }

    pub fn sub_all(&mut self, other: &TokenAmounts) -> LedgerResult<()> {
        for (token, amount) in other.iter() {
            self.sub(*token, *amount)?;
        }
        Ok(())
    }

    /// Multiplies every amount by `factor`, truncating toward zero.
    pub fn scaled(&self, factor: Decimal) -> TokenAmounts {
        let mut scaled = TokenAmounts::new();
        for (token, amount) in self.iter() {
            scaled.set(*token, *amount * factor);
        }
        scaled
    }

    pub fn iter(&self) -> impl Iterator<Item = &(ResourceAddress, Decimal)> {
        self.0.iter()
    }

    pub fn tokens(&self) -> Vec<ResourceAddress> {
        self.0.iter().map(|(token, _)| *token).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_vec(&self) -> Vec<(ResourceAddress, Decimal)> {
        self.0.clone()
    }
}
