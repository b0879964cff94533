//! # Storage pool
//! System-wide balances. Every token has an active bucket (held by open troves) and a pending bucket
//! (redistributed by liquidations but not yet settled into a trove). Collateral and debt are tracked separately.
//! The stable gas compensation reserved by open troves is tracked on its own.

use crate::errors::*;
use crate::price_feed::PriceFeed;
use crate::shared_structs::RecoveryModeCheck;
use crate::token_amounts::TokenAmounts;
use scrypto::prelude::*;

#[derive(ScryptoSbor, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PoolBucket {
    Active,
    Pending,
}

/// The ledger components that move pool balances.
#[derive(ScryptoSbor, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PoolCaller {
    BorrowerOperations,
    LiquidationEngine,
    RedemptionEngine,
}

#[derive(ScryptoSbor, Clone, Debug, PartialEq, Eq)]
pub struct StoragePool {
    collateral_active: TokenAmounts,
    collateral_pending: TokenAmounts,
    debt_active: TokenAmounts,
    debt_pending: TokenAmounts,
    /// Stable tokens set aside to pay liquidators and to cancel the gas compensation debt on close.
    gas_compensation: TokenAmounts,
    authorized: Vec<PoolCaller>,
}

impl StoragePool {
    /// A pool every ledger engine may write to.
    pub fn new() -> Self {
        Self::with_callers(vec![
            PoolCaller::BorrowerOperations,
            PoolCaller::LiquidationEngine,
            PoolCaller::RedemptionEngine,
        ])
    }

    pub fn with_callers(authorized: Vec<PoolCaller>) -> Self {
        Self {
            collateral_active: TokenAmounts::new(),
            collateral_pending: TokenAmounts::new(),
            debt_active: TokenAmounts::new(),
            debt_pending: TokenAmounts::new(),
            gas_compensation: TokenAmounts::new(),
            authorized,
        }
    }

    pub fn get_value(&self, token: &ResourceAddress, is_collateral: bool, bucket: PoolBucket) -> Decimal {
        self.bucket(is_collateral, bucket).get(token)
    }

    /// Active plus pending amount of a token.
    pub fn get_total(&self, token: &ResourceAddress, is_collateral: bool) -> Decimal {
        self.get_value(token, is_collateral, PoolBucket::Active)
            + self.get_value(token, is_collateral, PoolBucket::Pending)
    }

    pub fn add_value(
        &mut self,
        caller: PoolCaller,
        token: ResourceAddress,
        is_collateral: bool,
        bucket: PoolBucket,
        amount: Decimal,
    ) -> LedgerResult<()> {
        self.authorize(caller)?;
        self.bucket_mut(is_collateral, bucket).add(token, amount);
        Ok(())
    }

    pub fn subtract_value(
        &mut self,
        caller: PoolCaller,
        token: ResourceAddress,
        is_collateral: bool,
        bucket: PoolBucket,
        amount: Decimal,
    ) -> LedgerResult<()> {
        self.authorize(caller)?;
        self.bucket_mut(is_collateral, bucket)
            .sub(token, amount)
            .map_err(|_| LedgerError::PoolUnderflow(token))
    }

    pub fn transfer_between_buckets(
        &mut self,
        caller: PoolCaller,
        token: ResourceAddress,
        is_collateral: bool,
        from: PoolBucket,
        to: PoolBucket,
        amount: Decimal,
    ) -> LedgerResult<()> {
        self.subtract_value(caller, token, is_collateral, from, amount)?;
        self.add_value(caller, token, is_collateral, to, amount)
    }

    pub fn gas_compensation(&self, token: &ResourceAddress) -> Decimal {
        self.gas_compensation.get(token)
    }

    pub fn reserve_gas_compensation(
        &mut self,
        caller: PoolCaller,
        token: ResourceAddress,
        amount: Decimal,
    ) -> LedgerResult<()> {
        self.authorize(caller)?;
        self.gas_compensation.add(token, amount);
        Ok(())
    }

    pub fn release_gas_compensation(
        &mut self,
        caller: PoolCaller,
        token: ResourceAddress,
        amount: Decimal,
    ) -> LedgerResult<()> {
        self.authorize(caller)?;
        self.gas_compensation
            .sub(token, amount)
            .map_err(|_| LedgerError::PoolUnderflow(token))
    }

    /// Active plus pending collateral of every token.
    pub fn total_collateral(&self) -> TokenAmounts {
        let mut total = self.collateral_active.clone();
        total.add_all(&self.collateral_pending);
        total
    }

    pub fn total_debt(&self) -> TokenAmounts {
        let mut total = self.debt_active.clone();
        total.add_all(&self.debt_pending);
        total
    }

    /// Computes the TCR over active and pending balances and compares it with `ccr`.
    pub fn check_recovery_mode<P: PriceFeed>(&self, prices: &P, ccr: Decimal) -> LedgerResult<RecoveryModeCheck> {
        let total_coll_usd = prices.total_usd_value(&self.total_collateral())?;
        let total_debt_usd = prices.total_usd_value(&self.total_debt())?;
        let tcr = if total_debt_usd.is_zero() {
            Decimal::MAX
        } else {
            total_coll_usd / total_debt_usd
        };

        Ok(RecoveryModeCheck {
            in_recovery_mode: tcr < ccr,
            tcr,
            total_coll_usd,
            total_debt_usd,
        })
    }

    fn authorize(&self, caller: PoolCaller) -> LedgerResult<()> {
        if self.authorized.contains(&caller) {
            Ok(())
        } else {
            Err(LedgerError::Unauthorized)
        }
    }

    fn bucket(&self, is_collateral: bool, bucket: PoolBucket) -> &TokenAmounts {
        match (is_collateral, bucket) {
            (true, PoolBucket::Active) => &self.collateral_active,
            (true, PoolBucket::Pending) => &self.collateral_pending,
            (false, PoolBucket::Active) => &self.debt_active,
            (false, PoolBucket::Pending) => &self.debt_pending,
        }
    }

    fn bucket_mut(&mut self, is_collateral: bool, bucket: PoolBucket) -> &mut TokenAmounts {
        match (is_collateral, bucket) {
            (true, PoolBucket::Active) => &mut self.collateral_active,
            (true, PoolBucket::Pending) => &mut self.collateral_pending,
            (false, PoolBucket::Active) => &mut self.debt_active,
            (false, PoolBucket::Pending) => &mut self.debt_pending,
        }
    }
}

impl Default for StoragePool {
    fn default() -> Self {
        Self::new()
    }
}
