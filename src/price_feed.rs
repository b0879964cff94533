//! # Price feed
//! The ledger never talks to an oracle itself. Every operation receives a [`PriceFeed`]; on ledger the
//! `TroveManager` fills a [`PriceTable`] from the oracle component once per transaction.

use crate::errors::*;
use crate::token_amounts::TokenAmounts;
use scrypto::prelude::*;

/// A USD price together with the oracle's confidence in it.
#[derive(ScryptoSbor, Clone, Copy, Debug, PartialEq, Eq)]
pub struct PriceQuote {
    pub price: Decimal,
    /// `false` when the primary source is stale or frozen. Debt may not grow on untrusted prices.
    pub is_trusted: bool,
    /// `true` when the price comes from the fallback source.
    pub is_secondary: bool,
}

impl PriceQuote {
    pub fn trusted(price: Decimal) -> Self {
        Self {
            price,
            is_trusted: true,
            is_secondary: false,
        }
    }
}

pub trait PriceFeed {
    fn get_price(&self, token: ResourceAddress) -> LedgerResult<PriceQuote>;

    fn get_usd_value(&self, token: ResourceAddress, amount: Decimal) -> LedgerResult<Decimal> {
        Ok(amount * self.get_price(token)?.price)
    }

    fn get_amount_from_usd_value(&self, token: ResourceAddress, usd_value: Decimal) -> LedgerResult<Decimal> {
        let price = self.get_price(token)?.price;
        if price.is_zero() {
            return Err(LedgerError::PriceUnavailable(token));
        }
        Ok(usd_value / price)
    }

    /// Sum of the USD values of all amounts.
    fn total_usd_value(&self, amounts: &TokenAmounts) -> LedgerResult<Decimal> {
        let mut total = Decimal::ZERO;
        for (token, amount) in amounts.iter() {
            total += self.get_usd_value(*token, *amount)?;
        }
        Ok(total)
    }

    /// Fails with `UntrustedPrice` if any of the tokens is priced from an untrusted source.
    fn require_trusted(&self, tokens: &[ResourceAddress]) -> LedgerResult<()> {
        for token in tokens {
            if !self.get_price(*token)?.is_trusted {
                return Err(LedgerError::UntrustedPrice(*token));
            }
        }
        Ok(())
    }
}

/// Snapshot of oracle prices, keyed by token.
#[derive(ScryptoSbor, Clone, Debug, Default)]
pub struct PriceTable {
    quotes: HashMap<ResourceAddress, PriceQuote>,
}

impl PriceTable {
    pub fn new() -> Self {
        Self {
            quotes: HashMap::new(),
        }
    }

    pub fn with_price(mut self, token: ResourceAddress, price: Decimal) -> Self {
        self.set_price(token, price);
        self
    }

    pub fn set_price(&mut self, token: ResourceAddress, price: Decimal) {
        self.quotes.insert(token, PriceQuote::trusted(price));
    }

    pub fn set_quote(&mut self, token: ResourceAddress, quote: PriceQuote) {
        self.quotes.insert(token, quote);
    }
}

impl PriceFeed for PriceTable {
    fn get_price(&self, token: ResourceAddress) -> LedgerResult<PriceQuote> {
        self.quotes
            .get(&token)
            .copied()
            .ok_or(LedgerError::PriceUnavailable(token))
    }
}
