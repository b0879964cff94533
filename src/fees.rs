//! # Fees
//! The base rate shared by borrowing and redemption fees. It decays continuously with a configurable half-life
//! and is pushed up by every redemption in proportion to the share of the stable supply redeemed.

use crate::errors::*;
use scrypto::prelude::*;
use scrypto_math::*;

#[derive(ScryptoSbor, Clone, Copy, Debug, PartialEq, Eq)]
pub struct BaseRate {
    pub rate: Decimal,
    pub last_fee_operation_time: Instant,
}

impl BaseRate {
    pub fn new(now: Instant) -> Self {
        Self {
            rate: Decimal::ZERO,
            last_fee_operation_time: now,
        }
    }

    /// Whole minutes since the last fee operation.
    pub fn minutes_passed(&self, now: Instant) -> i64 {
        ((now.seconds_since_unix_epoch - self.last_fee_operation_time.seconds_since_unix_epoch) / 60).max(0)
    }

    /// `rate * 0.5^(minutes / half_life)`
    pub fn decayed(&self, now: Instant, half_life_minutes: Decimal) -> LedgerResult<Decimal> {
        let minutes = self.minutes_passed(now);
        if minutes == 0 || self.rate.is_zero() {
            return Ok(self.rate);
        }

        let decay_factor = dec!("0.5")
            .pow(Decimal::from(minutes) / half_life_minutes)
            .ok_or(LedgerError::Overflow)?;
        Ok(self.rate * decay_factor)
    }

    /// Applies the decay and moves the fee operation time forward. The time only moves when at least a minute
    /// has passed, so frequent operations cannot stall the decay.
    pub fn decay(&mut self, now: Instant, half_life_minutes: Decimal) -> LedgerResult<()> {
        let minutes = self.minutes_passed(now);
        self.rate = self.decayed(now, half_life_minutes)?;
        if minutes > 0 {
            self.last_fee_operation_time = Instant::new(
                self.last_fee_operation_time.seconds_since_unix_epoch + minutes * 60,
            );
        }
        Ok(())
    }

    /// Decays the rate, then adds `redeemed_fraction * spike_k`, capped at 100%.
    pub fn update_from_redemption(
        &mut self,
        now: Instant,
        half_life_minutes: Decimal,
        redeemed_fraction: Decimal,
        spike_k: Decimal,
    ) -> LedgerResult<Decimal> {
        self.decay(now, half_life_minutes)?;
        self.rate = (self.rate + redeemed_fraction * spike_k).min(Decimal::ONE);
        Ok(self.rate)
    }

    pub fn borrowing_rate(&self, now: Instant, floor: Decimal, max: Decimal, half_life_minutes: Decimal) -> LedgerResult<Decimal> {
        Ok((floor + self.decayed(now, half_life_minutes)?).min(max))
    }

    pub fn redemption_rate(&self, floor: Decimal) -> Decimal {
        (floor + self.rate).min(Decimal::ONE)
    }
}

/// A `max_fee_percentage` a redeemer or borrower is willing to pay must lie between the fee floor and 100%.
pub fn require_valid_max_fee(max_fee: Decimal, floor: Decimal) -> LedgerResult<()> {
    if max_fee < floor || max_fee > Decimal::ONE {
        return Err(LedgerError::MaxFeeOutOfRange);
    }
    Ok(())
}

/// Fails with `FeeExceedsMaximum` when `fee_rate` is above what the caller accepted.
pub fn require_user_accepts_fee(fee_rate: Decimal, max_fee: Decimal) -> LedgerResult<()> {
    if fee_rate > max_fee {
        return Err(LedgerError::FeeExceedsMaximum { fee_rate, max_fee });
    }
    Ok(())
}
