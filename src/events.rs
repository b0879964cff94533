//! Defines events emitted by the `TroveManager` component.

use crate::shared_structs::*;
use scrypto::prelude::*;

/// Event emitted when a collateral or debt token is registered.
#[derive(ScryptoSbor, ScryptoEvent, Clone)]
pub struct EventNewToken {
    /// The `ResourceAddress` of the new token.
    pub address: ResourceAddress,
    /// Whether the token backs troves or is minted against them.
    pub kind: TokenKind,
}

/// Event emitted when a trove is opened or adjusted.
#[derive(ScryptoSbor, ScryptoEvent, Clone)]
pub struct EventTroveUpdated {
    /// The `NonFungibleLocalId` of the borrower badge identifying the trove.
    pub trove_id: NonFungibleLocalId,
    /// `true` if this update opened the trove.
    pub opened: bool,
    /// Collateral held by the trove after the update.
    pub collateral: Vec<(ResourceAddress, Decimal)>,
    /// Debt owed by the trove after the update, including the gas compensation.
    pub debt: Vec<(ResourceAddress, Decimal)>,
    /// Redistribution stakes of the trove after the update.
    pub stakes: Vec<(ResourceAddress, Decimal)>,
    /// The ICR the trove was sorted with.
    pub icr: Decimal,
    /// Borrowing fee added to the debt, per debt token.
    pub borrowing_fees: Vec<(ResourceAddress, Decimal)>,
}

/// Event emitted when a trove is closed by its owner or by a redemption.
#[derive(ScryptoSbor, ScryptoEvent, Clone)]
pub struct EventTroveClosed {
    pub trove_id: NonFungibleLocalId,
    pub status: TroveStatus,
}

/// Event emitted for every liquidated trove.
#[derive(ScryptoSbor, ScryptoEvent, Clone)]
pub struct EventTroveLiquidated {
    pub trove_id: NonFungibleLocalId,
    /// Normal or recovery mode liquidation.
    pub mode: LiquidationMode,
    /// ICR of the trove at liquidation.
    pub icr: Decimal,
    /// Entire collateral of the trove, including pending rewards.
    pub collateral: Vec<(ResourceAddress, Decimal)>,
    /// Entire debt of the trove, including pending rewards.
    pub debt: Vec<(ResourceAddress, Decimal)>,
    pub redistributed_collateral: Vec<(ResourceAddress, Decimal)>,
    pub redistributed_debt: Vec<(ResourceAddress, Decimal)>,
    /// Collateral the owner can claim from the surplus pool.
    pub collateral_surplus: Vec<(ResourceAddress, Decimal)>,
}

/// Event emitted once per liquidation call.
#[derive(ScryptoSbor, ScryptoEvent, Clone)]
pub struct EventBatchLiquidation {
    pub liquidated_troves: Vec<NonFungibleLocalId>,
    /// Whether the system was in recovery mode when the batch started.
    pub recovery_mode: bool,
    /// TCR when the batch started.
    pub tcr: Decimal,
    /// Collateral paid to the liquidator.
    pub coll_gas_compensation: Vec<(ResourceAddress, Decimal)>,
    /// Stable tokens paid to the liquidator.
    pub stable_gas_compensation: Decimal,
    /// Stable tokens burned from the gas compensation reserve.
    pub gas_compensation_burned: Decimal,
}

/// Event emitted when stable tokens are redeemed for collateral.
#[derive(ScryptoSbor, ScryptoEvent, Clone)]
pub struct EventRedemption {
    /// Amount of stable tokens redeemed and burned.
    pub redeemed: Decimal,
    /// Amount of stable tokens handed back to the redeemer.
    pub unredeemed: Decimal,
    /// Collateral drawn from troves, fee included.
    pub collateral_drawn: Vec<(ResourceAddress, Decimal)>,
    /// Collateral kept by the protocol as fee.
    pub fee: Vec<(ResourceAddress, Decimal)>,
    pub fee_rate: Decimal,
    /// Troves redeemed against, with the redeemed amount each.
    pub redeemed_troves: Vec<(NonFungibleLocalId, Decimal)>,
    /// Troves closed because all their redeemable debt was redeemed.
    pub closed_troves: Vec<NonFungibleLocalId>,
}

/// Event emitted when an owner claims surplus collateral.
#[derive(ScryptoSbor, ScryptoEvent, Clone)]
pub struct EventCollateralClaimed {
    pub trove_id: NonFungibleLocalId,
    pub collateral: Vec<(ResourceAddress, Decimal)>,
}

/// Event emitted when the freeze switches change.
#[derive(ScryptoSbor, ScryptoEvent, Clone)]
pub struct EventFreezeSwitchesChanged {
    pub freeze_switches: FreezeSwitches,
}

/// Event emitted whenever a fee operation moved the base rate.
#[derive(ScryptoSbor, ScryptoEvent, Clone)]
pub struct EventBaseRateUpdated {
    pub base_rate: Decimal,
    pub last_fee_operation_time: Instant,
}
