//! # Shared structs
//! Data structures used by the ledger modules, the `TroveManager` blueprint and its events.

use crate::token_amounts::TokenAmounts;
use scrypto::prelude::*;

/// Identity of a trove: the local id of the owner's borrower badge.
pub type TroveId = NonFungibleLocalId;

/// Which liquidation regime closed a trove.
#[derive(ScryptoSbor, PartialEq, Eq, Clone, Copy, Debug)]
pub enum LiquidationMode {
    Normal,
    Recovery,
}

/// The lifecycle state of a trove.
#[derive(ScryptoSbor, PartialEq, Eq, Clone, Copy, Debug)]
pub enum TroveStatus {
    /// Never opened under this badge.
    NonExistent,
    /// Open, holding collateral and sitting in the sorted list.
    Active,
    /// Closed by the owner after repaying its debt.
    ClosedByOwner,
    /// Liquidated. Any capped-liquidation leftover waits in the surplus pool.
    ClosedByLiquidation(LiquidationMode),
    /// All redeemable debt was redeemed. The remaining collateral waits in the surplus pool.
    ClosedByRedemption,
}

impl TroveStatus {
    pub fn is_active(&self) -> bool {
        *self == TroveStatus::Active
    }

    pub fn is_closed(&self) -> bool {
        !matches!(self, TroveStatus::NonExistent | TroveStatus::Active)
    }
}

/// Per-trove record, one store entry per trove.
#[derive(ScryptoSbor, Clone, Debug, PartialEq, Eq)]
pub struct Trove {
    pub status: TroveStatus,
    /// Slot in the unordered owner array. Only meaningful while active.
    pub array_index: u64,
    /// Recorded collateral, without pending redistribution rewards.
    pub collateral: TokenAmounts,
    /// Recorded debt, without pending redistributed debt.
    pub debt: TokenAmounts,
    /// Stake per collateral token, the weight used for redistribution.
    pub stakes: TokenAmounts,
    /// `L[C][R]` as seen at the last settlement, per collateral token `C` and reward token `R`.
    pub reward_snapshots: HashMap<ResourceAddress, HashMap<ResourceAddress, Decimal>>,
}

impl Trove {
    pub fn new() -> Self {
        Self {
            status: TroveStatus::NonExistent,
            array_index: 0,
            collateral: TokenAmounts::new(),
            debt: TokenAmounts::new(),
            stakes: TokenAmounts::new(),
            reward_snapshots: HashMap::new(),
        }
    }
}

/// Whether a registered token backs troves or is minted against them.
#[derive(ScryptoSbor, PartialEq, Eq, Clone, Copy, Debug)]
pub enum TokenKind {
    Collateral,
    Debt { is_stable: bool },
}

/// Ledger-wide configuration.
#[derive(ScryptoSbor, Clone, Debug, PartialEq, Eq)]
pub struct ProtocolParameters {
    /// Minimum collateral ratio of a single trove.
    pub mcr: Decimal,
    /// System collateral ratio below which recovery mode starts.
    pub ccr: Decimal,
    /// Stable debt added to every trove on opening and reserved to pay its liquidator.
    pub stable_gas_compensation: Decimal,
    /// Share of each collateral token paid to the liquidator.
    pub coll_gas_compensation_percentage: Decimal,
    /// Upper bound on the USD value of the collateral gas compensation of a single liquidation.
    pub max_coll_gas_compensation_usd: Decimal,
    /// Minimum USD value of a trove's debt without the gas compensation.
    pub min_net_debt_usd: Decimal,
    pub borrowing_fee_floor: Decimal,
    pub max_borrowing_fee: Decimal,
    pub redemption_fee_floor: Decimal,
    /// Weight of the redeemed supply fraction added to the base rate on every redemption.
    pub redemption_spike_k: Decimal,
    /// Half-life of the base rate decay.
    pub base_rate_half_life_minutes: Decimal,
    /// How far the sorted list may walk from a stale hint before giving up.
    pub max_hint_walk: u32,
}

impl Default for ProtocolParameters {
    fn default() -> Self {
        Self {
            mcr: dec!("1.1"),
            ccr: dec!("1.5"),
            stable_gas_compensation: dec!(200),
            coll_gas_compensation_percentage: dec!("0.005"),
            max_coll_gas_compensation_usd: dec!(10000),
            min_net_debt_usd: dec!(100),
            borrowing_fee_floor: dec!("0.005"),
            max_borrowing_fee: dec!("0.05"),
            redemption_fee_floor: dec!("0.005"),
            redemption_spike_k: dec!("0.5"),
            base_rate_half_life_minutes: dec!(720),
            max_hint_walk: 100,
        }
    }
}

/// Owner controlled kill switches. The engines reject with a dedicated error while a switch is set.
#[derive(ScryptoSbor, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FreezeSwitches {
    pub minting: bool,
    pub liquidation: bool,
    pub redemption: bool,
}

/// Caller-supplied neighbours for a sorted list insertion.
#[derive(ScryptoSbor, Clone, Debug, Default)]
pub struct InsertHints {
    pub upper_hint: Option<TroveId>,
    pub lower_hint: Option<TroveId>,
}

impl InsertHints {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(upper_hint: Option<TroveId>, lower_hint: Option<TroveId>) -> Self {
        Self { upper_hint, lower_hint }
    }
}

/// Result of `check_recovery_mode`.
#[derive(ScryptoSbor, Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecoveryModeCheck {
    pub in_recovery_mode: bool,
    pub tcr: Decimal,
    pub total_coll_usd: Decimal,
    pub total_debt_usd: Decimal,
}

/// Read-only view of a trove, including pending rewards.
#[derive(ScryptoSbor, Clone, Debug)]
pub struct TroveInfoReturn {
    pub trove_id: TroveId,
    pub status: TroveStatus,
    pub collateral: Vec<(ResourceAddress, Decimal)>,
    pub debt: Vec<(ResourceAddress, Decimal)>,
    pub pending_collateral: Vec<(ResourceAddress, Decimal)>,
    pub pending_debt: Vec<(ResourceAddress, Decimal)>,
    pub stakes: Vec<(ResourceAddress, Decimal)>,
    pub icr: Decimal,
}

/// Borrower badge NFT data. One badge identifies one trove.
#[derive(ScryptoSbor, NonFungibleData, Clone, Debug)]
pub struct BorrowerBadge {
    /// Image of the NFT
    #[mutable]
    pub key_image_url: Url,
    /// When the badge was minted.
    pub created_at: Instant,
}
