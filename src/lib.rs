//! # Trove Protocol Crate
//!
//! This crate contains a multi-collateral, multi-debt borrowing protocol. Users lock one or more collateral
//! tokens in a trove and mint one or more debt tokens against it, one of which is the stable token. Undercollateralized
//! troves are liquidated by redistributing their collateral and debt over all other troves, and the stable token
//! can always be redeemed for collateral, riskiest troves first.
//!
//! ## Modules
//!
//! The crate is organized into the following modules:
//!
//! - `trove_manager`: Defines the `TroveManager` blueprint. It owns the vaults and resource managers, fetches prices
//!   from the oracle and moves tokens according to what the ledger decides.
//! - `ledger`: The `TroveLedger`, all bookkeeping of the protocol, independent of vaults and buckets so it can be
//!   exercised natively. The engines extend it in `borrower_operations`, `liquidations`, `redemptions` and
//!   `hint_helpers`.
//! - `trove_store`, `sorted_troves`, `reward_accumulator`, `storage_pool`, `surplus_pool` and `fees`: the parts the
//!   ledger is built from.
//! - `storage`: The `LedgerStore` tables that hold all per-trove state, backed by `KeyValueStore`s on ledger, and
//!   the `StagedStore` that makes every ledger operation all-or-nothing.
//! - `price_feed`: The `PriceFeed` trait through which every USD valuation goes.
//! - `token_amounts`: A small ordered map of token amounts used everywhere a trove holds several tokens.
//! - `errors`: The `LedgerError` enum returned by every ledger operation.
//! - `events`: Defines the events emitted by the `TroveManager`, allowing off-ledger services to track state changes.
//! - `shared_structs`: Data structures shared across the crate, such as `Trove`, `TroveStatus` and
//!   `ProtocolParameters`.

pub mod borrower_operations;
pub mod errors;
pub mod events;
pub mod fees;
pub mod hint_helpers;
pub mod ledger;
pub mod liquidations;
pub mod price_feed;
pub mod redemptions;
pub mod reward_accumulator;
pub mod shared_structs;
pub mod sorted_troves;
pub mod storage;
pub mod storage_pool;
pub mod surplus_pool;
pub mod token_amounts;
pub mod trove_manager;
pub mod trove_store;
