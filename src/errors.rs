//! # Ledger errors
//!
//! Every fallible ledger operation returns a [`LedgerError`]. The variants fall into four groups,
//! reported by [`LedgerError::kind`]:
//!
//! - **Precondition**: the caller asked for something invalid (zero amount, bad hint, unknown trove).
//! - **Solvency**: the operation would leave a trove or the system below a collateral threshold.
//! - **Frozen**: a freeze switch is set. The action is allowed again once the owner lifts it.
//! - **Forbidden**: the protocol never allows the action, e.g. depositing an unregistered token.
//! - **Fatal**: internal bookkeeping is inconsistent. These should never surface.
//!
//! A failed operation leaves the ledger untouched. The `TroveManager` blueprint turns an error into a
//! panic so the surrounding transaction is rolled back as well.

use scrypto::prelude::*;
use thiserror::Error;

/// Broad classification of a [`LedgerError`].
#[derive(ScryptoSbor, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Precondition,
    Solvency,
    Frozen,
    Forbidden,
    Fatal,
}

#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Amount must be greater than zero")]
    ZeroAmount,
    #[error("Token {0:?} is not registered with the ledger")]
    UnknownToken(ResourceAddress),
    #[error("Token {0:?} is already registered")]
    TokenAlreadyRegistered(ResourceAddress),
    #[error("Token {0:?} is not a collateral token")]
    NotCollateral(ResourceAddress),
    #[error("Token {0:?} is not a debt token")]
    NotDebtToken(ResourceAddress),
    #[error("Token {0:?} appears more than once")]
    DuplicateToken(ResourceAddress),
    #[error("No stable debt token has been registered")]
    NoStableToken,
    #[error("Insufficient balance of {token:?}: requested {requested}, available {available}")]
    InsufficientBalance {
        token: ResourceAddress,
        requested: Decimal,
        available: Decimal,
    },
    #[error("Trove {0:?} does not exist or is not active")]
    TroveNotActive(NonFungibleLocalId),
    #[error("Trove {0:?} is already active")]
    TroveAlreadyActive(NonFungibleLocalId),
    #[error("A trove needs at least one collateral deposit")]
    EmptyCollateral,
    #[error("Trove adjustment changes nothing")]
    EmptyAdjustment,
    #[error("Cannot withdraw collateral and add the same collateral in one adjustment")]
    ConflictingAdjustment,
    #[error("Repayment would eat into the reserved gas compensation")]
    RepaysGasCompensation,
    #[error("No price available for {0:?}")]
    PriceUnavailable(ResourceAddress),
    #[error("Price of {0:?} is not trusted, debt cannot be increased")]
    UntrustedPrice(ResourceAddress),
    #[error("Max fee percentage must be between the fee floor and 100%")]
    MaxFeeOutOfRange,
    #[error("Fee {fee_rate} exceeds the accepted max fee {max_fee}")]
    FeeExceedsMaximum { fee_rate: Decimal, max_fee: Decimal },
    #[error("Insert hint is stale and the correct position is out of reach")]
    StaleInsertHint,
    #[error("Trove {0:?} is already in the sorted list")]
    AlreadyInList(NonFungibleLocalId),
    #[error("Trove {0:?} is not in the sorted list")]
    NotInList(NonFungibleLocalId),
    #[error("Redemption hint {0:?} is unknown")]
    HintUnknown(NonFungibleLocalId),
    #[error("Redemption hint points to a trove that cannot be redeemed")]
    InvalidRedemptionHint,
    #[error("Redemption hint is not the lowest redeemable trove")]
    InvalidHintLowerCRExists,
    #[error("Requested redemption exceeds the total outstanding debt")]
    ExceedsTotalDebt,
    #[error("Unable to redeem any amount")]
    UnableToRedeemAnyAmount,
    #[error("Trove list to liquidate is empty")]
    EmptyTroveArray,
    #[error("Nothing to claim")]
    NothingToClaim,
    #[error("Caller is not allowed to touch the storage pool")]
    Unauthorized,

    #[error("Net debt {net_debt} is below the minimum {minimum}")]
    NetDebtTooSmall { net_debt: Decimal, minimum: Decimal },
    #[error("ICR {icr} is below the minimum collateral ratio")]
    IcrBelowMcr { icr: Decimal },
    #[error("ICR {icr} is below the critical collateral ratio in recovery mode")]
    IcrBelowCcr { icr: Decimal },
    #[error("Operation would push the system into recovery mode")]
    TcrBelowCcr,
    #[error("Cannot redeem while TCR is below MCR")]
    TcrBelowMcr,
    #[error("Debt increase in recovery mode must not lower the ICR")]
    IcrDecreasedInRecoveryMode,
    #[error("Collateral withdrawal is not allowed in recovery mode")]
    CollateralWithdrawalInRecoveryMode,
    #[error("Troves cannot be closed in recovery mode")]
    CloseInRecoveryMode,
    #[error("Nothing to liquidate")]
    NoLiquidatableTrove,
    #[error("Only one trove left in the system")]
    OnlyOneTroveInSystem,

    #[error("Minting is frozen")]
    MintingFrozen,
    #[error("Liquidations are frozen")]
    LiquidationFrozen,
    #[error("Redemptions are frozen")]
    RedemptionFrozen,

    #[error("Storage pool balance of {0:?} would go negative")]
    PoolUnderflow(ResourceAddress),
    #[error("Owner array index of trove {0:?} is inconsistent")]
    ArrayIndexMismatch(NonFungibleLocalId),
    #[error("Sorted list links are inconsistent around trove {0:?}")]
    CorruptList(NonFungibleLocalId),
    #[error("Arithmetic overflow")]
    Overflow,
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::NetDebtTooSmall { .. }
            | LedgerError::IcrBelowMcr { .. }
            | LedgerError::IcrBelowCcr { .. }
            | LedgerError::TcrBelowCcr
            | LedgerError::TcrBelowMcr
            | LedgerError::IcrDecreasedInRecoveryMode
            | LedgerError::CollateralWithdrawalInRecoveryMode
            | LedgerError::CloseInRecoveryMode
            | LedgerError::NoLiquidatableTrove
            | LedgerError::OnlyOneTroveInSystem => ErrorKind::Solvency,
            LedgerError::MintingFrozen
            | LedgerError::LiquidationFrozen
            | LedgerError::RedemptionFrozen => ErrorKind::Frozen,
            LedgerError::NotCollateral(_) | LedgerError::NotDebtToken(_) => ErrorKind::Forbidden,
            LedgerError::PoolUnderflow(_)
            | LedgerError::ArrayIndexMismatch(_)
            | LedgerError::CorruptList(_)
            | LedgerError::Overflow => ErrorKind::Fatal,
            _ => ErrorKind::Precondition,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Fatal
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
