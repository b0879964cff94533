use fixtures::*;

use scrypto::prelude::*;
use std::cell::Cell;
use trove_protocol::errors::*;
use trove_protocol::ledger::TroveLedger;
use trove_protocol::price_feed::{PriceFeed, PriceQuote, PriceTable};
use trove_protocol::redemptions::RedemptionHints;
use trove_protocol::shared_structs::*;
use trove_protocol::storage::{LedgerStore, MemoryStore, StagedStore};

/// Answers the first `lookups` price requests from a table, then reports every price as unavailable.
struct FailingAfter<'a> {
    prices: &'a PriceTable,
    lookups: Cell<u32>,
}

impl<'a> FailingAfter<'a> {
    fn new(prices: &'a PriceTable, lookups: u32) -> Self {
        Self {
            prices,
            lookups: Cell::new(lookups),
        }
    }
}

impl PriceFeed for FailingAfter<'_> {
    fn get_price(&self, token: ResourceAddress) -> LedgerResult<PriceQuote> {
        let left = self.lookups.get();
        if left == 0 {
            return Err(LedgerError::PriceUnavailable(token));
        }
        self.lookups.set(left - 1);
        self.prices.get_price(token)
    }
}

/// Runs `operation` on copies of `ledger` whose price feed gives out after 0, 1, 2, ... lookups, until a run
/// succeeds. Every failed run has to leave its copy equal to `ledger`. Returns the number of failed runs.
fn fails_cleanly_at_every_lookup<T>(
    ledger: &TroveLedger<MemoryStore>,
    prices: &PriceTable,
    operation: impl Fn(&mut TroveLedger<MemoryStore>, &FailingAfter<'_>) -> LedgerResult<T>,
) -> u32 {
    for lookups in 0..10_000u32 {
        let mut copy = ledger.clone();
        let feed = FailingAfter::new(prices, lookups);
        match operation(&mut copy, &feed) {
            Ok(_) => {
                assert_ne!(&copy, ledger);
                assert!(!copy.store().has_staged_writes());
                return lookups;
            }
            Err(error) => {
                assert!(matches!(error, LedgerError::PriceUnavailable(_)), "{error:?}");
                assert_eq!(&copy, ledger, "ledger changed after failing at lookup {lookups}");
            }
        }
    }
    panic!("operation never succeeded");
}

/// Trove 1 is safe; troves 2 and 3 are both below MCR at BTC 16000.
fn two_liquidatable_troves() -> Fixture {
    let mut fixture = Fixture::new();
    let btc = fixture.btc;
    fixture.open(1, btc, dec!(1), dec!(1000)).unwrap();
    fixture.open(2, btc, dec!("0.02"), dec!(100)).unwrap();
    fixture.open(3, btc, dec!("0.02"), dec!(100)).unwrap();
    fixture.set_price(btc, dec!(16000));
    fixture
}

#[test]
fn test_failed_batch_liquidation_leaves_ledger_untouched() {
    let mut fixture = two_liquidatable_troves();

    let first_only = fails_cleanly_at_every_lookup(&fixture.ledger, &fixture.prices, |ledger, prices| {
        ledger.batch_liquidate_troves(&[id(2)], prices)
    });
    let both = fails_cleanly_at_every_lookup(&fixture.ledger, &fixture.prices, |ledger, prices| {
        ledger.batch_liquidate_troves(&[id(2), id(3)], prices)
    });
    // some runs gave out while liquidating trove 3, after trove 2 had already been liquidated
    assert!(both > first_only);

    let totals = fixture
        .ledger
        .batch_liquidate_troves(&[id(2), id(3)], &fixture.prices)
        .unwrap();
    assert_eq!(totals.liquidated_troves(), vec![id(2), id(3)]);
    assert_eq!(fixture.sorted_ids(), vec![id(1)]);
}

#[test]
fn test_failed_redemption_leaves_ledger_untouched() {
    let mut fixture = Fixture::new();
    let btc = fixture.btc;
    let stable = fixture.stable;
    fixture.open(1, btc, dec!(1), dec!(1000)).unwrap();
    fixture.open(2, btc, dec!("0.1"), dec!(1000)).unwrap();
    fixture.open(3, btc, dec!("0.05"), dec!(500)).unwrap();

    let found = fixture
        .ledger
        .get_redemption_hints(dec!(600), 0, &fixture.prices)
        .unwrap();
    let hints = RedemptionHints {
        first_redemption_hint: found.first_redemption_hint,
        partial_redemption_hint_icr: found.partial_redemption_hint_icr,
        ..Default::default()
    };
    let now = fixture.now;

    let failed_runs = fails_cleanly_at_every_lookup(&fixture.ledger, &fixture.prices, |ledger, prices| {
        ledger.redeem_collateral(dec!(600), Decimal::ONE, &hints, 0, prices, now)
    });
    assert!(failed_runs > 0);

    let outcome = fixture.redeem(dec!(600), &hints).unwrap();
    assert_eq!(outcome.redeemed_troves.len(), 2);
    assert_eq!(fixture.status(3), TroveStatus::ClosedByRedemption);
    assert_eq!(fixture.ledger.trove(&id(2)).unwrap().debt.get(&stable), dec!("1107.5"));
}

#[test]
fn test_failed_adjustment_leaves_ledger_untouched() {
    let mut fixture = Fixture::new();
    let btc = fixture.btc;
    let stable = fixture.stable;
    fixture.open(1, btc, dec!(1), dec!(1000)).unwrap();
    fixture.open(2, btc, dec!("0.02"), dec!(100)).unwrap();
    fixture.open(3, btc, dec!(1), dec!(2000)).unwrap();
    fixture.set_price(btc, dec!(16000));
    fixture.liquidate(2).unwrap();
    let (pending_collateral, _) = fixture.ledger.pending_rewards(&id(1)).unwrap();
    assert!(pending_collateral.get(&btc).is_positive());
    let now = fixture.now;

    let failed_runs = fails_cleanly_at_every_lookup(&fixture.ledger, &fixture.prices, |ledger, prices| {
        ledger.increase_debt(
            &id(1),
            amounts(vec![(stable, dec!(100))]),
            dec!("0.05"),
            &InsertHints::none(),
            prices,
            now,
        )
    });
    assert!(failed_runs > 0);

    fixture
        .ledger
        .increase_debt(
            &id(1),
            amounts(vec![(stable, dec!(100))]),
            dec!("0.05"),
            &InsertHints::none(),
            &fixture.prices,
            now,
        )
        .unwrap();
    assert!(fixture.ledger.pending_rewards(&id(1)).unwrap().0.is_empty());
    assert!(fixture.is_sorted_by_icr());
}

#[test]
fn test_staged_writes_reach_the_store_only_on_commit() {
    let mut staged = StagedStore::new(MemoryStore::new());

    staged.insert_owner(0, id(1));
    assert_eq!(staged.owner(0), Some(id(1)));
    assert_eq!(staged.inner().owner(0), None);

    staged.discard();
    assert_eq!(staged.owner(0), None);
    assert!(!staged.has_staged_writes());

    staged.insert_owner(0, id(1));
    staged.commit();
    assert_eq!(staged.inner().owner(0), Some(id(1)));

    staged.remove_owner(0);
    assert_eq!(staged.owner(0), None);
    assert_eq!(staged.inner().owner(0), Some(id(1)));

    staged.commit();
    assert_eq!(staged.inner().owner(0), None);
    assert!(!staged.has_staged_writes());
}

#[test]
fn test_frozen_and_forbidden_are_told_apart() {
    let mut fixture = Fixture::new();
    let btc = fixture.btc;
    let stable = fixture.stable;

    assert_eq!(LedgerError::MintingFrozen.kind(), ErrorKind::Frozen);
    assert_eq!(LedgerError::LiquidationFrozen.kind(), ErrorKind::Frozen);
    assert_eq!(LedgerError::RedemptionFrozen.kind(), ErrorKind::Frozen);
    assert_eq!(LedgerError::NotCollateral(stable).kind(), ErrorKind::Forbidden);
    assert_eq!(LedgerError::NotDebtToken(btc).kind(), ErrorKind::Forbidden);

    let error = fixture.open(1, stable, dec!(10000), dec!(1000)).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Forbidden);

    fixture.ledger.set_freeze_switches(FreezeSwitches {
        minting: true,
        ..Default::default()
    });
    let error = fixture.open(1, btc, dec!(1), dec!(1000)).unwrap_err();
    assert_eq!(error, LedgerError::MintingFrozen);
    assert_eq!(error.kind(), ErrorKind::Frozen);
}
