use fixtures::*;

use scrypto::prelude::*;
use trove_protocol::shared_structs::*;
use trove_protocol::storage_pool::PoolBucket;
use trove_protocol::token_amounts::TokenAmounts;

/// Opens two equal BTC troves and liquidates a third one below 100% ICR.
fn fixture_after_one_liquidation() -> Fixture {
    let mut fixture = Fixture::new();
    let btc = fixture.btc;
    fixture.open(1, btc, dec!(1), dec!(1000)).unwrap();
    fixture.open(2, btc, dec!(1), dec!(1000)).unwrap();
    fixture.open(3, btc, dec!("0.02"), dec!(100)).unwrap();

    fixture.set_price(btc, dec!(10000));
    fixture.liquidate(3).unwrap();
    fixture
}

#[test]
fn test_rewards_are_split_by_stake() {
    let fixture = fixture_after_one_liquidation();
    let (btc, stable) = (fixture.btc, fixture.stable);

    assert_eq!(fixture.ledger.rewards().l_value(&btc, &btc), dec!("0.01"));
    assert_eq!(fixture.ledger.rewards().l_value(&btc, &stable), dec!("50.25"));

    for trove in [1, 2] {
        let (pending_collateral, pending_debt) = fixture.ledger.pending_rewards(&id(trove)).unwrap();
        assert_eq!(pending_collateral, amounts(vec![(btc, dec!("0.01"))]));
        assert_eq!(pending_debt, amounts(vec![(stable, dec!("50.25"))]));
    }
}

#[test]
fn test_pool_matches_sum_of_entire_troves() {
    let fixture = fixture_after_one_liquidation();
    let (btc, stable) = (fixture.btc, fixture.stable);

    let mut collateral = TokenAmounts::new();
    let mut debt = TokenAmounts::new();
    for owner in fixture.ledger.owners() {
        let entire = fixture.ledger.entire_trove(&owner).unwrap();
        collateral.add_all(&entire.collateral);
        debt.add_all(&entire.debt);
    }

    assert_eq!(collateral.get(&btc), fixture.ledger.pool().get_total(&btc, true));
    assert_eq!(debt.get(&stable), fixture.ledger.pool().get_total(&stable, false));
    assert_eq!(debt.get(&stable), dec!("2510.5"));
}

#[test]
fn test_stakes_stay_consistent_with_total() {
    let mut fixture = fixture_after_one_liquidation();
    let btc = fixture.btc;
    assert_eq!(fixture.sum_of_stakes(&btc), fixture.ledger.rewards().total_stakes(&btc));

    // 1.01 BTC is worth exactly one stake after the 0.02 BTC redistribution
    let update = fixture.open(4, btc, dec!("1.01"), dec!(1000)).unwrap();
    assert_eq!(update.stakes.get(&btc), dec!(1));
    let (pending_collateral, pending_debt) = fixture.ledger.pending_rewards(&id(4)).unwrap();
    assert!(pending_collateral.is_empty());
    assert!(pending_debt.is_empty());

    fixture
        .ledger
        .add_collateral(
            &id(1),
            amounts(vec![(btc, dec!("0.1"))]),
            &InsertHints::none(),
            &fixture.prices,
            fixture.now,
        )
        .unwrap();

    assert_eq!(fixture.sum_of_stakes(&btc), fixture.ledger.rewards().total_stakes(&btc));
    assert_eq!(fixture.ledger.trove(&id(1)).unwrap().collateral.get(&btc), dec!("1.11"));
    assert_eq!(fixture.ledger.pool().get_value(&btc, true, PoolBucket::Pending), dec!("0.01"));
    let (pending_collateral, _) = fixture.ledger.pending_rewards(&id(1)).unwrap();
    assert!(pending_collateral.is_empty());
}

#[test]
fn test_pending_rewards_only_grow() {
    let mut fixture = fixture_after_one_liquidation();
    let (btc, stable) = (fixture.btc, fixture.stable);
    let (collateral_before, debt_before) = fixture.ledger.pending_rewards(&id(1)).unwrap();

    fixture.open(5, btc, dec!("0.04"), dec!(100)).unwrap();
    fixture.set_price(btc, dec!(7000));
    fixture.liquidate(5).unwrap();

    let (collateral_after, debt_after) = fixture.ledger.pending_rewards(&id(1)).unwrap();
    assert!(collateral_after.get(&btc) > collateral_before.get(&btc));
    assert!(debt_after.get(&stable) > debt_before.get(&stable));
}

#[test]
fn test_multi_collateral_liquidation_splits_debt_by_collateral_value() {
    let mut fixture = Fixture::new();
    let (btc, eth, stable) = (fixture.btc, fixture.eth, fixture.stable);
    fixture.open(1, btc, dec!(1), dec!(1000)).unwrap();
    fixture.open(2, eth, dec!(20), dec!(1000)).unwrap();
    fixture
        .open_with(
            3,
            vec![(btc, dec!("0.01")), (eth, dec!("0.2"))],
            vec![(stable, dec!(100))],
        )
        .unwrap();

    fixture.set_price(btc, dec!(10000));
    fixture.set_price(eth, dec!(750));
    fixture.liquidate(3).unwrap();

    // 40% of the collateral value was BTC, 60% ETH
    let (collateral, debt) = fixture.ledger.pending_rewards(&id(1)).unwrap();
    assert_eq!(collateral, amounts(vec![(btc, dec!("0.01"))]));
    assert_eq!(debt, amounts(vec![(stable, dec!("40.2"))]));

    let (collateral, debt) = fixture.ledger.pending_rewards(&id(2)).unwrap();
    assert_eq!(collateral, amounts(vec![(eth, dec!("0.2"))]));
    assert_eq!(debt, amounts(vec![(stable, dec!("60.3"))]));
}

#[test]
fn test_orphaned_collateral_goes_to_other_collateral_types() {
    let mut fixture = Fixture::new();
    let (btc, eth, stable) = (fixture.btc, fixture.eth, fixture.stable);
    fixture.open(1, btc, dec!(1), dec!(1000)).unwrap();
    fixture.open(2, btc, dec!(1), dec!(1000)).unwrap();
    fixture
        .open_with(
            3,
            vec![(btc, dec!("0.01")), (eth, dec!("0.2"))],
            vec![(stable, dec!(100))],
        )
        .unwrap();

    fixture.set_price(btc, dec!(10000));
    fixture.set_price(eth, dec!(750));
    fixture.liquidate(3).unwrap();

    assert_eq!(fixture.ledger.rewards().total_stakes(&eth), Decimal::ZERO);
    assert_eq!(fixture.ledger.rewards().l_value(&btc, &eth), dec!("0.1"));

    let (collateral, debt) = fixture.ledger.pending_rewards(&id(1)).unwrap();
    assert_eq!(collateral.get(&btc), dec!("0.005"));
    assert_eq!(collateral.get(&eth), dec!("0.1"));
    assert_eq!(debt.get(&stable), dec!("50.25"));

    // nobody holds ETH any more, so the next ETH trove starts over with stake = collateral
    let update = fixture.open(4, eth, dec!(1), dec!(100)).unwrap();
    assert_eq!(update.stakes.get(&eth), dec!(1));
    assert_eq!(fixture.ledger.rewards().total_stakes(&eth), dec!(1));
}
