use fixtures::*;

use scrypto::prelude::*;
use trove_protocol::errors::*;
use trove_protocol::shared_structs::*;
use trove_protocol::storage_pool::PoolBucket;

#[test]
fn test_liquidate_below_mcr_redistributes_to_remaining_troves() {
    let mut fixture = Fixture::new();
    let (btc, stable) = (fixture.btc, fixture.stable);
    fixture.open(1, btc, dec!(1), dec!(1000)).unwrap();
    fixture.open(2, btc, dec!("0.02"), dec!(100)).unwrap();
    assert_eq!(fixture.ledger.rewards().total_stakes(&btc), dec!("1.02"));

    fixture.set_price(btc, dec!(16000));
    assert!(fixture.icr(2) < dec!("1.1"));

    let totals = fixture.liquidate(2).unwrap();

    assert_eq!(totals.liquidated_troves(), vec![id(2)]);
    assert!(!totals.recovery_mode_at_start);
    let outcome = &totals.outcomes[0];
    assert_eq!(outcome.mode, LiquidationMode::Normal);
    assert_eq!(outcome.coll_gas_compensation.get(&btc), dec!("0.0001"));
    assert_eq!(outcome.redistributed_collateral.get(&btc), dec!("0.0199"));
    assert_eq!(outcome.redistributed_debt.get(&stable), dec!("100.5"));
    assert_eq!(totals.stable_gas_compensation, dec!(200));
    assert_eq!(totals.gas_compensation_burned, Decimal::ZERO);

    assert_eq!(fixture.ledger.rewards().total_stakes(&btc), dec!(1));
    assert_eq!(fixture.ledger.pool().get_value(&stable, false, PoolBucket::Pending), dec!("100.5"));
    assert_eq!(fixture.ledger.pool().get_value(&btc, true, PoolBucket::Pending), dec!("0.0199"));
    assert_eq!(fixture.ledger.pool().get_value(&btc, true, PoolBucket::Active), dec!(1));
    assert_eq!(fixture.ledger.pool().gas_compensation(&stable), dec!(200));
    assert_eq!(
        fixture.status(2),
        TroveStatus::ClosedByLiquidation(LiquidationMode::Normal)
    );
    assert_eq!(fixture.sorted_ids(), vec![id(1)]);

    let (pending_collateral, pending_debt) = fixture.ledger.pending_rewards(&id(1)).unwrap();
    assert_eq!(pending_collateral, amounts(vec![(btc, dec!("0.0199"))]));
    assert_eq!(pending_debt, amounts(vec![(stable, dec!("100.5"))]));
}

#[test]
fn test_liquidate_below_100_percent_burns_gas_compensation() {
    let mut fixture = Fixture::new();
    let (btc, stable) = (fixture.btc, fixture.stable);
    fixture.open(1, btc, dec!(1), dec!(1000)).unwrap();
    fixture.open(2, btc, dec!("0.02"), dec!(100)).unwrap();

    fixture.set_price(btc, dec!(10000));
    let totals = fixture.liquidate(2).unwrap();

    let outcome = &totals.outcomes[0];
    assert!(outcome.coll_gas_compensation.is_empty());
    assert_eq!(outcome.redistributed_collateral.get(&btc), dec!("0.02"));
    assert_eq!(outcome.redistributed_debt.get(&stable), dec!("100.5"));
    assert_eq!(totals.stable_gas_compensation, Decimal::ZERO);
    assert_eq!(totals.gas_compensation_burned, dec!(200));
    assert_eq!(fixture.ledger.pool().gas_compensation(&stable), dec!(200));
}

#[test]
fn test_batch_liquidation_only_touches_undercollateralized_troves() {
    let mut fixture = Fixture::new();
    let btc = fixture.btc;
    fixture.open(1, btc, dec!(1), dec!(1000)).unwrap();
    fixture.open(2, btc, dec!(1), dec!(1000)).unwrap();
    fixture.open(3, btc, dec!("0.1"), dec!(1000)).unwrap();
    fixture.open(4, btc, dec!("0.02"), dec!(100)).unwrap();
    fixture.close(2).unwrap();

    fixture.set_price(btc, dec!(16000));
    let healthy_icr = fixture.icr(3);
    assert!(healthy_icr >= dec!("1.1"));

    let totals = fixture
        .ledger
        .batch_liquidate_troves(&[id(2), id(3), id(4)], &fixture.prices)
        .unwrap();

    assert_eq!(totals.liquidated_troves(), vec![id(4)]);
    assert_eq!(fixture.status(2), TroveStatus::ClosedByOwner);
    assert_eq!(fixture.status(3), TroveStatus::Active);
    assert_eq!(
        fixture.status(4),
        TroveStatus::ClosedByLiquidation(LiquidationMode::Normal)
    );
    assert_eq!(fixture.ledger.active_trove_count(), 2);
}

#[test]
fn test_batch_liquidation_without_liquidatable_troves_fails() {
    let mut fixture = Fixture::new();
    let btc = fixture.btc;
    fixture.open(1, btc, dec!(1), dec!(1000)).unwrap();
    fixture.open(2, btc, dec!(1), dec!(2000)).unwrap();

    assert_eq!(
        fixture
            .ledger
            .batch_liquidate_troves(&[id(1), id(2), id(3)], &fixture.prices)
            .unwrap_err(),
        LedgerError::NoLiquidatableTrove
    );
    assert_eq!(
        fixture
            .ledger
            .batch_liquidate_troves(&[], &fixture.prices)
            .unwrap_err(),
        LedgerError::EmptyTroveArray
    );
    assert_eq!(fixture.liquidate(3).unwrap_err(), LedgerError::TroveNotActive(id(3)));
}

#[test]
fn test_last_trove_cannot_be_liquidated() {
    let mut fixture = Fixture::new();
    let btc = fixture.btc;
    fixture.open(1, btc, dec!(1), dec!(1000)).unwrap();

    fixture.set_price(btc, dec!(1000));

    assert_eq!(fixture.liquidate(1).unwrap_err(), LedgerError::OnlyOneTroveInSystem);
    assert_eq!(
        fixture
            .ledger
            .batch_liquidate_troves(&[id(1)], &fixture.prices)
            .unwrap_err(),
        LedgerError::OnlyOneTroveInSystem
    );
    assert_eq!(fixture.status(1), TroveStatus::Active);
}

#[test]
fn test_liquidation_freeze() {
    let mut fixture = Fixture::new();
    let btc = fixture.btc;
    fixture.open(1, btc, dec!(1), dec!(1000)).unwrap();
    fixture.open(2, btc, dec!("0.02"), dec!(100)).unwrap();
    fixture.set_price(btc, dec!(16000));
    fixture.ledger.set_freeze_switches(FreezeSwitches {
        minting: false,
        liquidation: true,
        redemption: false,
    });

    assert_eq!(fixture.liquidate(2).unwrap_err(), LedgerError::LiquidationFrozen);
    assert_eq!(
        fixture
            .ledger
            .liquidate_troves(10, &fixture.prices)
            .unwrap_err(),
        LedgerError::LiquidationFrozen
    );
    assert_eq!(fixture.status(2), TroveStatus::Active);
}

#[test]
fn test_liquidate_troves_starts_at_the_tail() {
    let mut fixture = Fixture::new();
    let btc = fixture.btc;
    fixture.open(1, btc, dec!(1), dec!(1000)).unwrap();
    fixture.open(2, btc, dec!("0.02"), dec!(100)).unwrap();
    fixture.open(3, btc, dec!("0.025"), dec!(100)).unwrap();
    assert_eq!(fixture.sorted_ids(), vec![id(1), id(3), id(2)]);

    fixture.set_price(btc, dec!(12000));
    let totals = fixture.ledger.liquidate_troves(1, &fixture.prices).unwrap();

    assert_eq!(totals.liquidated_troves(), vec![id(2)]);
    assert_eq!(fixture.status(3), TroveStatus::Active);
    assert_eq!(fixture.sorted_ids(), vec![id(1), id(3)]);
}

#[test]
fn test_liquidate_troves_stops_at_first_healthy_trove() {
    let mut fixture = Fixture::new();
    let btc = fixture.btc;
    fixture.open(1, btc, dec!(1), dec!(1000)).unwrap();
    fixture.open(2, btc, dec!("0.02"), dec!(100)).unwrap();
    fixture.open(3, btc, dec!("0.025"), dec!(100)).unwrap();

    fixture.set_price(btc, dec!(12000));
    let totals = fixture.ledger.liquidate_troves(10, &fixture.prices).unwrap();

    assert_eq!(totals.liquidated_troves(), vec![id(2), id(3)]);
    assert_eq!(fixture.status(1), TroveStatus::Active);
    assert_eq!(fixture.sorted_ids(), vec![id(1)]);
    assert_eq!(fixture.ledger.rewards().total_stakes(&btc), dec!(1));

    assert_eq!(
        fixture
            .ledger
            .liquidate_troves(10, &fixture.prices)
            .unwrap_err(),
        LedgerError::NoLiquidatableTrove
    );
}

#[test]
fn test_recovery_mode_liquidation_leaves_surplus() {
    let mut fixture = Fixture::new();
    let btc = fixture.btc;
    fixture.open(1, btc, dec!(1), dec!(12000)).unwrap();
    fixture.open(2, btc, dec!(1), dec!(8000)).unwrap();

    fixture.set_price(btc, dec!(15000));
    let check = fixture.ledger.check_recovery_mode(&fixture.prices).unwrap();
    assert!(check.in_recovery_mode);
    let icr = fixture.icr(1);
    assert!(icr >= dec!("1.1") && icr < check.tcr);

    let totals = fixture.liquidate(1).unwrap();

    assert!(totals.recovery_mode_at_start);
    let outcome = &totals.outcomes[0];
    assert_eq!(outcome.mode, LiquidationMode::Recovery);
    let seized =
        outcome.redistributed_collateral.get(&btc) + outcome.coll_gas_compensation.get(&btc);
    let surplus = outcome.collateral_surplus.get(&btc);
    assert!(surplus.is_positive());
    assert_eq!(seized + surplus, dec!(1));
    assert_eq!(
        fixture.status(1),
        TroveStatus::ClosedByLiquidation(LiquidationMode::Recovery)
    );

    // surplus is held outside the pool buckets
    assert_eq!(fixture.ledger.claimable_collateral(&id(1)), outcome.collateral_surplus);
    assert_eq!(
        fixture.ledger.pool().get_total(&btc, true),
        dec!(2) - surplus - outcome.coll_gas_compensation.get(&btc)
    );

    let claimed = fixture.ledger.claim_collateral(&id(1)).unwrap();
    assert_eq!(claimed, outcome.collateral_surplus);
    assert!(fixture.ledger.surplus().total().is_empty());
    assert_eq!(
        fixture.ledger.claim_collateral(&id(1)).unwrap_err(),
        LedgerError::NothingToClaim
    );
}

#[test]
fn test_healthy_trove_above_tcr_is_not_liquidated_in_recovery_mode() {
    let mut fixture = Fixture::new();
    let btc = fixture.btc;
    fixture.open(1, btc, dec!(1), dec!(12000)).unwrap();
    fixture.open(2, btc, dec!(1), dec!(8000)).unwrap();

    fixture.set_price(btc, dec!(15000));

    assert_eq!(fixture.liquidate(2).unwrap_err(), LedgerError::NoLiquidatableTrove);
}

#[test]
fn test_liquidate_troves_reaches_riskiest_trove_after_a_price_drop() {
    let mut fixture = Fixture::opened_across_a_price_drop();
    let btc = fixture.btc;
    fixture.set_price(btc, dec!(13000));
    assert!(fixture.icr(2) < dec!("1.1"));
    assert!(fixture.icr(3) >= dec!("1.1"));

    let totals = fixture
        .ledger
        .liquidate_troves(10, &fixture.prices)
        .unwrap();

    assert_eq!(totals.liquidated_troves(), vec![id(2)]);
    assert!(!totals.recovery_mode_at_start);
    assert_eq!(fixture.status(3), TroveStatus::Active);
    assert_eq!(fixture.sorted_ids(), vec![id(1), id(3)]);
    assert!(fixture.is_sorted_by_icr());
}
