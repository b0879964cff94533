use scrypto::prelude::*;
use trove_protocol::errors::*;
use trove_protocol::fees::*;

const START_SECONDS: i64 = 1_700_000_000;

fn half_life() -> Decimal {
    dec!(720)
}

fn at_minute(minute: i64) -> Instant {
    Instant::new(START_SECONDS + minute * 60)
}

fn base_rate(rate: Decimal) -> BaseRate {
    BaseRate {
        rate,
        last_fee_operation_time: at_minute(0),
    }
}

#[test]
fn test_base_rate_halves_after_half_life() {
    let rate = base_rate(dec!("0.5"));

    let decayed = rate.decayed(at_minute(720), half_life()).unwrap();
    assert!((decayed - dec!("0.25")).checked_abs().unwrap() < dec!("0.000001"));

    let decayed = rate.decayed(at_minute(1440), half_life()).unwrap();
    assert!((decayed - dec!("0.125")).checked_abs().unwrap() < dec!("0.000001"));
}

#[test]
fn test_decay_only_counts_whole_minutes() {
    let mut rate = base_rate(dec!("0.5"));

    let almost_a_minute = Instant::new(START_SECONDS + 59);
    assert_eq!(rate.decayed(almost_a_minute, half_life()).unwrap(), dec!("0.5"));
    rate.decay(almost_a_minute, half_life()).unwrap();
    assert_eq!(rate.last_fee_operation_time, at_minute(0));

    rate.decay(Instant::new(START_SECONDS + 150), half_life()).unwrap();
    assert_eq!(rate.last_fee_operation_time, Instant::new(START_SECONDS + 120));
    assert!(rate.rate < dec!("0.5"));
}

#[test]
fn test_redemption_pushes_base_rate_up_to_cap() {
    let mut rate = base_rate(Decimal::ZERO);

    let new_rate = rate
        .update_from_redemption(at_minute(0), half_life(), dec!("0.1"), dec!("0.5"))
        .unwrap();
    assert_eq!(new_rate, dec!("0.05"));
    assert_eq!(rate.redemption_rate(dec!("0.005")), dec!("0.055"));

    let new_rate = rate
        .update_from_redemption(at_minute(0), half_life(), dec!(4), dec!("0.5"))
        .unwrap();
    assert_eq!(new_rate, Decimal::ONE);
    assert_eq!(rate.redemption_rate(dec!("0.005")), Decimal::ONE);
}

#[test]
fn test_borrowing_rate_is_capped() {
    let now = at_minute(0);

    assert_eq!(
        base_rate(Decimal::ZERO)
            .borrowing_rate(now, dec!("0.005"), dec!("0.05"), half_life())
            .unwrap(),
        dec!("0.005")
    );
    assert_eq!(
        base_rate(dec!("0.02"))
            .borrowing_rate(now, dec!("0.005"), dec!("0.05"), half_life())
            .unwrap(),
        dec!("0.025")
    );
    assert_eq!(
        base_rate(dec!("0.2"))
            .borrowing_rate(now, dec!("0.005"), dec!("0.05"), half_life())
            .unwrap(),
        dec!("0.05")
    );
}

#[test]
fn test_max_fee_bounds() {
    let floor = dec!("0.005");

    assert!(require_valid_max_fee(floor, floor).is_ok());
    assert!(require_valid_max_fee(Decimal::ONE, floor).is_ok());
    assert_eq!(
        require_valid_max_fee(dec!("0.004"), floor),
        Err(LedgerError::MaxFeeOutOfRange)
    );
    assert_eq!(
        require_valid_max_fee(dec!("1.01"), floor),
        Err(LedgerError::MaxFeeOutOfRange)
    );

    assert!(require_user_accepts_fee(dec!("0.05"), dec!("0.05")).is_ok());
    assert_eq!(
        require_user_accepts_fee(dec!("0.06"), dec!("0.05")),
        Err(LedgerError::FeeExceedsMaximum {
            fee_rate: dec!("0.06"),
            max_fee: dec!("0.05"),
        })
    );
}
