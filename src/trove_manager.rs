//! # The Trove Manager Blueprint
//!
//! On-ledger home of the [`TroveLedger`]. The component holds all collateral in vaults, owns the resource
//! managers of the debt tokens and the borrower badge, and asks the oracle for prices once per call. All
//! bookkeeping is delegated to the ledger; this blueprint only moves tokens according to the outcomes it gets
//! back and emits events.
//!
//! ## Overview
//! - **Borrower badge:** anyone can mint one with `create_borrower_badge`. Its local id is the trove id; proving
//!   the badge is how an owner manages the trove.
//! - **Troves:** `open_trove`, `add_collateral`, `withdraw_collateral`, `increase_debt`, `repay_debt`,
//!   `close_trove` and `claim_collateral` for leftovers after a liquidation or redemption.
//! - **Liquidation:** anyone can liquidate unhealthy troves and receives the gas compensation.
//! - **Redemption:** anyone can swap stable tokens for collateral, riskiest troves first.
//! - **Owner:** registers tokens, sets freeze switches and parameters, collects fees and points to the oracle.
//!
//! A `LedgerError` panics with its message, which rolls the whole transaction back.

use crate::borrower_operations::TroveUpdate;
use crate::errors::*;
use crate::events::*;
use crate::ledger::TroveLedger;
use crate::liquidations::LiquidationTotals;
use crate::price_feed::{PriceQuote, PriceTable};
use crate::redemptions::RedemptionHints;
use crate::shared_structs::*;
use crate::storage::ComponentStore;
use crate::token_amounts::TokenAmounts;
use scrypto::prelude::*;

#[blueprint]
#[types(ResourceAddress, NonFungibleLocalId, Decimal, BorrowerBadge, ResourceManager)]
#[events(
    EventNewToken,
    EventTroveUpdated,
    EventTroveClosed,
    EventTroveLiquidated,
    EventBatchLiquidation,
    EventRedemption,
    EventCollateralClaimed,
    EventFreezeSwitchesChanged,
    EventBaseRateUpdated,
)]
mod trove_manager {
    enable_method_auth! {
        methods {
            create_borrower_badge => PUBLIC;
            open_trove => PUBLIC;
            add_collateral => PUBLIC;
            withdraw_collateral => PUBLIC;
            increase_debt => PUBLIC;
            repay_debt => PUBLIC;
            close_trove => PUBLIC;
            claim_collateral => PUBLIC;
            liquidate => PUBLIC;
            batch_liquidate_troves => PUBLIC;
            liquidate_troves => PUBLIC;
            redeem_collateral => PUBLIC;
            new_collateral => restrict_to: [OWNER];
            new_debt_token => restrict_to: [OWNER];
            set_freeze_switches => restrict_to: [OWNER];
            set_parameters => restrict_to: [OWNER];
            collect_fees => restrict_to: [OWNER];
            set_oracle => restrict_to: [OWNER];
            get_current_icr => PUBLIC;
            get_trove_info => PUBLIC;
            get_trove_coll => PUBLIC;
            get_trove_debt => PUBLIC;
            get_pending_rewards => PUBLIC;
            get_trove_status => PUBLIC;
            get_claimable_collateral => PUBLIC;
            check_recovery_mode => PUBLIC;
            get_approx_hint => PUBLIC;
            find_insert_position => PUBLIC;
            get_redemption_hints => PUBLIC;
            get_base_rate => PUBLIC;
            get_stable_token => PUBLIC;
        }
    }

    struct TroveManager {
        /// All protocol bookkeeping. Per-trove records, list nodes and surplus claims sit in the ledger's
        /// `KeyValueStore`s, so a call only loads the troves it touches.
        ledger: TroveLedger<ComponentStore>,
        /// Collateral of all troves and of the surplus pool, per collateral token.
        collateral_vaults: KeyValueStore<ResourceAddress, Vault>,
        /// Borrowing fees (debt tokens) and redemption fees (collateral) waiting to be collected.
        fee_vaults: KeyValueStore<ResourceAddress, Vault>,
        /// Stable tokens minted as gas compensation for open troves.
        gas_compensation_vault: Vault,
        /// Resource managers of the debt tokens this component mints and burns.
        debt_managers: KeyValueStore<ResourceAddress, ResourceManager>,
        /// The `ResourceManager` of the borrower badge NFT.
        badge_manager: ResourceManager,
        /// A counter to generate unique ids for borrower badges.
        badge_counter: u64,
        /// Address of this component, used in the access rules of debt tokens created later.
        component_address: ComponentAddress,
        /// The controller badge, owner of the component and of every debt token.
        controller_badge: ResourceAddress,
        /// Global reference to the price oracle component.
        oracle: Global<AnyComponent>,
        /// The oracle method returning `(price, is_trusted, is_secondary)` for a token.
        oracle_method_name: String,
    }

    impl TroveManager {
        /// Instantiates the component, creates the stable debt token and the borrower badge.
        ///
        /// # Returns
        /// * `Global<TroveManager>`: the new component.
        /// * `Bucket`: the controller badge, which is the owner role of the component.
        /// * `ResourceAddress`: the stable token.
        /// * `ResourceAddress`: the borrower badge.
        pub fn instantiate(
            oracle_address: ComponentAddress,
            parameters: Option<ProtocolParameters>,
        ) -> (Global<TroveManager>, Bucket, ResourceAddress, ResourceAddress) {
            let (address_reservation, component_address) =
                Runtime::allocate_component_address(TroveManager::blueprint_id());

            let controller_role: Bucket = ResourceBuilder::new_fungible(OwnerRole::Fixed(rule!(
                require(global_caller(component_address))
            )))
            .divisibility(DIVISIBILITY_NONE)
            .metadata(metadata! (
                init {
                    "name" => "controller badge trove protocol", locked;
                    "symbol" => "troveCTRL", locked;
                }
            ))
            .mint_initial_supply(1)
            .into();

            let stable_manager = Self::create_debt_token(
                component_address,
                controller_role.resource_address(),
                "Trove USD".to_string(),
                "tUSD".to_string(),
            );

            let badge_manager: ResourceManager =
                ResourceBuilder::new_integer_non_fungible_with_registered_type::<BorrowerBadge>(
                    OwnerRole::Fixed(rule!(require(controller_role.resource_address()))),
                )
                .metadata(metadata!(
                    init {
                        "name" => "Trove Borrower Badge", locked;
                        "symbol" => "troveBDG", locked;
                        "description" => "Identifies a trove and proves its ownership.", locked;
                    }
                ))
                .mint_roles(mint_roles!(
                    minter => rule!(require(global_caller(component_address)));
                    minter_updater => rule!(deny_all);
                ))
                .create_with_no_initial_supply()
                .into();

            let stable_address = stable_manager.address();
            let mut ledger = TroveLedger::with_store(
                parameters.unwrap_or_default(),
                Clock::current_time_rounded_to_seconds(),
                ComponentStore::new(),
            );
            Self::ok(ledger.register_debt_token(stable_address, true));

            let debt_managers = KeyValueStore::new_with_registered_type();
            debt_managers.insert(stable_address, stable_manager);
            let fee_vaults = KeyValueStore::new();
            fee_vaults.insert(stable_address, Vault::new(stable_address));

            let trove_manager = Self {
                ledger,
                collateral_vaults: KeyValueStore::new(),
                fee_vaults,
                gas_compensation_vault: Vault::new(stable_address),
                debt_managers,
                badge_manager,
                badge_counter: 0,
                component_address,
                controller_badge: controller_role.resource_address(),
                oracle: Global::from(oracle_address),
                oracle_method_name: "get_price".to_string(),
            }
            .instantiate()
            .prepare_to_globalize(OwnerRole::Fixed(rule!(require(
                controller_role.resource_address()
            ))))
            .with_address(address_reservation)
            .metadata(metadata! {
                init {
                    "name" => "Trove Protocol Trove Manager".to_string(), updatable;
                    "description" => "Multi-collateral, multi-debt troves".to_string(), updatable;
                }
            })
            .globalize();

            Runtime::emit_event(EventNewToken {
                address: stable_address,
                kind: TokenKind::Debt { is_stable: true },
            });

            (
                trove_manager,
                controller_role,
                stable_address,
                badge_manager.address(),
            )
        }

        /// Mints a borrower badge. Its local id identifies the trove opened with it.
        pub fn create_borrower_badge(&mut self) -> Bucket {
            self.badge_counter += 1;
            self.badge_manager.mint_non_fungible(
                &NonFungibleLocalId::integer(self.badge_counter),
                BorrowerBadge {
                    key_image_url: Url::of("https://trove.protocol/badge.png"),
                    created_at: Clock::current_time_rounded_to_seconds(),
                },
            )
        }

        /// Opens a trove for the proven badge. Returns the minted debt tokens.
        ///
        /// Every debt token minted is charged the borrowing fee on top, and the stable gas compensation is added
        /// to the stable debt.
        pub fn open_trove(
            &mut self,
            badge_proof: NonFungibleProof,
            collateral: Vec<Bucket>,
            debts: Vec<(ResourceAddress, Decimal)>,
            max_fee_percentage: Decimal,
            upper_hint: Option<NonFungibleLocalId>,
            lower_hint: Option<NonFungibleLocalId>,
        ) -> Vec<Bucket> {
            let trove_id = self.trove_id(badge_proof);
            let deposits = self.deposit_collateral(collateral);
            let debts = Self::ok(TokenAmounts::from_pairs(debts));
            let prices = self.fetch_prices();

            let update = Self::ok(self.ledger.open_trove(
                &trove_id,
                deposits,
                debts.clone(),
                max_fee_percentage,
                &InsertHints::new(upper_hint, lower_hint),
                &prices,
                Clock::current_time_rounded_to_seconds(),
            ));

            let stable = self.stable_token();
            let gas_compensation = self.mint(stable, update.gas_compensation);
            self.gas_compensation_vault.put(gas_compensation);
            self.mint_fees(&update.borrowing_fees);

            Runtime::emit_event(EventTroveUpdated {
                trove_id,
                opened: true,
                collateral: update.collateral.to_vec(),
                debt: update.debt.to_vec(),
                stakes: update.stakes.to_vec(),
                icr: update.icr,
                borrowing_fees: update.borrowing_fees.to_vec(),
            });
            self.emit_base_rate();

            debts
                .iter()
                .map(|(token, amount)| self.mint(*token, *amount))
                .collect()
        }

        pub fn add_collateral(
            &mut self,
            badge_proof: NonFungibleProof,
            collateral: Vec<Bucket>,
            upper_hint: Option<NonFungibleLocalId>,
            lower_hint: Option<NonFungibleLocalId>,
        ) {
            let trove_id = self.trove_id(badge_proof);
            let deposits = self.deposit_collateral(collateral);
            let prices = self.fetch_prices();
            let update = Self::ok(self.ledger.add_collateral(
                &trove_id,
                deposits,
                &InsertHints::new(upper_hint, lower_hint),
                &prices,
                Clock::current_time_rounded_to_seconds(),
            ));
            self.settle_update(update);
        }

        pub fn withdraw_collateral(
            &mut self,
            badge_proof: NonFungibleProof,
            withdrawals: Vec<(ResourceAddress, Decimal)>,
            upper_hint: Option<NonFungibleLocalId>,
            lower_hint: Option<NonFungibleLocalId>,
        ) -> Vec<Bucket> {
            let trove_id = self.trove_id(badge_proof);
            let withdrawals = Self::ok(TokenAmounts::from_pairs(withdrawals));
            let prices = self.fetch_prices();
            let update = Self::ok(self.ledger.withdraw_collateral(
                &trove_id,
                withdrawals.clone(),
                &InsertHints::new(upper_hint, lower_hint),
                &prices,
                Clock::current_time_rounded_to_seconds(),
            ));
            self.settle_update(update);
            self.take_collateral(&withdrawals)
        }

        pub fn increase_debt(
            &mut self,
            badge_proof: NonFungibleProof,
            debts: Vec<(ResourceAddress, Decimal)>,
            max_fee_percentage: Decimal,
            upper_hint: Option<NonFungibleLocalId>,
            lower_hint: Option<NonFungibleLocalId>,
        ) -> Vec<Bucket> {
            let trove_id = self.trove_id(badge_proof);
            let debts = Self::ok(TokenAmounts::from_pairs(debts));
            let prices = self.fetch_prices();
            let update = Self::ok(self.ledger.increase_debt(
                &trove_id,
                debts.clone(),
                max_fee_percentage,
                &InsertHints::new(upper_hint, lower_hint),
                &prices,
                Clock::current_time_rounded_to_seconds(),
            ));
            self.settle_update(update);
            debts
                .iter()
                .map(|(token, amount)| self.mint(*token, *amount))
                .collect()
        }

        /// Burns the repayment buckets against the trove's debt.
        pub fn repay_debt(
            &mut self,
            badge_proof: NonFungibleProof,
            repayments: Vec<Bucket>,
            upper_hint: Option<NonFungibleLocalId>,
            lower_hint: Option<NonFungibleLocalId>,
        ) {
            let trove_id = self.trove_id(badge_proof);
            let amounts = Self::ok(TokenAmounts::from_pairs(
                repayments
                    .iter()
                    .map(|bucket| (bucket.resource_address(), bucket.amount()))
                    .collect(),
            ));
            let prices = self.fetch_prices();
            let update = Self::ok(self.ledger.repay_debt(
                &trove_id,
                amounts,
                &InsertHints::new(upper_hint, lower_hint),
                &prices,
                Clock::current_time_rounded_to_seconds(),
            ));
            self.settle_update(update);
            for bucket in repayments {
                bucket.burn();
            }
        }

        /// Closes the trove. `repayment` must cover all debt except the gas compensation. Returns the collateral
        /// and whatever is left of the repayment.
        pub fn close_trove(&mut self, badge_proof: NonFungibleProof, repayment: Vec<Bucket>) -> Vec<Bucket> {
            let trove_id = self.trove_id(badge_proof);
            let prices = self.fetch_prices();
            let closure = Self::ok(self.ledger.close_trove(&trove_id, &prices));

            let mut repayment = repayment;
            for (token, amount) in closure.debt_to_repay.iter() {
                let bucket = repayment
                    .iter_mut()
                    .find(|bucket| bucket.resource_address() == *token)
                    .expect("Repayment is missing a debt token");
                assert!(bucket.amount() >= *amount, "Repayment does not cover the debt");
                bucket.take(*amount).burn();
            }
            self.gas_compensation_vault
                .take(closure.gas_compensation_burned)
                .burn();

            Runtime::emit_event(EventTroveClosed {
                trove_id,
                status: TroveStatus::ClosedByOwner,
            });

            let mut payout = self.take_collateral(&closure.collateral);
            payout.extend(repayment.into_iter().filter(|bucket| !bucket.is_empty()));
            payout
        }

        /// Claims collateral left in the surplus pool after a liquidation or redemption.
        pub fn claim_collateral(&mut self, badge_proof: NonFungibleProof) -> Vec<Bucket> {
            let trove_id = self.trove_id(badge_proof);
            let claimed = Self::ok(self.ledger.claim_collateral(&trove_id));
            Runtime::emit_event(EventCollateralClaimed {
                trove_id,
                collateral: claimed.to_vec(),
            });
            self.take_collateral(&claimed)
        }

        /// Liquidates a single trove. Returns the gas compensation for the caller.
        pub fn liquidate(&mut self, trove_id: NonFungibleLocalId) -> Vec<Bucket> {
            let prices = self.fetch_prices();
            let totals = Self::ok(self.ledger.liquidate(&trove_id, &prices));
            self.settle_liquidation(totals)
        }

        pub fn batch_liquidate_troves(&mut self, trove_ids: Vec<NonFungibleLocalId>) -> Vec<Bucket> {
            let prices = self.fetch_prices();
            let totals = Self::ok(self.ledger.batch_liquidate_troves(&trove_ids, &prices));
            self.settle_liquidation(totals)
        }

        /// Liquidates up to `n` troves from the risky end of the sorted list.
        pub fn liquidate_troves(&mut self, n: u32) -> Vec<Bucket> {
            let prices = self.fetch_prices();
            let totals = Self::ok(self.ledger.liquidate_troves(n, &prices));
            self.settle_liquidation(totals)
        }

        /// Redeems stable tokens for collateral. Returns the collateral and the unredeemed stable tokens.
        pub fn redeem_collateral(
            &mut self,
            payment: Bucket,
            max_fee_percentage: Decimal,
            first_redemption_hint: Option<NonFungibleLocalId>,
            upper_partial_hint: Option<NonFungibleLocalId>,
            lower_partial_hint: Option<NonFungibleLocalId>,
            partial_redemption_hint_icr: Decimal,
            max_iterations: u32,
        ) -> (Vec<Bucket>, Bucket) {
            let stable = self.stable_token();
            assert!(
                payment.resource_address() == stable,
                "Only the stable token can be redeemed"
            );

            let prices = self.fetch_prices();
            let outcome = Self::ok(self.ledger.redeem_collateral(
                payment.amount(),
                max_fee_percentage,
                &RedemptionHints {
                    first_redemption_hint,
                    upper_partial_hint,
                    lower_partial_hint,
                    partial_redemption_hint_icr,
                },
                max_iterations,
                &prices,
                Clock::current_time_rounded_to_seconds(),
            ));

            let mut payment = payment;
            payment.take(outcome.redeemed).burn();
            if outcome.gas_compensation_burned.is_positive() {
                self.gas_compensation_vault
                    .take(outcome.gas_compensation_burned)
                    .burn();
            }
            for bucket in self.take_collateral(&outcome.fee) {
                self.put_fee(bucket);
            }
            for trove_id in outcome.closed_troves.iter() {
                Runtime::emit_event(EventTroveClosed {
                    trove_id: trove_id.clone(),
                    status: TroveStatus::ClosedByRedemption,
                });
            }

            Runtime::emit_event(EventRedemption {
                redeemed: outcome.redeemed,
                unredeemed: outcome.unredeemed,
                collateral_drawn: outcome.collateral_drawn.to_vec(),
                fee: outcome.fee.to_vec(),
                fee_rate: outcome.fee_rate,
                redeemed_troves: outcome.redeemed_troves.clone(),
                closed_troves: outcome.closed_troves.clone(),
            });
            self.emit_base_rate();

            (self.take_collateral(&outcome.collateral_to_redeemer), payment)
        }

        /// Registers a collateral token and creates its vault.
        pub fn new_collateral(&mut self, address: ResourceAddress) {
            Self::ok(self.ledger.register_collateral(address));
            self.collateral_vaults.insert(address, Vault::new(address));
            self.fee_vaults.insert(address, Vault::new(address));
            Runtime::emit_event(EventNewToken {
                address,
                kind: TokenKind::Collateral,
            });
        }

        /// Creates a new non-stable debt token minted and burned by this component.
        pub fn new_debt_token(&mut self, name: String, symbol: String) -> ResourceAddress {
            let manager = Self::create_debt_token(self.component_address, self.controller_badge, name, symbol);
            let address = manager.address();

            Self::ok(self.ledger.register_debt_token(address, false));
            self.debt_managers.insert(address, manager);
            self.fee_vaults.insert(address, Vault::new(address));
            Runtime::emit_event(EventNewToken {
                address,
                kind: TokenKind::Debt { is_stable: false },
            });
            address
        }

        pub fn set_freeze_switches(&mut self, freeze_switches: FreezeSwitches) {
            self.ledger.set_freeze_switches(freeze_switches);
            Runtime::emit_event(EventFreezeSwitchesChanged { freeze_switches });
        }

        pub fn set_parameters(&mut self, parameters: ProtocolParameters) {
            assert!(
                parameters.mcr > Decimal::ONE && parameters.ccr >= parameters.mcr,
                "Collateral ratios out of range"
            );
            self.ledger.parameters = parameters;
        }

        /// Withdraws every collected borrowing and redemption fee.
        pub fn collect_fees(&mut self) -> Vec<Bucket> {
            self.ledger
                .collect_fees()
                .tokens()
                .into_iter()
                .filter_map(|token| {
                    self.fee_vaults
                        .get_mut(&token)
                        .map(|mut vault| vault.take_all())
                })
                .collect()
        }

        pub fn set_oracle(&mut self, oracle_address: ComponentAddress, method_name: String) {
            self.oracle = Global::from(oracle_address);
            self.oracle_method_name = method_name;
        }

        pub fn get_current_icr(&self, trove_id: NonFungibleLocalId) -> Decimal {
            let prices = self.fetch_prices();
            Self::ok(self.ledger.current_icr(&trove_id, &prices))
        }

        pub fn get_trove_info(&self, trove_id: NonFungibleLocalId) -> TroveInfoReturn {
            let prices = self.fetch_prices();
            Self::ok(self.ledger.trove_info(&trove_id, &prices))
        }

        /// Collateral of a trove including pending rewards.
        pub fn get_trove_coll(&self, trove_id: NonFungibleLocalId) -> Vec<(ResourceAddress, Decimal)> {
            Self::ok(self.ledger.entire_trove(&trove_id))
                .collateral
                .to_vec()
        }

        /// Debt of a trove including pending rewards.
        pub fn get_trove_debt(&self, trove_id: NonFungibleLocalId) -> Vec<(ResourceAddress, Decimal)> {
            Self::ok(self.ledger.entire_trove(&trove_id)).debt.to_vec()
        }

        /// Pending collateral and pending debt of a trove.
        pub fn get_pending_rewards(
            &self,
            trove_id: NonFungibleLocalId,
        ) -> (Vec<(ResourceAddress, Decimal)>, Vec<(ResourceAddress, Decimal)>) {
            let (collateral, debt) = Self::ok(self.ledger.pending_rewards(&trove_id));
            (collateral.to_vec(), debt.to_vec())
        }

        pub fn get_trove_status(&self, trove_id: NonFungibleLocalId) -> TroveStatus {
            self.ledger.trove_status(&trove_id)
        }

        pub fn get_claimable_collateral(&self, trove_id: NonFungibleLocalId) -> Vec<(ResourceAddress, Decimal)> {
            self.ledger.claimable_collateral(&trove_id).to_vec()
        }

        pub fn check_recovery_mode(&self) -> RecoveryModeCheck {
            let prices = self.fetch_prices();
            Self::ok(self.ledger.check_recovery_mode(&prices))
        }

        /// Returns `(hint, diff, latest_random_seed)`.
        pub fn get_approx_hint(
            &self,
            icr: Decimal,
            num_trials: u32,
            random_seed: u64,
        ) -> (Option<NonFungibleLocalId>, Decimal, u64) {
            let prices = self.fetch_prices();
            let approx = Self::ok(self.ledger.get_approx_hint(icr, num_trials, random_seed, &prices));
            (approx.hint, approx.diff, approx.latest_random_seed)
        }

        pub fn find_insert_position(
            &self,
            icr: Decimal,
            upper_hint: Option<NonFungibleLocalId>,
            lower_hint: Option<NonFungibleLocalId>,
        ) -> (Option<NonFungibleLocalId>, Option<NonFungibleLocalId>) {
            let prices = self.fetch_prices();
            Self::ok(self.ledger.find_insert_position(
                icr,
                &InsertHints::new(upper_hint, lower_hint),
                &prices,
            ))
        }

        /// Returns `(first_redemption_hint, partial_redemption_hint_icr, truncated_amount)`.
        pub fn get_redemption_hints(
            &self,
            amount: Decimal,
            max_iterations: u32,
        ) -> (Option<NonFungibleLocalId>, Decimal, Decimal) {
            let prices = self.fetch_prices();
            let hints = Self::ok(self.ledger.get_redemption_hints(amount, max_iterations, &prices));
            (
                hints.first_redemption_hint,
                hints.partial_redemption_hint_icr,
                hints.truncated_amount,
            )
        }

        /// Returns `(base_rate, last_fee_operation_time)`.
        pub fn get_base_rate(&self) -> (Decimal, Instant) {
            let base_rate = self.ledger.base_rate();
            (base_rate.rate, base_rate.last_fee_operation_time)
        }

        pub fn get_stable_token(&self) -> ResourceAddress {
            self.stable_token()
        }

        fn settle_update(&mut self, update: TroveUpdate) {
            self.mint_fees(&update.borrowing_fees);
            if !update.borrowing_fees.is_empty() {
                self.emit_base_rate();
            }
            Runtime::emit_event(EventTroveUpdated {
                trove_id: update.trove_id,
                opened: false,
                collateral: update.collateral.to_vec(),
                debt: update.debt.to_vec(),
                stakes: update.stakes.to_vec(),
                icr: update.icr,
                borrowing_fees: update.borrowing_fees.to_vec(),
            });
        }

        /// Pays the liquidator and emits one event per liquidated trove plus one for the batch.
        fn settle_liquidation(&mut self, totals: LiquidationTotals) -> Vec<Bucket> {
            for outcome in totals.outcomes.iter() {
                Runtime::emit_event(EventTroveLiquidated {
                    trove_id: outcome.trove_id.clone(),
                    mode: outcome.mode,
                    icr: outcome.icr,
                    collateral: outcome.collateral.to_vec(),
                    debt: outcome.debt.to_vec(),
                    redistributed_collateral: outcome.redistributed_collateral.to_vec(),
                    redistributed_debt: outcome.redistributed_debt.to_vec(),
                    collateral_surplus: outcome.collateral_surplus.to_vec(),
                });
            }
            Runtime::emit_event(EventBatchLiquidation {
                liquidated_troves: totals.liquidated_troves(),
                recovery_mode: totals.recovery_mode_at_start,
                tcr: totals.tcr_at_start,
                coll_gas_compensation: totals.coll_gas_compensation.to_vec(),
                stable_gas_compensation: totals.stable_gas_compensation,
                gas_compensation_burned: totals.gas_compensation_burned,
            });

            if totals.gas_compensation_burned.is_positive() {
                self.gas_compensation_vault
                    .take(totals.gas_compensation_burned)
                    .burn();
            }

            let mut payout = self.take_collateral(&totals.coll_gas_compensation);
            if totals.stable_gas_compensation.is_positive() {
                payout.push(
                    self.gas_compensation_vault
                        .take(totals.stable_gas_compensation),
                );
            }
            payout
        }

        fn trove_id(&self, badge_proof: NonFungibleProof) -> NonFungibleLocalId {
            let badge_proof = badge_proof.check_with_message(
                self.badge_manager.address(),
                "Invalid borrower badge provided",
            );
            let badge = badge_proof.non_fungible::<BorrowerBadge>();
            badge.local_id().clone()
        }

        fn fetch_prices(&self) -> PriceTable {
            let mut prices = PriceTable::new();
            for token in self
                .ledger
                .collateral_tokens()
                .into_iter()
                .chain(self.ledger.debt_tokens())
            {
                let (price, is_trusted, is_secondary): (Decimal, bool, bool) = self
                    .oracle
                    .call_raw(&self.oracle_method_name, scrypto_args!(token));
                prices.set_quote(
                    token,
                    PriceQuote {
                        price,
                        is_trusted,
                        is_secondary,
                    },
                );
            }
            prices
        }

        fn deposit_collateral(&mut self, buckets: Vec<Bucket>) -> TokenAmounts {
            let pairs: Vec<(ResourceAddress, Decimal)> = buckets
                .iter()
                .map(|bucket| (bucket.resource_address(), bucket.amount()))
                .collect();
            let amounts = Self::ok(TokenAmounts::from_pairs(pairs));

            for bucket in buckets {
                self.collateral_vaults
                    .get_mut(&bucket.resource_address())
                    .expect("Collateral not accepted")
                    .put(bucket);
            }
            amounts
        }

        fn take_collateral(&mut self, amounts: &TokenAmounts) -> Vec<Bucket> {
            amounts
                .iter()
                .map(|(token, amount)| {
                    self.collateral_vaults
                        .get_mut(token)
                        .expect("Collateral not accepted")
                        .take_advanced(*amount, WithdrawStrategy::Rounded(RoundingMode::ToZero))
                })
                .collect()
        }

        fn mint(&self, token: ResourceAddress, amount: Decimal) -> Bucket {
            self.debt_managers
                .get(&token)
                .expect("Debt token not found")
                .mint(amount)
        }

        fn mint_fees(&mut self, fees: &TokenAmounts) {
            for (token, amount) in fees.iter() {
                let fee = self.mint(*token, *amount);
                self.put_fee(fee);
            }
        }

        fn put_fee(&mut self, bucket: Bucket) {
            self.fee_vaults
                .get_mut(&bucket.resource_address())
                .expect("Fee vault not found")
                .put(bucket);
        }

        fn emit_base_rate(&self) {
            let base_rate = self.ledger.base_rate();
            Runtime::emit_event(EventBaseRateUpdated {
                base_rate: base_rate.rate,
                last_fee_operation_time: base_rate.last_fee_operation_time,
            });
        }

        fn stable_token(&self) -> ResourceAddress {
            Self::ok(self.ledger.stable_token())
        }

        fn create_debt_token(
            component_address: ComponentAddress,
            controller_badge: ResourceAddress,
            name: String,
            symbol: String,
        ) -> ResourceManager {
            ResourceBuilder::new_fungible(OwnerRole::Fixed(rule!(require(controller_badge))))
                .divisibility(DIVISIBILITY_MAXIMUM)
                .metadata(metadata! (
                    init {
                        "name" => name, updatable;
                        "symbol" => symbol, updatable;
                    }
                ))
                .mint_roles(mint_roles!(
                    minter => rule!(require(global_caller(component_address)));
                    minter_updater => rule!(deny_all);
                ))
                .burn_roles(burn_roles!(
                    burner => rule!(allow_all);
                    burner_updater => rule!(deny_all);
                ))
                .create_with_no_initial_supply()
                .into()
        }

        /// Unwraps a ledger result, panicking with the error message so the transaction is rolled back.
        fn ok<T>(result: LedgerResult<T>) -> T {
            result.unwrap_or_else(|error| panic!("{}", error))
        }
    }
}
