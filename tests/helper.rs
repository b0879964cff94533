#![allow(dead_code)]

use dummy_oracle_component::oracle_test::*;
use scrypto_test::prelude::*;
use trove_protocol::shared_structs::*;
use trove_protocol::trove_manager::trove_manager_test::*;

pub struct Helper {
    pub env: TestEnvironment<InMemorySubstateDatabase>,
    pub package_address: PackageAddress,
    pub controller_badge: Bucket,
    pub btc: Bucket,
    pub eth: Bucket,
    pub btc_address: ResourceAddress,
    pub eth_address: ResourceAddress,
    pub stable_address: ResourceAddress,
    pub badge_address: ResourceAddress,
    pub trove_manager: TroveManager,
    pub dummy_oracle: Oracle,
}

impl Helper {
    pub fn new() -> Result<Self, RuntimeError> {
        let mut env = TestEnvironmentBuilder::new().build();

        let btc = ResourceBuilder::new_fungible(OwnerRole::None)
            .divisibility(18)
            .mint_initial_supply(1000000, &mut env)?;
        let eth = ResourceBuilder::new_fungible(OwnerRole::None)
            .divisibility(18)
            .mint_initial_supply(1000000, &mut env)?;

        let btc_address = btc.resource_address(&mut env)?;
        let eth_address = eth.resource_address(&mut env)?;

        let dummy_oracle_package_address = PackageFactory::compile_and_publish(
            "./dummy_oracle_component",
            &mut env,
            CompileProfile::Standard,
        )?;

        let dummy_oracle = Oracle::instantiate_oracle(
            vec![(btc_address, dec!(21000)), (eth_address, dec!(1500))],
            dummy_oracle_package_address,
            &mut env,
        )?;

        let package_address = PackageFactory::compile_and_publish(
            this_package!(),
            &mut env,
            CompileProfile::Standard,
        )?;

        let (mut trove_manager, controller_badge, stable_address, badge_address) = TroveManager::instantiate(
            ComponentAddress::try_from(dummy_oracle.0.clone()).unwrap(),
            None,
            package_address,
            &mut env,
        )?;

        env.disable_auth_module();

        let mut dummy_oracle = Oracle(dummy_oracle.0);
        dummy_oracle.set_price(stable_address, dec!(1), &mut env)?;
        trove_manager.new_collateral(btc_address, &mut env)?;
        trove_manager.new_collateral(eth_address, &mut env)?;

        env.enable_auth_module();

        Ok(Self {
            env,
            package_address,
            controller_badge: controller_badge.into(),
            btc: btc.into(),
            eth: eth.into(),
            btc_address,
            eth_address,
            stable_address,
            badge_address,
            trove_manager,
            dummy_oracle,
        })
    }

    /////////////////////////////////////////////////
    //////////////////// TROVES /////////////////////
    /////////////////////////////////////////////////

    pub fn create_badge(&mut self) -> Result<Bucket, RuntimeError> {
        self.trove_manager.create_borrower_badge(&mut self.env)
    }

    pub fn badge_proof(&mut self, badge: &Bucket) -> Result<NonFungibleProof, RuntimeError> {
        Ok(NonFungibleProof(badge.create_proof_of_all(&mut self.env)?))
    }

    /// Creates a badge and opens a trove with BTC collateral and stable debt. Returns the badge and the minted
    /// stable tokens.
    pub fn open_btc_trove(
        &mut self,
        btc_amount: Decimal,
        stable_amount: Decimal,
    ) -> Result<(Bucket, Bucket), RuntimeError> {
        let badge = self.create_badge()?;
        let collateral = self.btc.take(btc_amount, &mut self.env)?;
        let proof = self.badge_proof(&badge)?;

        let mut minted = self.trove_manager.open_trove(
            proof,
            vec![collateral],
            vec![(self.stable_address, stable_amount)],
            dec!("0.05"),
            None,
            None,
            &mut self.env,
        )?;

        Ok((badge, minted.remove(0)))
    }

    pub fn trove_debt(&mut self, trove_id: u64) -> Result<Vec<(ResourceAddress, Decimal)>, RuntimeError> {
        self.trove_manager
            .get_trove_debt(NonFungibleLocalId::integer(trove_id), &mut self.env)
    }

    pub fn trove_status(&mut self, trove_id: u64) -> Result<TroveStatus, RuntimeError> {
        self.trove_manager
            .get_trove_status(NonFungibleLocalId::integer(trove_id), &mut self.env)
    }

    /////////////////////////////////////////////////
    //////////////////// TEST HELPERS ///////////////
    /////////////////////////////////////////////////

    pub fn change_price(&mut self, token: ResourceAddress, price: Decimal) -> Result<(), RuntimeError> {
        self.env.disable_auth_module();
        self.dummy_oracle.set_price(token, price, &mut self.env)?;
        self.env.enable_auth_module();

        Ok(())
    }

    pub fn set_trusted(&mut self, token: ResourceAddress, is_trusted: bool) -> Result<(), RuntimeError> {
        self.env.disable_auth_module();
        self.dummy_oracle.set_trusted(token, is_trusted, &mut self.env)?;
        self.env.enable_auth_module();

        Ok(())
    }

    pub fn set_freeze_switches(&mut self, freeze_switches: FreezeSwitches) -> Result<(), RuntimeError> {
        self.env.disable_auth_module();
        self.trove_manager
            .set_freeze_switches(freeze_switches, &mut self.env)?;
        self.env.enable_auth_module();

        Ok(())
    }

    pub fn new_debt_token(&mut self, name: &str, symbol: &str, price: Decimal) -> Result<ResourceAddress, RuntimeError> {
        self.env.disable_auth_module();
        let address = self
            .trove_manager
            .new_debt_token(name.to_string(), symbol.to_string(), &mut self.env)?;
        self.dummy_oracle.set_price(address, price, &mut self.env)?;
        self.env.enable_auth_module();

        Ok(address)
    }

    pub fn collect_fees(&mut self) -> Result<Vec<Bucket>, RuntimeError> {
        self.env.disable_auth_module();
        let fees = self.trove_manager.collect_fees(&mut self.env)?;
        self.env.enable_auth_module();

        Ok(fees)
    }

    pub fn assert_bucket_eq(
        &mut self,
        bucket: &Bucket,
        address: ResourceAddress,
        amount: Decimal,
    ) -> Result<(), RuntimeError> {
        assert_eq!(bucket.resource_address(&mut self.env)?, address);
        assert_eq!(bucket.amount(&mut self.env)?, amount);

        Ok(())
    }
}
