//! # Dummy Oracle Blueprint
//! Component for testing the trove manager without an external price feed. Prices are set by hand and can be
//! flagged as untrusted to simulate a stale primary source.

use scrypto::prelude::*;

#[blueprint]
mod oracle {
    enable_method_auth! {
        methods {
            get_price => PUBLIC;
            set_price => restrict_to: [OWNER];
            set_trusted => restrict_to: [OWNER];
        }
    }

    struct Oracle {
        /// Price and trust flag per token.
        prices: HashMap<ResourceAddress, (Decimal, bool)>,
    }

    impl Oracle {
        pub fn instantiate_oracle(initial_prices: Vec<(ResourceAddress, Decimal)>) -> Global<Oracle> {
            let prices: HashMap<ResourceAddress, (Decimal, bool)> = initial_prices
                .into_iter()
                .map(|(token, price)| (token, (price, true)))
                .collect();

            Self { prices }
                .instantiate()
                .prepare_to_globalize(OwnerRole::None)
                .metadata(metadata! {
                    init {
                        "name" => "Trove Protocol Dummy Oracle".to_string(), updatable;
                        "description" => "A dummy oracle used for testing the Trove Protocol".to_string(), updatable;
                    }
                })
                .globalize()
        }

        /// Returns `(price, is_trusted, is_secondary)`. The dummy never has a secondary source.
        pub fn get_price(&self, token: ResourceAddress) -> (Decimal, bool, bool) {
            let (price, is_trusted) = self
                .prices
                .get(&token)
                .cloned()
                .expect("Price not set for this token");
            (price, is_trusted, false)
        }

        pub fn set_price(&mut self, token: ResourceAddress, price: Decimal) {
            let is_trusted = self.prices.get(&token).map(|(_, trusted)| *trusted).unwrap_or(true);
            self.prices.insert(token, (price, is_trusted));
        }

        pub fn set_trusted(&mut self, token: ResourceAddress, is_trusted: bool) {
            let price = self.prices.get(&token).map(|(price, _)| *price).unwrap_or(Decimal::ZERO);
            self.prices.insert(token, (price, is_trusted));
        }
    }
}
