use nodecore_types::k8slice::Partitionability;
use nodecore_types::Location;
use nodecore_types::Price;

use crate::config::controller::ControllerArgs;
use crate::domain::OfferDefaults;

impl From<&ControllerArgs> for Partitionability {
    fn from(args: &ControllerArgs) -> Self {
        Self {
            cpu_min: args.cpu_min,
            memory_min: args.memory_min,
            pods_min: args.pods_min,
            cpu_step: args.cpu_step,
            memory_step: args.memory_step,
            pods_step: args.pods_step,
        }
    }
}

impl From<&ControllerArgs> for OfferDefaults {
    fn from(args: &ControllerArgs) -> Self {
        Self {
            price: Price {
                amount: args.price_amount.clone(),
                currency: args.price_currency.clone(),
                period: args.price_period.clone(),
            },
            availability: true,
            network_property_type: args.network_property_type.clone(),
            location: Some(Location {
                latitude: args.location_latitude.clone(),
                longitude: args.location_longitude.clone(),
                country: args.location_country.clone(),
                city: args.location_city.clone(),
                additional_notes: args.location_notes.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use nodecore_types::Quantity;
    use similar_asserts::assert_eq;

    use super::*;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: ControllerArgs,
    }

    #[test]
    fn builds_offer_settings_from_flags() {
        let args = Wrapper::try_parse_from([
            "local-resource-manager",
            "--price-amount",
            "0.5",
            "--price-currency",
            "EUR",
            "--pods-step",
            "10",
            "--location-city",
            "Milan",
        ])
        .unwrap()
        .args;

        let defaults = OfferDefaults::from(&args);
        assert_eq!(defaults.price.amount, "0.5");
        assert_eq!(defaults.price.currency, "EUR");
        assert_eq!(defaults.price.period, "");
        assert_eq!(defaults.network_property_type, "networkProperty");
        let location = defaults.location.unwrap();
        assert_eq!(location.city, "Milan");
        assert_eq!(location.country, "Italy");

        let policy = Partitionability::from(&args);
        assert_eq!(policy.pods_step, Quantity::parse("10").unwrap());
        assert_eq!(policy.memory_step.to_string(), "100Mi");
        assert!(policy.cpu_min.is_zero());
    }
}
