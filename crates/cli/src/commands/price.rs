use clap::Args;
use rust_decimal::Decimal;
use tarif_core::config::{AppConfig, LoadOptions};
use tarif_core::domain::route::{DriverId, Route, RouteId, RouteType, Waypoint};
use tarif_core::domain::shipment::{CargoCategory, ClientId, Shipment, ShipmentId};
use tarif_core::pricing::PricingCalculator;

use crate::commands::{CommandResult, EXIT_CONFIG, EXIT_INVALID_INPUT};

#[derive(Debug, Clone, Args)]
pub struct PriceArgs {
    #[arg(long, help = "Cargo volume in cubic meters")]
    pub volume: Decimal,
    #[arg(long, help = "Cargo weight in kilograms")]
    pub weight: Decimal,
    #[arg(long = "distance-km", help = "One-way route distance")]
    pub distance_km: Decimal,
    #[arg(long = "round-trip-km", help = "Round-trip distance (defaults to twice the one-way distance)")]
    pub round_trip_km: Option<Decimal>,
    #[arg(long = "route-type", default_value = "ROUTE_NATIONALE")]
    pub route_type: String,
    #[arg(long = "one-way", help = "Price the outbound leg only")]
    pub one_way: bool,
    #[arg(long, help = "Apply the fragile cargo multiplier")]
    pub fragile: bool,
}

pub fn run(args: &PriceArgs) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "price",
                "config_validation",
                format!("configuration issue: {error}"),
                EXIT_CONFIG,
            );
        }
    };

    let (shipment, route, route_type) = match preview_inputs(args) {
        Ok(inputs) => inputs,
        Err(message) => {
            return CommandResult::failure("price", "invalid_input", message, EXIT_INVALID_INPUT)
        }
    };

    let calculator = PricingCalculator::new(config.pricing.effective_coefficients());
    let breakdown = match calculator.compute_price(&shipment, &route, route_type, !args.one_way) {
        Ok(breakdown) => breakdown,
        Err(error) => {
            return CommandResult::failure(
                "price",
                "invalid_input",
                format!("cannot price these inputs: {error}"),
                EXIT_INVALID_INPUT,
            )
        }
    };
    CommandResult::success_with_data(
        "price",
        breakdown.summary.clone(),
        serde_json::to_value(&breakdown).ok(),
    )
}

fn preview_inputs(args: &PriceArgs) -> Result<(Shipment, Route, RouteType), String> {
    let route_type = RouteType::parse(&args.route_type)
        .ok_or_else(|| format!("unknown route type `{}`", args.route_type))?;
    let round_trip = match args.round_trip_km {
        Some(round_trip) => round_trip,
        None => args
            .distance_km
            .checked_mul(Decimal::TWO)
            .ok_or_else(|| format!("--distance-km {} is too large", args.distance_km))?,
    };

    for (name, value) in [
        ("volume", args.volume),
        ("weight", args.weight),
        ("distance-km", args.distance_km),
        ("round-trip-km", round_trip),
    ] {
        if value.is_sign_negative() {
            return Err(format!("--{name} must not be negative (got {value})"));
        }
    }

    let shipment = Shipment {
        id: ShipmentId(0),
        client_id: ClientId(0),
        volume: args.volume,
        weight: args.weight,
        cargo_nature: "preview".to_string(),
        departure_date: None,
        origin_city: None,
        destination_city: None,
        validation_status: None,
        associated_route_id: None,
        distance_km: None,
        category: Some(CargoCategory {
            id: None,
            name: None,
            fragile: args.fragile,
            required_temperature: None,
        }),
    };
    let unset = Waypoint { latitude: None, longitude: None, address: None, city: None };
    let route = Route {
        id: RouteId("preview".to_string()),
        driver_id: DriverId("preview".to_string()),
        origin: unset.clone(),
        destination: unset,
        distance_one_way_km: args.distance_km,
        duration_one_way_min: None,
        distance_round_trip_km: round_trip,
        duration_round_trip_min: None,
        include_return: !args.one_way,
        optimized: false,
        optimization_type: None,
        status: None,
        created_at: None,
    };
    Ok((shipment, route, route_type))
}
