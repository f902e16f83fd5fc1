//! # Seed Data Generator
//!
//! Populates the database with Auto-BOM demo data for development.
//!
//! ## Usage
//! ```bash
//! # Seed ./autobom.db (or whatever autobom.toml / AUTOBOM_DB_PATH says)
//! cargo run -p autobom-db --bin seed
//!
//! # Explicit config file
//! cargo run -p autobom-db --bin seed -- --config ./autobom.toml
//!
//! # Specify database path
//! cargo run -p autobom-db --bin seed -- --db ./data/autobom_dev.db
//! ```
//!
//! ## Generated Data
//! - `RICE-25KG`: a 25 kg sack sold as 1 kg / 5 kg bags and a 500 g pouch
//! - `OIL-5L`: a 5 l can sold as 1 l bottles and a 250 ml refill
//!
//! Every config is repriced once and one sale of two 1 kg bags is made,
//! so the sale log and price history are not empty.

use std::env;
use std::path::PathBuf;

use rust_decimal::Decimal;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use autobom_core::{
    BaseProduct, NewAutoBomConfig, NewBaseProduct, NewSellingUnit, PricingContext, PricingParams,
    PricingStrategy, SaleRequest,
};
use autobom_db::{AutoBomManager, EngineConfig};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,autobom=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::TRACE)
        .init();
}

fn unit(
    name: &str,
    quantity: Decimal,
    uom: Option<&str>,
    strategy: &str,
    pricing: PricingParams,
) -> NewSellingUnit {
    NewSellingUnit {
        unit_name: name.to_string(),
        unit_quantity: quantity,
        unit_of_measure: uom.map(String::from),
        pricing_strategy: strategy.to_string(),
        pricing,
        ..Default::default()
    }
}

fn config_for(
    product: &BaseProduct,
    name: &str,
    base_unit: &str,
    base_quantity: i64,
    units: Vec<NewSellingUnit>,
) -> NewAutoBomConfig {
    NewAutoBomConfig {
        product_id: product.id.clone(),
        base_product_id: product.id.clone(),
        config_name: name.to_string(),
        base_unit: base_unit.to_string(),
        base_quantity: Decimal::from(base_quantity),
        description: Some(format!("{} sold by {}", product.name, base_unit)),
        created_by: Some("seed".to_string()),
        selling_units: units,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut config_path: Option<PathBuf> = None;
    let mut db_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Auto-BOM Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <PATH>  Config file (default: ./autobom.toml)");
                println!("  -d, --db <PATH>      Database file path (overrides config)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    init_tracing();

    let mut config = EngineConfig::load(config_path)?;
    if let Some(path) = db_path {
        config.database.path = path;
    }

    println!("🌱 Auto-BOM Seed Data Generator");
    println!("================================");
    println!("Database: {}", config.database.path.display());
    println!();

    let manager = AutoBomManager::from_config(&config).await?;
    let products = manager.database().products();

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    if products.get_by_sku("RICE-25KG").await?.is_some() {
        println!("⚠ Demo data already present");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let rice = products
        .insert(&NewBaseProduct {
            sku: "RICE-25KG".to_string(),
            name: "Basmati rice 25kg sack".to_string(),
            cost_cents: 5000,
            price_cents: 6500,
            quantity: Decimal::from(8),
        })
        .await?;

    let oil = products
        .insert(&NewBaseProduct {
            sku: "OIL-5L".to_string(),
            name: "Sunflower oil 5l can".to_string(),
            cost_cents: 2400,
            price_cents: 3000,
            quantity: Decimal::from(12),
        })
        .await?;

    println!("✓ Inserted base products");

    let (rice_config, rice_units) = manager
        .create_auto_bom_config(&config_for(
            &rice,
            "Rice by weight",
            "kg",
            25,
            vec![
                unit(
                    "1kg bag",
                    Decimal::ONE,
                    None,
                    "cost_based",
                    PricingParams {
                        markup_percent: Decimal::from(20),
                        ..Default::default()
                    },
                ),
                unit(
                    "5kg bag",
                    Decimal::from(5),
                    None,
                    "cost_based",
                    PricingParams {
                        markup_percent: Decimal::from(10),
                        min_profit_margin_percent: Some(Decimal::from(12)),
                        ..Default::default()
                    },
                ),
                unit(
                    "500g pouch",
                    Decimal::from(500),
                    Some("g"),
                    "fixed",
                    PricingParams {
                        fixed_price_cents: Some(150),
                        ..Default::default()
                    },
                ),
            ],
        ))
        .await?;

    let (oil_config, _) = manager
        .create_auto_bom_config(&config_for(
            &oil,
            "Oil by volume",
            "l",
            5,
            vec![
                unit(
                    "1l bottle",
                    Decimal::ONE,
                    None,
                    "hybrid",
                    PricingParams {
                        markup_percent: Decimal::from(25),
                        market_price_cents: Some(620),
                        hybrid_primary: Some(PricingStrategy::MarketBased),
                        hybrid_fallback: Some(PricingStrategy::CostBased),
                        hybrid_threshold_cents: Some(700),
                        ..Default::default()
                    },
                ),
                unit(
                    "250ml refill",
                    Decimal::from(250),
                    Some("ml"),
                    "dynamic",
                    PricingParams {
                        dynamic_base_price_cents: Some(150),
                        stock_threshold: Some(Decimal::from(10)),
                        ..Default::default()
                    },
                ),
            ],
        ))
        .await?;

    println!("✓ Created Auto-BOM configs");

    for config_id in [&rice_config.id, &oil_config.id] {
        let report = manager.update_prices_based_on_strategy(config_id, Some("seed")).await?;
        info!(
            config_id = %config_id,
            updated = report.updated.len(),
            failed = report.failed.len(),
            "Seed repricing"
        );
    }

    println!();
    println!("Available selling units:");
    for base in [&rice, &oil] {
        for entry in manager.get_available_selling_units(&base.id).await? {
            let price = manager
                .calculate_selling_unit_price(&entry.unit.id, &PricingContext::default())
                .await?;
            println!(
                "  {:<14} {:<14} {:>8}  ({})",
                base.sku, entry.unit.unit_name, price, entry.unit.pricing_strategy
            );
        }
    }

    let receipt = manager
        .sell_selling_unit(&SaleRequest {
            selling_unit_id: rice_units[0].id.clone(),
            quantity: Decimal::from(2),
            unit_price_override_cents: None,
            sold_by: Some("seed".to_string()),
            pricing: None,
        })
        .await?;

    println!();
    println!(
        "✓ Sold {} × {} for {} (deducted {} sacks, {} left)",
        receipt.quantity,
        rice_units[0].unit_name,
        receipt.line_total,
        receipt.base_quantity_deducted,
        receipt.remaining_base_quantity
    );

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
