//! # Seed Data Generator
//!
//! Populates a pricing database with a demo catalog, tier schedules, a
//! negotiated client rule and some historical sales.
//!
//! ## Usage
//! ```bash
//! # Seed the database named in pricing.toml (or ./pricing.db)
//! cargo run -p tariff-db --bin seed
//!
//! # Specify database path
//! cargo run -p tariff-db --bin seed -- --db ./data/pricing.db
//!
//! # Use an explicit config file
//! cargo run -p tariff-db --bin seed -- --config ./pricing.toml
//! ```
//!
//! ## Generated Data
//! - Products across network, storage and software categories
//! - Clients, one per tier (public, end_user, system_integrator, trader)
//! - A bulk discount per tier
//! - One fixed-price agreement and an imported sale history

use chrono::{Duration, NaiveDate, Utc};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tariff_core::{Adjustment, Client, ClientRuleKey, Money, PriceRecord, Product, ProductFilter};
use tariff_db::{Catalog, ClientRuleInput, Database, PriceQuery, PricingConfig, PricingEngine};

/// (category, [(id, name, base price in cents)])
const CATALOG: &[(&str, &[(&str, &str, i64)])] = &[
    (
        "network",
        &[
            ("NET-001", "24-Port Managed Switch", 85_000),
            ("NET-002", "48-Port Managed Switch", 142_000),
            ("NET-003", "Wireless Access Point", 32_500),
            ("NET-004", "Edge Router", 61_000),
            ("NET-005", "SFP+ Transceiver", 4_900),
        ],
    ),
    (
        "storage",
        &[
            ("STO-001", "4-Bay NAS", 54_000),
            ("STO-002", "8TB Enterprise Drive", 27_900),
            ("STO-003", "1.92TB SSD", 31_500),
        ],
    ),
    (
        "software",
        &[
            ("SW-001", "Backup Suite (1 year)", 12_000),
            ("SW-002", "Monitoring License", 9_500),
        ],
    ),
];

/// (tier id, discount in basis points)
const TIERS: &[(&str, i64)] = &[
    ("public", 0),
    ("end_user", 500),
    ("system_integrator", 1500),
    ("trader", 2200),
];

/// Logging setup; `RUST_LOG` overrides the default filter.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tariff=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

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
                println!("Tariff Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <PATH>  Config file (default: platform pricing.toml)");
                println!("  -d, --db <PATH>      Database file path (overrides config)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            other => warn!(arg = other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    let mut config = PricingConfig::load(config_path)?;
    if let Some(path) = db_path {
        config.database.path = path;
    }

    println!("Tariff Seed Data Generator");
    println!("==========================");
    println!("Database: {}", config.database.path.display());
    println!();

    let db = Database::new(config.db_config()).await?;
    let catalog = db.catalog();

    let existing = catalog.list_products(&ProductFilter::default()).await?;
    if !existing.is_empty() {
        println!("Database already has {} products", existing.len());
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // Catalog and clients
    let mut product_count = 0;
    for (category, products) in CATALOG {
        for (id, name, cents) in products.iter() {
            catalog
                .insert_product(&Product {
                    id: id.to_string(),
                    name: name.to_string(),
                    category: category.to_string(),
                    base_price_cents: *cents,
                })
                .await?;
            product_count += 1;
        }
    }
    for (n, (tier, _)) in TIERS.iter().enumerate() {
        catalog
            .insert_client(&Client {
                id: format!("CL-{:03}", n + 1),
                name: format!("Demo {} client", tier.replace('_', " ")),
                default_tier_id: tier.to_string(),
            })
            .await?;
    }
    println!("Inserted {} products and {} clients", product_count, TIERS.len());

    let engine = PricingEngine::new(
        Arc::new(db.pricing_store()),
        Arc::new(catalog),
        config.engine.clone(),
    );
    let actor = config.engine.default_actor.clone();

    // Tier schedules
    for (tier, bps) in TIERS {
        let summary = engine
            .bulk()
            .apply_bulk_discount(
                tier,
                Adjustment::percentage_bps(*bps),
                &ProductFilter::default(),
                &actor,
            )
            .await?;
        println!("Tier {:<18} {} rules", tier, summary.updated_count);
    }

    // A negotiated agreement for the integrator
    let mut agreement = ClientRuleInput::fixed(Money::from_cents(70_000), "AGR-2025-001");
    agreement.min_quantity = Some(10);
    agreement.valid_from = NaiveDate::from_ymd_opt(2025, 1, 1);
    agreement.notes = Some("Volume agreement".into());
    engine
        .rules()
        .upsert_client_rule(&ClientRuleKey::new("CL-003", "NET-001"), agreement, None)
        .await?;

    // Sales history for the trader
    let today = Utc::now().date_naive();
    let records: Vec<PriceRecord> = [("NET-003", 26_000), ("STO-002", 22_500), ("STO-002", 21_900)]
        .iter()
        .enumerate()
        .map(|(n, (product, cents))| {
            let mut record = PriceRecord::new(
                *product,
                Money::from_cents(*cents),
                5,
                today - Duration::days(30 * (n as i64 + 1)),
            );
            record.order_id = Some(format!("SO-{:05}", 1000 + n));
            record
        })
        .collect();
    let summary = engine
        .importer()
        .process_import("CL-004", &records, &engine.import_context())
        .await?;
    println!(
        "Imported {} sales, {} skipped, {} rules derived",
        summary.imported_count, summary.skipped_count, summary.pricing_rules_created_count
    );

    // Spot checks
    println!();
    println!("Sample resolutions:");
    let resolver = engine.resolver();
    for query in [
        PriceQuery::new("NET-001", 1),
        PriceQuery::new("NET-001", 5).for_client("CL-003"),
        PriceQuery::new("NET-001", 20).for_client("CL-003"),
        PriceQuery::new("STO-002", 1).for_client("CL-004"),
    ] {
        let price = resolver.resolve(&query).await?;
        println!(
            "  {:<8} x{:<3} {:<8} {:>10}  ({})",
            query.product_id,
            query.quantity,
            query.client_id.as_deref().unwrap_or("-"),
            price.unit_price.to_string(),
            price.source
        );
    }

    db.close().await;
    info!("Seed complete");
    println!();
    println!("Seed complete!");

    Ok(())
}
