//! # Demo Pharmacy Seeder
//!
//! Populates the database with a demo pharmacy for development.
//!
//! ## Usage
//! ```bash
//! # Seed ./medtrack_dev.db with the default password
//! cargo run -p medtrack-db --bin seed
//!
//! # Specify database path and password
//! cargo run -p medtrack-db --bin seed -- --db ./data/medtrack.db --password s3cret-pass
//! ```
//!
//! ## Generated Data
//! - Pharmacy "MedTrack Demo Pharmacy" (license `DEMO-0001`)
//! - Accounts: admin@, pharmacist@ and worker@medtrack.demo
//! - Inventory across six categories with a mix of healthy, low,
//!   out-of-stock, expiring and expired batches
//! - A pending prescription, a handful of sales and monthly expenses

use std::env;

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHasher};
use chrono::{Duration, Utc};
use medtrack_core::sale::{plan_sale, SaleLine};
use medtrack_core::{Gender, Role};
use medtrack_db::{Database, DbConfig, NewAdmin, NewExpense, NewItem, NewPharmacy, NewPrescription, NewUser};

const DEMO_LICENSE: &str = "DEMO-0001";

/// (name, category, quantity, price cents, days until expiry)
const ITEMS: &[(&str, &str, i64, i64, i64)] = &[
    ("Paracetamol 500mg", "Analgesic", 240, 350, 540),
    ("Ibuprofen 400mg", "Analgesic", 8, 520, 400),
    ("Aspirin 75mg", "Analgesic", 0, 280, 300),
    ("Amoxicillin 500mg", "Antibiotic", 60, 1250, 20),
    ("Azithromycin 250mg", "Antibiotic", 35, 1890, 365),
    ("Ciprofloxacin 500mg", "Antibiotic", 14, 1420, -10),
    ("Cetirizine 10mg", "Antihistamine", 120, 410, 720),
    ("Loratadine 10mg", "Antihistamine", 6, 460, 600),
    ("Metformin 500mg", "Diabetes", 300, 640, 480),
    ("Insulin Glargine", "Diabetes", 12, 4200, 25),
    ("Vitamin D3 1000IU", "Supplement", 90, 990, 900),
    ("Zinc 50mg", "Supplement", 3, 750, 800),
    ("Cough Syrup 100ml", "Syrup", 40, 880, 150),
    ("Oral Rehydration Salts", "Syrup", 75, 150, -3),
];

/// (category, amount cents, days ago)
const EXPENSES: &[(&str, i64, i64)] = &[
    ("Rent", 250_000, 25),
    ("Salaries", 480_000, 20),
    ("Utilities", 18_500, 12),
    ("Supplies", 9_900, 4),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./medtrack_dev.db");
    let mut password = String::from("medtrack-demo");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--password" | "-p" => {
                if i + 1 < args.len() {
                    password = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("MedTrack Demo Seeder");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>          Database file path (default: ./medtrack_dev.db)");
                println!("  -p, --password <PASS>    Password for every demo account (default: medtrack-demo)");
                println!("  -h, --help               Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 MedTrack Demo Seeder");
    println!("======================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    if db.pharmacies().license_exists(DEMO_LICENSE).await? {
        println!("⚠ Demo pharmacy {} already exists", DEMO_LICENSE);
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let password_hash = hash_password(&password)?;

    let (pharmacy, admin) = db
        .pharmacies()
        .register(
            NewPharmacy {
                name: "MedTrack Demo Pharmacy".to_string(),
                license_number: DEMO_LICENSE.to_string(),
                owner_name: "Dana Admin".to_string(),
                email: "contact@medtrack.demo".to_string(),
                phone: "+1 555 0100".to_string(),
                location: "12 High Street".to_string(),
            },
            NewAdmin {
                name: "Dana Admin".to_string(),
                email: "admin@medtrack.demo".to_string(),
                password_hash: password_hash.clone(),
            },
        )
        .await?;
    println!("✓ Registered {} ({})", pharmacy.name, admin.email);

    for (name, email, role) in [
        ("Priya Pharmacist", "pharmacist@medtrack.demo", Role::Pharmacist),
        ("Wes Worker", "worker@medtrack.demo", Role::Worker),
    ] {
        db.users()
            .create(
                &pharmacy.id,
                NewUser {
                    email: email.to_string(),
                    name: name.to_string(),
                    role,
                    password_hash: password_hash.clone(),
                },
            )
            .await?;
        println!("✓ Created {} ({})", email, role);
    }

    let today = Utc::now().date_naive();
    let new_items: Vec<NewItem> = ITEMS
        .iter()
        .enumerate()
        .map(|(idx, (name, category, quantity, price_cents, expires_in))| NewItem {
            name: name.to_string(),
            batch: format!("B{:04}", 1000 + idx),
            category: category.to_string(),
            quantity: *quantity,
            price_cents: *price_cents,
            expiry_date: today + Duration::days(*expires_in),
        })
        .collect();
    let items = db.inventory().insert_many(&pharmacy.id, new_items).await?;
    println!("✓ Stocked {} inventory items", items.len());

    let prescription = db
        .prescriptions()
        .create(
            &pharmacy.id,
            &admin.id,
            NewPrescription {
                patient_name: "Maria Lopez".to_string(),
                age: 46,
                gender: Gender::Female,
                doctor: "Dr. Patel".to_string(),
                medications: vec!["Metformin 500mg, twice daily".to_string()],
                image_url: None,
            },
        )
        .await?;
    println!("✓ Recorded prescription for {}", prescription.patient_name);

    let carts: &[&[(usize, i64)]] = &[&[(0, 2), (6, 1)], &[(4, 1)], &[(8, 3), (10, 1)], &[(12, 2)]];
    let mut recorded = 0;
    for cart in carts {
        let lines: Vec<SaleLine> = cart
            .iter()
            .map(|(idx, quantity)| SaleLine {
                item_id: items[*idx].id.clone(),
                quantity: *quantity,
            })
            .collect();

        let current = db.inventory().list(&pharmacy.id, &Default::default()).await?;
        let plan = plan_sale(&lines, None, today, |id| current.iter().find(|i| i.id == id))?;
        if let Err(e) = db.sales().record_sale(&pharmacy.id, &admin.id, &plan).await {
            eprintln!("Failed to record sale: {}", e);
            continue;
        }
        recorded += 1;
    }
    println!("✓ Recorded {} sales", recorded);

    for (category, amount_cents, days_ago) in EXPENSES {
        db.expenses()
            .create(
                &pharmacy.id,
                &admin.id,
                NewExpense {
                    category: category.to_string(),
                    amount_cents: *amount_cents,
                    description: Some(format!("{} (demo)", category)),
                    date: today - Duration::days(*days_ago),
                },
            )
            .await?;
    }
    println!("✓ Added {} expenses", EXPENSES.len());

    println!();
    println!("✓ Seed complete! Sign in as admin@medtrack.demo");

    Ok(())
}

fn hash_password(password: &str) -> Result<String, Box<dyn std::error::Error>> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| format!("Failed to hash password: {}", e))?;
    Ok(hash.to_string())
}
