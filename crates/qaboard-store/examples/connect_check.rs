//! Quick connection check against the configured document store
//! Run with: cargo run --package qaboard-store --example connect_check

use qaboard_store::{DocumentStore, StoreConfig, SurrealDocumentStore};

#[tokio::main]
async fn main() {
    // Load from environment
    dotenvy::dotenv().ok();

    let config = StoreConfig::from_env();
    println!("Testing document store connection...");
    println!("  URL: {}", config.url);
    println!("  Namespace: {}", config.namespace);
    println!("  Database: {}", config.database);
    println!("  Signed in: {}", config.username.is_some());

    match SurrealDocumentStore::connect(&config).await {
        Ok(store) => match store.list_documents("Questions").await {
            Ok(questions) => {
                println!("\n✓ Connected, {} question(s) visible", questions.len());
            }
            Err(e) => {
                eprintln!("\n✗ Connected but listing failed: {}", e);
                std::process::exit(1);
            }
        },
        Err(e) => {
            eprintln!("\n✗ Connection failed: {}", e);
            std::process::exit(1);
        }
    }
}
