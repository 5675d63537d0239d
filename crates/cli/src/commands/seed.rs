//! Seed the catalog from a YAML file.
//!
//! The file is a list of products in the same shape the data endpoint stores
//! (camelCase keys, no ids):
//!
//! ```yaml
//! - name: Snake Plant
//!   price: "$24.99"
//!   stock: 12
//!   category: Succulents
//!   bestSelling: true
//!   sunlight: Low to bright indirect
//!   petFriendly: false
//! ```

use std::path::Path;

use tracing::{error, info};
use url::Url;

use verdora_core::{NewProduct, Price};
use verdora_storefront::data::DataClient;

/// Problems with individual entries, as `"#<index> <name>: <problem>"`.
fn validate(products: &[NewProduct]) -> Vec<String> {
    let mut errors = Vec::new();
    for (index, product) in products.iter().enumerate() {
        let label = format!("#{} {}", index + 1, product.name.trim());
        if product.name.trim().is_empty() {
            errors.push(format!("{label}: name is required"));
        }
        if Price::parse(&product.price).is_none() {
            errors.push(format!("{label}: unparseable price {:?}", product.price));
        }
        if product.rating.is_some_and(|r| !(0.0..=5.0).contains(&r)) {
            errors.push(format!("{label}: rating must be between 0 and 5"));
        }
    }
    errors
}

/// Parse and validate a seed file's contents.
fn parse(content: &str) -> Result<Vec<NewProduct>, Box<dyn std::error::Error>> {
    let products: Vec<NewProduct> = serde_yaml::from_str(content)?;

    let errors = validate(&products);
    if !errors.is_empty() {
        error!("Seed file validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }
    Ok(products)
}

/// Create every product in `file_path` on the data endpoint.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, any entry is
/// invalid, or the data endpoint rejects a write. Products created before
/// the failure are kept.
pub async fn products(
    data_url: &Url,
    file_path: &str,
    dry_run: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading products from file");
    let content = tokio::fs::read_to_string(path).await?;
    let products = parse(&content)?;
    info!(products = products.len(), "Seed file validated");

    if dry_run {
        info!("Dry run, nothing written");
        return Ok(());
    }

    let data = DataClient::new(data_url)?;
    for product in &products {
        let created = data.create_product(product).await?;
        info!(id = %created.id, name = %created.name, "Created product");
    }

    info!(created = products.len(), "Seeding complete");
    Ok(())
}
