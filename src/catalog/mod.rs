use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::path::PathBuf;

fn default_true() -> bool {
    true
}

/// A sellable product as the shop maintains it.
///
/// `id` is the stable key commands refer to. WhatsApp commerce exports call
/// the same field a retailer id, accepted here as an alias.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    #[serde(alias = "retailerId", alias = "retailer_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default, rename = "imageUrl")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub available: bool,
}

/// Result of checking a model-supplied product id against the catalog.
#[derive(Debug, Clone)]
pub struct CatalogCheck {
    pub valid: bool,
    pub product: Option<Product>,
}

#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Products currently offered (unavailable ones filtered out).
    async fn list_available(&self) -> Result<Vec<Product>>;

    /// Check a product id. Valid only when the product exists and is available.
    async fn validate(&self, product_id: &str) -> Result<CatalogCheck>;
}

/// Catalog backed by a products JSON file (an array of [`Product`]).
pub struct FileCatalog {
    path: PathBuf,
}

impl FileCatalog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn load(&self) -> Result<Vec<Product>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read catalog from {}", self.path.display()))?;
        let products: Vec<Product> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse catalog JSON from {}", self.path.display()))?;
        Ok(products)
    }
}

#[async_trait]
impl CatalogProvider for FileCatalog {
    async fn list_available(&self) -> Result<Vec<Product>> {
        Ok(self.load()?.into_iter().filter(|p| p.available).collect())
    }

    async fn validate(&self, product_id: &str) -> Result<CatalogCheck> {
        let product = self
            .load()?
            .into_iter()
            .find(|p| p.id == product_id && p.available);
        Ok(CatalogCheck {
            valid: product.is_some(),
            product,
        })
    }
}

/// Render the catalog as a numbered list for the system instruction.
pub fn format_for_prompt(products: &[Product]) -> String {
    if products.is_empty() {
        return "AVAILABLE PRODUCTS: none at the moment.\n".to_string();
    }
    let mut out = String::from("AVAILABLE PRODUCTS:\n");
    for (i, p) in products.iter().enumerate() {
        match p.price {
            Some(price) => {
                let _ = writeln!(out, "{}. {} - {} THB [id: {}]", i + 1, p.name, price, p.id);
            }
            None => {
                let _ = writeln!(out, "{}. {} - price on request [id: {}]", i + 1, p.name, p.id);
            }
        }
    }
    out
}

/// Up to `limit` available products rendered as `id: name` suggestions,
/// used in the `invalid_product` dispatch report.
pub fn candidate_names(products: &[Product], limit: usize) -> Vec<String> {
    products
        .iter()
        .take(limit)
        .map(|p| format!("{}: {}", p.id, p.name))
        .collect()
}
