use creditsplit_derive::CsvSchema;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("subscription product not found: {product_id}")]
    NotFound { product_id: String },
}

/// Subscription product metadata as held by the product store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SubscriptionProduct {
    pub id: String,
    /// Credits granted per billing period; 0 means unlimited
    pub credits: i64,
    /// "month", "year" or anything else for non-periodic products
    pub period: String,
}

/// Looks up subscription products by product number
pub trait ProductStore {
    fn lookup(&self, product_id: &str) -> Result<SubscriptionProduct, LookupError>;
}

/// Column description produced by `#[derive(CsvSchema)]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvColumn {
    pub name: &'static str,
    pub required: bool,
    pub description: &'static str,
}

/// One row of a product catalogue CSV
#[derive(Debug, Clone, Serialize, Deserialize, CsvSchema)]
pub struct ProductRecord {
    /// Product number referenced by invoice lines
    pub id: String,
    /// Credits per billing period (0 = unlimited)
    pub credits: i64,
    /// Billing cadence: month, year, or blank for other products
    #[serde(default)]
    pub period: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ProductEntry {
    credits: i64,
    #[serde(default)]
    period: Option<String>,
}

/// Product store backed by an in-memory catalogue
#[derive(Debug, Clone, Default)]
pub struct Catalogue {
    products: HashMap<String, SubscriptionProduct>,
}

impl Catalogue {
    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn insert(&mut self, product: SubscriptionProduct) {
        self.products.insert(product.id.clone(), product);
    }

    /// Load a catalogue from CSV, or from JSON when the extension is `.json`
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let catalogue = match path.extension().and_then(|s| s.to_str()) {
            Some("json") => Self::read_json(reader)?,
            _ => Self::read_csv(reader)?,
        };
        if catalogue.is_empty() {
            log::warn!("Product catalogue {} is empty", path.display());
        } else {
            log::info!(
                "Loaded {} subscription products from {}",
                catalogue.len(),
                path.display()
            );
        }
        Ok(catalogue)
    }

    pub fn read_csv<R: Read>(reader: R) -> anyhow::Result<Self> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut catalogue = Catalogue::default();
        for record in rdr.deserialize::<ProductRecord>() {
            catalogue.insert(record?.into());
        }
        Ok(catalogue)
    }

    /// JSON object keyed by product number: `{"22": {"credits": 0, "period": "month"}}`
    pub fn read_json<R: Read>(reader: R) -> anyhow::Result<Self> {
        let entries: HashMap<String, ProductEntry> = serde_json::from_reader(reader)?;
        let products = entries
            .into_iter()
            .map(|(id, entry)| {
                let product = SubscriptionProduct {
                    id: id.clone(),
                    credits: entry.credits,
                    period: entry.period.unwrap_or_default(),
                };
                (id, product)
            })
            .collect();
        Ok(Catalogue { products })
    }
}

impl From<ProductRecord> for SubscriptionProduct {
    fn from(record: ProductRecord) -> Self {
        SubscriptionProduct {
            id: record.id,
            credits: record.credits,
            period: record.period.unwrap_or_default(),
        }
    }
}

impl FromIterator<SubscriptionProduct> for Catalogue {
    fn from_iter<I: IntoIterator<Item = SubscriptionProduct>>(iter: I) -> Self {
        let mut catalogue = Catalogue::default();
        for product in iter {
            catalogue.insert(product);
        }
        catalogue
    }
}

impl ProductStore for Catalogue {
    fn lookup(&self, product_id: &str) -> Result<SubscriptionProduct, LookupError> {
        log::debug!("Looking up subscription product {}", product_id);
        self.products
            .get(product_id)
            .cloned()
            .ok_or_else(|| LookupError::NotFound {
                product_id: product_id.to_string(),
            })
    }
}
