use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which upstream endpoint produced a [`Product`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductSource {
    #[serde(rename = "OpenFoodFacts_v2_product")]
    BarcodeLookup,
    #[serde(rename = "OpenFoodFacts_cgi_search")]
    NameSearch,
}

/// Normalized food item with per-100g nutrition facts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub barcode: Option<String>,
    pub name: String,
    pub brands: Option<String>,
    pub image_url: Option<String>,
    pub calories_100g: Option<f64>,
    pub protein_100g: Option<f64>,
    pub carbs_100g: Option<f64>,
    pub fat_100g: Option<f64>,
    pub api_source: ProductSource,
}

/// Query string of `GET /api/search_food`.
#[derive(Debug, Default, Deserialize)]
pub struct SearchFoodQuery {
    pub query: Option<String>,
    pub barcode: Option<String>,
}

// --- upstream payloads ---

#[derive(Debug, Deserialize)]
pub(crate) struct OffProductResponse {
    #[serde(default)]
    pub status: Option<Value>,
    #[serde(default)]
    pub status_verbose: Option<String>,
    #[serde(default)]
    pub product: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OffSearchResponse {
    #[serde(default)]
    pub products: Option<Vec<Value>>,
}

/// Raw product entry. Fields stay loose JSON since the database mixes types.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct OffProduct {
    #[serde(default)]
    pub code: Option<Value>,
    #[serde(default)]
    pub product_name: Option<Value>,
    #[serde(default)]
    pub brands: Option<Value>,
    #[serde(default)]
    pub image_url: Option<Value>,
    #[serde(default)]
    pub nutriments: Option<Value>,
    /// Localized names (`product_name_it`, `product_name_en`, ...) land here.
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

fn text(v: Option<&Value>) -> Option<&str> {
    v?.as_str().map(str::trim).filter(|s| !s.is_empty())
}

impl OffProduct {
    /// `None` when the entry is not a JSON object.
    pub fn from_value(v: Value) -> Option<Self> {
        serde_json::from_value(v).ok()
    }

    /// Localized name when present and non-blank, else the generic one.
    pub fn display_name(&self, lang: &str) -> Option<String> {
        text(self.extra.get(&format!("product_name_{lang}")))
            .or_else(|| text(self.product_name.as_ref()))
            .map(str::to_string)
    }

    /// Nutriments come back as numbers or numeric strings depending on the product.
    pub fn nutriment(&self, key: &str) -> Option<f64> {
        match self.nutriments.as_ref()?.as_object()?.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn barcode(&self) -> Option<String> {
        match self.code.as_ref()? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn into_product(self, lang: &str, source: ProductSource) -> Option<Product> {
        let name = self.display_name(lang)?;
        Some(Product {
            barcode: self.barcode(),
            calories_100g: self.nutriment("energy-kcal_100g"),
            protein_100g: self.nutriment("proteins_100g"),
            carbs_100g: self.nutriment("carbohydrates_100g"),
            fat_100g: self.nutriment("fat_100g"),
            name,
            brands: text(self.brands.as_ref()).map(str::to_string),
            image_url: text(self.image_url.as_ref()).map(str::to_string),
            api_source: source,
        })
    }
}
