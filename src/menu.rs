use log::{debug, info};
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MenuError {
    #[error("failed to read menu file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse menu: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Menu prices show up both as plain numbers and as preformatted labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Price {
    Amount(f64),
    Label(String),
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Price::Amount(amount) => write!(f, "{}", amount),
            Price::Label(label) => f.write_str(label.trim().trim_start_matches(['$', '₹']).trim_start()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub name: String,
    pub price: Price,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default, alias = "nutrition")]
    pub nutritional_value: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_url: Option<String>,
}

impl MenuItem {
    pub fn has_model(&self) -> bool {
        self.model_url.as_deref().is_some_and(|url| !url.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MenuCategory {
    pub name: String,
    pub items: Vec<MenuItem>,
}

/// The restaurant menu, grouped by category in file order.
///
/// Only the categorized map form (`{"Starters": [...], ...}`) is accepted.
/// A flat array of items is rejected at parse time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MenuCatalog {
    categories: Vec<MenuCategory>,
}

impl MenuCatalog {
    pub fn from_json(raw: &str) -> Result<Self, MenuError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, MenuError> {
        let path = path.as_ref();
        debug!("Loading menu from {}", path.display());
        let raw = tokio::fs::read_to_string(path).await?;
        let catalog = Self::from_json(&raw)?;
        info!(
            "Loaded menu with {} categories and {} items",
            catalog.categories.len(),
            catalog.len()
        );
        Ok(catalog)
    }

    pub fn categories(&self) -> &[MenuCategory] {
        &self.categories
    }

    /// Items in display order: category by category.
    pub fn items(&self) -> impl Iterator<Item = &MenuItem> {
        self.categories.iter().flat_map(|c| c.items.iter())
    }

    pub fn item(&self, index: usize) -> Option<&MenuItem> {
        self.items().nth(index)
    }

    pub fn len(&self) -> usize {
        self.categories.iter().map(|c| c.items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the catalog without the named categories. Names match
    /// case-insensitively, ignoring surrounding whitespace.
    pub fn without(&self, names: &[&str]) -> MenuCatalog {
        MenuCatalog {
            categories: self
                .categories
                .iter()
                .filter(|c| !names.iter().any(|name| c.name.trim().eq_ignore_ascii_case(name)))
                .cloned()
                .collect(),
        }
    }
}

impl Serialize for MenuCatalog {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.categories.len()))?;
        for category in &self.categories {
            map.serialize_entry(&category.name, &category.items)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for MenuCatalog {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CatalogVisitor;

        impl<'de> Visitor<'de> for CatalogVisitor {
            type Value = MenuCatalog;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of category name to a list of menu items")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<MenuCatalog, A::Error> {
                let mut categories = Vec::new();
                while let Some((name, items)) = access.next_entry::<String, Vec<MenuItem>>()? {
                    categories.push(MenuCategory { name, items });
                }
                Ok(MenuCatalog { categories })
            }
        }

        deserializer.deserialize_map(CatalogVisitor)
    }
}
