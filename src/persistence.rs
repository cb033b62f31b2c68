//! Whole-file JSON snapshots for the four stores.
//!
//! Each store is written in full on every mutation: `users.json`,
//! `carts.json`, `orders.json` and `catalog.json` under the configured data
//! directory. Loading tolerates missing or malformed files by starting empty,
//! so a corrupt snapshot degrades to a fresh store instead of refusing to
//! boot.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{error, info, warn};

use crate::errors::ServiceError;
use crate::models::{CartLineItem, Category, Order, User, UserId};

const USERS_FILE: &str = "users.json";
const CARTS_FILE: &str = "carts.json";
const ORDERS_FILE: &str = "orders.json";
const CATALOG_FILE: &str = "catalog.json";
const CATALOG_VERSION: &str = "1.0";

/// Metadata envelope written alongside the catalog mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogMetadata {
    pub updated_at: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct CatalogFile {
    metadata: CatalogMetadata,
    catalog: Map<String, Value>,
}

/// Handle to the snapshot directory.
#[derive(Debug, Clone)]
pub struct Snapshots {
    data_dir: PathBuf,
}

impl Snapshots {
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self, ServiceError> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("creating data directory {}", data_dir.display()))?;
        info!(data_dir = %data_dir.display(), "snapshot directory ready");
        Ok(Self { data_dir })
    }

    fn path(&self, file: &str) -> PathBuf {
        self.data_dir.join(file)
    }

    // ---- users ----

    pub fn load_users(&self) -> HashMap<UserId, User> {
        let raw: HashMap<String, User> = load_or_default(&self.path(USERS_FILE));
        raw.into_iter()
            .filter_map(|(key, mut user)| match key.parse::<UserId>() {
                Ok(id) => {
                    user.id = id;
                    Some((id, user))
                }
                Err(_) => {
                    warn!(%key, "skipping user entry with non-numeric id");
                    None
                }
            })
            .collect()
    }

    pub fn save_users(&self, users: &HashMap<UserId, User>) -> Result<(), ServiceError> {
        let keyed: HashMap<String, &User> =
            users.iter().map(|(id, user)| (id.to_string(), user)).collect();
        write_json(&self.path(USERS_FILE), &keyed)
    }

    // ---- carts ----

    pub fn load_carts(&self) -> HashMap<UserId, Vec<CartLineItem>> {
        let raw: HashMap<String, Vec<CartLineItem>> = load_or_default(&self.path(CARTS_FILE));
        raw.into_iter()
            .filter_map(|(key, items)| match key.parse::<UserId>() {
                Ok(id) => Some((id, items)),
                Err(_) => {
                    warn!(%key, "skipping cart entry with non-numeric id");
                    None
                }
            })
            .collect()
    }

    pub fn save_carts(
        &self,
        carts: &HashMap<UserId, Vec<CartLineItem>>,
    ) -> Result<(), ServiceError> {
        let keyed: HashMap<String, &Vec<CartLineItem>> = carts
            .iter()
            .map(|(id, items)| (id.to_string(), items))
            .collect();
        write_json(&self.path(CARTS_FILE), &keyed)
    }

    // ---- orders ----

    pub fn load_orders(&self) -> HashMap<String, Order> {
        load_or_default(&self.path(ORDERS_FILE))
    }

    pub fn save_orders(&self, orders: &HashMap<String, Order>) -> Result<(), ServiceError> {
        write_json(&self.path(ORDERS_FILE), orders)
    }

    // ---- catalog ----

    /// Loads the catalog preserving category order. Accepts either the
    /// metadata envelope or a bare category mapping.
    pub fn load_catalog(&self) -> Option<Vec<Category>> {
        let path = self.path(CATALOG_FILE);
        if !path.exists() {
            return None;
        }
        let value: Value = load_or_default(&path);
        let mapping = match &value {
            Value::Object(object) if object.contains_key("catalog") => {
                object.get("catalog").and_then(Value::as_object).cloned()
            }
            Value::Object(object) => Some(object.clone()),
            _ => None,
        }?;

        let mut categories = Vec::with_capacity(mapping.len());
        for (name, products) in mapping {
            match serde_json::from_value(products) {
                Ok(products) => categories.push(Category { name, products }),
                Err(e) => {
                    warn!(category = %name, error = %e, "skipping malformed catalog category");
                }
            }
        }
        Some(categories)
    }

    pub fn save_catalog(&self, categories: &[Category]) -> Result<(), ServiceError> {
        let mut mapping = Map::new();
        for category in categories {
            mapping.insert(
                category.name.clone(),
                serde_json::to_value(&category.products)?,
            );
        }
        let file = CatalogFile {
            metadata: CatalogMetadata {
                updated_at: Utc::now().to_rfc3339(),
                version: CATALOG_VERSION.to_string(),
            },
            catalog: mapping,
        };
        write_json(&self.path(CATALOG_FILE), &file)
    }
}

fn load_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    if !path.exists() {
        return T::default();
    }
    match fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(value) => value,
            Err(e) => {
                error!(path = %path.display(), error = %e, "malformed snapshot, starting empty");
                T::default()
            }
        },
        Err(e) => {
            error!(path = %path.display(), error = %e, "unreadable snapshot, starting empty");
            T::default()
        }
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ServiceError> {
    let contents = serde_json::to_string_pretty(value)?;
    fs::write(path, contents)
        .with_context(|| format!("writing snapshot {}", path.display()))?;
    Ok(())
}
