use std::sync::{Arc, RwLock};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{info, warn};

use crate::errors::ServiceError;
use crate::models::{Category, Product};
use crate::persistence::Snapshots;

/// A single editable attribute of a catalog product.
#[derive(Debug, Clone)]
pub enum ProductField {
    Name(String),
    Price(Decimal),
    RequiredFields(Vec<String>),
    DiscountEligible(bool),
}

/// Ordered category → products mapping. Mutated only by administrator
/// operations; read by browsing and checkout. Categories keep their insertion
/// order, matching the catalog file layout.
pub struct CatalogStore {
    inner: RwLock<Vec<Category>>,
    snapshots: Arc<Snapshots>,
}

impl CatalogStore {
    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Category>> {
        // A poisoned lock only means another thread panicked mid-edit; the
        // data itself is still usable.
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Category>> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Restores the catalog from its snapshot, seeding the default catalog on
    /// first boot.
    pub fn load_or_seed(snapshots: Arc<Snapshots>) -> Self {
        let categories = match snapshots.load_catalog() {
            Some(categories) => categories,
            None => {
                info!("no catalog snapshot found, seeding default catalog");
                default_catalog()
            }
        };
        let store = Self {
            inner: RwLock::new(categories),
            snapshots,
        };
        store.flush();
        store
    }

    pub fn list_categories(&self) -> Vec<String> {
        self.read()
            .iter()
            .map(|category| category.name.clone())
            .collect()
    }

    pub fn get_category(&self, name: &str) -> Option<Vec<Product>> {
        self.read()
            .iter()
            .find(|category| category.name == name)
            .map(|category| category.products.clone())
    }

    pub fn get_product(&self, category: &str, index: usize) -> Option<Product> {
        self.read()
            .iter()
            .find(|entry| entry.name == category)
            .and_then(|entry| entry.products.get(index).cloned())
    }

    /// Finds a product by its display name across every category. Cart lines
    /// reference products by name only, so checkout uses this to recover the
    /// originating product's required fields.
    pub fn find_product_by_name(&self, name: &str) -> Option<Product> {
        self.read()
            .iter()
            .flat_map(|category| category.products.iter())
            .find(|product| product.name == name)
            .cloned()
    }

    pub fn add_category(&self, name: &str) -> Result<(), ServiceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::CatalogValidation(
                "o nome da categoria não pode ser vazio".to_string(),
            ));
        }
        {
            let mut categories = self.write();
            if categories.iter().any(|category| category.name == name) {
                return Err(ServiceError::DuplicateCategory(name.to_string()));
            }
            categories.push(Category::new(name));
        }
        self.flush();
        Ok(())
    }

    pub fn delete_category(&self, name: &str) -> Result<(), ServiceError> {
        {
            let mut categories = self.write();
            let position = categories
                .iter()
                .position(|category| category.name == name)
                .ok_or_else(|| ServiceError::NotFound(format!("categoria {name}")))?;
            categories.remove(position);
        }
        self.flush();
        Ok(())
    }

    pub fn add_product(&self, category: &str, product: Product) -> Result<(), ServiceError> {
        validate_product(&product)?;
        {
            let mut categories = self.write();
            let entry = categories
                .iter_mut()
                .find(|entry| entry.name == category)
                .ok_or_else(|| ServiceError::NotFound(format!("categoria {category}")))?;
            entry.products.push(product);
        }
        self.flush();
        Ok(())
    }

    /// Edits a single attribute of an existing product. Validation runs
    /// before anything is mutated.
    pub fn update_product_field(
        &self,
        category: &str,
        index: usize,
        field: ProductField,
    ) -> Result<Product, ServiceError> {
        validate_field(&field)?;
        let updated = {
            let mut categories = self.write();
            let entry = categories
                .iter_mut()
                .find(|entry| entry.name == category)
                .ok_or_else(|| ServiceError::NotFound(format!("categoria {category}")))?;
            let product = entry
                .products
                .get_mut(index)
                .ok_or_else(|| ServiceError::NotFound(format!("produto {index}")))?;
            match field {
                ProductField::Name(name) => product.name = name,
                ProductField::Price(price) => product.unit_price = price,
                ProductField::RequiredFields(fields) => product.required_fields = Some(fields),
                ProductField::DiscountEligible(eligible) => product.discount_eligible = eligible,
            }
            product.clone()
        };
        self.flush();
        Ok(updated)
    }

    pub fn delete_product(&self, category: &str, index: usize) -> Result<Product, ServiceError> {
        let removed = {
            let mut categories = self.write();
            let entry = categories
                .iter_mut()
                .find(|entry| entry.name == category)
                .ok_or_else(|| ServiceError::NotFound(format!("categoria {category}")))?;
            if index >= entry.products.len() {
                return Err(ServiceError::NotFound(format!("produto {index}")));
            }
            entry.products.remove(index)
        };
        self.flush();
        Ok(removed)
    }

    fn flush(&self) {
        let categories = self.read();
        if let Err(e) = self.snapshots.save_catalog(&categories) {
            warn!(error = %e, "catalog flush failed, keeping in-memory state");
        }
    }
}

fn validate_product(product: &Product) -> Result<(), ServiceError> {
    if product.name.trim().is_empty() {
        return Err(ServiceError::CatalogValidation(
            "o nome do produto não pode ser vazio".to_string(),
        ));
    }
    if product.unit_price <= Decimal::ZERO {
        return Err(ServiceError::CatalogValidation(
            "o preço deve ser maior que zero".to_string(),
        ));
    }
    if let Some(fields) = &product.required_fields {
        if fields.is_empty() || fields.iter().any(|field| field.trim().is_empty()) {
            return Err(ServiceError::CatalogValidation(
                "a lista de campos não pode ser vazia".to_string(),
            ));
        }
    }
    Ok(())
}

fn validate_field(field: &ProductField) -> Result<(), ServiceError> {
    match field {
        ProductField::Name(name) if name.trim().is_empty() => Err(
            ServiceError::CatalogValidation("o nome do produto não pode ser vazio".to_string()),
        ),
        ProductField::Price(price) if *price <= Decimal::ZERO => Err(
            ServiceError::CatalogValidation("o preço deve ser maior que zero".to_string()),
        ),
        ProductField::RequiredFields(fields)
            if fields.is_empty() || fields.iter().any(|f| f.trim().is_empty()) =>
        {
            Err(ServiceError::CatalogValidation(
                "a lista de campos não pode ser vazia".to_string(),
            ))
        }
        _ => Ok(()),
    }
}

/// The catalog shipped on first boot.
pub fn default_catalog() -> Vec<Category> {
    let field = |name: &str| vec![name.to_string()];
    vec![
        Category {
            name: "ATIVAR APP".to_string(),
            products: vec![
                Product::new("⚡ QUICK PLAYER R$65", dec!(65.00)).with_fields(field("MAC")),
                Product::new("📱 NINJA PLAYER R$65", dec!(65.00))
                    .with_fields(vec!["MAC".to_string(), "CHAVE OTP".to_string()]),
                Product::new("📺 MEGA IPTV R$65", dec!(65.00)).with_fields(field("MAC")),
                Product::new("🧠 SMART ONE R$60", dec!(60.00)).with_fields(field("MAC")),
                Product::new("🎮 IBO PRO PLAYER R$50", dec!(50.00)).with_fields(field("MAC")),
                Product::new("📡 IBO TV OFICIAL R$50", dec!(50.00)).with_fields(field("MAC")),
                Product::new("🧩 DUPLECAST R$60", dec!(60.00)).with_fields(field("MAC")),
                Product::new("🌐 BAY TV R$60", dec!(60.00)).with_fields(field("MAC")),
                Product::new("🎥 VU PLAYER R$50", dec!(50.00)).with_fields(field("MAC")),
                Product::new("🔥 SUPER PLAY R$50", dec!(50.00)).with_fields(field("MAC")),
                Product::new("☁️ CLOUDDY R$65", dec!(65.00))
                    .with_fields(vec!["E-mail".to_string(), "Senha do app".to_string()]),
            ],
        },
        Category {
            name: "COMPRAR CRÉDITOS".to_string(),
            products: vec![
                Product::new("⚡ FAST PLAYER (13,50und)", dec!(13.50)).with_discount(),
                Product::new("👑 GOLD PLAY (13,50und)", dec!(13.50)).with_discount(),
                Product::new("📺 EI TV (13,50und)", dec!(13.50)).with_discount(),
                Product::new("🛰️ Z TECH (13,50und)", dec!(13.50)).with_discount(),
                Product::new("🧠 GENIAL PLAY (13,50und)", dec!(13.50)).with_discount(),
                Product::new("🚀 UPPER PLAY (14,50und)", dec!(14.50)),
            ],
        },
        Category {
            name: "🔥 PROMOÇÕES".to_string(),
            products: vec![Product::new("📺 PACOTE 10 CRÉDITOS EI TV", dec!(300.00))],
        },
    ]
}
