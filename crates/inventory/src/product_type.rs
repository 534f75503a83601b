use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use painterp_core::{DomainError, DomainResult, ProductTypeId};

/// Collides with the `/products/:id/stock` route, so no type may use it.
pub const RESERVED_TYPE_NAME: &str = "stock";

/// Explicit product type record (global, unique by name).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductType {
    id: ProductTypeId,
    name: String,
    icon: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProductType {
    pub fn create(
        id: ProductTypeId,
        name: &str,
        icon: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        Ok(Self {
            id,
            name: Self::normalize_name(name)?,
            icon: icon.unwrap_or_default(),
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn normalize_name(name: &str) -> DomainResult<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("Product type name is required"));
        }
        check_not_reserved(name)?;
        Ok(name.to_string())
    }

    /// Upsert path for an existing record: refresh the icon (when given) and re-activate.
    pub fn refresh(&mut self, icon: Option<String>, now: DateTime<Utc>) {
        if let Some(icon) = icon {
            self.icon = icon;
        }
        self.is_active = true;
        self.updated_at = now;
    }

    pub fn id(&self) -> ProductTypeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn icon(&self) -> &str {
        &self.icon
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

pub(crate) fn check_not_reserved(name: &str) -> DomainResult<()> {
    if name.eq_ignore_ascii_case(RESERVED_TYPE_NAME) {
        return Err(DomainError::validation(format!(
            "Product type name '{RESERVED_TYPE_NAME}' is reserved"
        )));
    }
    Ok(())
}

/// One entry of a merged type listing.
///
/// `id` is `None` for types that only exist as a `type` string on products
/// (legacy data without a record).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeEntry {
    pub id: Option<ProductTypeId>,
    pub name: String,
    pub icon: String,
}

/// Merge explicit type records with type strings found on products.
///
/// De-duplicates by exact name (records win), sorted lexicographically.
/// Inactive records are skipped.
pub fn merge_type_entries<'a>(
    records: &[ProductType],
    product_types: impl IntoIterator<Item = &'a str>,
) -> Vec<TypeEntry> {
    let mut merged: BTreeMap<String, TypeEntry> = BTreeMap::new();

    for record in records.iter().filter(|r| r.is_active) {
        merged.insert(
            record.name.clone(),
            TypeEntry {
                id: Some(record.id),
                name: record.name.clone(),
                icon: record.icon.clone(),
            },
        );
    }

    for name in product_types {
        let name = name.trim();
        if name.is_empty() || merged.contains_key(name) {
            continue;
        }
        merged.insert(
            name.to_string(),
            TypeEntry {
                id: None,
                name: name.to_string(),
                icon: String::new(),
            },
        );
    }

    merged.into_values().collect()
}
