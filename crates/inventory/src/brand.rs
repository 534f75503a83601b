use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use painterp_core::{BrandId, DomainError, DomainResult};

/// A paint brand (catalog root for products).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Brand {
    id: BrandId,
    name: String,
    image: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Brand {
    /// Build a new active brand. The name is trimmed and must not be empty.
    pub fn create(
        id: BrandId,
        name: &str,
        image: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = Self::normalize_name(name)?;
        Ok(Self {
            id,
            name,
            image: image.unwrap_or_default(),
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }

    /// Trimmed brand name, as used for uniqueness checks.
    pub fn normalize_name(name: &str) -> DomainResult<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("Brand name is required"));
        }
        Ok(name.to_string())
    }

    pub fn id(&self) -> BrandId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn image(&self) -> &str {
        &self.image
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
