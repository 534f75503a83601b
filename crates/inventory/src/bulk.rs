use serde::{Deserialize, Serialize};

use painterp_core::{BrandId, DomainError, DomainResult};

use crate::product::NewProduct;
use crate::size::StockBySize;

/// One entry of a bulk upload, as submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BulkRow {
    pub name: Option<String>,
    pub product_code: Option<String>,
    pub colour: Option<String>,
    pub stock_by_size: Option<StockBySize>,
    pub low_stock_threshold: Option<i64>,
    pub product_image: Option<String>,
    pub description: Option<String>,
}

impl BulkRow {
    /// Trimmed product code, if any.
    pub fn code(&self) -> Option<&str> {
        self.product_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    /// Validate the row and turn it into a creation request for `brand`.
    ///
    /// The display name becomes `"{name} - {colour}"` when a colour is given.
    pub fn into_new_product(self, brand: BrandId, product_type: &str) -> DomainResult<NewProduct> {
        let base_name = self
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| DomainError::validation("Name and product code are required"))?;
        let code = self
            .code()
            .ok_or_else(|| DomainError::validation("Name and product code are required"))?
            .to_string();

        let name = match self.colour.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            Some(colour) => format!("{base_name} - {colour}"),
            None => base_name.to_string(),
        };

        Ok(NewProduct {
            name,
            brand,
            product_type: product_type.to_string(),
            stock_by_size: Some(self.stock_by_size.unwrap_or_default()),
            product_code: Some(code),
            product_image: self.product_image,
            low_stock_threshold: self.low_stock_threshold,
            description: self.description,
            ..NewProduct::default()
        })
    }
}
