use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, instrument};

use painterp_core::{DomainError, InvoiceId, ProductId, UserId};
use painterp_inventory::Product;
use painterp_invoicing::{CartLine, DEFAULT_TAX_RATE, Invoice, invoice_number, price_cart};

use crate::error::ServiceResult;
use crate::store::CatalogStore;

pub const DEFAULT_PAGE_LIMIT: u64 = 10;
pub const MAX_PAGE_LIMIT: u64 = 100;

/// An invoice with the products its lines reference.
///
/// `products` may lack entries for products removed from storage; line
/// snapshots stay authoritative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceView {
    pub invoice: Invoice,
    pub products: HashMap<ProductId, Product>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoicePage {
    pub items: Vec<InvoiceView>,
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub pages: u64,
}

/// Invoice creation and owner-scoped invoice queries.
#[derive(Clone)]
pub struct BillingService {
    store: Arc<dyn CatalogStore>,
    default_tax_rate: Decimal,
}

impl BillingService {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self {
            store,
            default_tax_rate: DEFAULT_TAX_RATE,
        }
    }

    pub fn with_default_tax_rate(mut self, rate: Decimal) -> Self {
        self.default_tax_rate = rate;
        self
    }

    /// Price the cart against current stock, then commit the stock
    /// decrements and the invoice as one unit.
    #[instrument(skip(self, lines), fields(user_id = %user, lines = lines.len()), err)]
    pub async fn create_invoice(
        &self,
        user: UserId,
        lines: Vec<CartLine>,
        tax_rate: Option<Decimal>,
    ) -> ServiceResult<InvoiceView> {
        let tax_rate = tax_rate.unwrap_or(self.default_tax_rate);
        if tax_rate < Decimal::ZERO {
            return Err(DomainError::validation("Tax rate cannot be negative").into());
        }
        if lines.is_empty() {
            return Err(DomainError::validation("Invoice must have at least one item").into());
        }

        let mut ids: Vec<ProductId> = lines.iter().map(|l| l.product_id).collect();
        ids.sort();
        ids.dedup();
        let snapshot: BTreeMap<ProductId, Product> = self
            .store
            .get_products(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id(), p))
            .collect();

        let now = Utc::now();
        let priced = price_cart(&lines, snapshot, now)?;

        let count = self.store.count_invoices().await?;
        let invoice = Invoice::issue(
            InvoiceId::new(),
            invoice_number(now, count),
            user,
            &priced,
            tax_rate,
            now,
        )?;

        self.store
            .commit_sale(&invoice, &priced.stock_changes, now)
            .await?;

        info!(
            invoice_id = %invoice.id(),
            invoice_no = invoice.invoice_no(),
            total = %invoice.total(),
            "invoice created"
        );

        // Expand with post-sale product state.
        let products = self.products_for(&invoice).await?;
        Ok(InvoiceView { invoice, products })
    }

    /// Newest first. `page` and `limit` start at 1; `limit` is capped.
    pub async fn list_invoices(
        &self,
        user: UserId,
        page: Option<u64>,
        limit: Option<u64>,
    ) -> ServiceResult<InvoicePage> {
        let page = page.unwrap_or(1);
        let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT);
        if page < 1 {
            return Err(DomainError::validation("page must be at least 1").into());
        }
        if limit < 1 {
            return Err(DomainError::validation("limit must be at least 1").into());
        }
        let limit = limit.min(MAX_PAGE_LIMIT);
        let offset = (page - 1).saturating_mul(limit);

        let (invoices, total) = self.store.list_invoices(user, offset, limit).await?;

        let mut items = Vec::with_capacity(invoices.len());
        for invoice in invoices {
            let products = self.products_for(&invoice).await?;
            items.push(InvoiceView { invoice, products });
        }

        Ok(InvoicePage {
            items,
            page,
            limit,
            total,
            pages: total.div_ceil(limit),
        })
    }

    pub async fn get_invoice(&self, user: UserId, id: InvoiceId) -> ServiceResult<InvoiceView> {
        let invoice = self
            .store
            .get_invoice(user, id)
            .await?
            .ok_or_else(|| DomainError::not_found("Invoice not found"))?;
        let products = self.products_for(&invoice).await?;
        Ok(InvoiceView { invoice, products })
    }

    async fn products_for(&self, invoice: &Invoice) -> ServiceResult<HashMap<ProductId, Product>> {
        let mut ids: Vec<ProductId> = invoice.items().iter().map(|l| l.product).collect();
        ids.sort();
        ids.dedup();
        Ok(self
            .store
            .get_products(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id(), p))
            .collect())
    }
}
