use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use painterp_core::{BrandId, InvoiceId, ProductId, ProductTypeId, UserId};
use painterp_inventory::{Brand, Product, ProductKey, ProductType, StockChange, base_code_of};
use painterp_invoicing::Invoice;

use super::{CatalogStore, ProductEdit, ProductFilter, StoreError, product_not_found};

#[derive(Debug, Default)]
struct State {
    brands: HashMap<BrandId, Brand>,
    product_types: HashMap<ProductTypeId, ProductType>,
    products: HashMap<ProductId, Product>,
    /// Insertion order.
    invoices: Vec<Invoice>,
}

impl State {
    fn key_taken(&self, candidate: &Product) -> bool {
        let key = candidate.uniqueness_key();
        self.products.values().any(|p| {
            p.id() != candidate.id() && p.brand() == candidate.brand() && p.uniqueness_key() == key
        })
    }
}

/// In-memory catalog store.
///
/// Intended for tests/dev. One write lock per mutation gives the same
/// all-or-nothing behavior as the Postgres transactions.
#[derive(Debug, Default)]
pub struct InMemoryCatalogStore {
    state: RwLock<State>,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, State>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, State>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }
}

fn sorted_by_name(mut products: Vec<Product>) -> Vec<Product> {
    products.sort_by(|a, b| a.name().cmp(b.name()));
    products
}

#[async_trait::async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn insert_brand(&self, brand: &Brand) -> Result<(), StoreError> {
        let mut state = self.write()?;
        if state.brands.values().any(|b| b.name() == brand.name()) {
            return Err(StoreError::Duplicate(
                "Brand with this name already exists".to_string(),
            ));
        }
        state.brands.insert(brand.id(), brand.clone());
        Ok(())
    }

    async fn get_brand(&self, id: BrandId) -> Result<Option<Brand>, StoreError> {
        Ok(self.read()?.brands.get(&id).cloned())
    }

    async fn find_brand_by_name(&self, name: &str) -> Result<Option<Brand>, StoreError> {
        Ok(self
            .read()?
            .brands
            .values()
            .find(|b| b.name() == name)
            .cloned())
    }

    async fn list_active_brands(&self) -> Result<Vec<Brand>, StoreError> {
        let mut brands: Vec<Brand> = self
            .read()?
            .brands
            .values()
            .filter(|b| b.is_active())
            .cloned()
            .collect();
        brands.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(brands)
    }

    async fn get_brands(&self, ids: &[BrandId]) -> Result<Vec<Brand>, StoreError> {
        let state = self.read()?;
        Ok(ids.iter().filter_map(|id| state.brands.get(id).cloned()).collect())
    }

    async fn find_product_type(&self, name: &str) -> Result<Option<ProductType>, StoreError> {
        Ok(self
            .read()?
            .product_types
            .values()
            .find(|t| t.name() == name)
            .cloned())
    }

    async fn save_product_type(&self, product_type: &ProductType) -> Result<(), StoreError> {
        let mut state = self.write()?;
        if state
            .product_types
            .values()
            .any(|t| t.id() != product_type.id() && t.name() == product_type.name())
        {
            return Err(StoreError::Duplicate(
                "Product type with this name already exists".to_string(),
            ));
        }
        state
            .product_types
            .insert(product_type.id(), product_type.clone());
        Ok(())
    }

    async fn list_product_types(&self) -> Result<Vec<ProductType>, StoreError> {
        Ok(self.read()?.product_types.values().cloned().collect())
    }

    async fn product_types_in_use(&self, brand: Option<BrandId>) -> Result<Vec<String>, StoreError> {
        let state = self.read()?;
        let types: BTreeSet<String> = state
            .products
            .values()
            .filter(|p| p.is_active() && brand.is_none_or(|b| b == p.brand()))
            .map(|p| p.product_type().to_string())
            .collect();
        Ok(types.into_iter().collect())
    }

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        let mut state = self.write()?;
        if state.key_taken(product) {
            return Err(StoreError::Duplicate(
                product.uniqueness_key().conflict_message(),
            ));
        }
        state.products.insert(product.id(), product.clone());
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.read()?.products.get(&id).cloned())
    }

    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError> {
        let state = self.read()?;
        Ok(ids
            .iter()
            .filter_map(|id| state.products.get(id).cloned())
            .collect())
    }

    async fn find_product_by_key(
        &self,
        brand: BrandId,
        key: &ProductKey,
    ) -> Result<Option<Product>, StoreError> {
        Ok(self
            .read()?
            .products
            .values()
            .find(|p| p.brand() == brand && &p.uniqueness_key() == key)
            .cloned())
    }

    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, StoreError> {
        let products = self
            .read()?
            .products
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        Ok(sorted_by_name(products))
    }

    async fn update_product(&self, id: ProductId, edit: ProductEdit<'_>) -> Result<Product, StoreError> {
        let mut state = self.write()?;
        let mut product = state
            .products
            .get(&id)
            .cloned()
            .ok_or_else(product_not_found)?;

        edit(&mut product)?;

        if state.key_taken(&product) {
            return Err(StoreError::Duplicate(
                product.uniqueness_key().conflict_message(),
            ));
        }
        state.products.insert(id, product.clone());
        Ok(product)
    }

    async fn propagate_image(
        &self,
        brand: BrandId,
        base_code: &str,
        image: &str,
        except: ProductId,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut state = self.write()?;
        let mut changed = 0;
        for product in state.products.values_mut() {
            if product.id() != except
                && product.brand() == brand
                && base_code_of(product.product_code()) == Some(base_code)
            {
                product.set_image(image, now);
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn count_invoices(&self) -> Result<u64, StoreError> {
        Ok(self.read()?.invoices.len() as u64)
    }

    async fn commit_sale(
        &self,
        invoice: &Invoice,
        changes: &[(ProductId, StockChange)],
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut state = self.write()?;

        if state
            .invoices
            .iter()
            .any(|i| i.invoice_no() == invoice.invoice_no())
        {
            return Err(StoreError::Duplicate(format!(
                "Invoice number {} already exists",
                invoice.invoice_no()
            )));
        }

        // Work on copies; write back only once every change succeeded.
        let mut touched: HashMap<ProductId, Product> = HashMap::new();
        for (id, change) in changes {
            if !touched.contains_key(id) {
                let current = state
                    .products
                    .get(id)
                    .filter(|p| p.is_active())
                    .cloned()
                    .ok_or_else(product_not_found)?;
                touched.insert(*id, current);
            }
            if let Some(product) = touched.get_mut(id) {
                product.apply_stock_change(*change, now)?;
            }
        }

        state.products.extend(touched);
        state.invoices.push(invoice.clone());
        Ok(())
    }

    async fn list_invoices(
        &self,
        user: UserId,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<Invoice>, u64), StoreError> {
        let state = self.read()?;
        let mut owned: Vec<&Invoice> = state.invoices.iter().filter(|i| i.user() == user).collect();
        let total = owned.len() as u64;
        // Newest first; ties keep reverse insertion order.
        owned.reverse();
        owned.sort_by(|a, b| b.created_at().cmp(&a.created_at()));

        let page = owned
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn get_invoice(&self, user: UserId, id: InvoiceId) -> Result<Option<Invoice>, StoreError> {
        Ok(self
            .read()?
            .invoices
            .iter()
            .find(|i| i.id() == id && i.user() == user)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use painterp_core::DomainError;
    use painterp_inventory::{ContainerSize, NewProduct, StockBySize};
    use painterp_invoicing::{CartLine, DEFAULT_TAX_RATE, price_cart};
    use rust_decimal::Decimal;

    async fn seeded_brand(store: &InMemoryCatalogStore) -> Brand {
        let brand = Brand::create(BrandId::new(), "Nerolac", None, Utc::now()).unwrap();
        store.insert_brand(&brand).await.unwrap();
        brand
    }

    fn product(brand: BrandId, name: &str, code: &str, one_litre: i64) -> Product {
        let new = NewProduct {
            name: name.to_string(),
            brand,
            product_type: "Enamel".to_string(),
            product_code: Some(code.to_string()),
            stock_by_size: Some(StockBySize::from_pairs([(ContainerSize::OneLitre, one_litre)])),
            ..NewProduct::default()
        };
        Product::create(ProductId::new(), new, Utc::now()).unwrap()
    }

    #[tokio::test]
    async fn duplicate_brand_names_are_rejected() {
        let store = InMemoryCatalogStore::new();
        seeded_brand(&store).await;
        let again = Brand::create(BrandId::new(), "Nerolac", None, Utc::now()).unwrap();
        assert!(matches!(
            store.insert_brand(&again).await,
            Err(StoreError::Duplicate(_))
        ));
    }

    #[tokio::test]
    async fn product_codes_are_unique_per_brand() {
        let store = InMemoryCatalogStore::new();
        let brand = seeded_brand(&store).await;
        store
            .insert_product(&product(brand.id(), "Satin", "NS-1", 1))
            .await
            .unwrap();

        let clash = product(brand.id(), "Satin Gloss", "NS-1", 1);
        assert!(matches!(
            store.insert_product(&clash).await,
            Err(StoreError::Duplicate(_))
        ));

        // Same code under another brand is fine.
        let other = product(BrandId::new(), "Satin", "NS-1", 1);
        store.insert_product(&other).await.unwrap();
    }

    #[tokio::test]
    async fn failed_edit_writes_nothing() {
        let store = InMemoryCatalogStore::new();
        let brand = seeded_brand(&store).await;
        let p = product(brand.id(), "Satin", "NS-1", 2);
        store.insert_product(&p).await.unwrap();

        let res = store
            .update_product(
                p.id(),
                Box::new(|p: &mut Product| {
                    p.apply_stock_change(StockChange::SetTotal { count: 50 }, Utc::now())?;
                    Err(DomainError::validation("boom"))
                }),
            )
            .await;
        assert!(matches!(res, Err(StoreError::Rejected(_))));
        assert_eq!(store.get_product(p.id()).await.unwrap().unwrap().stock(), 2);
    }

    #[tokio::test]
    async fn commit_sale_is_all_or_nothing() {
        let store = InMemoryCatalogStore::new();
        let brand = seeded_brand(&store).await;
        let plenty = product(brand.id(), "Satin", "NS-1", 10);
        let scarce = product(brand.id(), "Matt", "NM-1", 1);
        store.insert_product(&plenty).await.unwrap();
        store.insert_product(&scarce).await.unwrap();

        let cart = [
            CartLine {
                product_id: plenty.id(),
                quantity: 4,
                size: Some(ContainerSize::OneLitre),
                price: Some(Decimal::from(100)),
            },
            CartLine {
                product_id: scarce.id(),
                quantity: 1,
                size: Some(ContainerSize::OneLitre),
                price: Some(Decimal::from(100)),
            },
        ];
        let snapshot = [plenty.clone(), scarce.clone()]
            .into_iter()
            .map(|p| (p.id(), p))
            .collect();
        let priced = price_cart(&cart, snapshot, Utc::now()).unwrap();
        let invoice = Invoice::issue(
            InvoiceId::new(),
            "INV-1-1".into(),
            UserId::new(),
            &priced,
            DEFAULT_TAX_RATE,
            Utc::now(),
        )
        .unwrap();

        // Someone else sells the last tin first.
        store
            .update_product(
                scarce.id(),
                Box::new(|p: &mut Product| {
                    p.apply_stock_change(
                        StockChange::Remove {
                            size: Some(ContainerSize::OneLitre),
                            quantity: 1,
                        },
                        Utc::now(),
                    )
                }),
            )
            .await
            .unwrap();

        let res = store.commit_sale(&invoice, &priced.stock_changes, Utc::now()).await;
        assert!(matches!(
            res,
            Err(StoreError::Rejected(DomainError::InsufficientStock { .. }))
        ));

        let plenty_after = store.get_product(plenty.id()).await.unwrap().unwrap();
        assert_eq!(plenty_after.stock(), 10);
        assert_eq!(store.count_invoices().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn commit_sale_rejects_products_deleted_after_pricing() {
        let store = InMemoryCatalogStore::new();
        let brand = seeded_brand(&store).await;
        let p = product(brand.id(), "Satin", "NS-1", 10);
        store.insert_product(&p).await.unwrap();

        let cart = [CartLine {
            product_id: p.id(),
            quantity: 2,
            size: Some(ContainerSize::OneLitre),
            price: Some(Decimal::from(100)),
        }];
        let snapshot = [(p.id(), p.clone())].into_iter().collect();
        let priced = price_cart(&cart, snapshot, Utc::now()).unwrap();
        let invoice = Invoice::issue(
            InvoiceId::new(),
            "INV-1-1".into(),
            UserId::new(),
            &priced,
            DEFAULT_TAX_RATE,
            Utc::now(),
        )
        .unwrap();

        store
            .update_product(
                p.id(),
                Box::new(|p: &mut Product| {
                    p.deactivate(Utc::now());
                    Ok(())
                }),
            )
            .await
            .unwrap();

        let res = store.commit_sale(&invoice, &priced.stock_changes, Utc::now()).await;
        assert!(matches!(res, Err(StoreError::Rejected(DomainError::NotFound(_)))));

        let after = store.get_product(p.id()).await.unwrap().unwrap();
        assert_eq!(after.stock(), 10);
        assert_eq!(store.count_invoices().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn image_propagates_to_code_family_only() {
        let store = InMemoryCatalogStore::new();
        let brand = seeded_brand(&store).await;
        let red = product(brand.id(), "Satin Red", "NS-RED", 1);
        let blue = product(brand.id(), "Satin Blue", "NS-BLUE", 1);
        let other = product(brand.id(), "Matt", "NM-1", 1);
        for p in [&red, &blue, &other] {
            store.insert_product(p).await.unwrap();
        }

        let changed = store
            .propagate_image(brand.id(), "NS", "satin.png", red.id(), Utc::now())
            .await
            .unwrap();
        assert_eq!(changed, 1);
        assert_eq!(
            store.get_product(blue.id()).await.unwrap().unwrap().product_image(),
            "satin.png"
        );
        assert_eq!(
            store.get_product(other.id()).await.unwrap().unwrap().product_image(),
            ""
        );
    }
}
