//! Catalog operations and the cached featured-products list.
//!
//! The featured list is read through the session cache (`featured_products`,
//! no TTL). Every product write that can change the list calls
//! [`FeaturedProducts::invalidate`], which writes a fresh snapshot.

use thiserror::Error;

use bazaar_core::ProductId;

use crate::cache::{CacheError, FEATURED_PRODUCTS_KEY, SessionCache};
use crate::db::{ProductStore, RepositoryError};
use crate::models::{NewProduct, Product, ProductPatch};

/// Errors from catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// No product with that ID.
    #[error("product not found")]
    NotFound,

    /// Rejected input.
    #[error("invalid product: {0}")]
    Invalid(String),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// The featured snapshot could not be written.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
}

/// Cache-aside access to the featured products.
pub struct FeaturedProducts<'a> {
    products: &'a dyn ProductStore,
    cache: &'a dyn SessionCache,
}

impl<'a> FeaturedProducts<'a> {
    #[must_use]
    pub const fn new(products: &'a dyn ProductStore, cache: &'a dyn SessionCache) -> Self {
        Self { products, cache }
    }

    /// The featured products, ordered by ID.
    ///
    /// Served from the cache when possible. On a miss the list is loaded from
    /// the store and cached. Cache failures fall back to the store.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the store query fails.
    pub async fn get(&self) -> Result<Vec<Product>, CatalogError> {
        match self.cache.get(FEATURED_PRODUCTS_KEY).await {
            Ok(Some(json)) => match serde_json::from_str::<Vec<Product>>(&json) {
                Ok(products) => return Ok(products),
                Err(e) => {
                    tracing::warn!(error = %e, "Discarding unreadable featured products cache entry");
                }
            },
            Ok(None) => tracing::debug!("Featured products cache miss"),
            Err(e) => tracing::warn!(error = %e, "Featured products cache read failed"),
        }

        let products = self.products.list_featured().await?;
        self.store(&products).await;
        Ok(products)
    }

    /// Recompute the featured list and overwrite the cache entry.
    ///
    /// Returns the snapshot that was written.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the store query fails, or
    /// `CatalogError::Cache` if the entry could not be written.
    pub async fn rebuild(&self) -> Result<Vec<Product>, CatalogError> {
        let products = self.products.list_featured().await?;
        let json = serde_json::to_string(&products).map_err(CacheError::from)?;
        self.cache.set(FEATURED_PRODUCTS_KEY, &json, None).await?;
        Ok(products)
    }

    /// Like [`Self::rebuild`], but never fails the calling write.
    ///
    /// If the rebuild fails the entry is deleted instead, so the next read
    /// repopulates it.
    pub async fn invalidate(&self) {
        if let Err(e) = self.rebuild().await {
            tracing::error!(error = %e, "Failed to rebuild featured products cache");
            self.evict().await;
        }
    }

    /// Write a snapshot on the read path. Failures are only logged.
    async fn store(&self, products: &[Product]) {
        let json = match serde_json::to_string(products) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize featured products");
                return;
            }
        };

        if let Err(e) = self.cache.set(FEATURED_PRODUCTS_KEY, &json, None).await {
            tracing::warn!(error = %e, "Failed to cache featured products");
        }
    }

    async fn evict(&self) {
        if let Err(e) = self.cache.del(FEATURED_PRODUCTS_KEY).await {
            tracing::error!(error = %e, "Failed to evict featured products cache entry");
        }
    }
}

/// Product reads and writes, keeping the featured cache in step.
pub struct CatalogService<'a> {
    products: &'a dyn ProductStore,
    featured: FeaturedProducts<'a>,
}

impl<'a> CatalogService<'a> {
    #[must_use]
    pub const fn new(products: &'a dyn ProductStore, cache: &'a dyn SessionCache) -> Self {
        Self {
            products,
            featured: FeaturedProducts::new(products, cache),
        }
    }

    /// The cached featured list.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the store query fails.
    pub async fn featured(&self) -> Result<Vec<Product>, CatalogError> {
        self.featured.get().await
    }

    /// Every product.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the store query fails.
    pub async fn list_products(&self) -> Result<Vec<Product>, CatalogError> {
        Ok(self.products.list().await?)
    }

    /// One product.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if there is no such product.
    pub async fn get_product(&self, id: ProductId) -> Result<Product, CatalogError> {
        self.products
            .find_by_id(id)
            .await?
            .ok_or(CatalogError::NotFound)
    }

    /// Add a product.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Invalid` for a blank name or category, or a
    /// negative stock count.
    pub async fn create_product(&self, input: NewProduct) -> Result<Product, CatalogError> {
        validate_text("name", &input.name)?;
        validate_text("category", &input.category)?;
        validate_stock(input.count_in_stock)?;

        let product = self.products.create(input).await?;
        tracing::info!(product_id = %product.id, featured = product.is_featured, "Product created");

        if product.is_featured {
            self.featured.invalidate().await;
        }
        Ok(product)
    }

    /// Change some fields of a product.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if there is no such product, or
    /// `CatalogError::Invalid` if the result would be invalid.
    pub async fn update_product(
        &self,
        id: ProductId,
        patch: ProductPatch,
    ) -> Result<Product, CatalogError> {
        let mut product = self.get_product(id).await?;
        let was_featured = product.is_featured;

        patch.apply(&mut product);
        validate_text("name", &product.name)?;
        validate_text("category", &product.category)?;
        validate_stock(product.count_in_stock)?;

        let saved = self.save(&product).await?;
        tracing::info!(product_id = %id, "Product updated");

        if was_featured || saved.is_featured {
            self.featured.invalidate().await;
        }
        Ok(saved)
    }

    /// Flip the featured flag of a product.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if there is no such product.
    pub async fn toggle_featured(&self, id: ProductId) -> Result<Product, CatalogError> {
        let mut product = self.get_product(id).await?;
        product.is_featured = !product.is_featured;

        let saved = self.save(&product).await?;
        tracing::info!(product_id = %id, featured = saved.is_featured, "Product featured flag toggled");

        self.featured.invalidate().await;
        Ok(saved)
    }

    /// Remove a product.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if there is no such product.
    pub async fn delete_product(&self, id: ProductId) -> Result<Product, CatalogError> {
        let deleted = self
            .products
            .delete(id)
            .await?
            .ok_or(CatalogError::NotFound)?;
        tracing::info!(product_id = %id, "Product deleted");

        if deleted.is_featured {
            self.featured.invalidate().await;
        }
        Ok(deleted)
    }

    async fn save(&self, product: &Product) -> Result<Product, CatalogError> {
        self.products.save(product).await.map_err(|e| match e {
            RepositoryError::NotFound => CatalogError::NotFound,
            other => CatalogError::Repository(other),
        })
    }
}

fn validate_text(field: &str, value: &str) -> Result<(), CatalogError> {
    if value.trim().is_empty() {
        return Err(CatalogError::Invalid(format!("{field} is required")));
    }
    Ok(())
}

fn validate_stock(count: i32) -> Result<(), CatalogError> {
    if count < 0 {
        return Err(CatalogError::Invalid(
            "countInStock cannot be negative".to_owned(),
        ));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use bazaar_core::Price;
    use rust_decimal::Decimal;

    use super::*;
    use crate::cache::MemorySessionCache;
    use crate::db::memory::MemoryProductStore;

    fn new_product(name: &str, featured: bool) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            description: String::new(),
            price: Price::new(Decimal::new(999, 2)).unwrap(),
            image: String::new(),
            category: "tools".to_string(),
            brand: String::new(),
            count_in_stock: 1,
            is_featured: featured,
        }
    }

    async fn cached_names(cache: &MemorySessionCache) -> Option<Vec<String>> {
        let json = cache.get(FEATURED_PRODUCTS_KEY).await.unwrap()?;
        let products: Vec<Product> = serde_json::from_str(&json).unwrap();
        Some(products.into_iter().map(|p| p.name).collect())
    }

    /// A cache whose every call fails.
    struct BrokenCache;

    fn broken() -> CacheError {
        CacheError::Serialization(serde_json::from_str::<u8>("x").unwrap_err())
    }

    #[async_trait]
    impl SessionCache for BrokenCache {
        async fn set(&self, _: &str, _: &str, _: Option<Duration>) -> Result<(), CacheError> {
            Err(broken())
        }
        async fn get(&self, _: &str) -> Result<Option<String>, CacheError> {
            Err(broken())
        }
        async fn del(&self, _: &str) -> Result<(), CacheError> {
            Err(broken())
        }
        async fn ping(&self) -> Result<(), CacheError> {
            Err(broken())
        }
    }

    #[tokio::test]
    async fn test_second_read_is_served_from_cache() {
        let store = MemoryProductStore::new();
        let cache = MemorySessionCache::default();
        store.create(new_product("Hammer", true)).await.unwrap();
        store.create(new_product("Nail", false)).await.unwrap();

        let featured = FeaturedProducts::new(&store, &cache);
        let first = featured.get().await.unwrap();
        let second = featured.get().await.unwrap();

        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
        assert_eq!(first.len(), 1);
        assert_eq!(store.featured_reads(), 1);
    }

    #[tokio::test]
    async fn test_unreadable_entry_is_replaced() {
        let store = MemoryProductStore::new();
        let cache = MemorySessionCache::default();
        store.create(new_product("Hammer", true)).await.unwrap();
        cache.set(FEATURED_PRODUCTS_KEY, "{not json", None).await.unwrap();

        let products = FeaturedProducts::new(&store, &cache).get().await.unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(cached_names(&cache).await.unwrap(), vec!["Hammer"]);
    }

    #[tokio::test]
    async fn test_broken_cache_falls_back_to_store() {
        let store = MemoryProductStore::new();
        store.create(new_product("Hammer", true)).await.unwrap();

        let featured = FeaturedProducts::new(&store, &BrokenCache);
        assert_eq!(featured.get().await.unwrap().len(), 1);
        assert_eq!(featured.get().await.unwrap().len(), 1);
        assert_eq!(store.featured_reads(), 2);

        // Writes still succeed when the cache is down.
        let catalog = CatalogService::new(&store, &BrokenCache);
        assert!(catalog.create_product(new_product("Saw", true)).await.is_ok());
    }

    #[tokio::test]
    async fn test_rebuild_reports_failed_write() {
        let store = MemoryProductStore::new();
        store.create(new_product("Hammer", true)).await.unwrap();

        let result = FeaturedProducts::new(&store, &BrokenCache).rebuild().await;
        assert!(matches!(result, Err(CatalogError::Cache(_))));

        let cache = MemorySessionCache::default();
        let written = FeaturedProducts::new(&store, &cache).rebuild().await.unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(cached_names(&cache).await.unwrap(), vec!["Hammer"]);
    }

    #[tokio::test]
    async fn test_toggle_is_reflected() {
        let store = MemoryProductStore::new();
        let cache = MemorySessionCache::default();
        let catalog = CatalogService::new(&store, &cache);
        let hammer = catalog
            .create_product(new_product("Hammer", false))
            .await
            .unwrap();

        assert!(catalog.featured().await.unwrap().is_empty());

        catalog.toggle_featured(hammer.id).await.unwrap();
        let featured = catalog.featured().await.unwrap();
        assert_eq!(featured.len(), 1);
        assert!(featured[0].is_featured);

        catalog.toggle_featured(hammer.id).await.unwrap();
        assert!(catalog.featured().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_of_featured_product_is_reflected() {
        let store = MemoryProductStore::new();
        let cache = MemorySessionCache::default();
        let catalog = CatalogService::new(&store, &cache);
        let hammer = catalog
            .create_product(new_product("Hammer", true))
            .await
            .unwrap();
        catalog.featured().await.unwrap();

        let patch = ProductPatch {
            name: Some("Claw Hammer".to_string()),
            ..ProductPatch::default()
        };
        catalog.update_product(hammer.id, patch).await.unwrap();
        assert_eq!(cached_names(&cache).await.unwrap(), vec!["Claw Hammer"]);

        let unfeature = ProductPatch {
            is_featured: Some(false),
            ..ProductPatch::default()
        };
        catalog.update_product(hammer.id, unfeature).await.unwrap();
        assert!(cached_names(&cache).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_of_plain_product_leaves_cache_alone() {
        let store = MemoryProductStore::new();
        let cache = MemorySessionCache::default();
        let catalog = CatalogService::new(&store, &cache);
        let nail = catalog
            .create_product(new_product("Nail", false))
            .await
            .unwrap();
        catalog.featured().await.unwrap();
        let reads = store.featured_reads();

        let patch = ProductPatch {
            count_in_stock: Some(50),
            ..ProductPatch::default()
        };
        catalog.update_product(nail.id, patch).await.unwrap();
        assert_eq!(store.featured_reads(), reads);
    }

    #[tokio::test]
    async fn test_delete_of_featured_product_is_reflected() {
        let store = MemoryProductStore::new();
        let cache = MemorySessionCache::default();
        let catalog = CatalogService::new(&store, &cache);
        let hammer = catalog
            .create_product(new_product("Hammer", true))
            .await
            .unwrap();
        catalog
            .create_product(new_product("Saw", true))
            .await
            .unwrap();
        assert_eq!(catalog.featured().await.unwrap().len(), 2);

        catalog.delete_product(hammer.id).await.unwrap();
        assert_eq!(cached_names(&cache).await.unwrap(), vec!["Saw"]);
    }

    #[tokio::test]
    async fn test_missing_product() {
        let store = MemoryProductStore::new();
        let cache = MemorySessionCache::default();
        let catalog = CatalogService::new(&store, &cache);
        let missing = ProductId::new(77);

        assert!(matches!(
            catalog.get_product(missing).await,
            Err(CatalogError::NotFound)
        ));
        assert!(matches!(
            catalog.toggle_featured(missing).await,
            Err(CatalogError::NotFound)
        ));
        assert!(matches!(
            catalog.delete_product(missing).await,
            Err(CatalogError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_create_validates() {
        let store = MemoryProductStore::new();
        let cache = MemorySessionCache::default();
        let catalog = CatalogService::new(&store, &cache);

        assert!(matches!(
            catalog.create_product(new_product("  ", false)).await,
            Err(CatalogError::Invalid(_))
        ));
        let mut negative = new_product("Nail", false);
        negative.count_in_stock = -1;
        assert!(matches!(
            catalog.create_product(negative).await,
            Err(CatalogError::Invalid(_))
        ));
    }
}
