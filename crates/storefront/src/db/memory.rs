//! In-memory stores for tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;

use bazaar_core::{Email, ProductId, UserId};

use super::{ProductStore, RepositoryError, UserStore};
use crate::models::{NewProduct, NewUser, Product, User};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Table<T> {
    next_id: i32,
    rows: BTreeMap<i32, T>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            rows: BTreeMap::new(),
        }
    }
}

impl<T> Table<T> {
    const fn allocate_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }
}

/// User store backed by a map.
#[derive(Default)]
pub struct MemoryUserStore {
    table: Mutex<Table<User>>,
}

impl MemoryUserStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let table = lock(&self.table);
        Ok(table.rows.values().find(|u| &u.email == email).cloned())
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(lock(&self.table).rows.get(&id.as_i32()).cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, RepositoryError> {
        let mut table = lock(&self.table);
        if table.rows.values().any(|u| u.email == user.email) {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }

        let id = table.allocate_id();
        let now = Utc::now();
        let created = User {
            id: UserId::new(id),
            email: user.email,
            password_hash: user.password_hash,
            name: user.name,
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(id, created.clone());
        Ok(created)
    }

    async fn save(&self, user: &User) -> Result<User, RepositoryError> {
        let mut table = lock(&self.table);
        let stored = table
            .rows
            .get_mut(&user.id.as_i32())
            .ok_or(RepositoryError::NotFound)?;

        stored.password_hash.clone_from(&user.password_hash);
        stored.name.clone_from(&user.name);
        stored.role = user.role;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

/// Product store backed by a map.
///
/// Counts `list_featured` calls so tests can tell a cache hit from a store
/// read.
#[derive(Default)]
pub struct MemoryProductStore {
    table: Mutex<Table<Product>>,
    featured_reads: AtomicUsize,
}

impl MemoryProductStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times `list_featured` has been called.
    #[must_use]
    pub fn featured_reads(&self) -> usize {
        self.featured_reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProductStore for MemoryProductStore {
    async fn list(&self) -> Result<Vec<Product>, RepositoryError> {
        Ok(lock(&self.table).rows.values().cloned().collect())
    }

    async fn list_featured(&self) -> Result<Vec<Product>, RepositoryError> {
        self.featured_reads.fetch_add(1, Ordering::SeqCst);
        Ok(lock(&self.table)
            .rows
            .values()
            .filter(|p| p.is_featured)
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(lock(&self.table).rows.get(&id.as_i32()).cloned())
    }

    async fn create(&self, product: NewProduct) -> Result<Product, RepositoryError> {
        let mut table = lock(&self.table);
        let id = table.allocate_id();
        let now = Utc::now();
        let created = Product {
            id: ProductId::new(id),
            name: product.name,
            description: product.description,
            price: product.price,
            image: product.image,
            category: product.category,
            brand: product.brand,
            count_in_stock: product.count_in_stock,
            is_featured: product.is_featured,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(id, created.clone());
        Ok(created)
    }

    async fn save(&self, product: &Product) -> Result<Product, RepositoryError> {
        let mut table = lock(&self.table);
        let stored = table
            .rows
            .get_mut(&product.id.as_i32())
            .ok_or(RepositoryError::NotFound)?;

        *stored = Product {
            created_at: stored.created_at,
            updated_at: Utc::now(),
            ..product.clone()
        };
        Ok(stored.clone())
    }

    async fn delete(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(lock(&self.table).rows.remove(&id.as_i32()))
    }
}
