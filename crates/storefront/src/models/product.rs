//! Catalog product types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bazaar_core::{Price, ProductId};

/// A catalog product.
///
/// This is also the shape stored in the featured-products cache entry, so it
/// must round-trip through JSON unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id")]
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Price,
    /// Image URL; uploads happen elsewhere.
    pub image: String,
    pub category: String,
    pub brand: String,
    pub count_in_stock: i32,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a product.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Price,
    #[serde(default)]
    pub image: String,
    pub category: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub count_in_stock: i32,
    #[serde(default)]
    pub is_featured: bool,
}

/// Partial update of a product. Absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Price>,
    pub image: Option<String>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub count_in_stock: Option<i32>,
    pub is_featured: Option<bool>,
}

impl ProductPatch {
    /// Apply the patch to a product in place.
    pub fn apply(self, product: &mut Product) {
        if let Some(name) = self.name {
            product.name = name;
        }
        if let Some(description) = self.description {
            product.description = description;
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(image) = self.image {
            product.image = image;
        }
        if let Some(category) = self.category {
            product.category = category;
        }
        if let Some(brand) = self.brand {
            product.brand = brand;
        }
        if let Some(count) = self.count_in_stock {
            product.count_in_stock = count;
        }
        if let Some(featured) = self.is_featured {
            product.is_featured = featured;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn product() -> Product {
        Product {
            id: ProductId::new(1),
            name: "Kettle".to_string(),
            description: "Boils water".to_string(),
            price: Price::new(Decimal::new(2499, 2)).unwrap(),
            image: "https://img.test/kettle.png".to_string(),
            category: "kitchen".to_string(),
            brand: "Acme".to_string(),
            count_in_stock: 4,
            is_featured: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_patch_only_touches_present_fields() {
        let mut p = product();
        let patch: ProductPatch =
            serde_json::from_str(r#"{"name":"Tea Kettle","isFeatured":true}"#).unwrap();
        patch.apply(&mut p);

        assert_eq!(p.name, "Tea Kettle");
        assert!(p.is_featured);
        assert_eq!(p.brand, "Acme");
        assert_eq!(p.count_in_stock, 4);
    }

    #[test]
    fn test_new_product_requires_price() {
        assert!(serde_json::from_str::<NewProduct>(r#"{"name":"x","category":"y"}"#).is_err());
        let parsed: NewProduct =
            serde_json::from_str(r#"{"name":"x","category":"y","price":"3.50"}"#).unwrap();
        assert!(!parsed.is_featured);
    }

    #[test]
    fn test_json_uses_camel_case() {
        let json = serde_json::to_value(product()).unwrap();
        assert_eq!(json["_id"], 1);
        assert_eq!(json["countInStock"], 4);
        assert_eq!(json["isFeatured"], false);
        assert_eq!(json["price"], "24.99");
    }
}
