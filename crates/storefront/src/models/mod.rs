//! Domain models for the storefront.
//!
//! These are validated domain objects, separate from database row types.

pub mod product;
pub mod session;
pub mod user;

pub use product::{NewProduct, Product, ProductPatch};
pub use session::{CurrentUser, TokenPair};
pub use user::{NewUser, User, UserProfile};
