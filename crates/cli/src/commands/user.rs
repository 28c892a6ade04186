//! Account management commands.
//!
//! # Usage
//!
//! ```bash
//! # Make an existing account an admin
//! bazaar-cli user set-role -e admin@example.com -r admin
//!
//! # End an account's session (requires REDIS_URL)
//! bazaar-cli user sign-out -e someone@example.com
//! ```

use bazaar_core::{Email, Role};
use bazaar_storefront::cache::{SessionCache, refresh_token_key};
use bazaar_storefront::db::{PgUserStore, UserStore};
use bazaar_storefront::models::User;

use super::featured::redis_cache;
use super::{CommandError, connect};

async fn find_user(store: &PgUserStore, email: &str) -> Result<User, CommandError> {
    let email = Email::parse(email).map_err(|e| CommandError::InvalidArgument(e.to_string()))?;
    store
        .find_by_email(&email)
        .await?
        .ok_or_else(|| CommandError::InvalidArgument(format!("no account for {email}")))
}

/// Change the role of an existing account.
///
/// # Errors
///
/// Returns `CommandError::InvalidArgument` for an unknown role or email.
pub async fn set_role(email: &str, role: &str) -> Result<(), CommandError> {
    let role: Role = role.parse().map_err(|_| {
        CommandError::InvalidArgument(format!("{role} (expected customer, seller or admin)"))
    })?;

    let store = PgUserStore::new(connect().await?);
    let mut user = find_user(&store, email).await?;

    if user.role == role {
        tracing::info!(user_id = %user.id, %role, "Role unchanged");
        return Ok(());
    }

    user.role = role;
    store.save(&user).await?;
    tracing::info!(user_id = %user.id, %role, "Role updated");
    Ok(())
}

/// Delete an account's refresh token, ending its session.
///
/// The access token already issued stays valid until it expires.
///
/// # Errors
///
/// Returns `CommandError` if the email is unknown or a backend is unreachable.
pub async fn sign_out(email: &str) -> Result<(), CommandError> {
    let store = PgUserStore::new(connect().await?);
    let user = find_user(&store, email).await?;

    let cache = redis_cache()?;
    cache.del(&refresh_token_key(user.id)).await?;
    tracing::info!(user_id = %user.id, "Session revoked");
    Ok(())
}
