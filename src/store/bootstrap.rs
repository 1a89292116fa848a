use sqlx::SqlitePool;

use crate::auth::password;
use crate::auth::role::Role;

/// Seed the role table and, on an empty database, the initial admin
/// account. Safe to run on every startup.
#[tracing::instrument(skip(pool, admin_password), err)]
pub async fn run(pool: &SqlitePool, admin_password: Option<&str>) -> anyhow::Result<()> {
    for role in Role::ALL {
        sqlx::query("INSERT INTO roles (name) VALUES (?) ON CONFLICT (name) DO NOTHING")
            .bind(role.as_str())
            .execute(pool)
            .await?;
    }
    tracing::info!(count = Role::ALL.len(), "roles seeded");

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;
    if count > 0 {
        tracing::info!("bootstrap skipped: users already exist");
        return Ok(());
    }

    tracing::info!("first run detected: creating admin account");

    let password_hash = password::hash_password(admin_password.unwrap_or("admin"))?;
    sqlx::query(
        "INSERT INTO users (email, full_name, hashed_password, role_id, created_at)
         SELECT 'admin@localhost', 'Administrator', ?, r.id, ?
         FROM roles r WHERE r.name = 'admin'",
    )
    .bind(&password_hash)
    .bind(chrono::Utc::now())
    .execute(pool)
    .await?;

    tracing::info!("admin account created");

    Ok(())
}
