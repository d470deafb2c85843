use std::{env, fs, path::Path};

use chrono::Utc;
use sqlx::SqlitePool;

use crate::context::new_id;
use crate::models::{ROLE_ADMIN, ROLE_FRONT_DESK};

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

pub fn ensure_sqlite_dir(db_url: &str) -> std::io::Result<()> {
    let path = if let Some(path) = db_url.strip_prefix("sqlite://") {
        Some(path)
    } else if let Some(path) = db_url.strip_prefix("sqlite:") {
        Some(path)
    } else {
        None
    };

    let Some(path) = path else {
        return Ok(());
    };

    let path = path.split('?').next().unwrap_or(path);
    if path == ":memory:" || path.is_empty() {
        return Ok(());
    }

    let path = path.strip_prefix("file:").unwrap_or(path);
    let db_path = Path::new(path);
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Creates a default shop and its bootstrap sessions on first start so a
/// fresh install can talk to the API immediately.
pub async fn seed_defaults(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let existing = sqlx::query_as::<_, (String,)>("SELECT id FROM shops LIMIT 1")
        .fetch_optional(pool)
        .await?;

    if existing.is_some() {
        return Ok(());
    }

    let shop_name = env::var("SHOP_NAME").unwrap_or_else(|_| "Main Street Barbershop".to_string());
    let utc_offset: i64 = env::var("SHOP_UTC_OFFSET_MINUTES")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(0);

    let shop_id = new_id();
    let now = Utc::now();

    sqlx::query(
        r#"INSERT INTO shops (id, name, utc_offset_minutes, created_at)
           VALUES (?, ?, ?, ?)"#,
    )
    .bind(&shop_id)
    .bind(&shop_name)
    .bind(utc_offset)
    .bind(now)
    .execute(pool)
    .await?;

    let admin_token = env::var("ADMIN_TOKEN").unwrap_or_else(|_| "admin-dev-token".to_string());
    if admin_token == "admin-dev-token" {
        log::warn!("ADMIN_TOKEN not set. Using default token 'admin-dev-token'. Set ADMIN_TOKEN in production.");
    }

    let desk_token =
        env::var("FRONT_DESK_TOKEN").unwrap_or_else(|_| "front-desk-dev-token".to_string());
    if desk_token == "front-desk-dev-token" {
        log::warn!("FRONT_DESK_TOKEN not set. Using default token 'front-desk-dev-token'. Set FRONT_DESK_TOKEN in production.");
    }

    for (token, role) in [(admin_token, ROLE_ADMIN), (desk_token, ROLE_FRONT_DESK)] {
        sqlx::query(
            r#"INSERT INTO sessions (token, shop_id, barber_id, role, created_at)
               VALUES (?, ?, NULL, ?, ?)"#,
        )
        .bind(token)
        .bind(&shop_id)
        .bind(role)
        .bind(now)
        .execute(pool)
        .await?;
    }

    log::info!("Seeded shop '{shop_name}' ({shop_id})");
    Ok(())
}
