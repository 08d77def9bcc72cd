//! services/api/src/adapters/db.rs
//!
//! This module contains the directory adapter, which is the concrete implementation
//! of the `DirectoryService` port from the `core` crate. It handles the whitelist
//! and admin-user lookups against SQLite using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hospital_chat_core::domain::{AdminUser, WhitelistEntry};
use hospital_chat_core::ports::{DirectoryService, PortError, PortResult};
use sqlx::{FromRow, SqlitePool};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DirectoryService` port.
#[derive(Clone)]
pub struct DirectoryAdapter {
    pool: SqlitePool,
}

impl DirectoryAdapter {
    /// Creates a new `DirectoryAdapter`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct WhitelistRecord {
    id: i64,
    hospital_name: String,
    product_batch: String,
    created_at: i64,
}
impl WhitelistRecord {
    fn to_domain(self) -> WhitelistEntry {
        WhitelistEntry {
            id: self.id,
            hospital_name: self.hospital_name,
            product_batch: self.product_batch,
            created_at: DateTime::<Utc>::from_timestamp(self.created_at, 0)
                .unwrap_or_else(Utc::now),
        }
    }
}

#[derive(FromRow)]
struct AdminRecord {
    id: i64,
    username: String,
    password_hash: String,
}
impl AdminRecord {
    fn to_domain(self) -> AdminUser {
        AdminUser {
            id: self.id,
            username: self.username,
            password_hash: self.password_hash,
        }
    }
}

//=========================================================================================
// `DirectoryService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DirectoryService for DirectoryAdapter {
    async fn find_pair(
        &self,
        hospital_name: &str,
        product_batch: &str,
    ) -> PortResult<Option<WhitelistEntry>> {
        let record = sqlx::query_as::<_, WhitelistRecord>(
            "SELECT id, hospital_name, product_batch, created_at \
             FROM auth_pairs WHERE hospital_name = ?1 AND product_batch = ?2",
        )
        .bind(hospital_name.trim())
        .bind(product_batch.trim())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(record.map(WhitelistRecord::to_domain))
    }

    async fn find_admin(&self, username: &str) -> PortResult<Option<AdminUser>> {
        let record = sqlx::query_as::<_, AdminRecord>(
            "SELECT id, username, password_hash FROM admin_users WHERE username = ?1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(record.map(AdminRecord::to_domain))
    }

    async fn list_pairs(
        &self,
        keyword: &str,
        page: u32,
        page_size: u32,
    ) -> PortResult<(Vec<WhitelistEntry>, i64)> {
        let pattern = format!("%{}%", keyword);
        let offset = i64::from(page.saturating_sub(1)) * i64::from(page_size);

        let records = sqlx::query_as::<_, WhitelistRecord>(
            "SELECT id, hospital_name, product_batch, created_at FROM auth_pairs \
             WHERE hospital_name LIKE ?1 OR product_batch LIKE ?1 \
             ORDER BY created_at DESC LIMIT ?2 OFFSET ?3",
        )
        .bind(&pattern)
        .bind(i64::from(page_size))
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM auth_pairs \
             WHERE hospital_name LIKE ?1 OR product_batch LIKE ?1",
        )
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let pairs = records.into_iter().map(WhitelistRecord::to_domain).collect();
        Ok((pairs, total))
    }
}
