// SPDX-License-Identifier: MIT OR Apache-2.0
//! Tenant lookup, tier defaults, and per-tenant override resolution.
//!
//! Two interchangeable backends share the [`TenantStore`] contract: an
//! [`InMemoryTenantStore`] seeded at boot, and a [`PersistentTenantStore`]
//! backed by `rusqlite`. Lookups only ever return `is_active = true`
//! rows; deactivation is a soft delete.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use async_trait::async_trait;
use chrono::Utc;
use ic_core::{Tier, TenantConfig, TenantOverrides};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// Errors that can occur while reading or writing tenant state.
#[derive(Debug, thiserror::Error)]
pub enum TenantStoreError {
    /// The persistent backend's underlying SQLite call failed.
    #[error("tenant store backend error: {0}")]
    Backend(#[from] rusqlite::Error),

    /// A settings blob did not parse as a [`TenantOverrides`] whitelist.
    #[error("invalid tenant settings json: {0}")]
    InvalidSettings(#[from] serde_json::Error),

    /// The tier string stored in the backend is not one of the four
    /// known tiers.
    #[error("unknown tier: {0}")]
    UnknownTier(String),
}

/// Capability set shared by every tenant store backend.
#[async_trait]
pub trait TenantStore: Send + Sync {
    /// Look up an active tenant by its API key.
    async fn by_api_key(&self, api_key: &str) -> Result<Option<TenantConfig>, TenantStoreError>;

    /// Look up an active tenant by id.
    async fn by_id(&self, tenant_id: Uuid) -> Result<Option<TenantConfig>, TenantStoreError>;

    /// List every active tenant.
    async fn list(&self) -> Result<Vec<TenantConfig>, TenantStoreError>;

    /// Insert a new tenant or replace an existing one by id.
    async fn upsert(&self, tenant: TenantConfig) -> Result<(), TenantStoreError>;

    /// Set `is_active = false` for a tenant. Returns `false` if the
    /// tenant did not exist.
    async fn soft_delete(&self, tenant_id: Uuid) -> Result<bool, TenantStoreError>;
}

fn tier_to_str(tier: Tier) -> &'static str {
    match tier {
        Tier::Free => "FREE",
        Tier::Starter => "STARTER",
        Tier::Professional => "PROFESSIONAL",
        Tier::Enterprise => "ENTERPRISE",
    }
}

fn tier_from_str(s: &str) -> Result<Tier, TenantStoreError> {
    match s {
        "FREE" => Ok(Tier::Free),
        "STARTER" => Ok(Tier::Starter),
        "PROFESSIONAL" => Ok(Tier::Professional),
        "ENTERPRISE" => Ok(Tier::Enterprise),
        other => Err(TenantStoreError::UnknownTier(other.to_string())),
    }
}

/// In-memory [`TenantStore`], seeded at process boot.
#[derive(Default)]
pub struct InMemoryTenantStore {
    tenants: RwLock<HashMap<Uuid, TenantConfig>>,
}

impl InMemoryTenantStore {
    /// Construct an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct a store pre-seeded with `tenants`.
    #[must_use]
    pub fn seeded(tenants: Vec<TenantConfig>) -> Self {
        let mut map = HashMap::new();
        for t in tenants {
            map.insert(t.tenant_id, t);
        }
        Self {
            tenants: RwLock::new(map),
        }
    }
}

#[async_trait]
impl TenantStore for InMemoryTenantStore {
    async fn by_api_key(&self, api_key: &str) -> Result<Option<TenantConfig>, TenantStoreError> {
        let guard = self.tenants.read().expect("tenant store lock poisoned");
        Ok(guard
            .values()
            .find(|t| t.api_key == api_key && t.is_active)
            .cloned())
    }

    async fn by_id(&self, tenant_id: Uuid) -> Result<Option<TenantConfig>, TenantStoreError> {
        let guard = self.tenants.read().expect("tenant store lock poisoned");
        Ok(guard.get(&tenant_id).filter(|t| t.is_active).cloned())
    }

    async fn list(&self) -> Result<Vec<TenantConfig>, TenantStoreError> {
        let guard = self.tenants.read().expect("tenant store lock poisoned");
        Ok(guard.values().filter(|t| t.is_active).cloned().collect())
    }

    async fn upsert(&self, tenant: TenantConfig) -> Result<(), TenantStoreError> {
        let mut guard = self.tenants.write().expect("tenant store lock poisoned");
        guard.insert(tenant.tenant_id, tenant);
        Ok(())
    }

    async fn soft_delete(&self, tenant_id: Uuid) -> Result<bool, TenantStoreError> {
        let mut guard = self.tenants.write().expect("tenant store lock poisoned");
        match guard.get_mut(&tenant_id) {
            Some(t) if t.is_active => {
                t.is_active = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// `rusqlite`-backed [`TenantStore`], matching the persisted schema in
/// Schema: `tenants(tenant_id pk, name, api_key unique, tier,
/// is_active, settings json, updated_at)`. Overrides are stored as a
/// JSON blob restricted to the [`TenantOverrides`] whitelist.
pub struct PersistentTenantStore {
    conn: std::sync::Mutex<rusqlite::Connection>,
}

impl PersistentTenantStore {
    /// Open (or create) the SQLite database at `path` and ensure the
    /// schema exists.
    ///
    /// # Errors
    ///
    /// Returns [`TenantStoreError::Backend`] if the database cannot be
    /// opened or the schema cannot be created.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, TenantStoreError> {
        let conn = rusqlite::Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: std::sync::Mutex::new(conn),
        })
    }

    /// Open an in-memory SQLite database, for tests.
    ///
    /// # Errors
    ///
    /// Returns [`TenantStoreError::Backend`] if the schema cannot be created.
    pub fn open_in_memory() -> Result<Self, TenantStoreError> {
        let conn = rusqlite::Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: std::sync::Mutex::new(conn),
        })
    }

    fn init_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS tenants (
                tenant_id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                api_key TEXT NOT NULL UNIQUE,
                tier TEXT NOT NULL,
                is_active INTEGER NOT NULL,
                settings TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    fn row_to_tenant(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String, String, String, bool, String, String)> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get::<_, i64>(4)? != 0,
            row.get(5)?,
            row.get(6)?,
        ))
    }

    fn decode(
        tuple: (String, String, String, String, bool, String, String),
    ) -> Result<TenantConfig, TenantStoreError> {
        let (tenant_id, name, api_key, tier, is_active, settings, updated_at) = tuple;
        let overrides: TenantOverrides = serde_json::from_str(&settings)?;
        Ok(TenantConfig {
            tenant_id: Uuid::parse_str(&tenant_id).unwrap_or(Uuid::nil()),
            name,
            api_key,
            tier: tier_from_str(&tier)?,
            is_active,
            overrides,
            created_at: updated_at.parse().unwrap_or_else(|_| Utc::now()),
        })
    }
}

#[async_trait]
impl TenantStore for PersistentTenantStore {
    async fn by_api_key(&self, api_key: &str) -> Result<Option<TenantConfig>, TenantStoreError> {
        let conn = self.conn.lock().expect("tenant store lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT tenant_id, name, api_key, tier, is_active, settings, updated_at
             FROM tenants WHERE api_key = ?1 AND is_active = 1",
        )?;
        let mut rows = stmt.query([api_key])?;
        match rows.next()? {
            Some(row) => Ok(Some(Self::decode(Self::row_to_tenant(row)?)?)),
            None => Ok(None),
        }
    }

    async fn by_id(&self, tenant_id: Uuid) -> Result<Option<TenantConfig>, TenantStoreError> {
        let conn = self.conn.lock().expect("tenant store lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT tenant_id, name, api_key, tier, is_active, settings, updated_at
             FROM tenants WHERE tenant_id = ?1 AND is_active = 1",
        )?;
        let mut rows = stmt.query([tenant_id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(Self::decode(Self::row_to_tenant(row)?)?)),
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<TenantConfig>, TenantStoreError> {
        let conn = self.conn.lock().expect("tenant store lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT tenant_id, name, api_key, tier, is_active, settings, updated_at
             FROM tenants WHERE is_active = 1",
        )?;
        let rows = stmt.query_map([], Self::row_to_tenant)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(Self::decode(row?)?);
        }
        Ok(out)
    }

    async fn upsert(&self, tenant: TenantConfig) -> Result<(), TenantStoreError> {
        let conn = self.conn.lock().expect("tenant store lock poisoned");
        let settings = serde_json::to_string(&tenant.overrides)?;
        conn.execute(
            "INSERT INTO tenants (tenant_id, name, api_key, tier, is_active, settings, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(tenant_id) DO UPDATE SET
                name = excluded.name,
                api_key = excluded.api_key,
                tier = excluded.tier,
                is_active = excluded.is_active,
                settings = excluded.settings,
                updated_at = excluded.updated_at",
            rusqlite::params![
                tenant.tenant_id.to_string(),
                tenant.name,
                tenant.api_key,
                tier_to_str(tenant.tier),
                tenant.is_active as i64,
                settings,
                tenant.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn soft_delete(&self, tenant_id: Uuid) -> Result<bool, TenantStoreError> {
        let conn = self.conn.lock().expect("tenant store lock poisoned");
        let changed = conn.execute(
            "UPDATE tenants SET is_active = 0 WHERE tenant_id = ?1 AND is_active = 1",
            [tenant_id.to_string()],
        )?;
        Ok(changed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant(tier: Tier) -> TenantConfig {
        TenantConfig {
            tenant_id: Uuid::new_v4(),
            name: "acme".to_string(),
            api_key: format!("key-{}", Uuid::new_v4()),
            tier,
            is_active: true,
            overrides: TenantOverrides::default(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn in_memory_round_trips_by_api_key_and_id() {
        let store = InMemoryTenantStore::new();
        let t = tenant(Tier::Starter);
        store.upsert(t.clone()).await.unwrap();

        assert_eq!(store.by_id(t.tenant_id).await.unwrap().unwrap().tenant_id, t.tenant_id);
        assert_eq!(
            store.by_api_key(&t.api_key).await.unwrap().unwrap().tenant_id,
            t.tenant_id
        );
    }

    #[tokio::test]
    async fn soft_delete_hides_tenant_from_lookups() {
        let store = InMemoryTenantStore::new();
        let t = tenant(Tier::Free);
        store.upsert(t.clone()).await.unwrap();

        assert!(store.soft_delete(t.tenant_id).await.unwrap());
        assert!(store.by_id(t.tenant_id).await.unwrap().is_none());
        assert!(!store.soft_delete(t.tenant_id).await.unwrap());
    }

    #[tokio::test]
    async fn persistent_store_round_trips_overrides() {
        let store = PersistentTenantStore::open_in_memory().unwrap();
        let mut t = tenant(Tier::Enterprise);
        t.overrides.requests_per_minute = Some(5000);
        store.upsert(t.clone()).await.unwrap();

        let fetched = store.by_id(t.tenant_id).await.unwrap().unwrap();
        assert_eq!(fetched.requests_per_minute(), 5000);
    }

    #[tokio::test]
    async fn persistent_store_soft_delete_excludes_from_list() {
        let store = PersistentTenantStore::open_in_memory().unwrap();
        let t = tenant(Tier::Professional);
        store.upsert(t.clone()).await.unwrap();
        assert_eq!(store.list().await.unwrap().len(), 1);

        store.soft_delete(t.tenant_id).await.unwrap();
        assert_eq!(store.list().await.unwrap().len(), 0);
    }
}
