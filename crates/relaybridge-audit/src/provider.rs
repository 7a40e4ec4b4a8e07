use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use tracing::instrument;

use crate::error::Result;

/// Lifecycle metadata for a configured LLM provider credential. Never the
/// raw key — only enough of a prefix to let an operator recognize which key
/// is installed without the daemon ever re-exposing the secret.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfigRow {
    pub provider_id: String,
    pub key_prefix: String,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

const KEY_PREFIX_LEN: usize = 6;

pub struct ProviderConfigStore {
    db: Mutex<Connection>,
}

impl ProviderConfigStore {
    pub fn new(conn: Connection) -> Result<Self> {
        crate::db::init_db(&conn)?;
        Ok(Self { db: Mutex::new(conn) })
    }

    #[instrument(skip(self, raw_key))]
    pub fn register(&self, provider_id: &str, raw_key: &str) -> Result<ProviderConfigRow> {
        let key_prefix: String = raw_key.chars().take(KEY_PREFIX_LEN).collect();
        let created_at = Utc::now();
        let db = self.db.lock().unwrap_or_else(|p| p.into_inner());
        db.execute(
            "INSERT INTO provider_configs (provider_id, key_prefix, created_at, revoked_at)
             VALUES (?1, ?2, ?3, NULL)
             ON CONFLICT(provider_id) DO UPDATE SET
                key_prefix = excluded.key_prefix,
                created_at = excluded.created_at,
                revoked_at = NULL",
            params![provider_id, key_prefix, created_at.to_rfc3339()],
        )?;
        Ok(ProviderConfigRow {
            provider_id: provider_id.to_string(),
            key_prefix,
            created_at,
            revoked_at: None,
        })
    }

    #[instrument(skip(self))]
    pub fn revoke(&self, provider_id: &str) -> Result<()> {
        let db = self.db.lock().unwrap_or_else(|p| p.into_inner());
        db.execute(
            "UPDATE provider_configs SET revoked_at = ?1 WHERE provider_id = ?2",
            params![Utc::now().to_rfc3339(), provider_id],
        )?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn list(&self) -> Result<Vec<ProviderConfigRow>> {
        let db = self.db.lock().unwrap_or_else(|p| p.into_inner());
        let mut stmt = db.prepare("SELECT provider_id, key_prefix, created_at, revoked_at FROM provider_configs ORDER BY provider_id")?;
        let rows = stmt.query_map([], |row| {
            let created_at: String = row.get(2)?;
            let revoked_at: Option<String> = row.get(3)?;
            Ok(ProviderConfigRow {
                provider_id: row.get(0)?,
                key_prefix: row.get(1)?,
                created_at: parse_rfc3339(&created_at),
                revoked_at: revoked_at.map(|s| parse_rfc3339(&s)),
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

fn parse_rfc3339(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ProviderConfigStore {
        ProviderConfigStore::new(Connection::open_in_memory().unwrap()).unwrap()
    }

    #[test]
    fn register_never_stores_the_full_key() {
        let store = store();
        let row = store.register("anthropic", "sk-ant-REDACTED").unwrap();
        assert_eq!(row.key_prefix, "sk-ant");
        assert!(row.key_prefix.len() < "sk-ant-REDACTED".len());
    }

    #[test]
    fn revoke_marks_the_row_without_deleting_it() {
        let store = store();
        store.register("anthropic", "sk-ant-xyz").unwrap();
        store.revoke("anthropic").unwrap();
        let rows = store.list().unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].revoked_at.is_some());
    }
}
