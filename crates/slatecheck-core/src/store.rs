// Preference persistence: the last contest input and belief profile.

use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::contest::ContestInput;
use crate::model::Player;

const CONTEST_KEY: &str = "contest_input";
const BELIEFS_KEY: &str = "belief_profile";

/// A user-uploaded projection set that replaces the reference pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeliefProfile {
    /// Display name, usually the uploaded file name.
    pub name: String,
    pub players: Vec<Player>,
}

/// Everything that survives between runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedPreferences {
    pub contest: Option<ContestInput>,
    pub beliefs: Option<BeliefProfile>,
}

/// Where preferences live. Injected so the core never picks a mechanism.
pub trait PreferenceStore {
    fn load(&self) -> Result<PersistedPreferences>;
    fn save(&self, prefs: &PersistedPreferences) -> Result<()>;
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryStore {
    prefs: Mutex<PersistedPreferences>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryStore {
    fn load(&self) -> Result<PersistedPreferences> {
        Ok(self
            .prefs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, prefs: &PersistedPreferences) -> Result<()> {
        *self.prefs.lock().unwrap_or_else(PoisonError::into_inner) = prefs.clone();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SQLite
// ---------------------------------------------------------------------------

/// SQLite-backed key-value store. Each preference is one JSON row.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`. Pass `":memory:"` for an
    /// ephemeral store.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open preference database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS preferences (
                key        TEXT PRIMARY KEY,
                value      TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );",
        )
        .context("failed to create preferences table")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the connection, recovering a poisoned guard: every write is a
    /// single statement.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)
            .with_context(|| format!("failed to serialize preference {key}"))?;
        self.conn()
            .execute(
                "INSERT OR REPLACE INTO preferences (key, value) VALUES (?1, ?2)",
                params![key, json],
            )
            .with_context(|| format!("failed to save preference {key}"))?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.conn()
            .execute("DELETE FROM preferences WHERE key = ?1", params![key])
            .with_context(|| format!("failed to delete preference {key}"))?;
        Ok(())
    }

    fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Result<Option<T>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT value FROM preferences WHERE key = ?1")
            .context("failed to prepare preference query")?;
        let mut rows = stmt
            .query_map(params![key], |row| row.get::<_, String>(0))
            .context("failed to query preferences")?;

        match rows.next() {
            Some(row) => {
                let json = row.context("failed to read preference row")?;
                let value = serde_json::from_str(&json)
                    .with_context(|| format!("failed to deserialize preference {key}"))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}

impl PreferenceStore for SqliteStore {
    fn load(&self) -> Result<PersistedPreferences> {
        let prefs = PersistedPreferences {
            contest: self.get(CONTEST_KEY)?,
            beliefs: self.get(BELIEFS_KEY)?,
        };
        debug!(
            "loaded preferences (contest: {}, beliefs: {})",
            prefs.contest.is_some(),
            prefs.beliefs.is_some()
        );
        Ok(prefs)
    }

    fn save(&self, prefs: &PersistedPreferences) -> Result<()> {
        match &prefs.contest {
            Some(contest) => self.put(CONTEST_KEY, contest)?,
            None => self.delete(CONTEST_KEY)?,
        }
        match &prefs.beliefs {
            Some(beliefs) => self.put(BELIEFS_KEY, beliefs)?,
            None => self.delete(BELIEFS_KEY)?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contest::PayoutCurve;

    fn sample_prefs() -> PersistedPreferences {
        PersistedPreferences {
            contest: Some(ContestInput {
                name: "Saved".into(),
                entry_fee: 3.0,
                entries: 20,
                field_size: 23_781,
                prize_pool: 60_000.0,
                payout: PayoutCurve::FlatTopN { places: 5000 },
            }),
            beliefs: Some(BeliefProfile {
                name: "my_proj.csv".into(),
                players: vec![Player {
                    id: "4471".into(),
                    name: "Jane Doe".into(),
                    team: "BOS".into(),
                    opponent: "NYK".into(),
                    position: "PG".into(),
                    salary: 9800,
                    projection: 50.0,
                    ownership: Some(30.0),
                    ceiling: None,
                    value: None,
                }],
            }),
        }
    }

    #[test]
    fn sqlite_starts_empty() {
        let store = SqliteStore::open(":memory:").unwrap();
        assert_eq!(store.load().unwrap(), PersistedPreferences::default());
    }

    #[test]
    fn sqlite_saves_and_loads() {
        let store = SqliteStore::open(":memory:").unwrap();
        let prefs = sample_prefs();
        store.save(&prefs).unwrap();
        assert_eq!(store.load().unwrap(), prefs);
    }

    #[test]
    fn sqlite_clearing_beliefs_removes_row() {
        let store = SqliteStore::open(":memory:").unwrap();
        store.save(&sample_prefs()).unwrap();
        let mut prefs = sample_prefs();
        prefs.beliefs = None;
        store.save(&prefs).unwrap();
        let loaded = store.load().unwrap();
        assert!(loaded.beliefs.is_none());
        assert!(loaded.contest.is_some());
    }

    #[test]
    fn sqlite_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.db");
        let path = path.to_str().unwrap();
        SqliteStore::open(path).unwrap().save(&sample_prefs()).unwrap();
        assert_eq!(SqliteStore::open(path).unwrap().load().unwrap(), sample_prefs());
    }

    #[test]
    fn memory_store_round_trips() {
        let store = MemoryStore::new();
        store.save(&sample_prefs()).unwrap();
        assert_eq!(store.load().unwrap(), sample_prefs());
    }
}
