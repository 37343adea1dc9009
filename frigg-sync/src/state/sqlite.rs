//! SQLite-backed sync state store.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::hashing::{hash_json, to_canonical_json};

use super::schema::{initialize_schema, is_initialized};
use super::store::SyncStateStore;
use super::types::{DataIdentifier, SyncState, SyncStateDraft, SyncStateId};

/// SQLite-backed sync state store.
///
/// Trait operations run on tokio's blocking pool, one at a time behind the
/// connection lock. The inherent `insert` and `count` helpers are
/// synchronous and block the caller.
pub struct SqliteSyncStateStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSyncStateStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;

        if !is_initialized(&conn) {
            initialize_schema(&conn)?;
        }
        conn.pragma_update(None, "foreign_keys", "ON")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| Error::Internal(format!("Failed to lock connection: {}", e)))?;
        f(&mut conn)
    }

    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| Error::Internal(format!("Failed to lock connection: {}", e)))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| Error::Internal(format!("Storage task failed: {}", e)))?
    }

    /// Insert a state as-is, bypassing the upsert key.
    pub fn insert(&self, state: &SyncState) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            insert_state(&tx, state)?;
            tx.commit()?;
            Ok(())
        })
    }

    /// Number of stored states.
    pub fn count(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM sync_states", [], |row| row.get(0))?;
            Ok(count as usize)
        })
    }
}

#[async_trait]
impl SyncStateStore for SqliteSyncStateStore {
    async fn find_matching(
        &self,
        name: &str,
        data_identifier: &Value,
        entity: &str,
    ) -> Result<Vec<SyncState>> {
        let name = name.to_string();
        let entity = entity.to_string();
        let id_hash = hash_json(data_identifier);
        let id_text = to_canonical_json(data_identifier);

        self.run(move |conn| {
            let ids = {
                let mut stmt = conn.prepare(
                    "SELECT DISTINCT s.id FROM sync_states s
                     JOIN sync_data_identifiers d ON d.sync_id = s.id
                     WHERE s.name = ?1 AND d.entity = ?2
                       AND d.identifier_hash = ?3 AND d.identifier = ?4
                     ORDER BY s.created_at",
                )?;
                let ids = stmt
                    .query_map(params![name, entity, id_hash, id_text], |row| {
                        row.get::<_, String>(0)
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                ids
            };

            let mut states = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(state) = load_state(conn, &SyncStateId(id))? {
                    states.push(state);
                }
            }
            Ok(states)
        })
        .await
    }

    async fn get(&self, id: &SyncStateId) -> Result<Option<SyncState>> {
        let id = id.clone();
        self.run(move |conn| load_state(conn, &id)).await
    }

    async fn upsert(&self, draft: SyncStateDraft) -> Result<SyncState> {
        let (key_entity, key_hash) = {
            let (entity, hash) = draft.key()?;
            (entity.to_string(), hash.to_string())
        };

        self.run(move |conn| {
            let tx = conn.transaction()?;

            let candidates = {
                let mut stmt = tx.prepare(
                    "SELECT DISTINCT s.id FROM sync_states s
                     JOIN sync_data_identifiers d ON d.sync_id = s.id
                     WHERE s.name = ?1 AND d.entity = ?2 AND d.identifier_hash = ?3",
                )?;
                let ids = stmt
                    .query_map(params![draft.name, key_entity, key_hash], |row| {
                        row.get::<_, String>(0)
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                ids
            };

            let mut targeted = Vec::new();
            for id in candidates {
                if let Some(state) = load_state(&tx, &SyncStateId(id))? {
                    if draft.targets(&state)? {
                        targeted.push(state);
                    }
                }
            }

            let state = match targeted.len() {
                0 => {
                    let state = SyncState::from_draft(draft);
                    insert_state(&tx, &state)?;
                    state
                }
                1 => {
                    let mut state = targeted.remove(0);
                    state.apply_draft(draft);
                    write_state(&tx, &state)?;
                    state
                }
                count => {
                    return Err(Error::ambiguous_sync_state(&draft.name, key_entity, count));
                }
            };

            tx.commit()?;
            Ok(state)
        })
        .await
    }

    async fn update_hash(&self, id: &SyncStateId, hash: &str) -> Result<SyncState> {
        let id = id.clone();
        let hash = hash.to_string();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            let mut state = load_state(&tx, &id)?
                .ok_or_else(|| Error::SyncStateNotFound(id.to_string()))?;
            state.set_hash(hash);
            tx.execute(
                "UPDATE sync_states SET hash = ?2, updated_at = ?3 WHERE id = ?1",
                params![state.id.as_str(), state.hash, state.updated_at.to_rfc3339()],
            )?;
            tx.commit()?;
            Ok(state)
        })
        .await
    }

    async fn confirm_link(
        &self,
        id: &SyncStateId,
        hash: &str,
        identifier: DataIdentifier,
    ) -> Result<SyncState> {
        let id = id.clone();
        let hash = hash.to_string();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            let mut state = load_state(&tx, &id)?
                .ok_or_else(|| Error::SyncStateNotFound(id.to_string()))?;
            state.set_hash(hash);
            state.link(identifier);
            write_state(&tx, &state)?;
            tx.commit()?;
            Ok(state)
        })
        .await
    }
}

fn insert_state(tx: &Transaction<'_>, state: &SyncState) -> Result<()> {
    tx.execute(
        "INSERT INTO sync_states (id, name, entities, hash, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            state.id.as_str(),
            state.name,
            serde_json::to_string(&state.entities)?,
            state.hash,
            state.created_at.to_rfc3339(),
            state.updated_at.to_rfc3339(),
        ],
    )?;
    write_identifiers(tx, state)
}

fn write_state(tx: &Transaction<'_>, state: &SyncState) -> Result<()> {
    let rows = tx.execute(
        "UPDATE sync_states SET name = ?2, entities = ?3, hash = ?4, updated_at = ?5
         WHERE id = ?1",
        params![
            state.id.as_str(),
            state.name,
            serde_json::to_string(&state.entities)?,
            state.hash,
            state.updated_at.to_rfc3339(),
        ],
    )?;
    if rows == 0 {
        return Err(Error::SyncStateNotFound(state.id.to_string()));
    }
    write_identifiers(tx, state)
}

fn write_identifiers(tx: &Transaction<'_>, state: &SyncState) -> Result<()> {
    tx.execute(
        "DELETE FROM sync_data_identifiers WHERE sync_id = ?1",
        params![state.id.as_str()],
    )?;
    for (position, di) in state.data_identifiers.iter().enumerate() {
        tx.execute(
            "INSERT INTO sync_data_identifiers
                (sync_id, position, entity, identifier, identifier_hash)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                state.id.as_str(),
                position as i64,
                di.entity,
                to_canonical_json(&di.id),
                di.hash,
            ],
        )?;
    }
    Ok(())
}

fn load_state(conn: &Connection, id: &SyncStateId) -> Result<Option<SyncState>> {
    let row = conn
        .query_row(
            "SELECT id, name, entities, hash, created_at, updated_at
             FROM sync_states WHERE id = ?1",
            params![id.as_str()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            },
        )
        .optional()?;

    let Some((id, name, entities, hash, created_at, updated_at)) = row else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT entity, identifier, identifier_hash FROM sync_data_identifiers
         WHERE sync_id = ?1 ORDER BY position",
    )?;
    let raw_identifiers = stmt
        .query_map(params![id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut data_identifiers = Vec::with_capacity(raw_identifiers.len());
    for (entity, identifier, hash) in raw_identifiers {
        data_identifiers.push(DataIdentifier {
            entity,
            id: serde_json::from_str(&identifier)?,
            hash,
        });
    }

    Ok(Some(SyncState {
        id: SyncStateId(id),
        name,
        entities: serde_json::from_str(&entities)?,
        hash,
        data_identifiers,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    }))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::StateStorage(format!("Invalid timestamp '{}': {}", s, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn draft(id: Value) -> SyncStateDraft {
        SyncStateDraft {
            name: "Deal".to_string(),
            entities: vec!["p".to_string(), "s".to_string()],
            hash: "h1".to_string(),
            data_identifiers: vec![DataIdentifier::new("p", id)],
        }
    }

    #[tokio::test]
    async fn test_upsert_and_lookup() {
        let store = SqliteSyncStateStore::in_memory().unwrap();
        let identifier = json!({"companyId": 12, "saleId": 524});

        let created = store.upsert(draft(identifier.clone())).await.unwrap();
        let found = store
            .get_sync_object("Deal", &json!({"saleId": 524, "companyId": 12}), "p")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(found.id, created.id);
        assert_eq!(found.data_identifiers[0].id, identifier);
        assert_eq!(found.entities, vec!["p", "s"]);
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing() {
        let store = SqliteSyncStateStore::in_memory().unwrap();
        let created = store.upsert(draft(json!(1))).await.unwrap();

        let mut pair = draft(json!(1));
        pair.hash = "h2".to_string();
        pair.data_identifiers.push(DataIdentifier::new("s", json!("a")));
        let replaced = store.upsert(pair).await.unwrap();

        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(replaced.id, created.id);
        let stored = store.get(&created.id).await.unwrap().unwrap();
        assert_eq!(stored.hash, "h2");
        assert_eq!(stored.data_identifiers.len(), 2);
    }

    #[tokio::test]
    async fn test_seeded_duplicates_are_ambiguous() {
        let store = SqliteSyncStateStore::in_memory().unwrap();
        store.insert(&SyncState::from_draft(draft(json!(3)))).unwrap();
        store.insert(&SyncState::from_draft(draft(json!(3)))).unwrap();

        let err = store
            .get_sync_object("Deal", &json!(3), "p")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AmbiguousSyncState { count: 2, .. }));
    }

    #[tokio::test]
    async fn test_confirm_link_is_single_write() {
        let store = SqliteSyncStateStore::in_memory().unwrap();
        let created = store.upsert(draft(json!(1))).await.unwrap();

        store
            .confirm_link(&created.id, "h5", DataIdentifier::new("s", json!("z")))
            .await
            .unwrap();

        let stored = store.get(&created.id).await.unwrap().unwrap();
        assert_eq!(stored.hash, "h5");
        assert!(stored.is_linked());
        assert_eq!(stored.data_identifier_for("s").unwrap(), &json!("z"));
    }

    #[tokio::test]
    async fn test_update_hash_missing_state() {
        let store = SqliteSyncStateStore::in_memory().unwrap();
        let err = store
            .update_hash(&SyncStateId::from("nope"), "h")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SyncStateNotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_writes_from_spawned_tasks() {
        let store = Arc::new(SqliteSyncStateStore::in_memory().unwrap());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.upsert(draft(json!(i))).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.count().unwrap(), 8);
        for i in 0..8 {
            assert!(store
                .get_sync_object("Deal", &json!(i), "p")
                .await
                .unwrap()
                .is_some());
        }
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sync.db");

        let id = {
            let store = SqliteSyncStateStore::open(&path).unwrap();
            store.upsert(draft(json!("deal-9"))).await.unwrap().id
        };

        let store = SqliteSyncStateStore::open(&path).unwrap();
        let state = store.get(&id).await.unwrap().unwrap();
        assert_eq!(state.name, "Deal");
        assert_eq!(state.data_identifiers[0].id, json!("deal-9"));
    }
}
