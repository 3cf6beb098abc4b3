//! SQLite implementation of [`SessionStore`].

use super::{
    RowId, SessionStore, SortKey, StatKind, StatQuery, StatRow, StatTable, StatValue, StoreError,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

/// A session store backed by a single SQLite connection.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database file at `path`.
    ///
    /// A flush drops its batch once the writes return, so every commit is
    /// synced to disk before that.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = FULL;
            PRAGMA busy_timeout = 5000;
            ",
        )?;
        Ok(Self { conn })
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    fn read_value(kind: StatKind, row: &Row<'_>, idx: usize) -> rusqlite::Result<StatValue> {
        if kind.is_weighted() {
            Ok(StatValue::Weight(row.get::<_, f64>(idx)?))
        } else {
            Ok(StatValue::Freq(row.get::<_, i64>(idx)?.max(0) as u64))
        }
    }

    fn check_value(kind: StatKind, value: StatValue) -> Result<(), StoreError> {
        match (kind.is_weighted(), value) {
            (true, StatValue::Weight(_)) | (false, StatValue::Freq(_)) => Ok(()),
            (true, _) => Err(StoreError::ValueKind {
                kind,
                expected: "weight",
            }),
            (false, _) => Err(StoreError::ValueKind {
                kind,
                expected: "frequency",
            }),
        }
    }
}

fn bind_value(value: StatValue) -> rusqlite::types::Value {
    match value {
        StatValue::Freq(n) => rusqlite::types::Value::Integer(n as i64),
        StatValue::Weight(w) => rusqlite::types::Value::Real(w),
    }
}

impl SessionStore for SqliteStore {
    fn init(&self) -> Result<(), StoreError> {
        for kind in StatKind::ALL {
            let table = kind.table();
            let (column, column_type) = if kind.is_weighted() {
                ("weight", "REAL")
            } else {
                ("freq", "INTEGER")
            };
            self.conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    id INTEGER PRIMARY KEY,
                    name TEXT NOT NULL,
                    {column} {column_type} NOT NULL,
                    session TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_{table}_name_session ON {table} (name, session);"
            ))?;
        }
        Ok(())
    }

    fn find_row(
        &self,
        kind: StatKind,
        name: &str,
        session: &str,
    ) -> Result<Option<RowId>, StoreError> {
        let sql = format!(
            "SELECT id FROM {} WHERE name = ?1 AND session = ?2 LIMIT 1",
            kind.table()
        );
        let id = self
            .conn
            .query_row(&sql, params![name, session], |row| row.get(0))
            .optional()?;
        Ok(id)
    }

    fn insert_row(
        &self,
        kind: StatKind,
        name: &str,
        value: StatValue,
        session: &str,
    ) -> Result<RowId, StoreError> {
        Self::check_value(kind, value)?;
        let sql = format!(
            "INSERT INTO {} (name, {}, session) VALUES (?1, ?2, ?3)",
            kind.table(),
            kind.value_column()
        );
        self.conn
            .execute(&sql, params![name, bind_value(value), session])?;
        Ok(self.conn.last_insert_rowid())
    }

    fn add_to_row(&self, kind: StatKind, id: RowId, delta: StatValue) -> Result<(), StoreError> {
        Self::check_value(kind, delta)?;
        let column = kind.value_column();
        let sql = format!(
            "UPDATE {} SET {column} = {column} + ?1 WHERE id = ?2",
            kind.table()
        );
        let changed = self.conn.execute(&sql, params![bind_value(delta), id])?;
        if changed == 0 {
            return Err(StoreError::MissingRow { kind, id });
        }
        Ok(())
    }

    fn query(&self, query: &StatQuery) -> Result<StatTable, StoreError> {
        let kind = query.kind;
        let order_column = match query.sort_by {
            SortKey::Name => "name",
            SortKey::Value => kind.value_column(),
        };
        let filter = if query.session.is_some() {
            "WHERE session = ?2"
        } else {
            ""
        };
        let sql = format!(
            "SELECT id, name, {value}, session FROM {table} {filter} ORDER BY {order_column} DESC, id ASC LIMIT ?1",
            value = kind.value_column(),
            table = kind.table(),
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let header = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();

        let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);
        let map_row = |row: &Row<'_>| -> rusqlite::Result<StatRow> {
            Ok(StatRow {
                id: row.get(0)?,
                name: row.get(1)?,
                value: Self::read_value(kind, row, 2)?,
                session: row.get(3)?,
            })
        };
        let rows = match &query.session {
            Some(session) => stmt
                .query_map(params![limit, session], map_row)?
                .collect::<Result<Vec<_>, _>>()?,
            None => stmt
                .query_map(params![limit], map_row)?
                .collect::<Result<Vec<_>, _>>()?,
        };

        Ok(StatTable { header, rows })
    }

    fn sessions(&self) -> Result<Vec<String>, StoreError> {
        let sql = StatKind::ALL
            .iter()
            .map(|kind| format!("SELECT session FROM {}", kind.table()))
            .collect::<Vec<_>>()
            .join(" UNION ")
            + " ORDER BY session";
        let mut stmt = self.conn.prepare(&sql)?;
        let sessions = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(sessions)
    }

    fn totals(
        &self,
        kind: StatKind,
        session: Option<&str>,
    ) -> Result<Vec<(String, StatValue)>, StoreError> {
        let filter = if session.is_some() {
            "WHERE session = ?1"
        } else {
            ""
        };
        let sql = format!(
            "SELECT name, SUM({}) FROM {} {filter} GROUP BY name ORDER BY name",
            kind.value_column(),
            kind.table()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let map_row = |row: &Row<'_>| -> rusqlite::Result<(String, StatValue)> {
            Ok((row.get(0)?, Self::read_value(kind, row, 1)?))
        };
        let totals = match session {
            Some(session) => stmt
                .query_map(params![session], map_row)?
                .collect::<Result<Vec<_>, _>>()?,
            None => stmt.query_map([], map_row)?.collect::<Result<Vec<_>, _>>()?,
        };
        Ok(totals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store.init().unwrap();
        store
    }

    #[test]
    fn test_init_is_repeatable() {
        let store = store();
        store.init().unwrap();
        assert!(store.sessions().unwrap().is_empty());
    }

    #[test]
    fn test_insert_find_and_add() {
        let store = store();
        assert_eq!(
            store.find_row(StatKind::Bigrams, "th", "s1").unwrap(),
            None
        );

        let id = store
            .insert_row(StatKind::Bigrams, "th", StatValue::Freq(1), "s1")
            .unwrap();
        assert_eq!(
            store.find_row(StatKind::Bigrams, "th", "s1").unwrap(),
            Some(id)
        );
        // Same name in another session is a different row.
        assert_eq!(
            store.find_row(StatKind::Bigrams, "th", "s2").unwrap(),
            None
        );

        store
            .add_to_row(StatKind::Bigrams, id, StatValue::Freq(1))
            .unwrap();
        let table = store
            .query(&StatQuery::new(StatKind::Bigrams).session("s1"))
            .unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].value, StatValue::Freq(2));
    }

    #[test]
    fn test_weights_are_real_valued() {
        let store = store();
        let id = store
            .insert_row(StatKind::Skipgrams, "ab", StatValue::Weight(0.5), "s")
            .unwrap();
        store
            .add_to_row(StatKind::Skipgrams, id, StatValue::Weight(0.25))
            .unwrap();
        let table = store.query(&StatQuery::new(StatKind::Skipgrams)).unwrap();
        assert_eq!(table.rows[0].value, StatValue::Weight(0.75));
    }

    #[test]
    fn test_value_kind_mismatch_rejected() {
        let store = store();
        let err = store
            .insert_row(StatKind::Unigrams, "a", StatValue::Weight(1.0), "s")
            .unwrap_err();
        assert!(matches!(err, StoreError::ValueKind { .. }));
    }

    #[test]
    fn test_add_to_missing_row() {
        let store = store();
        let err = store
            .add_to_row(StatKind::Unigrams, 42, StatValue::Freq(1))
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingRow { id: 42, .. }));
    }

    #[test]
    fn test_query_header_order_and_limit() {
        let store = store();
        for (name, freq) in [("a", 3), ("b", 7), ("c", 5)] {
            store
                .insert_row(StatKind::Unigrams, name, StatValue::Freq(freq), "s")
                .unwrap();
        }

        let table = store
            .query(&StatQuery::new(StatKind::Unigrams).limit(2))
            .unwrap();
        assert_eq!(table.header, vec!["id", "name", "freq", "session"]);
        let names: Vec<&str> = table.rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["b", "c"]);

        let table = store
            .query(&StatQuery::new(StatKind::Unigrams).sort_by(SortKey::Name))
            .unwrap();
        let names: Vec<&str> = table.rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_sessions_and_totals() {
        let store = store();
        store
            .insert_row(StatKind::Unigrams, "a", StatValue::Freq(2), "work")
            .unwrap();
        store
            .insert_row(StatKind::Unigrams, "a", StatValue::Freq(3), "home")
            .unwrap();
        store
            .insert_row(StatKind::Skipgrams, "ab", StatValue::Weight(0.5), "travel")
            .unwrap();

        assert_eq!(store.sessions().unwrap(), vec!["home", "travel", "work"]);

        let all = store.totals(StatKind::Unigrams, None).unwrap();
        assert_eq!(all, vec![("a".to_string(), StatValue::Freq(5))]);

        let work = store.totals(StatKind::Unigrams, Some("work")).unwrap();
        assert_eq!(work, vec![("a".to_string(), StatValue::Freq(2))]);
    }

    #[test]
    fn test_open_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("logger.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.init().unwrap();
            store
                .insert_row(StatKind::Trigrams, "the", StatValue::Freq(1), "s")
                .unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        store.init().unwrap();
        assert!(store.find_row(StatKind::Trigrams, "the", "s").unwrap().is_some());
    }

    #[test]
    fn test_file_database_syncs_every_commit() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("logger.db")).unwrap();
        let journal: String = store
            .conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        let synchronous: i64 = store
            .conn
            .query_row("PRAGMA synchronous", [], |row| row.get(0))
            .unwrap();
        assert_eq!(journal, "wal");
        // 2 = FULL
        assert_eq!(synchronous, 2);
    }
}
