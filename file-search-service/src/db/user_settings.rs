//! Per-user file search settings storage.

use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};

use super::Database;
use crate::error::{DatabaseError, ServiceResult};
use crate::user_settings::FileSearchSettings;

impl Database {
    /// Stored settings for a user, or `None` if the user never saved any
    pub fn get_user_settings(&self, user_id: &str) -> ServiceResult<Option<FileSearchSettings>> {
        let conn = self.conn()?;
        read_user_settings(&conn, user_id)
    }

    /// Read, modify and save a user's settings in one transaction.
    ///
    /// Users without a row start from the defaults. Nothing is written when
    /// `modify` fails.
    pub fn update_user_settings(
        &self,
        user_id: &str,
        modify: impl FnOnce(&mut FileSearchSettings) -> ServiceResult<()>,
    ) -> ServiceResult<FileSearchSettings> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(DatabaseError::Query)?;

        let mut settings = read_user_settings(&tx, user_id)?.unwrap_or_default();
        modify(&mut settings)?;
        write_user_settings(&tx, user_id, &settings)?;

        tx.commit().map_err(DatabaseError::Query)?;
        Ok(settings)
    }
}

fn read_user_settings(
    conn: &Connection,
    user_id: &str,
) -> ServiceResult<Option<FileSearchSettings>> {
    let row = conn
        .query_row(
            "SELECT store_names, top_k, selected_store FROM user_file_search_settings WHERE user_id = ?1",
            params![user_id],
            |row| {
                let names: String = row.get(0)?;
                let top_k: Option<i64> = row.get(1)?;
                let selected: Option<String> = row.get(2)?;
                Ok((names, top_k, selected))
            },
        )
        .optional()
        .map_err(DatabaseError::Query)?;

    let Some((names, top_k, selected_store)) = row else {
        return Ok(None);
    };

    let file_search_store_names: Vec<String> =
        serde_json::from_str(&names).map_err(DatabaseError::Serialization)?;

    Ok(Some(FileSearchSettings {
        file_search_store_names,
        file_search_top_k: top_k.and_then(|k| u32::try_from(k).ok()).filter(|k| *k > 0),
        selected_store,
    }))
}

fn write_user_settings(
    conn: &Connection,
    user_id: &str,
    settings: &FileSearchSettings,
) -> ServiceResult<()> {
    let names = serde_json::to_string(&settings.file_search_store_names)
        .map_err(DatabaseError::Serialization)?;

    conn.execute(
        "INSERT INTO user_file_search_settings (user_id, store_names, top_k, selected_store, updated_at) \
         VALUES (?1, ?2, ?3, ?4, datetime('now')) \
         ON CONFLICT(user_id) DO UPDATE SET \
            store_names = excluded.store_names, \
            top_k = excluded.top_k, \
            selected_store = excluded.selected_store, \
            updated_at = excluded.updated_at",
        params![
            user_id,
            names,
            settings.file_search_top_k,
            settings.selected_store
        ],
    )
    .map_err(DatabaseError::Query)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::db::Database;
    use crate::error::ServiceError;
    use crate::user_settings::FileSearchSettings;

    fn open() -> (Database, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("test.db")).unwrap();
        (db, dir)
    }

    #[test]
    fn user_settings_round_trip_per_user() {
        let (db, _dir) = open();

        assert_eq!(db.get_user_settings("alice").unwrap(), None);

        let settings = FileSearchSettings {
            file_search_store_names: vec!["fileSearchStores/rules".to_string(), "lore".to_string()],
            file_search_top_k: Some(7),
            selected_store: Some("lore".to_string()),
        };
        let saved = db
            .update_user_settings("alice", |s| {
                *s = settings.clone();
                Ok(())
            })
            .unwrap();
        assert_eq!(saved, settings);
        assert_eq!(db.get_user_settings("alice").unwrap(), Some(settings.clone()));
        assert_eq!(db.get_user_settings("bob").unwrap(), None);

        db.update_user_settings("alice", |s| {
            s.file_search_top_k = None;
            s.selected_store = None;
            Ok(())
        })
        .unwrap();
        let cleared = FileSearchSettings {
            file_search_top_k: None,
            selected_store: None,
            ..settings
        };
        assert_eq!(db.get_user_settings("alice").unwrap(), Some(cleared));
    }

    #[test]
    fn failed_update_writes_nothing() {
        let (db, _dir) = open();

        let err = db
            .update_user_settings("alice", |s| {
                s.add_store("rules");
                Err(ServiceError::invalid("rejected"))
            })
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidRequest { .. }));
        assert_eq!(db.get_user_settings("alice").unwrap(), None);
    }

    #[test]
    fn concurrent_updates_are_all_kept() {
        let (db, _dir) = open();

        std::thread::scope(|scope| {
            for i in 0..64 {
                let db = &db;
                scope.spawn(move || {
                    db.update_user_settings("alice", |s| {
                        s.add_store(&format!("store-{i}"));
                        Ok(())
                    })
                    .unwrap();
                });
            }
        });

        let settings = db.get_user_settings("alice").unwrap().unwrap();
        assert_eq!(settings.file_search_store_names.len(), 64);
    }
}
