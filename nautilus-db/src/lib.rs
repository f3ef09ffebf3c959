mod error;
mod models;

pub use error::{DbError, Result};
pub use models::{PlayerId, PlayerName, ProfileSnapshot, ProfileUpdate, SkinBlob};

use std::path::Path;
use tokio_rusqlite::Connection;
use tokio_rusqlite::rusqlite::{self, ErrorCode, OptionalExtension, Row, ToSql, params, types::Type};
use tracing::{debug, info};
use uuid::Uuid;

/// Database wrapper for the profile store.
#[derive(Clone)]
pub struct Database {
  conn: Connection,
}

impl Database {
  /// Open or create a database at the given path.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = Connection::open(path).await.map_err(DbError::Sqlite)?;
    let db = Self { conn };
    db.initialize().await?;
    Ok(db)
  }

  /// Create an in-memory database (useful for testing).
  pub async fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .await
      .map_err(DbError::Sqlite)?;
    let db = Self { conn };
    db.initialize().await?;
    Ok(db)
  }

  /// Initialize the database schema.
  async fn initialize(&self) -> Result<()> {
    self
      .conn
      .call(|conn| -> rusqlite::Result<()> {
        // WAL lets reads proceed while a join/quit write is in progress
        conn.pragma_update(None, "journal_mode", "WAL")?;

        conn.execute_batch(
          r#"
                    CREATE TABLE IF NOT EXISTS profiles (
                        id TEXT PRIMARY KEY,
                        last_known_name TEXT,
                        skin_value TEXT,
                        skin_signature TEXT,
                        last_online INTEGER
                    );

                    -- Name lookups are exact but case-insensitive
                    CREATE INDEX IF NOT EXISTS idx_profiles_name
                        ON profiles(last_known_name COLLATE NOCASE);
                    "#,
        )?;
        Ok(())
      })
      .await?;

    info!("database initialized");
    Ok(())
  }

  /// Get a profile by its identifier.
  /// Returns None if not found.
  pub async fn find_profile(&self, id: PlayerId) -> Result<Option<ProfileSnapshot>> {
    let profile = self
      .conn
      .call(move |conn| -> rusqlite::Result<Option<ProfileSnapshot>> {
        conn
          .prepare_cached(
            "SELECT id, last_known_name, skin_value, skin_signature, last_online FROM profiles WHERE id = ?1",
          )?
          .query_row(params![id.to_string()], profile_from_row)
          .optional()
      })
      .await?;

    Ok(profile)
  }

  /// Get every profile whose last known name equals `name`, ignoring case.
  pub async fn find_profiles_by_name(&self, name: String) -> Result<Vec<ProfileSnapshot>> {
    let profiles = self
      .conn
      .call(move |conn| -> rusqlite::Result<Vec<ProfileSnapshot>> {
        let mut stmt = conn.prepare_cached(
          "SELECT id, last_known_name, skin_value, skin_signature, last_online FROM profiles WHERE last_known_name = ?1 COLLATE NOCASE ORDER BY last_online DESC",
        )?;

        let profiles = stmt
          .query_map(params![&name], profile_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(profiles)
      })
      .await?;

    Ok(profiles)
  }

  /// Insert a new profile.
  /// Returns an error if a profile with the same identifier already exists.
  pub async fn insert_profile(&self, profile: ProfileSnapshot) -> Result<()> {
    let id = profile.id();

    self
      .conn
      .call(move |conn| -> rusqlite::Result<Result<()>> {
        let name = profile.last_known_name.map(|n| n.to_string());
        let (skin_value, skin_signature) = match profile.last_known_skin {
          Some(skin) => (Some(skin.value), Some(skin.signature)),
          None => (None, None),
        };

        let inserted = conn
          .prepare_cached(
            "INSERT INTO profiles (id, last_known_name, skin_value, skin_signature, last_online) VALUES (?1, ?2, ?3, ?4, ?5)",
          )?
          .execute(params![
            id.to_string(),
            name,
            skin_value,
            skin_signature,
            profile.last_online,
          ]);

        match inserted {
          Ok(_) => Ok(Ok(())),
          Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == ErrorCode::ConstraintViolation =>
          {
            Ok(Err(DbError::DuplicateProfile))
          }
          Err(err) => Err(err),
        }
      })
      .await??;

    debug!(%id, "inserted profile");
    Ok(())
  }

  /// Write the fields named in `update`, leaving the rest untouched.
  pub async fn update_profile(&self, id: PlayerId, update: ProfileUpdate) -> Result<()> {
    if update.is_empty() {
      return Ok(());
    }

    self
      .conn
      .call(move |conn| -> rusqlite::Result<Result<()>> {
        let mut assignments: Vec<&str> = Vec::with_capacity(4);
        let mut values: Vec<Box<dyn ToSql>> = Vec::with_capacity(5);

        if let Some(name) = update.last_known_name {
          assignments.push("last_known_name = ?");
          values.push(Box::new(name.to_string()));
        }
        if let Some(skin) = update.last_known_skin {
          let (value, signature) = match skin {
            Some(skin) => (Some(skin.value), Some(skin.signature)),
            None => (None, None),
          };
          assignments.push("skin_value = ?");
          values.push(Box::new(value));
          assignments.push("skin_signature = ?");
          values.push(Box::new(signature));
        }
        if let Some(at) = update.last_online {
          assignments.push("last_online = ?");
          values.push(Box::new(at));
        }
        values.push(Box::new(id.to_string()));

        let sql = format!("UPDATE profiles SET {} WHERE id = ?", assignments.join(", "));
        let params: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
        let updated = conn.prepare_cached(&sql)?.execute(params.as_slice())?;

        if updated == 0 {
          return Ok(Err(DbError::ProfileNotFound));
        }

        Ok(Ok(()))
      })
      .await??;

    debug!(%id, "updated profile");
    Ok(())
  }

  /// Number of stored profiles.
  pub async fn count_profiles(&self) -> Result<u64> {
    let count = self
      .conn
      .call(|conn| -> rusqlite::Result<i64> {
        conn
          .prepare_cached("SELECT COUNT(*) FROM profiles")?
          .query_row([], |row| row.get(0))
      })
      .await?;

    Ok(count as u64)
  }
}

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<ProfileSnapshot> {
  let id: String = row.get(0)?;
  let id = Uuid::parse_str(&id)
    .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;

  let name: Option<String> = row.get(1)?;
  let last_known_name = name
    .map(|n| {
      PlayerName::from(n.as_str()).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e.simplify()))
      })
    })
    .transpose()?;

  let skin_value: Option<String> = row.get(2)?;
  let skin_signature: Option<String> = row.get(3)?;
  let last_known_skin = match (skin_value, skin_signature) {
    (Some(value), Some(signature)) => Some(SkinBlob { value, signature }),
    _ => None,
  };

  let mut profile = ProfileSnapshot::new(id).with_skin(last_known_skin);
  profile.last_known_name = last_known_name;
  profile.last_online = row.get(4)?;
  Ok(profile)
}
