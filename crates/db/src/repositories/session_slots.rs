use sqlx::Row;

use chrono::Utc;
use wayfarer_core::{IntentSlots, SessionId};

use super::{RepositoryError, SessionSlotRepository};
use crate::DbPool;

pub struct SqlSessionSlotRepository {
    pool: DbPool,
}

impl SqlSessionSlotRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SessionSlotRepository for SqlSessionSlotRepository {
    async fn get(&self, session_id: &SessionId) -> Result<Option<IntentSlots>, RepositoryError> {
        let row = sqlx::query("SELECT slots_json FROM session_slots WHERE session_id = ?")
            .bind(session_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let raw = row.try_get::<String, _>("slots_json")?;
        let slots = serde_json::from_str::<IntentSlots>(&raw).map_err(|error| {
            RepositoryError::Decode(format!("session `{session_id}` slots_json: {error}"))
        })?;
        Ok(Some(slots))
    }

    async fn put(&self, session_id: &SessionId, slots: &IntentSlots) -> Result<(), RepositoryError> {
        slots.validate()?;
        let encoded = serde_json::to_string(slots)
            .map_err(|error| RepositoryError::Decode(format!("encode slots: {error}")))?;

        sqlx::query(
            "INSERT INTO session_slots (session_id, slots_json, updated_at)
             VALUES (?, ?, ?)
             ON CONFLICT(session_id) DO UPDATE SET
                slots_json = excluded.slots_json,
                updated_at = excluded.updated_at",
        )
        .bind(session_id.as_str())
        .bind(encoded)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use wayfarer_core::{IntentSlots, SessionId};

    use super::SqlSessionSlotRepository;
    use crate::migrations::run_pending;
    use crate::repositories::{RepositoryError, SessionSlotRepository};
    use crate::{connect_with_settings, DbPool};

    async fn pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("migrate");
        pool
    }

    #[tokio::test]
    async fn upsert_replaces_stored_slots() {
        let repo = SqlSessionSlotRepository::new(pool().await);
        let session = SessionId::from("sql-1");

        let first = IntentSlots {
            destination: Some("taiwan".to_string()),
            start_date: NaiveDate::from_ymd_opt(2025, 10, 1),
            children_ages: Some(vec![4, 9]),
            ..IntentSlots::default()
        };
        repo.put(&session, &first).await.expect("first put");
        assert_eq!(repo.get(&session).await.expect("get"), Some(first.clone()));

        let second = IntentSlots { duration_days: Some(6), ..first };
        repo.put(&session, &second).await.expect("second put");
        assert_eq!(repo.get(&session).await.expect("get"), Some(second));
    }

    #[tokio::test]
    async fn missing_session_reads_as_none() {
        let repo = SqlSessionSlotRepository::new(pool().await);
        assert!(repo.get(&SessionId::from("nobody")).await.expect("get").is_none());
    }

    #[tokio::test]
    async fn corrupt_blob_is_a_decode_error() {
        let pool = pool().await;
        sqlx::query(
            "INSERT INTO session_slots (session_id, slots_json, updated_at) VALUES ('bad', 'nope', 'now')",
        )
        .execute(&pool)
        .await
        .expect("seed corrupt row");

        let repo = SqlSessionSlotRepository::new(pool);
        let result = repo.get(&SessionId::from("bad")).await;
        assert!(matches!(result, Err(RepositoryError::Decode(_))));
    }
}
