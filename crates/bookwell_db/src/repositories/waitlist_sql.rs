use super::SqlStore;
use crate::codec::{date_text, millis, waitlist_from_row, WAITLIST_COLUMNS};
use crate::error::{DbError, SqlResultExt};
use bookwell_common::BookwellError;
use bookwell_engine::models::{WaitlistEntry, WaitlistStatus};
use bookwell_engine::store::WaitlistRepository;
use chrono::{DateTime, Utc};

impl WaitlistRepository for SqlStore {
    async fn insert_waitlist_entry(&self, entry: WaitlistEntry) -> Result<WaitlistEntry, BookwellError> {
        let query = format!(
            "INSERT INTO waitlist_entries ({WAITLIST_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
        );
        sqlx::query(&query)
            .bind(&entry.id)
            .bind(&entry.calendar_id)
            .bind(&entry.service_type_id)
            .bind(&entry.customer.name)
            .bind(entry.customer.email.as_deref())
            .bind(entry.customer.phone.as_deref())
            .bind(date_text(entry.preferred_date))
            .bind(i64::from(entry.flexibility_days))
            .bind(entry.status.as_str())
            .bind(millis(entry.created_at))
            .bind(entry.notified_at.map(millis))
            .execute(self.db_client.pool())
            .await
            .db()?;
        Ok(entry)
    }

    async fn get_waitlist_entry(&self, entry_id: &str) -> Result<Option<WaitlistEntry>, BookwellError> {
        let query = format!("SELECT {WAITLIST_COLUMNS} FROM waitlist_entries WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(entry_id)
            .fetch_optional(self.db_client.pool())
            .await
            .db()?;
        Ok(row.as_ref().map(waitlist_from_row).transpose()?)
    }

    async fn list_waitlist(
        &self,
        calendar_id: &str,
        status: Option<WaitlistStatus>,
    ) -> Result<Vec<WaitlistEntry>, BookwellError> {
        let rows = match status {
            Some(status) => {
                let query = format!(
                    "SELECT {WAITLIST_COLUMNS} FROM waitlist_entries \
                     WHERE calendar_id = $1 AND status = $2 ORDER BY created_at, id"
                );
                sqlx::query(&query)
                    .bind(calendar_id)
                    .bind(status.as_str())
                    .fetch_all(self.db_client.pool())
                    .await
            }
            None => {
                let query = format!(
                    "SELECT {WAITLIST_COLUMNS} FROM waitlist_entries \
                     WHERE calendar_id = $1 ORDER BY created_at, id"
                );
                sqlx::query(&query)
                    .bind(calendar_id)
                    .fetch_all(self.db_client.pool())
                    .await
            }
        }
        .db()?;
        Ok(rows
            .iter()
            .map(waitlist_from_row)
            .collect::<Result<Vec<_>, DbError>>()?)
    }

    async fn transition_waitlist_entry(
        &self,
        entry_id: &str,
        expected: WaitlistStatus,
        next: WaitlistStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<WaitlistEntry>, BookwellError> {
        let changed = if next == WaitlistStatus::Notified {
            sqlx::query(
                "UPDATE waitlist_entries SET status = $1, notified_at = $2 \
                 WHERE id = $3 AND status = $4",
            )
            .bind(next.as_str())
            .bind(millis(at))
            .bind(entry_id)
            .bind(expected.as_str())
            .execute(self.db_client.pool())
            .await
        } else {
            sqlx::query("UPDATE waitlist_entries SET status = $1 WHERE id = $2 AND status = $3")
                .bind(next.as_str())
                .bind(entry_id)
                .bind(expected.as_str())
                .execute(self.db_client.pool())
                .await
        }
        .db()?
        .rows_affected();

        if changed == 0 {
            return Ok(None);
        }
        self.get_waitlist_entry(entry_id).await
    }
}
