//! Bookings, including the serialised check-then-insert.

use super::SqlStore;
use crate::codec::{booking_from_row, flag, millis, BOOKING_COLUMNS};
use crate::error::{DbError, SqlResultExt};
use bookwell_common::{not_found, BookwellError};
use bookwell_engine::models::{Booking, BookingStatus};
use bookwell_engine::store::{BookingRepository, BookingScope};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

impl BookingRepository for SqlStore {
    async fn list_active_bookings(
        &self,
        calendar_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Booking>, BookwellError> {
        let query = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings \
             WHERE calendar_id = $1 AND status IN ('pending', 'confirmed') \
             AND start_time < $2 AND end_time > $3 \
             ORDER BY start_time"
        );
        let rows = sqlx::query(&query)
            .bind(calendar_id)
            .bind(millis(to))
            .bind(millis(from))
            .fetch_all(self.db_client.pool())
            .await
            .db()?;
        Ok(rows
            .iter()
            .map(booking_from_row)
            .collect::<Result<Vec<_>, DbError>>()?)
    }

    async fn get_booking(&self, booking_id: &str) -> Result<Option<Booking>, BookwellError> {
        let query = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(booking_id)
            .fetch_optional(self.db_client.pool())
            .await
            .db()?;
        Ok(row.as_ref().map(booking_from_row).transpose()?)
    }

    async fn commit_booking<F>(
        &self,
        booking: Booking,
        scope: BookingScope,
        admit: F,
    ) -> Result<Booking, BookwellError>
    where
        F: FnOnce(&[Booking]) -> Result<(), BookwellError> + Send,
    {
        let mut tx = self.db_client.begin().await?;

        // Writing the calendar row takes its lock (a row lock on PostgreSQL,
        // the database write lock on SQLite) until commit, so concurrent
        // commits for the same calendar run one after another.
        let locked = sqlx::query("UPDATE calendars SET name = name WHERE id = $1")
            .bind(&booking.calendar_id)
            .execute(&mut *tx)
            .await
            .db()?
            .rows_affected();
        if locked == 0 {
            return Err(not_found(format!("calendar {}", booking.calendar_id)));
        }

        let query = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings \
             WHERE calendar_id = $1 AND status IN ('pending', 'confirmed') \
             AND start_time < $2 AND end_time > $3 \
             ORDER BY start_time"
        );
        let rows = sqlx::query(&query)
            .bind(&booking.calendar_id)
            .bind(millis(scope.to))
            .bind(millis(scope.from))
            .fetch_all(&mut *tx)
            .await
            .db()?;
        let existing = rows
            .iter()
            .map(booking_from_row)
            .collect::<Result<Vec<_>, DbError>>()?;
        debug!(existing = existing.len(), "Admission scope loaded");

        // Dropping the transaction on rejection rolls it back
        admit(&existing)?;

        let insert = format!(
            "INSERT INTO bookings ({BOOKING_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"
        );
        sqlx::query(&insert)
            .bind(&booking.id)
            .bind(&booking.calendar_id)
            .bind(&booking.service_type_id)
            .bind(millis(booking.start_time))
            .bind(millis(booking.end_time))
            .bind(booking.status.as_str())
            .bind(&booking.customer.name)
            .bind(booking.customer.email.as_deref())
            .bind(booking.customer.phone.as_deref())
            .bind(booking.notes.as_deref())
            .bind(flag(booking.payment_confirmed))
            .bind(booking.cancellation_reason.as_deref())
            .bind(millis(booking.created_at))
            .bind(millis(booking.updated_at))
            .execute(&mut *tx)
            .await
            .db()?;
        tx.commit().await.db()?;

        info!(booking_id = %booking.id, "Booking committed");
        Ok(booking)
    }

    async fn transition_booking(
        &self,
        booking_id: &str,
        expected: BookingStatus,
        next: BookingStatus,
        cancellation_reason: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<Option<Booking>, BookwellError> {
        let changed = if next == BookingStatus::Cancelled {
            sqlx::query(
                "UPDATE bookings SET status = $1, updated_at = $2, cancellation_reason = $3 \
                 WHERE id = $4 AND status = $5",
            )
            .bind(next.as_str())
            .bind(millis(at))
            .bind(cancellation_reason.as_deref())
            .bind(booking_id)
            .bind(expected.as_str())
            .execute(self.db_client.pool())
            .await
        } else {
            sqlx::query(
                "UPDATE bookings SET status = $1, updated_at = $2 WHERE id = $3 AND status = $4",
            )
            .bind(next.as_str())
            .bind(millis(at))
            .bind(booking_id)
            .bind(expected.as_str())
            .execute(self.db_client.pool())
            .await
        }
        .db()?
        .rows_affected();

        if changed == 0 {
            debug!(booking_id, "Booking status moved on, transition skipped");
            return Ok(None);
        }
        self.get_booking(booking_id).await
    }
}
