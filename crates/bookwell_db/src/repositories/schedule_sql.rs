//! Calendars, schedules, rules, overrides, patterns and service types.

use super::SqlStore;
use crate::codec::{
    calendar_from_row, date_text, flag, millis, override_from_row, pattern_from_row,
    rule_from_row, schedule_from_row, service_from_row, time_text, CALENDAR_COLUMNS,
    OVERRIDE_COLUMNS, PATTERN_COLUMNS, RULE_COLUMNS, SCHEDULE_COLUMNS, SERVICE_COLUMNS,
};
use crate::error::{DbError, SqlResultExt};
use bookwell_common::{internal_error, BookwellError};
use bookwell_engine::models::{
    AvailabilityOverride, AvailabilityRule, Calendar, CalendarPolicy, RecurringPattern, Schedule,
    ServiceType,
};
use bookwell_engine::store::ScheduleRepository;
use chrono::NaiveDate;
use tracing::{debug, info};

impl ScheduleRepository for SqlStore {
    async fn insert_calendar(&self, calendar: Calendar) -> Result<Calendar, BookwellError> {
        let query = format!(
            "INSERT INTO calendars ({CALENDAR_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
        );
        let policy = &calendar.policy;
        sqlx::query(&query)
            .bind(&calendar.id)
            .bind(&calendar.business_id)
            .bind(&calendar.name)
            .bind(&calendar.timezone)
            .bind(i64::from(policy.slot_duration_minutes))
            .bind(i64::from(policy.buffer_minutes))
            .bind(i64::from(policy.minimum_notice_hours))
            .bind(i64::from(policy.booking_window_days))
            .bind(policy.max_bookings_per_day.map(i64::from))
            .bind(flag(policy.allow_waitlist))
            .bind(flag(policy.confirmation_required))
            .bind(millis(calendar.created_at))
            .execute(self.db_client.pool())
            .await
            .db()?;
        info!(calendar_id = %calendar.id, "Calendar stored");
        Ok(calendar)
    }

    async fn get_calendar(&self, calendar_id: &str) -> Result<Option<Calendar>, BookwellError> {
        let query = format!("SELECT {CALENDAR_COLUMNS} FROM calendars WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(calendar_id)
            .fetch_optional(self.db_client.pool())
            .await
            .db()?;
        Ok(row.as_ref().map(calendar_from_row).transpose()?)
    }

    async fn update_calendar_policy(
        &self,
        calendar_id: &str,
        policy: CalendarPolicy,
    ) -> Result<Option<Calendar>, BookwellError> {
        let updated = sqlx::query(
            r#"
            UPDATE calendars
            SET slot_duration_minutes = $1, buffer_minutes = $2, minimum_notice_hours = $3,
                booking_window_days = $4, max_bookings_per_day = $5, allow_waitlist = $6,
                confirmation_required = $7
            WHERE id = $8
            "#,
        )
        .bind(i64::from(policy.slot_duration_minutes))
        .bind(i64::from(policy.buffer_minutes))
        .bind(i64::from(policy.minimum_notice_hours))
        .bind(i64::from(policy.booking_window_days))
        .bind(policy.max_bookings_per_day.map(i64::from))
        .bind(flag(policy.allow_waitlist))
        .bind(flag(policy.confirmation_required))
        .bind(calendar_id)
        .execute(self.db_client.pool())
        .await
        .db()?
        .rows_affected();
        if updated == 0 {
            return Ok(None);
        }
        self.get_calendar(calendar_id).await
    }

    async fn insert_schedule(&self, schedule: Schedule) -> Result<Schedule, BookwellError> {
        let mut tx = self.db_client.begin().await?;
        if schedule.is_default {
            sqlx::query("UPDATE schedules SET is_default = 0 WHERE calendar_id = $1")
                .bind(&schedule.calendar_id)
                .execute(&mut *tx)
                .await
                .db()?;
        }
        let query = format!(
            "INSERT INTO schedules ({SCHEDULE_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6)"
        );
        sqlx::query(&query)
            .bind(&schedule.id)
            .bind(&schedule.calendar_id)
            .bind(&schedule.name)
            .bind(flag(schedule.is_default))
            .bind(flag(schedule.is_active))
            .bind(millis(schedule.created_at))
            .execute(&mut *tx)
            .await
            .db()?;
        tx.commit().await.db()?;
        debug!(schedule_id = %schedule.id, "Schedule stored");
        Ok(schedule)
    }

    async fn get_schedule(&self, schedule_id: &str) -> Result<Option<Schedule>, BookwellError> {
        let query = format!("SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(schedule_id)
            .fetch_optional(self.db_client.pool())
            .await
            .db()?;
        Ok(row.as_ref().map(schedule_from_row).transpose()?)
    }

    async fn default_schedule(&self, calendar_id: &str) -> Result<Option<Schedule>, BookwellError> {
        let query = format!(
            "SELECT {SCHEDULE_COLUMNS} FROM schedules \
             WHERE calendar_id = $1 AND is_default = 1 AND is_active = 1 \
             ORDER BY created_at DESC LIMIT 1"
        );
        let row = sqlx::query(&query)
            .bind(calendar_id)
            .fetch_optional(self.db_client.pool())
            .await
            .db()?;
        Ok(row.as_ref().map(schedule_from_row).transpose()?)
    }

    async fn insert_rule(&self, rule: AvailabilityRule) -> Result<AvailabilityRule, BookwellError> {
        let query = format!(
            "INSERT INTO availability_rules ({RULE_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6)"
        );
        sqlx::query(&query)
            .bind(&rule.id)
            .bind(&rule.schedule_id)
            .bind(i64::from(rule.day_of_week))
            .bind(time_text(&rule.start_time))
            .bind(time_text(&rule.end_time))
            .bind(flag(rule.is_available))
            .execute(self.db_client.pool())
            .await
            .db()?;
        Ok(rule)
    }

    async fn delete_rule(&self, schedule_id: &str, rule_id: &str) -> Result<bool, BookwellError> {
        let deleted = sqlx::query("DELETE FROM availability_rules WHERE id = $1 AND schedule_id = $2")
            .bind(rule_id)
            .bind(schedule_id)
            .execute(self.db_client.pool())
            .await
            .db()?
            .rows_affected();
        Ok(deleted > 0)
    }

    async fn list_rules(&self, schedule_id: &str) -> Result<Vec<AvailabilityRule>, BookwellError> {
        let query = format!(
            "SELECT {RULE_COLUMNS} FROM availability_rules WHERE schedule_id = $1 \
             ORDER BY day_of_week, start_time"
        );
        let rows = sqlx::query(&query)
            .bind(schedule_id)
            .fetch_all(self.db_client.pool())
            .await
            .db()?;
        Ok(rows
            .iter()
            .map(rule_from_row)
            .collect::<Result<Vec<_>, DbError>>()?)
    }

    async fn upsert_override(
        &self,
        day_override: AvailabilityOverride,
    ) -> Result<AvailabilityOverride, BookwellError> {
        let query = format!(
            "INSERT INTO availability_overrides ({OVERRIDE_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (calendar_id, specific_date) DO UPDATE SET \
             id = excluded.id, is_available = excluded.is_available, \
             start_time = excluded.start_time, end_time = excluded.end_time, \
             reason = excluded.reason"
        );
        sqlx::query(&query)
            .bind(&day_override.id)
            .bind(&day_override.calendar_id)
            .bind(date_text(day_override.specific_date))
            .bind(flag(day_override.is_available))
            .bind(day_override.start_time.as_ref().map(time_text))
            .bind(day_override.end_time.as_ref().map(time_text))
            .bind(day_override.reason.as_deref())
            .execute(self.db_client.pool())
            .await
            .db()?;
        debug!(date = %day_override.specific_date, "Override stored");
        Ok(day_override)
    }

    async fn delete_override(
        &self,
        calendar_id: &str,
        date: NaiveDate,
    ) -> Result<bool, BookwellError> {
        let deleted = sqlx::query(
            "DELETE FROM availability_overrides WHERE calendar_id = $1 AND specific_date = $2",
        )
        .bind(calendar_id)
        .bind(date_text(date))
        .execute(self.db_client.pool())
        .await
        .db()?
        .rows_affected();
        Ok(deleted > 0)
    }

    async fn list_overrides(
        &self,
        calendar_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AvailabilityOverride>, BookwellError> {
        let query = format!(
            "SELECT {OVERRIDE_COLUMNS} FROM availability_overrides \
             WHERE calendar_id = $1 AND specific_date >= $2 AND specific_date < $3 \
             ORDER BY specific_date"
        );
        let rows = sqlx::query(&query)
            .bind(calendar_id)
            .bind(date_text(from))
            .bind(date_text(to))
            .fetch_all(self.db_client.pool())
            .await
            .db()?;
        Ok(rows
            .iter()
            .map(override_from_row)
            .collect::<Result<Vec<_>, DbError>>()?)
    }

    async fn insert_pattern(
        &self,
        pattern: RecurringPattern,
    ) -> Result<RecurringPattern, BookwellError> {
        let encoded = serde_json::to_string(&pattern.pattern)
            .map_err(|e| internal_error(format!("cannot encode pattern: {e}")))?;
        let query = format!(
            "INSERT INTO recurring_patterns ({PATTERN_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7)"
        );
        sqlx::query(&query)
            .bind(&pattern.id)
            .bind(&pattern.calendar_id)
            .bind(&pattern.name)
            .bind(encoded)
            .bind(date_text(pattern.valid_from))
            .bind(date_text(pattern.valid_until))
            .bind(millis(pattern.created_at))
            .execute(self.db_client.pool())
            .await
            .db()?;
        Ok(pattern)
    }

    async fn delete_pattern(&self, calendar_id: &str, pattern_id: &str) -> Result<bool, BookwellError> {
        let deleted =
            sqlx::query("DELETE FROM recurring_patterns WHERE id = $1 AND calendar_id = $2")
                .bind(pattern_id)
                .bind(calendar_id)
                .execute(self.db_client.pool())
                .await
                .db()?
                .rows_affected();
        Ok(deleted > 0)
    }

    async fn list_patterns(
        &self,
        calendar_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<RecurringPattern>, BookwellError> {
        // valid_until is inclusive, the queried range is not
        let query = format!(
            "SELECT {PATTERN_COLUMNS} FROM recurring_patterns \
             WHERE calendar_id = $1 AND valid_from < $2 AND valid_until >= $3 \
             ORDER BY created_at"
        );
        let rows = sqlx::query(&query)
            .bind(calendar_id)
            .bind(date_text(to))
            .bind(date_text(from))
            .fetch_all(self.db_client.pool())
            .await
            .db()?;
        Ok(rows
            .iter()
            .map(pattern_from_row)
            .collect::<Result<Vec<_>, DbError>>()?)
    }

    async fn insert_service_type(&self, service: ServiceType) -> Result<ServiceType, BookwellError> {
        let query = format!(
            "INSERT INTO service_types ({SERVICE_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
        );
        sqlx::query(&query)
            .bind(&service.id)
            .bind(&service.calendar_id)
            .bind(&service.name)
            .bind(i64::from(service.duration_minutes))
            .bind(service.price_cents)
            .bind(&service.currency)
            .bind(i64::from(service.preparation_minutes))
            .bind(i64::from(service.cleanup_minutes))
            .bind(i64::from(service.max_attendees))
            .bind(flag(service.requires_prepayment))
            .bind(flag(service.is_active))
            .execute(self.db_client.pool())
            .await
            .db()?;
        info!(service_type_id = %service.id, "Service type stored");
        Ok(service)
    }

    async fn get_service_type(
        &self,
        service_type_id: &str,
    ) -> Result<Option<ServiceType>, BookwellError> {
        let query = format!("SELECT {SERVICE_COLUMNS} FROM service_types WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(service_type_id)
            .fetch_optional(self.db_client.pool())
            .await
            .db()?;
        Ok(row.as_ref().map(service_from_row).transpose()?)
    }
}
