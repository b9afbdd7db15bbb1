pub mod seed;

use crate::analytics::alerts::ProactiveAlert;
use crate::domain::crisis::{CrisisDetectionResult, CrisisEvent};
use crate::domain::metrics::{CheckinMetrics, DatedCheckin};
use crate::domain::plan::{ActionTemplate, DailyPlan, MetricTarget, PlannedAction};
use crate::domain::trigger_date::TriggerDate;
use crate::error::StoreError;
use crate::services::adaptive_mode::AdaptiveModeState;
use crate::services::adherence::AdherenceState;
use crate::store::{
    ActionCatalog, EventStore, HistoryProvider, PlanStore, StateStore, StoreResult,
    TriggerDateStore, UserProfile,
};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// Postgres-backed collaborator. Enums live in TEXT columns, nested records
/// in JSONB.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_state_column<T>(&self, user_id: Uuid, column: &'static str) -> StoreResult<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        let row = sqlx::query(&format!(
            "SELECT {column} FROM user_engine_state WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        match row.try_get::<Option<serde_json::Value>, _>(column)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    async fn save_state_column<T>(
        &self,
        user_id: Uuid,
        column: &'static str,
        value: Option<&T>,
    ) -> StoreResult<()>
    where
        T: Serialize + Sync,
    {
        let json = value.map(serde_json::to_value).transpose()?;
        sqlx::query(&format!(
            r#"
            INSERT INTO user_engine_state (user_id, {column})
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE
            SET {column} = EXCLUDED.{column},
                updated_at = NOW()
            "#
        ))
        .bind(user_id)
        .bind(json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn text_enum<T>(row: &PgRow, column: &str) -> StoreResult<T>
where
    T: for<'a> TryFrom<&'a str>,
{
    let raw: String = row.try_get(column)?;
    T::try_from(raw.as_str())
        .map_err(|_| StoreError::Corrupt(format!("unknown {column} '{raw}'")))
}

fn json_column<T: DeserializeOwned>(row: &PgRow, column: &str) -> StoreResult<T> {
    let value: serde_json::Value = row.try_get(column)?;
    Ok(serde_json::from_value(value)?)
}

fn checkin_from_row(row: &PgRow) -> StoreResult<DatedCheckin> {
    Ok(DatedCheckin {
        date: row.try_get("checkin_date")?,
        metrics: CheckinMetrics {
            mood: row.try_get("mood")?,
            stress: row.try_get("stress")?,
            sleep: row.try_get("sleep")?,
            energy: row.try_get("energy")?,
            focus: row.try_get("focus")?,
            anxiety: row.try_get("anxiety")?,
        },
    })
}

fn crisis_event_from_row(row: &PgRow) -> StoreResult<CrisisEvent> {
    Ok(CrisisEvent {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        checkin_date: row.try_get("checkin_date")?,
        severity: text_enum(row, "severity")?,
        trigger_type: text_enum(row, "trigger_type")?,
        detection_method: text_enum(row, "detection_method")?,
        risk_factors: row.try_get("risk_factors")?,
        created_at: row.try_get("created_at")?,
        acknowledged: row.try_get("acknowledged")?,
    })
}

fn trigger_date_from_row(row: &PgRow) -> StoreResult<TriggerDate> {
    Ok(TriggerDate {
        id: row.try_get("id")?,
        date: row.try_get("trigger_date")?,
        label: row.try_get("label")?,
        repeat_annually: row.try_get("repeat_annually")?,
    })
}

fn template_from_row(row: &PgRow) -> StoreResult<ActionTemplate> {
    Ok(ActionTemplate {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        category: text_enum(row, "category")?,
        duration_minutes: row.try_get("duration_minutes")?,
        targets: json_column::<Vec<MetricTarget>>(row, "targets")?,
        focus_tags: row.try_get("focus_tags")?,
        difficulty: text_enum(row, "difficulty")?,
        default_anchor: row.try_get("default_anchor")?,
        active: row.try_get("active")?,
    })
}

#[async_trait]
impl HistoryProvider for PgStore {
    async fn recent_checkins(
        &self,
        user_id: Uuid,
        today: NaiveDate,
        days: i64,
    ) -> StoreResult<Vec<DatedCheckin>> {
        let from = today - Duration::days(days.max(1) - 1);
        let rows = sqlx::query(
            r#"
            SELECT checkin_date, mood, stress, sleep, energy, focus, anxiety
            FROM checkins
            WHERE user_id = $1
              AND checkin_date BETWEEN $2 AND $3
            ORDER BY checkin_date DESC
            "#,
        )
        .bind(user_id)
        .bind(from)
        .bind(today)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(checkin_from_row).collect()
    }

    async fn upsert_checkin(&self, user_id: Uuid, checkin: DatedCheckin) -> StoreResult<()> {
        let m = checkin.metrics;
        sqlx::query(
            r#"
            INSERT INTO checkins (user_id, checkin_date, mood, stress, sleep, energy, focus, anxiety)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (user_id, checkin_date) DO UPDATE
            SET mood = EXCLUDED.mood,
                stress = EXCLUDED.stress,
                sleep = EXCLUDED.sleep,
                energy = EXCLUDED.energy,
                focus = EXCLUDED.focus,
                anxiety = EXCLUDED.anxiety,
                created_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(checkin.date)
        .bind(m.mood)
        .bind(m.stress)
        .bind(m.sleep)
        .bind(m.energy)
        .bind(m.focus)
        .bind(m.anxiety)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl EventStore for PgStore {
    async fn has_recent_crisis_event(&self, user_id: Uuid, cooldown_hours: i64) -> StoreResult<bool> {
        let cutoff = Utc::now() - Duration::hours(cooldown_hours);
        let exists: (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM crisis_events WHERE user_id = $1 AND created_at >= $2)",
        )
        .bind(user_id)
        .bind(cutoff)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists.0)
    }

    async fn create_crisis_event(
        &self,
        user_id: Uuid,
        checkin_date: NaiveDate,
        result: &CrisisDetectionResult,
    ) -> StoreResult<Uuid> {
        let event = CrisisEvent::from_result(user_id, checkin_date, result).ok_or_else(|| {
            StoreError::Corrupt("crisis event without a positive detection".to_string())
        })?;

        sqlx::query(
            r#"
            INSERT INTO crisis_events
                (id, user_id, checkin_date, severity, trigger_type, detection_method,
                 risk_factors, acknowledged, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, FALSE, $8)
            "#,
        )
        .bind(event.id)
        .bind(user_id)
        .bind(checkin_date)
        .bind(event.severity.as_str())
        .bind(event.trigger_type.as_str())
        .bind(event.detection_method.as_str())
        .bind(&event.risk_factors)
        .bind(event.created_at)
        .execute(&self.pool)
        .await?;
        Ok(event.id)
    }

    async fn acknowledge_crisis_event(&self, user_id: Uuid, event_id: Uuid) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE crisis_events SET acknowledged = TRUE WHERE id = $1 AND user_id = $2",
        )
        .bind(event_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list_crisis_events(&self, user_id: Uuid) -> StoreResult<Vec<CrisisEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, checkin_date, severity, trigger_type, detection_method,
                   risk_factors, acknowledged, created_at
            FROM crisis_events
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(crisis_event_from_row).collect()
    }
}

#[async_trait]
impl TriggerDateStore for PgStore {
    async fn list_trigger_dates(&self, user_id: Uuid) -> StoreResult<Vec<TriggerDate>> {
        let rows = sqlx::query(
            r#"
            SELECT id, trigger_date, label, repeat_annually
            FROM trigger_dates
            WHERE user_id = $1
            ORDER BY trigger_date
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(trigger_date_from_row).collect()
    }

    async fn create_trigger_date(&self, user_id: Uuid, trigger: &TriggerDate) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO trigger_dates (id, user_id, trigger_date, label, repeat_annually)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(trigger.id)
        .bind(user_id)
        .bind(trigger.date)
        .bind(&trigger.label)
        .bind(trigger.repeat_annually)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_trigger_date(&self, user_id: Uuid, trigger: &TriggerDate) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE trigger_dates
            SET trigger_date = $3,
                label = $4,
                repeat_annually = $5
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(trigger.id)
        .bind(user_id)
        .bind(trigger.date)
        .bind(&trigger.label)
        .bind(trigger.repeat_annually)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_trigger_date(&self, user_id: Uuid, trigger_id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM trigger_dates WHERE id = $1 AND user_id = $2")
            .bind(trigger_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl PlanStore for PgStore {
    async fn get_plan(&self, user_id: Uuid, plan_date: NaiveDate) -> StoreResult<Option<DailyPlan>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, plan_date, actions, reduced_load
            FROM daily_plans
            WHERE user_id = $1
              AND plan_date = $2
            "#,
        )
        .bind(user_id)
        .bind(plan_date)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(DailyPlan {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            plan_date: row.try_get("plan_date")?,
            actions: json_column::<Vec<PlannedAction>>(&row, "actions")?,
            reduced_load: row.try_get("reduced_load")?,
        }))
    }

    async fn save_plan(&self, plan: &DailyPlan) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO daily_plans (id, user_id, plan_date, actions, reduced_load)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, plan_date) DO UPDATE
            SET id = EXCLUDED.id,
                actions = EXCLUDED.actions,
                reduced_load = EXCLUDED.reduced_load,
                updated_at = NOW()
            "#,
        )
        .bind(plan.id)
        .bind(plan.user_id)
        .bind(plan.plan_date)
        .bind(serde_json::to_value(&plan.actions)?)
        .bind(plan.reduced_load)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ActionCatalog for PgStore {
    async fn active_templates(&self) -> StoreResult<Vec<ActionTemplate>> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, description, category, duration_minutes, targets,
                   focus_tags, difficulty, default_anchor, active
            FROM action_templates
            WHERE active = TRUE
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(template_from_row).collect()
    }
}

#[async_trait]
impl StateStore for PgStore {
    async fn load_profile(&self, user_id: Uuid) -> StoreResult<UserProfile> {
        let row = sqlx::query(
            "SELECT focus_areas, timezone FROM user_engine_state WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(UserProfile {
                focus_areas: row.try_get("focus_areas")?,
                timezone: row.try_get("timezone")?,
            }),
            None => Ok(UserProfile::default()),
        }
    }

    async fn save_profile(&self, user_id: Uuid, profile: &UserProfile) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_engine_state (user_id, focus_areas, timezone)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE
            SET focus_areas = EXCLUDED.focus_areas,
                timezone = EXCLUDED.timezone,
                updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(&profile.focus_areas)
        .bind(&profile.timezone)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load_mode(&self, user_id: Uuid) -> StoreResult<AdaptiveModeState> {
        Ok(self.load_state_column(user_id, "mode").await?.unwrap_or_default())
    }

    async fn save_mode(&self, user_id: Uuid, state: &AdaptiveModeState) -> StoreResult<()> {
        self.save_state_column(user_id, "mode", Some(state)).await
    }

    async fn load_adherence(&self, user_id: Uuid) -> StoreResult<AdherenceState> {
        Ok(self
            .load_state_column(user_id, "adherence")
            .await?
            .unwrap_or_default())
    }

    async fn save_adherence(&self, user_id: Uuid, state: &AdherenceState) -> StoreResult<()> {
        self.save_state_column(user_id, "adherence", Some(state)).await
    }

    async fn load_alert(&self, user_id: Uuid) -> StoreResult<Option<ProactiveAlert>> {
        self.load_state_column(user_id, "alert").await
    }

    async fn replace_alert(&self, user_id: Uuid, alert: Option<&ProactiveAlert>) -> StoreResult<()> {
        self.save_state_column(user_id, "alert", alert).await
    }

    async fn known_users(&self) -> StoreResult<Vec<Uuid>> {
        let rows = sqlx::query(
            r#"
            SELECT user_id FROM user_engine_state
            UNION
            SELECT DISTINCT user_id FROM checkins
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get::<Uuid, _>("user_id").map_err(StoreError::from))
            .collect()
    }
}
