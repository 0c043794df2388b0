use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::day::Day;
use crate::error::ServiceResult;
use crate::targets::repo_types::MacroTargets;

#[async_trait]
pub trait TargetStore: Send + Sync {
    async fn find(&self, user_id: Uuid, day: Day) -> ServiceResult<Option<MacroTargets>>;

    /// Insert-or-replace keyed by `(user_id, day)`.
    async fn upsert(&self, user_id: Uuid, day: Day, targets: &MacroTargets)
        -> ServiceResult<MacroTargets>;
}

#[derive(Clone)]
pub struct PgTargetStore {
    db: PgPool,
}

impl PgTargetStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TargetStore for PgTargetStore {
    async fn find(&self, user_id: Uuid, day: Day) -> ServiceResult<Option<MacroTargets>> {
        let row = sqlx::query_as::<_, MacroTargets>(
            r#"
            SELECT protein_level, fat_level, calorie_adjustment
            FROM daily_macro_targets
            WHERE user_id = $1 AND day = $2
            "#,
        )
        .bind(user_id)
        .bind(day.as_str())
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn upsert(
        &self,
        user_id: Uuid,
        day: Day,
        targets: &MacroTargets,
    ) -> ServiceResult<MacroTargets> {
        let row = sqlx::query_as::<_, MacroTargets>(
            r#"
            INSERT INTO daily_macro_targets (user_id, day, protein_level, fat_level, calorie_adjustment)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, day)
            DO UPDATE SET protein_level = EXCLUDED.protein_level,
                          fat_level = EXCLUDED.fat_level,
                          calorie_adjustment = EXCLUDED.calorie_adjustment,
                          updated_at = now()
            RETURNING protein_level, fat_level, calorie_adjustment
            "#,
        )
        .bind(user_id)
        .bind(day.as_str())
        .bind(targets.protein_level)
        .bind(targets.fat_level)
        .bind(targets.calorie_adjustment)
        .fetch_one(&self.db)
        .await?;
        Ok(row)
    }
}
