use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ServiceResult;
use crate::foods::repo_types::{FoodData, GlobalFoodRecord, Shadow, UserFoodRecord};

const GLOBAL_COLUMNS: &str =
    "id, name, serving_amount, calories, carbs, protein, protein_general, fat, created_at";

const USER_COLUMNS: &str = "id, user_id, name, serving_amount, calories, carbs, protein, \
     protein_general, fat, is_custom, is_deleted, created_at";

/// Persistence for the shared catalog and per-user overlay rows.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list_global(&self) -> ServiceResult<Vec<GlobalFoodRecord>>;

    async fn find_global(&self, id: Uuid) -> ServiceResult<Option<GlobalFoodRecord>>;

    /// Case-insensitive substring match on the name.
    async fn search_global(&self, term: &str) -> ServiceResult<Vec<GlobalFoodRecord>>;

    /// All overlay rows of a user, tombstones included.
    async fn list_overlay(&self, user_id: Uuid) -> ServiceResult<Vec<UserFoodRecord>>;

    async fn find_overlay(&self, user_id: Uuid, id: Uuid) -> ServiceResult<Option<UserFoodRecord>>;

    /// Like [`CatalogStore::list_overlay`], filtered by name. Tombstones included.
    async fn search_overlay(&self, user_id: Uuid, term: &str) -> ServiceResult<Vec<UserFoodRecord>>;

    async fn insert_custom(&self, user_id: Uuid, food: &FoodData) -> ServiceResult<UserFoodRecord>;

    /// Updates a live overlay row. `None` when no such row exists.
    async fn update_overlay(
        &self,
        user_id: Uuid,
        id: Uuid,
        food: &FoodData,
    ) -> ServiceResult<Option<UserFoodRecord>>;

    /// Hard-deletes a live overlay row. `false` when no such row exists.
    async fn delete_overlay(&self, user_id: Uuid, id: Uuid) -> ServiceResult<bool>;

    /// Atomically inserts a copy or tombstone for a global item, provided the
    /// user has no overlay row of the same name yet. `None` when the global
    /// item does not exist or is already shadowed.
    async fn shadow_global(
        &self,
        user_id: Uuid,
        global_id: Uuid,
        shadow: Shadow<'_>,
    ) -> ServiceResult<Option<UserFoodRecord>>;
}

#[derive(Clone)]
pub struct PgCatalogStore {
    db: PgPool,
}

impl PgCatalogStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// `%term%` with LIKE metacharacters escaped.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    out.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn list_global(&self) -> ServiceResult<Vec<GlobalFoodRecord>> {
        let query = format!("SELECT {GLOBAL_COLUMNS} FROM global_foods ORDER BY name, id");
        let rows = sqlx::query_as::<_, GlobalFoodRecord>(&query)
            .fetch_all(&self.db)
            .await?;
        Ok(rows)
    }

    async fn find_global(&self, id: Uuid) -> ServiceResult<Option<GlobalFoodRecord>> {
        let query = format!("SELECT {GLOBAL_COLUMNS} FROM global_foods WHERE id = $1");
        let row = sqlx::query_as::<_, GlobalFoodRecord>(&query)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row)
    }

    async fn search_global(&self, term: &str) -> ServiceResult<Vec<GlobalFoodRecord>> {
        let query = format!(
            "SELECT {GLOBAL_COLUMNS} FROM global_foods WHERE name ILIKE $1 ORDER BY name, id"
        );
        let rows = sqlx::query_as::<_, GlobalFoodRecord>(&query)
            .bind(like_pattern(term))
            .fetch_all(&self.db)
            .await?;
        Ok(rows)
    }

    async fn list_overlay(&self, user_id: Uuid) -> ServiceResult<Vec<UserFoodRecord>> {
        let query =
            format!("SELECT {USER_COLUMNS} FROM user_foods WHERE user_id = $1 ORDER BY name, id");
        let rows = sqlx::query_as::<_, UserFoodRecord>(&query)
            .bind(user_id)
            .fetch_all(&self.db)
            .await?;
        Ok(rows)
    }

    async fn find_overlay(&self, user_id: Uuid, id: Uuid) -> ServiceResult<Option<UserFoodRecord>> {
        let query =
            format!("SELECT {USER_COLUMNS} FROM user_foods WHERE id = $1 AND user_id = $2");
        let row = sqlx::query_as::<_, UserFoodRecord>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row)
    }

    async fn search_overlay(&self, user_id: Uuid, term: &str) -> ServiceResult<Vec<UserFoodRecord>> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM user_foods \
             WHERE user_id = $1 AND name ILIKE $2 \
             ORDER BY name, id"
        );
        let rows = sqlx::query_as::<_, UserFoodRecord>(&query)
            .bind(user_id)
            .bind(like_pattern(term))
            .fetch_all(&self.db)
            .await?;
        Ok(rows)
    }

    async fn insert_custom(&self, user_id: Uuid, food: &FoodData) -> ServiceResult<UserFoodRecord> {
        let query = format!(
            "INSERT INTO user_foods \
                (id, user_id, name, serving_amount, calories, carbs, protein, protein_general, fat, \
                 is_custom, is_deleted) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, TRUE, FALSE) \
             RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserFoodRecord>(&query)
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(&food.name)
            .bind(food.serving_amount)
            .bind(food.calories)
            .bind(food.carbs)
            .bind(food.protein)
            .bind(food.protein_general)
            .bind(food.fat)
            .fetch_one(&self.db)
            .await?;
        Ok(row)
    }

    async fn update_overlay(
        &self,
        user_id: Uuid,
        id: Uuid,
        food: &FoodData,
    ) -> ServiceResult<Option<UserFoodRecord>> {
        let query = format!(
            "UPDATE user_foods \
             SET name = $3, serving_amount = $4, calories = $5, carbs = $6, protein = $7, \
                 protein_general = $8, fat = $9 \
             WHERE id = $1 AND user_id = $2 AND NOT is_deleted \
             RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserFoodRecord>(&query)
            .bind(id)
            .bind(user_id)
            .bind(&food.name)
            .bind(food.serving_amount)
            .bind(food.calories)
            .bind(food.carbs)
            .bind(food.protein)
            .bind(food.protein_general)
            .bind(food.fat)
            .fetch_optional(&self.db)
            .await?;
        Ok(row)
    }

    async fn delete_overlay(&self, user_id: Uuid, id: Uuid) -> ServiceResult<bool> {
        let result = sqlx::query(
            "DELETE FROM user_foods WHERE id = $1 AND user_id = $2 AND NOT is_deleted",
        )
        .bind(id)
        .bind(user_id)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn shadow_global(
        &self,
        user_id: Uuid,
        global_id: Uuid,
        shadow: Shadow<'_>,
    ) -> ServiceResult<Option<UserFoodRecord>> {
        let (values, is_deleted) = match shadow {
            Shadow::Copy(food) => (
                [
                    food.serving_amount,
                    food.calories,
                    food.carbs,
                    food.protein,
                    food.protein_general,
                    food.fat,
                ],
                false,
            ),
            Shadow::Tombstone => ([0.0; 6], true),
        };

        let query = format!(
            "INSERT INTO user_foods \
                (id, user_id, name, serving_amount, calories, carbs, protein, protein_general, fat, \
                 is_custom, is_deleted) \
             SELECT $1, $2, g.name, $4, $5, $6, $7, $8, $9, FALSE, $10 \
             FROM global_foods g \
             WHERE g.id = $3 \
               AND NOT EXISTS ( \
                   SELECT 1 FROM user_foods u WHERE u.user_id = $2 AND u.name = g.name \
               ) \
             ON CONFLICT (user_id, name) WHERE NOT is_custom DO NOTHING \
             RETURNING {USER_COLUMNS}"
        );
        let [serving_amount, calories, carbs, protein, protein_general, fat] = values;
        let row = sqlx::query_as::<_, UserFoodRecord>(&query)
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(global_id)
            .bind(serving_amount)
            .bind(calories)
            .bind(carbs)
            .bind(protein)
            .bind(protein_general)
            .bind(fat)
            .bind(is_deleted)
            .fetch_optional(&self.db)
            .await?;
        Ok(row)
    }
}
