use async_trait::async_trait;
use sqlx::{PgExecutor, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::day::Day;
use crate::error::{ServiceError, ServiceResult};
use crate::slots::repo_types::{DayChanges, ItemData, SlotRow, SlotWrite, PLACEHOLDER_FOOD_NAME};
use crate::slots::schedule::{DayRow, SlotId, SlotTime};

const COLUMNS: &str = "id, slot_id, slot_time, food_name, amount, calories, carbs, protein, \
     protein_general, fat, created_at";

/// Decides the writes for a day given its current rows. Returning an error
/// aborts the mutation without writing anything.
pub type DayPlan = Box<dyn FnOnce(&[DayRow]) -> ServiceResult<Vec<SlotWrite>> + Send>;

/// Persistence for per-user, per-day slot rows.
#[async_trait]
pub trait SlotStore: Send + Sync {
    /// All rows of the day, oldest first.
    async fn load_day(&self, user_id: Uuid, day: Day) -> ServiceResult<Vec<DayRow>>;

    /// Runs `plan` against the day's rows and applies its writes atomically.
    /// Mutations of the same `(user_id, day)` are serialized.
    async fn transact_day(&self, user_id: Uuid, day: Day, plan: DayPlan)
        -> ServiceResult<DayChanges>;
}

#[derive(Clone)]
pub struct PgSlotStore {
    db: PgPool,
}

impl PgSlotStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

async fn fetch_day<'e, E>(exec: E, user_id: Uuid, day: Day) -> Result<Vec<DayRow>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let query = format!(
        "SELECT {COLUMNS} FROM meal_slot_entries \
         WHERE user_id = $1 AND day = $2 \
         ORDER BY created_at, id"
    );
    let rows = sqlx::query_as::<_, SlotRow>(&query)
        .bind(user_id)
        .bind(day.as_str())
        .fetch_all(exec)
        .await?;
    Ok(rows.into_iter().map(DayRow::from).collect())
}

fn slot_param(slot_id: SlotId) -> i16 {
    i16::from(slot_id.get())
}

async fn insert_row(
    tx: &mut Transaction<'static, Postgres>,
    user_id: Uuid,
    day: Day,
    slot_id: SlotId,
    time: SlotTime,
    item: &ItemData,
) -> Result<SlotRow, sqlx::Error> {
    let query = format!(
        "INSERT INTO meal_slot_entries \
            (id, user_id, day, slot_time, slot_id, food_name, amount, calories, carbs, protein, \
             protein_general, fat) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
         RETURNING {COLUMNS}"
    );
    sqlx::query_as::<_, SlotRow>(&query)
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(day.as_str())
        .bind(time.to_string())
        .bind(slot_param(slot_id))
        .bind(&item.food_name)
        .bind(item.amount)
        .bind(item.calories)
        .bind(item.carbs)
        .bind(item.protein)
        .bind(item.protein_general)
        .bind(item.fat)
        .fetch_one(&mut **tx)
        .await
}

#[async_trait]
impl SlotStore for PgSlotStore {
    async fn load_day(&self, user_id: Uuid, day: Day) -> ServiceResult<Vec<DayRow>> {
        Ok(fetch_day(&self.db, user_id, day).await?)
    }

    async fn transact_day(
        &self,
        user_id: Uuid,
        day: Day,
        plan: DayPlan,
    ) -> ServiceResult<DayChanges> {
        let mut tx = self.db.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(format!("meal_slots:{user_id}:{day}"))
            .execute(&mut *tx)
            .await?;

        let rows = fetch_day(&mut *tx, user_id, day).await?;
        // An Err here drops `tx`, which rolls back.
        let writes = plan(&rows)?;

        let mut changes = DayChanges::default();
        for write in writes {
            match write {
                SlotWrite::InsertItem {
                    slot_id,
                    time,
                    item,
                } => {
                    let row = insert_row(&mut tx, user_id, day, slot_id, time, &item).await?;
                    changes.written.push(row.into());
                }
                SlotWrite::InsertPlaceholder { slot_id, time } => {
                    insert_row(
                        &mut tx,
                        user_id,
                        day,
                        slot_id,
                        time,
                        &ItemData::named(PLACEHOLDER_FOOD_NAME),
                    )
                    .await?;
                }
                SlotWrite::UpdateItem { id, item } => {
                    let query = format!(
                        "UPDATE meal_slot_entries \
                         SET food_name = $4, amount = $5, calories = $6, carbs = $7, \
                             protein = $8, protein_general = $9, fat = $10 \
                         WHERE id = $1 AND user_id = $2 AND day = $3 \
                         RETURNING {COLUMNS}"
                    );
                    let row = sqlx::query_as::<_, SlotRow>(&query)
                        .bind(id)
                        .bind(user_id)
                        .bind(day.as_str())
                        .bind(&item.food_name)
                        .bind(item.amount)
                        .bind(item.calories)
                        .bind(item.carbs)
                        .bind(item.protein)
                        .bind(item.protein_general)
                        .bind(item.fat)
                        .fetch_optional(&mut *tx)
                        .await?
                        .ok_or_else(|| ServiceError::not_found("meal item", id))?;
                    changes.written.push(row.into());
                }
                SlotWrite::SetTime { slot_id, time } => {
                    sqlx::query(
                        "UPDATE meal_slot_entries SET slot_time = $4 \
                         WHERE user_id = $1 AND day = $2 AND slot_id = $3 AND food_name <> $5",
                    )
                    .bind(user_id)
                    .bind(day.as_str())
                    .bind(slot_param(slot_id))
                    .bind(time.to_string())
                    .bind(PLACEHOLDER_FOOD_NAME)
                    .execute(&mut *tx)
                    .await?;
                }
                SlotWrite::DeleteRow { id } => {
                    let result = sqlx::query(
                        "DELETE FROM meal_slot_entries WHERE id = $1 AND user_id = $2 AND day = $3",
                    )
                    .bind(id)
                    .bind(user_id)
                    .bind(day.as_str())
                    .execute(&mut *tx)
                    .await?;
                    changes.deleted += result.rows_affected();
                }
                SlotWrite::AssignSlot { id, slot_id } => {
                    sqlx::query(
                        "UPDATE meal_slot_entries SET slot_id = $3 \
                         WHERE id = $1 AND user_id = $2 AND slot_id IS NULL",
                    )
                    .bind(id)
                    .bind(user_id)
                    .bind(slot_param(slot_id))
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }

        tx.commit().await?;
        Ok(changes)
    }
}
