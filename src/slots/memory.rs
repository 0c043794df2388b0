use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex,
};

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::day::Day;
use crate::error::{ServiceError, ServiceResult};
use crate::slots::repo::{DayPlan, SlotStore};
use crate::slots::repo_types::{DayChanges, ItemData, SlotRow, SlotWrite, PLACEHOLDER_FOOD_NAME};
use crate::slots::schedule::{DayRow, SlotId, SlotTime};

#[derive(Default)]
struct Tables {
    rows: HashMap<(Uuid, Day), Vec<SlotRow>>,
    clock: i64,
}

impl Tables {
    /// Strictly increasing timestamps so creation order is observable.
    fn tick(&mut self) -> OffsetDateTime {
        self.clock += 1;
        OffsetDateTime::UNIX_EPOCH + Duration::seconds(self.clock)
    }
}

/// In-process slot store. A single mutex serializes every day mutation.
#[derive(Default)]
pub struct MemorySlotStore {
    tables: Mutex<Tables>,
    offline: AtomicBool,
}

impl MemorySlotStore {
    pub fn raw_rows(&self, user_id: Uuid, day: Day) -> Vec<SlotRow> {
        let tables = self.tables.lock().unwrap();
        tables.rows.get(&(user_id, day)).cloned().unwrap_or_default()
    }

    /// Inserts a row as-is, bypassing the scheduler. Used to stage legacy or
    /// defective data.
    pub fn insert_raw(
        &self,
        user_id: Uuid,
        day: Day,
        slot_id: Option<i16>,
        slot_time: &str,
        food_name: &str,
    ) -> Uuid {
        let mut tables = self.tables.lock().unwrap();
        let created_at = tables.tick();
        let row = SlotRow {
            id: Uuid::new_v4(),
            slot_id,
            slot_time: slot_time.into(),
            food_name: food_name.into(),
            amount: 0.0,
            calories: 0.0,
            carbs: 0.0,
            protein: 0.0,
            protein_general: 0.0,
            fat: 0.0,
            created_at,
        };
        let id = row.id;
        tables.rows.entry((user_id, day)).or_default().push(row);
        id
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check(&self) -> ServiceResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ServiceError::from(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

fn new_row(
    created_at: OffsetDateTime,
    slot_id: SlotId,
    time: SlotTime,
    item: &ItemData,
) -> SlotRow {
    SlotRow {
        id: Uuid::new_v4(),
        slot_id: Some(i16::from(slot_id.get())),
        slot_time: time.to_string(),
        food_name: item.food_name.clone(),
        amount: item.amount,
        calories: item.calories,
        carbs: item.carbs,
        protein: item.protein,
        protein_general: item.protein_general,
        fat: item.fat,
        created_at,
    }
}

#[async_trait]
impl SlotStore for MemorySlotStore {
    async fn load_day(&self, user_id: Uuid, day: Day) -> ServiceResult<Vec<DayRow>> {
        self.check()?;
        Ok(self
            .raw_rows(user_id, day)
            .into_iter()
            .map(DayRow::from)
            .collect())
    }

    async fn transact_day(
        &self,
        user_id: Uuid,
        day: Day,
        plan: DayPlan,
    ) -> ServiceResult<DayChanges> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        let current = tables.rows.get(&(user_id, day)).cloned().unwrap_or_default();
        let decoded: Vec<DayRow> = current.iter().cloned().map(DayRow::from).collect();
        let writes = plan(&decoded)?;

        // Work on a copy so a failing write leaves the table untouched.
        let mut rows = current;
        let mut changes = DayChanges::default();
        for write in writes {
            match write {
                SlotWrite::InsertItem {
                    slot_id,
                    time,
                    item,
                } => {
                    let row = new_row(tables.tick(), slot_id, time, &item);
                    changes.written.push(row.clone().into());
                    rows.push(row);
                }
                SlotWrite::InsertPlaceholder { slot_id, time } => {
                    let placeholder = ItemData::named(PLACEHOLDER_FOOD_NAME);
                    rows.push(new_row(tables.tick(), slot_id, time, &placeholder));
                }
                SlotWrite::UpdateItem { id, item } => {
                    let row = rows
                        .iter_mut()
                        .find(|r| r.id == id)
                        .ok_or_else(|| ServiceError::not_found("meal item", id))?;
                    row.food_name = item.food_name;
                    row.amount = item.amount;
                    row.calories = item.calories;
                    row.carbs = item.carbs;
                    row.protein = item.protein;
                    row.protein_general = item.protein_general;
                    row.fat = item.fat;
                    changes.written.push(row.clone().into());
                }
                SlotWrite::SetTime { slot_id, time } => {
                    let slot = Some(i16::from(slot_id.get()));
                    for row in rows
                        .iter_mut()
                        .filter(|r| r.slot_id == slot && r.food_name != PLACEHOLDER_FOOD_NAME)
                    {
                        row.slot_time = time.to_string();
                    }
                }
                SlotWrite::DeleteRow { id } => {
                    let before = rows.len();
                    rows.retain(|r| r.id != id);
                    changes.deleted += (before - rows.len()) as u64;
                }
                SlotWrite::AssignSlot { id, slot_id } => {
                    if let Some(row) = rows.iter_mut().find(|r| r.id == id && r.slot_id.is_none()) {
                        row.slot_id = Some(i16::from(slot_id.get()));
                    }
                }
            }
        }
        tables.rows.insert((user_id, day), rows);
        Ok(changes)
    }
}
