use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::day::Day;
use crate::error::{ServiceError, ServiceResult};
use crate::slots::dto::ItemPatch;
use crate::slots::repo::{DayPlan, SlotStore};
use crate::slots::repo_types::{DayChanges, ItemData, SlotWrite};
use crate::slots::schedule::{
    current_time, default_day, items_in, placeholders, resolve_day, with_inferred_slots, DayRow,
    MealItem, Slot, SlotId, SlotTime, SLOTS_PER_DAY,
};

/// Wraps a planner so legacy rows of the day are repaired in the same
/// transaction, and the planner sees them with their inferred slot ids.
fn repairing<F>(plan: F) -> DayPlan
where
    F: FnOnce(&[DayRow]) -> ServiceResult<Vec<SlotWrite>> + Send + 'static,
{
    Box::new(move |rows: &[DayRow]| {
        let (rows, repairs) = with_inferred_slots(rows);
        let mut writes: Vec<SlotWrite> = repairs
            .into_iter()
            .map(|(id, slot_id)| SlotWrite::AssignSlot { id, slot_id })
            .collect();
        writes.extend(plan(&rows)?);
        Ok(writes)
    })
}

fn delete_placeholders(rows: &[DayRow], slot: SlotId) -> impl Iterator<Item = SlotWrite> + '_ {
    placeholders(rows, slot)
        .into_iter()
        .map(|p| SlotWrite::DeleteRow { id: p.id })
}

fn find_item(rows: &[DayRow], slot: SlotId, item_id: Uuid) -> ServiceResult<&MealItem> {
    rows.iter()
        .filter(|r| r.in_slot(slot))
        .find_map(|r| r.item().filter(|item| item.id == item_id))
        .ok_or_else(|| ServiceError::not_found("meal item", item_id))
}

fn single_written(changes: DayChanges) -> ServiceResult<MealItem> {
    changes
        .written
        .into_iter()
        .find_map(|row| row.item().cloned())
        .ok_or(ServiceError::Store(sqlx::Error::RowNotFound))
}

/// Six time-labelled meal slots per user and weekday.
#[derive(Clone)]
pub struct MealSlotScheduler {
    store: Arc<dyn SlotStore>,
}

impl MealSlotScheduler {
    pub fn new(store: Arc<dyn SlotStore>) -> Self {
        Self { store }
    }

    /// The day's six slots ordered by slot id. Legacy rows without a slot id
    /// are assigned one by nearest default time and the assignment is saved.
    /// Returns default empty slots when the store is unreachable.
    #[instrument(skip(self))]
    pub async fn get_day(&self, user_id: Uuid, day: Day) -> ServiceResult<[Slot; SLOTS_PER_DAY]> {
        let rows = match self.store.load_day(user_id, day).await {
            Ok(rows) => rows,
            Err(e) if e.is_unavailable() => {
                warn!(error = %e, %user_id, %day, "slot store unavailable; returning default day");
                return Ok(default_day());
            }
            Err(e) => return Err(e),
        };

        if rows.iter().all(|r| r.slot_id.is_some()) {
            return Ok(resolve_day(&rows));
        }

        let (repaired, repairs) = with_inferred_slots(&rows);
        info!(%user_id, %day, rows = repairs.len(), "assigning slot ids to legacy rows");
        if let Err(e) = self
            .store
            .transact_day(user_id, day, repairing(|_| Ok(Vec::new())))
            .await
        {
            warn!(error = %e, %user_id, %day, "failed to persist slot id repair");
        }
        Ok(resolve_day(&repaired))
    }

    /// All seven days, Monday first.
    pub async fn get_week(&self, user_id: Uuid) -> ServiceResult<Vec<(Day, [Slot; SLOTS_PER_DAY])>> {
        let mut week = Vec::with_capacity(Day::ALL.len());
        for day in Day::ALL {
            week.push((day, self.get_day(user_id, day).await?));
        }
        Ok(week)
    }

    /// Logs an item in the slot at the slot's current time, replacing any
    /// placeholder. The nutrition values are stored as given.
    #[instrument(skip(self, item))]
    pub async fn add_item(
        &self,
        user_id: Uuid,
        day: Day,
        slot: SlotId,
        item: ItemData,
    ) -> ServiceResult<MealItem> {
        let item = item.normalized().map_err(ServiceError::InvalidArgument)?;
        let changes = self
            .store
            .transact_day(
                user_id,
                day,
                repairing(move |rows| {
                    let time = current_time(rows, slot);
                    let mut writes: Vec<SlotWrite> = delete_placeholders(rows, slot).collect();
                    writes.push(SlotWrite::InsertItem {
                        slot_id: slot,
                        time,
                        item,
                    });
                    Ok(writes)
                }),
            )
            .await?;
        let added = single_written(changes)?;
        info!(%user_id, %day, %slot, item_id = %added.id, "meal item added");
        Ok(added)
    }

    /// Rewrites an item's snapshot. Fields missing from `patch` keep their
    /// stored values.
    #[instrument(skip(self, patch))]
    pub async fn update_item(
        &self,
        user_id: Uuid,
        day: Day,
        slot: SlotId,
        item_id: Uuid,
        patch: impl Into<ItemPatch>,
    ) -> ServiceResult<MealItem> {
        let patch = patch.into();
        let changes = self
            .store
            .transact_day(
                user_id,
                day,
                repairing(move |rows| {
                    let current = find_item(rows, slot, item_id)?;
                    let item = patch
                        .apply(current)
                        .normalized()
                        .map_err(ServiceError::InvalidArgument)?;
                    Ok(vec![SlotWrite::UpdateItem { id: item_id, item }])
                }),
            )
            .await?;
        single_written(changes)
    }

    /// Removes one item. When it was the slot's last item and the slot time
    /// is not the positional default, a placeholder keeps the time.
    #[instrument(skip(self))]
    pub async fn delete_item(
        &self,
        user_id: Uuid,
        day: Day,
        slot: SlotId,
        item_id: Uuid,
    ) -> ServiceResult<()> {
        self.store
            .transact_day(
                user_id,
                day,
                repairing(move |rows| {
                    find_item(rows, slot, item_id)?;
                    let mut writes = vec![SlotWrite::DeleteRow { id: item_id }];
                    if items_in(rows, slot).len() == 1 {
                        let time = current_time(rows, slot);
                        writes.extend(delete_placeholders(rows, slot));
                        if time != slot.default_time() {
                            writes.push(SlotWrite::InsertPlaceholder {
                                slot_id: slot,
                                time,
                            });
                        }
                    }
                    Ok(writes)
                }),
            )
            .await?;
        info!(%user_id, %day, %slot, %item_id, "meal item deleted");
        Ok(())
    }

    /// Removes every item of the slot. Placeholders are left as they are.
    #[instrument(skip(self))]
    pub async fn delete_all_items(
        &self,
        user_id: Uuid,
        day: Day,
        slot: SlotId,
    ) -> ServiceResult<u64> {
        let changes = self
            .store
            .transact_day(
                user_id,
                day,
                repairing(move |rows| {
                    Ok(items_in(rows, slot)
                        .into_iter()
                        .map(|item| SlotWrite::DeleteRow { id: item.id })
                        .collect())
                }),
            )
            .await?;
        info!(%user_id, %day, %slot, removed = changes.deleted, "slot cleared");
        Ok(changes.deleted)
    }

    /// Changes the slot's time. Idempotent: repeating the call writes nothing.
    #[instrument(skip(self))]
    pub async fn set_time(
        &self,
        user_id: Uuid,
        day: Day,
        slot: SlotId,
        time: SlotTime,
    ) -> ServiceResult<()> {
        self.store
            .transact_day(
                user_id,
                day,
                repairing(move |rows| {
                    let items = items_in(rows, slot);
                    let existing = placeholders(rows, slot);
                    let mut writes = Vec::new();

                    if !items.is_empty() {
                        let stale = rows
                            .iter()
                            .filter(|r| r.in_slot(slot) && !r.is_placeholder())
                            .any(|r| r.time != Some(time));
                        if stale {
                            writes.push(SlotWrite::SetTime {
                                slot_id: slot,
                                time,
                            });
                        }
                        writes.extend(existing.iter().map(|p| SlotWrite::DeleteRow { id: p.id }));
                        return Ok(writes);
                    }

                    let wants_placeholder = time != slot.default_time();
                    let already_stored = wants_placeholder
                        && existing.len() == 1
                        && existing[0].time == Some(time);
                    if already_stored {
                        return Ok(writes);
                    }
                    writes.extend(existing.iter().map(|p| SlotWrite::DeleteRow { id: p.id }));
                    if wants_placeholder {
                        writes.push(SlotWrite::InsertPlaceholder {
                            slot_id: slot,
                            time,
                        });
                    }
                    Ok(writes)
                }),
            )
            .await?;
        info!(%user_id, %day, %slot, %time, "slot time set");
        Ok(())
    }

    /// Deletes all but the newest placeholder of each slot. Returns the
    /// number of rows removed.
    #[instrument(skip(self))]
    pub async fn cleanup_duplicate_placeholders(&self, user_id: Uuid, day: Day) -> ServiceResult<u64> {
        let changes = self
            .store
            .transact_day(
                user_id,
                day,
                repairing(|rows| {
                    let mut writes = Vec::new();
                    for slot in SlotId::all() {
                        let found = placeholders(rows, slot);
                        if let Some((_newest, older)) = found.split_last() {
                            writes.extend(older.iter().map(|p| SlotWrite::DeleteRow { id: p.id }));
                        }
                    }
                    Ok(writes)
                }),
            )
            .await?;
        if changes.deleted > 0 {
            info!(%user_id, %day, removed = changes.deleted, "duplicate placeholders removed");
        } else {
            debug!(%user_id, %day, "no duplicate placeholders");
        }
        Ok(changes.deleted)
    }
}
