use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::slots::schedule::{DayRow, MealItem, RowKind, SlotId, SlotTime};

/// `food_name` of rows that only remember a slot's time.
pub const PLACEHOLDER_FOOD_NAME: &str = "__slot_placeholder__";

/// Stored form of a slot row. Placeholders are rows carrying the sentinel name
/// and zeroed nutrition.
#[derive(Debug, Clone, FromRow)]
pub struct SlotRow {
    pub id: Uuid,
    pub slot_id: Option<i16>,
    pub slot_time: String,
    pub food_name: String,
    pub amount: f64,
    pub calories: f64,
    pub carbs: f64,
    pub protein: f64,
    pub protein_general: f64,
    pub fat: f64,
    pub created_at: OffsetDateTime,
}

impl From<SlotRow> for DayRow {
    fn from(r: SlotRow) -> Self {
        let slot_id = r
            .slot_id
            .and_then(|n| SlotId::try_from(i64::from(n)).ok());
        let time = r.slot_time.parse::<SlotTime>().ok();
        let kind = if r.food_name == PLACEHOLDER_FOOD_NAME {
            RowKind::Placeholder
        } else {
            RowKind::Item(MealItem {
                id: r.id,
                food_name: r.food_name,
                amount: r.amount,
                calories: r.calories,
                carbs: r.carbs,
                protein: r.protein,
                protein_general: r.protein_general,
                fat: r.fat,
                created_at: r.created_at,
            })
        };
        DayRow {
            id: r.id,
            slot_id,
            time,
            created_at: r.created_at,
            kind,
        }
    }
}

/// Food and nutrition snapshot supplied when logging an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemData {
    pub food_name: String,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub calories: f64,
    #[serde(default)]
    pub carbs: f64,
    #[serde(default)]
    pub protein: f64,
    #[serde(default)]
    pub protein_general: f64,
    #[serde(default)]
    pub fat: f64,
}

impl ItemData {
    pub fn named(food_name: impl Into<String>) -> Self {
        Self {
            food_name: food_name.into(),
            amount: 0.0,
            calories: 0.0,
            carbs: 0.0,
            protein: 0.0,
            protein_general: 0.0,
            fat: 0.0,
        }
    }

    pub fn normalized(mut self) -> Result<Self, String> {
        self.food_name = self.food_name.trim().to_string();
        if self.food_name.is_empty() {
            return Err("food name must not be empty".into());
        }
        if self.food_name == PLACEHOLDER_FOOD_NAME {
            return Err("food name is reserved".into());
        }
        for (field, value) in [
            ("amount", self.amount),
            ("calories", self.calories),
            ("carbs", self.carbs),
            ("protein", self.protein),
            ("protein_general", self.protein_general),
            ("fat", self.fat),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("{field} must be a non-negative number"));
            }
        }
        Ok(self)
    }
}

/// One step of a day mutation, applied by
/// [`SlotStore::transact_day`](crate::slots::repo::SlotStore::transact_day).
#[derive(Debug, Clone, PartialEq)]
pub enum SlotWrite {
    InsertItem {
        slot_id: SlotId,
        time: SlotTime,
        item: ItemData,
    },
    UpdateItem {
        id: Uuid,
        item: ItemData,
    },
    /// Sets the time of every item row of the slot.
    SetTime {
        slot_id: SlotId,
        time: SlotTime,
    },
    InsertPlaceholder {
        slot_id: SlotId,
        time: SlotTime,
    },
    DeleteRow {
        id: Uuid,
    },
    AssignSlot {
        id: Uuid,
        slot_id: SlotId,
    },
}

/// Outcome of a committed day mutation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DayChanges {
    /// Rows produced by `InsertItem` / `UpdateItem`, in plan order.
    pub written: Vec<DayRow>,
    pub deleted: u64,
}
