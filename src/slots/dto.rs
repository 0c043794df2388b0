use serde::{Deserialize, Serialize};

use crate::day::Day;
use crate::slots::repo_types::ItemData;
use crate::slots::schedule::{day_totals, MealItem, NutritionTotals, Slot, SlotId, SlotTime};

#[derive(Debug, Serialize)]
pub struct SlotView {
    pub slot_id: SlotId,
    pub time: SlotTime,
    pub items: Vec<MealItem>,
    pub totals: NutritionTotals,
}

impl From<&Slot> for SlotView {
    fn from(slot: &Slot) -> Self {
        Self {
            slot_id: slot.id,
            time: slot.time(),
            items: slot.items().to_vec(),
            totals: slot.totals(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DayView {
    pub day: Day,
    pub slots: Vec<SlotView>,
    pub totals: NutritionTotals,
}

impl DayView {
    pub fn new(day: Day, slots: &[Slot]) -> Self {
        Self {
            day,
            slots: slots.iter().map(SlotView::from).collect(),
            totals: day_totals(slots),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SetTimeRequest {
    pub time: SlotTime,
}

#[derive(Debug, Serialize)]
pub struct RemovedResponse {
    pub removed: u64,
}

/// Item edit body. Omitted fields keep the stored snapshot values.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ItemPatch {
    pub food_name: Option<String>,
    pub amount: Option<f64>,
    pub calories: Option<f64>,
    pub carbs: Option<f64>,
    pub protein: Option<f64>,
    pub protein_general: Option<f64>,
    pub fat: Option<f64>,
}

impl ItemPatch {
    pub fn apply(self, base: &MealItem) -> ItemData {
        ItemData {
            food_name: self.food_name.unwrap_or_else(|| base.food_name.clone()),
            amount: self.amount.unwrap_or(base.amount),
            calories: self.calories.unwrap_or(base.calories),
            carbs: self.carbs.unwrap_or(base.carbs),
            protein: self.protein.unwrap_or(base.protein),
            protein_general: self.protein_general.unwrap_or(base.protein_general),
            fat: self.fat.unwrap_or(base.fat),
        }
    }
}

impl From<ItemData> for ItemPatch {
    fn from(item: ItemData) -> Self {
        Self {
            food_name: Some(item.food_name),
            amount: Some(item.amount),
            calories: Some(item.calories),
            carbs: Some(item.carbs),
            protein: Some(item.protein),
            protein_general: Some(item.protein_general),
            fat: Some(item.fat),
        }
    }
}
