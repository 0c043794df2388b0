//! Slot identity, slot times and the pure rules that turn a day's stored rows
//! into six ordered slots.
//!
//! Nothing here performs I/O; the scheduler feeds rows loaded (or locked) by a
//! [`SlotStore`](crate::slots::repo::SlotStore) through these functions.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::{macros::format_description, OffsetDateTime, Time};
use uuid::Uuid;

use crate::error::ServiceError;

/// Number of slots in every day.
pub const SLOTS_PER_DAY: usize = 6;

/// Positional default times, slot 1 first.
pub const DEFAULT_SLOT_TIMES: [SlotTime; SLOTS_PER_DAY] = [
    SlotTime::from_hm(8, 0),
    SlotTime::from_hm(11, 0),
    SlotTime::from_hm(14, 0),
    SlotTime::from_hm(17, 0),
    SlotTime::from_hm(20, 0),
    SlotTime::from_hm(23, 0),
];

/// Stable identity of a slot within a day, `1..=6`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct SlotId(u8);

impl SlotId {
    pub const FIRST: SlotId = SlotId(1);

    pub fn all() -> impl Iterator<Item = SlotId> {
        (1..=SLOTS_PER_DAY as u8).map(SlotId)
    }

    /// Slot at zero-based position `index`; callers guarantee `index < 6`.
    fn at(index: usize) -> SlotId {
        SlotId(index as u8 + 1)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn index(self) -> usize {
        usize::from(self.0 - 1)
    }

    pub fn default_time(self) -> SlotTime {
        DEFAULT_SLOT_TIMES[self.index()]
    }
}

impl TryFrom<i64> for SlotId {
    type Error = ServiceError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if (1..=SLOTS_PER_DAY as i64).contains(&value) {
            Ok(SlotId(value as u8))
        } else {
            Err(ServiceError::invalid(format!(
                "slot id must be between 1 and {SLOTS_PER_DAY}, got {value}"
            )))
        }
    }
}

impl From<SlotId> for i64 {
    fn from(id: SlotId) -> Self {
        i64::from(id.0)
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wall-clock time of a slot, minute precision. Serialized as `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SlotTime(u16);

impl SlotTime {
    pub const fn from_hm(hour: u16, minute: u16) -> Self {
        SlotTime(hour * 60 + minute)
    }

    pub fn minutes_since_midnight(self) -> u16 {
        self.0
    }
}

impl FromStr for SlotTime {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parsed = Time::parse(s, format_description!("[hour]:[minute]"))
            .or_else(|_| Time::parse(s, format_description!("[hour padding:none]:[minute]")))
            .map_err(|_| ServiceError::invalid(format!("'{s}' is not a valid HH:MM time")))?;
        Ok(SlotTime::from_hm(
            u16::from(parsed.hour()),
            u16::from(parsed.minute()),
        ))
    }
}

impl TryFrom<String> for SlotTime {
    type Error = ServiceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SlotTime> for String {
    fn from(t: SlotTime) -> Self {
        t.to_string()
    }
}

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

/// Picks the slot whose default time is nearest to `raw`. Ties go to the
/// lower slot id.
pub fn infer_slot_id(raw: SlotTime, defaults: &[SlotTime; SLOTS_PER_DAY]) -> SlotId {
    let raw = i32::from(raw.minutes_since_midnight());
    let (index, _) = defaults
        .iter()
        .enumerate()
        .min_by_key(|(_, t)| (i32::from(t.minutes_since_midnight()) - raw).abs())
        .unwrap_or((0, &DEFAULT_SLOT_TIMES[0]));
    SlotId::at(index)
}

/// Nutrition snapshot summed over items.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct NutritionTotals {
    pub calories: f64,
    pub carbs: f64,
    pub protein: f64,
    pub protein_general: f64,
    pub fat: f64,
}

impl NutritionTotals {
    fn add(mut self, item: &MealItem) -> Self {
        self.calories += item.calories;
        self.carbs += item.carbs;
        self.protein += item.protein;
        self.protein_general += item.protein_general;
        self.fat += item.fat;
        self
    }

    fn merge(mut self, other: NutritionTotals) -> Self {
        self.calories += other.calories;
        self.carbs += other.carbs;
        self.protein += other.protein;
        self.protein_general += other.protein_general;
        self.fat += other.fat;
        self
    }
}

/// A logged food with the nutrition values captured when it was added.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MealItem {
    pub id: Uuid,
    pub food_name: String,
    pub amount: f64,
    pub calories: f64,
    pub carbs: f64,
    pub protein: f64,
    pub protein_general: f64,
    pub fat: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowKind {
    /// Remembers a slot's time while the slot holds no items.
    Placeholder,
    Item(MealItem),
}

/// A stored row of a user's day, decoded from its storage form.
#[derive(Debug, Clone, PartialEq)]
pub struct DayRow {
    pub id: Uuid,
    /// `None` on legacy rows written before slots had ids.
    pub slot_id: Option<SlotId>,
    /// `None` when the stored time could not be parsed.
    pub time: Option<SlotTime>,
    pub created_at: OffsetDateTime,
    pub kind: RowKind,
}

impl DayRow {
    pub fn is_placeholder(&self) -> bool {
        matches!(self.kind, RowKind::Placeholder)
    }

    pub fn in_slot(&self, slot: SlotId) -> bool {
        self.slot_id == Some(slot)
    }

    pub fn item(&self) -> Option<&MealItem> {
        match &self.kind {
            RowKind::Item(item) => Some(item),
            RowKind::Placeholder => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SlotContent {
    Empty { time: SlotTime },
    Populated { time: SlotTime, items: Vec<MealItem> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    pub id: SlotId,
    pub content: SlotContent,
}

impl Slot {
    pub fn empty(id: SlotId) -> Self {
        Slot {
            id,
            content: SlotContent::Empty {
                time: id.default_time(),
            },
        }
    }

    pub fn time(&self) -> SlotTime {
        match &self.content {
            SlotContent::Empty { time } | SlotContent::Populated { time, .. } => *time,
        }
    }

    pub fn items(&self) -> &[MealItem] {
        match &self.content {
            SlotContent::Empty { .. } => &[],
            SlotContent::Populated { items, .. } => items,
        }
    }

    pub fn totals(&self) -> NutritionTotals {
        self.items()
            .iter()
            .fold(NutritionTotals::default(), NutritionTotals::add)
    }
}

pub fn day_totals(slots: &[Slot]) -> NutritionTotals {
    slots
        .iter()
        .map(Slot::totals)
        .fold(NutritionTotals::default(), NutritionTotals::merge)
}

pub fn default_day() -> [Slot; SLOTS_PER_DAY] {
    std::array::from_fn(|i| Slot::empty(SlotId::at(i)))
}

/// Placeholders of `slot`, oldest first.
pub fn placeholders(rows: &[DayRow], slot: SlotId) -> Vec<&DayRow> {
    let mut found: Vec<&DayRow> = rows
        .iter()
        .filter(|r| r.in_slot(slot) && r.is_placeholder())
        .collect();
    found.sort_by_key(|r| r.created_at);
    found
}

pub fn items_in(rows: &[DayRow], slot: SlotId) -> Vec<&MealItem> {
    rows.iter()
        .filter(|r| r.in_slot(slot))
        .filter_map(DayRow::item)
        .collect()
}

/// The slot's time: taken from its items, else its newest placeholder, else
/// the positional default.
pub fn current_time(rows: &[DayRow], slot: SlotId) -> SlotTime {
    let from_items = rows
        .iter()
        .filter(|r| r.in_slot(slot) && !r.is_placeholder())
        .find_map(|r| r.time);
    from_items
        .or_else(|| placeholders(rows, slot).last().and_then(|p| p.time))
        .unwrap_or_else(|| slot.default_time())
}

/// Slot ids for rows that lack one, inferred from their stored time.
/// Rows whose time cannot be read go to the first slot.
pub fn infer_missing_slots(rows: &[DayRow]) -> Vec<(Uuid, SlotId)> {
    rows.iter()
        .filter(|r| r.slot_id.is_none())
        .map(|r| {
            let slot = r
                .time
                .map(|t| infer_slot_id(t, &DEFAULT_SLOT_TIMES))
                .unwrap_or(SlotId::FIRST);
            (r.id, slot)
        })
        .collect()
}

/// Fills in missing slot ids using [`infer_missing_slots`].
pub fn with_inferred_slots(rows: &[DayRow]) -> (Vec<DayRow>, Vec<(Uuid, SlotId)>) {
    let repairs = infer_missing_slots(rows);
    let mut repaired = rows.to_vec();
    for (id, slot) in &repairs {
        if let Some(row) = repaired.iter_mut().find(|r| r.id == *id) {
            row.slot_id = Some(*slot);
        }
    }
    (repaired, repairs)
}

/// Groups a day's rows into its six slots, ordered by slot id.
pub fn resolve_day(rows: &[DayRow]) -> [Slot; SLOTS_PER_DAY] {
    std::array::from_fn(|i| {
        let id = SlotId::at(i);
        let time = current_time(rows, id);
        let mut items: Vec<(OffsetDateTime, MealItem)> = rows
            .iter()
            .filter(|r| r.in_slot(id))
            .filter_map(|r| r.item().map(|item| (r.created_at, item.clone())))
            .collect();
        items.sort_by_key(|(created_at, _)| *created_at);
        let items: Vec<MealItem> = items.into_iter().map(|(_, item)| item).collect();
        let content = if items.is_empty() {
            SlotContent::Empty { time }
        } else {
            SlotContent::Populated { time, items }
        };
        Slot { id, content }
    })
}
