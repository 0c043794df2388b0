use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Shared catalog entry. Read-only for users.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GlobalFoodRecord {
    pub id: Uuid,
    pub name: String,
    pub serving_amount: f64,
    pub calories: f64,
    pub carbs: f64,
    pub protein: f64,
    pub protein_general: f64,
    pub fat: f64,
    pub created_at: OffsetDateTime,
}

/// Per-user row: a custom item, a copy of a global item, or a tombstone
/// hiding one.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserFoodRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub serving_amount: f64,
    pub calories: f64,
    pub carbs: f64,
    pub protein: f64,
    pub protein_general: f64,
    pub fat: f64,
    pub is_custom: bool,
    pub is_deleted: bool,
    pub created_at: OffsetDateTime,
}

/// Food definition as supplied by callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodData {
    pub name: String,
    #[serde(default)]
    pub serving_amount: f64,
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

impl FoodData {
    #[cfg(test)]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            serving_amount: 0.0,
            calories: 0.0,
            carbs: 0.0,
            protein: 0.0,
            protein_general: 0.0,
            fat: 0.0,
        }
    }

    fn nutrition(&self) -> [(&'static str, f64); 6] {
        [
            ("serving_amount", self.serving_amount),
            ("calories", self.calories),
            ("carbs", self.carbs),
            ("protein", self.protein),
            ("protein_general", self.protein_general),
            ("fat", self.fat),
        ]
    }

    /// Trims the name and rejects empty names or negative / non-finite values.
    pub fn normalized(mut self) -> Result<Self, String> {
        self.name = self.name.trim().to_string();
        if self.name.is_empty() {
            return Err("food name must not be empty".into());
        }
        for (field, value) in self.nutrition() {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("{field} must be a non-negative number"));
            }
        }
        Ok(self)
    }
}

impl From<&GlobalFoodRecord> for FoodData {
    fn from(r: &GlobalFoodRecord) -> Self {
        Self {
            name: r.name.clone(),
            serving_amount: r.serving_amount,
            calories: r.calories,
            carbs: r.carbs,
            protein: r.protein,
            protein_general: r.protein_general,
            fat: r.fat,
        }
    }
}

impl From<&UserFoodRecord> for FoodData {
    fn from(r: &UserFoodRecord) -> Self {
        Self {
            name: r.name.clone(),
            serving_amount: r.serving_amount,
            calories: r.calories,
            carbs: r.carbs,
            protein: r.protein,
            protein_general: r.protein_general,
            fat: r.fat,
        }
    }
}

/// How a user row shadows a global item.
#[derive(Debug, Clone, Copy)]
pub enum Shadow<'a> {
    /// Copy-on-write with the edited values.
    Copy(&'a FoodData),
    /// Hide the global item for this user.
    Tombstone,
}
