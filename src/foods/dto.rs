use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ServiceError;
use crate::foods::repo_types::{FoodData, GlobalFoodRecord, UserFoodRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FoodSource {
    Global,
    User,
}

impl FromStr for FoodSource {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "global" => Ok(FoodSource::Global),
            "user" => Ok(FoodSource::User),
            other => Err(ServiceError::invalid(format!("unknown food source '{other}'"))),
        }
    }
}

/// Stable address of a row in a user's effective catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FoodRef {
    pub source: FoodSource,
    pub id: Uuid,
}

#[cfg(test)]
impl FoodRef {
    pub fn global(id: Uuid) -> Self {
        Self {
            source: FoodSource::Global,
            id,
        }
    }
}

/// One row of a user's effective catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoodView {
    pub source: FoodSource,
    pub id: Uuid,
    pub name: String,
    pub serving_amount: f64,
    pub calories: f64,
    pub carbs: f64,
    pub protein: f64,
    pub protein_general: f64,
    pub fat: f64,
    pub is_custom: bool,
    /// True when the row belongs to the user.
    pub editable: bool,
}

impl FoodView {
    pub fn food_ref(&self) -> FoodRef {
        FoodRef {
            source: self.source,
            id: self.id,
        }
    }
}

impl From<GlobalFoodRecord> for FoodView {
    fn from(r: GlobalFoodRecord) -> Self {
        Self {
            source: FoodSource::Global,
            id: r.id,
            name: r.name,
            serving_amount: r.serving_amount,
            calories: r.calories,
            carbs: r.carbs,
            protein: r.protein,
            protein_general: r.protein_general,
            fat: r.fat,
            is_custom: false,
            editable: false,
        }
    }
}

impl From<UserFoodRecord> for FoodView {
    fn from(r: UserFoodRecord) -> Self {
        Self {
            source: FoodSource::User,
            id: r.id,
            name: r.name,
            serving_amount: r.serving_amount,
            calories: r.calories,
            carbs: r.carbs,
            protein: r.protein,
            protein_general: r.protein_general,
            fat: r.fat,
            is_custom: r.is_custom,
            editable: true,
        }
    }
}

/// Edit body. Omitted fields keep the values of the edited row; for a global
/// item that is the global's own values.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FoodPatch {
    pub name: Option<String>,
    pub serving_amount: Option<f64>,
    pub calories: Option<f64>,
    pub carbs: Option<f64>,
    pub protein: Option<f64>,
    pub protein_general: Option<f64>,
    pub fat: Option<f64>,
}

impl FoodPatch {
    pub fn apply(self, base: FoodData) -> FoodData {
        FoodData {
            name: self.name.unwrap_or(base.name),
            serving_amount: self.serving_amount.unwrap_or(base.serving_amount),
            calories: self.calories.unwrap_or(base.calories),
            carbs: self.carbs.unwrap_or(base.carbs),
            protein: self.protein.unwrap_or(base.protein),
            protein_general: self.protein_general.unwrap_or(base.protein_general),
            fat: self.fat.unwrap_or(base.fat),
        }
    }
}

/// A full replacement.
impl From<FoodData> for FoodPatch {
    fn from(food: FoodData) -> Self {
        Self {
            name: Some(food.name),
            serving_amount: Some(food.serving_amount),
            calories: Some(food.calories),
            carbs: Some(food.carbs),
            protein: Some(food.protein),
            protein_general: Some(food.protein_general),
            fat: Some(food.fat),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}
