use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Nutrition targets for one user and weekday.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, FromRow)]
pub struct MacroTargets {
    /// Protein target in g per kg of bodyweight.
    pub protein_level: Option<f64>,
    /// Fat target in g per kg of bodyweight.
    pub fat_level: Option<f64>,
    /// kcal added to (or removed from) the computed daily calories.
    #[serde(default)]
    pub calorie_adjustment: i32,
}

impl MacroTargets {
    pub fn validate(&self) -> Result<(), String> {
        for (field, level) in [
            ("protein_level", self.protein_level),
            ("fat_level", self.fat_level),
        ] {
            if let Some(v) = level {
                if !v.is_finite() || v < 0.0 {
                    return Err(format!("{field} must be a non-negative number"));
                }
            }
        }
        Ok(())
    }
}
