use std::sync::Arc;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::day::Day;
use crate::error::{ServiceError, ServiceResult};
use crate::targets::repo::TargetStore;
use crate::targets::repo_types::MacroTargets;

/// Per-day protein/fat ratios and calorie adjustment.
#[derive(Clone)]
pub struct DailyMacroPolicy {
    store: Arc<dyn TargetStore>,
}

impl DailyMacroPolicy {
    pub fn new(store: Arc<dyn TargetStore>) -> Self {
        Self { store }
    }

    /// Stored targets, or the defaults when none are saved or the store is
    /// unreachable.
    #[instrument(skip(self))]
    pub async fn get(&self, user_id: Uuid, day: Day) -> ServiceResult<MacroTargets> {
        match self.store.find(user_id, day).await {
            Ok(found) => Ok(found.unwrap_or_default()),
            Err(e) if e.is_unavailable() => {
                warn!(error = %e, %user_id, %day, "target store unavailable; using defaults");
                Ok(MacroTargets::default())
            }
            Err(e) => Err(e),
        }
    }

    pub async fn get_week(&self, user_id: Uuid) -> ServiceResult<Vec<(Day, MacroTargets)>> {
        let mut week = Vec::with_capacity(Day::ALL.len());
        for day in Day::ALL {
            week.push((day, self.get(user_id, day).await?));
        }
        Ok(week)
    }

    #[instrument(skip(self))]
    pub async fn save(
        &self,
        user_id: Uuid,
        day: Day,
        targets: MacroTargets,
    ) -> ServiceResult<MacroTargets> {
        targets.validate().map_err(ServiceError::InvalidArgument)?;
        let saved = self.store.upsert(user_id, day, &targets).await?;
        info!(%user_id, %day, "macro targets saved");
        Ok(saved)
    }
}
