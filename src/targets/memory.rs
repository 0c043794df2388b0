use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex,
};

use async_trait::async_trait;
use uuid::Uuid;

use crate::day::Day;
use crate::error::{ServiceError, ServiceResult};
use crate::targets::repo::TargetStore;
use crate::targets::repo_types::MacroTargets;

#[derive(Default)]
pub struct MemoryTargetStore {
    rows: Mutex<HashMap<(Uuid, Day), MacroTargets>>,
    offline: AtomicBool,
}

impl MemoryTargetStore {
    pub fn row_count(&self, user_id: Uuid) -> usize {
        let rows = self.rows.lock().unwrap();
        rows.keys().filter(|(u, _)| *u == user_id).count()
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

#[async_trait]
impl TargetStore for MemoryTargetStore {
    async fn find(&self, user_id: Uuid, day: Day) -> ServiceResult<Option<MacroTargets>> {
        self.check()?;
        Ok(self.rows.lock().unwrap().get(&(user_id, day)).copied())
    }

    async fn upsert(
        &self,
        user_id: Uuid,
        day: Day,
        targets: &MacroTargets,
    ) -> ServiceResult<MacroTargets> {
        self.check()?;
        self.rows.lock().unwrap().insert((user_id, day), *targets);
        Ok(*targets)
    }
}
