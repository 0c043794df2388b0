use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex,
};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use crate::foods::repo::CatalogStore;
use crate::foods::repo_types::{FoodData, GlobalFoodRecord, Shadow, UserFoodRecord};

#[derive(Default)]
struct Tables {
    globals: Vec<GlobalFoodRecord>,
    overlays: Vec<UserFoodRecord>,
}

/// In-process catalog store with the same semantics as the Postgres one.
#[derive(Default)]
pub struct MemoryCatalogStore {
    tables: Mutex<Tables>,
    offline: AtomicBool,
}

impl MemoryCatalogStore {
    pub fn seed_global(&self, food: FoodData) -> Uuid {
        let id = Uuid::new_v4();
        self.tables.lock().unwrap().globals.push(GlobalFoodRecord {
            id,
            name: food.name,
            serving_amount: food.serving_amount,
            calories: food.calories,
            carbs: food.carbs,
            protein: food.protein,
            protein_general: food.protein_general,
            fat: food.fat,
            created_at: OffsetDateTime::now_utc(),
        });
        id
    }

    pub fn overlay_rows(&self, user_id: Uuid) -> Vec<UserFoodRecord> {
        let tables = self.tables.lock().unwrap();
        tables
            .overlays
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect()
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

fn name_matches(name: &str, term: &str) -> bool {
    name.to_lowercase().contains(&term.to_lowercase())
}

fn overlay_row(user_id: Uuid, name: String, food: &FoodData, custom: bool) -> UserFoodRecord {
    UserFoodRecord {
        id: Uuid::new_v4(),
        user_id,
        name,
        serving_amount: food.serving_amount,
        calories: food.calories,
        carbs: food.carbs,
        protein: food.protein,
        protein_general: food.protein_general,
        fat: food.fat,
        is_custom: custom,
        is_deleted: false,
        created_at: OffsetDateTime::now_utc(),
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn list_global(&self) -> ServiceResult<Vec<GlobalFoodRecord>> {
        self.check()?;
        Ok(self.tables.lock().unwrap().globals.clone())
    }

    async fn find_global(&self, id: Uuid) -> ServiceResult<Option<GlobalFoodRecord>> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables.globals.iter().find(|g| g.id == id).cloned())
    }

    async fn search_global(&self, term: &str) -> ServiceResult<Vec<GlobalFoodRecord>> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .globals
            .iter()
            .filter(|g| name_matches(&g.name, term))
            .cloned()
            .collect())
    }

    async fn list_overlay(&self, user_id: Uuid) -> ServiceResult<Vec<UserFoodRecord>> {
        self.check()?;
        Ok(self.overlay_rows(user_id))
    }

    async fn find_overlay(&self, user_id: Uuid, id: Uuid) -> ServiceResult<Option<UserFoodRecord>> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .overlays
            .iter()
            .find(|r| r.id == id && r.user_id == user_id)
            .cloned())
    }

    async fn search_overlay(&self, user_id: Uuid, term: &str) -> ServiceResult<Vec<UserFoodRecord>> {
        self.check()?;
        Ok(self
            .overlay_rows(user_id)
            .into_iter()
            .filter(|r| name_matches(&r.name, term))
            .collect())
    }

    async fn insert_custom(&self, user_id: Uuid, food: &FoodData) -> ServiceResult<UserFoodRecord> {
        self.check()?;
        let row = overlay_row(user_id, food.name.clone(), food, true);
        self.tables.lock().unwrap().overlays.push(row.clone());
        Ok(row)
    }

    async fn update_overlay(
        &self,
        user_id: Uuid,
        id: Uuid,
        food: &FoodData,
    ) -> ServiceResult<Option<UserFoodRecord>> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        let Some(row) = tables
            .overlays
            .iter_mut()
            .find(|r| r.id == id && r.user_id == user_id && !r.is_deleted)
        else {
            return Ok(None);
        };
        row.name = food.name.clone();
        row.serving_amount = food.serving_amount;
        row.calories = food.calories;
        row.carbs = food.carbs;
        row.protein = food.protein;
        row.protein_general = food.protein_general;
        row.fat = food.fat;
        Ok(Some(row.clone()))
    }

    async fn delete_overlay(&self, user_id: Uuid, id: Uuid) -> ServiceResult<bool> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        let before = tables.overlays.len();
        tables
            .overlays
            .retain(|r| !(r.id == id && r.user_id == user_id && !r.is_deleted));
        Ok(tables.overlays.len() < before)
    }

    async fn shadow_global(
        &self,
        user_id: Uuid,
        global_id: Uuid,
        shadow: Shadow<'_>,
    ) -> ServiceResult<Option<UserFoodRecord>> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        let Some(global) = tables.globals.iter().find(|g| g.id == global_id).cloned() else {
            return Ok(None);
        };
        if tables
            .overlays
            .iter()
            .any(|r| r.user_id == user_id && r.name == global.name)
        {
            return Ok(None);
        }
        let row = match shadow {
            Shadow::Copy(food) => overlay_row(user_id, global.name, food, false),
            Shadow::Tombstone => UserFoodRecord {
                is_deleted: true,
                ..overlay_row(user_id, global.name, &FoodData::named(""), false)
            },
        };
        tables.overlays.push(row.clone());
        Ok(Some(row))
    }
}
