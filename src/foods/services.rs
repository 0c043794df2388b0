use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use crate::foods::dto::{FoodPatch, FoodRef, FoodSource, FoodView};
use crate::foods::repo::CatalogStore;
use crate::foods::repo_types::{FoodData, GlobalFoodRecord, Shadow, UserFoodRecord};

/// Merges globals with a user's overlay rows.
///
/// A global item is visible only if the user has no overlay row of the same
/// name; overlay rows are visible unless they are tombstones. Sorted by name.
pub fn merge_effective(
    globals: Vec<GlobalFoodRecord>,
    overlays: Vec<UserFoodRecord>,
) -> Vec<FoodView> {
    let shadowed: HashSet<&str> = overlays.iter().map(|o| o.name.as_str()).collect();
    let mut merged: Vec<FoodView> = globals
        .into_iter()
        .filter(|g| !shadowed.contains(g.name.as_str()))
        .map(FoodView::from)
        .collect();
    merged.extend(
        overlays
            .into_iter()
            .filter(|o| !o.is_deleted)
            .map(FoodView::from),
    );
    merged.sort_by(|a, b| {
        a.name
            .cmp(&b.name)
            .then(a.source.cmp(&b.source))
            .then(a.id.cmp(&b.id))
    });
    merged
}

/// Per-user view over the shared food catalog.
#[derive(Clone)]
pub struct FoodCatalog {
    store: Arc<dyn CatalogStore>,
    search_limit: usize,
}

impl FoodCatalog {
    pub fn new(store: Arc<dyn CatalogStore>, search_limit: usize) -> Self {
        Self {
            store,
            search_limit,
        }
    }

    async fn effective(&self, user_id: Uuid) -> ServiceResult<Vec<FoodView>> {
        let globals = self.store.list_global().await?;
        let overlays = self.store.list_overlay(user_id).await?;
        Ok(merge_effective(globals, overlays))
    }

    /// The user's merged catalog; empty when the store is unreachable.
    #[instrument(skip(self))]
    pub async fn list_effective(&self, user_id: Uuid) -> ServiceResult<Vec<FoodView>> {
        match self.effective(user_id).await {
            Err(e) if e.is_unavailable() => {
                warn!(error = %e, %user_id, "catalog unavailable; returning empty list");
                Ok(Vec::new())
            }
            other => other,
        }
    }

    /// Case-insensitive substring search, truncated to the configured limit.
    #[instrument(skip(self))]
    pub async fn search(&self, term: &str, user_id: Uuid) -> ServiceResult<Vec<FoodView>> {
        let term = term.trim();
        let found = async {
            let globals = self.store.search_global(term).await?;
            let overlays = self.store.search_overlay(user_id, term).await?;
            Ok::<_, ServiceError>(merge_effective(globals, overlays))
        }
        .await;

        match found {
            Ok(mut views) => {
                if views.len() > self.search_limit {
                    debug!(total = views.len(), limit = self.search_limit, "search truncated");
                    views.truncate(self.search_limit);
                }
                Ok(views)
            }
            Err(e) if e.is_unavailable() => {
                warn!(error = %e, %user_id, "catalog unavailable; returning empty search");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Adds a user-authored item. Names are not required to be unique.
    #[instrument(skip(self, food))]
    pub async fn add_custom(&self, user_id: Uuid, food: FoodData) -> ServiceResult<FoodView> {
        let food = food.normalized().map_err(ServiceError::InvalidArgument)?;
        let row = self.store.insert_custom(user_id, &food).await?;
        info!(%user_id, food_id = %row.id, name = %row.name, "custom food added");
        Ok(row.into())
    }

    /// Edits a catalog entry. Fields missing from `patch` keep the current
    /// values of the target. User rows are updated in place; a global item is
    /// copied into a user row carrying the merged values.
    #[instrument(skip(self, patch))]
    pub async fn update(
        &self,
        user_id: Uuid,
        target: FoodRef,
        patch: impl Into<FoodPatch>,
    ) -> ServiceResult<FoodView> {
        let patch = patch.into();
        match target.source {
            FoodSource::User => {
                let existing = self
                    .store
                    .find_overlay(user_id, target.id)
                    .await?
                    .filter(|r| !r.is_deleted)
                    .ok_or_else(|| ServiceError::not_found("food", target.id))?;
                let food = patch
                    .apply(FoodData::from(&existing))
                    .normalized()
                    .map_err(ServiceError::InvalidArgument)?;
                if !existing.is_custom && existing.name != food.name {
                    return Err(ServiceError::invalid(
                        "catalog items cannot be renamed; add a custom item instead",
                    ));
                }
                let row = self
                    .store
                    .update_overlay(user_id, target.id, &food)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("food", target.id))?;
                info!(%user_id, food_id = %row.id, "user food updated");
                Ok(row.into())
            }
            FoodSource::Global => {
                let global = self
                    .store
                    .find_global(target.id)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("food", target.id))?;
                let food = patch
                    .apply(FoodData::from(&global))
                    .normalized()
                    .map_err(ServiceError::InvalidArgument)?;
                if global.name != food.name {
                    return Err(ServiceError::invalid(
                        "catalog items cannot be renamed; add a custom item instead",
                    ));
                }
                let row = self
                    .store
                    .shadow_global(user_id, target.id, Shadow::Copy(&food))
                    .await?
                    .ok_or_else(|| ServiceError::not_found("food", target.id))?;
                info!(%user_id, global_id = %target.id, food_id = %row.id, "global food copied on write");
                Ok(row.into())
            }
        }
    }

    /// Removes a catalog entry for this user. User rows are deleted; a global
    /// item is hidden behind a tombstone.
    #[instrument(skip(self))]
    pub async fn delete(&self, user_id: Uuid, target: FoodRef) -> ServiceResult<()> {
        match target.source {
            FoodSource::User => {
                if !self.store.delete_overlay(user_id, target.id).await? {
                    return Err(ServiceError::not_found("food", target.id));
                }
                info!(%user_id, food_id = %target.id, "user food deleted");
            }
            FoodSource::Global => {
                self.store
                    .shadow_global(user_id, target.id, Shadow::Tombstone)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("food", target.id))?;
                info!(%user_id, global_id = %target.id, "global food hidden");
            }
        }
        Ok(())
    }

    /// Maps a position in the current effective list to a stable reference.
    /// Kept for clients that still address foods by index.
    pub async fn resolve_position(&self, user_id: Uuid, index: usize) -> ServiceResult<FoodRef> {
        self.effective(user_id)
            .await?
            .get(index)
            .map(FoodView::food_ref)
            .ok_or_else(|| ServiceError::not_found("food position", index))
    }

    pub async fn update_at(
        &self,
        user_id: Uuid,
        index: usize,
        patch: impl Into<FoodPatch>,
    ) -> ServiceResult<FoodView> {
        let target = self.resolve_position(user_id, index).await?;
        self.update(user_id, target, patch).await
    }

    pub async fn delete_at(&self, user_id: Uuid, index: usize) -> ServiceResult<()> {
        let target = self.resolve_position(user_id, index).await?;
        self.delete(user_id, target).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foods::memory::MemoryCatalogStore;

    fn food(name: &str, calories: f64) -> FoodData {
        FoodData {
            calories,
            ..FoodData::named(name)
        }
    }

    fn setup(limit: usize) -> (Arc<MemoryCatalogStore>, FoodCatalog) {
        let store = Arc::new(MemoryCatalogStore::default());
        let catalog = FoodCatalog::new(store.clone(), limit);
        (store, catalog)
    }

    fn position(views: &[FoodView], name: &str) -> usize {
        views.iter().position(|v| v.name == name).unwrap()
    }

    #[tokio::test]
    async fn fresh_user_sees_globals_sorted_by_name() {
        let (store, catalog) = setup(20);
        store.seed_global(food("Banana", 105.0));
        store.seed_global(food("Apple", 95.0));

        let views = catalog.list_effective(Uuid::new_v4()).await.unwrap();
        let names: Vec<_> = views.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, ["Apple", "Banana"]);
        assert!(views.iter().all(|v| v.source == FoodSource::Global && !v.editable));
    }

    #[tokio::test]
    async fn reading_creates_no_overlay_rows() {
        let (store, catalog) = setup(20);
        store.seed_global(food("Apple", 95.0));
        let user = Uuid::new_v4();
        catalog.list_effective(user).await.unwrap();
        catalog.search("app", user).await.unwrap();
        assert!(store.overlay_rows(user).is_empty());
    }

    #[tokio::test]
    async fn update_of_global_copies_on_write_for_one_user_only() {
        let (store, catalog) = setup(20);
        let apple = store.seed_global(food("Apple", 95.0));
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        let view = catalog
            .update(a, FoodRef::global(apple), food("Apple", 100.0))
            .await
            .unwrap();
        assert_eq!(view.source, FoodSource::User);
        assert!(!view.is_custom);

        let a_views = catalog.list_effective(a).await.unwrap();
        let apples: Vec<_> = a_views.iter().filter(|v| v.name == "Apple").collect();
        assert_eq!(apples.len(), 1);
        assert_eq!(apples[0].calories, 100.0);
        assert_eq!(apples[0].source, FoodSource::User);

        let b_views = catalog.list_effective(b).await.unwrap();
        assert_eq!(b_views.len(), 1);
        assert_eq!(b_views[0].calories, 95.0);
        assert_eq!(b_views[0].source, FoodSource::Global);
    }

    #[tokio::test]
    async fn positional_update_matches_legacy_scenario() {
        let (store, catalog) = setup(20);
        store.seed_global(food("Banana", 105.0));
        store.seed_global(food("Apple", 95.0));
        let a = Uuid::new_v4();

        let idx = position(&catalog.list_effective(a).await.unwrap(), "Apple");
        catalog.update_at(a, idx, food("Apple", 100.0)).await.unwrap();

        let a_views = catalog.list_effective(a).await.unwrap();
        assert_eq!(a_views[position(&a_views, "Apple")].calories, 100.0);
        let b_views = catalog.list_effective(Uuid::new_v4()).await.unwrap();
        assert_eq!(b_views[position(&b_views, "Apple")].calories, 95.0);
    }

    #[tokio::test]
    async fn partial_edit_of_global_carries_over_unedited_values() {
        let (store, catalog) = setup(20);
        let apple = store.seed_global(FoodData {
            serving_amount: 182.0,
            calories: 95.0,
            carbs: 25.0,
            protein: 0.5,
            protein_general: 0.5,
            fat: 0.3,
            ..FoodData::named("Apple")
        });
        let user = Uuid::new_v4();

        let body: FoodPatch = serde_json::from_str(r#"{"calories": 100}"#).unwrap();
        let copy = catalog
            .update(user, FoodRef::global(apple), body)
            .await
            .unwrap();
        assert_eq!(copy.name, "Apple");
        assert_eq!(copy.calories, 100.0);
        assert_eq!(copy.carbs, 25.0);
        assert_eq!(copy.protein, 0.5);
        assert_eq!(copy.serving_amount, 182.0);
        assert_eq!(copy.fat, 0.3);

        let body: FoodPatch = serde_json::from_str(r#"{"fat": 1.0}"#).unwrap();
        let edited = catalog.update(user, copy.food_ref(), body).await.unwrap();
        assert_eq!(edited.fat, 1.0);
        assert_eq!(edited.calories, 100.0);
        assert_eq!(edited.carbs, 25.0);
    }

    #[tokio::test]
    async fn second_update_edits_the_copy_in_place() {
        let (store, catalog) = setup(20);
        let apple = store.seed_global(food("Apple", 95.0));
        let user = Uuid::new_v4();

        let copy = catalog
            .update(user, FoodRef::global(apple), food("Apple", 100.0))
            .await
            .unwrap();
        catalog
            .update(user, copy.food_ref(), food("Apple", 110.0))
            .await
            .unwrap();

        let rows = store.overlay_rows(user);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].calories, 110.0);
    }

    #[tokio::test]
    async fn stale_global_reference_after_copy_is_not_found() {
        let (store, catalog) = setup(20);
        let apple = store.seed_global(food("Apple", 95.0));
        let user = Uuid::new_v4();
        catalog
            .update(user, FoodRef::global(apple), food("Apple", 100.0))
            .await
            .unwrap();

        let err = catalog
            .update(user, FoodRef::global(apple), food("Apple", 120.0))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { .. }));
        assert_eq!(store.overlay_rows(user).len(), 1);
    }

    #[tokio::test]
    async fn delete_of_global_hides_it_for_that_user_only() {
        let (store, catalog) = setup(20);
        let apple = store.seed_global(food("Apple", 95.0));
        let (u, u2) = (Uuid::new_v4(), Uuid::new_v4());

        catalog.delete(u, FoodRef::global(apple)).await.unwrap();

        assert!(catalog.list_effective(u).await.unwrap().is_empty());
        assert_eq!(catalog.list_effective(u2).await.unwrap().len(), 1);

        let rows = store.overlay_rows(u);
        assert_eq!(rows.len(), 1);
        assert!(rows[0].is_deleted && !rows[0].is_custom);
        assert_eq!(rows[0].calories, 0.0);
    }

    #[tokio::test]
    async fn deleting_a_copy_restores_the_global() {
        let (store, catalog) = setup(20);
        let apple = store.seed_global(food("Apple", 95.0));
        let user = Uuid::new_v4();
        let copy = catalog
            .update(user, FoodRef::global(apple), food("Apple", 100.0))
            .await
            .unwrap();

        catalog.delete(user, copy.food_ref()).await.unwrap();

        let views = catalog.list_effective(user).await.unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].source, FoodSource::Global);
        assert_eq!(views[0].calories, 95.0);
    }

    #[tokio::test]
    async fn custom_items_allow_duplicate_names() {
        let (_store, catalog) = setup(20);
        let user = Uuid::new_v4();
        catalog.add_custom(user, food("Shake", 300.0)).await.unwrap();
        catalog.add_custom(user, food("Shake", 320.0)).await.unwrap();

        let views = catalog.list_effective(user).await.unwrap();
        assert_eq!(views.len(), 2);
        assert!(views.iter().all(|v| v.is_custom && v.editable));
    }

    #[tokio::test]
    async fn custom_item_delete_is_permanent() {
        let (store, catalog) = setup(20);
        let user = Uuid::new_v4();
        let shake = catalog.add_custom(user, food("Shake", 300.0)).await.unwrap();
        catalog.delete(user, shake.food_ref()).await.unwrap();
        assert!(store.overlay_rows(user).is_empty());

        let err = catalog.delete(user, shake.food_ref()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { .. }));
    }

    #[tokio::test]
    async fn custom_items_can_be_renamed_but_copies_cannot() {
        let (store, catalog) = setup(20);
        let apple = store.seed_global(food("Apple", 95.0));
        let user = Uuid::new_v4();

        let shake = catalog.add_custom(user, food("Shake", 300.0)).await.unwrap();
        let renamed = catalog
            .update(user, shake.food_ref(), food("Smoothie", 300.0))
            .await
            .unwrap();
        assert_eq!(renamed.name, "Smoothie");

        let err = catalog
            .update(user, FoodRef::global(apple), food("Green Apple", 95.0))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn out_of_range_position_is_not_found() {
        let (store, catalog) = setup(20);
        store.seed_global(food("Apple", 95.0));
        let user = Uuid::new_v4();
        let err = catalog.delete_at(user, 1).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { .. }));
        let err = catalog.update_at(user, 7, food("Apple", 1.0)).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { .. }));
    }

    #[tokio::test]
    async fn other_users_rows_are_not_addressable() {
        let (_store, catalog) = setup(20);
        let (owner, intruder) = (Uuid::new_v4(), Uuid::new_v4());
        let shake = catalog.add_custom(owner, food("Shake", 300.0)).await.unwrap();

        let err = catalog
            .update(intruder, shake.food_ref(), food("Shake", 1.0))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { .. }));
        let err = catalog.delete(intruder, shake.food_ref()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { .. }));
    }

    #[tokio::test]
    async fn search_is_case_insensitive_and_prefers_overlay() {
        let (store, catalog) = setup(20);
        let apple = store.seed_global(food("Apple", 95.0));
        store.seed_global(food("Pineapple", 80.0));
        store.seed_global(food("Bread", 250.0));
        let user = Uuid::new_v4();
        catalog
            .update(user, FoodRef::global(apple), food("Apple", 100.0))
            .await
            .unwrap();

        let found = catalog.search("APPLE", user).await.unwrap();
        let names: Vec<_> = found.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, ["Apple", "Pineapple"]);
        assert_eq!(found[0].source, FoodSource::User);
        assert_eq!(found[0].calories, 100.0);
    }

    #[tokio::test]
    async fn search_skips_hidden_globals() {
        let (store, catalog) = setup(20);
        let apple = store.seed_global(food("Apple", 95.0));
        let user = Uuid::new_v4();
        catalog.delete(user, FoodRef::global(apple)).await.unwrap();
        assert!(catalog.search("app", user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_truncates_to_limit_in_name_order() {
        let (store, catalog) = setup(3);
        for name in ["Rice E", "Rice A", "Rice D", "Rice B", "Rice C"] {
            store.seed_global(food(name, 130.0));
        }
        let found = catalog.search("rice", Uuid::new_v4()).await.unwrap();
        let names: Vec<_> = found.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, ["Rice A", "Rice B", "Rice C"]);
    }

    #[tokio::test]
    async fn unavailable_store_degrades_reads_but_fails_writes() {
        let (store, catalog) = setup(20);
        let apple = store.seed_global(food("Apple", 95.0));
        store.set_offline(true);
        let user = Uuid::new_v4();

        assert!(catalog.list_effective(user).await.unwrap().is_empty());
        assert!(catalog.search("a", user).await.unwrap().is_empty());

        let err = catalog.delete(user, FoodRef::global(apple)).await.unwrap_err();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn invalid_food_data_is_rejected() {
        let (_store, catalog) = setup(20);
        let err = catalog
            .add_custom(Uuid::new_v4(), food("  ", 10.0))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidArgument(_)));
    }
}
