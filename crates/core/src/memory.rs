//! In-process implementation of the persistence contract.
//!
//! Each unit of work operates on a private snapshot of every table. On commit
//! the rows it touched are compared against the shared state: if any of them
//! was written by another unit since the snapshot was taken, the commit fails
//! with `Conflict` and nothing is applied.
//!
//! Locked rows behave like shared locks. A committing unit checks that its
//! locked rows were not written since its snapshot and stamps them as
//! referenced; a delete fails at commit if the row was stamped after the
//! deleting unit's snapshot.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use indexmap::IndexMap;

use crate::asset::{Asset, AssetCategory, Branch};
use crate::error::CoreError;
use crate::inventory::{Part, PartUsage};
use crate::maintenance::{MaintenanceRecord, MaintenanceSchedule};
use crate::report::DailyReport;
use crate::store::{Entity, Repository, Store, UnitOfWork};
use crate::ticket::{Ticket, TicketUpdate};
use crate::types::DbId;
use crate::user::User;

#[derive(Debug, Clone)]
struct Row<E> {
    entity: E,
    deleted: bool,
    /// Commit that last wrote the row.
    revision: u64,
    /// Commit that last referenced the row through a lock.
    referenced: u64,
}

/// Rows of one entity type, in insertion order.
#[derive(Debug, Clone)]
struct Table<E> {
    rows: IndexMap<DbId, Row<E>>,
    /// Rows written by the owning unit of work, with the revision they had
    /// when first touched (`None` for rows created by the unit).
    touched: IndexMap<DbId, Option<u64>>,
    /// Rows locked by the owning unit of work, with their revision at the time.
    locked: IndexMap<DbId, u64>,
}

impl<E> Default for Table<E> {
    fn default() -> Self {
        Self {
            rows: IndexMap::new(),
            touched: IndexMap::new(),
            locked: IndexMap::new(),
        }
    }
}

impl<E: Entity> Table<E> {
    fn live(&self, id: DbId) -> Result<&Row<E>, CoreError> {
        self.rows
            .get(&id)
            .filter(|row| !row.deleted)
            .ok_or(CoreError::NotFound { entity: E::NAME, id })
    }

    fn check_unique(&self, entity: &E) -> Result<(), CoreError> {
        for (constraint, value) in entity.unique_keys() {
            let taken = self.rows.values().any(|row| {
                !row.deleted
                    && row.entity.id() != entity.id()
                    && row
                        .entity
                        .unique_keys()
                        .iter()
                        .any(|(c, v)| *c == constraint && *v == value)
            });
            if taken {
                return Err(CoreError::Conflict(format!(
                    "{} violates unique constraint {constraint}",
                    E::NAME
                )));
            }
        }
        Ok(())
    }

    fn touch(&mut self, id: DbId) {
        let base = self.rows.get(&id).map(|row| row.revision);
        self.touched.entry(id).or_insert(base);
    }

    fn snapshot(&self) -> Self {
        Self {
            rows: self.rows.clone(),
            touched: IndexMap::new(),
            locked: IndexMap::new(),
        }
    }

    /// Apply this unit's writes onto `target`, stamping them with `revision`.
    fn merge_into(&self, target: &mut Self, revision: u64) -> Result<(), CoreError> {
        for (id, base) in &self.touched {
            let current = target.rows.get(id);
            if current.map(|row| row.revision) != *base {
                return Err(CoreError::Conflict(format!(
                    "{} {id} was modified by a concurrent transaction",
                    E::NAME
                )));
            }
            let referenced = current.map_or(0, |c| c.referenced);
            if let Some(row) = self.rows.get(id) {
                if row.deleted && referenced != row.referenced {
                    return Err(CoreError::Conflict(format!(
                        "{} {id} was referenced by a concurrent transaction",
                        E::NAME
                    )));
                }
                let mut row = row.clone();
                row.revision = revision;
                row.referenced = referenced;
                target.rows.insert(*id, row);
            }
        }
        for (id, base) in &self.locked {
            if self.touched.contains_key(id) {
                continue;
            }
            match target.rows.get_mut(id) {
                Some(row) if row.revision == *base => row.referenced = revision,
                _ => {
                    return Err(CoreError::Conflict(format!(
                        "{} {id} was modified by a concurrent transaction",
                        E::NAME
                    )));
                }
            }
        }
        for id in self.touched.keys() {
            if let Some(row) = target.rows.get(id).filter(|row| !row.deleted) {
                target.check_unique(&row.entity)?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<E: Entity> Repository<E> for Table<E> {
    async fn create(&mut self, mut entity: E) -> Result<E, CoreError> {
        entity.validate()?;
        if self.rows.contains_key(&entity.id()) {
            return Err(CoreError::Conflict(format!(
                "{} {} already exists",
                E::NAME,
                entity.id()
            )));
        }
        self.check_unique(&entity)?;
        entity.set_version(1);
        let id = entity.id();
        self.touch(id);
        self.rows.insert(
            id,
            Row {
                entity: entity.clone(),
                deleted: false,
                revision: 0,
                referenced: 0,
            },
        );
        Ok(entity)
    }

    async fn get_by_id(&mut self, id: DbId) -> Result<E, CoreError> {
        self.live(id).map(|row| row.entity.clone())
    }

    async fn lock(&mut self, id: DbId) -> Result<E, CoreError> {
        let row = self.live(id)?;
        let (entity, revision) = (row.entity.clone(), row.revision);
        self.locked.entry(id).or_insert(revision);
        Ok(entity)
    }

    async fn list(&mut self, filter: &E::Filter) -> Result<Vec<E>, CoreError> {
        Ok(self
            .rows
            .values()
            .filter(|row| !row.deleted && row.entity.matches(filter))
            .map(|row| row.entity.clone())
            .collect())
    }

    async fn update(&mut self, mut entity: E) -> Result<E, CoreError> {
        entity.validate()?;
        let id = entity.id();
        let current = self.live(id)?;
        if current.entity.version() != entity.version() {
            return Err(CoreError::Conflict(format!(
                "{} {id} has version {}, update was based on {}",
                E::NAME,
                current.entity.version(),
                entity.version()
            )));
        }
        entity.check_replace(&current.entity)?;
        self.check_unique(&entity)?;
        entity.set_version(entity.version() + 1);
        self.touch(id);
        if let Some(row) = self.rows.get_mut(&id) {
            row.entity = entity.clone();
        }
        Ok(entity)
    }

    async fn delete(&mut self, id: DbId) -> Result<(), CoreError> {
        self.live(id)?;
        self.touch(id);
        if let Some(row) = self.rows.get_mut(&id) {
            row.deleted = true;
        }
        Ok(())
    }
}

macro_rules! tables {
    ($($field:ident: $entity:ty),+ $(,)?) => {
        #[derive(Debug, Clone, Default)]
        struct Tables {
            $($field: Table<$entity>),+
        }

        impl Tables {
            fn snapshot(&self) -> Self {
                Self {
                    $($field: self.$field.snapshot()),+
                }
            }

            fn merge_into(&self, target: &mut Self, revision: u64) -> Result<(), CoreError> {
                $(self.$field.merge_into(&mut target.$field, revision)?;)+
                Ok(())
            }

            fn touched(&self) -> usize {
                0 $(+ self.$field.touched.len())+
            }
        }
    };
}

tables! {
    branches: Branch,
    users: User,
    categories: AssetCategory,
    assets: Asset,
    tickets: Ticket,
    ticket_updates: TicketUpdate,
    schedules: MaintenanceSchedule,
    records: MaintenanceRecord,
    parts: Part,
    part_usages: PartUsage,
    daily_reports: DailyReport,
}

#[derive(Debug, Default)]
struct State {
    tables: Tables,
    revision: u64,
}

/// Shared in-memory store. Cloning shares the underlying state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, CoreError> {
        let tables = self.lock().tables.snapshot();
        Ok(Box::new(MemoryUnitOfWork {
            store: self.clone(),
            tables,
        }))
    }
}

/// A unit of work over a [`MemoryStore`] snapshot.
pub struct MemoryUnitOfWork {
    store: MemoryStore,
    tables: Tables,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    fn branches(&mut self) -> &mut dyn Repository<Branch> {
        &mut self.tables.branches
    }

    fn users(&mut self) -> &mut dyn Repository<User> {
        &mut self.tables.users
    }

    fn categories(&mut self) -> &mut dyn Repository<AssetCategory> {
        &mut self.tables.categories
    }

    fn assets(&mut self) -> &mut dyn Repository<Asset> {
        &mut self.tables.assets
    }

    fn tickets(&mut self) -> &mut dyn Repository<Ticket> {
        &mut self.tables.tickets
    }

    fn ticket_updates(&mut self) -> &mut dyn Repository<TicketUpdate> {
        &mut self.tables.ticket_updates
    }

    fn schedules(&mut self) -> &mut dyn Repository<MaintenanceSchedule> {
        &mut self.tables.schedules
    }

    fn records(&mut self) -> &mut dyn Repository<MaintenanceRecord> {
        &mut self.tables.records
    }

    fn parts(&mut self) -> &mut dyn Repository<Part> {
        &mut self.tables.parts
    }

    fn part_usages(&mut self) -> &mut dyn Repository<PartUsage> {
        &mut self.tables.part_usages
    }

    fn daily_reports(&mut self) -> &mut dyn Repository<DailyReport> {
        &mut self.tables.daily_reports
    }

    async fn commit(self: Box<Self>) -> Result<(), CoreError> {
        crate::deadline::commit_started();
        let touched = self.tables.touched();
        if touched == 0 {
            return Ok(());
        }
        let mut state = self.store.lock();
        let revision = state.revision + 1;
        let mut candidate = state.tables.clone();
        if let Err(e) = self.tables.merge_into(&mut candidate, revision) {
            tracing::warn!(error = %e, "In-memory commit rejected");
            return Err(e);
        }
        state.tables = candidate;
        state.revision = revision;
        tracing::debug!(revision, rows = touched, "In-memory commit applied");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{AssetCategoryFilter, BranchFilter};

    fn branch(name: &str) -> Branch {
        let now = chrono::Utc::now();
        Branch {
            id: crate::types::new_id(),
            name: name.into(),
            address: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    fn category(name: &str) -> AssetCategory {
        let now = chrono::Utc::now();
        AssetCategory {
            id: crate::types::new_id(),
            name: name.into(),
            description: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    #[tokio::test]
    async fn writes_are_invisible_until_commit() {
        let store = MemoryStore::new();
        let mut uow = store.begin().await.unwrap();
        let created = uow.branches().create(branch("North")).await.unwrap();
        assert_eq!(created.version, 1);

        let mut other = store.begin().await.unwrap();
        assert!(other.branches().get_by_id(created.id).await.is_err());

        uow.commit().await.unwrap();
        let mut after = store.begin().await.unwrap();
        assert_eq!(after.branches().get_by_id(created.id).await.unwrap().name, "North");
    }

    #[tokio::test]
    async fn dropping_a_unit_discards_its_writes() {
        let store = MemoryStore::new();
        {
            let mut uow = store.begin().await.unwrap();
            uow.branches().create(branch("South")).await.unwrap();
        }
        let mut uow = store.begin().await.unwrap();
        let all = uow.branches().list(&BranchFilter::default()).await.unwrap();
        assert!(all.is_empty());
    }

    #[tokio::test]
    async fn competing_writes_fail_the_later_commit() {
        let store = MemoryStore::new();
        let mut setup = store.begin().await.unwrap();
        let b = setup.branches().create(branch("East")).await.unwrap();
        setup.commit().await.unwrap();

        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();

        let mut a = first.branches().get_by_id(b.id).await.unwrap();
        a.name = "East 1".into();
        first.branches().update(a).await.unwrap();

        let mut c = second.branches().get_by_id(b.id).await.unwrap();
        c.name = "East 2".into();
        second.branches().update(c).await.unwrap();

        first.commit().await.unwrap();
        assert!(matches!(second.commit().await, Err(CoreError::Conflict(_))));

        let mut check = store.begin().await.unwrap();
        let stored = check.branches().get_by_id(b.id).await.unwrap();
        assert_eq!(stored.name, "East 1");
        assert_eq!(stored.version, 2);
    }

    #[tokio::test]
    async fn delete_after_concurrent_reference_is_rejected() {
        let store = MemoryStore::new();
        let mut setup = store.begin().await.unwrap();
        let b = setup.branches().create(branch("Harbour")).await.unwrap();
        setup.commit().await.unwrap();

        let mut deleter = store.begin().await.unwrap();
        let mut referrer = store.begin().await.unwrap();
        deleter.branches().lock(b.id).await.unwrap();
        deleter.branches().delete(b.id).await.unwrap();
        referrer.branches().lock(b.id).await.unwrap();
        referrer.categories().create(category("Docks")).await.unwrap();

        referrer.commit().await.unwrap();
        assert!(matches!(deleter.commit().await, Err(CoreError::Conflict(_))));

        let mut check = store.begin().await.unwrap();
        assert!(check.branches().get_by_id(b.id).await.is_ok());
    }

    #[tokio::test]
    async fn reference_after_concurrent_delete_is_rejected() {
        let store = MemoryStore::new();
        let mut setup = store.begin().await.unwrap();
        let b = setup.branches().create(branch("Quay")).await.unwrap();
        setup.commit().await.unwrap();

        let mut deleter = store.begin().await.unwrap();
        let mut referrer = store.begin().await.unwrap();
        deleter.branches().lock(b.id).await.unwrap();
        deleter.branches().delete(b.id).await.unwrap();
        referrer.branches().lock(b.id).await.unwrap();
        referrer.categories().create(category("Cranes")).await.unwrap();

        deleter.commit().await.unwrap();
        assert!(matches!(referrer.commit().await, Err(CoreError::Conflict(_))));

        let mut check = store.begin().await.unwrap();
        let all = check
            .categories()
            .list(&AssetCategoryFilter::default())
            .await
            .unwrap();
        assert!(all.is_empty());
    }

    #[tokio::test]
    async fn concurrent_locks_do_not_conflict() {
        let store = MemoryStore::new();
        let mut setup = store.begin().await.unwrap();
        let b = setup.branches().create(branch("Pier")).await.unwrap();
        setup.commit().await.unwrap();

        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();
        first.branches().lock(b.id).await.unwrap();
        first.categories().create(category("Boats")).await.unwrap();
        second.branches().lock(b.id).await.unwrap();
        second.categories().create(category("Ferries")).await.unwrap();

        first.commit().await.unwrap();
        second.commit().await.unwrap();
    }

    #[tokio::test]
    async fn stale_version_is_rejected() {
        let store = MemoryStore::new();
        let mut uow = store.begin().await.unwrap();
        let b = uow.branches().create(branch("West")).await.unwrap();
        let mut renamed = b.clone();
        renamed.name = "West 2".into();
        uow.branches().update(renamed).await.unwrap();

        let mut stale = b;
        stale.name = "West 3".into();
        assert!(matches!(
            uow.branches().update(stale).await,
            Err(CoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn unique_keys_are_rechecked_at_commit() {
        let store = MemoryStore::new();
        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();
        first.categories().create(category("Pumps")).await.unwrap();
        second.categories().create(category("PUMPS")).await.unwrap();

        first.commit().await.unwrap();
        assert!(matches!(second.commit().await, Err(CoreError::Conflict(_))));

        let mut check = store.begin().await.unwrap();
        let all = check
            .categories()
            .list(&AssetCategoryFilter::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn soft_deleted_rows_free_their_unique_keys() {
        let store = MemoryStore::new();
        let mut uow = store.begin().await.unwrap();
        let c = uow.categories().create(category("Lifts")).await.unwrap();
        uow.categories().delete(c.id).await.unwrap();
        assert!(matches!(
            uow.categories().get_by_id(c.id).await,
            Err(CoreError::NotFound { .. })
        ));
        assert!(matches!(
            uow.categories().delete(c.id).await,
            Err(CoreError::NotFound { .. })
        ));
        uow.categories().create(category("Lifts")).await.unwrap();
        uow.commit().await.unwrap();
    }

    #[tokio::test]
    async fn list_keeps_insertion_order() {
        let store = MemoryStore::new();
        let mut uow = store.begin().await.unwrap();
        for name in ["c", "a", "b"] {
            uow.branches().create(branch(name)).await.unwrap();
        }
        uow.commit().await.unwrap();

        let mut uow = store.begin().await.unwrap();
        let names: Vec<String> = uow
            .branches()
            .list(&BranchFilter::default())
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.name)
            .collect();
        assert_eq!(names, ["c", "a", "b"]);
    }
}
