//! `Store` implementation backed by PostgreSQL transactions.

use async_trait::async_trait;
use sqlx::{Postgres, Transaction};

use assetdesk_core::asset::{Asset, AssetCategory, Branch};
use assetdesk_core::error::CoreError;
use assetdesk_core::inventory::{Part, PartUsage};
use assetdesk_core::maintenance::{MaintenanceRecord, MaintenanceSchedule};
use assetdesk_core::report::DailyReport;
use assetdesk_core::store::{Entity, Repository, Store, UnitOfWork};
use assetdesk_core::ticket::{Ticket, TicketUpdate};
use assetdesk_core::types::DbId;
use assetdesk_core::user::User;

use crate::error::map_sqlx_error;
use crate::repositories::{
    lock_live_row, AssetCategoryRepo, AssetRepo, BranchRepo, DailyReportRepo, MaintenanceRecordRepo,
    MaintenanceScheduleRepo, PartRepo, PartUsageRepo, TicketRepo, TicketUpdateRepo, UserRepo,
};
use crate::DbPool;

/// Opens one database transaction per unit of work.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, CoreError> {
        let tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }
}

/// A unit of work over an open transaction.
///
/// Dropping it without calling `commit` rolls the transaction back.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

fn stale<E: Entity>(entity: &E) -> CoreError {
    CoreError::Conflict(format!(
        "{} {} was modified by a concurrent transaction",
        E::NAME,
        entity.id()
    ))
}

/// Implement `Repository<$entity>` for `PgUnitOfWork` on top of a table repo.
///
/// Updates re-read the stored row first so that a stale version or an
/// immutable-field change is reported before any write is issued; the
/// `version` guard in the `UPDATE` then catches writers that raced in between.
/// `lock` takes `FOR UPDATE` on the row, so a delete that locked it first makes
/// the referencing transaction wait and then see the row as gone.
macro_rules! pg_repository {
    ($entity:ty, $repo:ident, $table:literal) => {
        #[async_trait]
        impl Repository<$entity> for PgUnitOfWork {
            async fn create(&mut self, mut entity: $entity) -> Result<$entity, CoreError> {
                entity.validate()?;
                entity.set_version(1);
                $repo::insert(&mut *self.tx, &entity)
                    .await
                    .map_err(map_sqlx_error)?
                    .try_into()
            }

            async fn get_by_id(&mut self, id: DbId) -> Result<$entity, CoreError> {
                $repo::find_by_id(&mut *self.tx, id)
                    .await
                    .map_err(map_sqlx_error)?
                    .ok_or(CoreError::NotFound {
                        entity: <$entity as Entity>::NAME,
                        id,
                    })?
                    .try_into()
            }

            async fn lock(&mut self, id: DbId) -> Result<$entity, CoreError> {
                let live = lock_live_row(&mut *self.tx, $table, id)
                    .await
                    .map_err(map_sqlx_error)?;
                if !live {
                    return Err(CoreError::NotFound {
                        entity: <$entity as Entity>::NAME,
                        id,
                    });
                }
                <Self as Repository<$entity>>::get_by_id(self, id).await
            }

            async fn list(
                &mut self,
                filter: &<$entity as Entity>::Filter,
            ) -> Result<Vec<$entity>, CoreError> {
                $repo::list(&mut *self.tx, filter)
                    .await
                    .map_err(map_sqlx_error)?
                    .into_iter()
                    .map(<$entity>::try_from)
                    .collect()
            }

            async fn update(&mut self, entity: $entity) -> Result<$entity, CoreError> {
                entity.validate()?;
                let current: $entity =
                    <Self as Repository<$entity>>::get_by_id(self, entity.id()).await?;
                if current.version() != entity.version() {
                    let name = <$entity as Entity>::NAME;
                    tracing::warn!(
                        entity = name,
                        id = %entity.id(),
                        stored = current.version(),
                        supplied = entity.version(),
                        "Stale update rejected"
                    );
                    return Err(stale(&entity));
                }
                entity.check_replace(&current)?;
                $repo::update(&mut *self.tx, &entity)
                    .await
                    .map_err(map_sqlx_error)?
                    .ok_or_else(|| stale(&entity))?
                    .try_into()
            }

            async fn delete(&mut self, id: DbId) -> Result<(), CoreError> {
                let deleted = $repo::soft_delete(&mut *self.tx, id)
                    .await
                    .map_err(map_sqlx_error)?;
                if !deleted {
                    return Err(CoreError::NotFound {
                        entity: <$entity as Entity>::NAME,
                        id,
                    });
                }
                Ok(())
            }
        }
    };
}

pg_repository!(Branch, BranchRepo, "branches");
pg_repository!(User, UserRepo, "users");
pg_repository!(AssetCategory, AssetCategoryRepo, "asset_categories");
pg_repository!(Asset, AssetRepo, "assets");
pg_repository!(Ticket, TicketRepo, "tickets");
pg_repository!(TicketUpdate, TicketUpdateRepo, "ticket_updates");
pg_repository!(MaintenanceSchedule, MaintenanceScheduleRepo, "maintenance_schedules");
pg_repository!(MaintenanceRecord, MaintenanceRecordRepo, "maintenance_records");
pg_repository!(Part, PartRepo, "parts");
pg_repository!(PartUsage, PartUsageRepo, "part_usages");
pg_repository!(DailyReport, DailyReportRepo, "daily_reports");

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    fn branches(&mut self) -> &mut dyn Repository<Branch> {
        self
    }

    fn users(&mut self) -> &mut dyn Repository<User> {
        self
    }

    fn categories(&mut self) -> &mut dyn Repository<AssetCategory> {
        self
    }

    fn assets(&mut self) -> &mut dyn Repository<Asset> {
        self
    }

    fn tickets(&mut self) -> &mut dyn Repository<Ticket> {
        self
    }

    fn ticket_updates(&mut self) -> &mut dyn Repository<TicketUpdate> {
        self
    }

    fn schedules(&mut self) -> &mut dyn Repository<MaintenanceSchedule> {
        self
    }

    fn records(&mut self) -> &mut dyn Repository<MaintenanceRecord> {
        self
    }

    fn parts(&mut self) -> &mut dyn Repository<Part> {
        self
    }

    fn part_usages(&mut self) -> &mut dyn Repository<PartUsage> {
        self
    }

    fn daily_reports(&mut self) -> &mut dyn Repository<DailyReport> {
        self
    }

    async fn commit(self: Box<Self>) -> Result<(), CoreError> {
        assetdesk_core::deadline::commit_started();
        self.tx.commit().await.map_err(map_sqlx_error)?;
        tracing::debug!("Unit of work committed");
        Ok(())
    }
}
