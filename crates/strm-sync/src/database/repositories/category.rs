//! SeaORM-based Category repository implementation
//!
//! Operator visibility is owned by this table and is never overwritten by a sync.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait, NotSet,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use tracing::debug;

use super::Bookkeeping;
use crate::entities::{categories, prelude::Categories};
use crate::errors::{AppError, AppResult};
use crate::models::{Category, ContentDomain, RemoteCategory};

/// Result of merging a remote category list into the cache.
#[derive(Debug, Clone, Default)]
pub struct CategorySync {
    /// Categories listed by the provider this run, in provider order
    pub present: Vec<Category>,
    pub added: u64,
    pub renamed: u64,
    /// Cached categories missing from the list but still inside their grace period
    pub missing: Vec<Category>,
    /// Cached categories missing for longer than the grace period; not yet deleted
    pub expired: Vec<Category>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CategoryRepository;

impl CategoryRepository {
    fn bookkeeping() -> Bookkeeping<Categories> {
        Bookkeeping {
            id: categories::Column::Id,
            missing_runs: categories::Column::MissingRuns,
            last_seen_at: categories::Column::LastSeenAt,
        }
    }

    pub async fn list<C: ConnectionTrait>(
        &self,
        db: &C,
        domain: ContentDomain,
    ) -> AppResult<Vec<Category>> {
        let models = Categories::find()
            .filter(categories::Column::Domain.eq(domain.as_ref()))
            .order_by_asc(categories::Column::Name)
            .all(db)
            .await?;
        Ok(models.into_iter().map(Self::model_to_domain).collect())
    }

    /// Merge the provider's category list.
    ///
    /// New categories get `new_visible`. Known ones keep their flag and only pick up a new
    /// name. Unlisted ones take a strike; those past `grace_runs` strikes are returned as
    /// expired for the caller to purge together with their items.
    pub async fn merge_remote(
        &self,
        txn: &DatabaseTransaction,
        domain: ContentDomain,
        remote: &[RemoteCategory],
        new_visible: bool,
        grace_runs: u32,
        now: DateTime<Utc>,
    ) -> AppResult<CategorySync> {
        let mut cached: HashMap<String, categories::Model> = Categories::find()
            .filter(categories::Column::Domain.eq(domain.as_ref()))
            .all(txn)
            .await?
            .into_iter()
            .map(|m| (m.remote_id.clone(), m))
            .collect();

        let mut sync = CategorySync::default();
        let mut seen = HashSet::new();
        let mut touched = Vec::new();

        for category in remote {
            if !seen.insert(category.remote_id.clone()) {
                debug!(
                    "Ignoring duplicate {} category {}",
                    domain, category.remote_id
                );
                continue;
            }

            match cached.remove(&category.remote_id) {
                Some(model) if model.name != category.name => {
                    let updated = categories::ActiveModel {
                        id: Set(model.id),
                        name: Set(category.name.clone()),
                        missing_runs: Set(0),
                        last_seen_at: Set(now),
                        updated_at: Set(now),
                        ..Default::default()
                    }
                    .update(txn)
                    .await?;
                    sync.renamed += 1;
                    sync.present.push(Self::model_to_domain(updated));
                }
                Some(mut model) => {
                    touched.push(model.id);
                    model.missing_runs = 0;
                    model.last_seen_at = now;
                    sync.present.push(Self::model_to_domain(model));
                }
                None => {
                    let inserted = categories::ActiveModel {
                        id: NotSet,
                        domain: Set(domain.to_string()),
                        remote_id: Set(category.remote_id.clone()),
                        name: Set(category.name.clone()),
                        visible: Set(new_visible),
                        missing_runs: Set(0),
                        last_seen_at: Set(now),
                        created_at: Set(now),
                        updated_at: Set(now),
                    }
                    .insert(txn)
                    .await?;
                    sync.added += 1;
                    sync.present.push(Self::model_to_domain(inserted));
                }
            }
        }

        Self::bookkeeping().touch(txn, &touched, now).await?;

        // Whatever is left was not listed this run
        let mut leftover: Vec<categories::Model> = cached.into_values().collect();
        leftover.sort_by_key(|m| m.id);
        let strike_ids: Vec<i32> = leftover.iter().map(|m| m.id).collect();
        Self::bookkeeping().mark_stale(txn, &strike_ids).await?;

        for mut model in leftover {
            model.missing_runs += 1;
            let category = Self::model_to_domain(model);
            if i64::from(category.missing_runs) > i64::from(grace_runs) {
                sync.expired.push(category);
            } else {
                sync.missing.push(category);
            }
        }

        Ok(sync)
    }

    pub async fn delete(&self, txn: &DatabaseTransaction, ids: &[i32]) -> AppResult<u64> {
        Self::bookkeeping().delete(txn, ids).await
    }

    pub async fn set_visibility<C: ConnectionTrait>(
        &self,
        db: &C,
        domain: ContentDomain,
        remote_id: &str,
        visible: bool,
    ) -> AppResult<Category> {
        let model = Categories::find()
            .filter(categories::Column::Domain.eq(domain.as_ref()))
            .filter(categories::Column::RemoteId.eq(remote_id))
            .one(db)
            .await?
            .ok_or_else(|| AppError::not_found(format!("{domain} category"), remote_id))?;

        if model.visible == visible {
            return Ok(Self::model_to_domain(model));
        }

        let updated = categories::ActiveModel {
            id: Set(model.id),
            visible: Set(visible),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .update(db)
        .await?;
        Ok(Self::model_to_domain(updated))
    }

    pub async fn count<C: ConnectionTrait>(
        &self,
        db: &C,
        domain: ContentDomain,
        visible_only: bool,
    ) -> AppResult<u64> {
        let mut query = Categories::find().filter(categories::Column::Domain.eq(domain.as_ref()));
        if visible_only {
            query = query.filter(categories::Column::Visible.eq(true));
        }
        Ok(query.count(db).await?)
    }

    /// Ids of the domain's hidden categories
    pub async fn hidden_ids(
        &self,
        txn: &DatabaseTransaction,
        domain: ContentDomain,
    ) -> AppResult<Vec<i32>> {
        let models = Categories::find()
            .filter(categories::Column::Domain.eq(domain.as_ref()))
            .filter(categories::Column::Visible.eq(false))
            .all(txn)
            .await?;
        Ok(models.into_iter().map(|m| m.id).collect())
    }

    /// Reset strike counters, used when a cache is cleared.
    pub async fn reset_missing_runs<C: ConnectionTrait>(
        &self,
        db: &C,
        domain: ContentDomain,
    ) -> AppResult<()> {
        Categories::update_many()
            .col_expr(categories::Column::MissingRuns, Expr::value(0))
            .filter(categories::Column::Domain.eq(domain.as_ref()))
            .exec(db)
            .await?;
        Ok(())
    }

    fn model_to_domain(model: categories::Model) -> Category {
        Category {
            id: model.id,
            domain: ContentDomain::from_db(&model.domain),
            remote_id: model.remote_id,
            name: model.name,
            visible: model.visible,
            missing_runs: model.missing_runs,
            last_seen_at: model.last_seen_at,
        }
    }
}
