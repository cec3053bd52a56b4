//! List filtering, sorting and pagination over a student's embedded array
//!
//! Both paging styles seen by clients are accepted: `skip`/`limit` and
//! `page`/`page_size` (1-indexed). When `page` is present it wins.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::{ServiceError, ServiceResult};
use crate::model::{Entity, EntityStatus, SortValue};

/// Default number of items per page
pub const DEFAULT_LIMIT: u64 = 10;

/// Upper bound for `limit` / `page_size`
pub const MAX_LIMIT: u64 = 100;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Query parameters for list endpoints
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    /// Equality filter on status
    pub status: Option<EntityStatus>,
    /// Inclusive lower bound on amount
    pub min_amount: Option<f64>,
    /// Inclusive upper bound on amount
    pub max_amount: Option<f64>,
    /// Inclusive lower bound on the entity's primary date
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on the entity's primary date
    pub to: Option<DateTime<Utc>>,
    /// Field to sort by (insertion order when absent)
    pub sort: Option<String>,
    /// Sort direction: "asc" or "desc"
    #[serde(default)]
    pub order: SortOrder,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    /// Page number (1-indexed)
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

/// Paginated list response
#[derive(Debug, Serialize)]
pub struct ListPage<E> {
    pub student_id: String,
    /// Number of items matching the filters, before paging
    pub total: usize,
    pub skip: u64,
    pub limit: u64,
    pub items: Vec<E>,
}

impl ListParams {
    /// Resolve `(skip, limit)` from either paging style
    pub fn window(&self) -> (u64, u64) {
        match self.page {
            Some(page) => {
                let page_size = self.page_size.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
                let page = page.max(1);
                ((page - 1).saturating_mul(page_size), page_size)
            }
            None => (
                self.skip.unwrap_or(0),
                self.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT),
            ),
        }
    }

    fn validate<E: Entity>(&self) -> ServiceResult<()> {
        if let (Some(min), Some(max)) = (self.min_amount, self.max_amount) {
            if min > max {
                return Err(ServiceError::BadRequest(format!(
                    "min_amount ({}) is greater than max_amount ({})",
                    min, max
                )));
            }
        }
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(ServiceError::BadRequest(
                    "'from' date is after 'to' date".to_string(),
                ));
            }
        }
        if let Some(field) = &self.sort {
            if !E::SORT_FIELDS.contains(&field.as_str()) {
                return Err(ServiceError::BadRequest(format!(
                    "Cannot sort {} by '{}' (allowed: {})",
                    E::KIND,
                    field,
                    E::SORT_FIELDS.join(", ")
                )));
            }
        }
        Ok(())
    }

    fn matches<E: Entity>(&self, entity: &E) -> bool {
        if let Some(status) = self.status {
            if entity.status() != status {
                return false;
            }
        }
        if let Some(min) = self.min_amount {
            if entity.amount() < min {
                return false;
            }
        }
        if let Some(max) = self.max_amount {
            if entity.amount() > max {
                return false;
            }
        }
        if self.from.is_some() || self.to.is_some() {
            let Some(date) = entity.primary_date() else {
                return false;
            };
            if self.from.is_some_and(|from| date < from) || self.to.is_some_and(|to| date > to) {
                return false;
            }
        }
        true
    }

    /// Filter, sort and page a student's entities
    pub fn apply<E: Entity>(&self, student_id: &str, items: Vec<E>) -> ServiceResult<ListPage<E>> {
        self.validate::<E>()?;

        let mut matching: Vec<E> = items.into_iter().filter(|e| self.matches(e)).collect();

        if let Some(field) = &self.sort {
            // Stable sort keeps insertion order among equal keys
            matching.sort_by(|a, b| {
                let left = a.sort_value(field).unwrap_or(SortValue::Missing);
                let right = b.sort_value(field).unwrap_or(SortValue::Missing);
                let ord = left.compare(&right);
                match self.order {
                    SortOrder::Asc => ord,
                    SortOrder::Desc => ord.reverse(),
                }
            });
        }

        let total = matching.len();
        let (skip, limit) = self.window();
        let items = matching
            .into_iter()
            .skip(usize::try_from(skip).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .collect();

        Ok(ListPage {
            student_id: student_id.to_string(),
            total,
            skip,
            limit,
            items,
        })
    }
}
