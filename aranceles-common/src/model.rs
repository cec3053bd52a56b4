//! Entity model shared by every service
//!
//! A service stores one document per student holding an embedded array of
//! child entities (`benefits`, `debts`, `enrollments`, `payments`). The
//! [`Entity`] trait describes one such child: how it is named on the wire,
//! how it is created from a request payload and how a sparse patch merges
//! into it. Store, query, service and sync code is written once against
//! this trait.

use std::cmp::Ordering;
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::api::{ServiceError, ServiceResult};

/// Lifecycle status of a child entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EntityStatus {
    #[default]
    Active,
    /// Soft-deleted. Older producers spell it `inactived`.
    #[serde(alias = "inactived")]
    Inactive,
    Expired,
}

impl EntityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityStatus::Active => "active",
            EntityStatus::Inactive => "inactive",
            EntityStatus::Expired => "expired",
        }
    }
}

/// Sparse update payload: every field optional, only `Some` fields applied
pub trait EntityPatch: DeserializeOwned + Debug + Send + 'static {
    /// True when no field is set (rejected as BadRequest)
    fn is_empty(&self) -> bool;
}

/// A child entity embedded in a student document
pub trait Entity:
    Serialize + DeserializeOwned + Clone + Debug + Send + Sync + Unpin + 'static
{
    /// Creation payload accepted on POST and on remote `created` events
    type Draft: DeserializeOwned + Debug + Send + 'static;

    /// Sparse patch accepted on PUT and on remote `updated` events
    type Patch: EntityPatch;

    /// Collection / array / routing-key name, e.g. `debts`
    const KIND: &'static str;

    /// Name of the business id field, e.g. `debt_id`
    const ID_FIELD: &'static str;

    /// Human readable singular used in error details, e.g. `Debt`
    const LABEL: &'static str;

    /// Field names accepted by `sort=`
    const SORT_FIELDS: &'static [&'static str];

    fn id(&self) -> &str;

    fn status(&self) -> EntityStatus;

    fn set_status(&mut self, status: EntityStatus);

    fn set_updated_at(&mut self, at: DateTime<Utc>);

    fn amount(&self) -> f64;

    /// Date used by the `from` / `to` list filters
    fn primary_date(&self) -> Option<DateTime<Utc>>;

    /// Value of a sortable field, `None` for names outside [`Entity::SORT_FIELDS`]
    fn sort_value(&self, field: &str) -> Option<SortValue>;

    /// Build a validated entity from its creation payload
    fn from_draft(draft: Self::Draft, now: DateTime<Utc>) -> ServiceResult<Self>;

    /// Merge a non-empty patch, validating the resulting field set
    fn apply_patch(&mut self, patch: Self::Patch) -> ServiceResult<()>;
}

/// An entity that embeds an array of child entities of kind `C`
///
/// Children are written through [`crate::store::ChildStore`], which
/// touches only the addressed child so concurrent writers on sibling
/// children do not overwrite each other.
pub trait Nested<C: Entity>: Entity {
    /// Field holding the children inside the parent, e.g. `payments`
    const CHILDREN: &'static str;

    fn children(&self) -> &[C];

    fn children_mut(&mut self) -> &mut Vec<C>;
}

/// Comparable projection of an entity field for list sorting
#[derive(Debug, Clone, PartialEq)]
pub enum SortValue {
    Missing,
    Flag(bool),
    Number(f64),
    Time(DateTime<Utc>),
    Text(String),
}

impl SortValue {
    fn rank(&self) -> u8 {
        match self {
            SortValue::Missing => 0,
            SortValue::Flag(_) => 1,
            SortValue::Number(_) => 2,
            SortValue::Time(_) => 3,
            SortValue::Text(_) => 4,
        }
    }

    /// Total order; missing values sort first
    pub fn compare(&self, other: &SortValue) -> Ordering {
        match (self, other) {
            (SortValue::Flag(a), SortValue::Flag(b)) => a.cmp(b),
            (SortValue::Number(a), SortValue::Number(b)) => a.total_cmp(b),
            (SortValue::Time(a), SortValue::Time(b)) => a.cmp(b),
            (SortValue::Text(a), SortValue::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl From<&str> for SortValue {
    fn from(value: &str) -> Self {
        SortValue::Text(value.to_string())
    }
}

impl From<f64> for SortValue {
    fn from(value: f64) -> Self {
        SortValue::Number(value)
    }
}

impl From<bool> for SortValue {
    fn from(value: bool) -> Self {
        SortValue::Flag(value)
    }
}

impl From<DateTime<Utc>> for SortValue {
    fn from(value: DateTime<Utc>) -> Self {
        SortValue::Time(value)
    }
}

impl<T: Into<SortValue>> From<Option<T>> for SortValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SortValue::Missing)
    }
}

/// Validate a caller-supplied identifier
///
/// Ids become the middle segment of a routing key, so they must be
/// non-empty and free of `.`, `*`, `>` and whitespace.
pub fn validate_id(field: &str, id: &str) -> ServiceResult<()> {
    if id.is_empty() {
        return Err(ServiceError::BadRequest(format!("{} must not be empty", field)));
    }
    if id
        .chars()
        .any(|c| c == '.' || c == '*' || c == '>' || c.is_whitespace())
    {
        return Err(ServiceError::BadRequest(format!(
            "{} '{}' contains a reserved character",
            field, id
        )));
    }
    Ok(())
}

/// Validate a monetary amount (finite and not negative)
pub fn validate_amount(amount: f64) -> ServiceResult<()> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(ServiceError::BadRequest(format!(
            "amount must be a non-negative number, got {}",
            amount
        )));
    }
    Ok(())
}

/// Validate an amount that must be strictly positive (payments)
pub fn validate_positive_amount(amount: f64) -> ServiceResult<()> {
    validate_amount(amount)?;
    if amount == 0.0 {
        return Err(ServiceError::BadRequest(
            "amount must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// Validate an optional calendar month (1..=12)
pub fn validate_month(month: Option<u32>) -> ServiceResult<()> {
    match month {
        Some(m) if !(1..=12).contains(&m) => Err(ServiceError::BadRequest(format!(
            "month must be between 1 and 12, got {}",
            m
        ))),
        _ => Ok(()),
    }
}
