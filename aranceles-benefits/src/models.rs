//! Benefit and benefit payment records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use aranceles_common::api::{ServiceError, ServiceResult};
use aranceles_common::model::{
    validate_amount, validate_id, validate_positive_amount, Nested, SortValue,
};
use aranceles_common::{Entity, EntityPatch, EntityStatus};

/// A scholarship or aid benefit granted to a student
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Benefit {
    pub benefit_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub amount: f64,
    /// financial, academic, housing, ...
    #[serde(default)]
    pub category: Option<String>,
    pub start_date: DateTime<Utc>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub max_recipients: Option<u32>,
    #[serde(default)]
    pub current_recipients: u32,
    #[serde(default)]
    pub status: EntityStatus,
    /// Payments disbursed through this benefit, in registration order
    #[serde(default)]
    pub payments: Vec<BenefitPayment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// POST body for a benefit
#[derive(Debug, Deserialize)]
pub struct BenefitDraft {
    pub benefit_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub amount: f64,
    #[serde(default)]
    pub category: Option<String>,
    /// Defaults to the creation time
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub max_recipients: Option<u32>,
    #[serde(default)]
    pub current_recipients: u32,
}

/// PUT body for a benefit
#[derive(Debug, Default, Deserialize)]
pub struct BenefitPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub amount: Option<f64>,
    pub category: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub max_recipients: Option<u32>,
    pub current_recipients: Option<u32>,
    pub status: Option<EntityStatus>,
}

impl EntityPatch for BenefitPatch {
    fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.amount.is_none()
            && self.category.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
            && self.max_recipients.is_none()
            && self.current_recipients.is_none()
            && self.status.is_none()
    }
}

impl Benefit {
    fn validate(&self) -> ServiceResult<()> {
        validate_id("benefit_id", &self.benefit_id)?;
        validate_amount(self.amount)?;
        if self.name.trim().is_empty() {
            return Err(ServiceError::BadRequest("name must not be empty".to_string()));
        }
        if let Some(end) = self.end_date {
            if end < self.start_date {
                return Err(ServiceError::BadRequest(
                    "end_date must not precede start_date".to_string(),
                ));
            }
        }
        if let Some(max) = self.max_recipients {
            if self.current_recipients > max {
                return Err(ServiceError::BadRequest(format!(
                    "current_recipients ({}) exceeds max_recipients ({})",
                    self.current_recipients, max
                )));
            }
        }
        Ok(())
    }

    pub fn find_payment(&self, payment_id: &str) -> Option<&BenefitPayment> {
        self.payments.iter().find(|p| p.payment_id == payment_id)
    }
}

impl Nested<BenefitPayment> for Benefit {
    const CHILDREN: &'static str = "payments";

    fn children(&self) -> &[BenefitPayment] {
        &self.payments
    }

    fn children_mut(&mut self) -> &mut Vec<BenefitPayment> {
        &mut self.payments
    }
}

impl Entity for Benefit {
    type Draft = BenefitDraft;
    type Patch = BenefitPatch;

    const KIND: &'static str = "benefits";
    const ID_FIELD: &'static str = "benefit_id";
    const LABEL: &'static str = "Benefit";
    const SORT_FIELDS: &'static [&'static str] = &[
        "benefit_id",
        "name",
        "amount",
        "start_date",
        "end_date",
        "status",
        "created_at",
        "updated_at",
    ];

    fn id(&self) -> &str {
        &self.benefit_id
    }

    fn status(&self) -> EntityStatus {
        self.status
    }

    fn set_status(&mut self, status: EntityStatus) {
        self.status = status;
    }

    fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }

    fn amount(&self) -> f64 {
        self.amount
    }

    fn primary_date(&self) -> Option<DateTime<Utc>> {
        Some(self.start_date)
    }

    fn sort_value(&self, field: &str) -> Option<SortValue> {
        let value: SortValue = match field {
            "benefit_id" => self.benefit_id.as_str().into(),
            "name" => self.name.as_str().into(),
            "amount" => self.amount.into(),
            "start_date" => self.start_date.into(),
            "end_date" => self.end_date.into(),
            "status" => self.status.as_str().into(),
            "created_at" => self.created_at.into(),
            "updated_at" => self.updated_at.into(),
            _ => return None,
        };
        Some(value)
    }

    fn from_draft(draft: BenefitDraft, now: DateTime<Utc>) -> ServiceResult<Self> {
        let benefit = Benefit {
            benefit_id: draft.benefit_id,
            name: draft.name,
            description: draft.description,
            amount: draft.amount,
            category: draft.category,
            start_date: draft.start_date.unwrap_or(now),
            end_date: draft.end_date,
            max_recipients: draft.max_recipients,
            current_recipients: draft.current_recipients,
            status: EntityStatus::Active,
            payments: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        benefit.validate()?;
        Ok(benefit)
    }

    fn apply_patch(&mut self, patch: BenefitPatch) -> ServiceResult<()> {
        let mut next = self.clone();
        if let Some(name) = patch.name {
            next.name = name;
        }
        if let Some(description) = patch.description {
            next.description = description;
        }
        if let Some(amount) = patch.amount {
            next.amount = amount;
        }
        if let Some(category) = patch.category {
            next.category = Some(category);
        }
        if let Some(start_date) = patch.start_date {
            next.start_date = start_date;
        }
        if let Some(end_date) = patch.end_date {
            next.end_date = Some(end_date);
        }
        if let Some(max) = patch.max_recipients {
            next.max_recipients = Some(max);
        }
        if let Some(current) = patch.current_recipients {
            next.current_recipients = current;
        }
        if let Some(status) = patch.status {
            next.status = status;
        }
        next.validate()?;
        *self = next;
        Ok(())
    }
}

/// A payment disbursed through a benefit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenefitPayment {
    pub payment_id: String,
    pub amount: f64,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: EntityStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// POST body for a benefit payment
#[derive(Debug, Deserialize)]
pub struct BenefitPaymentDraft {
    pub payment_id: String,
    /// Defaults to the benefit's amount
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub description: Option<String>,
}

/// PUT body for a benefit payment
#[derive(Debug, Default, Deserialize)]
pub struct BenefitPaymentPatch {
    pub amount: Option<f64>,
    pub date: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub status: Option<EntityStatus>,
}

impl EntityPatch for BenefitPaymentPatch {
    fn is_empty(&self) -> bool {
        self.amount.is_none()
            && self.date.is_none()
            && self.description.is_none()
            && self.status.is_none()
    }
}

impl Entity for BenefitPayment {
    type Draft = BenefitPaymentDraft;
    type Patch = BenefitPaymentPatch;

    const KIND: &'static str = "payments";
    const ID_FIELD: &'static str = "payment_id";
    const LABEL: &'static str = "Payment";
    // Nested payments list in registration order
    const SORT_FIELDS: &'static [&'static str] = &[];

    fn id(&self) -> &str {
        &self.payment_id
    }

    fn status(&self) -> EntityStatus {
        self.status
    }

    fn set_status(&mut self, status: EntityStatus) {
        self.status = status;
    }

    fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }

    fn amount(&self) -> f64 {
        self.amount
    }

    fn primary_date(&self) -> Option<DateTime<Utc>> {
        Some(self.date)
    }

    fn sort_value(&self, _field: &str) -> Option<SortValue> {
        None
    }

    fn from_draft(draft: BenefitPaymentDraft, now: DateTime<Utc>) -> ServiceResult<Self> {
        validate_id("payment_id", &draft.payment_id)?;
        let amount = draft
            .amount
            .ok_or_else(|| ServiceError::BadRequest("amount is required".to_string()))?;
        validate_positive_amount(amount)?;

        Ok(BenefitPayment {
            payment_id: draft.payment_id,
            amount,
            date: draft.date.unwrap_or(now),
            description: draft.description,
            status: EntityStatus::Active,
            created_at: now,
            updated_at: now,
        })
    }

    fn apply_patch(&mut self, patch: BenefitPaymentPatch) -> ServiceResult<()> {
        if let Some(amount) = patch.amount {
            validate_positive_amount(amount)?;
            self.amount = amount;
        }
        if let Some(date) = patch.date {
            self.date = date;
        }
        if let Some(description) = patch.description {
            self.description = Some(description);
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        Ok(())
    }
}
