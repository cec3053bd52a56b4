//! Payment records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use aranceles_common::api::ServiceResult;
use aranceles_common::model::{validate_id, validate_month, validate_positive_amount, SortValue};
use aranceles_common::{Entity, EntityPatch, EntityStatus};

/// What a payment settles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    Arancel,
    Matricula,
    /// Disbursed through a benefit
    Beneficio,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Arancel => "arancel",
            PaymentType::Matricula => "matricula",
            PaymentType::Beneficio => "beneficio",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub payment_id: String,
    /// Debt (or enrollment, for `matricula`) this payment settles
    #[serde(default)]
    pub debt_id: Option<String>,
    #[serde(rename = "type")]
    pub payment_type: PaymentType,
    pub amount: f64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub month: Option<u32>,
    #[serde(default)]
    pub semester: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub status: EntityStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentDraft {
    pub payment_id: String,
    #[serde(default)]
    pub debt_id: Option<String>,
    #[serde(rename = "type")]
    pub payment_type: PaymentType,
    pub amount: f64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub month: Option<u32>,
    #[serde(default)]
    pub semester: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PaymentPatch {
    pub debt_id: Option<String>,
    pub amount: Option<f64>,
    pub description: Option<String>,
    pub month: Option<u32>,
    pub semester: Option<String>,
    pub year: Option<i32>,
    pub date: Option<DateTime<Utc>>,
    pub status: Option<EntityStatus>,
}

impl EntityPatch for PaymentPatch {
    fn is_empty(&self) -> bool {
        self.debt_id.is_none()
            && self.amount.is_none()
            && self.description.is_none()
            && self.month.is_none()
            && self.semester.is_none()
            && self.year.is_none()
            && self.date.is_none()
            && self.status.is_none()
    }
}

impl Payment {
    fn validate(&self) -> ServiceResult<()> {
        validate_id("payment_id", &self.payment_id)?;
        if let Some(debt_id) = &self.debt_id {
            validate_id("debt_id", debt_id)?;
        }
        validate_positive_amount(self.amount)?;
        validate_month(self.month)
    }
}

impl Entity for Payment {
    type Draft = PaymentDraft;
    type Patch = PaymentPatch;

    const KIND: &'static str = "payments";
    const ID_FIELD: &'static str = "payment_id";
    const LABEL: &'static str = "Payment";
    const SORT_FIELDS: &'static [&'static str] = &[
        "payment_id",
        "debt_id",
        "amount",
        "date",
        "year",
        "month",
        "status",
        "created_at",
        "updated_at",
    ];

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

    fn sort_value(&self, field: &str) -> Option<SortValue> {
        let value: SortValue = match field {
            "payment_id" => self.payment_id.as_str().into(),
            "debt_id" => self.debt_id.as_deref().into(),
            "amount" => self.amount.into(),
            "date" => self.date.into(),
            "year" => self.year.map(f64::from).into(),
            "month" => self.month.map(f64::from).into(),
            "status" => self.status.as_str().into(),
            "created_at" => self.created_at.into(),
            "updated_at" => self.updated_at.into(),
            _ => return None,
        };
        Some(value)
    }

    fn from_draft(draft: PaymentDraft, now: DateTime<Utc>) -> ServiceResult<Self> {
        let payment = Payment {
            payment_id: draft.payment_id,
            debt_id: draft.debt_id,
            payment_type: draft.payment_type,
            amount: draft.amount,
            description: draft.description,
            month: draft.month,
            semester: draft.semester,
            year: draft.year,
            date: draft.date.unwrap_or(now),
            status: EntityStatus::Active,
            created_at: now,
            updated_at: now,
        };
        payment.validate()?;
        Ok(payment)
    }

    fn apply_patch(&mut self, patch: PaymentPatch) -> ServiceResult<()> {
        let mut next = self.clone();
        if let Some(debt_id) = patch.debt_id {
            next.debt_id = Some(debt_id);
        }
        if let Some(amount) = patch.amount {
            next.amount = amount;
        }
        if let Some(description) = patch.description {
            next.description = Some(description);
        }
        if let Some(month) = patch.month {
            next.month = Some(month);
        }
        if let Some(semester) = patch.semester {
            next.semester = Some(semester);
        }
        if let Some(year) = patch.year {
            next.year = Some(year);
        }
        if let Some(date) = patch.date {
            next.date = date;
        }
        if let Some(status) = patch.status {
            next.status = status;
        }
        next.validate()?;
        *self = next;
        Ok(())
    }
}
