//! Debt and enrollment records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use aranceles_common::api::ServiceResult;
use aranceles_common::model::{validate_amount, validate_id, validate_month, SortValue};
use aranceles_common::{Entity, EntityPatch, EntityStatus};

/// Kind of charge a debt represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebtType {
    /// Monthly tuition fee
    Arancel,
    /// Enrollment fee
    Matricula,
}

/// An amount a student owes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Debt {
    pub debt_id: String,
    #[serde(rename = "type")]
    pub debt_type: DebtType,
    pub amount: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub month: Option<u32>,
    #[serde(default)]
    pub semester: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub paid: bool,
    #[serde(default)]
    pub status: EntityStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct DebtDraft {
    pub debt_id: String,
    #[serde(rename = "type")]
    pub debt_type: DebtType,
    pub amount: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub month: Option<u32>,
    #[serde(default)]
    pub semester: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub paid: bool,
}

/// Sparse debt update
///
/// `type` is fixed at creation. Settlement events from the payments
/// service carry `type`, `payment_id` and `debt_id` next to `paid`; those
/// extra fields are ignored here.
#[derive(Debug, Default, Deserialize)]
pub struct DebtPatch {
    pub amount: Option<f64>,
    pub description: Option<String>,
    pub month: Option<u32>,
    pub semester: Option<String>,
    pub year: Option<i32>,
    pub due_date: Option<DateTime<Utc>>,
    pub paid: Option<bool>,
    pub status: Option<EntityStatus>,
}

impl EntityPatch for DebtPatch {
    fn is_empty(&self) -> bool {
        self.amount.is_none()
            && self.description.is_none()
            && self.month.is_none()
            && self.semester.is_none()
            && self.year.is_none()
            && self.due_date.is_none()
            && self.paid.is_none()
            && self.status.is_none()
    }
}

impl Debt {
    fn validate(&self) -> ServiceResult<()> {
        validate_id("debt_id", &self.debt_id)?;
        validate_amount(self.amount)?;
        validate_month(self.month)
    }
}

impl Entity for Debt {
    type Draft = DebtDraft;
    type Patch = DebtPatch;

    const KIND: &'static str = "debts";
    const ID_FIELD: &'static str = "debt_id";
    const LABEL: &'static str = "Debt";
    const SORT_FIELDS: &'static [&'static str] = &[
        "debt_id",
        "amount",
        "year",
        "month",
        "due_date",
        "paid",
        "status",
        "created_at",
        "updated_at",
    ];

    fn id(&self) -> &str {
        &self.debt_id
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
        Some(self.created_at)
    }

    fn sort_value(&self, field: &str) -> Option<SortValue> {
        let value: SortValue = match field {
            "debt_id" => self.debt_id.as_str().into(),
            "amount" => self.amount.into(),
            "year" => self.year.map(f64::from).into(),
            "month" => self.month.map(f64::from).into(),
            "due_date" => self.due_date.into(),
            "paid" => self.paid.into(),
            "status" => self.status.as_str().into(),
            "created_at" => self.created_at.into(),
            "updated_at" => self.updated_at.into(),
            _ => return None,
        };
        Some(value)
    }

    fn from_draft(draft: DebtDraft, now: DateTime<Utc>) -> ServiceResult<Self> {
        let debt = Debt {
            debt_id: draft.debt_id,
            debt_type: draft.debt_type,
            amount: draft.amount,
            description: draft.description,
            month: draft.month,
            semester: draft.semester,
            year: draft.year,
            due_date: draft.due_date,
            paid: draft.paid,
            status: EntityStatus::Active,
            created_at: now,
            updated_at: now,
        };
        debt.validate()?;
        Ok(debt)
    }

    fn apply_patch(&mut self, patch: DebtPatch) -> ServiceResult<()> {
        let mut next = self.clone();
        if let Some(amount) = patch.amount {
            next.amount = amount;
        }
        if let Some(description) = patch.description {
            next.description = description;
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
        if let Some(due_date) = patch.due_date {
            next.due_date = Some(due_date);
        }
        if let Some(paid) = patch.paid {
            next.paid = paid;
        }
        if let Some(status) = patch.status {
            next.status = status;
        }
        next.validate()?;
        *self = next;
        Ok(())
    }
}

/// A semester enrollment and whether its fee has been paid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    pub enrollment_id: String,
    pub semester: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub paid: bool,
    #[serde(default)]
    pub status: EntityStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct EnrollmentDraft {
    pub enrollment_id: String,
    pub semester: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub paid: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct EnrollmentPatch {
    pub semester: Option<String>,
    pub year: Option<i32>,
    pub amount: Option<f64>,
    pub paid: Option<bool>,
    pub status: Option<EntityStatus>,
}

impl EntityPatch for EnrollmentPatch {
    fn is_empty(&self) -> bool {
        self.semester.is_none()
            && self.year.is_none()
            && self.amount.is_none()
            && self.paid.is_none()
            && self.status.is_none()
    }
}

impl Entity for Enrollment {
    type Draft = EnrollmentDraft;
    type Patch = EnrollmentPatch;

    const KIND: &'static str = "enrollments";
    const ID_FIELD: &'static str = "enrollment_id";
    const LABEL: &'static str = "Enrollment";
    const SORT_FIELDS: &'static [&'static str] = &[
        "enrollment_id",
        "semester",
        "year",
        "amount",
        "paid",
        "status",
        "created_at",
        "updated_at",
    ];

    fn id(&self) -> &str {
        &self.enrollment_id
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
        Some(self.created_at)
    }

    fn sort_value(&self, field: &str) -> Option<SortValue> {
        let value: SortValue = match field {
            "enrollment_id" => self.enrollment_id.as_str().into(),
            "semester" => self.semester.as_str().into(),
            "year" => self.year.map(f64::from).into(),
            "amount" => self.amount.into(),
            "paid" => self.paid.into(),
            "status" => self.status.as_str().into(),
            "created_at" => self.created_at.into(),
            "updated_at" => self.updated_at.into(),
            _ => return None,
        };
        Some(value)
    }

    fn from_draft(draft: EnrollmentDraft, now: DateTime<Utc>) -> ServiceResult<Self> {
        validate_id("enrollment_id", &draft.enrollment_id)?;
        validate_amount(draft.amount)?;
        Ok(Enrollment {
            enrollment_id: draft.enrollment_id,
            semester: draft.semester,
            year: draft.year,
            amount: draft.amount,
            paid: draft.paid,
            status: EntityStatus::Active,
            created_at: now,
            updated_at: now,
        })
    }

    fn apply_patch(&mut self, patch: EnrollmentPatch) -> ServiceResult<()> {
        if let Some(amount) = patch.amount {
            validate_amount(amount)?;
            self.amount = amount;
        }
        if let Some(semester) = patch.semester {
            self.semester = semester;
        }
        if let Some(year) = patch.year {
            self.year = Some(year);
        }
        if let Some(paid) = patch.paid {
            self.paid = paid;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        Ok(())
    }
}
