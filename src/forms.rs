//! Declared schemas of every form the service accepts.
//!
//! Each form is the raw submission as the client sent it: strings stay strings
//! until `clean()` has checked the declared rules and converted them into the
//! typed data the storage layer writes.

use chrono::{NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::{Validate, ValidateEmail, ValidationError};

use crate::models::{ClassOfEntry, DocumentType, PaymentForm};
use crate::validation::{FieldErrors, NON_FIELD_ERRORS, SubmissionErrors, add_error, validate_form};

const DATE_FORMAT: &str = "%Y-%m-%d";
const INVALID_VALUE: &str = "Введите правильное значение.";
const INVALID_BLOCK: &str = "Некорректные данные формы.";

fn required(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("required"));
    }
    Ok(())
}

fn optional_email(value: &str) -> Result<(), ValidationError> {
    let value = value.trim();
    if value.is_empty() || value.validate_email() {
        return Ok(());
    }
    Err(ValidationError::new("email"))
}

fn date(value: &str) -> Result<(), ValidationError> {
    let value = value.trim();
    if value.is_empty() || parse_date(value).is_some() {
        return Ok(());
    }
    Err(ValidationError::new("date"))
}

fn class_of_entry(value: &str) -> Result<(), ValidationError> {
    let value = value.trim();
    if value.is_empty() || ClassOfEntry::from_str(value).is_ok() {
        return Ok(());
    }
    Err(ValidationError::new("choice"))
}

fn document_type(value: &str) -> Result<(), ValidationError> {
    let value = value.trim();
    if value.is_empty() || DocumentType::from_str(value).is_ok() {
        return Ok(());
    }
    Err(ValidationError::new("choice"))
}

fn payment_form(value: &str) -> Result<(), ValidationError> {
    let value = value.trim();
    if value.is_empty() || PaymentForm::from_str(value).is_ok() {
        return Ok(());
    }
    Err(ValidationError::new("choice"))
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).ok()
}

fn trimmed(value: &str) -> String {
    value.trim().to_string()
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn text(value: &Option<String>) -> String {
    value.as_deref().map(trimmed).unwrap_or_default()
}

/// A form whose rules held but whose values still would not convert; only
/// reachable if a rule and its conversion drift apart.
fn unconvertible(mut errors: FieldErrors) -> FieldErrors {
    if errors.is_empty() {
        add_error(&mut errors, NON_FIELD_ERRORS, INVALID_BLOCK);
    }
    errors
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ApplicantForm {
    #[validate(custom(function = "required", message = "Обязательное поле."))]
    #[validate(length(max = 255, message = "Убедитесь, что это значение содержит не более 255 символов."))]
    pub fio: String,

    #[validate(custom(function = "required", message = "Обязательное поле."))]
    #[validate(custom(function = "date", message = "Введите правильную дату."))]
    pub date_of_birth: String,

    #[validate(custom(function = "required", message = "Обязательное поле."))]
    #[validate(custom(
        function = "class_of_entry",
        message = "Выберите корректный вариант. Этого варианта нет среди допустимых значений."
    ))]
    pub class_of_entry: String,

    pub specialty: Option<i64>,

    #[validate(length(max = 255, message = "Убедитесь, что это значение содержит не более 255 символов."))]
    pub hobby: String,

    #[validate(custom(function = "required", message = "Обязательное поле."))]
    #[validate(length(max = 20, message = "Убедитесь, что это значение содержит не более 20 символов."))]
    pub phone: String,

    #[validate(custom(function = "required", message = "Обязательное поле."))]
    #[validate(length(max = 255, message = "Убедитесь, что это значение содержит не более 255 символов."))]
    pub address: String,

    #[validate(custom(function = "required", message = "Обязательное поле."))]
    #[validate(custom(function = "optional_email", message = "Введите правильный адрес электронной почты."))]
    #[validate(length(max = 254, message = "Убедитесь, что это значение содержит не более 254 символов."))]
    pub email: String,

    pub is_guardianship: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApplicantData {
    pub fio: String,
    pub date_of_birth: NaiveDate,
    pub class_of_entry: ClassOfEntry,
    pub specialty_id: Option<i64>,
    pub hobby: String,
    pub phone: String,
    pub address: String,
    pub email: String,
    pub is_guardianship: bool,
}

impl ApplicantForm {
    pub fn clean(&self) -> Result<ApplicantData, FieldErrors> {
        let errors = validate_form(self);
        let date_of_birth = parse_date(&self.date_of_birth);
        let class_of_entry = ClassOfEntry::from_str(self.class_of_entry.trim()).ok();

        match (date_of_birth, class_of_entry) {
            (Some(date_of_birth), Some(class_of_entry)) if errors.is_empty() => Ok(ApplicantData {
                fio: trimmed(&self.fio),
                date_of_birth,
                class_of_entry,
                specialty_id: self.specialty,
                hobby: trimmed(&self.hobby),
                phone: trimmed(&self.phone),
                address: trimmed(&self.address),
                email: trimmed(&self.email),
                is_guardianship: self.is_guardianship,
            }),
            _ => Err(unconvertible(errors)),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ParentForm {
    #[validate(custom(function = "required", message = "Обязательное поле."))]
    #[validate(length(max = 255, message = "Убедитесь, что это значение содержит не более 255 символов."))]
    pub fio: String,

    #[validate(custom(function = "required", message = "Обязательное поле."))]
    #[validate(length(max = 20, message = "Убедитесь, что это значение содержит не более 20 символов."))]
    pub phone: String,

    #[validate(length(max = 255, message = "Убедитесь, что это значение содержит не более 255 символов."))]
    pub workplace: String,

    #[validate(length(max = 255, message = "Убедитесь, что это значение содержит не более 255 символов."))]
    pub address: String,

    #[validate(custom(function = "optional_email", message = "Введите правильный адрес электронной почты."))]
    pub email: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParentData {
    pub fio: String,
    pub workplace: Option<String>,
    pub phone: String,
    pub address: Option<String>,
    pub email: Option<String>,
}

impl ParentForm {
    /// A parent block counts only when it names someone or gives a phone.
    pub fn is_present(&self) -> bool {
        !self.fio.trim().is_empty() || !self.phone.trim().is_empty()
    }

    /// `Ok(None)` for an absent block, which is skipped without validation.
    pub fn clean(&self) -> Result<Option<ParentData>, FieldErrors> {
        if !self.is_present() {
            return Ok(None);
        }

        let errors = validate_form(self);
        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(Some(ParentData {
            fio: trimmed(&self.fio),
            workplace: non_empty(&self.workplace),
            phone: trimmed(&self.phone),
            address: non_empty(&self.address),
            email: non_empty(&self.email),
        }))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct HealthForm {
    pub diseases: Option<String>,
    pub disability: Option<bool>,
    pub restrictions: Option<String>,
    pub additional_info: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HealthData {
    pub diseases: String,
    pub disability: bool,
    pub restrictions: String,
    pub additional_info: String,
}

impl HealthForm {
    pub fn is_set(&self) -> bool {
        self.diseases.is_some()
            || self.disability.is_some()
            || self.restrictions.is_some()
            || self.additional_info.is_some()
    }

    /// `Ok(None)` when no field was submitted at all.
    pub fn clean(&self) -> Result<Option<HealthData>, FieldErrors> {
        if !self.is_set() {
            return Ok(None);
        }

        let errors = validate_form(self);
        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(Some(HealthData {
            diseases: text(&self.diseases),
            disability: self.disability.unwrap_or(false),
            restrictions: text(&self.restrictions),
            additional_info: text(&self.additional_info),
        }))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DocumentForm {
    pub id: Option<i64>,

    #[serde(rename = "type")]
    #[validate(custom(function = "required", message = "Обязательное поле."))]
    #[validate(custom(
        function = "document_type",
        message = "Выберите корректный вариант. Этого варианта нет среди допустимых значений."
    ))]
    pub doc_type: String,

    pub available: bool,

    pub scan: Option<String>,

    pub description: String,

    pub delete: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentData {
    pub doc_type: DocumentType,
    pub available: bool,
    pub scan: Option<String>,
    pub description: String,
}

impl DocumentForm {
    /// An untouched extra row of the document list.
    pub fn is_blank(&self) -> bool {
        self.id.is_none()
            && self.doc_type.trim().is_empty()
            && !self.available
            && self.scan.as_deref().map_or(true, |scan| scan.trim().is_empty())
            && self.description.trim().is_empty()
    }

    pub fn scan_key(&self) -> Option<String> {
        self.scan.as_deref().and_then(non_empty)
    }

    pub fn clean(&self) -> Result<DocumentData, FieldErrors> {
        let errors = validate_form(self);

        match DocumentType::from_str(self.doc_type.trim()) {
            Ok(doc_type) if errors.is_empty() => Ok(DocumentData {
                doc_type,
                available: self.available,
                scan: self.scan_key(),
                description: trimmed(&self.description),
            }),
            _ => Err(unconvertible(errors)),
        }
    }
}

/// One composite submission: the applicant and every dependent sub-form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicantSubmission {
    pub applicant: ApplicantForm,
    pub mother: ParentForm,
    pub father: ParentForm,
    pub health: HealthForm,
    pub documents: Vec<DocumentForm>,
}

impl ApplicantSubmission {
    /// Reads a body that failed to deserialize as a whole, pinning every
    /// ill-typed value on the sub-form and field it was sent for.
    pub fn from_json(raw: &str) -> Result<Self, SubmissionErrors> {
        let Ok(Value::Object(mut sections)) = serde_json::from_str::<Value>(raw) else {
            return Err(SubmissionErrors::non_field("Некорректный JSON."));
        };

        let mut errors = SubmissionErrors::default();
        let applicant = section(sections.remove("applicant"), &mut errors.applicant);
        let mother = section(sections.remove("mother"), &mut errors.mother);
        let father = section(sections.remove("father"), &mut errors.father);
        let health = section(sections.remove("health"), &mut errors.health);

        let documents = match sections.remove("documents") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .into_iter()
                .map(|item| {
                    let mut entry = FieldErrors::new();
                    let form = section(Some(item), &mut entry);
                    if let Some(messages) = entry.remove("type") {
                        entry.insert("doc_type".to_string(), messages);
                    }
                    errors.documents.push(entry);
                    form
                })
                .collect(),
            Some(_) => {
                let mut entry = FieldErrors::new();
                add_error(&mut entry, NON_FIELD_ERRORS, INVALID_BLOCK);
                errors.documents.push(entry);
                Vec::new()
            }
        };

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(Self {
            applicant,
            mother,
            father,
            health,
            documents,
        })
    }
}

/// Deserializes one sub-form, retrying field by field on failure to find
/// which values have the wrong type.
fn section<F: DeserializeOwned + Default>(value: Option<Value>, errors: &mut FieldErrors) -> F {
    let Some(value) = value.filter(|value| !value.is_null()) else {
        return F::default();
    };

    if let Ok(form) = serde_json::from_value::<F>(value.clone()) {
        return form;
    }

    if let Value::Object(fields) = value {
        for (name, field) in fields {
            let single = Value::Object(Map::from_iter([(name.clone(), field)]));
            if serde_json::from_value::<F>(single).is_err() {
                add_error(errors, &name, INVALID_VALUE);
            }
        }
    }
    if errors.is_empty() {
        add_error(errors, NON_FIELD_ERRORS, INVALID_BLOCK);
    }

    F::default()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ContractForm {
    #[validate(custom(function = "required", message = "Обязательное поле."))]
    #[validate(length(max = 50, message = "Убедитесь, что это значение содержит не более 50 символов."))]
    pub number: String,

    #[validate(custom(function = "date", message = "Введите правильную дату."))]
    pub date_of_conclusion: String,

    #[validate(custom(function = "required", message = "Обязательное поле."))]
    #[validate(custom(
        function = "payment_form",
        message = "Выберите корректный вариант. Этого варианта нет среди допустимых значений."
    ))]
    pub payment_form: String,

    pub maternity_capital: bool,

    pub credit: bool,

    #[validate(required(message = "Обязательное поле."))]
    pub applicant: Option<i64>,

    pub customer: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContractData {
    pub number: String,
    pub date_of_conclusion: NaiveDate,
    pub payment_form: PaymentForm,
    pub maternity_capital: bool,
    pub credit: bool,
    pub applicant_id: i64,
    pub customer_id: Option<i64>,
}

impl ContractForm {
    pub fn clean(&self) -> Result<ContractData, FieldErrors> {
        let errors = validate_form(self);

        let date_of_conclusion = if self.date_of_conclusion.trim().is_empty() {
            Some(Utc::now().date_naive())
        } else {
            parse_date(&self.date_of_conclusion)
        };
        let payment_form = PaymentForm::from_str(self.payment_form.trim()).ok();

        match (date_of_conclusion, payment_form, self.applicant) {
            (Some(date_of_conclusion), Some(payment_form), Some(applicant_id))
                if errors.is_empty() =>
            {
                Ok(ContractData {
                    number: trimmed(&self.number),
                    date_of_conclusion,
                    payment_form,
                    maternity_capital: self.maternity_capital,
                    credit: self.credit,
                    applicant_id,
                    customer_id: self.customer,
                })
            }
            _ => Err(unconvertible(errors)),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SpecialtyForm {
    #[validate(custom(function = "required", message = "Обязательное поле."))]
    #[validate(length(max = 255, message = "Убедитесь, что это значение содержит не более 255 символов."))]
    pub name: String,

    #[validate(length(max = 50, message = "Убедитесь, что это значение содержит не более 50 символов."))]
    pub code: String,

    pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpecialtyData {
    pub name: String,
    pub code: Option<String>,
    pub description: String,
}

impl SpecialtyForm {
    pub fn clean(&self) -> Result<SpecialtyData, FieldErrors> {
        let errors = validate_form(self);
        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(SpecialtyData {
            name: trimmed(&self.name),
            code: non_empty(&self.code),
            description: trimmed(&self.description),
        })
    }
}
