use anyhow::Error;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MOTHER: &str = "мать";
pub const FATHER: &str = "отец";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassOfEntry {
    #[serde(rename = "9")]
    Ninth,
    #[serde(rename = "11")]
    Eleventh,
}

impl ClassOfEntry {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassOfEntry::Ninth => "9",
            ClassOfEntry::Eleventh => "11",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "9" => Ok(ClassOfEntry::Ninth),
            "11" => Ok(ClassOfEntry::Eleventh),
            _ => Err(Error::msg(format!("Unknown class of entry: {}", s))),
        }
    }
}

impl fmt::Display for ClassOfEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassOfEntry::Ninth => write!(f, "9 класс"),
            ClassOfEntry::Eleventh => write!(f, "11 класс"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentForm {
    Monthly,
    Semester,
    Yearly,
}

impl PaymentForm {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentForm::Monthly => "monthly",
            PaymentForm::Semester => "semester",
            PaymentForm::Yearly => "yearly",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "monthly" => Ok(PaymentForm::Monthly),
            "semester" => Ok(PaymentForm::Semester),
            "yearly" => Ok(PaymentForm::Yearly),
            _ => Err(Error::msg(format!("Unknown payment form: {}", s))),
        }
    }
}

// Only the single-file package is accepted today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Package,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Package => "package",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "package" => Ok(DocumentType::Package),
            _ => Err(Error::msg(format!("Unknown document type: {}", s))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Specialty {
    pub id: i64,
    pub name: String,
    pub code: Option<String>,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Applicant {
    pub id: i64,
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

#[derive(sqlx::FromRow, Clone)]
pub struct DbApplicant {
    pub id: i64,
    pub fio: String,
    pub date_of_birth: NaiveDate,
    pub class_of_entry: String,
    pub specialty_id: Option<i64>,
    pub hobby: String,
    pub phone: String,
    pub address: String,
    pub email: String,
    pub is_guardianship: bool,
}

impl TryFrom<DbApplicant> for Applicant {
    type Error = Error;

    fn try_from(row: DbApplicant) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            fio: row.fio,
            date_of_birth: row.date_of_birth,
            class_of_entry: ClassOfEntry::from_str(&row.class_of_entry)?,
            specialty_id: row.specialty_id,
            hobby: row.hobby,
            phone: row.phone,
            address: row.address,
            email: row.email,
            is_guardianship: row.is_guardianship,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Parent {
    pub id: i64,
    pub fio: String,
    pub workplace: Option<String>,
    pub phone: String,
    pub address: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ApplicantParent {
    pub id: i64,
    pub applicant_id: i64,
    pub parent_id: i64,
    pub relation_type: String,
}

/// A parent as seen from one applicant, with the relation label.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LinkedParent {
    pub id: i64,
    pub fio: String,
    pub phone: String,
    pub relation_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Health {
    pub id: i64,
    pub applicant_id: Option<i64>,
    pub diseases: String,
    pub disability: bool,
    pub restrictions: String,
    pub additional_info: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: i64,
    pub applicant_id: i64,
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub available: bool,
    pub scan: Option<String>,
    pub description: String,
    pub upload_date: NaiveDateTime,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbDocument {
    pub id: i64,
    pub applicant_id: i64,
    pub doc_type: String,
    pub available: bool,
    pub scan: Option<String>,
    pub description: String,
    pub upload_date: NaiveDateTime,
}

impl TryFrom<DbDocument> for Document {
    type Error = Error;

    fn try_from(row: DbDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            applicant_id: row.applicant_id,
            doc_type: DocumentType::from_str(&row.doc_type)?,
            available: row.available,
            scan: row.scan,
            description: row.description,
            upload_date: row.upload_date,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Contract {
    pub id: i64,
    pub number: String,
    pub date_of_conclusion: NaiveDate,
    pub payment_form: PaymentForm,
    pub maternity_capital: bool,
    pub credit: bool,
    pub applicant_id: i64,
    pub customer_id: Option<i64>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbContract {
    pub id: i64,
    pub number: String,
    pub date_of_conclusion: NaiveDate,
    pub payment_form: String,
    pub maternity_capital: bool,
    pub credit: bool,
    pub applicant_id: i64,
    pub customer_id: Option<i64>,
}

impl TryFrom<DbContract> for Contract {
    type Error = Error;

    fn try_from(row: DbContract) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            number: row.number,
            date_of_conclusion: row.date_of_conclusion,
            payment_form: PaymentForm::from_str(&row.payment_form)?,
            maternity_capital: row.maternity_capital,
            credit: row.credit,
            applicant_id: row.applicant_id,
            customer_id: row.customer_id,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct News {
    pub id: i64,
    pub content: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Serialize)]
pub struct ApplicantDetail {
    pub applicant: Applicant,
    pub specialty: Option<Specialty>,
    pub mother: Option<Parent>,
    pub father: Option<Parent>,
    pub health: Option<Health>,
    pub documents: Vec<Document>,
    pub contracts: Vec<Contract>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub total_pages: u32,
    pub total: u64,
}

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub applicant_count: u64,
    pub contract_count: u64,
    pub recent_applicants: Vec<Applicant>,
    pub recent_contracts: Vec<Contract>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SearchResult {
    Applicant {
        id: i64,
        fio: String,
        phone: String,
    },
    Contract {
        id: i64,
        number: String,
        applicant_fio: String,
    },
}
