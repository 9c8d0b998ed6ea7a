use chrono::Utc;
use sqlx::{Executor, Pool, Sqlite, SqliteConnection};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::forms::{ApplicantData, ContractData, DocumentData, HealthData, ParentData, SpecialtyData};
use crate::models::{
    Applicant, ApplicantDetail, ApplicantParent, ClassOfEntry, Contract, DbApplicant, DbContract,
    Dashboard, DbDocument, Document, FATHER, Health, LinkedParent, MOTHER, News, Page, Parent,
    SearchResult, Specialty,
};

const APPLICANT_COLUMNS: &str = "id, fio, date_of_birth, class_of_entry, specialty_id, hobby, phone, address, email, is_guardianship";
const DOCUMENT_COLUMNS: &str =
    "id, applicant_id, doc_type, available, scan, description, upload_date";
const CONTRACT_COLUMNS: &str = "id, number, date_of_conclusion, payment_form, maternity_capital, credit, applicant_id, customer_id";

const NEWS_ID: i64 = 1;
const RECENT_LIMIT: i64 = 10;
const SEARCH_LIMIT: i64 = 5;

/// Applicant names are matched against a lowercased copy kept next to them,
/// since SQLite folds case for ASCII only.
fn search_key(value: &str) -> String {
    value.trim().to_lowercase()
}

/// A `LIKE` pattern matching `needle` anywhere, with its wildcards escaped.
fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Clamps a requested page into range; returns the page, the page count and
/// the offset of its first row.
fn page_window(total: u64, page: u32, page_size: u32) -> (u32, u32, i64) {
    let total_pages = (total.div_ceil(page_size as u64) as u32).max(1);
    let page = page.clamp(1, total_pages);
    (page, total_pages, ((page - 1) as i64) * page_size as i64)
}

// ---- specialties ----

#[instrument(skip(pool))]
pub async fn create_specialty(pool: &Pool<Sqlite>, data: &SpecialtyData) -> Result<i64, AppError> {
    info!("Creating specialty");

    let existing = sqlx::query_scalar::<_, i64>("SELECT id FROM specialties WHERE name = ?")
        .bind(&data.name)
        .fetch_optional(pool)
        .await?;
    if existing.is_some() {
        return Err(AppError::Conflict {
            field: "name".to_string(),
            message: "Специальность с таким названием уже существует.".to_string(),
        });
    }

    if let Some(code) = &data.code {
        let existing = sqlx::query_scalar::<_, i64>("SELECT id FROM specialties WHERE code = ?")
            .bind(code)
            .fetch_optional(pool)
            .await?;
        if existing.is_some() {
            return Err(AppError::Conflict {
                field: "code".to_string(),
                message: "Специальность с таким кодом уже существует.".to_string(),
            });
        }
    }

    let res = sqlx::query("INSERT INTO specialties (name, code, description) VALUES (?, ?, ?)")
        .bind(&data.name)
        .bind(&data.code)
        .bind(&data.description)
        .execute(pool)
        .await
        .map_err(|e| {
            AppError::from_write(e, "name", "Специальность с таким названием уже существует.")
        })?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(executor))]
pub async fn get_specialty<'e, E>(executor: E, id: i64) -> Result<Option<Specialty>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, Specialty>(
        "SELECT id, name, code, description FROM specialties WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(executor)
    .await?;

    Ok(row)
}

#[instrument(skip(pool))]
pub async fn get_all_specialties(pool: &Pool<Sqlite>) -> Result<Vec<Specialty>, AppError> {
    info!("Getting all specialties");
    let rows = sqlx::query_as::<_, Specialty>(
        "SELECT id, name, code, description FROM specialties ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

// ---- applicants ----

#[derive(Debug, Default, Clone)]
pub struct ApplicantFilter {
    pub fio: Option<String>,
    pub class_of_entry: Option<ClassOfEntry>,
    pub specialty_id: Option<i64>,
}

#[instrument(skip(executor))]
pub async fn get_applicant<'e, E>(executor: E, id: i64) -> Result<Option<Applicant>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, DbApplicant>(&format!(
        "SELECT {} FROM applicants WHERE id = ?",
        APPLICANT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(executor)
    .await?;

    match row {
        Some(row) => Ok(Some(Applicant::try_from(row)?)),
        None => Ok(None),
    }
}

/// Filters by class and specialty in SQL; the name match happens here
/// because SQLite's LIKE only folds ASCII case and names are Cyrillic.
#[instrument(skip(pool))]
pub async fn find_applicants(
    pool: &Pool<Sqlite>,
    filter: &ApplicantFilter,
    page: u32,
    page_size: u32,
) -> Result<Page<Applicant>, AppError> {
    info!("Listing applicants");
    const FILTER: &str = "WHERE (? IS NULL OR class_of_entry = ?)
           AND (? IS NULL OR specialty_id = ?)
           AND (? IS NULL OR fio_search LIKE ? ESCAPE '\\')";

    let page_size = page_size.max(1);
    let class_of_entry = filter.class_of_entry.map(|c| c.as_str());
    let fio = filter
        .fio
        .as_deref()
        .map(search_key)
        .filter(|fio| !fio.is_empty())
        .map(|fio| contains_pattern(&fio));

    let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM applicants {}", FILTER))
        .bind(class_of_entry)
        .bind(class_of_entry)
        .bind(filter.specialty_id)
        .bind(filter.specialty_id)
        .bind(fio.as_deref())
        .bind(fio.as_deref())
        .fetch_one(pool)
        .await? as u64;

    let (page, total_pages, offset) = page_window(total, page, page_size);

    let rows = sqlx::query_as::<_, DbApplicant>(&format!(
        "SELECT {} FROM applicants {} ORDER BY fio, id LIMIT ? OFFSET ?",
        APPLICANT_COLUMNS, FILTER
    ))
    .bind(class_of_entry)
    .bind(class_of_entry)
    .bind(filter.specialty_id)
    .bind(filter.specialty_id)
    .bind(fio.as_deref())
    .bind(fio.as_deref())
    .bind(page_size as i64)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let mut items = Vec::with_capacity(rows.len());
    for row in rows {
        items.push(Applicant::try_from(row)?);
    }

    Ok(Page {
        items,
        page,
        total_pages,
        total,
    })
}

#[instrument(skip(conn, data))]
pub async fn insert_applicant(
    conn: &mut SqliteConnection,
    data: &ApplicantData,
) -> Result<i64, AppError> {
    info!("Inserting applicant");
    let res = sqlx::query(
        "INSERT INTO applicants
         (fio, fio_search, date_of_birth, class_of_entry, specialty_id, hobby, phone, address, email, is_guardianship)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&data.fio)
    .bind(search_key(&data.fio))
    .bind(data.date_of_birth)
    .bind(data.class_of_entry.as_str())
    .bind(data.specialty_id)
    .bind(&data.hobby)
    .bind(&data.phone)
    .bind(&data.address)
    .bind(&data.email)
    .bind(data.is_guardianship)
    .execute(&mut *conn)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(conn, data))]
pub async fn update_applicant(
    conn: &mut SqliteConnection,
    id: i64,
    data: &ApplicantData,
) -> Result<(), AppError> {
    info!("Updating applicant");
    let res = sqlx::query(
        "UPDATE applicants
         SET fio = ?, fio_search = ?, date_of_birth = ?, class_of_entry = ?, specialty_id = ?,
             hobby = ?, phone = ?, address = ?, email = ?, is_guardianship = ?
         WHERE id = ?",
    )
    .bind(&data.fio)
    .bind(search_key(&data.fio))
    .bind(data.date_of_birth)
    .bind(data.class_of_entry.as_str())
    .bind(data.specialty_id)
    .bind(&data.hobby)
    .bind(&data.phone)
    .bind(&data.address)
    .bind(&data.email)
    .bind(data.is_guardianship)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Applicant with id {} not found", id)));
    }

    Ok(())
}

#[instrument(skip(conn))]
pub async fn delete_applicant(conn: &mut SqliteConnection, id: i64) -> Result<bool, AppError> {
    info!("Deleting applicant");
    let res = sqlx::query("DELETE FROM applicants WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    Ok(res.rows_affected() > 0)
}

#[instrument(skip(pool))]
pub async fn get_applicant_detail(pool: &Pool<Sqlite>, id: i64) -> Result<ApplicantDetail, AppError> {
    info!("Getting applicant detail");
    let applicant = get_applicant(pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Applicant with id {} not found", id)))?;

    let specialty = match applicant.specialty_id {
        Some(specialty_id) => get_specialty(pool, specialty_id).await?,
        None => None,
    };

    Ok(ApplicantDetail {
        specialty,
        mother: get_parent_for_role(pool, id, MOTHER).await?,
        father: get_parent_for_role(pool, id, FATHER).await?,
        health: get_health_for_applicant(pool, id).await?,
        documents: get_documents(pool, id).await?,
        contracts: get_contracts_for_applicant(pool, id).await?,
        applicant,
    })
}

// ---- parents ----

#[instrument(skip(executor))]
pub async fn get_parent<'e, E>(executor: E, id: i64) -> Result<Option<Parent>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, Parent>(
        "SELECT id, fio, workplace, phone, address, email FROM parents WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(executor)
    .await?;

    Ok(row)
}

#[instrument(skip(conn, data))]
pub async fn insert_parent(conn: &mut SqliteConnection, data: &ParentData) -> Result<i64, AppError> {
    info!("Inserting parent");
    let res = sqlx::query(
        "INSERT INTO parents (fio, workplace, phone, address, email) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&data.fio)
    .bind(&data.workplace)
    .bind(&data.phone)
    .bind(&data.address)
    .bind(&data.email)
    .execute(&mut *conn)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(conn, data))]
pub async fn update_parent(
    conn: &mut SqliteConnection,
    id: i64,
    data: &ParentData,
) -> Result<(), AppError> {
    info!("Updating parent");
    sqlx::query(
        "UPDATE parents SET fio = ?, workplace = ?, phone = ?, address = ?, email = ? WHERE id = ?",
    )
    .bind(&data.fio)
    .bind(&data.workplace)
    .bind(&data.phone)
    .bind(&data.address)
    .bind(&data.email)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Contracts naming this parent as customer keep existing with an empty
/// customer; the relation rows to applicants go with the parent.
#[instrument(skip(pool))]
pub async fn delete_parent(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
    info!("Deleting parent");
    let res = sqlx::query("DELETE FROM parents WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Parent with id {} not found", id)));
    }

    Ok(())
}

#[instrument(skip(executor))]
pub async fn find_parent_relation<'e, E>(
    executor: E,
    applicant_id: i64,
    relation_type: &str,
) -> Result<Option<ApplicantParent>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, ApplicantParent>(
        "SELECT id, applicant_id, parent_id, relation_type FROM applicant_parents
         WHERE applicant_id = ? AND relation_type = ?
         ORDER BY id
         LIMIT 1",
    )
    .bind(applicant_id)
    .bind(relation_type)
    .fetch_optional(executor)
    .await?;

    Ok(row)
}

/// Read-then-write upsert keyed by `(applicant, relation label)`: an existing
/// row is repointed at `parent_id`, otherwise a new row is inserted.
#[instrument(skip(conn))]
pub async fn upsert_parent_relation(
    conn: &mut SqliteConnection,
    applicant_id: i64,
    relation_type: &str,
    parent_id: i64,
) -> Result<i64, AppError> {
    match find_parent_relation(&mut *conn, applicant_id, relation_type).await? {
        Some(relation) if relation.parent_id == parent_id => Ok(relation.id),
        Some(relation) => {
            info!(relation_id = relation.id, "Repointing parent relation");
            sqlx::query("UPDATE applicant_parents SET parent_id = ? WHERE id = ?")
                .bind(parent_id)
                .bind(relation.id)
                .execute(&mut *conn)
                .await?;
            Ok(relation.id)
        }
        None => {
            info!("Creating parent relation");
            let res = sqlx::query(
                "INSERT INTO applicant_parents (applicant_id, parent_id, relation_type) VALUES (?, ?, ?)",
            )
            .bind(applicant_id)
            .bind(parent_id)
            .bind(relation_type)
            .execute(&mut *conn)
            .await?;
            Ok(res.last_insert_rowid())
        }
    }
}

#[instrument(skip(executor))]
pub async fn get_parent_for_role<'e, E>(
    executor: E,
    applicant_id: i64,
    relation_type: &str,
) -> Result<Option<Parent>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, Parent>(
        "SELECT p.id, p.fio, p.workplace, p.phone, p.address, p.email
         FROM parents p
         JOIN applicant_parents ap ON ap.parent_id = p.id
         WHERE ap.applicant_id = ? AND ap.relation_type = ?
         ORDER BY ap.id
         LIMIT 1",
    )
    .bind(applicant_id)
    .bind(relation_type)
    .fetch_optional(executor)
    .await?;

    Ok(row)
}

#[instrument(skip(pool))]
pub async fn get_linked_parents(
    pool: &Pool<Sqlite>,
    applicant_id: i64,
) -> Result<Vec<LinkedParent>, AppError> {
    info!("Getting parents linked to applicant");
    let rows = sqlx::query_as::<_, LinkedParent>(
        "SELECT p.id, p.fio, p.phone, ap.relation_type
         FROM applicant_parents ap
         JOIN parents p ON p.id = ap.parent_id
         WHERE ap.applicant_id = ?
         ORDER BY ap.id",
    )
    .bind(applicant_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

// ---- health ----

#[instrument(skip(executor))]
pub async fn get_health_for_applicant<'e, E>(
    executor: E,
    applicant_id: i64,
) -> Result<Option<Health>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, Health>(
        "SELECT id, applicant_id, diseases, disability, restrictions, additional_info
         FROM health_records WHERE applicant_id = ?",
    )
    .bind(applicant_id)
    .fetch_optional(executor)
    .await?;

    Ok(row)
}

/// The owner is always `applicant_id`, whatever the submission claimed.
#[instrument(skip(conn, data))]
pub async fn upsert_health(
    conn: &mut SqliteConnection,
    applicant_id: i64,
    data: &HealthData,
) -> Result<i64, AppError> {
    match get_health_for_applicant(&mut *conn, applicant_id).await? {
        Some(health) => {
            info!(health_id = health.id, "Updating health record");
            sqlx::query(
                "UPDATE health_records
                 SET diseases = ?, disability = ?, restrictions = ?, additional_info = ?
                 WHERE id = ?",
            )
            .bind(&data.diseases)
            .bind(data.disability)
            .bind(&data.restrictions)
            .bind(&data.additional_info)
            .bind(health.id)
            .execute(&mut *conn)
            .await?;
            Ok(health.id)
        }
        None => {
            info!("Creating health record");
            let res = sqlx::query(
                "INSERT INTO health_records
                 (applicant_id, diseases, disability, restrictions, additional_info)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(applicant_id)
            .bind(&data.diseases)
            .bind(data.disability)
            .bind(&data.restrictions)
            .bind(&data.additional_info)
            .execute(&mut *conn)
            .await?;
            Ok(res.last_insert_rowid())
        }
    }
}

// ---- documents ----

#[instrument(skip(executor))]
pub async fn get_documents<'e, E>(executor: E, applicant_id: i64) -> Result<Vec<Document>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query_as::<_, DbDocument>(&format!(
        "SELECT {} FROM documents WHERE applicant_id = ? ORDER BY id",
        DOCUMENT_COLUMNS
    ))
    .bind(applicant_id)
    .fetch_all(executor)
    .await?;

    let mut documents = Vec::with_capacity(rows.len());
    for row in rows {
        documents.push(Document::try_from(row)?);
    }

    Ok(documents)
}

/// Whether any stored document still points at this scan file.
#[instrument(skip(executor))]
pub async fn scan_is_referenced<'e, E>(executor: E, key: &str) -> Result<bool, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let references: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE scan = ?")
        .bind(key)
        .fetch_one(executor)
        .await?;

    Ok(references > 0)
}

#[instrument(skip(conn, data))]
pub async fn insert_document(
    conn: &mut SqliteConnection,
    applicant_id: i64,
    data: &DocumentData,
) -> Result<i64, AppError> {
    info!("Inserting document");
    let res = sqlx::query(
        "INSERT INTO documents (applicant_id, doc_type, available, scan, description, upload_date)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(applicant_id)
    .bind(data.doc_type.as_str())
    .bind(data.available)
    .bind(&data.scan)
    .bind(&data.description)
    .bind(Utc::now().naive_utc())
    .execute(&mut *conn)
    .await?;

    Ok(res.last_insert_rowid())
}

/// Returns false when the document no longer belongs to the applicant.
#[instrument(skip(conn, data))]
pub async fn update_document(
    conn: &mut SqliteConnection,
    applicant_id: i64,
    document_id: i64,
    data: &DocumentData,
) -> Result<bool, AppError> {
    info!("Updating document");
    let res = sqlx::query(
        "UPDATE documents
         SET doc_type = ?, available = ?, scan = ?, description = ?
         WHERE id = ? AND applicant_id = ?",
    )
    .bind(data.doc_type.as_str())
    .bind(data.available)
    .bind(&data.scan)
    .bind(&data.description)
    .bind(document_id)
    .bind(applicant_id)
    .execute(&mut *conn)
    .await?;

    Ok(res.rows_affected() > 0)
}

#[instrument(skip(conn))]
pub async fn delete_document(
    conn: &mut SqliteConnection,
    applicant_id: i64,
    document_id: i64,
) -> Result<bool, AppError> {
    info!("Deleting document");
    let res = sqlx::query("DELETE FROM documents WHERE id = ? AND applicant_id = ?")
        .bind(document_id)
        .bind(applicant_id)
        .execute(&mut *conn)
        .await?;

    Ok(res.rows_affected() > 0)
}

// ---- contracts ----

#[instrument(skip(executor))]
pub async fn get_contract<'e, E>(executor: E, id: i64) -> Result<Option<Contract>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, DbContract>(&format!(
        "SELECT {} FROM contracts WHERE id = ?",
        CONTRACT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(executor)
    .await?;

    match row {
        Some(row) => Ok(Some(Contract::try_from(row)?)),
        None => Ok(None),
    }
}

#[instrument(skip(executor))]
pub async fn find_contract_by_number<'e, E>(
    executor: E,
    number: &str,
) -> Result<Option<Contract>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, DbContract>(&format!(
        "SELECT {} FROM contracts WHERE number = ?",
        CONTRACT_COLUMNS
    ))
    .bind(number)
    .fetch_optional(executor)
    .await?;

    match row {
        Some(row) => Ok(Some(Contract::try_from(row)?)),
        None => Ok(None),
    }
}

#[instrument(skip(executor))]
pub async fn get_contracts_for_applicant<'e, E>(
    executor: E,
    applicant_id: i64,
) -> Result<Vec<Contract>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query_as::<_, DbContract>(&format!(
        "SELECT {} FROM contracts WHERE applicant_id = ? ORDER BY date_of_conclusion DESC, id DESC",
        CONTRACT_COLUMNS
    ))
    .bind(applicant_id)
    .fetch_all(executor)
    .await?;

    let mut contracts = Vec::with_capacity(rows.len());
    for row in rows {
        contracts.push(Contract::try_from(row)?);
    }

    Ok(contracts)
}

#[instrument(skip(pool))]
pub async fn get_contracts(
    pool: &Pool<Sqlite>,
    page: u32,
    page_size: u32,
) -> Result<Page<Contract>, AppError> {
    info!("Listing contracts");
    let page_size = page_size.max(1);
    let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM contracts")
        .fetch_one(pool)
        .await? as u64;

    let (page, total_pages, offset) = page_window(total, page, page_size);

    let rows = sqlx::query_as::<_, DbContract>(&format!(
        "SELECT {} FROM contracts ORDER BY date_of_conclusion DESC, id DESC LIMIT ? OFFSET ?",
        CONTRACT_COLUMNS
    ))
    .bind(page_size as i64)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let mut items = Vec::with_capacity(rows.len());
    for row in rows {
        items.push(Contract::try_from(row)?);
    }

    Ok(Page {
        items,
        page,
        total_pages,
        total,
    })
}

const DUPLICATE_CONTRACT: &str = "Договор с таким номером уже существует.";

#[instrument(skip(pool, data))]
pub async fn insert_contract(pool: &Pool<Sqlite>, data: &ContractData) -> Result<i64, AppError> {
    info!(number = %data.number, "Inserting contract");
    let res = sqlx::query(
        "INSERT INTO contracts
         (number, date_of_conclusion, payment_form, maternity_capital, credit, applicant_id, customer_id)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&data.number)
    .bind(data.date_of_conclusion)
    .bind(data.payment_form.as_str())
    .bind(data.maternity_capital)
    .bind(data.credit)
    .bind(data.applicant_id)
    .bind(data.customer_id)
    .execute(pool)
    .await
    .map_err(|e| AppError::from_write(e, "number", DUPLICATE_CONTRACT))?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool, data))]
pub async fn update_contract(
    pool: &Pool<Sqlite>,
    id: i64,
    data: &ContractData,
) -> Result<(), AppError> {
    info!(number = %data.number, "Updating contract");
    let res = sqlx::query(
        "UPDATE contracts
         SET number = ?, date_of_conclusion = ?, payment_form = ?, maternity_capital = ?,
             credit = ?, applicant_id = ?, customer_id = ?
         WHERE id = ?",
    )
    .bind(&data.number)
    .bind(data.date_of_conclusion)
    .bind(data.payment_form.as_str())
    .bind(data.maternity_capital)
    .bind(data.credit)
    .bind(data.applicant_id)
    .bind(data.customer_id)
    .bind(id)
    .execute(pool)
    .await
    .map_err(|e| AppError::from_write(e, "number", DUPLICATE_CONTRACT))?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Contract with id {} not found", id)));
    }

    Ok(())
}

#[instrument(skip(pool))]
pub async fn delete_contract(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
    info!("Deleting contract");
    let res = sqlx::query("DELETE FROM contracts WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Contract with id {} not found", id)));
    }

    Ok(())
}

// ---- dashboard and search ----

#[instrument(skip(pool))]
pub async fn get_dashboard(pool: &Pool<Sqlite>) -> Result<Dashboard, AppError> {
    info!("Building dashboard");
    let applicant_count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM applicants")
        .fetch_one(pool)
        .await? as u64;
    let contract_count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM contracts")
        .fetch_one(pool)
        .await? as u64;

    let applicant_rows = sqlx::query_as::<_, DbApplicant>(&format!(
        "SELECT {} FROM applicants ORDER BY id DESC LIMIT ?",
        APPLICANT_COLUMNS
    ))
    .bind(RECENT_LIMIT)
    .fetch_all(pool)
    .await?;

    let contract_rows = sqlx::query_as::<_, DbContract>(&format!(
        "SELECT {} FROM contracts ORDER BY date_of_conclusion DESC, id DESC LIMIT ?",
        CONTRACT_COLUMNS
    ))
    .bind(RECENT_LIMIT)
    .fetch_all(pool)
    .await?;

    let mut recent_applicants = Vec::with_capacity(applicant_rows.len());
    for row in applicant_rows {
        recent_applicants.push(Applicant::try_from(row)?);
    }

    let mut recent_contracts = Vec::with_capacity(contract_rows.len());
    for row in contract_rows {
        recent_contracts.push(Contract::try_from(row)?);
    }

    Ok(Dashboard {
        applicant_count,
        contract_count,
        recent_applicants,
        recent_contracts,
    })
}

/// Applicants by name or phone, then contracts by number or applicant name,
/// a handful of each.
#[instrument(skip(pool))]
pub async fn search(pool: &Pool<Sqlite>, query: &str) -> Result<Vec<SearchResult>, AppError> {
    let needle = search_key(query);
    if needle.is_empty() {
        return Ok(Vec::new());
    }
    info!("Searching applicants and contracts");
    let pattern = contains_pattern(&needle);
    // Contract numbers keep their case; SQLite only folds it for ASCII.
    let number_pattern = contains_pattern(query.trim());

    let applicants = sqlx::query_as::<_, (i64, String, String)>(
        "SELECT id, fio, phone FROM applicants
         WHERE fio_search LIKE ? ESCAPE '\\' OR phone LIKE ? ESCAPE '\\'
         ORDER BY id
         LIMIT ?",
    )
    .bind(&pattern)
    .bind(&pattern)
    .bind(SEARCH_LIMIT)
    .fetch_all(pool)
    .await?;

    let contracts = sqlx::query_as::<_, (i64, String, String)>(
        "SELECT c.id, c.number, a.fio FROM contracts c
         JOIN applicants a ON a.id = c.applicant_id
         WHERE c.number LIKE ? ESCAPE '\\' OR a.fio_search LIKE ? ESCAPE '\\'
         ORDER BY c.id
         LIMIT ?",
    )
    .bind(&number_pattern)
    .bind(&pattern)
    .bind(SEARCH_LIMIT)
    .fetch_all(pool)
    .await?;

    let results = applicants
        .into_iter()
        .map(|(id, fio, phone)| SearchResult::Applicant { id, fio, phone })
        .chain(contracts.into_iter().map(|(id, number, applicant_fio)| {
            SearchResult::Contract {
                id,
                number,
                applicant_fio,
            }
        }))
        .collect();

    Ok(results)
}

// ---- news ----

/// The bulletin is a single row under a fixed id, created on first access.
#[instrument(skip(pool))]
pub async fn get_or_init_news(pool: &Pool<Sqlite>) -> Result<News, AppError> {
    sqlx::query("INSERT OR IGNORE INTO news (id, content) VALUES (?, '')")
        .bind(NEWS_ID)
        .execute(pool)
        .await?;

    let news = sqlx::query_as::<_, News>(
        "SELECT id, content, created_at, updated_at FROM news WHERE id = ?",
    )
    .bind(NEWS_ID)
    .fetch_one(pool)
    .await?;

    Ok(news)
}

#[instrument(skip(pool, content))]
pub async fn save_news(pool: &Pool<Sqlite>, content: &str) -> Result<News, AppError> {
    info!("Saving news bulletin");
    get_or_init_news(pool).await?;

    sqlx::query("UPDATE news SET content = ?, updated_at = ? WHERE id = ?")
        .bind(content.trim())
        .bind(Utc::now().naive_utc())
        .bind(NEWS_ID)
        .execute(pool)
        .await?;

    get_or_init_news(pool).await
}
