//! Composite save of an applicant together with everything that hangs off it:
//! both parents, the health record and the document list. A submission is
//! checked as a whole first; only a fully valid one opens a transaction, and
//! that transaction either commits every change or none.

use std::collections::{HashMap, HashSet};

use sqlx::{Pool, Sqlite, SqliteConnection};
use tracing::{error, info, instrument, warn};

use crate::db;
use crate::error::AppError;
use crate::forms::{ApplicantData, ApplicantSubmission, DocumentData, DocumentForm, HealthData, ParentData};
use crate::models::{Document, FATHER, MOTHER};
use crate::storage::ScanStorage;
use crate::validation::{FieldErrors, NON_FIELD_ERRORS, SubmissionErrors, add_error};

const UNKNOWN_CHOICE: &str = "Выберите корректный вариант. Этого варианта нет среди допустимых значений.";
const UNKNOWN_DOCUMENT: &str = "Документ не найден у этого абитуриента.";
const REPEATED_DOCUMENT: &str = "Документ указан несколько раз.";
const MISSING_SCAN: &str = "Файл не найден. Загрузите его повторно.";
const STALE_DOCUMENT: &str = "Документ был изменён другим пользователем. Обновите страницу и повторите попытку.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavedApplicant {
    pub id: i64,
    pub created: bool,
}

#[derive(Debug)]
enum DocumentChange {
    Insert(DocumentData),
    Update { id: i64, data: DocumentData },
    Delete { id: i64 },
}

/// A submission that passed every check, ready to be written.
#[derive(Debug)]
struct SavePlan {
    applicant: ApplicantData,
    parents: Vec<(&'static str, ParentData)>,
    health: Option<HealthData>,
    documents: Vec<DocumentChange>,
    /// Scan keys to remove once the transaction has committed.
    released_scans: Vec<String>,
}

fn record<T>(slot: &mut FieldErrors, result: Result<T, FieldErrors>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(errors) => {
            for (field, messages) in errors {
                slot.entry(field).or_default().extend(messages);
            }
            None
        }
    }
}

#[instrument(skip(pool, storage, submission), fields(documents = submission.documents.len()))]
pub async fn save_applicant_record(
    pool: &Pool<Sqlite>,
    storage: &dyn ScanStorage,
    applicant_id: Option<i64>,
    submission: &ApplicantSubmission,
) -> Result<SavedApplicant, AppError> {
    if let Some(id) = applicant_id {
        if db::get_applicant(pool, id).await?.is_none() {
            return Err(AppError::NotFound(format!("Applicant with id {} not found", id)));
        }
    }

    let plan = plan_submission(pool, storage, applicant_id, submission).await?;

    let mut tx = pool.begin().await?;
    let id = match apply_plan(&mut *tx, applicant_id, &plan).await {
        Ok(id) => id,
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                error!(error = %rollback_err, "Failed to roll back applicant save");
            }
            return Err(err.into_submission_error());
        }
    };

    tx.commit()
        .await
        .map_err(|e| AppError::from(e).into_submission_error())?;

    release_scans(pool, storage, &plan.released_scans).await;

    info!(applicant_id = id, created = applicant_id.is_none(), "Saved applicant record");
    Ok(SavedApplicant {
        id,
        created: applicant_id.is_none(),
    })
}

/// Validates every sub-form without stopping at the first failure, so the
/// caller gets the complete error set in one response.
async fn plan_submission(
    pool: &Pool<Sqlite>,
    storage: &dyn ScanStorage,
    applicant_id: Option<i64>,
    submission: &ApplicantSubmission,
) -> Result<SavePlan, AppError> {
    let existing: HashMap<i64, Document> = match applicant_id {
        Some(id) => db::get_documents(pool, id)
            .await?
            .into_iter()
            .map(|document| (document.id, document))
            .collect(),
        None => HashMap::new(),
    };

    let mut errors = SubmissionErrors::default();

    let applicant = record(&mut errors.applicant, submission.applicant.clean());
    if let Some(specialty_id) = submission.applicant.specialty {
        if db::get_specialty(pool, specialty_id).await?.is_none() {
            add_error(&mut errors.applicant, "specialty", UNKNOWN_CHOICE);
        }
    }

    let mother = record(&mut errors.mother, submission.mother.clean());
    let father = record(&mut errors.father, submission.father.clean());
    let health = record(&mut errors.health, submission.health.clean());

    let mut documents = Vec::new();
    let mut released_scans = Vec::new();
    let mut seen = HashSet::new();
    for form in &submission.documents {
        let mut entry_errors = FieldErrors::new();
        let change = plan_document(
            storage,
            &existing,
            &mut seen,
            form,
            &mut entry_errors,
            &mut released_scans,
        )
        .await?;
        documents.extend(change);
        errors.documents.push(entry_errors);
    }

    match (applicant, mother, father, health) {
        (Some(applicant), Some(mother), Some(father), Some(health)) if errors.is_empty() => {
            let parents = [(MOTHER, mother), (FATHER, father)]
                .into_iter()
                .filter_map(|(role, data)| data.map(|data| (role, data)))
                .collect();

            Ok(SavePlan {
                applicant,
                parents,
                health,
                documents,
                released_scans,
            })
        }
        _ => {
            if errors.is_empty() {
                add_error(&mut errors.applicant, NON_FIELD_ERRORS, "Некорректные данные формы.");
            }
            Err(AppError::InvalidSubmission(Box::new(errors)))
        }
    }
}

async fn plan_document(
    storage: &dyn ScanStorage,
    existing: &HashMap<i64, Document>,
    seen: &mut HashSet<i64>,
    form: &DocumentForm,
    errors: &mut FieldErrors,
    released_scans: &mut Vec<String>,
) -> Result<Option<DocumentChange>, AppError> {
    if form.is_blank() {
        return Ok(None);
    }

    let current = match form.id {
        Some(id) if !seen.insert(id) => {
            add_error(errors, "id", REPEATED_DOCUMENT);
            return Ok(None);
        }
        Some(id) => existing.get(&id),
        None => None,
    };

    if form.delete {
        // Deleting a row that is already gone, or was never saved, is a no-op.
        return Ok(current.map(|document| {
            released_scans.extend(document.scan.clone());
            DocumentChange::Delete { id: document.id }
        }));
    }

    if form.id.is_some() && current.is_none() {
        add_error(errors, "id", UNKNOWN_DOCUMENT);
        return Ok(None);
    }

    let mut data = match form.clean() {
        Ok(data) => data,
        Err(form_errors) => {
            errors.extend(form_errors);
            return Ok(None);
        }
    };

    if let Some(key) = &data.scan {
        let unchanged = current.is_some_and(|document| document.scan.as_deref() == Some(key.as_str()));
        if !unchanged && !storage.exists(key).await? {
            add_error(errors, "scan", MISSING_SCAN);
            return Ok(None);
        }
    }

    match current {
        Some(document) => {
            // No scan in the entry keeps the stored one; a different one replaces it.
            if data.scan.is_none() {
                data.scan = document.scan.clone();
            } else if let Some(previous) = &document.scan {
                if data.scan.as_ref() != Some(previous) {
                    released_scans.push(previous.clone());
                }
            }
            Ok(Some(DocumentChange::Update {
                id: document.id,
                data,
            }))
        }
        None => Ok(Some(DocumentChange::Insert(data))),
    }
}

async fn apply_plan(
    conn: &mut SqliteConnection,
    applicant_id: Option<i64>,
    plan: &SavePlan,
) -> Result<i64, AppError> {
    let id = match applicant_id {
        Some(id) => {
            db::update_applicant(&mut *conn, id, &plan.applicant).await?;
            id
        }
        None => db::insert_applicant(&mut *conn, &plan.applicant).await?,
    };

    for (role, data) in &plan.parents {
        let parent_id = match db::find_parent_relation(&mut *conn, id, role).await? {
            Some(relation) => {
                db::update_parent(&mut *conn, relation.parent_id, data).await?;
                relation.parent_id
            }
            None => db::insert_parent(&mut *conn, data).await?,
        };
        db::upsert_parent_relation(&mut *conn, id, role, parent_id).await?;
    }

    if let Some(health) = &plan.health {
        db::upsert_health(&mut *conn, id, health).await?;
    }

    for change in &plan.documents {
        match change {
            DocumentChange::Insert(data) => {
                db::insert_document(&mut *conn, id, data).await?;
            }
            DocumentChange::Update {
                id: document_id,
                data,
            } => {
                if !db::update_document(&mut *conn, id, *document_id, data).await? {
                    return Err(AppError::Conflict {
                        field: NON_FIELD_ERRORS.to_string(),
                        message: STALE_DOCUMENT.to_string(),
                    });
                }
            }
            DocumentChange::Delete { id: document_id } => {
                db::delete_document(&mut *conn, id, *document_id).await?;
            }
        }
    }

    Ok(id)
}

/// Health, documents, contracts and parent links go with the applicant via
/// the declared cascades; the parents themselves are kept.
#[instrument(skip(pool, storage))]
pub async fn delete_applicant_record(
    pool: &Pool<Sqlite>,
    storage: &dyn ScanStorage,
    id: i64,
) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    let scans: Vec<String> = db::get_documents(&mut *tx, id)
        .await?
        .into_iter()
        .filter_map(|document| document.scan)
        .collect();

    if !db::delete_applicant(&mut *tx, id).await? {
        tx.rollback().await?;
        return Err(AppError::NotFound(format!("Applicant with id {} not found", id)));
    }

    tx.commit().await?;

    release_scans(pool, storage, &scans).await;

    info!(applicant_id = id, "Deleted applicant record");
    Ok(())
}

/// Removes scan files no longer attached to any document. A file another
/// document still points at is kept.
async fn release_scans(pool: &Pool<Sqlite>, storage: &dyn ScanStorage, keys: &[String]) {
    for key in keys {
        match db::scan_is_referenced(pool, key).await {
            Ok(false) => {}
            Ok(true) => {
                info!(key = %key, "Scan still attached to another document, keeping it");
                continue;
            }
            Err(err) => {
                warn!(key = %key, error = %err, "Could not check scan references, keeping it");
                continue;
            }
        }
        if let Err(err) = storage.delete(key).await {
            warn!(key = %key, error = %err, "Failed to release document scan");
        }
    }
}
