use rocket::FromForm;
use rocket::State;
use rocket::data::{Data, ToByteUnit};
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::{Error as JsonError, Json};
use rocket::serde::{Deserialize, Serialize};
use rocket::Request;
use sqlx::{Pool, Sqlite};
use tracing::{info, warn};

use crate::contracts::save_contract;
use crate::coordinator::{delete_applicant_record, save_applicant_record};
use crate::db::{
    ApplicantFilter, create_specialty, delete_contract, delete_parent, find_applicants,
    get_all_specialties, get_applicant, get_applicant_detail, get_contract, get_contracts,
    get_dashboard, get_linked_parents, get_or_init_news, save_news, search,
};
use crate::env::Settings;
use crate::error::AppError;
use crate::forms::{ApplicantSubmission, ContractForm, SpecialtyForm};
use crate::models::{
    Applicant, ApplicantDetail, ClassOfEntry, Contract, Dashboard, LinkedParent, News, Page,
    SearchResult, Specialty,
};
use crate::storage::ScanStorage;
use crate::validation::{
    SubmissionResponse, ToValidationResponse, ValidateCustomExt, ValidationResponse,
};

#[derive(Serialize, Deserialize, Debug)]
pub struct CreatedResponse {
    pub id: i64,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ScanResponse {
    pub key: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
}

#[derive(Deserialize)]
pub struct NewsRequest {
    content: String,
}

#[get("/health")]
pub fn health() -> &'static str {
    "OK"
}

#[catch(default)]
pub fn api_catcher(status: Status, req: &Request) -> Custom<Json<ValidationResponse>> {
    warn!(status = status.code, uri = %req.uri(), "API request failed");
    status.to_validation_response()
}

#[derive(FromForm)]
pub struct ApplicantQueryParams {
    fio: Option<String>,
    class_of_entry: Option<String>,
    specialty: Option<i64>,
    page: Option<u32>,
}

#[get("/applicants?<params..>")]
pub async fn api_get_applicants(
    params: ApplicantQueryParams,
    db: &State<Pool<Sqlite>>,
    settings: &State<Settings>,
) -> Result<Json<Page<Applicant>>, AppError> {
    // An unknown class filters nothing, like an unselected dropdown.
    let filter = ApplicantFilter {
        fio: params.fio,
        class_of_entry: params
            .class_of_entry
            .as_deref()
            .and_then(|class| ClassOfEntry::from_str(class.trim()).ok()),
        specialty_id: params.specialty,
    };

    let page = find_applicants(db, &filter, params.page.unwrap_or(1), settings.page_size).await?;
    Ok(Json(page))
}

/// A body that does not deserialize is still answered per sub-form, like any
/// other rejected submission.
fn read_submission(
    submission: Result<Json<ApplicantSubmission>, JsonError<'_>>,
) -> Result<ApplicantSubmission, AppError> {
    match submission {
        Ok(submission) => Ok(submission.into_inner()),
        Err(JsonError::Parse(raw, err)) => {
            warn!(error = %err, "Applicant submission did not deserialize");
            ApplicantSubmission::from_json(raw)
                .map_err(|errors| AppError::InvalidSubmission(Box::new(errors)))
        }
        Err(JsonError::Io(err)) => {
            warn!(error = %err, "Failed to read applicant submission");
            Err(AppError::Validation("Не удалось прочитать тело запроса.".to_string()))
        }
    }
}

#[post("/applicants", data = "<submission>")]
pub async fn api_create_applicant(
    submission: Result<Json<ApplicantSubmission>, JsonError<'_>>,
    db: &State<Pool<Sqlite>>,
    storage: &State<Box<dyn ScanStorage>>,
) -> Result<Custom<Json<SubmissionResponse>>, AppError> {
    let submission = read_submission(submission)?;
    let saved = save_applicant_record(db, storage.inner().as_ref(), None, &submission).await?;

    Ok(Custom(Status::Created, Json(SubmissionResponse::saved(saved.id))))
}

#[get("/applicants/<id>")]
pub async fn api_get_applicant(
    id: i64,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<ApplicantDetail>, AppError> {
    Ok(Json(get_applicant_detail(db, id).await?))
}

#[put("/applicants/<id>", data = "<submission>")]
pub async fn api_update_applicant(
    id: i64,
    submission: Result<Json<ApplicantSubmission>, JsonError<'_>>,
    db: &State<Pool<Sqlite>>,
    storage: &State<Box<dyn ScanStorage>>,
) -> Result<Json<SubmissionResponse>, AppError> {
    let submission = read_submission(submission)?;
    let saved = save_applicant_record(db, storage.inner().as_ref(), Some(id), &submission).await?;

    Ok(Json(SubmissionResponse::saved(saved.id)))
}

#[delete("/applicants/<id>")]
pub async fn api_delete_applicant(
    id: i64,
    db: &State<Pool<Sqlite>>,
    storage: &State<Box<dyn ScanStorage>>,
) -> Result<Status, AppError> {
    delete_applicant_record(db, storage.inner().as_ref(), id).await?;
    Ok(Status::NoContent)
}

#[get("/applicants/<id>/parents")]
pub async fn api_get_applicant_parents(
    id: i64,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<LinkedParent>>, AppError> {
    if get_applicant(db.inner(), id).await?.is_none() {
        return Err(AppError::NotFound(format!("Applicant with id {} not found", id)));
    }

    Ok(Json(get_linked_parents(db, id).await?))
}

#[post("/scans?<name>", data = "<data>")]
pub async fn api_upload_scan(
    name: &str,
    data: Data<'_>,
    storage: &State<Box<dyn ScanStorage>>,
    settings: &State<Settings>,
) -> Result<Custom<Json<ScanResponse>>, Custom<Json<ValidationResponse>>> {
    let contents = data
        .open(settings.max_scan_size_bytes().bytes())
        .into_bytes()
        .await
        .map_err(AppError::from)
        .validate_custom()?;

    if !contents.is_complete() {
        return Err(Status::PayloadTooLarge.to_validation_response());
    }
    if contents.is_empty() {
        return Err(AppError::Validation("Загруженный файл пуст.".to_string()).to_validation_response());
    }

    let key = storage
        .store(name, &contents)
        .await
        .map_err(AppError::from)
        .validate_custom()?;

    info!(key = %key, "Uploaded document scan");
    Ok(Custom(Status::Created, Json(ScanResponse { key })))
}

#[derive(FromForm)]
pub struct PageQueryParams {
    page: Option<u32>,
}

#[get("/contracts?<params..>")]
pub async fn api_get_contracts(
    params: PageQueryParams,
    db: &State<Pool<Sqlite>>,
    settings: &State<Settings>,
) -> Result<Json<Page<Contract>>, AppError> {
    let page = get_contracts(db, params.page.unwrap_or(1), settings.page_size).await?;
    Ok(Json(page))
}

#[post("/contracts", data = "<contract>")]
pub async fn api_create_contract(
    contract: Json<ContractForm>,
    db: &State<Pool<Sqlite>>,
) -> Result<Custom<Json<CreatedResponse>>, AppError> {
    let id = save_contract(db, None, &contract).await?;
    Ok(Custom(Status::Created, Json(CreatedResponse { id })))
}

#[get("/contracts/<id>")]
pub async fn api_get_contract(id: i64, db: &State<Pool<Sqlite>>) -> Result<Json<Contract>, AppError> {
    get_contract(db.inner(), id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Contract with id {} not found", id)))
}

#[put("/contracts/<id>", data = "<contract>")]
pub async fn api_update_contract(
    id: i64,
    contract: Json<ContractForm>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<CreatedResponse>, AppError> {
    let id = save_contract(db, Some(id), &contract).await?;
    Ok(Json(CreatedResponse { id }))
}

#[delete("/contracts/<id>")]
pub async fn api_delete_contract(id: i64, db: &State<Pool<Sqlite>>) -> Result<Status, AppError> {
    delete_contract(db, id).await?;
    Ok(Status::NoContent)
}

#[delete("/parents/<id>")]
pub async fn api_delete_parent(id: i64, db: &State<Pool<Sqlite>>) -> Result<Status, AppError> {
    delete_parent(db, id).await?;
    Ok(Status::NoContent)
}

#[get("/specialties")]
pub async fn api_get_specialties(db: &State<Pool<Sqlite>>) -> Result<Json<Vec<Specialty>>, AppError> {
    Ok(Json(get_all_specialties(db).await?))
}

#[post("/specialties", data = "<specialty>")]
pub async fn api_create_specialty(
    specialty: Json<SpecialtyForm>,
    db: &State<Pool<Sqlite>>,
) -> Result<Custom<Json<CreatedResponse>>, AppError> {
    let data = specialty.clean().map_err(AppError::Form)?;
    let id = create_specialty(db, &data).await?;
    Ok(Custom(Status::Created, Json(CreatedResponse { id })))
}

#[get("/news")]
pub async fn api_get_news(db: &State<Pool<Sqlite>>) -> Result<Json<News>, AppError> {
    Ok(Json(get_or_init_news(db).await?))
}

#[put("/news", data = "<news>")]
pub async fn api_save_news(
    news: Json<NewsRequest>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<News>, AppError> {
    Ok(Json(save_news(db, &news.content).await?))
}

#[get("/dashboard")]
pub async fn api_get_dashboard(db: &State<Pool<Sqlite>>) -> Result<Json<Dashboard>, AppError> {
    Ok(Json(get_dashboard(db).await?))
}

#[get("/search?<q>")]
pub async fn api_search(
    q: Option<&str>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<SearchResponse>, AppError> {
    let results = search(db, q.unwrap_or_default()).await?;
    Ok(Json(SearchResponse { results }))
}
