use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::db;
use crate::error::AppError;
use crate::forms::{ContractData, ContractForm};
use crate::validation::{FieldErrors, add_error};

const UNKNOWN_CHOICE: &str = "Выберите корректный вариант. Этого варианта нет среди допустимых значений.";

/// Creates a contract, or updates the one under `contract_id`. References are
/// checked before the write; a duplicate number is a conflict on `number`
/// whether the pre-check or the unique index catches it.
#[instrument(skip(pool, form))]
pub async fn save_contract(
    pool: &Pool<Sqlite>,
    contract_id: Option<i64>,
    form: &ContractForm,
) -> Result<i64, AppError> {
    if let Some(id) = contract_id {
        if db::get_contract(pool, id).await?.is_none() {
            return Err(AppError::NotFound(format!("Contract with id {} not found", id)));
        }
    }

    let data = form.clean().map_err(AppError::Form)?;
    check_references(pool, &data).await?;

    if let Some(existing) = db::find_contract_by_number(pool, &data.number).await? {
        if Some(existing.id) != contract_id {
            return Err(AppError::Conflict {
                field: "number".to_string(),
                message: "Договор с таким номером уже существует.".to_string(),
            });
        }
    }

    let id = match contract_id {
        Some(id) => {
            db::update_contract(pool, id, &data).await?;
            id
        }
        None => db::insert_contract(pool, &data).await?,
    };

    info!(contract_id = id, "Saved contract");
    Ok(id)
}

async fn check_references(pool: &Pool<Sqlite>, data: &ContractData) -> Result<(), AppError> {
    let mut errors = FieldErrors::new();

    if db::get_applicant(pool, data.applicant_id).await?.is_none() {
        add_error(&mut errors, "applicant", UNKNOWN_CHOICE);
    }

    if let Some(customer_id) = data.customer_id {
        if db::get_parent(pool, customer_id).await?.is_none() {
            add_error(&mut errors, "customer", UNKNOWN_CHOICE);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Form(errors))
    }
}
