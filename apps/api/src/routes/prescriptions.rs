use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use super::non_blank;
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::SharedState;
use medtrack_core::permissions::Action;
use medtrack_core::validation::{validate_age, validate_medications, validate_name, validate_search_query, validate_text};
use medtrack_core::{ActivityType, Gender, Module, Prescription, PrescriptionStatus};
use medtrack_db::{NewPrescription, PrescriptionFilter, PrescriptionUpdate};

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/api/prescriptions", get(list).post(create))
        .route("/api/prescriptions/{id}", get(get_one).put(update).delete(delete))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequest {
    pub patient_name: String,
    pub age: i64,
    pub gender: Gender,
    pub doctor: String,
    pub medications: Vec<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    pub patient_name: Option<String>,
    pub age: Option<i64>,
    pub gender: Option<Gender>,
    pub doctor: Option<String>,
    pub medications: Option<Vec<String>>,
    pub status: Option<PrescriptionStatus>,
    pub image_url: Option<String>,
}

fn image_url(value: Option<&str>) -> ApiResult<Option<String>> {
    Ok(value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| validate_text("imageUrl", v, 2000))
        .transpose()?)
}

async fn list(
    State(state): State<SharedState>,
    auth: AuthUser,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult<Json<Vec<Prescription>>> {
    auth.require(Module::Prescriptions, Action::View)?;

    let filter = PrescriptionFilter {
        status: non_blank(&query.status).map(str::parse::<PrescriptionStatus>).transpose()?,
        search: non_blank(&query.search).map(validate_search_query).transpose()?,
    };
    let prescriptions = state.db.prescriptions().list(auth.pharmacy_id(), &filter).await?;
    Ok(Json(prescriptions))
}

async fn create(
    State(state): State<SharedState>,
    auth: AuthUser,
    ApiJson(req): ApiJson<CreateRequest>,
) -> ApiResult<(StatusCode, Json<Prescription>)> {
    auth.require(Module::Prescriptions, Action::Edit)?;

    validate_age(req.age)?;
    let new = NewPrescription {
        patient_name: validate_name("patientName", &req.patient_name)?,
        age: req.age,
        gender: req.gender,
        doctor: validate_name("doctor", &req.doctor)?,
        medications: validate_medications(&req.medications)?,
        image_url: image_url(req.image_url.as_deref())?,
    };

    let prescription = state
        .db
        .prescriptions()
        .create(auth.pharmacy_id(), auth.id(), new)
        .await?;

    state
        .db
        .activity()
        .log(
            auth.pharmacy_id(),
            ActivityType::Prescription,
            format!(
                "Recorded prescription for {} from {}",
                prescription.patient_name, prescription.doctor
            ),
            Some(auth.id()),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(prescription)))
}

async fn get_one(
    State(state): State<SharedState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Json<Prescription>> {
    auth.require(Module::Prescriptions, Action::View)?;
    let prescription = state.db.prescriptions().require(auth.pharmacy_id(), &id).await?;
    Ok(Json(prescription))
}

async fn update(
    State(state): State<SharedState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<String>,
    ApiJson(req): ApiJson<UpdateRequest>,
) -> ApiResult<Json<Prescription>> {
    auth.require(Module::Prescriptions, Action::Edit)?;

    let current = state.db.prescriptions().require(auth.pharmacy_id(), &id).await?;
    if let Some(status) = req.status {
        // Dispensing happens through a sale; a cancelled prescription stays cancelled.
        let allowed = status == current.status
            || (current.status == PrescriptionStatus::Pending && status == PrescriptionStatus::Cancelled);
        if !allowed {
            return Err(ApiError::business_rule(format!(
                "Prescription cannot move from {} to {}",
                current.status, status
            )));
        }
    }
    if let Some(age) = req.age {
        validate_age(age)?;
    }

    let update = PrescriptionUpdate {
        patient_name: req
            .patient_name
            .as_deref()
            .map(|v| validate_name("patientName", v))
            .transpose()?,
        age: req.age,
        gender: req.gender,
        doctor: req.doctor.as_deref().map(|v| validate_name("doctor", v)).transpose()?,
        medications: req.medications.as_deref().map(validate_medications).transpose()?,
        status: req.status,
        image_url: match req.image_url.as_deref() {
            Some(url) => Some(image_url(Some(url))?),
            None => None,
        },
    };

    let prescription = state.db.prescriptions().update(auth.pharmacy_id(), &id, update).await?;

    let message = match req.status {
        Some(status) if status != current.status => {
            format!("Prescription for {} marked {}", prescription.patient_name, status)
        }
        _ => format!("Updated prescription for {}", prescription.patient_name),
    };
    state
        .db
        .activity()
        .log(auth.pharmacy_id(), ActivityType::Prescription, message, Some(auth.id()))
        .await?;

    Ok(Json(prescription))
}

async fn delete(
    State(state): State<SharedState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<StatusCode> {
    auth.require(Module::Prescriptions, Action::Delete)?;

    let prescription = state.db.prescriptions().require(auth.pharmacy_id(), &id).await?;
    state.db.prescriptions().delete(auth.pharmacy_id(), &id).await?;

    state
        .db
        .activity()
        .log(
            auth.pharmacy_id(),
            ActivityType::Prescription,
            format!("Deleted prescription for {}", prescription.patient_name),
            Some(auth.id()),
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
