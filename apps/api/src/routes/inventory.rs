//! Inventory endpoints. Every item in a response carries its derived
//! status, computed with the pharmacy's alert thresholds.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;

use super::{non_blank, today};
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::SharedState;
use medtrack_core::inventory::{alerts, annotate, InventoryThresholds, ItemWithStatus};
use medtrack_core::permissions::Action;
use medtrack_core::validation::{
    validate_name, validate_price_cents, validate_range, validate_search_query, validate_stock_level, validate_text,
};
use medtrack_core::{ActivityType, InventoryStatus, Module};
use medtrack_db::{InventoryFilter, ItemUpdate, NewItem};

/// Upper bound on rows accepted by one bulk import.
const MAX_BULK_ITEMS: usize = 1000;
const MAX_ADJUSTMENT: i64 = 1_000_000;

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/api/inventory", get(list).post(create))
        .route("/api/inventory/bulk", post(bulk_create))
        .route("/api/inventory/alerts", get(list_alerts))
        .route("/api/inventory/{id}", get(get_item).put(update).delete(delete))
        .route("/api/inventory/{id}/adjust", post(adjust))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRequest {
    pub name: String,
    pub batch: String,
    pub category: String,
    pub quantity: i64,
    pub price_cents: i64,
    pub expiry_date: NaiveDate,
}

impl ItemRequest {
    fn validate(self) -> Result<NewItem, ApiError> {
        validate_stock_level(self.quantity)?;
        validate_price_cents(self.price_cents)?;
        Ok(NewItem {
            name: validate_name("name", &self.name)?,
            batch: validate_text("batch", &self.batch, 100)?,
            category: validate_text("category", &self.category, 100)?,
            quantity: self.quantity,
            price_cents: self.price_cents,
            expiry_date: self.expiry_date,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct BulkRequest {
    pub items: Vec<ItemRequest>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    pub name: Option<String>,
    pub batch: Option<String>,
    pub category: Option<String>,
    pub quantity: Option<i64>,
    pub price_cents: Option<i64>,
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct AdjustRequest {
    pub delta: i64,
    pub reason: Option<String>,
}

async fn thresholds(state: &SharedState, pharmacy_id: &str) -> ApiResult<InventoryThresholds> {
    let settings = state.db.settings().alerts(pharmacy_id).await?;
    Ok(InventoryThresholds::from(&settings))
}

async fn list(
    State(state): State<SharedState>,
    auth: AuthUser,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult<Json<Vec<ItemWithStatus>>> {
    auth.require(Module::Inventory, Action::View)?;

    let status = non_blank(&query.status)
        .map(|s| s.parse::<InventoryStatus>())
        .transpose()?;
    let filter = InventoryFilter {
        search: non_blank(&query.search).map(validate_search_query).transpose()?,
        category: non_blank(&query.category).map(str::to_string),
    };

    let items = state.db.inventory().list(auth.pharmacy_id(), &filter).await?;
    let thresholds = thresholds(&state, auth.pharmacy_id()).await?;

    let annotated = annotate(items, today(), &thresholds)
        .into_iter()
        .filter(|entry| status.map_or(true, |s| entry.status == s))
        .collect();
    Ok(Json(annotated))
}

async fn list_alerts(State(state): State<SharedState>, auth: AuthUser) -> ApiResult<Json<Vec<ItemWithStatus>>> {
    auth.require(Module::Inventory, Action::View)?;

    let items = state
        .db
        .inventory()
        .list(auth.pharmacy_id(), &InventoryFilter::default())
        .await?;
    let thresholds = thresholds(&state, auth.pharmacy_id()).await?;
    Ok(Json(alerts(annotate(items, today(), &thresholds))))
}

async fn create(
    State(state): State<SharedState>,
    auth: AuthUser,
    ApiJson(req): ApiJson<ItemRequest>,
) -> ApiResult<(StatusCode, Json<ItemWithStatus>)> {
    auth.require(Module::Inventory, Action::Edit)?;

    let new_item = req.validate()?;
    let item = state.db.inventory().create(auth.pharmacy_id(), new_item).await?;

    state
        .db
        .activity()
        .log(
            auth.pharmacy_id(),
            ActivityType::Inventory,
            format!("Added {} (batch {}, qty {})", item.name, item.batch, item.quantity),
            Some(auth.id()),
        )
        .await?;

    let thresholds = thresholds(&state, auth.pharmacy_id()).await?;
    Ok((StatusCode::CREATED, Json(ItemWithStatus::new(item, today(), &thresholds))))
}

async fn bulk_create(
    State(state): State<SharedState>,
    auth: AuthUser,
    ApiJson(req): ApiJson<BulkRequest>,
) -> ApiResult<(StatusCode, Json<Vec<ItemWithStatus>>)> {
    auth.require(Module::Inventory, Action::Edit)?;

    if req.items.is_empty() {
        return Err(ApiError::validation("items is required"));
    }
    if req.items.len() > MAX_BULK_ITEMS {
        return Err(ApiError::validation(format!(
            "items cannot contain more than {} rows",
            MAX_BULK_ITEMS
        )));
    }

    let new_items = req
        .items
        .into_iter()
        .enumerate()
        .map(|(row, item)| {
            item.validate()
                .map_err(|e| ApiError::validation(format!("Row {}: {}", row + 1, e.message)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let items = state.db.inventory().insert_many(auth.pharmacy_id(), new_items).await?;

    state
        .db
        .activity()
        .log(
            auth.pharmacy_id(),
            ActivityType::Inventory,
            format!("Imported {} inventory items", items.len()),
            Some(auth.id()),
        )
        .await?;

    let thresholds = thresholds(&state, auth.pharmacy_id()).await?;
    Ok((StatusCode::CREATED, Json(annotate(items, today(), &thresholds))))
}

async fn get_item(
    State(state): State<SharedState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Json<ItemWithStatus>> {
    auth.require(Module::Inventory, Action::View)?;

    let item = state.db.inventory().require(auth.pharmacy_id(), &id).await?;
    let thresholds = thresholds(&state, auth.pharmacy_id()).await?;
    Ok(Json(ItemWithStatus::new(item, today(), &thresholds)))
}

async fn update(
    State(state): State<SharedState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<String>,
    ApiJson(req): ApiJson<UpdateRequest>,
) -> ApiResult<Json<ItemWithStatus>> {
    auth.require(Module::Inventory, Action::Edit)?;

    if let Some(quantity) = req.quantity {
        validate_stock_level(quantity)?;
    }
    if let Some(price_cents) = req.price_cents {
        validate_price_cents(price_cents)?;
    }
    let update = ItemUpdate {
        name: req.name.as_deref().map(|v| validate_name("name", v)).transpose()?,
        batch: req.batch.as_deref().map(|v| validate_text("batch", v, 100)).transpose()?,
        category: req
            .category
            .as_deref()
            .map(|v| validate_text("category", v, 100))
            .transpose()?,
        quantity: req.quantity,
        price_cents: req.price_cents,
        expiry_date: req.expiry_date,
    };

    let item = state.db.inventory().update(auth.pharmacy_id(), &id, update).await?;

    state
        .db
        .activity()
        .log(
            auth.pharmacy_id(),
            ActivityType::Inventory,
            format!("Updated {} (batch {})", item.name, item.batch),
            Some(auth.id()),
        )
        .await?;

    let thresholds = thresholds(&state, auth.pharmacy_id()).await?;
    Ok(Json(ItemWithStatus::new(item, today(), &thresholds)))
}

async fn adjust(
    State(state): State<SharedState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<String>,
    ApiJson(req): ApiJson<AdjustRequest>,
) -> ApiResult<Json<ItemWithStatus>> {
    auth.require(Module::Inventory, Action::Edit)?;

    if req.delta == 0 {
        return Err(ApiError::validation("delta must not be zero"));
    }
    validate_range("delta", req.delta, -MAX_ADJUSTMENT, MAX_ADJUSTMENT)?;
    let reason = non_blank(&req.reason)
        .map(|r| validate_text("reason", r, 200))
        .transpose()?;

    let item = state.db.inventory().adjust(auth.pharmacy_id(), &id, req.delta).await?;

    let mut message = format!("Adjusted {} by {:+} to {}", item.name, req.delta, item.quantity);
    if let Some(reason) = reason {
        message.push_str(&format!(" ({})", reason));
    }
    state
        .db
        .activity()
        .log(auth.pharmacy_id(), ActivityType::Inventory, message, Some(auth.id()))
        .await?;

    let thresholds = thresholds(&state, auth.pharmacy_id()).await?;
    Ok(Json(ItemWithStatus::new(item, today(), &thresholds)))
}

async fn delete(
    State(state): State<SharedState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<StatusCode> {
    auth.require(Module::Inventory, Action::Delete)?;

    let item = state.db.inventory().require(auth.pharmacy_id(), &id).await?;
    state.db.inventory().delete(auth.pharmacy_id(), &id).await?;

    state
        .db
        .activity()
        .log(
            auth.pharmacy_id(),
            ActivityType::Inventory,
            format!("Deleted {} (batch {})", item.name, item.batch),
            Some(auth.id()),
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
