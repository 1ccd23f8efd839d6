//! Checkout and sale history.
//!
//! ```text
//! POST /api/sales
//!   │
//!   ├── load cart items (tenant-scoped)
//!   ├── plan_sale: merge lines, reject expired / short stock, price lines
//!   └── record_sale: one transaction (decrement, insert, dispense, log)
//! ```

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{non_blank, today};
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiQuery};
use crate::SharedState;
use medtrack_core::permissions::Action;
use medtrack_core::reports::DateRange;
use medtrack_core::sale::{plan_sale, PlannedLine, SaleLine};
use medtrack_core::{Module, Sale, SaleDetail};
use medtrack_db::SaleFilter;

const DEFAULT_SALE_LIMIT: i64 = 100;
const MAX_SALE_LIMIT: i64 = 1000;

pub fn routes() -> Router<SharedState> {
    Router::new().route("/api/sales", get(list).post(create))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    pub user_id: Option<String>,
    pub item_id: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSaleRequest {
    pub items: Vec<SaleLine>,
    pub prescription_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleReceipt {
    pub sales: Vec<Sale>,
    pub lines: Vec<PlannedLine>,
    pub total_cents: i64,
    pub prescription_id: Option<String>,
}

async fn list(
    State(state): State<SharedState>,
    auth: AuthUser,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult<Json<Vec<SaleDetail>>> {
    auth.require(Module::Sales, Action::View)?;

    let from = non_blank(&query.from);
    let to = non_blank(&query.to);
    let mut filter = match (from, to) {
        (None, None) => SaleFilter::default(),
        _ => SaleFilter::for_range(&DateRange::parse(from, to, today())?),
    };
    filter.user_id = non_blank(&query.user_id).map(str::to_string);
    filter.item_id = non_blank(&query.item_id).map(str::to_string);
    filter.limit = Some(query.limit.unwrap_or(DEFAULT_SALE_LIMIT).clamp(1, MAX_SALE_LIMIT));

    let sales = state.db.sales().list(auth.pharmacy_id(), &filter).await?;
    Ok(Json(sales))
}

async fn create(
    State(state): State<SharedState>,
    auth: AuthUser,
    ApiJson(req): ApiJson<CreateSaleRequest>,
) -> ApiResult<(StatusCode, Json<SaleReceipt>)> {
    auth.require(Module::Sales, Action::Edit)?;

    let prescription_id = non_blank(&req.prescription_id).map(str::to_string);

    let ids: Vec<String> = req.items.iter().map(|line| line.item_id.clone()).collect();
    let items = state.db.inventory().get_many(auth.pharmacy_id(), &ids).await?;
    debug!(requested = ids.len(), found = items.len(), "Planning sale");

    let plan = plan_sale(&req.items, prescription_id, today(), |id| {
        items.iter().find(|item| item.id == id)
    })?;

    let sales = state
        .db
        .sales()
        .record_sale(auth.pharmacy_id(), auth.id(), &plan)
        .await?;

    let receipt = SaleReceipt {
        total_cents: plan.total().cents(),
        sales,
        lines: plan.lines,
        prescription_id: plan.prescription_id,
    };
    Ok((StatusCode::CREATED, Json(receipt)))
}
