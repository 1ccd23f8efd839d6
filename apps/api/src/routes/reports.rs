//! Read-only reports. Date ranges are inclusive calendar days and default
//! to the last 30 days ending today.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::debug;

use super::{non_blank, today};
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::extract::ApiQuery;
use crate::SharedState;
use medtrack_core::inventory::{annotate, InventoryThresholds};
use medtrack_core::permissions::Action;
use medtrack_core::reports::{
    inventory_report, profit_and_loss, sales_by_period, top_items, DateRange, InventoryReport, PeriodBucket,
    ProfitAndLoss, TopItem,
};
use medtrack_core::validation::validate_range;
use medtrack_core::{Module, ReportPeriod};
use medtrack_db::InventoryFilter;

const DEFAULT_TOP_ITEMS: i64 = 10;
const MAX_TOP_ITEMS: i64 = 100;

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/api/reports/profit-loss", get(profit_loss))
        .route("/api/reports/sales", get(sales))
        .route("/api/reports/top-items", get(top))
        .route("/api/reports/inventory", get(inventory))
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    pub period: Option<String>,
    pub limit: Option<i64>,
}

impl ReportQuery {
    fn range(&self) -> ApiResult<DateRange> {
        Ok(DateRange::parse(non_blank(&self.from), non_blank(&self.to), today())?)
    }
}

async fn profit_loss(
    State(state): State<SharedState>,
    auth: AuthUser,
    ApiQuery(query): ApiQuery<ReportQuery>,
) -> ApiResult<Json<ProfitAndLoss>> {
    auth.require(Module::Reports, Action::View)?;

    let range = query.range()?;
    let sales = state.db.sales().in_range(auth.pharmacy_id(), &range).await?;
    let expenses = state.db.expenses().in_range(auth.pharmacy_id(), &range).await?;
    debug!(sales = sales.len(), expenses = expenses.len(), days = range.days(), "Building profit and loss");

    Ok(Json(profit_and_loss(range, &sales, &expenses)))
}

async fn sales(
    State(state): State<SharedState>,
    auth: AuthUser,
    ApiQuery(query): ApiQuery<ReportQuery>,
) -> ApiResult<Json<Vec<PeriodBucket>>> {
    auth.require(Module::Reports, Action::View)?;

    let period = non_blank(&query.period)
        .map(str::parse::<ReportPeriod>)
        .transpose()?
        .unwrap_or_default();
    let range = query.range()?;
    let sales = state.db.sales().in_range(auth.pharmacy_id(), &range).await?;

    Ok(Json(sales_by_period(&sales, period)))
}

async fn top(
    State(state): State<SharedState>,
    auth: AuthUser,
    ApiQuery(query): ApiQuery<ReportQuery>,
) -> ApiResult<Json<Vec<TopItem>>> {
    auth.require(Module::Reports, Action::View)?;

    let limit = query.limit.unwrap_or(DEFAULT_TOP_ITEMS);
    validate_range("limit", limit, 1, MAX_TOP_ITEMS)?;
    let range = query.range()?;
    let sales = state.db.sales().in_range(auth.pharmacy_id(), &range).await?;

    Ok(Json(top_items(&sales, limit as usize)))
}

async fn inventory(State(state): State<SharedState>, auth: AuthUser) -> ApiResult<Json<InventoryReport>> {
    auth.require(Module::Reports, Action::View)?;

    let items = state
        .db
        .inventory()
        .list(auth.pharmacy_id(), &InventoryFilter::default())
        .await?;
    let settings = state.db.settings().alerts(auth.pharmacy_id()).await?;
    let annotated = annotate(items, today(), &InventoryThresholds::from(&settings));

    Ok(Json(inventory_report(&annotated)))
}
