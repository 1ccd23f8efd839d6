use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{delete, get};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;

use super::{non_blank, today};
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::SharedState;
use medtrack_core::permissions::Action;
use medtrack_core::reports::DateRange;
use medtrack_core::validation::{parse_date, validate_expense_amount, validate_text};
use medtrack_core::{ActivityType, Expense, Module};
use medtrack_db::{ExpenseFilter, NewExpense};

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/api/expenses", get(list).post(create))
        .route("/api/expenses/{id}", delete(remove))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequest {
    pub category: String,
    pub amount_cents: i64,
    pub description: Option<String>,
    /// Defaults to today.
    pub date: Option<NaiveDate>,
}

async fn list(
    State(state): State<SharedState>,
    auth: AuthUser,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult<Json<Vec<Expense>>> {
    auth.require(Module::Expenses, Action::View)?;

    let filter = ExpenseFilter {
        from: non_blank(&query.from).map(|v| parse_date("from", v)).transpose()?,
        to: non_blank(&query.to).map(|v| parse_date("to", v)).transpose()?,
        category: non_blank(&query.category).map(str::to_string),
    };
    if let (Some(from), Some(to)) = (filter.from, filter.to) {
        DateRange::new(from, to)?;
    }

    let expenses = state.db.expenses().list(auth.pharmacy_id(), &filter).await?;
    Ok(Json(expenses))
}

async fn create(
    State(state): State<SharedState>,
    auth: AuthUser,
    ApiJson(req): ApiJson<CreateRequest>,
) -> ApiResult<(StatusCode, Json<Expense>)> {
    auth.require(Module::Expenses, Action::Edit)?;

    validate_expense_amount(req.amount_cents)?;
    let new = NewExpense {
        category: validate_text("category", &req.category, 100)?,
        amount_cents: req.amount_cents,
        description: non_blank(&req.description)
            .map(|v| validate_text("description", v, 500))
            .transpose()?,
        date: req.date.unwrap_or_else(today),
    };

    let expense = state.db.expenses().create(auth.pharmacy_id(), auth.id(), new).await?;

    state
        .db
        .activity()
        .log(
            auth.pharmacy_id(),
            ActivityType::Expense,
            format!("Recorded {} expense of {}", expense.category, expense.amount()),
            Some(auth.id()),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(expense)))
}

async fn remove(
    State(state): State<SharedState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<StatusCode> {
    auth.require(Module::Expenses, Action::Delete)?;

    let expense = state.db.expenses().delete(auth.pharmacy_id(), &id).await?;

    state
        .db
        .activity()
        .log(
            auth.pharmacy_id(),
            ActivityType::Expense,
            format!("Deleted {} expense of {} ({})", expense.category, expense.amount(), expense.date),
            Some(auth.id()),
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
