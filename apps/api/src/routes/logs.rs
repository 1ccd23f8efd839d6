use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use super::non_blank;
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::extract::ApiQuery;
use crate::SharedState;
use medtrack_core::permissions::Action;
use medtrack_core::{ActivityLog, ActivityType, Module};
use medtrack_db::ActivityFilter;

const DEFAULT_LOG_LIMIT: i64 = 200;
const MAX_LOG_LIMIT: i64 = 1000;

pub fn routes() -> Router<SharedState> {
    Router::new().route("/api/logs", get(list))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogQuery {
    #[serde(rename = "type")]
    pub activity_type: Option<String>,
    pub user_id: Option<String>,
    pub limit: Option<i64>,
}

/// Newest entries first.
async fn list(
    State(state): State<SharedState>,
    auth: AuthUser,
    ApiQuery(query): ApiQuery<LogQuery>,
) -> ApiResult<Json<Vec<ActivityLog>>> {
    auth.require(Module::Logs, Action::View)?;

    let filter = ActivityFilter {
        activity_type: non_blank(&query.activity_type)
            .map(str::parse::<ActivityType>)
            .transpose()?,
        user_id: non_blank(&query.user_id).map(str::to_string),
        limit: Some(query.limit.unwrap_or(DEFAULT_LOG_LIMIT).clamp(1, MAX_LOG_LIMIT)),
    };

    let logs = state.db.activity().list(auth.pharmacy_id(), &filter).await?;
    Ok(Json(logs))
}
