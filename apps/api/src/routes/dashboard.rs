use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use super::today;
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::SharedState;
use medtrack_core::permissions::Action;
use medtrack_core::Module;
use medtrack_db::DashboardSummary;

pub fn routes() -> Router<SharedState> {
    Router::new().route("/api/dashboard", get(summary))
}

async fn summary(State(state): State<SharedState>, auth: AuthUser) -> ApiResult<Json<DashboardSummary>> {
    auth.require(Module::Dashboard, Action::View)?;
    let summary = state.db.dashboard().summary(auth.pharmacy_id(), today()).await?;
    Ok(Json(summary))
}
