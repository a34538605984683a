// src/web/attendance_handlers.rs
use crate::{
    error::{AppError, AppResult},
    models::attendance::{AttendanceQuery, AttendanceReport, DailyRecord, PopulationKind, RosterEntry},
    services::attendance_service,
    state::AppState,
    web::mw_actor::Actor,
};
use axum::extract::{Extension, Json, Path, Query, State};
use chrono::NaiveDate;
use serde::Deserialize;

fn parse_date(field: &'static str, raw: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::validation(field, format!("'{raw}' is not a YYYY-MM-DD date")))
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// POST /attendance/query
pub async fn handle_attendance_query(
    State(state): State<AppState>,
    Extension(Actor(actor)): Extension<Actor>,
    Json(query): Json<AttendanceQuery>,
) -> AppResult<Json<AttendanceReport>> {
    tracing::debug!("POST /attendance/query by {}", actor.sin_number);
    let report = attendance_service::run_query(&state.db_pool, &query, today()).await?;
    Ok(Json(report))
}

/// GET /attendance/{sin}/day/{date}
pub async fn handle_person_day(
    State(state): State<AppState>,
    Path((sin_number, date)): Path<(String, String)>,
) -> AppResult<Json<DailyRecord>> {
    let date = parse_date("date", &date)?;
    let record = attendance_service::person_day_record(&state.db_pool, &sin_number, date).await?;
    Ok(Json(record))
}

#[derive(Deserialize, Debug)]
pub struct RosterParams {
    department: String,
    #[serde(default)]
    year: Option<i64>,
    date: String,
    #[serde(default)]
    population: Option<PopulationKind>,
}

/// GET /attendance/roster?department=&year=&date=
pub async fn handle_roster(
    State(state): State<AppState>,
    Query(params): Query<RosterParams>,
) -> AppResult<Json<Vec<RosterEntry>>> {
    let date = parse_date("date", &params.date)?;
    let roster = attendance_service::daily_roster(
        &state.db_pool,
        &params.department,
        params.year,
        params.population.unwrap_or(PopulationKind::Students),
        date,
    )
    .await?;
    Ok(Json(roster))
}
