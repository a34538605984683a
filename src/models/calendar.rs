// src/models/calendar.rs
use crate::error::{AppError, AppResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Holiday {
    pub date: NaiveDate,
    pub reason: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SemesterDetails {
    pub semester_name: String,
    pub semester_start_date: NaiveDate,
    pub semester_end_date: NaiveDate,
}

/// Raw `system_config` row.
#[derive(Debug, Clone, FromRow)]
pub struct SystemConfigRow {
    pub grace_period: String,
    pub auto_lockout: String,
    pub late_mark_threshold: i64,
}

/// Attendance tunables, passed explicitly to every resolver call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceConfig {
    /// Minutes after 09:00 still counted as on time.
    pub grace_minutes: i64,
    /// Minutes after the grace deadline still counted as late instead of absent.
    pub lockout_minutes: i64,
    /// Number of late marks at which a person is flagged, 0 disables the flag.
    pub late_mark_threshold: i64,
}

/// Splits "HH:MM:SS" (seconds optional) into hours and minutes.
fn parse_hms(field: &'static str, raw: &str) -> AppResult<(i64, i64)> {
    let parts: Vec<&str> = raw.trim().split(':').collect();
    if parts.len() < 2 || parts.len() > 3 {
        return Err(AppError::Config(format!("{field} '{raw}' is not HH:MM:SS")));
    }
    let mut numbers = Vec::with_capacity(parts.len());
    for part in &parts {
        let n: i64 = part
            .parse()
            .map_err(|_| AppError::Config(format!("{field} '{raw}' is not HH:MM:SS")))?;
        if n < 0 {
            return Err(AppError::Config(format!("{field} '{raw}' is negative")));
        }
        numbers.push(n);
    }
    Ok((numbers[0], numbers[1]))
}

impl TryFrom<SystemConfigRow> for AttendanceConfig {
    type Error = AppError;

    fn try_from(row: SystemConfigRow) -> AppResult<Self> {
        // Only the minutes component of the grace period is honoured
        let (_, grace_minutes) = parse_hms("grace_period", &row.grace_period)?;
        let (lock_h, lock_m) = parse_hms("auto_lockout", &row.auto_lockout)?;
        Ok(AttendanceConfig {
            grace_minutes,
            lockout_minutes: lock_h * 60 + lock_m,
            late_mark_threshold: row.late_mark_threshold.max(0),
        })
    }
}
