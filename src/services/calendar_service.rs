// src/services/calendar_service.rs
use crate::{
    error::{AppError, AppResult},
    models::{
        attendance::{MonthSpec, WeekSpec, WeekendPolicy, Window},
        calendar::{AttendanceConfig, Holiday, SemesterDetails, SystemConfigRow},
    },
};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use sqlx::SqlitePool;
use std::collections::BTreeSet;

/// Institution-wide holiday dates.
#[derive(Debug, Clone, Default)]
pub struct HolidaySet(BTreeSet<NaiveDate>);

impl HolidaySet {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.0.contains(&date)
    }
}

impl FromIterator<NaiveDate> for HolidaySet {
    fn from_iter<I: IntoIterator<Item = NaiveDate>>(iter: I) -> Self {
        HolidaySet(iter.into_iter().collect())
    }
}

pub fn is_holiday(date: NaiveDate, holidays: &HolidaySet) -> bool {
    holidays.contains(date)
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Every calendar day in `[start, end]`.
pub fn days_inclusive(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |d| *d <= end)
}

pub fn is_working_day(date: NaiveDate, holidays: &HolidaySet, policy: WeekendPolicy) -> bool {
    if holidays.contains(date) {
        return false;
    }
    match policy {
        WeekendPolicy::CountWeekends => true,
        WeekendPolicy::SkipWeekends => !is_weekend(date),
    }
}

pub fn working_dates(
    start: NaiveDate,
    end: NaiveDate,
    holidays: &HolidaySet,
    policy: WeekendPolicy,
) -> Vec<NaiveDate> {
    days_inclusive(start, end)
        .filter(|d| is_working_day(*d, holidays, policy))
        .collect()
}

pub fn working_days(
    start: NaiveDate,
    end: NaiveDate,
    holidays: &HolidaySet,
    policy: WeekendPolicy,
) -> i64 {
    days_inclusive(start, end)
        .filter(|d| is_working_day(*d, holidays, policy))
        .count() as i64
}

const MONTH_NAMES: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

pub fn parse_month(spec: &MonthSpec) -> AppResult<u32> {
    let month = match spec {
        MonthSpec::Number(n) => *n,
        MonthSpec::Name(name) => {
            let name = name.trim().to_ascii_lowercase();
            if let Ok(n) = name.parse::<u32>() {
                n
            } else {
                MONTH_NAMES
                    .iter()
                    .position(|m| name.len() >= 3 && m.starts_with(name.as_str()))
                    .map(|i| i as u32 + 1)
                    .ok_or_else(|| AppError::validation("month", format!("unknown month '{name}'")))?
            }
        }
    };
    if !(1..=12).contains(&month) {
        return Err(AppError::validation("month", format!("month {month} out of range")));
    }
    Ok(month)
}

pub fn parse_week(spec: &WeekSpec) -> AppResult<u32> {
    let week = match spec {
        WeekSpec::Number(n) => *n,
        WeekSpec::Ordinal(raw) => {
            let raw = raw.trim().to_ascii_lowercase();
            let word = raw.trim_end_matches(" week").trim();
            match word {
                "1" | "1st" | "first" => 1,
                "2" | "2nd" | "second" => 2,
                "3" | "3rd" | "third" => 3,
                "4" | "4th" | "fourth" => 4,
                "5" | "5th" | "fifth" => 5,
                _ => return Err(AppError::validation("week", format!("unknown week '{raw}'"))),
            }
        }
    };
    if !(1..=5).contains(&week) {
        return Err(AppError::validation("week", format!("week {week} out of range")));
    }
    Ok(week)
}

fn month_bounds(year: i32, month: u32) -> AppResult<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| AppError::validation("year", format!("invalid year {year}")))?;
    let next_first = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(|| AppError::validation("year", format!("invalid year {year}")))?;
    Ok((first, next_first - Duration::days(1)))
}

/// Week n of a month spans days (n-1)*7+1 ..= n*7, clipped to the month end.
pub fn week_of_month_range(year: i32, month: u32, week: u32) -> AppResult<(NaiveDate, NaiveDate)> {
    let (first, last) = month_bounds(year, month)?;
    let start = first + Duration::days(((week - 1) * 7) as i64);
    if start > last {
        return Err(AppError::validation(
            "week",
            format!("week {week} does not exist in {year}-{month:02}"),
        ));
    }
    let end = (start + Duration::days(6)).min(last);
    Ok((start, end))
}

/// Turns a window into concrete inclusive bounds. `semester` is only consulted for
/// semester windows.
pub fn resolve_window(
    window: &Window,
    today: NaiveDate,
    semester: Option<&SemesterDetails>,
) -> AppResult<(NaiveDate, NaiveDate)> {
    let (start, end) = match window {
        Window::Day { date } => (*date, *date),
        Window::Range {
            start_date,
            end_date,
        } => {
            if end_date < start_date {
                return Err(AppError::validation("end_date", "end date is before start date"));
            }
            (*start_date, *end_date)
        }
        Window::WeekOfMonth { year, month, week } => {
            week_of_month_range(*year, parse_month(month)?, parse_week(week)?)?
        }
        Window::Month { year, month } => month_bounds(*year, parse_month(month)?)?,
        Window::SemesterToDate => {
            let semester = semester.ok_or_else(|| AppError::NotFound("active semester".into()))?;
            (
                semester.semester_start_date,
                semester.semester_end_date.min(today),
            )
        }
    };
    Ok((start, end))
}

/// Bounds clipped so that no future day is evaluated.
pub fn clamp_to_today(start: NaiveDate, end: NaiveDate, today: NaiveDate) -> AppResult<(NaiveDate, NaiveDate)> {
    if start > today {
        return Err(AppError::validation("window", "window lies entirely in the future"));
    }
    Ok((start, end.min(today)))
}

// --- Reference data loaders ---

pub async fn load_holidays(db_pool: &SqlitePool, start: NaiveDate, end: NaiveDate) -> AppResult<HolidaySet> {
    let holidays = sqlx::query_as::<_, Holiday>(
        "SELECT date, reason FROM holidays WHERE date BETWEEN ?1 AND ?2 ORDER BY date",
    )
    .bind(start)
    .bind(end)
    .fetch_all(db_pool)
    .await?;
    tracing::debug!("{} holidays between {} and {}", holidays.len(), start, end);
    Ok(holidays.into_iter().map(|h| h.date).collect())
}

/// Loads the active configuration row. Its absence is a server misconfiguration.
pub async fn load_attendance_config(db_pool: &SqlitePool) -> AppResult<AttendanceConfig> {
    let row = sqlx::query_as::<_, SystemConfigRow>(
        "SELECT grace_period, auto_lockout, late_mark_threshold FROM system_config ORDER BY id DESC LIMIT 1",
    )
    .fetch_optional(db_pool)
    .await?;

    match row {
        Some(row) => AttendanceConfig::try_from(row),
        None => {
            tracing::error!("system_config has no rows, attendance cannot be evaluated");
            Err(AppError::Config("system configuration is missing".into()))
        }
    }
}

pub async fn find_active_semester(db_pool: &SqlitePool, today: NaiveDate) -> AppResult<Option<SemesterDetails>> {
    let semester = sqlx::query_as::<_, SemesterDetails>(
        r#"
        SELECT semester_name, semester_start_date, semester_end_date
        FROM semester_details
        WHERE semester_start_date <= ?1 AND semester_end_date >= ?1
        ORDER BY semester_start_date DESC
        LIMIT 1
        "#,
    )
    .bind(today)
    .fetch_optional(db_pool)
    .await?;
    Ok(semester)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn working_days_without_holidays_counts_every_day() {
        let cases = [("2024-03-01", "2024-03-01"), ("2024-03-01", "2024-03-31"), ("2024-02-25", "2024-03-05")];
        for (s, e) in cases {
            let expected = (d(e) - d(s)).num_days() + 1;
            assert_eq!(
                working_days(d(s), d(e), &HolidaySet::default(), WeekendPolicy::CountWeekends),
                expected
            );
        }
    }

    #[test]
    fn holidays_are_excluded_from_working_days() {
        let holidays: HolidaySet = [d("2024-03-05"), d("2024-03-07"), d("2024-04-01")].into_iter().collect();
        assert_eq!(
            working_days(d("2024-03-04"), d("2024-03-08"), &holidays, WeekendPolicy::CountWeekends),
            3
        );
        assert!(is_holiday(d("2024-03-05"), &holidays));
        assert!(!is_holiday(d("2024-03-06"), &holidays));
    }

    // The legacy overall view skipped weekends while every other view counts them.
    // Both are kept; this pins the difference.
    #[test]
    fn weekend_policy_changes_the_count() {
        let holidays = HolidaySet::default();
        // 2024-03-04 is a Monday
        let (s, e) = (d("2024-03-04"), d("2024-03-17"));
        assert_eq!(working_days(s, e, &holidays, WeekendPolicy::CountWeekends), 14);
        assert_eq!(working_days(s, e, &holidays, WeekendPolicy::SkipWeekends), 10);
        assert!(working_dates(s, e, &holidays, WeekendPolicy::SkipWeekends)
            .iter()
            .all(|d| !is_weekend(*d)));
    }

    #[test]
    fn week_of_month_is_clipped_to_month_end() {
        assert_eq!(week_of_month_range(2024, 2, 1).unwrap(), (d("2024-02-01"), d("2024-02-07")));
        assert_eq!(week_of_month_range(2024, 2, 5).unwrap(), (d("2024-02-29"), d("2024-02-29")));
        assert_eq!(week_of_month_range(2024, 3, 5).unwrap(), (d("2024-03-29"), d("2024-03-31")));
        assert!(week_of_month_range(2023, 2, 5).is_err());
    }

    #[test]
    fn month_and_week_names_parse() {
        assert_eq!(parse_month(&MonthSpec::Name("Sept".into())).unwrap(), 9);
        assert_eq!(parse_month(&MonthSpec::Name("december".into())).unwrap(), 12);
        assert_eq!(parse_month(&MonthSpec::Number(4)).unwrap(), 4);
        assert!(parse_month(&MonthSpec::Number(13)).is_err());
        assert_eq!(parse_week(&WeekSpec::Ordinal("3rd".into())).unwrap(), 3);
        assert_eq!(parse_week(&WeekSpec::Ordinal("Second week".into())).unwrap(), 2);
        assert!(parse_week(&WeekSpec::Number(6)).is_err());
    }

    #[test]
    fn resolve_window_variants() {
        let today = d("2024-03-20");
        assert_eq!(
            resolve_window(&Window::Month { year: 2024, month: MonthSpec::Number(2) }, today, None).unwrap(),
            (d("2024-02-01"), d("2024-02-29"))
        );
        let backwards = Window::Range { start_date: d("2024-03-10"), end_date: d("2024-03-01") };
        assert!(matches!(
            resolve_window(&backwards, today, None),
            Err(AppError::Validation { field: "end_date", .. })
        ));

        let semester = SemesterDetails {
            semester_name: "Even".into(),
            semester_start_date: d("2024-01-02"),
            semester_end_date: d("2024-05-31"),
        };
        assert_eq!(
            resolve_window(&Window::SemesterToDate, today, Some(&semester)).unwrap(),
            (d("2024-01-02"), today)
        );
        assert!(matches!(
            resolve_window(&Window::SemesterToDate, today, None),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn future_windows_are_clamped_or_rejected() {
        let today = d("2024-03-20");
        assert_eq!(
            clamp_to_today(d("2024-03-01"), d("2024-03-31"), today).unwrap(),
            (d("2024-03-01"), today)
        );
        assert!(clamp_to_today(d("2024-04-01"), d("2024-04-30"), today).is_err());
    }

    #[tokio::test]
    async fn loads_reference_data() {
        let pool = test_support::pool().await;
        test_support::seed_config(&pool, "00:15:00", "01:00:00").await;
        test_support::seed_holiday(&pool, "2024-03-08").await;
        test_support::seed_holiday(&pool, "2024-05-01").await;
        sqlx::query(
            "INSERT INTO semester_details (semester_name, semester_start_date, semester_end_date) VALUES
             ('Odd', '2023-07-01', '2023-12-15'), ('Even', '2024-01-02', '2024-05-31')",
        )
        .execute(&pool)
        .await
        .unwrap();

        let config = load_attendance_config(&pool).await.unwrap();
        assert_eq!(config.grace_minutes, 15);
        assert_eq!(config.lockout_minutes, 60);

        let holidays = load_holidays(&pool, d("2024-03-01"), d("2024-03-31")).await.unwrap();
        assert!(holidays.contains(d("2024-03-08")));
        assert!(!holidays.contains(d("2024-03-09")));

        let semester = find_active_semester(&pool, d("2024-03-20")).await.unwrap().unwrap();
        assert_eq!(semester.semester_name, "Even");
        assert!(find_active_semester(&pool, d("2024-06-20")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_config_is_reported() {
        let pool = test_support::pool().await;
        let err = load_attendance_config(&pool).await.unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
