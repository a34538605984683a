// src/services/attendance_service.rs
use crate::{
    error::{AppError, AppResult},
    models::{
        attendance::{
            ApprovalGate, AttendanceQuery, AttendanceReport, DailyRecord, DeviceLog, Granularity, GroupSummary,
            PeriodSummary, PersonSummary, PopulationKind, PresencePolicy, RosterEntry, Scope, StatusCounts,
            WeekendPolicy, Window,
        },
        calendar::AttendanceConfig,
        leave::LeaveRequest,
        person::Person,
    },
    services::{
        calendar_service::{self, HolidaySet},
        daily_status::{self, ResolverContext},
        leave_index::LeaveIndex,
        person_service,
    },
};
use chrono::{Datelike, Duration, NaiveDate};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::{BTreeMap, HashMap};

/// Keeps each `IN (...)` list well below SQLite's bind parameter limit.
const IN_CHUNK: usize = 500;

/// round(100 * credited / (population * working_days)), 0 when the denominator is 0.
pub fn attendance_percentage(credited: i64, population: usize, working_days: i64) -> i64 {
    let denominator = population as i64 * working_days;
    if denominator <= 0 {
        return 0;
    }
    (100.0 * credited as f64 / denominator as f64).round() as i64
}

fn default_gate(kind: PopulationKind) -> ApprovalGate {
    match kind {
        PopulationKind::Students => ApprovalGate::Principal,
        PopulationKind::Staff => ApprovalGate::Hod,
    }
}

fn kind_of(person: &Person) -> PopulationKind {
    if person.is_staff_like() {
        PopulationKind::Staff
    } else {
        PopulationKind::Students
    }
}

// --- Bulk fetches ---

pub async fn fetch_logs(
    db_pool: &SqlitePool,
    sin_numbers: &[String],
    start: NaiveDate,
    end: NaiveDate,
) -> AppResult<Vec<DeviceLog>> {
    let lower = format!("{} 00:00:00", start.format("%Y-%m-%d"));
    let upper = format!("{} 00:00:00", (end + Duration::days(1)).format("%Y-%m-%d"));
    let mut logs = Vec::new();

    for chunk in sin_numbers.chunks(IN_CHUNK) {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT UserId, LogDate, C1 FROM device_logs WHERE LogDate >= ",
        );
        qb.push_bind(lower.clone())
            .push(" AND LogDate < ")
            .push_bind(upper.clone())
            .push(" AND UserId IN (");
        let mut separated = qb.separated(", ");
        for sin in chunk {
            separated.push_bind(sin.clone());
        }
        separated.push_unseparated(") ORDER BY UserId, LogDate");

        logs.extend(qb.build_query_as::<DeviceLog>().fetch_all(db_pool).await?);
    }
    tracing::debug!("fetched {} device logs for {} persons", logs.len(), sin_numbers.len());
    Ok(logs)
}

/// Non-rejected leave requests of the given persons that touch `[start, end]`.
pub async fn fetch_overlapping_leaves(
    db_pool: &SqlitePool,
    sin_numbers: &[String],
    start: NaiveDate,
    end: NaiveDate,
) -> AppResult<Vec<LeaveRequest>> {
    let mut leaves = Vec::new();
    for chunk in sin_numbers.chunks(IN_CHUNK) {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM leave_requests WHERE status != 'rejected' AND start_date <= ");
        qb.push_bind(end)
            .push(" AND COALESCE(end_date, start_date) >= ")
            .push_bind(start)
            .push(" AND sin_number IN (");
        let mut separated = qb.separated(", ");
        for sin in chunk {
            separated.push_bind(sin.clone());
        }
        separated.push_unseparated(")");

        leaves.extend(qb.build_query_as::<LeaveRequest>().fetch_all(db_pool).await?);
    }
    tracing::debug!("fetched {} leave requests overlapping {}..{}", leaves.len(), start, end);
    Ok(leaves)
}

// --- Pure aggregation ---

/// Inputs of one aggregation run, all already fetched.
pub struct Aggregation<'a> {
    pub scope: &'a Scope,
    pub kind: PopulationKind,
    pub population: &'a [Person],
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub holidays: &'a HolidaySet,
    pub logs: &'a [DeviceLog],
    pub leaves: &'a LeaveIndex,
    pub config: &'a AttendanceConfig,
    pub policy: PresencePolicy,
    pub weekend: WeekendPolicy,
    pub granularity: Option<Granularity>,
}

fn bucket_of(date: NaiveDate, granularity: Granularity, start: NaiveDate, end: NaiveDate) -> (String, NaiveDate, NaiveDate) {
    match granularity {
        Granularity::Daily => (date.format("%Y-%m-%d").to_string(), date, date),
        Granularity::Weekly => {
            let monday = date - Duration::days(date.weekday().num_days_from_monday() as i64);
            let sunday = monday + Duration::days(6);
            (monday.format("%Y-%m-%d").to_string(), monday.max(start), sunday.min(end))
        }
        Granularity::Monthly => {
            let first = date.with_day(1).unwrap_or(date);
            let last = first
                .checked_add_months(chrono::Months::new(1))
                .map(|next| next - Duration::days(1))
                .unwrap_or(date);
            (date.format("%Y-%m").to_string(), first.max(start), last.min(end))
        }
    }
}

struct Bucket {
    start: NaiveDate,
    end: NaiveDate,
    working_days: i64,
    counts: StatusCounts,
}

fn group_key(scope: &Scope, kind: PopulationKind, person: &Person) -> Option<String> {
    match scope {
        Scope::Department { year: None, .. } if kind == PopulationKind::Students => Some(
            person
                .year
                .map(|y| format!("year {y}"))
                .unwrap_or_else(|| "year unassigned".into()),
        ),
        Scope::College { .. } => Some(person.department.clone()),
        _ => None,
    }
}

pub fn aggregate(input: &Aggregation<'_>) -> AttendanceReport {
    let working = calendar_service::working_dates(input.start, input.end, input.holidays, input.weekend);
    let working_days = calendar_service::working_days(input.start, input.end, input.holidays, input.weekend);
    let holiday_days = calendar_service::days_inclusive(input.start, input.end)
        .filter(|d| input.holidays.contains(*d))
        .count() as i64;

    let mut logs_by_day: HashMap<(&str, NaiveDate), Vec<&DeviceLog>> = HashMap::new();
    for log in input.logs {
        logs_by_day
            .entry((log.user_id.as_str(), log.date()))
            .or_default()
            .push(log);
    }

    let mut buckets: BTreeMap<String, Bucket> = BTreeMap::new();
    if let Some(granularity) = input.granularity {
        for date in calendar_service::days_inclusive(input.start, input.end) {
            let (key, start, end) = bucket_of(date, granularity, input.start, input.end);
            let bucket = buckets.entry(key).or_insert(Bucket {
                start,
                end,
                working_days: 0,
                counts: StatusCounts::default(),
            });
            if calendar_service::is_working_day(date, input.holidays, input.weekend) {
                bucket.working_days += 1;
            } else if input.holidays.contains(date) {
                bucket.counts.holiday += 1;
            }
        }
    }

    let ctx = ResolverContext {
        holidays: input.holidays,
        leaves: input.leaves,
        config: input.config,
        policy: input.policy,
    };

    let mut totals = StatusCounts::default();
    let mut per_person = Vec::with_capacity(input.population.len());
    let mut groups: BTreeMap<String, (usize, StatusCounts)> = BTreeMap::new();
    let no_logs: Vec<&DeviceLog> = Vec::new();

    for person in input.population {
        let mut counts = StatusCounts::default();
        for date in &working {
            let day_logs = logs_by_day
                .get(&(person.sin_number.as_str(), *date))
                .unwrap_or(&no_logs);
            let record = daily_status::resolve_day(&ctx, &person.sin_number, *date, day_logs);
            counts.record(record.status);

            if let Some(granularity) = input.granularity {
                let (key, _, _) = bucket_of(*date, granularity, input.start, input.end);
                if let Some(bucket) = buckets.get_mut(&key) {
                    bucket.counts.record(record.status);
                }
            }
        }
        counts.holiday = holiday_days;
        totals.absorb(&counts);

        if let Some(key) = group_key(input.scope, input.kind, person) {
            let group = groups.entry(key).or_insert((0, StatusCounts::default()));
            group.0 += 1;
            group.1.absorb(&counts);
        }

        let threshold = input.config.late_mark_threshold;
        per_person.push(PersonSummary {
            sin_number: person.sin_number.clone(),
            name: person.name.clone(),
            department: person.department.clone(),
            year: person.year,
            counts,
            attendance_percentage: attendance_percentage(counts.credited(input.kind), 1, working_days),
            late_mark_exceeded: threshold > 0 && counts.late >= threshold,
        });
    }
    totals.holiday = holiday_days;

    let population_size = input.population.len();
    let time_series = buckets
        .into_iter()
        .map(|(key, bucket)| PeriodSummary {
            key,
            start: bucket.start,
            end: bucket.end,
            working_days: bucket.working_days,
            attendance_percentage: attendance_percentage(
                bucket.counts.credited(input.kind),
                population_size,
                bucket.working_days,
            ),
            counts: bucket.counts,
        })
        .collect();

    let sub_groups = groups
        .into_iter()
        .map(|(group, (size, mut counts))| {
            counts.holiday = holiday_days;
            GroupSummary {
                group,
                population_size: size,
                attendance_percentage: attendance_percentage(counts.credited(input.kind), size, working_days),
                counts,
            }
        })
        .collect();

    AttendanceReport {
        scope: input.scope.clone(),
        population: input.kind,
        start: input.start,
        end: input.end,
        working_days,
        population_size,
        attendance_percentage: attendance_percentage(totals.credited(input.kind), population_size, working_days),
        counts: totals,
        time_series,
        per_person,
        sub_groups,
    }
}

// --- Entry points ---

/// Runs an attendance query as of `today`.
pub async fn run_query(db_pool: &SqlitePool, query: &AttendanceQuery, today: NaiveDate) -> AppResult<AttendanceReport> {
    tracing::debug!("attendance query {:?} as of {}", query, today);
    let config = calendar_service::load_attendance_config(db_pool).await?;

    let semester = match query.window {
        Window::SemesterToDate => Some(
            calendar_service::find_active_semester(db_pool, today)
                .await?
                .ok_or_else(|| AppError::NotFound("active semester".into()))?,
        ),
        _ => None,
    };
    let (start, end) = calendar_service::resolve_window(&query.window, today, semester.as_ref())?;
    let (start, end) = calendar_service::clamp_to_today(start, end, today)?;

    let (population, kind) = match &query.scope {
        Scope::Person { sin_number } => {
            let person = person_service::get_person_by_sin(db_pool, sin_number).await?;
            let kind = kind_of(&person);
            (vec![person], kind)
        }
        scope => {
            let kind = query.population.unwrap_or(PopulationKind::Students);
            (person_service::find_population(db_pool, scope, kind).await?, kind)
        }
    };

    let sins: Vec<String> = population.iter().map(|p| p.sin_number.clone()).collect();
    let holidays = calendar_service::load_holidays(db_pool, start, end).await?;
    let logs = fetch_logs(db_pool, &sins, start, end).await?;
    let leaves = fetch_overlapping_leaves(db_pool, &sins, start, end).await?;
    let index = LeaveIndex::build(leaves, query.gate.unwrap_or_else(|| default_gate(kind)));

    let report = aggregate(&Aggregation {
        scope: &query.scope,
        kind,
        population: &population,
        start,
        end,
        holidays: &holidays,
        logs: &logs,
        leaves: &index,
        config: &config,
        policy: query.presence_policy.unwrap_or(PresencePolicy::CheckInOnly),
        weekend: query.weekend_policy,
        granularity: query.granularity,
    });

    tracing::info!(
        "attendance {:?} {}..{}: {} persons, {} working days, {}%",
        query.scope,
        start,
        end,
        report.population_size,
        report.working_days,
        report.attendance_percentage
    );
    Ok(report)
}

async fn strict_records(
    db_pool: &SqlitePool,
    population: &[Person],
    kind: PopulationKind,
    date: NaiveDate,
) -> AppResult<Vec<DailyRecord>> {
    let config = calendar_service::load_attendance_config(db_pool).await?;
    let sins: Vec<String> = population.iter().map(|p| p.sin_number.clone()).collect();
    let holidays = calendar_service::load_holidays(db_pool, date, date).await?;
    let logs = fetch_logs(db_pool, &sins, date, date).await?;
    let leaves = fetch_overlapping_leaves(db_pool, &sins, date, date).await?;
    let index = LeaveIndex::build(leaves, default_gate(kind));

    let ctx = ResolverContext {
        holidays: &holidays,
        leaves: &index,
        config: &config,
        policy: PresencePolicy::Strict,
    };

    Ok(population
        .iter()
        .map(|person| {
            let day_logs: Vec<&DeviceLog> = logs.iter().filter(|l| l.user_id == person.sin_number).collect();
            daily_status::resolve_day(&ctx, &person.sin_number, date, &day_logs)
        })
        .collect())
}

/// Strict single-day record for one person: check-in and check-out both required.
pub async fn person_day_record(db_pool: &SqlitePool, sin_number: &str, date: NaiveDate) -> AppResult<DailyRecord> {
    let person = person_service::get_person_by_sin(db_pool, sin_number).await?;
    let kind = kind_of(&person);
    let mut records = strict_records(db_pool, std::slice::from_ref(&person), kind, date).await?;
    records.pop().ok_or(AppError::InternalServerError)
}

/// Strict daily roster of a department (optionally one year).
pub async fn daily_roster(
    db_pool: &SqlitePool,
    department: &str,
    year: Option<i64>,
    kind: PopulationKind,
    date: NaiveDate,
) -> AppResult<Vec<RosterEntry>> {
    let scope = Scope::Department {
        department: department.to_string(),
        year,
    };
    let population = person_service::find_population(db_pool, &scope, kind).await?;
    let records = strict_records(db_pool, &population, kind, date).await?;

    Ok(population
        .into_iter()
        .zip(records)
        .map(|(person, record)| RosterEntry {
            sin_number: person.sin_number,
            name: person.name,
            record,
        })
        .collect())
}
