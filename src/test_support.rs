// src/test_support.rs
//! Fixtures shared by the database-backed tests.
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::time::Duration;
use tempfile::TempDir;

pub const COLLEGE: &str = "Main Campus";

/// Fresh in-memory database with the schema applied. A single long-lived
/// connection keeps the in-memory database alive for the whole test.
pub async fn pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("failed to open in-memory sqlite");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("failed to run migrations");

    pool
}

/// File-backed database for tests that need several connections at once.
/// Keep the returned `TempDir` alive for as long as the pool is used.
pub async fn file_pool(max_connections: u32) -> (TempDir, SqlitePool) {
    let dir = TempDir::new().expect("failed to create tempdir");
    let options = SqliteConnectOptions::new()
        .filename(dir.path().join("attendance.db"))
        .create_if_missing(true)
        .busy_timeout(Duration::from_secs(10));
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .expect("failed to open sqlite file");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("failed to run migrations");

    (dir, pool)
}

#[derive(Debug, Clone)]
pub struct PersonSeed {
    pub id: String,
    pub sin_number: String,
    pub name: String,
    pub role: String,
    pub position_1: Option<String>,
    pub position_2: Option<String>,
    pub department: String,
    pub year: Option<i64>,
    pub college: String,
    pub mentor: Option<String>,
    pub class_advisor: Option<String>,
}

impl PersonSeed {
    pub fn student(sin: &str, department: &str, year: i64) -> Self {
        PersonSeed {
            id: format!("id-{sin}"),
            sin_number: sin.into(),
            name: format!("Student {sin}"),
            role: "student".into(),
            position_1: None,
            position_2: None,
            department: department.into(),
            year: Some(year),
            college: COLLEGE.into(),
            mentor: None,
            class_advisor: None,
        }
    }

    pub fn staff(sin: &str, department: &str, role: &str) -> Self {
        PersonSeed {
            id: format!("id-{sin}"),
            sin_number: sin.into(),
            name: format!("Staff {sin}"),
            role: role.into(),
            position_1: None,
            position_2: None,
            department: department.into(),
            year: None,
            college: COLLEGE.into(),
            mentor: None,
            class_advisor: None,
        }
    }

    pub fn with_year(mut self, year: i64) -> Self {
        self.year = Some(year);
        self
    }
}

pub async fn seed_person(pool: &SqlitePool, seed: PersonSeed) {
    sqlx::query(
        r#"
        INSERT INTO users (id, sin_number, name, email, role, position_1, position_2,
                           department, year, college, mentor, class_advisor)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
    )
    .bind(&seed.id)
    .bind(&seed.sin_number)
    .bind(&seed.name)
    .bind(format!("{}@example.edu", seed.sin_number.to_lowercase()))
    .bind(&seed.role)
    .bind(&seed.position_1)
    .bind(&seed.position_2)
    .bind(&seed.department)
    .bind(seed.year)
    .bind(&seed.college)
    .bind(&seed.mentor)
    .bind(&seed.class_advisor)
    .execute(pool)
    .await
    .expect("failed to seed person");
}

pub async fn seed_config(pool: &SqlitePool, grace: &str, lockout: &str) {
    sqlx::query("INSERT INTO system_config (grace_period, auto_lockout, late_mark_threshold) VALUES (?1, ?2, 2)")
        .bind(grace)
        .bind(lockout)
        .execute(pool)
        .await
        .expect("failed to seed config");
}

pub async fn seed_holiday(pool: &SqlitePool, date: &str) {
    sqlx::query("INSERT INTO holidays (date, reason) VALUES (?1, 'holiday')")
        .bind(date)
        .execute(pool)
        .await
        .expect("failed to seed holiday");
}

/// `at` is "YYYY-MM-DD HH:MM:SS".
pub async fn seed_log(pool: &SqlitePool, sin: &str, at: &str, direction: &str) {
    sqlx::query("INSERT INTO device_logs (UserId, LogDate, C1) VALUES (?1, ?2, ?3)")
        .bind(sin)
        .bind(at)
        .bind(direction)
        .execute(pool)
        .await
        .expect("failed to seed device log");
}

/// Full day in at 08:50 and out at 17:00.
pub async fn seed_full_day(pool: &SqlitePool, sin: &str, date: &str) {
    seed_log(pool, sin, &format!("{date} 08:50:00"), "in").await;
    seed_log(pool, sin, &format!("{date} 17:00:00"), "out").await;
}

/// Inserts a leave whose hod and principal slots are approved.
pub async fn seed_approved_leave(
    pool: &SqlitePool,
    request_id: &str,
    sin: &str,
    request_type: &str,
    start: &str,
    end: Option<&str>,
) {
    sqlx::query(
        r#"
        INSERT INTO leave_requests (request_id, sin_number, department, request_type, reason,
                                    start_date, end_date, requester_class,
                                    hod_approval, principal_approval, status)
        VALUES (?1, ?2, 'CSE', ?3, 'seeded', ?4, ?5, 'student', 'approved', 'approved', 'approved')
        "#,
    )
    .bind(request_id)
    .bind(sin)
    .bind(request_type)
    .bind(start)
    .bind(end)
    .execute(pool)
    .await
    .expect("failed to seed leave");
}
