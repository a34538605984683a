// src/models/attendance.rs
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One badge scan, as exported by the biometric device.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DeviceLog {
    #[sqlx(rename = "UserId")]
    pub user_id: String,
    #[sqlx(rename = "LogDate")]
    pub log_date: NaiveDateTime,
    #[sqlx(rename = "C1")]
    pub c1: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    In,
    Out,
}

impl DeviceLog {
    /// `None` for markers that are neither "in" nor "out".
    pub fn direction(&self) -> Option<Direction> {
        match self.c1.trim().to_ascii_lowercase().as_str() {
            "in" => Some(Direction::In),
            "out" => Some(Direction::Out),
            _ => None,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.log_date.date()
    }

    pub fn time(&self) -> NaiveTime {
        self.log_date.time()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayStatus {
    Holiday,
    Od,
    Internship,
    Permission,
    Leave,
    Present,
    Late,
    EarlyDeparture,
    Absent,
}

/// Resolved attendance of one person on one day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub status: DayStatus,
    pub check_in: Option<NaiveTime>,
    pub check_out: Option<NaiveTime>,
    pub working_hours: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub present: i64,
    pub late: i64,
    pub early_departure: i64,
    pub absent: i64,
    pub od: i64,
    pub internship: i64,
    pub permission: i64,
    pub leave: i64,
    pub holiday: i64,
}

impl StatusCounts {
    pub fn record(&mut self, status: DayStatus) {
        match status {
            DayStatus::Present => self.present += 1,
            DayStatus::Late => self.late += 1,
            DayStatus::EarlyDeparture => self.early_departure += 1,
            DayStatus::Absent => self.absent += 1,
            DayStatus::Od => self.od += 1,
            DayStatus::Internship => self.internship += 1,
            DayStatus::Permission => self.permission += 1,
            DayStatus::Leave => self.leave += 1,
            DayStatus::Holiday => self.holiday += 1,
        }
    }

    /// Adds every counter except `holiday`, which is tracked per scope.
    pub fn absorb(&mut self, other: &StatusCounts) {
        self.present += other.present;
        self.late += other.late;
        self.early_departure += other.early_departure;
        self.absent += other.absent;
        self.od += other.od;
        self.internship += other.internship;
        self.permission += other.permission;
        self.leave += other.leave;
    }

    /// Days attended in person (on time, late, or leaving early).
    pub fn attended(&self) -> i64 {
        self.present + self.late + self.early_departure
    }

    /// Days credited toward the attendance percentage.
    pub fn credited(&self, population: PopulationKind) -> i64 {
        let base = self.attended() + self.od + self.internship;
        match population {
            PopulationKind::Staff => base + self.permission,
            PopulationKind::Students => base,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PopulationKind {
    Students,
    Staff,
}

/// Whether a day with a check-in but no check-out counts as present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresencePolicy {
    /// Both check-in and check-out are required.
    Strict,
    CheckInOnly,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeekendPolicy {
    /// Every non-holiday day is a working day.
    #[default]
    CountWeekends,
    /// Saturdays and Sundays are excluded as well. Only the legacy overall view used this.
    SkipWeekends,
}

/// Which approval slot must be approved for a leave to count in attendance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalGate {
    Principal,
    Hod,
    /// The stored aggregate status is approved.
    Final,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Daily,
    Weekly,
    Monthly,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scope {
    Person {
        sin_number: String,
    },
    Department {
        department: String,
        #[serde(default)]
        year: Option<i64>,
    },
    College {
        college: String,
        #[serde(default)]
        department: Option<String>,
    },
}

/// Month given either as 1..=12 or by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MonthSpec {
    Number(u32),
    Name(String),
}

/// Week of month given either as 1..=5 or as an ordinal ("2nd", "second").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WeekSpec {
    Number(u32),
    Ordinal(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Window {
    Day {
        date: NaiveDate,
    },
    Range {
        #[serde(alias = "startDate")]
        start_date: NaiveDate,
        #[serde(alias = "endDate")]
        end_date: NaiveDate,
    },
    WeekOfMonth {
        year: i32,
        month: MonthSpec,
        #[serde(alias = "weekNumber")]
        week: WeekSpec,
    },
    Month {
        year: i32,
        month: MonthSpec,
    },
    SemesterToDate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttendanceQuery {
    pub scope: Scope,
    /// Ignored for person scope. Defaults to students.
    #[serde(default)]
    pub population: Option<PopulationKind>,
    pub window: Window,
    #[serde(default)]
    pub granularity: Option<Granularity>,
    #[serde(default)]
    pub presence_policy: Option<PresencePolicy>,
    #[serde(default)]
    pub weekend_policy: WeekendPolicy,
    #[serde(default)]
    pub gate: Option<ApprovalGate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeriodSummary {
    pub key: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub working_days: i64,
    pub counts: StatusCounts,
    pub attendance_percentage: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PersonSummary {
    pub sin_number: String,
    pub name: String,
    pub department: String,
    pub year: Option<i64>,
    pub counts: StatusCounts,
    pub attendance_percentage: i64,
    pub late_mark_exceeded: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupSummary {
    pub group: String,
    pub population_size: usize,
    pub counts: StatusCounts,
    pub attendance_percentage: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttendanceReport {
    pub scope: Scope,
    pub population: PopulationKind,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub working_days: i64,
    pub population_size: usize,
    pub counts: StatusCounts,
    pub attendance_percentage: i64,
    pub time_series: Vec<PeriodSummary>,
    pub per_person: Vec<PersonSummary>,
    pub sub_groups: Vec<GroupSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RosterEntry {
    pub sin_number: String,
    pub name: String,
    #[serde(flatten)]
    pub record: DailyRecord,
}
