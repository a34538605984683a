// src/models/leave.rs
use crate::models::person::RequesterClass;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, FromRow, Row};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum RequestType {
    Leave,
    Od,
    Permission,
    Internship,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::Leave => "leave",
            RequestType::Od => "od",
            RequestType::Permission => "permission",
            RequestType::Internship => "internship",
        }
    }

    /// Lower rank wins when several leaves cover the same day.
    pub fn precedence(&self) -> u8 {
        match self {
            RequestType::Permission => 0,
            RequestType::Od => 1,
            RequestType::Internship => 2,
            RequestType::Leave => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ApprovalState {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalState::Pending => "pending",
            ApprovalState::Approved => "approved",
            ApprovalState::Rejected => "rejected",
        }
    }

    pub fn is_decided(&self) -> bool {
        !matches!(self, ApprovalState::Pending)
    }
}

/// A decision an approver can submit. Pending is not a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approved,
    Rejected,
}

impl From<Decision> for ApprovalState {
    fn from(d: Decision) -> Self {
        match d {
            Decision::Approved => ApprovalState::Approved,
            Decision::Rejected => ApprovalState::Rejected,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStage {
    Mentor,
    ClassAdvisor,
    Hod,
    PlacementOfficer,
    Principal,
}

impl ApprovalStage {
    /// Column prefix in `leave_requests`.
    pub fn column_prefix(&self) -> &'static str {
        match self {
            ApprovalStage::Mentor => "mentor",
            ApprovalStage::ClassAdvisor => "class_advisor",
            ApprovalStage::Hod => "hod",
            ApprovalStage::PlacementOfficer => "placement_officer",
            ApprovalStage::Principal => "principal",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ApprovalStage::Mentor => "Mentor",
            ApprovalStage::ClassAdvisor => "Class Advisor",
            ApprovalStage::Hod => "HOD",
            ApprovalStage::PlacementOfficer => "Placement Officer",
            ApprovalStage::Principal => "Principal",
        }
    }
}

impl fmt::Display for ApprovalStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApprovalSlot {
    pub state: ApprovalState,
    pub approver_sin: Option<String>,
    pub approver_name: Option<String>,
    pub decided_at: Option<NaiveDateTime>,
}

impl ApprovalSlot {
    pub fn pending() -> Self {
        ApprovalSlot {
            state: ApprovalState::Pending,
            approver_sin: None,
            approver_name: None,
            decided_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Approvals {
    pub mentor: ApprovalSlot,
    pub class_advisor: ApprovalSlot,
    pub hod: ApprovalSlot,
    pub placement_officer: ApprovalSlot,
    pub principal: ApprovalSlot,
}

impl Approvals {
    pub fn all_pending() -> Self {
        Approvals {
            mentor: ApprovalSlot::pending(),
            class_advisor: ApprovalSlot::pending(),
            hod: ApprovalSlot::pending(),
            placement_officer: ApprovalSlot::pending(),
            principal: ApprovalSlot::pending(),
        }
    }

    pub fn get(&self, stage: ApprovalStage) -> &ApprovalSlot {
        match stage {
            ApprovalStage::Mentor => &self.mentor,
            ApprovalStage::ClassAdvisor => &self.class_advisor,
            ApprovalStage::Hod => &self.hod,
            ApprovalStage::PlacementOfficer => &self.placement_officer,
            ApprovalStage::Principal => &self.principal,
        }
    }

    pub fn get_mut(&mut self, stage: ApprovalStage) -> &mut ApprovalSlot {
        match stage {
            ApprovalStage::Mentor => &mut self.mentor,
            ApprovalStage::ClassAdvisor => &mut self.class_advisor,
            ApprovalStage::Hod => &mut self.hod,
            ApprovalStage::PlacementOfficer => &mut self.placement_officer,
            ApprovalStage::Principal => &mut self.principal,
        }
    }

    pub fn state(&self, stage: ApprovalStage) -> ApprovalState {
        self.get(stage).state
    }
}

/// Stored aggregate of the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum RequestStatus {
    Submitted,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Submitted => "submitted",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaveRequest {
    pub request_id: String,
    pub sin_number: String,
    pub department: String,
    pub request_type: RequestType,
    pub reason: String,
    pub reason_details: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub time_slot: Option<String>,
    pub attachment: Option<String>,
    pub requester_class: RequesterClass,
    pub approvals: Approvals,
    pub status: RequestStatus,
    pub version: i64,
    pub created_at: Option<NaiveDateTime>,
}

impl LeaveRequest {
    pub fn covers(&self, date: NaiveDate) -> bool {
        match self.request_type {
            RequestType::Permission => self.start_date == date,
            _ => match self.end_date {
                Some(end) => self.start_date <= date && date <= end,
                None => false,
            },
        }
    }
}

fn slot_from_row(row: &SqliteRow, stage: ApprovalStage) -> Result<ApprovalSlot, sqlx::Error> {
    let prefix = stage.column_prefix();
    Ok(ApprovalSlot {
        state: row.try_get(format!("{prefix}_approval").as_str())?,
        approver_sin: row.try_get(format!("{prefix}_approver_sin").as_str())?,
        approver_name: row.try_get(format!("{prefix}_approver_name").as_str())?,
        decided_at: row.try_get(format!("{prefix}_decided_at").as_str())?,
    })
}

impl<'r> FromRow<'r, SqliteRow> for LeaveRequest {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(LeaveRequest {
            request_id: row.try_get("request_id")?,
            sin_number: row.try_get("sin_number")?,
            department: row.try_get("department")?,
            request_type: row.try_get("request_type")?,
            reason: row.try_get("reason")?,
            reason_details: row.try_get("reason_details")?,
            start_date: row.try_get("start_date")?,
            end_date: row.try_get("end_date")?,
            time_slot: row.try_get("time_slot")?,
            attachment: row.try_get("attachment")?,
            requester_class: row.try_get("requester_class")?,
            approvals: Approvals {
                mentor: slot_from_row(row, ApprovalStage::Mentor)?,
                class_advisor: slot_from_row(row, ApprovalStage::ClassAdvisor)?,
                hod: slot_from_row(row, ApprovalStage::Hod)?,
                placement_officer: slot_from_row(row, ApprovalStage::PlacementOfficer)?,
                principal: slot_from_row(row, ApprovalStage::Principal)?,
            },
            status: row.try_get("status")?,
            version: row.try_get("version")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Leave submission payload. The requester is the acting person.
#[derive(Debug, Clone, Deserialize)]
pub struct LeaveSubmission {
    pub request_type: RequestType,
    pub reason: String,
    #[serde(default)]
    pub reason_details: Option<String>,
    #[serde(alias = "startDate")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, alias = "endDate")]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub time_slot: Option<String>,
    #[serde(default)]
    pub attachment: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApprovalAction {
    pub approval_status: Decision,
    /// Optional when the approver holds exactly the role of the next pending stage.
    #[serde(default)]
    pub stage: Option<ApprovalStage>,
}

/// Request plus its display status.
#[derive(Debug, Clone, Serialize)]
pub struct LeaveView {
    #[serde(flatten)]
    pub request: LeaveRequest,
    pub chain: Vec<ApprovalStage>,
    pub overall_status: String,
}
