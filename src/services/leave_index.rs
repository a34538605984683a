// src/services/leave_index.rs
use crate::{
    models::{
        attendance::ApprovalGate,
        leave::{ApprovalStage, ApprovalState, LeaveRequest, RequestStatus},
    },
    services::approval_service,
};
use chrono::NaiveDate;
use std::collections::HashMap;

/// Whether `leave` counts under `gate`. A gate stage missing from the request's
/// chain (an HOD's own request has no HOD stage) falls back to the chain's last stage.
pub fn passes_gate(leave: &LeaveRequest, gate: ApprovalGate) -> bool {
    let stage = match gate {
        ApprovalGate::Principal => ApprovalStage::Principal,
        ApprovalGate::Hod => ApprovalStage::Hod,
        ApprovalGate::Final => return leave.status == RequestStatus::Approved,
    };
    let chain = approval_service::chain_of(leave);
    let gate_stage = if chain.contains(&stage) { Some(stage) } else { chain.last().copied() };
    gate_stage.is_some_and(|s| leave.approvals.state(s) == ApprovalState::Approved)
}

/// Approved leaves grouped by owner, each group sorted so the first covering
/// entry is the one that wins.
#[derive(Debug, Default)]
pub struct LeaveIndex {
    by_person: HashMap<String, Vec<LeaveRequest>>,
}

impl LeaveIndex {
    pub fn build(leaves: impl IntoIterator<Item = LeaveRequest>, gate: ApprovalGate) -> Self {
        let mut by_person: HashMap<String, Vec<LeaveRequest>> = HashMap::new();
        for leave in leaves.into_iter().filter(|l| passes_gate(l, gate)) {
            by_person.entry(leave.sin_number.clone()).or_default().push(leave);
        }
        // permission > od > internship > leave, then earliest start, then id
        for list in by_person.values_mut() {
            list.sort_by(|a, b| {
                a.request_type
                    .precedence()
                    .cmp(&b.request_type.precedence())
                    .then(a.start_date.cmp(&b.start_date))
                    .then_with(|| a.request_id.cmp(&b.request_id))
            });
        }
        LeaveIndex { by_person }
    }

    pub fn find_covering_leave(&self, sin_number: &str, date: NaiveDate) -> Option<&LeaveRequest> {
        self.by_person
            .get(sin_number)?
            .iter()
            .find(|leave| leave.covers(date))
    }
}
