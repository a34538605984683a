// src/services/approval_service.rs
use crate::{
    error::{AppError, AppResult, ConflictKind},
    models::{
        leave::{
            ApprovalAction, ApprovalStage, ApprovalState, Decision, LeaveRequest, LeaveView, RequestStatus,
            RequestType,
        },
        person::{Person, RequesterClass, Role},
    },
    services::person_service,
};
use chrono::{NaiveDateTime, Utc};
use sqlx::{SqliteExecutor, SqlitePool};

/// Ordered approval stages for a requester class and request type.
pub fn chain_for(class: RequesterClass, kind: RequestType) -> Vec<ApprovalStage> {
    match class {
        RequesterClass::Student => {
            let mut chain = vec![ApprovalStage::Mentor, ApprovalStage::ClassAdvisor, ApprovalStage::Hod];
            if kind == RequestType::Internship {
                chain.push(ApprovalStage::PlacementOfficer);
            }
            chain.push(ApprovalStage::Principal);
            chain
        }
        RequesterClass::Staff => vec![ApprovalStage::Hod, ApprovalStage::Principal],
        RequesterClass::Hod => vec![ApprovalStage::Principal],
    }
}

pub fn chain_of(request: &LeaveRequest) -> Vec<ApprovalStage> {
    chain_for(request.requester_class, request.request_type)
}

/// Roles that may act on a stage.
pub fn stage_roles(stage: ApprovalStage) -> &'static [Role] {
    match stage {
        ApprovalStage::Mentor => &[Role::Mentor],
        ApprovalStage::ClassAdvisor => &[Role::ClassAdvisor],
        ApprovalStage::Hod => &[Role::Hod, Role::HodStaff],
        ApprovalStage::PlacementOfficer => &[Role::PlacementOfficer],
        ApprovalStage::Principal => &[Role::Principal],
    }
}

pub fn next_pending_stage(request: &LeaveRequest) -> Option<ApprovalStage> {
    let chain = chain_of(request);
    if chain.iter().any(|s| request.approvals.state(*s) == ApprovalState::Rejected) {
        return None;
    }
    chain
        .into_iter()
        .find(|s| request.approvals.state(*s) == ApprovalState::Pending)
}

/// Display status: "Rejected", "Approved" or "Pending <stage> Approval".
pub fn overall_status(request: &LeaveRequest) -> String {
    let chain = chain_of(request);
    if chain.iter().any(|s| request.approvals.state(*s) == ApprovalState::Rejected) {
        return "Rejected".to_string();
    }
    match chain
        .iter()
        .find(|s| request.approvals.state(**s) == ApprovalState::Pending)
    {
        Some(stage) => format!("Pending {} Approval", stage.display_name()),
        None => "Approved".to_string(),
    }
}

pub fn stored_status(request: &LeaveRequest) -> RequestStatus {
    let chain = chain_of(request);
    if chain.iter().any(|s| request.approvals.state(*s) == ApprovalState::Rejected) {
        RequestStatus::Rejected
    } else if chain
        .last()
        .is_some_and(|last| request.approvals.state(*last) == ApprovalState::Approved)
    {
        RequestStatus::Approved
    } else {
        RequestStatus::Submitted
    }
}

pub fn view(request: LeaveRequest) -> LeaveView {
    LeaveView {
        chain: chain_of(&request),
        overall_status: overall_status(&request),
        request,
    }
}

/// Checks ordering and idempotence of a transition on `stage`.
pub fn validate_transition(request: &LeaveRequest, stage: ApprovalStage) -> AppResult<()> {
    let chain = chain_of(request);
    let Some(position) = chain.iter().position(|s| *s == stage) else {
        return Err(AppError::conflict(
            ConflictKind::StageNotInChain,
            format!("{stage} is not part of this request's approval chain"),
            request,
        ));
    };

    let current = request.approvals.state(stage);
    if current.is_decided() {
        return Err(AppError::conflict(
            ConflictKind::AlreadyDecided,
            format!("{stage} has already {}", current.as_str()),
            request,
        ));
    }

    if let Some(blocking) = chain[..position]
        .iter()
        .find(|s| request.approvals.state(**s) != ApprovalState::Approved)
    {
        return Err(AppError::conflict(
            ConflictKind::OutOfOrder,
            format!("{blocking} approval is required before {stage}"),
            request,
        ));
    }
    Ok(())
}

/// Whether `actor` may decide `stage` for a request submitted by `requester`.
/// Nobody decides their own request.
pub fn is_authorized(actor: &Person, requester: &Person, stage: ApprovalStage) -> bool {
    if actor.sin_number == requester.sin_number || !actor.roles.contains_any(stage_roles(stage)) {
        return false;
    }
    match stage {
        ApprovalStage::Mentor | ApprovalStage::ClassAdvisor => {
            let assigned = match stage {
                ApprovalStage::Mentor => requester.mentor.as_deref(),
                _ => requester.class_advisor.as_deref(),
            };
            actor.department == requester.department
                && actor.year == requester.year
                && assigned.map_or(true, |sin| sin == actor.sin_number)
        }
        ApprovalStage::Hod => actor.department == requester.department,
        ApprovalStage::PlacementOfficer | ApprovalStage::Principal => actor.college == requester.college,
    }
}

/// The stage the action targets: the explicit one, or the earliest pending
/// stage of the chain the actor holds a role for.
pub fn select_stage(request: &LeaveRequest, actor: &Person, action: &ApprovalAction) -> AppResult<ApprovalStage> {
    if let Some(stage) = action.stage {
        return Ok(stage);
    }
    chain_of(request)
        .into_iter()
        .find(|s| request.approvals.state(*s) == ApprovalState::Pending && actor.roles.contains_any(stage_roles(*s)))
        .ok_or_else(|| {
            AppError::conflict(
                ConflictKind::NotAuthorized,
                format!("{} holds no role for a pending stage of this request", actor.sin_number),
                request,
            )
        })
}

/// Applies a validated decision to an in-memory request.
pub fn apply(request: &mut LeaveRequest, stage: ApprovalStage, decision: Decision, actor: &Person, at: NaiveDateTime) {
    let slot = request.approvals.get_mut(stage);
    slot.state = decision.into();
    slot.approver_sin = Some(actor.sin_number.clone());
    slot.approver_name = Some(actor.name.clone());
    slot.decided_at = Some(at);
    request.status = stored_status(request);
    request.version += 1;
}

pub async fn fetch_leave<'e, E>(executor: E, request_id: &str) -> AppResult<Option<LeaveRequest>>
where
    E: SqliteExecutor<'e>,
{
    let request = sqlx::query_as::<_, LeaveRequest>("SELECT * FROM leave_requests WHERE request_id = ?1")
        .bind(request_id)
        .fetch_optional(executor)
        .await?;
    Ok(request)
}

/// Records one approval decision. Reads, validates and writes inside one
/// immediate transaction, so concurrent deciders queue on the write lock and
/// the loser sees the winner's state. The write still only lands if the slot
/// is pending and the version is unchanged.
pub async fn decide(
    db_pool: &SqlitePool,
    request_id: &str,
    actor: &Person,
    action: &ApprovalAction,
) -> AppResult<LeaveView> {
    tracing::info!(
        "{} submits {:?} on request {} (stage {:?})",
        actor.sin_number,
        action.approval_status,
        request_id,
        action.stage
    );
    let mut tx = db_pool.begin_with("BEGIN IMMEDIATE").await?;

    let Some(mut request) = fetch_leave(&mut *tx, request_id).await? else {
        tx.rollback().await?;
        return Err(AppError::NotFound(format!("leave request {request_id}")));
    };
    let Some(requester) = person_service::find_person_by_sin(&mut *tx, &request.sin_number).await? else {
        tx.rollback().await?;
        return Err(AppError::NotFound(format!("person {}", request.sin_number)));
    };

    let stage = select_stage(&request, actor, action)?;
    validate_transition(&request, stage)?;
    if !is_authorized(actor, &requester, stage) {
        tracing::warn!("{} is not authorized for {} on {}", actor.sin_number, stage, request_id);
        return Err(AppError::conflict(
            ConflictKind::NotAuthorized,
            format!("{} may not decide the {stage} stage of this request", actor.sin_number),
            &request,
        ));
    }

    let expected_version = request.version;
    apply(&mut request, stage, action.approval_status, actor, Utc::now().naive_utc());
    let slot = request.approvals.get(stage);

    let prefix = stage.column_prefix();
    let sql = format!(
        r#"
        UPDATE leave_requests
        SET {prefix}_approval = ?1, {prefix}_approver_sin = ?2, {prefix}_approver_name = ?3,
            {prefix}_decided_at = ?4, status = ?5, version = version + 1
        WHERE request_id = ?6 AND {prefix}_approval = 'pending' AND version = ?7
        "#
    );
    let rows_affected = sqlx::query(&sql)
        .bind(slot.state)
        .bind(&slot.approver_sin)
        .bind(&slot.approver_name)
        .bind(slot.decided_at)
        .bind(request.status)
        .bind(request_id)
        .bind(expected_version)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    if rows_affected == 0 {
        let current = fetch_leave(&mut *tx, request_id).await?;
        tx.rollback().await?;
        let Some(current) = current else {
            return Err(AppError::NotFound(format!("leave request {request_id}")));
        };
        let kind = if current.approvals.state(stage).is_decided() {
            ConflictKind::AlreadyDecided
        } else {
            ConflictKind::ConcurrentUpdate
        };
        tracing::warn!("lost update on {} stage {}: {}", request_id, stage, kind.as_str());
        return Err(AppError::conflict(
            kind,
            format!("request {request_id} changed while deciding {stage}"),
            &current,
        ));
    }

    tx.commit().await?;
    tracing::info!(
        "request {} {} at {} stage, status now {}",
        request_id,
        slot.state.as_str(),
        stage,
        request.status.as_str()
    );
    Ok(view(request))
}
