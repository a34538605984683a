// src/services/leave_service.rs
use crate::{
    error::{AppError, AppResult},
    models::{
        leave::{LeaveRequest, LeaveSubmission, LeaveView, RequestType},
        person::{Person, RequesterClass, Role},
    },
    services::{approval_service, person_service},
};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

/// Checks a submission against the request type rules.
pub fn validate_submission(requester_class: RequesterClass, submission: &LeaveSubmission) -> AppResult<()> {
    if submission.reason.trim().is_empty() {
        return Err(AppError::validation("reason", "reason is required"));
    }
    let Some(start) = submission.start_date else {
        return Err(AppError::validation("start_date", "start date is required"));
    };

    match submission.request_type {
        RequestType::Permission => {
            if submission.end_date.is_some() {
                return Err(AppError::validation("end_date", "permission is a single day and takes no end date"));
            }
            if is_blank(submission.time_slot.as_deref()) {
                return Err(AppError::validation("time_slot", "permission requires a time slot"));
            }
        }
        RequestType::Leave | RequestType::Od | RequestType::Internship => {
            let Some(end) = submission.end_date else {
                return Err(AppError::validation("end_date", "end date is required"));
            };
            if end < start {
                return Err(AppError::validation("end_date", "end date is before start date"));
            }
        }
    }

    let needs_attachment = requester_class == RequesterClass::Student
        && matches!(submission.request_type, RequestType::Od | RequestType::Internship);
    if needs_attachment && is_blank(submission.attachment.as_deref()) {
        return Err(AppError::validation(
            "attachment",
            format!("{} requests need a supporting document", submission.request_type.as_str()),
        ));
    }
    Ok(())
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |s| s.trim().is_empty())
}

/// Stores a new request for `requester` and returns its id. The requester's
/// class is captured now so later role changes never alter the chain.
pub async fn submit_leave(db_pool: &SqlitePool, requester: &Person, submission: LeaveSubmission) -> AppResult<String> {
    let Some(class) = requester.requester_class() else {
        tracing::warn!("{} has no approval chain and cannot submit requests", requester.sin_number);
        return Err(AppError::validation("request_type", "this person has no approval chain"));
    };
    validate_submission(class, &submission)?;

    let request_id = Uuid::new_v4().to_string();
    // Permission carries no end date; the time slot only applies to permission
    let (end_date, time_slot) = match submission.request_type {
        RequestType::Permission => (None, submission.time_slot),
        _ => (submission.end_date, None),
    };

    sqlx::query(
        r#"
        INSERT INTO leave_requests (request_id, sin_number, department, request_type, reason,
                                    reason_details, start_date, end_date, time_slot, attachment,
                                    requester_class)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
    )
    .bind(&request_id)
    .bind(&requester.sin_number)
    .bind(&requester.department)
    .bind(submission.request_type)
    .bind(submission.reason.trim())
    .bind(&submission.reason_details)
    .bind(submission.start_date)
    .bind(end_date)
    .bind(time_slot)
    .bind(&submission.attachment)
    .bind(class)
    .execute(db_pool)
    .await?;

    tracing::info!(
        "{} submitted {} request {} as {}",
        requester.sin_number,
        submission.request_type.as_str(),
        request_id,
        class.as_str()
    );
    Ok(request_id)
}

pub async fn get_leave(db_pool: &SqlitePool, request_id: &str) -> AppResult<LeaveRequest> {
    approval_service::fetch_leave(db_pool, request_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("leave request {request_id}")))
}

pub async fn get_leave_view(db_pool: &SqlitePool, request_id: &str) -> AppResult<LeaveView> {
    Ok(approval_service::view(get_leave(db_pool, request_id).await?))
}

/// Requests whose next pending stage the actor may decide.
pub async fn list_pending_for(db_pool: &SqlitePool, actor: &Person) -> AppResult<Vec<LeaveView>> {
    let college_wide = actor.roles.contains_any(&[Role::Principal, Role::PlacementOfficer]);

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        r#"
        SELECT lr.* FROM leave_requests lr
        JOIN users u ON u.sin_number = lr.sin_number AND u.is_deleted = 0
        WHERE lr.status = 'submitted' AND lr.sin_number != "#,
    );
    qb.push_bind(actor.sin_number.clone());
    if college_wide {
        qb.push(" AND u.college = ").push_bind(actor.college.clone());
    } else {
        qb.push(" AND lr.department = ").push_bind(actor.department.clone());
    }
    qb.push(" ORDER BY lr.created_at ASC, lr.request_id ASC");
    let candidates = qb.build_query_as::<LeaveRequest>().fetch_all(db_pool).await?;

    let mut requester_sins: Vec<String> = candidates.iter().map(|r| r.sin_number.clone()).collect();
    requester_sins.sort();
    requester_sins.dedup();
    let requesters = person_service::find_persons_by_sins(db_pool, &requester_sins).await?;

    let pending: Vec<LeaveView> = candidates
        .into_iter()
        .filter(|request| {
            let Some(stage) = approval_service::next_pending_stage(request) else {
                return false;
            };
            requesters
                .get(&request.sin_number)
                .is_some_and(|requester| approval_service::is_authorized(actor, requester, stage))
        })
        .map(approval_service::view)
        .collect();

    tracing::debug!("{} has {} requests awaiting a decision", actor.sin_number, pending.len());
    Ok(pending)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::leave::{ApprovalAction, ApprovalStage, Decision, RequestStatus};
    use crate::test_support::{self, PersonSeed};

    fn submission(kind: RequestType, start: Option<&str>, end: Option<&str>) -> LeaveSubmission {
        LeaveSubmission {
            request_type: kind,
            reason: "conference".into(),
            reason_details: None,
            start_date: start.map(|s| s.parse().unwrap()),
            end_date: end.map(|e| e.parse().unwrap()),
            time_slot: None,
            attachment: None,
        }
    }

    fn field_of(result: AppResult<()>) -> &'static str {
        match result {
            Err(AppError::Validation { field, .. }) => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn ranged_requests_need_ordered_dates() {
        let missing_end = submission(RequestType::Leave, Some("2024-03-04"), None);
        assert_eq!(field_of(validate_submission(RequesterClass::Staff, &missing_end)), "end_date");

        let reversed = submission(RequestType::Leave, Some("2024-03-04"), Some("2024-03-01"));
        assert_eq!(field_of(validate_submission(RequesterClass::Staff, &reversed)), "end_date");

        let ok = submission(RequestType::Leave, Some("2024-03-04"), Some("2024-03-04"));
        assert!(validate_submission(RequesterClass::Staff, &ok).is_ok());
    }

    #[test]
    fn permission_needs_a_slot_and_no_end_date() {
        let mut permission = submission(RequestType::Permission, Some("2024-03-04"), None);
        assert_eq!(field_of(validate_submission(RequesterClass::Student, &permission)), "time_slot");

        permission.time_slot = Some("10:00-11:00".into());
        assert!(validate_submission(RequesterClass::Student, &permission).is_ok());

        permission.end_date = Some("2024-03-05".parse().unwrap());
        assert_eq!(field_of(validate_submission(RequesterClass::Student, &permission)), "end_date");
    }

    #[test]
    fn students_attach_documents_for_od_and_internship() {
        let mut od = submission(RequestType::Od, Some("2024-03-04"), Some("2024-03-05"));
        assert_eq!(field_of(validate_submission(RequesterClass::Student, &od)), "attachment");
        assert!(validate_submission(RequesterClass::Staff, &od).is_ok());

        od.attachment = Some("uploads/od-letter.pdf".into());
        assert!(validate_submission(RequesterClass::Student, &od).is_ok());
    }

    #[tokio::test]
    async fn submitted_request_snapshots_requester_class() {
        let pool = test_support::pool().await;
        test_support::seed_person(&pool, PersonSeed::staff("T1", "CSE", "staff")).await;
        let staff = person_service::get_person_by_sin(&pool, "T1").await.unwrap();

        let id = submit_leave(&pool, &staff, submission(RequestType::Leave, Some("2024-03-04"), Some("2024-03-06")))
            .await
            .unwrap();
        let view = get_leave_view(&pool, &id).await.unwrap();
        assert_eq!(view.request.requester_class, RequesterClass::Staff);
        assert_eq!(view.request.status, RequestStatus::Submitted);
        assert_eq!(view.chain, vec![ApprovalStage::Hod, ApprovalStage::Principal]);
        assert_eq!(view.overall_status, "Pending HOD Approval");

        // A later promotion does not change the stored chain
        sqlx::query("UPDATE users SET position_1 = 'hod' WHERE sin_number = 'T1'")
            .execute(&pool)
            .await
            .unwrap();
        let again = get_leave_view(&pool, &id).await.unwrap();
        assert_eq!(again.chain, vec![ApprovalStage::Hod, ApprovalStage::Principal]);
    }

    #[tokio::test]
    async fn principal_cannot_submit() {
        let pool = test_support::pool().await;
        test_support::seed_person(&pool, PersonSeed::staff("P1", "ADMIN", "principal")).await;
        let principal = person_service::get_person_by_sin(&pool, "P1").await.unwrap();
        let result = submit_leave(
            &pool,
            &principal,
            submission(RequestType::Leave, Some("2024-03-04"), Some("2024-03-04")),
        )
        .await;
        assert!(matches!(result, Err(AppError::Validation { .. })));
        assert!(matches!(get_leave(&pool, "nope").await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn pending_list_follows_the_chain() {
        let pool = test_support::pool().await;
        test_support::seed_person(&pool, PersonSeed::student("S1", "CSE", 2)).await;
        test_support::seed_person(&pool, PersonSeed::staff("M1", "CSE", "mentor").with_year(2)).await;
        test_support::seed_person(&pool, PersonSeed::staff("C1", "CSE", "class_advisor").with_year(2)).await;
        test_support::seed_person(&pool, PersonSeed::staff("M2", "ECE", "mentor").with_year(2)).await;

        let student = person_service::get_person_by_sin(&pool, "S1").await.unwrap();
        let mentor = person_service::get_person_by_sin(&pool, "M1").await.unwrap();
        let advisor = person_service::get_person_by_sin(&pool, "C1").await.unwrap();
        let foreign_mentor = person_service::get_person_by_sin(&pool, "M2").await.unwrap();

        let id = submit_leave(&pool, &student, submission(RequestType::Leave, Some("2024-03-04"), Some("2024-03-05")))
            .await
            .unwrap();

        assert_eq!(list_pending_for(&pool, &mentor).await.unwrap().len(), 1);
        assert!(list_pending_for(&pool, &advisor).await.unwrap().is_empty());
        assert!(list_pending_for(&pool, &foreign_mentor).await.unwrap().is_empty());

        let approve = ApprovalAction {
            approval_status: Decision::Approved,
            stage: None,
        };
        approval_service::decide(&pool, &id, &mentor, &approve).await.unwrap();

        assert!(list_pending_for(&pool, &mentor).await.unwrap().is_empty());
        let for_advisor = list_pending_for(&pool, &advisor).await.unwrap();
        assert_eq!(for_advisor.len(), 1);
        assert_eq!(for_advisor[0].overall_status, "Pending Class Advisor Approval");
    }

    #[tokio::test]
    async fn own_requests_never_await_the_requester() {
        let pool = test_support::pool().await;
        test_support::seed_person(&pool, PersonSeed::staff("HS1", "CSE", "hodstaff")).await;
        test_support::seed_person(&pool, PersonSeed::staff("HS2", "CSE", "hodstaff")).await;
        let own = person_service::get_person_by_sin(&pool, "HS1").await.unwrap();
        let colleague = person_service::get_person_by_sin(&pool, "HS2").await.unwrap();

        submit_leave(&pool, &own, submission(RequestType::Leave, Some("2024-03-04"), Some("2024-03-04")))
            .await
            .unwrap();

        assert!(list_pending_for(&pool, &own).await.unwrap().is_empty());
        assert_eq!(list_pending_for(&pool, &colleague).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn principal_sees_only_their_college() {
        let pool = test_support::pool().await;
        test_support::seed_person(&pool, PersonSeed::staff("H1", "CSE", "hod")).await;
        let mut far_hod = PersonSeed::staff("H9", "CSE", "hod");
        far_hod.college = "North Campus".into();
        test_support::seed_person(&pool, far_hod).await;
        test_support::seed_person(&pool, PersonSeed::staff("P1", "ADMIN", "principal")).await;

        let principal = person_service::get_person_by_sin(&pool, "P1").await.unwrap();
        for sin in ["H1", "H9"] {
            let hod = person_service::get_person_by_sin(&pool, sin).await.unwrap();
            submit_leave(&pool, &hod, submission(RequestType::Leave, Some("2024-03-04"), Some("2024-03-05")))
                .await
                .unwrap();
        }

        let pending = list_pending_for(&pool, &principal).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].request.sin_number, "H1");
        assert_eq!(pending[0].overall_status, "Pending Principal Approval");
    }
}
