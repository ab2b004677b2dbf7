//! The request state machine's transactional surface. One call, one
//! transaction: the guarded master update linearizes concurrent actors,
//! and every committed transition appends exactly one history event.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use hrflow_core::calendar::{BusinessCalendar, SystemBusinessCalendar};
use hrflow_core::domain::form::FormTypeId;
use hrflow_core::domain::org::UserId;
use hrflow_core::domain::request::{RequestId, RequestMaster, RequestNo, RequestStatus};
use hrflow_core::domain::step::{StepActionStatus, StepSnapshot, StepType};
use hrflow_core::errors::{DomainError, EngineError};
use hrflow_core::history::{HistoryEvent, HistoryEventType};
use hrflow_core::lifecycle::{
    current_waiting_step, progression_after_approval, progression_after_receive,
};
use hrflow_db::repositories::requests::TransitionUpdate;
use hrflow_db::repositories::{catalog, counter, history, requests, snapshots, SqlDirectory};
use hrflow_db::DbPool;

use crate::submission::build_submission_plan;
use crate::views::{
    ActionOutcome, HistoryView, RequestDetail, RequestSummary, StepView, SubmitOutcome, TaskItem,
};

pub(crate) const WITHDRAW_COMMENT: &str = "Withdrawn by requester";

fn store_error(error: hrflow_db::repositories::RepositoryError) -> EngineError {
    EngineError::Persistence(error.to_string())
}

fn pool_error(error: sqlx::Error) -> EngineError {
    EngineError::Persistence(error.to_string())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StepActionKind {
    Approve,
    Reject,
    ReceiveComplete,
    ReceiveReject,
}

impl StepActionKind {
    fn expected_status(self) -> RequestStatus {
        match self {
            Self::Approve | Self::Reject => RequestStatus::ApprovalInProgress,
            Self::ReceiveComplete | Self::ReceiveReject => RequestStatus::ReceiveInProgress,
        }
    }

    fn expected_step_type(self) -> StepType {
        match self {
            Self::Approve | Self::Reject => StepType::Approval,
            Self::ReceiveComplete | Self::ReceiveReject => StepType::Receive,
        }
    }

    fn mark_as(self) -> StepActionStatus {
        match self {
            Self::Approve => StepActionStatus::Approved,
            Self::ReceiveComplete => StepActionStatus::Received,
            Self::Reject | Self::ReceiveReject => StepActionStatus::Rejected,
        }
    }

    fn event_type(self) -> HistoryEventType {
        match self {
            Self::Approve => HistoryEventType::Approve,
            Self::Reject => HistoryEventType::Reject,
            Self::ReceiveComplete => HistoryEventType::ReceiveComplete,
            Self::ReceiveReject => HistoryEventType::ReceiveReject,
        }
    }
}

pub struct WorkflowService<C = SystemBusinessCalendar> {
    pool: DbPool,
    directory: SqlDirectory,
    calendar: C,
}

impl WorkflowService<SystemBusinessCalendar> {
    pub fn new(pool: DbPool) -> Self {
        Self::with_calendar(pool, SystemBusinessCalendar)
    }
}

impl<C> WorkflowService<C>
where
    C: BusinessCalendar,
{
    pub fn with_calendar(pool: DbPool, calendar: C) -> Self {
        let directory = SqlDirectory::new(pool.clone());
        Self { pool, directory, calendar }
    }

    async fn load_master(&self, id: &RequestId) -> Result<RequestMaster, EngineError> {
        let mut conn = self.pool.acquire().await.map_err(pool_error)?;
        requests::find_by_id(&mut conn, id)
            .await
            .map_err(store_error)?
            .ok_or_else(|| EngineError::not_found("request", id.0.clone()))
    }

    async fn load_snapshots(&self, id: &RequestId) -> Result<Vec<StepSnapshot>, EngineError> {
        let mut conn = self.pool.acquire().await.map_err(pool_error)?;
        snapshots::list_for_request(&mut conn, id).await.map_err(store_error)
    }

    /// Creates a new draft or rewrites an existing one. Editing is only
    /// possible for the original requester while the request sits in an
    /// editable status; a successful edit always lands back in DRAFT.
    pub async fn upsert_draft(
        &self,
        requester_id: &UserId,
        request_id: Option<&RequestId>,
        form_type_id: &FormTypeId,
        title: &str,
        content: serde_json::Value,
    ) -> Result<RequestSummary, EngineError> {
        let form = {
            let mut conn = self.pool.acquire().await.map_err(pool_error)?;
            catalog::find_form_type(&mut conn, form_type_id)
                .await
                .map_err(store_error)?
                .ok_or_else(|| EngineError::not_found("form type", form_type_id.0.clone()))?
        };

        match request_id {
            None => {
                let now = Utc::now();
                let master = RequestMaster {
                    id: RequestId(Uuid::new_v4().to_string()),
                    request_no: None,
                    form_type_id: form_type_id.clone(),
                    requester_id: requester_id.clone(),
                    title: title.to_string(),
                    content,
                    status: RequestStatus::Draft,
                    current_step_order: None,
                    submitted_at: None,
                    completed_at: None,
                    created_at: now,
                    updated_at: now,
                };

                let mut tx = self.pool.begin().await.map_err(pool_error)?;
                requests::insert(&mut *tx, &master).await.map_err(store_error)?;
                history::append(
                    &mut *tx,
                    &HistoryEvent::new(
                        master.id.clone(),
                        HistoryEventType::Create,
                        None,
                        RequestStatus::Draft,
                        requester_id.clone(),
                    ),
                )
                .await
                .map_err(store_error)?;
                tx.commit().await.map_err(pool_error)?;

                info!(
                    event_name = "workflow.draft.created",
                    request_id = %master.id.0,
                    form_type = %form.id.0,
                    "draft created"
                );
                Ok(RequestSummary::from(&master))
            }
            Some(id) => {
                let master = self.load_master(id).await?;
                if &master.requester_id != requester_id {
                    return Err(EngineError::Forbidden);
                }
                if !master.status.is_editable() {
                    return Err(EngineError::Conflict { status: master.status });
                }
                if master.form_type_id != form.id {
                    return Err(EngineError::Domain(DomainError::InvariantViolation(
                        "the form type of an existing request cannot change".to_string(),
                    )));
                }
                if !form.allow_draft_edit {
                    info!(
                        event_name = "workflow.draft.edit_disallowed",
                        request_id = %master.id.0,
                        form_type = %form.id.0,
                        "form type does not allow draft editing"
                    );
                    return Err(EngineError::Conflict { status: master.status });
                }

                let now = Utc::now();
                let mut tx = self.pool.begin().await.map_err(pool_error)?;
                let updated = requests::update_draft(&mut *tx, id, title, &content, now)
                    .await
                    .map_err(store_error)?;
                if !updated {
                    return Err(EngineError::Conflict { status: master.status });
                }
                history::append(
                    &mut *tx,
                    &HistoryEvent::new(
                        id.clone(),
                        HistoryEventType::DraftSave,
                        Some(master.status),
                        RequestStatus::Draft,
                        requester_id.clone(),
                    ),
                )
                .await
                .map_err(store_error)?;
                tx.commit().await.map_err(pool_error)?;

                let refreshed = self.load_master(id).await?;
                Ok(RequestSummary::from(&refreshed))
            }
        }
    }

    /// Submission: selects the governing template, rebuilds the snapshot
    /// set, issues the request number on first submission, and moves the
    /// request into the first phase — or straight to COMPLETED when no step
    /// waits.
    pub async fn submit(
        &self,
        requester_id: &UserId,
        request_id: &RequestId,
    ) -> Result<SubmitOutcome, EngineError> {
        let master = self.load_master(request_id).await?;
        if &master.requester_id != requester_id {
            return Err(EngineError::Forbidden);
        }
        if !master.status.is_editable() {
            return Err(EngineError::Conflict { status: master.status });
        }

        let now = Utc::now();
        let as_of = self.calendar.today();
        let plan = build_submission_plan(&self.pool, &self.directory, &master, as_of, now).await?;

        let (to_status, current_step) = plan.progression.status_and_step();

        let mut tx = self.pool.begin().await.map_err(pool_error)?;

        let request_no = match &master.request_no {
            Some(existing) => existing.clone(),
            None => {
                let year_month = as_of.format("%Y%m").to_string();
                let seq = counter::next_seq(
                    &mut *tx,
                    &counter::scope_key(&plan.form.code, &year_month),
                )
                .await
                .map_err(store_error)?;
                RequestNo(counter::format_request_no(&plan.form.code, &year_month, seq))
            }
        };

        let update = TransitionUpdate {
            to: to_status,
            current_step_order: current_step,
            submitted_at: Some(now),
            completed_at: (to_status == RequestStatus::Completed).then_some(now),
            request_no: Some(request_no.clone()),
            updated_at: now,
        };
        let moved = requests::apply_transition(&mut *tx, request_id, master.status, &update)
            .await
            .map_err(store_error)?;
        if !moved {
            // Lost the race against a concurrent transition; nothing from
            // this attempt survives the rollback.
            return Err(EngineError::Conflict { status: master.status });
        }

        snapshots::replace_for_request(&mut *tx, request_id, &plan.snapshots)
            .await
            .map_err(store_error)?;

        history::append(
            &mut *tx,
            &HistoryEvent::new(
                request_id.clone(),
                HistoryEventType::Submit,
                Some(master.status),
                to_status,
                requester_id.clone(),
            )
            .with_payload(serde_json::json!({
                "request_no": request_no.0,
                "template_id": plan.template.id.0,
                "step_count": plan.snapshots.len(),
            })),
        )
        .await
        .map_err(store_error)?;

        tx.commit().await.map_err(pool_error)?;

        info!(
            event_name = "workflow.submit.committed",
            request_id = %request_id.0,
            request_no = %request_no.0,
            template_id = plan.template.id.0,
            status = ?to_status,
            "request submitted"
        );

        Ok(SubmitOutcome {
            request_id: request_id.clone(),
            status: to_status,
            current_step_order: current_step,
        })
    }

    /// Withdraw is requester-only, approval-phase-only, and gated by the
    /// form type's allow_withdraw flag. Every still-waiting snapshot is
    /// rejected with a system comment so the timeline reads unambiguously.
    pub async fn withdraw(
        &self,
        requester_id: &UserId,
        request_id: &RequestId,
    ) -> Result<ActionOutcome, EngineError> {
        let master = self.load_master(request_id).await?;
        if &master.requester_id != requester_id {
            return Err(EngineError::Forbidden);
        }
        if master.status != RequestStatus::ApprovalInProgress {
            return Err(EngineError::Conflict { status: master.status });
        }

        let form = {
            let mut conn = self.pool.acquire().await.map_err(pool_error)?;
            catalog::find_form_type(&mut conn, &master.form_type_id)
                .await
                .map_err(store_error)?
                .ok_or_else(|| {
                    EngineError::not_found("form type", master.form_type_id.0.clone())
                })?
        };
        if !form.allow_withdraw {
            info!(
                event_name = "workflow.withdraw.disallowed",
                request_id = %request_id.0,
                form_type = %form.name,
                "form type does not allow withdrawal"
            );
            return Err(EngineError::Conflict { status: master.status });
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(pool_error)?;

        let update = TransitionUpdate {
            to: RequestStatus::Withdrawn,
            current_step_order: None,
            submitted_at: None,
            completed_at: None,
            request_no: None,
            updated_at: now,
        };
        let moved = requests::apply_transition(
            &mut *tx,
            request_id,
            RequestStatus::ApprovalInProgress,
            &update,
        )
        .await
        .map_err(store_error)?;
        if !moved {
            return Err(EngineError::Conflict { status: master.status });
        }

        snapshots::reject_all_waiting(&mut *tx, request_id, WITHDRAW_COMMENT, now)
            .await
            .map_err(store_error)?;

        history::append(
            &mut *tx,
            &HistoryEvent::new(
                request_id.clone(),
                HistoryEventType::Withdraw,
                Some(RequestStatus::ApprovalInProgress),
                RequestStatus::Withdrawn,
                requester_id.clone(),
            ),
        )
        .await
        .map_err(store_error)?;

        tx.commit().await.map_err(pool_error)?;

        info!(
            event_name = "workflow.withdraw.committed",
            request_id = %request_id.0,
            "request withdrawn"
        );

        Ok(ActionOutcome { request_id: request_id.clone(), status: RequestStatus::Withdrawn })
    }

    pub async fn approve(
        &self,
        actor_id: &UserId,
        request_id: &RequestId,
        comment: Option<&str>,
    ) -> Result<ActionOutcome, EngineError> {
        self.apply_step_action(actor_id, request_id, comment, StepActionKind::Approve).await
    }

    pub async fn reject(
        &self,
        actor_id: &UserId,
        request_id: &RequestId,
        comment: Option<&str>,
    ) -> Result<ActionOutcome, EngineError> {
        self.apply_step_action(actor_id, request_id, comment, StepActionKind::Reject).await
    }

    pub async fn receive_complete(
        &self,
        actor_id: &UserId,
        request_id: &RequestId,
        comment: Option<&str>,
    ) -> Result<ActionOutcome, EngineError> {
        self.apply_step_action(actor_id, request_id, comment, StepActionKind::ReceiveComplete)
            .await
    }

    pub async fn receive_reject(
        &self,
        actor_id: &UserId,
        request_id: &RequestId,
        comment: Option<&str>,
    ) -> Result<ActionOutcome, EngineError> {
        self.apply_step_action(actor_id, request_id, comment, StepActionKind::ReceiveReject).await
    }

    async fn apply_step_action(
        &self,
        actor_id: &UserId,
        request_id: &RequestId,
        comment: Option<&str>,
        action: StepActionKind,
    ) -> Result<ActionOutcome, EngineError> {
        let master = self.load_master(request_id).await?;
        if master.status != action.expected_status() {
            return Err(EngineError::Conflict { status: master.status });
        }
        let step_order = master.current_step_order.ok_or_else(|| {
            EngineError::Domain(DomainError::InvariantViolation(format!(
                "request `{}` is {:?} but has no current step",
                request_id.0, master.status
            )))
        })?;

        let step_set = self.load_snapshots(request_id).await?;
        let current = current_waiting_step(&step_set, step_order, action.expected_step_type())
            .ok_or_else(|| {
                EngineError::Domain(DomainError::InvariantViolation(format!(
                    "request `{}` has no waiting {:?} snapshot at step {step_order}",
                    request_id.0,
                    action.expected_step_type()
                )))
            })?;

        // Exact actor match only; the engine core has no delegation path.
        if &current.actor_user_id != actor_id {
            return Err(EngineError::Forbidden);
        }

        let (to_status, next_step) = match action {
            StepActionKind::Approve => {
                let mut acted = step_set.clone();
                if let Some(snapshot) =
                    acted.iter_mut().find(|snapshot| snapshot.step_order == step_order)
                {
                    snapshot.status = StepActionStatus::Approved;
                }
                progression_after_approval(&acted).status_and_step()
            }
            StepActionKind::ReceiveComplete => {
                let mut acted = step_set.clone();
                if let Some(snapshot) =
                    acted.iter_mut().find(|snapshot| snapshot.step_order == step_order)
                {
                    snapshot.status = StepActionStatus::Received;
                }
                progression_after_receive(&acted).status_and_step()
            }
            StepActionKind::Reject => (RequestStatus::ApprovalRejected, None),
            StepActionKind::ReceiveReject => (RequestStatus::ReceiveRejected, None),
        };

        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(pool_error)?;

        let acted = snapshots::mark_acted(
            &mut *tx,
            request_id,
            step_order,
            action.mark_as(),
            comment,
            now,
        )
        .await
        .map_err(store_error)?;
        if !acted {
            return Err(EngineError::Conflict { status: master.status });
        }

        let update = TransitionUpdate {
            to: to_status,
            current_step_order: next_step,
            submitted_at: None,
            completed_at: (to_status == RequestStatus::Completed).then_some(now),
            request_no: None,
            updated_at: now,
        };
        let moved =
            requests::apply_transition(&mut *tx, request_id, action.expected_status(), &update)
                .await
                .map_err(store_error)?;
        if !moved {
            return Err(EngineError::Conflict { status: master.status });
        }

        history::append(
            &mut *tx,
            &HistoryEvent::new(
                request_id.clone(),
                action.event_type(),
                Some(action.expected_status()),
                to_status,
                actor_id.clone(),
            )
            .with_payload(serde_json::json!({
                "step_order": step_order,
                "comment": comment,
            })),
        )
        .await
        .map_err(store_error)?;

        tx.commit().await.map_err(pool_error)?;

        info!(
            event_name = "workflow.step_action.committed",
            request_id = %request_id.0,
            step_order,
            action = ?action,
            status = ?to_status,
            "step action committed"
        );

        Ok(ActionOutcome { request_id: request_id.clone(), status: to_status })
    }

    /// Read-only composite view. The viewer id is recorded for tracing
    /// only; visibility control sits with the calling layer.
    pub async fn get_detail(
        &self,
        viewer_id: &UserId,
        request_id: &RequestId,
    ) -> Result<RequestDetail, EngineError> {
        let master = self.load_master(request_id).await?;
        let step_set = self.load_snapshots(request_id).await?;
        let events =
            history::list_for_request(&self.pool, request_id).await.map_err(store_error)?;

        info!(
            event_name = "workflow.detail.read",
            request_id = %request_id.0,
            viewer_id = %viewer_id.0,
            "detail fetched"
        );

        Ok(RequestDetail {
            summary: RequestSummary::from(&master),
            requester_id: master.requester_id.clone(),
            content: master.content.clone(),
            completed_at: master.completed_at,
            steps: step_set.iter().map(StepView::from).collect(),
            history: events.iter().map(HistoryView::from).collect(),
        })
    }

    pub async fn list_my_requests(
        &self,
        requester_id: &UserId,
    ) -> Result<Vec<RequestSummary>, EngineError> {
        let masters =
            requests::list_by_requester(&self.pool, requester_id).await.map_err(store_error)?;
        Ok(masters.iter().map(RequestSummary::from).collect())
    }

    pub async fn list_my_approval_tasks(
        &self,
        actor_id: &UserId,
    ) -> Result<Vec<TaskItem>, EngineError> {
        let rows = snapshots::list_pending_for_actor(&self.pool, actor_id, StepType::Approval)
            .await
            .map_err(store_error)?;
        Ok(rows.into_iter().map(TaskItem::from).collect())
    }

    pub async fn list_my_receive_tasks(
        &self,
        actor_id: &UserId,
    ) -> Result<Vec<TaskItem>, EngineError> {
        let rows = snapshots::list_pending_for_actor(&self.pool, actor_id, StepType::Receive)
            .await
            .map_err(store_error)?;
        Ok(rows.into_iter().map(TaskItem::from).collect())
    }
}
