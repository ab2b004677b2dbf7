//! Pure progression math over a request's snapshot set. The service layer
//! decides *whether* an action is allowed; this module decides *where* the
//! request goes next once a step has been acted on.

use crate::domain::request::RequestStatus;
use crate::domain::step::{StepSnapshot, StepType};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Progression {
    AwaitApproval { step_order: i64 },
    AwaitReceive { step_order: i64 },
    Completed,
}

impl Progression {
    /// The status family and current-step pointer this progression implies.
    pub fn status_and_step(self) -> (RequestStatus, Option<i64>) {
        match self {
            Self::AwaitApproval { step_order } => {
                (RequestStatus::ApprovalInProgress, Some(step_order))
            }
            Self::AwaitReceive { step_order } => {
                (RequestStatus::ReceiveInProgress, Some(step_order))
            }
            Self::Completed => (RequestStatus::Completed, None),
        }
    }
}

fn waiting_sorted(snapshots: &[StepSnapshot]) -> Vec<&StepSnapshot> {
    let mut waiting: Vec<&StepSnapshot> =
        snapshots.iter().filter(|snapshot| snapshot.is_waiting()).collect();
    waiting.sort_by_key(|snapshot| snapshot.step_order);
    waiting
}

/// At submission the first WAITING step by order sets the status family,
/// whatever its type. A set with no WAITING step completes immediately.
pub fn initial_progression(snapshots: &[StepSnapshot]) -> Progression {
    match waiting_sorted(snapshots).first() {
        Some(first) => match first.step_type {
            StepType::Approval => Progression::AwaitApproval { step_order: first.step_order },
            StepType::Receive => Progression::AwaitReceive { step_order: first.step_order },
            // REFERENCE snapshots are born RECEIVED and never reach here.
            StepType::Reference => Progression::Completed,
        },
        None => Progression::Completed,
    }
}

/// After an approval: drain remaining WAITING approvals first, then move
/// to the receive phase, then complete.
pub fn progression_after_approval(snapshots: &[StepSnapshot]) -> Progression {
    let waiting = waiting_sorted(snapshots);
    if let Some(step) = waiting.iter().find(|snapshot| snapshot.step_type == StepType::Approval) {
        return Progression::AwaitApproval { step_order: step.step_order };
    }
    if let Some(step) = waiting.iter().find(|snapshot| snapshot.step_type == StepType::Receive) {
        return Progression::AwaitReceive { step_order: step.step_order };
    }
    Progression::Completed
}

/// After a receive-complete only further WAITING receive steps matter.
pub fn progression_after_receive(snapshots: &[StepSnapshot]) -> Progression {
    match waiting_sorted(snapshots)
        .iter()
        .find(|snapshot| snapshot.step_type == StepType::Receive)
    {
        Some(step) => Progression::AwaitReceive { step_order: step.step_order },
        None => Progression::Completed,
    }
}

/// The snapshot the current-step pointer designates, if it is still WAITING
/// with the expected type. `None` means the pointer is stale or the caller
/// asked for the wrong phase.
pub fn current_waiting_step<'a>(
    snapshots: &'a [StepSnapshot],
    step_order: i64,
    expected_type: StepType,
) -> Option<&'a StepSnapshot> {
    snapshots.iter().find(|snapshot| {
        snapshot.step_order == step_order
            && snapshot.step_type == expected_type
            && snapshot.is_waiting()
    })
}
