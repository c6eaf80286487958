//! Who may trigger which transition on which submission.
//!
//! Pure functions over an explicit [`Actor`]; no session or store access.

use serde::{Deserialize, Serialize};

use crate::database::models::{OvertimeStatus, OvertimeSubmission, SubmissionKind};
use crate::error::ActionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Hr,
    PlantManager,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Hr => "hr",
            Role::PlantManager => "plant-manager",
        }
    }
}

/// The authenticated caller of a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub email: String,
    pub roles: Vec<String>,
}

impl Actor {
    pub fn new(email: impl Into<String>, roles: Vec<String>) -> Self {
        Self {
            email: email.into(),
            roles,
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role.as_str()))
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    pub fn is_hr(&self) -> bool {
        self.has_role(Role::Hr)
    }

    pub fn is_plant_manager(&self) -> bool {
        self.has_role(Role::PlantManager)
    }

    /// May give the second (final) approval of an overtime request.
    pub fn is_final_approver(&self) -> bool {
        self.is_plant_manager() || self.is_admin()
    }

    /// Sees every submission, not only the ones they are involved in.
    pub fn sees_all(&self) -> bool {
        self.is_admin() || self.is_hr() || self.is_plant_manager()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Approve,
    Reject,
    MarkAsAccounted,
    Cancel,
    Correct,
    Edit,
    Complete,
    ManageDaysOff,
    Delete,
}

impl Transition {
    pub fn as_str(self) -> &'static str {
        match self {
            Transition::Approve => "approve",
            Transition::Reject => "reject",
            Transition::MarkAsAccounted => "mark as accounted",
            Transition::Cancel => "cancel",
            Transition::Correct => "correct",
            Transition::Edit => "edit",
            Transition::Complete => "complete",
            Transition::ManageDaysOff => "manage days off",
            Transition::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(ActionError),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn into_result(self) -> Result<(), ActionError> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(error) => Err(error),
        }
    }
}

fn allow_if(condition: bool) -> Decision {
    if condition {
        Decision::Allow
    } else {
        Decision::Deny(ActionError::Unauthorized)
    }
}

pub fn can_transition(
    actor: &Actor,
    submission: &OvertimeSubmission,
    transition: Transition,
) -> Decision {
    let status = submission.status;
    let is_owner = submission.is_submitted_by(&actor.email);
    let is_supervisor = submission.is_supervised_by(&actor.email);

    match transition {
        Transition::Correct | Transition::Edit => {
            // Settled entities are fenced for every role, admin included.
            if status.is_settled() {
                return Decision::Deny(ActionError::CannotCorrectAccounted);
            }
            allow_if(
                actor.is_admin()
                    || (actor.is_hr()
                        && matches!(status, OvertimeStatus::Pending | OvertimeStatus::Approved))
                    || (is_owner && status == OvertimeStatus::Pending),
            )
        }
        Transition::Approve => {
            if actor.is_admin() {
                return Decision::Allow;
            }
            if status == OvertimeStatus::PendingPlantManager {
                return allow_if(actor.is_plant_manager());
            }
            allow_if(
                actor.is_hr()
                    || is_supervisor
                    || (actor.is_plant_manager()
                        && submission.kind == SubmissionKind::OvertimeRequest),
            )
        }
        Transition::Reject => allow_if(actor.is_admin() || actor.is_hr() || is_supervisor),
        Transition::MarkAsAccounted => allow_if(actor.is_admin() || actor.is_hr()),
        // Self-service only; other roles cancel through a correction.
        Transition::Cancel => allow_if(is_owner),
        Transition::Complete | Transition::ManageDaysOff => allow_if(
            actor.is_admin()
                || actor.is_hr()
                || is_supervisor
                || is_owner
                || submission
                    .responsible_employee()
                    .eq_ignore_ascii_case(&actor.email),
        ),
        Transition::Delete => allow_if(actor.is_admin()),
    }
}

/// Read access: privileged roles, or anyone involved in the submission.
pub fn can_view(actor: &Actor, submission: &OvertimeSubmission) -> bool {
    actor.sees_all() || submission.involves(&actor.email)
}
