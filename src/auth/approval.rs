//! Account lifecycle transitions.
//!
//! Functions here only decide; they mutate the `User` value they are given and the
//! caller persists it. Every transition requires an admin actor acting on someone
//! other than themselves.

use crate::error::{AppError, ErrorCode};
use crate::models::{ApprovalStatus, Role, User};
use crate::security::sanitize::strip_tags;
use crate::security::validators::validate_text_length;

pub const REJECTION_REASON_MAX: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approve,
    Reject { reason: String },
}

fn require_admin_on_other(actor: &User, target: &User) -> Result<(), AppError> {
    if !actor.is_admin() {
        return Err(AppError::Forbidden(
            ErrorCode::InsufficientPermissions,
            "Administrator role required".into(),
        ));
    }
    if actor.id == target.id {
        return Err(AppError::Forbidden(
            ErrorCode::AccessDenied,
            "You cannot change your own account status".into(),
        ));
    }
    Ok(())
}

fn invalid_transition(from: ApprovalStatus, to: ApprovalStatus) -> AppError {
    AppError::Conflict(
        ErrorCode::InvalidTransition,
        format!("Cannot move an account from {} to {}", from, to),
    )
}

/// Applies an approval decision to `target` and returns the new status.
///
/// Allowed: `pending -> approved`, `rejected -> approved`, `pending -> rejected`.
pub fn decide(
    actor: &User,
    target: &mut User,
    decision: ApprovalDecision,
) -> Result<ApprovalStatus, AppError> {
    require_admin_on_other(actor, target)?;

    if target.is_admin() {
        return Err(AppError::Conflict(
            ErrorCode::InvalidTransition,
            "Administrator accounts are always approved".into(),
        ));
    }

    let from = target.approval_status;
    match decision {
        ApprovalDecision::Approve => {
            if from == ApprovalStatus::Approved {
                return Err(invalid_transition(from, ApprovalStatus::Approved));
            }
            target.approval_status = ApprovalStatus::Approved;
            target.rejection_reason = None;
        }
        ApprovalDecision::Reject { reason } => {
            if from != ApprovalStatus::Pending {
                return Err(invalid_transition(from, ApprovalStatus::Rejected));
            }
            let reason = strip_tags(&reason);
            validate_text_length(&reason, 1, REJECTION_REASON_MAX)
                .map_err(|e| AppError::ValidationError(vec![format!("reason: {}", e)]))?;
            target.approval_status = ApprovalStatus::Rejected;
            target.rejection_reason = Some(reason);
        }
    }

    log::info!(
        "account {} moved from {} to {} by {}",
        target.id,
        from,
        target.approval_status,
        actor.id
    );
    Ok(target.approval_status)
}

/// Toggles `is_active`. Idempotent; an admin cannot deactivate themselves.
pub fn set_active(actor: &User, target: &mut User, active: bool) -> Result<(), AppError> {
    require_admin_on_other(actor, target)?;
    if target.is_active != active {
        log::info!(
            "account {} {} by {}",
            target.id,
            if active { "activated" } else { "deactivated" },
            actor.id
        );
    }
    target.is_active = active;
    Ok(())
}

/// Changes `target`'s role. Promotion to admin implies approval.
pub fn change_role(actor: &User, target: &mut User, role: Role) -> Result<(), AppError> {
    require_admin_on_other(actor, target)?;
    target.role = role;
    if role == Role::Admin {
        target.approval_status = ApprovalStatus::Approved;
        target.rejection_reason = None;
    }
    log::info!("account {} role set to {} by {}", target.id, role, actor.id);
    Ok(())
}
