//! Status transitions for loans and follow-ups.
//!
//! Every action checks the current status first and only then the caller's
//! role, so an impossible transition reports as such regardless of who asks.

use thiserror::Error;

use crate::{
    resource::{FollowUpStatus, LoanStatus},
    role::{Principal, Role},
};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Transition<S> {
    pub from: S,
    pub to: S,
}

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum LifecycleError {
    #[error("{0}")]
    InvalidState(String),
    #[error("{action} requires {required} or above")]
    Forbidden {
        action: &'static str,
        required: Role,
    },
    #[error("authentication required")]
    Unauthenticated,
}

fn gate(principal: &Principal, action: &'static str, required: Role) -> Result<(), LifecycleError> {
    if !principal.authenticated {
        return Err(LifecycleError::Unauthenticated);
    }
    if principal.role.can_write_at(required) {
        Ok(())
    } else {
        Err(LifecycleError::Forbidden { action, required })
    }
}

/// Pending -> Active. Collection officers and above.
pub fn approve(
    status: LoanStatus,
    principal: &Principal,
) -> Result<Transition<LoanStatus>, LifecycleError> {
    if status != LoanStatus::Pending {
        return Err(LifecycleError::InvalidState(
            "Only pending loans can be approved.".into(),
        ));
    }
    gate(principal, "approve", Role::CollectionOfficer)?;
    Ok(Transition {
        from: status,
        to: LoanStatus::Active,
    })
}

/// Active or Defaulted -> Restructured. Managers and above.
pub fn restructure(
    status: LoanStatus,
    principal: &Principal,
) -> Result<Transition<LoanStatus>, LifecycleError> {
    if !RESTRUCTURABLE.contains(&status) {
        return Err(LifecycleError::InvalidState(
            "Only active or defaulted loans can be restructured.".into(),
        ));
    }
    gate(principal, "restructure", Role::Manager)?;
    Ok(Transition {
        from: status,
        to: LoanStatus::Restructured,
    })
}

/// Anything but Paid -> WrittenOff. Super managers only.
pub fn write_off(
    status: LoanStatus,
    principal: &Principal,
) -> Result<Transition<LoanStatus>, LifecycleError> {
    if status == LoanStatus::Paid {
        return Err(LifecycleError::InvalidState(
            "Paid loans cannot be written off.".into(),
        ));
    }
    gate(principal, "write_off", Role::SuperManager)?;
    Ok(Transition {
        from: status,
        to: LoanStatus::WrittenOff,
    })
}

pub const RESTRUCTURABLE: [LoanStatus; 2] = [LoanStatus::Active, LoanStatus::Defaulted];

/// Statuses a write-off may start from.
pub fn write_off_sources() -> Vec<LoanStatus> {
    LoanStatus::ALL
        .into_iter()
        .filter(|s| *s != LoanStatus::Paid)
        .collect()
}

/// Full repayment moves any unpaid loan to Paid, whatever its status.
pub fn settle(status: LoanStatus) -> Option<Transition<LoanStatus>> {
    (status != LoanStatus::Paid).then_some(Transition {
        from: status,
        to: LoanStatus::Paid,
    })
}

pub fn complete(status: FollowUpStatus) -> Result<Transition<FollowUpStatus>, LifecycleError> {
    if status == FollowUpStatus::Completed {
        return Err(LifecycleError::InvalidState(
            "This follow-up is already completed.".into(),
        ));
    }
    Ok(Transition {
        from: status,
        to: FollowUpStatus::Completed,
    })
}

pub fn reschedule(status: FollowUpStatus) -> Result<Transition<FollowUpStatus>, LifecycleError> {
    match status {
        FollowUpStatus::Completed | FollowUpStatus::Canceled => Err(LifecycleError::InvalidState(
            "This follow-up cannot be rescheduled.".into(),
        )),
        _ => Ok(Transition {
            from: status,
            to: FollowUpStatus::Rescheduled,
        }),
    }
}

/// Follow-up statuses `complete` accepts.
pub fn completable() -> Vec<FollowUpStatus> {
    vec![
        FollowUpStatus::Pending,
        FollowUpStatus::Rescheduled,
        FollowUpStatus::Canceled,
    ]
}

pub fn reschedulable() -> Vec<FollowUpStatus> {
    vec![FollowUpStatus::Pending, FollowUpStatus::Rescheduled]
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn as_role(role: Role) -> Principal {
        Principal::authenticated(Uuid::new_v4(), role)
    }

    #[test]
    fn approve_checks_status_before_role() {
        let agent = as_role(Role::CallingAgent);
        assert!(matches!(
            approve(LoanStatus::Active, &agent),
            Err(LifecycleError::InvalidState(_))
        ));
        assert!(matches!(
            approve(LoanStatus::Pending, &agent),
            Err(LifecycleError::Forbidden { .. })
        ));
        let officer = as_role(Role::CollectionOfficer);
        assert_eq!(
            approve(LoanStatus::Pending, &officer).unwrap().to,
            LoanStatus::Active
        );
    }

    #[test]
    fn restructure_needs_manager() {
        assert!(matches!(
            restructure(LoanStatus::Defaulted, &as_role(Role::CollectionOfficer)),
            Err(LifecycleError::Forbidden { required: Role::Manager, .. })
        ));
        assert!(restructure(LoanStatus::Defaulted, &as_role(Role::Manager)).is_ok());
        assert!(matches!(
            restructure(LoanStatus::Pending, &as_role(Role::SuperManager)),
            Err(LifecycleError::InvalidState(_))
        ));
    }

    #[test]
    fn paid_loans_cannot_be_written_off_by_anyone() {
        for role in Role::ALL {
            assert!(matches!(
                write_off(LoanStatus::Paid, &as_role(role)),
                Err(LifecycleError::InvalidState(_))
            ));
        }
        assert!(write_off(LoanStatus::Restructured, &as_role(Role::Manager)).is_err());
        let sm = as_role(Role::SuperManager);
        for status in write_off_sources() {
            assert_eq!(write_off(status, &sm).unwrap().to, LoanStatus::WrittenOff);
        }
        assert_eq!(settle(LoanStatus::Defaulted).map(|t| t.to), Some(LoanStatus::Paid));
        assert!(settle(LoanStatus::Paid).is_none());
    }

    #[test]
    fn anonymous_callers_are_rejected_after_state_check() {
        assert_eq!(
            approve(LoanStatus::Pending, &Principal::anonymous()),
            Err(LifecycleError::Unauthenticated)
        );
    }

    #[test]
    fn follow_up_transitions() {
        assert!(complete(FollowUpStatus::Completed).is_err());
        assert!(complete(FollowUpStatus::Rescheduled).is_ok());
        assert!(reschedule(FollowUpStatus::Canceled).is_err());
        assert_eq!(
            reschedule(FollowUpStatus::Pending).unwrap().to,
            FollowUpStatus::Rescheduled
        );
        for status in completable() {
            assert!(complete(status).is_ok());
        }
        for status in reschedulable() {
            assert!(reschedule(status).is_ok());
        }
    }
}
