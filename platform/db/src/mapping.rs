//! Conversions between stored enums and the engine's vocabulary.

use entity::{follow_up, loan, user};
use platform_authz::{FollowUpStatus, LoanStatus, Role};

pub fn role(value: user::Role) -> Role {
    match value {
        user::Role::SuperManager => Role::SuperManager,
        user::Role::Manager => Role::Manager,
        user::Role::CollectionOfficer => Role::CollectionOfficer,
        user::Role::CallingAgent => Role::CallingAgent,
    }
}

pub fn stored_role(value: Role) -> user::Role {
    match value {
        Role::SuperManager => user::Role::SuperManager,
        Role::Manager => user::Role::Manager,
        Role::CollectionOfficer => user::Role::CollectionOfficer,
        Role::CallingAgent => user::Role::CallingAgent,
    }
}

pub fn loan_status(value: loan::Status) -> LoanStatus {
    match value {
        loan::Status::Pending => LoanStatus::Pending,
        loan::Status::Active => LoanStatus::Active,
        loan::Status::Paid => LoanStatus::Paid,
        loan::Status::Defaulted => LoanStatus::Defaulted,
        loan::Status::Restructured => LoanStatus::Restructured,
        loan::Status::WrittenOff => LoanStatus::WrittenOff,
    }
}

pub fn stored_loan_status(value: LoanStatus) -> loan::Status {
    match value {
        LoanStatus::Pending => loan::Status::Pending,
        LoanStatus::Active => loan::Status::Active,
        LoanStatus::Paid => loan::Status::Paid,
        LoanStatus::Defaulted => loan::Status::Defaulted,
        LoanStatus::Restructured => loan::Status::Restructured,
        LoanStatus::WrittenOff => loan::Status::WrittenOff,
    }
}

pub fn follow_up_status(value: follow_up::Status) -> FollowUpStatus {
    match value {
        follow_up::Status::Pending => FollowUpStatus::Pending,
        follow_up::Status::Completed => FollowUpStatus::Completed,
        follow_up::Status::Rescheduled => FollowUpStatus::Rescheduled,
        follow_up::Status::Canceled => FollowUpStatus::Canceled,
    }
}

pub fn stored_follow_up_status(value: FollowUpStatus) -> follow_up::Status {
    match value {
        FollowUpStatus::Pending => follow_up::Status::Pending,
        FollowUpStatus::Completed => follow_up::Status::Completed,
        FollowUpStatus::Rescheduled => follow_up::Status::Rescheduled,
        FollowUpStatus::Canceled => follow_up::Status::Canceled,
    }
}
