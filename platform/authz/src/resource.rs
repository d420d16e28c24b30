use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::role::Role;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanStatus {
    Pending,
    Active,
    Paid,
    Defaulted,
    Restructured,
    WrittenOff,
}

impl LoanStatus {
    pub const ALL: [LoanStatus; 6] = [
        LoanStatus::Pending,
        LoanStatus::Active,
        LoanStatus::Paid,
        LoanStatus::Defaulted,
        LoanStatus::Restructured,
        LoanStatus::WrittenOff,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LoanStatus::Pending => "PENDING",
            LoanStatus::Active => "ACTIVE",
            LoanStatus::Paid => "PAID",
            LoanStatus::Defaulted => "DEFAULTED",
            LoanStatus::Restructured => "RESTRUCTURED",
            LoanStatus::WrittenOff => "WRITTEN_OFF",
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FollowUpStatus {
    Pending,
    Completed,
    Rescheduled,
    Canceled,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    User,
    Hierarchy,
    Customer,
    Loan,
    Payment,
    Interaction,
    FollowUp,
    Owned,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::User => "user",
            ResourceKind::Hierarchy => "hierarchy",
            ResourceKind::Customer => "customer",
            ResourceKind::Loan => "loan",
            ResourceKind::Payment => "payment",
            ResourceKind::Interaction => "interaction",
            ResourceKind::FollowUp => "follow_up",
            ResourceKind::Owned => "owned",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ownership and assignment edges a rule can test against the principal.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    /// `assigned_officer` on the record itself (customer or loan).
    AssignedOfficer,
    /// `customer.assigned_officer` reached through the owning customer.
    CustomerOfficer,
    /// `loan.assigned_officer` reached through the owning loan.
    LoanOfficer,
    InitiatedBy,
    CreatedBy,
    AssignedTo,
    ReceivedBy,
    Manager,
    Owner,
    /// The user record's own id.
    Subject,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct UserFacts {
    pub id: Uuid,
    pub role: Role,
    /// Role the write would leave the user with, when the write touches it.
    pub requested_role: Option<Role>,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct HierarchyFacts {
    pub manager: Uuid,
    pub collection_officer: Uuid,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct CustomerFacts {
    pub assigned_officer: Option<Uuid>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct LoanFacts {
    pub assigned_officer: Option<Uuid>,
    pub customer_officer: Option<Uuid>,
    pub status: LoanStatus,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct PaymentFacts {
    pub loan_officer: Option<Uuid>,
    pub customer_officer: Option<Uuid>,
    pub received_by: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct InteractionFacts {
    pub customer_officer: Option<Uuid>,
    pub initiated_by: Uuid,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct FollowUpFacts {
    pub customer_officer: Option<Uuid>,
    pub created_by: Uuid,
    pub assigned_to: Uuid,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct OwnedFacts {
    pub owner: Option<Uuid>,
}

/// A record as the engine sees it: its kind plus the edges that matter.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Resource {
    User(UserFacts),
    Hierarchy(HierarchyFacts),
    Customer(CustomerFacts),
    Loan(LoanFacts),
    Payment(PaymentFacts),
    Interaction(InteractionFacts),
    FollowUp(FollowUpFacts),
    Owned(OwnedFacts),
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::User(_) => ResourceKind::User,
            Resource::Hierarchy(_) => ResourceKind::Hierarchy,
            Resource::Customer(_) => ResourceKind::Customer,
            Resource::Loan(_) => ResourceKind::Loan,
            Resource::Payment(_) => ResourceKind::Payment,
            Resource::Interaction(_) => ResourceKind::Interaction,
            Resource::FollowUp(_) => ResourceKind::FollowUp,
            Resource::Owned(_) => ResourceKind::Owned,
        }
    }

    /// Resolves an ownership edge. `None` both when the kind has no such
    /// edge and when the edge is unset.
    pub fn relation(&self, relation: Relation) -> Option<Uuid> {
        match (self, relation) {
            (Resource::User(u), Relation::Subject) => Some(u.id),
            (Resource::Hierarchy(h), Relation::Manager) => Some(h.manager),
            (Resource::Customer(c), Relation::AssignedOfficer) => c.assigned_officer,
            (Resource::Loan(l), Relation::AssignedOfficer) => l.assigned_officer,
            (Resource::Loan(l), Relation::CustomerOfficer) => l.customer_officer,
            (Resource::Payment(p), Relation::LoanOfficer) => p.loan_officer,
            (Resource::Payment(p), Relation::CustomerOfficer) => p.customer_officer,
            (Resource::Payment(p), Relation::ReceivedBy) => p.received_by,
            (Resource::Interaction(i), Relation::CustomerOfficer) => i.customer_officer,
            (Resource::Interaction(i), Relation::InitiatedBy) => Some(i.initiated_by),
            (Resource::FollowUp(f), Relation::CustomerOfficer) => f.customer_officer,
            (Resource::FollowUp(f), Relation::CreatedBy) => Some(f.created_by),
            (Resource::FollowUp(f), Relation::AssignedTo) => Some(f.assigned_to),
            (Resource::Owned(o), Relation::Owner) => o.owner,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relations_only_resolve_on_their_kind() {
        let officer = Uuid::new_v4();
        let loan = Resource::Loan(LoanFacts {
            assigned_officer: Some(officer),
            customer_officer: None,
            status: LoanStatus::Active,
        });
        assert_eq!(loan.relation(Relation::AssignedOfficer), Some(officer));
        assert_eq!(loan.relation(Relation::CustomerOfficer), None);
        assert_eq!(loan.relation(Relation::InitiatedBy), None);

        let follow_up = Resource::FollowUp(FollowUpFacts {
            customer_officer: None,
            created_by: officer,
            assigned_to: Uuid::nil(),
        });
        assert_eq!(follow_up.relation(Relation::CreatedBy), Some(officer));
        assert_eq!(follow_up.relation(Relation::InitiatedBy), None);
        assert_eq!(follow_up.kind(), ResourceKind::FollowUp);
    }
}
