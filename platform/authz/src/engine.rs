use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::{
    operation::{Operation, WriteKind},
    resource::{LoanStatus, Relation, Resource, ResourceKind, UserFacts},
    role::{Principal, Role},
    scope::{Predicate, Scope},
};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    Unauthenticated,
    /// The role is never allowed this operation on this kind.
    Role,
    /// The role could be allowed, but the record is not assigned to or authored by the caller.
    Ownership,
    SelfRoleChange,
    /// Target is a super manager, or the write would create one.
    ProtectedUser,
    Unmatched,
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            DenyReason::Unauthenticated => "authentication required",
            DenyReason::Role => "role not permitted",
            DenyReason::Ownership => "record not assigned to caller",
            DenyReason::SelfRoleChange => "cannot change own role",
            DenyReason::ProtectedUser => "super manager accounts are protected",
            DenyReason::Unmatched => "no rule matched",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        matches!(self, Decision::Allow)
    }

    fn from_bool(allowed: bool, reason: DenyReason) -> Self {
        if allowed {
            Decision::Allow
        } else {
            Decision::Deny(reason)
        }
    }
}

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum AuthzError {
    #[error("authentication required")]
    Unauthenticated,
    #[error("{operation} denied on {kind}: {reason}")]
    Denied {
        operation: Operation,
        kind: ResourceKind,
        reason: DenyReason,
    },
}

const AGENT_VISIBLE_LOANS: [LoanStatus; 2] = [LoanStatus::Active, LoanStatus::Defaulted];

/// Stateless policy evaluator. Build one per process and share it.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct PolicyEngine {
    enforce: bool,
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::enforcing()
    }
}

impl PolicyEngine {
    pub fn enforcing() -> Self {
        Self { enforce: true }
    }

    /// Allows every authenticated principal. Unauthenticated callers are
    /// still denied.
    pub fn permissive() -> Self {
        Self { enforce: false }
    }

    pub fn new(enforce: bool) -> Self {
        Self { enforce }
    }

    pub fn is_enforcing(&self) -> bool {
        self.enforce
    }

    pub fn decide(&self, principal: &Principal, resource: &Resource, op: Operation) -> Decision {
        if !principal.authenticated {
            return Decision::Deny(DenyReason::Unauthenticated);
        }
        if !self.enforce {
            return Decision::Allow;
        }
        match resource {
            Resource::Owned(_) => owner_or_read_only(principal, resource, op),
            Resource::User(user) => decide_user(self, principal, user, resource, op),
            Resource::Hierarchy(_) => decide_hierarchy(principal, resource),
            _ if principal.role.grants(op, Role::Manager) => Decision::Allow,
            _ if op.is_read() => Decision::from_bool(
                self.scope(principal, resource.kind()).matches(resource),
                DenyReason::Ownership,
            ),
            _ => decide_assigned_write(principal, resource, op),
        }
    }

    pub fn scope(&self, principal: &Principal, kind: ResourceKind) -> Scope {
        if !principal.authenticated {
            return Scope::Nothing;
        }
        if !self.enforce {
            return Scope::All;
        }
        let me = principal.id;
        let role = principal.role;
        match kind {
            ResourceKind::Owned => Scope::All,
            ResourceKind::User => match role {
                Role::SuperManager => Scope::All,
                Role::Manager => Scope::any_of([Predicate::UserRoleIn(vec![
                    Role::Manager,
                    Role::CollectionOfficer,
                    Role::CallingAgent,
                ])]),
                Role::CollectionOfficer => Scope::any_of([
                    Predicate::Related(Relation::Subject, me),
                    Predicate::UserRoleIn(vec![Role::CallingAgent]),
                ]),
                Role::CallingAgent => Scope::any_of([Predicate::Related(Relation::Subject, me)]),
            },
            ResourceKind::Hierarchy => match role {
                Role::SuperManager => Scope::All,
                Role::Manager => Scope::any_of([Predicate::Related(Relation::Manager, me)]),
                _ => Scope::Nothing,
            },
            _ if role.grants(Operation::Read, Role::Manager) => Scope::All,
            ResourceKind::Customer => match role {
                Role::CollectionOfficer => {
                    Scope::any_of([Predicate::Related(Relation::AssignedOfficer, me)])
                }
                // TODO: replace with a call-assignment relation once agents get work queues.
                _ => Scope::any_of([Predicate::ActiveCustomer]),
            },
            ResourceKind::Loan => match role {
                Role::CollectionOfficer => Scope::any_of([
                    Predicate::Related(Relation::AssignedOfficer, me),
                    Predicate::Related(Relation::CustomerOfficer, me),
                ]),
                _ => Scope::any_of([Predicate::LoanStatusIn(AGENT_VISIBLE_LOANS.to_vec())]),
            },
            ResourceKind::Payment => match role {
                Role::CollectionOfficer => Scope::any_of([
                    Predicate::Related(Relation::LoanOfficer, me),
                    Predicate::Related(Relation::CustomerOfficer, me),
                    Predicate::Related(Relation::ReceivedBy, me),
                ]),
                _ => Scope::any_of([Predicate::Related(Relation::ReceivedBy, me)]),
            },
            ResourceKind::Interaction => match role {
                Role::CollectionOfficer => Scope::any_of([
                    Predicate::Related(Relation::CustomerOfficer, me),
                    Predicate::Related(Relation::InitiatedBy, me),
                ]),
                _ => Scope::any_of([Predicate::Related(Relation::InitiatedBy, me)]),
            },
            ResourceKind::FollowUp => match role {
                Role::CollectionOfficer => Scope::any_of([
                    Predicate::Related(Relation::CustomerOfficer, me),
                    Predicate::Related(Relation::CreatedBy, me),
                    Predicate::Related(Relation::AssignedTo, me),
                ]),
                _ => Scope::any_of([
                    Predicate::Related(Relation::CreatedBy, me),
                    Predicate::Related(Relation::AssignedTo, me),
                ]),
            },
        }
    }

    /// `decide` as a `Result`, logging denials.
    pub fn check(
        &self,
        principal: &Principal,
        resource: &Resource,
        op: Operation,
    ) -> Result<(), AuthzError> {
        match self.decide(principal, resource, op) {
            Decision::Allow => Ok(()),
            Decision::Deny(DenyReason::Unauthenticated) => Err(AuthzError::Unauthenticated),
            Decision::Deny(reason) => {
                debug!(
                    principal = %principal.id,
                    role = %principal.role,
                    kind = %resource.kind(),
                    operation = %op,
                    %reason,
                    "access denied"
                );
                Err(AuthzError::Denied {
                    operation: op,
                    kind: resource.kind(),
                    reason,
                })
            }
        }
    }

    /// Scope for list endpoints; anonymous callers get an error instead of
    /// an empty listing.
    pub fn list_scope(
        &self,
        principal: &Principal,
        kind: ResourceKind,
    ) -> Result<Scope, AuthzError> {
        if !principal.authenticated {
            return Err(AuthzError::Unauthenticated);
        }
        Ok(self.scope(principal, kind))
    }
}

fn owner_or_read_only(principal: &Principal, resource: &Resource, op: Operation) -> Decision {
    if op.is_read() {
        return Decision::Allow;
    }
    Decision::from_bool(
        principal.is(resource.relation(Relation::Owner)),
        DenyReason::Ownership,
    )
}

fn decide_user(
    engine: &PolicyEngine,
    principal: &Principal,
    user: &UserFacts,
    resource: &Resource,
    op: Operation,
) -> Decision {
    let kind = match op {
        Operation::Read => {
            return Decision::from_bool(
                engine.scope(principal, ResourceKind::User).matches(resource),
                DenyReason::Ownership,
            );
        }
        Operation::Write(kind) => kind,
    };
    let changes_role = user.requested_role.is_some_and(|next| next != user.role);
    if user.id == principal.id && changes_role {
        return Decision::Deny(DenyReason::SelfRoleChange);
    }
    match (principal.role, kind) {
        (Role::SuperManager, _) => Decision::Allow,
        (Role::Manager, WriteKind::Update) => {
            let touches_super = user.role == Role::SuperManager
                || user.requested_role == Some(Role::SuperManager);
            Decision::from_bool(!touches_super, DenyReason::ProtectedUser)
        }
        _ => Decision::Deny(DenyReason::Role),
    }
}

fn decide_hierarchy(principal: &Principal, resource: &Resource) -> Decision {
    match principal.role {
        Role::SuperManager => Decision::Allow,
        Role::Manager => Decision::from_bool(
            principal.is(resource.relation(Relation::Manager)),
            DenyReason::Ownership,
        ),
        _ => Decision::Deny(DenyReason::Role),
    }
}

/// Writes by collection officers and calling agents on assignment-scoped kinds.
fn decide_assigned_write(principal: &Principal, resource: &Resource, op: Operation) -> Decision {
    let owner = |relation| principal.is(resource.relation(relation));
    match (principal.role, resource.kind()) {
        (Role::CollectionOfficer, ResourceKind::Customer | ResourceKind::Loan) => {
            Decision::from_bool(owner(Relation::AssignedOfficer), DenyReason::Ownership)
        }
        (Role::CollectionOfficer, ResourceKind::Payment) => {
            if op != Operation::CREATE {
                return Decision::Deny(DenyReason::Role);
            }
            Decision::from_bool(
                owner(Relation::LoanOfficer) || owner(Relation::CustomerOfficer),
                DenyReason::Ownership,
            )
        }
        (Role::CollectionOfficer, ResourceKind::Interaction | ResourceKind::FollowUp) => {
            Decision::from_bool(owner(Relation::CustomerOfficer), DenyReason::Ownership)
        }
        (Role::CallingAgent, ResourceKind::Interaction) => {
            Decision::from_bool(owner(Relation::InitiatedBy), DenyReason::Ownership)
        }
        (Role::CallingAgent, ResourceKind::FollowUp) => {
            Decision::from_bool(owner(Relation::CreatedBy), DenyReason::Ownership)
        }
        (
            Role::CallingAgent,
            ResourceKind::Customer | ResourceKind::Loan | ResourceKind::Payment,
        ) => Decision::Deny(DenyReason::Role),
        _ => Decision::Deny(DenyReason::Unmatched),
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::resource::{
        CustomerFacts, FollowUpFacts, HierarchyFacts, InteractionFacts, LoanFacts, OwnedFacts,
        PaymentFacts,
    };

    fn principal(role: Role) -> Principal {
        Principal::authenticated(Uuid::new_v4(), role)
    }

    fn loan(assigned: Option<Uuid>, customer: Option<Uuid>, status: LoanStatus) -> Resource {
        Resource::Loan(LoanFacts {
            assigned_officer: assigned,
            customer_officer: customer,
            status,
        })
    }

    fn user(id: Uuid, role: Role, requested_role: Option<Role>) -> Resource {
        Resource::User(UserFacts {
            id,
            role,
            requested_role,
        })
    }

    #[test]
    fn anonymous_is_always_denied() {
        let engine = PolicyEngine::enforcing();
        let anon = Principal::anonymous();
        let resource = Resource::Owned(OwnedFacts { owner: None });
        assert_eq!(
            engine.decide(&anon, &resource, Operation::Read),
            Decision::Deny(DenyReason::Unauthenticated)
        );
        assert_eq!(engine.scope(&anon, ResourceKind::Customer), Scope::Nothing);
        assert_eq!(
            engine.check(&anon, &resource, Operation::Read),
            Err(AuthzError::Unauthenticated)
        );
        assert!(
            PolicyEngine::permissive()
                .list_scope(&anon, ResourceKind::Loan)
                .is_err()
        );
    }

    #[test]
    fn officer_loan_write_requires_direct_assignment() {
        let engine = PolicyEngine::enforcing();
        let officer = principal(Role::CollectionOfficer);
        let other = Uuid::new_v4();

        let own = loan(Some(officer.id), Some(officer.id), LoanStatus::Active);
        let customer_only = loan(Some(other), Some(officer.id), LoanStatus::Active);
        let foreign = loan(Some(other), Some(other), LoanStatus::Active);
        let unassigned = loan(None, Some(officer.id), LoanStatus::Pending);

        assert!(engine.decide(&officer, &own, Operation::UPDATE).is_allowed());
        assert!(engine.decide(&officer, &customer_only, Operation::Read).is_allowed());
        assert_eq!(
            engine.decide(&officer, &customer_only, Operation::UPDATE),
            Decision::Deny(DenyReason::Ownership)
        );
        assert!(!engine.decide(&officer, &foreign, Operation::Read).is_allowed());
        assert!(!engine.decide(&officer, &unassigned, Operation::DELETE).is_allowed());
    }

    #[test]
    fn agent_reads_only_collectible_loans() {
        let engine = PolicyEngine::enforcing();
        let agent = principal(Role::CallingAgent);
        for status in LoanStatus::ALL {
            let resource = loan(None, None, status);
            let expected = matches!(status, LoanStatus::Active | LoanStatus::Defaulted);
            assert_eq!(
                engine.decide(&agent, &resource, Operation::Read).is_allowed(),
                expected,
                "{status:?}"
            );
            assert_eq!(
                engine.decide(&agent, &resource, Operation::UPDATE),
                Decision::Deny(DenyReason::Role)
            );
        }
    }

    #[test]
    fn customers_follow_assignment() {
        let engine = PolicyEngine::enforcing();
        let officer = principal(Role::CollectionOfficer);
        let agent = principal(Role::CallingAgent);
        let mine = Resource::Customer(CustomerFacts {
            assigned_officer: Some(officer.id),
            is_active: true,
        });
        let unassigned = Resource::Customer(CustomerFacts {
            assigned_officer: None,
            is_active: true,
        });
        let inactive = Resource::Customer(CustomerFacts {
            assigned_officer: None,
            is_active: false,
        });

        assert!(engine.decide(&officer, &mine, Operation::DELETE).is_allowed());
        assert!(!engine.decide(&officer, &unassigned, Operation::Read).is_allowed());
        assert!(!engine.decide(&officer, &unassigned, Operation::CREATE).is_allowed());
        assert!(engine.decide(&agent, &unassigned, Operation::Read).is_allowed());
        assert!(!engine.decide(&agent, &inactive, Operation::Read).is_allowed());
        assert!(!engine.decide(&agent, &mine, Operation::UPDATE).is_allowed());
    }

    #[test]
    fn agents_see_what_they_authored() {
        let engine = PolicyEngine::enforcing();
        let agent = principal(Role::CallingAgent);
        let someone = Uuid::new_v4();
        let mine = Resource::Interaction(InteractionFacts {
            customer_officer: Some(someone),
            initiated_by: agent.id,
        });
        let theirs = Resource::Interaction(InteractionFacts {
            customer_officer: Some(someone),
            initiated_by: someone,
        });
        assert!(engine.decide(&agent, &mine, Operation::Read).is_allowed());
        assert!(engine.decide(&agent, &mine, Operation::UPDATE).is_allowed());
        assert!(!engine.decide(&agent, &theirs, Operation::Read).is_allowed());

        let assigned = Resource::FollowUp(FollowUpFacts {
            customer_officer: None,
            created_by: someone,
            assigned_to: agent.id,
        });
        assert!(engine.decide(&agent, &assigned, Operation::Read).is_allowed());
        assert!(!engine.decide(&agent, &assigned, Operation::UPDATE).is_allowed());
    }

    #[test]
    fn officer_interactions_follow_customer_assignment() {
        let engine = PolicyEngine::enforcing();
        let officer = principal(Role::CollectionOfficer);
        let authored_elsewhere = Resource::Interaction(InteractionFacts {
            customer_officer: Some(Uuid::new_v4()),
            initiated_by: officer.id,
        });
        assert!(engine.decide(&officer, &authored_elsewhere, Operation::Read).is_allowed());
        assert!(!engine.decide(&officer, &authored_elsewhere, Operation::UPDATE).is_allowed());

        let on_my_customer = Resource::FollowUp(FollowUpFacts {
            customer_officer: Some(officer.id),
            created_by: Uuid::new_v4(),
            assigned_to: Uuid::new_v4(),
        });
        assert!(engine.decide(&officer, &on_my_customer, Operation::UPDATE).is_allowed());
    }

    #[test]
    fn payments_are_created_on_assigned_loans_only() {
        let engine = PolicyEngine::enforcing();
        let officer = principal(Role::CollectionOfficer);
        let agent = principal(Role::CallingAgent);
        let on_my_loan = Resource::Payment(PaymentFacts {
            loan_officer: Some(officer.id),
            customer_officer: None,
            received_by: Some(agent.id),
        });
        assert!(engine.decide(&officer, &on_my_loan, Operation::CREATE).is_allowed());
        assert_eq!(
            engine.decide(&officer, &on_my_loan, Operation::UPDATE),
            Decision::Deny(DenyReason::Role)
        );
        assert!(engine.decide(&agent, &on_my_loan, Operation::Read).is_allowed());
        assert!(!engine.decide(&agent, &on_my_loan, Operation::CREATE).is_allowed());
    }

    #[test]
    fn user_management_rules() {
        let engine = PolicyEngine::enforcing();
        let sm = principal(Role::SuperManager);
        let manager = principal(Role::Manager);
        let officer = principal(Role::CollectionOfficer);

        let boss = user(Uuid::new_v4(), Role::SuperManager, None);
        let agent = user(Uuid::new_v4(), Role::CallingAgent, Some(Role::CollectionOfficer));
        let promote = user(Uuid::new_v4(), Role::Manager, Some(Role::SuperManager));

        assert!(engine.decide(&sm, &boss, Operation::DELETE).is_allowed());
        assert!(engine.decide(&sm, &agent, Operation::CREATE).is_allowed());
        assert!(!engine.decide(&manager, &agent, Operation::CREATE).is_allowed());
        assert!(!engine.decide(&manager, &agent, Operation::DELETE).is_allowed());
        assert!(engine.decide(&manager, &agent, Operation::UPDATE).is_allowed());
        assert_eq!(
            engine.decide(&manager, &boss, Operation::UPDATE),
            Decision::Deny(DenyReason::ProtectedUser)
        );
        assert_eq!(
            engine.decide(&manager, &promote, Operation::UPDATE),
            Decision::Deny(DenyReason::ProtectedUser)
        );
        assert!(!engine.decide(&manager, &boss, Operation::Read).is_allowed());
        assert!(!engine.decide(&officer, &agent, Operation::UPDATE).is_allowed());
        let another_agent = user(Uuid::new_v4(), Role::CallingAgent, None);
        assert!(engine.decide(&officer, &another_agent, Operation::Read).is_allowed());
    }

    #[test]
    fn nobody_changes_their_own_role() {
        let engine = PolicyEngine::enforcing();
        for role in Role::ALL {
            let me = principal(role);
            let other_role = if role == Role::Manager {
                Role::CollectionOfficer
            } else {
                Role::Manager
            };
            let target = user(me.id, role, Some(other_role));
            assert_eq!(
                engine.decide(&me, &target, Operation::UPDATE),
                Decision::Deny(DenyReason::SelfRoleChange)
            );
        }
        let sm = principal(Role::SuperManager);
        let unchanged = user(sm.id, Role::SuperManager, Some(Role::SuperManager));
        assert!(engine.decide(&sm, &unchanged, Operation::UPDATE).is_allowed());
    }

    #[test]
    fn managers_only_touch_their_own_hierarchy_links() {
        let engine = PolicyEngine::enforcing();
        let manager = principal(Role::Manager);
        let mine = Resource::Hierarchy(HierarchyFacts {
            manager: manager.id,
            collection_officer: Uuid::new_v4(),
        });
        let theirs = Resource::Hierarchy(HierarchyFacts {
            manager: Uuid::new_v4(),
            collection_officer: Uuid::new_v4(),
        });
        assert!(engine.decide(&manager, &mine, Operation::CREATE).is_allowed());
        assert!(!engine.decide(&manager, &theirs, Operation::Read).is_allowed());
        assert_eq!(
            engine.decide(&principal(Role::CollectionOfficer), &mine, Operation::Read),
            Decision::Deny(DenyReason::Role)
        );
    }

    #[test]
    fn owned_resources_are_read_only_to_non_owners() {
        let engine = PolicyEngine::enforcing();
        let sm = principal(Role::SuperManager);
        let agent = principal(Role::CallingAgent);
        let agents = Resource::Owned(OwnedFacts { owner: Some(agent.id) });
        assert!(engine.decide(&sm, &agents, Operation::Read).is_allowed());
        assert!(!engine.decide(&sm, &agents, Operation::UPDATE).is_allowed());
        assert!(engine.decide(&agent, &agents, Operation::UPDATE).is_allowed());
    }

    #[test]
    fn permissive_engine_allows_authenticated_callers() {
        let engine = PolicyEngine::permissive();
        let agent = principal(Role::CallingAgent);
        let foreign = loan(None, None, LoanStatus::Pending);
        assert!(engine.decide(&agent, &foreign, Operation::DELETE).is_allowed());
        assert_eq!(engine.scope(&agent, ResourceKind::Loan), Scope::All);
    }
}
