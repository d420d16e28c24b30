//! Row-level access decisions for the collections backend.
//!
//! `PolicyEngine::decide` answers a single (principal, record, operation)
//! question; `PolicyEngine::scope` answers the same question for a whole
//! listing, expressed as predicates the data layer turns into SQL. The two
//! agree: a record is in a principal's scope exactly when reading it is
//! allowed.

pub mod engine;
pub mod lifecycle;
pub mod operation;
pub mod resource;
pub mod role;
pub mod scope;

pub use engine::{AuthzError, Decision, DenyReason, PolicyEngine};
pub use lifecycle::{LifecycleError, Transition};
pub use operation::{Operation, WriteKind};
pub use resource::{
    CustomerFacts, FollowUpFacts, FollowUpStatus, HierarchyFacts, InteractionFacts, LoanFacts,
    LoanStatus, OwnedFacts, PaymentFacts, Relation, Resource, ResourceKind, UserFacts,
};
pub use role::{Principal, Role, UnknownRole};
pub use scope::{Predicate, Scope};
