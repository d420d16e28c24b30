//! Turns engine scopes into `WHERE` clauses.
//!
//! Relations reached through a parent row (a loan's customer officer, a
//! payment's loan officer) become `IN (SELECT ..)` subqueries so listings
//! stay single-table selects that paginate cleanly.

use entity::{customer, follow_up, hierarchy, interaction, loan, payment, user};
use platform_authz::{Predicate, Relation, ResourceKind, Scope};
use sea_orm::{
    ColumnTrait, Condition, EntityTrait, QueryFilter, Select,
    sea_query::{Expr, Query, SelectStatement, SimpleExpr},
};
use uuid::Uuid;

use crate::mapping;

/// An entity whose rows the engine can scope.
pub trait ScopedEntity: EntityTrait {
    const KIND: ResourceKind;

    /// SQL for one predicate, or `None` when it can never hold for this entity.
    fn predicate(predicate: &Predicate) -> Option<SimpleExpr>;
}

pub fn scope_condition<E: ScopedEntity>(scope: &Scope) -> Condition {
    match scope {
        Scope::All => Condition::all(),
        Scope::Nothing => Condition::all().add(never()),
        Scope::AnyOf(predicates) => {
            let translated: Vec<SimpleExpr> = predicates.iter().filter_map(E::predicate).collect();
            if translated.is_empty() {
                return Condition::all().add(never());
            }
            translated
                .into_iter()
                .fold(Condition::any(), |cond, expr| cond.add(expr))
        }
    }
}

/// `E::find()` restricted to `scope`.
pub fn scoped<E: ScopedEntity>(scope: &Scope) -> Select<E> {
    E::find().filter(scope_condition::<E>(scope))
}

fn never() -> SimpleExpr {
    Expr::val(1).eq(0)
}

fn customers_of(officer: Uuid) -> SelectStatement {
    Query::select()
        .column(customer::Column::Id)
        .from(customer::Entity)
        .and_where(customer::Column::AssignedOfficerId.eq(officer))
        .to_owned()
}

fn loans_assigned_to(officer: Uuid) -> SelectStatement {
    Query::select()
        .column(loan::Column::Id)
        .from(loan::Entity)
        .and_where(loan::Column::AssignedOfficerId.eq(officer))
        .to_owned()
}

fn loans_of_customers_of(officer: Uuid) -> SelectStatement {
    Query::select()
        .column(loan::Column::Id)
        .from(loan::Entity)
        .and_where(loan::Column::CustomerId.in_subquery(customers_of(officer)))
        .to_owned()
}

impl ScopedEntity for user::Entity {
    const KIND: ResourceKind = ResourceKind::User;

    fn predicate(predicate: &Predicate) -> Option<SimpleExpr> {
        match predicate {
            Predicate::Related(Relation::Subject, id) => Some(user::Column::Id.eq(*id)),
            Predicate::UserRoleIn(roles) => Some(
                user::Column::Role.is_in(roles.iter().map(|r| mapping::stored_role(*r))),
            ),
            _ => None,
        }
    }
}

impl ScopedEntity for hierarchy::Entity {
    const KIND: ResourceKind = ResourceKind::Hierarchy;

    fn predicate(predicate: &Predicate) -> Option<SimpleExpr> {
        match predicate {
            Predicate::Related(Relation::Manager, id) => Some(hierarchy::Column::ManagerId.eq(*id)),
            _ => None,
        }
    }
}

impl ScopedEntity for customer::Entity {
    const KIND: ResourceKind = ResourceKind::Customer;

    fn predicate(predicate: &Predicate) -> Option<SimpleExpr> {
        match predicate {
            Predicate::Related(Relation::AssignedOfficer, id) => {
                Some(customer::Column::AssignedOfficerId.eq(*id))
            }
            Predicate::ActiveCustomer => Some(customer::Column::IsActive.eq(true)),
            _ => None,
        }
    }
}

impl ScopedEntity for loan::Entity {
    const KIND: ResourceKind = ResourceKind::Loan;

    fn predicate(predicate: &Predicate) -> Option<SimpleExpr> {
        match predicate {
            Predicate::Related(Relation::AssignedOfficer, id) => {
                Some(loan::Column::AssignedOfficerId.eq(*id))
            }
            Predicate::Related(Relation::CustomerOfficer, id) => {
                Some(loan::Column::CustomerId.in_subquery(customers_of(*id)))
            }
            Predicate::LoanStatusIn(statuses) => Some(
                loan::Column::Status
                    .is_in(statuses.iter().map(|s| mapping::stored_loan_status(*s))),
            ),
            _ => None,
        }
    }
}

impl ScopedEntity for payment::Entity {
    const KIND: ResourceKind = ResourceKind::Payment;

    fn predicate(predicate: &Predicate) -> Option<SimpleExpr> {
        match predicate {
            Predicate::Related(Relation::LoanOfficer, id) => {
                Some(payment::Column::LoanId.in_subquery(loans_assigned_to(*id)))
            }
            Predicate::Related(Relation::CustomerOfficer, id) => {
                Some(payment::Column::LoanId.in_subquery(loans_of_customers_of(*id)))
            }
            Predicate::Related(Relation::ReceivedBy, id) => {
                Some(payment::Column::ReceivedById.eq(*id))
            }
            _ => None,
        }
    }
}

impl ScopedEntity for interaction::Entity {
    const KIND: ResourceKind = ResourceKind::Interaction;

    fn predicate(predicate: &Predicate) -> Option<SimpleExpr> {
        match predicate {
            Predicate::Related(Relation::CustomerOfficer, id) => {
                Some(interaction::Column::CustomerId.in_subquery(customers_of(*id)))
            }
            Predicate::Related(Relation::InitiatedBy, id) => {
                Some(interaction::Column::InitiatedById.eq(*id))
            }
            _ => None,
        }
    }
}

impl ScopedEntity for follow_up::Entity {
    const KIND: ResourceKind = ResourceKind::FollowUp;

    fn predicate(predicate: &Predicate) -> Option<SimpleExpr> {
        match predicate {
            Predicate::Related(Relation::CustomerOfficer, id) => {
                Some(follow_up::Column::CustomerId.in_subquery(customers_of(*id)))
            }
            Predicate::Related(Relation::CreatedBy, id) => {
                Some(follow_up::Column::CreatedById.eq(*id))
            }
            Predicate::Related(Relation::AssignedTo, id) => {
                Some(follow_up::Column::AssignedToId.eq(*id))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use platform_authz::{LoanStatus, PolicyEngine, Principal, Role};
    use sea_orm::{DbBackend, QueryTrait};

    use super::*;

    fn sql<E: ScopedEntity>(scope: &Scope) -> String {
        scoped::<E>(scope).build(DbBackend::Postgres).to_string()
    }

    #[test]
    fn unrestricted_scope_adds_no_filter() {
        let statement = sql::<loan::Entity>(&Scope::All);
        assert!(!statement.contains("WHERE"), "{statement}");
    }

    #[test]
    fn empty_scope_matches_nothing() {
        let statement = sql::<customer::Entity>(&Scope::Nothing);
        assert!(statement.contains("1 = 0"), "{statement}");
    }

    #[test]
    fn officer_loans_reach_through_customers() {
        let officer = Uuid::new_v4();
        let scope = PolicyEngine::enforcing().scope(
            &Principal::authenticated(officer, Role::CollectionOfficer),
            ResourceKind::Loan,
        );
        let statement = sql::<loan::Entity>(&scope);
        assert!(statement.contains(r#""loans"."assigned_officer_id" ="#), "{statement}");
        assert!(
            statement.contains(r#""loans"."customer_id" IN (SELECT "customers"."id" FROM "customers""#)
                || statement.contains(r#""loans"."customer_id" IN (SELECT "id" FROM "customers""#),
            "{statement}"
        );
        assert!(statement.contains(" OR "), "{statement}");
        assert!(statement.contains(&officer.to_string()), "{statement}");
    }

    #[test]
    fn agent_loans_filter_on_status() {
        let scope = Scope::any_of([Predicate::LoanStatusIn(vec![
            LoanStatus::Active,
            LoanStatus::Defaulted,
        ])]);
        let statement = sql::<loan::Entity>(&scope);
        assert!(statement.contains("IN ('ACTIVE', 'DEFAULTED')"), "{statement}");
    }

    #[test]
    fn predicates_for_other_kinds_translate_to_nothing() {
        let scope = Scope::any_of([Predicate::ActiveCustomer]);
        let statement = sql::<payment::Entity>(&scope);
        assert!(statement.contains("1 = 0"), "{statement}");
    }

    #[test]
    fn kinds_line_up_with_the_engine() {
        assert_eq!(<follow_up::Entity as ScopedEntity>::KIND, ResourceKind::FollowUp);
        assert_eq!(<hierarchy::Entity as ScopedEntity>::KIND, ResourceKind::Hierarchy);
    }
}
