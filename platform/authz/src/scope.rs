use uuid::Uuid;

use crate::{
    resource::{LoanStatus, Relation, Resource},
    role::Role,
};

/// A single condition a visible record must satisfy.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Predicate {
    Related(Relation, Uuid),
    LoanStatusIn(Vec<LoanStatus>),
    ActiveCustomer,
    UserRoleIn(Vec<Role>),
}

impl Predicate {
    pub fn matches(&self, resource: &Resource) -> bool {
        match self {
            Predicate::Related(relation, id) => resource.relation(*relation) == Some(*id),
            Predicate::LoanStatusIn(statuses) => match resource {
                Resource::Loan(loan) => statuses.contains(&loan.status),
                _ => false,
            },
            Predicate::ActiveCustomer => match resource {
                Resource::Customer(customer) => customer.is_active,
                _ => false,
            },
            Predicate::UserRoleIn(roles) => match resource {
                Resource::User(user) => roles.contains(&user.role),
                _ => false,
            },
        }
    }
}

/// Which records of one kind a principal may list.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Scope {
    All,
    Nothing,
    /// Visible when any predicate holds.
    AnyOf(Vec<Predicate>),
}

impl Scope {
    pub fn any_of(predicates: impl IntoIterator<Item = Predicate>) -> Self {
        let predicates: Vec<_> = predicates.into_iter().collect();
        if predicates.is_empty() {
            Scope::Nothing
        } else {
            Scope::AnyOf(predicates)
        }
    }

    pub fn matches(&self, resource: &Resource) -> bool {
        match self {
            Scope::All => true,
            Scope::Nothing => false,
            Scope::AnyOf(predicates) => predicates.iter().any(|p| p.matches(resource)),
        }
    }
}
