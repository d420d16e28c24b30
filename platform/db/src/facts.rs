//! Builds the engine's view of stored rows, following parent rows for the
//! relations a record does not carry itself.

use entity::{customer, follow_up, hierarchy, interaction, loan, user};
use platform_authz::{
    CustomerFacts, FollowUpFacts, HierarchyFacts, InteractionFacts, LoanFacts, PaymentFacts,
    Resource, Role, UserFacts,
};
use sea_orm::{ConnectionTrait, DbErr, EntityTrait};
use uuid::Uuid;

use crate::mapping;

pub fn user(model: &user::Model, requested_role: Option<Role>) -> Resource {
    Resource::User(UserFacts {
        id: model.id,
        role: mapping::role(model.role),
        requested_role,
    })
}

pub fn hierarchy(model: &hierarchy::Model) -> Resource {
    Resource::Hierarchy(HierarchyFacts {
        manager: model.manager_id,
        collection_officer: model.collection_officer_id,
    })
}

pub fn customer(model: &customer::Model) -> Resource {
    Resource::Customer(CustomerFacts {
        assigned_officer: model.assigned_officer_id,
        is_active: model.is_active,
    })
}

/// Officer of the given customer. A missing customer has no officer.
pub async fn customer_officer<C>(db: &C, customer_id: Uuid) -> Result<Option<Uuid>, DbErr>
where
    C: ConnectionTrait,
{
    Ok(customer::Entity::find_by_id(customer_id)
        .one(db)
        .await?
        .and_then(|c| c.assigned_officer_id))
}

pub fn loan_with(model: &loan::Model, customer_officer: Option<Uuid>) -> Resource {
    Resource::Loan(LoanFacts {
        assigned_officer: model.assigned_officer_id,
        customer_officer,
        status: mapping::loan_status(model.status),
    })
}

pub async fn loan<C: ConnectionTrait>(db: &C, model: &loan::Model) -> Result<Resource, DbErr> {
    let officer = customer_officer(db, model.customer_id).await?;
    Ok(loan_with(model, officer))
}

/// Facts of a payment against `loan_id`, whether stored or about to be.
pub async fn payment_on<C: ConnectionTrait>(
    db: &C,
    loan_id: Uuid,
    received_by: Option<Uuid>,
) -> Result<Resource, DbErr> {
    let parent = loan::Entity::find_by_id(loan_id).one(db).await?;
    let (loan_officer, customer_officer) = match parent {
        Some(parent) => (
            parent.assigned_officer_id,
            customer_officer(db, parent.customer_id).await?,
        ),
        None => (None, None),
    };
    Ok(Resource::Payment(PaymentFacts {
        loan_officer,
        customer_officer,
        received_by,
    }))
}

pub async fn interaction_on<C: ConnectionTrait>(
    db: &C,
    customer_id: Uuid,
    initiated_by: Uuid,
) -> Result<Resource, DbErr> {
    Ok(Resource::Interaction(InteractionFacts {
        customer_officer: customer_officer(db, customer_id).await?,
        initiated_by,
    }))
}

pub async fn interaction<C: ConnectionTrait>(
    db: &C,
    model: &interaction::Model,
) -> Result<Resource, DbErr> {
    interaction_on(db, model.customer_id, model.initiated_by_id).await
}

pub async fn follow_up_on<C: ConnectionTrait>(
    db: &C,
    customer_id: Uuid,
    created_by: Uuid,
    assigned_to: Uuid,
) -> Result<Resource, DbErr> {
    Ok(Resource::FollowUp(FollowUpFacts {
        customer_officer: customer_officer(db, customer_id).await?,
        created_by,
        assigned_to,
    }))
}

pub async fn follow_up<C: ConnectionTrait>(
    db: &C,
    model: &follow_up::Model,
) -> Result<Resource, DbErr> {
    follow_up_on(db, model.customer_id, model.created_by_id, model.assigned_to_id).await
}
