use sea_orm_migration::prelude::*;

use crate::{
    m20251001_000001_staff::Users,
    m20251001_000002_portfolio::{Customers, Loans},
};

#[derive(DeriveIden)]
enum Interactions {
    Table,
    Id,
    CustomerId,
    LoanId,
    InteractionType,
    InitiatedById,
    ContactNumber,
    ContactPerson,
    StartTime,
    EndTime,
    DurationSeconds,
    Outcome,
    Notes,
    PaymentPromiseAmountCents,
    PaymentPromiseDate,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum FollowUps {
    Table,
    Id,
    InteractionId,
    CustomerId,
    FollowUpType,
    ScheduledDate,
    ScheduledTime,
    AssignedToId,
    Notes,
    Priority,
    Status,
    Result,
    CompletedAt,
    CompletedById,
    CreatedById,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Interactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Interactions::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Interactions::CustomerId).uuid().not_null())
                    .col(ColumnDef::new(Interactions::LoanId).uuid().null())
                    .col(
                        ColumnDef::new(Interactions::InteractionType)
                            .string_len(20)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Interactions::InitiatedById).uuid().not_null())
                    .col(
                        ColumnDef::new(Interactions::ContactNumber)
                            .string_len(15)
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(Interactions::ContactPerson)
                            .string_len(100)
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(Interactions::StartTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Interactions::EndTime)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(Interactions::DurationSeconds).integer().null())
                    .col(ColumnDef::new(Interactions::Outcome).string_len(30).null())
                    .col(ColumnDef::new(Interactions::Notes).text().not_null())
                    .col(
                        ColumnDef::new(Interactions::PaymentPromiseAmountCents)
                            .big_integer()
                            .null(),
                    )
                    .col(ColumnDef::new(Interactions::PaymentPromiseDate).date().null())
                    .col(
                        ColumnDef::new(Interactions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Interactions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_interactions_customer")
                            .from(Interactions::Table, Interactions::CustomerId)
                            .to(Customers::Table, Customers::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_interactions_loan")
                            .from(Interactions::Table, Interactions::LoanId)
                            .to(Loans::Table, Loans::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_interactions_initiated_by")
                            .from(Interactions::Table, Interactions::InitiatedById)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(FollowUps::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(FollowUps::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(FollowUps::InteractionId).uuid().not_null())
                    .col(ColumnDef::new(FollowUps::CustomerId).uuid().not_null())
                    .col(
                        ColumnDef::new(FollowUps::FollowUpType)
                            .string_len(20)
                            .not_null(),
                    )
                    .col(ColumnDef::new(FollowUps::ScheduledDate).date().not_null())
                    .col(ColumnDef::new(FollowUps::ScheduledTime).time().null())
                    .col(ColumnDef::new(FollowUps::AssignedToId).uuid().not_null())
                    .col(
                        ColumnDef::new(FollowUps::Notes)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(FollowUps::Priority)
                            .string_len(10)
                            .not_null()
                            .default("MEDIUM"),
                    )
                    .col(
                        ColumnDef::new(FollowUps::Status)
                            .string_len(20)
                            .not_null()
                            .default("PENDING"),
                    )
                    .col(
                        ColumnDef::new(FollowUps::Result)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(FollowUps::CompletedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(FollowUps::CompletedById).uuid().null())
                    .col(ColumnDef::new(FollowUps::CreatedById).uuid().not_null())
                    .col(
                        ColumnDef::new(FollowUps::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FollowUps::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_follow_ups_interaction")
                            .from(FollowUps::Table, FollowUps::InteractionId)
                            .to(Interactions::Table, Interactions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_follow_ups_customer")
                            .from(FollowUps::Table, FollowUps::CustomerId)
                            .to(Customers::Table, Customers::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_follow_ups_assigned_to")
                            .from(FollowUps::Table, FollowUps::AssignedToId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_follow_ups_completed_by")
                            .from(FollowUps::Table, FollowUps::CompletedById)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_follow_ups_created_by")
                            .from(FollowUps::Table, FollowUps::CreatedById)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_interactions_customer")
                    .table(Interactions::Table)
                    .col(Interactions::CustomerId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_interactions_initiated_by")
                    .table(Interactions::Table)
                    .col(Interactions::InitiatedById)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_follow_ups_assigned_to")
                    .table(FollowUps::Table)
                    .col(FollowUps::AssignedToId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_follow_ups_status_schedule")
                    .table(FollowUps::Table)
                    .col(FollowUps::Status)
                    .col(FollowUps::ScheduledDate)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(FollowUps::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Interactions::Table).if_exists().to_owned())
            .await
    }
}
