use sea_orm_migration::prelude::*;

use crate::m20251001_000001_staff::Users;

#[derive(DeriveIden)]
pub(crate) enum Customers {
    Table,
    Id,
    FirstName,
    LastName,
    Gender,
    DateOfBirth,
    NationalId,
    PrimaryPhone,
    SecondaryPhone,
    Email,
    Address,
    City,
    State,
    PostalCode,
    Country,
    Employer,
    JobTitle,
    MonthlyIncomeCents,
    AssignedOfficerId,
    IsActive,
    Notes,
    RiskScore,
    CreatedById,
    UpdatedById,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub(crate) enum Loans {
    Table,
    Id,
    CustomerId,
    LoanReference,
    Status,
    PrincipalCents,
    InterestRateBps,
    ApplicationDate,
    ApprovalDate,
    DisbursementDate,
    FirstPaymentDate,
    MaturityDate,
    TermMonths,
    PaymentFrequency,
    AmountPaidCents,
    LastPaymentDate,
    DaysPastDue,
    AssignedOfficerId,
    Notes,
    CreatedById,
    UpdatedById,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Payments {
    Table,
    Id,
    LoanId,
    PaymentReference,
    AmountCents,
    PaymentDate,
    PaymentMethod,
    ReceivedById,
    Notes,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

fn text(col: impl IntoIden) -> ColumnDef {
    ColumnDef::new(col).text().not_null().default("").to_owned()
}

fn short(col: impl IntoIden, len: u32) -> ColumnDef {
    ColumnDef::new(col).string_len(len).not_null().default("").to_owned()
}

fn timestamps(table: &mut TableCreateStatement, created: impl IntoIden, updated: impl IntoIden) {
    table
        .col(
            ColumnDef::new(created)
                .timestamp_with_time_zone()
                .not_null(),
        )
        .col(
            ColumnDef::new(updated)
                .timestamp_with_time_zone()
                .not_null(),
        );
}

fn set_null_fk(
    name: &str,
    table: impl IntoIden + 'static,
    column: impl IntoIden + 'static,
) -> ForeignKeyCreateStatement {
    ForeignKey::create()
        .name(name)
        .from(table, column)
        .to(Users::Table, Users::Id)
        .on_delete(ForeignKeyAction::SetNull)
        .to_owned()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let mut customers = Table::create();
        customers
            .table(Customers::Table)
            .if_not_exists()
            .col(ColumnDef::new(Customers::Id).uuid().not_null().primary_key())
            .col(&mut short(Customers::FirstName, 50))
            .col(&mut short(Customers::LastName, 50))
            .col(
                ColumnDef::new(Customers::Gender)
                    .string_len(10)
                    .not_null()
                    .default("MALE"),
            )
            .col(ColumnDef::new(Customers::DateOfBirth).date().null())
            .col(
                ColumnDef::new(Customers::NationalId)
                    .string_len(20)
                    .null()
                    .unique_key(),
            )
            .col(&mut short(Customers::PrimaryPhone, 15))
            .col(&mut short(Customers::SecondaryPhone, 15))
            .col(&mut short(Customers::Email, 254))
            .col(&mut short(Customers::Address, 255))
            .col(&mut short(Customers::City, 100))
            .col(&mut short(Customers::State, 100))
            .col(&mut short(Customers::PostalCode, 20))
            .col(&mut short(Customers::Country, 100))
            .col(&mut short(Customers::Employer, 255))
            .col(&mut short(Customers::JobTitle, 100))
            .col(ColumnDef::new(Customers::MonthlyIncomeCents).big_integer().null())
            .col(ColumnDef::new(Customers::AssignedOfficerId).uuid().null())
            .col(
                ColumnDef::new(Customers::IsActive)
                    .boolean()
                    .not_null()
                    .default(true),
            )
            .col(&mut text(Customers::Notes))
            .col(ColumnDef::new(Customers::RiskScore).integer().null())
            .col(ColumnDef::new(Customers::CreatedById).uuid().null())
            .col(ColumnDef::new(Customers::UpdatedById).uuid().null())
            .foreign_key(&mut set_null_fk(
                "fk_customers_assigned_officer",
                Customers::Table,
                Customers::AssignedOfficerId,
            ))
            .foreign_key(&mut set_null_fk(
                "fk_customers_created_by",
                Customers::Table,
                Customers::CreatedById,
            ))
            .foreign_key(&mut set_null_fk(
                "fk_customers_updated_by",
                Customers::Table,
                Customers::UpdatedById,
            ));
        timestamps(&mut customers, Customers::CreatedAt, Customers::UpdatedAt);
        manager.create_table(customers).await?;

        let mut loans = Table::create();
        loans
            .table(Loans::Table)
            .if_not_exists()
            .col(ColumnDef::new(Loans::Id).uuid().not_null().primary_key())
            .col(ColumnDef::new(Loans::CustomerId).uuid().not_null())
            .col(
                ColumnDef::new(Loans::LoanReference)
                    .string_len(20)
                    .not_null()
                    .unique_key(),
            )
            .col(
                ColumnDef::new(Loans::Status)
                    .string_len(20)
                    .not_null()
                    .default("PENDING"),
            )
            .col(ColumnDef::new(Loans::PrincipalCents).big_integer().not_null())
            .col(ColumnDef::new(Loans::InterestRateBps).integer().not_null())
            .col(ColumnDef::new(Loans::ApplicationDate).date().not_null())
            .col(ColumnDef::new(Loans::ApprovalDate).date().null())
            .col(ColumnDef::new(Loans::DisbursementDate).date().null())
            .col(ColumnDef::new(Loans::FirstPaymentDate).date().null())
            .col(ColumnDef::new(Loans::MaturityDate).date().null())
            .col(ColumnDef::new(Loans::TermMonths).integer().not_null())
            .col(
                ColumnDef::new(Loans::PaymentFrequency)
                    .string_len(20)
                    .not_null()
                    .default("MONTHLY"),
            )
            .col(
                ColumnDef::new(Loans::AmountPaidCents)
                    .big_integer()
                    .not_null()
                    .default(0),
            )
            .col(ColumnDef::new(Loans::LastPaymentDate).date().null())
            .col(
                ColumnDef::new(Loans::DaysPastDue)
                    .integer()
                    .not_null()
                    .default(0),
            )
            .col(ColumnDef::new(Loans::AssignedOfficerId).uuid().null())
            .col(&mut text(Loans::Notes))
            .col(ColumnDef::new(Loans::CreatedById).uuid().null())
            .col(ColumnDef::new(Loans::UpdatedById).uuid().null())
            .foreign_key(
                ForeignKey::create()
                    .name("fk_loans_customer")
                    .from(Loans::Table, Loans::CustomerId)
                    .to(Customers::Table, Customers::Id)
                    .on_delete(ForeignKeyAction::Cascade),
            )
            .foreign_key(&mut set_null_fk(
                "fk_loans_assigned_officer",
                Loans::Table,
                Loans::AssignedOfficerId,
            ))
            .foreign_key(&mut set_null_fk(
                "fk_loans_created_by",
                Loans::Table,
                Loans::CreatedById,
            ))
            .foreign_key(&mut set_null_fk(
                "fk_loans_updated_by",
                Loans::Table,
                Loans::UpdatedById,
            ));
        timestamps(&mut loans, Loans::CreatedAt, Loans::UpdatedAt);
        manager.create_table(loans).await?;

        let mut payments = Table::create();
        payments
            .table(Payments::Table)
            .if_not_exists()
            .col(ColumnDef::new(Payments::Id).uuid().not_null().primary_key())
            .col(ColumnDef::new(Payments::LoanId).uuid().not_null())
            .col(
                ColumnDef::new(Payments::PaymentReference)
                    .string_len(30)
                    .not_null()
                    .unique_key(),
            )
            .col(ColumnDef::new(Payments::AmountCents).big_integer().not_null())
            .col(ColumnDef::new(Payments::PaymentDate).date().not_null())
            .col(
                ColumnDef::new(Payments::PaymentMethod)
                    .string_len(20)
                    .not_null()
                    .default("CASH"),
            )
            .col(ColumnDef::new(Payments::ReceivedById).uuid().null())
            .col(&mut text(Payments::Notes))
            .foreign_key(
                ForeignKey::create()
                    .name("fk_payments_loan")
                    .from(Payments::Table, Payments::LoanId)
                    .to(Loans::Table, Loans::Id)
                    .on_delete(ForeignKeyAction::Cascade),
            )
            .foreign_key(&mut set_null_fk(
                "fk_payments_received_by",
                Payments::Table,
                Payments::ReceivedById,
            ));
        timestamps(&mut payments, Payments::CreatedAt, Payments::UpdatedAt);
        manager.create_table(payments).await?;

        for (name, table, column) in [
            (
                "idx_customers_assigned_officer",
                Customers::Table.into_iden(),
                Customers::AssignedOfficerId.into_iden(),
            ),
            (
                "idx_customers_primary_phone",
                Customers::Table.into_iden(),
                Customers::PrimaryPhone.into_iden(),
            ),
            ("idx_loans_customer", Loans::Table.into_iden(), Loans::CustomerId.into_iden()),
            ("idx_loans_status", Loans::Table.into_iden(), Loans::Status.into_iden()),
            (
                "idx_loans_assigned_officer",
                Loans::Table.into_iden(),
                Loans::AssignedOfficerId.into_iden(),
            ),
            ("idx_payments_loan", Payments::Table.into_iden(), Payments::LoanId.into_iden()),
            (
                "idx_payments_payment_date",
                Payments::Table.into_iden(),
                Payments::PaymentDate.into_iden(),
            ),
        ] {
            manager
                .create_index(
                    Index::create()
                        .name(name)
                        .table(table)
                        .col(column)
                        .if_not_exists()
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Payments::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Loans::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Customers::Table).if_exists().to_owned())
            .await
    }
}
