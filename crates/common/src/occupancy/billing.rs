//! Billing artifacts of lease activation
//!
//! First-invoice creation (idempotent per tenant/unit/month), atomic invoice
//! numbering, and the security-deposit ledger entry. All functions take a
//! `ConnectionTrait` so they run inside the caller's transaction.

use crate::config::BillingConfig;
use crate::db::models::*;
use crate::errors::{AppError, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbBackend, EntityTrait, QueryFilter,
    QueryOrder, Set, Statement,
};
use uuid::Uuid;

/// Counter row backing the invoice number sequence
pub const INVOICE_COUNTER: &str = "invoice_no";

/// Human-readable month label an invoice covers, e.g. "August 2026"
pub fn month_label(date: NaiveDate) -> String {
    date.format("%B %Y").to_string()
}

/// Format an invoice number from a sequence value
pub fn format_invoice_no(prefix: &str, seq: i64, width: usize) -> String {
    format!("{}{:0width$}", prefix, seq, width = width)
}

/// Allocate the next invoice sequence value atomically.
///
/// A dedicated counter row is bumped with a single upsert-returning
/// statement, so concurrent activations cannot observe the same value the
/// way a `count()+1` scheme would.
pub async fn next_invoice_no<C: ConnectionTrait>(
    conn: &C,
    billing: &BillingConfig,
) -> Result<String> {
    let stmt = Statement::from_sql_and_values(
        DbBackend::Postgres,
        r#"
        INSERT INTO counters (name, value)
        VALUES ($1, 1)
        ON CONFLICT (name) DO UPDATE SET value = counters.value + 1
        RETURNING value
        "#,
        vec![INVOICE_COUNTER.into()],
    );

    let row = conn
        .query_one(stmt)
        .await?
        .ok_or_else(|| AppError::Internal {
            message: "invoice counter returned no row".to_string(),
        })?;

    let seq: i64 = row.try_get_by_index(0).map_err(|e| AppError::Internal {
        message: format!("invoice counter value unreadable: {}", e),
    })?;

    Ok(format_invoice_no(
        &billing.invoice_prefix,
        seq,
        billing.invoice_seq_width,
    ))
}

/// Create the first invoice for a lease's start month if none exists yet for
/// (tenant, unit, month). Returns the existing invoice when one does; a
/// unique index on the triple backstops this check under concurrency.
pub async fn ensure_first_invoice<C: ConnectionTrait>(
    conn: &C,
    lease: &Lease,
    start: NaiveDate,
    billing: &BillingConfig,
) -> Result<Invoice> {
    let month = month_label(start);

    if let Some(existing) = InvoiceEntity::find()
        .filter(InvoiceColumn::TenantId.eq(lease.tenant_id))
        .filter(InvoiceColumn::UnitId.eq(lease.unit_id))
        .filter(InvoiceColumn::Month.eq(month.clone()))
        .one(conn)
        .await?
    {
        return Ok(existing);
    }

    let invoice_no = next_invoice_no(conn, billing).await?;
    let now = chrono::Utc::now();

    let invoice = InvoiceActiveModel {
        id: Set(Uuid::new_v4()),
        invoice_no: Set(invoice_no),
        tenant_id: Set(lease.tenant_id),
        unit_id: Set(lease.unit_id),
        lease_id: Set(lease.id),
        month: Set(month),
        rent: Set(lease.monthly_rent),
        fees: Set(Decimal::ZERO),
        amount: Set(lease.monthly_rent),
        paid_amount: Set(Decimal::ZERO),
        balance_due: Set(lease.monthly_rent),
        status: Set(String::from(InvoiceStatus::Sent)),
        due_date: Set(start),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    };

    let created = invoice.insert(conn).await?;
    crate::metrics::record_invoice_issued();

    tracing::info!(
        invoice_no = %created.invoice_no,
        lease_id = %lease.id,
        month = %created.month,
        "First invoice created"
    );

    Ok(created)
}

/// Back-fill unpaid zero-amount invoices of a lease after a rent correction.
/// Returns the number of invoices updated.
pub async fn backfill_zero_amount_invoices<C: ConnectionTrait>(
    conn: &C,
    lease_id: Uuid,
    monthly_rent: Decimal,
) -> Result<u64> {
    let stale = InvoiceEntity::find()
        .filter(InvoiceColumn::LeaseId.eq(lease_id))
        .filter(InvoiceColumn::Amount.eq(Decimal::ZERO))
        .filter(InvoiceColumn::Status.eq(String::from(InvoiceStatus::Sent)))
        .all(conn)
        .await?;

    let count = stale.len() as u64;
    let now = chrono::Utc::now();

    for invoice in stale {
        let mut model: InvoiceActiveModel = invoice.into();
        model.rent = Set(monthly_rent);
        model.amount = Set(monthly_rent);
        model.balance_due = Set(monthly_rent);
        model.updated_at = Set(now.into());
        model.update(conn).await?;
    }

    Ok(count)
}

/// Append a Liability ledger entry for a collected security deposit.
/// Running balance = previous entry's balance + deposit.
pub async fn append_deposit_liability<C: ConnectionTrait>(
    conn: &C,
    tenant_id: Uuid,
    lease_id: Uuid,
    deposit: Decimal,
) -> Result<LedgerEntry> {
    let previous_balance = LedgerEntryEntity::find()
        .filter(LedgerEntryColumn::TenantId.eq(tenant_id))
        .order_by_desc(LedgerEntryColumn::CreatedAt)
        .one(conn)
        .await?
        .map(|e| e.balance)
        .unwrap_or(Decimal::ZERO);

    let entry = LedgerEntryActiveModel {
        id: Set(Uuid::new_v4()),
        tenant_id: Set(tenant_id),
        lease_id: Set(Some(lease_id)),
        kind: Set(String::from(EntryKind::Liability)),
        memo: Set("Security deposit".to_string()),
        amount: Set(deposit),
        balance: Set(previous_balance + deposit),
        created_at: Set(chrono::Utc::now().into()),
    };

    entry.insert(conn).await.map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_label() {
        let d = NaiveDate::from_ymd_opt(2026, 8, 25).unwrap();
        assert_eq!(month_label(d), "August 2026");

        let jan = NaiveDate::from_ymd_opt(2027, 1, 1).unwrap();
        assert_eq!(month_label(jan), "January 2027");
    }

    #[test]
    fn test_invoice_number_format() {
        assert_eq!(format_invoice_no("INV-LEASE-", 42, 5), "INV-LEASE-00042");
        assert_eq!(format_invoice_no("INV-LEASE-", 123456, 5), "INV-LEASE-123456");
    }

    #[test]
    fn test_same_month_same_label() {
        // Idempotence hinges on the label, not the day of month
        let a = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
        let b = NaiveDate::from_ymd_opt(2026, 8, 31).unwrap();
        assert_eq!(month_label(a), month_label(b));
    }
}
