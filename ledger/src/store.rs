//! Store queries for accounts and journal entries.
//!
//! The posting transaction is the heart of the ledger: per entry, lock the
//! account row, check the balance invariant, insert the entry with its
//! post-entry balance, update the account. Any failure aborts the whole
//! group; a unique-key conflict means the group was already posted by an
//! earlier delivery and is reported as [`PostOutcome::AlreadyPosted`].

use anyhow::Context as _;
use payline_common::{
    amount::{Amount, Balance},
    currency::Currency,
    event::PaymentStateChanged,
    ids::{AccountId, PaymentId},
    ledger::{Account, AccountStatus, AccountType, LedgerEntry},
    time::TimestampMs,
};
use payline_infra::store::is_unique_violation;
use sqlx::{postgres::PgRow, PgPool, Postgres, Row as _, Transaction};
use thiserror::Error;
use tracing::debug;

use crate::posting::EntrySpec;

#[derive(Debug, Error)]
pub enum PostError {
    #[error("Posting would take {account_id} below zero")]
    NegativeBalance { account_id: AccountId },
    #[error("Store error: {0}")]
    Store(#[from] sqlx::Error),
    #[error("Bad row data: {0}")]
    Data(#[from] anyhow::Error),
}

#[derive(Debug, Eq, PartialEq)]
#[must_use]
pub enum PostOutcome {
    /// The group was posted by this delivery.
    Posted,
    /// An earlier delivery already posted this group; nothing changed.
    AlreadyPosted,
}

/// Post the balanced entry group for a SUCCEEDED payment, all-or-nothing.
pub async fn post_group(
    db: &PgPool,
    event: &PaymentStateChanged,
    group: &[EntrySpec],
) -> Result<PostOutcome, PostError> {
    let now = TimestampMs::now();
    let mut tx = db.begin().await?;

    for spec in group {
        // Auto-provision on first reference; type from the id prefix.
        ensure_account(&mut tx, &spec.account_id, event.currency).await?;

        // Serial access to the account row for the balance update.
        let row = sqlx::query(
            "SELECT account_type, balance FROM accounts \
             WHERE id = $1 FOR UPDATE",
        )
        .bind(spec.account_id.as_str())
        .fetch_one(&mut *tx)
        .await?;
        let account_type: AccountType = row
            .try_get::<String, _>("account_type")?
            .parse()
            .context("Bad account_type in accounts row")?;
        let balance = Balance::from_decimal(row.try_get("balance")?);

        let new_balance = balance.apply(spec.entry_type, spec.amount);
        if new_balance.is_negative() && account_type.enforces_non_negative() {
            return Err(PostError::NegativeBalance {
                account_id: spec.account_id.clone(),
            });
        }

        let inserted = sqlx::query(
            "INSERT INTO ledger_entries \
             (account_id, payment_id, entry_type, amount, balance, \
              idempotency_key, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(spec.account_id.as_str())
        .bind(event.payment_id.to_string())
        .bind(spec.entry_type.as_str())
        .bind(spec.amount.as_decimal())
        .bind(new_balance.as_decimal())
        .bind(spec.idempotency_key(event.payment_id, event.state))
        .bind(now.as_i64())
        .execute(&mut *tx)
        .await;
        match inserted {
            Ok(_) => (),
            // The group commits atomically, so one duplicate key means the
            // whole group already exists. Roll everything back.
            Err(e) if is_unique_violation(&e) => {
                debug!(
                    "Entry group for {} already posted",
                    event.payment_id
                );
                return Ok(PostOutcome::AlreadyPosted);
            }
            Err(e) => return Err(e.into()),
        }

        sqlx::query(
            "UPDATE accounts SET balance = $1, available_balance = $1 \
             WHERE id = $2",
        )
        .bind(new_balance.as_decimal())
        .bind(spec.account_id.as_str())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(PostOutcome::Posted)
}

async fn ensure_account(
    tx: &mut Transaction<'_, Postgres>,
    account_id: &AccountId,
    currency: Currency,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO accounts \
         (id, account_type, balance, available_balance, hold_balance, \
          currency, status) \
         VALUES ($1, $2, 0, 0, 0, $3, $4) \
         ON CONFLICT (id) DO NOTHING",
    )
    .bind(account_id.as_str())
    .bind(account_id.inferred_type().as_str())
    .bind(currency.as_str())
    .bind(AccountStatus::Active.as_str())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Seed the platform account at bootstrap.
pub async fn bootstrap_platform_account(db: &PgPool) -> anyhow::Result<()> {
    let mut tx = db.begin().await?;
    ensure_account(&mut tx, &AccountId::platform(), Currency::USD).await?;
    tx.commit().await?;
    Ok(())
}

// --- Read queries --- //

fn account_from_row(row: &PgRow) -> anyhow::Result<Account> {
    Ok(Account {
        id: row
            .try_get::<String, _>("id")?
            .parse()
            .context("Bad id in accounts row")?,
        account_type: row
            .try_get::<String, _>("account_type")?
            .parse()
            .context("Bad account_type in accounts row")?,
        balance: Balance::from_decimal(row.try_get("balance")?),
        available_balance: Balance::from_decimal(
            row.try_get("available_balance")?,
        ),
        hold_balance: Balance::from_decimal(row.try_get("hold_balance")?),
        currency: row
            .try_get::<String, _>("currency")?
            .parse()
            .context("Bad currency in accounts row")?,
        status: row
            .try_get::<String, _>("status")?
            .parse()
            .context("Bad status in accounts row")?,
    })
}

fn entry_from_row(row: &PgRow) -> anyhow::Result<LedgerEntry> {
    Ok(LedgerEntry {
        id: row.try_get("id")?,
        account_id: row
            .try_get::<String, _>("account_id")?
            .parse()
            .context("Bad account_id in ledger_entries row")?,
        payment_id: row
            .try_get::<String, _>("payment_id")?
            .parse()
            .context("Bad payment_id in ledger_entries row")?,
        entry_type: row
            .try_get::<String, _>("entry_type")?
            .parse()
            .context("Bad entry_type in ledger_entries row")?,
        amount: Amount::try_from_decimal(row.try_get("amount")?)
            .context("Bad amount in ledger_entries row")?,
        balance: Balance::from_decimal(row.try_get("balance")?),
        idempotency_key: row.try_get("idempotency_key")?,
        created_at: TimestampMs::try_from_i64(row.try_get("created_at")?)
            .context("Bad created_at in ledger_entries row")?,
    })
}

const SELECT_ENTRY: &str = "SELECT id, account_id, payment_id, entry_type, \
     amount, balance, idempotency_key, created_at FROM ledger_entries";

pub async fn fetch_account(
    db: &PgPool,
    account_id: &AccountId,
) -> anyhow::Result<Option<Account>> {
    let row = sqlx::query(
        "SELECT id, account_type, balance, available_balance, hold_balance, \
         currency, status FROM accounts WHERE id = $1",
    )
    .bind(account_id.as_str())
    .fetch_optional(db)
    .await
    .context("Could not query accounts")?;
    row.as_ref().map(account_from_row).transpose()
}

/// The latest 100 entries for an account, newest first.
pub async fn account_entries(
    db: &PgPool,
    account_id: &AccountId,
) -> anyhow::Result<Vec<LedgerEntry>> {
    let query =
        format!("{SELECT_ENTRY} WHERE account_id = $1 ORDER BY id DESC LIMIT 100");
    let rows = sqlx::query(&query)
        .bind(account_id.as_str())
        .fetch_all(db)
        .await
        .context("Could not query ledger_entries by account")?;
    rows.iter().map(entry_from_row).collect()
}

/// All entries for a payment, oldest first.
pub async fn payment_entries(
    db: &PgPool,
    payment_id: PaymentId,
) -> anyhow::Result<Vec<LedgerEntry>> {
    let query =
        format!("{SELECT_ENTRY} WHERE payment_id = $1 ORDER BY id ASC");
    let rows = sqlx::query(&query)
        .bind(payment_id.to_string())
        .fetch_all(db)
        .await
        .context("Could not query ledger_entries by payment")?;
    rows.iter().map(entry_from_row).collect()
}
