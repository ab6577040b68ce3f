//! Store queries for payment state rows.
//!
//! Every transition is a guarded `UPDATE ... WHERE state = from` — a
//! compare-and-swap. A zero-row update means the transition was already
//! taken (duplicate delivery) or is illegal from the current state; both are
//! reported as [`CasOutcome::Stale`] and are not errors. Each applied CAS
//! writes its `payment.state.changed` outbox row in the same transaction.

use std::time::Duration;

use anyhow::Context as _;
use payline_common::{
    amount::Amount,
    currency::Currency,
    event::{PaymentCreated, PaymentStateChanged, TOPIC_PAYMENT_STATE_CHANGED},
    ids::{CustomerId, MerchantId, PaymentId},
    payment::{FraudVerdict, PaymentState},
    time::TimestampMs,
};
use payline_infra::outbox;
use sqlx::{postgres::PgRow, PgPool, Row as _};

/// The result of a compare-and-swap transition attempt.
#[derive(Debug, Eq, PartialEq)]
#[must_use]
pub enum CasOutcome {
    /// The transition was applied and its event enqueued.
    Applied,
    /// The row was not in the expected `from` state; nothing changed.
    Stale,
}

/// A payment's state row.
#[derive(Clone, Debug)]
pub struct StateRow {
    pub payment_id: PaymentId,
    pub state: PaymentState,
    pub previous_state: Option<PaymentState>,
    pub fraud_decision: Option<FraudVerdict>,
    pub amount: Amount,
    pub currency: Currency,
    pub customer_id: CustomerId,
    pub merchant_id: MerchantId,
    pub created_at: TimestampMs,
    pub updated_at: TimestampMs,
}

fn state_row_from_row(row: &PgRow) -> anyhow::Result<StateRow> {
    Ok(StateRow {
        payment_id: row
            .try_get::<String, _>("payment_id")?
            .parse()
            .context("Bad payment_id in payment_states row")?,
        state: row
            .try_get::<String, _>("state")?
            .parse()
            .context("Bad state in payment_states row")?,
        previous_state: row
            .try_get::<Option<String>, _>("previous_state")?
            .map(|s| s.parse())
            .transpose()
            .context("Bad previous_state in payment_states row")?,
        fraud_decision: row
            .try_get::<Option<String>, _>("fraud_decision")?
            .map(|s| s.parse())
            .transpose()
            .context("Bad fraud_decision in payment_states row")?,
        amount: Amount::try_from_decimal(row.try_get("amount")?)
            .context("Bad amount in payment_states row")?,
        currency: row
            .try_get::<String, _>("currency")?
            .parse()
            .context("Bad currency in payment_states row")?,
        customer_id: row
            .try_get::<String, _>("customer_id")?
            .parse()
            .context("Bad customer_id in payment_states row")?,
        merchant_id: row
            .try_get::<String, _>("merchant_id")?
            .parse()
            .context("Bad merchant_id in payment_states row")?,
        created_at: TimestampMs::try_from_i64(row.try_get("created_at")?)
            .context("Bad created_at in payment_states row")?,
        updated_at: TimestampMs::try_from_i64(row.try_get("updated_at")?)
            .context("Bad updated_at in payment_states row")?,
    })
}

/// Idempotently create the NEW state row for a consumed `payment.created`.
/// Returns whether a row was actually inserted.
pub async fn insert_new(
    db: &PgPool,
    event: &PaymentCreated,
) -> anyhow::Result<bool> {
    let now = TimestampMs::now();
    let result = sqlx::query(
        "INSERT INTO payment_states \
         (payment_id, state, amount, currency, customer_id, merchant_id, \
          created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $7) \
         ON CONFLICT (payment_id) DO NOTHING",
    )
    .bind(event.payment_id.to_string())
    .bind(PaymentState::New.as_str())
    .bind(event.amount.as_decimal())
    .bind(event.currency.as_str())
    .bind(event.customer_id.as_str())
    .bind(event.merchant_id.as_str())
    .bind(now.as_i64())
    .execute(db)
    .await
    .context("Could not insert payment state row")?;
    Ok(result.rows_affected() == 1)
}

/// Attempt the `from -> to` transition as a CAS, recording `verdict` on the
/// row if one is provided (an already-recorded verdict is never
/// overwritten). On success, the `payment.state.changed` event is enqueued
/// on the outbox in the same transaction.
pub async fn cas_transition(
    db: &PgPool,
    payment_id: PaymentId,
    from: PaymentState,
    to: PaymentState,
    verdict: Option<FraudVerdict>,
) -> anyhow::Result<CasOutcome> {
    debug_assert!(from.can_transition_to(to), "illegal transition requested");

    let now = TimestampMs::now();
    let mut tx = db.begin().await.context("Could not begin transaction")?;

    let row = sqlx::query(
        "UPDATE payment_states SET state = $1, previous_state = $2, \
         fraud_decision = COALESCE($3, fraud_decision), updated_at = $4 \
         WHERE payment_id = $5 AND state = $2 \
         RETURNING amount, currency, customer_id, merchant_id",
    )
    .bind(to.as_str())
    .bind(from.as_str())
    .bind(verdict.map(|v| v.as_str()))
    .bind(now.as_i64())
    .bind(payment_id.to_string())
    .fetch_optional(&mut *tx)
    .await
    .context("CAS update failed")?;

    let Some(row) = row else {
        // Rolls back the (empty) transaction on drop.
        return Ok(CasOutcome::Stale);
    };

    let event = PaymentStateChanged {
        payment_id,
        state: to,
        previous_state: from,
        timestamp: now,
        amount: Amount::try_from_decimal(row.try_get("amount")?)
            .context("Bad amount in payment_states row")?,
        currency: row
            .try_get::<String, _>("currency")?
            .parse()
            .context("Bad currency in payment_states row")?,
        customer_id: row
            .try_get::<String, _>("customer_id")?
            .parse()
            .context("Bad customer_id in payment_states row")?,
        merchant_id: row
            .try_get::<String, _>("merchant_id")?
            .parse()
            .context("Bad merchant_id in payment_states row")?,
    };
    enqueue_state_changed(&mut tx, &event).await?;

    tx.commit().await.context("Could not commit CAS transition")?;
    metrics::counter!("state_transitions_total", "to" => to.as_str())
        .increment(1);
    Ok(CasOutcome::Applied)
}

async fn enqueue_state_changed(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    event: &PaymentStateChanged,
) -> anyhow::Result<()> {
    let payload = serde_json::to_string(event)
        .expect("PaymentStateChanged serialization always succeeds");
    outbox::enqueue(
        tx,
        TOPIC_PAYMENT_STATE_CHANGED,
        &event.payment_id.to_string(),
        &payload,
    )
    .await
    .context("Could not enqueue state.changed event")
}

pub async fn fetch_state(
    db: &PgPool,
    payment_id: PaymentId,
) -> anyhow::Result<Option<StateRow>> {
    let row = sqlx::query(
        "SELECT payment_id, state, previous_state, fraud_decision, amount, \
         currency, customer_id, merchant_id, created_at, updated_at \
         FROM payment_states WHERE payment_id = $1",
    )
    .bind(payment_id.to_string())
    .fetch_optional(db)
    .await
    .context("Could not query payment_states")?;
    row.as_ref().map(state_row_from_row).transpose()
}

/// Demote rows stuck in AUTH_PENDING for longer than `stuck_threshold` to
/// FAILED, recording a `timeout` verdict where none exists, and enqueue the
/// corresponding events. The only background state mutation in the system.
/// Returns the number of rows swept.
pub async fn sweep_stuck(
    db: &PgPool,
    stuck_threshold: Duration,
) -> anyhow::Result<usize> {
    let now = TimestampMs::now();
    let cutoff = now.saturating_sub(stuck_threshold);
    let mut tx = db.begin().await.context("Could not begin transaction")?;

    let rows = sqlx::query(
        "UPDATE payment_states SET previous_state = state, state = $1, \
         fraud_decision = COALESCE(fraud_decision, $2), updated_at = $3 \
         WHERE state = $4 AND updated_at < $5 \
         RETURNING payment_id, amount, currency, customer_id, merchant_id",
    )
    .bind(PaymentState::Failed.as_str())
    .bind(FraudVerdict::Timeout.as_str())
    .bind(now.as_i64())
    .bind(PaymentState::AuthPending.as_str())
    .bind(cutoff.as_i64())
    .fetch_all(&mut *tx)
    .await
    .context("Sweep update failed")?;

    for row in &rows {
        let event = PaymentStateChanged {
            payment_id: row
                .try_get::<String, _>("payment_id")?
                .parse()
                .context("Bad payment_id in payment_states row")?,
            state: PaymentState::Failed,
            previous_state: PaymentState::AuthPending,
            timestamp: now,
            amount: Amount::try_from_decimal(row.try_get("amount")?)
                .context("Bad amount in payment_states row")?,
            currency: row
                .try_get::<String, _>("currency")?
                .parse()
                .context("Bad currency in payment_states row")?,
            customer_id: row
                .try_get::<String, _>("customer_id")?
                .parse()
                .context("Bad customer_id in payment_states row")?,
            merchant_id: row
                .try_get::<String, _>("merchant_id")?
                .parse()
                .context("Bad merchant_id in payment_states row")?,
        };
        enqueue_state_changed(&mut tx, &event).await?;
    }

    tx.commit().await.context("Could not commit sweep")?;
    Ok(rows.len())
}
