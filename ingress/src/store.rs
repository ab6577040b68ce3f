//! Store queries for payment intents.

use anyhow::Context as _;
use payline_common::{
    amount::Amount,
    currency::Currency,
    event::{PaymentCreated, TOPIC_PAYMENT_CREATED},
    ids::{CustomerId, IdempotencyKey, MerchantId, PaymentId},
    payment::{IntentStatus, PaymentIntent},
    time::TimestampMs,
};
use payline_infra::outbox;
use sqlx::{postgres::PgRow, PgPool, Row as _};

fn intent_from_row(row: &PgRow) -> anyhow::Result<PaymentIntent> {
    Ok(PaymentIntent {
        id: row
            .try_get::<String, _>("id")?
            .parse::<PaymentId>()
            .context("Bad id in payment_intents row")?,
        amount: Amount::try_from_decimal(row.try_get("amount")?)
            .context("Bad amount in payment_intents row")?,
        currency: row
            .try_get::<String, _>("currency")?
            .parse::<Currency>()
            .context("Bad currency in payment_intents row")?,
        customer_id: row
            .try_get::<String, _>("customer_id")?
            .parse::<CustomerId>()
            .context("Bad customer_id in payment_intents row")?,
        merchant_id: row
            .try_get::<String, _>("merchant_id")?
            .parse::<MerchantId>()
            .context("Bad merchant_id in payment_intents row")?,
        status: row
            .try_get::<String, _>("status")?
            .parse::<IntentStatus>()
            .context("Bad status in payment_intents row")?,
        idempotency_key: row
            .try_get::<String, _>("idempotency_key")?
            .parse::<IdempotencyKey>()
            .context("Bad idempotency_key in payment_intents row")?,
        created_at: TimestampMs::try_from_i64(row.try_get("created_at")?)
            .context("Bad created_at in payment_intents row")?,
    })
}

const SELECT_INTENT: &str = "SELECT id, amount, currency, customer_id, \
     merchant_id, status, idempotency_key, created_at FROM payment_intents";

/// Insert a new intent together with its `payment.created` outbox row, in
/// one transaction. A unique violation on `idempotency_key` is returned
/// as-is so the caller can serve the winner's row.
pub async fn insert_intent_with_event(
    db: &PgPool,
    intent: &PaymentIntent,
) -> Result<(), sqlx::Error> {
    let mut tx = db.begin().await?;

    sqlx::query(
        "INSERT INTO payment_intents \
         (id, amount, currency, customer_id, merchant_id, status, \
          idempotency_key, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(intent.id.to_string())
    .bind(intent.amount.as_decimal())
    .bind(intent.currency.as_str())
    .bind(intent.customer_id.as_str())
    .bind(intent.merchant_id.as_str())
    .bind(intent.status.as_str())
    .bind(intent.idempotency_key.as_str())
    .bind(intent.created_at.as_i64())
    .execute(&mut *tx)
    .await?;

    let event = PaymentCreated::from(intent);
    let payload = serde_json::to_string(&event)
        .expect("PaymentCreated serialization always succeeds");
    outbox::enqueue(
        &mut tx,
        TOPIC_PAYMENT_CREATED,
        &intent.id.to_string(),
        &payload,
    )
    .await?;

    tx.commit().await
}

pub async fn fetch_by_idempotency_key(
    db: &PgPool,
    key: &IdempotencyKey,
) -> anyhow::Result<Option<PaymentIntent>> {
    let query = format!("{SELECT_INTENT} WHERE idempotency_key = $1");
    let row = sqlx::query(&query)
        .bind(key.as_str())
        .fetch_optional(db)
        .await
        .context("Could not query payment_intents by idempotency_key")?;
    row.as_ref().map(intent_from_row).transpose()
}

pub async fn fetch_by_id(
    db: &PgPool,
    id: PaymentId,
) -> anyhow::Result<Option<PaymentIntent>> {
    let query = format!("{SELECT_INTENT} WHERE id = $1");
    let row = sqlx::query(&query)
        .bind(id.to_string())
        .fetch_optional(db)
        .await
        .context("Could not query payment_intents by id")?;
    row.as_ref().map(intent_from_row).transpose()
}

/// Admin confirm: `NEW -> CONFIRMED`. Returns the updated intent, or
/// [`None`] if no such payment exists.
pub async fn confirm(
    db: &PgPool,
    id: PaymentId,
) -> anyhow::Result<Option<PaymentIntent>> {
    let query = "UPDATE payment_intents SET status = $1 WHERE id = $2 \
         RETURNING id, amount, currency, customer_id, merchant_id, status, \
         idempotency_key, created_at";
    let row = sqlx::query(query)
        .bind(IntentStatus::Confirmed.as_str())
        .bind(id.to_string())
        .fetch_optional(db)
        .await
        .context("Could not confirm payment intent")?;
    row.as_ref().map(intent_from_row).transpose()
}
