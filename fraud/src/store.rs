//! The append-only fraud decision audit table.

use anyhow::Context as _;
use payline_api::models::FraudStatsResponse;
use payline_common::{
    event::FraudCheckRequest, payment::FraudDecision, time::TimestampMs,
};
use sqlx::{PgPool, Row as _};

use crate::rules::Evaluation;

/// Append one decision to the audit log. A payment may accumulate several
/// rows on re-evaluation; only the first was ever acted upon upstream.
pub async fn append_decision(
    db: &PgPool,
    request: &FraudCheckRequest,
    evaluation: &Evaluation,
) -> anyhow::Result<()> {
    sqlx::query(
        "INSERT INTO fraud_decisions \
         (payment_id, customer_id, amount, decision, reason, risk_score, \
          created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(request.payment_id.to_string())
    .bind(request.customer_id.as_str())
    .bind(request.amount.as_decimal())
    .bind(evaluation.decision.as_str())
    .bind(evaluation.reason)
    .bind(i32::from(evaluation.risk_score))
    .bind(TimestampMs::now().as_i64())
    .execute(db)
    .await
    .context("Could not append fraud decision")?;
    Ok(())
}

/// Decision counters for `GET /fraud/stats`, derived from the audit table.
pub async fn stats(db: &PgPool) -> anyhow::Result<FraudStatsResponse> {
    let rows = sqlx::query(
        "SELECT decision, COUNT(*) AS count FROM fraud_decisions \
         GROUP BY decision",
    )
    .fetch_all(db)
    .await
    .context("Could not query fraud decision stats")?;

    let mut stats = FraudStatsResponse::default();
    for row in rows {
        let decision: String = row.try_get("decision")?;
        let count: i64 = row.try_get("count")?;
        let count = u64::try_from(count).unwrap_or(0);
        stats.evaluated += count;
        match decision.parse::<FraudDecision>() {
            Ok(FraudDecision::Approve) => stats.approved += count,
            Ok(FraudDecision::Deny) => stats.denied += count,
            Ok(FraudDecision::ManualReview) => stats.manual_review += count,
            Err(_) => (),
        }
    }
    Ok(stats)
}
