//! The `fraud.check` Bus responder loop.

use payline_common::event::{FraudCheckReply, FraudCheckRequest};
use payline_infra::{
    bus::{BusMessage, BusSubscription},
    kv::Kv,
};
use payline_tokio::{notify_once::NotifyOnce, task::Task};
use sqlx::PgPool;
use tracing::{debug, warn};

use crate::{rules, store, velocity};

pub fn spawn_responder(
    subscription: BusSubscription,
    db: PgPool,
    kv: Kv,
    mut shutdown: NotifyOnce,
) -> Task<()> {
    Task::spawn("fraud.check responder", async move {
        loop {
            tokio::select! {
                biased;
                () = shutdown.recv() => break,
                maybe_message = subscription.next() => match maybe_message {
                    Some(message) => handle(message, &db, &kv).await,
                    None => {
                        warn!("Bus subscription closed");
                        break;
                    }
                },
            }
        }
    })
}

async fn handle(message: BusMessage, db: &PgPool, kv: &Kv) {
    let request = match message.decode::<FraudCheckRequest>() {
        Ok(request) => request,
        Err(e) => {
            // Nothing to reply to; the requester's deadline handles it.
            warn!("Malformed fraud.check request: {e:#}");
            return;
        }
    };

    // The hard ceiling short-circuits before the velocity increment: a
    // payment rejected by rule 1 never counts against the window.
    let velocity = if request.amount.cents() > rules::HARD_CEILING_CENTS {
        None
    } else {
        velocity::record(kv, &request.customer_id).await
    };

    let evaluation = rules::evaluate(request.amount, velocity);
    debug!(
        "fraud.check {}: {} ({})",
        request.payment_id, evaluation.decision, evaluation.reason
    );
    metrics::counter!(
        "fraud_decisions_total",
        "decision" => evaluation.decision.as_str()
    )
    .increment(1);

    // Reply first; the audit append must never delay or block the reply.
    let reply = FraudCheckReply {
        decision: evaluation.decision,
        reason: evaluation.reason.to_owned(),
    };
    if let Err(e) = message.respond_json(&reply).await {
        warn!("Could not reply to fraud.check: {e:#}");
    }

    if let Err(e) = store::append_decision(db, &request, &evaluation).await {
        warn!(
            "Audit append failed for {} (decision already sent): {e:#}",
            request.payment_id
        );
    }
}
