//! The per-payment driving logic.

use anyhow::anyhow;
use payline_common::{
    event::{
        FraudCheckReply, FraudCheckRequest, PaymentCreated,
        SUBJECT_FRAUD_CHECK,
    },
    payment::{FraudVerdict, PaymentState},
};
use payline_infra::{
    bus::{Bus, BusError},
    kv::Kv,
    log::ConsumeError,
};
use payline_tokio::notify;
use sqlx::PgPool;
use tracing::{debug, info, warn};

use crate::{
    config::{FRAUD_TIMEOUT, PAYMENT_LOCK_TTL},
    payment_lock_key,
    store::{self, CasOutcome},
};

/// Drives payments through the lifecycle in response to `payment.created`.
#[derive(Clone)]
pub struct Engine {
    db: PgPool,
    kv: Kv,
    bus: Bus,
    outbox_wake: notify::Sender,
}

impl Engine {
    pub fn new(
        db: PgPool,
        kv: Kv,
        bus: Bus,
        outbox_wake: notify::Sender,
    ) -> Self {
        Self {
            db,
            kv,
            bus,
            outbox_wake,
        }
    }

    /// Handle one `payment.created` delivery.
    ///
    /// Returns [`ConsumeError::Retry`] when the delivery must be redelivered
    /// (lock busy, Store unavailable); everything else is acked.
    pub async fn handle_payment_created(
        &self,
        event: &PaymentCreated,
    ) -> Result<(), ConsumeError> {
        let lock_key = payment_lock_key(event.payment_id);

        // Per-payment exclusivity. The lock collapses duplicate work within
        // its TTL; correctness does not depend on it (the CAS does that), so
        // a KV outage degrades to lock-free driving rather than an outage.
        let locked = match self
            .kv
            .set_nx_ex(&lock_key, "1", PAYMENT_LOCK_TTL)
            .await
        {
            Ok(true) => true,
            Ok(false) => {
                // Another delivery of this payment is in flight; defer.
                return Err(ConsumeError::retry(anyhow!(
                    "Payment {} is locked; deferring delivery",
                    event.payment_id
                )));
            }
            Err(e) => {
                warn!("KV lock unavailable, driving unlocked: {e:#}");
                false
            }
        };

        let result = self.drive(event).await;

        if locked {
            if let Err(e) = self.kv.del(&lock_key).await {
                // The TTL will release it.
                warn!("Could not release {lock_key}: {e:#}");
            }
        }

        result
    }

    async fn drive(&self, event: &PaymentCreated) -> Result<(), ConsumeError> {
        let payment_id = event.payment_id;

        store::insert_new(&self.db, event)
            .await
            .map_err(ConsumeError::retry)?;

        // NEW -> AUTH_PENDING
        let outcome = store::cas_transition(
            &self.db,
            payment_id,
            PaymentState::New,
            PaymentState::AuthPending,
            None,
        )
        .await
        .map_err(ConsumeError::retry)?;

        match outcome {
            CasOutcome::Applied => self.outbox_wake.send(),
            CasOutcome::Stale => {
                // Duplicate delivery: the payment is already past NEW. If a
                // prior incarnation crashed mid-approval we can finish its
                // walk; anything else is left to the CAS guards / sweeper.
                debug!("Duplicate payment.created for {payment_id}");
                return self.resume(event).await;
            }
        }

        // Synchronous fraud consultation with a hard deadline. Timeouts and
        // Bus failures deterministically fail the payment.
        let request = FraudCheckRequest {
            payment_id,
            amount: event.amount,
            customer_id: event.customer_id.clone(),
        };
        let verdict = match self
            .bus
            .request_json::<_, FraudCheckReply>(
                SUBJECT_FRAUD_CHECK,
                &request,
                FRAUD_TIMEOUT,
            )
            .await
        {
            Ok(reply) => {
                debug!(
                    "Fraud reply for {payment_id}: {} ({})",
                    reply.decision, reply.reason
                );
                FraudVerdict::from(reply.decision)
            }
            Err(BusError::Timeout) => {
                warn!("Fraud check timed out for {payment_id}");
                FraudVerdict::Timeout
            }
            Err(e) => {
                warn!("Fraud check failed for {payment_id}: {e:#}");
                FraudVerdict::Timeout
            }
        };
        metrics::counter!("fraud_verdicts_total", "verdict" => verdict.as_str())
            .increment(1);

        match verdict {
            FraudVerdict::Approve => {
                self.walk_approval_path(
                    event,
                    PaymentState::AuthPending,
                    Some(verdict),
                )
                .await
            }
            FraudVerdict::Deny
            | FraudVerdict::ManualReview
            | FraudVerdict::Timeout => {
                let outcome = store::cas_transition(
                    &self.db,
                    payment_id,
                    PaymentState::AuthPending,
                    PaymentState::Failed,
                    Some(verdict),
                )
                .await
                .map_err(ConsumeError::retry)?;
                match outcome {
                    CasOutcome::Applied => {
                        self.outbox_wake.send();
                        info!("Payment {payment_id} FAILED ({verdict})");
                    }
                    CasOutcome::Stale =>
                        debug!("Stale FAILED transition for {payment_id}"),
                }
                Ok(())
            }
        }
    }

    /// Advance `AUTH_PENDING -> AUTHORIZED -> CAPTURED -> SUCCEEDED`
    /// starting from `from`. The fraud verdict is recorded on the first hop.
    async fn walk_approval_path(
        &self,
        event: &PaymentCreated,
        from: PaymentState,
        mut verdict: Option<FraudVerdict>,
    ) -> Result<(), ConsumeError> {
        let payment_id = event.payment_id;
        let mut current = from;

        for next in PaymentState::APPROVAL_PATH {
            if !current.can_transition_to(next) {
                continue;
            }
            let outcome = store::cas_transition(
                &self.db,
                payment_id,
                current,
                next,
                verdict.take(),
            )
            .await
            .map_err(ConsumeError::retry)?;
            match outcome {
                CasOutcome::Applied => {
                    self.outbox_wake.send();
                    current = next;
                }
                CasOutcome::Stale => {
                    // Someone else advanced (or failed) this payment; the
                    // CAS guards make that safe to walk away from.
                    debug!(
                        "Stale {current} -> {next} transition for {payment_id}"
                    );
                    return Ok(());
                }
            }
        }

        if current == PaymentState::Succeeded {
            info!("Payment {payment_id} SUCCEEDED");
        }
        Ok(())
    }

    /// Redelivery of a payment that is already past NEW. If a prior
    /// incarnation recorded an `approve` verdict but crashed mid-walk,
    /// finish the walk; otherwise there is nothing to do here (a row stuck
    /// in AUTH_PENDING is the sweeper's job).
    async fn resume(&self, event: &PaymentCreated) -> Result<(), ConsumeError> {
        let row = store::fetch_state(&self.db, event.payment_id)
            .await
            .map_err(ConsumeError::retry)?;
        let Some(row) = row else {
            return Err(ConsumeError::discard(anyhow!(
                "Payment {} is past NEW but has no state row",
                event.payment_id
            )));
        };

        if row.state.is_terminal() || row.state == PaymentState::AuthPending {
            return Ok(());
        }
        if row.fraud_decision == Some(FraudVerdict::Approve) {
            info!(
                "Resuming approval walk for {} from {}",
                event.payment_id, row.state
            );
            return self.walk_approval_path(event, row.state, None).await;
        }
        Ok(())
    }
}
