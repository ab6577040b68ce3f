//! The per-customer velocity counter, kept in KV.

use std::time::Duration;

use payline_common::ids::CustomerId;
use payline_infra::kv::Kv;
use tracing::warn;

/// The sliding window over which payment bursts are counted.
pub const VELOCITY_WINDOW: Duration = Duration::from_secs(60 * 60);

pub fn velocity_key(customer_id: &CustomerId) -> String {
    format!("fraud:velocity:{customer_id}")
}

/// Count this payment against the customer's window and return the new
/// count. A KV outage degrades to [`None`]: the velocity rule is skipped
/// rather than blocking the decision, a deliberate availability choice.
pub async fn record(kv: &Kv, customer_id: &CustomerId) -> Option<u64> {
    match kv.incr_window(&velocity_key(customer_id), VELOCITY_WINDOW).await {
        Ok(count) => Some(count),
        Err(e) => {
            warn!("Velocity counter unavailable for {customer_id}: {e:#}");
            None
        }
    }
}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn key_format() {
        let customer = CustomerId::from_str("C2").unwrap();
        assert_eq!(velocity_key(&customer), "fraud:velocity:C2");
    }
}
