use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Subscriptions answered over plain HTTP with `multipart/mixed`.
#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone)]
#[serde(deny_unknown_fields)]
pub struct SubscriptionsConfig {
    /// How long a quiet stream waits before sending an empty `{}` part, e.g. `5s`.
    #[serde(default = "heartbeat_every_5s", with = "humantime_serde")]
    #[schemars(with = "String")]
    pub multipart_heartbeat_interval: Duration,
}

impl Default for SubscriptionsConfig {
    fn default() -> Self {
        Self {
            multipart_heartbeat_interval: heartbeat_every_5s(),
        }
    }
}

fn heartbeat_every_5s() -> Duration {
    Duration::from_secs(5)
}
