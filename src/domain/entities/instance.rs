use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::InboundMessage;

/// Stable numeric identity of one bot instance (the account number).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(pub u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for InstanceId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(InstanceId)
    }
}

impl From<u64> for InstanceId {
    fn from(id: u64) -> Self {
        InstanceId(id)
    }
}

/// Lifecycle and inbound traffic published by an instance
#[derive(Debug, Clone)]
pub enum InstanceEvent {
    Online,
    Offline { reason: String },
    Message(InboundMessage),
}

/// Point-in-time counters reported by the protocol client
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceStatus {
    pub groups: usize,
    pub friends: usize,
    pub messages_per_minute: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_displays() {
        let id: InstanceId = " 10001 ".parse().unwrap();
        assert_eq!(id, InstanceId(10001));
        assert_eq!(id.to_string(), "10001");
        assert!("abc".parse::<InstanceId>().is_err());
    }
}
