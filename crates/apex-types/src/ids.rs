use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque agent identifier, unique within a ledger.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    pub const SYSTEM_BANK: &'static str = "system_bank";
    pub const SYSTEM_ESCROW: &'static str = "system_escrow";
    pub const SYSTEM_TREASURY: &'static str = "system_treasury";

    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            None
        } else {
            Some(AgentId(id))
        }
    }

    pub fn system_bank() -> Self {
        AgentId(Self::SYSTEM_BANK.to_string())
    }

    pub fn system_escrow() -> Self {
        AgentId(Self::SYSTEM_ESCROW.to_string())
    }

    pub fn system_treasury() -> Self {
        AgentId(Self::SYSTEM_TREASURY.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_reserved(&self) -> bool {
        matches!(
            self.0.as_str(),
            Self::SYSTEM_BANK | Self::SYSTEM_ESCROW | Self::SYSTEM_TREASURY
        )
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique transaction identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxId(Uuid);

impl TxId {
    pub fn new() -> Self {
        TxId(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for TxId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an in-flight dispatcher request. Both string and integer
/// JSON-RPC ids are valid on the wire; this is the normalized internal form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    Str(String),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{n}"),
            RequestId::Str(s) => write!(f, "{s}"),
        }
    }
}
