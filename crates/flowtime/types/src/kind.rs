//! Node kinds.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Closed set of node kinds a topology or model may declare.
///
/// Parsing is case-insensitive and a blank kind means [`NodeKind::Service`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum NodeKind {
    /// Processes arrivals; carries retry and service-time signals.
    #[default]
    Service,
    /// Buffers work; latency derives from queue depth.
    Queue,
    /// Constant value series.
    Const,
    /// Expression-evaluated series (`expression` or `expr`).
    Expression,
    /// Probability mass function series.
    Pmf,
}

/// Kind string that matches none of the known kinds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown node kind: {0}")]
pub struct UnknownNodeKind(pub String);

impl NodeKind {
    /// Parse a kind string, treating blank input as a service.
    pub fn parse(raw: &str) -> Result<Self, UnknownNodeKind> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(NodeKind::Service);
        }

        match trimmed.to_ascii_lowercase().as_str() {
            "service" => Ok(NodeKind::Service),
            "queue" => Ok(NodeKind::Queue),
            "const" => Ok(NodeKind::Const),
            "expression" | "expr" => Ok(NodeKind::Expression),
            "pmf" => Ok(NodeKind::Pmf),
            _ => Err(UnknownNodeKind(trimmed.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Service => "service",
            NodeKind::Queue => "queue",
            NodeKind::Const => "const",
            NodeKind::Expression => "expr",
            NodeKind::Pmf => "pmf",
        }
    }

    /// Service and queue nodes carry flow (arrivals/served).
    pub fn is_flow(&self) -> bool {
        matches!(self, NodeKind::Service | NodeKind::Queue)
    }

    /// Const, expression and pmf nodes carry a single value series.
    pub fn is_computed(&self) -> bool {
        matches!(self, NodeKind::Const | NodeKind::Expression | NodeKind::Pmf)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for NodeKind {
    type Error = UnknownNodeKind;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        NodeKind::parse(&value)
    }
}

impl From<NodeKind> for String {
    fn from(kind: NodeKind) -> Self {
        kind.as_str().to_string()
    }
}
