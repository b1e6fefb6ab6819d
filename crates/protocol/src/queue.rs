//! Queue naming convention and node identifiers.
//!
//! Every system listens on queues named `sys_amq_{systemId}_{node}`, or
//! `sys_amq_{systemId}_{node}_p{index}` when the node is partitioned. The
//! system id is exactly four decimal digits and partition indices are
//! zero-based.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};

/// Queue name prefix shared by every system.
pub const QUEUE_PREFIX: &str = "sys_amq_";

static QUEUE_NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^sys_amq_([0-9]{4})_(.+?)(?:_p([0-9]+))?$").expect("queue name pattern is valid")
});

/// Broker node a client connects to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Node {
    /// Front-end facing traffic.
    Biz,
    /// Traffic between application services.
    Fund,
    /// Operations and management systems.
    Opt,
}

impl Node {
    /// Every known node.
    pub fn all() -> [Node; 3] {
        [Node::Biz, Node::Fund, Node::Opt]
    }

    /// Identifier used in queue names and configuration.
    pub fn as_str(self) -> &'static str {
        match self {
            Node::Biz => "biz",
            Node::Fund => "fund",
            Node::Opt => "opt",
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Node {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        Node::all()
            .into_iter()
            .find(|node| node.as_str() == s)
            .ok_or_else(|| ProtocolError::UnknownNode(s.to_string()))
    }
}

/// Checks that `system_id` is four decimal digits.
pub fn validate_system_id(system_id: &str) -> Result<()> {
    if system_id.len() == 4 && system_id.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ProtocolError::InvalidSystemId(system_id.to_string()))
    }
}

/// A parsed, well-formed queue name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueueName {
    system_id: String,
    node: Node,
    partition: Option<u32>,
}

impl QueueName {
    /// Unpartitioned queue of `system_id` on `node`.
    pub fn new(system_id: &str, node: Node) -> Result<Self> {
        validate_system_id(system_id)?;
        Ok(Self {
            system_id: system_id.to_string(),
            node,
            partition: None,
        })
    }

    /// Partition `index` of `system_id`'s queue on `node`.
    pub fn partitioned(system_id: &str, node: Node, index: u32) -> Result<Self> {
        validate_system_id(system_id)?;
        Ok(Self {
            system_id: system_id.to_string(),
            node,
            partition: Some(index),
        })
    }

    /// Parses a queue name and resolves its node segment.
    pub fn parse(name: &str) -> Result<Self> {
        let invalid = |reason: String| ProtocolError::InvalidQueueName {
            name: name.to_string(),
            reason,
        };
        let caps = QUEUE_NAME_PATTERN
            .captures(name)
            .ok_or_else(|| invalid("does not match sys_amq_{systemId}_{node}[_p{index}]".to_string()))?;

        let node_segment = &caps[2];
        let node = node_segment
            .parse::<Node>()
            .map_err(|_| invalid(format!("unknown node {:?}", node_segment)))?;
        let partition = match caps.get(3) {
            Some(m) => Some(
                m.as_str()
                    .parse::<u32>()
                    .map_err(|_| invalid(format!("partition index {} out of range", m.as_str())))?,
            ),
            None => None,
        };

        Ok(Self {
            system_id: caps[1].to_string(),
            node,
            partition,
        })
    }

    /// Parses `name` and checks it against a node's partition layout.
    ///
    /// With `partitions <= 1` only unpartitioned names are accepted; otherwise
    /// the name must carry a partition index below `partitions`.
    pub fn validate(name: &str, partitions: u32) -> Result<Self> {
        let parsed = Self::parse(name)?;
        let invalid = |reason: String| ProtocolError::InvalidQueueName {
            name: name.to_string(),
            reason,
        };
        match (partitions > 1, parsed.partition) {
            (false, Some(_)) => Err(invalid("node is not partitioned".to_string())),
            (true, None) => Err(invalid(format!(
                "node has {} partitions; a partition suffix is required",
                partitions
            ))),
            (true, Some(index)) if index >= partitions => Err(invalid(format!(
                "partition index {} out of range (node has {})",
                index, partitions
            ))),
            _ => Ok(parsed),
        }
    }

    /// Four-digit system id.
    pub fn system_id(&self) -> &str {
        &self.system_id
    }

    /// Node segment.
    pub fn node(&self) -> Node {
        self.node
    }

    /// Partition index, if partitioned.
    pub fn partition(&self) -> Option<u32> {
        self.partition
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}_{}", QUEUE_PREFIX, self.system_id, self.node)?;
        if let Some(index) = self.partition {
            write!(f, "_p{}", index)?;
        }
        Ok(())
    }
}

impl FromStr for QueueName {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
