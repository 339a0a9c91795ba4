//! Dependency graph node schema
//!
//! A page load is modeled as two kinds of work:
//!
//! - **CPU tasks:** main-thread tasks (parse, script evaluation, layout, paint)
//! - **Network records:** individual requests with their resource type and priority
//!
//! Every node has exactly one kind. Timestamps are milliseconds on the same
//! monotonic timebase as the navigation marks in [`crate::artifacts`].
//!
//! # Serialized Form
//!
//! ```text
//! {"kind": "network", "id": 1, "url": "https://example.com/", "resource_type": "Document", ...}
//! {"kind": "cpu", "id": 2, "start_time": 120.0, "end_time": 180.0, "child_events": [...]}
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable node identifier
///
/// Identifiers survive graph cloning, so a node keeps its `NodeId` in every
/// optimistic or pessimistic variant derived from the original graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Node kind tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Cpu,
    Network,
}

/// Resource type of a network record (DevTools resource taxonomy)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ResourceType {
    Document,
    Stylesheet,
    Image,
    Media,
    Font,
    Script,
    #[serde(rename = "XHR")]
    Xhr,
    Fetch,
    #[default]
    Other,
}

/// Request priority as assigned by the browser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum Priority {
    VeryLow,
    Low,
    #[default]
    Medium,
    High,
    VeryHigh,
}

/// What caused a request to be issued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InitiatorType {
    Parser,
    Script,
    Preload,
    #[default]
    Other,
}

/// Trace event nested inside a CPU task
///
/// Only the events the metric strategies inspect are modeled; everything else
/// deserializes to [`TaskEvent::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name")]
pub enum TaskEvent {
    Layout,
    Paint,
    #[serde(rename = "ParseHTML")]
    ParseHtml,
    EvaluateScript {
        url: String,
    },
    #[serde(other)]
    Other,
}

/// Main-thread CPU task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuNode {
    pub id: NodeId,
    /// Task start (ms)
    pub start_time: f64,
    /// Task end (ms)
    pub end_time: f64,
    /// Events recorded while the task ran
    #[serde(default)]
    pub child_events: Vec<TaskEvent>,
}

impl CpuNode {
    pub fn new(id: NodeId, start_time: f64, end_time: f64) -> Self {
        Self {
            id,
            start_time,
            end_time,
            child_events: Vec::new(),
        }
    }

    /// Builder-style helper to attach a child event
    pub fn with_event(mut self, event: TaskEvent) -> Self {
        self.child_events.push(event);
        self
    }

    /// Recorded task duration (ms)
    pub fn duration(&self) -> f64 {
        (self.end_time - self.start_time).max(0.0)
    }

    pub fn did_perform_layout(&self) -> bool {
        self.child_events
            .iter()
            .any(|event| matches!(event, TaskEvent::Layout))
    }

    pub fn did_paint(&self) -> bool {
        self.child_events
            .iter()
            .any(|event| matches!(event, TaskEvent::Paint))
    }

    pub fn did_parse_html(&self) -> bool {
        self.child_events
            .iter()
            .any(|event| matches!(event, TaskEvent::ParseHtml))
    }

    /// URLs of every script evaluated by this task
    pub fn evaluated_script_urls(&self) -> impl Iterator<Item = &str> {
        self.child_events.iter().filter_map(|event| match event {
            TaskEvent::EvaluateScript { url } => Some(url.as_str()),
            _ => None,
        })
    }
}

/// Network request record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkNode {
    pub id: NodeId,
    /// Request URL (not unique across a page load)
    pub url: String,
    #[serde(default)]
    pub resource_type: ResourceType,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub initiator_type: InitiatorType,
    /// Encoded bytes transferred
    #[serde(default)]
    pub transfer_size: u64,
    /// Whether the request reused an already-open connection
    #[serde(default)]
    pub connection_reused: bool,
    /// Whether this is the navigation's main document request
    #[serde(default)]
    pub is_main_document: bool,
    /// Request start (ms)
    pub start_time: f64,
    /// Response end (ms)
    pub end_time: f64,
}

impl NetworkNode {
    pub fn new(id: NodeId, url: impl Into<String>, resource_type: ResourceType) -> Self {
        Self {
            id,
            url: url.into(),
            resource_type,
            priority: Priority::default(),
            initiator_type: InitiatorType::default(),
            transfer_size: 0,
            connection_reused: false,
            is_main_document: false,
            start_time: 0.0,
            end_time: 0.0,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_initiator(mut self, initiator_type: InitiatorType) -> Self {
        self.initiator_type = initiator_type;
        self
    }

    pub fn with_timing(mut self, start_time: f64, end_time: f64) -> Self {
        self.start_time = start_time;
        self.end_time = end_time;
        self
    }

    pub fn with_transfer_size(mut self, transfer_size: u64) -> Self {
        self.transfer_size = transfer_size;
        self
    }

    pub fn with_connection_reused(mut self, connection_reused: bool) -> Self {
        self.connection_reused = connection_reused;
        self
    }

    pub fn as_main_document(mut self) -> Self {
        self.is_main_document = true;
        self
    }

    /// Whether the browser would hold first render for this request
    ///
    /// `VeryHigh` always blocks; `High` blocks only for scripts and documents.
    pub fn has_render_blocking_priority(&self) -> bool {
        match self.priority {
            Priority::VeryHigh => true,
            Priority::High => matches!(
                self.resource_type,
                ResourceType::Script | ResourceType::Document
            ),
            _ => false,
        }
    }
}

/// Dependency graph node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Node {
    Cpu(CpuNode),
    Network(NetworkNode),
}

impl Node {
    pub fn id(&self) -> NodeId {
        match self {
            Node::Cpu(cpu) => cpu.id,
            Node::Network(network) => network.id,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Cpu(_) => NodeKind::Cpu,
            Node::Network(_) => NodeKind::Network,
        }
    }

    pub fn start_time(&self) -> f64 {
        match self {
            Node::Cpu(cpu) => cpu.start_time,
            Node::Network(network) => network.start_time,
        }
    }

    pub fn end_time(&self) -> f64 {
        match self {
            Node::Cpu(cpu) => cpu.end_time,
            Node::Network(network) => network.end_time,
        }
    }

    pub fn as_cpu(&self) -> Option<&CpuNode> {
        match self {
            Node::Cpu(cpu) => Some(cpu),
            Node::Network(_) => None,
        }
    }

    pub fn as_network(&self) -> Option<&NetworkNode> {
        match self {
            Node::Network(network) => Some(network),
            Node::Cpu(_) => None,
        }
    }
}

impl From<CpuNode> for Node {
    fn from(cpu: CpuNode) -> Self {
        Node::Cpu(cpu)
    }
}

impl From<NetworkNode> for Node {
    fn from(network: NetworkNode) -> Self {
        Node::Network(network)
    }
}
