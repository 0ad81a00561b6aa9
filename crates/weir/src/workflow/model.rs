//! The workflow graph: named nodes connected by proxy edges.

use std::collections::HashMap;
use std::fmt;

use weir_core::caches::CachePolicy;
use weir_core::{Error, ErrorKind, Result};

use crate::workflow::action::{Action, ActionKind, OutputShape};

/// Identifier of a node within its workflow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

/// One output (or input) channel of a node.
///
/// A node with a single dataset output exposes it on [`Socket::Main`];
/// sequence outputs use [`Socket::Index`], mapping outputs use
/// [`Socket::Key`], and [`Socket::All`] addresses a whole collection at
/// once.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Socket {
    /// The single dataset channel.
    Main,
    /// One element of a sequence output.
    Index(usize),
    /// One entry of a mapping output.
    Key(String),
    /// The whole collection.
    All,
}

impl fmt::Display for Socket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Main => f.write_str("main"),
            Self::Index(index) => write!(f, "{index}"),
            Self::Key(key) => f.write_str(key),
            Self::All => f.write_str("all"),
        }
    }
}

/// Address of one output channel of one node.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Proxy {
    pub(crate) node: NodeId,
    pub(crate) socket: Socket,
}

impl Proxy {
    /// Returns the node this proxy points at.
    #[must_use]
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Returns the addressed socket.
    #[must_use]
    pub fn socket(&self) -> &Socket {
        &self.socket
    }
}

/// A connection from a producer proxy to a consumer proxy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Edge {
    pub(crate) src: Proxy,
    pub(crate) dst: Proxy,
}

impl Edge {
    /// Returns the producer side.
    #[must_use]
    pub fn src(&self) -> &Proxy {
        &self.src
    }

    /// Returns the consumer side.
    #[must_use]
    pub fn dst(&self) -> &Proxy {
        &self.dst
    }
}

/// Per-node execution options, merged over the workflow defaults.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeOptions {
    checkpoint: Option<bool>,
    destroy_checkpoint: Option<bool>,
    cache: Option<CachePolicy>,
}

impl NodeOptions {
    /// Creates empty options deferring everything to the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables checkpointing for this node.
    #[must_use]
    pub fn checkpoint(mut self, enabled: bool) -> Self {
        self.checkpoint = Some(enabled);
        self
    }

    /// Controls whether this node's checkpoint is destroyed after a clean
    /// run.
    #[must_use]
    pub fn destroy_checkpoint(mut self, destroy: bool) -> Self {
        self.destroy_checkpoint = Some(destroy);
        self
    }

    /// Wraps this node's outputs with a cache of the given policy.
    #[must_use]
    pub fn cache(mut self, policy: CachePolicy) -> Self {
        self.cache = Some(policy);
        self
    }

    /// Resolves unset fields against `defaults`.
    #[must_use]
    pub(crate) fn resolve(&self, defaults: &NodeOptions) -> ResolvedOptions {
        ResolvedOptions {
            checkpoint: self.checkpoint.or(defaults.checkpoint).unwrap_or(false),
            destroy_checkpoint: self
                .destroy_checkpoint
                .or(defaults.destroy_checkpoint)
                .unwrap_or(true),
            cache: self.cache.or(defaults.cache),
        }
    }
}

/// Fully resolved per-node options.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ResolvedOptions {
    pub(crate) checkpoint: bool,
    pub(crate) destroy_checkpoint: bool,
    pub(crate) cache: Option<CachePolicy>,
}

/// A named node owning its action.
pub struct Node {
    pub(crate) name: String,
    pub(crate) action: Box<dyn Action>,
    pub(crate) options: NodeOptions,
}

impl Node {
    /// Returns the unique node name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the node options.
    #[must_use]
    pub fn options(&self) -> &NodeOptions {
        &self.options
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("kind", &self.action.kind())
            .finish_non_exhaustive()
    }
}

/// Input connections of a new node.
#[derive(Clone, Debug, Default)]
pub enum Inputs {
    /// No inputs; only sources qualify.
    #[default]
    None,
    /// A single dataset input.
    One(Proxy),
    /// Positional inputs, one per sequence socket.
    Seq(Vec<Proxy>),
    /// Keyed inputs, one per mapping socket.
    Map(Vec<(String, Proxy)>),
    /// A whole collection output consumed wholesale.
    All(Proxy),
}

impl From<&Proxy> for Inputs {
    fn from(proxy: &Proxy) -> Self {
        Self::One(proxy.clone())
    }
}

impl From<Proxy> for Inputs {
    fn from(proxy: Proxy) -> Self {
        Self::One(proxy)
    }
}

/// Lazily addressable sequence output of a node.
#[derive(Clone, Debug)]
pub struct ProxySeq {
    node: NodeId,
}

impl ProxySeq {
    /// Returns the proxy of element `index`.
    #[must_use]
    pub fn at(&self, index: usize) -> Proxy {
        Proxy {
            node: self.node,
            socket: Socket::Index(index),
        }
    }

    /// Returns the collection-wide proxy.
    #[must_use]
    pub fn all(&self) -> Proxy {
        Proxy {
            node: self.node,
            socket: Socket::All,
        }
    }
}

/// Lazily addressable mapping output of a node.
#[derive(Clone, Debug)]
pub struct ProxyMap {
    node: NodeId,
}

impl ProxyMap {
    /// Returns the proxy of the entry under `key`.
    #[must_use]
    pub fn key(&self, key: impl Into<String>) -> Proxy {
        Proxy {
            node: self.node,
            socket: Socket::Key(key.into()),
        }
    }

    /// Returns the collection-wide proxy.
    #[must_use]
    pub fn all(&self) -> Proxy {
        Proxy {
            node: self.node,
            socket: Socket::All,
        }
    }
}

/// Output proxies handed back when a node is registered.
#[derive(Clone, Debug)]
pub enum Outputs {
    /// The node produces nothing (sinks).
    Empty,
    /// A single dataset output.
    Single(Proxy),
    /// A sequence of datasets.
    Seq(ProxySeq),
    /// A mapping of datasets.
    Map(ProxyMap),
}

impl Outputs {
    /// Unwraps the single dataset proxy.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::Graph`] when the node has a different output
    /// shape.
    pub fn single(self) -> Result<Proxy> {
        match self {
            Self::Single(proxy) => Ok(proxy),
            other => Err(shape_error("a single dataset", &other)),
        }
    }

    /// Unwraps the sequence proxy collection.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::Graph`] when the node has a different output
    /// shape.
    pub fn seq(self) -> Result<ProxySeq> {
        match self {
            Self::Seq(seq) => Ok(seq),
            other => Err(shape_error("a dataset sequence", &other)),
        }
    }

    /// Unwraps the mapping proxy collection.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::Graph`] when the node has a different output
    /// shape.
    pub fn map(self) -> Result<ProxyMap> {
        match self {
            Self::Map(map) => Ok(map),
            other => Err(shape_error("a dataset mapping", &other)),
        }
    }
}

fn shape_error(expected: &str, got: &Outputs) -> Error {
    let got = match got {
        Outputs::Empty => "no output",
        Outputs::Single(_) => "a single dataset",
        Outputs::Seq(_) => "a dataset sequence",
        Outputs::Map(_) => "a dataset mapping",
    };
    let message = format!("expected {expected}, the node produces {got}");
    Error::new(ErrorKind::Graph, message)
}

/// A DAG of named source/operator/sink nodes.
///
/// The graph is built imperatively: registering a node connects its inputs
/// to already-registered proxies and hands back the proxies of its own
/// outputs. Names are unique; omitted names are generated as
/// `<label>_<counter>`.
///
/// # Examples
///
/// ```no_run
/// use weir::prelude::*;
///
/// # fn main() -> weir::Result<()> {
/// let mut wf = Workflow::new();
/// let data = wf.source(UnderfolderSource::new("dataset/in"))?;
/// let data = wf.op(ReverseOp::new(), &data)?;
/// wf.sink(UnderfolderSink::new("dataset/out"), &data)?;
/// # Ok(())
/// # }
/// ```
#[must_use]
#[derive(Default)]
pub struct Workflow {
    nodes: Vec<Node>,
    by_name: HashMap<String, NodeId>,
    edges: Vec<Edge>,
    counters: HashMap<&'static str, usize>,
    defaults: NodeOptions,
}

impl Workflow {
    /// Creates an empty workflow.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty workflow with default node options.
    pub fn with_defaults(defaults: NodeOptions) -> Self {
        Self {
            defaults,
            ..Self::default()
        }
    }

    /// Returns the workflow-level default options.
    #[must_use]
    pub fn defaults(&self) -> &NodeOptions {
        &self.defaults
    }

    /// Returns the number of registered nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if no nodes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the registered nodes, in registration order.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Looks a node up by name.
    #[must_use]
    pub fn node_by_name(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    /// Returns every edge of the graph.
    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Returns the edges feeding `node`.
    pub fn inbound(&self, node: NodeId) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |edge| edge.dst.node == node)
    }

    /// Returns the edges leaving `node`.
    pub fn outbound(&self, node: NodeId) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |edge| edge.src.node == node)
    }

    pub(crate) fn node_ref(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    fn generate_name(&mut self, label: &'static str) -> String {
        let counter = self.counters.entry(label).or_insert(0);
        *counter += 1;
        format!("{label}_{counter}")
    }

    /// Registers a node with a generated name and default options.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::Graph`] on name collisions or invalid
    /// connections (a source with inputs, an operator or sink without).
    pub fn node(
        &mut self,
        action: impl Action + 'static,
        inputs: impl Into<Inputs>,
    ) -> Result<Outputs> {
        let name = self.generate_name(action.label());
        self.node_named(action, name, NodeOptions::default(), inputs)
    }

    /// Registers a node under an explicit name with explicit options.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::Graph`] on name collisions or invalid
    /// connections.
    pub fn node_named(
        &mut self,
        action: impl Action + 'static,
        name: impl Into<String>,
        options: NodeOptions,
        inputs: impl Into<Inputs>,
    ) -> Result<Outputs> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            let message = format!("name '{name}' is already associated with another node");
            return Err(Error::new(ErrorKind::Graph, message));
        }

        let inputs = inputs.into();
        let kind = action.kind();
        match (&kind, &inputs) {
            (ActionKind::Source, Inputs::None) => {}
            (ActionKind::Source, _) => {
                let message = format!("source node '{name}' cannot take inputs");
                return Err(Error::new(ErrorKind::Graph, message));
            }
            (_, Inputs::None) => {
                let message = format!("node '{name}' requires at least one input");
                return Err(Error::new(ErrorKind::Graph, message));
            }
            _ => {}
        }

        let id = NodeId(self.nodes.len());
        let outputs = match (&kind, action.output_shape()) {
            (ActionKind::Sink, _) => Outputs::Empty,
            (_, OutputShape::Empty) => Outputs::Empty,
            (_, OutputShape::Single) => Outputs::Single(Proxy {
                node: id,
                socket: Socket::Main,
            }),
            (_, OutputShape::Seq) => Outputs::Seq(ProxySeq { node: id }),
            (_, OutputShape::Map) => Outputs::Map(ProxyMap { node: id }),
        };

        match inputs {
            Inputs::None => {}
            Inputs::One(src) => self.edges.push(Edge {
                src,
                dst: Proxy {
                    node: id,
                    socket: Socket::Main,
                },
            }),
            Inputs::Seq(proxies) => {
                for (index, src) in proxies.into_iter().enumerate() {
                    self.edges.push(Edge {
                        src,
                        dst: Proxy {
                            node: id,
                            socket: Socket::Index(index),
                        },
                    });
                }
            }
            Inputs::Map(pairs) => {
                for (key, src) in pairs {
                    self.edges.push(Edge {
                        src,
                        dst: Proxy {
                            node: id,
                            socket: Socket::Key(key),
                        },
                    });
                }
            }
            Inputs::All(src) => self.edges.push(Edge {
                src,
                dst: Proxy {
                    node: id,
                    socket: Socket::All,
                },
            }),
        }

        self.nodes.push(Node {
            name: name.clone(),
            action: Box::new(action),
            options,
        });
        let _ = self.by_name.insert(name, id);
        Ok(outputs)
    }

    /// Registers a source node, returning its dataset proxy.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::Graph`] on invalid registration.
    pub fn source(&mut self, source: impl Action + 'static) -> Result<Proxy> {
        self.node(source, Inputs::None)?.single()
    }

    /// Registers a single-input, single-output operator node.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::Graph`] on invalid registration.
    pub fn op(&mut self, action: impl Action + 'static, input: &Proxy) -> Result<Proxy> {
        self.node(action, input)?.single()
    }

    /// Registers a sink node.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::Graph`] on invalid registration.
    pub fn sink(&mut self, sink: impl Action + 'static, input: &Proxy) -> Result<()> {
        let _ = self.node(sink, input)?;
        Ok(())
    }

    /// Topologically sorts the nodes, producers first.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::Graph`] when the graph contains a cycle.
    pub fn topological_order(&self) -> Result<Vec<NodeId>> {
        const UNVISITED: u8 = 0;
        const IN_PROGRESS: u8 = 1;
        const DONE: u8 = 2;

        fn visit(
            wf: &Workflow,
            id: NodeId,
            marks: &mut [u8],
            order: &mut Vec<NodeId>,
        ) -> Result<()> {
            match marks[id.0] {
                IN_PROGRESS => {
                    return Err(Error::new(ErrorKind::Graph, "the graph contains a cycle"));
                }
                DONE => return Ok(()),
                _ => {}
            }
            marks[id.0] = IN_PROGRESS;
            for edge in wf.outbound(id) {
                visit(wf, edge.dst.node, marks, order)?;
            }
            marks[id.0] = DONE;
            order.push(id);
            Ok(())
        }

        let mut marks = vec![UNVISITED; self.nodes.len()];
        let mut order = Vec::with_capacity(self.nodes.len());
        for index in 0..self.nodes.len() {
            visit(self, NodeId(index), &mut marks, &mut order)?;
        }
        order.reverse();
        Ok(order)
    }
}

impl fmt::Debug for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workflow")
            .field("nodes", &self.nodes.len())
            .field("edges", &self.edges.len())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use weir_core::ops::{ChunkOp, IdentityOp, ReverseOp};
    use weir_core::sources::Source;
    use weir_core::{Data, Result};

    use super::{Inputs, NodeOptions, Socket, Workflow};
    use crate::workflow::action::SourceAction;
    use weir_core::ErrorKind;

    struct EmptySource;

    impl Source for EmptySource {
        fn produce(&mut self) -> Result<Data> {
            Ok(Data::from_samples(Vec::new()))
        }
    }

    fn source() -> SourceAction<EmptySource> {
        SourceAction::new(EmptySource)
    }

    #[test]
    fn names_are_generated_per_label() {
        let mut wf = Workflow::new();
        let a = wf.source(source()).unwrap();
        let _ = wf.op(IdentityOp::new(), &a).unwrap();
        let _ = wf.op(IdentityOp::new(), &a).unwrap();

        assert!(wf.node_by_name("source_1").is_some());
        assert!(wf.node_by_name("identity_1").is_some());
        assert!(wf.node_by_name("identity_2").is_some());
    }

    #[test]
    fn duplicate_names_fail() {
        let mut wf = Workflow::new();
        let _ = wf
            .node_named(source(), "input", NodeOptions::new(), Inputs::None)
            .unwrap();
        let err = wf
            .node_named(source(), "input", NodeOptions::new(), Inputs::None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Graph);
    }

    #[test]
    fn sources_take_no_inputs_ops_require_them() {
        let mut wf = Workflow::new();
        let a = wf.source(source()).unwrap();

        let err = wf.node(source(), &a).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Graph);

        let err = wf.node(ReverseOp::new(), Inputs::None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Graph);
    }

    #[test]
    fn seq_outputs_expose_indexed_proxies() {
        let mut wf = Workflow::new();
        let a = wf.source(source()).unwrap();
        let chunks = wf
            .node(ChunkOp::new(3).unwrap(), &a)
            .unwrap()
            .seq()
            .unwrap();

        let second = chunks.at(1);
        assert_eq!(second.socket(), &Socket::Index(1));
        let whole = chunks.all();
        assert_eq!(whole.socket(), &Socket::All);
    }

    #[test]
    fn topological_order_respects_edges() {
        let mut wf = Workflow::new();
        let a = wf.source(source()).unwrap();
        let b = wf.op(ReverseOp::new(), &a).unwrap();
        let c = wf.op(IdentityOp::new(), &b).unwrap();
        let _ = wf.op(IdentityOp::new(), &a).unwrap();

        let order = wf.topological_order().unwrap();
        let position = |proxy: &super::Proxy| {
            order.iter().position(|id| *id == proxy.node()).unwrap()
        };
        assert!(position(&a) < position(&b));
        assert!(position(&b) < position(&c));
        assert_eq!(order.len(), 4);
    }
}
