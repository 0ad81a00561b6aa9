//! Sequential, topological workflow execution.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

use weir_core::ops::CacheOp;
use weir_core::{Data, Error, ErrorKind, LoopEvent, Progress, Result};

use crate::workflow::action::{ActionData, ActionKind, RunContext};
use crate::workflow::checkpoint::{CheckpointFactory, UnderfolderCheckpoints};
use crate::workflow::events::{Event, EventQueue};
use crate::workflow::model::{NodeId, NodeOptions, Proxy, ResolvedOptions, Socket, Workflow};

/// Tracing target for executor events.
const TARGET: &str = "weir::workflow::executor";

/// Runs a workflow node by node on the calling thread.
///
/// Nodes execute in topological order; parallelism lives only inside the
/// actions' own loops. Checkpoint-enabled nodes have every output written
/// through the checkpoint factory and re-read from disk before downstream
/// consumers see it; cache-enabled nodes have their outputs wrapped with a
/// [`CacheOp`]. On failure the run aborts, the error propagates, and every
/// checkpoint written so far is left on disk for diagnosis — destruction
/// happens only after a clean run.
#[must_use]
pub struct SequentialExecutor {
    defaults: NodeOptions,
    checkpoints: Box<dyn CheckpointFactory>,
    queue: Option<Arc<dyn EventQueue>>,
}

impl SequentialExecutor {
    /// Creates an executor with default options and temp-dir checkpoints.
    pub fn new() -> Self {
        Self {
            defaults: NodeOptions::default(),
            checkpoints: Box::new(UnderfolderCheckpoints::default()),
            queue: None,
        }
    }

    /// Sets the fallback options applied to nodes that leave them unset.
    pub fn with_defaults(mut self, defaults: NodeOptions) -> Self {
        self.defaults = defaults;
        self
    }

    /// Replaces the checkpoint factory.
    pub fn with_checkpoint_factory(mut self, factory: impl CheckpointFactory + 'static) -> Self {
        self.checkpoints = Box::new(factory);
        self
    }

    /// Attaches the progress event queue.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::Config`] when already attached.
    pub fn attach(&mut self, queue: Arc<dyn EventQueue>) -> Result<()> {
        if self.queue.is_some() {
            return Err(Error::new(
                ErrorKind::Config,
                "already attached to an event queue",
            ));
        }
        self.queue = Some(queue);
        Ok(())
    }

    /// Detaches the progress event queue.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::Config`] when not attached.
    pub fn detach(&mut self) -> Result<()> {
        if self.queue.take().is_none() {
            return Err(Error::new(
                ErrorKind::Config,
                "not attached to an event queue",
            ));
        }
        Ok(())
    }

    /// Executes `workflow` to completion.
    ///
    /// # Errors
    ///
    /// Propagates the first action, checkpoint or graph error; partial
    /// checkpoints are kept on disk.
    pub fn execute(&mut self, workflow: &mut Workflow) -> Result<()> {
        let execution = Uuid::new_v4().simple().to_string();
        let started = Instant::now();
        tracing::info!(target: TARGET, %execution, nodes = workflow.len(), "workflow started");

        let result = self.execute_inner(workflow, &execution);
        let elapsed = started.elapsed();
        match &result {
            Ok(()) => {
                tracing::info!(target: TARGET, %execution, ?elapsed, "workflow completed");
            }
            Err(error) => {
                tracing::error!(target: TARGET, %execution, ?elapsed, %error, "workflow failed");
            }
        }
        result
    }

    fn execute_inner(&mut self, workflow: &mut Workflow, execution: &str) -> Result<()> {
        let order = workflow.topological_order()?;
        let mut state: HashMap<Proxy, Data> = HashMap::new();
        let mut published: HashMap<NodeId, Vec<Socket>> = HashMap::new();

        for id in order {
            self.execute_node(workflow, id, execution, &mut state, &mut published)?;
        }

        // A clean run destroys the checkpoints configured for destruction.
        for id in 0..workflow.len() {
            let id = NodeId(id);
            let node = workflow.node_ref(id);
            let options = node.options().resolve(&self.defaults);
            if options.checkpoint && options.destroy_checkpoint {
                for socket in published.get(&id).into_iter().flatten() {
                    let name = checkpoint_name(node.name(), socket);
                    self.checkpoints.destroy(execution, &name)?;
                }
            }
        }
        Ok(())
    }

    fn execute_node(
        &mut self,
        workflow: &mut Workflow,
        id: NodeId,
        execution: &str,
        state: &mut HashMap<Proxy, Data>,
        published: &mut HashMap<NodeId, Vec<Socket>>,
    ) -> Result<()> {
        let input = assemble_input(workflow, id, state, published)?;
        let kind = workflow.node_ref(id).action.kind();
        let name = workflow.node_ref(id).name.clone();
        if kind != ActionKind::Source && matches!(input, ActionData::Empty) {
            let message = format!("node '{name}' has no connected inputs");
            return Err(Error::new(ErrorKind::Graph, message));
        }

        let progress = self.node_progress(&name);
        let mut ctx = RunContext::new(progress.clone());
        tracing::debug!(target: TARGET, node = %name, "running node");
        let output = workflow.node_mut(id).action.run(input, &mut ctx)?;

        let options = workflow.node_ref(id).options().resolve(&self.defaults);
        let mut publish = |socket: Socket, data: Data| -> Result<()> {
            let data = self.handle_output(&name, kind, &options, execution, &socket, data, &progress)?;
            published.entry(id).or_default().push(socket.clone());
            let _ = state.insert(
                Proxy { node: id, socket },
                data,
            );
            Ok(())
        };

        match output {
            ActionData::Empty => {}
            ActionData::Single(data) => publish(Socket::Main, data)?,
            ActionData::Seq(parts) => {
                for (index, data) in parts.into_iter().enumerate() {
                    publish(Socket::Index(index), data)?;
                }
            }
            ActionData::Map(map) => {
                for (key, data) in map {
                    publish(Socket::Key(key), data)?;
                }
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn handle_output(
        &self,
        node_name: &str,
        kind: ActionKind,
        options: &ResolvedOptions,
        execution: &str,
        socket: &Socket,
        data: Data,
        progress: &Progress,
    ) -> Result<Data> {
        let mut data = data;
        if options.checkpoint && kind != ActionKind::Source && !data.is_empty() {
            let name = checkpoint_name(node_name, socket);
            let (mut sink, mut source) = self.checkpoints.create(execution, &name);
            sink.set_progress(progress.clone());
            source.set_progress(progress.clone());
            sink.consume(&data)?;
            // Drop the upstream reference before re-reading from disk.
            drop(data);
            data = source.produce()?;
        }
        if let Some(policy) = options.cache {
            data = CacheOp::new(policy).apply(&data);
        }
        Ok(data)
    }

    fn node_progress(&self, node_name: &str) -> Progress {
        let Some(queue) = self.queue.clone() else {
            return Progress::default();
        };
        let node_name = node_name.to_owned();
        Progress::new(move |event| {
            let event = match event {
                LoopEvent::Start { loop_id, total } => Event::TaskStart {
                    task: format!("{node_name}/{loop_id}"),
                    total: total as u64,
                },
                LoopEvent::Step { loop_id, index } => Event::TaskUpdate {
                    task: format!("{node_name}/{loop_id}"),
                    unit: index as u64,
                },
                LoopEvent::Finish { loop_id } => Event::TaskComplete {
                    task: format!("{node_name}/{loop_id}"),
                },
            };
            // A closed queue must never fail the pipeline.
            let _ = queue.emit(event);
        })
    }
}

impl Default for SequentialExecutor {
    fn default() -> Self {
        Self::new()
    }
}

fn checkpoint_name(node_name: &str, socket: &Socket) -> String {
    match socket {
        Socket::Main => node_name.to_owned(),
        other => format!("{node_name}/{other}"),
    }
}

/// Collects the inbound edges of `id` and assembles the action input.
///
/// All inbound edges must agree on the socket kind: a single main edge,
/// positional index edges, keyed edges, or one collection-wide edge.
fn assemble_input(
    workflow: &Workflow,
    id: NodeId,
    state: &HashMap<Proxy, Data>,
    published: &HashMap<NodeId, Vec<Socket>>,
) -> Result<ActionData> {
    let name = &workflow.node_ref(id).name;
    let edges: Vec<_> = workflow.inbound(id).cloned().collect();
    if edges.is_empty() {
        return Ok(ActionData::Empty);
    }

    let lookup = |proxy: &Proxy| -> Result<Data> {
        state.get(proxy).cloned().ok_or_else(|| {
            let producer = &workflow.node_ref(proxy.node).name;
            let message = format!(
                "input of node '{name}' references unpublished output '{producer}/{}'",
                proxy.socket
            );
            Error::new(ErrorKind::Graph, message)
        })
    };

    let all_main = edges.iter().all(|e| e.dst.socket == Socket::Main);
    let all_index = edges.iter().all(|e| matches!(e.dst.socket, Socket::Index(_)));
    let all_key = edges.iter().all(|e| matches!(e.dst.socket, Socket::Key(_)));
    let all_all = edges.iter().all(|e| e.dst.socket == Socket::All);

    if all_main {
        if edges.len() > 1 {
            let message = format!("node '{name}' has multiple edges on its main input");
            return Err(Error::new(ErrorKind::Graph, message));
        }
        return Ok(ActionData::Single(lookup(&edges[0].src)?));
    }

    if all_index {
        let mut slots: Vec<Option<Data>> = Vec::new();
        for edge in &edges {
            let Socket::Index(index) = edge.dst.socket else {
                unreachable!()
            };
            if slots.len() <= index {
                slots.resize_with(index + 1, || None);
            }
            slots[index] = Some(lookup(&edge.src)?);
        }
        let mut parts = Vec::with_capacity(slots.len());
        for (index, slot) in slots.into_iter().enumerate() {
            let Some(data) = slot else {
                let message = format!("input socket {index} of node '{name}' is not connected");
                return Err(Error::new(ErrorKind::Graph, message));
            };
            parts.push(data);
        }
        return Ok(ActionData::Seq(parts));
    }

    if all_key {
        let mut map = indexmap::IndexMap::with_capacity(edges.len());
        for edge in &edges {
            let Socket::Key(key) = &edge.dst.socket else {
                unreachable!()
            };
            let _ = map.insert(key.clone(), lookup(&edge.src)?);
        }
        return Ok(ActionData::Map(map));
    }

    if all_all && edges.len() == 1 {
        // Gather every published output of the producer, in publish order.
        let src = edges[0].src.node;
        let sockets = published.get(&src).cloned().unwrap_or_default();
        let mut indexed = Vec::new();
        let mut keyed = indexmap::IndexMap::new();
        for socket in sockets {
            let proxy = Proxy {
                node: src,
                socket: socket.clone(),
            };
            match socket {
                Socket::Index(_) => indexed.push(lookup(&proxy)?),
                Socket::Key(key) => {
                    let _ = keyed.insert(key, lookup(&proxy)?);
                }
                Socket::Main | Socket::All => {}
            }
        }
        if !keyed.is_empty() {
            return Ok(ActionData::Map(keyed));
        }
        return Ok(ActionData::Seq(indexed));
    }

    let message = format!("inbound edges of node '{name}' disagree on their socket kind");
    Err(Error::new(ErrorKind::Graph, message))
}
