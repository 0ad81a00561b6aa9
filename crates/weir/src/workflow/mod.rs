//! Declarative dataset pipelines: a DAG of named nodes, its executor, and
//! the progress machinery around it.
//!
//! A [`Workflow`] reifies a chain of dataset transformations as a graph of
//! source, operator and sink nodes connected by [`Proxy`] edges. The
//! [`SequentialExecutor`] resolves the graph topologically, optionally
//! persisting intermediates through a [`CheckpointFactory`] and wrapping
//! outputs with caches, while emitting [`Event`]s that a [`Tracker`]
//! renders.
//!
//! # Examples
//!
//! ```no_run
//! use weir::prelude::*;
//!
//! # fn main() -> weir::Result<()> {
//! let mut wf = Workflow::new();
//! let data = wf.source(UnderfolderSource::new("dataset/in"))?;
//! let data = wf.op(RepeatOp::new(100, false), &data)?;
//! let data = wf.op(SliceOp::new(None, None, Some(2))?, &data)?;
//! wf.sink(UnderfolderSink::new("dataset/out"), &data)?;
//!
//! SequentialExecutor::new().execute(&mut wf)
//! # }
//! ```

pub use action::{
    Action, ActionData, ActionKind, OutputShape, RunContext, SinkAction, SourceAction,
};
pub use checkpoint::{CheckpointFactory, UnderfolderCheckpoints};
pub use events::{Event, EventQueue, InMemoryEventQueue};
pub use executor::SequentialExecutor;
pub use model::{
    Edge, Inputs, Node, NodeId, NodeOptions, Outputs, Proxy, ProxyMap, ProxySeq, Socket, Workflow,
};
pub use tracking::{NoTracker, ProgressTracker, Tracker};

mod action;
mod checkpoint;
mod events;
mod executor;
mod model;
mod tracking;
