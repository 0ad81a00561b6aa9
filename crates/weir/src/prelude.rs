//! A convenience module that re-exports commonly used items.
//!
//! This module is intended to be glob-imported for convenience:
//!
//! ```
//! use weir::prelude::*;
//! ```

pub use weir_core::prelude::*;

pub use crate::workflow::{
    Action, ActionData, ActionKind, CheckpointFactory, Edge, Event, EventQueue,
    InMemoryEventQueue, Inputs, NoTracker, Node, NodeId, NodeOptions, OutputShape, Outputs,
    ProgressTracker, Proxy, ProxyMap, ProxySeq, RunContext, SequentialExecutor, SinkAction,
    Socket, SourceAction, Tracker, UnderfolderCheckpoints, Workflow,
};
