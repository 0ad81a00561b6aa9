#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod workflow;

#[doc(hidden)]
pub mod prelude;

#[doc(no_inline)]
pub use weir_core::*;

pub use crate::workflow::{
    Event, EventQueue, InMemoryEventQueue, NoTracker, NodeOptions, ProgressTracker,
    SequentialExecutor, Tracker, Workflow,
};
