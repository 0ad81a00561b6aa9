//! Uniform invocation surface over sources, operators and sinks.
//!
//! The executor drives every node through the [`Action`] trait: one `run`
//! call taking and returning shaped dataset payloads. Core operators
//! implement it directly; arbitrary [`Source`]s and [`Sink`]s are lifted
//! through [`SourceAction`] and [`SinkAction`].

use indexmap::IndexMap;

use weir_core::mappers::Mapper;
use weir_core::ops::{
    BatchOp, CacheOp, CatOp, ChunkOp, CycleOp, FilterOp, GroupByOp, IdentityOp, IndexOp,
    ItemCacheOp, MapOp, MemorizeEverythingOp, PadOp, RepeatOp, ReverseOp, ShuffleOp, SliceOp,
    SortOp, SplitOp, ZipOp,
};
use weir_core::sinks::{Sink, UnderfolderSink};
use weir_core::sources::{Source, UnderfolderSource};
use weir_core::{Data, Error, ErrorKind, Progress, Result, Sample};

/// What role a node plays in the graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionKind {
    /// Produces datasets from outside the graph.
    Source,
    /// Transforms datasets.
    Operator,
    /// Persists datasets outside the graph.
    Sink,
}

/// Declared shape of an action's output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputShape {
    /// No output (sinks).
    Empty,
    /// A single dataset.
    Single,
    /// A sequence of datasets.
    Seq,
    /// A string-keyed mapping of datasets.
    Map,
}

/// Shaped dataset payload flowing into and out of actions.
#[derive(Clone, Debug, Default)]
pub enum ActionData {
    /// No datasets.
    #[default]
    Empty,
    /// A single dataset.
    Single(Data),
    /// A sequence of datasets.
    Seq(Vec<Data>),
    /// A string-keyed mapping of datasets.
    Map(IndexMap<String, Data>),
}

impl ActionData {
    /// Unwraps a single dataset.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::Graph`] on a shape mismatch.
    pub fn into_single(self) -> Result<Data> {
        match self {
            Self::Single(data) => Ok(data),
            other => Err(shape_error("a single dataset", &other)),
        }
    }

    /// Unwraps a dataset sequence.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::Graph`] on a shape mismatch.
    pub fn into_seq(self) -> Result<Vec<Data>> {
        match self {
            Self::Seq(parts) => Ok(parts),
            other => Err(shape_error("a dataset sequence", &other)),
        }
    }

    /// Unwraps a dataset mapping.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::Graph`] on a shape mismatch.
    pub fn into_map(self) -> Result<IndexMap<String, Data>> {
        match self {
            Self::Map(map) => Ok(map),
            other => Err(shape_error("a dataset mapping", &other)),
        }
    }

    /// Checks that no input was connected.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::Graph`] on a shape mismatch.
    pub fn expect_empty(self) -> Result<()> {
        match self {
            Self::Empty => Ok(()),
            other => Err(shape_error("no input", &other)),
        }
    }
}

fn shape_error(expected: &str, got: &ActionData) -> Error {
    let got = match got {
        ActionData::Empty => "nothing",
        ActionData::Single(_) => "a single dataset",
        ActionData::Seq(_) => "a dataset sequence",
        ActionData::Map(_) => "a dataset mapping",
    };
    let message = format!("action expected {expected}, got {got}");
    Error::new(ErrorKind::Graph, message)
}

/// Per-node context handed to [`Action::run`].
///
/// Carries the progress handle wired to the executor's event queue.
#[derive(Clone, Debug, Default)]
pub struct RunContext {
    progress: Progress,
}

impl RunContext {
    /// Creates a context reporting through `progress`.
    #[must_use]
    pub fn new(progress: Progress) -> Self {
        Self { progress }
    }

    /// Returns the progress handle for this node.
    #[must_use]
    pub fn progress(&self) -> &Progress {
        &self.progress
    }
}

/// A runnable workflow node body.
pub trait Action: Send {
    /// Role of this action in the graph.
    fn kind(&self) -> ActionKind {
        ActionKind::Operator
    }

    /// Short lowercase label used for generated node names.
    fn label(&self) -> &'static str;

    /// Declared output shape.
    fn output_shape(&self) -> OutputShape {
        OutputShape::Single
    }

    /// Runs the action over its shaped input.
    ///
    /// # Errors
    ///
    /// Propagates shape mismatches and the action's own failures.
    fn run(&mut self, input: ActionData, ctx: &mut RunContext) -> Result<ActionData>;
}

/// Lifts any [`Source`] into an [`Action`].
#[derive(Debug)]
pub struct SourceAction<S> {
    source: S,
}

impl<S: Source> SourceAction<S> {
    /// Wraps `source`.
    #[must_use]
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

impl<S: Source> Action for SourceAction<S> {
    fn kind(&self) -> ActionKind {
        ActionKind::Source
    }

    fn label(&self) -> &'static str {
        "source"
    }

    fn run(&mut self, input: ActionData, ctx: &mut RunContext) -> Result<ActionData> {
        input.expect_empty()?;
        self.source.set_progress(ctx.progress().clone());
        Ok(ActionData::Single(self.source.produce()?))
    }
}

/// Lifts any [`Sink`] into an [`Action`].
#[derive(Debug)]
pub struct SinkAction<S> {
    sink: S,
}

impl<S: Sink> SinkAction<S> {
    /// Wraps `sink`.
    #[must_use]
    pub fn new(sink: S) -> Self {
        Self { sink }
    }
}

impl<S: Sink> Action for SinkAction<S> {
    fn kind(&self) -> ActionKind {
        ActionKind::Sink
    }

    fn label(&self) -> &'static str {
        "sink"
    }

    fn output_shape(&self) -> OutputShape {
        OutputShape::Empty
    }

    fn run(&mut self, input: ActionData, ctx: &mut RunContext) -> Result<ActionData> {
        let data = input.into_single()?;
        self.sink.set_progress(ctx.progress().clone());
        self.sink.consume(&data)?;
        Ok(ActionData::Empty)
    }
}

impl Action for UnderfolderSource {
    fn kind(&self) -> ActionKind {
        ActionKind::Source
    }

    fn label(&self) -> &'static str {
        "underfolder"
    }

    fn run(&mut self, input: ActionData, ctx: &mut RunContext) -> Result<ActionData> {
        input.expect_empty()?;
        self.set_progress(ctx.progress().clone());
        Ok(ActionData::Single(self.produce()?))
    }
}

impl Action for UnderfolderSink {
    fn kind(&self) -> ActionKind {
        ActionKind::Sink
    }

    fn label(&self) -> &'static str {
        "underfolder"
    }

    fn output_shape(&self) -> OutputShape {
        OutputShape::Empty
    }

    fn run(&mut self, input: ActionData, ctx: &mut RunContext) -> Result<ActionData> {
        let data = input.into_single()?;
        self.set_progress(ctx.progress().clone());
        self.consume(&data)?;
        Ok(ActionData::Empty)
    }
}

impl Action for IdentityOp {
    fn label(&self) -> &'static str {
        "identity"
    }

    fn run(&mut self, input: ActionData, _ctx: &mut RunContext) -> Result<ActionData> {
        Ok(ActionData::Single(self.apply(&input.into_single()?)))
    }
}

impl Action for SliceOp {
    fn label(&self) -> &'static str {
        "slice"
    }

    fn run(&mut self, input: ActionData, _ctx: &mut RunContext) -> Result<ActionData> {
        Ok(ActionData::Single(self.apply(&input.into_single()?)?))
    }
}

impl Action for RepeatOp {
    fn label(&self) -> &'static str {
        "repeat"
    }

    fn run(&mut self, input: ActionData, _ctx: &mut RunContext) -> Result<ActionData> {
        Ok(ActionData::Single(self.apply(&input.into_single()?)))
    }
}

impl Action for CycleOp {
    fn label(&self) -> &'static str {
        "cycle"
    }

    fn run(&mut self, input: ActionData, _ctx: &mut RunContext) -> Result<ActionData> {
        Ok(ActionData::Single(self.apply(&input.into_single()?)))
    }
}

impl Action for ReverseOp {
    fn label(&self) -> &'static str {
        "reverse"
    }

    fn run(&mut self, input: ActionData, _ctx: &mut RunContext) -> Result<ActionData> {
        Ok(ActionData::Single(self.apply(&input.into_single()?)))
    }
}

impl Action for PadOp {
    fn label(&self) -> &'static str {
        "pad"
    }

    fn run(&mut self, input: ActionData, _ctx: &mut RunContext) -> Result<ActionData> {
        Ok(ActionData::Single(self.apply(&input.into_single()?)?))
    }
}

impl Action for IndexOp {
    fn label(&self) -> &'static str {
        "index"
    }

    fn run(&mut self, input: ActionData, _ctx: &mut RunContext) -> Result<ActionData> {
        Ok(ActionData::Single(self.apply(&input.into_single()?)?))
    }
}

impl Action for ShuffleOp {
    fn label(&self) -> &'static str {
        "shuffle"
    }

    fn run(&mut self, input: ActionData, _ctx: &mut RunContext) -> Result<ActionData> {
        Ok(ActionData::Single(self.apply(&input.into_single()?)))
    }
}

impl Action for BatchOp {
    fn label(&self) -> &'static str {
        "batch"
    }

    fn output_shape(&self) -> OutputShape {
        OutputShape::Seq
    }

    fn run(&mut self, input: ActionData, _ctx: &mut RunContext) -> Result<ActionData> {
        Ok(ActionData::Seq(self.apply(&input.into_single()?)?))
    }
}

impl Action for ChunkOp {
    fn label(&self) -> &'static str {
        "chunk"
    }

    fn output_shape(&self) -> OutputShape {
        OutputShape::Seq
    }

    fn run(&mut self, input: ActionData, _ctx: &mut RunContext) -> Result<ActionData> {
        Ok(ActionData::Seq(self.apply(&input.into_single()?)?))
    }
}

impl Action for SplitOp {
    fn label(&self) -> &'static str {
        "split"
    }

    fn output_shape(&self) -> OutputShape {
        OutputShape::Seq
    }

    fn run(&mut self, input: ActionData, _ctx: &mut RunContext) -> Result<ActionData> {
        Ok(ActionData::Seq(self.apply(&input.into_single()?)?))
    }
}

impl Action for CatOp {
    fn label(&self) -> &'static str {
        "cat"
    }

    fn run(&mut self, input: ActionData, _ctx: &mut RunContext) -> Result<ActionData> {
        Ok(ActionData::Single(self.apply(&input.into_seq()?)))
    }
}

impl Action for ZipOp {
    fn label(&self) -> &'static str {
        "zip"
    }

    fn run(&mut self, input: ActionData, _ctx: &mut RunContext) -> Result<ActionData> {
        Ok(ActionData::Single(self.apply(&input.into_seq()?)?))
    }
}

impl<M> Action for MapOp<M>
where
    M: Mapper + 'static,
{
    fn label(&self) -> &'static str {
        "map"
    }

    fn run(&mut self, input: ActionData, _ctx: &mut RunContext) -> Result<ActionData> {
        Ok(ActionData::Single(self.apply(&input.into_single()?)))
    }
}

impl<F> Action for FilterOp<F>
where
    F: Fn(usize, &Sample) -> Result<bool> + Send + Sync + 'static,
{
    fn label(&self) -> &'static str {
        "filter"
    }

    fn run(&mut self, input: ActionData, ctx: &mut RunContext) -> Result<ActionData> {
        let data = input.into_single()?;
        Ok(ActionData::Single(self.apply_with(&data, ctx.progress())?))
    }
}

impl<K, F> Action for SortOp<K, F>
where
    K: Ord + Send + 'static,
    F: Fn(usize, &Sample) -> Result<K> + Send + Sync + 'static,
{
    fn label(&self) -> &'static str {
        "sort"
    }

    fn run(&mut self, input: ActionData, ctx: &mut RunContext) -> Result<ActionData> {
        let data = input.into_single()?;
        Ok(ActionData::Single(self.apply_with(&data, ctx.progress())?))
    }
}

impl<F> Action for GroupByOp<F>
where
    F: Fn(usize, &Sample) -> Result<String> + Send + Sync + 'static,
{
    fn label(&self) -> &'static str {
        "groupby"
    }

    fn output_shape(&self) -> OutputShape {
        OutputShape::Map
    }

    fn run(&mut self, input: ActionData, ctx: &mut RunContext) -> Result<ActionData> {
        let data = input.into_single()?;
        Ok(ActionData::Map(self.apply_with(&data, ctx.progress())?))
    }
}

impl Action for ItemCacheOp {
    fn label(&self) -> &'static str {
        "item_cache"
    }

    fn run(&mut self, input: ActionData, _ctx: &mut RunContext) -> Result<ActionData> {
        Ok(ActionData::Single(self.apply(&input.into_single()?)))
    }
}

impl Action for CacheOp {
    fn label(&self) -> &'static str {
        "cache"
    }

    fn run(&mut self, input: ActionData, _ctx: &mut RunContext) -> Result<ActionData> {
        Ok(ActionData::Single(self.apply(&input.into_single()?)))
    }
}

impl Action for MemorizeEverythingOp {
    fn label(&self) -> &'static str {
        "memorize"
    }

    fn run(&mut self, input: ActionData, ctx: &mut RunContext) -> Result<ActionData> {
        let data = input.into_single()?;
        Ok(ActionData::Single(self.apply_with(&data, ctx.progress())?))
    }
}

#[cfg(test)]
mod test {
    use weir_core::ops::{ChunkOp, ReverseOp};
    use weir_core::{Data, Sample};

    use super::{Action, ActionData, ActionKind, OutputShape, RunContext};

    fn data(len: usize) -> Data {
        Data::from_samples((0..len).map(|_| Sample::typeless([])).collect())
    }

    #[test]
    fn operators_declare_single_shape_by_default() {
        let op = ReverseOp::new();
        assert_eq!(op.kind(), ActionKind::Operator);
        assert_eq!(op.output_shape(), OutputShape::Single);
    }

    #[test]
    fn run_checks_input_shape() {
        let mut op = ReverseOp::new();
        let err = op
            .run(ActionData::Empty, &mut RunContext::default())
            .unwrap_err();
        assert_eq!(err.kind(), weir_core::ErrorKind::Graph);
    }

    #[test]
    fn chunk_produces_seq() {
        let mut op = ChunkOp::new(2).unwrap();
        let out = op
            .run(ActionData::Single(data(5)), &mut RunContext::default())
            .unwrap();
        let parts = out.into_seq().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].len() + parts[1].len(), 5);
    }
}
