//! End-to-end workflow runs over on-disk letter datasets.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use weir::prelude::*;
use weir::workflow::UnderfolderCheckpoints;

fn write_letter_folder(root: &Path) {
    let data = root.join("data");
    fs::create_dir_all(&data).unwrap();
    for i in 0..26u8 {
        let letter = char::from(b'a' + i);
        let body = format!(r#"{{"letter": "{letter}"}}"#);
        fs::write(data.join(format!("{i:02}_metadata.json")), body).unwrap();
    }
}

fn letters_of(data: &Data) -> Vec<String> {
    data.iter()
        .map(|s| {
            let metadata = s.unwrap().value("metadata").unwrap();
            metadata.get("letter").unwrap().as_str().unwrap().to_owned()
        })
        .collect()
}

#[test]
fn repeat_and_slice_pipeline_produces_1300_samples() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in");
    let output = dir.path().join("out");
    write_letter_folder(&input);

    let mut wf = Workflow::new();
    let data = wf.source(UnderfolderSource::new(&input)).unwrap();
    let data = wf.op(RepeatOp::new(100, false), &data).unwrap();
    let data = wf
        .op(SliceOp::new(None, None, Some(2)).unwrap(), &data)
        .unwrap();
    wf.sink(UnderfolderSink::new(&output), &data).unwrap();

    SequentialExecutor::new().execute(&mut wf).unwrap();

    let written = UnderfolderSource::new(&output).produce().unwrap();
    assert_eq!(written.len(), 1300);
    // Striding by two over the repeated alphabet keeps only every other
    // letter.
    let letters = letters_of(&written);
    assert_eq!(&letters[..4], ["a", "c", "e", "g"]);
}

#[test]
fn split_and_cat_through_indexed_sockets() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in");
    let output = dir.path().join("out");
    write_letter_folder(&input);

    let mut wf = Workflow::new();
    let data = wf.source(UnderfolderSource::new(&input)).unwrap();
    let parts = wf
        .node(
            SplitOp::new(vec![SplitSize::Count(10), SplitSize::Count(16)]).unwrap(),
            &data,
        )
        .unwrap()
        .seq()
        .unwrap();
    // Swap the two halves.
    let merged = wf
        .node(CatOp::new(), Inputs::Seq(vec![parts.at(1), parts.at(0)]))
        .unwrap()
        .single()
        .unwrap();
    wf.sink(UnderfolderSink::new(&output), &merged).unwrap();

    SequentialExecutor::new().execute(&mut wf).unwrap();

    let written = UnderfolderSource::new(&output).produce().unwrap();
    let letters = letters_of(&written);
    assert_eq!(written.len(), 26);
    assert_eq!(letters[0], "k");
    assert_eq!(letters[16], "a");
}

#[test]
fn checkpoints_materialize_and_are_destroyed_on_clean_runs() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in");
    let output = dir.path().join("out");
    let checkpoints = dir.path().join("ckpt");
    write_letter_folder(&input);

    let mut wf = Workflow::new();
    let data = wf.source(UnderfolderSource::new(&input)).unwrap();
    let data = wf
        .node_named(
            ReverseOp::new(),
            "reversed",
            NodeOptions::new().checkpoint(true).destroy_checkpoint(false),
            Inputs::One(data),
        )
        .unwrap()
        .single()
        .unwrap();
    wf.sink(UnderfolderSink::new(&output), &data).unwrap();

    let mut executor = SequentialExecutor::new()
        .with_checkpoint_factory(UnderfolderCheckpoints::new(&checkpoints));
    executor.execute(&mut wf).unwrap();

    // The checkpoint was kept (destroy = false) and holds the node output.
    let executions: Vec<_> = fs::read_dir(&checkpoints).unwrap().collect();
    assert_eq!(executions.len(), 1);
    let execution = executions[0].as_ref().unwrap().path();
    let ckpt = UnderfolderSource::new(execution.join("reversed"))
        .produce()
        .unwrap();
    assert_eq!(letters_of(&ckpt)[0], "z");

    let written = UnderfolderSource::new(&output).produce().unwrap();
    assert_eq!(letters_of(&written)[0], "z");
}

#[test]
fn destroyed_checkpoints_vanish_after_clean_run() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in");
    let output = dir.path().join("out");
    let checkpoints = dir.path().join("ckpt");
    write_letter_folder(&input);

    let mut wf = Workflow::new();
    let data = wf.source(UnderfolderSource::new(&input)).unwrap();
    let data = wf
        .node_named(
            ReverseOp::new(),
            "reversed",
            NodeOptions::new().checkpoint(true),
            Inputs::One(data),
        )
        .unwrap()
        .single()
        .unwrap();
    wf.sink(UnderfolderSink::new(&output), &data).unwrap();

    let mut executor = SequentialExecutor::new()
        .with_checkpoint_factory(UnderfolderCheckpoints::new(&checkpoints));
    executor.execute(&mut wf).unwrap();

    let execution = fs::read_dir(&checkpoints).unwrap().next().unwrap().unwrap();
    assert!(!execution.path().join("reversed").exists());
}

#[test]
fn failing_sink_keeps_partial_checkpoints() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in");
    let occupied = dir.path().join("occupied");
    let checkpoints = dir.path().join("ckpt");
    write_letter_folder(&input);
    fs::create_dir_all(&occupied).unwrap();
    fs::write(occupied.join("collision.txt"), "x").unwrap();

    let mut wf = Workflow::new();
    let data = wf.source(UnderfolderSource::new(&input)).unwrap();
    let data = wf
        .node_named(
            ReverseOp::new(),
            "reversed",
            NodeOptions::new().checkpoint(true),
            Inputs::One(data),
        )
        .unwrap()
        .single()
        .unwrap();
    // The default overwrite policy refuses the occupied folder.
    wf.sink(UnderfolderSink::new(&occupied), &data).unwrap();

    let mut executor = SequentialExecutor::new()
        .with_checkpoint_factory(UnderfolderCheckpoints::new(&checkpoints));
    let err = executor.execute(&mut wf).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Policy);

    // Even with destroy defaulting to true, the failure keeps the
    // checkpoint for diagnosis.
    let execution = fs::read_dir(&checkpoints).unwrap().next().unwrap().unwrap();
    assert!(execution.path().join("reversed").is_dir());
}

#[test]
fn cached_nodes_materialize_once_per_index() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in");
    write_letter_folder(&input);

    let materializations = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&materializations);

    struct Capture {
        out: Arc<Mutex<Option<Data>>>,
    }

    impl Action for Capture {
        fn kind(&self) -> ActionKind {
            ActionKind::Sink
        }

        fn label(&self) -> &'static str {
            "capture"
        }

        fn output_shape(&self) -> OutputShape {
            OutputShape::Empty
        }

        fn run(&mut self, input: ActionData, _ctx: &mut RunContext) -> weir::Result<ActionData> {
            *self.out.lock().unwrap() = Some(input.into_single()?);
            Ok(ActionData::Empty)
        }
    }

    let captured = Arc::new(Mutex::new(None));
    let mut wf = Workflow::new();
    let data = wf.source(UnderfolderSource::new(&input)).unwrap();
    let data = wf
        .op(
            MapOp::new(move |_: usize, sample: Sample| {
                let _ = counter.fetch_add(1, Ordering::SeqCst);
                Ok(sample)
            }),
            &data,
        )
        .unwrap();
    let data = wf
        .node_named(
            IdentityOp::new(),
            "cached",
            NodeOptions::new().cache(CachePolicy::Memo),
            Inputs::One(data),
        )
        .unwrap()
        .single()
        .unwrap();
    wf.sink(
        Capture {
            out: Arc::clone(&captured),
        },
        &data,
    )
    .unwrap();

    SequentialExecutor::new().execute(&mut wf).unwrap();

    let cached = captured.lock().unwrap().clone().unwrap();
    for _ in 0..3 {
        for i in 0..cached.len() {
            let _ = cached.get(i).unwrap();
        }
    }
    assert_eq!(materializations.load(Ordering::SeqCst), 26);
}

#[test]
fn executor_emits_task_events() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in");
    let output = dir.path().join("out");
    write_letter_folder(&input);

    let mut wf = Workflow::new();
    let data = wf.source(UnderfolderSource::new(&input)).unwrap();
    let data = wf
        .node_named(
            FilterOp::new(|_, _: &Sample| Ok(true), false),
            "keep_all",
            NodeOptions::new(),
            Inputs::One(data),
        )
        .unwrap()
        .single()
        .unwrap();
    wf.node_named(
        UnderfolderSink::new(&output),
        "writer",
        NodeOptions::new(),
        Inputs::One(data),
    )
    .unwrap();

    let queue: Arc<dyn EventQueue> = Arc::new(InMemoryEventQueue::new());
    let mut executor = SequentialExecutor::new();
    executor.attach(Arc::clone(&queue)).unwrap();
    executor.execute(&mut wf).unwrap();
    executor.detach().unwrap();
    queue.close();

    let mut events = Vec::new();
    while let Some(event) = queue.capture() {
        events.push(event);
    }

    let starts: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            Event::TaskStart { task, total } => Some((task.as_str(), *total)),
            _ => None,
        })
        .collect();
    assert!(starts.contains(&("keep_all/filter", 26)));
    assert!(starts.contains(&("writer/write", 26)));

    let updates = events
        .iter()
        .filter(|e| matches!(e, Event::TaskUpdate { task, .. } if task == "writer/write"))
        .count();
    assert_eq!(updates, 26);
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::TaskComplete { task } if task == "keep_all/filter")));
}

#[test]
fn tracker_follows_a_run() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in");
    let output = dir.path().join("out");
    write_letter_folder(&input);

    let mut wf = Workflow::new();
    let data = wf.source(UnderfolderSource::new(&input)).unwrap();
    wf.sink(
        UnderfolderSink::new(&output).with_grabber(Grabber::new(2)),
        &data,
    )
    .unwrap();

    let queue: Arc<dyn EventQueue> = Arc::new(InMemoryEventQueue::new());
    let mut tracker = ProgressTracker::new()
        .with_refresh(Duration::from_millis(5))
        .hidden();
    tracker.attach(Arc::clone(&queue)).unwrap();

    let mut executor = SequentialExecutor::new();
    executor.attach(Arc::clone(&queue)).unwrap();
    executor.execute(&mut wf).unwrap();

    std::thread::sleep(Duration::from_millis(50));
    tracker.detach().unwrap();
    assert!(queue.capture().is_none());
    assert_eq!(UnderfolderSource::new(&output).produce().unwrap().len(), 26);
}

#[test]
fn groupby_publishes_keyed_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in");
    let vowels_out = dir.path().join("vowels");
    write_letter_folder(&input);

    let mut wf = Workflow::new();
    let data = wf.source(UnderfolderSource::new(&input)).unwrap();
    let groups = wf
        .node(
            GroupByOp::new(|_, s: &Sample| {
                let metadata = s.value("metadata")?;
                let letter = metadata.get("letter").unwrap().as_str().unwrap().to_owned();
                Ok(if "aeiou".contains(&letter) {
                    "vowel".to_owned()
                } else {
                    "consonant".to_owned()
                })
            }),
            &data,
        )
        .unwrap()
        .map()
        .unwrap();
    wf.sink(UnderfolderSink::new(&vowels_out), &groups.key("vowel"))
        .unwrap();

    SequentialExecutor::new().execute(&mut wf).unwrap();

    let vowels = UnderfolderSource::new(&vowels_out).produce().unwrap();
    assert_eq!(letters_of(&vowels), ["a", "e", "i", "o", "u"]);
}
