use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::*;
use crate::error::{DispatchError, StepFault};

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Finished(Value),
    Failed(StepFault),
}

type Events = Arc<Mutex<Vec<Event>>>;

fn recorder(line: &str) -> (RunContext, Events) {
    let events: Events = Arc::new(Mutex::new(Vec::new()));
    let (on_finish, on_error) = (events.clone(), events.clone());
    let ctx = RunContext::new(
        line,
        line.len(),
        move |_, v| on_finish.lock().unwrap().push(Event::Finished(v)),
        move |_, e| on_error.lock().unwrap().push(Event::Failed(e)),
    );
    (ctx, events)
}

fn events(events: &Events) -> Vec<Event> {
    events.lock().unwrap().clone()
}

fn append(suffix: &'static str) -> StepSpec {
    StepSpec::Func(step(move |_: &mut RunContext, v: Value| {
        let s = v.as_str().unwrap_or_default();
        Ok(Flow::value(format!("{s}{suffix}")))
    }))
}

fn counted(counter: &Arc<AtomicUsize>, flow: Flow) -> StepSpec {
    let counter = counter.clone();
    StepSpec::Func(step(move |_: &mut RunContext, v: Value| {
        counter.fetch_add(1, Ordering::SeqCst);
        match &flow {
            Flow::Continue(_) => Ok(Flow::Continue(v)),
            other => Ok(other.clone()),
        }
    }))
}

fn failing(msg: &'static str) -> StepSpec {
    StepSpec::Func(step(move |_: &mut RunContext, _: Value| Err(StepFault::step(msg))))
}

fn pass() -> Flow {
    Flow::Continue(Value::Null)
}

#[test]
fn test_steps_compose_in_order() {
    let mut engine = Engine::new();
    engine.set_pipeline(vec![append("a"), append("b"), append("c")]);

    let (ctx, log) = recorder("x");
    engine.start(ctx, Value::from("x"));

    assert_eq!(events(&log), vec![Event::Finished(Value::from("xabc"))]);
}

#[test]
fn test_empty_pipeline_finishes_with_input() {
    let mut engine = Engine::new();
    engine.set_pipeline(Vec::new());

    let (ctx, log) = recorder("x");
    engine.start(ctx, Value::from("x"));

    assert_eq!(events(&log), vec![Event::Finished(Value::from("x"))]);
}

#[test]
fn test_skip_suppresses_callbacks_at_any_position() {
    for position in 0..3 {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut steps: Vec<StepSpec> = (0..3).map(|_| counted(&counter, pass())).collect();
        steps[position] = counted(&counter, Flow::Skip);

        let mut engine = Engine::new();
        engine.set_pipeline(steps);
        let (ctx, log) = recorder("x");
        engine.start(ctx, Value::from("x"));

        assert!(events(&log).is_empty(), "skip at {position} must not call back");
        assert_eq!(counter.load(Ordering::SeqCst), position + 1);
    }
}

#[test]
fn test_done_finishes_immediately() {
    let before = Arc::new(AtomicUsize::new(0));
    let after = Arc::new(AtomicUsize::new(0));

    let mut engine = Engine::new();
    engine.set_pipeline(vec![
        counted(&before, pass()),
        counted(&before, Flow::Done(true)),
        counted(&after, pass()),
    ]);

    let (ctx, log) = recorder("x");
    engine.start(ctx, Value::from("x"));

    assert_eq!(events(&log), vec![Event::Finished(Value::Bool(true))]);
    assert_eq!(before.load(Ordering::SeqCst), 2);
    assert_eq!(after.load(Ordering::SeqCst), 0);
}

#[test]
fn test_first_fault_aborts_chain() {
    let before = Arc::new(AtomicUsize::new(0));
    let after = Arc::new(AtomicUsize::new(0));

    let mut engine = Engine::new();
    engine.set_pipeline(vec![
        counted(&before, pass()),
        failing("boom"),
        counted(&after, pass()),
        counted(&after, pass()),
    ]);

    let (ctx, log) = recorder("x");
    engine.start(ctx, Value::from("x"));

    assert_eq!(events(&log), vec![Event::Failed(StepFault::Step("boom".into()))]);
    assert_eq!(before.load(Ordering::SeqCst), 1);
    assert_eq!(after.load(Ordering::SeqCst), 0);
}

#[test]
fn test_step_count_tracks_invocations() {
    let counts = Arc::new(Mutex::new(Vec::new()));
    let seen = counts.clone();

    let mut engine = Engine::new();
    engine.set_pipeline(vec![append("a"), append("b"), append("c")]);

    let ctx = RunContext::new(
        "x",
        1,
        move |ctx, _| seen.lock().unwrap().push((ctx.step_count(), ctx.remaining_steps())),
        |_, _| {},
    );
    engine.start(ctx, Value::from("x"));

    assert_eq!(*counts.lock().unwrap(), vec![(3, 0)]);
}

#[test]
fn test_branch_tries_alternatives_in_order() {
    let third = Arc::new(AtomicUsize::new(0));
    let inputs = Arc::new(Mutex::new(Vec::new()));
    let seen = inputs.clone();

    let record = StepSpec::Func(step(move |_: &mut RunContext, v: Value| {
        seen.lock().unwrap().push(v.clone());
        Ok(Flow::Continue(v))
    }));

    let mut engine = Engine::new();
    engine.set_pipeline(vec![StepSpec::Func(branch(vec![
        vec![StepSpec::Func(null())],
        vec![record, append("-b")],
        vec![counted(&third, pass())],
    ]))]);

    let (ctx, log) = recorder("x");
    engine.start(ctx, Value::from("x"));

    assert_eq!(events(&log), vec![Event::Finished(Value::from("x-b"))]);
    assert_eq!(*inputs.lock().unwrap(), vec![Value::from("x")]);
    assert_eq!(third.load(Ordering::SeqCst), 0);
}

#[test]
fn test_branch_treats_false_as_no_match() {
    let mut engine = Engine::new();
    engine.set_pipeline(vec![StepSpec::Func(branch(vec![
        vec![StepSpec::Func(always_false())],
        vec![append("-second")],
    ]))]);

    let (ctx, log) = recorder("x");
    engine.start(ctx, Value::from("x"));

    assert_eq!(events(&log), vec![Event::Finished(Value::from("x-second"))]);
}

#[test]
fn test_branch_with_no_match_skips() {
    let after = Arc::new(AtomicUsize::new(0));

    let mut engine = Engine::new();
    engine.set_pipeline(vec![
        StepSpec::Func(branch(vec![
            vec![StepSpec::Func(null())],
            vec![StepSpec::Func(always_false())],
        ])),
        counted(&after, pass()),
    ]);

    let (ctx, log) = recorder("x");
    engine.start(ctx, Value::from("x"));

    assert!(events(&log).is_empty());
    assert_eq!(after.load(Ordering::SeqCst), 0);
}

#[test]
fn test_branch_true_is_a_result() {
    let mut engine = Engine::new();
    engine.set_pipeline(vec![StepSpec::Func(branch(vec![vec![StepSpec::Func(
        always_true(),
    )]]))]);

    let (ctx, log) = recorder("x");
    engine.start(ctx, Value::from("x"));

    assert_eq!(events(&log), vec![Event::Finished(Value::Bool(true))]);
}

#[test]
fn test_branch_propagates_fault() {
    let untried = Arc::new(AtomicUsize::new(0));

    let mut engine = Engine::new();
    engine.set_pipeline(vec![StepSpec::Func(branch(vec![
        vec![failing("alt failed")],
        vec![counted(&untried, pass())],
    ]))]);

    let (ctx, log) = recorder("x");
    engine.start(ctx, Value::from("x"));

    assert_eq!(events(&log), vec![Event::Failed(StepFault::Step("alt failed".into()))]);
    assert_eq!(untried.load(Ordering::SeqCst), 0);
}

#[test]
fn test_nested_context_changes_stay_nested() {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let seen = lines.clone();

    let mutate = StepSpec::Func(step(|ctx: &mut RunContext, v: Value| {
        ctx.line.push_str(" changed");
        Ok(Flow::Continue(v))
    }));
    let observe = StepSpec::Func(step(move |ctx: &mut RunContext, v: Value| {
        seen.lock().unwrap().push(ctx.line.clone());
        Ok(Flow::Continue(v))
    }));

    let mut engine = Engine::new();
    engine.set_pipeline(vec![StepSpec::Func(branch(vec![vec![mutate]])), observe]);

    let (ctx, _log) = recorder("line");
    engine.start(ctx, Value::from("x"));

    assert_eq!(*lines.lock().unwrap(), vec!["line".to_string()]);
}

#[test]
fn test_check_gates_chain() {
    let mut engine = Engine::new();
    engine.set_pipeline(vec![
        StepSpec::Func(check(|ctx, _| ctx.line.starts_with(':'))),
        append("!"),
    ]);

    let (ctx, log) = recorder(":e");
    engine.start(ctx, Value::from("ok"));
    assert_eq!(events(&log), vec![Event::Finished(Value::from("ok!"))]);

    let (ctx, log) = recorder("/search");
    engine.start(ctx, Value::from("ok"));
    assert_eq!(events(&log), vec![Event::Finished(Value::Bool(false))]);
}

#[test]
fn test_map_joins_positionally() {
    let mut engine = Engine::new();
    engine.set_pipeline(vec![StepSpec::Func(map(vec![
        vec![append("-1")],
        vec![append("-2"), append("-3")],
    ]))]);

    let (ctx, log) = recorder("x");
    engine.start(ctx, Value::from("x"));

    assert_eq!(
        events(&log),
        vec![Event::Finished(Value::List(vec![
            Value::from("x-1"),
            Value::from("x-2-3"),
        ]))]
    );
}

#[test]
fn test_map_skips_when_any_pipeline_skips() {
    let mut engine = Engine::new();
    engine.set_pipeline(vec![StepSpec::Func(map(vec![
        vec![append("-1")],
        vec![StepSpec::Func(null())],
    ]))]);

    let (ctx, log) = recorder("x");
    engine.start(ctx, Value::from("x"));

    assert!(events(&log).is_empty());
}

#[test]
fn test_named_steps_resolve_through_host() {
    let mut engine = Engine::new();
    engine.expose(
        "shout",
        step(|_: &mut RunContext, v: Value| {
            Ok(Flow::value(v.as_str().unwrap_or_default().to_uppercase()))
        }),
    );
    engine.set_pipeline(vec![append("a"), StepSpec::named("shout")]);

    let (ctx, log) = recorder("x");
    engine.start(ctx, Value::from("x"));

    assert_eq!(events(&log), vec![Event::Finished(Value::from("XA"))]);
}

#[test]
fn test_unresolved_name_is_dispatch_fault() {
    let after = Arc::new(AtomicUsize::new(0));

    let mut engine = Engine::new();
    engine.set_pipeline(vec![StepSpec::named("missing"), counted(&after, pass())]);

    let (ctx, log) = recorder("x");
    engine.start(ctx, Value::from("x"));

    assert_eq!(
        events(&log),
        vec![Event::Failed(StepFault::Dispatch(DispatchError::UnresolvedName(
            "missing".into()
        )))]
    );
    assert_eq!(after.load(Ordering::SeqCst), 0);
}

#[test]
fn test_call_unknown_handle() {
    let engine = Engine::new();
    let (mut ctx, _log) = recorder("x");
    let result = engine.call(&StepRef::Indexed(Handle::from_raw(99)), &mut ctx, Value::Null);

    assert_eq!(
        result,
        Err(StepFault::Dispatch(DispatchError::UnknownHandle(Handle::from_raw(99))))
    );
}

#[test]
fn test_set_pipeline_assigns_handles_in_order() {
    let mut engine = Engine::new();
    engine.set_pipeline(vec![append("a"), StepSpec::named("host"), append("b")]);

    assert_eq!(
        engine.pipeline(),
        &[
            StepRef::Indexed(Handle::from_raw(1)),
            StepRef::Named("host".into()),
            StepRef::Indexed(Handle::from_raw(2)),
        ]
    );
}

#[test]
fn test_set_pipeline_is_idempotent() {
    let specs = vec![append("a"), append("b")];
    let mut engine = Engine::new();

    engine.set_pipeline(specs.clone());
    let first_generation = engine.generation();
    let (ctx, first) = recorder("x");
    engine.start(ctx, Value::from("x"));

    engine.set_pipeline(specs);
    let (ctx, second) = recorder("x");
    engine.start(ctx, Value::from("x"));

    assert_eq!(events(&first), events(&second));
    assert_eq!(engine.generation(), first_generation + 1);
}

#[test]
fn test_register_and_unregister() {
    let mut engine = Engine::new();
    engine.set_pipeline(vec![append("a")]);

    let extra = engine.register_func(step(|_: &mut RunContext, v: Value| Ok(Flow::Continue(v))));
    assert_eq!(extra, Handle::from_raw(2));

    let (mut ctx, _log) = recorder("x");
    let result = engine.call(&StepRef::Indexed(extra), &mut ctx, Value::from("y"));
    assert_eq!(result, Ok(Flow::Continue(Value::from("y"))));

    assert!(engine.unregister_func(extra).is_ok());
    assert_eq!(
        engine.unregister_func(extra).err(),
        Some(DispatchError::UnknownHandle(extra))
    );
}

#[test]
fn test_unregister_active_handle_is_refused() {
    let mut engine = Engine::new();
    engine.set_pipeline(vec![append("a")]);

    let active = Handle::from_raw(1);
    assert_eq!(
        engine.unregister_func(active).err(),
        Some(DispatchError::HandleInUse(active))
    );

    let (ctx, log) = recorder("x");
    engine.start(ctx, Value::from("x"));
    assert_eq!(events(&log), vec![Event::Finished(Value::from("xa"))]);
}

#[test]
fn test_default_pipeline_installed_on_start() {
    let mut engine = Engine::new().with_default(|| vec![append("-default")]);
    assert!(!engine.is_installed());

    let (ctx, log) = recorder("x");
    engine.start(ctx, Value::from("x"));

    assert!(engine.is_installed());
    assert_eq!(events(&log), vec![Event::Finished(Value::from("x-default"))]);
}

#[test]
fn test_registering_before_start_keeps_default_pipeline() {
    let mut engine = Engine::new().with_default(|| vec![append("!")]);
    let identity = engine.register_func(step(|_: &mut RunContext, v: Value| Ok(Flow::Continue(v))));
    assert!(!engine.is_installed());

    let (ctx, log) = recorder("x");
    engine.start(ctx, Value::from("x"));

    assert!(engine.is_installed());
    assert_eq!(events(&log), vec![Event::Finished(Value::from("x!"))]);
    // still callable after the default went in
    let mut ctx = recorder("y").0;
    assert_eq!(
        engine.call(&StepRef::Indexed(identity), &mut ctx, Value::from("y")),
        Ok(Flow::Continue(Value::from("y")))
    );
}

type Slot = Arc<Mutex<Option<Deferred>>>;

fn deferring(slot: &Slot) -> StepSpec {
    let slot = slot.clone();
    StepSpec::Func(step(move |ctx: &mut RunContext, _: Value| {
        *slot.lock().unwrap() = Some(ctx.defer()?);
        Ok(Flow::Skip)
    }))
}

#[test]
fn test_deferred_run_resumes_remaining_steps() {
    let slot: Slot = Arc::new(Mutex::new(None));

    let mut engine = Engine::new();
    engine.set_pipeline(vec![append("a"), deferring(&slot), append("c")]);

    let (ctx, log) = recorder("x");
    engine.start(ctx, Value::from("x"));
    assert!(events(&log).is_empty());

    let deferred = slot.lock().unwrap().take().unwrap();
    assert!(!deferred.is_stale());
    deferred.resolve(Value::from("later"));

    assert_eq!(events(&log), vec![Event::Finished(Value::from("laterc"))]);
}

#[test]
fn test_deferring_step_result_is_discarded() {
    let slot: Slot = Arc::new(Mutex::new(None));
    let after = Arc::new(AtomicUsize::new(0));
    let eager = {
        let slot = slot.clone();
        StepSpec::Func(step(move |ctx: &mut RunContext, _: Value| {
            *slot.lock().unwrap() = Some(ctx.defer()?);
            Ok(Flow::value("x"))
        }))
    };

    let mut engine = Engine::new();
    engine.set_pipeline(vec![eager, counted(&after, pass())]);

    let (ctx, log) = recorder("x");
    engine.start(ctx, Value::from("x"));
    assert!(events(&log).is_empty());
    assert_eq!(after.load(Ordering::SeqCst), 0);

    slot.lock().unwrap().take().unwrap().resolve(Value::from("y"));

    assert_eq!(events(&log), vec![Event::Finished(Value::from("y"))]);
    assert_eq!(after.load(Ordering::SeqCst), 1);
}

#[test]
fn test_deferring_step_returning_done_is_discarded() {
    let slot: Slot = Arc::new(Mutex::new(None));
    let eager = {
        let slot = slot.clone();
        StepSpec::Func(step(move |ctx: &mut RunContext, _: Value| {
            *slot.lock().unwrap() = Some(ctx.defer()?);
            Ok(Flow::Done(true))
        }))
    };

    let mut engine = Engine::new();
    engine.set_pipeline(vec![eager]);

    let (ctx, log) = recorder("x");
    engine.start(ctx, Value::from("x"));
    assert!(events(&log).is_empty());

    slot.lock().unwrap().take().unwrap().resolve(Value::from("y"));
    assert_eq!(events(&log), vec![Event::Finished(Value::from("y"))]);
}

#[test]
fn test_run_delivers_once_when_deferred_twice() {
    let slot: Arc<Mutex<Vec<Deferred>>> = Arc::new(Mutex::new(Vec::new()));
    let twice = {
        let slot = slot.clone();
        StepSpec::Func(step(move |ctx: &mut RunContext, _: Value| {
            let mut held = slot.lock().unwrap();
            held.push(ctx.defer()?);
            held.push(ctx.defer()?);
            Ok(Flow::Skip)
        }))
    };

    let mut engine = Engine::new();
    engine.set_pipeline(vec![twice]);

    let (ctx, log) = recorder("x");
    engine.start(ctx, Value::from("x"));

    let mut held = std::mem::take(&mut *slot.lock().unwrap());
    let second = held.pop().unwrap();
    let first = held.pop().unwrap();
    first.resolve(Value::from("a"));
    assert!(second.is_stale());
    second.reject(StepFault::step("too late"));

    assert_eq!(events(&log), vec![Event::Finished(Value::from("a"))]);
}

#[test]
fn test_deferred_reject_reports_fault() {
    let slot: Slot = Arc::new(Mutex::new(None));

    let mut engine = Engine::new();
    engine.set_pipeline(vec![deferring(&slot), append("c")]);

    let (ctx, log) = recorder("x");
    engine.start(ctx, Value::from("x"));

    let deferred = slot.lock().unwrap().take().unwrap();
    deferred.reject(StepFault::step("listing failed"));

    assert_eq!(events(&log), vec![Event::Failed(StepFault::Step("listing failed".into()))]);
}

#[test]
fn test_superseded_run_is_dropped() {
    let slot: Slot = Arc::new(Mutex::new(None));

    let mut engine = Engine::new();
    engine.set_pipeline(vec![deferring(&slot), append("!")]);

    let (ctx, old_log) = recorder("x");
    engine.start(ctx, Value::from("x"));
    let old = slot.lock().unwrap().take().unwrap();

    let (ctx, new_log) = recorder("xy");
    engine.start(ctx, Value::from("xy"));
    let new = slot.lock().unwrap().take().unwrap();

    assert!(old.is_stale());
    old.resolve(Value::from("old"));
    new.resolve(Value::from("new"));

    assert!(events(&old_log).is_empty());
    assert_eq!(events(&new_log), vec![Event::Finished(Value::from("new!"))]);
}

#[test]
fn test_reinstall_invalidates_deferred_run() {
    let slot: Slot = Arc::new(Mutex::new(None));

    let mut engine = Engine::new();
    engine.set_pipeline(vec![deferring(&slot), append("!")]);

    let (ctx, log) = recorder("x");
    engine.start(ctx, Value::from("x"));
    let deferred = slot.lock().unwrap().take().unwrap();

    engine.set_pipeline(vec![append("?")]);
    assert!(deferred.is_stale());
    deferred.resolve(Value::from("late"));

    assert!(events(&log).is_empty());
}

#[test]
fn test_defer_inside_branch_is_a_fault() {
    let slot: Slot = Arc::new(Mutex::new(None));

    let mut engine = Engine::new();
    engine.set_pipeline(vec![StepSpec::Func(branch(vec![vec![deferring(&slot)]]))]);

    let (ctx, log) = recorder("x");
    engine.start(ctx, Value::from("x"));

    assert_eq!(
        events(&log),
        vec![Event::Failed(StepFault::Step(
            "cannot defer inside a nested pipeline".into()
        ))]
    );
}

#[test]
fn test_deadline_expires_between_steps() {
    let after = Arc::new(AtomicUsize::new(0));
    let slow = StepSpec::Func(step(|_: &mut RunContext, v: Value| {
        std::thread::sleep(Duration::from_millis(20));
        Ok(Flow::Continue(v))
    }));

    let mut engine = Engine::new().with_deadline(Some(Duration::from_millis(5)));
    engine.set_pipeline(vec![slow, counted(&after, pass())]);

    let (ctx, log) = recorder("x");
    engine.start(ctx, Value::from("x"));

    let events = events(&log);
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], Event::Failed(StepFault::Timeout { .. })));
    assert_eq!(after.load(Ordering::SeqCst), 0);
}

#[test]
fn test_deadline_applies_on_resume() {
    let slot: Slot = Arc::new(Mutex::new(None));

    let mut engine = Engine::new();
    engine.set_pipeline(vec![deferring(&slot)]);

    let (ctx, log) = recorder("x");
    engine.start(ctx.with_deadline(Duration::from_millis(5)), Value::from("x"));

    std::thread::sleep(Duration::from_millis(20));
    slot.lock().unwrap().take().unwrap().resolve(Value::from("late"));

    let events = events(&log);
    assert!(matches!(events.as_slice(), [Event::Failed(StepFault::Timeout { .. })]));
}
