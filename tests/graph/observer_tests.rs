use std::sync::Arc;

use kernelflow::{Domain, EventRecorder, GraphEvent};

use super::helpers::{i32_input, setup, PoisonKernel};

#[test]
fn test_recorder_sees_closures_in_execution_order() {
    let (ctx, kernels) = setup();
    let recorder = EventRecorder::new();
    ctx.subscribe(recorder.clone());

    let mut builder = ctx.builder();
    let input = builder.add_input();
    let a = builder
        .add_kernel(kernels.increment, Domain::x(2), vec![input.into()], vec![])
        .unwrap();
    let b = builder
        .add_kernel(kernels.double, Domain::x(2), vec![a.get_return().into()], vec![])
        .unwrap();
    let graph = builder.create([b.get_return()]).unwrap();

    graph.execute(&[i32_input(&[1, 2])]).unwrap();
    assert_eq!(recorder.closure_order(), vec![a.id(), b.id()]);

    let events = recorder.events();
    assert!(matches!(
        events.first(),
        Some(GraphEvent::ExecutionStarted { inputs: 1, .. })
    ));
    assert!(matches!(
        events.last(),
        Some(GraphEvent::ExecutionFinished { outputs: 1, .. })
    ));
    let finished = events
        .iter()
        .filter(|e| matches!(e, GraphEvent::ClosureFinished { .. }))
        .count();
    assert_eq!(finished, 2);
}

#[test]
fn test_rejected_inputs_emit_nothing() {
    let (ctx, kernels) = setup();
    let recorder = EventRecorder::new();
    ctx.subscribe(recorder.clone());

    let mut builder = ctx.builder();
    let input = builder.add_input();
    let c = builder
        .add_kernel(kernels.double, Domain::x(2), vec![input.into()], vec![])
        .unwrap();
    let graph = builder.create([c.get_return()]).unwrap();

    assert!(graph.execute(&[]).is_err());
    assert!(recorder.events().is_empty());
}

#[test]
fn test_failure_events() {
    let (ctx, kernels) = setup();
    let poison = ctx.register_kernel(Arc::new(PoisonKernel { poison: 0 }));
    let recorder = EventRecorder::new();
    ctx.subscribe(recorder.clone());

    let mut builder = ctx.builder();
    let input = builder.add_input();
    let failing = builder
        .add_kernel(poison, Domain::x(2), vec![input.into()], vec![])
        .unwrap();
    let after = builder
        .add_kernel(kernels.double, Domain::x(2), vec![failing.get_return().into()], vec![])
        .unwrap();
    let graph = builder.create([after.get_return()]).unwrap();

    assert!(graph.execute(&[i32_input(&[0, 1])]).is_err());
    let events = recorder.events();
    assert!(events.iter().any(|e| matches!(
        e,
        GraphEvent::ClosureFailed { closure, kernel, .. } if *closure == failing.id() && kernel == "poison"
    )));
    assert!(matches!(events.last(), Some(GraphEvent::ExecutionFailed { .. })));
    // The closure after the failing one never started.
    assert_eq!(recorder.closure_order(), vec![failing.id()]);
}

#[test]
fn test_batch_events_and_serialization() {
    let (ctx, kernels) = setup();
    let recorder = EventRecorder::new();
    ctx.subscribe(recorder.clone());

    let sum_input = ctx.kernel(kernels.sum).unwrap().field("input").unwrap();
    let mut builder = ctx.builder();
    let input = builder.add_input();
    let doubled = builder
        .add_kernel(kernels.double, Domain::x(2), vec![input.into()], vec![])
        .unwrap();
    let total = builder
        .add_invoke(kernels.sum, vec![], vec![(sum_input, doubled.get_return().into())])
        .unwrap();
    let graph = builder
        .create([total.get_global("total").unwrap()])
        .unwrap();
    graph.execute(&[i32_input(&[1, 1])]).unwrap();

    let batches: Vec<usize> = recorder
        .events()
        .iter()
        .filter_map(|e| match e {
            GraphEvent::BatchStarted { batch, .. } => Some(*batch),
            _ => None,
        })
        .collect();
    assert_eq!(batches, vec![0, 1]);

    let json = serde_json::to_value(recorder.events()).unwrap();
    assert_eq!(json[0]["type"], "execution_started");
    assert_eq!(json[0]["graph_name"], graph.name());
}
