use std::thread;

use kernelflow::{Domain, Graph};

use super::helpers::{i32_input, i32_output, setup};

fn assert_send_sync<T: Send + Sync>() {}

#[test]
fn test_graph_is_send_and_sync() {
    assert_send_sync::<Graph>();
    assert_send_sync::<kernelflow::Context>();
}

#[test]
fn test_concurrent_executions_are_independent() {
    let (ctx, kernels) = setup();
    let mut builder = ctx.builder();
    let input = builder.add_input();
    let inc = builder
        .add_kernel(kernels.increment, Domain::x(3), vec![input.into()], vec![])
        .unwrap();
    let dbl = builder
        .add_kernel(kernels.double, Domain::x(3), vec![inc.get_return().into()], vec![])
        .unwrap();
    let graph = builder.create([dbl.get_return()]).unwrap();

    thread::scope(|scope| {
        for worker in 0..4 {
            let graph = &graph;
            scope.spawn(move || {
                for round in 0..25 {
                    let base = worker * 100 + round;
                    let out = graph.execute(&[i32_input(&[base, base + 1, -base])]).unwrap();
                    assert_eq!(
                        i32_output(&out[0]),
                        vec![(base + 1) * 2, (base + 2) * 2, (1 - base) * 2]
                    );
                }
            });
        }
    });
}
