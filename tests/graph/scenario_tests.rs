use kernelflow::{
    Context, Domain, EngineConfig, FieldId, GraphBuilder, Scalar, ScalarKind, Value, ValueType,
};

use super::helpers::{i32_input, i32_output, reduction_input, setup, setup_with};

const ARRAY_SIZE: u32 = 256;

struct ReductionFields {
    a_in: FieldId,
    stride: FieldId,
}

fn reduction_fields(ctx: &Context, kernel: kernelflow::KernelId) -> ReductionFields {
    let descriptor = ctx.kernel(kernel).unwrap();
    ReductionFields {
        a_in: descriptor.field("a_in").unwrap(),
        stride: descriptor.field("reduction_stride").unwrap(),
    }
}

/// Pairwise reduction: log2(size) strided adds, each halving the extent.
fn add_reduction(
    builder: &mut GraphBuilder,
    kernel: kernelflow::KernelId,
    fields: &ReductionFields,
    source: Value,
    size: u32,
) -> Value {
    let mut source = source;
    let mut stride = size / 2;
    while stride >= 1 {
        let closure = builder
            .add_kernel(
                kernel,
                Domain::x(stride),
                vec![],
                vec![
                    (fields.a_in, source),
                    (fields.stride, Scalar::I32(stride as i32).into()),
                ],
            )
            .unwrap();
        source = closure.get_return().into();
        stride >>= 1;
    }
    source
}

#[test]
fn test_gather_scatter_reduction() {
    let (ctx, kernels) = setup();
    let fields = reduction_fields(&ctx, kernels.strided_add);
    let mut builder = ctx.builder().with_name("gather-scatter");
    let input = builder.add_input();
    let result = add_reduction(&mut builder, kernels.strided_add, &fields, input.into(), ARRAY_SIZE);
    let graph = builder.create([result]).unwrap();
    assert_eq!(graph.closures().len(), 8);

    let outputs = graph.execute(&[reduction_input(ARRAY_SIZE)]).unwrap();
    let expected = (ARRAY_SIZE * (ARRAY_SIZE - 1) * 7 / 2) as i32;
    assert_eq!(i32_output(&outputs[0]), vec![expected; 4]);
}

#[test]
fn test_reduction_over_other_sizes() {
    let (ctx, kernels) = setup();
    let fields = reduction_fields(&ctx, kernels.strided_add);
    for size in [2u32, 16, 64] {
        let mut builder = ctx.builder();
        let input = builder.add_input();
        let result = add_reduction(&mut builder, kernels.strided_add, &fields, input.into(), size);
        let graph = builder.create([result]).unwrap();
        let outputs = graph.execute(&[reduction_input(size)]).unwrap();
        let expected = (size * (size - 1) * 7 / 2) as i32;
        assert_eq!(i32_output(&outputs[0]), vec![expected; 4], "size {size}");
    }
}

#[test]
fn test_reduction_steps_land_in_separate_batches() {
    let (ctx, kernels) = setup();
    let fields = reduction_fields(&ctx, kernels.strided_add);
    let mut builder = ctx.builder();
    let input = builder.add_input();
    let result = add_reduction(&mut builder, kernels.strided_add, &fields, input.into(), 16);
    let graph = builder.create([result]).unwrap();

    // Every step reads the previous one through the a_in global.
    assert_eq!(graph.batches().len(), 4);
    assert!(graph.batches().iter().all(|b| b.closures.len() == 1));
}

#[test]
fn test_same_domain_chain_shares_a_batch() {
    let (ctx, kernels) = setup();
    let mut builder = ctx.builder();
    let input = builder.add_input();
    let a = builder
        .add_kernel(kernels.increment, Domain::x(4), vec![input.into()], vec![])
        .unwrap();
    let b = builder
        .add_kernel(kernels.double, Domain::x(4), vec![a.get_return().into()], vec![])
        .unwrap();
    let c = builder
        .add_kernel(kernels.double, Domain::x(2), vec![i32_input(&[1, 2]).into()], vec![])
        .unwrap();
    let graph = builder.create([b.get_return(), c.get_return()]).unwrap();

    let batches: Vec<Vec<usize>> = graph
        .batches()
        .iter()
        .map(|batch| batch.closures.iter().map(|id| id.index()).collect())
        .collect();
    assert_eq!(batches, vec![vec![0, 1], vec![2]]);
}

#[test]
fn test_invoke_publishes_global() {
    let (ctx, kernels) = setup();
    let sum = ctx.kernel(kernels.sum).unwrap();
    let sum_input = sum.field("input").unwrap();

    let mut builder = ctx.builder();
    let input = builder.add_input();
    let doubled = builder
        .add_kernel(kernels.double, Domain::x(4), vec![input.into()], vec![])
        .unwrap();
    let total = builder
        .add_invoke(kernels.sum, vec![], vec![(sum_input, doubled.get_return().into())])
        .unwrap();
    assert!(total.is_invoke());
    let total_future = total.get_global("total").unwrap();
    assert!(total_future.is_global());

    let graph = builder
        .create([total_future.into(), Value::from(doubled.get_return())])
        .unwrap();
    assert_eq!(graph.batches().len(), 2);

    let outputs = graph.execute(&[i32_input(&[1, 2, 3, 4])]).unwrap();
    assert_eq!(outputs[0].as_scalar(), Some(Scalar::I64(20)));
    assert_eq!(i32_output(&outputs[1]), vec![2, 4, 6, 8]);

    let outputs = graph.execute(&[i32_input(&[0, 0, 0, 1])]).unwrap();
    assert_eq!(outputs[0].as_scalar(), Some(Scalar::I64(2)));
}

#[test]
fn test_global_future_feeds_a_later_kernel() {
    let (ctx, kernels) = setup();
    let sum = ctx.kernel(kernels.sum).unwrap();
    let sum_input = sum.field("input").unwrap();
    let factor = ctx.kernel(kernels.scale).unwrap().field("factor").unwrap();

    let mut builder = ctx.builder();
    let input = builder.add_input();
    let total = builder
        .add_invoke(kernels.sum, vec![], vec![(sum_input, input.into())])
        .unwrap();
    let scaled = builder
        .add_kernel(
            kernels.scale,
            Domain::x(3),
            vec![input.into()],
            vec![(factor, total.get_global("total").unwrap().into())],
        )
        .unwrap();
    let graph = builder.create([scaled.get_return()]).unwrap();
    assert_eq!(graph.dependencies(scaled.id()), vec![total.id()]);

    let outputs = graph.execute(&[i32_input(&[1, 2, 3])]).unwrap();
    assert_eq!(i32_output(&outputs[0]), vec![6, 12, 18]);
}

#[test]
fn test_typed_scalar_input() {
    let (ctx, kernels) = setup();
    let factor = ctx.kernel(kernels.scale).unwrap().field("factor").unwrap();
    let mut builder = ctx.builder();
    let data = builder.add_input();
    let k = builder.add_typed_input(ValueType::Scalar(ScalarKind::I32));
    let scaled = builder
        .add_kernel(
            kernels.scale,
            Domain::x(2),
            vec![data.into()],
            vec![(factor, k.into())],
        )
        .unwrap();
    let graph = builder.create([scaled.get_return()]).unwrap();

    let out = graph
        .execute(&[i32_input(&[2, 5]), Scalar::I32(-2).into()])
        .unwrap();
    assert_eq!(i32_output(&out[0]), vec![-4, -10]);
    assert!(graph
        .execute(&[i32_input(&[2, 5]), Scalar::F64(1.0).into()])
        .is_err());
}

#[test]
fn test_pruning_drops_unreachable_closures() {
    let (ctx, kernels) = setup_with(EngineConfig::default().with_pruning(true));
    let mut builder = ctx.builder();
    let input = builder.add_input();
    let kept = builder
        .add_kernel(kernels.double, Domain::x(2), vec![input.into()], vec![])
        .unwrap();
    let dropped = builder
        .add_kernel(kernels.increment, Domain::x(2), vec![kept.get_return().into()], vec![])
        .unwrap();
    let graph = builder.create([kept.get_return()]).unwrap();

    assert_eq!(graph.closures().len(), 1);
    assert!(graph.closure(dropped.id()).is_none());
    let report = graph.execute_with_report(&[i32_input(&[1, 2])]).unwrap();
    assert_eq!(report.order, vec![kept.id()]);
    assert_eq!(i32_output(&report.outputs[0]), vec![2, 4]);

    // Without pruning the same graph runs both closures.
    let (ctx, kernels) = setup();
    let mut builder = ctx.builder();
    let input = builder.add_input();
    let kept = builder
        .add_kernel(kernels.double, Domain::x(2), vec![input.into()], vec![])
        .unwrap();
    builder
        .add_kernel(kernels.increment, Domain::x(2), vec![kept.get_return().into()], vec![])
        .unwrap();
    let graph = builder.create([kept.get_return()]).unwrap();
    let report = graph.execute_with_report(&[i32_input(&[1, 2])]).unwrap();
    assert_eq!(report.order.len(), 2);
}

#[test]
fn test_description_serializes() {
    let (ctx, kernels) = setup();
    let sum = ctx.kernel(kernels.sum).unwrap();
    let sum_input = sum.field("input").unwrap();
    let mut builder = ctx.builder().with_name("describe-me");
    let input = builder.add_input();
    let total = builder
        .add_invoke(kernels.sum, vec![], vec![(sum_input, input.into())])
        .unwrap();
    let graph = builder
        .create([total.get_global("total").unwrap()])
        .unwrap();

    let json = serde_json::to_value(graph.describe()).unwrap();
    assert_eq!(json["name"], "describe-me");
    assert_eq!(json["closures"][0]["kernel"], "sum");
    assert_eq!(json["closures"][0]["invoke"], true);
    assert_eq!(json["closures"][0]["bindings"][0][0], "input");
    assert_eq!(json["closures"][0]["bindings"][0][1], "input(0)");
    assert!(graph.to_dot().contains("#0 sum"));
}
