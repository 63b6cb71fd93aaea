use serde_json::json;

use std::sync::atomic::Ordering;

use kernelflow::{
    Allocation, ClosureId, Context, Domain, ElementType, EngineConfig, ErrorCode, GraphError,
    Scalar, Type, Value, ValueType,
};

use super::helpers::{i32_input, i32_output, setup, setup_with, CountingKernel};

#[test]
fn test_inputs_get_sequential_slots() {
    let (ctx, _) = setup();
    let mut builder = ctx.builder();
    let slots: Vec<usize> = (0..5).map(|_| builder.add_input().slot()).collect();
    assert_eq!(slots, vec![0, 1, 2, 3, 4]);
    assert_eq!(builder.input_count(), 5);
}

#[test]
fn test_future_of_unadded_closure_is_rejected() {
    let (ctx, kernels) = setup();
    let mut builder = ctx.builder();
    let input = builder.add_input();
    let first = builder
        .add_kernel(kernels.double, Domain::x(4), vec![input.into()], vec![])
        .unwrap();

    // Referencing the closure itself (id 1) before it exists.
    let ahead = builder.future_of(ClosureId::new(1));
    let err = builder
        .add_kernel(kernels.double, Domain::x(4), vec![ahead.into()], vec![])
        .unwrap_err();
    assert!(matches!(err, GraphError::UnknownReference(_)));
    assert!(err.is_build_error());
    assert_eq!(builder.closure_count(), 1);

    // A future of an existing closure built from its id is fine.
    let existing = builder.future_of(first.id());
    assert!(builder
        .add_kernel(kernels.double, Domain::x(4), vec![existing.into()], vec![])
        .is_ok());
}

#[test]
fn test_create_with_raw_outputs_is_dangling() {
    let (ctx, kernels) = setup();

    let mut builder = ctx.builder();
    let input = builder.add_input();
    builder
        .add_kernel(kernels.double, Domain::x(4), vec![input.into()], vec![])
        .unwrap();
    let err = builder.create([input]).unwrap_err();
    assert!(matches!(err, GraphError::DanglingOutput(_)));
    assert_eq!(err.error_context().code, ErrorCode::DanglingOutput);

    let mut builder = ctx.builder();
    let input = builder.add_input();
    let c = builder
        .add_kernel(kernels.double, Domain::x(4), vec![input.into()], vec![])
        .unwrap();
    let err = builder
        .create([Value::from(c.get_return()), Value::from(i32_input(&[1, 2, 3, 4]))])
        .unwrap_err();
    assert!(matches!(err, GraphError::DanglingOutput(_)));
}

#[test]
fn test_outputs_from_another_builder_are_dangling() {
    let (ctx, kernels) = setup();
    let mut other = ctx.builder();
    let input = other.add_input();
    let foreign = other
        .add_kernel(kernels.double, Domain::x(4), vec![input.into()], vec![])
        .unwrap();

    let mut builder = ctx.builder();
    let input = builder.add_input();
    builder
        .add_kernel(kernels.double, Domain::x(4), vec![input.into()], vec![])
        .unwrap();
    assert!(matches!(
        builder.create([foreign.get_return()]),
        Err(GraphError::DanglingOutput(_))
    ));
}

#[test]
fn test_fields_resolve_by_name() {
    let (ctx, kernels) = setup();
    let descriptor = ctx.kernel(kernels.strided_add).unwrap();
    let a_in = descriptor.field("a_in").unwrap();
    let stride = descriptor.field("reduction_stride").unwrap();
    assert_ne!(a_in, stride);
    assert_eq!(a_in.kernel(), kernels.strided_add);
    assert!(matches!(
        descriptor.field("b_in"),
        Err(GraphError::UnknownField { .. })
    ));
}

#[test]
fn test_stride_must_be_an_i32_scalar() {
    let (ctx, kernels) = setup();
    let descriptor = ctx.kernel(kernels.strided_add).unwrap();
    let a_in = descriptor.field("a_in").unwrap();
    let stride = descriptor.field("reduction_stride").unwrap();

    let mut builder = ctx.builder();
    let input = builder.add_input();
    let err = builder
        .add_kernel(
            kernels.strided_add,
            Domain::x(2),
            vec![],
            vec![(a_in, input.into()), (stride, Scalar::F32(2.0).into())],
        )
        .unwrap_err();
    assert!(matches!(err, GraphError::TypeOrShapeMismatch(_)));
}

#[test]
fn test_arity_is_configurable() {
    let (ctx, kernels) = setup();
    let mut builder = ctx.builder();
    let input = builder.add_input();
    assert!(matches!(
        builder.add_kernel(
            kernels.double,
            Domain::x(4),
            vec![input.into(), input.into()],
            vec![]
        ),
        Err(GraphError::KernelArityMismatch {
            expected: 1,
            got: 2,
            ..
        })
    ));

    let config = EngineConfig::from_value(json!({ "strict_arity": false })).unwrap();
    let (ctx, kernels) = setup_with(config);
    let mut builder = ctx.builder();
    let input = builder.add_input();
    assert!(builder
        .add_kernel(
            kernels.double,
            Domain::x(4),
            vec![input.into(), input.into()],
            vec![]
        )
        .is_ok());
}

#[test]
fn test_typed_input_checked_against_consumers() {
    let (ctx, kernels) = setup();
    let mut builder = ctx.builder();
    let typed = builder.add_typed_input(ValueType::allocation(Type::x(ElementType::i32(), 8)));
    assert_eq!(typed.declared_type().and_then(|t| t.domain()), Some(Domain::x(8)));

    assert!(matches!(
        builder.add_kernel(kernels.double, Domain::x(4), vec![typed.into()], vec![]),
        Err(GraphError::TypeOrShapeMismatch(_))
    ));
    assert!(builder
        .add_kernel(kernels.double, Domain::x(8), vec![typed.into()], vec![])
        .is_ok());
}

#[test]
fn test_bound_allocation_must_cover_domain() {
    let (ctx, kernels) = setup();
    let mut builder = ctx.builder();
    assert!(matches!(
        builder.add_kernel(
            kernels.double,
            Domain::x(3),
            vec![i32_input(&[1, 2, 3, 4]).into()],
            vec![]
        ),
        Err(GraphError::TypeOrShapeMismatch(_))
    ));
}

#[test]
fn test_kernel_from_another_context_is_not_found() {
    let other = Context::new();
    let (counting, calls) = CountingKernel::new();
    let foreign = other.register_kernel(counting);

    let (ctx, kernels) = setup();
    assert!(ctx.kernel(foreign).is_none());
    let mut builder = ctx.builder();
    let input = builder.add_input();
    let err = builder
        .add_kernel(foreign, Domain::x(2), vec![input.into()], vec![])
        .unwrap_err();
    assert!(matches!(err, GraphError::KernelNotFound(id) if id == foreign));
    assert_eq!(builder.closure_count(), 0);

    // Field ids carry their kernel, so they do not bind across contexts either.
    let other_builtins = other.register_builtins();
    let foreign_stride = other
        .kernel(other_builtins.strided_add)
        .unwrap()
        .field("reduction_stride")
        .unwrap();
    let err = builder
        .add_kernel(
            kernels.strided_add,
            Domain::x(1),
            vec![],
            vec![(foreign_stride, Scalar::I32(1).into())],
        )
        .unwrap_err();
    assert!(matches!(err, GraphError::UnknownField { .. }));

    let doubled = builder
        .add_kernel(kernels.double, Domain::x(2), vec![input.into()], vec![])
        .unwrap();
    let graph = builder.create([doubled.get_return()]).unwrap();
    let outputs = graph.execute(&[i32_input(&[1, 2])]).unwrap();
    assert_eq!(i32_output(&outputs[0]), vec![2, 4]);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_oversized_launch_domain_is_rejected() {
    let (ctx, kernels) = setup();
    let mut builder = ctx.builder();
    let input = builder.add_input();
    let huge = Domain::xyz(u32::MAX, u32::MAX, u32::MAX);
    let err = builder
        .add_kernel(kernels.double, huge, vec![input.into()], vec![])
        .unwrap_err();
    assert!(matches!(err, GraphError::TypeOrShapeMismatch(_)));
    assert_eq!(builder.closure_count(), 0);

    let err = Allocation::zeroed(Type::new(ElementType::i32(), huge)).unwrap_err();
    assert!(matches!(err, GraphError::InvalidAllocation(_)));
}

#[test]
fn test_closure_limit_from_config() {
    let config = EngineConfig::from_json(r#"{ "max_closures": 2 }"#).unwrap();
    let (ctx, kernels) = setup_with(config);
    let mut builder = ctx.builder();
    let input = builder.add_input();
    let mut last: Value = input.into();
    for _ in 0..2 {
        last = builder
            .add_kernel(kernels.increment, Domain::x(4), vec![last], vec![])
            .unwrap()
            .get_return()
            .into();
    }
    let err = builder
        .add_kernel(kernels.increment, Domain::x(4), vec![last], vec![])
        .unwrap_err();
    assert!(matches!(err, GraphError::TooManyClosures(2)));
    assert_eq!(err.error_context().code, ErrorCode::ResourceLimit);
}

#[test]
fn test_fan_out_is_allowed() {
    let (ctx, kernels) = setup();
    let mut builder = ctx.builder();
    let input = builder.add_input();
    let source = builder
        .add_kernel(kernels.increment, Domain::x(4), vec![input.into()], vec![])
        .unwrap();
    let left = builder
        .add_kernel(kernels.double, Domain::x(4), vec![source.get_return().into()], vec![])
        .unwrap();
    let right = builder
        .add_kernel(kernels.increment, Domain::x(4), vec![source.get_return().into()], vec![])
        .unwrap();
    let graph = builder
        .create([left.get_return(), right.get_return()])
        .unwrap();
    assert_eq!(
        graph.dependents(source.id()),
        vec![left.id(), right.id()]
    );
    assert_eq!(graph.output_count(), 2);
}
