#![allow(dead_code)]

use kernelflow::{
    Allocation, BuiltinKernels, ConcreteValue, Context, Domain, ElementType, Graph, Scalar, Type,
    Value,
};

pub fn bench_context() -> (Context, BuiltinKernels) {
    let ctx = Context::new();
    let kernels = ctx.register_builtins();
    (ctx, kernels)
}

pub fn i32_input(len: u32) -> ConcreteValue {
    Allocation::from_i32(Type::x(ElementType::i32(), len), (0..len as i32).collect())
        .expect("valid bench input")
        .into()
}

pub fn reduction_input(size: u32) -> ConcreteValue {
    let data: Vec<i32> = (0..size as i32)
        .flat_map(|i| std::iter::repeat(i * 7).take(4))
        .collect();
    Allocation::from_i32(Type::x(ElementType::i32_4(), size), data)
        .expect("valid bench input")
        .into()
}

/// `depth` alternating increment/double closures over `len` cells.
pub fn build_chain(ctx: &Context, kernels: &BuiltinKernels, depth: usize, len: u32) -> Graph {
    let mut builder = ctx.builder().with_name(format!("chain-{depth}"));
    let input = builder.add_input();
    let mut last: Value = input.into();
    for i in 0..depth {
        let kernel = if i % 2 == 0 {
            kernels.increment
        } else {
            kernels.double
        };
        last = builder
            .add_kernel(kernel, Domain::x(len), vec![last], vec![])
            .expect("chain closure")
            .get_return()
            .into();
    }
    builder.create([last]).expect("chain graph")
}

/// One source closure consumed by `width` independent closures.
pub fn build_fanout(ctx: &Context, kernels: &BuiltinKernels, width: usize, len: u32) -> Graph {
    let mut builder = ctx.builder().with_name(format!("fanout-{width}"));
    let input = builder.add_input();
    let source = builder
        .add_kernel(kernels.increment, Domain::x(len), vec![input.into()], vec![])
        .expect("fanout source");
    let outputs: Vec<Value> = (0..width)
        .map(|_| {
            builder
                .add_kernel(
                    kernels.double,
                    Domain::x(len),
                    vec![source.get_return().into()],
                    vec![],
                )
                .expect("fanout branch")
                .get_return()
                .into()
        })
        .collect();
    builder.create(outputs).expect("fanout graph")
}

/// Pairwise strided-add reduction over `size` I32_4 cells.
pub fn build_reduction(ctx: &Context, kernels: &BuiltinKernels, size: u32) -> Graph {
    let descriptor = ctx.kernel(kernels.strided_add).expect("strided_add registered");
    let a_in = descriptor.field("a_in").expect("a_in");
    let stride_field = descriptor.field("reduction_stride").expect("reduction_stride");

    let mut builder = ctx.builder().with_name(format!("reduction-{size}"));
    let input = builder.add_input();
    let mut source: Value = input.into();
    let mut stride = size / 2;
    while stride >= 1 {
        source = builder
            .add_kernel(
                kernels.strided_add,
                Domain::x(stride),
                vec![],
                vec![(a_in, source), (stride_field, Scalar::I32(stride as i32).into())],
            )
            .expect("reduction step")
            .get_return()
            .into();
        stride >>= 1;
    }
    builder.create([source]).expect("reduction graph")
}
