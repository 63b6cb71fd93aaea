use std::process::ExitCode;

use kernelflow::{
    Allocation, Context, Domain, ElementType, GraphError, Scalar, Type, Value,
};

const ARRAY_SIZE: u32 = 256;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    println!("=== kernelflow demo ===\n");

    match run() {
        Ok(()) => {
            println!("\n=== All graphs completed ===");
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("\n=== Graph failed: {} ===", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), GraphError> {
    let ctx = Context::new();
    let kernels = ctx.register_builtins();
    println!("[OK] {} kernels registered", ctx.registry().len());

    // Chain: double(double(input))
    let mut builder = ctx.builder().with_name("double-twice");
    let input = builder.add_input();
    let first = builder.add_kernel(kernels.double, Domain::x(4), vec![input.into()], vec![])?;
    let second = builder.add_kernel(
        kernels.double,
        Domain::x(4),
        vec![first.get_return().into()],
        vec![],
    )?;
    let chain = builder.create([second.get_return()])?;

    for data in [vec![1, 2, 3, 4], vec![5, 6, 7, 8]] {
        let input = Allocation::from_i32(Type::x(ElementType::i32(), 4), data.clone())?;
        let outputs = chain.execute(&[input.into()])?;
        let result = outputs[0].as_allocation().and_then(|a| a.as_i32());
        println!("[OK] {}: {:?} -> {:?}", chain.name(), data, result);
    }

    // Reduction: log2(N) strided adds, then an invoke publishing the total.
    let strided_add = ctx
        .kernel(kernels.strided_add)
        .ok_or(GraphError::KernelNotFound(kernels.strided_add))?;
    let a_in = strided_add.field("a_in")?;
    let stride_field = strided_add.field("reduction_stride")?;
    let sum = ctx
        .kernel(kernels.sum)
        .ok_or(GraphError::KernelNotFound(kernels.sum))?;
    let sum_input = sum.field("input")?;

    let mut builder = ctx.builder().with_name("reduction");
    let unbound = builder.add_input();
    let mut source: Value = unbound.into();
    let mut stride = ARRAY_SIZE / 2;
    while stride >= 1 {
        let closure = builder.add_kernel(
            kernels.strided_add,
            Domain::x(stride),
            vec![],
            vec![(a_in, source), (stride_field, Scalar::I32(stride as i32).into())],
        )?;
        source = closure.get_return().into();
        stride >>= 1;
    }
    let total = builder.add_invoke(kernels.sum, vec![], vec![(sum_input, source.clone())])?;
    let reduction = builder.create([source, total.get_global("total")?.into()])?;
    println!(
        "[OK] {} created ({} closures, {} batches)",
        reduction.name(),
        reduction.closures().len(),
        reduction.batches().len()
    );

    let data: Vec<i32> = (0..ARRAY_SIZE as i32)
        .flat_map(|i| std::iter::repeat(i * 7).take(4))
        .collect();
    let input = Allocation::from_i32(Type::x(ElementType::i32_4(), ARRAY_SIZE), data)?;
    let report = reduction.execute_with_report(&[input.into()])?;

    let lanes = report.outputs[0].as_allocation().and_then(|a| a.as_i32());
    let expected = (ARRAY_SIZE * (ARRAY_SIZE - 1) * 7 / 2) as i32;
    println!("[OK] reduction lanes = {:?} (expected {} each)", lanes, expected);
    println!(
        "[OK] sum of the final lanes = {:?}",
        report.outputs[1].as_scalar()
    );
    println!(
        "[OK] {} closures ran in {:?}",
        report.order.len(),
        report.elapsed
    );
    Ok(())
}
