//! CPU reference kernels used by the demo binary, tests and benchmarks.

use std::sync::Arc;

use super::executor::{Kernel, KernelOutput, LaunchArgs};
use super::registry::KernelRegistry;
use super::signature::{KernelId, KernelSignature};
use crate::core::{Allocation, Buffer, Domain, ParamType, Scalar, ScalarKind, Type};
use crate::error::KernelError;

/// Ids of the built-in kernels after [`register_builtin_kernels`].
#[derive(Debug, Clone, Copy)]
pub struct BuiltinKernels {
    pub increment: KernelId,
    pub double: KernelId,
    pub scale: KernelId,
    pub strided_add: KernelId,
    pub sum: KernelId,
}

/// Register every built-in kernel with `registry`.
pub fn register_builtin_kernels(registry: &KernelRegistry) -> BuiltinKernels {
    BuiltinKernels {
        increment: registry.register(Arc::new(IncrementKernel)),
        double: registry.register(Arc::new(DoubleKernel)),
        scale: registry.register(Arc::new(ScaleKernel)),
        strided_add: registry.register(Arc::new(StridedAddKernel)),
        sum: registry.register(Arc::new(SumKernel)),
    }
}

// ================================
// Helpers
// ================================

/// Input allocation of an element-wise kernel; its extent must equal the
/// launch domain.
fn elementwise_input<'a>(launch: &LaunchArgs<'a>) -> Result<(&'a Allocation, Domain), KernelError> {
    let domain = launch.domain()?;
    let input = launch.arg_allocation(0)?;
    if input.ty().domain != domain {
        return Err(KernelError::invalid_argument(format!(
            "input extent {} does not match launch domain {}",
            input.ty().domain,
            domain
        )));
    }
    Ok((input, domain))
}

fn map_buffer(
    input: &Allocation,
    name: &str,
    i32_op: impl Fn(i32) -> i32,
    u32_op: impl Fn(u32) -> u32,
    f32_op: impl Fn(f32) -> f32,
) -> Result<Buffer, KernelError> {
    match input.buffer() {
        Buffer::I32(v) => Ok(Buffer::I32(v.iter().map(|x| i32_op(*x)).collect())),
        Buffer::U32(v) => Ok(Buffer::U32(v.iter().map(|x| u32_op(*x)).collect())),
        Buffer::F32(v) => Ok(Buffer::F32(v.iter().map(|x| f32_op(*x)).collect())),
        Buffer::U8(_) => Err(KernelError::type_error(format!(
            "{name} does not support {} elements",
            input.ty().element
        ))),
    }
}

fn finish(ty: Type, buffer: Buffer) -> Result<KernelOutput, KernelError> {
    Allocation::new(ty, buffer)
        .map(KernelOutput::returning)
        .map_err(|e| KernelError::execution(e.to_string()))
}

// ================================
// increment / double / scale
// ================================

/// `out[x] = in[x] + 1`, wrapping on overflow.
pub struct IncrementKernel;

impl Kernel for IncrementKernel {
    fn signature(&self) -> KernelSignature {
        KernelSignature::for_each("increment", None).arg("in", ParamType::Allocation(None))
    }

    fn invoke(&self, launch: &LaunchArgs<'_>) -> Result<KernelOutput, KernelError> {
        let (input, domain) = elementwise_input(launch)?;
        let buffer = map_buffer(
            input,
            "increment",
            |x| x.wrapping_add(1),
            |x| x.wrapping_add(1),
            |x| x + 1.0,
        )?;
        finish(Type::new(input.ty().element, domain), buffer)
    }
}

/// `out[x] = in[x] * 2`, wrapping on overflow.
pub struct DoubleKernel;

impl Kernel for DoubleKernel {
    fn signature(&self) -> KernelSignature {
        KernelSignature::for_each("double", None).arg("in", ParamType::Allocation(None))
    }

    fn invoke(&self, launch: &LaunchArgs<'_>) -> Result<KernelOutput, KernelError> {
        let (input, domain) = elementwise_input(launch)?;
        let buffer = map_buffer(
            input,
            "double",
            |x| x.wrapping_mul(2),
            |x| x.wrapping_mul(2),
            |x| x * 2.0,
        )?;
        finish(Type::new(input.ty().element, domain), buffer)
    }
}

/// `out[x] = in[x] * factor`. Integer results truncate toward zero.
pub struct ScaleKernel;

impl Kernel for ScaleKernel {
    fn signature(&self) -> KernelSignature {
        KernelSignature::for_each("scale", None)
            .arg("in", ParamType::Allocation(None))
            .field("factor", ParamType::Any)
    }

    fn invoke(&self, launch: &LaunchArgs<'_>) -> Result<KernelOutput, KernelError> {
        let (input, domain) = elementwise_input(launch)?;
        let factor = launch
            .field_scalar("factor")?
            .as_f64()
            .ok_or_else(|| KernelError::type_error("factor must be numeric"))?;
        let buffer = map_buffer(
            input,
            "scale",
            |x| (x as f64 * factor) as i32,
            |x| (x as f64 * factor) as u32,
            |x| (x as f64 * factor) as f32,
        )?;
        finish(Type::new(input.ty().element, domain), buffer)
    }
}

// ================================
// strided_add
// ================================

/// One step of a pairwise reduction: `out[x] = a_in[x] + a_in[x + stride]`
/// for every vector lane, over a launch domain of `stride` cells.
pub struct StridedAddKernel;

impl Kernel for StridedAddKernel {
    fn signature(&self) -> KernelSignature {
        KernelSignature::for_each("strided_add", None)
            .field("a_in", ParamType::Allocation(None))
            .field("reduction_stride", ParamType::Scalar(ScalarKind::I32))
    }

    fn invoke(&self, launch: &LaunchArgs<'_>) -> Result<KernelOutput, KernelError> {
        let domain = launch.domain()?;
        let a_in = launch.field_allocation("a_in")?;
        let stride = launch
            .field_scalar("reduction_stride")?
            .as_i64()
            .filter(|s| *s >= 0)
            .ok_or_else(|| {
                KernelError::invalid_argument("reduction_stride must be a non-negative integer")
            })? as usize;

        let lanes = a_in.ty().element.lanes();
        let too_large = || KernelError::invalid_argument("domain is too large to launch over");
        let cells = domain.count().ok_or_else(too_large)?;
        let available = a_in.ty().domain.count().ok_or_else(too_large)?;
        if cells.saturating_add(stride) > available {
            return Err(KernelError::invalid_argument(format!(
                "a_in holds {available} cells, launch over {cells} with stride {stride} reads past the end"
            )));
        }

        let pair = |x: usize, lane: usize| (x * lanes + lane, (x + stride) * lanes + lane);
        let buffer = match a_in.buffer() {
            Buffer::I32(v) => Buffer::I32(
                (0..cells * lanes)
                    .map(|i| {
                        let (a, b) = pair(i / lanes, i % lanes);
                        v[a].wrapping_add(v[b])
                    })
                    .collect(),
            ),
            Buffer::U32(v) => Buffer::U32(
                (0..cells * lanes)
                    .map(|i| {
                        let (a, b) = pair(i / lanes, i % lanes);
                        v[a].wrapping_add(v[b])
                    })
                    .collect(),
            ),
            Buffer::F32(v) => Buffer::F32(
                (0..cells * lanes)
                    .map(|i| {
                        let (a, b) = pair(i / lanes, i % lanes);
                        v[a] + v[b]
                    })
                    .collect(),
            ),
            Buffer::U8(_) => {
                return Err(KernelError::type_error(format!(
                    "strided_add does not support {} elements",
                    a_in.ty().element
                )))
            }
        };
        finish(Type::new(a_in.ty().element, domain), buffer)
    }
}

// ================================
// sum (invoke)
// ================================

/// Adds up every lane of `input` and publishes the result in the `total`
/// global.
pub struct SumKernel;

impl Kernel for SumKernel {
    fn signature(&self) -> KernelSignature {
        KernelSignature::invoke("sum")
            .field("input", ParamType::Allocation(None))
            .field("total", ParamType::Scalar(ScalarKind::I64))
    }

    fn invoke(&self, launch: &LaunchArgs<'_>) -> Result<KernelOutput, KernelError> {
        let input = launch.field_allocation("input")?;
        let total: i64 = match input.buffer() {
            Buffer::I32(v) => v.iter().map(|x| *x as i64).sum(),
            Buffer::U32(v) => v.iter().map(|x| *x as i64).sum(),
            Buffer::U8(v) => v.iter().map(|x| *x as i64).sum(),
            Buffer::F32(_) => {
                return Err(KernelError::type_error(format!(
                    "sum only adds integer buffers, got {}",
                    input.ty().element
                )))
            }
        };
        Ok(KernelOutput::empty().with_global("total", Scalar::I64(total)))
    }
}
