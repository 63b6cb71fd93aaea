//! Kernels: signatures, the [`Kernel`] trait and the [`KernelRegistry`].

pub mod executor;
pub mod registry;
pub mod signature;

#[cfg(feature = "builtin-kernels")]
pub mod builtin;

pub use executor::{Kernel, KernelOutput, LaunchArgs};
pub use registry::{KernelDescriptor, KernelRegistry};
pub use signature::{FieldId, KernelId, KernelKind, KernelSignature, Param};

#[cfg(feature = "builtin-kernels")]
pub use builtin::{register_builtin_kernels, BuiltinKernels};
