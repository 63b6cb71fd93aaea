//! Reference and type validation shared by the builder and the executor.

use std::collections::HashSet;

use crate::core::{BuilderId, ConcreteValue, Domain, Future, UnboundValue, Value, ValueType};
use crate::error::GraphError;
use crate::kernel::{FieldId, KernelDescriptor, Param};

use super::closure::Closure;

/// What a value may refer to while a builder is open: its own input slots and
/// the closures registered so far.
pub(crate) struct Scope<'a> {
    pub builder: BuilderId,
    pub inputs: &'a [UnboundValue],
    pub closures: &'a [Closure],
}

impl<'a> Scope<'a> {
    /// Check that `value` refers only to things in scope and return its
    /// static type.
    pub fn value_type(&self, value: &Value) -> Result<ValueType, GraphError> {
        match value {
            Value::Bound(concrete) => Ok(concrete.value_type()),
            Value::Unbound(unbound) => {
                if unbound.builder != self.builder {
                    return Err(GraphError::UnknownReference(format!(
                        "input({}) was declared by another builder",
                        unbound.slot
                    )));
                }
                let declared = self.inputs.get(unbound.slot).ok_or_else(|| {
                    GraphError::UnknownReference(format!(
                        "input({}) was never declared",
                        unbound.slot
                    ))
                })?;
                Ok(declared.declared.unwrap_or(ValueType::Any))
            }
            Value::Future(future) => self.future_type(future),
        }
    }

    pub fn future_type(&self, future: &Future) -> Result<ValueType, GraphError> {
        let closure = self.resolve(future)?;
        closure.target_type(future.target)
    }

    /// Closure a future refers to. Foreign and forward references are
    /// rejected.
    pub fn resolve(&self, future: &Future) -> Result<&'a Closure, GraphError> {
        if future.builder != self.builder {
            return Err(GraphError::UnknownReference(format!(
                "{future} belongs to another builder"
            )));
        }
        self.closures.get(future.closure.index()).ok_or_else(|| {
            GraphError::UnknownReference(format!(
                "{future} refers to a closure that has not been added yet"
            ))
        })
    }
}

/// Whether a value of type `actual` satisfies a declared value type.
pub(crate) fn compatible(declared: &ValueType, actual: &ValueType) -> bool {
    match (declared, actual) {
        (ValueType::Any, _) | (_, ValueType::Any) => true,
        (ValueType::Scalar(a), ValueType::Scalar(b)) => a == b,
        (
            ValueType::Allocation {
                element: de,
                domain: dd,
            },
            ValueType::Allocation {
                element: ae,
                domain: ad,
            },
        ) => {
            let element_ok = match (de, ae) {
                (Some(d), Some(a)) => d == a,
                _ => true,
            };
            let domain_ok = match (dd, ad) {
                (Some(d), Some(a)) => d == a,
                _ => true,
            };
            element_ok && domain_ok
        }
        _ => false,
    }
}

/// Check one value against the parameter it flows into.
///
/// Positional allocation arguments of a for-each launch must also cover the
/// launch domain when their extent is known.
pub(crate) fn check_param(
    kernel: &str,
    param: &Param,
    actual: &ValueType,
    launch: Option<Domain>,
    positional: bool,
) -> Result<(), GraphError> {
    if !param.ty.accepts(actual) {
        return Err(GraphError::TypeOrShapeMismatch(format!(
            "kernel '{}' expects {} for '{}', got {}",
            kernel, param.ty, param.name, actual
        )));
    }
    if positional {
        if let (Some(launch), Some(extent)) = (launch, actual.domain()) {
            if launch != extent {
                return Err(GraphError::TypeOrShapeMismatch(format!(
                    "argument '{}' of kernel '{}' has extent {}, launch domain is {}",
                    param.name, kernel, extent, launch
                )));
            }
        }
    }
    Ok(())
}

/// Field bindings must name fields of this kernel, each at most once.
pub(crate) fn check_bindings(
    descriptor: &KernelDescriptor,
    bindings: &[(FieldId, Value)],
) -> Result<(), GraphError> {
    let mut seen = HashSet::new();
    for (field, _) in bindings {
        let param = descriptor
            .field_param(*field)
            .ok_or_else(|| GraphError::UnknownField {
                kernel: descriptor.name().to_string(),
                field: field.to_string(),
            })?;
        if !seen.insert(*field) {
            return Err(GraphError::DuplicateBinding {
                kernel: descriptor.name().to_string(),
                field: param.name.clone(),
            });
        }
    }
    Ok(())
}

/// Validate graph outputs: each must be a future of a closure in scope that
/// actually produces the referenced value.
pub(crate) fn check_outputs(scope: &Scope<'_>, outputs: &[Value]) -> Result<Vec<Future>, GraphError> {
    if outputs.is_empty() {
        return Err(GraphError::DanglingOutput(
            "a graph needs at least one output".to_string(),
        ));
    }
    outputs
        .iter()
        .enumerate()
        .map(|(index, value)| {
            let future = match value {
                Value::Future(future) => future,
                other => {
                    return Err(GraphError::DanglingOutput(format!(
                        "output {} is {}, not the future of a closure",
                        index,
                        other.describe()
                    )))
                }
            };
            if future.builder != scope.builder {
                return Err(GraphError::DanglingOutput(format!(
                    "output {index} is {future} from another builder"
                )));
            }
            let closure = scope.closures.get(future.closure.index()).ok_or_else(|| {
                GraphError::DanglingOutput(format!(
                    "output {index} is {future}, which no closure produces"
                ))
            })?;
            closure.target_type(future.target)?;
            Ok(*future)
        })
        .collect()
}

/// Check concrete execution inputs against the declared input slots.
pub(crate) fn check_inputs(
    declared: &[UnboundValue],
    inputs: &[ConcreteValue],
    check_types: bool,
) -> Result<(), GraphError> {
    if declared.len() != inputs.len() {
        return Err(GraphError::ArityMismatch {
            expected: declared.len(),
            got: inputs.len(),
        });
    }
    if !check_types {
        return Ok(());
    }
    for (slot, input) in declared.iter().zip(inputs) {
        if let Some(ty) = slot.declared {
            let actual = input.value_type();
            if !compatible(&ty, &actual) {
                return Err(GraphError::InputMismatch(format!(
                    "input({}) is declared as {}, got {}",
                    slot.slot, ty, actual
                )));
            }
        }
    }
    Ok(())
}
