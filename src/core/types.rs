//! Element, domain and parameter types shared by values and kernel signatures.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Scalar data kind of one allocation lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    I32,
    U32,
    F32,
    U8,
}

impl DataKind {
    pub fn size_bytes(self) -> usize {
        match self {
            DataKind::I32 | DataKind::U32 | DataKind::F32 => 4,
            DataKind::U8 => 1,
        }
    }
}

/// Element type of an allocation: a data kind and a vector width (1..=4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementType {
    pub kind: DataKind,
    pub vector_size: u8,
}

impl ElementType {
    pub const fn new(kind: DataKind, vector_size: u8) -> Self {
        Self { kind, vector_size }
    }

    pub const fn i32() -> Self {
        Self::new(DataKind::I32, 1)
    }

    pub const fn i32_4() -> Self {
        Self::new(DataKind::I32, 4)
    }

    pub const fn u32() -> Self {
        Self::new(DataKind::U32, 1)
    }

    pub const fn f32() -> Self {
        Self::new(DataKind::F32, 1)
    }

    pub const fn f32_4() -> Self {
        Self::new(DataKind::F32, 4)
    }

    pub const fn u8_4() -> Self {
        Self::new(DataKind::U8, 4)
    }

    pub fn lanes(self) -> usize {
        self.vector_size as usize
    }

    pub fn size_bytes(self) -> usize {
        self.kind.size_bytes() * self.lanes()
    }

    pub(crate) fn is_valid(self) -> bool {
        (1..=4).contains(&self.vector_size)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            DataKind::I32 => "i32",
            DataKind::U32 => "u32",
            DataKind::F32 => "f32",
            DataKind::U8 => "u8",
        };
        if self.vector_size == 1 {
            write!(f, "{kind}")
        } else {
            write!(f, "{kind}x{}", self.vector_size)
        }
    }
}

/// Launch domain / allocation extent. Unused dimensions are 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Domain {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl Domain {
    pub const fn x(x: u32) -> Self {
        Self { x, y: 1, z: 1 }
    }

    pub const fn xy(x: u32, y: u32) -> Self {
        Self { x, y, z: 1 }
    }

    pub const fn xyz(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    /// Number of cells covered by the domain, `None` if it does not fit in
    /// `usize`.
    pub fn count(&self) -> Option<usize> {
        (self.x as usize)
            .checked_mul(self.y as usize)?
            .checked_mul(self.z as usize)
    }

    pub fn is_empty(&self) -> bool {
        self.x == 0 || self.y == 0 || self.z == 0
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.y, self.z) {
            (1, 1) => write!(f, "[{}]", self.x),
            (_, 1) => write!(f, "[{}x{}]", self.x, self.y),
            _ => write!(f, "[{}x{}x{}]", self.x, self.y, self.z),
        }
    }
}

/// Shaped, typed storage description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Type {
    pub element: ElementType,
    pub domain: Domain,
}

impl Type {
    pub const fn new(element: ElementType, domain: Domain) -> Self {
        Self { element, domain }
    }

    /// One-dimensional type, e.g. `Type::x(ElementType::i32_4(), 256)`.
    pub const fn x(element: ElementType, x: u32) -> Self {
        Self::new(element, Domain::x(x))
    }

    /// Number of scalar lanes a buffer of this type holds, `None` on
    /// overflow.
    pub fn lane_count(&self) -> Option<usize> {
        self.domain.count()?.checked_mul(self.element.lanes())
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.element, self.domain)
    }
}

/// Kind of a scalar global value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarKind {
    I32,
    I64,
    U32,
    F32,
    F64,
    Bool,
}

/// Static knowledge about a value flowing along a graph edge.
///
/// Parts that are only known at execution time are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Allocation {
        element: Option<ElementType>,
        domain: Option<Domain>,
    },
    Scalar(ScalarKind),
    Any,
}

impl ValueType {
    pub fn allocation(ty: Type) -> Self {
        ValueType::Allocation {
            element: Some(ty.element),
            domain: Some(ty.domain),
        }
    }

    pub fn element(&self) -> Option<ElementType> {
        match self {
            ValueType::Allocation { element, .. } => *element,
            _ => None,
        }
    }

    pub fn domain(&self) -> Option<Domain> {
        match self {
            ValueType::Allocation { domain, .. } => *domain,
            _ => None,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Allocation { element, domain } => {
                write!(f, "allocation<")?;
                match element {
                    Some(e) => write!(f, "{e}")?,
                    None => write!(f, "?")?,
                }
                match domain {
                    Some(d) => write!(f, "{d}>"),
                    None => write!(f, "[?]>"),
                }
            }
            ValueType::Scalar(kind) => write!(f, "{kind:?}"),
            ValueType::Any => write!(f, "any"),
        }
    }
}

/// Declared type of a kernel parameter (positional argument or global field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    /// An allocation, optionally restricted to one element type.
    Allocation(Option<ElementType>),
    Scalar(ScalarKind),
    Any,
}

impl ParamType {
    /// Whether a value of type `actual` may flow into this parameter.
    ///
    /// Unknown parts of `actual` are accepted; they are checked again when
    /// concrete values are resolved.
    pub fn accepts(&self, actual: &ValueType) -> bool {
        match (self, actual) {
            (ParamType::Any, _) | (_, ValueType::Any) => true,
            (ParamType::Scalar(expected), ValueType::Scalar(got)) => expected == got,
            (ParamType::Allocation(expected), ValueType::Allocation { element, .. }) => {
                match (expected, element) {
                    (Some(e), Some(g)) => e == g,
                    _ => true,
                }
            }
            _ => false,
        }
    }

    /// Static type a parameter of this kind exposes when read back as a global.
    pub fn as_value_type(&self) -> ValueType {
        match self {
            ParamType::Allocation(element) => ValueType::Allocation {
                element: *element,
                domain: None,
            },
            ParamType::Scalar(kind) => ValueType::Scalar(*kind),
            ParamType::Any => ValueType::Any,
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Allocation(Some(e)) => write!(f, "allocation<{e}>"),
            ParamType::Allocation(None) => write!(f, "allocation"),
            ParamType::Scalar(kind) => write!(f, "{kind:?}"),
            ParamType::Any => write!(f, "any"),
        }
    }
}
