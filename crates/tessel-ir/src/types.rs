//! Element and block types of the kernel IR.
//!
//! Every IR value is either a scalar or a statically shaped block whose lanes
//! hold the same [`Element`].

/// Width of a scalar type in bytes.
pub type Bytes = u8;

/// The kind of a scalar type.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum ScalarKind {
    Bool,
    Sint,
    Uint,
    Float,
    /// Brain floating point.
    BFloat,
}

/// A scalar type: kind + byte width.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct Scalar {
    pub kind: ScalarKind,
    pub width: Bytes,
}

impl Scalar {
    pub const BOOL: Self = Self::new(ScalarKind::Bool, 1);
    pub const I8: Self = Self::new(ScalarKind::Sint, 1);
    pub const I16: Self = Self::new(ScalarKind::Sint, 2);
    pub const I32: Self = Self::new(ScalarKind::Sint, 4);
    pub const I64: Self = Self::new(ScalarKind::Sint, 8);
    pub const U8: Self = Self::new(ScalarKind::Uint, 1);
    pub const U16: Self = Self::new(ScalarKind::Uint, 2);
    pub const U32: Self = Self::new(ScalarKind::Uint, 4);
    pub const U64: Self = Self::new(ScalarKind::Uint, 8);
    pub const F16: Self = Self::new(ScalarKind::Float, 2);
    pub const BF16: Self = Self::new(ScalarKind::BFloat, 2);
    pub const F32: Self = Self::new(ScalarKind::Float, 4);
    pub const F64: Self = Self::new(ScalarKind::Float, 8);

    const fn new(kind: ScalarKind, width: Bytes) -> Self {
        Self { kind, width }
    }

    pub fn is_float(self) -> bool {
        matches!(self.kind, ScalarKind::Float | ScalarKind::BFloat)
    }

    pub fn is_integer(self) -> bool {
        matches!(self.kind, ScalarKind::Sint | ScalarKind::Uint)
    }

    pub fn is_bool(self) -> bool {
        self.kind == ScalarKind::Bool
    }
}

/// What a single lane of a value holds.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum Element {
    Scalar(Scalar),
    /// A global-memory address of a value of the given scalar type.
    Pointer(Scalar),
}

impl Element {
    /// The scalar itself, or the pointee for pointers.
    pub fn scalar(self) -> Scalar {
        match self {
            Self::Scalar(s) | Self::Pointer(s) => s,
        }
    }

    pub fn is_pointer(self) -> bool {
        matches!(self, Self::Pointer(_))
    }
}

/// The type of an IR value. An empty shape is a scalar.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Type {
    pub element: Element,
    pub shape: Vec<usize>,
}

impl Type {
    pub fn scalar(scalar: Scalar) -> Self {
        Self {
            element: Element::Scalar(scalar),
            shape: Vec::new(),
        }
    }

    pub fn pointer(pointee: Scalar) -> Self {
        Self {
            element: Element::Pointer(pointee),
            shape: Vec::new(),
        }
    }

    pub fn block(element: Element, shape: Vec<usize>) -> Self {
        Self { element, shape }
    }

    pub fn is_block(&self) -> bool {
        !self.shape.is_empty()
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn num_elements(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn with_shape(&self, shape: Vec<usize>) -> Self {
        Self {
            element: self.element,
            shape,
        }
    }

    pub fn with_element(&self, element: Element) -> Self {
        Self {
            element,
            shape: self.shape.clone(),
        }
    }
}
