use serde::{Serialize, Deserialize};

/// Opaque global identifier of a tensor dimension. Two dimensions sharing a
/// `DimId` across tensors are the same axis and must agree on their inner size.
pub type DimId = i64;

/// Contraction role of a dimension, derived by the classifier.
///
/// Shortcuts:
///   C: batch dimensions which appear in all three tensors.
///   M: dimensions which appear in the left input and the output.
///   N: dimensions which appear in the right input and the output.
///   K: reduction dimensions which appear in both inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DimKind {
    C,
    M,
    N,
    K,
    Undef,
}

/// Execution disposition of a planned loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecKind {
    /// Sequential loop walked by the engine.
    Seq,
    /// Loop partitioned across tasks.
    Par,
    /// Dimension consumed by the inner micro-kernel.
    Prim,
    /// Dimension consumed by a packing copy.
    Pack,
}

/// Element type of a tensor operand.
///
/// The complex types are planar: real and imaginary parts live in separate
/// halves addressed through a leading C dimension of extent 2, and
/// `scalar_bytes` reports the width of one real scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Fp32,
    Fp64,
    Bf16,
    Fp16,
    CpxFp32,
    CpxFp64,
}

impl DataType {
    pub fn scalar_bytes(self) -> i64 {
        match self {
            DataType::Fp32 | DataType::CpxFp32 => 4,
            DataType::Fp64 | DataType::CpxFp64 => 8,
            DataType::Bf16 | DataType::Fp16 => 2,
        }
    }

    pub fn is_cpx(self) -> bool {
        matches!(self, DataType::CpxFp32 | DataType::CpxFp64)
    }
}

/// Kind of a kernel slot. First-touch kernels operate on `(aux?, out)`,
/// last-touch kernels on `(out)`, the main kernel on `(left, right, out)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KernelKind {
    Undef,
    Zero,
    Copy,
    Add,
    Relu,
    Madd,
    CpxZero,
    CpxCopy,
    CpxAdd,
    CpxMadd,
}

impl KernelKind {
    pub fn is_defined(self) -> bool {
        self != KernelKind::Undef
    }

    pub fn is_cpx(self) -> bool {
        matches!(
            self,
            KernelKind::CpxZero | KernelKind::CpxCopy | KernelKind::CpxAdd | KernelKind::CpxMadd
        )
    }
}

/// First/last-touch annotation of a planned loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TouchKind {
    /// No touch fired at this loop.
    None,
    /// First touch before the iteration range, last touch after it.
    BeforeAfterIter,
    /// First touch before the body and last touch after the body of every
    /// iteration.
    EveryIter,
}

/// Error taxonomy of the compile pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractionError {
    /// A dimension id appears in an illegal combination of tensors or repeats
    /// within one tensor.
    InvalidDim,
    /// Inner size exceeds an outer size, or sizes disagree across tensors.
    InvalidSize,
    /// Complex kernels requested without a leading C dimension of extent 2.
    InvalidCpxDim,
    /// The optimizer or packing planner could not satisfy its constraints.
    CompilationFailed,
    /// `contract` was called before a successful `compile`.
    CalledBeforeCompile,
    /// No kernel is available for the requested kind and dtype combination.
    KernelUnsupported,
}

impl std::fmt::Display for ContractionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            ContractionError::InvalidDim => "invalid dimension configuration",
            ContractionError::InvalidSize => "inconsistent dimension sizes",
            ContractionError::InvalidCpxDim => "complex mode requires a leading C dimension of extent 2",
            ContractionError::CompilationFailed => "compilation failed",
            ContractionError::CalledBeforeCompile => "contract called before compile",
            ContractionError::KernelUnsupported => "unsupported kernel for the given data types",
        };
        write!(f, "{}", msg)
    }
}

impl std::error::Error for ContractionError {}
