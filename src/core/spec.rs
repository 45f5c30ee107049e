use std::collections::HashMap;

use serde::{Serialize, Deserialize};

use crate::core::types::{DataType, DimId, KernelKind};

/// Complete description of one binary tensor contraction,
/// `out[C,M,N] (+)= f(left[C,M,K], right[C,N,K])`, as supplied by the caller.
///
/// Dimension id lists are ordered outer-to-inner in storage order. Outer sizes
/// default to the inner sizes; an outer size may exceed the inner size for
/// padded spatial dimensions. The optional link map declares that advancing a
/// secondary (window-position) dimension by one slides the primary (spatial)
/// dimension by one in storage, which expresses convolutions as contractions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractionSpec {
    pub dim_ids_left: Vec<DimId>,
    pub dim_ids_right: Vec<DimId>,
    pub dim_ids_out: Vec<DimId>,

    /// Logical extent of every dimension referenced by any tensor.
    pub sizes_inner: HashMap<DimId, i64>,
    /// Storage extents; `None` means identical to the inner sizes.
    pub sizes_outer_left: Option<HashMap<DimId, i64>>,
    pub sizes_outer_right: Option<HashMap<DimId, i64>>,
    pub sizes_outer_out: Option<HashMap<DimId, i64>>,
    /// Storage extents of the auxiliary (bias) tensor; dims with outer size 1
    /// broadcast. `None` means the aux tensor shares the output layout.
    pub sizes_outer_out_aux: Option<HashMap<DimId, i64>>,

    /// Per-dimension stride multipliers (strided convolutions).
    pub stride_mult_left: Option<HashMap<DimId, i64>>,
    pub stride_mult_right: Option<HashMap<DimId, i64>>,
    /// Secondary (window) dimension -> primary (spatial) dimension.
    pub link_sec_to_prim: Option<HashMap<DimId, DimId>>,

    pub dtype_left: DataType,
    pub dtype_right: DataType,
    pub dtype_comp: DataType,
    pub dtype_out: DataType,

    pub ktype_first_touch: KernelKind,
    pub ktype_main: KernelKind,
    pub ktype_last_touch: KernelKind,

    /// Targeted number of parallel tasks; `None` uses the host parallelism.
    pub num_threads: Option<usize>,
    /// Targeted primitive block extents of the inner micro-kernel.
    pub target_prim_m: i64,
    pub target_prim_n: i64,
    pub target_prim_k: i64,

    /// Force repacking of an input side regardless of its storage layout.
    pub pack_left: bool,
    pub pack_right: bool,

    /// Emit compile-time diagnostics on stderr.
    pub verbose: bool,
}

impl ContractionSpec {
    pub fn new(
        dim_ids_left: Vec<DimId>,
        dim_ids_right: Vec<DimId>,
        dim_ids_out: Vec<DimId>,
        sizes_inner: HashMap<DimId, i64>,
        dtype: DataType,
        ktype_first_touch: KernelKind,
        ktype_main: KernelKind,
        ktype_last_touch: KernelKind,
    ) -> Self {
        Self {
            dim_ids_left,
            dim_ids_right,
            dim_ids_out,
            sizes_inner,
            sizes_outer_left: None,
            sizes_outer_right: None,
            sizes_outer_out: None,
            sizes_outer_out_aux: None,
            stride_mult_left: None,
            stride_mult_right: None,
            link_sec_to_prim: None,
            dtype_left: dtype,
            dtype_right: dtype,
            dtype_comp: dtype,
            dtype_out: dtype,
            ktype_first_touch,
            ktype_main,
            ktype_last_touch,
            num_threads: None,
            target_prim_m: 32,
            target_prim_n: 32,
            target_prim_k: 32,
            pack_left: false,
            pack_right: false,
            verbose: false,
        }
    }

    /// Storage extent of `dim` in the given outer size map, falling back to
    /// the inner size.
    pub fn outer_size(&self, outer: &Option<HashMap<DimId, i64>>, dim: DimId) -> i64 {
        outer
            .as_ref()
            .and_then(|m| m.get(&dim).copied())
            .unwrap_or_else(|| self.sizes_inner.get(&dim).copied().unwrap_or(1))
    }

    pub fn num_tasks_target(&self) -> i64 {
        let t = self.num_threads.unwrap_or_else(|| {
            std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
        });
        t as i64
    }
}
