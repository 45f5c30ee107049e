use std::collections::HashMap;

use crate::core::spec::ContractionSpec;
use crate::core::types::DimId;

/// Derives the element stride of every dimension of one tensor.
///
/// The stride of a dimension is the product of the storage (outer) extents of
/// all dimensions to its right in the tensor's dim list. Link entries are
/// resolved afterwards: a secondary (window) dimension inherits the
/// unmultiplied stride of its primary, so that advancing the window by one
/// slides the storage pointer by one primary step. Stride multipliers scale
/// the listed dimensions last.
pub fn build_strides(
    dim_ids: &[DimId],
    outer_size_of: impl Fn(DimId) -> i64,
    link_sec_to_prim: Option<&HashMap<DimId, DimId>>,
    stride_mult: Option<&HashMap<DimId, i64>>,
) -> HashMap<DimId, i64> {
    let mut strides: HashMap<DimId, i64> = HashMap::new();

    let mut stride = 1i64;
    for &dim in dim_ids.iter().rev() {
        strides.insert(dim, stride);
        stride *= outer_size_of(dim);
    }

    if let Some(link) = link_sec_to_prim {
        for (&sec, &prim) in link {
            if let Some(&prim_stride) = strides.get(&prim) {
                strides.insert(sec, prim_stride);
            }
        }
    }

    if let Some(mult) = stride_mult {
        for (&dim, &m) in mult {
            if let Some(s) = strides.get_mut(&dim) {
                *s *= m;
            }
        }
    }

    strides
}

/// All four stride maps of a contraction, in elements.
#[derive(Debug, Clone)]
pub struct StrideMaps {
    pub left: HashMap<DimId, i64>,
    pub right: HashMap<DimId, i64>,
    pub out: HashMap<DimId, i64>,
    pub out_aux: HashMap<DimId, i64>,
}

impl StrideMaps {
    pub fn derive(spec: &ContractionSpec) -> Self {
        let link = spec.link_sec_to_prim.as_ref();

        let left = build_strides(
            &spec.dim_ids_left,
            |d| spec.outer_size(&spec.sizes_outer_left, d),
            link,
            spec.stride_mult_left.as_ref(),
        );
        let right = build_strides(
            &spec.dim_ids_right,
            |d| spec.outer_size(&spec.sizes_outer_right, d),
            link,
            spec.stride_mult_right.as_ref(),
        );
        let out = build_strides(
            &spec.dim_ids_out,
            |d| spec.outer_size(&spec.sizes_outer_out, d),
            None,
            None,
        );

        // The aux tensor shares the output dim list; dims stored with extent 1
        // broadcast with stride 0.
        let out_aux = match &spec.sizes_outer_out_aux {
            Some(aux_sizes) => {
                let mut strides = build_strides(
                    &spec.dim_ids_out,
                    |d| aux_sizes.get(&d).copied().unwrap_or(1),
                    None,
                    None,
                );
                for (&dim, s) in strides.iter_mut() {
                    if aux_sizes.get(&dim).copied().unwrap_or(1) == 1 {
                        *s = 0;
                    }
                }
                strides
            }
            None => out.clone(),
        };

        Self { left, right, out, out_aux }
    }

    pub fn of(map: &HashMap<DimId, i64>, dim: DimId) -> i64 {
        map.get(&dim).copied().unwrap_or(0)
    }
}
