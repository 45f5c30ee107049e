use std::collections::{HashMap, HashSet};

use crate::core::spec::ContractionSpec;
use crate::core::types::{ContractionError, DimId, DimKind};

/// Result of classifying every dimension of a contraction.
///
/// The C/M/N lists preserve the order of appearance in the output tensor; the
/// K list preserves left-then-right order of appearance. These orders are the
/// stable tie-break used by the loop optimizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimClassification {
    pub kinds: HashMap<DimId, DimKind>,
    pub dims_c: Vec<DimId>,
    pub dims_m: Vec<DimId>,
    pub dims_n: Vec<DimId>,
    pub dims_k: Vec<DimId>,
}

impl DimClassification {
    pub fn kind(&self, dim: DimId) -> DimKind {
        self.kinds.get(&dim).copied().unwrap_or(DimKind::Undef)
    }
}

fn unique_set(ids: &[DimId]) -> Result<HashSet<DimId>, ContractionError> {
    let set: HashSet<DimId> = ids.iter().copied().collect();
    if set.len() != ids.len() {
        return Err(ContractionError::InvalidDim);
    }
    Ok(set)
}

/// Assigns every dimension id of the three tensors a C/M/N/K kind.
///
/// A dimension appearing in exactly one input and not in the output is legal
/// only as the secondary of a link entry whose primary appears in the other
/// input and in the output; such window dimensions classify as K.
pub fn classify(spec: &ContractionSpec) -> Result<DimClassification, ContractionError> {
    let in_left = unique_set(&spec.dim_ids_left)?;
    let in_right = unique_set(&spec.dim_ids_right)?;
    let in_out = unique_set(&spec.dim_ids_out)?;

    let mut kinds: HashMap<DimId, DimKind> = HashMap::new();
    let mut dims_c = Vec::new();
    let mut dims_m = Vec::new();
    let mut dims_n = Vec::new();
    let mut dims_k = Vec::new();

    // C/M/N ordered by the output tensor.
    for &dim in &spec.dim_ids_out {
        let l = in_left.contains(&dim);
        let r = in_right.contains(&dim);
        let kind = match (l, r) {
            (true, true) => DimKind::C,
            (true, false) => DimKind::M,
            (false, true) => DimKind::N,
            (false, false) => return Err(ContractionError::InvalidDim),
        };
        kinds.insert(dim, kind);
        match kind {
            DimKind::C => dims_c.push(dim),
            DimKind::M => dims_m.push(dim),
            DimKind::N => dims_n.push(dim),
            _ => unreachable!(),
        }
    }

    // K ordered by left-then-right appearance.
    for &dim in spec.dim_ids_left.iter().chain(spec.dim_ids_right.iter()) {
        if kinds.contains_key(&dim) {
            continue;
        }
        let l = in_left.contains(&dim);
        let r = in_right.contains(&dim);
        if l && r {
            kinds.insert(dim, DimKind::K);
            dims_k.push(dim);
            continue;
        }
        // Single-input dimension: must be a linked window dimension whose
        // primary sits in the other input and in the output.
        let prim = spec
            .link_sec_to_prim
            .as_ref()
            .and_then(|m| m.get(&dim).copied())
            .ok_or(ContractionError::InvalidDim)?;
        let prim_in_other = (l && in_right.contains(&prim)) || (r && in_left.contains(&prim));
        if !prim_in_other || !in_out.contains(&prim) {
            return Err(ContractionError::InvalidDim);
        }
        kinds.insert(dim, DimKind::K);
        dims_k.push(dim);
    }

    validate_sizes(spec, &kinds)?;

    Ok(DimClassification { kinds, dims_c, dims_m, dims_n, dims_k })
}

fn validate_sizes(
    spec: &ContractionSpec,
    kinds: &HashMap<DimId, DimKind>,
) -> Result<(), ContractionError> {
    for &dim in kinds.keys() {
        let inner = match spec.sizes_inner.get(&dim) {
            Some(&s) if s > 0 => s,
            _ => return Err(ContractionError::InvalidSize),
        };
        for outer in [
            &spec.sizes_outer_left,
            &spec.sizes_outer_right,
            &spec.sizes_outer_out,
        ] {
            if let Some(map) = outer {
                if let Some(&o) = map.get(&dim) {
                    if o < inner {
                        return Err(ContractionError::InvalidSize);
                    }
                }
            }
        }
    }
    Ok(())
}
