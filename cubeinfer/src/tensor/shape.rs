//! Shape arithmetic shared by tensors, kernels and the graph builder.

pub fn numel(shape: &[usize]) -> usize {
    shape.iter().copied().product::<usize>()
}

/// Raw shape a freshly constructed `(channels, rows, cols)` tensor reports.
pub fn default_raw_shape(channels: usize, rows: usize, cols: usize) -> Vec<usize> {
    if channels == 1 && rows == 1 {
        vec![cols]
    } else if channels == 1 {
        vec![rows, cols]
    } else {
        vec![channels, rows, cols]
    }
}

/// Physical `(channels, rows, cols)` a raw shape of rank 1 to 3 occupies.
pub fn physical_dims(shape: &[usize]) -> (usize, usize, usize) {
    match *shape {
        [len] => (1, len, 1),
        [rows, cols] => (1, rows, cols),
        [channels, rows, cols] => (channels, rows, cols),
        _ => panic!("raw shape must have 1 to 3 dims, got {:?}", shape),
    }
}

/// Resolve a single `-1` wildcard against `total` elements.
///
/// Returns `None` when more than one wildcard is present, a dim is zero or
/// below `-1`, or the known dims do not divide `total`.
pub fn infer_wildcard(dims: &[i64], total: usize) -> Option<Vec<usize>> {
    let mut wildcard = None;
    let mut known = 1usize;
    for (idx, dim) in dims.iter().copied().enumerate() {
        match dim {
            -1 if wildcard.is_none() => wildcard = Some(idx),
            d if d > 0 => known = known.checked_mul(d as usize)?,
            _ => return None,
        }
    }
    let mut resolved: Vec<usize> = dims.iter().map(|d| (*d).max(0) as usize).collect();
    match wildcard {
        Some(idx) => {
            if known == 0 || total % known != 0 {
                return None;
            }
            resolved[idx] = total / known;
        }
        None => {
            if known != total {
                return None;
            }
        }
    }
    Some(resolved)
}

/// Per-item tensor dims for a declared operand shape (batch first).
///
/// Rank 4 is `(batch, c, h, w)`, rank 3 is `(batch, rows, cols)` and rank 2
/// is `(batch, features)`.
pub fn operand_dims(shape: &[i32]) -> Option<(usize, usize, usize)> {
    let dim = |idx: usize| -> Option<usize> {
        let value = *shape.get(idx)?;
        if value > 0 {
            Some(value as usize)
        } else {
            None
        }
    };
    match shape.len() {
        4 => Some((dim(1)?, dim(2)?, dim(3)?)),
        3 => Some((1, dim(1)?, dim(2)?)),
        2 => Some((1, dim(1)?, 1)),
        _ => None,
    }
}
