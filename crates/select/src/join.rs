use rustc_hash::FxHashSet;

/// Keep the `left` records whose key appears among the `right` keys.
///
/// Order-preserving on `left`; empty keys never match.
pub fn join_by_identity<L, R, FL, FR>(left: Vec<L>, right: &[R], left_key: FL, right_key: FR) -> Vec<L>
where
    FL: Fn(&L) -> Option<&str>,
    FR: Fn(&R) -> Option<&str>,
{
    let index: FxHashSet<&str> = right.iter().filter_map(|r| right_key(r)).filter(|k| !k.is_empty()).collect();
    if index.is_empty() {
        return Vec::new();
    }
    left.into_iter()
        .filter(|l| left_key(l).map_or(false, |k| !k.is_empty() && index.contains(k)))
        .collect()
}
