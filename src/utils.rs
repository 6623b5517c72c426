/// Splits `items` into `parts` contiguous slices whose lengths differ by at most one.
/// The first `len % parts` slices get the extra element.
pub fn split_evenly<T: Clone>(items: &[T], parts: usize) -> Vec<Vec<T>> {
    let parts = parts.clamp(1, items.len().max(1));
    let (base, extra) = (items.len() / parts, items.len() % parts);
    let mut out = Vec::with_capacity(parts);
    let mut start = 0;
    for i in 0..parts {
        let len = base + usize::from(i < extra);
        out.push(items[start..start + len].to_vec());
        start += len;
    }
    out
}

pub fn ceil_div(numerator: u64, denominator: u64) -> u64 {
    numerator.div_ceil(denominator)
}

/// `O -> 3 -> 7 -> D` rendering of a route's nodes.
pub fn format_path(nodes: &[usize]) -> String {
    let last = nodes.len().saturating_sub(1);
    nodes
        .iter()
        .enumerate()
        .map(|(pos, node)| match pos {
            0 => "O".to_string(),
            p if p == last => "D".to_string(),
            _ => node.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" -> ")
}
