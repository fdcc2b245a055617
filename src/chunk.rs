/// Splits `items` into `num_groups` contiguous groups of nearly equal size.
///
/// The first `len % num_groups` groups get one extra item. Order is
/// preserved and the concatenation of the groups equals the input.
///
/// # Panics
///
/// When `num_groups` is zero or larger than the number of items.
pub fn chunk_evenly<T>(items: Vec<T>, num_groups: usize) -> Vec<Vec<T>> {
    assert!(num_groups >= 1 && num_groups <= items.len(),
        "chunk_evenly() requires 1 <= num_groups <= items.len()");
    let base_size = items.len() / num_groups;
    let bigger_groups = items.len() % num_groups;

    let mut rest = items;
    let mut groups = Vec::with_capacity(num_groups);
    for index in 0..num_groups {
        let size = if index < bigger_groups { base_size + 1 } else { base_size };
        let tail = rest.split_off(size);
        groups.push(rest);
        rest = tail;
    }
    groups
}
