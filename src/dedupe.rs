use std::collections::HashSet;
use std::hash::Hash;

/// Drops repeated items, keeping the first occurrence of each in its original position.
pub fn dedupe<T>(items: impl IntoIterator<Item = T>) -> Vec<T>
where
    T: Eq + Hash + Clone,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_first_seen_order() {
        let ids = vec!["123", "456", "456"];
        assert_eq!(dedupe(ids), vec!["123", "456"]);
    }

    #[test]
    fn interleaved_duplicates() {
        assert_eq!(dedupe([3, 1, 3, 2, 1, 3]), vec![3, 1, 2]);
    }

    #[test]
    fn empty_input() {
        assert!(dedupe(Vec::<String>::new()).is_empty());
    }
}
