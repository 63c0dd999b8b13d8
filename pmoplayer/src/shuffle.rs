use rand::Rng;
use rand::seq::SliceRandom;

/// Moves `items[pinned]` to the front and randomly permutes everything after
/// it. Without a (valid) pinned index the whole list is permuted.
pub fn shuffle_around<T>(items: &mut Vec<T>, pinned: Option<usize>) {
    shuffle_around_with(items, pinned, &mut rand::rng());
}

pub fn shuffle_around_with<T, R: Rng + ?Sized>(items: &mut Vec<T>, pinned: Option<usize>, rng: &mut R) {
    match pinned {
        Some(index) if index < items.len() => {
            let first = items.remove(index);
            items.shuffle(rng);
            items.insert(0, first);
        }
        _ => items.shuffle(rng),
    }
}

pub fn shuffled<T>(mut items: Vec<T>) -> Vec<T> {
    items.shuffle(&mut rand::rng());
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_pinned_item_moves_to_front() {
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut items = vec!["A", "B", "C", "D"];
            shuffle_around_with(&mut items, Some(1), &mut rng);

            assert_eq!(items[0], "B");
            let mut rest = items[1..].to_vec();
            rest.sort();
            assert_eq!(rest, vec!["A", "C", "D"]);
        }
    }

    #[test]
    fn test_out_of_range_pin_permutes_everything() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut items = vec![1, 2, 3];
        shuffle_around_with(&mut items, Some(9), &mut rng);
        items.sort();
        assert_eq!(items, vec![1, 2, 3]);

        let mut empty: Vec<u8> = Vec::new();
        shuffle_around(&mut empty, Some(0));
        assert!(empty.is_empty());
    }

    #[test]
    fn test_shuffled_keeps_elements() {
        let mut items = shuffled((0..20).collect::<Vec<_>>());
        items.sort();
        assert_eq!(items, (0..20).collect::<Vec<_>>());
    }
}
