use rand::Rng;

/// Weighted random sampling without replacement (Efraimidis-Spirakis): each
/// entry draws a key `u^(1/weight)` for `u ~ Uniform(0,1)`; the `n` entries
/// with the largest keys are selected. Larger weight biases the key toward
/// 1, so higher-weight peers are more likely to be chosen without ever
/// guaranteeing it — matching the "may not always be chosen" requirement of
/// weighted sampling without replacement.
pub fn sample_weighted<R: Rng + ?Sized>(
    entries: &[(String, i32)],
    n: usize,
    rng: &mut R,
) -> Vec<String> {
    let mut keyed: Vec<(f64, &str)> = entries
        .iter()
        .map(|(id, weight)| {
            let u: f64 = rng.gen_range(f64::MIN_POSITIVE..1.0);
            let key = u.powf(1.0 / (*weight).max(1) as f64);
            (key, id.as_str())
        })
        .collect();
    keyed.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap());
    keyed
        .into_iter()
        .take(n)
        .map(|(_, id)| id.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::sample_weighted;
    use rand::SeedableRng;

    #[test]
    fn samples_no_more_than_requested_and_never_repeats_an_id() {
        let entries = vec![
            ("a".to_string(), 50),
            ("b".to_string(), 50),
            ("c".to_string(), 50),
        ];
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let sample = sample_weighted(&entries, 2, &mut rng);
        assert_eq!(sample.len(), 2);
        assert_ne!(sample[0], sample[1]);
    }

    #[test]
    fn requesting_more_than_available_returns_all_entries() {
        let entries = vec![("a".to_string(), 50), ("b".to_string(), 50)];
        let mut rng = rand::rngs::StdRng::seed_from_u64(2);
        let sample = sample_weighted(&entries, 10, &mut rng);
        assert_eq!(sample.len(), 2);
    }

    #[test]
    fn zero_entries_returns_empty() {
        let entries: Vec<(String, i32)> = Vec::new();
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);
        assert!(sample_weighted(&entries, 5, &mut rng).is_empty());
    }

    #[test]
    fn heavily_weighted_entry_wins_far_more_often_than_chance() {
        let entries = vec![("heavy".to_string(), 100), ("light".to_string(), 1)];
        let mut rng = rand::rngs::StdRng::seed_from_u64(4);
        let mut heavy_wins = 0;
        for _ in 0..200 {
            let sample = sample_weighted(&entries, 1, &mut rng);
            if sample[0] == "heavy" {
                heavy_wins += 1;
            }
        }
        assert!(heavy_wins > 150);
    }
}
