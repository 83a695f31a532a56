use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;

use log::debug;

/// Runs the given test `iterations` times, every time with a random number
/// generator seeded by a fresh seed. The seed is logged so that a failing
/// iteration can be reproduced with [random_test_with_seed].
pub fn random_test<F>(iterations: usize, mut test: F)
where
    F: FnMut(&mut StdRng),
{
    let mut seeds = rand::rng();
    for _ in 0..iterations {
        let seed: u64 = seeds.random();
        random_test_with_seed(seed, &mut test);
    }
}

/// Runs the given test once with a generator seeded by `seed`.
pub fn random_test_with_seed<F>(seed: u64, test: &mut F)
where
    F: FnMut(&mut StdRng),
{
    debug!("random test seed {seed}");
    let mut rng = StdRng::seed_from_u64(seed);
    test(&mut rng);
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_random_test_is_reproducible() {
        let mut first = Vec::new();
        random_test_with_seed(42, &mut |rng: &mut StdRng| first.push(rng.random::<u64>()));

        let mut second = Vec::new();
        random_test_with_seed(42, &mut |rng: &mut StdRng| second.push(rng.random::<u64>()));

        assert_eq!(first, second);
    }

    #[test]
    fn test_random_test_iterations() {
        let mut count = 0;
        random_test(5, |_| count += 1);
        assert_eq!(count, 5);
    }
}
