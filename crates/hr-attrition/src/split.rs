use hr_core::core::ValidationError;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Row indices of a train/test partition, each in ascending order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

pub fn validate_test_fraction(test_fraction: f64) -> Result<(), ValidationError> {
    if test_fraction.is_finite() && test_fraction > 0.0 && test_fraction < 1.0 {
        Ok(())
    } else {
        Err(ValidationError::InvalidTestFraction(test_fraction))
    }
}

/// Splits binary `labels` so both partitions keep the class proportions.
///
/// The test partition holds `ceil(test_fraction * n)` rows. Each class is
/// allotted its proportional share by largest remainder, then clamped so it
/// keeps at least one row on each side.
pub fn stratified_split(
    labels: &[u8],
    test_fraction: f64,
    seed: u64,
) -> Result<SplitIndices, ValidationError> {
    validate_test_fraction(test_fraction)?;

    let n = labels.len();
    let n_test = (test_fraction * n as f64).ceil() as usize;
    if n_test < 2 || n < n_test + 2 {
        return Err(ValidationError::EmptyPartition {
            rows: n,
            fraction: test_fraction,
        });
    }

    let mut by_class: [Vec<usize>; 2] = [Vec::new(), Vec::new()];
    for (idx, &label) in labels.iter().enumerate() {
        by_class[usize::from(label == 1)].push(idx);
    }
    for (label, members) in by_class.iter().enumerate() {
        if members.len() < 2 {
            return Err(ValidationError::ClassTooSmall {
                label: label as u8,
                count: members.len(),
            });
        }
    }

    let counts = [by_class[0].len(), by_class[1].len()];
    let share = |count: usize| count as f64 * n_test as f64 / n as f64;
    let mut allot = [share(counts[0]).floor() as usize, share(counts[1]).floor() as usize];
    if allot[0] + allot[1] < n_test {
        let frac0 = share(counts[0]) - allot[0] as f64;
        let frac1 = share(counts[1]) - allot[1] as f64;
        if frac1 > frac0 {
            allot[1] += 1;
        } else {
            allot[0] += 1;
        }
    }

    // Keep at least one row of each class on both sides.
    let lower = 1.max(n_test.saturating_sub(counts[0] - 1));
    let upper = (counts[1] - 1).min(n_test - 1);
    allot[1] = allot[1].clamp(lower, upper);
    allot[0] = n_test - allot[1];

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(n - n_test);
    let mut test = Vec::with_capacity(n_test);
    for (members, take) in by_class.iter_mut().zip(allot) {
        members.shuffle(&mut rng);
        test.extend_from_slice(&members[..take]);
        train.extend_from_slice(&members[take..]);
    }
    train.sort_unstable();
    test.sort_unstable();

    Ok(SplitIndices { train, test })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `n` labels with `positives` evenly spaced ones.
    fn labels(n: usize, positives: usize) -> Vec<u8> {
        let step = n / positives;
        (0..n)
            .map(|i| u8::from(i % step == 0 && i / step < positives))
            .collect()
    }

    fn positives(labels: &[u8], idx: &[usize]) -> usize {
        idx.iter().filter(|&&i| labels[i] == 1).count()
    }

    #[test]
    fn test_split_sizes_across_fractions() {
        let y = labels(100, 20);
        assert_eq!(y.iter().filter(|&&l| l == 1).count(), 20);

        for (fraction, expected_test, expected_pos) in
            [(0.1, 10, 2), (0.2, 20, 4), (0.3, 30, 6), (0.4, 40, 8)]
        {
            let split = stratified_split(&y, fraction, 42).expect("split");
            assert_eq!(split.test.len(), expected_test, "fraction {fraction}");
            assert_eq!(split.train.len(), 100 - expected_test);
            assert_eq!(positives(&y, &split.test), expected_pos);
        }
    }

    #[test]
    fn test_partitions_are_disjoint_and_complete() {
        let y = labels(50, 10);
        let split = stratified_split(&y, 0.25, 1).expect("split");
        let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_same_seed_same_split() {
        let y = labels(60, 12);
        assert_eq!(
            stratified_split(&y, 0.2, 42).expect("a"),
            stratified_split(&y, 0.2, 42).expect("b")
        );
    }

    #[test]
    fn test_rare_class_kept_on_both_sides() {
        let mut y = vec![0u8; 30];
        y[3] = 1;
        y[17] = 1;
        let split = stratified_split(&y, 0.1, 42).expect("split");
        assert_eq!(positives(&y, &split.test), 1);
        assert_eq!(positives(&y, &split.train), 1);
    }

    #[test]
    fn test_invalid_fraction() {
        let y = labels(20, 5);
        for fraction in [0.0, 1.0, -0.2, f64::NAN] {
            assert!(matches!(
                stratified_split(&y, fraction, 42),
                Err(ValidationError::InvalidTestFraction(_))
            ));
        }
    }

    #[test]
    fn test_class_too_small() {
        let mut y = vec![0u8; 20];
        y[0] = 1;
        assert_eq!(
            stratified_split(&y, 0.2, 42).unwrap_err(),
            ValidationError::ClassTooSmall { label: 1, count: 1 }
        );
    }

    #[test]
    fn test_too_few_rows() {
        let y = vec![0, 1, 0];
        assert!(matches!(
            stratified_split(&y, 0.5, 42),
            Err(ValidationError::EmptyPartition { rows: 3, .. })
        ));
    }
}
