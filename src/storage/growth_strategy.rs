/// Sizes of the partitions list at the moment a head-full event fires,
/// indexed the same way as `ReverseIndex::partitions` (0 = head).
#[derive(Debug, Clone)]
pub struct PartitionSizes {
    pub instances: Vec<u64>,
}

/// Geometric-partitioning size policy (C5, Lester/Moffat/Zobel). Expressed
/// as a trait so the cascade decision is unit-testable against bare
/// instance counts, without touching disk.
pub trait GrowthStrategy {
    /// Capacity of partition `level`: `b` at level 0, else
    /// `(r - 1)·r^(level-1)·b`.
    fn capacity(&self, level: usize) -> u64;

    /// Chooses the smallest `k >= 1` such that the cumulative instance
    /// count of partitions `0..=k` does not exceed `capacity(k)`. If no
    /// existing partition satisfies this, the caller should create a new
    /// one at `partitions.len()`.
    fn choose_merge_target(&self, partitions: &PartitionSizes) -> usize;
}

#[derive(Debug, Clone)]
pub struct GeometricGrowthStrategy {
    pub buffer_size: u64,
    pub growth_factor: u64,
}

impl GeometricGrowthStrategy {
    pub fn new(buffer_size: u64, growth_factor: u64) -> Self {
        GeometricGrowthStrategy { buffer_size, growth_factor }
    }
}

impl GrowthStrategy for GeometricGrowthStrategy {
    fn capacity(&self, level: usize) -> u64 {
        if level == 0 {
            self.buffer_size
        } else {
            (self.growth_factor - 1) * self.growth_factor.pow(level as u32 - 1) * self.buffer_size
        }
    }

    fn choose_merge_target(&self, partitions: &PartitionSizes) -> usize {
        let mut k = 1usize;
        loop {
            let cumulative: u64 = partitions.instances.iter().take(k + 1).sum();
            if k >= partitions.instances.len() || cumulative <= self.capacity(k) {
                return k;
            }
            k += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_matches_geometric_formula() {
        let strategy = GeometricGrowthStrategy::new(4096, 3);
        assert_eq!(strategy.capacity(0), 4096);
        assert_eq!(strategy.capacity(1), 2 * 4096);
        assert_eq!(strategy.capacity(2), 2 * 3 * 4096);
        assert_eq!(strategy.capacity(3), 2 * 9 * 4096);
    }

    #[test]
    fn chooses_smallest_fitting_level() {
        let strategy = GeometricGrowthStrategy::new(2, 3);
        // head just reached 2; no external partitions yet.
        let sizes = PartitionSizes { instances: vec![2] };
        assert_eq!(strategy.choose_merge_target(&sizes), 1);
    }
}
