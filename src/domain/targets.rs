use std::collections::BTreeSet;

/// Paint seeds worth tracking for the default market item.
pub const DEFAULT_TARGET_SEEDS: &[i64] = &[
    16, 48, 66, 67, 96, 111, 117, 159, 259, 263, 273, 297, 308, 321, 324, 341, 347, 370, 426, 461,
    482, 517, 530, 567, 587, 674, 695, 723, 764, 772, 781, 790, 792, 843, 880, 885, 904, 948, 990,
];

/// Static allow-list of pattern ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSet {
    seeds: BTreeSet<i64>,
}

impl TargetSet {
    pub fn new<I: IntoIterator<Item = i64>>(seeds: I) -> Self {
        Self {
            seeds: seeds.into_iter().collect(),
        }
    }

    pub fn contains(&self, pattern_id: i64) -> bool {
        self.seeds.contains(&pattern_id)
    }

    pub fn len(&self) -> usize {
        self.seeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seeds.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        self.seeds.iter().copied()
    }
}

impl Default for TargetSet {
    fn default() -> Self {
        Self::new(DEFAULT_TARGET_SEEDS.iter().copied())
    }
}
