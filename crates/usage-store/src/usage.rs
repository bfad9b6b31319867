use serde::{Deserialize, Serialize};

/// A usage aggregate: how often, and between when, a module was used.
///
/// At the module tier `user` is the empty string. At the user tier it names
/// the user the row belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleUsage {
    pub module: String,
    pub user: String,
    pub count: i64,
    /// Earliest timestamp merged into this row.
    pub first_use: i64,
    /// Latest timestamp merged into this row.
    pub last_use: i64,
}

impl ModuleUsage {
    /// Creates the aggregate for a key's first occurrence.
    pub fn first(module: impl Into<String>, user: impl Into<String>, timestamp: i64) -> Self {
        Self {
            module: module.into(),
            user: user.into(),
            count: 1,
            first_use: timestamp,
            last_use: timestamp,
        }
    }

    /// Folds one more occurrence at `timestamp` into the aggregate.
    pub fn record(&mut self, timestamp: i64) {
        self.count += 1;
        self.first_use = self.first_use.min(timestamp);
        self.last_use = self.last_use.max(timestamp);
    }

    /// Folds another aggregate for the same key into this one.
    ///
    /// Commutative and associative, so arrival order never changes the result.
    pub fn merge(&mut self, other: &ModuleUsage) {
        self.count += other.count;
        self.first_use = self.first_use.min(other.first_use);
        self.last_use = self.last_use.max(other.last_use);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_occurrence() {
        let usage = ModuleUsage::first("moduleA", "userA", 7);
        assert_eq!(usage.count, 1);
        assert_eq!(usage.first_use, 7);
        assert_eq!(usage.last_use, 7);
    }

    #[test]
    fn record_out_of_order() {
        let mut usage = ModuleUsage::first("moduleA", "", 5);
        usage.record(1);
        assert_eq!(usage.count, 2);
        assert_eq!(usage.first_use, 1);
        assert_eq!(usage.last_use, 5);
    }

    #[test]
    fn merge_is_commutative() {
        let a = ModuleUsage {
            module: "m".to_string(),
            user: String::new(),
            count: 3,
            first_use: 10,
            last_use: 20,
        };
        let b = ModuleUsage {
            module: "m".to_string(),
            user: String::new(),
            count: 2,
            first_use: 5,
            last_use: 15,
        };

        let mut ab = a.clone();
        ab.merge(&b);
        let mut ba = b.clone();
        ba.merge(&a);

        assert_eq!(ab, ba);
        assert_eq!(ab.count, 5);
        assert_eq!(ab.first_use, 5);
        assert_eq!(ab.last_use, 20);
    }

    #[test]
    fn record_matches_merging_single_occurrences() {
        let timestamps = [9, 3, 12, 3, 7];

        let mut recorded = ModuleUsage::first("m", "u", timestamps[0]);
        for ts in &timestamps[1..] {
            recorded.record(*ts);
        }

        let mut merged = ModuleUsage::first("m", "u", timestamps[4]);
        for ts in timestamps[..4].iter().rev() {
            merged.merge(&ModuleUsage::first("m", "u", *ts));
        }

        assert_eq!(recorded, merged);
    }
}
