//! Three-tier skill triage for a job description.
//!
//! Invariant: a skill name occupies at most one bucket. Every constructor
//! and mutator preserves it, including deserialization of persisted or
//! stored partitions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Critical,
    Important,
    Extra,
}

impl Bucket {
    /// Bucket order used when the partition is flattened.
    pub const ALL: [Bucket; 3] = [Bucket::Critical, Bucket::Important, Bucket::Extra];

    pub fn as_str(self) -> &'static str {
        match self {
            Bucket::Critical => "critical",
            Bucket::Important => "important",
            Bucket::Extra => "extra",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Bucket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Bucket::ALL
            .into_iter()
            .find(|b| b.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown skill bucket '{s}'"))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct BucketLists {
    #[serde(default)]
    critical: Vec<String>,
    #[serde(default)]
    important: Vec<String>,
    #[serde(default)]
    extra: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BucketLists")]
pub struct SkillPartition {
    critical: Vec<String>,
    important: Vec<String>,
    extra: Vec<String>,
}

impl From<BucketLists> for SkillPartition {
    fn from(lists: BucketLists) -> Self {
        let mut partition = SkillPartition::default();
        for (bucket, names) in [
            (Bucket::Critical, lists.critical),
            (Bucket::Important, lists.important),
            (Bucket::Extra, lists.extra),
        ] {
            for name in names {
                partition.add(&name, bucket);
            }
        }
        partition
    }
}

impl SkillPartition {
    /// Places every skill in `critical`, keeping the first of any duplicates.
    pub fn categorize<I, S>(initial: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut partition = SkillPartition::default();
        for name in initial {
            let name = name.into();
            if partition.bucket_of(&name).is_none() {
                partition.critical.push(name);
            }
        }
        partition
    }

    /// Seeds a partition from a JD's skills field, which is either a flat
    /// list (all critical) or a `{critical, important, extra}` map. Entries
    /// that are not strings are skipped in either shape.
    pub fn from_skills_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Array(items)) => Self::categorize(string_entries(items)),
            Some(Value::Object(map)) => {
                let mut partition = SkillPartition::default();
                for bucket in Bucket::ALL {
                    if let Some(Value::Array(items)) = map.get(bucket.as_str()) {
                        for name in string_entries(items) {
                            partition.add(&name, bucket);
                        }
                    }
                }
                partition
            }
            _ => SkillPartition::default(),
        }
    }

    pub fn bucket(&self, bucket: Bucket) -> &[String] {
        match bucket {
            Bucket::Critical => &self.critical,
            Bucket::Important => &self.important,
            Bucket::Extra => &self.extra,
        }
    }

    fn bucket_mut(&mut self, bucket: Bucket) -> &mut Vec<String> {
        match bucket {
            Bucket::Critical => &mut self.critical,
            Bucket::Important => &mut self.important,
            Bucket::Extra => &mut self.extra,
        }
    }

    pub fn bucket_of(&self, skill: &str) -> Option<Bucket> {
        Bucket::ALL
            .into_iter()
            .find(|b| self.bucket(*b).iter().any(|s| s == skill))
    }

    /// Moves `skill` from one bucket to the end of another.
    ///
    /// Returns `false` without changing anything when `from == to` or the
    /// skill is not in `from`.
    pub fn move_skill(&mut self, skill: &str, from: Bucket, to: Bucket) -> bool {
        if from == to {
            return false;
        }
        let source = self.bucket_mut(from);
        let Some(position) = source.iter().position(|s| s == skill) else {
            return false;
        };
        let moved = source.remove(position);
        self.bucket_mut(to).push(moved);
        true
    }

    /// Appends a trimmed skill name to `bucket`.
    ///
    /// Returns `false` for blank names and for names already present in
    /// any bucket.
    pub fn add(&mut self, name: &str, bucket: Bucket) -> bool {
        let name = name.trim();
        if name.is_empty() || self.bucket_of(name).is_some() {
            return false;
        }
        self.bucket_mut(bucket).push(name.to_string());
        true
    }

    /// Removes every occurrence of `skill` from `bucket` only.
    pub fn remove(&mut self, skill: &str, bucket: Bucket) -> bool {
        let target = self.bucket_mut(bucket);
        let before = target.len();
        target.retain(|s| s != skill);
        target.len() != before
    }

    /// `critical ++ important ++ extra`, each bucket in its own order.
    pub fn flatten(&self) -> Vec<String> {
        Bucket::ALL
            .into_iter()
            .flat_map(|b| self.bucket(b).iter().cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.critical.len() + self.important.len() + self.extra.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn string_entries(items: &[Value]) -> impl Iterator<Item = String> + '_ {
    items.iter().filter_map(|v| v.as_str().map(str::to_string))
}
