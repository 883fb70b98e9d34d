//! Typed arithmetic over the four resource value kinds offered by agents:
//! scalar quantities (cpus, mem, disk), disjoint integer ranges (ports),
//! string sets, and free text.
//!
//! Arithmetic is kind-preserving: adding/subtracting across different kinds
//! is a programmer error and returns [`Error::ValueKindMismatch`] rather
//! than panicking, since the core has no way to "unchecked" its way out of
//! a mismatch the way a host language with unchecked operators might.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, ValueKind};

/// A single closed interval `[begin, end]`, both inclusive, matching the
/// Mesos range-resource convention.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub begin: u64,
    pub end: u64,
}

impl Interval {
    pub fn new(begin: u64, end: u64) -> Self {
        assert!(begin <= end, "interval begin must not exceed end");
        Interval { begin, end }
    }

    pub fn single(value: u64) -> Self {
        Interval::new(value, value)
    }

    pub fn width(&self) -> u64 {
        self.end - self.begin + 1
    }

    fn contains(&self, other: &Interval) -> bool {
        self.begin <= other.begin && other.end <= self.end
    }

    fn overlaps_or_touches(&self, other: &Interval) -> bool {
        self.begin <= other.end.saturating_add(1) && other.begin <= self.end.saturating_add(1)
    }
}

/// A sorted, disjoint set of [`Interval`]s. Adjacent intervals are merged on
/// insertion so that `total()` and iteration order stay canonical.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeSet {
    intervals: Vec<Interval>,
}

impl RangeSet {
    pub fn new(mut intervals: Vec<Interval>) -> Self {
        intervals.sort();
        let mut merged: Vec<Interval> = Vec::with_capacity(intervals.len());
        for interval in intervals {
            match merged.last_mut() {
                Some(last) if last.overlaps_or_touches(&interval) => {
                    last.end = last.end.max(interval.end);
                    last.begin = last.begin.min(interval.begin);
                }
                _ => merged.push(interval),
            }
        }
        RangeSet { intervals: merged }
    }

    pub fn empty() -> Self {
        RangeSet::default()
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.intervals.iter().map(Interval::width).sum()
    }

    /// Whether `needle` is fully contained within some single interval of
    /// this set (ranges cannot be satisfied by stitching together two
    /// disjoint intervals).
    pub fn contains(&self, needle: &Interval) -> bool {
        self.intervals.iter().any(|i| i.contains(needle))
    }

    /// The lowest single port available in this set, if any.
    pub fn lowest(&self) -> Option<u64> {
        self.intervals.first().map(|i| i.begin)
    }

    /// Remove `needle` from this set, returning the updated set. `needle`
    /// must be contained in a single existing interval (callers check
    /// [`RangeSet::contains`] first); splits the interval into zero, one or
    /// two remaining pieces.
    pub fn remove(&self, needle: &Interval) -> RangeSet {
        let mut remaining = Vec::with_capacity(self.intervals.len() + 1);
        for interval in &self.intervals {
            if !interval.contains(needle) {
                remaining.push(*interval);
                continue;
            }
            if interval.begin < needle.begin {
                remaining.push(Interval::new(interval.begin, needle.begin - 1));
            }
            if needle.end < interval.end {
                remaining.push(Interval::new(needle.end + 1, interval.end));
            }
        }
        RangeSet::new(remaining)
    }

    pub fn union(&self, other: &RangeSet) -> RangeSet {
        let mut all = self.intervals.clone();
        all.extend(other.intervals.iter().copied());
        RangeSet::new(all)
    }

    /// Subset test used for `Value::Ranges` comparison: true if every
    /// interval in `self` fits inside some interval of `other`.
    pub fn is_subset_of(&self, other: &RangeSet) -> bool {
        self.intervals.iter().all(|i| other.contains(i))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Scalar(f64),
    Ranges(RangeSet),
    Set(BTreeSet<String>),
    Text(String),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Scalar(_) => ValueKind::Scalar,
            Value::Ranges(_) => ValueKind::Ranges,
            Value::Set(_) => ValueKind::Set,
            Value::Text(_) => ValueKind::Text,
        }
    }

    fn mismatch(&self, other: &Value) -> Error {
        Error::ValueKindMismatch {
            lhs_kind: self.kind().as_str(),
            rhs_kind: other.kind().as_str(),
        }
    }

    pub fn add(&self, other: &Value) -> Result<Value, Error> {
        match (self, other) {
            (Value::Scalar(a), Value::Scalar(b)) => Ok(Value::Scalar(a + b)),
            (Value::Ranges(a), Value::Ranges(b)) => Ok(Value::Ranges(a.union(b))),
            (Value::Set(a), Value::Set(b)) => Ok(Value::Set(a.union(b).cloned().collect())),
            (Value::Text(a), Value::Text(b)) => Ok(Value::Text(format!("{a}{b}"))),
            _ => Err(self.mismatch(other)),
        }
    }

    /// Subtract `other` from `self`. For `Ranges`, `other` must name
    /// sub-intervals that are each wholly contained in one interval of
    /// `self` (the caller is expected to have already matched via
    /// [`RangeSet::contains`] one interval at a time; here we apply them in
    /// order).
    pub fn subtract(&self, other: &Value) -> Result<Value, Error> {
        match (self, other) {
            (Value::Scalar(a), Value::Scalar(b)) => Ok(Value::Scalar(a - b)),
            (Value::Ranges(a), Value::Ranges(b)) => {
                let mut result = a.clone();
                for interval in b.intervals() {
                    result = result.remove(interval);
                }
                Ok(Value::Ranges(result))
            }
            (Value::Set(a), Value::Set(b)) => {
                Ok(Value::Set(a.difference(b).cloned().collect()))
            }
            _ => Err(self.mismatch(other)),
        }
    }

    /// `self >= other`: total comparison for `Scalar`, subset-of-the-other
    /// comparison for `Ranges`/`Set`.
    pub fn covers(&self, other: &Value) -> Result<bool, Error> {
        match (self, other) {
            (Value::Scalar(a), Value::Scalar(b)) => Ok(a >= b),
            (Value::Ranges(a), Value::Ranges(b)) => Ok(b.is_subset_of(a)),
            (Value::Set(a), Value::Set(b)) => Ok(b.is_subset(a)),
            (Value::Text(a), Value::Text(b)) => Ok(a == b),
            _ => Err(self.mismatch(other)),
        }
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Value::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_ranges(&self) -> Option<&RangeSet> {
        match self {
            Value::Ranges(r) => Some(r),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Scalar(v) => write!(f, "{v}"),
            Value::Ranges(r) => write!(
                f,
                "[{}]",
                r.intervals()
                    .iter()
                    .map(|i| format!("{}-{}", i.begin, i.end))
                    .collect::<Vec<_>>()
                    .join(",")
            ),
            Value::Set(s) => write!(f, "{{{}}}", s.iter().cloned().collect::<Vec<_>>().join(",")),
            Value::Text(t) => write!(f, "{t}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn ranges(pairs: &[(u64, u64)]) -> Value {
        Value::Ranges(RangeSet::new(
            pairs.iter().map(|(a, b)| Interval::new(*a, *b)).collect(),
        ))
    }

    #[rstest]
    #[case(Value::Scalar(2.0), Value::Scalar(0.5), Value::Scalar(1.5))]
    fn subtract_scalar(#[case] a: Value, #[case] b: Value, #[case] expected: Value) {
        assert_eq!(a.subtract(&b).unwrap(), expected);
    }

    #[test]
    fn subtract_ranges_splits_interval() {
        let a = ranges(&[(31000, 31100)]);
        let b = ranges(&[(31050, 31050)]);
        let result = a.subtract(&b).unwrap();
        assert_eq!(result, ranges(&[(31000, 31049), (31051, 31100)]));
    }

    #[test]
    fn subtract_ranges_removes_whole_interval() {
        let a = ranges(&[(5000, 5000)]);
        let b = ranges(&[(5000, 5000)]);
        assert_eq!(a.subtract(&b).unwrap(), Value::Ranges(RangeSet::empty()));
    }

    #[test]
    fn covers_is_subset_for_ranges() {
        let a = ranges(&[(31000, 31100)]);
        let b = ranges(&[(31050, 31050)]);
        assert!(a.covers(&b).unwrap());
        assert!(!b.covers(&a).unwrap());
    }

    #[test]
    fn mismatched_kinds_error() {
        let err = Value::Scalar(1.0).add(&Value::Text("x".into())).unwrap_err();
        assert!(matches!(err, Error::ValueKindMismatch { .. }));
    }

    #[test]
    fn range_set_merges_adjacent_intervals() {
        let merged = RangeSet::new(vec![Interval::new(1, 5), Interval::new(6, 10)]);
        assert_eq!(merged.intervals(), &[Interval::new(1, 10)]);
    }

    #[test]
    fn range_set_lowest_picks_first_port() {
        let set = RangeSet::new(vec![Interval::new(31000, 31100)]);
        assert_eq!(set.lowest(), Some(31000));
    }
}
