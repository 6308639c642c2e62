//! Respondents, features and quotas.
//!
//! The pool is loaded once, from a frozen snapshot, and treated as immutable
//! for the lifetime of a solver run.

use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Opaque respondent identifier supplied by the caller (a database key, a
/// survey response id, ...). The core never interprets it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct RespondentId(pub String);

impl std::fmt::Display for RespondentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Non-negative lower/upper bound on the number of panel members taking a
/// given feature value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Quota {
    pub min: u32,
    pub max: u32,
}

impl Quota {
    pub fn new(min: u32, max: u32) -> Self {
        Quota { min, max }
    }
}

/// One categorical feature, with a closed set of values and a quota per
/// value. The quota table is fixed for the run.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Feature {
    pub name: String,
    pub quotas: BTreeMap<String, Quota>,
}

/// A respondent: an id plus one value per feature.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Respondent {
    pub id: RespondentId,
    pub values: BTreeMap<String, String>,
}

/// The immutable input to the panel oracle: the respondent pool and the
/// quota table, indexed for O(1) lookup by dense index.
///
/// Respondents are given a dense `usize` index on construction (`index_of`,
/// `respondent_at`); every solver and rounder downstream works in this index
/// space rather than re-hashing [`RespondentId`]s.
#[derive(Debug, Clone)]
pub struct Pool {
    respondents: Vec<Respondent>,
    index: BTreeMap<RespondentId, usize>,
    features: Vec<Feature>,
    /// For each feature index, for each respondent index, which value (by
    /// index into that feature's quota map) they hold.
    membership: Vec<Vec<usize>>,
}

impl Pool {
    pub fn new(respondents: Vec<Respondent>, features: Vec<Feature>) -> Result<Self> {
        if respondents.is_empty() {
            return Err(Error::EmptyPool);
        }
        for f in &features {
            for (value, q) in &f.quotas {
                if q.min > q.max {
                    return Err(Error::InvalidQuota {
                        feature: f.name.clone(),
                        value: value.clone(),
                        min: q.min,
                        max: q.max,
                    });
                }
            }
        }

        let mut index = BTreeMap::new();
        for (i, r) in respondents.iter().enumerate() {
            index.insert(r.id.clone(), i);
        }

        let mut membership = vec![vec![0usize; respondents.len()]; features.len()];
        for (fi, f) in features.iter().enumerate() {
            let value_order: Vec<&String> = f.quotas.keys().collect();
            for (ri, r) in respondents.iter().enumerate() {
                let val = r
                    .values
                    .get(&f.name)
                    .ok_or_else(|| Error::MissingFeatureValue(r.id.0.clone(), f.name.clone()))?;
                let vi = value_order
                    .iter()
                    .position(|v| *v == val)
                    .ok_or_else(|| Error::MissingFeatureValue(r.id.0.clone(), f.name.clone()))?;
                membership[fi][ri] = vi;
            }
        }

        Ok(Pool {
            respondents,
            index,
            features,
            membership,
        })
    }

    pub fn len(&self) -> usize {
        self.respondents.len()
    }

    pub fn respondents(&self) -> &[Respondent] {
        &self.respondents
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn index_of(&self, id: &RespondentId) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn id_at(&self, i: usize) -> &RespondentId {
        &self.respondents[i].id
    }

    /// Returns, for feature `fi`, the value index respondent `ri` holds.
    pub fn value_index(&self, fi: usize, ri: usize) -> usize {
        self.membership[fi][ri]
    }

    /// Returns, for feature `fi`, the members of each value bucket as
    /// respondent indices — the grouping the oracle needs to write one
    /// quota constraint per (feature, value).
    pub fn buckets(&self, fi: usize) -> Vec<Vec<usize>> {
        let value_count = self.features[fi].quotas.len();
        let mut buckets = vec![Vec::new(); value_count];
        for (ri, &vi) in self.membership[fi].iter().enumerate() {
            buckets[vi].push(ri);
        }
        buckets
    }

    pub fn quota_at(&self, fi: usize, vi: usize) -> Quota {
        *self
            .features[fi]
            .quotas
            .values()
            .nth(vi)
            .expect("value index within bounds")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_pool() -> Pool {
        let feature = Feature {
            name: "color".into(),
            quotas: BTreeMap::from([
                ("red".to_string(), Quota::new(1, 1)),
                ("blue".to_string(), Quota::new(1, 1)),
            ]),
        };
        let respondents = vec![
            mk("1", "red"),
            mk("2", "red"),
            mk("3", "blue"),
            mk("4", "blue"),
        ];
        Pool::new(respondents, vec![feature]).unwrap()
    }

    fn mk(id: &str, color: &str) -> Respondent {
        Respondent {
            id: RespondentId(id.to_string()),
            values: BTreeMap::from([("color".to_string(), color.to_string())]),
        }
    }

    #[test]
    fn buckets_group_respondents_by_value() {
        let pool = toy_pool();
        let buckets = pool.buckets(0);
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets.iter().map(|b| b.len()).sum::<usize>(), 4);
    }

    #[test]
    fn rejects_min_greater_than_max() {
        let feature = Feature {
            name: "color".into(),
            quotas: BTreeMap::from([("red".to_string(), Quota::new(3, 1))]),
        };
        let err = Pool::new(vec![mk("1", "red")], vec![feature]).unwrap_err();
        assert!(matches!(err, Error::InvalidQuota { .. }));
    }

    #[test]
    fn rejects_empty_pool() {
        let err = Pool::new(vec![], vec![]).unwrap_err();
        assert!(matches!(err, Error::EmptyPool));
    }
}
