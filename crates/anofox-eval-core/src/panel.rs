//! Panel data: many time series stacked with an entity key.
//!
//! A [`Panel`] holds three named columns, `entity`, `time` and `value`,
//! validated once at construction. Within one entity the rows must be in
//! strictly increasing time order; rows of different entities may
//! interleave. The engines group by entity in order of first appearance and
//! never re-sort by time.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;

use crate::error::{EvalError, Result};

/// Requirements on the entity key column.
pub trait EntityKey: Clone + Eq + Hash + Debug {}

impl<T: Clone + Eq + Hash + Debug> EntityKey for T {}

/// A validated `(entity, time, value)` table.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel<K> {
    entity: Vec<K>,
    time: Vec<i64>,
    value: Vec<f64>,
}

/// One entity's values, in time order.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySeries<'a, K> {
    pub entity: &'a K,
    pub time: Vec<i64>,
    pub values: Vec<f64>,
}

impl<K> EntitySeries<'_, K> {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Actual and predicted values of one entity paired on time.
#[derive(Debug, Clone)]
pub(crate) struct AlignedSeries<'a, K> {
    pub entity: &'a K,
    pub actual: Vec<f64>,
    pub forecast: Vec<f64>,
}

impl<K: EntityKey> Panel<K> {
    /// Build a panel from its three columns.
    ///
    /// # Errors
    /// `SchemaMismatch` if the columns differ in length or if an entity's
    /// time stamps are not strictly increasing.
    pub fn new(entity: Vec<K>, time: Vec<i64>, value: Vec<f64>) -> Result<Self> {
        if entity.len() != time.len() || entity.len() != value.len() {
            return Err(EvalError::SchemaMismatch(format!(
                "column lengths differ: entity={}, time={}, value={}",
                entity.len(),
                time.len(),
                value.len()
            )));
        }

        let mut last_seen: HashMap<&K, i64> = HashMap::new();
        for (row, (key, &t)) in entity.iter().zip(time.iter()).enumerate() {
            if let Some(prev) = last_seen.insert(key, t) {
                if t <= prev {
                    return Err(EvalError::SchemaMismatch(format!(
                        "time must be strictly increasing within entity {:?}: row {} has time {} after {}",
                        key, row, t, prev
                    )));
                }
            }
        }

        Ok(Self {
            entity,
            time,
            value,
        })
    }

    /// Build a panel from `(entity, time, value)` rows.
    pub fn from_rows<I>(rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, i64, f64)>,
    {
        let mut entity = Vec::new();
        let mut time = Vec::new();
        let mut value = Vec::new();
        for (k, t, v) in rows {
            entity.push(k);
            time.push(t);
            value.push(v);
        }
        Self::new(entity, time, value)
    }

    /// Build a panel from one value vector per entity, with time `0..len`.
    pub fn from_series<I>(series: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, Vec<f64>)>,
    {
        Self::from_rows(series.into_iter().flat_map(|(k, values)| {
            values
                .into_iter()
                .enumerate()
                .map(move |(t, v)| (k.clone(), t as i64, v))
        }))
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn entity(&self) -> &[K] {
        &self.entity
    }

    pub fn time(&self) -> &[i64] {
        &self.time
    }

    pub fn value(&self) -> &[f64] {
        &self.value
    }

    /// Iterate over rows as `(entity, time, value)`.
    pub fn rows(&self) -> impl Iterator<Item = (&K, i64, f64)> + '_ {
        self.entity
            .iter()
            .zip(self.time.iter())
            .zip(self.value.iter())
            .map(|((k, &t), &v)| (k, t, v))
    }

    /// Distinct entities in order of first appearance.
    pub fn entities(&self) -> Vec<&K> {
        let mut seen: HashSet<&K> = HashSet::new();
        self.entity.iter().filter(|k| seen.insert(*k)).collect()
    }

    pub fn contains_entity(&self, entity: &K) -> bool {
        self.entity.iter().any(|k| k == entity)
    }

    /// Group rows by entity, in order of first appearance.
    pub fn groups(&self) -> Vec<EntitySeries<'_, K>> {
        let mut index: HashMap<&K, usize> = HashMap::new();
        let mut groups: Vec<EntitySeries<'_, K>> = Vec::new();

        for (k, t, v) in self.rows() {
            let slot = *index.entry(k).or_insert_with(|| {
                groups.push(EntitySeries {
                    entity: k,
                    time: Vec::new(),
                    values: Vec::new(),
                });
                groups.len() - 1
            });
            groups[slot].time.push(t);
            groups[slot].values.push(v);
        }

        groups
    }

    /// Residual panel `y_true - y_pred`, paired on `(entity, time)`.
    ///
    /// Rows of `y_true` without a matching prediction are dropped; the
    /// result keeps `y_true`'s row order.
    pub fn residuals(y_true: &Panel<K>, y_pred: &Panel<K>) -> Result<Panel<K>> {
        let lookup = y_pred.lookup();
        let mut rows = Vec::with_capacity(y_true.len());
        for (k, t, v) in y_true.rows() {
            if let Some(&pred) = lookup.get(&(k, t)) {
                rows.push((k.clone(), t, v - pred));
            }
        }
        Panel::from_rows(rows)
    }

    fn lookup(&self) -> HashMap<(&K, i64), f64> {
        self.rows().map(|(k, t, v)| ((k, t), v)).collect()
    }

    /// Pair this panel (actuals) with predictions on `(entity, time)`.
    ///
    /// One entry per entity of `self`, in grouping order. Time stamps with no
    /// prediction are skipped, so an entity may end up with empty vectors.
    pub(crate) fn align<'a>(&'a self, y_pred: &Panel<K>) -> Vec<AlignedSeries<'a, K>> {
        let lookup = y_pred.lookup();
        self.groups()
            .into_iter()
            .map(|group| {
                let mut actual = Vec::with_capacity(group.len());
                let mut forecast = Vec::with_capacity(group.len());
                for (t, v) in group.time.iter().zip(group.values.iter()) {
                    if let Some(&pred) = lookup.get(&(group.entity, *t)) {
                        actual.push(*v);
                        forecast.push(pred);
                    }
                }
                AlignedSeries {
                    entity: group.entity,
                    actual,
                    forecast,
                }
            })
            .collect()
    }
}
