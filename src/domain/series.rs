//! Dated value series shared by the panel, indicators and rule evaluation.

use chrono::NaiveDate;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    /// `None` when the value is missing or not yet available.
    pub value: Option<f64>,
}

/// Ordered series with strictly increasing dates.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimeSeries {
    points: Vec<SeriesPoint>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SeriesError {
    #[error("dates out of order at index {index}: {date} does not follow {previous}")]
    OutOfOrder {
        index: usize,
        previous: NaiveDate,
        date: NaiveDate,
    },
}

impl TimeSeries {
    pub fn new(points: Vec<SeriesPoint>) -> Result<Self, SeriesError> {
        for (i, pair) in points.windows(2).enumerate() {
            if pair[1].date <= pair[0].date {
                return Err(SeriesError::OutOfOrder {
                    index: i + 1,
                    previous: pair[0].date,
                    date: pair[1].date,
                });
            }
        }
        Ok(Self { points })
    }

    /// Build from `(date, value)` pairs in any order. Later duplicates of a
    /// date replace earlier ones.
    pub fn from_unsorted(pairs: impl IntoIterator<Item = (NaiveDate, Option<f64>)>) -> Self {
        let mut points: Vec<SeriesPoint> = pairs
            .into_iter()
            .map(|(date, value)| SeriesPoint { date, value })
            .collect();
        points.sort_by_key(|p| p.date);
        let mut deduped: Vec<SeriesPoint> = Vec::with_capacity(points.len());
        for point in points {
            match deduped.last_mut() {
                Some(last) if last.date == point.date => *last = point,
                _ => deduped.push(point),
            }
        }
        Self { points: deduped }
    }

    /// Same dates as `self`, new values. Callers guarantee `values.len() == self.len()`.
    pub(crate) fn with_values(&self, values: Vec<Option<f64>>) -> Self {
        debug_assert_eq!(values.len(), self.points.len());
        Self {
            points: self
                .points
                .iter()
                .zip(values)
                .map(|(p, value)| SeriesPoint {
                    date: p.date,
                    value,
                })
                .collect(),
        }
    }

    pub fn points(&self) -> &[SeriesPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn value_at(&self, index: usize) -> Option<f64> {
        self.points.get(index).and_then(|p| p.value)
    }

    pub fn values(&self) -> Vec<Option<f64>> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.points.iter().map(|p| p.date)
    }

    pub fn last(&self) -> Option<&SeriesPoint> {
        self.points.last()
    }
}
