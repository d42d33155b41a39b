//! Logical row identity across reloads.
//!
//! Presenter handles die with the mapper generation that created them. A
//! [`RowMatch`] captures enough about a presenter to find "the same row"
//! again after the source has been replaced: the handle itself for lookups
//! in the same generation, and the values of the configured match columns
//! for lookups in a new one.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;

use crate::mapper::RowMapper;
use crate::presenter::PresenterId;
use crate::source::{CellValue, ColumnId, DataSource};

/// Hash of an ordered list of match column values.
pub fn hash_values(values: &[CellValue]) -> u64 {
    let mut hasher = DefaultHasher::new();
    values.hash(&mut hasher);
    hasher.finish()
}

/// A presenter plus the match values that identify its row.
///
/// Two matches are equal when their hashes agree and either they name the
/// same presenter of the same mapper generation, or they were captured over
/// the same non-empty list of match columns and every value is equal.
#[derive(Debug, Clone)]
pub struct RowMatch {
    mapper_id: u64,
    presenter: PresenterId,
    hash: u64,
    columns: Arc<[ColumnId]>,
    values: Vec<CellValue>,
}

impl RowMatch {
    /// Capture the match of a live presenter.
    pub fn capture<S: DataSource>(mapper: &RowMapper<S>, presenter: PresenterId) -> Option<Self> {
        let p = mapper.presenter(presenter)?;
        let columns = mapper.match_columns().clone();
        let values: Vec<CellValue> = columns
            .iter()
            .map(|&column| mapper.source().value(p.row(), column))
            .collect();
        let hash = p.match_hash().unwrap_or_else(|| hash_values(&values));
        Some(Self {
            mapper_id: mapper.id(),
            presenter,
            hash,
            columns,
            values,
        })
    }

    pub fn presenter(&self) -> PresenterId {
        self.presenter
    }

    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn values(&self) -> &[CellValue] {
        &self.values
    }

    /// Whether both matches identify the same logical row.
    pub fn matches(&self, other: &RowMatch) -> bool {
        if self.hash != other.hash {
            return false;
        }
        if self.mapper_id == other.mapper_id && self.presenter == other.presenter {
            return true;
        }
        !self.columns.is_empty() && self.columns == other.columns && self.values == other.values
    }
}

impl PartialEq for RowMatch {
    fn eq(&self, other: &Self) -> bool {
        self.matches(other)
    }
}

/// Hash-bucketed matches of every presenter of one mapper.
#[derive(Debug, Default)]
pub struct MatchIndex {
    buckets: HashMap<u64, Vec<RowMatch>>,
}

impl MatchIndex {
    /// Index every mapped presenter.
    pub fn build<S: DataSource>(mapper: &RowMapper<S>) -> Self {
        let mut buckets: HashMap<u64, Vec<RowMatch>> = HashMap::new();
        for id in mapper.rows() {
            if let Some(m) = RowMatch::capture(mapper, id) {
                buckets.entry(m.hash).or_default().push(m);
            }
        }
        Self { buckets }
    }

    /// The first indexed presenter matching `target`.
    pub fn find(&self, target: &RowMatch) -> Option<PresenterId> {
        self.buckets
            .get(&target.hash)?
            .iter()
            .find(|m| m.matches(target))
            .map(RowMatch::presenter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    fn people() -> MemorySource {
        let mut source = MemorySource::new(2);
        source.push_row(None, [1.into(), "ann".into()]).unwrap();
        source.push_row(None, [2.into(), "bob".into()]).unwrap();
        source
    }

    #[test]
    fn test_same_presenter_matches_itself() {
        let mapper = RowMapper::new(people());
        let a = RowMatch::capture(&mapper, mapper.roots()[0]).unwrap();
        let b = RowMatch::capture(&mapper, mapper.roots()[1]).unwrap();
        assert_eq!(a, a.clone());
        // no match columns: distinct presenters never match
        assert_ne!(a, b);
    }

    #[test]
    fn test_match_across_mappers_by_values() {
        let old = RowMapper::with_match_columns(people(), vec![ColumnId(0)]);
        let mut reordered = MemorySource::new(2);
        reordered.push_row(None, [2.into(), "robert".into()]).unwrap();
        reordered.push_row(None, [1.into(), "annie".into()]).unwrap();
        let new = RowMapper::with_match_columns(reordered, vec![ColumnId(0)]);

        let bob = RowMatch::capture(&old, old.roots()[1]).unwrap();
        let index = MatchIndex::build(&new);
        assert_eq!(index.find(&bob), Some(new.roots()[0]));
    }

    #[test]
    fn test_different_match_columns_do_not_match() {
        let by_id = RowMapper::with_match_columns(people(), vec![ColumnId(0)]);
        let by_both = RowMapper::with_match_columns(people(), vec![ColumnId(0), ColumnId(1)]);
        let a = RowMatch::capture(&by_id, by_id.roots()[0]).unwrap();
        let b = RowMatch::capture(&by_both, by_both.roots()[0]).unwrap();
        assert!(!a.matches(&b));
    }
}
