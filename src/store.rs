//! Published record sets and the generation counter that guards them.

use std::{
    ops::Index,
    sync::{Arc, PoisonError, RwLock},
};

use geo::{BoundingRect, Rect};
use serde::{Serialize, Serializer};
use tracing::{debug, info, warn};

use crate::{
    error::IngestionError,
    filter::filter,
    ingest::{IngestStats, Ingestor, Progress, RowSource},
    summary::{Summary, aggregate},
    types::{BuildingRecord, FilterCriteria},
};

/// An immutable, fully validated collection of records from one ingestion run.
///
/// Records live in shared chunks, one per ingestion batch, so cloning a set or taking a
/// mid-run snapshot never copies the records themselves.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RecordSet {
    #[serde(rename = "records", serialize_with = "serialize_chunks")]
    chunks: Vec<Arc<[BuildingRecord]>>,
    #[serde(skip)]
    len: usize,
    stats: IngestStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_sha256: Option<String>,
}

impl RecordSet {
    pub(crate) fn new(chunks: Vec<Arc<[BuildingRecord]>>, stats: IngestStats, source_sha256: Option<String>) -> Self {
        let len = chunks.iter().map(|c| c.len()).sum();
        Self { chunks, len, stats, source_sha256 }
    }

    /// Wrap records that did not come from an ingestion run.
    pub fn from_records(records: Vec<BuildingRecord>) -> Self {
        let n = records.len() as u64;
        Self::new(vec![records.into()], IngestStats { rows: n, accepted: n, ..IngestStats::default() }, None)
    }

    /// Same provenance, different records.
    pub fn replaced_records(&self, records: Vec<BuildingRecord>) -> Self {
        Self::new(vec![records.into()], self.stats.clone(), self.source_sha256.clone())
    }

    /// Records in ingestion order.
    pub fn iter(&self) -> impl Iterator<Item = &BuildingRecord> + '_ {
        self.chunks.iter().flat_map(|chunk| chunk.iter())
    }

    pub fn get(&self, index: usize) -> Option<&BuildingRecord> {
        let mut index = index;
        for chunk in &self.chunks {
            if index < chunk.len() {
                return Some(&chunk[index]);
            }
            index -= chunk.len();
        }
        None
    }

    #[inline] pub fn len(&self) -> usize { self.len }

    #[inline] pub fn is_empty(&self) -> bool { self.len == 0 }

    #[inline] pub fn stats(&self) -> &IngestStats { &self.stats }

    /// Hex SHA-256 of the input document, when it was read whole.
    #[inline] pub fn source_sha256(&self) -> Option<&str> { self.source_sha256.as_deref() }

    /// Bounding rectangle of every footprint.
    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.iter()
            .filter_map(|r| r.polygon().bounding_rect())
            .reduce(|a, b| Rect::new(
                (a.min().x.min(b.min().x), a.min().y.min(b.min().y)),
                (a.max().x.max(b.max().x), a.max().y.max(b.max().y)),
            ))
    }

    pub fn filter(&self, criteria: &FilterCriteria) -> Vec<&BuildingRecord> {
        filter(self, criteria)
    }

    /// Summary of the records matching `criteria`.
    pub fn summarize(&self, criteria: &FilterCriteria) -> Summary {
        aggregate(self.filter(criteria))
    }
}

impl PartialEq for RecordSet {
    /// Equal records, stats and digest, however the records are chunked.
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len
            && self.stats == other.stats
            && self.source_sha256 == other.source_sha256
            && self.iter().eq(other.iter())
    }
}

impl Index<usize> for RecordSet {
    type Output = BuildingRecord;

    fn index(&self, index: usize) -> &BuildingRecord {
        match self.get(index) {
            Some(record) => record,
            None => panic!("record index {index} out of range for a set of {}", self.len),
        }
    }
}

impl<'a> IntoIterator for &'a RecordSet {
    type Item = &'a BuildingRecord;
    type IntoIter = Box<dyn Iterator<Item = &'a BuildingRecord> + 'a>;

    fn into_iter(self) -> Self::IntoIter { Box::new(self.iter()) }
}

fn serialize_chunks<S: Serializer>(chunks: &[Arc<[BuildingRecord]>], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(chunks.iter().flat_map(|chunk| chunk.iter()))
}

/// Claim on the next publication slot, handed out by [`RecordStore::begin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestTicket {
    generation: u64,
}

impl IngestTicket {
    #[inline] pub fn generation(&self) -> u64 { self.generation }
}

struct StoreState {
    generation: u64,
    current: Arc<RecordSet>,
}

/// Holds the current record set. Readers get cheap snapshots; only the newest run may publish.
pub struct RecordStore {
    state: RwLock<StoreState>,
}

impl Default for RecordStore {
    fn default() -> Self { Self::new() }
}

impl RecordStore {
    pub fn new() -> Self {
        Self { state: RwLock::new(StoreState { generation: 0, current: Arc::new(RecordSet::default()) }) }
    }

    /// Start a run. Every earlier ticket becomes stale.
    pub fn begin(&self) -> IngestTicket {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.generation += 1;
        debug!(generation = state.generation, "[store] run started");
        IngestTicket { generation: state.generation }
    }

    pub fn is_current(&self, ticket: &IngestTicket) -> bool {
        self.state.read().unwrap_or_else(PoisonError::into_inner).generation == ticket.generation
    }

    /// Replace the current set, unless a newer run has begun since `ticket` was issued.
    pub fn publish(&self, ticket: &IngestTicket, set: RecordSet) -> Option<Arc<RecordSet>> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.generation != ticket.generation {
            debug!(ticket = ticket.generation, current = state.generation, "[store] stale publish dropped");
            return None;
        }
        state.current = Arc::new(set);
        Some(Arc::clone(&state.current))
    }

    /// The most recently published set.
    pub fn snapshot(&self) -> Arc<RecordSet> {
        Arc::clone(&self.state.read().unwrap_or_else(PoisonError::into_inner).current)
    }

    pub fn generation(&self) -> u64 {
        self.state.read().unwrap_or_else(PoisonError::into_inner).generation
    }
}

/// When a run makes its records visible.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Publish {
    /// Only the completed set.
    #[default]
    Final,
    /// A snapshot after every batch, then the completed set.
    Progressive,
}

/// Drive `ingestor` to completion and publish its records into `store`.
///
/// Fails with [`IngestionError::Superseded`] as soon as another run begins on the same store;
/// the superseded run never publishes again.
pub fn ingest_into<S: RowSource>(
    store: &RecordStore,
    mut ingestor: Ingestor<S>,
    publish: Publish,
    mut on_progress: impl FnMut(&Progress),
) -> Result<Arc<RecordSet>, IngestionError> {
    let ticket = store.begin();

    while let Some(progress) = ingestor.step()? {
        if !store.is_current(&ticket) {
            warn!(generation = ticket.generation, "[store] run superseded, discarding");
            return Err(IngestionError::Superseded);
        }
        on_progress(&progress);
        if progress.done {
            break;
        }
        if publish == Publish::Progressive {
            store.publish(&ticket, ingestor.snapshot());
        }
    }

    let set = ingestor.finish()?;
    let published = store.publish(&ticket, set).ok_or(IngestionError::Superseded)?;
    info!(generation = ticket.generation, records = published.len(), "[store] published");
    Ok(published)
}
