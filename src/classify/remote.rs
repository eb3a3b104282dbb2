use serde::Serialize;
use tracing::debug;

use crate::{error::RemoteClassifierError, store::RecordSet, types::{BuildingRecord, Classification}};

/// One instance sent to a remote classifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassifyRequest {
    pub area_in_meters: f64,
    pub confidence: f64,
}

impl From<&BuildingRecord> for ClassifyRequest {
    fn from(record: &BuildingRecord) -> Self {
        Self { area_in_meters: record.area_square_meters(), confidence: record.confidence() }
    }
}

/// An opaque classifier that labels a batch of instances, one label per instance, in order.
pub trait RemoteClassifier {
    fn classify_batch(&self, batch: &[ClassifyRequest]) -> Result<Vec<Classification>, RemoteClassifierError>;
}

impl<F> RemoteClassifier for F
where
    F: Fn(&[ClassifyRequest]) -> Result<Vec<Classification>, RemoteClassifierError>,
{
    fn classify_batch(&self, batch: &[ClassifyRequest]) -> Result<Vec<Classification>, RemoteClassifierError> {
        self(batch)
    }
}

/// Relabel every record through `classifier`, `batch_size` records per request.
///
/// Returns a new set; `set` is left untouched. A batch whose label count differs from its
/// request count fails the whole call.
pub fn reclassify<C: RemoteClassifier + ?Sized>(set: &RecordSet, classifier: &C, batch_size: usize) -> Result<RecordSet, RemoteClassifierError> {
    let batch_size = batch_size.max(1);
    let mut records = Vec::with_capacity(set.len());

    let all: Vec<&BuildingRecord> = set.iter().collect();

    for (i, chunk) in all.chunks(batch_size).enumerate() {
        let requests: Vec<ClassifyRequest> = chunk.iter().map(|r| ClassifyRequest::from(*r)).collect();
        let labels = classifier.classify_batch(&requests)?;
        if labels.len() != requests.len() {
            return Err(RemoteClassifierError::CountMismatch { expected: requests.len(), got: labels.len() });
        }
        debug!(batch = i, size = chunk.len(), "[classify::remote] batch labelled");
        records.extend(chunk.iter().zip(labels).map(|(record, label)| record.with_classification(label)));
    }

    Ok(set.replaced_records(records))
}
