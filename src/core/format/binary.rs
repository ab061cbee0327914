use crate::domain::model::Dataset;
use crate::utils::error::Result;

pub(super) fn encode(dataset: &Dataset) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(dataset)?)
}

pub(super) fn decode(bytes: &[u8]) -> Result<Dataset> {
    let raw: Dataset = serde_json::from_slice(bytes)?;
    // Re-check row shape and value types; the blob may come from anywhere.
    Dataset::new(raw.columns().to_vec(), raw.rows().to_vec())
}
