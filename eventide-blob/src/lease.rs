//! JSON lease document.
//!
//! One blob per partition key, PascalCase fields:
//!
//! ```text
//! {"PartitionId":"3","Offset":"-1","SeqNo":0,"Epoch":0,"Owner":"eventide","Token":""}
//! ```

use bytes::Bytes;
use eventide_checkpoint::{PartitionKey, PartitionRecord};
use eventide_core::{Offset, PartitionId, SequenceNumber};
use serde::{Deserialize, Serialize};

use crate::storage::BlobKey;

/// Serialized form of a [`PartitionRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LeaseDocument {
    /// Partition id, as a decimal string.
    pub partition_id: String,
    /// Offset token.
    pub offset: String,
    /// Sequence number.
    pub seq_no: i64,
    /// Ownership epoch.
    #[serde(default)]
    pub epoch: u64,
    /// Owner name.
    #[serde(default)]
    pub owner: String,
    /// Ownership token.
    #[serde(default)]
    pub token: String,
}

impl LeaseDocument {
    /// Encodes a record as JSON.
    ///
    /// # Errors
    ///
    /// Returns the serializer error; not expected for these field types.
    pub fn encode(record: &PartitionRecord) -> serde_json::Result<Bytes> {
        let doc = Self::from(record);
        serde_json::to_vec(&doc).map(Bytes::from)
    }

    /// Decodes a record from JSON.
    ///
    /// # Errors
    ///
    /// Returns a message describing malformed JSON or a non-numeric
    /// partition id.
    pub fn decode(data: &[u8]) -> Result<PartitionRecord, String> {
        let doc: Self = serde_json::from_slice(data).map_err(|e| e.to_string())?;
        doc.into_record()
    }

    fn into_record(self) -> Result<PartitionRecord, String> {
        let partition: u64 = self
            .partition_id
            .parse()
            .map_err(|e| format!("invalid PartitionId '{}': {e}", self.partition_id))?;
        Ok(PartitionRecord {
            partition_id: PartitionId::new(partition),
            offset: Offset::new(self.offset),
            sequence_number: SequenceNumber::new(self.seq_no),
            epoch: self.epoch,
            owner: self.owner,
            token: self.token,
        })
    }
}

impl From<&PartitionRecord> for LeaseDocument {
    fn from(record: &PartitionRecord) -> Self {
        Self {
            partition_id: record.partition_id.get().to_string(),
            offset: record.offset.as_str().to_string(),
            seq_no: record.sequence_number.get(),
            epoch: record.epoch,
            owner: record.owner.clone(),
            token: record.token.clone(),
        }
    }
}

/// Returns the blob holding the lease for `key`: container is the stream,
/// name is `{group}/{partition}`.
#[must_use]
pub fn lease_blob_key(key: &PartitionKey) -> BlobKey {
    BlobKey::new(
        key.stream.as_str(),
        format!("{}/{}", key.group, key.partition.get()),
    )
}
