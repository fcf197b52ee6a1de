//! Per-file mapping snapshots
//!
//! When a table file is written, a bounded subsample of the in-memory
//! mapping is embedded in the file's properties under
//! [`MAPPING_PROPERTY_NAME`]. Opening the file reverses the process.

use bytes::Bytes;
use tracing::warn;

use crate::config::MAX_PAIRS_PER_TABLE;
use crate::mapping::SeqnoTimeMapping;
use crate::{Result, Seqno};

/// Table-property key under which the mapping blob is stored.
pub const MAPPING_PROPERTY_NAME: &str = "tidedb.seqno-time-map";

/// The mapping blob carried by one table file's properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingProperty(Bytes);

impl MappingProperty {
    /// Snapshot the mapping for a file covering `[smallest_seqno,
    /// largest_seqno]`.
    pub fn from_mapping(
        mapping: &SeqnoTimeMapping,
        smallest_seqno: Seqno,
        largest_seqno: Seqno,
    ) -> Self {
        Self(mapping.encode(smallest_seqno, largest_seqno, MAX_PAIRS_PER_TABLE))
    }

    /// Wrap a blob read back from table properties.
    pub fn from_bytes(blob: Bytes) -> Self {
        Self(blob)
    }

    /// Reconstruct the file's mapping.
    pub fn decode(&self) -> Result<SeqnoTimeMapping> {
        let mut mapping = SeqnoTimeMapping::per_table();
        mapping.add_encoded(&self.0)?;
        Ok(mapping)
    }

    /// Reconstruct the file's mapping, degrading corruption to "no mapping"
    /// so the file's records classify as hot.
    pub fn decode_or_empty(&self) -> SeqnoTimeMapping {
        match self.decode() {
            Ok(mapping) => mapping,
            Err(err) => {
                warn!("discarding corrupt seqno-time property: {err}");
                SeqnoTimeMapping::per_table()
            }
        }
    }

    /// Raw property bytes as stored in the file.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// True when the file carried no samples.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
