//! Durable storage of a corpus as two artifacts.
//!
//! ```text
//! metadata.bin  "CSMD" | u32 schema version | u64 payload length | payload | u32 CRC32(payload)
//! flat.index    "CSFI" | u32 format version | u32 dimension | u64 count | f32 data | u32 CRC32(all preceding bytes)
//! ```
//!
//! All integers and floats are little-endian. The metadata payload is
//! bincode. Schema version 1 holds only the document list and is loaded in
//! a degraded mode without embeddings; version 2 holds documents and
//! embeddings.
//!
//! Each artifact is written to a temporary name and renamed into place.

use std::io::{Cursor, Read, Write};
use std::path::Path;
use std::sync::Arc;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::error::{ClaimscopeError, Result};
use crate::storage::{Storage, StorageConfig, StorageFactory};
use crate::storage::memory::MemoryStorage;
use crate::vector::{Embedding, FlatIndex};

pub const METADATA_ARTIFACT: &str = "metadata.bin";
pub const INDEX_ARTIFACT: &str = "flat.index";

pub const METADATA_MAGIC: &[u8; 4] = b"CSMD";
pub const INDEX_MAGIC: &[u8; 4] = b"CSFI";

/// Documents only.
pub const LEGACY_SCHEMA_VERSION: u32 = 1;
/// Documents and embeddings.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;
pub const INDEX_FORMAT_VERSION: u32 = 1;

const TEMP_SUFFIX: &str = ".tmp";
const METADATA_HEADER_LEN: usize = 4 + 4 + 8;
const INDEX_HEADER_LEN: usize = 4 + 4 + 4 + 8;
const CRC_LEN: usize = 4;

#[derive(Serialize)]
struct CurrentPayloadRef<'a> {
    documents: &'a [Document],
    embeddings: Option<&'a [Embedding]>,
}

#[derive(Deserialize)]
struct CurrentPayload {
    documents: Vec<Document>,
    embeddings: Option<Vec<Embedding>>,
}

/// Decoded contents of the metadata artifact.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataArtifact {
    Legacy {
        documents: Vec<Document>,
    },
    Current {
        documents: Vec<Document>,
        embeddings: Option<Vec<Embedding>>,
    },
}

impl MetadataArtifact {
    pub fn schema_version(&self) -> u32 {
        match self {
            MetadataArtifact::Legacy { .. } => LEGACY_SCHEMA_VERSION,
            MetadataArtifact::Current { .. } => CURRENT_SCHEMA_VERSION,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        match self {
            MetadataArtifact::Legacy { documents } => {
                let payload = bincode::serialize(documents).map_err(|e| {
                    ClaimscopeError::storage(format!("Failed to serialize documents: {e}"))
                })?;
                frame_metadata(LEGACY_SCHEMA_VERSION, &payload)
            }
            MetadataArtifact::Current {
                documents,
                embeddings,
            } => encode_current(documents, embeddings.as_deref()),
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let corrupt = |reason: String| ClaimscopeError::corrupt(METADATA_ARTIFACT, reason);

        if bytes.len() < METADATA_HEADER_LEN + CRC_LEN {
            return Err(corrupt(format!("truncated: {} bytes", bytes.len())));
        }
        let mut cursor = Cursor::new(bytes);
        check_magic(&mut cursor, METADATA_MAGIC, METADATA_ARTIFACT)?;
        let version = cursor.read_u32::<LittleEndian>()?;
        let payload_len = cursor.read_u64::<LittleEndian>()?;

        let payload_end = usize::try_from(payload_len)
            .ok()
            .and_then(|len| len.checked_add(METADATA_HEADER_LEN))
            .filter(|end| end.saturating_add(CRC_LEN) <= bytes.len())
            .ok_or_else(|| corrupt(format!("truncated: payload of {payload_len} bytes declared")))?;
        if payload_end + CRC_LEN != bytes.len() {
            return Err(corrupt(format!(
                "{} unexpected trailing bytes",
                bytes.len() - payload_end - CRC_LEN
            )));
        }

        let payload = &bytes[METADATA_HEADER_LEN..payload_end];
        let stored = (&bytes[payload_end..]).read_u32::<LittleEndian>()?;
        let computed = crc32fast::hash(payload);
        if stored != computed {
            return Err(corrupt(format!(
                "checksum mismatch: stored {stored:#010x}, computed {computed:#010x}"
            )));
        }

        match version {
            LEGACY_SCHEMA_VERSION => {
                let documents: Vec<Document> = bincode::deserialize(payload)
                    .map_err(|e| corrupt(format!("undecodable payload: {e}")))?;
                Ok(MetadataArtifact::Legacy { documents })
            }
            CURRENT_SCHEMA_VERSION => {
                let decoded: CurrentPayload = bincode::deserialize(payload)
                    .map_err(|e| corrupt(format!("undecodable payload: {e}")))?;
                Ok(MetadataArtifact::Current {
                    documents: decoded.documents,
                    embeddings: decoded.embeddings,
                })
            }
            other => Err(corrupt(format!("unsupported schema version {other}"))),
        }
    }
}

fn encode_current(documents: &[Document], embeddings: Option<&[Embedding]>) -> Result<Vec<u8>> {
    let payload = bincode::serialize(&CurrentPayloadRef {
        documents,
        embeddings,
    })
    .map_err(|e| ClaimscopeError::storage(format!("Failed to serialize corpus: {e}")))?;
    frame_metadata(CURRENT_SCHEMA_VERSION, &payload)
}

fn frame_metadata(version: u32, payload: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(METADATA_HEADER_LEN + payload.len() + CRC_LEN);
    out.write_all(METADATA_MAGIC)?;
    out.write_u32::<LittleEndian>(version)?;
    out.write_u64::<LittleEndian>(payload.len() as u64)?;
    out.write_all(payload)?;
    out.write_u32::<LittleEndian>(crc32fast::hash(payload))?;
    Ok(out)
}

fn check_magic(cursor: &mut Cursor<&[u8]>, expected: &[u8; 4], artifact: &str) -> Result<()> {
    let mut magic = [0u8; 4];
    cursor.read_exact(&mut magic)?;
    if &magic != expected {
        return Err(ClaimscopeError::corrupt(
            artifact,
            format!("bad magic {magic:?}"),
        ));
    }
    Ok(())
}

/// Serialize an index into the `flat.index` layout.
pub fn encode_index(index: &FlatIndex) -> Result<Vec<u8>> {
    let data = index.as_slice();
    let dimension = u32::try_from(index.dimension())
        .map_err(|_| ClaimscopeError::storage("index dimension exceeds u32"))?;

    let mut out = Vec::with_capacity(INDEX_HEADER_LEN + data.len() * 4 + CRC_LEN);
    out.write_all(INDEX_MAGIC)?;
    out.write_u32::<LittleEndian>(INDEX_FORMAT_VERSION)?;
    out.write_u32::<LittleEndian>(dimension)?;
    out.write_u64::<LittleEndian>(index.len() as u64)?;
    for value in data {
        out.write_f32::<LittleEndian>(*value)?;
    }
    let crc = crc32fast::hash(&out);
    out.write_u32::<LittleEndian>(crc)?;
    Ok(out)
}

/// Parse the `flat.index` layout.
pub fn decode_index(bytes: &[u8]) -> Result<FlatIndex> {
    let corrupt = |reason: String| ClaimscopeError::corrupt(INDEX_ARTIFACT, reason);

    if bytes.len() < INDEX_HEADER_LEN + CRC_LEN {
        return Err(corrupt(format!("truncated: {} bytes", bytes.len())));
    }
    let mut cursor = Cursor::new(bytes);
    check_magic(&mut cursor, INDEX_MAGIC, INDEX_ARTIFACT)?;
    let version = cursor.read_u32::<LittleEndian>()?;
    if version != INDEX_FORMAT_VERSION {
        return Err(corrupt(format!("unsupported format version {version}")));
    }
    let dimension = cursor.read_u32::<LittleEndian>()? as usize;
    let count = cursor.read_u64::<LittleEndian>()?;

    let floats = usize::try_from(count)
        .ok()
        .and_then(|c| c.checked_mul(dimension))
        .ok_or_else(|| corrupt(format!("implausible shape {count} x {dimension}")))?;
    let expected_len = floats
        .checked_mul(4)
        .and_then(|b| b.checked_add(INDEX_HEADER_LEN + CRC_LEN))
        .ok_or_else(|| corrupt(format!("implausible shape {count} x {dimension}")))?;
    if bytes.len() != expected_len {
        return Err(corrupt(format!(
            "expected {expected_len} bytes for {count} x {dimension}, found {}",
            bytes.len()
        )));
    }
    if dimension == 0 && count > 0 {
        return Err(corrupt(format!("{count} vectors of dimension 0")));
    }

    let body_end = bytes.len() - CRC_LEN;
    let stored = (&bytes[body_end..]).read_u32::<LittleEndian>()?;
    let computed = crc32fast::hash(&bytes[..body_end]);
    if stored != computed {
        return Err(corrupt(format!(
            "checksum mismatch: stored {stored:#010x}, computed {computed:#010x}"
        )));
    }

    let mut data = vec![0f32; floats];
    cursor.read_f32_into::<LittleEndian>(&mut data)?;
    FlatIndex::from_raw_parts(dimension, data)
}

/// Which artifacts are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactPresence {
    pub metadata: bool,
    pub index: bool,
}

impl ArtifactPresence {
    /// Nothing has ever been saved here.
    pub fn is_fresh(&self) -> bool {
        !self.metadata && !self.index
    }

    pub fn is_complete(&self) -> bool {
        self.metadata && self.index
    }
}

/// A corpus read back from storage.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedCorpus {
    pub documents: Vec<Document>,
    /// Absent for legacy artifacts.
    pub embeddings: Option<Vec<Embedding>>,
    pub index: FlatIndex,
    pub schema_version: u32,
}

impl LoadedCorpus {
    /// True when filtered search is impossible for lack of embeddings.
    pub fn degraded(&self) -> bool {
        self.embeddings.is_none()
    }
}

/// Reads and writes the corpus artifacts in a storage namespace.
#[derive(Debug, Clone)]
pub struct PersistenceCodec {
    storage: Arc<dyn Storage>,
}

impl PersistenceCodec {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Artifacts under a directory, created if missing.
    pub fn open_dir<P: AsRef<Path>>(directory: P) -> Result<Self> {
        let config = StorageConfig::File(directory.as_ref().to_path_buf());
        Ok(Self::new(StorageFactory::create(config)?))
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn presence(&self) -> ArtifactPresence {
        ArtifactPresence {
            metadata: self.storage.file_exists(METADATA_ARTIFACT),
            index: self.storage.file_exists(INDEX_ARTIFACT),
        }
    }

    /// Persist documents, embeddings and index.
    ///
    /// When `index` is `None` it is rebuilt from `embeddings`.
    pub fn save(
        &self,
        documents: &[Document],
        embeddings: &[Embedding],
        index: Option<&FlatIndex>,
    ) -> Result<()> {
        if documents.len() != embeddings.len() {
            return Err(ClaimscopeError::consistency(format!(
                "{} documents but {} embeddings",
                documents.len(),
                embeddings.len()
            )));
        }
        let rebuilt;
        let index = match index {
            Some(index) => index,
            None => {
                rebuilt = FlatIndex::build(embeddings)?;
                &rebuilt
            }
        };
        if index.len() != documents.len() {
            return Err(ClaimscopeError::consistency(format!(
                "{} documents but index holds {} vectors",
                documents.len(),
                index.len()
            )));
        }

        self.remove_stale_temps()?;
        let index_bytes = encode_index(index)?;
        let metadata_bytes = encode_current(documents, Some(embeddings))?;

        let index_tmp = self.write_temp(INDEX_ARTIFACT, &index_bytes)?;
        let metadata_tmp = match self.write_temp(METADATA_ARTIFACT, &metadata_bytes) {
            Ok(name) => name,
            Err(e) => {
                self.discard(&index_tmp);
                return Err(e);
            }
        };
        self.storage.rename_file(&index_tmp, INDEX_ARTIFACT)?;
        self.storage.rename_file(&metadata_tmp, METADATA_ARTIFACT)?;

        info!(
            "saved {} documents ({} + {} bytes)",
            documents.len(),
            metadata_bytes.len(),
            index_bytes.len()
        );
        Ok(())
    }

    /// Write a metadata artifact as-is.
    pub fn write_metadata(&self, artifact: &MetadataArtifact) -> Result<()> {
        let bytes = artifact.encode()?;
        let tmp = self.write_temp(METADATA_ARTIFACT, &bytes)?;
        self.storage.rename_file(&tmp, METADATA_ARTIFACT)
    }

    /// Write an index artifact as-is.
    pub fn write_index(&self, index: &FlatIndex) -> Result<()> {
        let bytes = encode_index(index)?;
        let tmp = self.write_temp(INDEX_ARTIFACT, &bytes)?;
        self.storage.rename_file(&tmp, INDEX_ARTIFACT)
    }

    /// Read both artifacts back.
    pub fn load(&self) -> Result<LoadedCorpus> {
        let presence = self.presence();
        if !presence.metadata {
            return Err(ClaimscopeError::ArtifactMissing(METADATA_ARTIFACT.to_string()));
        }
        if !presence.index {
            return Err(ClaimscopeError::ArtifactMissing(INDEX_ARTIFACT.to_string()));
        }

        let index = decode_index(&self.read_all(INDEX_ARTIFACT)?)?;
        let metadata = MetadataArtifact::decode(&self.read_all(METADATA_ARTIFACT)?)?;
        let schema_version = metadata.schema_version();

        let (documents, embeddings) = match metadata {
            MetadataArtifact::Legacy { documents } => {
                warn!(
                    "{METADATA_ARTIFACT} uses legacy schema {LEGACY_SCHEMA_VERSION}: \
                     filtered search is unavailable until the corpus is re-ingested"
                );
                (documents, None)
            }
            MetadataArtifact::Current {
                documents,
                embeddings,
            } => (documents, embeddings),
        };

        if documents.len() != index.len() {
            return Err(ClaimscopeError::consistency(format!(
                "{METADATA_ARTIFACT} holds {} documents but {INDEX_ARTIFACT} holds {} vectors",
                documents.len(),
                index.len()
            )));
        }
        if let Some(embeddings) = &embeddings
            && embeddings.len() != documents.len()
        {
            return Err(ClaimscopeError::consistency(format!(
                "{} documents but {} embeddings",
                documents.len(),
                embeddings.len()
            )));
        }
        // An interrupted save can leave a new index beside old metadata.
        if let Some(embeddings) = &embeddings
            && let Some(position) = embeddings
                .iter()
                .enumerate()
                .position(|(i, e)| index.vector(i) != Some(e.as_slice()))
        {
            return Err(ClaimscopeError::consistency(format!(
                "{INDEX_ARTIFACT} vector {position} differs from the embedding in {METADATA_ARTIFACT}"
            )));
        }

        debug!(
            "loaded {} documents, schema {schema_version}, dimension {}",
            documents.len(),
            index.dimension()
        );
        Ok(LoadedCorpus {
            documents,
            embeddings,
            index,
            schema_version,
        })
    }

    fn write_temp(&self, artifact: &str, bytes: &[u8]) -> Result<String> {
        let tmp = format!("{artifact}{TEMP_SUFFIX}");
        let mut output = self.storage.create_output(&tmp)?;
        let written = output
            .write_all(bytes)
            .map_err(ClaimscopeError::from)
            .and_then(|_| output.close());
        if let Err(e) = written {
            self.discard(&tmp);
            return Err(e);
        }
        Ok(tmp)
    }

    /// Remove temporaries left behind by an interrupted save.
    fn remove_stale_temps(&self) -> Result<()> {
        for name in self.storage.list_files()? {
            if name.ends_with(TEMP_SUFFIX) {
                debug!("removing stale temporary file {name}");
                self.storage.delete_file(&name)?;
            }
        }
        Ok(())
    }

    fn discard(&self, name: &str) {
        if let Err(e) = self.storage.delete_file(name) {
            warn!("failed to remove temporary file {name}: {e}");
        }
    }

    fn read_all(&self, artifact: &str) -> Result<Vec<u8>> {
        let mut input = self.storage.open_input(artifact)?;
        let mut bytes = Vec::with_capacity(input.size()? as usize);
        input.read_to_end(&mut bytes)?;
        Ok(bytes)
    }
}
