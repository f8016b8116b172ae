use std::collections::BTreeMap;
use std::fs;

use tempfile::TempDir;

use claimscope::document::Document;
use claimscope::error::{ClaimscopeError, Result};
use claimscope::filter::FilterSpec;
use claimscope::persistence::{
    CURRENT_SCHEMA_VERSION, INDEX_ARTIFACT, LEGACY_SCHEMA_VERSION, METADATA_ARTIFACT,
    MetadataArtifact, PersistenceCodec,
};
use claimscope::search::{Corpus, SearchStrategy};
use claimscope::vector::{Embedding, FlatIndex};

fn sample() -> (Vec<Document>, Vec<Embedding>) {
    let statuses = ["Denied", "Approved", "Pending", "Denied"];
    let documents = statuses
        .iter()
        .enumerate()
        .map(|(i, status)| {
            let mut metadata = BTreeMap::new();
            metadata.insert("claim_id".to_string(), format!("CLM-{i}"));
            metadata.insert("status".to_string(), status.to_string());
            metadata.insert("claim_date".to_string(), format!("2023-0{}-01", i + 1));
            Document::new(format!("CLM-{i}_0"), format!("claim {i} is {status}"), metadata)
        })
        .collect();
    let embeddings = (0..statuses.len())
        .map(|i| vec![i as f32 * 0.25, 1.0 - i as f32 * 0.25, 0.5])
        .collect();
    (documents, embeddings)
}

#[test]
fn file_round_trip_preserves_corpus() -> Result<()> {
    let dir = TempDir::new()?;
    let (documents, embeddings) = sample();

    let codec = PersistenceCodec::open_dir(dir.path())?;
    assert!(codec.presence().is_fresh());
    codec.save(&documents, &embeddings, None)?;

    assert!(dir.path().join(METADATA_ARTIFACT).exists());
    assert!(dir.path().join(INDEX_ARTIFACT).exists());
    assert!(!dir.path().join(format!("{METADATA_ARTIFACT}.tmp")).exists());

    // A fresh codec over the same directory sees what was written.
    let loaded = PersistenceCodec::open_dir(dir.path())?.load()?;
    assert_eq!(loaded.schema_version, CURRENT_SCHEMA_VERSION);
    assert_eq!(loaded.documents, documents);
    assert_eq!(loaded.embeddings.as_deref(), Some(embeddings.as_slice()));
    assert_eq!(loaded.index, FlatIndex::build(&embeddings)?);

    let reloaded = Corpus::from_loaded(loaded)?;
    let original = Corpus::build(documents, embeddings)?;
    let filter = FilterSpec::new().with_status("denied");
    assert_eq!(
        reloaded.search(&[0.0, 1.0, 0.5], 2, Some(&filter))?.hits,
        original.search(&[0.0, 1.0, 0.5], 2, Some(&filter))?.hits
    );
    Ok(())
}

#[test]
fn saving_twice_replaces_the_previous_corpus() -> Result<()> {
    let dir = TempDir::new()?;
    let codec = PersistenceCodec::open_dir(dir.path())?;
    let (documents, embeddings) = sample();

    codec.save(&documents, &embeddings, None)?;
    codec.save(&documents[..2], &embeddings[..2], None)?;

    let loaded = codec.load()?;
    assert_eq!(loaded.documents.len(), 2);
    assert_eq!(loaded.index.len(), 2);
    Ok(())
}

#[test]
fn legacy_artifact_serves_unfiltered_queries_only() -> Result<()> {
    let dir = TempDir::new()?;
    let codec = PersistenceCodec::open_dir(dir.path())?;
    let (documents, embeddings) = sample();

    codec.write_index(&FlatIndex::build(&embeddings)?)?;
    codec.write_metadata(&MetadataArtifact::Legacy {
        documents: documents.clone(),
    })?;

    let loaded = codec.load()?;
    assert_eq!(loaded.schema_version, LEGACY_SCHEMA_VERSION);
    assert!(loaded.degraded());

    let corpus = Corpus::from_loaded(loaded)?;
    assert!(!corpus.filtering_available());

    let unfiltered = corpus.search(&[0.0, 1.0, 0.5], 2, None)?;
    assert_eq!(unfiltered.strategy, SearchStrategy::Index);
    assert_eq!(unfiltered.ids(), vec!["CLM-0_0", "CLM-1_0"]);

    let err = corpus
        .search(&[0.0, 1.0, 0.5], 2, Some(&FilterSpec::new().with_status("Denied")))
        .unwrap_err();
    assert!(matches!(err, ClaimscopeError::FilteringUnavailable(_)));
    Ok(())
}

#[test]
fn damaged_file_is_reported_as_corrupt() -> Result<()> {
    let dir = TempDir::new()?;
    let codec = PersistenceCodec::open_dir(dir.path())?;
    let (documents, embeddings) = sample();
    codec.save(&documents, &embeddings, None)?;

    let path = dir.path().join(INDEX_ARTIFACT);
    let mut bytes = fs::read(&path)?;
    let middle = bytes.len() / 2;
    bytes[middle] ^= 0x40;
    fs::write(&path, bytes)?;

    assert!(matches!(
        codec.load(),
        Err(ClaimscopeError::CorruptArtifact { .. })
    ));
    Ok(())
}

#[test]
fn one_missing_artifact_is_an_error() -> Result<()> {
    let dir = TempDir::new()?;
    let codec = PersistenceCodec::open_dir(dir.path())?;
    let (documents, embeddings) = sample();
    codec.save(&documents, &embeddings, None)?;

    fs::remove_file(dir.path().join(METADATA_ARTIFACT))?;
    let presence = codec.presence();
    assert!(!presence.is_fresh());
    assert!(!presence.is_complete());
    assert!(matches!(
        codec.load(),
        Err(ClaimscopeError::ArtifactMissing(_))
    ));
    Ok(())
}

#[test]
fn index_from_an_interrupted_save_is_inconsistent() -> Result<()> {
    let dir = TempDir::new()?;
    let codec = PersistenceCodec::open_dir(dir.path())?;
    let (documents, embeddings) = sample();
    codec.save(&documents, &embeddings, None)?;

    // Same shape, different vectors: the index rename landed, metadata did not.
    let replacement: Vec<_> = embeddings
        .iter()
        .rev()
        .cloned()
        .collect();
    codec.write_index(&FlatIndex::build(&replacement)?)?;

    assert!(matches!(codec.load(), Err(ClaimscopeError::Consistency(_))));
    Ok(())
}
