//! Read side of the image catalog: lookups by identity, hash and registry.

use std::collections::BTreeSet;

use serde_json::Value;

use super::{Document, DocumentStore, Result, document_id};
use crate::image::ContainerImage;

/// Fields indexed for lookups.
pub const INDEXED_FIELDS: [&str; 3] = ["name", "hash", "registry"];

/// Create every lookup index.
pub async fn ensure_indexes<S: DocumentStore + ?Sized>(store: &S) -> Result<()> {
    for field in INDEXED_FIELDS {
        store.ensure_index(field).await?;
    }
    Ok(())
}

/// Image stored under its location.
pub async fn get_image<S: DocumentStore + ?Sized>(
    store: &S,
    location: &str,
) -> Result<Option<ContainerImage>> {
    store
        .get(&document_id(location))
        .await?
        .map(|doc| doc.decode())
        .transpose()
}

/// Image whose `hash` matches.
pub async fn find_by_hash<S: DocumentStore + ?Sized>(
    store: &S,
    hash: &str,
) -> Result<Option<ContainerImage>> {
    store
        .find("hash", &Value::from(hash))
        .await?
        .first()
        .map(Document::decode)
        .transpose()
}

/// Raw documents belonging to a registry.
pub async fn documents_in_registry<S: DocumentStore + ?Sized>(
    store: &S,
    registry: &str,
) -> Result<Vec<Document>> {
    store.find("registry", &Value::from(registry)).await
}

/// Registries that have at least one stored document.
pub async fn stored_registries<S: DocumentStore + ?Sized>(store: &S) -> Result<BTreeSet<String>> {
    store.distinct("registry").await
}

/// Decoded images belonging to a registry. Documents that no longer decode
/// are skipped with a warning.
pub async fn images_in_registry<S: DocumentStore + ?Sized>(
    store: &S,
    registry: &str,
) -> Result<Vec<ContainerImage>> {
    let documents = documents_in_registry(store, registry).await?;
    Ok(documents
        .iter()
        .filter_map(|doc| match doc.decode::<ContainerImage>() {
            Ok(image) => Some(image),
            Err(e) => {
                tracing::warn!(id = doc.id().unwrap_or_default(), error = %e, "Skipping undecodable document");
                None
            }
        })
        .collect())
}
