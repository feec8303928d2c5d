use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dicom_dictionary_std::{tags, uids};
use dicom_object::meta::FileMetaTableBuilder;
use dicom_object::InMemDicomObject;
use dimse::{DimseError, StoreHandler};
use tracing::debug;
use uuid::Uuid;

use crate::storage::{StoreError, StoreResult};

/// Store handler writing every received object as a DICOM Part 10 file
///
/// Files are named after the SOP Instance UID; objects without one get a random name.
#[derive(Debug, Clone)]
pub struct FilesystemStore {
    root_path: PathBuf,
}

impl FilesystemStore {
    /// Create a new filesystem store with the given root path
    pub fn new<P: AsRef<Path>>(root_path: P) -> StoreResult<Self> {
        let root_path = root_path.as_ref().to_path_buf();

        if !root_path.exists() {
            std::fs::create_dir_all(&root_path).map_err(|e| {
                StoreError::Config(format!(
                    "Failed to create store directory '{}': {}",
                    root_path.display(),
                    e
                ))
            })?;
        }

        Ok(Self { root_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.root_path
    }

    /// File an object with the given identifier is written to
    pub fn path_for(&self, identifier: &str) -> PathBuf {
        let name: String = identifier
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
            .collect();
        let name = name.trim_matches('.');
        let name = if name.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            name.to_string()
        };
        self.root_path.join(format!("{}.dcm", name))
    }

    /// Write an object to disk, returning the file path
    pub async fn store(&self, object: InMemDicomObject, identifier: &str) -> StoreResult<PathBuf> {
        let path = self.path_for(identifier);
        let instance_uid = if identifier.is_empty() {
            format!("2.25.{}", Uuid::new_v4().as_u128())
        } else {
            identifier.to_string()
        };

        let target = path.clone();
        tokio::task::spawn_blocking(move || write_part10(&target, object, &instance_uid))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))??;

        Ok(path)
    }
}

fn write_part10(path: &Path, object: InMemDicomObject, instance_uid: &str) -> StoreResult<()> {
    let sop_class_uid = object
        .element(tags::SOP_CLASS_UID)
        .ok()
        .and_then(|e| e.to_str().ok())
        .map(|s| s.trim_end_matches(['\0', ' ']).to_string())
        .unwrap_or_else(|| uids::SECONDARY_CAPTURE_IMAGE_STORAGE.to_string());

    let file_obj = object
        .with_meta(
            FileMetaTableBuilder::new()
                .transfer_syntax(uids::EXPLICIT_VR_LITTLE_ENDIAN)
                .media_storage_sop_class_uid(sop_class_uid.as_str())
                .media_storage_sop_instance_uid(instance_uid),
        )
        .map_err(|e| StoreError::Write(e.to_string()))?;

    file_obj
        .write_to_file(path)
        .map_err(|e| StoreError::Write(e.to_string()))
}

#[async_trait]
impl StoreHandler for FilesystemStore {
    async fn on_object(&self, object: InMemDicomObject, identifier: String) -> dimse::Result<()> {
        let path = self
            .store(object, &identifier)
            .await
            .map_err(|e| DimseError::storage(e.to_string()))?;
        debug!("Stored {} at {}", identifier, path.display());
        Ok(())
    }
}
