use dicom_core::{DataElement, PrimitiveValue, VR};
use dicom_dictionary_std::{tags, uids};
use dicom_object::InMemDicomObject;
use dimse::StoreHandler;
use harmony_store::config::Config;
use harmony_store::storage::FilesystemStore;
use tempfile::TempDir;

#[test]
fn test_storage_configuration_parsing() {
    let toml = r#"
        [server]
        id = "test"

        [storage]
        store_dir = "./tmp/test"
    "#;

    let config: Config = toml::from_str(toml).expect("Failed to parse config");
    config.validate().expect("Config validation failed");
    assert_eq!(config.storage.store_dir, "./tmp/test");
}

#[test]
fn test_default_storage_configuration() {
    let config: Config = toml::from_str("").expect("Failed to parse config");
    assert_eq!(config.storage.store_dir, "./tmp/dimse");
}

#[tokio::test]
async fn test_handler_writes_objects_concurrently() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store = FilesystemStore::new(temp_dir.path()).expect("Failed to create store");

    let mut tasks = Vec::new();
    for i in 0..4 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            let uid = format!("1.2.826.0.1.3680043.2.{}", i);
            let object = InMemDicomObject::from_element_iter([
                DataElement::new(
                    tags::SOP_CLASS_UID,
                    VR::UI,
                    PrimitiveValue::from(uids::SECONDARY_CAPTURE_IMAGE_STORAGE),
                ),
                DataElement::new(
                    tags::SOP_INSTANCE_UID,
                    VR::UI,
                    PrimitiveValue::from(uid.as_str()),
                ),
            ]);
            store.on_object(object, uid).await
        }));
    }
    for task in tasks {
        task.await.unwrap().expect("store succeeds");
    }

    for i in 0..4 {
        let path = temp_dir
            .path()
            .join(format!("1.2.826.0.1.3680043.2.{}.dcm", i));
        assert!(path.exists(), "missing {}", path.display());
    }
}
