//! Store completion hook
//!
//! Every decoded object is handed to a [`StoreHandler`]. The SCP runs one task per
//! association, so a handler is invoked concurrently from several associations and must
//! not rely on call ordering between them.

use async_trait::async_trait;
use dicom_object::InMemDicomObject;

use crate::Result;

/// Receives objects after they have been decoded and before they are acknowledged
///
/// Returning an error turns the acknowledgement into a processing failure; the
/// association stays open.
#[async_trait]
pub trait StoreHandler: Send + Sync {
    async fn on_object(&self, object: InMemDicomObject, identifier: String) -> Result<()>;
}

#[async_trait]
impl<F> StoreHandler for F
where
    F: Fn(InMemDicomObject, String) -> Result<()> + Send + Sync,
{
    async fn on_object(&self, object: InMemDicomObject, identifier: String) -> Result<()> {
        self(object, identifier)
    }
}
