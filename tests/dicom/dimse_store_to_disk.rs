use std::sync::Arc;
use std::time::Duration;

use dicom_core::{dicom_value, DataElement, PrimitiveValue, VR};
use dicom_dictionary_std::{tags, uids};
use dicom_object::InMemDicomObject;
use dimse::pdu::{
    AssociationRQ, PresentationContextProposed, UserVariableItem, APPLICATION_CONTEXT_NAME,
    PROTOCOL_VERSION,
};
use dimse::{
    command_value, data_value, DimseConfig, DimseScp, ObjectCodec, Pdu, PduCodec,
    TransferSyntaxCodec,
};
use futures_util::{SinkExt, StreamExt};
use harmony_store::storage::FilesystemStore;
use tempfile::TempDir;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

async fn next_pdu(client: &mut Framed<TcpStream, PduCodec>) -> Pdu {
    tokio::time::timeout(Duration::from_secs(5), client.next())
        .await
        .expect("timed out waiting for PDU")
        .expect("connection closed")
        .expect("valid PDU")
}

#[tokio::test]
async fn dimse_store_writes_part10_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store = FilesystemStore::new(temp_dir.path()).expect("Failed to create store");

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind ephem port");
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let scp = DimseScp::new(DimseConfig::default(), Arc::new(store));
    let server = tokio::spawn(scp.run_on(listener, shutdown.clone()));

    let stream = TcpStream::connect(addr).await.expect("connect to SCP");
    let mut client = Framed::new(stream, PduCodec::new(131072));

    client
        .send(Pdu::AssociationRQ(AssociationRQ {
            protocol_version: PROTOCOL_VERSION,
            calling_ae_title: "MODALITY".to_string(),
            called_ae_title: "HARMONY_SCP".to_string(),
            application_context_name: APPLICATION_CONTEXT_NAME.to_string(),
            presentation_contexts: vec![PresentationContextProposed {
                id: 1,
                abstract_syntax: uids::SECONDARY_CAPTURE_IMAGE_STORAGE.to_string(),
                transfer_syntaxes: vec![uids::IMPLICIT_VR_LITTLE_ENDIAN.to_string()],
            }],
            user_variables: vec![UserVariableItem::MaxLength(16384)],
        }))
        .await
        .unwrap();
    assert!(matches!(next_pdu(&mut client).await, Pdu::AssociationAC(_)));

    let codec = TransferSyntaxCodec::default();
    let command = InMemDicomObject::command_from_element_iter([
        DataElement::new(
            tags::AFFECTED_SOP_CLASS_UID,
            VR::UI,
            PrimitiveValue::from(uids::SECONDARY_CAPTURE_IMAGE_STORAGE),
        ),
        DataElement::new(tags::COMMAND_FIELD, VR::US, dicom_value!(U16, [0x0001])),
        DataElement::new(tags::MESSAGE_ID, VR::US, dicom_value!(U16, [1])),
        DataElement::new(tags::COMMAND_DATA_SET_TYPE, VR::US, dicom_value!(U16, [0x0000])),
        DataElement::new(
            tags::AFFECTED_SOP_INSTANCE_UID,
            VR::UI,
            PrimitiveValue::from("1.2.3"),
        ),
    ]);
    let object = InMemDicomObject::from_element_iter([
        DataElement::new(
            tags::SOP_CLASS_UID,
            VR::UI,
            PrimitiveValue::from(uids::SECONDARY_CAPTURE_IMAGE_STORAGE),
        ),
        DataElement::new(tags::SOP_INSTANCE_UID, VR::UI, PrimitiveValue::from("1.2.3")),
        DataElement::new(tags::PATIENT_ID, VR::LO, PrimitiveValue::from("PID-001")),
    ]);

    client
        .send(Pdu::PData {
            data: vec![
                command_value(1, codec.encode(&command).unwrap(), true),
                data_value(1, codec.encode(&object).unwrap(), true),
            ],
        })
        .await
        .unwrap();

    match next_pdu(&mut client).await {
        Pdu::PData { data } => {
            let response = codec.decode(&data[0].data).unwrap();
            let status = response.element(tags::STATUS).unwrap().to_int::<u16>().unwrap();
            assert_eq!(status, 0x0000);
        }
        other => panic!("Expected P-DATA-TF, got {:?}", other),
    }

    client.send(Pdu::ReleaseRQ).await.unwrap();
    assert_eq!(next_pdu(&mut client).await, Pdu::ReleaseRP);

    let path = temp_dir.path().join("1.2.3.dcm");
    let stored = dicom_object::open_file(&path).expect("stored Part 10 file");
    assert_eq!(
        stored
            .element(tags::PATIENT_ID)
            .unwrap()
            .to_str()
            .unwrap()
            .trim_end(),
        "PID-001"
    );

    shutdown.cancel();
    server.await.unwrap().unwrap();
}
