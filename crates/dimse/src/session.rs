//! Association session: negotiation, receive loop and termination
//!
//! One [`Association`] owns one transport. It answers the association request, then
//! processes protocol units strictly in order: every completed message is decoded,
//! handed to the [`StoreHandler`] and acknowledged before the next unit is read.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dicom_dictionary_std::tags;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, field, info, info_span, warn, Instrument, Span};
use uuid::Uuid;

use crate::association::{local_limit_rejection, negotiate, NegotiatedAssociation, Negotiation};
use crate::codec::{extract_identifier, read_uid, CodecError, ObjectCodec, TransferSyntaxCodec};
use crate::config::DimseConfig;
use crate::handler::StoreHandler;
use crate::pdu::{AbortRQServiceProviderReason, AbortRQSource, PDataValue, Pdu, PduCodec};
use crate::reassembler::Reassembler;
use crate::response::{build_success, split_fragment, to_fragment, Acknowledgement};
use crate::types::{status, CommandSet, DimseCommand, DimseStatus};
use crate::{DimseError, Result};

/// How long a connection refused for capacity may take to send its association request
pub const OVER_CAPACITY_NEGOTIATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifecycle of an association
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationState {
    Negotiating,
    Active,
    Terminated,
}

/// Protocol units as seen by an active association
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolUnit {
    /// A-ASSOCIATE-RQ/AC/RJ received after negotiation
    Negotiation(Pdu),
    Data(Vec<PDataValue>),
    Release,
    Abort(AbortRQSource),
    /// Anything else, kept so that it can be logged and skipped
    Other(Pdu),
}

impl From<Pdu> for ProtocolUnit {
    fn from(pdu: Pdu) -> Self {
        match pdu {
            Pdu::PData { data } => ProtocolUnit::Data(data),
            Pdu::ReleaseRQ => ProtocolUnit::Release,
            Pdu::AbortRQ { source } => ProtocolUnit::Abort(source),
            pdu @ (Pdu::AssociationRQ(_) | Pdu::AssociationAC(_) | Pdu::AssociationRJ(_)) => {
                ProtocolUnit::Negotiation(pdu)
            }
            other => ProtocolUnit::Other(other),
        }
    }
}

/// What happened to one received data set
#[derive(Debug)]
pub enum ObjectOutcome {
    /// Decoded and accepted by the handler
    Stored {
        sop_class_uid: Option<String>,
        identifier: String,
    },
    /// Not decodable under the configured transfer syntax
    Rejected(CodecError),
    /// Decoded, but the handler reported an error
    HandlerFailed {
        sop_class_uid: Option<String>,
        identifier: String,
        error: DimseError,
    },
}

impl ObjectOutcome {
    /// Status reported back to the peer
    pub fn status(&self) -> DimseStatus {
        match self {
            ObjectOutcome::Stored { .. } => DimseStatus::Success,
            ObjectOutcome::Rejected(_) => DimseStatus::Failure(status::CANNOT_UNDERSTAND),
            ObjectOutcome::HandlerFailed { .. } => {
                DimseStatus::Failure(status::PROCESSING_FAILURE)
            }
        }
    }
}

/// Why an association ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// Orderly A-RELEASE
    Released,
    /// A-ABORT received from the peer
    Aborted,
    /// Association request rejected
    Rejected,
    /// Transport closed or unreadable
    Closed,
    /// No PDU within the association timeout
    TimedOut,
    /// Server shutting down
    Shutdown,
    /// Protocol violation or local failure
    Failed(String),
}

/// Counters reported when an association ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub objects_received: u32,
    pub objects_rejected: u32,
    pub end: SessionEnd,
}

/// Everything a session needs that is shared across associations
pub struct SessionContext {
    pub config: DimseConfig,
    pub codec: Arc<dyn ObjectCodec>,
    pub handler: Arc<dyn StoreHandler>,
    command_codec: TransferSyntaxCodec,
}

impl SessionContext {
    pub fn new(
        config: DimseConfig,
        codec: Arc<dyn ObjectCodec>,
        handler: Arc<dyn StoreHandler>,
    ) -> Self {
        Self {
            config,
            codec,
            handler,
            command_codec: TransferSyntaxCodec::implicit_vr_little_endian(),
        }
    }
}

enum Received {
    Pdu(Pdu),
    Closed,
    TimedOut,
    Shutdown,
}

/// One association with a remote application entity
pub struct Association<S> {
    id: Uuid,
    peer: SocketAddr,
    framed: Framed<S, PduCodec>,
    state: AssociationState,
    context: Arc<SessionContext>,
    reassembler: Reassembler,
    pending_command: Option<CommandSet>,
    negotiated: Option<NegotiatedAssociation>,
    shutdown: CancellationToken,
    over_capacity: bool,
    objects_received: u32,
    objects_rejected: u32,
}

impl<S> Association<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(
        stream: S,
        peer: SocketAddr,
        context: Arc<SessionContext>,
        shutdown: CancellationToken,
    ) -> Self {
        let codec = PduCodec::new(context.config.max_pdu);
        let reassembler = Reassembler::new(context.config.max_object_size);
        Self {
            id: Uuid::new_v4(),
            peer,
            framed: Framed::new(stream, codec),
            state: AssociationState::Negotiating,
            context,
            reassembler,
            pending_command: None,
            negotiated: None,
            shutdown,
            over_capacity: false,
            objects_received: 0,
            objects_rejected: 0,
        }
    }

    /// Answer the association request with a local-limit rejection
    ///
    /// The request must then arrive within [`OVER_CAPACITY_NEGOTIATION_TIMEOUT`].
    pub fn over_capacity(mut self) -> Self {
        self.over_capacity = true;
        self
    }

    pub fn state(&self) -> AssociationState {
        self.state
    }

    /// Run the association to completion
    pub async fn run(mut self) -> SessionSummary {
        let span = info_span!(
            "association",
            id = %self.id,
            peer = %self.peer,
            calling_aet = field::Empty
        );

        async move {
            let end = match self.negotiate().await {
                Some(end) => end,
                None => self.serve().await,
            };
            self.state = AssociationState::Terminated;

            let summary = SessionSummary {
                objects_received: self.objects_received,
                objects_rejected: self.objects_rejected,
                end,
            };
            info!(
                received = summary.objects_received,
                rejected = summary.objects_rejected,
                end = ?summary.end,
                "Association terminated"
            );
            summary
        }
        .instrument(span)
        .await
    }

    /// Handle the association request; returns the end reason if not accepted
    async fn negotiate(&mut self) -> Option<SessionEnd> {
        let mut timeout = self.context.config.association_timeout();
        if self.over_capacity {
            timeout = timeout.min(OVER_CAPACITY_NEGOTIATION_TIMEOUT);
        }

        let rq = match self.receive(timeout).await {
            Ok(Received::Pdu(Pdu::AssociationRQ(rq))) => rq,
            Ok(Received::Pdu(other)) => {
                warn!("Expected A-ASSOCIATE-RQ, received {}", other.short_description());
                self.abort().await;
                return Some(SessionEnd::Failed(format!(
                    "unexpected {} during negotiation",
                    other.short_description()
                )));
            }
            Ok(Received::Closed) => return Some(SessionEnd::Closed),
            Ok(Received::TimedOut) => return Some(SessionEnd::TimedOut),
            Ok(Received::Shutdown) => return Some(SessionEnd::Shutdown),
            Err(e) => {
                info!(error = %e, "Unreadable association request");
                return Some(SessionEnd::Closed);
            }
        };

        Span::current().record("calling_aet", rq.calling_ae_title.as_str());
        debug!(
            called_aet = %rq.called_ae_title,
            contexts = rq.presentation_contexts.len(),
            "Association requested"
        );

        if self.over_capacity {
            warn!("Maximum associations reached, rejecting association");
            if let Err(e) = self.send(Pdu::AssociationRJ(local_limit_rejection())).await {
                debug!(error = %e, "Failed to send A-ASSOCIATE-RJ");
            }
            return Some(SessionEnd::Rejected);
        }

        let transfer_syntax = self.context.codec.transfer_syntax_uid().to_string();
        match negotiate(&rq, &self.context.config, &transfer_syntax) {
            Negotiation::Accept {
                response,
                association,
            } => {
                if association.accepted_contexts.is_empty() {
                    warn!(
                        transfer_syntax = %transfer_syntax,
                        "No presentation context proposes the accepted transfer syntax"
                    );
                }
                if let Err(e) = self.send(Pdu::AssociationAC(response)).await {
                    info!(error = %e, "Failed to send A-ASSOCIATE-AC");
                    return Some(SessionEnd::Closed);
                }
                info!(
                    calling_aet = %association.calling_ae_title,
                    accepted_contexts = association.accepted_contexts.len(),
                    "Association accepted"
                );
                self.negotiated = Some(association);
                self.state = AssociationState::Active;
                None
            }
            Negotiation::Reject(rj) => {
                warn!(
                    calling_aet = %rq.calling_ae_title,
                    called_aet = %rq.called_ae_title,
                    source = ?rj.source,
                    "Association rejected"
                );
                if let Err(e) = self.send(Pdu::AssociationRJ(rj)).await {
                    debug!(error = %e, "Failed to send A-ASSOCIATE-RJ");
                }
                Some(SessionEnd::Rejected)
            }
        }
    }

    /// Receive loop of an active association
    async fn serve(&mut self) -> SessionEnd {
        let timeout = self.context.config.association_timeout();
        loop {
            let received = match self.receive(timeout).await {
                Ok(received) => received,
                Err(e) => {
                    debug!(error = %e, "Read failed, ending association");
                    return SessionEnd::Closed;
                }
            };

            let pdu = match received {
                Received::Pdu(pdu) => pdu,
                Received::Closed => return SessionEnd::Closed,
                Received::TimedOut => {
                    warn!(
                        timeout_ms = self.context.config.association_timeout_ms,
                        "Association idle for too long"
                    );
                    self.abort().await;
                    return SessionEnd::TimedOut;
                }
                Received::Shutdown => {
                    info!("Server shutting down, aborting association");
                    self.abort().await;
                    return SessionEnd::Shutdown;
                }
            };

            match ProtocolUnit::from(pdu) {
                ProtocolUnit::Data(fragments) => {
                    if let Err(e) = self.handle_data(&fragments).await {
                        warn!(error = %e, "Ending association");
                        if !matches!(e, DimseError::Network(_)) {
                            self.abort().await;
                        }
                        return SessionEnd::Failed(e.to_string());
                    }
                }
                ProtocolUnit::Release => {
                    debug!("Release requested");
                    if let Err(e) = self.send(Pdu::ReleaseRP).await {
                        debug!(error = %e, "Failed to send A-RELEASE-RP");
                    }
                    return SessionEnd::Released;
                }
                ProtocolUnit::Abort(source) => {
                    if !self.reassembler.is_idle() || self.pending_command.is_some() {
                        debug!("Discarding partially received message");
                    }
                    self.reassembler.reset();
                    info!(source = ?source, "Association aborted by peer");
                    return SessionEnd::Aborted;
                }
                ProtocolUnit::Negotiation(pdu) | ProtocolUnit::Other(pdu) => {
                    debug!("Ignoring {} on active association", pdu.short_description());
                }
            }
        }
    }

    async fn handle_data(&mut self, fragments: &[PDataValue]) -> Result<()> {
        let outcome = self.reassembler.push_unit(fragments)?;
        let presentation_context_id = outcome.presentation_context_id.unwrap_or(1);

        if let Some(bytes) = outcome.command {
            match CommandSet::decode(&bytes, &self.context.command_codec) {
                Ok(command) => {
                    debug!(
                        command = ?command.command,
                        message_id = command.message_id,
                        "Command received"
                    );
                    if command.has_data_set {
                        self.pending_command = Some(command);
                    } else {
                        self.pending_command = None;
                        self.handle_command(command, presentation_context_id)
                            .await?;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Rejecting undecodable command set");
                    self.pending_command = None;
                    let ack = build_success()
                        .with_status(DimseStatus::Failure(status::CANNOT_UNDERSTAND));
                    self.acknowledge(&ack, presentation_context_id).await?;
                }
            }
        }

        if let Some(data) = outcome.data {
            let command = self.pending_command.take();
            self.handle_data_set(command, data, presentation_context_id)
                .await?;
        }

        Ok(())
    }

    /// Commands without a data set: only C-ECHO is supported
    async fn handle_command(
        &mut self,
        command: CommandSet,
        presentation_context_id: u8,
    ) -> Result<()> {
        let status = match command.command {
            DimseCommand::Echo if self.context.config.enable_echo => {
                debug!("C-ECHO");
                DimseStatus::Success
            }
            other => {
                warn!(
                    command_field = other.request_field(),
                    "Unsupported command without data set"
                );
                DimseStatus::Failure(status::UNRECOGNIZED_OPERATION)
            }
        };

        let ack = build_success().responding_to(&command).with_status(status);
        self.acknowledge(&ack, presentation_context_id).await
    }

    async fn handle_data_set(
        &mut self,
        command: Option<CommandSet>,
        data: Bytes,
        presentation_context_id: u8,
    ) -> Result<()> {
        let outcome = self.receive_object(&data).await;

        let mut ack = build_success().with_status(outcome.status());
        if let Some(command) = &command {
            ack = ack.responding_to(command);
        }

        match outcome {
            ObjectOutcome::Stored {
                sop_class_uid,
                identifier,
            } => {
                self.objects_received += 1;
                info!(
                    sop_instance_uid = %identifier,
                    size = data.len(),
                    "Object received"
                );
                ack = ack.with_fallback_uids(sop_class_uid, non_empty(identifier));
            }
            ObjectOutcome::Rejected(e) => {
                self.objects_rejected += 1;
                warn!(error = %e, size = data.len(), "Rejecting undecodable data set");
            }
            ObjectOutcome::HandlerFailed {
                sop_class_uid,
                identifier,
                error,
            } => {
                self.objects_rejected += 1;
                warn!(sop_instance_uid = %identifier, error = %error, "Store handler failed");
                ack = ack.with_fallback_uids(sop_class_uid, non_empty(identifier));
            }
        }

        self.acknowledge(&ack, presentation_context_id).await
    }

    /// Decode a data set and pass it to the handler
    async fn receive_object(&self, data: &[u8]) -> ObjectOutcome {
        let object = match self.context.codec.decode(data) {
            Ok(object) => object,
            Err(e) => return ObjectOutcome::Rejected(e),
        };

        let identifier = extract_identifier(&object);
        let sop_class_uid = read_uid(&object, tags::SOP_CLASS_UID);

        match self
            .context
            .handler
            .on_object(object, identifier.clone())
            .await
        {
            Ok(()) => ObjectOutcome::Stored {
                sop_class_uid,
                identifier,
            },
            Err(error) => ObjectOutcome::HandlerFailed {
                sop_class_uid,
                identifier,
                error,
            },
        }
    }

    async fn acknowledge(
        &mut self,
        ack: &Acknowledgement,
        presentation_context_id: u8,
    ) -> Result<()> {
        let fragment = to_fragment(ack, presentation_context_id, &self.context.command_codec)?;
        let peer_max_pdu = self
            .negotiated
            .as_ref()
            .map(|n| n.peer_max_pdu)
            .unwrap_or(0);

        for fragment in split_fragment(fragment, peer_max_pdu) {
            self.send(Pdu::PData {
                data: vec![fragment],
            })
            .await?;
        }
        debug!(status = ack.status.code(), "Acknowledgement sent");
        Ok(())
    }

    async fn receive(&mut self, timeout: Duration) -> Result<Received> {
        tokio::select! {
            _ = self.shutdown.cancelled() => Ok(Received::Shutdown),
            next = tokio::time::timeout(timeout, self.framed.next()) => match next {
                Err(_) => Ok(Received::TimedOut),
                Ok(None) => Ok(Received::Closed),
                Ok(Some(Ok(pdu))) => Ok(Received::Pdu(pdu)),
                Ok(Some(Err(e))) => Err(e),
            },
        }
    }

    async fn send(&mut self, pdu: Pdu) -> Result<()> {
        let name = pdu.short_description().to_string();
        let timeout = self.context.config.write_timeout();
        match tokio::time::timeout(timeout, self.framed.send(pdu)).await {
            Ok(result) => result,
            Err(_) => Err(DimseError::Timeout(format!("writing {}", name))),
        }
    }

    /// Best-effort A-ABORT from the service provider
    async fn abort(&mut self) {
        if let Err(e) = self
            .send(Pdu::AbortRQ {
                source: AbortRQSource::ServiceProvider(
                    AbortRQServiceProviderReason::ReasonNotSpecified,
                ),
            })
            .await
        {
            debug!(error = %e, "Failed to send A-ABORT");
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
