//! Association negotiation policy
//!
//! Decides how an A-ASSOCIATE-RQ is answered. The decision is a pure function of the
//! request and the SCP configuration, so it can be tested without a transport.

use crate::config::DimseConfig;
use crate::pdu::{
    requested_max_pdu_length, AssociationAC, AssociationRJ, AssociationRJResult,
    AssociationRJServiceProviderASCEReason, AssociationRJServiceProviderPresentationReason,
    AssociationRJServiceUserReason, AssociationRJSource, AssociationRQ,
    PresentationContextResult, PresentationContextResultReason, UserVariableItem,
    APPLICATION_CONTEXT_NAME, PROTOCOL_VERSION,
};

/// Parameters agreed with the peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiatedAssociation {
    pub calling_ae_title: String,
    pub called_ae_title: String,
    /// Largest PDU the peer accepts, 0 for no limit
    pub peer_max_pdu: u32,
    /// Ids of the presentation contexts that were accepted
    pub accepted_contexts: Vec<u8>,
}

/// Answer to an association request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Negotiation {
    Accept {
        response: AssociationAC,
        association: NegotiatedAssociation,
    },
    Reject(AssociationRJ),
}

/// Evaluate an association request against the configuration
///
/// Identity checks only apply in strict mode: the called AE title must be ours and the
/// calling AE title must be listed in `allowed_peers`. Presentation contexts are accepted
/// when they propose `transfer_syntax`, and rejected one by one otherwise.
pub fn negotiate(rq: &AssociationRQ, config: &DimseConfig, transfer_syntax: &str) -> Negotiation {
    if rq.protocol_version & PROTOCOL_VERSION == 0 {
        return Negotiation::Reject(AssociationRJ {
            result: AssociationRJResult::Permanent,
            source: AssociationRJSource::ServiceProviderASCE(
                AssociationRJServiceProviderASCEReason::ProtocolVersionNotSupported,
            ),
        });
    }

    if rq.application_context_name != APPLICATION_CONTEXT_NAME {
        return Negotiation::Reject(AssociationRJ {
            result: AssociationRJResult::Permanent,
            source: AssociationRJSource::ServiceUser(
                AssociationRJServiceUserReason::ApplicationContextNameNotSupported,
            ),
        });
    }

    if config.strict {
        if rq.called_ae_title.trim() != config.local_aet.trim() {
            return Negotiation::Reject(AssociationRJ {
                result: AssociationRJResult::Permanent,
                source: AssociationRJSource::ServiceUser(
                    AssociationRJServiceUserReason::CalledAETitleNotRecognized,
                ),
            });
        }
        if !config.is_allowed_peer(&rq.calling_ae_title) {
            return Negotiation::Reject(AssociationRJ {
                result: AssociationRJResult::Permanent,
                source: AssociationRJSource::ServiceUser(
                    AssociationRJServiceUserReason::CallingAETitleNotRecognized,
                ),
            });
        }
    }

    let presentation_contexts: Vec<PresentationContextResult> = rq
        .presentation_contexts
        .iter()
        .map(|pc| {
            let reason = if pc.abstract_syntax.is_empty() {
                PresentationContextResultReason::AbstractSyntaxNotSupported
            } else if pc.transfer_syntaxes.iter().any(|ts| ts == transfer_syntax) {
                PresentationContextResultReason::Acceptance
            } else {
                PresentationContextResultReason::TransferSyntaxesNotSupported
            };
            PresentationContextResult {
                id: pc.id,
                reason,
                transfer_syntax: transfer_syntax.to_string(),
            }
        })
        .collect();

    let accepted_contexts = presentation_contexts
        .iter()
        .filter(|pc| pc.reason == PresentationContextResultReason::Acceptance)
        .map(|pc| pc.id)
        .collect();

    let response = AssociationAC {
        protocol_version: PROTOCOL_VERSION,
        called_ae_title: rq.called_ae_title.clone(),
        calling_ae_title: rq.calling_ae_title.clone(),
        application_context_name: APPLICATION_CONTEXT_NAME.to_string(),
        presentation_contexts,
        user_variables: vec![
            UserVariableItem::MaxLength(config.max_pdu),
            UserVariableItem::ImplementationClassUID(config.implementation_class_uid.clone()),
            UserVariableItem::ImplementationVersionName(config.implementation_version_name.clone()),
        ],
    };

    Negotiation::Accept {
        response,
        association: NegotiatedAssociation {
            calling_ae_title: rq.calling_ae_title.clone(),
            called_ae_title: rq.called_ae_title.clone(),
            peer_max_pdu: requested_max_pdu_length(rq).unwrap_or(0),
            accepted_contexts,
        },
    }
}

/// Rejection sent when the SCP is already serving `max_associations` peers
pub fn local_limit_rejection() -> AssociationRJ {
    AssociationRJ {
        result: AssociationRJResult::Transient,
        source: AssociationRJSource::ServiceProviderPresentation(
            AssociationRJServiceProviderPresentationReason::LocalLimitExceeded,
        ),
    }
}
