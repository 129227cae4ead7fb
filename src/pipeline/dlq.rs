//! DLQ funnel.
//!
//! Every pipeline error lands here. The funnel attaches diagnostic headers,
//! publishes the original payload bytes to the datacenter-matched DLQ topic
//! and, only when that produce succeeds, triggers the commit. A failed DLQ
//! produce leaves the offset uncommitted so the broker redelivers.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, warn};

use crate::channel::Channel;
use crate::constants::{
    DATACENTER_PLACEHOLDER, HEADER_DLQ_ERROR_CLASS, HEADER_DLQ_ERROR_KIND,
    HEADER_DLQ_ERROR_MESSAGE, HEADER_DLQ_FAILED_AT, HEADER_DLQ_SOURCE_TOPIC,
};
use crate::error::Error;
use crate::kafka::{CommitCoordinator, MessagePublisher};
use crate::pipeline::envelope::{Envelope, EnvelopeState};

/// Funnel catching pipeline errors into the channel DLQ.
pub struct DlqFunnel {
    channel: Channel,
    publisher: Arc<dyn MessagePublisher>,
}

impl DlqFunnel {
    pub fn new(channel: Channel, publisher: Arc<dyn MessagePublisher>) -> Self {
        DlqFunnel { channel, publisher }
    }

    /// Route a failed envelope to the DLQ and commit on success.
    ///
    /// Only errors from the catalogued pipeline kinds are absorbed; a
    /// DLQ-produce, commit or configuration error reaching this point is
    /// logged and left uncommitted for redelivery.
    pub async fn handle(&self, envelope: &mut Envelope, error: Error) {
        if !error.routes_to_dlq() {
            error!(
                envelope_id = %envelope.id,
                topic = %envelope.source_topic,
                error_kind = error.kind(),
                error = %error,
                "Error is not DLQ-eligible, message left for redelivery"
            );
            return;
        }

        error!(
            envelope_id = %envelope.id,
            topic = %envelope.source_topic,
            partition = envelope.partition,
            offset = envelope.offset,
            error_kind = error.kind(),
            error = %error,
            "Pipeline failed, routing to DLQ"
        );

        if !self.channel.is_dlq_enabled() {
            warn!(
                envelope_id = %envelope.id,
                "DLQ disabled, message will be redelivered"
            );
            return;
        }

        let Some(topic) = self.dlq_topic(envelope) else {
            error!(
                envelope_id = %envelope.id,
                source_topic = %envelope.source_topic,
                "No DLQ topic resolvable, message will be redelivered"
            );
            return;
        };

        let mut headers = envelope.headers.clone();
        headers.insert(
            HEADER_DLQ_SOURCE_TOPIC.to_string(),
            envelope.source_topic.clone(),
        );
        headers.insert(HEADER_DLQ_ERROR_KIND.to_string(), error.kind().to_string());
        headers.insert(HEADER_DLQ_ERROR_MESSAGE.to_string(), error.to_string());
        headers.insert(HEADER_DLQ_ERROR_CLASS.to_string(), error.class_name());
        headers.insert(HEADER_DLQ_FAILED_AT.to_string(), Utc::now().to_rfc3339());

        let key = envelope.producer_key();
        match self
            .publisher
            .publish(&topic, &key, &envelope.payload, &headers)
            .await
        {
            Ok(()) => {
                envelope.state = EnvelopeState::DlqProduced;
                CommitCoordinator::finalize(envelope);
            }
            Err(e) => {
                let dlq_error = Error::DlqProduce(e.to_string());
                error!(
                    envelope_id = %envelope.id,
                    dlq_topic = %topic,
                    error_kind = dlq_error.kind(),
                    error = %dlq_error,
                    "DLQ produce failed, offset left uncommitted"
                );
            }
        }
    }

    /// Resolve the DLQ topic for an envelope's datacenter.
    ///
    /// `channel.dlq.name` names the DLQ operation whose per-datacenter
    /// topics are the destinations; when no such operation exists the name
    /// is used as a literal topic (with `{datacenter}` substitution).
    fn dlq_topic(&self, envelope: &Envelope) -> Option<String> {
        let name = self.channel.dlq_name()?;

        let datacenter = envelope
            .datacenter
            .clone()
            .or_else(|| {
                self.channel
                    .datacenter_for_topic(&envelope.source_topic)
                    .map(str::to_string)
            });

        if let Some(operation) = self.channel.operation(name) {
            return match &datacenter {
                Some(dc) => operation.topics.select(dc),
                None => operation.topics.name.first().cloned(),
            };
        }

        match datacenter {
            Some(dc) => Some(name.replace(DATACENTER_PLACEHOLDER, &dc)),
            None => Some(name.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{request_envelope, sample_channel, MockCommitHandle, MockPublisher};

    fn funnel(publisher: Arc<MockPublisher>) -> DlqFunnel {
        DlqFunnel::new(sample_channel(), publisher)
    }

    #[tokio::test]
    async fn test_dlq_produce_attaches_diagnostics_and_commits() {
        let publisher = Arc::new(MockPublisher::new());
        let handle = MockCommitHandle::new();
        let mut envelope = request_envelope("RequestPayerCustomerOwnAccountRetrieve")
            .with_commit_handle(Box::new(handle.clone()));

        funnel(Arc::clone(&publisher))
            .handle(&mut envelope, Error::MissingMessageSchema)
            .await;

        let sent = publisher.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].topic,
            "mx.accountManagement.oab.sendAccountInformationDlqCreate.jrd"
        );
        assert_eq!(
            sent[0].headers.get("dlqErrorKind").map(String::as_str),
            Some("MissingMessageSchema")
        );
        assert_eq!(
            sent[0].headers.get("dlqSourceTopic").map(String::as_str),
            Some("mx.jrd.accountManagement.oab.payerQuery.input")
        );
        assert!(sent[0].headers.contains_key("dlqErrorMessage"));
        assert!(sent[0].headers.contains_key("dlqErrorClass"));

        // Body is the original payload.
        assert_eq!(sent[0].payload, envelope.payload);

        assert_eq!(handle.commit_count(), 1);
        assert_eq!(envelope.state, EnvelopeState::Committed);
    }

    #[tokio::test]
    async fn test_dlq_produce_failure_does_not_commit() {
        let publisher = Arc::new(MockPublisher::failing());
        let handle = MockCommitHandle::new();
        let mut envelope = request_envelope("RequestPayerCustomerOwnAccountRetrieve")
            .with_commit_handle(Box::new(handle.clone()));

        funnel(Arc::clone(&publisher))
            .handle(&mut envelope, Error::TypeMismatch("field".into()))
            .await;

        assert_eq!(handle.commit_count(), 0);
        assert!(envelope.commit_handle.is_some());
    }

    #[tokio::test]
    async fn test_ineligible_error_is_not_funnelled() {
        let publisher = Arc::new(MockPublisher::new());
        let handle = MockCommitHandle::new();
        let mut envelope = request_envelope("RequestPayerCustomerOwnAccountRetrieve")
            .with_commit_handle(Box::new(handle.clone()));

        funnel(Arc::clone(&publisher))
            .handle(&mut envelope, Error::DlqProduce("broker down".into()))
            .await;
        funnel(Arc::clone(&publisher))
            .handle(&mut envelope, Error::Commit("rebalance".into()))
            .await;

        assert!(publisher.sent().is_empty());
        assert_eq!(handle.commit_count(), 0);
        assert!(envelope.commit_handle.is_some());
    }

    #[tokio::test]
    async fn test_disabled_dlq_skips_produce_and_commit() {
        let publisher = Arc::new(MockPublisher::new());
        let mut channel = sample_channel();
        channel.dlq.as_mut().unwrap().enabled = false;

        let handle = MockCommitHandle::new();
        let mut envelope = request_envelope("RequestPayerCustomerOwnAccountRetrieve")
            .with_commit_handle(Box::new(handle.clone()));

        DlqFunnel::new(channel, publisher.clone())
            .handle(&mut envelope, Error::MissingMessageSchema)
            .await;

        assert!(publisher.sent().is_empty());
        assert_eq!(handle.commit_count(), 0);
    }
}
