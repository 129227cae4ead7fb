//! Test utilities for the gateway.
//!
//! This module provides mock implementations and sample fixtures for
//! testing: a recording publisher, a counting commit handle, and a channel
//! tree matching the shipped schema resources.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::channel::{AppConfig, Channel};
use crate::error::{Error, Result};
use crate::kafka::{CommitHandle, MessagePublisher};
use crate::pipeline::envelope::Envelope;
use crate::registry::SchemaRegistry;

/// Channel tree mirroring `config/application.yaml`.
pub const SAMPLE_CHANNEL_CONFIG: &str = r#"
app:
  channel:
    BNE:
      enabled: true
      timeout: 30000
      operations:
        requestPayerCustomerOwnAccountRetrieve:
          enabled: true
          name: requestPayerCustomerOwnAccountRetrieve
          flow: request
          jsonSchema: requestPayerCustomerOwnAccountRetrieve.json
          transform: ataRequestPayerCustomerOwnAccountRetrieve.jsonata
          avroSchema: RequestPayerCustomerOwnAccountRetrieve.avsc
          forwardTo: requestOwnAccountInformationPayerBeS016
          topics:
            dynamic: false
            name:
              - mx.jrd.accountManagement.oab.payerQuery.input
              - mx.qro.accountManagement.oab.payerQuery.input
          groupId: acmt-psk-kcp-dual-own-account-information-payer
        requestPayeeCustomerOwnAccountContractRetrieve:
          enabled: true
          name: requestPayeeCustomerOwnAccountContractRetrieve
          flow: request
          jsonSchema: requestPayeeCustomerOwnAccountContractRetrieve.json
          transform: ataRequestPayeeCustomerOwnAccountContractRetrieve.jsonata
          avroSchema: RequestPayeeCustomerOwnAccountContractRetrieve.avsc
          forwardTo: requestOwnAccountContractBeS017
          topics:
            dynamic: false
            name:
              - mx.jrd.customerManagement.oab.payeeContractQuery.input
              - mx.qro.customerManagement.oab.payeeContractQuery.input
          groupId: acmt-psk-kcp-dual-own-account-information-payee
        requestOwnAccountInformationPayerBeS016:
          enabled: true
          name: requestOwnAccountInformationPayerBeS016
          avroSchema: RequestOwnAccountInformationPayerBeS016.avsc
          messageSchema: RequestOwnAccountInformationPayerBeS016
          topics:
            dynamic: false
            name:
              - mx.accountManagement.oab.requestOwnAccountInformationPayerBeS016.jrd
              - mx.accountManagement.oab.requestOwnAccountInformationPayerBeS016.qro
        requestOwnAccountContractBeS017:
          enabled: true
          name: requestOwnAccountContractBeS017
          avroSchema: RequestOwnAccountContractBeS017.avsc
          messageSchema: RequestOwnAccountContractBeS017
          topics:
            dynamic: false
            name:
              - mx.customerManagement.oab.requestOwnAccountContractBeS017.jrd
              - mx.customerManagement.oab.requestOwnAccountContractBeS017.qro
        responseOwnAccountInformationPayerBeS016:
          enabled: true
          name: responseOwnAccountInformationPayerBeS016
          flow: response
          jsonSchema: responseOwnAccountInformationPayerBeS016.json
          transform: ataResponseOwnAccountInformationPayerBeS016.jsonata
          avroSchema: ResponseOwnAccountInformationPayerBeS016.avsc
          forwardTo: responsePayerCustomerOwnAccountRetrieve
          topics:
            dynamic: false
            name:
              - mx.accountManagement.oab.responseOwnAccountInformationPayerBeS016.jrd
              - mx.accountManagement.oab.responseOwnAccountInformationPayerBeS016.qro
          groupId: acmt-psk-kcp-dual-own-account-information-response
        responsePayerCustomerOwnAccountRetrieve:
          enabled: true
          name: responsePayerCustomerOwnAccountRetrieve
          avroSchema: ResponsePayerCustomerOwnAccountRetrieve.avsc
          messageSchema: ResponsePayerCustomerOwnAccountRetrieve
          topics:
            dynamic: false
            name:
              - mx.accountManagement.oab.responsePayerCustomerOwnAccountRetrieve.jrd
              - mx.accountManagement.oab.responsePayerCustomerOwnAccountRetrieve.qro
        sendAccountInformationDlqCreate:
          enabled: true
          name: sendAccountInformationDlqCreate
          topics:
            dynamic: false
            name:
              - mx.accountManagement.oab.sendAccountInformationDlqCreate.jrd
              - mx.accountManagement.oab.sendAccountInformationDlqCreate.qro
      dlq:
        enabled: true
        name: sendAccountInformationDlqCreate
      dataCenter:
        jrd: JRD
        qro: QRO
"#;

/// Parse the sample channel tree.
pub fn sample_config() -> AppConfig {
    AppConfig::from_str(SAMPLE_CHANNEL_CONFIG).expect("sample channel config parses")
}

/// The enabled channel of the sample tree.
pub fn sample_channel() -> Channel {
    let config = sample_config();
    let (_, channel) = config.enabled_channel().expect("BNE channel enabled");
    channel.clone()
}

/// Registry over the embedded schema resources.
pub fn sample_registry() -> SchemaRegistry {
    SchemaRegistry::new("embedded:schemas/")
}

/// Envelope as received on the payer request input topic (jrd side).
pub fn request_envelope(message_schema: &str) -> Envelope {
    let headers = HashMap::from([
        ("messageSchema".to_string(), message_schema.to_string()),
        ("channelId".to_string(), "BNE".to_string()),
        ("X-Correlation-Id".to_string(), "corr-1".to_string()),
    ]);
    Envelope::new(
        "mx.jrd.accountManagement.oab.payerQuery.input",
        0,
        100,
        vec![0],
        headers,
    )
}

/// Envelope as received on the EPortal response topic (qro side).
pub fn response_envelope(message_schema: &str) -> Envelope {
    let headers = HashMap::from([
        ("messageSchema".to_string(), message_schema.to_string()),
        ("channelId".to_string(), "BNE".to_string()),
        ("X-Correlation-Id".to_string(), "corr-2".to_string()),
    ]);
    Envelope::new(
        "mx.accountManagement.oab.responseOwnAccountInformationPayerBeS016.qro",
        1,
        7,
        vec![0],
        headers,
    )
}

/// A message recorded by the mock publisher.
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub topic: String,
    pub key: String,
    pub payload: Vec<u8>,
    pub headers: HashMap<String, String>,
}

/// Recording publisher with scriptable failures.
#[derive(Clone)]
pub struct MockPublisher {
    sent: Arc<Mutex<Vec<SentMessage>>>,
    failures_remaining: Arc<Mutex<usize>>,
}

impl Default for MockPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPublisher {
    /// A publisher that always succeeds.
    pub fn new() -> Self {
        MockPublisher {
            sent: Arc::new(Mutex::new(Vec::new())),
            failures_remaining: Arc::new(Mutex::new(0)),
        }
    }

    /// A publisher that always fails.
    pub fn failing() -> Self {
        let publisher = Self::new();
        *publisher.failures_remaining.lock().unwrap() = usize::MAX;
        publisher
    }

    /// Fail the next `count` publish calls, then succeed.
    pub fn fail_next(&self, count: usize) {
        *self.failures_remaining.lock().unwrap() = count;
    }

    /// Everything published so far.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// The last published message.
    pub fn last(&self) -> Option<SentMessage> {
        self.sent.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl MessagePublisher for MockPublisher {
    async fn publish(
        &self,
        topic: &str,
        key: &str,
        payload: &[u8],
        headers: &HashMap<String, String>,
    ) -> Result<()> {
        {
            let mut failures = self.failures_remaining.lock().unwrap();
            if *failures > 0 {
                if *failures != usize::MAX {
                    *failures -= 1;
                }
                return Err(Error::produce("mock broker unavailable"));
            }
        }

        self.sent.lock().unwrap().push(SentMessage {
            topic: topic.to_string(),
            key: key.to_string(),
            payload: payload.to_vec(),
            headers: headers.clone(),
        });
        Ok(())
    }
}

/// Counting commit handle.
#[derive(Clone)]
pub struct MockCommitHandle {
    commits: Arc<AtomicUsize>,
    fail: bool,
}

impl Default for MockCommitHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCommitHandle {
    pub fn new() -> Self {
        MockCommitHandle {
            commits: Arc::new(AtomicUsize::new(0)),
            fail: false,
        }
    }

    /// A handle whose commit always fails.
    pub fn failing() -> Self {
        MockCommitHandle {
            commits: Arc::new(AtomicUsize::new(0)),
            fail: true,
        }
    }

    /// How many times commit was invoked.
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }
}

impl CommitHandle for MockCommitHandle {
    fn commit(&self) -> Result<()> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(Error::Commit("mock commit failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_publisher_records_messages() {
        let publisher = MockPublisher::new();
        publisher
            .publish("topic-a", "0-1", b"payload", &HashMap::new())
            .await
            .unwrap();

        let sent = publisher.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].topic, "topic-a");
        assert_eq!(sent[0].payload, b"payload");
    }

    #[tokio::test]
    async fn test_mock_publisher_scripted_failures() {
        let publisher = MockPublisher::new();
        publisher.fail_next(1);

        assert!(publisher
            .publish("t", "k", b"p", &HashMap::new())
            .await
            .is_err());
        assert!(publisher
            .publish("t", "k", b"p", &HashMap::new())
            .await
            .is_ok());
        assert_eq!(publisher.sent().len(), 1);
    }

    #[test]
    fn test_mock_commit_handle_counts() {
        let handle = MockCommitHandle::new();
        assert_eq!(handle.commit_count(), 0);
        handle.commit().unwrap();
        handle.commit().unwrap();
        assert_eq!(handle.commit_count(), 2);
    }

    #[test]
    fn test_sample_config_is_valid() {
        assert!(sample_config().is_valid());
    }
}
