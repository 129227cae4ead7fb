//! Channel configuration tree.
//!
//! Binds the `app.channel.<id>` subtree from an external YAML file into an
//! immutable structure of channels, operations, topics and DLQ settings.
//! Unknown fields are ignored so newer configuration files keep loading on
//! older binaries. Invalid configuration is a startup-time fatal error and
//! never surfaces per message.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::constants::DATACENTER_PLACEHOLDER;
use crate::error::{Error, Result};

/// Which pipeline a consuming operation feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flow {
    Request,
    Response,
}

impl std::fmt::Display for Flow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Flow::Request => write!(f, "request"),
            Flow::Response => write!(f, "response"),
        }
    }
}

/// Root of the channel configuration file (`app:` prefix).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
struct ConfigRoot {
    #[serde(default)]
    app: AppSection,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
struct AppSection {
    #[serde(default)]
    channel: HashMap<String, Channel>,
}

/// Immutable channel configuration tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppConfig {
    channel: HashMap<String, Channel>,
}

impl AppConfig {
    /// Load the channel tree from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "cannot read channel configuration {}: {}",
                path.display(),
                e
            ))
        })?;
        contents.parse()
    }

    /// All configured channels.
    pub fn channels(&self) -> &HashMap<String, Channel> {
        &self.channel
    }

    /// The single enabled channel, if any.
    ///
    /// Ties are broken by channel id order so the selection is deterministic.
    pub fn enabled_channel(&self) -> Option<(&str, &Channel)> {
        let mut ids: Vec<&String> = self
            .channel
            .iter()
            .filter(|(_, c)| c.enabled)
            .map(|(id, _)| id)
            .collect();
        ids.sort();
        ids.first()
            .map(|id| (id.as_str(), &self.channel[id.as_str()]))
    }

    /// Look up an operation on the enabled channel.
    pub fn operation(&self, name: &str) -> Option<&Operation> {
        self.enabled_channel().and_then(|(_, c)| c.operation(name))
    }

    /// All operations of the enabled channel.
    pub fn all_operations(&self) -> HashMap<String, Operation> {
        self.enabled_channel()
            .map(|(_, c)| c.operations.clone())
            .unwrap_or_default()
    }

    /// Datacenter code for a key on the enabled channel.
    pub fn datacenter(&self, key: &str) -> Option<&str> {
        self.enabled_channel().and_then(|(_, c)| c.datacenter(key))
    }

    /// DLQ topic name configured on the enabled channel.
    pub fn dlq_topic(&self) -> Option<&str> {
        self.enabled_channel().and_then(|(_, c)| c.dlq_name())
    }

    /// Structural validity check.
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Validate the whole tree; any failure here aborts startup.
    pub fn validate(&self) -> Result<()> {
        if self.channel.is_empty() {
            return Err(Error::config("no channels configured"));
        }

        let (id, channel) = self
            .enabled_channel()
            .ok_or_else(|| Error::config("no enabled channel"))?;

        let consuming: Vec<&Operation> = channel
            .enabled_operations()
            .into_iter()
            .filter(|op| op.flow.is_some())
            .collect();
        if consuming.is_empty() {
            return Err(Error::config(format!(
                "channel {} has no enabled consuming operation",
                id
            )));
        }

        for op in consuming {
            op.validate_consumer()
                .map_err(|e| Error::config(format!("channel {}: {}", id, e)))?;
            if let Some(target) = &op.forward_to {
                let forward = channel.operation(target).ok_or_else(|| {
                    Error::config(format!(
                        "operation {} forwards to unknown operation {}",
                        op.name, target
                    ))
                })?;
                if forward.binary_schema.is_empty() {
                    return Err(Error::config(format!(
                        "forward operation {} has no Avro schema",
                        target
                    )));
                }
                if !forward.topics.has_destinations() {
                    return Err(Error::config(format!(
                        "forward operation {} has no topics",
                        target
                    )));
                }
            }
        }

        Ok(())
    }
}

impl FromStr for AppConfig {
    type Err = Error;

    /// Parse the channel tree from a YAML string.
    fn from_str(contents: &str) -> Result<Self> {
        let root: ConfigRoot = serde_yaml::from_str(contents)
            .map_err(|e| Error::config(format!("invalid channel configuration: {}", e)))?;
        Ok(AppConfig {
            channel: root.app.channel,
        })
    }
}

/// One logical channel: operations, DLQ and datacenter mappings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    #[serde(default)]
    pub enabled: bool,

    /// Per-envelope processing deadline in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout: u64,

    #[serde(default)]
    pub operations: HashMap<String, Operation>,

    #[serde(default)]
    pub dlq: Option<Dlq>,

    /// Datacenter key → code map (e.g. `jrd` → `JRD`).
    #[serde(default)]
    pub data_center: HashMap<String, String>,
}

impl Channel {
    /// Look up an operation by its key.
    pub fn operation(&self, name: &str) -> Option<&Operation> {
        self.operations.get(name)
    }

    /// All enabled operations, sorted by name for deterministic iteration.
    pub fn enabled_operations(&self) -> Vec<&Operation> {
        let mut ops: Vec<&Operation> =
            self.operations.values().filter(|op| op.enabled).collect();
        ops.sort_by(|a, b| a.name.cmp(&b.name));
        ops
    }

    /// Enabled consuming operations of the given flow.
    pub fn consuming_operations(&self, flow: Flow) -> Vec<&Operation> {
        self.enabled_operations()
            .into_iter()
            .filter(|op| op.flow == Some(flow))
            .collect()
    }

    /// Datacenter code for a key.
    pub fn datacenter(&self, key: &str) -> Option<&str> {
        self.data_center.get(key).map(String::as_str)
    }

    /// Derive the datacenter key from a topic name by substring match.
    ///
    /// Keys are scanned in sorted order so the result is deterministic.
    pub fn datacenter_for_topic(&self, topic: &str) -> Option<&str> {
        let mut keys: Vec<&String> = self.data_center.keys().collect();
        keys.sort();
        keys.into_iter()
            .find(|key| topic.contains(key.as_str()))
            .map(String::as_str)
    }

    /// Check if the DLQ is configured and enabled.
    pub fn is_dlq_enabled(&self) -> bool {
        self.dlq.as_ref().is_some_and(|d| d.enabled)
    }

    /// DLQ name, if configured.
    pub fn dlq_name(&self) -> Option<&str> {
        self.dlq.as_ref().map(|d| d.name.as_str())
    }
}

/// One named operation: the unit of routing.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub topics: Topics,

    #[serde(default)]
    pub group_id: String,

    /// Avro record schema resource (decode for consuming operations,
    /// encode for forward operations).
    #[serde(default, rename = "avroSchema")]
    pub binary_schema: String,

    /// JSONata transform expression resource.
    #[serde(default, rename = "transform")]
    pub transform_expr: String,

    /// JSON schema resource validating the decoded payload.
    #[serde(default, rename = "jsonSchema")]
    pub json_schema: String,

    /// Outbound messageSchema header value announced by this operation.
    #[serde(default)]
    pub message_schema: Option<String>,

    /// Produce-side operation whose topics and schema describe the output.
    #[serde(default)]
    pub forward_to: Option<String>,

    /// Present on consuming operations only.
    #[serde(default)]
    pub flow: Option<Flow>,

    /// Extra mandatory inbound headers beyond channelId/messageSchema.
    #[serde(default)]
    pub required_headers: Vec<String>,
}

impl Operation {
    /// Filename stem of the Avro schema resource.
    pub fn schema_stem(&self) -> &str {
        let name = self
            .binary_schema
            .rsplit('/')
            .next()
            .unwrap_or(&self.binary_schema);
        name.split('.').next().unwrap_or(name)
    }

    /// Outbound messageSchema value: explicit setting or the schema stem.
    pub fn outbound_message_schema(&self) -> String {
        self.message_schema
            .clone()
            .unwrap_or_else(|| self.schema_stem().to_string())
    }

    /// Check whether a messageSchema header value designates this operation.
    ///
    /// Matches the canonical name, the configured Avro schema filename, or
    /// that filename's stem. Case-sensitive.
    pub fn matches_schema(&self, header: &str) -> bool {
        header == self.name || header == self.binary_schema || header == self.schema_stem()
    }

    fn validate_consumer(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::config("operation has no name"));
        }
        if self.binary_schema.is_empty()
            || self.transform_expr.is_empty()
            || self.json_schema.is_empty()
        {
            return Err(Error::config(format!(
                "operation {} is missing a schema reference",
                self.name
            )));
        }
        if !self.topics.has_destinations() {
            return Err(Error::config(format!(
                "operation {} has no topics",
                self.name
            )));
        }
        if self.group_id.is_empty() {
            return Err(Error::config(format!(
                "operation {} has no group id",
                self.name
            )));
        }
        Ok(())
    }
}

/// Kafka topic configuration of an operation.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topics {
    #[serde(default)]
    pub dynamic: bool,

    /// Template topic for dynamic resolution (`{datacenter}` placeholder).
    #[serde(default, rename = "topicD")]
    pub topic_default: Option<String>,

    #[serde(default)]
    pub name: Vec<String>,
}

impl Topics {
    /// Check that at least one destination can be derived.
    pub fn has_destinations(&self) -> bool {
        if self.dynamic {
            self.topic_default.as_ref().is_some_and(|t| !t.is_empty())
        } else {
            !self.name.is_empty()
        }
    }

    /// Select the topic matching a datacenter key.
    ///
    /// Dynamic topics substitute the key into the template; static lists
    /// pick the first entry containing the key as a dot-separated segment.
    pub fn select(&self, datacenter: &str) -> Option<String> {
        if self.dynamic {
            return self
                .topic_default
                .as_ref()
                .map(|t| t.replace(DATACENTER_PLACEHOLDER, datacenter));
        }
        self.name
            .iter()
            .find(|t| t.split('.').any(|segment| segment == datacenter))
            .cloned()
    }

    /// All static topic names, with dynamic templates expanded per key.
    pub fn expand(&self, datacenters: &[&str]) -> Vec<String> {
        if self.dynamic {
            match &self.topic_default {
                Some(template) => datacenters
                    .iter()
                    .map(|dc| template.replace(DATACENTER_PLACEHOLDER, dc))
                    .collect(),
                None => Vec::new(),
            }
        } else {
            self.name.clone()
        }
    }
}

/// Dead-letter queue configuration of a channel.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dlq {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub name: String,
}

impl Dlq {
    /// Check if the DLQ is usable.
    pub fn is_valid(&self) -> bool {
        self.enabled && !self.name.is_empty()
    }
}

fn default_timeout_ms() -> u64 {
    30_000
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
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
      dlq:
        enabled: true
        name: sendAccountInformationDlqCreate
      dataCenter:
        jrd: JRD
        qro: QRO
"#;

    #[test]
    fn test_parse_sample_tree() {
        let config = AppConfig::from_str(SAMPLE).unwrap();
        let (id, channel) = config.enabled_channel().unwrap();
        assert_eq!(id, "BNE");
        assert_eq!(channel.timeout, 30000);
        assert_eq!(channel.operations.len(), 2);
        assert_eq!(channel.datacenter("jrd"), Some("JRD"));
        assert!(channel.is_dlq_enabled());
    }

    #[test]
    fn test_validation_passes() {
        let config = AppConfig::from_str(SAMPLE).unwrap();
        assert!(config.is_valid());
    }

    #[test]
    fn test_loading_is_idempotent() {
        let first = AppConfig::from_str(SAMPLE).unwrap();
        let second = AppConfig::from_str(SAMPLE).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let with_extra = SAMPLE.replace("timeout: 30000", "timeout: 30000\n      futureKnob: 42");
        let config = AppConfig::from_str(&with_extra).unwrap();
        assert!(config.is_valid());
    }

    #[test]
    fn test_empty_tree_is_invalid() {
        let config = AppConfig::from_str("app:\n  channel: {}\n").unwrap();
        assert!(!config.is_valid());
    }

    #[test]
    fn test_disabled_channel_is_invalid() {
        let disabled = SAMPLE.replace("enabled: true", "enabled: false");
        let config = AppConfig::from_str(&disabled).unwrap();
        assert!(!config.is_valid());
    }

    #[test]
    fn test_missing_schema_reference_is_invalid() {
        let broken = SAMPLE.replace(
            "jsonSchema: requestPayerCustomerOwnAccountRetrieve.json",
            "jsonSchema: \"\"",
        );
        let config = AppConfig::from_str(&broken).unwrap();
        assert!(!config.is_valid());
    }

    #[test]
    fn test_schema_stem_and_matching() {
        let config = AppConfig::from_str(SAMPLE).unwrap();
        let op = config
            .operation("requestPayerCustomerOwnAccountRetrieve")
            .unwrap();
        assert_eq!(op.schema_stem(), "RequestPayerCustomerOwnAccountRetrieve");
        assert!(op.matches_schema("requestPayerCustomerOwnAccountRetrieve"));
        assert!(op.matches_schema("RequestPayerCustomerOwnAccountRetrieve"));
        assert!(op.matches_schema("RequestPayerCustomerOwnAccountRetrieve.avsc"));
        assert!(!op.matches_schema("requestpayercustomerownaccountretrieve"));
    }

    #[test]
    fn test_topic_selection_static() {
        let topics = Topics {
            dynamic: false,
            topic_default: None,
            name: vec![
                "mx.jrd.accountManagement.oab.payerQuery.input".to_string(),
                "mx.qro.accountManagement.oab.payerQuery.input".to_string(),
            ],
        };
        assert_eq!(
            topics.select("qro").unwrap(),
            "mx.qro.accountManagement.oab.payerQuery.input"
        );
        assert!(topics.select("mty").is_none());
    }

    #[test]
    fn test_topic_selection_dynamic() {
        let topics = Topics {
            dynamic: true,
            topic_default: Some("mx.{datacenter}.accountManagement.oab.payerQuery.input".into()),
            name: Vec::new(),
        };
        assert_eq!(
            topics.select("jrd").unwrap(),
            "mx.jrd.accountManagement.oab.payerQuery.input"
        );
        assert_eq!(
            topics.expand(&["jrd", "qro"]),
            vec![
                "mx.jrd.accountManagement.oab.payerQuery.input".to_string(),
                "mx.qro.accountManagement.oab.payerQuery.input".to_string(),
            ]
        );
    }

    #[test]
    fn test_datacenter_for_topic() {
        let config = AppConfig::from_str(SAMPLE).unwrap();
        let (_, channel) = config.enabled_channel().unwrap();
        assert_eq!(
            channel.datacenter_for_topic("mx.jrd.accountManagement.oab.payerQuery.input"),
            Some("jrd")
        );
        assert_eq!(
            channel.datacenter_for_topic(
                "mx.accountManagement.oab.responseOwnAccountInformationPayerBeS016.qro"
            ),
            Some("qro")
        );
        assert_eq!(channel.datacenter_for_topic("mx.mty.something.input"), None);
    }
}
