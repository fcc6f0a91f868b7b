//! Client configuration.
//!
//! [`ConnectionConfig`] names the hub and how to reach it;
//! [`ReceiverConfig`] enumerates every receiver option and is validated once,
//! when the receiver is constructed.

use std::num::NonZeroU32;

use eventide_checkpoint::ResumeMode;
use eventide_core::limits::{
    check_positive_bounded, CHECKPOINT_INTERVAL_DEFAULT, CHECKPOINT_INTERVAL_MAX,
    PREFETCH_COUNT_DEFAULT, PREFETCH_COUNT_MAX,
};
use eventide_core::{ConsumerGroup, Error, PartitionId, Result, StreamId, Timestamp};

use crate::error::{ConfigError, ConfigResult};

/// AMQPS port.
pub const AMQPS_PORT: u16 = 5671;

/// Host suffix appended to the namespace.
const HOST_SUFFIX: &str = "servicebus.windows.net";

// -----------------------------------------------------------------------------
// Connection
// -----------------------------------------------------------------------------

/// Where the hub lives and how to authenticate.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Service namespace (first label of the host name).
    pub namespace: String,
    /// Hub (stream) name.
    pub hub: StreamId,
    /// Shared access key name.
    pub key_name: Option<String>,
    /// Shared access key.
    pub key: Option<String>,
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("namespace", &self.namespace)
            .field("hub", &self.hub)
            .field("key_name", &self.key_name)
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ConnectionConfig {
    /// Creates a connection config without credentials.
    #[must_use]
    pub fn new(namespace: impl Into<String>, hub: StreamId) -> Self {
        Self {
            namespace: namespace.into(),
            hub,
            key_name: None,
            key: None,
        }
    }

    /// Sets the shared access key.
    #[must_use]
    pub fn with_shared_access_key(
        mut self,
        key_name: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        self.key_name = Some(key_name.into());
        self.key = Some(key.into());
        self
    }

    /// Parses an Azure-style connection string:
    ///
    /// ```text
    /// Endpoint=sb://<namespace>.servicebus.windows.net/;SharedAccessKeyName=<name>;SharedAccessKey=<key>;EntityPath=<hub>
    /// ```
    ///
    /// Unknown segments are ignored. Values may contain `=`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConnectionString` if `Endpoint` or `EntityPath` is
    /// missing or the endpoint has no `//`, and `InvalidArgument` if the hub
    /// name is not a valid stream name.
    pub fn parse(conn_str: &str) -> Result<Self> {
        let mut endpoint = None;
        let mut key_name = None;
        let mut key = None;
        let mut entity_path = None;

        for segment in conn_str.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let Some((name, value)) = segment.split_once('=') else {
                continue;
            };
            match name.trim() {
                "Endpoint" => endpoint = Some(value),
                "SharedAccessKeyName" => key_name = Some(value.to_string()),
                "SharedAccessKey" => key = Some(value.to_string()),
                "EntityPath" => entity_path = Some(value),
                _ => {}
            }
        }

        let endpoint = endpoint.ok_or(Error::InvalidConnectionString {
            reason: "missing Endpoint",
        })?;
        let entity_path = entity_path.ok_or(Error::InvalidConnectionString {
            reason: "missing EntityPath",
        })?;

        let (_, host) = endpoint.split_once("//").ok_or(Error::InvalidConnectionString {
            reason: "Endpoint has no '//'",
        })?;
        let namespace = host.split(['.', '/']).next().unwrap_or_default();
        if namespace.is_empty() {
            return Err(Error::InvalidConnectionString {
                reason: "Endpoint has no namespace",
            });
        }

        Ok(Self {
            namespace: namespace.to_string(),
            hub: StreamId::new(entity_path)?,
            key_name,
            key,
        })
    }

    /// Returns `{namespace}.servicebus.windows.net`.
    #[must_use]
    pub fn host(&self) -> String {
        format!("{}.{HOST_SUFFIX}", self.namespace)
    }

    /// Returns the AMQPS port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        AMQPS_PORT
    }

    /// Returns the source address of a partition receiver:
    /// `{hub}/ConsumerGroups/{group}/Partitions/{partition}`.
    #[must_use]
    pub fn receive_address(&self, group: &ConsumerGroup, partition: PartitionId) -> String {
        format!(
            "{}/ConsumerGroups/{group}/Partitions/{}",
            self.hub,
            partition.get()
        )
    }

    /// Returns the target address for senders, which is the hub itself.
    #[must_use]
    pub fn send_address(&self) -> String {
        self.hub.to_string()
    }
}

// -----------------------------------------------------------------------------
// Receiver
// -----------------------------------------------------------------------------

/// Options recognised when constructing a partition receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverConfig {
    /// Consumer group to read as.
    pub consumer_group: ConsumerGroup,
    /// Persist a checkpoint every this many delivered events.
    pub checkpoint_interval: u32,
    /// Where to start. Must be set.
    pub resume_mode: Option<ResumeMode>,
    /// Link credit granted to the service.
    pub prefetch_count: u32,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            consumer_group: ConsumerGroup::default(),
            checkpoint_interval: CHECKPOINT_INTERVAL_DEFAULT,
            resume_mode: None,
            prefetch_count: PREFETCH_COUNT_DEFAULT,
        }
    }
}

impl ReceiverConfig {
    /// Creates a config with defaults and no resume mode.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults, resuming from the stored checkpoint.
    #[must_use]
    pub fn from_checkpoint() -> Self {
        Self::default().with_resume_mode(ResumeMode::FromCheckpoint)
    }

    /// Defaults, starting at events enqueued at or after `time`.
    #[must_use]
    pub fn from_wall_clock_time(time: Timestamp) -> Self {
        Self::default().with_resume_mode(ResumeMode::FromWallClockTime(time))
    }

    /// Sets the consumer group.
    #[must_use]
    pub fn with_consumer_group(mut self, group: ConsumerGroup) -> Self {
        self.consumer_group = group;
        self
    }

    /// Sets the checkpoint interval.
    #[must_use]
    pub const fn with_checkpoint_interval(mut self, interval: u32) -> Self {
        self.checkpoint_interval = interval;
        self
    }

    /// Sets the resume mode.
    #[must_use]
    pub const fn with_resume_mode(mut self, mode: ResumeMode) -> Self {
        self.resume_mode = Some(mode);
        self
    }

    /// Sets the prefetch count.
    #[must_use]
    pub const fn with_prefetch_count(mut self, count: u32) -> Self {
        self.prefetch_count = count;
        self
    }

    /// Validates every option.
    ///
    /// # Errors
    ///
    /// Returns `InvalidResumeMode` if no mode is set, and
    /// `InvalidCheckpointInterval` / `InvalidPrefetchCount` for out-of-range
    /// values.
    pub fn validate(&self) -> ConfigResult<()> {
        self.resolve().map(|_| ())
    }

    /// Validates and returns the resume mode and checkpoint interval.
    pub(crate) fn resolve(&self) -> ConfigResult<(ResumeMode, NonZeroU32)> {
        let mode = self.resume_mode.ok_or(ConfigError::InvalidResumeMode)?;

        check_positive_bounded(
            "checkpoint_interval",
            self.checkpoint_interval,
            CHECKPOINT_INTERVAL_MAX,
        )
        .map_err(|_| ConfigError::InvalidCheckpointInterval {
            value: self.checkpoint_interval,
            max: CHECKPOINT_INTERVAL_MAX,
        })?;
        check_positive_bounded("prefetch_count", self.prefetch_count, PREFETCH_COUNT_MAX)
            .map_err(|_| ConfigError::InvalidPrefetchCount {
                value: self.prefetch_count,
                max: PREFETCH_COUNT_MAX,
            })?;

        let interval = NonZeroU32::new(self.checkpoint_interval).ok_or(
            ConfigError::InvalidCheckpointInterval {
                value: self.checkpoint_interval,
                max: CHECKPOINT_INTERVAL_MAX,
            },
        )?;
        Ok((mode, interval))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONN: &str = "Endpoint=sb://contoso.servicebus.windows.net/;\
        SharedAccessKeyName=RootManageSharedAccessKey;\
        SharedAccessKey=abc+def/ghi=;EntityPath=telemetry";

    #[test]
    fn test_parse_connection_string() {
        let config = ConnectionConfig::parse(CONN).unwrap();
        assert_eq!(config.namespace, "contoso");
        assert_eq!(config.hub.as_str(), "telemetry");
        assert_eq!(config.key_name.as_deref(), Some("RootManageSharedAccessKey"));
        assert_eq!(config.key.as_deref(), Some("abc+def/ghi="));
        assert_eq!(config.host(), "contoso.servicebus.windows.net");
        assert_eq!(config.port(), 5671);
    }

    #[test]
    fn test_parse_rejects_incomplete_strings() {
        assert!(matches!(
            ConnectionConfig::parse("EntityPath=hub"),
            Err(Error::InvalidConnectionString { .. })
        ));
        assert!(matches!(
            ConnectionConfig::parse("Endpoint=sb://ns.servicebus.windows.net/"),
            Err(Error::InvalidConnectionString { .. })
        ));
        assert!(matches!(
            ConnectionConfig::parse("Endpoint=ns.servicebus.windows.net;EntityPath=hub"),
            Err(Error::InvalidConnectionString { .. })
        ));
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = ConnectionConfig::parse(CONN).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("abc+def"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_addresses() {
        let config = ConnectionConfig::new("contoso", StreamId::new("telemetry").unwrap());
        assert_eq!(
            config.receive_address(&ConsumerGroup::default(), PartitionId::new(3)),
            "telemetry/ConsumerGroups/$Default/Partitions/3"
        );
        assert_eq!(config.send_address(), "telemetry");
    }

    #[test]
    fn test_receiver_defaults() {
        let config = ReceiverConfig::default();
        assert_eq!(config.consumer_group.as_str(), "$Default");
        assert_eq!(config.checkpoint_interval, 100);
        assert_eq!(config.prefetch_count, 300);
        assert_eq!(config.validate(), Err(ConfigError::InvalidResumeMode));
    }

    #[test]
    fn test_receiver_validation() {
        assert!(ReceiverConfig::from_checkpoint().validate().is_ok());
        assert!(matches!(
            ReceiverConfig::from_checkpoint()
                .with_checkpoint_interval(0)
                .validate(),
            Err(ConfigError::InvalidCheckpointInterval { value: 0, .. })
        ));
        assert!(matches!(
            ReceiverConfig::from_checkpoint()
                .with_prefetch_count(PREFETCH_COUNT_MAX + 1)
                .validate(),
            Err(ConfigError::InvalidPrefetchCount { .. })
        ));

        let (mode, interval) = ReceiverConfig::from_wall_clock_time(Timestamp::from_millis(9))
            .with_checkpoint_interval(3)
            .resolve()
            .unwrap();
        assert_eq!(mode, ResumeMode::FromWallClockTime(Timestamp::from_millis(9)));
        assert_eq!(interval.get(), 3);
    }
}
