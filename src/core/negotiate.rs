//! Identity negotiation
//!
//! Runs once at startup, before any bus command is handled:
//!
//! ```text
//! Unqueried -> AwaitingResponse -> NamedExisting  -> Published
//!                               \-> NamedGenerated -/
//! ```
//!
//! The device is asked for its stored name. If it answers with a non-empty
//! `?Name,<value>` line that value is adopted, otherwise a fresh identity is
//! generated and persisted on the device. Either way the identity is then
//! announced on the bus exactly once.

use crate::core::bus::{BusMessage, MessageBus};
use crate::core::identity::Identity;
use crate::core::protocol::{name_command, DeviceLink, NAME_QUERY, NAME_RESPONSE_PREFIX};
use crate::core::telemetry::{Telemetry, TelemetryEvent};
use rand::Rng;
use std::time::Duration;

/// Default wait between a query and reading the device's reply
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Negotiation progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    /// Nothing sent yet
    Unqueried,
    /// Name query sent
    AwaitingResponse,
    /// Device reported a stored identity
    NamedExisting,
    /// A fresh identity was generated and persisted
    NamedGenerated,
    /// Identity announced on the bus
    Published,
}

/// Pick the identity out of the device's reply lines.
///
/// The last non-empty `?Name,<value>` wins. Lines whose value holds another
/// separator are malformed and skipped.
pub fn identity_from_responses(lines: &[String]) -> Option<Identity> {
    let mut found = None;
    for line in lines {
        let Some(value) = line.strip_prefix(NAME_RESPONSE_PREFIX) else {
            continue;
        };
        if value.contains(',') {
            tracing::debug!(line = %line, "Skipping malformed name response");
            continue;
        }
        if let Ok(identity) = Identity::new(value) {
            found = Some(identity);
        }
    }
    found
}

/// Drives the startup negotiation against one device link
pub struct IdentityNegotiator<'a> {
    link: &'a mut DeviceLink,
    telemetry: &'a dyn Telemetry,
    settle_delay: Duration,
    state: NegotiationState,
}

impl<'a> IdentityNegotiator<'a> {
    /// Create a negotiator
    pub fn new(link: &'a mut DeviceLink, telemetry: &'a dyn Telemetry, settle_delay: Duration) -> Self {
        Self {
            link,
            telemetry,
            settle_delay,
            state: NegotiationState::Unqueried,
        }
    }

    /// Current state
    pub fn state(&self) -> NegotiationState {
        self.state
    }

    /// Establish the identity, querying the device and falling back to a generated one
    pub async fn resolve<R>(&mut self, rng: &mut R) -> Identity
    where
        R: Rng + Send + ?Sized,
    {
        if let Err(e) = self.link.send_command(NAME_QUERY) {
            tracing::warn!(error = %e, "Name query failed");
            self.telemetry.notice_error("name query", &e);
        }
        self.state = NegotiationState::AwaitingResponse;

        tokio::time::sleep(self.settle_delay).await;

        let lines = match self.link.read_lines() {
            Ok(lines) => lines,
            Err(e) => {
                tracing::warn!(error = %e, "No response to name query");
                self.telemetry.notice_error("name response", &e);
                Vec::new()
            }
        };

        if let Some(identity) = identity_from_responses(&lines) {
            tracing::info!(identity = %identity, "Device reported stored identity");
            self.state = NegotiationState::NamedExisting;
            return identity;
        }

        let identity = Identity::generate(rng);
        tracing::info!(identity = %identity, "Assigning generated identity");
        self.telemetry.record_event(TelemetryEvent::NameSet {
            old_name: None,
            new_name: identity.to_string(),
        });

        if let Err(e) = self.link.send_command(&name_command(identity.as_str())) {
            tracing::warn!(error = %e, "Persisting identity failed");
            self.telemetry.notice_error("name persist", &e);
        }
        tokio::time::sleep(self.settle_delay).await;

        self.state = NegotiationState::NamedGenerated;
        identity
    }

    /// Announce the identity on the bus
    pub async fn publish<B>(&mut self, bus: &mut B, identity: &Identity)
    where
        B: MessageBus + ?Sized,
    {
        announce(bus, identity, self.telemetry).await;
        self.state = NegotiationState::Published;
    }

    /// Run the whole negotiation
    pub async fn negotiate<B, R>(mut self, bus: &mut B, rng: &mut R) -> Identity
    where
        B: MessageBus + ?Sized,
        R: Rng + Send + ?Sized,
    {
        let identity = self.resolve(rng).await;
        self.publish(bus, &identity).await;
        identity
    }
}

/// Publish `{name: identity}`. Failures are reported, not returned.
pub async fn announce<B>(bus: &mut B, identity: &Identity, telemetry: &dyn Telemetry)
where
    B: MessageBus + ?Sized,
{
    let message = BusMessage::Announcement {
        name: identity.to_string(),
    };
    match bus.publish(&message).await {
        Ok(()) => tracing::info!(identity = %identity, "Online"),
        Err(e) => {
            tracing::error!(error = %e, "Announcement failed");
            telemetry.notice_error("announce", &e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bus::LocalBus;
    use crate::core::telemetry::MemoryTelemetry;
    use crate::core::transport::ScriptedChannel;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_blank_match_does_not_override() {
        let identity = identity_from_responses(&lines(&["?Name,Foo", "?Name,"]));
        assert_eq!(identity.unwrap(), "Foo");
    }

    #[test]
    fn test_last_non_empty_match_wins() {
        let identity = identity_from_responses(&lines(&["?Name,Foo", "OK", "?Name,Bar"]));
        assert_eq!(identity.unwrap(), "Bar");
    }

    #[test]
    fn test_malformed_and_unrelated_lines_skipped() {
        assert!(identity_from_responses(&lines(&["?Name,a,b", "Name,Foo", "20"])).is_none());
        assert!(identity_from_responses(&[]).is_none());
    }

    #[tokio::test]
    async fn test_adopts_stored_identity() {
        let (channel, handle) = ScriptedChannel::new();
        handle.push_line("?Name,Pump7");
        let mut link = DeviceLink::new(Box::new(channel));
        let telemetry = MemoryTelemetry::new();
        let bus = LocalBus::new(8);
        let mut participant = bus.handle();
        let mut observer = bus.handle();
        let mut rng = StdRng::seed_from_u64(1);

        let identity = IdentityNegotiator::new(&mut link, &telemetry, Duration::ZERO)
            .negotiate(&mut participant, &mut rng)
            .await;

        assert_eq!(identity, "Pump7");
        assert_eq!(handle.written_text(), vec!["Name,?\r".to_string()]);
        assert_eq!(observer.try_next().as_deref(), Some(r#"{"name":"Pump7"}"#));
        assert!(observer.try_next().is_none());
        assert!(telemetry.events().is_empty());
    }

    #[tokio::test]
    async fn test_generates_and_persists_when_silent() {
        let (channel, handle) = ScriptedChannel::new();
        let mut link = DeviceLink::new(Box::new(channel));
        let telemetry = MemoryTelemetry::new();
        let bus = LocalBus::new(8);
        let mut participant = bus.handle();
        let mut observer = bus.handle();

        let expected = Identity::generate(&mut StdRng::seed_from_u64(99));
        let mut rng = StdRng::seed_from_u64(99);
        let mut negotiator = IdentityNegotiator::new(&mut link, &telemetry, Duration::ZERO);
        assert_eq!(negotiator.state(), NegotiationState::Unqueried);

        let identity = negotiator.resolve(&mut rng).await;
        assert_eq!(negotiator.state(), NegotiationState::NamedGenerated);
        negotiator.publish(&mut participant, &identity).await;
        assert_eq!(negotiator.state(), NegotiationState::Published);

        assert_eq!(identity, expected);
        assert_eq!(identity.as_str().len(), 16);
        assert_eq!(
            handle.written_text(),
            vec!["Name,?\r".to_string(), format!("Name,{expected}\r")]
        );
        let announced = BusMessage::decode(&observer.try_next().unwrap()).unwrap();
        assert_eq!(
            announced,
            BusMessage::Announcement {
                name: expected.to_string()
            }
        );
        assert_eq!(
            telemetry.events(),
            vec![TelemetryEvent::NameSet {
                old_name: None,
                new_name: expected.to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_blank_response_generates() {
        let (channel, handle) = ScriptedChannel::new();
        handle.push_line("?Name,");
        let mut link = DeviceLink::new(Box::new(channel));
        let telemetry = MemoryTelemetry::new();
        let mut rng = StdRng::seed_from_u64(3);

        let mut negotiator = IdentityNegotiator::new(&mut link, &telemetry, Duration::ZERO);
        let identity = negotiator.resolve(&mut rng).await;

        assert_eq!(negotiator.state(), NegotiationState::NamedGenerated);
        assert_eq!(identity.as_str().len(), 16);
        assert_eq!(handle.written().len(), 2);
    }

    #[tokio::test]
    async fn test_read_failure_falls_back_to_generated() {
        let (channel, handle) = ScriptedChannel::new();
        handle.push_read_failure(std::io::ErrorKind::BrokenPipe);
        let mut link = DeviceLink::new(Box::new(channel));
        let telemetry = MemoryTelemetry::new();
        let mut rng = StdRng::seed_from_u64(5);

        let mut negotiator = IdentityNegotiator::new(&mut link, &telemetry, Duration::ZERO);
        let identity = negotiator.resolve(&mut rng).await;

        assert_eq!(identity.as_str().len(), 16);
        assert_eq!(telemetry.error_count(), 1);
    }
}
