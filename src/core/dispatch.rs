//! Command dispatch loop
//!
//! Bus messages are handled strictly one at a time. For each command
//! addressed to this bridge the side effects (identity change, locate
//! event, dispense metric) complete before the command text is written to
//! the device, so device writes never interleave.

use crate::core::bridge::Bridge;
use crate::core::bus::{BusError, BusMessage, MessageBus};
use crate::core::command::CommandKind;
use crate::core::identity::Identity;
use crate::core::telemetry::{dispensed_metric, TelemetryEvent};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// What happened to one bus payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Payload failed validation and was dropped
    Malformed,
    /// Not a command, or addressed to another bridge
    Ignored,
    /// A read response was published; `None` lines means the device link failed
    ReadPublished {
        /// Number of lines published
        lines: Option<usize>,
    },
    /// Command written to the device
    Forwarded(CommandKind),
    /// Command could not be written to the device
    ForwardFailed(CommandKind),
}

/// A `D,` command whose amount is not an integer
#[derive(Debug, Error)]
#[error("invalid dispense amount in {0:?}")]
pub struct InvalidAmount(pub String);

impl<B: MessageBus> Bridge<B> {
    /// Consume bus messages until cancelled or the bus closes
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<(), BusError> {
        tracing::info!(identity = %self.identity, "Listening for commands");
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tracing::info!("Dispatch loop cancelled");
                    return Ok(());
                }
                payload = self.bus.next_payload() => match payload? {
                    Some(payload) => {
                        let outcome = self.handle_payload(&payload).await;
                        tracing::trace!(?outcome, "Message handled");
                    }
                    None => {
                        tracing::info!("Bus closed");
                        return Ok(());
                    }
                },
            }
        }
    }

    /// Handle exactly one raw bus payload
    pub async fn handle_payload(&mut self, payload: &str) -> DispatchOutcome {
        self.stats.received += 1;

        let (name, command) = match BusMessage::decode(payload) {
            Ok(BusMessage::Command { name, command }) => (name, command),
            Ok(_) => {
                self.stats.ignored += 1;
                return DispatchOutcome::Ignored;
            }
            Err(e) => {
                tracing::debug!(error = %e, "Dropping bus payload");
                self.stats.malformed += 1;
                return DispatchOutcome::Malformed;
            }
        };

        if self.identity != name.as_str() {
            self.stats.ignored += 1;
            return DispatchOutcome::Ignored;
        }

        self.handle_command(&command).await
    }

    async fn handle_command(&mut self, command: &str) -> DispatchOutcome {
        let kind = CommandKind::classify(command);
        tracing::debug!(identity = %self.identity, command, ?kind, "Command received");

        match &kind {
            CommandKind::Read => return self.publish_read_response().await,
            CommandKind::Rename(value) => self.rename(value),
            CommandKind::Locate(_) => {
                self.telemetry.record_event(TelemetryEvent::Locate {
                    name: self.identity.to_string(),
                });
            }
            CommandKind::Dispense(Some(amount)) => {
                self.telemetry
                    .record_metric(&dispensed_metric(self.identity.as_str()), *amount);
            }
            CommandKind::Dispense(None) => {
                let err = InvalidAmount(command.to_string());
                tracing::warn!(error = %err, "Dispense not recorded");
                self.telemetry.notice_error("dispense", &err);
            }
            CommandKind::PassThrough => {}
        }

        match self.link.send_command(command) {
            Ok(_) => {
                self.stats.forwarded += 1;
                DispatchOutcome::Forwarded(kind)
            }
            Err(e) => {
                tracing::warn!(command, error = %e, "Device write failed");
                self.telemetry.notice_error("device write", &e);
                self.stats.write_failures += 1;
                DispatchOutcome::ForwardFailed(kind)
            }
        }
    }

    /// Changes the in-memory identity only. Unlike negotiation, no separate
    /// persist command is issued; an empty value leaves the identity as is.
    fn rename(&mut self, value: &str) {
        match Identity::new(value) {
            Ok(new_identity) => {
                tracing::info!(old = %self.identity, new = %new_identity, "Identity changed");
                self.telemetry.record_event(TelemetryEvent::NameSet {
                    old_name: Some(self.identity.to_string()),
                    new_name: new_identity.to_string(),
                });
                self.identity = new_identity;
            }
            Err(e) => tracing::warn!(error = %e, "Ignoring rename"),
        }
    }

    async fn publish_read_response(&mut self) -> DispatchOutcome {
        let lines = match self.link.read_lines() {
            Ok(lines) => Some(lines),
            Err(e) => {
                tracing::warn!(error = %e, "Device read failed");
                self.telemetry.notice_error("device read", &e);
                self.stats.read_failures += 1;
                None
            }
        };

        let count = lines.as_ref().map(Vec::len);
        let response = BusMessage::ReadResponse {
            name: self.identity.to_string(),
            lines,
        };
        if let Err(e) = self.bus.publish(&response).await {
            tracing::warn!(error = %e, "Read response not published");
            self.telemetry.notice_error("publish", &e);
        } else {
            self.stats.read_responses += 1;
        }

        DispatchOutcome::ReadPublished { lines: count }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bus::{LocalBus, LocalBusHandle};
    use crate::core::protocol::DeviceLink;
    use crate::core::telemetry::{MemoryTelemetry, TelemetryRecord};
    use crate::core::transport::{OfflineChannel, ScriptedChannel, ScriptedHandle};
    use std::sync::Arc;
    use std::time::Duration;

    struct Fixture {
        bridge: Bridge<LocalBusHandle>,
        device: ScriptedHandle,
        observer: LocalBusHandle,
        telemetry: Arc<MemoryTelemetry>,
    }

    fn fixture(name: &str) -> Fixture {
        let (channel, device) = ScriptedChannel::new();
        let bus = LocalBus::new(64);
        let observer = bus.handle();
        let telemetry = Arc::new(MemoryTelemetry::new());
        let bridge = Bridge::with_identity(
            DeviceLink::new(Box::new(channel)),
            bus.handle(),
            telemetry.clone(),
            Identity::new(name).unwrap(),
        );
        Fixture {
            bridge,
            device,
            observer,
            telemetry,
        }
    }

    fn command(name: &str, command: &str) -> String {
        BusMessage::command(name, command).encode()
    }

    #[tokio::test]
    async fn test_other_identity_has_no_effect() {
        let mut f = fixture("Foo");
        f.device.push_line("20");

        for cmd in ["D,5", "Read", "Name,Bar", "Find,1"] {
            let outcome = f.bridge.handle_payload(&command("Other", cmd)).await;
            assert_eq!(outcome, DispatchOutcome::Ignored);
        }

        assert!(f.device.written().is_empty());
        assert!(f.observer.try_next().is_none());
        assert!(f.telemetry.records().is_empty());
        assert_eq!(f.bridge.identity(), &Identity::new("Foo").unwrap());
        assert_eq!(f.bridge.stats().ignored, 4);
    }

    #[tokio::test]
    async fn test_dispense_forwards_and_records() {
        let mut f = fixture("Foo");

        let outcome = f.bridge.handle_payload(&command("Foo", "D,5")).await;

        assert_eq!(outcome, DispatchOutcome::Forwarded(CommandKind::Dispense(Some(5))));
        assert_eq!(f.device.written(), vec![b"D,5\r".to_vec()]);
        assert_eq!(f.telemetry.metrics(), vec![("Foo/Dispensed".to_string(), 5)]);
        assert!(f.observer.try_next().is_none());
    }

    #[tokio::test]
    async fn test_read_publishes_lines_without_writing() {
        let mut f = fixture("Foo");
        f.device.push_line("20");
        f.device.push_line("OK");

        let outcome = f.bridge.handle_payload(&command("Foo", "Read")).await;

        assert_eq!(outcome, DispatchOutcome::ReadPublished { lines: Some(2) });
        assert!(f.device.written().is_empty());
        let published = BusMessage::decode(&f.observer.try_next().unwrap()).unwrap();
        assert_eq!(
            published,
            BusMessage::ReadResponse {
                name: "Foo".to_string(),
                lines: Some(vec!["20".to_string(), "OK".to_string()]),
            }
        );
    }

    #[tokio::test]
    async fn test_read_with_nothing_pending_publishes_empty() {
        let mut f = fixture("Foo");

        f.bridge.handle_payload(&command("Foo", "ReadAll")).await;

        let published = BusMessage::decode(&f.observer.try_next().unwrap()).unwrap();
        assert_eq!(
            published,
            BusMessage::ReadResponse {
                name: "Foo".to_string(),
                lines: Some(vec![]),
            }
        );
    }

    #[tokio::test]
    async fn test_read_failure_publishes_no_response() {
        let mut f = fixture("Foo");
        f.device.push_read_failure(std::io::ErrorKind::BrokenPipe);

        let outcome = f.bridge.handle_payload(&command("Foo", "Read")).await;

        assert_eq!(outcome, DispatchOutcome::ReadPublished { lines: None });
        let published = BusMessage::decode(&f.observer.try_next().unwrap()).unwrap();
        assert_eq!(
            published,
            BusMessage::ReadResponse {
                name: "Foo".to_string(),
                lines: None,
            }
        );
        assert_eq!(f.bridge.stats().read_failures, 1);
        assert_eq!(f.telemetry.error_count(), 1);
    }

    #[tokio::test]
    async fn test_rename_changes_identity_then_forwards() {
        let mut f = fixture("Foo");

        let outcome = f.bridge.handle_payload(&command("Foo", "Name,Bar")).await;

        assert_eq!(outcome, DispatchOutcome::Forwarded(CommandKind::Rename("Bar".to_string())));
        assert_eq!(f.bridge.identity(), &Identity::new("Bar").unwrap());
        assert_eq!(f.device.written_text(), vec!["Name,Bar\r".to_string()]);
        assert_eq!(
            f.telemetry.events(),
            vec![TelemetryEvent::NameSet {
                old_name: Some("Foo".to_string()),
                new_name: "Bar".to_string(),
            }]
        );

        // The old identity no longer addresses this bridge.
        let ignored = f.bridge.handle_payload(&command("Foo", "D,1")).await;
        assert_eq!(ignored, DispatchOutcome::Ignored);
        let handled = f.bridge.handle_payload(&command("Bar", "D,1")).await;
        assert_eq!(handled, DispatchOutcome::Forwarded(CommandKind::Dispense(Some(1))));
        assert_eq!(f.telemetry.metrics(), vec![("Bar/Dispensed".to_string(), 1)]);
    }

    #[tokio::test]
    async fn test_empty_rename_keeps_identity() {
        let mut f = fixture("Foo");

        f.bridge.handle_payload(&command("Foo", "Name,")).await;

        assert_eq!(f.bridge.identity(), &Identity::new("Foo").unwrap());
        assert_eq!(f.device.written_text(), vec!["Name,\r".to_string()]);
        assert!(f.telemetry.events().is_empty());
    }

    #[tokio::test]
    async fn test_find_records_locate_event() {
        let mut f = fixture("Foo");

        f.bridge.handle_payload(&command("Foo", "Find,1")).await;

        assert_eq!(
            f.telemetry.events(),
            vec![TelemetryEvent::Locate {
                name: "Foo".to_string()
            }]
        );
        assert_eq!(f.device.written_text(), vec!["Find,1\r".to_string()]);
    }

    #[tokio::test]
    async fn test_bad_amount_still_forwarded() {
        let mut f = fixture("Foo");

        let outcome = f.bridge.handle_payload(&command("Foo", "D,lots")).await;

        assert_eq!(outcome, DispatchOutcome::Forwarded(CommandKind::Dispense(None)));
        assert!(f.telemetry.metrics().is_empty());
        assert_eq!(f.telemetry.error_count(), 1);
        assert_eq!(f.device.written_text(), vec!["D,lots\r".to_string()]);
    }

    #[tokio::test]
    async fn test_pass_through_verbatim() {
        let mut f = fixture("Foo");

        f.bridge.handle_payload(&command("Foo", "Cal,clear")).await;

        assert_eq!(f.device.written_text(), vec!["Cal,clear\r".to_string()]);
        assert!(f.telemetry.records().is_empty());
    }

    #[tokio::test]
    async fn test_write_failure_reported() {
        let mut f = fixture("Foo");
        f.device.fail_writes(true);

        let outcome = f.bridge.handle_payload(&command("Foo", "D,2")).await;

        assert_eq!(outcome, DispatchOutcome::ForwardFailed(CommandKind::Dispense(Some(2))));
        assert_eq!(f.bridge.stats().write_failures, 1);
        // The metric is recorded before the write is attempted.
        assert!(matches!(
            f.telemetry.records().as_slice(),
            [TelemetryRecord::Metric { .. }, TelemetryRecord::Error { .. }]
        ));
    }

    #[tokio::test]
    async fn test_malformed_and_non_command_messages() {
        let mut f = fixture("Foo");

        assert_eq!(f.bridge.handle_payload("{").await, DispatchOutcome::Malformed);
        assert_eq!(
            f.bridge.handle_payload(r#"{"command":"D,5"}"#).await,
            DispatchOutcome::Malformed
        );
        assert_eq!(
            f.bridge.handle_payload(r#"{"name":"Foo"}"#).await,
            DispatchOutcome::Ignored
        );
        assert_eq!(
            f.bridge.handle_payload(r#"{"name":"Foo","lines":["1"]}"#).await,
            DispatchOutcome::Ignored
        );
        assert!(f.device.written().is_empty());
        assert_eq!(f.bridge.stats().malformed, 2);
    }

    #[tokio::test]
    async fn test_offline_read_publishes_empty() {
        let bus = LocalBus::new(8);
        let mut observer = bus.handle();
        let mut bridge = Bridge::with_identity(
            DeviceLink::new(Box::new(OfflineChannel::new())),
            bus.handle(),
            Arc::new(MemoryTelemetry::new()),
            Identity::offline(),
        );

        let outcome = bridge.handle_payload(&command("Mock Motor", "Read")).await;

        assert_eq!(outcome, DispatchOutcome::ReadPublished { lines: Some(0) });
        let published = BusMessage::decode(&observer.try_next().unwrap()).unwrap();
        assert_eq!(
            published,
            BusMessage::ReadResponse {
                name: "Mock Motor".to_string(),
                lines: Some(vec![]),
            }
        );
    }

    #[tokio::test]
    async fn test_run_processes_in_order_until_cancelled() {
        let mut f = fixture("Foo");
        f.observer.publish_raw(&command("Foo", "Find,1"));
        f.observer.publish_raw(&command("Foo", "D,3"));
        f.observer.publish_raw(&command("Other", "D,9"));

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        tokio_test::assert_ok!(f.bridge.run(cancel).await);

        assert_eq!(
            f.device.written_text(),
            vec!["Find,1\r".to_string(), "D,3\r".to_string()]
        );
        assert_eq!(f.bridge.stats().received, 3);
    }
}
