//! Bridge context
//!
//! A [`Bridge`] owns everything one device bridge needs: the device link,
//! its bus connection, the telemetry sink and the current identity. Every
//! operation goes through it; there is no shared global state.

use crate::core::bus::MessageBus;
use crate::core::identity::Identity;
use crate::core::negotiate::{announce, IdentityNegotiator, DEFAULT_SETTLE_DELAY};
use crate::core::protocol::DeviceLink;
use crate::core::telemetry::Telemetry;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

/// Startup settings
#[derive(Debug, Clone)]
pub struct BridgeSettings {
    /// Wait after a device query before reading the reply
    pub settle_delay: Duration,
    /// Identity adopted in offline mode
    pub offline_identity: Identity,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
            offline_identity: Identity::offline(),
        }
    }
}

/// Bridge counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    /// Payloads taken off the bus
    pub received: u64,
    /// Payloads that failed validation
    pub malformed: u64,
    /// Valid messages not meant for this bridge
    pub ignored: u64,
    /// Commands written to the device
    pub forwarded: u64,
    /// Read responses published
    pub read_responses: u64,
    /// Device reads that failed
    pub read_failures: u64,
    /// Device writes that failed
    pub write_failures: u64,
}

/// One device bridged onto one bus
pub struct Bridge<B> {
    pub(crate) link: DeviceLink,
    pub(crate) bus: B,
    pub(crate) telemetry: Arc<dyn Telemetry>,
    pub(crate) identity: Identity,
    pub(crate) stats: BridgeStats,
}

impl<B: MessageBus> Bridge<B> {
    /// Establish the identity and announce it.
    ///
    /// With a device attached this runs the identity negotiation. In
    /// offline mode the configured offline identity is announced instead.
    pub async fn start<R>(
        mut link: DeviceLink,
        mut bus: B,
        telemetry: Arc<dyn Telemetry>,
        settings: &BridgeSettings,
        rng: &mut R,
    ) -> Self
    where
        R: Rng + Send + ?Sized,
    {
        let identity = if link.is_offline() {
            let identity = settings.offline_identity.clone();
            announce(&mut bus, &identity, telemetry.as_ref()).await;
            identity
        } else {
            IdentityNegotiator::new(&mut link, telemetry.as_ref(), settings.settle_delay)
                .negotiate(&mut bus, rng)
                .await
        };

        Self::with_identity(link, bus, telemetry, identity)
    }

    /// Assemble a bridge around an identity that is already known
    pub fn with_identity(
        link: DeviceLink,
        bus: B,
        telemetry: Arc<dyn Telemetry>,
        identity: Identity,
    ) -> Self {
        tracing::info!(identity = %identity, device = %link.describe(), "Bridge ready");
        Self {
            link,
            bus,
            telemetry,
            identity,
            stats: BridgeStats::default(),
        }
    }

    /// Current identity
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Counters so far
    pub fn stats(&self) -> BridgeStats {
        self.stats
    }
}
