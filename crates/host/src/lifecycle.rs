//! Build lifecycle event source.

use std::sync::Arc;
use trackgit_core::{BuildContext, BuildStartListener, HostError};
use tracing::{debug, warn};

/// Listeners notified when a build starts, before its checkout.
///
/// Subscribers are registered once at process start and fired in
/// registration order. The first failing listener stops the chain.
#[derive(Default, Clone)]
pub struct BuildLifecycle {
    listeners: Vec<Arc<dyn BuildStartListener>>,
}

impl BuildLifecycle {
    /// Create an event source with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a listener to build starts.
    pub fn subscribe(&mut self, listener: Arc<dyn BuildStartListener>) {
        debug!("Subscribing build start listener '{}'", listener.name());
        self.listeners.push(listener);
    }

    /// Builder-style [`subscribe`](Self::subscribe).
    pub fn with_listener(mut self, listener: Arc<dyn BuildStartListener>) -> Self {
        self.subscribe(listener);
        self
    }

    /// Number of subscribers.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Whether nothing is subscribed.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Notify every listener that `build` started.
    pub fn fire_started(&self, build: &mut dyn BuildContext) -> Result<(), HostError> {
        for listener in &self.listeners {
            if let Err(source) = listener.on_started(build) {
                warn!(
                    "Listener '{}' failed setup of {}: {}",
                    listener.name(),
                    build.build(),
                    source
                );
                return Err(HostError::SetupFailed {
                    listener: listener.name().to_string(),
                    source,
                });
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for BuildLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.listeners.iter().map(|l| l.name()))
            .finish()
    }
}
