use exemaker_core::{BroadcastSink, Config, JobQueue, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    queue: JobQueue,
    events: BroadcastSink,
}

impl AppState {
    pub fn new(config: Config, queue: JobQueue, events: BroadcastSink) -> Self {
        Self {
            config,
            queue,
            events,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    /// Event fan-out the queue publishes into; WebSocket clients subscribe here.
    pub fn events(&self) -> &BroadcastSink {
        &self.events
    }
}
