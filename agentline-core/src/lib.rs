// ABOUTME: Platform-agnostic core for the agent call desk backend
// ABOUTME: Provides the status register, notification relay, config, and metrics

pub mod config;
pub mod credential;
pub mod metrics;
pub mod paths;
pub mod relay;
pub mod request_log;
pub mod status;

pub use credential::ServiceCredential;
pub use relay::{
    CallEventSource, EventSink, IncomingCallEvent, NotificationRelay, SampleCallSource,
    Subscription,
};
pub use request_log::{LogSubmission, MissingLogFields, RequestLogEntry};
pub use status::{AgentStatus, InvalidStatus, StatusRegister, StatusTransition};
