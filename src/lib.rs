// ABOUTME: Root library module exposing the HTTP facade and socket layer
// ABOUTME: Re-exports the core status register, relay, and config for convenience

pub mod routes;
pub mod server;
pub mod socket;
pub mod stores;
pub mod token;

// Re-export platform-agnostic modules from agentline-core
pub use agentline_core::config;
pub use agentline_core::metrics;
pub use agentline_core::paths;
pub use agentline_core::relay;
pub use agentline_core::status;

pub use agentline_core::{AgentStatus, NotificationRelay, ServiceCredential, StatusRegister};
