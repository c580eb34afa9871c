// SafeHarbor - Deterministic crisis-risk assessment engine
// Library exports

// Core pipeline
pub mod catalog;
pub mod crisis;
pub mod engine;
pub mod escalation;
pub mod mood;
pub mod risk;
pub mod session;
pub mod text;

// Ambient stack and outer surfaces
pub mod config;
pub mod errors;
pub mod metrics;
pub mod responder;
pub mod server;
