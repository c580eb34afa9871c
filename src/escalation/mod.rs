// Escalation module
// Risk level to resources, crisis flag and response mode

mod policy;
mod resources;

pub use policy::{resource_names, EscalationActions, EscalationPolicy, ResponseMode, DISCLAIMER};
pub use resources::{CrisisResource, ResourceKind, SafetyConfig};
