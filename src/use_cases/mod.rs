// Use cases layer: client registry, fan-out and command handling for the relay.

pub mod broadcaster;
pub mod dispatcher;
pub mod hub;
pub mod registry;

#[cfg(test)]
pub(crate) mod test_support;

pub use dispatcher::Outcome;
pub use hub::{Hub, HubSettings};
pub use registry::{ClientHandle, ClientId, ClientRegistry};
