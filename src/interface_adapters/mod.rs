// Interface adapters: wire protocol, storage and network handling.

pub mod net;
pub mod protocol;
pub mod routes;
pub mod state;
pub mod store;
