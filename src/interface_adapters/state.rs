use std::sync::Arc;

use crate::use_cases::Hub;

// Shared state handed to every connection worker.
pub struct AppState {
    pub hub: Arc<Hub>,
    // Queue each inbound text frame back to its sender after dispatch.
    pub echo_frames: bool,
    // Per-connection outbound queue size.
    pub outbound_capacity: usize,
}
