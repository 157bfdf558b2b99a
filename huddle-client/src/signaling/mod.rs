mod relay_client;
mod signaling_output;

pub use relay_client::{Inbound, RelayClient, RelayEvent, classify_frame};
pub use signaling_output::SignalingOutput;
