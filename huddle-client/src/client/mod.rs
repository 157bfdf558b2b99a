mod client;
mod client_command;
mod client_event;
mod client_handle;

pub use crate::negotiation::SessionSnapshot;
pub use client::Client;
pub use client_command::ClientCommand;
pub use client_event::ClientEvent;
pub use client_handle::ClientHandle;
