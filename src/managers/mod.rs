// Managers Module
//
// Each manager handles one concern of the running monitor:
// - SessionManager: session lifecycle, registered profile, persistence hand-off
// - BroadcastChannelManager: live snapshot and pulse stream channels

pub mod broadcast_manager;
pub mod session_manager;

pub use broadcast_manager::BroadcastChannelManager;
pub use session_manager::{SessionManager, StopResult};
