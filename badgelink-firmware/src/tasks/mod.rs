//! Embassy async tasks
//!
//! Each task runs independently; the session and hardware tasks meet only
//! at the bridge queues.

pub mod hardware;
pub mod network;
pub mod reject;
pub mod session;

pub use hardware::hardware_task;
pub use network::spawn_network;
pub use reject::reject_task;
pub use session::session_task;
