//! Protocol and configuration constants for the SNoti client.

use std::time::Duration;

// =============================================================================
// Protocol Constants
// =============================================================================

/// Command tag of the login request.
pub const CMD_LOGIN_REQ: &str = "login_req";

/// Command tag of a pushed event from the server.
pub const CMD_EVENT_PUSH: &str = "event_push";

/// Command tag of an event acknowledgment.
pub const CMD_EVENT_ACK: &str = "event_ack";

/// Keep-alive frame sent on every heartbeat tick.
pub const PING_FRAME: &str = r#"{"cmd": "ping"}"#;

// =============================================================================
// Timing Constants
// =============================================================================

/// Interval between keep-alive pings (4 minutes).
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(240);

/// Cooldown between connection cycles after a failure.
pub const RETRY_COOLDOWN: Duration = Duration::from_secs(3);

/// Sleep between remote-control producer polls that yield nothing.
pub const CONTROL_POLL_INTERVAL: Duration = Duration::from_secs(1);

// =============================================================================
// Default Values
// =============================================================================

/// Connection cycles attempted when no retry bound is configured.
pub const DEFAULT_RETRY: u32 = 3;

/// Default capacity of the outbound queue and of each log-severity queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 500;

/// Default dial timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Default per-read deadline. Generous, since the server only pushes
/// when it has events to deliver.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(270);

/// Default per-write deadline.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);
