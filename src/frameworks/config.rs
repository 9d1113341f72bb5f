use std::{env, net::IpAddr, time::Duration};

// Runtime/server settings read from the environment.

pub fn http_port() -> u16 {
    env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8080)
}

pub fn bind_addr() -> IpAddr {
    env::var("BIND_ADDR")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(IpAddr::from([0, 0, 0, 0]))
}

// MySQL DSN; unset means the in-memory store.
pub fn database_url() -> Option<String> {
    env::var("DSN").ok().filter(|v| !v.trim().is_empty())
}

pub fn admin_id() -> Option<String> {
    env::var("ADMIN_ID").ok().filter(|v| !v.trim().is_empty())
}

pub fn db_max_connections() -> u32 {
    env::var("DB_MAX_CONNECTIONS")
        .ok()
        .and_then(|v| v.parse().ok())
        .filter(|&n| n > 0)
        .unwrap_or(5)
}

pub fn echo_frames() -> bool {
    env::var("ECHO_FRAMES")
        .ok()
        .and_then(|v| parse_flag(&v))
        .unwrap_or(true)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;
// Extra attempts for a vote or like toggle that hit a deadlock.
pub const CONFLICT_RETRIES: u32 = 3;
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);
