// Runtime configuration, read once from the environment.
//
// We purposefully default to the *safe* side (sync orchestration, events on)
// and require explicit opt-in for the async path. This avoids a misconfigured
// deploy silently switching write semantics.
//
// Environment variables:
//   - ASYNC_MODE        "1" | "true" (case-insensitive) => async path via C9/C7/C10
//   - WORK_EXCHANGE     exchange name the router publishes work items to
//   - WORK_ROUTING_KEY  routing key used for work items
//   - EVENTS_EXCHANGE   exchange name the event publisher publishes to
//   - EVENTS_ENABLED    default true; disabled only when the literal value is "false"
//   - VERSION           stamped into every event envelope

use lazy_static::lazy_static;
use std::env;

const DEFAULT_WORK_EXCHANGE: &str = "transaction.write";
const DEFAULT_WORK_ROUTING_KEY: &str = "transaction.write.process";
const DEFAULT_EVENTS_EXCHANGE: &str = "transaction";
const DEFAULT_VERSION: &str = "dev";

lazy_static! {
    static ref ASYNC_MODE: bool = {
        match env::var("ASYNC_MODE") {
            Ok(v) => matches!(v.to_ascii_lowercase().as_str(), "1" | "true"),
            Err(_) => false,
        }
    };
    static ref EVENTS_ENABLED: bool = {
        match env::var("EVENTS_ENABLED") {
            Ok(v) => v.to_ascii_lowercase() != "false",
            Err(_) => true,
        }
    };
    static ref WORK_EXCHANGE: String =
        env::var("WORK_EXCHANGE").unwrap_or_else(|_| DEFAULT_WORK_EXCHANGE.to_string());
    static ref WORK_ROUTING_KEY: String =
        env::var("WORK_ROUTING_KEY").unwrap_or_else(|_| DEFAULT_WORK_ROUTING_KEY.to_string());
    static ref EVENTS_EXCHANGE: String =
        env::var("EVENTS_EXCHANGE").unwrap_or_else(|_| DEFAULT_EVENTS_EXCHANGE.to_string());
    static ref VERSION: String =
        env::var("VERSION").unwrap_or_else(|_| DEFAULT_VERSION.to_string());
}

/// Returns true if the router (C9) should publish to the work queue instead of
/// calling the orchestrator in-process.
pub fn async_mode_enabled() -> bool {
    *ASYNC_MODE
}

/// Returns true unless explicitly disabled via `EVENTS_ENABLED=false`.
pub fn events_enabled() -> bool {
    *EVENTS_ENABLED
}

pub fn work_exchange() -> &'static str {
    &WORK_EXCHANGE
}

pub fn work_routing_key() -> &'static str {
    &WORK_ROUTING_KEY
}

pub fn events_exchange() -> &'static str {
    &EVENTS_EXCHANGE
}

pub fn version() -> &'static str {
    &VERSION
}
