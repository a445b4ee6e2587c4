//! Response cache subsystem.
//!
//! # Data Flow
//! ```text
//! proxy (hit)          → get(key) → keep_alive(key, None)       bump recency only
//! proxy (miss + 200)   → keep_alive(key, Some(body))            create entry
//! control socket       → clear()                                drop everything
//! sweep task (timer)   → evict entries idle longer than expire_after
//! ```
//!
//! # Design Decisions
//! - One mutex guards both indexes; every operation is totally ordered
//! - Eviction is by inactivity, not by age since insertion
//! - Reads do not refresh recency; the caller decides when an entry was used

pub mod expiring;

pub use expiring::{CacheEntry, CacheSettings, ExpiringCache, MIN_KEEP_ALIVE};
