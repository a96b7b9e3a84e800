//! Repository layer for data access

pub mod aliases;
pub mod routing_logs;

// Re-export concrete repository implementations with simple names
pub use aliases::DbAliasRepository;
pub use routing_logs::DbRoutingLogRepository;

// Re-export repository traits
pub use aliases::AliasRepository;
pub use routing_logs::RoutingLogRepository;
