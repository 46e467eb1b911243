/// Identifiers handed out by the definitions store (conditions, schedules,
/// resources, agents, baselines) are 64-bit signed integers.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
