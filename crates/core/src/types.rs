/// Every registry entry is keyed by a random UUID allocated at subscribe time.
pub type SubscriberId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
