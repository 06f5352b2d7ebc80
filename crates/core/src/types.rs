/// Identifiers for users, trilogies, characters, sub-chapters and jobs.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
