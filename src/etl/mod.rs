/// ETL Module
///
/// The three stages of login ingestion:
/// - Extract: receive messages from the queue and acknowledge them
/// - Transform: mask, coerce and stamp each login event
/// - Load: insert normalized records into PostgreSQL
pub mod extract;
pub mod load;
pub mod transform;
