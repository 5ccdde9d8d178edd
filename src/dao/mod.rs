/// Database model definitions.
pub mod models;
/// Quiz and session persistence behind the [`quiz_store::QuizStore`] seam.
pub mod quiz_store;
/// Storage error types shared by store implementations.
pub mod storage;
