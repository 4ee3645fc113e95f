pub mod journal_service;
pub mod rollover_job;

pub use journal_service::{Dashboard, JournalService};
pub use rollover_job::{roll_all_accounts, RolloverReport};
