pub mod journal_handler;
