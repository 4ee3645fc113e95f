pub mod rollover_store;
