pub mod common;

mod api_tests;
mod balance_tests;
mod history_tests;
mod reconcile_tests;
