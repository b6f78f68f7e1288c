pub mod bot;
pub mod group;
pub mod history;
pub mod registry;
