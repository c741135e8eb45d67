pub mod lots;
pub mod report;
pub mod setup;
pub mod ui;
