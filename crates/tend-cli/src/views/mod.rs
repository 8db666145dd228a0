pub mod notifier;
pub mod table;
