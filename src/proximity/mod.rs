pub mod selector;
pub mod tracker;
