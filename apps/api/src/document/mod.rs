pub mod canonical;
pub mod collection;
pub mod handlers;
pub mod reconciler;
pub mod status;
pub mod store;
