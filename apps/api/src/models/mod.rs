pub mod cv;
pub mod version;
