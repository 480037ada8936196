pub mod candidates;
pub mod sessions;
pub mod status;
