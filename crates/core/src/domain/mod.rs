pub mod artifact;
pub mod session;
pub mod status;
