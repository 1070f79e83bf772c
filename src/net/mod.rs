pub mod intake;
pub mod status;
