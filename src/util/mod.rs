// Utility modules

pub mod artifacts;
