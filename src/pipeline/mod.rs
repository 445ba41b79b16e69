pub mod chroma;
pub mod commands;
pub mod compress;
pub mod scale;
pub mod session;
pub mod surface;
pub mod tick;
