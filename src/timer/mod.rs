pub mod commands;
pub mod controller;
pub mod state;

pub use controller::PurificationController;
pub use state::{derive_view, PurificationStatus, PurificationView};

#[cfg(test)]
mod tests;
