//! Command implementations.

mod align;
mod relay;
mod validate;

pub use align::run_align;
pub use relay::run_relay;
pub use validate::run_validate;
