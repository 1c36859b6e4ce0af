//! API handlers for the financing backend

mod reconciliation;
mod trip;
mod wallet;

pub use reconciliation::*;
pub use trip::*;
pub use wallet::*;
