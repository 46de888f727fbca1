//! Command handlers for the mcpmeter CLI.

pub mod call;
pub mod connect;
pub mod interactive;
pub mod logging;
pub mod servers;

pub use call::*;
pub use connect::*;
pub use interactive::*;
pub use logging::*;
pub use servers::*;
