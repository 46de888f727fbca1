//! Testing utilities, fixtures, and mocks for mcpmeter.
//!
//! - **Mocks**: a scripted in-memory MCP transport and a connector that uses it
//! - **Providers**: token counters with fixed answers
//! - **Fixtures**: temporary configuration files
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use mcpmeter_test_utils::{MockConnector, MockTransport};
//!
//! let transport = MockTransport::compliant(&["search"])
//!     .with_tool_result(serde_json::json!({"content": [{"type": "text", "text": "hi"}]}));
//! let connector = MockConnector::new(transport.clone());
//! ```

pub mod fixtures;
pub mod mocks;
pub mod providers;

pub use fixtures::TempConfig;
pub use mocks::{MockConnector, MockReply, MockTransport};
pub use providers::{FixedCounterFactory, FixedTokenCounter};
