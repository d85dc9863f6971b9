//! End-to-end scenarios.
//!
//! Each test builds a full `App` over a temporary worlds folder, loads the
//! worlds from disk and drives entities through use cases and commands.
//!
//! ```bash
//! cargo test -p multiworld-engine --lib e2e_tests
//! ```

mod e2e_helpers;

pub use e2e_helpers::*;
