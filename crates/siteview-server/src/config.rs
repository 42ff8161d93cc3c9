/// Re-export `Config` from `siteview-core` for use within this crate.
///
/// All environment-variable parsing lives in `siteview-core` so it can be
/// shared with integration tests without depending on the full server.
pub use siteview_core::config::{AuthMode, Config};
