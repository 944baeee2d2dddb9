//! Wire-level constants
//!
//! Centralized location for the limits and fixed names the remote API
//! imposes.

use std::time::Duration;

pub const DEFAULT_ENDPOINT_DOMAIN: &str = "reddit.com";

/// `api_type` form value requesting JSON envelopes
pub const API_TYPE: &str = "json";

// Batch and page limits
pub const MAX_LISTING_ITEMS: usize = 100;
pub const MAX_API_INFO_AMOUNT: usize = 100;
pub const MAX_API_MORECHILDREN_AMOUNT: usize = 20;

/// `count` sent with listing requests; the service only returns a `before`
/// cursor when it is set
pub const LISTING_COUNT: usize = 9999;

/// A 401 within this long of the token's expiry is treated as the token
/// expiring in flight.
pub const MAX_TOKEN_LATENCY: Duration = Duration::from_secs(10);

/// A token this close to expiry is refreshed before dispatch
pub const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(1);

/// Name carried by the "continue this thread" `more` node
pub const CONTINUE_THREAD_NAME: &str = "t1__";

// Token endpoint
pub const ACCESS_TOKEN_PATH: &str = "api/v1/access_token";
pub const REVOKE_TOKEN_PATH: &str = "api/v1/revoke_token";
pub const AUTHORIZE_PATH: &str = "api/v1/authorize";
pub const INSTALLED_CLIENT_GRANT: &str = "https://oauth.reddit.com/grants/installed_client";

/// `device_id` sent with an installed-client grant when the caller has none
pub const DEFAULT_DEVICE_ID: &str = "DO_NOT_TRACK_THIS_DEVICE";

// Rate-limit response headers
pub const RATELIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const RATELIMIT_RESET_HEADER: &str = "x-ratelimit-reset";
