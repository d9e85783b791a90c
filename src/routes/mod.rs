//! Content routes and the identifiers derived from them.
//!
//! A [`ContentRoute`] names a resource and the parameters it is fetched
//! with. A [`ContentIdentifier`] hashes a route into two keys:
//! - `id` for the exact page or variant
//! - `pageable_id` for the family of pages sharing pagination state
//!
//! # Example
//!
//! ```ignore
//! let page0 = ContentIdentifier::new(ContentRoute::live_events("FBL", 0));
//! let page1 = ContentIdentifier::new(ContentRoute::live_events("FBL", 1));
//!
//! assert_ne!(page0.id(), page1.id());
//! assert_eq!(page0.pageable_id(), page1.pageable_id());
//! ```

mod identifier;
mod route;
mod window;

pub use identifier::{ContentIdentifier, WireContentIdentifier};
pub use route::ContentRoute;
pub use window::{format_bound, parse_bound, DateWindow, DATE_FORMAT, DEFAULT_WINDOW_DAYS};
