pub mod cache;
pub mod request_id;


pub use cache::{CacheLayer, ResponseCacheMiddleware, SUBMISSIONS_TAG};
pub use request_id::{RequestIdExt, RequestIdMiddleware};
