// Cache policy module
// Author: kelexine (https://github.com/kelexine)

pub mod models;
pub mod policy;

pub use models::{normalize_model, ModelProfile, CATALOG_ORDER, MODEL_CATALOG};
pub use policy::{
    estimate_tokens_from_text, format_ttl, min_cache_token_requirement, CachePlan, CachePolicy,
    MIN_CACHE_TOKENS,
};
