pub mod search;

pub use search::{get_typed, search_resolved, search_typed, Bucket, Hit, Hits, SearchResponse, TermsAggregation};
