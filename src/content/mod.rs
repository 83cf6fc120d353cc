//! Remote content resolution: nearby places and page summaries from the
//! encyclopedia, in the caller's language.
//!
//! - [`WikiClient::find_nearby`] runs a radius-bounded geosearch
//! - [`WikiClient::fetch_summary`] resolves the detail record for one title
//!
//! ```ignore
//! use geotalk::content::{NearbyQuery, WikiClient};
//!
//! let client = WikiClient::from_config(&config)?;
//! let query = NearbyQuery::from_settings(&settings).with_limit(5);
//! let places = client.find_nearby(Some(48.8566), Some(2.3522), &query).await?;
//! let summary = client.fetch_summary(&places[0].title, query.language).await?;
//! ```

mod types;
mod wiki;

pub use types::{NearbyPlace, NearbyQuery, Summary, DEFAULT_NEARBY_LIMIT};
pub use wiki::{
    ContentError, Endpoints, WikiClient, DEFAULT_SEARCH_ENDPOINT, DEFAULT_SUMMARY_ENDPOINT,
};
