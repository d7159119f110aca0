// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use bytes::Bytes;
use url::Url;

use crate::error::FeedError;
use crate::http::HttpClient;

/// Placeholder replaced by the account identifier in a feed URL template
pub const ACCOUNT_PLACEHOLDER: &str = "{account}";

/// Source of the latest-uploads feed for an account
pub const DEFAULT_FEED_URL_TEMPLATE: &str = "http://mixcloud-rss.georgipavlov.com/{account}/m4a/30";

/// Build the feed URL for an account from a template
pub fn feed_url(template: &str, account: &str) -> Result<Url, FeedError> {
    let url = Url::parse(&template.replace(ACCOUNT_PLACEHOLDER, account))?;
    Ok(url)
}

/// Fetch raw feed bytes from a URL (without parsing)
pub async fn fetch_feed_bytes<C: HttpClient>(client: &C, url: &Url) -> Result<Bytes, FeedError> {
    client.get_bytes(url.as_str()).await.map_err(|e| match e.status() {
        Some(status) => FeedError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        },
        None => FeedError::FetchFailed {
            url: url.to_string(),
            source: e,
        },
    })
}
