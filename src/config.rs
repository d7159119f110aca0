// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/// Where the mirror is published and who answers for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteConfig {
    /// Host serving the mirror, e.g. `intergalacticfm.com`
    pub hostname: String,
    /// Path below the host, e.g. `podcast/`; may be empty
    pub base_path: String,
    /// Local part of the contact address, e.g. `info`
    pub email_local_part: String,
}

impl SiteConfig {
    pub fn new(
        hostname: impl Into<String>,
        base_path: impl Into<String>,
        email_local_part: impl Into<String>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            base_path: base_path.into(),
            email_local_part: email_local_part.into(),
        }
    }

    /// `http://{hostname}`
    pub fn website(&self) -> String {
        format!("http://{}", self.hostname)
    }

    /// Host plus base path without surrounding slashes
    pub fn url_base(&self) -> String {
        let path = self.base_path.trim_matches('/');
        if path.is_empty() {
            self.hostname.clone()
        } else {
            format!("{}/{}", self.hostname, path)
        }
    }

    /// Public URL of a file published under the base path
    pub fn public_url(&self, filename: &str) -> String {
        format!("http://{}/{}", self.url_base(), filename)
    }

    /// Contact address at the configured host
    pub fn email(&self) -> String {
        format!("{}@{}", self.email_local_part, self.hostname)
    }
}
