//! Outbound client identities
//!
//! A `ClientIdentity` is the set of headers that describe who is making the
//! request. The backoff cycle replaces it wholesale whenever the server starts
//! blocking us; where new identities come from is up to an `IdentityProvider`.

use crate::config::{IdentityConfig, IdentityStrategy};
use rand::seq::SliceRandom;
use rand::Rng;

/// Identity headers sent with every page request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub user_agent: String,
    pub accept_language: String,
    /// Value of the `Sec-CH-UA-Platform` client hint, if any
    pub platform: Option<String>,
}

impl ClientIdentity {
    /// Identity that only carries a user agent
    pub fn with_user_agent(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            accept_language: "en-US,en;q=0.9".to_string(),
            platform: None,
        }
    }

    /// Header name/value pairs for this identity
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            ("User-Agent", self.user_agent.clone()),
            ("Accept-Language", self.accept_language.clone()),
        ];
        if let Some(platform) = &self.platform {
            headers.push(("Sec-CH-UA-Platform", format!("\"{}\"", platform)));
        }
        headers
    }
}

/// Source of fresh client identities
pub trait IdentityProvider: Send + Sync {
    fn next_identity(&self) -> ClientIdentity;
}

/// Always hands out the same identity
#[derive(Debug, Clone)]
pub struct FixedIdentity {
    identity: ClientIdentity,
}

impl FixedIdentity {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            identity: ClientIdentity::with_user_agent(user_agent),
        }
    }
}

impl IdentityProvider for FixedIdentity {
    fn next_identity(&self) -> ClientIdentity {
        self.identity.clone()
    }
}

struct Platform {
    hint: &'static str,
    token: &'static str,
}

const PLATFORMS: &[Platform] = &[
    Platform {
        hint: "Windows",
        token: "Windows NT 10.0; Win64; x64",
    },
    Platform {
        hint: "macOS",
        token: "Macintosh; Intel Mac OS X 10_15_7",
    },
    Platform {
        hint: "Linux",
        token: "X11; Linux x86_64",
    },
];

const LANGUAGES: &[&str] = &[
    "en-US,en;q=0.9",
    "en-GB,en;q=0.8",
    "en-US,en;q=0.8,es;q=0.6",
];

#[derive(Debug, Clone, Copy)]
enum Browser {
    Chrome,
    Firefox,
    Edge,
}

/// Generates a random, plausible desktop browser identity on every call
#[derive(Debug, Clone, Default)]
pub struct BrowserIdentityGenerator;

impl BrowserIdentityGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl IdentityProvider for BrowserIdentityGenerator {
    fn next_identity(&self) -> ClientIdentity {
        let mut rng = rand::thread_rng();

        let platform = &PLATFORMS[rng.gen_range(0..PLATFORMS.len())];
        let browser = [Browser::Chrome, Browser::Firefox, Browser::Edge]
            .choose(&mut rng)
            .copied()
            .unwrap_or(Browser::Chrome);
        let major: u32 = rng.gen_range(118..=131);

        let user_agent = match browser {
            Browser::Chrome => format!(
                "Mozilla/5.0 ({}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{}.0.0.0 Safari/537.36",
                platform.token, major
            ),
            Browser::Firefox => format!(
                "Mozilla/5.0 ({}; rv:{}.0) Gecko/20100101 Firefox/{}.0",
                platform.token, major, major
            ),
            Browser::Edge => format!(
                "Mozilla/5.0 ({}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{}.0.0.0 Safari/537.36 Edg/{}.0.0.0",
                platform.token, major, major
            ),
        };

        ClientIdentity {
            user_agent,
            accept_language: LANGUAGES[rng.gen_range(0..LANGUAGES.len())].to_string(),
            // Firefox does not send client hints
            platform: match browser {
                Browser::Firefox => None,
                _ => Some(platform.hint.to_string()),
            },
        }
    }
}

/// Builds the provider selected in the configuration
pub fn identity_provider(config: &IdentityConfig) -> Box<dyn IdentityProvider> {
    match config.strategy {
        IdentityStrategy::Browser => Box::new(BrowserIdentityGenerator::new()),
        IdentityStrategy::Fixed => Box::new(FixedIdentity::new(config.user_agent.clone())),
    }
}
