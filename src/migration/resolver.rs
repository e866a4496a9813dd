//! Player name to UUID resolution.

use std::collections::HashMap;
use std::thread;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use crate::error::{MapError, Result};

const PROFILES_URL: &str = "https://api.mojang.com/profiles/minecraft";
const PROFILE_URL: &str = "https://api.mojang.com/users/profiles/minecraft/";

/// Names per bulk request accepted by the profiles endpoint.
pub const NAMES_PER_REQUEST: usize = 100;

/// Minimum delay between two requests.
pub const REQUEST_INTERVAL: Duration = Duration::from_secs(1);

/// Resolves legacy player names to stable identities.
pub trait IdentityResolver {
    /// Resolve many names at once. Names the service does not know are
    /// absent from the result.
    fn resolve_bulk(&self, names: &[String]) -> Result<HashMap<String, Uuid>>;

    /// Resolve a single name.
    fn resolve_one(&self, name: &str) -> Result<Option<Uuid>>;
}

#[derive(Debug, Deserialize)]
struct Profile {
    id: String,
    name: String,
}

/// [`IdentityResolver`] backed by the Mojang API.
pub struct MojangResolver {
    agent: ureq::Agent,
    interval: Duration,
}

impl MojangResolver {
    pub fn new() -> Self {
        Self {
            agent: ureq::Agent::new(),
            interval: REQUEST_INTERVAL,
        }
    }

    fn request_error(url: &str, e: ureq::Error) -> MapError {
        let message = match e {
            ureq::Error::Status(code, _) => format!("server answered with HTTP {}", code),
            other => other.to_string(),
        };
        MapError::NetworkFetch {
            url: url.to_string(),
            message,
        }
    }

    fn user_agent() -> String {
        format!("mapframe/{}", env!("CARGO_PKG_VERSION"))
    }
}

impl Default for MojangResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityResolver for MojangResolver {
    fn resolve_bulk(&self, names: &[String]) -> Result<HashMap<String, Uuid>> {
        let mut found = HashMap::new();

        for (i, chunk) in names.chunks(NAMES_PER_REQUEST).enumerate() {
            if i > 0 {
                thread::sleep(self.interval);
            }
            let profiles: Vec<Profile> = self
                .agent
                .post(PROFILES_URL)
                .set("User-Agent", &Self::user_agent())
                .send_json(chunk)
                .map_err(|e| Self::request_error(PROFILES_URL, e))?
                .into_json()
                .map_err(|e| MapError::NetworkFetch {
                    url: PROFILES_URL.to_string(),
                    message: format!("unexpected response: {}", e),
                })?;

            for profile in profiles {
                // The service answers with its own capitalisation.
                let Some(requested) = chunk.iter().find(|n| n.eq_ignore_ascii_case(&profile.name))
                else {
                    continue;
                };
                match Uuid::parse_str(&profile.id) {
                    Ok(uuid) => {
                        found.insert(requested.clone(), uuid);
                    }
                    Err(e) => debug!(name = %profile.name, "ignoring malformed UUID: {}", e),
                }
            }
        }

        Ok(found)
    }

    fn resolve_one(&self, name: &str) -> Result<Option<Uuid>> {
        thread::sleep(self.interval);

        let url = format!("{}{}", PROFILE_URL, name);
        let response = match self
            .agent
            .get(&url)
            .set("User-Agent", &Self::user_agent())
            .call()
        {
            Ok(response) => response,
            Err(ureq::Error::Status(404, _)) => return Ok(None),
            Err(e) => return Err(Self::request_error(&url, e)),
        };
        if response.status() == 204 {
            return Ok(None);
        }

        let profile: Profile = response.into_json().map_err(|e| MapError::NetworkFetch {
            url: url.clone(),
            message: format!("unexpected response: {}", e),
        })?;
        Ok(Uuid::parse_str(&profile.id).ok())
    }
}
