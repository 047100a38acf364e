use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use url::Url;

/// Location of a repository on the repository host.
///
/// Path has form `/<project key>/<slug>`, optionally with `.git` suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepositoryUri(Url);

impl RepositoryUri {
    pub fn new(url: Url) -> Self {
        RepositoryUri(url)
    }

    fn segments(&self) -> Vec<&str> {
        self.0
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default()
    }

    pub fn project_key(&self) -> Option<&str> {
        let segs = self.segments();
        if segs.len() < 2 {
            return None;
        }
        Some(segs[segs.len() - 2])
    }

    /// Repository name without `.git` suffix.
    pub fn slug(&self) -> Option<&str> {
        let last = *self.segments().last()?;
        Some(last.strip_suffix(".git").unwrap_or(last))
    }

    /// Returns copy of this locator with `user` as URL user info, so that
    /// a participant can clone it with their own credentials.
    pub fn with_user(&self, user: &str) -> RepositoryUri {
        let mut url = self.0.clone();
        if url.set_username(user).is_err() {
            // URLs without host can not carry user info
            return self.clone();
        }
        RepositoryUri(url)
    }

    pub fn user(&self) -> Option<&str> {
        Some(self.0.username()).filter(|u| !u.is_empty())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl FromStr for RepositoryUri {
    type Err = url::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Url::parse(s).map(RepositoryUri)
    }
}

impl TryFrom<String> for RepositoryUri {
    type Error = url::ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<RepositoryUri> for String {
    fn from(uri: RepositoryUri) -> String {
        uri.0.into()
    }
}

impl fmt::Display for RepositoryUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Identifier of a build plan on the build host
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildPlanId(String);

impl BuildPlanId {
    pub fn new(id: impl Into<String>) -> Self {
        BuildPlanId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<BuildPlanId> for String {
    fn from(id: BuildPlanId) -> String {
        id.0
    }
}

impl fmt::Display for BuildPlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
