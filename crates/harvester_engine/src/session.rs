use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use engine_logging::{engine_info, engine_warn};
use scraper::Html;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::{ConfigError, Css};
use crate::poll::{navigate_within, poll_until_or_deadline};
use crate::{BrowsingContext, HarvestError, PollPolicy};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session artifact {0:?} does not exist")]
    NotFound(PathBuf),
    #[error("session artifact {path:?} is unreadable: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("session artifact {path:?} is not a cookie jar: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("session artifact {0:?} holds no cookies")]
    Empty(PathBuf),
}

impl SessionError {
    pub fn path(&self) -> &Path {
        match self {
            SessionError::NotFound(path) | SessionError::Empty(path) => path,
            SessionError::Io { path, .. } | SessionError::Parse { path, .. } => path,
        }
    }
}

impl From<SessionError> for HarvestError {
    fn from(err: SessionError) -> Self {
        HarvestError::SessionMissing {
            path: err.path().to_path_buf(),
            reason: err.to_string(),
        }
    }
}

fn root_path() -> String {
    "/".to_string()
}

/// One persisted cookie. Field names follow browser storage-state exports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "root_path")]
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
}

impl SessionCookie {
    /// A leading dot marks a domain cookie; anything else is host-only.
    fn host(&self) -> &str {
        self.domain.trim_start_matches('.')
    }

    fn cookie_path(&self) -> &str {
        if self.path.starts_with('/') {
            &self.path
        } else {
            "/"
        }
    }

    /// The URL a cookie store should attribute this cookie to.
    pub fn origin(&self) -> Option<Url> {
        let scheme = if self.secure { "https" } else { "http" };
        Url::parse(&format!("{scheme}://{}{}", self.host(), self.cookie_path())).ok()
    }

    /// The cookie as a `Set-Cookie` value, for seeding a cookie store.
    pub fn set_cookie_value(&self) -> String {
        let mut value = format!("{}={}; Path={}", self.name, self.value, self.cookie_path());
        if self.domain.starts_with('.') {
            value.push_str("; Domain=");
            value.push_str(self.host());
        }
        if self.secure {
            value.push_str("; Secure");
        }
        if self.http_only {
            value.push_str("; HttpOnly");
        }
        value
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ArtifactFile {
    Jar(Vec<SessionCookie>),
    StorageState { cookies: Vec<SessionCookie> },
}

/// The persisted authenticated session, produced by an out-of-band login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionArtifact {
    path: PathBuf,
    cookies: Vec<SessionCookie>,
}

impl SessionArtifact {
    /// Accepts a bare cookie array or an object with a `cookies` array.
    pub fn load(path: &Path) -> Result<Self, SessionError> {
        let raw = fs::read_to_string(path).map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                SessionError::NotFound(path.to_path_buf())
            } else {
                SessionError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        if raw.trim().is_empty() {
            return Err(SessionError::Empty(path.to_path_buf()));
        }
        let parsed: ArtifactFile =
            serde_json::from_str(&raw).map_err(|source| SessionError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        let cookies = match parsed {
            ArtifactFile::Jar(cookies) | ArtifactFile::StorageState { cookies } => cookies,
        };
        if cookies.is_empty() {
            return Err(SessionError::Empty(path.to_path_buf()));
        }
        Ok(Self {
            path: path.to_path_buf(),
            cookies,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cookies(&self) -> &[SessionCookie] {
        &self.cookies
    }
}

/// How to tell a live session from an expired or challenged one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthProbe {
    /// A page only signed-in users can see.
    pub landing_url: String,
    /// Any of these present means the session is signed in.
    pub authenticated_markers: Vec<String>,
    /// Any of these in the landed URL means the site asked for a login.
    pub login_url_fragments: Vec<String>,
    pub settle: PollPolicy,
}

impl Default for AuthProbe {
    fn default() -> Self {
        Self {
            landing_url: "https://www.linkedin.com/feed/".to_string(),
            authenticated_markers: vec![
                "[data-signed-in]".to_string(),
                "nav.global-nav".to_string(),
                "img.global-nav__me-photo".to_string(),
            ],
            login_url_fragments: vec![
                "/login".to_string(),
                "/authwall".to_string(),
                "/checkpoint/".to_string(),
                "/uas/".to_string(),
            ],
            settle: PollPolicy::new(Duration::from_secs(10), Duration::from_millis(500)),
        }
    }
}

enum AuthVerdict {
    SignedIn,
    LoginRequested(String),
}

/// Lands on the probe page and waits for proof of a signed-in session.
pub async fn verify_authenticated(
    ctx: &mut dyn BrowsingContext,
    probe: &AuthProbe,
    navigation_timeout: Duration,
) -> Result<(), HarvestError> {
    let markers = Css::parse_all(&probe.authenticated_markers)?;
    if markers.is_empty() {
        return Err(ConfigError::Selector {
            selector: String::new(),
            message: "no authenticated marker configured".to_string(),
        }
        .into());
    }
    let fragments: Vec<String> = probe
        .login_url_fragments
        .iter()
        .map(|f| f.to_lowercase())
        .collect();

    navigate_within(ctx, &probe.landing_url, navigation_timeout).await?;

    let verdict = poll_until_or_deadline(ctx, probe.settle, |snapshot| {
        let url = snapshot.url.to_lowercase();
        if let Some(fragment) = fragments.iter().find(|f| url.contains(f.as_str())) {
            return Some(AuthVerdict::LoginRequested(format!(
                "landed on {} ({fragment:?})",
                snapshot.url
            )));
        }
        let document = Html::parse_document(&snapshot.html);
        markers
            .iter()
            .any(|css| document.select(css.selector()).next().is_some())
            .then_some(AuthVerdict::SignedIn)
    })
    .await;

    match verdict {
        Some(AuthVerdict::SignedIn) => {
            engine_info!("session is signed in");
            Ok(())
        }
        Some(AuthVerdict::LoginRequested(reason)) => {
            engine_warn!("session rejected: {}", reason);
            Err(HarvestError::AuthRequired(reason))
        }
        None => {
            let reason = format!(
                "no signed-in marker on {} within {:?}",
                probe.landing_url, probe.settle.window
            );
            engine_warn!("session rejected: {}", reason);
            Err(HarvestError::AuthRequired(reason))
        }
    }
}

/// Turns a session artifact into a live browsing context.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    type Context: BrowsingContext;

    async fn launch(&self, artifact: &SessionArtifact) -> Result<Self::Context, HarvestError>;
}

/// Loads the artifact, launches a context with it and proves it is signed in.
pub async fn open_session<P: SessionProvider>(
    provider: &P,
    artifact_path: &Path,
    probe: &AuthProbe,
    navigation_timeout: Duration,
) -> Result<P::Context, HarvestError> {
    let artifact = SessionArtifact::load(artifact_path)?;
    engine_info!(
        "loaded {} cookies from {:?}",
        artifact.cookies().len(),
        artifact.path()
    );
    let mut ctx = provider.launch(&artifact).await?;
    verify_authenticated(&mut ctx, probe, navigation_timeout).await?;
    Ok(ctx)
}
