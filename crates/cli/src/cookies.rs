//! Persistence of the refresh cookie between CLI invocations
//!
//! The API hands out the refresh credential as an HTTP-only cookie. The
//! client keeps it in a reqwest cookie jar; this module saves the cookies
//! the jar would send to the refresh endpoint and restores them on startup.

use anyhow::{Context, Result};
use cinema_http::client::REFRESH_PATH;
use reqwest::cookie::{CookieStore, Jar};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use url::Url;

pub struct CookieFile {
    path: PathBuf,
    refresh_url: Url,
    jar: Arc<Jar>,
}

impl CookieFile {
    /// Load saved cookies for `base_url`, starting empty if none were saved
    pub fn load(path: impl Into<PathBuf>, base_url: &str) -> Result<Self> {
        let path = path.into();
        let refresh_url = Url::parse(&format!("{base_url}{REFRESH_PATH}"))
            .with_context(|| format!("invalid base URL: {base_url}"))?;
        let jar = Arc::new(Jar::default());

        if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let mut restored = 0;
            for pair in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
                jar.add_cookie_str(&format!("{pair}; Path=/"), &refresh_url);
                restored += 1;
            }
            debug!(restored, "restored cookies");
        }

        Ok(Self {
            path,
            refresh_url,
            jar,
        })
    }

    /// The jar to hand to the client builder
    pub fn jar(&self) -> Arc<Jar> {
        Arc::clone(&self.jar)
    }

    /// Write the cookies currently in the jar
    pub fn save(&self) -> Result<()> {
        let Some(header) = self.jar.cookies(&self.refresh_url) else {
            return self.remove();
        };
        let header = header
            .to_str()
            .context("cookie jar returned a non-text header")?;

        let content = header
            .split(';')
            .map(str::trim)
            .filter(|pair| !pair.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        write_private(&self.path, &content)
    }

    /// Forget saved cookies
    pub fn remove(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("failed to remove {}", self.path.display())),
        }
    }
}

fn write_private(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }

    Ok(())
}
