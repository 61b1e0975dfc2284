//! chromedriver plumbing: a service kept alive for one run, and the
//! updater that keeps the local binary in step with Chrome for Testing.

use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use regex::Regex;
use serde::Deserialize;
use tokio::process::{Child, Command};
use tracing::{debug, info};

const READY_ATTEMPTS: u32 = 40;
const READY_INTERVAL_MS: u64 = 250;

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)+").unwrap());

#[cfg(windows)]
pub const BINARY_NAME: &str = "chromedriver.exe";
#[cfg(not(windows))]
pub const BINARY_NAME: &str = "chromedriver";

// ── Service ──

/// A chromedriver process; killed when dropped.
pub struct DriverService {
    _child: Child,
    url: String,
}

impl DriverService {
    pub async fn spawn(binary: &Path, port: u16) -> Result<Self> {
        let child = Command::new(binary)
            .arg(format!("--port={port}"))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start {}", binary.display()))?;

        let url = format!("http://localhost:{port}");
        wait_ready(&url).await?;
        info!("chromedriver listening on {}", url);
        Ok(Self { _child: child, url })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

async fn wait_ready(url: &str) -> Result<()> {
    let client = reqwest::Client::new();
    let status = format!("{url}/status");
    for attempt in 0..READY_ATTEMPTS {
        match client.get(&status).send().await {
            Ok(resp) if resp.status().is_success() => return Ok(()),
            Ok(resp) => debug!(attempt, status = %resp.status(), "chromedriver not ready"),
            Err(e) => debug!(attempt, error = %e, "chromedriver not reachable yet"),
        }
        tokio::time::sleep(Duration::from_millis(READY_INTERVAL_MS)).await;
    }
    bail!("chromedriver did not become ready at {url}")
}

// ── Updater ──

#[derive(Debug, Deserialize)]
struct KnownGood {
    channels: Channels,
}

#[derive(Debug, Deserialize)]
struct Channels {
    #[serde(rename = "Stable")]
    stable: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    downloads: Downloads,
}

#[derive(Debug, Deserialize)]
struct Downloads {
    #[serde(default)]
    chromedriver: Vec<Download>,
}

#[derive(Debug, Deserialize)]
struct Download {
    platform: String,
    url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub version: String,
    pub url: String,
}

/// Pick the stable chromedriver download for `platform` out of the version
/// metadata document.
pub fn pick_release(metadata: &str, platform: &str) -> Result<Release> {
    let doc: KnownGood = serde_json::from_str(metadata).context("Unexpected version metadata")?;
    let url = doc
        .channels
        .stable
        .downloads
        .chromedriver
        .into_iter()
        .find(|d| d.platform == platform)
        .map(|d| d.url)
        .ok_or_else(|| anyhow!("No stable chromedriver build for {platform}"))?;
    let version = url
        .split('/')
        .nth(4)
        .ok_or_else(|| anyhow!("No version in download URL {url}"))?
        .to_string();
    Ok(Release { version, url })
}

/// First dotted version number in `chromedriver --version` output.
pub fn parse_version(output: &str) -> Option<String> {
    VERSION_RE.find(output).map(|m| m.as_str().to_string())
}

pub fn installed_version(dir: &Path) -> Option<String> {
    let output = std::process::Command::new(dir.join(BINARY_NAME))
        .arg("--version")
        .output()
        .ok()?;
    parse_version(&String::from_utf8_lossy(&output.stdout))
}

/// Bring `<dir>/chromedriver` up to the latest stable build for `platform`.
/// Returns the installed path when a download happened.
pub async fn update(endpoint: &str, dir: &Path, platform: &str) -> Result<Option<PathBuf>> {
    let installed = installed_version(dir);
    match &installed {
        Some(v) => info!("Installed chromedriver: {}", v),
        None => info!("chromedriver not installed, now installing..."),
    }

    let client = reqwest::Client::new();
    let metadata = client
        .get(endpoint)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await
        .context("Failed to fetch chromedriver version metadata")?;
    let release = pick_release(&metadata, platform)?;

    if installed.as_deref() == Some(release.version.as_str()) {
        info!("chromedriver {} is current", release.version);
        return Ok(None);
    }

    info!("Downloading chromedriver {} from {}", release.version, release.url);
    let archive = client
        .get(&release.url)
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await
        .context("Failed to download chromedriver")?;

    let path = unpack(&archive, dir, platform)?;
    info!("chromedriver updated at {}", path.display());
    Ok(Some(path))
}

/// Extract `chromedriver-<platform>/chromedriver` from the archive into
/// `dir` and mark it executable.
fn unpack(archive: &[u8], dir: &Path, platform: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let mut zip = zip::ZipArchive::new(Cursor::new(archive)).context("Corrupt chromedriver archive")?;
    let entry = format!("chromedriver-{platform}/{BINARY_NAME}");
    let mut file = zip
        .by_name(&entry)
        .with_context(|| format!("{entry} missing from archive"))?;

    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    let path = dir.join(BINARY_NAME);
    std::fs::write(&path, bytes)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(&path)?.permissions();
        perms.set_mode(perms.mode() | 0o111);
        std::fs::set_permissions(&path, perms)?;
    }

    Ok(path)
}
