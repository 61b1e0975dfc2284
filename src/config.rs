use std::path::PathBuf;
use std::time::Duration;

pub const LISTING_URL: &str = "https://www.gamekee.com/sevenknights/";

/// Parallel page extractions (one browser session each).
pub const WORKERS: usize = 6;

/// Client-side rendering delay before the listing page is read.
pub const SETTLE_SECS: u64 = 5;

pub const WEBDRIVER_PORT: u16 = 9515;

/// Written in place of a field whose element could not be read.
pub const ERROR_SENTINEL: &str = "!!! error !!!";

/// Stands in for an anchor without an href on the listing page.
pub const LINK_PLACEHOLDER: &str = "-";

pub const CHROMEDRIVER_ENDPOINT: &str =
    "https://googlechromelabs.github.io/chrome-for-testing/last-known-good-versions-with-downloads.json";

#[cfg(all(target_os = "macos", target_arch = "aarch64"))]
pub const DRIVER_PLATFORM: &str = "mac-arm64";
#[cfg(all(target_os = "macos", not(target_arch = "aarch64")))]
pub const DRIVER_PLATFORM: &str = "mac-x64";
#[cfg(target_os = "windows")]
pub const DRIVER_PLATFORM: &str = "win64";
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub const DRIVER_PLATFORM: &str = "linux64";

/// Settings for one scrape run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Where snapshots are written and looked up.
    pub out_dir: PathBuf,
    pub listing_url: String,
    pub workers: usize,
    pub settle: Duration,
}
