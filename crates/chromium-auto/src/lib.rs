//! # chromium-auto
//!
//! Locate a Chromium or Chrome executable so headless automation can start
//! without the caller hard-coding a browser path.
//!
//! ## Resolution order
//!
//! [`ensure_chromium`] tries, first match wins:
//!
//! 1. An explicit path passed by the caller (must exist, otherwise an error).
//! 2. `HARVEST_CHROME_PATH`: path to an existing browser binary.
//! 3. The per-user cache directory ([`chromium_cache_dir`]) holding an
//!    unpacked *Chrome for Testing* archive.
//! 4. Well-known executable names on `PATH` (`google-chrome`, `chromium`, …).
//! 5. Common install locations on macOS and Windows.
//!
//! Nothing is downloaded: unpack a Chrome for Testing build into the cache
//! directory, install a system browser, or set `HARVEST_CHROME_PATH`.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use chromium_auto::ensure_chromium;
//!
//! let chrome = ensure_chromium(None).expect("no Chromium available");
//! println!("using {}", chrome.display());
//! ```
//!
//! ## Environment variable overrides
//!
//! - `HARVEST_CHROME_PATH`: path to an existing browser executable.
//! - `HARVEST_CHROMIUM_CACHE_DIR`: override the default cache directory.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use thiserror::Error;

// ── Public constants ─────────────────────────────────────────────────────────

/// Environment variable naming an explicit browser executable.
pub const CHROME_PATH_ENV: &str = "HARVEST_CHROME_PATH";

/// Environment variable overriding the cache directory root.
pub const CACHE_DIR_ENV: &str = "HARVEST_CHROMIUM_CACHE_DIR";

/// Executable names probed on `PATH`, in preference order.
const PATH_NAMES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "chrome",
];

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by chromium-auto operations.
#[derive(Error, Debug)]
pub enum ChromiumAutoError {
    /// The caller named a browser path that does not exist.
    #[error("Chrome executable not found at '{path}'")]
    ExplicitPathMissing { path: PathBuf },

    /// No browser could be found anywhere.
    #[error(
        "No Chromium or Chrome executable found.\n\
Searched: HARVEST_CHROME_PATH, {cache}, PATH ({names}).\n\
Install Chrome/Chromium or set HARVEST_CHROME_PATH=/path/to/chrome.",
        cache = .cache_dir.display(),
        names = PATH_NAMES.join(", ")
    )]
    NotFound { cache_dir: PathBuf },
}

// ── Cache directory resolution ───────────────────────────────────────────────

/// Returns the directory where an unpacked Chrome for Testing build is looked up.
///
/// Default locations:
/// - **macOS**: `~/Library/Caches/uspto-harvest/chromium/`
/// - **Linux**: `~/.cache/uspto-harvest/chromium/`
/// - **Windows**: `%LOCALAPPDATA%\uspto-harvest\chromium\`
///
/// Override by setting `HARVEST_CHROMIUM_CACHE_DIR`.
pub fn chromium_cache_dir() -> PathBuf {
    if let Ok(override_dir) = std::env::var(CACHE_DIR_ENV) {
        return PathBuf::from(override_dir).join("chromium");
    }

    let base = dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
        .unwrap_or_else(std::env::temp_dir);

    base.join("uspto-harvest").join("chromium")
}

/// Executable locations inside `cache_dir` for the current platform.
///
/// Mirrors the directory layout of the Chrome for Testing archives.
pub fn cache_candidates(cache_dir: &Path) -> Vec<PathBuf> {
    if cfg!(target_os = "macos") {
        let app = "Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing";
        vec![
            cache_dir.join("chrome-mac-arm64").join(app),
            cache_dir.join("chrome-mac-x64").join(app),
            cache_dir.join(app),
        ]
    } else if cfg!(target_os = "windows") {
        vec![
            cache_dir.join("chrome-win64").join("chrome.exe"),
            cache_dir.join("chrome-win32").join("chrome.exe"),
            cache_dir.join("chrome.exe"),
        ]
    } else {
        vec![
            cache_dir.join("chrome-linux64").join("chrome"),
            cache_dir.join("chrome"),
        ]
    }
}

fn well_known_locations() -> Vec<PathBuf> {
    if cfg!(target_os = "macos") {
        vec![
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
            PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
        ]
    } else if cfg!(target_os = "windows") {
        vec![
            PathBuf::from(r"C:\Program Files\Google\Chrome\Application\chrome.exe"),
            PathBuf::from(r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe"),
        ]
    } else {
        Vec::new()
    }
}

// ── Thread-safe singleton path cache ─────────────────────────────────────────

static RESOLVED_PATH: OnceLock<PathBuf> = OnceLock::new();

// ── Public API ───────────────────────────────────────────────────────────────

/// Search every location except an explicit caller path.
///
/// Returns `None` when no browser is installed where we look.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. Env override
    if let Ok(p) = std::env::var(CHROME_PATH_ENV) {
        let path = PathBuf::from(p);
        if is_file(&path) {
            return Some(path);
        }
    }

    // 2. Cache dir
    if let Some(p) = first_existing(cache_candidates(&chromium_cache_dir())) {
        return Some(p);
    }

    // 3. System PATH
    for name in PATH_NAMES {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 4. Common install locations
    first_existing(well_known_locations())
}

/// Resolve the browser executable, preferring `explicit` when given.
///
/// An explicit path that does not exist is an error rather than a silent
/// fall-through: the caller asked for that browser specifically.
///
/// # Thread safety
///
/// Safe to call from multiple threads; the search result is cached for the
/// rest of the process when no explicit path is supplied.
pub fn ensure_chromium(explicit: Option<&Path>) -> Result<PathBuf, ChromiumAutoError> {
    if let Some(path) = explicit {
        if is_file(path) {
            return Ok(path.to_path_buf());
        }
        return Err(ChromiumAutoError::ExplicitPathMissing {
            path: path.to_path_buf(),
        });
    }

    if let Some(path) = RESOLVED_PATH.get() {
        return Ok(path.clone());
    }

    let path = find_chromium().ok_or_else(|| ChromiumAutoError::NotFound {
        cache_dir: chromium_cache_dir(),
    })?;

    let _ = RESOLVED_PATH.set(path.clone());

    Ok(path)
}

// ── Internal helpers ─────────────────────────────────────────────────────────

fn is_file(path: &Path) -> bool {
    path.metadata().map(|m| m.is_file()).unwrap_or(false)
}

fn first_existing(candidates: Vec<PathBuf>) -> Option<PathBuf> {
    candidates.into_iter().find(|p| is_file(p))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
