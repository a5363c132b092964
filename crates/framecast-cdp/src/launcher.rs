//! Browser process launcher.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tokio::process::{Child, ChildStderr, Command};
use tracing::{debug, info, trace, warn};

use crate::error::CdpError;

const DEVTOOLS_PREFIX: &str = "DevTools listening on ";

/// How to launch browser processes.
#[derive(Debug, Clone)]
pub struct LauncherConfig {
    /// Explicit executable; well-known locations are probed when unset.
    pub executable: Option<PathBuf>,
    pub headless: bool,
    pub no_sandbox: bool,
    pub extra_args: Vec<String>,
    /// Time allowed for the process to announce its DevTools endpoint.
    pub launch_timeout: Duration,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            executable: None,
            headless: true,
            no_sandbox: true,
            extra_args: Vec::new(),
            launch_timeout: Duration::from_secs(20),
        }
    }
}

impl LauncherConfig {
    /// Resolve the executable to run.
    pub fn resolve_executable(&self) -> Result<PathBuf, CdpError> {
        match &self.executable {
            Some(path) if path.exists() => Ok(path.clone()),
            Some(path) => Err(CdpError::BrowserNotFound(path.display().to_string())),
            None => find_chrome().ok_or_else(|| {
                CdpError::BrowserNotFound(
                    "no Chrome/Chromium installation found; set FRAMECAST_BROWSER_PATH".to_string(),
                )
            }),
        }
    }

    /// Command-line arguments for one launch.
    pub fn build_args(&self, profile_dir: &Path, width: u32, height: u32) -> Vec<String> {
        let mut args = vec![
            "--remote-debugging-port=0".to_string(),
            format!("--user-data-dir={}", profile_dir.display()),
            format!("--window-size={},{}", width, height),
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
            "--disable-background-networking".to_string(),
            "--disable-background-timer-throttling".to_string(),
            "--disable-backgrounding-occluded-windows".to_string(),
            "--disable-renderer-backgrounding".to_string(),
            "--disable-sync".to_string(),
            "--disable-translate".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--disable-blink-features=AutomationControlled".to_string(),
            "--hide-scrollbars".to_string(),
            "--mute-audio".to_string(),
            "--metrics-recording-only".to_string(),
        ];

        if self.headless {
            args.push("--headless=new".to_string());
        }
        if self.no_sandbox {
            args.push("--no-sandbox".to_string());
        }
        args.extend(self.extra_args.iter().cloned());
        args.push("about:blank".to_string());
        args
    }
}

/// Find a Chrome/Chromium executable in well-known install locations.
pub fn find_chrome() -> Option<PathBuf> {
    candidate_paths().into_iter().find(|p| p.exists())
}

fn candidate_paths() -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = Vec::new();

    #[cfg(target_os = "macos")]
    {
        let apps = [
            "Google Chrome.app/Contents/MacOS/Google Chrome",
            "Chromium.app/Contents/MacOS/Chromium",
            "Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
        ];
        for app in apps {
            paths.push(PathBuf::from("/Applications").join(app));
            if let Some(home) = dirs::home_dir() {
                paths.push(home.join("Applications").join(app));
            }
        }
    }

    #[cfg(target_os = "linux")]
    {
        for path in [
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
            "/usr/bin/microsoft-edge",
        ] {
            paths.push(PathBuf::from(path));
        }
    }

    #[cfg(target_os = "windows")]
    {
        for path in [
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
        ] {
            paths.push(PathBuf::from(path));
        }
        if let Some(local) = dirs::data_local_dir() {
            paths.push(local.join(r"Google\Chrome\Application\chrome.exe"));
        }
    }

    paths
}

/// Extract the DevTools WebSocket URL from a stderr line.
pub(crate) fn parse_devtools_line(line: &str) -> Option<&str> {
    line.trim()
        .strip_prefix(DEVTOOLS_PREFIX)
        .map(str::trim)
        .filter(|url| url.starts_with("ws://"))
}

/// A running browser process with its private profile.
///
/// The child is spawned with kill-on-drop and the profile directory is a
/// [`TempDir`], so dropping this value leaves nothing behind.
pub struct BrowserProcess {
    child: Child,
    ws_url: String,
    _profile: TempDir,
    stderr_task: tokio::task::JoinHandle<()>,
}

impl BrowserProcess {
    /// Spawn a browser and wait for its DevTools endpoint.
    pub async fn launch(config: &LauncherConfig, width: u32, height: u32) -> Result<Self, CdpError> {
        let executable = config.resolve_executable()?;
        let profile = tempfile::Builder::new().prefix("framecast-profile-").tempdir()?;

        let mut cmd = Command::new(&executable);
        cmd.args(config.build_args(profile.path(), width, height))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| CdpError::LaunchFailed(format!("{}: {}", executable.display(), e)))?;
        let pid = child.id();

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| CdpError::LaunchFailed("stderr not captured".to_string()))?;
        let mut lines = BufReader::new(stderr).lines();

        let ws_url = match tokio::time::timeout(config.launch_timeout, wait_for_endpoint(&mut lines)).await {
            Ok(Ok(url)) => url,
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(CdpError::LaunchFailed(format!(
                    "browser did not report a DevTools endpoint within {:?}",
                    config.launch_timeout
                )));
            }
        };

        info!("Browser launched (pid {:?}) at {}", pid, ws_url);

        let stderr_task = tokio::spawn(drain_stderr(lines));

        Ok(Self {
            child,
            ws_url,
            _profile: profile,
            stderr_task,
        })
    }

    /// DevTools WebSocket URL of the browser.
    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// OS process id of the browser.
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Wait up to `grace` for the process to exit, then kill it.
    pub async fn shutdown(mut self, grace: Duration) -> Result<(), CdpError> {
        self.stderr_task.abort();
        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                debug!("Browser exited with {}", status);
                Ok(())
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => {
                warn!("Browser did not exit within {:?}, killing it", grace);
                self.child.kill().await?;
                Ok(())
            }
        }
    }
}

async fn wait_for_endpoint<R>(lines: &mut Lines<BufReader<R>>) -> Result<String, CdpError>
where
    R: AsyncRead + Unpin,
{
    let mut tail = Vec::new();
    while let Some(line) = lines.next_line().await? {
        if let Some(url) = parse_devtools_line(&line) {
            return Ok(url.to_string());
        }
        trace!("browser: {}", line);
        tail.push(line);
        if tail.len() > 8 {
            tail.remove(0);
        }
    }
    Err(CdpError::LaunchFailed(format!(
        "browser exited before reporting a DevTools endpoint: {}",
        tail.join(" | ")
    )))
}

async fn drain_stderr(mut lines: Lines<BufReader<ChildStderr>>) {
    while let Ok(Some(line)) = lines.next_line().await {
        trace!("browser: {}", line);
    }
}
