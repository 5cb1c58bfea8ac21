use std::{
    path::Path,
    process::Stdio,
    time::{Duration, Instant},
};

use thirtyfour::{prelude::*, ChromeCapabilities, ChromiumLikeCapabilities};
use tokio::process::{Child, Command};

use crate::configuration::BrowserSettings;

use super::{BrowserSession, DriverError, DriverInitError, PageDriver, SessionFactory};

const FALLBACK_DRIVER: &str = "chromedriver";
const READY_POLL: Duration = Duration::from_millis(100);

/// A live browser session and, when we started it, the driver process behind it.
pub struct Droid {
    driver: Option<WebDriver>,
    process: Option<Child>,
}

impl Droid {
    fn driver(&self) -> Result<&WebDriver, DriverError> {
        self.driver
            .as_ref()
            .ok_or_else(|| DriverError::Command("browser session already released".to_string()))
    }

    async fn run_script(
        &self,
        script: &str,
        element: &WebElement,
    ) -> Result<serde_json::Value, DriverError> {
        let args = vec![element.to_json().map_err(into_driver_error)?];
        let ret = self
            .driver()?
            .execute(script, args)
            .await
            .map_err(into_driver_error)?;
        Ok(ret.json().clone())
    }
}

impl PageDriver for Droid {
    type Element = WebElement;

    async fn goto(&self, url: &str) -> Result<(), DriverError> {
        self.driver()?.goto(url).await.map_err(into_driver_error)
    }

    async fn find_all(&self, xpath: &str) -> Result<Vec<WebElement>, DriverError> {
        self.driver()?
            .find_all(By::XPath(xpath))
            .await
            .map_err(into_driver_error)
    }

    async fn attr(&self, element: &WebElement, name: &str) -> Result<Option<String>, DriverError> {
        element.attr(name).await.map_err(into_driver_error)
    }

    async fn text(&self, element: &WebElement) -> Result<String, DriverError> {
        element.text().await.map_err(into_driver_error)
    }

    async fn scroll_height(&self, element: &WebElement) -> Result<i64, DriverError> {
        let value = self
            .run_script("return arguments[0].scrollHeight;", element)
            .await?;
        value
            .as_i64()
            .ok_or_else(|| DriverError::Command(format!("scrollHeight was not a number: {}", value)))
    }

    async fn scroll_to_bottom(&self, element: &WebElement) -> Result<(), DriverError> {
        self.run_script("arguments[0].scrollTop = arguments[0].scrollHeight;", element)
            .await
            .map(|_| ())
    }

    async fn scroll_into_view(&self, element: &WebElement) -> Result<(), DriverError> {
        self.run_script("arguments[0].scrollIntoView({block: 'center'});", element)
            .await
            .map(|_| ())
    }

    async fn activate(&self, element: &WebElement) -> Result<(), DriverError> {
        self.run_script("arguments[0].click();", element)
            .await
            .map(|_| ())
    }
}

impl BrowserSession for Droid {
    async fn release(&mut self) {
        if let Some(driver) = self.driver.take() {
            match driver.quit().await {
                Ok(()) => log::info!("Browser session closed"),
                Err(e) => log::warn!("Error closing browser session: {}", e),
            }
        }
        if let Some(mut process) = self.process.take() {
            if let Err(e) = process.kill().await {
                log::warn!("Error stopping driver process: {}", e);
            }
        }
    }
}

/// Opens a fresh Chrome session per run, spawning chromedriver unless a
/// remote driver url is configured.
pub struct ChromeFactory {
    settings: BrowserSettings,
    http: reqwest::Client,
}

impl ChromeFactory {
    pub fn new(settings: BrowserSettings) -> Self {
        ChromeFactory {
            settings,
            http: reqwest::Client::new(),
        }
    }

    fn spawn_driver(&self) -> Result<Child, DriverInitError> {
        let path = resolve_driver_path(&self.settings.driver_paths);
        log::info!("Using driver binary {}", path);

        Command::new(&path)
            .arg(format!("--port={}", self.settings.driver_port))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| DriverInitError::Spawn { path, source })
    }

    async fn wait_until_ready(&self, server_url: &str) -> Result<(), DriverInitError> {
        let timeout = Duration::from_secs(self.settings.startup_timeout_secs);
        let status_url = format!("{}/status", server_url.trim_end_matches('/'));
        let started = Instant::now();

        while started.elapsed() < timeout {
            if let Ok(res) = self.http.get(&status_url).send().await {
                if res.status().is_success() {
                    return Ok(());
                }
            }
            tokio::time::sleep(READY_POLL).await;
        }

        Err(DriverInitError::NotReady(timeout))
    }

    async fn open_session(&self, server_url: &str) -> Result<WebDriver, DriverInitError> {
        let caps = build_capabilities(&self.settings)?;
        let driver = WebDriver::new(server_url, caps)
            .await
            .map_err(|e| DriverInitError::Session(e.to_string()))?;

        let configured = async {
            driver
                .set_page_load_timeout(self.settings.page_load_timeout())
                .await?;
            driver
                .set_implicit_wait_timeout(self.settings.implicit_wait())
                .await
        }
        .await;

        match configured {
            Ok(()) => Ok(driver),
            Err(e) => {
                if let Err(quit_err) = driver.quit().await {
                    log::warn!("Error closing half-configured session: {}", quit_err);
                }
                Err(DriverInitError::Session(e.to_string()))
            }
        }
    }
}

impl SessionFactory for ChromeFactory {
    type Session = Droid;

    async fn acquire(&self) -> Result<Droid, DriverInitError> {
        let (server_url, mut process) = match &self.settings.webdriver_url {
            Some(url) => (url.clone(), None),
            None => {
                let child = self.spawn_driver()?;
                (
                    format!("http://localhost:{}", self.settings.driver_port),
                    Some(child),
                )
            }
        };

        let opened = match process {
            Some(_) => match self.wait_until_ready(&server_url).await {
                Ok(()) => self.open_session(&server_url).await,
                Err(e) => Err(e),
            },
            None => self.open_session(&server_url).await,
        };

        match opened {
            Ok(driver) => {
                log::info!("Browser session initialized via {}", server_url);
                Ok(Droid {
                    driver: Some(driver),
                    process,
                })
            }
            Err(e) => {
                if let Some(child) = process.as_mut() {
                    if let Err(kill_err) = child.kill().await {
                        log::warn!("Error stopping driver process: {}", kill_err);
                    }
                }
                Err(e)
            }
        }
    }
}

pub fn build_capabilities(settings: &BrowserSettings) -> Result<ChromeCapabilities, DriverInitError> {
    let mut caps = DesiredCapabilities::chrome();

    let mut args = vec![
        "--no-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-gpu".to_string(),
        "--disable-blink-features=AutomationControlled".to_string(),
        "--disable-features=VizDisplayCompositor".to_string(),
        "--disable-extensions".to_string(),
        "--disable-popup-blocking".to_string(),
        "--ignore-certificate-errors".to_string(),
        format!("--window-size={},{}", settings.window_width, settings.window_height),
        format!("--user-agent={}", settings.user_agent),
    ];
    if settings.headless {
        args.insert(0, "--headless=new".to_string());
    }

    for arg in &args {
        caps.add_arg(arg).map_err(into_init_error)?;
    }
    caps.add_experimental_option("excludeSwitches", vec!["enable-automation"])
        .map_err(into_init_error)?;
    caps.add_experimental_option("useAutomationExtension", false)
        .map_err(into_init_error)?;

    Ok(caps)
}

/// First existing path from `candidates`, else the bare binary name so the
/// `PATH` lookup of the operating system applies.
pub fn resolve_driver_path(candidates: &[String]) -> String {
    resolve_driver_path_with(candidates, |path| Path::new(path).exists())
}

fn resolve_driver_path_with(candidates: &[String], exists: impl Fn(&str) -> bool) -> String {
    candidates
        .iter()
        .find(|path| exists(path.as_str()))
        .cloned()
        .unwrap_or_else(|| FALLBACK_DRIVER.to_string())
}

fn into_init_error(e: WebDriverError) -> DriverInitError {
    DriverInitError::Capabilities(e.to_string())
}

fn into_driver_error(e: WebDriverError) -> DriverError {
    match e {
        WebDriverError::StaleElementReference(_) => DriverError::Stale(e.to_string()),
        WebDriverError::WebDriverTimeout(_)
        | WebDriverError::ScriptTimeout(_)
        | WebDriverError::Timeout(_) => DriverError::Timeout(e.to_string()),
        other => DriverError::Command(other.to_string()),
    }
}
