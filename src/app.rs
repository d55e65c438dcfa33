use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail, ensure};
use clap::{Parser, Subcommand};
use regex::Regex;
use tracing::{info, warn};

use crate::cipher;
use crate::cipher::hash::is_content_hash;
use crate::client::ReportClient;
use crate::config::{APP_NAME, EICAR_SHA256, INTERRUPTED_EXIT_CODE, SETTINGS_FILE};
use crate::context::RunContext;
use crate::password;
use crate::processor::{Processor, Summary, Target};
use crate::secret::Secret;
use crate::settings::Settings;
use crate::sink::TracingSink;
use crate::types::KeyStorage;
use crate::ui::prompt::Prompt;

#[derive(Subcommand)]
pub enum Commands {
    /// Store the API key, encrypted with a password unless --plain is given.
    Setup {
        #[arg(short = 'k', long)]
        api_key: String,

        #[arg(long)]
        plain: bool,

        #[arg(long)]
        api_version: Option<u8>,
    },

    /// Scan one file.
    Scan { path: PathBuf },

    /// Scan every matching file in a directory.
    ScanDir {
        path: PathBuf,

        #[arg(short, long, default_value = "*")]
        filter: String,

        #[arg(long)]
        no_recursive: bool,
    },

    /// Look up a hash.
    ScanHash { hash: String },

    /// Look up the EICAR test file.
    Eicar,

    /// Download a file and look up its hash.
    ScanLink { url: String },

    /// Scan the executables of running processes.
    ScanProcesses {
        #[arg(short, long, default_value = ".*")]
        filter: String,

        #[arg(short, long)]
        modules: bool,
    },

    /// Scan the executable of one process.
    ScanProcess {
        pid: u32,

        #[arg(short, long)]
        modules: bool,
    },
}

#[derive(Parser)]
#[command(name = APP_NAME, version, about = "Check files, links and running processes against VirusTotal.")]
pub struct App {
    #[arg(short, long, global = true, default_value = SETTINGS_FILE)]
    config: PathBuf,

    #[arg(short, long, global = true)]
    password: Option<String>,

    /// Print the full cause chain of errors.
    #[arg(long, global = true)]
    stacktraces: bool,

    #[command(subcommand)]
    command: Commands,

    #[arg(skip)]
    settings: Settings,
}

impl App {
    pub fn init() -> Result<Self> {
        let mut app = Self::parse();
        // Setup rewrites the file, so it must accept one that no longer validates.
        app.settings = match app.command {
            Commands::Setup { .. } => Settings::read(&app.config)?,
            _ => Settings::load(&app.config)?,
        };

        let builder = tracing_subscriber::fmt().with_file(true).with_line_number(true).with_target(false);
        if app.settings.log_time {
            tracing::subscriber::set_global_default(builder.finish())?;
        } else {
            tracing::subscriber::set_global_default(builder.without_time().finish())?;
        }

        Ok(app)
    }

    pub async fn execute(self) -> Result<()> {
        let prompt = Prompt::default();
        let password = self.password.map(Secret::from_string);

        let (command, settings) = match self.command {
            Commands::Setup { api_key, plain, api_version } => return Self::setup(self.settings, &self.config, &api_key, plain, api_version, password, &prompt),
            command => (command, self.settings),
        };

        let context = Arc::new(RunContext::new(settings.show_stacktraces || self.stacktraces));
        Self::watch_interrupt(Arc::clone(&context));

        let api_key = unlock_api_key(&settings, password, || prompt.prompt_unlock_password())?;
        let client = ReportClient::new(api_key, settings.api_version, settings.client_options(), Arc::clone(&context), Arc::new(TracingSink))?;
        let processor = Processor::new(Arc::new(client), context);

        let summary = Self::run(&processor, command).await?;
        info!("{} scanned, {} alerts, {} failed, {} cancelled", summary.scanned, summary.alerts, summary.failed, summary.cancelled);

        Ok(())
    }

    async fn run(processor: &Processor, command: Commands) -> Result<Summary> {
        match command {
            Commands::Scan { path } => {
                ensure!(path.is_file(), "file not found: {}", path.display());
                let path = std::path::absolute(&path).with_context(|| format!("cannot resolve {}", path.display()))?;
                Ok(processor.scan_all(vec![Target::File(path)]).await)
            }
            Commands::ScanDir { path, filter, no_recursive } => processor.scan_directory(&path, &filter, !no_recursive).await,
            Commands::ScanHash { hash } => {
                let hash = hash.trim();
                ensure!(is_content_hash(hash), "not an MD5, SHA-1 or SHA-256 hex digest: {hash}");
                Ok(processor.scan_all(vec![Target::Hash(hash.to_owned())]).await)
            }
            Commands::Eicar => Ok(processor.scan_all(vec![Target::Hash(EICAR_SHA256.to_owned())]).await),
            Commands::ScanLink { url } => Ok(processor.scan_all(vec![Target::Link(url)]).await),
            Commands::ScanProcesses { filter, modules } => {
                let filter = Regex::new(&filter).with_context(|| format!("invalid process filter: {filter}"))?;
                processor.scan_processes(&filter, modules).await
            }
            Commands::ScanProcess { pid, modules } => processor.scan_process(pid, modules).await,
            Commands::Setup { .. } => bail!("setup does not scan"),
        }
    }

    fn setup(mut settings: Settings, path: &std::path::Path, api_key: &str, plain: bool, api_version: Option<u8>, password: Option<Secret>, prompt: &Prompt) -> Result<()> {
        let api_key = api_key.trim();
        ensure!(!api_key.is_empty(), "API key must not be empty");

        if let Some(version) = api_version {
            settings.api_version = version;
        }
        settings.validate()?;

        if plain {
            settings.key_storage = KeyStorage::Plain;
            settings.api_key = Some(api_key.to_owned());
        } else {
            let password = match password {
                Some(password) => {
                    password::validate(password.expose_secret())?;
                    password
                }
                None => Secret::from_string(prompt.prompt_new_password()?),
            };
            settings.key_storage = KeyStorage::Encrypted;
            settings.api_key = Some(cipher::encrypt(api_key, password.expose_secret())?);
        }

        settings.save(path)?;
        crate::ui::show_success(&format!("Settings written to {}", path.display()));
        Ok(())
    }

    /// First Ctrl-C stops pending lookups; a second one exits immediately.
    fn watch_interrupt(context: Arc<RunContext>) {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            warn!("Interrupted, finishing in-flight requests (press Ctrl-C again to quit)");
            context.request_exit();

            if tokio::signal::ctrl_c().await.is_ok() {
                std::process::exit(INTERRUPTED_EXIT_CODE);
            }
        });
    }
}

/// Recovers the plaintext API key from settings.
///
/// A password passed up front gets one attempt. Otherwise `ask` is called
/// until the password decrypts the key; only a wrong password is retried.
///
/// # Errors
///
/// Fails if no key is configured, the preset password is wrong, the
/// envelope is corrupt, or `ask` fails.
pub fn unlock_api_key<F>(settings: &Settings, password: Option<Secret>, mut ask: F) -> Result<Secret>
where
    F: FnMut() -> Result<String>,
{
    let stored = settings.api_key.as_deref().context("no API key configured, run `vt-checker setup` first")?;

    if settings.key_storage == KeyStorage::Plain {
        return Ok(Secret::new(stored));
    }

    if let Some(password) = password {
        let key = cipher::decrypt(stored, password.expose_secret()).context("cannot unlock the API key")?;
        return Ok(Secret::from_string(key));
    }

    loop {
        let password = Secret::from_string(ask()?);
        match cipher::decrypt(stored, password.expose_secret()) {
            Ok(key) => return Ok(Secret::from_string(key)),
            Err(e) if e.is_recoverable() => warn!("Wrong password, try again"),
            Err(e) => return Err(e).context("stored API key is unreadable"),
        }
    }
}
