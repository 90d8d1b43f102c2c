pub mod config;
pub mod event;
pub mod handle;
pub mod run;

use anyhow::Context;
use clap::Args;
use golden_sync_core::platform::PlatformClient;
use golden_sync_core::secrets::CommandSecretStore;
use golden_sync_core::workspace::CleanupRegistry;
use golden_sync_core::{Inbound, Pipeline, Settings};
use std::path::{Path, PathBuf};

/// Inbound values, normally injected by the trigger as environment variables.
#[derive(Args)]
pub struct InboundArgs {
    /// Platform API key
    #[arg(long, env = "NP_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Resource name of the application that triggered the run
    #[arg(long, env = "NOTIFICATION_NRN")]
    pub nrn: Option<String>,

    /// Base URL for progress messages and the final status report
    #[arg(long, env = "NOTIFICATION_CALLBACK_URL")]
    pub callback_url: Option<String>,
}

impl From<InboundArgs> for Inbound {
    fn from(args: InboundArgs) -> Self {
        Inbound {
            api_key: args.api_key,
            nrn: args.nrn,
            callback_url: args.callback_url,
        }
    }
}

/// Per-invocation overrides on top of the settings file.
#[derive(Args)]
pub struct SettingsArgs {
    /// Platform API base URL
    #[arg(long, env = "NP_API_URL")]
    pub platform_api_url: Option<String>,

    /// Hosting provider API base URL
    #[arg(long, env = "GITHUB_API_URL")]
    pub hosting_api_url: Option<String>,

    /// Directory the repository is cloned into
    #[arg(long, env = "GOLDEN_SYNC_WORKSPACE")]
    pub workspace: Option<PathBuf>,
}

impl SettingsArgs {
    fn apply(&self, mut settings: Settings) -> Settings {
        if let Some(url) = &self.platform_api_url {
            settings.platform_api_url = url.clone();
        }
        if let Some(url) = &self.hosting_api_url {
            settings.hosting_api_url = url.clone();
        }
        if let Some(dir) = &self.workspace {
            settings.workspace_dir = dir.clone();
        }
        settings
    }
}

pub fn load_settings(config: Option<&Path>) -> anyhow::Result<Settings> {
    Settings::load(config).with_context(|| match config {
        Some(path) => format!("failed to load settings from {}", path.display()),
        None => "failed to load settings".to_string(),
    })
}

/// Build the production pipeline and run it once.
pub fn execute_pipeline(settings: Settings, inbound: &Inbound) -> anyhow::Result<()> {
    let registry = CleanupRegistry::new();
    install_interrupt_cleanup(&registry)?;

    let platform = PlatformClient::new(
        settings.platform_api_url.clone(),
        settings.platform_cli.clone(),
    );
    let secrets = CommandSecretStore::new(settings.secret_store.clone());
    let pipeline =
        Pipeline::new(settings, Box::new(platform), Box::new(secrets)).with_registry(registry);

    let report = pipeline.run(inbound);
    match (report.failed_at, report.error) {
        (Some(stage), Some(err)) => {
            Err(anyhow::Error::new(err).context(format!("sync failed at {stage}")))
        }
        _ => Ok(()),
    }
}

/// Remove registered working copies on SIGINT/SIGTERM, then exit 130.
fn install_interrupt_cleanup(registry: &CleanupRegistry) -> anyhow::Result<()> {
    let registry = registry.clone();
    ctrlc::set_handler(move || {
        tracing::warn!("interrupted; removing working copy");
        registry.cleanup_all();
        std::process::exit(130);
    })
    .context("failed to set signal handler")
}
