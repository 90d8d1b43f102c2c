use super::{execute_pipeline, load_settings, SettingsArgs};
use golden_sync_core::Inbound;
use std::path::Path;

pub fn run(
    config: Option<&Path>,
    overrides: &SettingsArgs,
    inbound: Inbound,
) -> anyhow::Result<()> {
    let settings = overrides.apply(load_settings(config)?);
    tracing::debug!(?inbound, "starting sync");
    execute_pipeline(settings, &inbound)
}
