use super::{execute_pipeline, load_settings, SettingsArgs};
use anyhow::Context;
use golden_sync_core::event::{InboundEvent, NotificationVars};
use golden_sync_core::Inbound;
use std::io::Read;
use std::path::Path;
use tracing::info;

/// Read an event document from a file, or stdin when `source` is `-`.
pub fn read_event(source: &str) -> anyhow::Result<NotificationVars> {
    let raw = if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read event from stdin")?;
        buf
    } else {
        std::fs::read_to_string(source).with_context(|| format!("failed to read event {source}"))?
    };
    let event = InboundEvent::from_json(&raw).context("event is not valid JSON")?;
    Ok(event.vars()?)
}

pub fn run(
    config: Option<&Path>,
    overrides: &SettingsArgs,
    source: &str,
    api_key: Option<String>,
) -> anyhow::Result<()> {
    let vars = read_event(source)?;
    if !vars.is_application_event() {
        info!(
            entity = vars.entity().unwrap_or("unknown"),
            "not an application event; nothing to do"
        );
        return Ok(());
    }

    let inbound = Inbound {
        api_key,
        nrn: vars.nrn().map(str::to_string),
        callback_url: vars.callback_url().map(str::to_string),
    };
    let settings = overrides.apply(load_settings(config)?);
    execute_pipeline(settings, &inbound)
}
