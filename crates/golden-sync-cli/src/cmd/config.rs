use super::load_settings;
use crate::output::{print_json, print_pairs};
use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show effective settings (file values over defaults)
    Show,
}

pub fn run(config: Option<&Path>, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Show => {
            let settings = load_settings(config)?;
            if json {
                return print_json(&settings);
            }
            print_pairs(&[
                ("platform_api_url".into(), settings.platform_api_url),
                ("platform_cli".into(), settings.platform_cli),
                ("hosting_api_url".into(), settings.hosting_api_url),
                (
                    "secret_store.command".into(),
                    settings.secret_store.command.join(" "),
                ),
                (
                    "secret_store.secret_id_template".into(),
                    settings.secret_store.secret_id_template,
                ),
                ("commit_author_name".into(), settings.commit_author_name),
                ("commit_author_email".into(), settings.commit_author_email),
                ("metadata_file".into(), settings.metadata_file),
                (
                    "workspace_dir".into(),
                    settings.workspace_dir.display().to_string(),
                ),
            ]);
            Ok(())
        }
    }
}
