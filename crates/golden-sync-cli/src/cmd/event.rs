use super::handle::read_event;
use crate::output::print_json;
use clap::Subcommand;
use golden_sync_core::event;
use std::collections::BTreeMap;

#[derive(Subcommand)]
pub enum EventSubcommand {
    /// Print the event's notification fields as shell exports
    Env {
        /// Event JSON file ("-" reads stdin)
        #[arg(long, default_value = "-")]
        event: String,
    },
    /// Print the application id encoded in a resource name
    AppId {
        /// Resource name, e.g. organization=1:account=2:application=42
        nrn: String,
    },
}

pub fn run(subcmd: EventSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        EventSubcommand::Env { event } => {
            let vars = read_event(&event)?;
            if json {
                let map: BTreeMap<&str, &str> = vars.iter().collect();
                print_json(&map)?;
            } else {
                print!("{}", vars.to_exports());
            }
        }
        EventSubcommand::AppId { nrn } => {
            let app_id = event::app_id_from_nrn(Some(&nrn))?;
            if json {
                print_json(&serde_json::json!({ "app_id": app_id }))?;
            } else {
                println!("{app_id}");
            }
        }
    }
    Ok(())
}
