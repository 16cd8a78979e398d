use clap::Subcommand;
use habitrack_core::model::TIMEZONES;
use habitrack_core::{Config, ProfileUpdate};

use crate::context::{AppContext, CliResult};

#[derive(Subcommand)]
pub enum ProfileAction {
    /// Show the profile
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change the full name or timezone
    Edit {
        /// Full name; an empty value clears it
        #[arg(long)]
        name: Option<String>,
        /// One of the offered timezones, e.g. Europe/Paris
        #[arg(long)]
        timezone: Option<String>,
    },
    /// List the offered timezones
    Timezones,
}

pub async fn run(action: ProfileAction, config: Config) -> CliResult {
    if let ProfileAction::Timezones = action {
        for (label, zone) in TIMEZONES {
            println!("{zone:<22} {label}");
        }
        return Ok(());
    }

    let mut ctx = AppContext::new(config)?;
    let user_id = ctx.require_user().await?;
    let mut store = ctx.profile()?;

    match action {
        ProfileAction::Show { json } => {
            store.load(&user_id).await?;
            let Some(profile) = store.profile() else {
                return Err("profile not found".into());
            };
            if json {
                println!("{}", serde_json::to_string_pretty(profile)?);
            } else {
                println!("{} ({})", store.display_name(), store.initials());
                println!("email:         {}", profile.email);
                println!("timezone:      {}", profile.timezone());
                println!("member since:  {}", profile.member_since());
            }
        }
        ProfileAction::Edit { name, timezone } => {
            let mut update = ProfileUpdate::default();
            if let Some(name) = name {
                update = update.with_full_name(&name);
            }
            if let Some(zone) = timezone {
                if !TIMEZONES.iter().any(|(_, z)| *z == zone) {
                    return Err(format!("unsupported timezone '{zone}'; see `habitrack profile timezones`").into());
                }
                update = update.with_timezone(zone);
            }
            if update == ProfileUpdate::default() {
                return Err("nothing to change; pass --name or --timezone".into());
            }
            let profile = store.update(Some(&user_id), update).await?;
            println!("profile updated: {}", profile.full_name.as_deref().unwrap_or("(no name)"));
        }
        ProfileAction::Timezones => {}
    }
    Ok(())
}
