use std::sync::Arc;

use clap::Subcommand;
use habitrack_core::{Config, RemoteStore, SignUpForm};

use crate::context::{AppContext, CliResult};

#[derive(Subcommand)]
pub enum AuthAction {
    /// Sign in with email and password
    Login {
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Create an account
    Register {
        email: String,
        #[arg(long)]
        password: String,
        /// Repeat the password
        #[arg(long)]
        confirm: String,
    },
    /// Sign out and cancel every reminder
    Logout,
    /// Show the signed-in account
    Status,
}

pub async fn run(action: AuthAction, config: Config) -> CliResult {
    let mut ctx = AppContext::new(config)?;
    match action {
        AuthAction::Login { email, password } => {
            let session = ctx.auth.sign_in(&email, &password).await?;
            println!("signed in as {}", session.email);
        }
        AuthAction::Register {
            email,
            password,
            confirm,
        } => {
            let form = SignUpForm {
                email,
                password,
                confirm_password: confirm,
            };
            let store = ctx.store()?;
            let signed_up = ctx
                .auth
                .sign_up(&form, move |session| -> Arc<dyn RemoteStore> {
                    match session {
                        Some(session) => Arc::new(store.with_access_token(session.access_token.clone())),
                        None => Arc::new(store),
                    }
                })
                .await?;
            if signed_up.session.is_some() {
                println!("registered and signed in as {}", signed_up.email);
            } else {
                println!("registered {}; confirm your email, then run `habitrack auth login`", signed_up.email);
            }
        }
        AuthAction::Logout => {
            ctx.auth.restore().await?;
            ctx.auth.sign_out().await?;
            println!("signed out");
        }
        AuthAction::Status => match ctx.auth.restore().await? {
            Some(session) => {
                println!("signed in as {} ({})", session.email, session.user_id);
            }
            None => println!("not signed in"),
        },
    }
    Ok(())
}
