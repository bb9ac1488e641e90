use clap::Subcommand;

use crate::common::{self, CliError};

#[derive(Subcommand)]
pub enum AuthAction {
    /// Create an account
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        password: String,
    },
    /// Sign in
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Sign out
    Logout,
    /// Show the signed-in user as JSON
    Whoami,
}

pub async fn run(action: AuthAction) -> Result<(), CliError> {
    let ctx = common::context().await?;
    match action {
        AuthAction::Signup { email, name, password } => {
            let user = ctx.session.identity.sign_up(&email, &password, &name).await?;
            println!("created account {} <{}>", user.name, user.email);
        }
        AuthAction::Login { email, password } => {
            let user = ctx.session.identity.sign_in(&email, &password).await?;
            println!("signed in as {}", user.email);
        }
        AuthAction::Logout => {
            ctx.session.identity.sign_out().await;
            println!("signed out");
        }
        AuthAction::Whoami => {
            let user = common::require_user(&ctx).await?;
            println!("{}", serde_json::to_string_pretty(&user)?);
        }
    }
    Ok(())
}
