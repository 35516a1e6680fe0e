//! Init command implementation

use colored::Colorize;
use dialoguer::{Confirm, Input, Password, theme::ColorfulTheme};

use crate::cli::{CommandContext, GlobalOptions, auth};
use crate::config::{Config, PushPermission};
use crate::error::Result;

/// Run the init command: pick a server, log in and save the config
pub async fn run(opts: &GlobalOptions) -> Result<()> {
    println!("{}", "Welcome to VerseHub!".bold().green());
    println!("Let's connect to your DjangoVerseHub server.\n");

    let theme = ColorfulTheme::default();
    let existing = Config::load_or_default(opts.config_ref())?;

    let base_url: String = Input::with_theme(&theme)
        .with_prompt("Server URL")
        .default(
            opts.base_url
                .clone()
                .unwrap_or_else(|| existing.base_url.clone()),
        )
        .validate_with(|input: &String| -> std::result::Result<(), String> {
            match reqwest::Url::parse(input) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
                Ok(_) => Err("URL must start with http:// or https://".to_string()),
                Err(e) => Err(e.to_string()),
            }
        })
        .interact_text()?;

    let email: String = Input::with_theme(&theme)
        .with_prompt("Email")
        .interact_text()?;
    let password = Password::with_theme(&theme)
        .with_prompt("Password")
        .interact()?;

    let opts = GlobalOptions {
        base_url: Some(base_url),
        ..opts.clone()
    };
    let mut ctx = CommandContext::anonymous(&opts)?;

    println!("\n{}", "Authenticating...".cyan());
    let response = auth::authenticate(&mut ctx, &email, &password).await?;
    println!("{}", "✓ Authentication successful!".green());
    if let Some(user) = response.user.as_ref() {
        if !user.is_verified {
            println!("{}", "⚠ Your email address is not verified yet.".yellow());
        }
    }

    let allow = Confirm::with_theme(&theme)
        .with_prompt("Show desktop notifications for new activity?")
        .default(true)
        .interact()?;
    ctx.config.push_permission = if allow {
        PushPermission::Granted
    } else {
        PushPermission::Denied
    };

    ctx.save_config()?;
    let path = ctx.config_path()?;

    println!(
        "\n{} Configuration saved to: {}",
        "✓".green(),
        path.display()
    );

    println!("\n{}", "You're all set! Try running:".bold());
    println!("  {} - Show configuration status", "versehub status".cyan());
    println!("  {} - Browse articles", "versehub articles list".cyan());
    println!(
        "  {} - Stream notifications",
        "versehub notifications watch".cyan()
    );

    Ok(())
}
