//! Login and logout commands

use colored::Colorize;
use dialoguer::{Input, Password, theme::ColorfulTheme};
use log::debug;

use crate::cli::{CommandContext, GlobalOptions, OutputFormat};
use crate::client::models::LoginResponse;
use crate::error::Result;
use crate::output::json::format_json_value;

/// Log in, store the token and report who we are
pub async fn login(
    opts: &GlobalOptions,
    email: Option<String>,
    password: Option<String>,
) -> Result<()> {
    let mut ctx = CommandContext::anonymous(opts)?;

    let email = match email {
        Some(email) => email,
        None => Input::with_theme(&ColorfulTheme::default())
            .with_prompt("Email")
            .interact_text()?,
    };
    let password = match password {
        Some(password) => password,
        None => Password::with_theme(&ColorfulTheme::default())
            .with_prompt("Password")
            .interact()?,
    };

    let response = authenticate(&mut ctx, &email, &password).await?;
    ctx.save_config()?;

    match ctx.format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "success": true,
                "user": response.user,
            });
            println!("{}", format_json_value(&json)?);
        }
        _ => {
            let who = response
                .user
                .as_ref()
                .map(|u| {
                    if u.full_name.is_empty() {
                        u.email.clone()
                    } else {
                        u.full_name.clone()
                    }
                })
                .unwrap_or(email);
            println!("{} Logged in as {}", "✓".green(), who.bold());
        }
    }
    Ok(())
}

/// Exchange credentials for a token and record it in the context's config
pub async fn authenticate(
    ctx: &mut CommandContext,
    email: &str,
    password: &str,
) -> Result<LoginResponse> {
    debug!("Logging in to {} as {}", ctx.config.base_url, email);
    let response = ctx.client.login(email, password).await?;
    ctx.config.token = Some(response.token.clone());
    Ok(response)
}

/// Revoke the token and remove it from config.
///
/// The local token is dropped even when the server call fails.
pub async fn logout(opts: &GlobalOptions) -> Result<()> {
    let mut ctx = CommandContext::anonymous(opts)?;
    if ctx.config.token.is_none() {
        println!("Not logged in");
        return Ok(());
    }

    let server = ctx.client.logout().await;
    ctx.config.token = None;
    ctx.config.csrf_token = None;
    ctx.save_config()?;

    match server {
        Ok(()) => println!("{} Logged out", "✓".green()),
        Err(e) => println!(
            "{} Logged out locally (server said: {})",
            "⚠".yellow(),
            e.message()
        ),
    }
    Ok(())
}
