//! Fetch a URL through the offline router

use colored::Colorize;

use crate::cache::CacheStorage;
use crate::cli::{AcceptKind, CommandContext, GlobalOptions, OutputFormat};
use crate::client::{HttpRequest, HttpResponse};
use crate::error::Result;
use crate::offline::OfflineRouter;
use crate::output::json::format_json_value;

/// Build the router over the context's transport and the on-disk cache
pub fn router(ctx: &CommandContext) -> Result<OfflineRouter> {
    let storage = CacheStorage::open()?;
    Ok(OfflineRouter::new(
        ctx.client.transport(),
        storage,
        &ctx.config.offline,
        &ctx.config.base_url,
    ))
}

pub async fn run(
    opts: &GlobalOptions,
    url: &str,
    accept: AcceptKind,
    output: Option<&str>,
) -> Result<()> {
    let ctx = CommandContext::anonymous(opts)?;
    let router = router(&ctx)?;

    let request =
        HttpRequest::get(router.resolve(url)).with_header("Accept", accept.header_value());
    let response = router.fetch(request).await?;
    // Let a stale-while-revalidate refresh land before the process exits
    router.settle().await;

    if let Some(path) = output {
        std::fs::write(path, &response.body)?;
    }

    match ctx.format {
        OutputFormat::Json => {
            let body = output.is_none().then(|| response.text());
            let json = serde_json::json!({
                "status": response.status,
                "status_text": response.status_text,
                "headers": response.headers,
                "body": body,
            });
            println!("{}", format_json_value(&json)?);
        }
        _ => {
            eprintln!("{}", status_line(&response));
            if output.is_none() {
                println!("{}", response.text());
            }
        }
    }
    Ok(())
}

fn status_line(response: &HttpResponse) -> String {
    let line = format!("{} {}", response.status, response.status_text);
    if response.is_success() {
        line.green().to_string()
    } else {
        line.yellow().to_string()
    }
}
