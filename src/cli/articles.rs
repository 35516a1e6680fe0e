//! Article browsing and search commands

use colored::Colorize;
use log::debug;

use crate::cli::{CommandContext, GlobalOptions, OutputFormat, PageArgs};
use crate::client::models::{Article, ArticleFilter};
use crate::error::Result;
use crate::models::{ArticleDisplay, SearchHitDisplay};
use crate::output::Formattable;
use crate::output::formatters::format_datetime_local;
use crate::output::json::format_json_value;
use crate::output::table::format_details;

pub async fn list(
    opts: &GlobalOptions,
    category: Option<String>,
    search: Option<String>,
    ordering: Option<String>,
    page: &PageArgs,
) -> Result<()> {
    let ctx = CommandContext::anonymous(opts)?;
    let filter = ArticleFilter {
        category,
        search,
        ordering,
        page: page.page,
    };

    let listing = ctx.client.list_articles(&filter).await?;
    debug!(
        "Fetched {} of {} articles",
        listing.results.len(),
        listing.count
    );

    let more = listing.has_more_pages();
    let rows: Vec<ArticleDisplay> = page
        .take(listing.results)
        .iter()
        .map(ArticleDisplay::from)
        .collect();
    rows.print(ctx.format)?;

    if more && ctx.format != OutputFormat::Json {
        let next = page.page.unwrap_or(1) + 1;
        println!(
            "{}",
            format!("More results: --page {} ({} total)", next, listing.count).dimmed()
        );
    }
    Ok(())
}

pub async fn get(opts: &GlobalOptions, slug: &str) -> Result<()> {
    let ctx = CommandContext::anonymous(opts)?;
    let article = ctx.client.get_article(slug).await?;

    match ctx.format {
        OutputFormat::Json => println!("{}", format_json_value(&article)?),
        OutputFormat::Table => vec![ArticleDisplay::from(&article)].print(ctx.format)?,
        OutputFormat::Pretty => print_pretty(&article),
    }
    Ok(())
}

fn print_pretty(article: &Article) {
    println!("{}", article.title.bold());
    if let Some(ref summary) = article.summary {
        println!("{}\n", summary.dimmed());
    }
    let author = article
        .author
        .as_ref()
        .map(|a| a.full_name.clone())
        .unwrap_or_default();
    println!(
        "{}",
        format_details(&[
            ("Slug", article.slug.clone()),
            ("Author", author),
            ("Category", article.category_name().unwrap_or_default()),
            (
                "Published",
                format_datetime_local(article.published_at.as_ref())
            ),
            ("Views", article.views_count.to_string()),
            ("Likes", article.likes_count.to_string()),
            ("Comments", article.comment_count.to_string()),
        ])
    );
}

pub async fn search(opts: &GlobalOptions, query: &str, kind: Option<&str>) -> Result<()> {
    let ctx = CommandContext::anonymous(opts)?;
    let payload = ctx.client.search(query, kind).await?;

    match ctx.format {
        OutputFormat::Json => println!("{}", format_json_value(&payload)?),
        _ => SearchHitDisplay::rows(&payload, kind).print(ctx.format)?,
    }
    Ok(())
}
