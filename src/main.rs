//! VerseHub CLI - command-line companion for the DjangoVerseHub platform

use clap::{CommandFactory, Parser};
use clap_complete::CompleteEnv;

mod backoff;
mod cache;
mod cli;
mod client;
mod config;
mod error;
mod models;
mod offline;
mod output;
mod realtime;

use cli::{
    ArticleCommands, CacheCommands, Cli, Commands, GlobalOptions, NotificationCommands,
    QueueCommands,
};
use error::{Error, Result};

fn main() {
    // Answers dynamic completion requests from the shell and exits
    CompleteEnv::with_factory(Cli::command).complete();

    let cli = Cli::parse();
    init_logging(cli.debug);

    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(Error::from)
        .and_then(|runtime| runtime.block_on(run(cli)));

    if let Err(err) = result {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

/// `warn` by default, `debug` with `--debug`; `RUST_LOG` overrides both
fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let opts = GlobalOptions::from_cli(&cli);

    match cli.command {
        Commands::Init => cli::init::run(&opts).await,
        Commands::Status => cli::status::run(&opts),
        Commands::Version => {
            println!("versehub version {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Login { email, password } => cli::auth::login(&opts, email, password).await,
        Commands::Logout => cli::auth::logout(&opts).await,
        Commands::Articles(cmd) => match cmd {
            ArticleCommands::List {
                category,
                search,
                ordering,
                page,
            } => cli::articles::list(&opts, category, search, ordering, &page).await,
            ArticleCommands::Get { slug } => cli::articles::get(&opts, &slug).await,
        },
        Commands::Search { query, kind } => {
            cli::articles::search(&opts, &query, kind.as_deref()).await
        }
        Commands::Notifications(cmd) => match cmd {
            NotificationCommands::List { unread, page } => {
                cli::notifications::list(&opts, unread, &page).await
            }
            NotificationCommands::Count => cli::notifications::count(&opts).await,
            NotificationCommands::Read { id } => cli::notifications::read(&opts, id).await,
            NotificationCommands::ReadAll => cli::notifications::read_all(&opts).await,
            NotificationCommands::Delete { id } => cli::notifications::delete(&opts, id).await,
            NotificationCommands::Watch => cli::notifications::watch(&opts).await,
            NotificationCommands::Subscribe {
                endpoint,
                p256dh,
                auth,
                deny,
            } => cli::notifications::subscribe(&opts, endpoint, p256dh, auth, deny).await,
        },
        Commands::Fetch {
            url,
            accept,
            output,
        } => cli::fetch::run(&opts, &url, accept, output.as_deref()).await,
        Commands::Cache(cmd) => match cmd {
            CacheCommands::Status => cli::cache::status(&opts),
            CacheCommands::Clear => cli::cache::clear(opts.format),
            CacheCommands::Path => cli::cache::path(),
            CacheCommands::Install => cli::cache::install(&opts).await,
            CacheCommands::Activate => cli::cache::activate(&opts).await,
        },
        Commands::Queue(cmd) => match cmd {
            QueueCommands::AddComment {
                article,
                content,
                parent,
            } => cli::queue::add_comment(&opts, article, &content, parent),
            QueueCommands::AddArticle {
                title,
                content,
                category,
            } => cli::queue::add_article(&opts, &title, &content, category),
            QueueCommands::List { tag } => cli::queue::list(&opts, tag.as_deref()),
            QueueCommands::Flush { tag } => cli::queue::flush(&opts, tag.as_deref()).await,
        },
        Commands::Completion { shell } => {
            cli::completions::generate(shell);
            Ok(())
        }
    }
}
