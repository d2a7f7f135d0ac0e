use colored::Colorize;
use sitelink::commands::command_argument_builder;
use sitelink::{RunConfig, handle_crawl, init_tracing};

#[tokio::main]
async fn main() {
    let matches = command_argument_builder().get_matches();

    let config = match RunConfig::from_matches(&matches) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {:#}", "✗".red().bold(), e);
            std::process::exit(2);
        }
    };

    init_tracing(config.log_level());

    if let Err(e) = handle_crawl(&config).await {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}
