use clap::arg;
use url::Url;

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("sitelink")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("sitelink")
        .about(
            "Crawls a site from a root URL, following same-domain links, and prints a \
            sitemap.xml to stdout.",
        )
        .styles(CLAP_STYLING)
        .arg(
            arg!(-u --"url" <URL>)
                .required(true)
                .help("The root URL to map (only links on its domain are followed)")
                .value_parser(clap::value_parser!(Url)),
        )
        .arg(
            arg!(-d --"depth" <DEPTH>)
                .required(false)
                .help("How many link hops to follow from the root (0 disables crawling)")
                .value_parser(clap::value_parser!(usize))
                .default_value("4"),
        )
        .arg(
            arg!(--"domain" <PREFIX>)
                .required(false)
                .help("Prefix deciding which links are in scope (default: the root's scheme://host)"),
        )
        .arg(
            arg!(-t --"timeout" <SECONDS>)
                .required(false)
                .help("Per-request timeout in seconds")
                .value_parser(clap::value_parser!(u64))
                .default_value("10"),
        )
        .arg(
            arg!(-o --"output" <PATH>)
                .required(false)
                .help("Write the sitemap to a file instead of stdout")
                .value_parser(clap::value_parser!(std::path::PathBuf)),
        )
        .arg(
            arg!(--"report" <PATH>)
                .required(false)
                .help("Write a JSON crawl summary to this file")
                .value_parser(clap::value_parser!(std::path::PathBuf)),
        )
        .arg(
            arg!(-q --"quiet" "Suppress the progress spinner and summary")
                .required(false)
                .conflicts_with("verbose"),
        )
        .arg(arg!(-v --"verbose" "Log every fetch and dispatch").required(false))
}
