use commands::command_argument_builder;
use pagegraph::handlers::*;

mod commands;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    init_logging(chosen_command.get_flag("debug"));

    match chosen_command.subcommand() {
        Some(("subframes", primary_command)) => handle_subframes(primary_command),
        Some(("requests", primary_command)) => handle_requests(primary_command),
        Some(("scripts", primary_command)) => handle_scripts(primary_command),
        Some(("js-calls", primary_command)) => handle_js_calls(primary_command),
        Some(("elm", primary_command)) => handle_elm(primary_command),
        Some(("extract", primary_command)) => handle_extract(primary_command).await,
        Some(("extract-one", primary_command)) => handle_extract_one(primary_command),
        Some(("rewrite", primary_command)) => handle_rewrite(primary_command),
        _ => unreachable!("clap should ensure we don't get here"),
    }
}

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);
