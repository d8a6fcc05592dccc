use crate::CLAP_STYLING;
use clap::{arg, command};
use std::path::PathBuf;

fn input_arg() -> clap::Arg {
    arg!(<INPUT>)
        .help("Path to a PageGraph GraphML file")
        .value_parser(clap::value_parser!(PathBuf))
}

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("pagegraph")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("pagegraph")
        .styles(CLAP_STYLING)
        .arg(
            arg!(--"debug" "Print debug level log messages to stderr")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(-q --"quiet" "Suppress progress and non-essential output")
                .required(false)
                .global(true),
        )
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            command!("subframes")
                .about("Print the iframes in the page and the frames they loaded")
                .arg(input_arg())
                .arg(
                    arg!(-l --"local")
                        .required(false)
                        .help("Only include iframes in the top level frame whose frames are all local"),
                ),
        )
        .subcommand(
            command!("requests")
                .about("Print every network request the page made, with its redirects and result")
                .arg(input_arg())
                .arg(
                    arg!(-f --"frame" <FRAME_ID>)
                        .required(false)
                        .help("Only include requests made by this frame (frame id or DOM root id)"),
                ),
        )
        .subcommand(
            command!("scripts")
                .about("Print the scripts that ran in the page")
                .arg(input_arg())
                .arg(
                    arg!(-i --"id" <NODE_ID>)
                        .required(false)
                        .help("Only include the script with this node id"),
                )
                .arg(
                    arg!(-s --"source")
                        .required(false)
                        .help("Include the script source text"),
                )
                .arg(
                    arg!(-f --"frame" <NODE_ID>)
                        .required(false)
                        .help("Only include scripts executed in the frame with this DOM root id"),
                ),
        )
        .subcommand(
            command!("js-calls")
                .about("Print the JavaScript builtins and web APIs called by scripts in the page")
                .arg(input_arg())
                .arg(
                    arg!(-f --"frame" <NODE_ID>)
                        .required(false)
                        .help("Only include calls made from the frame with this DOM root id"),
                )
                .arg(
                    arg!(-c --"cross-frame")
                        .required(false)
                        .help("Only include calls where the caller and receiver frames differ"),
                )
                .arg(
                    arg!(-m --"method" <NAME>)
                        .required(false)
                        .help("Only include methods whose name contains this text (case sensitive)"),
                )
                .arg(
                    arg!(-i --"id" <NODE_ID>)
                        .required(false)
                        .help("Only include calls to the builtin or API with this node id"),
                ),
        )
        .subcommand(
            command!("elm")
                .about("Print a node or edge and its neighborhood")
                .arg(input_arg())
                .arg(
                    arg!(<ID>)
                        .help("Node (n##) or edge (e##) id"),
                )
                .arg(
                    arg!(-d --"depth" <DEPTH>)
                        .required(false)
                        .help("How many levels of neighbors to expand (0 prints only the element)")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("0"),
                ),
        )
        .subcommand(
            command!("extract")
                .about(
                    "Extract per-request features from every graph in a corpus, one isolated \
                process per graph.",
                )
                .arg(
                    arg!(--"graph-dir" <PATH>)
                        .required(true)
                        .help("Corpus root, laid out as <PATH>/<site>/<name>.graphml"),
                )
                .arg(
                    arg!(--"feature-dir" <PATH>)
                        .required(true)
                        .help("Directory the <name>.json feature files are written to"),
                )
                .arg(
                    arg!(--"mapping-path" <PATH>)
                        .required(true)
                        .help("Comma separated table mapping saved HTML files to page URLs"),
                )
                .arg(
                    arg!(--"modified")
                        .required(false)
                        .help("The corpus was built from modified pages with index suffixed names"),
                )
                .arg(
                    arg!(-j --"jobs" <NUM_JOBS>)
                        .required(false)
                        .help("How many graphs to extract at once")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("4"),
                )
                .arg(
                    arg!(-t --"timeout" <SECONDS>)
                        .required(false)
                        .help("Kill the extraction of a graph after this many seconds")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("60"),
                )
                .arg(
                    arg!(--"tick-ms" <MS>)
                        .required(false)
                        .help("How often running extractions are checked, in milliseconds")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("100"),
                ),
        )
        .subcommand(
            command!("extract-one")
                .hide(true)
                .about("Extract the features of a single graph")
                .arg(arg!(--"feature-dir" <PATH>).required(true))
                .arg(arg!(--"mapping-path" <PATH>).required(true))
                .arg(arg!(--"modified").required(false))
                .arg(
                    arg!(<GRAPH>)
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            command!("rewrite")
                .about(
                    "Rewrite a mapping table for a directory of modified HTML files, injecting \
                each file's index into its URL.",
                )
                .arg(
                    arg!(--"mapping-path" <PATH>)
                        .required(true)
                        .help("Mapping table of the original HTML files"),
                )
                .arg(
                    arg!(--"html-path" <PATH>)
                        .required(true)
                        .help("Directory of (modified) HTML files"),
                )
                .arg(
                    arg!(--"modified")
                        .required(false)
                        .help("File names carry an _<index> suffix"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Where to write the rewritten table")
                        .default_value(pagegraph_extract::mapping::DEFAULT_REWRITE_OUTPUT),
                ),
        )
}
