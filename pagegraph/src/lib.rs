pub mod handlers;

pub use handlers::{expand_path, extract_one_args, extraction_config, init_logging, load_graph, render_report};
