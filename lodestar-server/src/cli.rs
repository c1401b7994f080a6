use clap::{Arg, ArgAction, Command, ValueHint};
use std::path::PathBuf;

/// CLI arguments for lodestar-server
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub config_file: Option<PathBuf>,
    pub snapshot_file: Option<PathBuf>,
    pub max_request_size: Option<usize>,
    pub log_level: Option<String>,
}

impl CliArgs {
    /// Parse command line arguments
    pub fn parse() -> Self {
        let matches = Command::new("lodestar-server")
            .version(lodestar::VERSION)
            .author("Lodestar Contributors")
            .about("HTTP API server for the Lodestar retrieval engine")
            .long_about(
                r#"Lodestar Server exposes search, batch content fetch, cited answers
(plain and streamed) and actor administration over a JSON HTTP API.

The engine is configured from a TOML, YAML or JSON file plus LODESTAR_* environment
variables. The server itself is configured through command line arguments or
environment variables; command line arguments take precedence.

Examples:
  lodestar-server --port 8080 --snapshot ./workspace.json
  lodestar-server --config lodestar.toml --log-level debug"#,
            )
            .arg(
                Arg::new("host")
                    .long("host")
                    .value_name("ADDR")
                    .help("Address to bind")
                    .long_help(
                        "IP address the HTTP server binds to.
Environment variable: LODESTAR_HOST",
                    )
                    .value_hint(ValueHint::Hostname),
            )
            .arg(
                Arg::new("port")
                    .short('p')
                    .long("port")
                    .value_name("PORT")
                    .help("Port to listen on")
                    .long_help(
                        "Port number for the HTTP server to listen on.
Environment variable: LODESTAR_PORT",
                    )
                    .value_hint(ValueHint::Other)
                    .value_parser(clap::value_parser!(u16)),
            )
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("Engine configuration file")
                    .long_help(
                        "Path to the engine configuration file (toml, yaml or json). Without it
the default locations are searched.
Environment variable: LODESTAR_CONFIG_FILE",
                    )
                    .value_hint(ValueHint::FilePath)
                    .value_parser(clap::value_parser!(PathBuf)),
            )
            .arg(
                Arg::new("snapshot")
                    .short('s')
                    .long("snapshot")
                    .value_name("FILE")
                    .help("Workspace snapshot to load at startup")
                    .long_help(
                        "JSON workspace snapshot loaded into the in-memory store at startup.
Overrides storage.snapshot_file from the engine configuration.
Environment variable: LODESTAR_SNAPSHOT_FILE",
                    )
                    .value_hint(ValueHint::FilePath)
                    .value_parser(clap::value_parser!(PathBuf)),
            )
            .arg(
                Arg::new("max_request_size")
                    .long("max-request-size")
                    .value_name("BYTES")
                    .help("Maximum request body size in bytes")
                    .long_help(
                        "Maximum size allowed for HTTP request bodies.
Larger requests will be rejected.
Environment variable: LODESTAR_MAX_REQUEST_SIZE",
                    )
                    .value_parser(clap::value_parser!(usize)),
            )
            .arg(
                Arg::new("log_level")
                    .long("log-level")
                    .value_name("LEVEL")
                    .help("Logging level")
                    .long_help(
                        "Set the logging level. Valid values: error, warn, info, debug, trace
Environment variable: RUST_LOG",
                    )
                    .value_parser(["error", "warn", "info", "debug", "trace"]),
            )
            .arg(
                Arg::new("help_env")
                    .long("help-env")
                    .help("Show all environment variables")
                    .action(ArgAction::SetTrue),
            )
            .get_matches();

        if matches.get_flag("help_env") {
            Self::print_env_help();
            std::process::exit(0);
        }

        Self {
            host: matches.get_one::<String>("host").cloned(),
            port: matches.get_one::<u16>("port").copied(),
            config_file: matches.get_one::<PathBuf>("config").cloned(),
            snapshot_file: matches.get_one::<PathBuf>("snapshot").cloned(),
            max_request_size: matches.get_one::<usize>("max_request_size").copied(),
            log_level: matches.get_one::<String>("log_level").cloned(),
        }
    }

    fn print_env_help() {
        println!("Lodestar Server Environment Variables");
        println!("=====================================");
        println!();
        println!("Server:");
        println!("  LODESTAR_HOST                     - Bind address (default: 0.0.0.0)");
        println!("  LODESTAR_PORT                     - Server port (default: 3000)");
        println!("  LODESTAR_MAX_REQUEST_SIZE         - Max request body size in bytes (default: 2MB)");
        println!("  LODESTAR_CONFIG_FILE              - Engine configuration file");
        println!("  LODESTAR_SNAPSHOT_FILE            - Workspace snapshot loaded at startup");
        println!();
        println!("Engine (nested keys use a double underscore):");
        println!("  LODESTAR_RETRIEVAL__DEFAULT_LIMIT - Results per query without a limit");
        println!("  LODESTAR_RERANK__TIMEOUT          - Rerank budget, e.g. 30ms");
        println!("  LODESTAR_ML__EMBEDDING__SERVICE_URL - Remote embedding endpoint");
        println!();
        println!("Logging:");
        println!("  RUST_LOG                          - Log filter (error, warn, info, debug, trace)");
        println!();
        println!("Note: Command line arguments take precedence over environment variables.");
    }
}
