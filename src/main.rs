//! `main.rs` contains the command-line interface for pancite. It collects the
//! options, sets up the logger, assembles the configuration, and runs the
//! filter on standard input.

use ansi_term::Color;
use clap::{crate_version, App, Arg, SubCommand};
use pancite::{
    config::{build_config, Config},
    fs::{load_file, new_config_ron},
};
use slog::{debug, error, o, Drain, Level};
use std::{
    fmt::Display,
    fs::OpenOptions,
    io::{self, Read, Write},
    path::Path,
    process::ExitCode,
    sync::Mutex,
};

fn main() -> ExitCode {
    // Get the command-line arguments and options
    let matches = App::new("pancite")
        .version(crate_version!())
        .about("A Pandoc filter that formats citations with a CSL engine")
        .arg(
            Arg::with_name("format")
                .value_name("FORMAT")
                .help("The target format (passed by Pandoc)")
                .index(1)
                .required(false),
        )
        .arg(
            Arg::with_name("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("A RON configuration file"),
        )
        .arg(
            Arg::with_name("engine")
                .short('e')
                .long("engine")
                .value_name("COMMAND")
                .help("The citation engine command (overrides the configuration)"),
        )
        .arg(
            Arg::with_name("locales")
                .short('l')
                .long("locales")
                .value_name("DIR")
                .help("The directory holding locales-<lang>.xml"),
        )
        .arg(
            Arg::with_name("debug")
                .short('d')
                .long("debug")
                .takes_value(false)
                .help("Outputs debug log to pancite-log.json")
                .hidden_short_help(true)
                .hidden_long_help(true),
        )
        .arg(
            Arg::with_name("verbose")
                .short('v')
                .long("verbose")
                .value_name("NUMBER")
                .help("Verbosity level between 0 and 5")
                .hidden_short_help(true)
                .hidden_long_help(true)
                .default_value("1"),
        )
        .subcommand(
            SubCommand::with_name("init-config")
                .about("For creating a blank configuration file (pancite.ron)"),
        )
        .get_matches();

    // Setup the logger.
    //
    // The terminal log goes to stderr; stdout carries the document. If the
    // debug flag is set, the log is also written to `pancite-log.json`.
    let debug = matches.is_present("debug");
    let min_log_level = match matches.value_of("verbose") {
        Some("0") => Level::Critical,
        Some("1") => Level::Error,
        Some("2") => Level::Warning,
        Some("3") => Level::Info,
        Some("4") => Level::Debug,
        Some("5") => Level::Trace,
        _ => Level::Info,
    };

    let term_decorator = slog_term::TermDecorator::new().stderr().build();
    let term_drain = slog_term::CompactFormat::new(term_decorator).build().fuse();
    let term_drain = term_drain.filter_level(min_log_level).fuse();
    let term_drain = slog_async::Async::new(term_drain).build().fuse();

    let _guard: slog_scope::GlobalLoggerGuard = if debug {
        // Setup the file AND terminal loggers
        let log_file = match OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open("./pancite-log.json")
        {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "{} Cannot open pancite-log.json: {}",
                    Color::Red.paint("ERRO"),
                    e
                );
                return ExitCode::FAILURE;
            }
        };
        let file_drain = slog_json::Json::new(log_file)
            .set_pretty(true)
            .add_default_keys()
            .build()
            .fuse();
        let file_drain = file_drain.filter_level(Level::Trace).fuse();
        let dual_logger = slog::Logger::root(
            Mutex::new(slog::Duplicate(term_drain, file_drain)).fuse(),
            o!("version" => crate_version!()),
        );
        slog_scope::set_global_logger(dual_logger)
    } else {
        // Setup just the terminal logger
        let term_logger = slog::Logger::root(term_drain, o!("version" => crate_version!()));
        slog_scope::set_global_logger(term_logger)
    };

    debug!(slog_scope::logger(), "Logger setup");

    // Subcommands
    if matches.subcommand_name() == Some("init-config") {
        debug!(slog_scope::logger(), "Creating blank configuration file");
        return match new_config_ron(Path::new("pancite.ron")) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => fail("Configuration file error", e),
        };
    }

    if let Some(format) = matches.value_of("format") {
        debug!(slog_scope::logger(), "Target format: {}", format);
    }

    // Setup the configuration.
    let config = match matches.value_of("config") {
        Some(path) => {
            match slog_scope::scope(&slog_scope::logger().new(o!("fn" => "build_config()")), || {
                build_config(&load_file(Path::new(path))?)
            }) {
                Ok(c) => c,
                Err(e) => return fail("Configuration error", e),
            }
        }
        None => Config::default(),
    }
    .with_overrides(matches.value_of("engine"), matches.value_of("locales"));
    debug!(slog_scope::logger(), "Configuration: {:?}", config);

    // Pandoc sends the whole document before reading anything back.
    let mut input = String::new();
    if let Err(e) = io::stdin().read_to_string(&mut input) {
        return fail("Input error", e);
    }

    // Run the program.
    let output = match pancite::pancite(&config, &input) {
        Ok(o) => o,
        Err(e) => return fail("Citation error", e),
    };

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    match handle
        .write_all(output.as_bytes())
        .and_then(|_| handle.flush())
    {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail("Output error", e),
    }
}

/// Log and print a fatal error.
fn fail(context: &str, e: impl Display) -> ExitCode {
    error!(slog_scope::logger(), "{}: {}", context, e);
    eprintln!("{} {}: {}", Color::Red.paint("ERRO"), context, e);
    ExitCode::FAILURE
}
