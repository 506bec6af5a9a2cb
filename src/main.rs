use clap::{Parser, Subcommand, ValueEnum};
use fern::Dispatch;
use fern::colors::{Color, ColoredLevelConfig};
use log::{LevelFilter, info};
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use turtledb::{Config, JsonFileStorage, Statement, Store, Value};

#[derive(Parser)]
#[command(name = "turtledb", version, about = "Query the user account store")]
struct Cli {
    /// Configuration file (defaults to ./turtledb.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Backing JSON file, overrides the configuration
    #[arg(short, long)]
    data: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run one statement with positional parameters
    Query {
        sql: String,
        params: Vec<String>,
        #[arg(long, value_enum, default_value_t = Mode::Auto)]
        mode: Mode,
    },
    /// Interactive prompt. Parameters follow a `|`: `SELECT ... WHERE id = ? | 1`
    Repl,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Auto,
    Get,
    All,
    Run,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(data) = cli.data {
        config.store.path = data;
    }

    if let Err(e) = init_logger(config.logging.level.0) {
        eprintln!("Error: failed to initialize logger: {}", e);
        return ExitCode::FAILURE;
    }
    info!("Using store file {}", config.store.path.display());

    let mut store = Store::from_config(&config.store);

    match cli.command {
        Some(Command::Query { sql, params, mode }) => {
            let params: Vec<Value> = params.iter().map(|p| parse_param(p)).collect();
            match process_query(&mut store, &sql, &params, mode) {
                Ok(output) => {
                    println!("{}", output);
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("Error: {}", e);
                    ExitCode::FAILURE
                }
            }
        }
        Some(Command::Repl) => repl(&mut store),
        None if io::stdin().is_terminal() => repl(&mut store),
        None => batch(&mut store),
    }
}

fn repl(store: &mut Store<JsonFileStorage>) -> ExitCode {
    println!("turtledb - user account store");
    println!("Type 'exit' to quit\n");

    let stdin = io::stdin();
    loop {
        print!("turtledb> ");
        if io::stdout().flush().is_err() {
            return ExitCode::FAILURE;
        }

        let mut input = String::new();
        match stdin.read_line(&mut input) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        }

        let line = input.trim();
        if line.eq_ignore_ascii_case("exit") {
            println!("Goodbye!");
            break;
        }
        if line.is_empty() {
            continue;
        }

        match run_line(store, line) {
            Ok(result) => println!("{}", result),
            Err(e) => eprintln!("Error: {}", e),
        }
    }
    ExitCode::SUCCESS
}

/// Non-interactive mode: one statement per stdin line.
fn batch(store: &mut Store<JsonFileStorage>) -> ExitCode {
    let mut status = ExitCode::SUCCESS;
    for line in io::stdin().lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match run_line(store, line) {
            Ok(result) => println!("{}", result),
            Err(e) => {
                eprintln!("Error: {}", e);
                status = ExitCode::FAILURE;
            }
        }
    }
    status
}

fn run_line(store: &mut Store<JsonFileStorage>, line: &str) -> turtledb::Result<String> {
    let (sql, params): (&str, Vec<Value>) = match line.split_once('|') {
        Some((sql, params)) => (sql, params.split(',').map(parse_param).collect()),
        None => (line, Vec::new()),
    };
    process_query(store, sql, &params, Mode::Auto)
}

fn process_query(
    store: &mut Store<JsonFileStorage>,
    sql: &str,
    params: &[Value],
    mode: Mode,
) -> turtledb::Result<String> {
    let mode = match mode {
        Mode::Auto => match turtledb::prepare(sql)? {
            Statement::Select(_) => Mode::All,
            _ => Mode::Run,
        },
        other => other,
    };

    match mode {
        Mode::Get => match store.get(sql, params)? {
            Some(record) => Ok(serde_json::to_string_pretty(&record)?),
            None => Ok("(not found)".to_string()),
        },
        Mode::All | Mode::Auto => {
            let rows = store.all(sql, params)?;
            Ok(serde_json::to_string_pretty(&rows)?)
        }
        Mode::Run => {
            let result = store.run(sql, params)?;
            Ok(match result.last_insert_id {
                Some(id) => format!("1 row(s) inserted (id {})", id),
                None => format!("{} row(s) updated", result.changes),
            })
        }
    }
}

fn parse_param(raw: &str) -> Value {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("null") {
        Value::Null
    } else if let Ok(n) = raw.parse::<i128>() {
        Value::Integer(n)
    } else {
        Value::Text(raw.to_string())
    }
}

/// Log to stderr so query output on stdout stays machine readable.
fn init_logger(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    let colored = io::stderr().is_terminal();
    let colors = ColoredLevelConfig::new()
        .trace(Color::Magenta)
        .debug(Color::Blue)
        .info(Color::Green)
        .warn(Color::Yellow)
        .error(Color::Red);

    Dispatch::new()
        .level(level)
        .format(move |out, message, record| {
            let date = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
            if colored {
                out.finish(format_args!(
                    "[{} - {}] {} [{}]",
                    date,
                    colors.color(record.level()),
                    message,
                    record.target()
                ))
            } else {
                out.finish(format_args!(
                    "[{} - {}] {} [{}]",
                    date,
                    record.level(),
                    message,
                    record.target()
                ))
            }
        })
        .chain(io::stderr())
        .apply()
}
