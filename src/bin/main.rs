//! relmap CLI - Compile JSON query requests to SQL
//!
//! Usage:
//!   relmap compile --query <query.json> [--schema <schema.toml>] [--dialect <dialect>] [--inline]
//!   relmap check [--schema <schema.toml>]
//!
//! Examples:
//!   relmap compile --schema schema.toml --query employees.json --dialect tsql
//!   cat employees.json | relmap compile --schema schema.toml --query - --inline
//!   relmap check --schema schema.toml

use clap::{Parser, Subcommand, ValueEnum};
use relmap::builder::QueryRequest;
use relmap::config::Settings;
use relmap::schema::{load_schema_file, SchemaRegistry};
use relmap::sql::Dialect;
use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "relmap")]
#[command(about = "relmap - Compile include trees and relation filters to multi-dialect SQL")]
#[command(version)]
struct Cli {
    /// Config file (defaults to RELMAP_CONFIG, ./relmap.toml, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a JSON query request to SQL
    Compile {
        /// Path to the query request JSON, or `-` for stdin
        #[arg(short, long)]
        query: PathBuf,

        /// Schema TOML file (defaults to `schema.path` from the config)
        #[arg(short, long)]
        schema: Option<PathBuf>,

        /// SQL dialect to generate (defaults to `dialect` from the config)
        #[arg(short, long)]
        dialect: Option<DialectArg>,

        /// Print SQL with parameters inlined instead of placeholders
        #[arg(long)]
        inline: bool,
    },

    /// Validate a schema file
    Check {
        /// Schema TOML file (defaults to `schema.path` from the config)
        #[arg(short, long)]
        schema: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum DialectArg {
    Postgres,
    Mysql,
    Sqlite,
    Tsql,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Postgres => Dialect::Postgres,
            DialectArg::Mysql => Dialect::MySql,
            DialectArg::Sqlite => Dialect::Sqlite,
            DialectArg::Tsql => Dialect::TSql,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    };
    let settings = match settings {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Config error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Compile {
            query,
            schema,
            dialect,
            inline,
        } => cmd_compile(&settings, query, schema, dialect, inline),
        Commands::Check { schema } => cmd_check(&settings, schema),
    }
}

fn load_registry(settings: &Settings, schema: Option<PathBuf>) -> Result<SchemaRegistry, String> {
    let path = match schema {
        Some(path) => path,
        None => settings
            .schema_path()
            .map_err(|e| format!("Config error: {}", e))?
            .ok_or_else(|| "No schema given: pass --schema or set schema.path".to_string())?,
    };
    load_schema_file(&path).map_err(|e| format!("Schema error in '{}': {}", path.display(), e))
}

fn read_request(path: &PathBuf) -> Result<String, String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| format!("Error reading stdin: {}", e))?;
        return Ok(buf);
    }
    fs::read_to_string(path).map_err(|e| format!("Error reading file '{}': {}", path.display(), e))
}

fn cmd_compile(
    settings: &Settings,
    query: PathBuf,
    schema: Option<PathBuf>,
    dialect: Option<DialectArg>,
    inline: bool,
) -> ExitCode {
    let registry = match load_registry(settings, schema) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let dialect = match dialect {
        Some(d) => d.into(),
        None => match settings.dialect_type() {
            Ok(d) => d,
            Err(e) => {
                eprintln!("Config error: {}", e);
                return ExitCode::FAILURE;
            }
        },
    };
    let source = match read_request(&query) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let builder = match QueryRequest::from_json_str(&source)
        .and_then(|request| request.into_builder(&registry))
    {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Query error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if inline {
        return match builder.to_sql(dialect) {
            Ok(sql) => {
                println!("{}", sql);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Compilation error: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    match builder.compile(dialect) {
        Ok(compiled) => {
            println!("{}", compiled.sql);
            match serde_json::to_string(&compiled.params) {
                Ok(params) => println!("-- params: {}", params),
                Err(e) => {
                    eprintln!("Error serializing parameters: {}", e);
                    return ExitCode::FAILURE;
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Compilation error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_check(settings: &Settings, schema: Option<PathBuf>) -> ExitCode {
    match load_registry(settings, schema) {
        Ok(registry) => {
            println!("OK: {} tables", registry.len());
            for table in registry.get_all() {
                println!(
                    "  - {} ({} columns, {} relations)",
                    table.name,
                    table.columns.len(),
                    table.relations.len()
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
