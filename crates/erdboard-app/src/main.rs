//! Command-line entry point.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use erdboard_app::{App, AppConfig, AppError, AppResult, parse_script};

/// Replay an input script against a diagram and write the result
#[derive(Parser)]
#[command(name = "erdboard")]
#[command(about = "Headless host for the erdboard diagram canvas")]
struct Cli {
    /// Event script, one JSON event per line ("-" reads stdin)
    script: PathBuf,

    /// Export file to start from (default: empty diagram)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Where to write the final document (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory that receives export downloads
    #[arg(long, default_value = ".")]
    export_dir: PathBuf,

    /// File to hand over when the script asks to import
    #[arg(long)]
    import_file: Option<PathBuf>,

    /// Engine settings as JSON
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Display name shown to collaborators
    #[arg(long, default_value = "")]
    user: String,
}

fn read_script(path: &Path) -> AppResult<String> {
    let result = if path.as_os_str() == "-" {
        let mut source = String::new();
        std::io::stdin().read_to_string(&mut source).map(|_| source)
    } else {
        std::fs::read_to_string(path)
    };
    result.map_err(|source| AppError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn run(cli: Cli) -> AppResult<()> {
    let mut config = AppConfig {
        export_dir: cli.export_dir,
        import_file: cli.import_file,
        user_name: cli.user,
        ..AppConfig::default()
    };
    if let Some(path) = &cli.config {
        config.load_engine_config(path)?;
    }

    let mut app = App::new(config);
    if let Some(path) = &cli.input {
        app.open(path)?;
    }

    let events = parse_script(&read_script(&cli.script)?)?;
    log::info!("Replaying {} events", events.len());
    app.run(events)?;

    match &cli.output {
        Some(path) => app.save(path)?,
        None => println!("{}", app.document_json()?),
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            eprintln!("erdboard: {e}");
            ExitCode::FAILURE
        }
    }
}
