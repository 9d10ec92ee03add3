use anyhow::Result;
use clap::Parser;
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use xml_sentry::ScanError;

/// xmlsentry — scan XML files for XXE/XEE constructs before parsing.
///
/// Exits non-zero if any file was blocked or could not be read. Malformed
/// XML is reported but is not treated as a security finding.
#[derive(Debug, Parser)]
#[command(name = "xmlsentry")]
#[command(version)]
struct Cli {
    /// Files to scan
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Suppress per-file output, report via exit code only
    #[arg(short, long, default_value_t = false)]
    quiet: bool,

    /// Emit one JSON object per file instead of plain text
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut failed = false;

    for path in &cli.files {
        let (status, detail) = match xml_sentry::scan_file(path) {
            Ok(_) => ("clean", None),
            Err(ScanError::Violation(v)) => {
                failed = true;
                ("blocked", Some(v.to_string()))
            }
            Err(ScanError::Malformed(e)) => ("malformed", Some(e.to_string())),
            Err(e @ ScanError::Io { .. }) => {
                failed = true;
                ("error", Some(e.to_string()))
            }
        };

        if cli.quiet {
            continue;
        }
        if cli.json {
            let v = json!({
                "file": path.display().to_string(),
                "status": status,
                "detail": detail,
            });
            println!("{v}");
        } else {
            match detail {
                Some(d) => println!("{}: {status}: {d}", path.display()),
                None => println!("{}: {status}", path.display()),
            }
        }
    }

    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
