use std::env;
use std::process::ExitCode;

use nvi_server::config::loader::{DEFAULT_CONFIG_FILE, load_config};
use nvi_server::{ServerBuilder, build_app, observability};

/// Command line of the server binary.
#[derive(Debug, Default)]
struct Cli {
    /// Explicit `--config <path>` or `--config=<path>`.
    config: Option<String>,
    /// Load configuration and trust anchors, then exit.
    check_config: bool,
}

impl Cli {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self, String> {
        let mut cli = Self::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => {
                    let path = args.next().ok_or("--config requires a path")?;
                    cli.config = Some(path);
                }
                "--check-config" => cli.check_config = true,
                other => match other.strip_prefix("--config=") {
                    Some(path) if !path.is_empty() => cli.config = Some(path.to_string()),
                    _ => return Err(format!("unknown argument '{other}'")),
                },
            }
        }
        Ok(cli)
    }

    /// The config path and where it came from: the command line, then
    /// `NVI_CONFIG`, then `nvi.toml`.
    fn config_path(&self) -> (String, &'static str) {
        if let Some(path) = &self.config {
            return (path.clone(), "command line");
        }
        match env::var("NVI_CONFIG") {
            Ok(path) if !path.is_empty() => (path, "NVI_CONFIG"),
            _ => (DEFAULT_CONFIG_FILE.to_string(), "default"),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    let cli = match Cli::parse(env::args().skip(1)) {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("{e}\nusage: nvi-server [--config <path>] [--check-config]");
            return ExitCode::from(2);
        }
    };

    let (config_path, source) = cli.config_path();
    let cfg = match load_config(Some(&config_path)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error ({config_path}): {e}");
            return ExitCode::from(2);
        }
    };

    observability::init_tracing(&cfg.logging);
    tracing::info!(
        path = %config_path,
        source,
        storage = ?cfg.storage.backend,
        nested_assertions = cfg.auth.nested_token.ca_bundle.is_some(),
        trust_path = cfg.auth.trust.direct_certificate_ca.is_some(),
        "Configuration loaded"
    );

    if cli.check_config {
        return match build_app(&cfg).await {
            Ok(_) => {
                println!("{config_path}: configuration and trust anchors OK");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{config_path}: {e:#}");
                ExitCode::from(2)
            }
        };
    }

    let server = match ServerBuilder::new().with_config(cfg).build().await {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Server initialization failed: {e:#}");
            return ExitCode::from(2);
        }
    };

    if let Err(err) = server.run().await {
        tracing::error!(error = %err, "Server stopped with an error");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
