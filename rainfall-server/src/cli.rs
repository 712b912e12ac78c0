use std::{
    io::Read,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use rainfall_core::{Config, PredictError, PredictionResponse, PredictionService};

use crate::{http, logging};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "rainfall", version, about = "Rainfall prediction service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load the classifier and serve `POST /predict`.
    Serve(ServeArgs),

    /// Write the default configuration file to the platform config directory.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },

    /// Classify a single JSON record and print the response body.
    Predict {
        /// JSON file with the nine measurements, or "-" for stdin.
        #[arg(long, short)]
        input: PathBuf,

        #[command(flatten)]
        source: ConfigSource,
    },
}

#[derive(Debug, Args)]
pub struct ConfigSource {
    /// Config file; defaults to the platform config path.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Classifier artifact, overriding `[model] path`.
    #[arg(long)]
    model: Option<PathBuf>,
}

impl ConfigSource {
    fn load(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load_from(path)?,
            None => Config::load()?,
        };
        if let Some(model) = &self.model {
            config.model.path = model.clone();
        }
        Ok(config)
    }
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    #[command(flatten)]
    source: ConfigSource,

    /// Listen address, overriding `[server] host`.
    #[arg(long)]
    host: Option<String>,

    /// Listen port, overriding `[server] port`.
    #[arg(long)]
    port: Option<u16>,
}

impl ServeArgs {
    fn config(&self) -> Result<Config> {
        let mut config = self.source.load()?;
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        Ok(config)
    }
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Serve(args) => serve(args.config()?).await,
            Command::InitConfig { force } => {
                let path = Config::config_file_path()?;
                init_config_at(&path, force)?;
                println!("Wrote default configuration to {}", path.display());
                Ok(())
            }
            Command::Predict { input, source } => {
                println!("{}", predict_once(&input, &source.load()?)?);
                Ok(())
            }
        }
    }
}

async fn serve(config: Config) -> Result<()> {
    logging::init(&config.logging.level);

    // Loaded exactly once; the process never serves without it.
    let service = PredictionService::from_model_path(&config.model.path)
        .context("Refusing to start without a classifier")?;

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    tracing::info!(
        %addr,
        model = %config.model.path.display(),
        kind = %service.classifier().kind(),
        "serving rainfall predictions"
    );

    axum::serve(listener, http::build_app(Arc::new(service)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "cannot listen for Ctrl-C; running until killed");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

fn init_config_at(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "Config file already exists: {}\n\
             Hint: pass --force to overwrite it.",
            path.display()
        );
    }

    Config::default().save_to(path)
}

/// Classify one record and return the response body.
fn predict_once(input: &Path, config: &Config) -> Result<String> {
    let body = read_input(input)?;
    let service = PredictionService::from_model_path(&config.model.path)?;

    match service.predict_body(&body) {
        Ok(prediction) => {
            let response = PredictionResponse::from(prediction);
            Ok(serde_json::to_string(&response)?)
        }
        Err(PredictError::Validation(err)) => {
            println!("{}", serde_json::to_string_pretty(&err.to_detail())?);
            bail!("Input failed validation: {err}")
        }
        Err(err) => Err(err.into()),
    }
}

fn read_input(input: &Path) -> Result<Vec<u8>> {
    if input == Path::new("-") {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("Failed to read input from stdin")?;
        return Ok(buf);
    }

    std::fs::read(input).with_context(|| format!("Failed to read input file: {}", input.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("arguments should parse")
    }

    #[test]
    fn serve_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[server]\nhost = \"0.0.0.0\"\nport = 9000\n\n[model]\npath = \"from-file.json\"\n",
        )
        .unwrap();

        let cli = parse(&[
            "rainfall",
            "serve",
            "--config",
            path.to_str().unwrap(),
            "--port",
            "8080",
            "--model",
            "override.json",
        ]);
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };

        let config = args.config().unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.model.path, PathBuf::from("override.json"));
    }

    #[test]
    fn explicit_missing_config_is_an_error() {
        let cli = parse(&["rainfall", "serve", "--config", "/nonexistent/rainfall.toml"]);
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };

        let err = args.config().unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn predict_requires_input() {
        assert!(Cli::try_parse_from(["rainfall", "predict"]).is_err());
    }

    /// Rain exactly when humidity exceeds 80.
    fn humidity_model(dir: &Path) -> Config {
        let model = dir.join("model.json");
        std::fs::write(
            &model,
            serde_json::json!({
                "feature_names": rainfall_core::FEATURE_NAMES,
                "model": {
                    "type": "logistic_regression",
                    "classes": [0, 1],
                    "coefficients": [0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0],
                    "intercept": -80.0
                }
            })
            .to_string(),
        )
        .unwrap();

        let mut config = Config::default();
        config.model.path = model;
        config
    }

    fn write_record(dir: &Path, humidity: f64) -> PathBuf {
        let input = dir.join(format!("record-{humidity}.json"));
        let record = serde_json::json!({
            "pressure": 1015.0,
            "max_temp": 30.0,
            "temparature": 25.0,
            "min_temp": 20.0,
            "humidity": humidity,
            "cloud": 40.0,
            "sunshine": 5.0,
            "winddirection": 180.0,
            "windspeed": 10.0
        });
        std::fs::write(&input, record.to_string()).unwrap();
        input
    }

    #[test]
    fn predict_once_prints_response_body() {
        let dir = tempfile::tempdir().unwrap();
        let config = humidity_model(dir.path());

        let dry = predict_once(&write_record(dir.path(), 60.0), &config).unwrap();
        assert_eq!(dry, r#"{"prediction":"No Rain"}"#);

        let wet = predict_once(&write_record(dir.path(), 95.0), &config).unwrap();
        assert_eq!(wet, r#"{"prediction":"Rain"}"#);
    }

    #[test]
    fn predict_once_rejects_invalid_record() {
        let dir = tempfile::tempdir().unwrap();
        let config = humidity_model(dir.path());
        let input = dir.path().join("input.json");
        std::fs::write(&input, r#"{"pressure": 0}"#).unwrap();

        let err = predict_once(&input, &config).unwrap_err();
        assert!(err.to_string().contains("Input failed validation"));
    }

    #[test]
    fn init_config_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rainfall").join("config.toml");

        init_config_at(&path, false).expect("first write should succeed");

        assert_eq!(Config::load_from(&path).unwrap(), Config::default());
    }

    #[test]
    fn init_config_keeps_existing_file_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nport = 9000\n").unwrap();

        let err = init_config_at(&path, false).unwrap_err();
        assert!(err.to_string().contains("Config file already exists"));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "[server]\nport = 9000\n"
        );
    }

    #[test]
    fn init_config_force_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nport = 9000\n").unwrap();

        init_config_at(&path, true).expect("--force should overwrite");

        assert_eq!(Config::load_from(&path).unwrap(), Config::default());
    }

    #[test]
    fn predict_once_needs_a_model() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.json");
        std::fs::write(&input, "{}").unwrap();

        let mut config = Config::default();
        config.model.path = dir.path().join("missing.json");

        let err = predict_once(&input, &config).unwrap_err();
        assert!(err.to_string().contains("Failed to read model artifact"));
    }
}
