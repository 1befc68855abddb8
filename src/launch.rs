use std::io::IsTerminal;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use argh::FromArgs;
use exitcode::ExitCode;
use http_sd::config::{CancelPolicy, Config, ConfigError};
use http_sd::coordinator::{Consumer, Coordinator};
use http_sd::writer::FileSdWriter;
use http_sd::{server, signal, trace};
use metrics::Registry;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(FromArgs)]
#[argh(
    description = "Generate file_sd target files from HTTP service discovery endpoints",
    help_triggers("-h", "--help")
)]
pub struct RootCommand {
    #[argh(switch, short = 'v', description = "show version")]
    version: bool,

    #[argh(
        option,
        short = 'l',
        default = "\"info\".to_string()",
        description = "log level"
    )]
    log_level: String,

    #[argh(switch, description = "output logs in JSON")]
    log_json: bool,

    #[argh(option, short = 'c', description = "read configuration from a YAML file")]
    config: Option<PathBuf>,

    #[argh(
        option,
        long = "api-url",
        description = "the url the HTTP service discovery API is listening on, repeat it for more endpoints"
    )]
    api_urls: Vec<String>,

    #[argh(
        option,
        long = "output-file",
        description = "output file for file_sd compatible target file, one for each api url"
    )]
    output_files: Vec<PathBuf>,

    #[argh(option, description = "interval to re-read the instance list, in seconds")]
    refresh_interval: Option<u64>,

    #[argh(
        option,
        description = "timeout of one request in seconds, default to the refresh interval"
    )]
    request_timeout: Option<u64>,

    #[argh(option, description = "the address to expose metrics on")]
    metrics_addr: Option<SocketAddr>,

    #[argh(option, description = "the path to expose metrics on")]
    metrics_path: Option<String>,

    #[argh(
        option,
        description = "what happens to the other endpoints when one stops, \"independent\" or \"siblings\""
    )]
    cancel_policy: Option<CancelPolicy>,
}

impl RootCommand {
    #![allow(clippy::print_stdout)]
    fn show_version(&self) {
        println!("http-sd {}", env!("CARGO_PKG_VERSION"));
    }

    /// Values from the command line win over the ones from the config file.
    fn load_config(&self) -> Result<Config, ConfigError> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };

        if !self.api_urls.is_empty() {
            config.api_urls = self.api_urls.clone();
        }
        if !self.output_files.is_empty() {
            config.output_files = self.output_files.clone();
        }
        if let Some(interval) = self.refresh_interval {
            config.refresh_interval = interval;
        }
        if let Some(timeout) = self.request_timeout {
            config.request_timeout = Some(timeout);
        }
        if let Some(addr) = self.metrics_addr {
            config.metrics.address = addr;
        }
        if let Some(path) = &self.metrics_path {
            config.metrics.path = path.clone();
        }
        if let Some(policy) = self.cancel_policy {
            config.cancel_policy = policy;
        }

        Ok(config)
    }

    fn log_levels(&self) -> String {
        std::env::var("HTTP_SD_LOG").unwrap_or_else(|_| match self.log_level.as_str() {
            "off" => "off".to_string(),
            level => format!("http_sd={level}"),
        })
    }

    pub fn run(&self) -> Result<(), ExitCode> {
        if self.version {
            self.show_version();
            return Ok(());
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .thread_name("http-sd-worker")
            .enable_io()
            .enable_time()
            .build()
            .map_err(|_err| exitcode::OSERR)?;

        let color = std::io::stdout().is_terminal();
        if trace::init(color, self.log_json, &self.log_levels()).is_err() {
            return Err(exitcode::SOFTWARE);
        }

        let config = self.load_config().map_err(handle_config_error)?;

        runtime.block_on(async move {
            let registry = Registry::new();
            let coordinator = Coordinator::new(&config, &registry).map_err(handle_config_error)?;

            let listener = TcpListener::bind(config.metrics.address)
                .await
                .map_err(|err| {
                    error!(
                        message = "bind metrics address failed",
                        address = %config.metrics.address,
                        %err
                    );

                    exitcode::SOFTWARE
                })?;

            info!(
                message = "Start http-sd",
                sources = coordinator.sources().len(),
                metrics = %config.metrics.address,
                cancel_policy = ?config.cancel_policy,
            );

            let root = CancellationToken::new();
            let server = tokio::spawn(server::serve(
                listener,
                config.metrics.path.clone(),
                registry,
                root.clone(),
            ));

            let running = coordinator.spawn(root.clone(), |source| -> Box<dyn Consumer> {
                Box::new(FileSdWriter::new(&source.output_file))
            });

            let result = tokio::select! {
                result = signal::shutdown() => result.map(|_signal| ()).map_err(|err| {
                    error!(message = "listen for signals failed", %err);

                    exitcode::SOFTWARE
                }),
                _ = root.cancelled() => {
                    warn!(message = "All discoverers cancelled, shutting down");

                    Ok(())
                }
            };

            running.shutdown_all();
            running.wait().await;
            if let Err(err) = server.await {
                error!(message = "metrics server failed", %err);
            }

            info!(message = "http-sd stopped");

            result
        })?;

        runtime.shutdown_timeout(Duration::from_secs(5));

        Ok(())
    }
}

fn handle_config_error(err: ConfigError) -> ExitCode {
    error!(message = "configuration error", %err);

    exitcode::CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> RootCommand {
        RootCommand::from_args(&["http-sd"], args).unwrap()
    }

    #[test]
    fn defaults() {
        let cmd = parse(&[]);
        assert_eq!(cmd.load_config().unwrap(), Config::default());
        assert_eq!(cmd.log_level, "info");
    }

    #[test]
    fn flags_override_file() {
        let dir = testify::temp::temp_dir();
        let path = dir.join("http-sd.yaml");
        std::fs::write(
            &path,
            "api_urls: [http://file.example.com]\noutput_files: [file.json]\nrefresh_interval: 10\n",
        )
        .unwrap();
        let path = path.to_string_lossy().to_string();

        let cmd = parse(&[
            "-c",
            &path,
            "--api-url",
            "http://a.example.com",
            "--api-url",
            "http://b.example.com",
            "--output-file",
            "a.json",
            "--output-file",
            "b.json",
            "--metrics-addr",
            "127.0.0.1:9999",
            "--cancel-policy",
            "siblings",
        ]);

        let config = cmd.load_config().unwrap();
        assert_eq!(
            config.api_urls,
            vec!["http://a.example.com", "http://b.example.com"]
        );
        assert_eq!(
            config.output_files,
            vec![PathBuf::from("a.json"), PathBuf::from("b.json")]
        );
        // not overridden, so the file wins
        assert_eq!(config.refresh_interval, 10);
        assert_eq!(
            config.metrics.address,
            "127.0.0.1:9999".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(config.cancel_policy, CancelPolicy::Siblings);
    }

    #[test]
    fn invalid_cancel_policy() {
        assert!(RootCommand::from_args(&["http-sd"], &["--cancel-policy", "all"]).is_err());
    }
}
