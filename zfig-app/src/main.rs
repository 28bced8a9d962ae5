use std::path::PathBuf;

use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};
use zfig_config::{AppSettings, ConfigError};

mod cli;

use cli::CliOptions;

const USAGE: &str = "用法：zfig <图纸.dxf> [--unit file|mm|cm|inch] [--accuracy X] \
[--max-dist X|none] [--run \"命令 参数\"]... [--config settings.toml] [--finalize] [--output figure.json]";

fn main() {
    let options = match CliOptions::parse(std::env::args().skip(1)) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("{message}");
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    };

    let settings = load_configuration(options.config.clone());
    init_logging(&settings);
    info!("启动 zfig 图形导入");

    if let Err(message) = cli::run(&options, settings.import) {
        error!(error = %message, "导入失败");
        std::process::exit(1);
    }
}

fn load_configuration(override_path: Option<PathBuf>) -> AppSettings {
    match override_path {
        Some(path) => AppSettings::from_file(&path).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "加载指定配置失败，使用默认配置");
            AppSettings::default()
        }),
        None => match AppSettings::discover() {
            Ok(settings) => settings,
            Err(err) => {
                match &err {
                    ConfigError::Io { path, .. }
                    | ConfigError::Parse { path, .. }
                    | ConfigError::Invalid { path, .. } => {
                        warn!(path = %path.display(), error = %err, "加载默认配置失败，使用内建默认值");
                    }
                    _ => {
                        warn!(error = %err, "加载默认配置失败，使用内建默认值");
                    }
                }
                AppSettings::default()
            }
        },
    }
}

fn init_logging(settings: &AppSettings) {
    let filter = EnvFilter::try_new(settings.logging.level.clone())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
