use std::fs;
use std::path::PathBuf;

use tracing::{info, warn};
use zfig_config::ImportSettings;
use zfig_engine::command::{CommandBus, CommandContext, CommandRequest};
use zfig_engine::errors::describe_error;
use zfig_engine::{Figure, ImportSession};

/// 命令行选项。`--unit`/`--accuracy`/`--max-dist` 会被翻译成命令总线上的命令，
/// 与 `--run` 追加的命令按出现顺序依次执行。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliOptions {
    pub drawing: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub commands: Vec<String>,
    pub finalize: bool,
    pub output: Option<PathBuf>,
}

impl CliOptions {
    pub fn parse(args: impl IntoIterator<Item = String>) -> Result<Self, String> {
        let mut options = Self::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            let mut value = |flag: &str| {
                args.next()
                    .ok_or_else(|| format!("`{flag}` 需要提供参数"))
            };
            match arg.as_str() {
                "--config" => options.config = Some(PathBuf::from(value("--config")?)),
                "--unit" => options.commands.push(format!("unit {}", value("--unit")?)),
                "--accuracy" => options
                    .commands
                    .push(format!("accuracy {}", value("--accuracy")?)),
                "--max-dist" => options
                    .commands
                    .push(format!("max_dist {}", value("--max-dist")?)),
                "--run" => options.commands.push(value("--run")?),
                "--output" => options.output = Some(PathBuf::from(value("--output")?)),
                "--finalize" => options.finalize = true,
                other if other.starts_with("--") => return Err(format!("未知参数：{other}")),
                other => {
                    if options.drawing.replace(PathBuf::from(other)).is_some() {
                        return Err(format!("只能指定一个图纸文件：{other}"));
                    }
                }
            }
        }

        if options.drawing.is_none() {
            return Err("缺少图纸文件路径".to_string());
        }
        Ok(options)
    }
}

/// 打开图纸、依次执行命令，并按需保存配置与导出图形。
pub fn run(options: &CliOptions, settings: ImportSettings) -> Result<(), String> {
    let Some(drawing) = &options.drawing else {
        return Err("缺少图纸文件路径".to_string());
    };

    let mut session = ImportSession::with_dxf(settings);
    if let Err(err) = session.set_drawing_path(drawing) {
        if !err.resets_state() {
            return Err(describe_error(&err));
        }
        // 流水线失败时仍继续，后续 `--unit` 等命令可能修复。
        warn!(path = %drawing.display(), error = %err, "首次导入失败");
    }

    let bus = CommandBus::new();
    let mut context = CommandContext {
        session: &mut session,
    };
    for line in &options.commands {
        dispatch_cli_command(&bus, line, &mut context)?;
    }

    if let Some(message) = session.last_error() {
        return Err(message.to_string());
    }

    if options.finalize {
        let mut context = CommandContext {
            session: &mut session,
        };
        dispatch_cli_command(&bus, "finalize", &mut context)?;
    }

    let Some(figure) = session.figure() else {
        return Err("没有可用的图形".to_string());
    };
    print_summary(&session, figure);

    if let Some(path) = &options.output {
        let json = serde_json::to_string_pretty(figure)
            .map_err(|err| format!("序列化图形失败：{err}"))?;
        fs::write(path, json).map_err(|err| format!("写入 {} 失败：{err}", path.display()))?;
        info!(path = %path.display(), points = figure.len(), "图形已导出");
    }
    Ok(())
}

fn dispatch_cli_command(
    bus: &CommandBus,
    line: &str,
    context: &mut CommandContext<'_>,
) -> Result<(), String> {
    let Some(request) = CommandRequest::parse(line) else {
        return Ok(());
    };
    let response = bus.dispatch(&request, context);
    if response.success {
        if let Some(message) = response.message {
            println!("[命令] {message}");
        }
        Ok(())
    } else {
        Err(response.message.unwrap_or_else(|| "未知错误".to_string()))
    }
}

fn print_summary(session: &ImportSession, figure: &Figure) {
    let config = session.config();
    println!("图形 {} ({} 个点)", figure.name, figure.len());
    println!(
        "中心=({:.3}, {:.3}), 尺寸={:.3} mm, 单位={}, 精度={}",
        figure.center.x(),
        figure.center.y(),
        figure.size,
        config.unit,
        config.accuracy
    );
    for (index, segment) in config.segments.iter().enumerate() {
        let range = figure.segment_range(index).unwrap_or_default();
        let kind = if segment.is_circle {
            "圆"
        } else if segment.curved {
            "曲线"
        } else {
            "折线"
        };
        println!(
            "  - 段 {index}: {kind}, 点 {}..{}, 反向={}, 起始角={}°",
            range.start, range.end, segment.reverse, segment.start_angle
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CliOptions, String> {
        CliOptions::parse(args.iter().map(|arg| arg.to_string()))
    }

    #[test]
    fn overrides_become_commands_in_order() {
        let options = parse(&[
            "part.dxf",
            "--unit",
            "inch",
            "--run",
            "reverse 0",
            "--max-dist",
            "none",
            "--finalize",
        ])
        .expect("options");
        assert_eq!(options.drawing, Some(PathBuf::from("part.dxf")));
        assert_eq!(options.commands, vec!["unit inch", "reverse 0", "max_dist none"]);
        assert!(options.finalize);
    }

    #[test]
    fn rejects_missing_values_and_extra_drawings() {
        assert!(parse(&["part.dxf", "--accuracy"]).is_err());
        assert!(parse(&["a.dxf", "b.dxf"]).is_err());
        assert!(parse(&["--finalize"]).is_err());
        assert!(parse(&["part.dxf", "--bogus"]).is_err());
    }
}
