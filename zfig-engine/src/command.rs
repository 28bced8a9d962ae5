use std::collections::HashMap;
use std::str::FromStr;

use zfig_config::{MaxDistOverride, UnitSelection};

use crate::errors::{EngineError, describe_error};
use crate::session::ImportSession;

#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub name: String,
    pub args: Vec<String>,
}

impl CommandRequest {
    /// 以空白分隔的一行文本构造请求，首个单词为命令名。
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let name = words.next()?.to_string();
        Some(Self {
            name,
            args: words.map(str::to_string).collect(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct CommandResponse {
    pub success: bool,
    pub message: Option<String>,
}

impl CommandResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }

    fn from_result(result: Result<(), EngineError>, message: impl Into<String>) -> Self {
        match result {
            Ok(()) => Self::ok(message),
            Err(err) => Self::err(describe_error(&err)),
        }
    }
}

pub trait CommandHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse;
}

pub struct CommandContext<'a> {
    pub session: &'a mut ImportSession,
}

pub struct CommandBus {
    handlers: HashMap<&'static str, Box<dyn CommandHandler>>,
}

impl CommandBus {
    pub fn new() -> Self {
        let mut bus = Self {
            handlers: HashMap::new(),
        };
        bus.register(ReverseCommand);
        bus.register(StartAngleCommand);
        bus.register(SwapCommand);
        bus.register(MoveCommand);
        bus.register(AccuracyCommand);
        bus.register(MaxDistCommand);
        bus.register(UnitCommand);
        bus.register(RestartCommand);
        bus.register(FinalizeCommand);
        bus.register(SelectCommand);
        bus
    }

    pub fn register<H: CommandHandler + 'static>(&mut self, handler: H) {
        self.handlers.insert(handler.name(), Box::new(handler));
    }

    pub fn dispatch(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        if let Some(handler) = self.handlers.get(request.name.as_str()) {
            handler.execute(request, context)
        } else {
            CommandResponse::err(format!("未知命令: {}", request.name))
        }
    }

    pub fn available_commands(&self) -> impl Iterator<Item = &&'static str> {
        self.handlers.keys()
    }
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}

fn arg<T: FromStr>(request: &CommandRequest, position: usize, what: &str) -> Result<T, String> {
    let raw = request
        .args
        .get(position)
        .ok_or_else(|| format!("`{}` 缺少参数：{what}", request.name))?;
    raw.parse()
        .map_err(|_| format!("`{}` 的参数 {what} 无效：{raw}", request.name))
}

fn parse_switch(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "on" | "true" | "1" | "yes" => Some(true),
        "off" | "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// `reverse <段> [on|off]`，省略开关时切换。
struct ReverseCommand;

impl CommandHandler for ReverseCommand {
    fn name(&self) -> &'static str {
        "reverse"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let index: usize = match arg(request, 0, "段序号") {
            Ok(index) => index,
            Err(message) => return CommandResponse::err(message),
        };
        let reverse = match request.args.get(1) {
            Some(raw) => match parse_switch(raw) {
                Some(value) => value,
                None => return CommandResponse::err(format!("无法识别的开关：{raw}")),
            },
            None => !context
                .session
                .config()
                .segments
                .get(index)
                .is_some_and(|segment| segment.reverse),
        };
        let result = context.session.set_segment_reverse(index, reverse);
        CommandResponse::from_result(result, format!("第 {index} 段反向：{reverse}"))
    }
}

/// `start_angle <段> <度>`
struct StartAngleCommand;

impl CommandHandler for StartAngleCommand {
    fn name(&self) -> &'static str {
        "start_angle"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let parsed = arg::<usize>(request, 0, "段序号")
            .and_then(|index| Ok((index, arg::<f64>(request, 1, "角度")?)));
        match parsed {
            Ok((index, degrees)) => CommandResponse::from_result(
                context.session.set_segment_start_angle(index, degrees),
                format!("第 {index} 段起始角设为 {degrees}°"),
            ),
            Err(message) => CommandResponse::err(message),
        }
    }
}

/// `swap <段 a> <段 b>`
struct SwapCommand;

impl CommandHandler for SwapCommand {
    fn name(&self) -> &'static str {
        "swap"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let parsed = arg::<usize>(request, 0, "段 a")
            .and_then(|a| Ok((a, arg::<usize>(request, 1, "段 b")?)));
        match parsed {
            Ok((a, b)) => CommandResponse::from_result(
                context.session.swap_segments(a, b),
                format!("已交换第 {a} 段与第 {b} 段"),
            ),
            Err(message) => CommandResponse::err(message),
        }
    }
}

/// `move <原位置> <新位置>`
struct MoveCommand;

impl CommandHandler for MoveCommand {
    fn name(&self) -> &'static str {
        "move"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let parsed = arg::<usize>(request, 0, "原位置")
            .and_then(|from| Ok((from, arg::<usize>(request, 1, "新位置")?)));
        match parsed {
            Ok((from, to)) => CommandResponse::from_result(
                context.session.move_segment(from, to),
                format!("已将第 {from} 段移动到位置 {to}"),
            ),
            Err(message) => CommandResponse::err(message),
        }
    }
}

/// `accuracy <值>` 设置全局精度；`accuracy <段> <值|inherit>` 设置逐段覆盖。
struct AccuracyCommand;

impl CommandHandler for AccuracyCommand {
    fn name(&self) -> &'static str {
        "accuracy"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        if request.args.len() < 2 {
            return match arg::<f64>(request, 0, "精度") {
                Ok(value) => CommandResponse::from_result(
                    context.session.set_accuracy(value),
                    format!("全局精度设为 {value}"),
                ),
                Err(message) => CommandResponse::err(message),
            };
        }
        let index: usize = match arg(request, 0, "段序号") {
            Ok(index) => index,
            Err(message) => return CommandResponse::err(message),
        };
        let value = if request.args[1] == "inherit" {
            None
        } else {
            match arg::<f64>(request, 1, "精度") {
                Ok(value) => Some(value),
                Err(message) => return CommandResponse::err(message),
            }
        };
        CommandResponse::from_result(
            context.session.set_segment_accuracy(index, value),
            format!("第 {index} 段精度覆盖：{value:?}"),
        )
    }
}

/// `max_dist <值|none>` 设置全局点间距；`max_dist <段> <inherit|disabled|值>` 设置逐段覆盖。
struct MaxDistCommand;

impl CommandHandler for MaxDistCommand {
    fn name(&self) -> &'static str {
        "max_dist"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        if request.args.len() < 2 {
            let value = match request.args.first().map(String::as_str) {
                Some("none") => None,
                _ => match arg::<f64>(request, 0, "点间距") {
                    Ok(value) => Some(value),
                    Err(message) => return CommandResponse::err(message),
                },
            };
            return CommandResponse::from_result(
                context.session.set_max_dist(value),
                format!("全局点间距设为 {value:?}"),
            );
        }
        let index: usize = match arg(request, 0, "段序号") {
            Ok(index) => index,
            Err(message) => return CommandResponse::err(message),
        };
        let value = match request.args[1].as_str() {
            "inherit" => MaxDistOverride::Inherit,
            "disabled" => MaxDistOverride::Disabled,
            _ => match arg::<f64>(request, 1, "点间距") {
                Ok(limit) => MaxDistOverride::Limit(limit),
                Err(message) => return CommandResponse::err(message),
            },
        };
        CommandResponse::from_result(
            context.session.set_segment_max_dist(index, value),
            format!("第 {index} 段点间距覆盖：{value:?}"),
        )
    }
}

/// `unit <file|mm|cm|inch>`
struct UnitCommand;

impl CommandHandler for UnitCommand {
    fn name(&self) -> &'static str {
        "unit"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let Some(raw) = request.args.first() else {
            return CommandResponse::err("`unit` 缺少参数：单位");
        };
        match raw.parse::<UnitSelection>() {
            Ok(unit) => CommandResponse::from_result(
                context.session.set_unit(unit),
                format!("单位设为 {unit}"),
            ),
            Err(message) => CommandResponse::err(message),
        }
    }
}

struct RestartCommand;

impl CommandHandler for RestartCommand {
    fn name(&self) -> &'static str {
        "restart"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        CommandResponse::from_result(context.session.restart_with_defaults(), "已恢复默认配置")
    }
}

struct FinalizeCommand;

impl CommandHandler for FinalizeCommand {
    fn name(&self) -> &'static str {
        "finalize"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        match context.session.finalize() {
            Ok(Some(figure)) => CommandResponse::ok(format!(
                "图形 {} 已完成，共 {} 个点",
                figure.name,
                figure.len()
            )),
            Ok(None) => CommandResponse::ok("配置已保存，当前没有可用图形"),
            Err(err) => CommandResponse::err(describe_error(&err)),
        }
    }
}

/// `select <输出点索引>`：反查所属段。
struct SelectCommand;

impl CommandHandler for SelectCommand {
    fn name(&self) -> &'static str {
        "select"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let index: usize = match arg(request, 0, "输出点索引") {
            Ok(index) => index,
            Err(message) => return CommandResponse::err(message),
        };
        match context.session.segment_at_output_index(index) {
            Some(segment) => CommandResponse::ok(format!("输出点 {index} 属于第 {segment} 段")),
            None => CommandResponse::err(format!("输出点 {index} 不属于任何段")),
        }
    }
}
