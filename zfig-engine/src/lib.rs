pub mod command;
pub mod figure;
pub mod joining;
pub mod path;
pub mod pipeline;
pub mod provider;
pub mod reconcile;
pub mod route;
pub mod sampling;
pub mod session;
pub mod spatial;

pub use figure::{Figure, OutputPoint, PowerMarker};
pub use path::ToolPath;
pub use pipeline::{PipelineOptions, PipelineOutput};
pub use session::ImportSession;

pub mod errors {
    use std::error::Error as StdError;

    use thiserror::Error;
    use zfig_io::IoError;

    #[derive(Debug, Error)]
    pub enum EngineError {
        #[error("读取图纸失败")]
        Load(#[from] IoError),
        #[error("第 {index} 个实体几何无效: {message}")]
        Geometry { index: usize, message: String },
        #[error("图纸未声明单位，请显式选择单位")]
        MissingUnit,
        #[error("尚未设置图纸路径")]
        NoDrawing,
        #[error("段索引 {index} 越界（共 {len} 段）")]
        SegmentOutOfRange { index: usize, len: usize },
        #[error("参数无效: {0}")]
        InvalidValue(String),
    }

    impl EngineError {
        pub(crate) fn geometry(index: usize, message: impl Into<String>) -> Self {
            Self::Geometry {
                index,
                message: message.into(),
            }
        }

        /// 由流水线本身产生的错误会清空派生状态；调用方参数错误不会。
        pub fn resets_state(&self) -> bool {
            matches!(
                self,
                Self::Load(_) | Self::Geometry { .. } | Self::MissingUnit
            )
        }
    }

    /// 沿 `source` 链拼接出单行可读信息。
    pub fn describe_error(err: &(dyn StdError + 'static)) -> String {
        let mut message = err.to_string();
        let mut current = err.source();
        while let Some(cause) = current {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            current = cause.source();
        }
        message
    }

}
