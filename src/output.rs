// 该文件是 Huji （户籍） 项目的一部分。
// src/output.rs - 输出定义
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use thiserror::Error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, record::CensusResult};

pub trait Render<Output> {
  type Error;
  fn render_result(&self, result: &Output) -> Result<(), Self::Error>;
}

mod summary;
pub use self::summary::{SummaryOutput, SummaryOutputError};

#[cfg(feature = "jsonl_file")]
mod jsonl_file;
#[cfg(feature = "jsonl_file")]
pub use self::jsonl_file::{JsonlFileOutput, JsonlFileOutputError};

#[derive(Error, Debug)]
pub enum OutputError {
  #[cfg(feature = "jsonl_file")]
  #[error("JSONL 文件输出错误: {0}")]
  JsonlFileOutputError(#[from] JsonlFileOutputError),
  #[error("统计输出错误: {0}")]
  SummaryOutputError(#[from] SummaryOutputError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum OutputWrapper {
  #[cfg(feature = "jsonl_file")]
  JsonlFile(JsonlFileOutput),
  Summary(SummaryOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      #[cfg(feature = "jsonl_file")]
      JsonlFileOutput::SCHEME => {
        let output = JsonlFileOutput::from_url(url)?;
        Ok(OutputWrapper::JsonlFile(output))
      }
      SummaryOutput::SCHEME => {
        let output = SummaryOutput::from_url(url)?;
        Ok(OutputWrapper::Summary(output))
      }
      scheme => Err(OutputError::SchemeMismatch(scheme.to_string())),
    }
  }
}

impl Render<CensusResult> for OutputWrapper {
  type Error = OutputError;

  fn render_result(&self, result: &CensusResult) -> Result<(), Self::Error> {
    match self {
      #[cfg(feature = "jsonl_file")]
      OutputWrapper::JsonlFile(output) => output.render_result(result).map_err(OutputError::from),
      OutputWrapper::Summary(output) => output.render_result(result).map_err(OutputError::from),
    }
  }
}
