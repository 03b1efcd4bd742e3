// 该文件是 Huji （户籍） 项目的一部分。
// src/output/summary.rs - 普查统计日志输出
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
use tracing::info;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, output::Render, record::CensusResult};

#[derive(Error, Debug)]
pub enum SummaryOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

/// 只把分区统计写入日志，`summary:?per_image` 时附带每张图像的采纳数量
#[derive(Debug, Default)]
pub struct SummaryOutput {
  per_image: bool,
}

impl FromUrlWithScheme for SummaryOutput {
  const SCHEME: &'static str = "summary";
}

impl FromUrl for SummaryOutput {
  type Error = SummaryOutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SummaryOutputError::SchemeMismatch);
    }

    let per_image = uri.query_pairs().any(|(k, _)| k == "per_image");
    Ok(SummaryOutput { per_image })
  }
}

impl Render<CensusResult> for SummaryOutput {
  type Error = SummaryOutputError;

  fn render_result(&self, result: &CensusResult) -> Result<(), Self::Error> {
    let summary = &result.summary;
    info!("输入记录: {}", summary.input);
    info!("普查标注: {}", summary.admitted);
    info!("低置信度: {}", summary.below_threshold);
    info!("宽高比超限: {}", summary.aspect_ratio);
    info!("重复抑制: {}", summary.duplicate);
    info!("结构性拒绝: {}", summary.inadmissible);

    if self.per_image {
      for (image_id, count) in result.admitted_per_image() {
        info!("  - {}: {}", image_id, count);
      }
    }
    Ok(())
  }
}
