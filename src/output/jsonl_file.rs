// 该文件是 Huji （户籍） 项目的一部分。
// src/output/jsonl_file.rs - JSONL 文件输出
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

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, output::Render, record::CensusResult, url_file_path};

#[derive(Error, Debug)]
pub enum JsonlFileOutputError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("路径解码错误: {0}")]
  PathDecodeError(#[from] std::string::FromUtf8Error),
  #[error("序列化错误: {0}")]
  SerializeError(#[from] serde_json::Error),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 每条普查标注写为一行 JSON，文件已存在时覆盖
pub struct JsonlFileOutput {
  path: PathBuf,
}

impl FromUrlWithScheme for JsonlFileOutput {
  const SCHEME: &'static str = "jsonl";
}

impl FromUrl for JsonlFileOutput {
  type Error = JsonlFileOutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(JsonlFileOutputError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    Ok(JsonlFileOutput {
      path: url_file_path(uri)?,
    })
  }
}

impl JsonlFileOutput {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn write_to<W: Write>(writer: W, result: &CensusResult) -> Result<(), JsonlFileOutputError> {
    let mut writer = BufWriter::new(writer);
    for annotation in &result.annotations {
      serde_json::to_writer(&mut writer, annotation)?;
      writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
  }
}

impl Render<CensusResult> for JsonlFileOutput {
  type Error = JsonlFileOutputError;

  fn render_result(&self, result: &CensusResult) -> Result<(), Self::Error> {
    if let Some(parent) = Path::new(&self.path).parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    let file = std::fs::File::create(&self.path)?;
    Self::write_to(file, result)?;

    info!(
      "普查标注已保存到: {} ({} 条)",
      self.path.display(),
      result.annotations.len()
    );
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use serde_json::Value;

  use super::*;
  use crate::record::{BBox, DetectionRecord, Fate, Softmax};

  fn result() -> CensusResult {
    let admitted = DetectionRecord::new(0, "a.jpg", BBox::new(0.0, 0.0, 10.0, 10.0), "left")
      .with_confidence(Softmax::new(0.25, 0.75))
      .into_annotation(Fate::Admitted);
    let rejected = DetectionRecord::new(1, "a.jpg", BBox::new(0.0, 0.0, 10.0, 10.0), "up").into_annotation(Fate::Inadmissible);
    CensusResult {
      annotations: vec![admitted, rejected],
      ..Default::default()
    }
  }

  #[test]
  fn writes_one_line_per_annotation() {
    let mut buffer = Vec::new();
    JsonlFileOutput::write_to(&mut buffer, &result()).unwrap();
    let text = String::from_utf8(buffer).unwrap();
    let lines: Vec<Value> = text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();

    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["CA_score"], Value::from(0.75));
    assert_eq!(lines[0]["annotations_census"], Value::Bool(true));
    assert_eq!(lines[1]["CA_score"], Value::Null);
    assert_eq!(lines[1]["annotations_census"], Value::Bool(false));
    assert_eq!(lines[1]["predicted_viewpoint"], Value::from("up"));
  }

  #[test]
  fn creates_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ca").join("ca_output.jsonl");
    JsonlFileOutput::new(&path).render_result(&result()).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text.lines().count(), 2);
  }

  #[test]
  fn writes_to_path_with_space() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("census out").join("ca output.jsonl");
    let url = Url::parse(&format!("jsonl://{}", path.display())).unwrap();
    JsonlFileOutput::from_url(&url).unwrap().render_result(&result()).unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 2);
  }
}
