// 该文件是 Huji （户籍） 项目的一部分。
// src/bin/census_annotate.rs - 普查标注筛选
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

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use huji::{
  FromUrl,
  classifier::LogitsFieldClassifier,
  config::CensusConfig,
  input::InputWrapper,
  output::OutputWrapper,
  task::{CensusTask, Task},
};

/// Huji 普查标注参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// YAML 配置文件路径
  #[arg(long, value_name = "FILE")]
  pub config: PathBuf,
  /// 输入记录，例如 jsonl:///data/viewpoint_output.jsonl
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出位置，例如 jsonl:///data/ca_output.jsonl 或 summary:?per_image
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  /// 保存分类器输出的列名
  #[arg(long, default_value = "ca_logits", value_name = "FIELD")]
  pub logits_field: String,
  /// 该列已经是 softmax 概率
  #[arg(long)]
  pub probabilities: bool,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("配置文件: {}", args.config.display());
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);
  info!("分类输出列: {}", args.logits_field);

  let config = CensusConfig::load(&args.config)?;
  let input = InputWrapper::from_url(&args.input)?;
  let output = OutputWrapper::from_url(&args.output)?;

  let classifier = LogitsFieldClassifier::new(args.logits_field);
  let classifier = if args.probabilities {
    classifier.probabilities()
  } else {
    classifier
  };

  CensusTask::new(config).run_task(input, classifier, output)
}
