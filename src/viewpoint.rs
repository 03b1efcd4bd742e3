// 该文件是 Huji （户籍） 项目的一部分。
// src/viewpoint.rs - 视角标签规范化
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

pub const FRONT_RIGHT: &str = "frontright";
pub const BACK_RIGHT: &str = "backright";
pub const FRONT_LEFT: &str = "frontleft";
pub const BACK_LEFT: &str = "backleft";
pub const RIGHT: &str = "right";
pub const LEFT: &str = "left";

/// 规范视角词表，按匹配优先级排列
pub const CANONICAL_VIEWPOINTS: [&str; 6] = [FRONT_RIGHT, BACK_RIGHT, FRONT_LEFT, BACK_LEFT, RIGHT, LEFT];

/// 将上游预测的视角标签规范化到固定词表
///
/// 按优先级逐条匹配子串，第一条命中即返回；都不命中时原样返回，
/// 由下游的白名单检查将其视为无法识别的视角。
pub fn normalize(raw: &str) -> &str {
  let has = |needle: &str| raw.contains(needle);

  if has("front") && has("right") {
    FRONT_RIGHT
  } else if has("back") && has("right") {
    BACK_RIGHT
  } else if has("front") && has("left") {
    FRONT_LEFT
  } else if has("back") && has("left") {
    BACK_LEFT
  } else if has("right") {
    RIGHT
  } else if has("left") {
    LEFT
  } else {
    raw
  }
}

/// 是否属于规范词表
pub fn is_canonical(viewpoint: &str) -> bool {
  CANONICAL_VIEWPOINTS.contains(&viewpoint)
}

/// 朝左的视角在送入分类器前需要水平翻转
pub fn is_left_facing(viewpoint: &str) -> bool {
  viewpoint.contains(LEFT)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn compound_labels_take_priority() {
    assert_eq!(normalize("frontright_highres"), FRONT_RIGHT);
    assert_eq!(normalize("up_backright"), BACK_RIGHT);
    assert_eq!(normalize("front-left"), FRONT_LEFT);
    assert_eq!(normalize("backleft"), BACK_LEFT);
  }

  #[test]
  fn single_side_labels() {
    assert_eq!(normalize("right"), RIGHT);
    assert_eq!(normalize("upright"), RIGHT);
    assert_eq!(normalize("left_down"), LEFT);
  }

  #[test]
  fn right_wins_over_left_when_both_present() {
    // 规则 5 先于规则 6
    assert_eq!(normalize("leftright"), RIGHT);
    assert_eq!(normalize("front_left_right"), FRONT_RIGHT);
  }

  #[test]
  fn unrecognized_labels_pass_through() {
    assert_eq!(normalize("front"), "front");
    assert_eq!(normalize("up"), "up");
    assert_eq!(normalize(""), "");
    // 区分大小写
    assert_eq!(normalize("Right"), "Right");
    assert!(!is_canonical(normalize("front")));
  }

  #[test]
  fn normalize_is_idempotent() {
    let samples = [
      "frontright_highres",
      "backright",
      "front-left",
      "back_left",
      "upright",
      "leftish",
      "front",
      "back",
      "",
      "RIGHT",
      "frontbackleftright",
      "下left",
    ];
    for raw in samples {
      let once = normalize(raw);
      assert_eq!(normalize(once), once, "输入 {raw:?}");
    }
  }

  #[test]
  fn left_facing_detection() {
    assert!(is_left_facing(FRONT_LEFT));
    assert!(is_left_facing(LEFT));
    assert!(!is_left_facing(BACK_RIGHT));
  }
}
