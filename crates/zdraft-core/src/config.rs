//! 内核配置

use crate::error::{KernelError, Result};
use serde::{Deserialize, Serialize};

/// 内核配置
///
/// 画布尺寸只决定网格分区与选择点索引的划分方式，
/// 网格本身不受画布限制（画布外、负坐标的分区同样有效）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// 画布宽度
    pub canvas_width: f64,
    /// 画布高度
    pub canvas_height: f64,
    /// 横向分区数
    pub x_divisions: u32,
    /// 纵向分区数
    pub y_divisions: u32,
    /// 选择点索引树的深度
    pub point_index_depth: u32,
    /// 点选元素时允许的最大距离
    pub max_points_diff: f64,
    /// 捕捉半径
    pub snap_delta: f64,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            canvas_width: 1600.0,
            canvas_height: 800.0,
            x_divisions: 80,
            y_divisions: 40,
            point_index_depth: 5,
            max_points_diff: 5.0,
            snap_delta: 10.0,
        }
    }
}

impl KernelConfig {
    /// 从 JSON 读取，缺省字段取默认值
    pub fn from_json(json: &str) -> Result<Self> {
        let config: KernelConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.canvas_width > 0.0 && self.canvas_height > 0.0) {
            return Err(KernelError::invalid("canvas size must be positive"));
        }
        if self.x_divisions == 0 || self.y_divisions == 0 {
            return Err(KernelError::invalid("division count must be positive"));
        }
        if self.point_index_depth > 20 {
            return Err(KernelError::invalid("point index depth is too large"));
        }
        if self.max_points_diff < 0.0 || self.snap_delta < 0.0 {
            return Err(KernelError::invalid("tolerances must not be negative"));
        }
        Ok(())
    }

    /// 单个分区的宽度
    pub fn division_width(&self) -> f64 {
        self.canvas_width / self.x_divisions as f64
    }

    /// 单个分区的高度
    pub fn division_height(&self) -> f64 {
        self.canvas_height / self.y_divisions as f64
    }
}
