//! ZDraft 二维绘图内核
//!
//! 提供2D几何图元、均匀网格空间索引、修剪/延伸引擎和撤销历史。
//!
//! # 架构设计
//!
//! - `Element`: 带唯一ID的图元（线段、圆弧、圆、多段线、矩形）
//! - `ElementContainer`: 图元存储与空间网格的统一门面
//! - `DrawingSession`: 编辑、复制、修剪/延伸与撤销的会话入口
//!
//! # 示例
//!
//! ```rust
//! use zdraft_core::prelude::*;
//!
//! let mut session = DrawingSession::new(KernelConfig::default()).unwrap();
//!
//! // 一条水平线和一条穿过它的竖线
//! let line = Element::line(Point2::new(0.0, 10.0), Point2::new(100.0, 10.0)).unwrap();
//! let cutter = Element::line(Point2::new(50.0, 0.0), Point2::new(50.0, 20.0)).unwrap();
//! session.add_elements(vec![line, cutter]).unwrap();
//!
//! // 剪掉竖线右侧的部分
//! session.start_replacing_elements(ReplaceMode::Trim).unwrap();
//! session.continue_replacing_elements(80.0, 10.0).unwrap();
//! session.complete_replacing_elements().unwrap();
//!
//! println!("Elements: {}", session.container().len());
//! ```

pub mod builder;
pub mod config;
pub mod container;
pub mod element;
pub mod error;
pub mod geometry;
pub mod history;
pub mod intersect;
pub mod math;
pub mod point_index;
pub mod replace;
pub mod session;
pub mod spatial;
pub mod trim;

pub mod prelude {
    //! 常用类型的便捷导入
    pub use crate::builder::{BuilderKind, ElementBuilder};
    pub use crate::config::KernelConfig;
    pub use crate::container::{
        ContainerQuery, ElementContainer, NearElementQuery, PointQuery, ReturnGroup,
    };
    pub use crate::element::{
        Boundable, Element, ElementId, ElementKind, Movable, PointOwning, PointType, Polyline,
    };
    pub use crate::error::{KernelError, Result};
    pub use crate::geometry::{Arc, Circle, Line};
    pub use crate::history::{History, HistoryEvent};
    pub use crate::math::{BoundingBox2, Point2, Vector2, EPSILON};
    pub use crate::point_index::{SelectionPoint, SelectionPointIndex};
    pub use crate::replace::{ReplacementAggregate, ReplacementLedger, ReplacementStep};
    pub use crate::session::{DrawingSession, EditChange};
    pub use crate::spatial::{Division, DivisionBatch, SpatialGrid};
    pub use crate::trim::{ReplaceMode, Replacement};
}
