//! 惰性、可组合的序列处理流水线。
//!
//! 以 [`Pipeline`] 为入口：从已有序列构造数据源，链式追加中间操作（map、filter、
//! distinct、sorted、limit 等），最后调用一个终止操作求值。中间操作不会触发计算，
//! 只有终止操作会拉取数据；每条流水线只能被消费一次。
//!
//! ```
//! use rstream::{Pipeline, PipeErr};
//!
//! fn demo() -> Result<(), PipeErr> {
//!     let evens = Pipeline::of([1, 2, 3, 4, 5, 6, 7, 8, 9, 10])
//!         .filter(|n| n % 2 == 0)?
//!         .to_vec()?;
//!     assert_eq!(evens, vec![2, 4, 6, 8, 10]);
//!     Ok(())
//! }
//! # demo().unwrap();
//! ```

mod builder;
mod chain;
pub mod collect;
mod err;
mod pipe;

pub use crate::builder::PipeBuilder;
pub use crate::collect::{Collector, OrderedMap};
pub use crate::err::PipeErr;
pub use crate::pipe::Pipeline;

/// 流水线操作的统一返回类型
pub type PipeRes<T> = Result<T, PipeErr>;
