use crate::PipeRes;
use crate::builder::PipeBuilder;
use crate::chain::Chain;
use crate::collect::Collector;
use crate::err::PipeErr;
use itertools::Itertools;
use std::cell::Cell;
use std::cmp::Ordering;
use std::fmt;
use std::hash::Hash;
use std::mem;
use std::rc::Rc;

/// 一条绑定了数据源和操作链的流水线，只能被一个终止操作消费一次。
///
/// 中间操作（[`map`](Pipeline::map)、[`filter`](Pipeline::filter)等）按值消费当前句柄，
/// 返回追加了新阶段的句柄；所有派生句柄共享同一个消费标记。终止操作
/// （[`count`](Pipeline::count)、[`to_vec`](Pipeline::to_vec)等）置位消费标记并驱动求值，
/// 已消费的流水线上任何中间或终止调用都返回[`PipeErr::ReuseErr`]。
pub struct Pipeline<T> {
    consumed: Rc<Cell<bool>>,
    chain: Chain<T>,
    ops: Vec<&'static str>,
}

impl<T: 'static> Pipeline<T> {
    /// 不产出任何元素的流水线。
    pub fn empty() -> Pipeline<T> {
        Pipeline::with_chain(Chain::empty())
    }

    /// 按参数顺序产出给定字面值的流水线。
    pub fn of<const N: usize>(values: [T; N]) -> Pipeline<T> {
        Pipeline::with_chain(Chain::from_values(values.into()))
    }

    /// `Some`产出单个元素，`None`产出空流水线。
    pub fn of_optional(value: Option<T>) -> Pipeline<T> {
        Pipeline::with_chain(Chain::from_values(value.into_iter().collect()))
    }

    /// 逐个追加元素的构建器，见[`PipeBuilder`]。
    pub fn builder() -> PipeBuilder<T> {
        PipeBuilder::new()
    }

    pub(crate) fn with_chain(chain: Chain<T>) -> Pipeline<T> {
        Pipeline { consumed: Rc::new(Cell::new(false)), chain, ops: vec!["source"] }
    }

    fn ensure_open(&self) -> PipeRes<()> {
        if self.consumed.get() { Err(PipeErr::ReuseErr) } else { Ok(()) }
    }

    /// 追加一个阶段，返回共享同一消费标记的新句柄。
    fn chained<U: 'static>(self, op: &'static str, wrap: impl FnOnce(Chain<T>) -> Chain<U>) -> PipeRes<Pipeline<U>> {
        self.ensure_open()?;
        let Pipeline { consumed, chain, mut ops } = self;
        ops.push(op);
        Ok(Pipeline { consumed, chain: wrap(chain), ops })
    }

    /// 置位消费标记并取出操作链，供终止操作驱动求值。
    fn consume(&mut self) -> PipeRes<Chain<T>> {
        self.ensure_open()?;
        self.consumed.set(true);
        Ok(mem::replace(&mut self.chain, Chain::empty()))
    }

    /* **************************************** 中间操作 **************************************** */

    pub fn map<U: 'static>(self, f: impl FnMut(T) -> U + 'static) -> PipeRes<Pipeline<U>> {
        self.chained("map", |chain| chain.op_map(f))
    }

    pub fn filter(self, pred: impl FnMut(&T) -> bool + 'static) -> PipeRes<Pipeline<T>> {
        self.chained("filter", |chain| chain.op_filter(pred))
    }

    /// 对每个元素计算一个子序列并逐个产出其元素，子序列耗尽后才拉取下一个上游元素。
    pub fn flat_map<U: 'static, I>(self, mut f: impl FnMut(T) -> I + 'static) -> PipeRes<Pipeline<U>>
    where
        I: IntoIterator<Item = U>,
        I::IntoIter: 'static,
    {
        self.chained("flat_map", |chain| chain.op_flat_map(move |value| f(value).into_iter()))
    }

    /// 对每个流经的元素执行副作用，元素原样转发。
    pub fn peek(self, f: impl FnMut(&T) + 'static) -> PipeRes<Pipeline<T>> {
        self.chained("peek", |chain| chain.op_peek(f))
    }

    /// 按相等性去重，保留每个值的首次出现，顺序不变。
    pub fn distinct(self) -> PipeRes<Pipeline<T>>
    where
        T: Eq + Hash + Clone,
    {
        self.chained("distinct", Chain::op_distinct)
    }

    /// 按自然序稳定排序。屏障阶段：求值时需先耗尽整个上游。
    /// 元素间出现不可比较的组合（如浮点NaN）时求值失败。
    pub fn sorted(self) -> PipeRes<Pipeline<T>>
    where
        T: PartialOrd,
    {
        self.chained("sorted", Chain::op_sorted)
    }

    /// 按给定比较器稳定排序，相等元素保持原有相对顺序。
    pub fn sorted_by(self, cmp: impl FnMut(&T, &T) -> Ordering + 'static) -> PipeRes<Pipeline<T>> {
        self.chained("sorted_by", |chain| chain.op_sorted_by(cmp))
    }

    /// 最多产出前`count`个元素，之后不再拉取上游（短路）。
    pub fn limit(self, count: i64) -> PipeRes<Pipeline<T>> {
        if count < 0 {
            return Err(PipeErr::BadCountErr { op: "limit", count });
        }
        self.chained("limit", |chain| chain.op_limit(count as usize))
    }

    /// 丢弃前`count`个元素，其余原样转发。
    pub fn skip(self, count: i64) -> PipeRes<Pipeline<T>> {
        if count < 0 {
            return Err(PipeErr::BadCountErr { op: "skip", count });
        }
        self.chained("skip", |chain| chain.op_skip(count as usize))
    }

    /// 条件满足时持续产出，首个不满足条件的元素出现后停止并不再拉取上游（短路）。
    pub fn take_while(self, pred: impl FnMut(&T) -> bool + 'static) -> PipeRes<Pipeline<T>> {
        self.chained("take_while", |chain| chain.op_take_while(pred))
    }

    /// 条件满足时持续丢弃，条件首次不满足后该元素及其后所有元素无条件产出。
    pub fn drop_while(self, pred: impl FnMut(&T) -> bool + 'static) -> PipeRes<Pipeline<T>> {
        self.chained("drop_while", |chain| chain.op_drop_while(pred))
    }

    /* **************************************** 终止操作 **************************************** */

    /// 拉取至耗尽，返回产出的元素数量。
    pub fn count(&mut self) -> PipeRes<usize> {
        let mut total = 0;
        for pulled in self.consume()? {
            pulled?;
            total += 1;
        }
        Ok(total)
    }

    /// 以`identity`为起始累加值从左至右折叠，结果类型即累加值类型。
    pub fn fold<A>(&mut self, identity: A, mut f: impl FnMut(A, T) -> A) -> PipeRes<A> {
        let mut acc = identity;
        for pulled in self.consume()? {
            acc = f(acc, pulled?);
        }
        Ok(acc)
    }

    /// 无初始值的折叠：空流水线返回`None`，否则以首个元素为种子从左至右折叠。
    pub fn reduce(&mut self, mut f: impl FnMut(T, T) -> T) -> PipeRes<Option<T>> {
        let mut acc: Option<T> = None;
        for pulled in self.consume()? {
            let value = pulled?;
            acc = Some(match acc {
                Some(acc) => f(acc, value),
                None => value,
            });
        }
        Ok(acc)
    }

    /// 自然序最小元素，空流水线返回`None`，相等时保留先遇到的元素。
    pub fn min(&mut self) -> PipeRes<Option<T>>
    where
        T: Ord,
    {
        self.min_by(T::cmp)
    }

    pub fn min_by(&mut self, mut cmp: impl FnMut(&T, &T) -> Ordering) -> PipeRes<Option<T>> {
        let mut best: Option<T> = None;
        for pulled in self.consume()? {
            let value = pulled?;
            best = Some(match best {
                // 比较结果相等时保留先遇到的元素
                Some(best) if cmp(&value, &best) == Ordering::Less => value,
                Some(best) => best,
                None => value,
            });
        }
        Ok(best)
    }

    /// 自然序最大元素，空流水线返回`None`，相等时保留先遇到的元素。
    pub fn max(&mut self) -> PipeRes<Option<T>>
    where
        T: Ord,
    {
        self.max_by(T::cmp)
    }

    pub fn max_by(&mut self, mut cmp: impl FnMut(&T, &T) -> Ordering) -> PipeRes<Option<T>> {
        let mut best: Option<T> = None;
        for pulled in self.consume()? {
            let value = pulled?;
            best = Some(match best {
                Some(best) if cmp(&value, &best) == Ordering::Greater => value,
                Some(best) => best,
                None => value,
            });
        }
        Ok(best)
    }

    /// 数值元素求和，空流水线返回加法单位元。
    pub fn sum(&mut self) -> PipeRes<T>
    where
        T: std::iter::Sum<T>,
    {
        self.consume()?.sum()
    }

    /// 数值元素平均值，即`sum / count`。空流水线返回`None`，绝不触发除零。
    pub fn average(&mut self) -> PipeRes<Option<f64>>
    where
        T: Into<f64>,
    {
        let mut total = 0.0;
        let mut count = 0usize;
        for pulled in self.consume()? {
            total += pulled?.into();
            count += 1;
        }
        Ok(if count == 0 { None } else { Some(total / count as f64) })
    }

    /// 按遭遇顺序返回首个元素，一次拉取后即短路。
    pub fn find_first(&mut self) -> PipeRes<Option<T>> {
        self.consume()?.next().transpose()
    }

    /// 语义上不保证顺序；顺序执行引擎中确定性地返回首个元素。
    pub fn find_any(&mut self) -> PipeRes<Option<T>> {
        self.find_first()
    }

    /// 任一元素满足条件即`true`，在首个满足的元素处短路；空流水线为`false`。
    pub fn any_match(&mut self, mut pred: impl FnMut(&T) -> bool) -> PipeRes<bool> {
        for pulled in self.consume()? {
            if pred(&pulled?) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// 所有元素满足条件才为`true`，在首个不满足的元素处短路；空流水线为`true`。
    pub fn all_match(&mut self, mut pred: impl FnMut(&T) -> bool) -> PipeRes<bool> {
        for pulled in self.consume()? {
            if !pred(&pulled?) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// 没有元素满足条件才为`true`，在首个满足的元素处短路；空流水线为`true`。
    pub fn none_match(&mut self, mut pred: impl FnMut(&T) -> bool) -> PipeRes<bool> {
        for pulled in self.consume()? {
            if pred(&pulled?) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// 拉取至耗尽，按遭遇顺序物化到新的`Vec`。
    pub fn to_vec(&mut self) -> PipeRes<Vec<T>> {
        self.consume()?.collect()
    }

    /// 物化到调用方提供的容器（类型与容量由工厂决定），按遭遇顺序填充。
    pub fn to_collection<C: Extend<T>>(&mut self, factory: impl FnOnce() -> C) -> PipeRes<C> {
        let mut container = factory();
        for pulled in self.consume()? {
            container.extend([pulled?]);
        }
        Ok(container)
    }

    /// 拉取至耗尽，按遭遇顺序对每个元素执行副作用。
    pub fn for_each(&mut self, mut f: impl FnMut(T)) -> PipeRes<()> {
        for pulled in self.consume()? {
            f(pulled?);
        }
        Ok(())
    }

    /// 以收集器聚合：创建容器、逐元素折叠、收尾，见[`Collector`]。
    /// 折叠步骤的失败（如重复键）会中止拉取并向调用方传播，流水线保持已消费状态。
    pub fn collect<C: Collector<T>>(&mut self, mut collector: C) -> PipeRes<C::Out> {
        let chain = self.consume()?;
        let mut acc = collector.supply();
        for pulled in chain {
            collector.fold(&mut acc, pulled?)?;
        }
        Ok(collector.finish(acc))
    }
}

impl<T: 'static> From<Vec<T>> for Pipeline<T> {
    fn from(values: Vec<T>) -> Pipeline<T> {
        Pipeline::with_chain(Chain::from_values(values))
    }
}

impl<T: 'static> FromIterator<T> for Pipeline<T> {
    fn from_iter<I: IntoIterator<Item = T>>(values: I) -> Pipeline<T> {
        Pipeline::with_chain(Chain::from_values(values.into_iter().collect()))
    }
}

impl<T> fmt::Debug for Pipeline<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Pipeline[{}]{}",
            self.ops.iter().join(" -> "),
            if self.consumed.get() { " (consumed)" } else { "" }
        )
    }
}
