use crate::err::PipeErr;
use rustc_hash::FxHashSet;
use std::cmp::Ordering;
use std::hash::Hash;

/// 链中单次拉取的结果：一个元素，或沿链向下游传播的失败。
pub(crate) type Pulled<T> = Result<T, PipeErr>;

/// 拉取式求值链：终止操作向最外层阶段请求下一个元素，阶段递归向上游请求。
pub(crate) struct Chain<T> {
    pub(crate) iter: Box<dyn Iterator<Item = Pulled<T>>>,
}

impl<T> Iterator for Chain<T> {
    type Item = Pulled<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next()
    }
}

impl<T: 'static> Chain<T> {
    pub(crate) fn empty() -> Chain<T> {
        Chain { iter: Box::new(std::iter::empty()) }
    }

    pub(crate) fn from_values(values: Vec<T>) -> Chain<T> {
        Chain { iter: Box::new(values.into_iter().map(Ok)) }
    }

    pub(crate) fn op_map<U: 'static>(self, mut f: impl FnMut(T) -> U + 'static) -> Chain<U> {
        Chain { iter: Box::new(self.iter.map(move |pulled| pulled.map(&mut f))) }
    }

    pub(crate) fn op_filter(self, mut pred: impl FnMut(&T) -> bool + 'static) -> Chain<T> {
        Chain {
            iter: Box::new(self.iter.filter(move |pulled| match pulled {
                Ok(value) => pred(value),
                Err(_) => true,
            })),
        }
    }

    pub(crate) fn op_peek(self, mut f: impl FnMut(&T) + 'static) -> Chain<T> {
        Chain {
            iter: Box::new(self.iter.inspect(move |pulled| {
                if let Ok(value) = pulled {
                    f(value)
                }
            })),
        }
    }

    pub(crate) fn op_flat_map<U, I, F>(self, f: F) -> Chain<U>
    where
        U: 'static,
        I: Iterator<Item = U> + 'static,
        F: FnMut(T) -> I + 'static,
    {
        Chain { iter: Box::new(FlatMapIter { upstream: self, f, current: None }) }
    }

    pub(crate) fn op_distinct(self) -> Chain<T>
    where
        T: Eq + Hash + Clone,
    {
        let mut seen = FxHashSet::default();
        // 首次出现保留，其后抑制，保持首现顺序
        self.op_filter(move |value| seen.insert(value.clone()))
    }

    pub(crate) fn op_limit(self, count: usize) -> Chain<T> {
        Chain { iter: Box::new(LimitIter { upstream: self, left: count }) }
    }

    pub(crate) fn op_skip(self, count: usize) -> Chain<T> {
        Chain { iter: Box::new(SkipIter { upstream: self, left: count }) }
    }

    pub(crate) fn op_take_while(self, pred: impl FnMut(&T) -> bool + 'static) -> Chain<T> {
        Chain { iter: Box::new(TakeWhileIter { upstream: self, pred, done: false }) }
    }

    pub(crate) fn op_drop_while(self, pred: impl FnMut(&T) -> bool + 'static) -> Chain<T> {
        Chain { iter: Box::new(DropWhileIter { upstream: self, pred, dropping: true }) }
    }

    pub(crate) fn op_sorted(self) -> Chain<T>
    where
        T: PartialOrd,
    {
        self.op_sorted_with(Box::new(|left: &T, right: &T| left.partial_cmp(right)))
    }

    pub(crate) fn op_sorted_by(self, mut cmp: impl FnMut(&T, &T) -> Ordering + 'static) -> Chain<T> {
        self.op_sorted_with(Box::new(move |left, right| Some(cmp(left, right))))
    }

    fn op_sorted_with(self, compare: Box<dyn FnMut(&T, &T) -> Option<Ordering>>) -> Chain<T> {
        Chain { iter: Box::new(SortIter { pending: Some((self, compare)), sorted: Vec::new().into_iter() }) }
    }
}

/// flat_map 阶段：对每个上游元素缓冲其子序列，先耗尽缓冲再拉取上游。
struct FlatMapIter<T, U, I, F>
where
    I: Iterator<Item = U>,
    F: FnMut(T) -> I,
{
    upstream: Chain<T>,
    f: F,
    current: Option<I>,
}

impl<T, U, I, F> Iterator for FlatMapIter<T, U, I, F>
where
    I: Iterator<Item = U>,
    F: FnMut(T) -> I,
{
    type Item = Pulled<U>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(sub) = &mut self.current {
                if let Some(value) = sub.next() {
                    return Some(Ok(value));
                }
                self.current = None;
            }
            match self.upstream.next() {
                Some(Ok(value)) => self.current = Some((self.f)(value)),
                Some(Err(err)) => return Some(Err(err)),
                None => return None,
            }
        }
    }
}

/// limit 阶段：产出足额后直接报告耗尽，不再拉取上游（短路）。
struct LimitIter<T> {
    upstream: Chain<T>,
    left: usize,
}

impl<T> Iterator for LimitIter<T> {
    type Item = Pulled<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.left == 0 {
            return None;
        }
        match self.upstream.next() {
            Some(Ok(value)) => {
                self.left -= 1;
                Some(Ok(value))
            }
            other => other,
        }
    }
}

/// skip 阶段：丢弃前N个上游元素，之后原样转发。
struct SkipIter<T> {
    upstream: Chain<T>,
    left: usize,
}

impl<T> Iterator for SkipIter<T> {
    type Item = Pulled<T>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.left > 0 {
            match self.upstream.next() {
                Some(Ok(_)) => self.left -= 1,
                other => return other,
            }
        }
        self.upstream.next()
    }
}

/// take_while 阶段：首个不满足条件的元素出现后停止，不再拉取上游（短路）。
struct TakeWhileIter<T, P> {
    upstream: Chain<T>,
    pred: P,
    done: bool,
}

impl<T, P: FnMut(&T) -> bool> Iterator for TakeWhileIter<T, P> {
    type Item = Pulled<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.upstream.next() {
            Some(Ok(value)) => {
                if (self.pred)(&value) {
                    Some(Ok(value))
                } else {
                    self.done = true;
                    None
                }
            }
            other => other,
        }
    }
}

/// drop_while 阶段：条件首次不满足后，该元素及其后的所有元素无条件产出，
/// 条件不会被再次应用。
struct DropWhileIter<T, P> {
    upstream: Chain<T>,
    pred: P,
    dropping: bool,
}

impl<T, P: FnMut(&T) -> bool> Iterator for DropWhileIter<T, P> {
    type Item = Pulled<T>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.dropping {
            match self.upstream.next() {
                Some(Ok(value)) => {
                    if !(self.pred)(&value) {
                        self.dropping = false;
                        return Some(Ok(value));
                    }
                }
                other => return other,
            }
        }
        self.upstream.next()
    }
}

/// sorted 屏障阶段：首次拉取时耗尽整个上游并稳定排序，之后按序产出。
/// 比较函数返回`None`（无自然序可用）时产出[`PipeErr::UncomparableErr`]后耗尽。
struct SortIter<T> {
    pending: Option<(Chain<T>, Box<dyn FnMut(&T, &T) -> Option<Ordering>>)>,
    sorted: std::vec::IntoIter<T>,
}

impl<T> Iterator for SortIter<T> {
    type Item = Pulled<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some((chain, mut compare)) = self.pending.take() {
            let mut buffer = Vec::new();
            for pulled in chain {
                match pulled {
                    Ok(value) => buffer.push(value),
                    Err(err) => return Some(Err(err)),
                }
            }
            let mut incomparable = false;
            // sort_by 为稳定排序，相等元素保持原有相对顺序
            buffer.sort_by(|left, right| {
                compare(left, right).unwrap_or_else(|| {
                    incomparable = true;
                    Ordering::Equal
                })
            });
            if incomparable {
                return Some(Err(PipeErr::UncomparableErr));
            }
            self.sorted = buffer.into_iter();
        }
        self.sorted.next().map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn counted(values: Vec<i32>, pulls: &Rc<Cell<usize>>) -> Chain<i32> {
        let pulls = pulls.clone();
        Chain::from_values(values).op_peek(move |_| pulls.set(pulls.get() + 1))
    }

    fn drain<T>(chain: Chain<T>) -> Vec<T> {
        chain.map(Result::unwrap).collect()
    }

    #[test]
    fn test_limit_stops_pulling_upstream() {
        let pulls = Rc::new(Cell::new(0));
        let chain = counted((1..=10).collect(), &pulls).op_limit(3);
        assert_eq!(drain(chain), vec![1, 2, 3]);
        assert_eq!(pulls.get(), 3);
    }

    #[test]
    fn test_limit_zero_pulls_nothing() {
        let pulls = Rc::new(Cell::new(0));
        let chain = counted((1..=10).collect(), &pulls).op_limit(0);
        assert_eq!(drain(chain), Vec::<i32>::new());
        assert_eq!(pulls.get(), 0);
    }

    #[test]
    fn test_skip_forwards_the_rest() {
        let chain = Chain::from_values((1..=10).collect()).op_skip(5);
        assert_eq!(drain(chain), vec![6, 7, 8, 9, 10]);
    }

    #[test]
    fn test_skip_more_than_available() {
        let chain = Chain::from_values(vec![1, 2, 3]).op_skip(5);
        assert_eq!(drain(chain), Vec::<i32>::new());
    }

    #[test]
    fn test_take_while_pulls_one_past_boundary() {
        let pulls = Rc::new(Cell::new(0));
        let chain = counted(vec![1, 2, 1, 3, 2, 4, 5], &pulls).op_take_while(|n| *n < 3);
        assert_eq!(drain(chain), vec![1, 2, 1]);
        // 失败元素本身需要被拉取一次以判定边界
        assert_eq!(pulls.get(), 4);
    }

    #[test]
    fn test_drop_while_never_reapplies_predicate() {
        let chain = Chain::from_values(vec![1, 2, 1, 3, 2, 4, 5, 6, 7, 8, 2, 9, 10]).op_drop_while(|n| *n < 4);
        // 边界之后的`2`不会再被条件丢弃
        assert_eq!(drain(chain), vec![4, 5, 6, 7, 8, 2, 9, 10]);
    }

    #[test]
    fn test_flat_map_drains_buffer_before_upstream() {
        let chain = Chain::from_values(vec![1, 2, 3]).op_flat_map(|n| 0..n);
        assert_eq!(drain(chain), vec![0, 0, 1, 0, 1, 2]);
    }

    #[test]
    fn test_flat_map_empty_sub_sequences() {
        let chain = Chain::from_values(vec![0, 2, 0]).op_flat_map(|n| 0..n);
        assert_eq!(drain(chain), vec![0, 1]);
    }

    #[test]
    fn test_distinct_keeps_first_occurrence_order() {
        let chain = Chain::from_values(vec![3, 1, 3, 2, 1, 3]).op_distinct();
        assert_eq!(drain(chain), vec![3, 1, 2]);
    }

    #[test]
    fn test_sorted_is_a_barrier() {
        let pulls = Rc::new(Cell::new(0));
        let mut chain = counted(vec![3, 1, 2], &pulls).op_sorted();
        // 首次拉取即耗尽整个上游
        assert_eq!(chain.next(), Some(Ok(1)));
        assert_eq!(pulls.get(), 3);
        assert_eq!(chain.next(), Some(Ok(2)));
        assert_eq!(chain.next(), Some(Ok(3)));
        assert_eq!(chain.next(), None);
    }

    #[test]
    fn test_sorted_by_is_stable() {
        let chain = Chain::from_values(vec!["bb", "aa", "c", "dd", "e"]).op_sorted_by(|l, r| l.len().cmp(&r.len()));
        assert_eq!(drain(chain), vec!["c", "e", "bb", "aa", "dd"]);
    }

    #[test]
    fn test_sorted_without_usable_ordering() {
        let mut chain = Chain::from_values(vec![1.0, f64::NAN, 2.0]).op_sorted();
        assert_eq!(chain.next(), Some(Err(PipeErr::UncomparableErr)));
        assert_eq!(chain.next(), None);
    }

    #[test]
    fn test_error_passes_through_downstream_stages() {
        let chain = Chain::from_values(vec![1.0, f64::NAN]).op_sorted().op_skip(1);
        let result: Result<Vec<f64>, PipeErr> = chain.collect();
        assert_eq!(result, Err(PipeErr::UncomparableErr));
    }
}
