//! 聚合收集框架：`(创建容器, 逐元素折叠, 完成收尾)`契约及其内置实现。
//!
//! 内置收集器覆盖三种映射聚合：[`to_map`]（键值抽取，重复键报错）、
//! [`grouping_by`]（按分类函数分组，键保持首现顺序）、[`partitioning_by`]
//! （按布尔条件二分，`true`/`false`两个键恒存在）。

use crate::err::PipeErr;
use rustc_hash::FxHashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::fmt::Debug;
use std::hash::Hash;

/// 聚合收集契约，由[`Pipeline::collect`](crate::Pipeline::collect)在终止求值时驱动：
/// 先`supply`创建容器，对每个产出元素`fold`一次，耗尽后`finish`收尾。
pub trait Collector<T> {
    /// 累积容器类型
    type Acc;
    /// 收尾后的结果类型
    type Out;

    fn supply(&self) -> Self::Acc;

    /// 将一个元素折叠进容器，失败会中止整个收集并传播给调用方。
    fn fold(&mut self, acc: &mut Self::Acc, value: T) -> Result<(), PipeErr>;

    fn finish(&self, acc: Self::Acc) -> Self::Out;
}

/// 键值抽取收集器：对每个元素计算`(key, value)`并装入映射。
/// 重复键以[`PipeErr::DuplicateKeyErr`]失败并指明冲突键，绝不静默覆盖。
pub fn to_map<KF, VF>(key_fn: KF, value_fn: VF) -> ToMap<KF, VF> {
    ToMap { key_fn, value_fn }
}

/// 分组收集器：按分类函数将元素分组为键到成员列表的映射。
/// 组内成员保持遭遇顺序，键保持首现顺序。
pub fn grouping_by<CF>(classifier: CF) -> GroupingBy<CF> {
    GroupingBy { classifier }
}

/// 二分收集器：按布尔条件将元素分为`true`/`false`两组。
/// 两个键总是存在，空分组表示为空列表而不是缺失的键。
pub fn partitioning_by<PF>(pred: PF) -> PartitioningBy<PF> {
    PartitioningBy { pred }
}

pub struct ToMap<KF, VF> {
    key_fn: KF,
    value_fn: VF,
}

impl<T, K, V, KF, VF> Collector<T> for ToMap<KF, VF>
where
    K: Eq + Hash + Debug,
    KF: FnMut(&T) -> K,
    VF: FnMut(T) -> V,
{
    type Acc = FxHashMap<K, V>;
    type Out = FxHashMap<K, V>;

    fn supply(&self) -> Self::Acc {
        FxHashMap::default()
    }

    fn fold(&mut self, acc: &mut Self::Acc, value: T) -> Result<(), PipeErr> {
        let key = (self.key_fn)(&value);
        match acc.entry(key) {
            Entry::Occupied(entry) => Err(PipeErr::DuplicateKeyErr { key: format!("{:?}", entry.key()) }),
            Entry::Vacant(entry) => {
                entry.insert((self.value_fn)(value));
                Ok(())
            }
        }
    }

    fn finish(&self, acc: Self::Acc) -> Self::Out {
        acc
    }
}

pub struct GroupingBy<CF> {
    classifier: CF,
}

impl<T, K, CF> Collector<T> for GroupingBy<CF>
where
    K: Eq + Hash + Clone,
    CF: FnMut(&T) -> K,
{
    type Acc = OrderedMap<K, Vec<T>>;
    type Out = OrderedMap<K, Vec<T>>;

    fn supply(&self) -> Self::Acc {
        OrderedMap::new()
    }

    fn fold(&mut self, acc: &mut Self::Acc, value: T) -> Result<(), PipeErr> {
        let key = (self.classifier)(&value);
        acc.get_or_insert_with(key, Vec::new).push(value);
        Ok(())
    }

    fn finish(&self, acc: Self::Acc) -> Self::Out {
        acc
    }
}

pub struct PartitioningBy<PF> {
    pred: PF,
}

impl<T, PF> Collector<T> for PartitioningBy<PF>
where
    PF: FnMut(&T) -> bool,
{
    type Acc = (Vec<T>, Vec<T>);
    type Out = FxHashMap<bool, Vec<T>>;

    fn supply(&self) -> Self::Acc {
        (Vec::new(), Vec::new())
    }

    fn fold(&mut self, acc: &mut Self::Acc, value: T) -> Result<(), PipeErr> {
        if (self.pred)(&value) { acc.0.push(value) } else { acc.1.push(value) }
        Ok(())
    }

    fn finish(&self, (matched, unmatched): Self::Acc) -> Self::Out {
        let mut map = FxHashMap::default();
        map.insert(true, matched);
        map.insert(false, unmatched);
        map
    }
}

/// 保持键首次插入顺序的映射，作为[`grouping_by`]的分组结果。
/// 键索引基于hash，条目本身按插入顺序存放。
pub struct OrderedMap<K, V> {
    index: FxHashMap<K, usize>,
    entries: Vec<(K, V)>,
}

impl<K: Eq + Hash + Clone, V> OrderedMap<K, V> {
    pub(crate) fn new() -> OrderedMap<K, V> {
        OrderedMap { index: FxHashMap::default(), entries: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.index.get(key).map(|&at| &self.entries[at].1)
    }

    /// 按首次插入顺序迭代键。
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.iter().map(|(key, _)| key)
    }

    /// 按首次插入顺序迭代键值对。
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter().map(|(key, value)| (key, value))
    }

    pub(crate) fn get_or_insert_with(&mut self, key: K, default: impl FnOnce() -> V) -> &mut V {
        let at = match self.index.get(&key) {
            Some(&at) => at,
            None => {
                let at = self.entries.len();
                self.index.insert(key.clone(), at);
                self.entries.push((key, default()));
                at
            }
        };
        &mut self.entries[at].1
    }
}

impl<K, V> IntoIterator for OrderedMap<K, V> {
    type Item = (K, V);
    type IntoIter = std::vec::IntoIter<(K, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<K: Debug, V: Debug> Debug for OrderedMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter().map(|(key, value)| (key, value))).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipe::Pipeline;
    use itertools::Itertools;

    #[test]
    fn test_to_map_by_name_length() {
        let map = Pipeline::of(["Setyarto", "Sudaryati", "Gurindo Sekti", "Hari Setiaji"])
            .map(str::to_uppercase)
            .unwrap()
            .collect(to_map(|name: &String| name.len(), |name| name))
            .unwrap();
        assert_eq!(map.len(), 4);
        assert_eq!(map.get(&8), Some(&"SETYARTO".to_string()));
        assert_eq!(map.get(&9), Some(&"SUDARYATI".to_string()));
    }

    #[test]
    fn test_to_map_rejects_duplicate_keys() {
        let result = Pipeline::of(["Hari", "Budi", "Hani"])
            .collect(to_map(|name: &&str| name.len(), |name| name));
        assert_eq!(result, Err(PipeErr::DuplicateKeyErr { key: "4".to_string() }));
    }

    #[test]
    fn test_grouping_by_even_or_odd() {
        let groups = Pipeline::of([1, 2, 3, 4, 5, 6, 7, 8, 9, 10])
            .collect(grouping_by(|n: &i32| if n % 2 == 0 { "Even" } else { "Odd" }))
            .unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups.get(&"Even"), Some(&vec![2, 4, 6, 8, 10]));
        assert_eq!(groups.get(&"Odd"), Some(&vec![1, 3, 5, 7, 9]));
        // 键保持首现顺序：1先出现，Odd在前
        assert_eq!(groups.keys().collect_vec(), vec![&"Odd", &"Even"]);
    }

    #[test]
    fn test_grouping_preserves_member_encounter_order() {
        let groups = Pipeline::of(["Hari", "Budi", "Gurindo", "Edi", "Firman"])
            .collect(grouping_by(|name: &&str| name.len()))
            .unwrap();
        assert_eq!(groups.get(&4), Some(&vec!["Hari", "Budi"]));
        assert_eq!(groups.keys().collect_vec(), vec![&4, &7, &3, &6]);
    }

    #[test]
    fn test_partitioning_by_even() {
        let parts = Pipeline::of([1, 2, 3, 4, 5, 6, 7, 8, 9, 10])
            .collect(partitioning_by(|n: &i32| n % 2 == 0))
            .unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts.get(&true), Some(&vec![2, 4, 6, 8, 10]));
        assert_eq!(parts.get(&false), Some(&vec![1, 3, 5, 7, 9]));
    }

    #[test]
    fn test_partitioning_always_has_both_keys() {
        let parts = Pipeline::of([2, 4, 6]).collect(partitioning_by(|n: &i32| n % 2 == 0)).unwrap();
        assert_eq!(parts.get(&true), Some(&vec![2, 4, 6]));
        // 空分组表现为空列表而不是缺失的键
        assert_eq!(parts.get(&false), Some(&Vec::new()));
        let parts = Pipeline::<i32>::empty().collect(partitioning_by(|n: &i32| n % 2 == 0)).unwrap();
        assert_eq!(parts.len(), 2);
    }

    #[test]
    fn test_custom_collector() {
        /// 以分隔符拼接所有元素的收集器
        struct Joining {
            delimiter: &'static str,
        }

        impl Collector<&'static str> for Joining {
            type Acc = String;
            type Out = String;

            fn supply(&self) -> String {
                String::new()
            }

            fn fold(&mut self, acc: &mut String, value: &'static str) -> Result<(), PipeErr> {
                if !acc.is_empty() {
                    acc.push_str(self.delimiter);
                }
                acc.push_str(value);
                Ok(())
            }

            fn finish(&self, acc: String) -> String {
                acc
            }
        }

        let joined = Pipeline::of(["Hari", "Budi", "Edi"]).collect(Joining { delimiter: ", " }).unwrap();
        assert_eq!(joined, "Hari, Budi, Edi");
    }

    #[test]
    fn test_ordered_map_debug_keeps_insertion_order() {
        let mut map = OrderedMap::new();
        map.get_or_insert_with("b", || 1);
        map.get_or_insert_with("a", || 2);
        assert_eq!(format!("{map:?}"), r#"{"b": 1, "a": 2}"#);
    }
}
