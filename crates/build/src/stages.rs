//! Build stages and their execution order.
//!
//! Every config category is split into a `Register` stage (parse sources,
//! bind names) and a `Pack` stage (encode). `Pack(c)` runs after the
//! `Register` stage of every category its format references, so two
//! categories that reference each other still order cleanly.

use crate::error::BuildError;
use contentpack_common::Category;
use contentpack_config::Format;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Bind every name of a category: parse config sources, or sync an
    /// asset registry with the files on disk.
    Register(Category),
    Pack(Category),
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Register(c) => write!(f, "register {c}"),
            Stage::Pack(c) => write!(f, "pack {c}"),
        }
    }
}

impl Stage {
    fn dependencies(self) -> Vec<Stage> {
        match self {
            Stage::Register(_) => Vec::new(),
            Stage::Pack(category) => {
                let mut deps = vec![Stage::Register(category)];
                if let Some(format) = Format::of(category) {
                    deps.extend(format.references().into_iter().map(Stage::Register));
                }
                deps
            }
        }
    }
}

/// Order `nodes` so each follows its dependencies.
///
/// Kahn's algorithm; among ready nodes the smallest goes first, so the
/// order is deterministic. Dependencies outside `nodes` are ignored. On a
/// cycle the unordered nodes are returned as the error.
pub fn topological_order<T, F>(nodes: &BTreeSet<T>, dependencies: F) -> Result<Vec<T>, Vec<T>>
where
    T: Ord + Copy,
    F: Fn(T) -> Vec<T>,
{
    let mut in_degree: BTreeMap<T, usize> = nodes.iter().map(|n| (*n, 0)).collect();
    let mut dependents: BTreeMap<T, Vec<T>> = BTreeMap::new();
    for &node in nodes {
        for dep in dependencies(node).into_iter().filter(|d| nodes.contains(d)) {
            dependents.entry(dep).or_default().push(node);
            *in_degree.entry(node).or_default() += 1;
        }
    }

    let mut ready: BinaryHeap<Reverse<T>> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(node, _)| Reverse(*node))
        .collect();
    let mut order = Vec::with_capacity(nodes.len());
    while let Some(Reverse(node)) = ready.pop() {
        order.push(node);
        for next in dependents.get(&node).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(next) {
                *degree -= 1;
                if *degree == 0 {
                    ready.push(Reverse(*next));
                }
            }
        }
    }

    if order.len() != nodes.len() {
        return Err(nodes.iter().filter(|n| !order.contains(n)).copied().collect());
    }
    Ok(order)
}

/// Stages needed to pack `categories`, in execution order.
pub fn plan(categories: &[Category]) -> Result<Vec<Stage>, BuildError> {
    let mut nodes = BTreeSet::new();
    for &category in categories {
        if !category.is_config() {
            return Err(BuildError::NotConfig(category));
        }
        let pack = Stage::Pack(category);
        nodes.insert(pack);
        nodes.extend(pack.dependencies());
    }
    topological_order(&nodes, Stage::dependencies)
        .map_err(|stuck| BuildError::Cycle(stuck.iter().map(Stage::to_string).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(order: &[Stage], stage: Stage) -> usize {
        order.iter().position(|s| *s == stage).unwrap()
    }

    #[test]
    fn pack_follows_referenced_registers() {
        let order = plan(&Category::CONFIGS).unwrap();
        for category in Category::CONFIGS {
            let pack = position(&order, Stage::Pack(category));
            assert!(position(&order, Stage::Register(category)) < pack);
            for dep in Format::of(category).unwrap().references() {
                assert!(position(&order, Stage::Register(dep)) < pack, "{category} before {dep}");
            }
        }
    }

    #[test]
    fn mutual_references_do_not_cycle() {
        // seq references obj through held items, obj references seq
        let order = plan(&[Category::Seq, Category::Obj]).unwrap();
        assert!(position(&order, Stage::Register(Category::Obj)) < position(&order, Stage::Pack(Category::Seq)));
        assert!(position(&order, Stage::Register(Category::Seq)) < position(&order, Stage::Pack(Category::Obj)));
    }

    #[test]
    fn single_category_pulls_in_asset_registers() {
        let order = plan(&[Category::Flo]).unwrap();
        assert_eq!(
            order,
            [
                Stage::Register(Category::Flo),
                Stage::Register(Category::Texture),
                Stage::Pack(Category::Flo),
            ]
        );
    }

    #[test]
    fn assets_cannot_be_packed() {
        assert!(matches!(plan(&[Category::Model]), Err(BuildError::NotConfig(Category::Model))));
    }

    #[test]
    fn cycles_are_reported() {
        let nodes = BTreeSet::from([1, 2, 3]);
        let deps = |n: i32| match n {
            1 => vec![2],
            2 => vec![1],
            _ => vec![],
        };
        assert_eq!(topological_order(&nodes, deps), Err(vec![1, 2]));
        assert_eq!(topological_order(&BTreeSet::from([3, 1]), |_| vec![]), Ok(vec![1, 3]));
    }
}
