// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Degree index: host nodes partitioned by structural degree class.
//!
//! Every live node sits in exactly one [`ElemList`] bucket, keyed by its
//! [`DegreeClass`] (out/in/loop degree saturated at [`DegreeCaps`], plus the
//! root flag). The index is only ever mutated through [`DegreeIndex::place`]
//! and [`DegreeIndex::remove`], which [`crate::Host`] calls after every graph
//! edit.
use rustc_hash::FxHashMap;

use crate::graph::Degrees;
use crate::ident::NodeId;

/// Saturation caps for the degree components of a [`DegreeClass`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DegreeCaps {
    /// Highest distinguished out-degree.
    pub out: u8,
    /// Highest distinguished in-degree.
    pub inc: u8,
    /// Highest distinguished loop count.
    pub loops: u8,
}

impl Default for DegreeCaps {
    fn default() -> Self {
        Self {
            out: 3,
            inc: 3,
            loops: 1,
        }
    }
}

impl DegreeCaps {
    /// Classifies live degrees into a bucket key.
    #[must_use]
    pub fn classify(&self, d: Degrees) -> DegreeClass {
        DegreeClass {
            root: d.root,
            out: saturate(d.out, self.out),
            inc: saturate(d.inc, self.inc),
            loops: saturate(d.loops, self.loops),
        }
    }

    /// Every class that may hold a node admitted by `t`.
    ///
    /// Rooted classes come first, then classes in ascending degree order.
    #[must_use]
    pub fn search_space(&self, t: Thresholds) -> Vec<DegreeClass> {
        let roots: &[bool] = if t.root { &[true] } else { &[true, false] };
        let outs = component_range(t.out, self.out, t.exact);
        let incs = component_range(t.inc, self.inc, t.exact);
        let loops = component_range(t.loops, self.loops, t.exact);
        let mut space = Vec::new();
        for &root in roots {
            for out in outs.clone() {
                for inc in incs.clone() {
                    for l in loops.clone() {
                        space.push(DegreeClass {
                            root,
                            out,
                            inc,
                            loops: l,
                        });
                    }
                }
            }
        }
        space
    }
}

fn saturate(v: usize, cap: u8) -> u8 {
    u8::try_from(v).map_or(cap, |v| v.min(cap))
}

fn component_range(min: usize, cap: u8, exact: bool) -> std::ops::RangeInclusive<u8> {
    let lo = saturate(min, cap);
    if exact {
        lo..=lo
    } else {
        lo..=cap
    }
}

/// Bucket key: saturated degrees plus the root flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DegreeClass {
    /// Root flag.
    pub root: bool,
    /// Saturated out-degree.
    pub out: u8,
    /// Saturated in-degree.
    pub inc: u8,
    /// Saturated loop count.
    pub loops: u8,
}

/// Minimum degrees a host node must have to bind a pattern node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Thresholds {
    /// Required out-degree.
    pub out: usize,
    /// Required in-degree.
    pub inc: usize,
    /// Required loop count.
    pub loops: usize,
    /// Whether the host node must be a root.
    pub root: bool,
    /// Require degrees to be equal rather than at least the thresholds.
    ///
    /// Set for pattern nodes the rule deletes, so no unmatched edge is left
    /// dangling.
    pub exact: bool,
}

impl Thresholds {
    /// The candidate test: `outdeg ≥ o ∧ indeg ≥ i ∧ loopdeg ≥ l ∧ rooted ≥ r`.
    #[must_use]
    pub fn admits(&self, d: Degrees) -> bool {
        let degrees_ok = if self.exact {
            d.out == self.out && d.inc == self.inc && d.loops == self.loops
        } else {
            d.out >= self.out && d.inc >= self.inc && d.loops >= self.loops
        };
        degrees_ok && (d.root || !self.root)
    }
}

/// Ordered, mutable set of node ids forming one bucket.
///
/// Removal swaps the last element into the hole, so order is only stable
/// between edits.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ElemList {
    elems: Vec<NodeId>,
}

static EMPTY_BUCKET: ElemList = ElemList { elems: Vec::new() };

impl ElemList {
    /// Number of ids in the bucket.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elems.len()
    }

    /// `true` if the bucket holds no ids.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    /// Id at position `i`.
    #[must_use]
    pub fn get(&self, i: usize) -> Option<NodeId> {
        self.elems.get(i).copied()
    }

    /// Ids in bucket storage order.
    #[must_use]
    pub fn as_slice(&self) -> &[NodeId] {
        &self.elems
    }
}

/// Node ids partitioned by [`DegreeClass`].
#[derive(Clone, Debug, Default)]
pub struct DegreeIndex {
    caps: DegreeCaps,
    buckets: FxHashMap<DegreeClass, ElemList>,
    /// Per node slot: current class and position within its bucket.
    placement: Vec<Option<(DegreeClass, usize)>>,
}

impl DegreeIndex {
    /// Creates an empty index with the given caps.
    #[must_use]
    pub fn new(caps: DegreeCaps) -> Self {
        Self {
            caps,
            buckets: FxHashMap::default(),
            placement: Vec::new(),
        }
    }

    /// Saturation caps in force.
    #[must_use]
    pub fn caps(&self) -> DegreeCaps {
        self.caps
    }

    /// The bucket for `class`; empty when no node currently has that class.
    #[must_use]
    pub fn bucket(&self, class: DegreeClass) -> &ElemList {
        self.buckets.get(&class).unwrap_or(&EMPTY_BUCKET)
    }

    /// Class currently recorded for `id`.
    #[must_use]
    pub fn class_of(&self, id: NodeId) -> Option<DegreeClass> {
        self.placement.get(id.index()).copied().flatten().map(|(c, _)| c)
    }

    /// Number of indexed nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.values().map(ElemList::len).sum()
    }

    /// `true` when no node is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Non-empty buckets in class order.
    pub fn classes(&self) -> Vec<DegreeClass> {
        let mut classes: Vec<DegreeClass> = self
            .buckets
            .iter()
            .filter(|(_, b)| !b.is_empty())
            .map(|(c, _)| *c)
            .collect();
        classes.sort_unstable();
        classes
    }

    /// Puts `id` in the bucket for `degrees`, relocating it if needed.
    ///
    /// This is the single choke point for index writes.
    pub(crate) fn place(&mut self, id: NodeId, degrees: Degrees) {
        let class = self.caps.classify(degrees);
        if self.class_of(id) == Some(class) {
            return;
        }
        self.remove(id);
        let bucket = self.buckets.entry(class).or_default();
        bucket.elems.push(id);
        let pos = bucket.elems.len() - 1;
        if self.placement.len() <= id.index() {
            self.placement.resize(id.index() + 1, None);
        }
        self.placement[id.index()] = Some((class, pos));
    }

    /// Drops `id` from whatever bucket holds it.
    pub(crate) fn remove(&mut self, id: NodeId) {
        let Some((class, pos)) = self.placement.get_mut(id.index()).and_then(Option::take) else {
            return;
        };
        let Some(bucket) = self.buckets.get_mut(&class) else {
            debug_assert!(false, "placement references a missing bucket: {class:?}");
            return;
        };
        let removed = bucket.elems.swap_remove(pos);
        debug_assert_eq!(removed, id, "bucket position desynced for {id:?}");
        if let Some(&moved) = bucket.elems.get(pos) {
            if let Some(Some((_, p))) = self.placement.get_mut(moved.index()) {
                *p = pos;
            }
        }
    }
}
