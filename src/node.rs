// MCTS node arena
//
// Fixed-size arena of tree nodes addressed by index. Slot 0 is the `zero`
// sentinel every unexpanded child points to, slot 1 the root. A node keeps
// up to eight child slots; wider nodes spill the tail of their answers into
// ex-node slots holding `EXNODE_CHILDREN` indices each.

use crate::step::{Step, StepMask, QSTEPS};

pub type NodeIndex = u32;

pub const ZERO: NodeIndex = 0;
pub const ROOT: NodeIndex = 1;

/// Child indices stored by one ex-node slot
pub const EXNODE_CHILDREN: usize = QSTEPS + 4;
/// Widest node the layout can represent
pub const MAX_QANSWERS: usize = QSTEPS * EXNODE_CHILDREN;
/// Longest serie a path node can pack
pub const MAX_PACKED_STEPS: usize = 17;

/// Bytes per arena slot, used to turn a cache size into a node count
pub const NODE_SIZE: usize = std::mem::size_of::<Slot>();
/// Smallest accepted cache
pub const MIN_CACHE: usize = 16 * NODE_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Root or sentinel
    Terminal,
    /// Single step of a regular move
    Single,
    /// Group of path nodes sharing a landing point
    BallMove,
    /// Packed free-kick serie
    Path,
}

impl NodeKind {
    pub fn as_char(self) -> char {
        match self {
            NodeKind::Terminal => 'T',
            NodeKind::Single => 'S',
            NodeKind::BallMove => 'B',
            NodeKind::Path => 'P',
        }
    }
}

/// Step sequence packed three bits per step, first step in the lowest bits
///
/// The 51 bits split into the 3-bit head, a 16-bit middle part and a 32-bit
/// high part, matching the storage of a path node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PackedSerie {
    bits: u64,
    len: u8,
}

impl PackedSerie {
    /// Packs up to `MAX_PACKED_STEPS` steps
    pub fn pack(steps: &[Step]) -> Option<PackedSerie> {
        if steps.len() > MAX_PACKED_STEPS {
            return None;
        }
        let bits = steps
            .iter()
            .rev()
            .fold(0u64, |bits, step| (bits << 3) | step.index() as u64);
        Some(PackedSerie {
            bits,
            len: steps.len() as u8,
        })
    }

    pub fn unpack(&self) -> Vec<Step> {
        let mut bits = self.bits;
        (0..self.len)
            .filter_map(|_| {
                let step = Step::from_index((bits & 7) as u8);
                bits >>= 3;
                step
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn first(&self) -> Option<Step> {
        if self.len == 0 {
            None
        } else {
            Step::from_index((self.bits & 7) as u8)
        }
    }

    /// Bits 0..2
    pub fn head(&self) -> u8 {
        (self.bits & 7) as u8
    }

    /// Bits 3..18
    pub fn mpack(&self) -> u16 {
        ((self.bits >> 3) & 0xFFFF) as u16
    }

    /// Bits 19..50
    pub fn high(&self) -> u32 {
        (self.bits >> 19) as u32
    }

    pub fn from_parts(head: u8, mpack: u16, high: u32, len: usize) -> PackedSerie {
        PackedSerie {
            bits: (head as u64 & 7) | ((mpack as u64) << 3) | ((high as u64) << 19),
            len: len.min(MAX_PACKED_STEPS) as u8,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub score: i32,
    pub qgames: i32,
    pub kind: NodeKind,
    pub step: Option<Step>,
    /// `None` until the answers are computed
    pub qanswers: Option<usize>,
    /// Legal steps cached for regular positions
    pub steps: StepMask,
    pub ball: i32,
    pub serie: PackedSerie,
    children: [NodeIndex; QSTEPS],
}

impl Node {
    fn new(kind: NodeKind, step: Option<Step>) -> Self {
        Node {
            score: 0,
            qgames: 0,
            kind,
            step,
            qanswers: None,
            steps: 0,
            ball: crate::geometry::NO_WAY,
            serie: PackedSerie::default(),
            children: [ZERO; QSTEPS],
        }
    }
}

#[derive(Debug, Clone)]
enum Slot {
    Node(Node),
    Ex([NodeIndex; EXNODE_CHILDREN]),
}

/// Ex-node slots needed for `qanswers` children
fn extra_nodes(qanswers: usize) -> usize {
    if qanswers <= QSTEPS {
        0
    } else {
        (qanswers - QSTEPS + EXNODE_CHILDREN - 2) / (EXNODE_CHILDREN - 1)
    }
}

/// Arena failure while materialising answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    OutOfNodes,
    TooManyAnswers(usize),
    NotANode(NodeIndex),
}

#[derive(Debug, Clone, Default)]
pub struct NodeArena {
    slots: Vec<Slot>,
    total: usize,
    good_alloc: u32,
    bad_alloc: u32,
}

impl NodeArena {
    /// Arena holding `cache_bytes / NODE_SIZE` slots
    pub fn with_cache(cache_bytes: usize) -> Self {
        let total = cache_bytes / NODE_SIZE;
        NodeArena {
            slots: Vec::with_capacity(total),
            total,
            good_alloc: 0,
            bad_alloc: 0,
        }
    }

    /// Forgets every node and zeroes the allocation counters
    pub fn reset(&mut self) {
        self.slots.clear();
        self.good_alloc = 0;
        self.bad_alloc = 0;
    }

    pub fn used(&self) -> usize {
        self.slots.len()
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn good_alloc(&self) -> u32 {
        self.good_alloc
    }

    pub fn bad_alloc(&self) -> u32 {
        self.bad_alloc
    }

    fn alloc_slot(&mut self, slot: Slot) -> Option<NodeIndex> {
        if self.slots.len() >= self.total {
            self.bad_alloc += 1;
            return None;
        }
        self.good_alloc += 1;
        self.slots.push(slot);
        Some((self.slots.len() - 1) as NodeIndex)
    }

    pub fn alloc(&mut self, kind: NodeKind, step: Option<Step>) -> Option<NodeIndex> {
        self.alloc_slot(Slot::Node(Node::new(kind, step)))
    }

    pub fn get(&self, index: NodeIndex) -> Option<&Node> {
        match self.slots.get(index as usize) {
            Some(Slot::Node(node)) => Some(node),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, index: NodeIndex) -> Option<&mut Node> {
        match self.slots.get_mut(index as usize) {
            Some(Slot::Node(node)) => Some(node),
            _ => None,
        }
    }

    fn ex_children(&self, index: NodeIndex) -> Option<&[NodeIndex; EXNODE_CHILDREN]> {
        match self.slots.get(index as usize) {
            Some(Slot::Ex(children)) => Some(children),
            _ => None,
        }
    }

    /// Location of the child slot of `answer`: direct or inside an ex-node
    fn answer_slot(&self, node: &Node, answer: usize) -> Option<(Option<NodeIndex>, usize)> {
        let qanswers = node.qanswers?;
        if answer >= qanswers {
            return None;
        }

        let q0 = QSTEPS - extra_nodes(qanswers);
        if answer < q0 {
            return Some((None, answer));
        }

        let block = (answer - q0) / EXNODE_CHILDREN;
        let offset = (answer - q0) % EXNODE_CHILDREN;
        Some((Some(node.children[q0 + block]), offset))
    }

    /// Index of the child for `answer`, `ZERO` while it is unexpanded
    pub fn answer(&self, index: NodeIndex, answer: usize) -> Option<NodeIndex> {
        let node = self.get(index)?;
        match self.answer_slot(node, answer)? {
            (None, slot) => Some(node.children[slot]),
            (Some(ex), offset) => self.ex_children(ex).map(|children| children[offset]),
        }
    }

    /// Links `child` as the node for `answer`
    pub fn set_answer(&mut self, index: NodeIndex, answer: usize, child: NodeIndex) -> bool {
        let location = match self.get(index) {
            Some(node) => self.answer_slot(node, answer),
            None => None,
        };
        match location {
            Some((None, slot)) => match self.get_mut(index) {
                Some(node) => {
                    node.children[slot] = child;
                    true
                }
                None => false,
            },
            Some((Some(ex), offset)) => match self.slots.get_mut(ex as usize) {
                Some(Slot::Ex(children)) => {
                    children[offset] = child;
                    true
                }
                _ => false,
            },
            None => false,
        }
    }

    /// Allocates `qanswers` children of `kind` under `index`, spilling into
    /// ex-nodes when they do not fit into the eight direct slots
    pub fn alloc_answers(
        &mut self,
        index: NodeIndex,
        qanswers: usize,
        kind: NodeKind,
    ) -> Result<(), AllocError> {
        if qanswers > MAX_QANSWERS {
            return Err(AllocError::TooManyAnswers(qanswers));
        }
        if self.get(index).is_none() {
            return Err(AllocError::NotANode(index));
        }

        let extra = extra_nodes(qanswers);
        let q0 = QSTEPS - extra;
        let mut children = [ZERO; QSTEPS];

        for slot in children.iter_mut().skip(q0).take(extra) {
            *slot = self
                .alloc_slot(Slot::Ex([ZERO; EXNODE_CHILDREN]))
                .ok_or(AllocError::OutOfNodes)?;
        }

        let direct = qanswers.min(q0);
        for slot in children.iter_mut().take(direct) {
            *slot = self.alloc(kind, None).ok_or(AllocError::OutOfNodes)?;
        }

        for counter in 0..qanswers.saturating_sub(q0) {
            let child = self.alloc(kind, None).ok_or(AllocError::OutOfNodes)?;
            let ex = children[q0 + counter / EXNODE_CHILDREN];
            match self.slots.get_mut(ex as usize) {
                Some(Slot::Ex(ex_children)) => ex_children[counter % EXNODE_CHILDREN] = child,
                _ => return Err(AllocError::NotANode(ex)),
            }
        }

        let node = self.get_mut(index).ok_or(AllocError::NotANode(index))?;
        node.children = children;
        node.qanswers = Some(qanswers);
        Ok(())
    }
}
