//! Dimension Trees
//!
//! Hierarchical progressive unlock for composite questions.
//!
//! Each tree level corresponds to one orthogonal attribute of a
//! question (chord type, then root note, then octave, ...). Walking
//! root to leaf assigns every attribute, choosing among *enabled*
//! siblings by weighted random choice with weight `(limit - score)^2`.
//! Siblings unlock strictly in declaration order: the next one is
//! enabled only when every already-enabled sibling has been lifted
//! above its threshold. Mastering chord types therefore unlocks new
//! root notes without a combinatorial explosion of flat score entries.
//!
//! Scores are the same EMA as the flat scheduler's: `score = score *
//! decay + delta` with limit `1 / (1 - decay)`.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::sampling::{default_rng, weighted_pick};
use crate::types::{CompositeQuestion, ConfigError, QuizScheduler, DEFAULT_DECAY};

// ==================== Configuration ====================

/// Tree-wide tuning, copied onto every node at build time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DimensionConfig {
    /// EMA decay factor, `0 <= decay < 1`
    pub decay: f64,
    /// Mastery threshold; an enabled sibling sitting at or below this
    /// defers enabling of later siblings ("still work to do here")
    pub threshold: f64,
    /// RNG seed for reproducible runs; `None` seeds from the clock
    pub seed: Option<u64>,
}

impl Default for DimensionConfig {
    fn default() -> Self {
        Self {
            decay: DEFAULT_DECAY,
            threshold: 0.5,
            seed: None,
        }
    }
}

// ==================== Tree Building ====================

/// Declarative description of one dimension value and everything
/// underneath it, used to build a [`DimensionTree`].
#[derive(Clone, Debug)]
pub struct DimensionSpec<V> {
    /// Question attribute this node assigns, e.g. `"chord_type"`
    pub field: String,
    /// Value assigned to that attribute
    pub value: V,
    /// Next-level variants, or empty for a leaf dimension
    pub children: Vec<DimensionSpec<V>>,
}

impl<V> DimensionSpec<V> {
    /// A node with children on the next level.
    pub fn new(field: impl Into<String>, value: V, children: Vec<Self>) -> Self {
        Self {
            field: field.into(),
            value,
            children,
        }
    }

    /// A bottom-level node.
    pub fn leaf(field: impl Into<String>, value: V) -> Self {
        Self::new(field, value, Vec::new())
    }
}

// ==================== Tree ====================

type NodeId = usize;

/// Nodes actually traversed to build one question, root excluded.
/// Returned by [`DimensionTree::fill`] and consumed by
/// [`DimensionTree::update`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DimensionPath(Vec<NodeId>);

#[derive(Clone, Debug)]
struct Node<V> {
    field: String,
    /// `None` only for the root, which assigns nothing
    value: Option<V>,
    children: Vec<NodeId>,
    score: f64,
    enabled: bool,
    decay: f64,
    limit: f64,
    threshold: f64,
}

impl<V> Node<V> {
    fn update_score(&mut self, correct: bool) {
        self.score *= self.decay;
        self.score += if correct { 1.0 } else { -1.0 };
    }
}

/// Arena-backed dimension tree. Structure is fixed at construction;
/// only `score` and `enabled` flags mutate over a session.
#[derive(Clone, Debug)]
pub struct DimensionTree<V> {
    nodes: Vec<Node<V>>,
    rng: ChaCha8Rng,
}

impl<V: Clone + PartialEq> DimensionTree<V> {
    /// Build a tree from first-level variant specs.
    ///
    /// The root is always enabled and carries no value; everything else
    /// starts disabled until the sequential unlock reaches it.
    pub fn new(variants: Vec<DimensionSpec<V>>, config: DimensionConfig) -> Result<Self, ConfigError> {
        if !(0.0..1.0).contains(&config.decay) || config.decay.is_nan() {
            return Err(ConfigError::InvalidDecay(config.decay));
        }
        if config.threshold <= 0.0 || config.threshold.is_nan() {
            return Err(ConfigError::InvalidThreshold(config.threshold));
        }
        if variants.is_empty() {
            return Err(ConfigError::EmptyTree);
        }

        let mut tree = Self {
            nodes: vec![Node {
                field: String::new(),
                value: None,
                children: Vec::new(),
                score: 0.0,
                enabled: true,
                decay: config.decay,
                limit: 1.0 / (1.0 - config.decay),
                threshold: config.threshold,
            }],
            rng: match config.seed {
                Some(seed) => ChaCha8Rng::seed_from_u64(seed),
                None => default_rng(),
            },
        };
        for spec in variants {
            let child = tree.add_subtree(spec, &config);
            tree.nodes[0].children.push(child);
        }
        Ok(tree)
    }

    fn add_subtree(&mut self, spec: DimensionSpec<V>, config: &DimensionConfig) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            field: spec.field,
            value: Some(spec.value),
            children: Vec::new(),
            score: 0.0,
            enabled: false,
            decay: config.decay,
            limit: 1.0 / (1.0 - config.decay),
            threshold: config.threshold,
        });
        for child_spec in spec.children {
            let child = self.add_subtree(child_spec, config);
            self.nodes[id].children.push(child);
        }
        id
    }

    /// Fill every attribute of `question` by walking root to leaf,
    /// unlocking and weighting variants as it goes. Returns the path
    /// of traversed nodes for the matching [`update`](Self::update).
    pub fn fill<Q>(&mut self, question: &mut Q) -> DimensionPath
    where
        Q: CompositeQuestion<Value = V>,
    {
        let mut path = Vec::new();
        let mut current = 0;
        loop {
            if self.nodes[current].children.is_empty() {
                break;
            }
            self.maybe_enable_variant(current);

            let options: Vec<NodeId> = self.nodes[current]
                .children
                .iter()
                .copied()
                .filter(|&c| self.nodes[c].enabled)
                .collect();
            let mut weights: Vec<f64> = options
                .iter()
                .map(|&c| {
                    let node = &self.nodes[c];
                    let headroom = node.limit - node.score;
                    headroom * headroom
                })
                .collect();
            // At least the first child is enabled after the scan above.
            let picked = options[weighted_pick(&mut self.rng, &mut weights)
                .unwrap_or_else(|| panic!("dimension level has no enabled variants"))];

            let node = &self.nodes[picked];
            trace!(field = %node.field, "descending");
            if let Some(value) = &node.value {
                question.set(&node.field, value);
            }
            path.push(picked);
            current = picked;
        }
        DimensionPath(path)
    }

    /// Enable the next still-disabled variant under `parent`, unless an
    /// earlier enabled sibling still sits at or below its threshold.
    ///
    /// Enabling is strictly sequential and monotonic: declaration
    /// order, never skipping ahead, never re-disabling.
    fn maybe_enable_variant(&mut self, parent: NodeId) {
        for c in self.nodes[parent].children.clone() {
            let node = &self.nodes[c];
            if node.enabled {
                if node.score <= node.threshold {
                    // Still work to do on this sibling first.
                    break;
                }
            } else {
                debug!(field = %node.field, "enabling variant");
                self.nodes[c].enabled = true;
                break;
            }
        }
    }

    /// Record an answer for a question built by [`fill`](Self::fill).
    ///
    /// Updates the root's aggregate score and every node on `path`; on
    /// a wrong answer additionally penalizes the first-level sibling
    /// matching the wrong choice's value, so the confused pair of
    /// variants both come up more often.
    pub fn update<Q>(&mut self, got: &Q, expected: &Q, path: &DimensionPath)
    where
        Q: CompositeQuestion<Value = V> + PartialEq,
    {
        let correct = got == expected;
        self.nodes[0].update_score(correct);
        for &id in &path.0 {
            self.nodes[id].update_score(correct);
        }

        if !correct {
            for c in self.nodes[0].children.clone() {
                let node = &self.nodes[c];
                if got.get(&node.field) == node.value {
                    self.nodes[c].update_score(false);
                }
            }
        }
    }

    /// Values of the enabled first-level variants: the pool of
    /// distinguishable answers currently in play.
    pub fn in_play(&self) -> Vec<V> {
        self.nodes[0]
            .children
            .iter()
            .filter(|&&c| self.nodes[c].enabled)
            .filter_map(|&c| self.nodes[c].value.clone())
            .collect()
    }

    /// Attribute name assigned at the first level.
    pub fn first_field(&self) -> &str {
        &self.nodes[self.nodes[0].children[0]].field
    }

    /// The root's aggregate EMA score over all answers.
    pub fn aggregate_score(&self) -> f64 {
        self.nodes[0].score
    }
}

// ==================== Scheduler Wrapper ====================

/// Adapter fitting a [`DimensionTree`] to the common
/// [`QuizScheduler`] interface.
///
/// Questions are built into `Q::default()`; the path of the last drawn
/// question is remembered so the strictly alternating `draw`/`update`
/// loop needs no back-references on the question itself.
pub struct DimensionScheduler<Q: CompositeQuestion> {
    tree: DimensionTree<Q::Value>,
    last_path: Option<DimensionPath>,
}

impl<Q> DimensionScheduler<Q>
where
    Q: CompositeQuestion + PartialEq,
    Q::Value: Clone + PartialEq,
{
    /// Wrap a tree built from `variants`.
    pub fn new(variants: Vec<DimensionSpec<Q::Value>>, config: DimensionConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            tree: DimensionTree::new(variants, config)?,
            last_path: None,
        })
    }

    /// The underlying tree, for diagnostics.
    pub fn tree(&self) -> &DimensionTree<Q::Value> {
        &self.tree
    }
}

impl<Q> QuizScheduler<Q> for DimensionScheduler<Q>
where
    Q: CompositeQuestion + PartialEq,
    Q::Value: Clone + PartialEq,
{
    fn draw(&mut self) -> Q {
        let mut question = Q::default();
        self.last_path = Some(self.tree.fill(&mut question));
        question
    }

    /// One alternative per in-play first-level value, sharing all of
    /// `expected`'s other attributes.
    fn options(&self, expected: &Q) -> Vec<Q> {
        let field = self.tree.first_field().to_string();
        self.tree
            .in_play()
            .into_iter()
            .map(|value| {
                let mut option = expected.clone();
                option.set(&field, &value);
                option
            })
            .collect()
    }

    /// # Panics
    ///
    /// Panics if called twice in a row or before any draw; `draw` and
    /// `update` alternate strictly.
    fn update(&mut self, choice: &Q, expected: &Q) {
        let path = self
            .last_path
            .take()
            .unwrap_or_else(|| panic!("update called without a preceding draw"));
        self.tree.update(choice, expected, &path);
    }
}
