//! Guard condition evaluation
//!
//! Conditions decide whether a target runs. Combinators always evaluate all
//! of their children, so predicate side effects happen the same way no
//! matter which child decides the result.

use crate::error::{ConditionError, ConditionResult};
use crate::properties::{Expander, PropertyStore};
use std::collections::HashMap;
use std::fmt;

/// A boolean guard expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// String comparison of two expanded operands
    Equals {
        left: String,
        right: String,
        case_sensitive: bool,
        trim: bool,
    },
    Not(Box<Condition>),
    /// True when every child is true (empty: true)
    And(Vec<Condition>),
    /// True when any child is true (empty: false)
    Or(Vec<Condition>),
    /// True when an odd number of children are true
    Xor(Vec<Condition>),
    /// True when the expanded value is `true`, `yes` or `on`
    IsTrue(String),
    /// Delegates to [`PredicateResolver::available`]
    Available(String),
    /// Delegates to [`PredicateResolver::external`]
    External(String),
}

impl Condition {
    /// Case-sensitive, untrimmed equality
    pub fn equals(left: impl Into<String>, right: impl Into<String>) -> Self {
        Condition::Equals {
            left: left.into(),
            right: right.into(),
            case_sensitive: true,
            trim: false,
        }
    }

    pub fn is_true(value: impl Into<String>) -> Self {
        Condition::IsTrue(value.into())
    }

    pub fn available(reference: impl Into<String>) -> Self {
        Condition::Available(reference.into())
    }

    pub fn external(id: impl Into<String>) -> Self {
        Condition::External(id.into())
    }

    pub fn negate(self) -> Self {
        Condition::Not(Box::new(self))
    }

    /// Ids of every [`Condition::External`] node, depth first
    pub fn external_ids(&self) -> Vec<&str> {
        let mut ids = Vec::new();
        self.collect_external_ids(&mut ids);
        ids
    }

    fn collect_external_ids<'a>(&'a self, ids: &mut Vec<&'a str>) {
        match self {
            Condition::External(id) => ids.push(id),
            Condition::Not(inner) => inner.collect_external_ids(ids),
            Condition::And(children) | Condition::Or(children) | Condition::Xor(children) => {
                for child in children {
                    child.collect_external_ids(ids);
                }
            }
            Condition::Equals { .. } | Condition::IsTrue(_) | Condition::Available(_) => {}
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list(f: &mut fmt::Formatter<'_>, name: &str, children: &[Condition]) -> fmt::Result {
            write!(f, "{}(", name)?;
            for (i, child) in children.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", child)?;
            }
            write!(f, ")")
        }

        match self {
            Condition::Equals { left, right, .. } => write!(f, "equals({}, {})", left, right),
            Condition::Not(inner) => write!(f, "not({})", inner),
            Condition::And(children) => list(f, "and", children),
            Condition::Or(children) => list(f, "or", children),
            Condition::Xor(children) => list(f, "xor", children),
            Condition::IsTrue(value) => write!(f, "istrue({})", value),
            Condition::Available(reference) => write!(f, "isset({})", reference),
            Condition::External(id) => write!(f, "predicate({})", id),
        }
    }
}

/// Answers the checks a condition cannot decide on its own
pub trait PredicateResolver: Send + Sync {
    /// Whether `reference` names something that exists
    ///
    /// Defaults to "is defined as a property".
    fn available(&self, reference: &str, store: &PropertyStore) -> anyhow::Result<bool> {
        Ok(store.contains(reference))
    }

    /// Evaluate predicate `id`, or `None` if it is not known
    fn external(&self, id: &str, store: &PropertyStore) -> Option<anyhow::Result<bool>>;
}

type PredicateFn = Box<dyn Fn(&PropertyStore) -> anyhow::Result<bool> + Send + Sync>;

/// Registry of named predicates
#[derive(Default)]
pub struct Predicates {
    predicates: HashMap<String, PredicateFn>,
}

impl Predicates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register predicate `id`, replacing any previous one
    pub fn register<F>(&mut self, id: impl Into<String>, predicate: F) -> &mut Self
    where
        F: Fn(&PropertyStore) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        self.predicates.insert(id.into(), Box::new(predicate));
        self
    }

    pub fn contains(&self, id: &str) -> bool {
        self.predicates.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}

impl fmt::Debug for Predicates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&String> = self.predicates.keys().collect();
        ids.sort();
        f.debug_struct("Predicates").field("ids", &ids).finish()
    }
}

impl PredicateResolver for Predicates {
    fn external(&self, id: &str, store: &PropertyStore) -> Option<anyhow::Result<bool>> {
        self.predicates.get(id).map(|predicate| predicate(store))
    }
}

/// Read-only inputs of an evaluation
pub struct ConditionContext<'a> {
    pub store: &'a PropertyStore,
    pub resolver: &'a dyn PredicateResolver,
    pub expander: Expander,
}

impl<'a> ConditionContext<'a> {
    pub fn new(store: &'a PropertyStore, resolver: &'a dyn PredicateResolver) -> Self {
        ConditionContext {
            store,
            resolver,
            expander: Expander::new(),
        }
    }

    pub fn with_expander(mut self, expander: Expander) -> Self {
        self.expander = expander;
        self
    }

    fn expand(&self, value: &str) -> ConditionResult<String> {
        Ok(self.expander.expand(value, self.store)?)
    }
}

/// Evaluate a condition
pub fn evaluate(condition: &Condition, ctx: &ConditionContext<'_>) -> ConditionResult<bool> {
    match condition {
        Condition::Equals {
            left,
            right,
            case_sensitive,
            trim,
        } => {
            let mut left = ctx.expand(left)?;
            let mut right = ctx.expand(right)?;
            if *trim {
                left = left.trim().to_string();
                right = right.trim().to_string();
            }
            if *case_sensitive {
                Ok(left == right)
            } else {
                Ok(left.to_lowercase() == right.to_lowercase())
            }
        }

        Condition::Not(inner) => Ok(!evaluate(inner, ctx)?),

        Condition::And(children) => Ok(evaluate_all(children, ctx)?.iter().all(|v| *v)),

        Condition::Or(children) => Ok(evaluate_all(children, ctx)?.iter().any(|v| *v)),

        Condition::Xor(children) => {
            let trues = evaluate_all(children, ctx)?.iter().filter(|v| **v).count();
            Ok(trues % 2 == 1)
        }

        Condition::IsTrue(value) => Ok(to_bool(&ctx.expand(value)?)),

        Condition::Available(reference) => {
            let reference = ctx.expand(reference)?;
            ctx.resolver
                .available(&reference, ctx.store)
                .map_err(|source| ConditionError::Availability { reference, source })
        }

        Condition::External(id) => match ctx.resolver.external(id, ctx.store) {
            Some(result) => result.map_err(|source| ConditionError::Predicate {
                predicate: id.clone(),
                source,
            }),
            None => Err(ConditionError::UnknownPredicate(id.clone())),
        },
    }
}

/// Evaluate every child, without stopping at a deciding value
fn evaluate_all(children: &[Condition], ctx: &ConditionContext<'_>) -> ConditionResult<Vec<bool>> {
    children.iter().map(|child| evaluate(child, ctx)).collect()
}

/// Build-tool truthiness: `true`, `yes` and `on`, ignoring case
pub fn to_bool(value: &str) -> bool {
    ["true", "yes", "on"]
        .iter()
        .any(|t| value.eq_ignore_ascii_case(t))
}
