//! Registered steps and lifecycle hooks.

use crate::runtime::Unit;
use crate::{ExecutorError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Points in the run lifecycle at which hooks execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HookKind {
    BeforeSuite,
    AfterSuite,
    BeforeSpec,
    AfterSpec,
    BeforeScenario,
    AfterScenario,
    BeforeStep,
    AfterStep,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HookKind::BeforeSuite => "before-suite",
            HookKind::AfterSuite => "after-suite",
            HookKind::BeforeSpec => "before-spec",
            HookKind::AfterSpec => "after-spec",
            HookKind::BeforeScenario => "before-scenario",
            HookKind::AfterScenario => "after-scenario",
            HookKind::BeforeStep => "before-step",
            HookKind::AfterStep => "after-step",
        };
        write!(f, "{}", s)
    }
}

/// Shared value handed to hooks that declare it as their only parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HookContext {
    pub spec: Option<String>,
    pub scenario: Option<String>,
    pub step: Option<String>,
    pub tags: Vec<String>,
}

/// How a hook's tags are matched against the current tags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TagAggregation {
    /// Every hook tag must be present.
    #[default]
    And,
    /// At least one hook tag must be present.
    Or,
}

/// A hook unit with an optional tag filter.
#[derive(Debug)]
pub struct Hook {
    unit: Unit,
    tags: Vec<String>,
    aggregation: TagAggregation,
}

impl Hook {
    pub fn new(unit: Unit) -> Self {
        Self {
            unit,
            tags: Vec::new(),
            aggregation: TagAggregation::default(),
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I, aggregation: TagAggregation) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self.aggregation = aggregation;
        self
    }

    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    /// Untagged hooks always apply.
    pub fn applies_to(&self, tags: &[String]) -> bool {
        if self.tags.is_empty() {
            return true;
        }
        let present = |tag: &String| tags.iter().any(|t| t.trim() == tag.trim());
        match self.aggregation {
            TagAggregation::And => self.tags.iter().all(present),
            TagAggregation::Or => self.tags.iter().any(present),
        }
    }
}

/// Steps indexed by text, hooks grouped by kind in registration order.
#[derive(Debug, Default)]
pub struct UnitRegistry {
    steps: HashMap<String, Unit>,
    hooks: HashMap<HookKind, Vec<Hook>>,
}

impl UnitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `unit` as the implementation of step `text`.
    ///
    /// Parameter placeholders are normalised, so `Say <greeting>` and
    /// `Say {}` name the same step.
    pub fn register_step(&mut self, text: &str, unit: Unit) -> Result<()> {
        let key = normalize_step_text(text);
        if self.steps.contains_key(&key) {
            return Err(ExecutorError::DuplicateStep(text.to_string()));
        }
        self.steps.insert(key, unit);
        Ok(())
    }

    pub fn step(&self, text: &str) -> Option<&Unit> {
        self.steps.get(&normalize_step_text(text))
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn register_hook(&mut self, kind: HookKind, hook: Hook) {
        self.hooks.entry(kind).or_default().push(hook);
    }

    /// Hooks of `kind` whose tag filter matches `context.tags`.
    pub fn hooks_for(&self, kind: HookKind, context: &HookContext) -> Vec<&Unit> {
        self.hooks
            .get(&kind)
            .map(|hooks| {
                hooks
                    .iter()
                    .filter(|hook| hook.applies_to(&context.tags))
                    .map(Hook::unit)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Replace every `<param>` or `{...}` placeholder with `{}` and collapse
/// whitespace.
pub fn normalize_step_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut closing = None;
    for ch in text.chars() {
        match closing {
            Some(end) if ch == end => closing = None,
            Some(_) => {}
            None if ch == '<' || ch == '{' => {
                closing = Some(if ch == '<' { '>' } else { '}' });
                out.push_str("{}");
            }
            None => out.push(ch),
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}
