use crate::error::{GleanError, GleanResult};
use crate::task::{Capability, Parameters};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Coarse three-level rating used for every strategy trade-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Lowest rating.
    Low,
    /// Middle rating.
    Medium,
    /// Highest rating.
    High,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Low => write!(f, "low"),
            Tier::Medium => write!(f, "medium"),
            Tier::High => write!(f, "high"),
        }
    }
}

/// Immutable descriptor of a named approach to performing a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Strategy {
    /// Unique name, e.g. `http.stealth`.
    pub name: String,
    /// Capability this strategy applies to.
    pub capability: Capability,
    /// How fast it completes.
    pub speed_tier: Tier,
    /// How often it succeeds.
    pub reliability_tier: Tier,
    /// How likely it is to be detected and blocked by the target.
    pub detection_risk_tier: Tier,
    /// Whether the strategy executes page scripts before extraction.
    #[serde(default)]
    pub renders_js: bool,
}

impl Strategy {
    /// Creates a strategy that does not render scripts.
    pub fn new(
        name: impl Into<String>,
        capability: Capability,
        speed_tier: Tier,
        reliability_tier: Tier,
        detection_risk_tier: Tier,
    ) -> Self {
        Self {
            name: name.into(),
            capability,
            speed_tier,
            reliability_tier,
            detection_risk_tier,
            renders_js: false,
        }
    }

    /// Marks the strategy as script-rendering.
    pub fn rendering_js(mut self) -> Self {
        self.renders_js = true;
        self
    }
}

/// Registry of strategies with a deterministic selection policy.
///
/// Read-only after start-up; selection depends only on the arguments and the
/// registered set, never on time or randomness.
#[derive(Debug, Clone)]
pub struct StrategyRegistry {
    strategies: BTreeMap<String, Strategy>,
    min_reliability: Tier,
}

impl StrategyRegistry {
    /// An empty registry requiring at least `min_reliability` for automatic
    /// extract selection.
    pub fn new(min_reliability: Tier) -> Self {
        Self {
            strategies: BTreeMap::new(),
            min_reliability,
        }
    }

    /// The built-in strategy set.
    pub fn with_defaults(min_reliability: Tier) -> Self {
        let mut registry = Self::new(min_reliability);
        for strategy in default_strategies() {
            // Names in the default set are distinct.
            let _ = registry.register(strategy);
        }
        registry
    }

    /// Adds a strategy. Names must be unique.
    pub fn register(&mut self, strategy: Strategy) -> GleanResult<()> {
        if self.strategies.contains_key(&strategy.name) {
            return Err(GleanError::Config(format!(
                "strategy '{}' is already registered",
                strategy.name
            )));
        }
        self.strategies.insert(strategy.name.clone(), strategy);
        Ok(())
    }

    /// Looks up a strategy by name.
    pub fn get(&self, name: &str) -> Option<&Strategy> {
        self.strategies.get(name)
    }

    /// All strategies, ordered by name.
    pub fn list(&self) -> Vec<&Strategy> {
        self.strategies.values().collect()
    }

    /// Number of registered strategies.
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Minimum reliability tier for automatic extract selection.
    pub fn min_reliability(&self) -> Tier {
        self.min_reliability
    }

    /// Selects a strategy for a task.
    ///
    /// A hint naming a registered strategy for `capability` wins. Otherwise,
    /// for `Extract`, the lowest-detection-risk strategy whose reliability is
    /// at least the configured minimum is chosen, ties broken by highest
    /// speed and then by name. Tasks with `render_js: true` only consider
    /// script-rendering strategies.
    pub fn select(
        &self,
        capability: Capability,
        parameters: &Parameters,
        hint: Option<&str>,
    ) -> GleanResult<Strategy> {
        self.select_where(capability, parameters, hint, |_| true)
    }

    /// Like [`select`](Self::select), restricted to strategies accepted by
    /// `available` (e.g. those with a configured transport).
    pub fn select_where<F>(
        &self,
        capability: Capability,
        parameters: &Parameters,
        hint: Option<&str>,
        available: F,
    ) -> GleanResult<Strategy>
    where
        F: Fn(&Strategy) -> bool,
    {
        if let Some(name) = hint {
            if let Some(s) = self.strategies.get(name) {
                if s.capability == capability && available(s) {
                    return Ok(s.clone());
                }
            }
        }

        let needs_js = parameters
            .get("render_js")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);

        self.strategies
            .values()
            .filter(|s| s.capability == capability && available(s))
            .filter(|s| capability != Capability::Extract || s.reliability_tier >= self.min_reliability)
            .filter(|s| !needs_js || s.renders_js)
            // BTreeMap iterates by name, so min_by keeps the first name on full ties.
            .min_by(|a, b| {
                a.detection_risk_tier
                    .cmp(&b.detection_risk_tier)
                    .then(b.speed_tier.cmp(&a.speed_tier))
            })
            .cloned()
            .ok_or_else(|| {
                GleanError::InvalidTask(format!(
                    "no {capability} strategy satisfies the selection policy"
                ))
            })
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::with_defaults(Tier::Medium)
    }
}

/// The strategies every deployment knows about.
pub fn default_strategies() -> Vec<Strategy> {
    vec![
        Strategy::new(
            "http.plain",
            Capability::Extract,
            Tier::High,
            Tier::Medium,
            Tier::Medium,
        ),
        Strategy::new(
            "http.stealth",
            Capability::Extract,
            Tier::Medium,
            Tier::High,
            Tier::Low,
        ),
        Strategy::new(
            "browser.headless",
            Capability::Extract,
            Tier::Low,
            Tier::High,
            Tier::Low,
        )
        .rendering_js(),
        Strategy::new(
            "crawl.managed",
            Capability::Extract,
            Tier::Medium,
            Tier::High,
            Tier::Medium,
        )
        .rendering_js(),
        Strategy::new(
            "search.fanout",
            Capability::Search,
            Tier::High,
            Tier::High,
            Tier::Low,
        ),
        Strategy::new(
            "analyze.local",
            Capability::Analyze,
            Tier::High,
            Tier::High,
            Tier::Low,
        ),
    ]
}
