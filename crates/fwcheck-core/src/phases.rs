//! Test-phase tracking over a live log stream.
//!
//! A [`PhaseSet`] holds a fixed list of named phases, each completed by the
//! first line that contains one of its trigger substrings. Completion is
//! monotonic for the lifetime of the set. Lines are inspected and dropped;
//! nothing but per-phase state is retained, so the stream may be unbounded.

use serde::{Deserialize, Serialize};

/// A named milestone detected by substring match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    pub name: String,
    /// Case-sensitive substrings, tested in order.
    pub triggers: Vec<String>,
    #[serde(default)]
    pub completed: bool,
}

impl Phase {
    pub fn new<S: Into<String>>(name: impl Into<String>, triggers: impl IntoIterator<Item = S>) -> Self {
        Self {
            name: name.into(),
            triggers: triggers.into_iter().map(Into::into).collect(),
            completed: false,
        }
    }

    fn matches(&self, line: &str) -> bool {
        self.triggers.iter().any(|t| line.contains(t.as_str()))
    }

    /// Human-readable title, e.g. `sensor_interaction` -> `Sensor Interaction`.
    pub fn title(&self) -> String {
        self.name
            .split('_')
            .filter(|w| !w.is_empty())
            .map(|w| {
                let mut chars = w.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Ordered set of phases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhaseSet(Vec<Phase>);

impl PhaseSet {
    /// Build a set with every phase reset to not-complete.
    pub fn new(phases: impl IntoIterator<Item = Phase>) -> Self {
        Self(
            phases
                .into_iter()
                .map(|mut p| {
                    p.completed = false;
                    p
                })
                .collect(),
        )
    }

    /// Reducer form of [`PhaseTracker::update`].
    pub fn apply(mut self, line: &str) -> Self {
        self.mark(line);
        self
    }

    /// Complete every pending phase matched by `line`; returns the indices
    /// completed by this call.
    fn mark(&mut self, line: &str) -> Vec<usize> {
        let mut newly = Vec::new();
        for (idx, phase) in self.0.iter_mut().enumerate() {
            if !phase.completed && phase.matches(line) {
                phase.completed = true;
                newly.push(idx);
            }
        }
        newly
    }

    pub fn phases(&self) -> &[Phase] {
        &self.0
    }

    pub fn get(&self, name: &str) -> Option<&Phase> {
        self.0.iter().find(|p| p.name == name)
    }

    pub fn is_completed(&self, name: &str) -> bool {
        self.get(name).is_some_and(|p| p.completed)
    }

    pub fn completed_names(&self) -> Vec<&str> {
        self.0
            .iter()
            .filter(|p| p.completed)
            .map(|p| p.name.as_str())
            .collect()
    }

    pub fn completed_count(&self) -> usize {
        self.0.iter().filter(|p| p.completed).count()
    }

    pub fn total(&self) -> usize {
        self.0.len()
    }

    pub fn all_completed(&self) -> bool {
        self.0.iter().all(|p| p.completed)
    }
}

impl Default for PhaseSet {
    /// The dashboard firmware's integration milestones.
    fn default() -> Self {
        Self::new([
            Phase::new(
                "startup",
                ["SplashPanel loaded successfully", "OemOilPanel loaded successfully"],
            ),
            Phase::new(
                "sensor_interaction",
                [
                    "Pressure reading changed",
                    "Temperature reading changed",
                    "Gauge animation",
                ],
            ),
            Phase::new(
                "theme_trigger",
                [
                    "Theme changed to Night",
                    "KeyPresentActivate",
                    "LockEngagedActivate",
                    "Theme changed to Day",
                ],
            ),
            Phase::new(
                "error_system",
                ["ErrorOccurredActivate", "Error navigation", "Error resolution"],
            ),
            Phase::new(
                "configuration",
                ["Config panel", "Theme configuration", "Config exit"],
            ),
        ])
    }
}

/// Stateful driver around a [`PhaseSet`].
#[derive(Debug, Clone)]
pub struct PhaseTracker {
    phases: PhaseSet,
}

impl PhaseTracker {
    pub fn new(phases: PhaseSet) -> Self {
        Self {
            phases: PhaseSet::new(phases.0),
        }
    }

    /// Feed one line. Returns the names of phases completed by this line.
    pub fn update(&mut self, line: &str) -> Vec<String> {
        self.phases
            .mark(line)
            .into_iter()
            .map(|idx| self.phases.0[idx].name.clone())
            .collect()
    }

    pub fn summary(&self) -> &PhaseSet {
        &self.phases
    }

    pub fn into_summary(self) -> PhaseSet {
        self.phases
    }
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new(PhaseSet::default())
    }
}
