use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::ids::QuestionId;
use crate::model::progress_key::ProgressKey;
use crate::model::question::Answer;

//
// ─── ID LIST ──────────────────────────────────────────────────────────────────
//

/// Ordered set of question ids: keeps insertion order, never adds a duplicate.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdList(Vec<QuestionId>);

impl IdList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, id: &QuestionId) -> bool {
        self.0.contains(id)
    }

    /// Appends `id` unless already present. Returns true if it was added.
    pub fn insert(&mut self, id: &QuestionId) -> bool {
        if self.contains(id) {
            return false;
        }
        self.0.push(id.clone());
        true
    }

    /// Removes `id` if present. Returns true if it was removed.
    pub fn remove(&mut self, id: &QuestionId) -> bool {
        let before = self.0.len();
        self.0.retain(|existing| existing != id);
        self.0.len() != before
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &QuestionId> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<QuestionId> {
        self.0.clone()
    }
}

impl<'a> FromIterator<&'a str> for IdList {
    fn from_iter<T: IntoIterator<Item = &'a str>>(iter: T) -> Self {
        let mut list = IdList::new();
        for raw in iter {
            list.insert(&QuestionId::new(raw));
        }
        list
    }
}

//
// ─── UNIT STATS ───────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LastPos {
    #[serde(default)]
    pub studied: usize,
    #[serde(default)]
    pub wrong: usize,
    #[serde(default)]
    pub star: usize,
}

/// Per-unit study state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UnitStats {
    #[serde(default)]
    pub studied: IdList,
    #[serde(default)]
    pub wrong: IdList,
    #[serde(default)]
    pub star: IdList,
    #[serde(default)]
    pub last_pos: LastPos,
}

impl UnitStats {
    /// Forget everything recorded for the unit.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Most recent answer given for a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastChoice {
    pub correct: bool,
    #[serde(default)]
    pub selected: Option<Answer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GlobalStats {
    #[serde(default)]
    pub wrong: IdList,
    #[serde(default)]
    pub star: IdList,
}

//
// ─── FLAGS ────────────────────────────────────────────────────────────────────
//

pub const REVEAL_MODE: &str = "reveal_mode";
pub const SHOW_EXPLANATIONS: &str = "show_explanations";

/// Boolean display preferences. Unrecognized keys are kept as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Flags(IndexMap<String, bool>);

impl Default for Flags {
    fn default() -> Self {
        let mut flags = IndexMap::new();
        flags.insert(REVEAL_MODE.to_string(), false);
        flags.insert(SHOW_EXPLANATIONS.to_string(), false);
        Self(flags)
    }
}

impl Flags {
    #[must_use]
    pub fn get(&self, key: &str) -> Option<bool> {
        self.0.get(key).copied()
    }

    pub fn set(&mut self, key: impl Into<String>, value: bool) {
        self.0.insert(key.into(), value);
    }

    #[must_use]
    pub fn reveal_mode(&self) -> bool {
        self.get(REVEAL_MODE).unwrap_or(false)
    }

    #[must_use]
    pub fn show_explanations(&self) -> bool {
        self.get(SHOW_EXPLANATIONS).unwrap_or(false)
    }

    /// Merge a JSON patch, coercing every value by truthiness.
    pub fn merge_patch(&mut self, patch: &Map<String, Value>) {
        for (key, value) in patch {
            self.set(key.clone(), truthy(value));
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// JSON truthiness: `null`, `false`, zero, and empty strings/arrays/objects are false.
#[must_use]
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

//
// ─── PROGRESS ENTRY ───────────────────────────────────────────────────────────
//

/// A resumable session: ordered ids, cursor, and reveal-answers flag.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProgressEntry {
    #[serde(default)]
    pub list: Vec<QuestionId>,
    #[serde(default)]
    pub pos: usize,
    #[serde(default)]
    pub reveal: bool,
}

impl ProgressEntry {
    #[must_use]
    pub fn new(list: Vec<QuestionId>, reveal: bool) -> Self {
        Self {
            list,
            pos: 0,
            reveal,
        }
    }

    /// True for entries created only to hold a position (no question list).
    #[must_use]
    pub fn is_shell(&self) -> bool {
        self.list.is_empty()
    }
}

//
// ─── COURSE SECTION ───────────────────────────────────────────────────────────
//

/// All study state of one user for one course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseSection {
    #[serde(default)]
    pub by_unit: IndexMap<String, UnitStats>,
    #[serde(default)]
    pub last_choice: IndexMap<QuestionId, LastChoice>,
    #[serde(default)]
    pub flags: Flags,
    #[serde(default)]
    pub global: GlobalStats,
    #[serde(default)]
    pub progress: IndexMap<ProgressKey, ProgressEntry>,
    #[serde(default)]
    pub current_progress_key: Option<ProgressKey>,
    /// Keys this version does not model, carried through unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for CourseSection {
    fn default() -> Self {
        Self {
            by_unit: IndexMap::new(),
            last_choice: IndexMap::new(),
            flags: Flags::default(),
            global: GlobalStats::default(),
            progress: IndexMap::new(),
            current_progress_key: None,
            extra: Map::new(),
        }
    }
}

impl CourseSection {
    /// Returns the unit's stats, creating empty stats if missing.
    ///
    /// The flag reports whether the entry was created by this call.
    pub fn unit_mut(&mut self, unit: &str) -> (&mut UnitStats, bool) {
        let created = !self.by_unit.contains_key(unit);
        let stats = self.by_unit.entry(unit.to_string()).or_default();
        (stats, created)
    }

    /// Returns the progress entry for `key`, creating an empty shell if missing.
    pub fn progress_entry_mut(&mut self, key: &ProgressKey) -> (&mut ProgressEntry, bool) {
        let created = !self.progress.contains_key(key);
        let entry = self.progress.entry(key.clone()).or_default();
        (entry, created)
    }

    #[must_use]
    pub fn current_entry(&self) -> Option<(&ProgressKey, &ProgressEntry)> {
        let key = self.current_progress_key.as_ref()?;
        self.progress.get_key_value(key)
    }

    /// Union of the per-unit `wrong` lists, in unit order.
    #[must_use]
    pub fn union_of_unit_wrong(&self) -> IdList {
        let mut all = IdList::new();
        for stats in self.by_unit.values() {
            for id in stats.wrong.iter() {
                all.insert(id);
            }
        }
        all
    }

    /// Union of the per-unit `star` lists, in unit order.
    #[must_use]
    pub fn union_of_unit_star(&self) -> IdList {
        let mut all = IdList::new();
        for stats in self.by_unit.values() {
            for id in stats.star.iter() {
                all.insert(id);
            }
        }
        all
    }
}
