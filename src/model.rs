//! Loading and evaluating the gradient-boosted price model.
//!
//! The artifact is an XGBoost model saved in its JSON format. Category labels
//! are not part of that format, so a `meta.json` next to it carries the table
//! of labels for every categorical column (a label's code is its position).

use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{ModelLoadError, PredictionError};
use crate::schema::{CellValue, Category, CategoryTable, Column, UnseenCategoryPolicy};
use crate::types::CarInputRecord;

/// Anything that turns model rows into prices.
pub trait PredictionService: Send + Sync {
    /// One value per record, in order.
    fn predict(&self, records: &[CarInputRecord]) -> Result<Vec<f64>, PredictionError>;
}

// ---------- Artifact formats ----------

#[derive(Deserialize)]
struct MetaJson {
    feature_names: Option<Vec<String>>,
    #[serde(default)]
    categories: HashMap<String, Vec<String>>,
}

#[derive(Deserialize)]
struct XgbDocument {
    learner: XgbLearner,
}

#[derive(Deserialize)]
struct XgbLearner {
    #[serde(default)]
    feature_names: Vec<String>,
    #[serde(default)]
    feature_types: Vec<String>,
    gradient_booster: XgbBooster,
    learner_model_param: XgbLearnerParam,
    objective: XgbObjective,
}

#[derive(Deserialize)]
struct XgbBooster {
    name: String,
    model: Option<XgbTreeModel>,
}

#[derive(Deserialize)]
struct XgbTreeModel {
    trees: Vec<XgbTree>,
}

#[derive(Deserialize)]
struct XgbLearnerParam {
    base_score: String,
    #[serde(default)]
    num_class: Option<String>,
    #[serde(default)]
    num_target: Option<String>,
}

#[derive(Deserialize)]
struct XgbObjective {
    name: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(u8),
}

impl Flag {
    fn is_set(&self) -> bool {
        match self {
            Flag::Bool(b) => *b,
            Flag::Int(i) => *i != 0,
        }
    }
}

#[derive(Deserialize)]
struct XgbTree {
    left_children: Vec<i32>,
    right_children: Vec<i32>,
    split_indices: Vec<i64>,
    split_conditions: Vec<f32>,
    default_left: Vec<Flag>,
    #[serde(default)]
    split_type: Vec<u8>,
    #[serde(default)]
    categories: Vec<i64>,
    #[serde(default)]
    categories_nodes: Vec<i64>,
    #[serde(default)]
    categories_segments: Vec<u64>,
    #[serde(default)]
    categories_sizes: Vec<u64>,
}

// ---------- Trees ----------

#[derive(Debug, Clone)]
struct Node {
    /// -1 for leaves
    left: i32,
    right: i32,
    feature: usize,
    /// Split threshold, or the leaf value for leaves.
    value: f32,
    default_left: bool,
    /// Sorted codes routed right by a categorical split.
    categories: Option<Vec<u32>>,
}

impl Node {
    fn is_leaf(&self) -> bool {
        self.left < 0
    }

    fn next(&self, fvalue: f32) -> i32 {
        if fvalue.is_nan() {
            return if self.default_left { self.left } else { self.right };
        }
        match &self.categories {
            Some(set) => {
                let chosen = fvalue >= 0.0
                    && fvalue.fract() == 0.0
                    && set.binary_search(&(fvalue as u32)).is_ok();
                if chosen {
                    self.right
                } else {
                    self.left
                }
            }
            None => {
                if fvalue < self.value {
                    self.left
                } else {
                    self.right
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn from_xgb(idx: usize, t: XgbTree, n_features: usize) -> Result<Self, ModelLoadError> {
        let bad = |msg: String| ModelLoadError::incompatible(format!("tree {}: {}", idx, msg));

        let n = t.left_children.len();
        if n == 0 {
            return Err(bad("no nodes".into()));
        }
        for (name, len) in [
            ("right_children", t.right_children.len()),
            ("split_indices", t.split_indices.len()),
            ("split_conditions", t.split_conditions.len()),
            ("default_left", t.default_left.len()),
        ] {
            if len != n {
                return Err(bad(format!("{} has {} entries, expected {}", name, len, n)));
            }
        }
        if !t.split_type.is_empty() && t.split_type.len() != n {
            return Err(bad(format!(
                "split_type has {} entries, expected {}",
                t.split_type.len(),
                n
            )));
        }

        let k = t.categories_nodes.len();
        if t.categories_segments.len() != k || t.categories_sizes.len() != k {
            return Err(bad("categories_nodes/segments/sizes lengths differ".into()));
        }
        let mut cat_sets: HashMap<usize, Vec<u32>> = HashMap::with_capacity(k);
        for i in 0..k {
            let node = usize::try_from(t.categories_nodes[i])
                .ok()
                .filter(|&node| node < n)
                .ok_or_else(|| bad(format!("categorical node {} out of range", t.categories_nodes[i])))?;
            let (segment, size) = (t.categories_segments[i], t.categories_sizes[i]);
            let range = usize::try_from(segment)
                .ok()
                .zip(usize::try_from(size).ok())
                .and_then(|(start, len)| Some(start..start.checked_add(len)?));
            let slice = range
                .and_then(|r| t.categories.get(r))
                .ok_or_else(|| bad(format!("category segment {}+{} out of range", segment, size)))?;
            let mut set = Vec::with_capacity(slice.len());
            for &c in slice {
                let code = u32::try_from(c).map_err(|_| bad(format!("invalid category code {}", c)))?;
                set.push(code);
            }
            set.sort_unstable();
            cat_sets.insert(node, set);
        }

        let mut nodes = Vec::with_capacity(n);
        for i in 0..n {
            let (left, right) = (t.left_children[i], t.right_children[i]);
            let is_leaf = left < 0;
            if is_leaf != (right < 0) {
                return Err(bad(format!("node {} has exactly one child", i)));
            }
            let feature = if is_leaf {
                0
            } else {
                for child in [left, right] {
                    if child as usize >= n {
                        return Err(bad(format!("node {} points to missing node {}", i, child)));
                    }
                }
                usize::try_from(t.split_indices[i])
                    .ok()
                    .filter(|&f| f < n_features)
                    .ok_or_else(|| bad(format!("node {} splits on unknown feature {}", i, t.split_indices[i])))?
            };
            let categorical = t.split_type.get(i).copied().unwrap_or(0) == 1;
            let categories = if categorical && !is_leaf {
                Some(cat_sets.remove(&i).unwrap_or_default())
            } else {
                None
            };
            nodes.push(Node {
                left,
                right,
                feature,
                value: t.split_conditions[i],
                default_left: t.default_left[i].is_set(),
                categories,
            });
        }
        Ok(Self { nodes })
    }

    fn leaf_value(&self, row: &[f32]) -> Result<f32, PredictionError> {
        let mut idx = 0usize;
        // a well-formed tree reaches a leaf in fewer steps than it has nodes
        for _ in 0..=self.nodes.len() {
            let node = &self.nodes[idx];
            if node.is_leaf() {
                return Ok(node.value);
            }
            let fvalue = row.get(node.feature).copied().unwrap_or(f32::NAN);
            idx = node.next(fvalue) as usize;
        }
        Err(PredictionError::new("tree traversal did not reach a leaf"))
    }
}

// ---------- Objective ----------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Link {
    Identity,
    Log,
    Logistic,
}

impl Link {
    fn for_objective(name: &str) -> Option<Self> {
        match name {
            "reg:squarederror" | "reg:linear" | "reg:absoluteerror" | "reg:pseudohubererror"
            | "reg:quantileerror" => Some(Link::Identity),
            "reg:gamma" | "reg:tweedie" | "count:poisson" => Some(Link::Log),
            "reg:logistic" => Some(Link::Logistic),
            _ => None,
        }
    }

    fn base_margin(self, base_score: f64) -> f64 {
        match self {
            Link::Identity => base_score,
            Link::Log => base_score.ln(),
            Link::Logistic => (base_score / (1.0 - base_score)).ln(),
        }
    }

    fn apply(self, margin: f64) -> f64 {
        match self {
            Link::Identity => margin,
            Link::Log => margin.exp(),
            Link::Logistic => 1.0 / (1.0 + (-margin).exp()),
        }
    }
}

/// `"5E-1"` or `"[5E-1]"`
fn parse_base_score(raw: &str) -> Result<f64, ModelLoadError> {
    let inner = raw.trim().trim_start_matches('[').trim_end_matches(']');
    let values: Vec<&str> = inner.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
    match values.as_slice() {
        [one] => one
            .parse::<f64>()
            .map_err(|_| ModelLoadError::incompatible(format!("invalid base_score '{}'", raw))),
        _ => Err(ModelLoadError::incompatible(format!(
            "expected a single base_score, got '{}'",
            raw
        ))),
    }
}

fn parse_count(name: &str, raw: Option<&str>, default: u32) -> Result<u32, ModelLoadError> {
    match raw {
        None => Ok(default),
        Some(s) => s
            .trim()
            .parse()
            .map_err(|_| ModelLoadError::incompatible(format!("invalid {} '{}'", name, s))),
    }
}

// ---------- Loaded model ----------

/// A ready-to-query model handle. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct LoadedModel {
    trees: Vec<Tree>,
    base_margin: f64,
    link: Link,
    objective: String,
    features: Vec<Column>, // authoritative input order
    tables: HashMap<Column, CategoryTable>,
    policy: UnseenCategoryPolicy,
    log_rows: bool,
}

/// Builds [`LoadedModel`]s from artifact files.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelLoader {
    policy: UnseenCategoryPolicy,
    log_rows: bool,
}

impl ModelLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unseen_categories(mut self, policy: UnseenCategoryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Log a summary of every encoded row.
    pub fn log_rows(mut self, on: bool) -> Self {
        self.log_rows = on;
        self
    }

    pub fn load(
        &self,
        model_path: impl AsRef<Path>,
        meta_path: impl AsRef<Path>,
    ) -> Result<LoadedModel, ModelLoadError> {
        let model_path = model_path.as_ref();
        let meta_path = meta_path.as_ref();

        let meta: MetaJson = read_json(meta_path)?;
        let doc: XgbDocument = read_json(model_path)?;

        let model = self.build(doc, meta)?;
        info!(
            path = %model_path.display(),
            trees = model.trees.len(),
            objective = %model.objective,
            "loaded model"
        );
        Ok(model)
    }

    fn build(&self, doc: XgbDocument, meta: MetaJson) -> Result<LoadedModel, ModelLoadError> {
        let learner = doc.learner;

        if learner.gradient_booster.name != "gbtree" {
            return Err(ModelLoadError::incompatible(format!(
                "unsupported booster '{}', expected 'gbtree'",
                learner.gradient_booster.name
            )));
        }
        let link = Link::for_objective(&learner.objective.name).ok_or_else(|| {
            ModelLoadError::incompatible(format!("unsupported objective '{}'", learner.objective.name))
        })?;

        let param = &learner.learner_model_param;
        let num_class = parse_count("num_class", param.num_class.as_deref(), 0)?;
        let num_target = parse_count("num_target", param.num_target.as_deref(), 1)?;
        if num_class > 1 || num_target > 1 {
            return Err(ModelLoadError::incompatible(
                "expected a single-output regression model",
            ));
        }
        let base_score = parse_base_score(&param.base_score)?;

        // Feature order: model, then meta, then canonical.
        let names: Vec<String> = if !learner.feature_names.is_empty() {
            learner.feature_names
        } else if let Some(names) = meta.feature_names {
            names
        } else {
            Column::ALL.iter().map(|c| c.name().to_string()).collect()
        };
        let features = resolve_features(&names)?;

        if !learner.feature_types.is_empty() {
            if learner.feature_types.len() != features.len() {
                return Err(ModelLoadError::incompatible(format!(
                    "{} feature types for {} features",
                    learner.feature_types.len(),
                    features.len()
                )));
            }
            for (col, ty) in features.iter().zip(&learner.feature_types) {
                if col.is_categorical() != (ty == "c") {
                    return Err(ModelLoadError::incompatible(format!(
                        "column '{}' has feature type '{}' in the model",
                        col, ty
                    )));
                }
            }
        }

        let mut tables = HashMap::with_capacity(Column::CATEGORICAL.len());
        for col in Column::CATEGORICAL {
            let labels = meta.categories.get(col.name()).cloned().ok_or_else(|| {
                ModelLoadError::incompatible(format!("no category table for column '{}'", col))
            })?;
            let table = CategoryTable::new(labels)
                .map_err(|e| ModelLoadError::incompatible(format!("column '{}': {}", col, e)))?;
            tables.insert(col, table);
        }

        let raw_trees = learner
            .gradient_booster
            .model
            .map(|m| m.trees)
            .unwrap_or_default();
        let trees = raw_trees
            .into_iter()
            .enumerate()
            .map(|(i, t)| Tree::from_xgb(i, t, features.len()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(LoadedModel {
            trees,
            base_margin: link.base_margin(base_score),
            link,
            objective: learner.objective.name,
            features,
            tables,
            policy: self.policy,
            log_rows: self.log_rows,
        })
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ModelLoadError> {
    if !path.exists() {
        return Err(ModelLoadError::NotFound(path.to_path_buf()));
    }
    let txt = fs::read_to_string(path).map_err(|source| ModelLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&txt).map_err(|source| ModelLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn resolve_features(names: &[String]) -> Result<Vec<Column>, ModelLoadError> {
    let mut seen = HashSet::with_capacity(names.len());
    let mut out = Vec::with_capacity(names.len());
    for name in names {
        let col = Column::from_name(name).ok_or_else(|| {
            ModelLoadError::incompatible(format!("model feature '{}' is not a record column", name))
        })?;
        if !seen.insert(col) {
            return Err(ModelLoadError::incompatible(format!("duplicate feature '{}'", name)));
        }
        out.push(col);
    }
    if let Some(missing) = Column::ALL.iter().find(|c| !seen.contains(c)) {
        return Err(ModelLoadError::incompatible(format!(
            "model has no feature for column '{}'",
            missing
        )));
    }
    Ok(out)
}

impl LoadedModel {
    pub fn features(&self) -> &[Column] {
        &self.features
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn objective(&self) -> &str {
        &self.objective
    }

    pub fn category_table(&self, column: Column) -> Option<&CategoryTable> {
        self.tables.get(&column)
    }

    /// Record -> feature row in model order. Missing values are NaN.
    pub fn encode(&self, record: &CarInputRecord) -> Result<Vec<f32>, PredictionError> {
        let mut row = Vec::with_capacity(self.features.len());
        for &col in &self.features {
            row.push(self.encode_cell(col, record.value(col))?);
        }
        Ok(row)
    }

    fn encode_cell(&self, column: Column, cell: CellValue<'_>) -> Result<f32, PredictionError> {
        match cell {
            CellValue::Integer(v) => Ok(v as f32),
            CellValue::Number(v) => Ok(v as f32),
            CellValue::Category(Category::Missing) => Ok(f32::NAN),
            CellValue::Category(Category::Label(label)) => {
                let table = self.tables.get(&column).ok_or_else(|| {
                    PredictionError::new(format!("column '{}' is not categorical", column))
                })?;
                match (table.code(label), self.policy) {
                    (Some(code), _) => Ok(code as f32),
                    (None, UnseenCategoryPolicy::Missing) => {
                        debug!(column = %column, label = %label, "unseen category treated as missing");
                        Ok(f32::NAN)
                    }
                    (None, UnseenCategoryPolicy::Reject) => Err(PredictionError::new(format!(
                        "unseen category '{}' for column '{}'",
                        label, column
                    ))),
                }
            }
        }
    }

    /// Evaluate the ensemble on one encoded row.
    pub fn predict_row(&self, row: &[f32]) -> Result<f64, PredictionError> {
        if row.len() != self.features.len() {
            return Err(PredictionError::new(format!(
                "feature length mismatch: got {}, expected {}",
                row.len(),
                self.features.len()
            )));
        }
        let mut margin = self.base_margin;
        for tree in &self.trees {
            margin += f64::from(tree.leaf_value(row)?);
        }
        let out = self.link.apply(margin);
        if !out.is_finite() {
            return Err(PredictionError::new(format!("model produced a non-finite value ({})", out)));
        }
        Ok(out)
    }

    fn log_row(&self, row: &[f32]) {
        let present: Vec<f32> = row.iter().copied().filter(|x| !x.is_nan()).collect();
        let mean = if present.is_empty() {
            0.0
        } else {
            present.iter().sum::<f32>() / (present.len() as f32)
        };
        let mut sample = vec![];
        for (i, col) in self.features.iter().take(6).enumerate() {
            sample.push(format!("{}={:.3}", col, row[i]));
        }
        info!(
            "encoded row in_dim={} present={} mean={:.3} sample=[{}]",
            row.len(),
            present.len(),
            mean,
            sample.join(", ")
        );
    }
}

impl PredictionService for LoadedModel {
    fn predict(&self, records: &[CarInputRecord]) -> Result<Vec<f64>, PredictionError> {
        let mut out = Vec::with_capacity(records.len());
        for record in records {
            let row = self.encode(record)?;
            if self.log_rows {
                self.log_row(&row);
            }
            out.push(self.predict_row(&row)?);
        }
        Ok(out)
    }
}
