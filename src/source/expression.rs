//! Computed values: a script evaluated over the values of other sources.

use std::fmt;

use rhai::{Dynamic, Engine, Map, Scope};
use serde::Deserialize;
use tracing::debug;

use super::{DataSource, DataSourcePool};
use crate::config::RecordContext;
use crate::error::WriterError;
use crate::holder::DataHolder;
use crate::markup::capture_children;

const DEFAULT_RESULT: &str = "result";

#[derive(Debug, Default, Deserialize)]
struct ResultTag {
    #[serde(rename = "@name")]
    name: Option<String>,
    #[serde(rename = "$text")]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ExpressionMarkup {
    result: Option<ResultTag>,
}

#[derive(Debug, Default, Deserialize)]
struct InputTag {
    #[serde(rename = "@type")]
    kind: Option<String>,
    #[serde(rename = "@name")]
    name: Option<String>,
}

fn script_engine() -> Engine {
    let mut engine = Engine::new();
    engine.set_max_expr_depths(64, 64);
    engine.set_max_call_levels(32);
    engine.set_max_operations(100_000);
    engine.set_max_string_size(1_000_000);
    engine.set_max_array_size(1_000_000);
    engine.set_max_map_size(1_000);
    engine
}

fn script_error(e: impl fmt::Display) -> WriterError {
    WriterError::Source(format!("expression failed: {}", e))
}

/// `PYEVAL` source.
///
/// Every nested `<datasource name="...">` is bound to a script variable of the
/// same name and to the `ds` map. The result is `ds.<result name>` when the
/// script assigns it, otherwise the value of the script's last expression.
pub struct ExpressionSource {
    pool: DataSourcePool,
    engine: Engine,
    inputs: Vec<(String, Box<dyn DataSource>)>,
    result: String,
    script: String,
}

impl fmt::Debug for ExpressionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpressionSource")
            .field("inputs", &self.inputs.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .field("result", &self.result)
            .field("script", &self.script)
            .finish()
    }
}

impl ExpressionSource {
    pub fn new(pool: DataSourcePool) -> Self {
        Self {
            pool,
            engine: script_engine(),
            inputs: Vec::new(),
            result: DEFAULT_RESULT.to_string(),
            script: String::new(),
        }
    }

    pub fn input_names(&self) -> Vec<&str> {
        self.inputs.iter().map(|(n, _)| n.as_str()).collect()
    }

    fn bind_inputs(&self, scope: &mut Scope<'_>) -> Result<(), WriterError> {
        let mut ds = Map::new();
        for (name, source) in &self.inputs {
            let holder = source.get_data()?.ok_or_else(|| {
                WriterError::Source(format!("expression input '{}' has no value", name))
            })?;
            let value = rhai::serde::to_dynamic(holder.value.to_json()).map_err(script_error)?;
            ds.insert(name.as_str().into(), value.clone());
            scope.push_dynamic(name.clone(), value);
        }
        scope.push("ds", ds);
        Ok(())
    }
}

impl DataSource for ExpressionSource {
    fn setup(&mut self, xml: &str) -> Result<(), WriterError> {
        let markup: ExpressionMarkup = quick_xml::de::from_str(xml)?;
        let result = markup
            .result
            .ok_or_else(|| WriterError::Setup("PYEVAL source without a result".to_string()))?;
        self.script = result
            .text
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| WriterError::Setup("PYEVAL source with an empty script".to_string()))?;
        self.result = result
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_RESULT.to_string());
        self.engine
            .compile(&self.script)
            .map_err(|e| WriterError::Setup(format!("invalid expression: {}", e)))?;

        self.inputs.clear();
        for child in capture_children(xml, "datasource")? {
            let tag: InputTag = quick_xml::de::from_str(&child)?;
            let name = tag
                .name
                .filter(|n| !n.trim().is_empty())
                .ok_or_else(|| WriterError::Setup("expression input without a name".to_string()))?;
            let kind = tag.kind.unwrap_or_else(|| "CLIENT".to_string());
            debug!(input = %name, kind = %kind, "binding expression input");
            let source = self.pool.build(&kind, &child)?;
            self.inputs.push((name, source));
        }
        Ok(())
    }

    fn get_data(&self) -> Result<Option<DataHolder>, WriterError> {
        let mut scope = Scope::new();
        self.bind_inputs(&mut scope)?;
        let value: Dynamic = self
            .engine
            .eval_with_scope(&mut scope, &self.script)
            .map_err(script_error)?;
        let value = scope
            .get_value::<Map>("ds")
            .and_then(|ds| ds.get(self.result.as_str()).cloned())
            .filter(|v| !v.is_unit())
            .unwrap_or(value);
        if value.is_unit() {
            return Ok(None);
        }
        let json: serde_json::Value = rhai::serde::from_dynamic(&value).map_err(script_error)?;
        DataHolder::from_json(&json).map(Some)
    }

    fn is_valid(&self) -> bool {
        self.inputs.iter().all(|(_, s)| s.is_valid())
    }

    fn set_scope(&mut self, context: &RecordContext) {
        for (_, source) in &mut self.inputs {
            source.set_scope(context);
        }
    }
}
