//! Transformation adapter.
//!
//! A migration's `transformation.type` selects a [`Transform`] registered in a
//! [`TransformRegistry`]. New kinds are added by registering another
//! implementation, never by branching inside the executor.
//!
//! The only built-in kind is `custom`, which dispatches to a named handler:
//!
//! ```rust,ignore
//! let mut custom = CustomTransform::with_builtins();
//! custom.register("orders", |ctx, source| {
//!     let mut out = TransformationOutput::new();
//!     out.insert("orders_out".to_string(), source.clone());
//!     Ok(out)
//! });
//!
//! let mut transforms = TransformRegistry::new();
//! transforms.register(CUSTOM_KIND, custom);
//! ```

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::config::MigrationDefinition;
use crate::core::{Dataset, TransformationOutput};
use crate::error::{MigrateError, Result};

/// The transformation kind handled by [`CustomTransform`].
pub const CUSTOM_KIND: &str = "custom";

/// Built-in handler that forwards the source unchanged.
pub const PASSTHROUGH_HANDLER: &str = "passthrough";

/// Turns a source dataset into named output datasets.
pub trait Transform: Send + Sync {
    fn apply(
        &self,
        definition: &MigrationDefinition,
        source: &Dataset,
    ) -> Result<TransformationOutput>;

    /// Whether `apply` can find what the definition asks for.
    fn resolves(&self, _definition: &MigrationDefinition) -> bool {
        true
    }
}

/// Transformation kinds by name.
#[derive(Default)]
pub struct TransformRegistry {
    kinds: HashMap<String, Arc<dyn Transform>>,
}

impl TransformRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the `custom` kind and its built-in handlers.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(CUSTOM_KIND, CustomTransform::with_builtins());
        registry
    }

    /// Register (or replace) a transformation kind.
    pub fn register<T: Transform + 'static>(&mut self, kind: &str, transform: T) {
        self.kinds.insert(kind.to_string(), Arc::new(transform));
    }

    /// Recognised kinds, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<_> = self.kinds.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Dispatch on the definition's transformation kind.
    pub fn apply(
        &self,
        definition: &MigrationDefinition,
        source: &Dataset,
    ) -> Result<TransformationOutput> {
        let kind = definition.transformation.kind.as_str();
        let transform = self.kinds.get(kind).ok_or_else(|| {
            MigrateError::transformation(
                &definition.migration_id,
                format!(
                    "Unsupported transformation type: {} (supported: {})",
                    kind,
                    self.kinds().join(", ")
                ),
            )
        })?;

        debug!(
            "Applying {} transformation for {}",
            kind, definition.migration_id
        );
        transform.apply(definition, source)
    }

    /// Whether the definition's kind is registered and can resolve its handler.
    pub fn resolves(&self, definition: &MigrationDefinition) -> bool {
        self.kinds
            .get(definition.transformation.kind.as_str())
            .is_some_and(|transform| transform.resolves(definition))
    }
}

/// What a custom handler sees besides the source dataset.
pub struct HandlerContext<'a> {
    pub definition: &'a MigrationDefinition,

    /// Adapter defaults overlaid with the migration's own parameters.
    pub parameters: BTreeMap<String, Value>,
}

impl HandlerContext<'_> {
    /// A string parameter, if present.
    pub fn param_str(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).and_then(Value::as_str)
    }

    /// Output table names of the migration's target bindings, deduplicated in order.
    pub fn target_tables(&self) -> Vec<&str> {
        let mut tables: Vec<&str> = Vec::new();
        for target in &self.definition.targets {
            if !tables.contains(&target.table.as_str()) {
                tables.push(&target.table);
            }
        }
        tables
    }
}

type Handler =
    Arc<dyn Fn(&HandlerContext<'_>, &Dataset) -> Result<TransformationOutput> + Send + Sync>;

/// The `custom` kind: named handlers plus shared default parameters.
///
/// The handler is chosen by `transformation.handler`, falling back to the
/// migration id.
#[derive(Default)]
pub struct CustomTransform {
    handlers: HashMap<String, Handler>,
    defaults: BTreeMap<String, Value>,
}

impl CustomTransform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adapter with the `passthrough` handler registered.
    pub fn with_builtins() -> Self {
        let mut custom = Self::new();
        custom.register(PASSTHROUGH_HANDLER, passthrough);
        custom
    }

    /// Register (or replace) a named handler.
    pub fn register<F>(&mut self, name: &str, handler: F)
    where
        F: Fn(&HandlerContext<'_>, &Dataset) -> Result<TransformationOutput>
            + Send
            + Sync
            + 'static,
    {
        self.handlers.insert(name.to_string(), Arc::new(handler));
    }

    /// Set a parameter every handler sees unless the migration overrides it.
    pub fn set_default(&mut self, name: &str, value: Value) {
        self.defaults.insert(name.to_string(), value);
    }

    /// Registered handler names, sorted.
    pub fn handlers(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn handler_name(definition: &MigrationDefinition) -> &str {
        definition
            .transformation
            .handler
            .as_deref()
            .unwrap_or(definition.migration_id.as_str())
    }
}

impl Transform for CustomTransform {
    fn apply(
        &self,
        definition: &MigrationDefinition,
        source: &Dataset,
    ) -> Result<TransformationOutput> {
        let name = Self::handler_name(definition);

        let handler = self.handlers.get(name).ok_or_else(|| {
            MigrateError::transformation(
                &definition.migration_id,
                format!("no custom transformation handler named '{}'", name),
            )
        })?;

        let mut parameters = self.defaults.clone();
        parameters.extend(
            definition
                .transformation
                .parameters
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );

        let ctx = HandlerContext {
            definition,
            parameters,
        };
        // Handlers are external code; a panic fails this migration only.
        panic::catch_unwind(AssertUnwindSafe(|| handler(&ctx, source))).unwrap_or_else(
            |payload| {
                Err(MigrateError::transformation(
                    &definition.migration_id,
                    format!(
                        "handler '{}' panicked: {}",
                        name,
                        panic_message(payload.as_ref())
                    ),
                ))
            },
        )
    }

    fn resolves(&self, definition: &MigrationDefinition) -> bool {
        self.handlers.contains_key(Self::handler_name(definition))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "non-string panic payload"
    }
}

/// Emit the source under `output_table`, or under every target table when unset.
fn passthrough(ctx: &HandlerContext<'_>, source: &Dataset) -> Result<TransformationOutput> {
    let mut output = TransformationOutput::new();
    match ctx.param_str("output_table") {
        Some(table) => {
            output.insert(table.to_string(), source.clone());
        }
        None => {
            for table in ctx.target_tables() {
                output.insert(table.to_string(), source.clone());
            }
        }
    }
    Ok(output)
}
