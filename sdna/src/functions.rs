//! Function registry backing the function element: `module -> name -> callable`.
//!
//! Callables receive their bound arguments as a JSON object and return a JSON value or an
//! error message.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::SdnaError;

/// Bound arguments passed to a registered function.
pub type FunctionArgs = Map<String, Value>;

/// A registered callable.
pub type BoundFunction = Arc<dyn Fn(&FunctionArgs) -> Result<Value, String> + Send + Sync>;

/// Named modules of callables, owned by a [`Runtime`](crate::Runtime).
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    modules: HashMap<String, HashMap<String, BoundFunction>>,
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut modules: Vec<_> = self.modules.keys().collect();
        modules.sort();
        f.debug_struct("FunctionRegistry")
            .field("modules", &modules)
            .finish()
    }
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `module.name`, replacing any previous registration.
    pub fn register<F>(&mut self, module: impl Into<String>, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&FunctionArgs) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.modules
            .entry(module.into())
            .or_default()
            .insert(name.into(), Arc::new(f));
        self
    }

    /// Builder form of [`register`](Self::register).
    pub fn with<F>(mut self, module: impl Into<String>, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&FunctionArgs) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.register(module, name, f);
        self
    }

    /// Looks up `module.name`: missing module and missing function are distinct errors.
    pub fn resolve(&self, module: &str, name: &str) -> Result<BoundFunction, SdnaError> {
        let functions = self
            .modules
            .get(module)
            .ok_or_else(|| SdnaError::ModuleNotFound(module.to_string()))?;
        functions
            .get(name)
            .cloned()
            .ok_or_else(|| SdnaError::FunctionNotFound {
                module: module.to_string(),
                function: name.to_string(),
            })
    }

    /// Resolves and invokes `module.name` with `args`.
    pub fn call(&self, module: &str, name: &str, args: &FunctionArgs) -> Result<Value, SdnaError> {
        let f = self.resolve(module, name)?;
        f(args).map_err(SdnaError::FunctionFailed)
    }
}
