//! Resolving `require`d modules to their exported values.

use globcheck_core::{Value, Whitelist};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("module '{module}' not found")]
    NotFound { module: String },

    #[error("module '{module}' failed to load: {reason}")]
    Failed { module: String, reason: String },
}

/// A global that appeared while a module was being loaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewGlobal {
    pub name: String,
    /// The global holds the value `require` returned.
    pub is_module_value: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoadedModule {
    pub exports: Value,
    pub new_globals: Vec<NewGlobal>,
}

impl LoadedModule {
    pub fn new(exports: Value) -> Self {
        LoadedModule {
            exports,
            new_globals: Vec::new(),
        }
    }
}

/// Finds a module by the name passed to `require`.
pub trait ModuleLoader {
    fn load(&mut self, module: &str) -> Result<LoadedModule, LoadError>;
}

/// Module exports declared ahead of time, keyed by dotted module name.
#[derive(Clone, Debug, Default)]
pub struct PreloadedModules {
    modules: Whitelist,
}

impl PreloadedModules {
    pub fn new() -> Self {
        PreloadedModules::default()
    }

    /// Every top-level entry of `modules` is a module; nested tables hold
    /// dotted submodules (`a.b`).
    pub fn from_whitelist(modules: Whitelist) -> Self {
        PreloadedModules { modules }
    }

    pub fn insert(&mut self, module: &str, exports: Value) {
        self.modules.insert_path(module, exports);
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl ModuleLoader for PreloadedModules {
    fn load(&mut self, module: &str) -> Result<LoadedModule, LoadError> {
        self.modules
            .get_path(module)
            .map(|exports| LoadedModule::new(exports.clone()))
            .ok_or_else(|| LoadError::NotFound {
                module: module.to_string(),
            })
    }
}

/// Tries each loader in turn. A later loader is only consulted when the
/// earlier ones did not find the module.
#[derive(Default)]
pub struct ChainLoader {
    loaders: Vec<Box<dyn ModuleLoader>>,
}

impl ChainLoader {
    pub fn new() -> Self {
        ChainLoader::default()
    }

    pub fn push(&mut self, loader: Box<dyn ModuleLoader>) {
        self.loaders.push(loader);
    }

    pub fn with(mut self, loader: impl ModuleLoader + 'static) -> Self {
        self.push(Box::new(loader));
        self
    }
}

impl ModuleLoader for ChainLoader {
    fn load(&mut self, module: &str) -> Result<LoadedModule, LoadError> {
        let mut last = LoadError::NotFound {
            module: module.to_string(),
        };
        for loader in &mut self.loaders {
            match loader.load(module) {
                Ok(loaded) => return Ok(loaded),
                Err(err @ LoadError::Failed { .. }) => return Err(err),
                Err(err) => last = err,
            }
        }
        Err(last)
    }
}
