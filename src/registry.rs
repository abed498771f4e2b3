//! Name-keyed registry of method and model implementations.
//!
//! A [`Registry`] is built once at startup, normally via
//! [`Registry::with_builtins`], and handed to the pipelines. Methods and
//! model backends are looked up by free-form string keys.
//!
//! Registering a name that already exists replaces the previous entry and
//! keeps its original position in listing order.
//!
//! # Example
//!
//! ```ignore
//! use analogia::{MethodOptions, Registry};
//!
//! let registry = Registry::with_builtins();
//! let method = registry.build_method("pag", &MethodOptions::default())?;
//! let model = registry.build_model(&model_config, &deployment)?;
//! let analogy = method.run(&question, model.as_ref()).await?;
//! ```

use crate::llm::{ChatModel, LlmModel, ScriptedModel};
use crate::methods::{Method, MethodOptions, PagMethod, SagMethod};
use crate::models::{AnalogiaError, DeploymentConfig, ModelConfig, Result};
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Builds a method from its options.
pub type MethodFactory = Arc<dyn Fn(&MethodOptions) -> Result<Box<dyn Method>> + Send + Sync>;

/// Builds a model backend from its config.
pub type ModelFactory =
    Arc<dyn Fn(&ModelConfig, &DeploymentConfig) -> Result<Box<dyn LlmModel>> + Send + Sync>;

/// Which table a registry key lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistryKind {
    Method,
    Model,
}

impl fmt::Display for RegistryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Method => write!(f, "method"),
            Self::Model => write!(f, "model"),
        }
    }
}

/// One insertion-ordered table of named entries.
struct Table<T> {
    kind: RegistryKind,
    entries: IndexMap<String, T>,
}

impl<T> Table<T> {
    fn new(kind: RegistryKind) -> Self {
        Self {
            kind,
            entries: IndexMap::new(),
        }
    }

    fn insert(&mut self, name: String, entry: T) {
        if self.entries.insert(name.clone(), entry).is_some() {
            debug!(kind = %self.kind, name = %name, "Replacing registered entry");
        } else {
            debug!(kind = %self.kind, name = %name, "Registered entry");
        }
    }

    fn get(&self, name: &str) -> Result<&T> {
        self.entries.get(name).ok_or_else(|| AnalogiaError::NotFound {
            kind: self.kind,
            name: name.to_string(),
        })
    }

    fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }
}

/// Registry of method and model factories.
pub struct Registry {
    methods: Table<MethodFactory>,
    models: Table<ModelFactory>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            methods: Table::new(RegistryKind::Method),
            models: Table::new(RegistryKind::Model),
        }
    }

    /// Registry holding every built-in method and backend.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();

        registry.register_method(SagMethod::NAME, |options: &MethodOptions| {
            Ok(Box::new(SagMethod::from_options(options)?) as Box<dyn Method>)
        });
        registry.register_method(PagMethod::NAME, |options: &MethodOptions| {
            Ok(Box::new(PagMethod::from_options(options)?) as Box<dyn Method>)
        });

        let chat: ModelFactory = Arc::new(
            |config: &ModelConfig, deployment: &DeploymentConfig| -> Result<Box<dyn LlmModel>> {
                Ok(Box::new(ChatModel::from_config(config, deployment)?))
            },
        );
        registry.register_model_factory(ChatModel::BACKEND, chat.clone());
        registry.register_model_factory(ChatModel::LEGACY_BACKEND, chat);
        registry.register_model(
            ScriptedModel::BACKEND,
            |config: &ModelConfig, _: &DeploymentConfig| {
                Ok(Box::new(ScriptedModel::from_config(config)?) as Box<dyn LlmModel>)
            },
        );

        registry
    }

    // ═══════════════════════════════════════════════════════════════════════
    // METHODS
    // ═══════════════════════════════════════════════════════════════════════

    pub fn register_method<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&MethodOptions) -> Result<Box<dyn Method>> + Send + Sync + 'static,
    {
        self.register_method_factory(name, Arc::new(factory));
    }

    pub fn register_method_factory(&mut self, name: impl Into<String>, factory: MethodFactory) {
        self.methods.insert(name.into(), factory);
    }

    /// Factory registered under `name`.
    pub fn get_method(&self, name: &str) -> Result<MethodFactory> {
        self.methods.get(name).cloned()
    }

    /// Registered method names in registration order.
    pub fn list_methods(&self) -> Vec<&str> {
        self.methods.names()
    }

    /// Look up `name` and build the method from `options`.
    pub fn build_method(&self, name: &str, options: &MethodOptions) -> Result<Box<dyn Method>> {
        let factory = self.methods.get(name)?;
        factory(options)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // MODELS
    // ═══════════════════════════════════════════════════════════════════════

    pub fn register_model<F>(&mut self, backend: impl Into<String>, factory: F)
    where
        F: Fn(&ModelConfig, &DeploymentConfig) -> Result<Box<dyn LlmModel>>
            + Send
            + Sync
            + 'static,
    {
        self.register_model_factory(backend, Arc::new(factory));
    }

    pub fn register_model_factory(&mut self, backend: impl Into<String>, factory: ModelFactory) {
        self.models.insert(backend.into(), factory);
    }

    /// Factory registered under `backend`.
    pub fn get_model(&self, backend: &str) -> Result<ModelFactory> {
        self.models.get(backend).cloned()
    }

    /// Registered backend names in registration order.
    pub fn list_models(&self) -> Vec<&str> {
        self.models.names()
    }

    /// Build a model using the backend named in `config.backend`.
    pub fn build_model(
        &self,
        config: &ModelConfig,
        deployment: &DeploymentConfig,
    ) -> Result<Box<dyn LlmModel>> {
        let factory = self.models.get(&config.backend)?;
        let model = factory(config, deployment)?;
        debug!(
            backend = %config.backend,
            model = %model.name(),
            role = %model.role(),
            "Built model"
        );
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scripted_factory(reply: &'static str) -> ModelFactory {
        Arc::new(
            move |config: &ModelConfig, _: &DeploymentConfig| -> Result<Box<dyn LlmModel>> {
                Ok(Box::new(ScriptedModel::echo(&config.name, reply)))
            },
        )
    }

    fn model_config(backend: &str) -> ModelConfig {
        toml::from_str(&format!(
            r#"
backend = "{backend}"
name = "stub"
model_id = "stub-1"
reply = "hello"
"#
        ))
        .unwrap()
    }

    #[test]
    fn test_builtins_listed_in_registration_order() {
        let registry = Registry::with_builtins();
        assert_eq!(registry.list_methods(), vec!["sag", "pag"]);
        assert_eq!(
            registry.list_models(),
            vec!["openai_chat", "langchain_chat_openai", "scripted"]
        );
    }

    #[test]
    fn test_get_returns_registered_factory() {
        let mut registry = Registry::new();
        let factory = scripted_factory("a");
        registry.register_model_factory("custom", factory.clone());

        let found = registry.get_model("custom").unwrap();
        assert!(Arc::ptr_eq(&found, &factory));
    }

    #[test]
    fn test_reregistration_overwrites_in_place() {
        let mut registry = Registry::new();
        let first = scripted_factory("first");
        let second = scripted_factory("second");
        registry.register_model_factory("a", first.clone());
        registry.register_model_factory("b", scripted_factory("b"));
        registry.register_model_factory("a", second.clone());

        let found = registry.get_model("a").unwrap();
        assert!(Arc::ptr_eq(&found, &second));
        assert!(!Arc::ptr_eq(&found, &first));
        assert_eq!(registry.list_models(), vec!["a", "b"]);
    }

    #[test]
    fn test_unknown_names_are_not_found() {
        let registry = Registry::with_builtins();

        let err = registry.get_method("tot").err().unwrap();
        assert_eq!(err.to_string(), "method 'tot' is not registered");

        let err = registry.get_model("anthropic").err().unwrap();
        match err {
            AnalogiaError::NotFound { kind, name } => {
                assert_eq!(kind, RegistryKind::Model);
                assert_eq!(name, "anthropic");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_build_model_dispatches_on_backend() {
        let registry = Registry::with_builtins();
        let model = registry
            .build_model(&model_config("scripted"), &DeploymentConfig::default())
            .unwrap();
        assert_eq!(model.name(), "stub");
        assert_eq!(model.model_id(), "stub-1");

        let err = registry
            .build_model(&model_config("nope"), &DeploymentConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, AnalogiaError::NotFound { .. }));
    }

    #[test]
    fn test_build_chat_model_without_credentials_fails() {
        let registry = Registry::with_builtins();
        let mut config = model_config("openai_chat");
        config.api_key_env = "ANALOGIA_TEST_UNSET_KEY".to_string();

        let err = registry
            .build_model(&config, &DeploymentConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, AnalogiaError::MissingCredential { .. }));
    }

    #[test]
    fn test_build_method_by_name() {
        let registry = Registry::with_builtins();
        let method = registry
            .build_method("pag", &MethodOptions::default())
            .unwrap();
        assert_eq!(method.name(), "pag");
    }
}
