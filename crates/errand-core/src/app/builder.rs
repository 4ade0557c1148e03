//! HandlerBuilder - BackendHandler の構築とワイヤリング
//!
//! # Fail-fast 設計
//! - 設定の `default` があるか
//! - すべての `BACKEND` パスが factory に登録されているか
//! - expect_tasks() で期待したタスク関数がレジストリにあるか
//!
//! を build() 時にまとめてチェックします。backend 自体は lazy に作られます。

use std::sync::Arc;

use crate::app::config::TasksConfig;
use crate::app::factory::BackendFactory;
use crate::app::handler::BackendHandler;
use crate::typed::TaskRegistry;

/// # 使用例
/// ```ignore
/// let handler = HandlerBuilder::new(TasksConfig::from_path("tasks.json")?)
///     .registry(registry)
///     .expect_tasks(&["app::send_email"])
///     .build()?;
/// ```
pub struct HandlerBuilder {
    config: TasksConfig,
    factory: BackendFactory,
    registry: Arc<TaskRegistry>,
    expected_tasks: Option<Vec<String>>,
}

/// BuildError は BackendHandler 構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("invalid tasks config: {0}")]
    InvalidConfig(#[from] crate::domain::TaskError),

    #[error("unknown backend paths: {0:?}")]
    UnknownBackends(Vec<String>),

    #[error("Missing task functions: {0:?}. These tasks were expected but not registered.")]
    MissingTasks(Vec<String>),
}

impl HandlerBuilder {
    pub fn new(config: TasksConfig) -> Self {
        Self {
            config,
            factory: BackendFactory::new(),
            registry: Arc::new(TaskRegistry::new()),
            expected_tasks: None,
        }
    }

    pub fn registry(mut self, registry: Arc<TaskRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// 独自 backend を登録した factory を使う
    pub fn factory(mut self, factory: BackendFactory) -> Self {
        self.factory = factory;
        self
    }

    pub fn expect_tasks(mut self, names: &[&str]) -> Self {
        self.expected_tasks = Some(names.iter().map(|name| name.to_string()).collect());
        self
    }

    pub fn build(self) -> Result<BackendHandler, BuildError> {
        self.config.validate()?;

        let mut unknown: Vec<String> = self
            .config
            .aliases()
            .iter()
            .filter_map(|alias| self.config.get(alias))
            .map(|config| config.backend.clone())
            .filter(|path| !self.factory.contains(path))
            .collect();
        if !unknown.is_empty() {
            unknown.sort();
            unknown.dedup();
            return Err(BuildError::UnknownBackends(unknown));
        }

        if let Some(expected) = &self.expected_tasks {
            let missing: Vec<String> = expected
                .iter()
                .filter(|name| !self.registry.contains(name))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingTasks(missing));
            }
        }

        tracing::info!(aliases = ?self.config.aliases(), tasks = self.registry.len(), "task backends configured");
        Ok(BackendHandler::new(self.config, self.factory, self.registry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::config::BackendConfig;

    fn ping(_: ()) -> Result<String, String> {
        Ok("pong".to_string())
    }

    fn registry() -> Arc<TaskRegistry> {
        let mut registry = TaskRegistry::new();
        registry.register_as("app::ping", ping).unwrap();
        Arc::new(registry)
    }

    #[test]
    fn test_build_success() {
        let handler = HandlerBuilder::new(TasksConfig::default())
            .registry(registry())
            .expect_tasks(&["app::ping"])
            .build();
        assert!(handler.is_ok());
    }

    #[test]
    fn test_build_missing_tasks() {
        let handler = HandlerBuilder::new(TasksConfig::default())
            .registry(registry())
            .expect_tasks(&["app::ping", "app::pong"])
            .build();
        assert!(matches!(
            handler,
            Err(BuildError::MissingTasks(missing)) if missing == vec!["app::pong".to_string()]
        ));
    }

    #[test]
    fn test_build_unknown_backend_path() {
        let config = TasksConfig::default().with_backend("db", BackendConfig::new("errand::DatabaseBackend"));
        let handler = HandlerBuilder::new(config).build();
        assert!(matches!(
            handler,
            Err(BuildError::UnknownBackends(paths)) if paths == vec!["errand::DatabaseBackend".to_string()]
        ));
    }

    #[test]
    fn test_build_without_default() {
        let config = TasksConfig::new().with_backend("other", BackendConfig::new("errand::DummyBackend"));
        assert!(matches!(
            HandlerBuilder::new(config).build(),
            Err(BuildError::InvalidConfig(_))
        ));
    }
}
