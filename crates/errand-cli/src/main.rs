use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use errand_core::{
    HandlerBuilder, ResultStatus, Task, TaskArgs, TaskBackend, TaskError, TaskRegistry,
    TaskResult, TasksConfig,
};

const DEMO_CONFIG: &str = r#"
{
  "default": { "BACKEND": "errand::ImmediateBackend" },
  "dummy": {
    "BACKEND": "errand::DummyBackend",
    "QUEUES": ["default", "emails"],
    "OPTIONS": { "max_results": 100 }
  }
}
"#;

#[derive(Debug, Deserialize)]
struct HelloPayload {
    name: String,
}

fn hello(p: HelloPayload) -> Result<String, String> {
    Ok(format!("Hello, {}!", p.name))
}

fn divide((a, b): (i64, i64)) -> Result<i64, String> {
    if b == 0 {
        return Err("division by zero".to_string());
    }
    Ok(a / b)
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

/// 第 1 引数があれば設定ファイルとして読む
fn load_config() -> Result<TasksConfig, TaskError> {
    match std::env::args().nth(1) {
        Some(path) => TasksConfig::from_path(path),
        None => TasksConfig::from_json_str(DEMO_CONFIG),
    }
}

fn print_result<T>(label: &str, result: &TaskResult<T>) -> Result<(), TaskError> {
    println!("{label}: {}", serde_json::to_string(result)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    // (A) タスク関数を登録
    let mut registry = TaskRegistry::new();
    let hello_task = registry.register(hello)?;
    let divide_task = registry.register(divide)?;
    let registry = Arc::new(registry);

    // (B) 設定から handler を構築（backend は lazy）
    let handler = HandlerBuilder::new(load_config()?)
        .registry(Arc::clone(&registry))
        .expect_tasks(&[hello_task.name(), divide_task.name()])
        .build()?;
    tracing::info!(backends = ?handler.aliases(), "errand demo ready");

    // (C) 即時実行 backend（sync / async）
    let greeting = hello_task.enqueue(&handler, TaskArgs::new().kwarg("name", "errand"))?;
    print_result("immediate", &greeting)?;
    println!("return value: {}", greeting.return_value()?);

    let quotient = divide_task.aenqueue(&handler, TaskArgs::new().arg(84).arg(2)).await?;
    println!("84 / 2 = {}", quotient.return_value()?);

    let failed = divide_task.enqueue(&handler, TaskArgs::new().arg(1).arg(0))?;
    if failed.status == ResultStatus::Failed {
        print_result("failed", &failed)?;
    }

    // (D) 記録だけする backend + 結果の参照
    let queued = hello_task
        .with_backend("dummy")
        .with_queue_name("emails")
        .with_priority(10)
        .aenqueue(&handler, TaskArgs::new().kwarg("name", "later"))
        .await?;
    let fetched = hello_task.with_backend("dummy").aget_result(&handler, queued.id).await?;
    print_result("dummy", &fetched)?;

    // (E) 検証エラーの例: タイムゾーンなしの run_after / 未登録の関数
    let naive = NaiveDate::from_ymd_opt(2030, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or("invalid demo date")?;
    let deferred = hello_task.with_backend("dummy").with_run_after(naive);
    if let Err(err) = deferred.enqueue(&handler, TaskArgs::new().kwarg("name", "naive")) {
        println!("rejected: {err}");
    }
    let local = Task::from_fn("errand_cli::local", |_: ()| Ok::<_, String>(()));
    if let Err(err) = handler.default_backend()?.validate_task(&local) {
        println!("rejected: {err}");
    }

    handler.close_all()?;
    tracing::info!("backends closed");
    Ok(())
}
