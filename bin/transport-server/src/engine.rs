use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt};
use graphql_transport::{async_trait, ExecutionEngine, ExecutionRequest, ExecutionResult};
use serde_json::{json, Value};

const TICKS: u64 = 3;

/// Answers every operation with what it received. Subscriptions tick a few times.
pub struct EchoEngine {
    pub tick_interval: Duration,
}

impl Default for EchoEngine {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
        }
    }
}

fn echo(request: &ExecutionRequest) -> Value {
    let uploads: Vec<Value> = request
        .uploads
        .iter()
        .map(|(key, file)| {
            json!({
                "key": key,
                "filename": file.filename,
                "size": file.content.len(),
            })
        })
        .collect();

    json!({
        "query": request.query,
        "operationName": request.operation_name,
        "variables": request.variables,
        "uploads": uploads,
    })
}

#[async_trait]
impl ExecutionEngine for EchoEngine {
    async fn execute(&self, request: ExecutionRequest) -> ExecutionResult {
        ExecutionResult::from_data(json!({ "echo": echo(&request) }))
    }

    async fn subscribe(&self, request: ExecutionRequest) -> BoxStream<'static, ExecutionResult> {
        let echo = echo(&request);
        let interval = self.tick_interval;

        stream::unfold(1, move |tick| {
            let echo = echo.clone();
            async move {
                if tick > TICKS {
                    return None;
                }
                if tick > 1 {
                    tokio::time::sleep(interval).await;
                }
                let result = ExecutionResult::from_data(json!({ "tick": tick, "echo": echo }));
                Some((result, tick + 1))
            }
        })
        .boxed()
    }
}
