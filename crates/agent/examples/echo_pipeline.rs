//! Minimal wiring demo: scripted model → agent loop → encoded stream.
//!
//! The wire encoding comes from `braidline.toml` (or defaults when the
//! file is absent): `sse` for discrete typed frames, `tagged` for the
//! in-band two-channel text encoding. Run with `RUST_LOG=debug` to watch
//! the loop's internal tracing.

use braidline_agent::{AgentLoop, ScriptedModel};
use braidline_config::{Encoding, PipelineConfig};
use braidline_tools::default_registry;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = PipelineConfig::load(Path::new("braidline.toml")).unwrap_or_default();

    let registry = Arc::new(default_registry());
    let system = format!("你是一个博客助手。\n\n{}", registry.describe_all());

    let model = ScriptedModel::tool_then_answer(
        "<tool_call name=\"calculator\">{\"expression\":\"(2 + 3) * 4\"}</tool_call>",
        "计算结果是 20。",
    );

    let agent = AgentLoop::from_config(Arc::new(model), registry, &config);
    let events = agent.run("帮我算一下 (2+3)*4", vec![], system);

    let mut chunks = match config.stream.encoding {
        Encoding::Sse => braidline_stream::encode_events(events),
        Encoding::Tagged => braidline_stream::encode_tagged(events),
    };
    while let Some(chunk) = chunks.recv().await {
        print!("{chunk}");
    }
    println!();
}
