//! Two-stage pipeline: a parallel fetch stage followed by a sequential
//! transform stage.
//!
//! Run with `cargo run --example simple_pipeline`.

use pipelining::prelude::*;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut fetch = MultiStepStage::builder("fetch").parallel(true).max_workers(2);
    for source in ["users", "orders", "products"] {
        fetch = fetch.step(FnStep::new(source, move |ctx: Context| async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            ctx.insert(source, format!("{} payload", source));
            Ok(())
        }));
    }

    let transform = MultiStepStage::builder("transform")
        .step(BlockingStep::new("count", |ctx: &Context| {
            let total = ["users", "orders", "products"]
                .iter()
                .filter(|key| ctx.contains_key(key))
                .count();
            ctx.insert("sources", total);
            Ok(())
        }))
        .step(FnStep::new("summarize", |ctx: Context| async move {
            let Some(sources) = ctx.get::<usize>("sources") else {
                return Err(PipelineError::step("summarize", "source count missing"));
            };
            ctx.insert("summary", format!("merged {} sources", sources));
            Ok(())
        }))
        .build()?;

    let mut pipeline = Pipeline::builder()
        .name("demo")
        .stage(fetch.build()?)
        .stage(transform)
        .build()?;

    match pipeline.run().await {
        Ok(ctx) => println!(
            "Pipeline completed: {}",
            ctx.get::<String>("summary").unwrap_or_default()
        ),
        Err(error) => println!("Pipeline failed: {}", error),
    }

    Ok(())
}
