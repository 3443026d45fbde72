//! A small greeter service.
//!
//! ```text
//! cargo run -p portico --example greeter
//! curl localhost:8080/api/greet/ada
//! curl -XPOST localhost:8080/api/greetings -H 'content-type: application/json' -d '{"name":"ada","times":2}'
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use portico::prelude::*;
use portico::router::middleware::from_fn;
use serde::Deserialize;
use serde_json::json;

struct Greeter {
    greeting: String,
    served: AtomicU64,
}

impl Service for Greeter {
    fn name(&self) -> &str {
        "greeter"
    }

    fn init(&self, server: &Server) {
        tracing::info!(base_url = %server.base_url(), "Greeter ready");
    }
}

impl Greeter {
    fn greet(&self, name: &str) -> String {
        self.served.fetch_add(1, Ordering::Relaxed);
        format!("{}, {name}!", self.greeting)
    }
}

#[derive(Deserialize)]
struct NewGreeting {
    name: String,
    times: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigLoader::new()
        .with_optional_file("greeter.toml")?
        .with_env_prefix("GREETER")
        .load()?;
    let server = portico::bootstrap(config)?;

    server.register_service(Greeter {
        greeting: "Hello".to_string(),
        served: AtomicU64::new(0),
    });

    let api = server.router().group("/api");
    api.middleware(from_fn("timing", |request, next| {
        Box::pin(async move {
            let start = std::time::Instant::now();
            let path = request.uri().path().to_string();
            let response = next.run(request).await;
            tracing::debug!(%path, elapsed_us = start.elapsed().as_micros() as u64, "Handled");
            response
        })
    }));

    let handle = server.clone();
    api.get("/greet/{name}", move |req: DomainRequest| {
        let server = handle.clone();
        async move {
            let greeter = server.service::<Greeter>("greeter")?;
            let name = req.param("name").unwrap_or("stranger");
            Ok::<_, HandlerError>(Json(json!({ "message": greeter.greet(name) })))
        }
    })
    .name("greet");

    let handle = server.clone();
    api.post("/greetings", move |req: DomainRequest| {
        let server = handle.clone();
        async move {
            let body: NewGreeting = req.extract()?;
            let greeter = server.service::<Greeter>("greeter")?;
            let messages: Vec<String> = (0..body.times).map(|_| greeter.greet(&body.name)).collect();
            let url = server
                .route_url("greet", &[("name", &body.name)])
                .map_err(|e| HandlerError::internal(e.to_string()))?;
            Ok::<_, HandlerError>(Json(json!({ "messages": messages, "url": url })))
        }
    })
    .shape(
        RequestShape::new()
            .field("name", [Rule::Required, Rule::String, Rule::Between(1.0, 40.0)])
            .field("times", [Rule::Required, Rule::Integer, Rule::Min(1.0), Rule::Max(5.0)]),
    );

    server.register_shutdown_hook_named("report", |server| async move {
        if let Some(greeter) = server.lookup_service::<Greeter>("greeter") {
            tracing::info!(greetings = greeter.served.load(Ordering::Relaxed), "Greeter shutting down");
        }
        Ok(())
    });

    server.register_signal_hook()?;
    server.start().await?;
    Ok(())
}
