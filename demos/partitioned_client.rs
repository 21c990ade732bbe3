//! Per-tenant fixed windows in front of one shared API client.
use quotaflow::prelude::*;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct ApiCall {
    tenant: Option<&'static str>,
    path: &'static str,
}

#[tokio::main]
async fn main() -> Result<(), LimiterError<std::io::Error>> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let config = TimeBasedConfig::new(2, Duration::from_millis(500)).expect("valid config");
    let start = Instant::now();
    let limiter = PartitionedRateLimiter::time_based(
        config,
        |call: &ApiCall| call.tenant.map(String::from),
        move |call: ApiCall| async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok::<_, std::io::Error>(format!(
                "{:>6}ms {:<8} {}",
                start.elapsed().as_millis(),
                call.tenant.unwrap_or("<shared>"),
                call.path
            ))
        },
    );

    let calls = [
        ApiCall { tenant: Some("acme"), path: "/orders" },
        ApiCall { tenant: Some("acme"), path: "/orders/1" },
        ApiCall { tenant: Some("acme"), path: "/orders/2" },
        ApiCall { tenant: Some("globex"), path: "/invoices" },
        ApiCall { tenant: None, path: "/health" },
        ApiCall { tenant: Some("acme"), path: "/orders/3" },
    ];
    let results =
        futures::future::join_all(calls.into_iter().map(|call| limiter.request(call, RequestOptions::default())))
            .await;
    for line in results {
        if let Some(line) = line? {
            println!("{line}");
        }
    }

    let dropped = limiter
        .request(ApiCall { tenant: Some("acme"), path: "/orders/4" }, RequestOptions::return_null())
        .await?;
    println!("acme burst while full -> {dropped:?}");
    println!("partitions: {}", limiter.partition_count());
    Ok(())
}
