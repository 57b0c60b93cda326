use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;

use mailspool_api::app::{self, AppServices};
use mailspool_infra::{
    DeliveryError, InMemoryJobStore, Mailer, PoolConfig, WorkerPool, WorkerPoolHandle,
};

struct AcceptAllMailer;

#[async_trait]
impl Mailer for AcceptAllMailer {
    async fn deliver(&self, _: &str, _: &str, _: &str) -> Result<(), DeliveryError> {
        Ok(())
    }
}

struct TestServer {
    base_url: String,
    server: tokio::task::JoinHandle<()>,
    workers: Option<WorkerPoolHandle>,
}

impl TestServer {
    /// Build the same router as prod over an in-memory store, bind to an
    /// ephemeral port, and run a fast worker pool against it.
    async fn spawn() -> Self {
        let store = InMemoryJobStore::arc();

        let workers = WorkerPool::new(
            store.clone(),
            Arc::new(AcceptAllMailer),
            PoolConfig {
                worker_count: 2,
                poll_interval: Duration::from_millis(5),
                batch_size: 10,
                max_retries: 3,
            },
        )
        .start();

        let app = app::build_app(Arc::new(AppServices::new(store)));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            server,
            workers: Some(workers),
        }
    }

    async fn stop(mut self) {
        if let Some(workers) = self.workers.take() {
            workers.shutdown().await;
        }
        self.server.abort();
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn get_job_eventually_sent(
    client: &reqwest::Client,
    base_url: &str,
    id: &str,
) -> serde_json::Value {
    // Delivery is asynchronous from the enqueuing request; poll briefly
    // until the workers have picked the job up.
    for _ in 0..100 {
        let res = client
            .get(format!("{base_url}/emails/{id}"))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let job: serde_json::Value = res.json().await.unwrap();
        if job["status"] == "sent" {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job was not delivered within timeout");
}

#[tokio::test]
async fn health_endpoint_is_up() {
    let server = TestServer::spawn().await;
    let res = reqwest::get(format!("{}/health", server.base_url))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    server.stop().await;
}

#[tokio::test]
async fn enqueued_email_is_eventually_sent() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/emails", server.base_url))
        .json(&json!({
            "to": "user@example.com",
            "subject": "welcome",
            "body": "hello there",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::ACCEPTED);

    let accepted: serde_json::Value = res.json().await.unwrap();
    let id = accepted["job_id"].as_str().unwrap().to_string();

    let job = get_job_eventually_sent(&client, &server.base_url, &id).await;
    assert_eq!(job["to"], "user@example.com");
    assert_eq!(job["subject"], "welcome");
    assert_eq!(job["body"], "hello there");
    assert_eq!(job["attempts"], 0);
    assert!(job["sent_at"].is_string());

    server.stop().await;
}

#[tokio::test]
async fn invalid_payload_is_rejected_before_persistence() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/emails", server.base_url))
        .json(&json!({ "to": "   ", "subject": "s", "body": "b" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");

    server.stop().await;
}

#[tokio::test]
async fn oversized_subject_is_rejected() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/emails", server.base_url))
        .json(&json!({
            "to": "a@b.com",
            "subject": "s".repeat(256),
            "body": "b",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    server.stop().await;
}

#[tokio::test]
async fn unknown_and_malformed_ids() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!(
            "{}/emails/00000000-0000-7000-8000-000000000000",
            server.base_url
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .get(format!("{}/emails/not-a-uuid", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    server.stop().await;
}
