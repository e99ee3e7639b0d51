//! Pipeline benchmarks
//!
//! Measures a request through the router and the endpoint pipeline, and the
//! cost of validation alone.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use typedapi::prelude::*;
use typedapi_testing::{TestClient, TestRequest};

#[derive(Debug, Default, Deserialize, Serialize, Validate)]
#[serde(default)]
struct CreateJob {
    #[validate(required, length(min = 1, max = 64))]
    queue: Option<String>,
    #[validate(length(max = 32))]
    tags: Vec<String>,
    #[validate(range(min = 0, max = 10))]
    priority: i64,
}

impl ApiRequest for CreateJob {}
impl ApiResponse for CreateJob {}

async fn create_job(_ctx: Context, req: CreateJob) -> Result<CreateJob, BoxError> {
    Ok(req)
}

fn client() -> TestClient {
    let mut router = Router::new();
    mount_fn(
        &mut router,
        EndpointMeta::new("POST /api/jobs", StatusCode::CREATED),
        create_job,
        MountOptions::default(),
    );
    TestClient::new(router)
}

fn payload(tags: usize) -> String {
    let tags: Vec<String> = (0..tags).map(|i| format!("tag-{i}")).collect();
    serde_json::json!({ "queue": "default", "tags": tags, "priority": 5 }).to_string()
}

/// Benchmark a full request through the pipeline
fn bench_pipeline(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let client = client();

    let mut group = c.benchmark_group("pipeline");

    for tags in [0usize, 4, 16, 32].iter() {
        let body = payload(*tags);
        group.bench_with_input(BenchmarkId::new("tags", tags), &body, |b, body| {
            b.iter(|| {
                rt.block_on(client.request(TestRequest::post("/api/jobs").body(body.clone())))
            })
        });
    }

    group.bench_function("validation_error", |b| {
        b.iter(|| {
            rt.block_on(client.request(TestRequest::post("/api/jobs").body(r#"{"priority":99}"#)))
        })
    });

    group.finish();
}

/// Benchmark validation and message translation alone
fn bench_validation(c: &mut Criterion) {
    let validator = Validator::new();
    let valid: CreateJob = serde_json::from_str(&payload(4)).unwrap();
    let invalid = CreateJob {
        priority: 99,
        ..Default::default()
    };

    let mut group = c.benchmark_group("validation");

    group.bench_function("valid", |b| {
        b.iter(|| validator.validate(black_box(&valid)).is_ok())
    });

    group.bench_function("first_violation_message", |b| {
        b.iter(|| match validator.validate(black_box(&invalid)) {
            Ok(()) => String::new(),
            Err(err) => validator.first_violation_message(&err),
        })
    });

    group.finish();
}

criterion_group!(benches, bench_pipeline, bench_validation);
criterion_main!(benches);
