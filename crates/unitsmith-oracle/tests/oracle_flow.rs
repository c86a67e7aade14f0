use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use unitsmith_core::context::{GeneratedTest, PromptContext};
use unitsmith_engine::CancellationToken;
use unitsmith_engine::collaborators::{GenerationOracle, OracleError};
use unitsmith_oracle::{LlmOracle, LlmProvider, LlmResponse, ProviderError};

/// Replays canned answers and remembers every user prompt.
struct Replay {
    answers: Mutex<VecDeque<Result<LlmResponse, ProviderError>>>,
    prompts: Mutex<Vec<String>>,
}

impl Replay {
    fn new(answers: Vec<Result<LlmResponse, ProviderError>>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

impl LlmProvider for &'static Replay {
    fn complete(&self, _system: &str, user: &str) -> Result<LlmResponse, ProviderError> {
        self.prompts.lock().unwrap().push(user.to_string());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(ProviderError::EmptyResponse))
    }

    fn model_name(&self) -> &str {
        "replay"
    }

    fn cost_per_mtok_input(&self) -> f64 {
        1.0
    }

    fn cost_per_mtok_output(&self) -> f64 {
        2.0
    }
}

fn answer(code: &str) -> Result<LlmResponse, ProviderError> {
    Ok(LlmResponse {
        text: format!("Here is the test.\n\n```java\n{code}\n```\n"),
        input_tokens: Some(500_000),
        output_tokens: Some(250_000),
    })
}

fn oracle(answers: Vec<Result<LlmResponse, ProviderError>>, retries: usize) -> (LlmOracle, &'static Replay) {
    let replay: &'static Replay = Box::leak(Box::new(Replay::new(answers)));
    let oracle = LlmOracle::new(Box::new(replay), retries).with_backoff(Duration::ZERO);
    (oracle, replay)
}

fn ctx() -> PromptContext {
    let mut ctx = PromptContext::default();
    ctx.class_name = "com.acme.Cart".into();
    ctx.simple_class_name = "Cart".into();
    ctx.package = "package com.acme;".into();
    ctx.method_name = "add".into();
    ctx.method_signature = "add(int)".into();
    ctx.method_source = "public void add(int n) { if (n > 0) { total += n; } }".into();
    ctx.context = "package com.acme;\npublic class Cart {\n\npublic void add(int n) { if (n > 0) { total += n; } }\n}".into();
    ctx
}

#[test]
fn transient_failures_are_retried_and_usage_tracked() {
    let (oracle, replay) = oracle(
        vec![
            Err(ProviderError::Http("connection reset".into())),
            Err(ProviderError::Api {
                status: 503,
                message: "overloaded".into(),
            }),
            answer("class Cart_add_0_Test {}"),
        ],
        2,
    );

    let test = oracle.generate(&ctx(), &CancellationToken::new()).unwrap();
    assert_eq!(test.class_name, "com.acme.Cart_add_0_Test");
    assert_eq!(replay.prompts.lock().unwrap().len(), 3);

    let usage = oracle.usage();
    assert_eq!(usage.calls, 1);
    assert!((usage.total_cost_usd() - 1.0).abs() < 1e-9);
}

#[test]
fn client_errors_are_not_retried() {
    let (oracle, replay) = oracle(
        vec![
            Err(ProviderError::Api {
                status: 401,
                message: "invalid x-api-key".into(),
            }),
            answer("class Never {}"),
        ],
        3,
    );

    let err = oracle
        .generate(&ctx(), &CancellationToken::new())
        .unwrap_err();
    match err {
        OracleError::Request(message) => assert!(message.contains("invalid x-api-key")),
        other => panic!("expected a request error, got {other:?}"),
    }
    assert_eq!(replay.prompts.lock().unwrap().len(), 1);
}

#[test]
fn repair_sends_prior_test_and_diagnostics() {
    let (oracle, replay) = oracle(vec![answer("class Cart_add_0_Test { /* fixed */ }")], 0);
    let mut ctx = ctx();
    ctx.round = 1;
    ctx.unit_test = Some(GeneratedTest {
        class_name: "com.acme.Cart_add_0_Test".into(),
        source: "class Cart_add_0_Test { broken }".into(),
    });

    let repaired = oracle
        .repair(
            &ctx,
            "Cart_add_0_Test.java:1: error: <identifier> expected",
            &CancellationToken::new(),
        )
        .unwrap();
    assert!(repaired.source.contains("/* fixed */"));

    let prompts = replay.prompts.lock().unwrap();
    assert!(prompts[0].contains("class Cart_add_0_Test { broken }"));
    assert!(prompts[0].contains("<identifier> expected"));
}

#[test]
fn answer_without_code_is_a_failed_round_not_a_fault() {
    let (oracle, _) = oracle(
        vec![Ok(LlmResponse {
            text: "I need more context.".into(),
            ..LlmResponse::default()
        })],
        0,
    );
    let err = oracle
        .generate(&ctx(), &CancellationToken::new())
        .unwrap_err();
    assert!(matches!(err, OracleError::NoTest(_)));
}

#[test]
fn cancelled_token_skips_the_call() {
    let (oracle, replay) = oracle(vec![answer("class T {}")], 0);
    let cancel = CancellationToken::new();
    cancel.cancel();
    assert!(matches!(
        oracle.generate(&ctx(), &cancel),
        Err(OracleError::Cancelled)
    ));
    assert!(replay.prompts.lock().unwrap().is_empty());
}
