use std::io::Cursor;

use serde_json::{json, Value};
use step_executor::protocol::{serve, ExecutorRequest, ExecutorResponse, Session};
use step_executor::registry::Hook;
use step_executor::runtime::NoDisplay;
use step_executor::{
    ExecutorConfig, HookContext, HookKind, MethodExecutor, Sandbox, ScreenshotSetting,
    TagAggregation, Unit, UnitError, UnitRegistry,
};

#[derive(Default)]
struct Cart {
    items: Vec<String>,
}

fn registry() -> UnitRegistry {
    let mut registry = UnitRegistry::new();
    registry
        .register_step(
            "Add <item> to the cart",
            Unit::with_arg::<String, _>("add_item", |item, inv| {
                let cart = inv.instance::<Cart>();
                cart.items.push(item.clone());
                let count = cart.items.len();
                inv.write_message(format!("cart has {} item(s)", count));
                Ok(())
            }),
        )
        .unwrap();
    registry
        .register_step(
            "Cart is empty",
            Unit::new("cart_empty", |inv| {
                let count = inv.instance::<Cart>().items.len();
                if count == 0 {
                    Ok(())
                } else {
                    Err(UnitError::msg(format!("expected empty cart, found {} item(s)", count)))
                }
            }),
        )
        .unwrap();
    registry.register_hook(
        HookKind::BeforeScenario,
        Hook::new(Unit::with_arg::<HookContext, _>("announce", |ctx, inv| {
            inv.write_message(format!("scenario {:?}", ctx.scenario));
            Ok(())
        })),
    );
    registry.register_hook(
        HookKind::AfterScenario,
        Hook::new(Unit::new("teardown_db", |_| Err(UnitError::msg("db still locked"))))
            .with_tags(["db"], TagAggregation::And),
    );
    registry
}

fn session() -> Session<Sandbox> {
    let config = ExecutorConfig {
        screenshot: ScreenshotSetting::Enabled,
        ..ExecutorConfig::default()
    };
    let executor =
        MethodExecutor::new(Sandbox::new(), &config).with_display_capture(Box::new(NoDisplay));
    Session::new(executor, registry())
}

fn status(response: ExecutorResponse) -> step_executor::protocol::ProtoExecutionResult {
    match response {
        ExecutorResponse::ExecutionStatus(result) => result,
        other => panic!("expected execution status, got {:?}", other),
    }
}

#[test]
fn steps_share_cached_state_until_cleared() {
    let mut session = session();
    let add = |item: &str| ExecutorRequest::ExecuteStep {
        step: "Add {} to the cart".into(),
        args: vec![item.into()],
    };

    let first = status(session.handle(add("apple")));
    assert!(!first.failed);
    assert_eq!(first.message, vec!["cart has 1 item(s)"]);

    let second = status(session.handle(add("pear")));
    assert_eq!(second.message, vec!["cart has 2 item(s)"]);

    let check = status(session.handle(ExecutorRequest::ExecuteStep {
        step: "Cart is empty".into(),
        args: Vec::new(),
    }));
    assert!(check.failed);
    assert_eq!(check.error_message.as_deref(), Some("expected empty cart, found 2 item(s)"));
    assert_eq!(check.screen_shot, Some(Vec::new()));

    assert_eq!(session.handle(ExecutorRequest::ClearCache), ExecutorResponse::Ok);
    let check = status(session.handle(ExecutorRequest::ExecuteStep {
        step: "Cart is empty".into(),
        args: Vec::new(),
    }));
    assert!(!check.failed);
}

#[test]
fn unknown_step_is_an_error_response() {
    let mut session = session();
    let response = session.handle(ExecutorRequest::ExecuteStep {
        step: "Fly to the moon".into(),
        args: Vec::new(),
    });
    assert_eq!(
        response,
        ExecutorResponse::Error {
            message: "Unknown step: Fly to the moon".into()
        }
    );
}

#[test]
fn tagged_hooks_follow_context_tags() {
    let mut session = session();

    let untagged = status(session.handle(ExecutorRequest::ExecuteHooks {
        kind: HookKind::AfterScenario,
        context: HookContext::default(),
    }));
    assert!(!untagged.failed);

    let tagged = status(session.handle(ExecutorRequest::ExecuteHooks {
        kind: HookKind::AfterScenario,
        context: HookContext {
            tags: vec!["db".into()],
            ..HookContext::default()
        },
    }));
    assert!(tagged.failed);
    assert_eq!(tagged.error_message.as_deref(), Some("db still locked"));
}

#[test]
fn serve_answers_each_line_and_stops_on_kill() {
    let input = [
        json!({"type": "executeHooks", "kind": "beforeScenario", "context": {"scenario": "Checkout"}}),
        json!({"type": "executeStep", "step": "Add <item> to the cart", "args": ["apple"]}),
        json!({"type": "bogus"}),
        json!({"type": "kill"}),
        json!({"type": "clearCache"}),
    ]
    .iter()
    .map(Value::to_string)
    .collect::<Vec<_>>()
    .join("\n\n");

    let mut output = Vec::new();
    serve(&mut session(), Cursor::new(input), &mut output).unwrap();

    let lines: Vec<Value> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 4);

    assert_eq!(lines[0]["type"], "executionStatus");
    assert_eq!(lines[0]["failed"], false);
    assert_eq!(lines[0]["message"], json!([]));

    assert_eq!(lines[1]["message"], json!(["cart has 1 item(s)"]));
    assert_eq!(lines[1]["recoverableError"], false);

    assert_eq!(lines[2]["type"], "error");
    assert!(lines[2]["message"]
        .as_str()
        .unwrap()
        .starts_with("Protocol error"));

    assert_eq!(lines[3], json!({"type": "ok"}));
}
