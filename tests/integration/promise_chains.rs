//! Promise chains keep their constructing context and report unobserved
//! rejections once.

use super::test_utils::{record_events, MockHost};
use anyhow::anyhow;
use ctxzone::{context, CallbackError, PromiseState};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::rc::Rc;

#[test]
fn test_every_link_runs_under_the_constructing_context() {
    let mock = MockHost::new();
    let registry = mock.registry();
    let owner = registry.create_ctx(["promise"]).unwrap();
    let bystander = registry.create_ctx(["promise"]).unwrap();
    let seen = Rc::new(RefCell::new(Vec::new()));

    let p = owner.run(|| mock.host.promises.resolved(json!(1)));
    let (s1, s2, s3) = (seen.clone(), seen.clone(), seen.clone());
    let end = bystander.run(|| {
        p.then(move |v| {
            s1.borrow_mut().push(context::current().map(|c| c.id()));
            Ok(json!(v.as_i64().unwrap_or(0) + 1))
        })
        .then(move |_| {
            s2.borrow_mut().push(context::current().map(|c| c.id()));
            Err(anyhow!("second link failed"))
        })
        .catch(move |_| {
            s3.borrow_mut().push(context::current().map(|c| c.id()));
            Ok(Value::from("recovered"))
        })
    });
    mock.run_microtasks();

    assert_eq!(*seen.borrow(), vec![Some(owner.id()); 3]);
    assert!(matches!(end.state(), PromiseState::Fulfilled(v) if v == json!("recovered")));
}

#[test]
fn test_deep_chain_without_handler_reports_exactly_once() {
    let mock = MockHost::new();
    let ctx = mock.registry().create_ctx(["promise"]).unwrap();
    let errors = record_events(&ctx.handler("promise").unwrap(), "error");

    ctx.run(|| {
        let mut link = mock.promise_rejecting("deep");
        for _ in 0..10 {
            link = link.then(Ok);
        }
        link.finally(|| Ok(()))
    });
    mock.run_microtasks();

    let errors = errors.borrow();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].error_value().unwrap().to_string(), "deep");
}

#[test]
fn test_handler_error_in_chain_is_reported_when_unobserved() {
    let mock = MockHost::new();
    let ctx = mock.registry().create_ctx(["promise"]).unwrap();
    let errors = record_events(&ctx.handler("promise").unwrap(), "error");

    ctx.run(|| {
        mock.host
            .promises
            .resolved(json!("ok"))
            .then(|_| Err(anyhow!("handler blew up")))
    });
    mock.run_microtasks();

    assert_eq!(errors.borrow().len(), 1);
    assert!(errors.borrow()[0].ctx.as_ref().unwrap().same_as(&ctx));
}

#[test]
fn test_fulfilled_promises_report_nothing() {
    let mock = MockHost::new();
    let ctx = mock.registry().create_ctx(["promise"]).unwrap();
    let errors = record_events(&ctx.handler("promise").unwrap(), "error");

    ctx.run(|| mock.host.promises.resolved(json!(3)).then(Ok));
    mock.run_microtasks();

    assert!(errors.borrow().is_empty());
}

#[test]
fn test_rejection_reported_to_constructing_context_only() {
    let mock = MockHost::new();
    let registry = mock.registry();
    let a = registry.create_ctx(["promise"]).unwrap();
    let b = registry.create_ctx(["promise"]).unwrap();
    let a_errors = record_events(&a.handler("promise").unwrap(), "error");
    let b_errors = record_events(&b.handler("promise").unwrap(), "error");

    a.run(|| mock.host.promises.rejected(CallbackError::msg("a's problem")));
    b.run(|| mock.host.promises.resolved(Value::Null));
    mock.run_microtasks();

    assert_eq!(a_errors.borrow().len(), 1);
    assert!(b_errors.borrow().is_empty());
}

#[test]
fn test_late_catch_misses_the_report() {
    let mock = MockHost::new();
    let ctx = mock.registry().create_ctx(["promise"]).unwrap();
    let errors = record_events(&ctx.handler("promise").unwrap(), "error");

    let p = ctx.run(|| mock.promise_rejecting("too late"));
    mock.run_microtasks();
    assert_eq!(errors.borrow().len(), 1);

    let recovered = p.catch(|_| Ok(Value::Null));
    mock.run_microtasks();
    assert!(matches!(recovered.state(), PromiseState::Fulfilled(_)));
    assert_eq!(errors.borrow().len(), 1);
    assert_eq!(p.has_catcher(), Some(true));
}
