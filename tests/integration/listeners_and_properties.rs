//! DOM-style listeners, handler properties and animation frames.

use super::test_utils::{record_events, MockHost};
use anyhow::anyhow;
use ctxzone::{context, Callback, Event, Target};
use serde_json::{json, Value};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

#[test]
fn test_listener_runs_under_its_context_on_every_dispatch() {
    let mock = MockHost::new();
    let ctx = mock.registry().create_ctx(["eventListener"]).unwrap();
    let button = Target::new("button");
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();

    ctx.run(|| {
        mock.host.add_event_listener(
            &button,
            "click",
            Callback::new(move |args| {
                sink.borrow_mut()
                    .push((context::current().map(|c| c.id()), args.to_vec()));
                Ok(())
            }),
            Vec::new(),
        )
    });
    mock.dispatch(&button, "click", &[json!({ "x": 1 })]);
    mock.dispatch(&button, "click", &[json!({ "x": 2 })]);

    let seen = seen.borrow();
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().all(|(id, _)| *id == Some(ctx.id())));
    assert_eq!(seen[1].1, vec![json!({ "x": 2 })]);
}

#[test]
fn test_listener_options_are_forwarded() {
    let mock = MockHost::new();
    let ctx = mock.registry().create_ctx(["eventListener"]).unwrap();
    let input = Target::new("input");
    let options = json!({ "capture": true, "passive": true });

    ctx.run(|| {
        mock.host
            .add_event_listener(&input, "keydown", Callback::new(|_| Ok(())), vec![options.clone()])
    });

    let call = mock.registered("eventListener")[0].call.clone();
    assert_eq!(call.listener_type(), Some("keydown"));
    assert_eq!(call.trailing(), &[options]);
    assert_eq!(call.target.as_ref(), Some(&input));
}

#[test]
fn test_removal_outside_the_context_still_finds_the_wrapper() {
    let mock = MockHost::new();
    let ctx = mock.registry().create_ctx(["eventListener"]).unwrap();
    let link = Target::new("a");
    let user = Callback::new(|_| Ok(()));

    ctx.run(|| mock.host.add_event_listener(&link, "click", user.clone(), Vec::new()));
    assert_eq!(mock.listener_count(&link, "click"), 1);

    mock.host.remove_event_listener(&link, "click", user, Vec::new());
    assert_eq!(mock.listener_count(&link, "click"), 0);
}

#[test]
fn test_repeated_registration_is_removed_by_one_removal() {
    let mock = MockHost::new();
    let ctx = mock.registry().create_ctx(["eventListener"]).unwrap();
    let button = Target::new("button");
    let hits = Rc::new(Cell::new(0));
    let counter = hits.clone();
    let user = Callback::new(move |_| {
        counter.set(counter.get() + 1);
        Ok(())
    });

    ctx.run(|| {
        mock.host.add_event_listener(&button, "click", user.clone(), Vec::new());
        mock.host.add_event_listener(&button, "click", user.clone(), Vec::new());
    });
    assert_eq!(mock.listener_count(&button, "click"), 1);
    let registered = mock.registered("eventListener");
    assert!(registered[0].call.callback.same_as(&registered[1].call.callback));

    ctx.run(|| mock.host.remove_event_listener(&button, "click", user, Vec::new()));
    mock.dispatch(&button, "click", &[]);
    assert_eq!(mock.listener_count(&button, "click"), 0);
    assert_eq!(hits.get(), 0);
}

#[test]
fn test_substituted_listener_is_removed_by_the_callers_callback() {
    let mock = MockHost::new();
    let ctx = mock.registry().create_ctx(["eventListener"]).unwrap();
    let substituted = Rc::new(Cell::new(0));
    let counter = substituted.clone();
    ctx.handler("eventListener")
        .unwrap()
        .on("add", move |event: &mut Event| {
            if let Some(call) = event.add_call_mut() {
                let inner = call.callback.clone();
                let counter = counter.clone();
                call.callback = Callback::new(move |args| {
                    counter.set(counter.get() + 1);
                    inner.call(args)
                });
            }
        });
    let link = Target::new("a");
    let user = Callback::new(|_| Ok(()));

    ctx.run(|| mock.host.add_event_listener(&link, "click", user.clone(), Vec::new()));
    mock.dispatch(&link, "click", &[]);
    assert_eq!(substituted.get(), 1);

    ctx.run(|| mock.host.remove_event_listener(&link, "click", user, Vec::new()));
    assert_eq!(mock.listener_count(&link, "click"), 0);
}

#[test]
fn test_listener_error_reported_and_others_still_run() {
    let mock = MockHost::new();
    let ctx = mock.registry().create_ctx(["eventListener"]).unwrap();
    let errors = record_events(&ctx.handler("eventListener").unwrap(), "error");
    let form = Target::new("form");
    let ran = Rc::new(Cell::new(false));
    let flag = ran.clone();

    ctx.run(|| {
        mock.host.add_event_listener(
            &form,
            "submit",
            Callback::new(|_| Err(anyhow!("validation failed"))),
            Vec::new(),
        );
        mock.host.add_event_listener(
            &form,
            "submit",
            Callback::new(move |_| {
                flag.set(true);
                Ok(())
            }),
            Vec::new(),
        );
    });

    let results = mock.dispatch(&form, "submit", &[]);
    assert!(results.iter().all(Result::is_ok));
    assert!(ran.get());
    assert_eq!(errors.borrow().len(), 1);
}

#[test]
fn test_handler_property_change_and_containment() {
    let mock = MockHost::new();
    let ctx = mock.registry().create_ctx(["domEvent"]).unwrap();
    let handler = ctx.handler("domEvent").unwrap();
    let changes = record_events(&handler, "change");
    let errors = record_events(&handler, "error");
    let image = Target::new("img");
    let user = Callback::new(|_| Err(anyhow!("decode failed")));

    ctx.run(|| mock.host.set_handler_property(&image, "onload", Some(user.clone())));

    let installed = mock.property(&image, "onload").unwrap();
    assert!(!installed.same_as(&user));
    assert!(installed.call(&[]).is_ok());
    assert_eq!(errors.borrow().len(), 1);

    let change = changes.borrow()[0].property_change().cloned().unwrap();
    assert_eq!(change.property, "onload");
    assert_eq!(change.target, image);
    assert!(change.old_value.is_none());
    assert!(change.new_value.unwrap().same_as(&user));

    ctx.run(|| mock.host.set_handler_property(&image, "onload", None));
    assert!(mock.property(&image, "onload").is_none());
    let cleared = changes.borrow()[1].property_change().cloned().unwrap();
    assert!(cleared.old_value.unwrap().same_as(&user));
    assert!(cleared.new_value.is_none());
}

#[test]
fn test_animation_frame_receives_the_host_timestamp() {
    let mock = MockHost::new();
    let ctx = mock.registry().create_ctx(["requestAnimationFrame"]).unwrap();
    let adds = record_events(&ctx.handler("requestAnimationFrame").unwrap(), "add");
    let stamp = Rc::new(RefCell::new(Vec::new()));
    let sink = stamp.clone();

    ctx.run(|| {
        mock.host.request_animation_frame(Callback::new(move |args| {
            sink.borrow_mut().extend_from_slice(args);
            Ok(())
        }))
    });
    mock.fire("requestAnimationFrame", 0, &[json!(16.6)]).unwrap();

    assert_eq!(adds.borrow().len(), 1);
    assert_eq!(*stamp.borrow(), vec![Value::from(16.6)]);
}
