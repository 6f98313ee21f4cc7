mod common;

use std::sync::{Arc, Mutex};

use rtpc_core::{ChannelTarget, RtpcError};
use rtpc_types::{
    Accumulation, Curve, CurveId, ParamId, PlayingId, RtpcKey, SourceKind, SubscriberId,
    SubscriberKind, TransitionParams,
};

use common::{approx, driver, obj, play, updates, wants};

#[test]
fn test_volume_curve_scenario() {
    let mut ctx = common::context();
    let node = common::volume_subscriber(&mut ctx, SubscriberKind::Node);

    ctx.set_value(driver(), 0.5, &obj(1), TransitionParams::immediate())
        .unwrap();

    let value = ctx.converted_value(node, ParamId::VOLUME, &play(1, 3));
    assert!(approx(value, -48.0), "got {}", value);

    // Other objects still see the driver's default of 0
    assert!(approx(ctx.converted_value(node, ParamId::VOLUME, &obj(2)), -96.0));
}

#[test]
fn test_wildcard_update_reaches_every_target_once() {
    let mut ctx = common::context();
    let node = common::volume_subscriber(&mut ctx, SubscriberKind::Node);

    let mut logs = Vec::new();
    for i in 1..=4 {
        let (target, log) = common::recording_target();
        ctx.register_parameter_target(target, play(i, 1), wants(&[ParamId::VOLUME]), node, false)
            .unwrap();
        logs.push(log);
    }

    ctx.set_value(driver(), 0.5, &RtpcKey::any(), TransitionParams::immediate())
        .unwrap();

    let first = updates(&logs[0]);
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].param, ParamId::VOLUME);
    assert!(approx(first[0].value, -48.0));
    assert!(approx(first[0].delta, 48.0));
    for log in &logs {
        assert_eq!(updates(log), first);
    }
}

#[test]
fn test_concrete_update_reaches_matching_subset() {
    let mut ctx = common::context();
    let node = common::volume_subscriber(&mut ctx, SubscriberKind::Node);

    let mut logs = Vec::new();
    for i in 1..=4 {
        let (target, log) = common::recording_target();
        ctx.register_parameter_target(target, play(i, 1), wants(&[ParamId::VOLUME]), node, false)
            .unwrap();
        logs.push(log);
    }
    ctx.set_value(driver(), 0.5, &RtpcKey::any(), TransitionParams::immediate())
        .unwrap();

    ctx.set_value(driver(), 0.25, &obj(2), TransitionParams::immediate())
        .unwrap();

    let counts: Vec<usize> = logs.iter().map(|l| updates(l).len()).collect();
    assert_eq!(counts, vec![1, 2, 1, 1]);
    let last = *updates(&logs[1]).last().unwrap();
    assert!(approx(last.value, -72.0));
    assert!(approx(last.delta, -24.0));
}

#[test]
fn test_broad_update_skips_narrower_override() {
    let mut ctx = common::context();
    let node = common::volume_subscriber(&mut ctx, SubscriberKind::Node);

    let mut logs = Vec::new();
    for i in 1..=3 {
        let (target, log) = common::recording_target();
        ctx.register_parameter_target(target, play(i, 1), wants(&[ParamId::VOLUME]), node, false)
            .unwrap();
        logs.push(log);
    }

    ctx.set_value(driver(), 0.25, &obj(2), TransitionParams::immediate())
        .unwrap();
    ctx.set_value(driver(), 0.75, &RtpcKey::any(), TransitionParams::immediate())
        .unwrap();

    let counts: Vec<usize> = logs.iter().map(|l| updates(l).len()).collect();
    assert_eq!(counts, vec![1, 1, 1]);
    assert!(approx(updates(&logs[0])[0].value, -24.0));
    // Object 2 keeps its own value
    assert!(approx(updates(&logs[1])[0].value, -72.0));
    assert!(approx(ctx.converted_value(node, ParamId::VOLUME, &play(2, 1)), -72.0));
}

#[test]
fn test_interior_wildcard_update_skips_narrower_override() {
    let mut ctx = common::context();
    let node = common::volume_subscriber(&mut ctx, SubscriberKind::Node);
    let (own, own_log) = common::recording_target();
    let (other, other_log) = common::recording_target();
    ctx.register_parameter_target(own, play(5, 7), wants(&[ParamId::VOLUME]), node, false)
        .unwrap();
    ctx.register_parameter_target(other, play(6, 7), wants(&[ParamId::VOLUME]), node, false)
        .unwrap();

    ctx.set_value(driver(), 0.25, &play(5, 7), TransitionParams::immediate())
        .unwrap();
    // Playing instance 7 of every object
    let every_object = RtpcKey::any().with_playing(PlayingId::new(7));
    ctx.set_value(driver(), 0.75, &every_object, TransitionParams::immediate())
        .unwrap();

    let got = updates(&own_log);
    assert_eq!(got.len(), 1);
    assert!(approx(got[0].value, -72.0));
    assert!(approx(ctx.converted_value(node, ParamId::VOLUME, &play(5, 7)), -72.0));

    let got = updates(&other_log);
    assert_eq!(got.len(), 1);
    assert!(approx(got[0].value, -24.0));
    assert!(approx(ctx.converted_value(node, ParamId::VOLUME, &play(6, 7)), -24.0));
}

#[test]
fn test_priority_order_across_subscriber_kinds() {
    let mut ctx = common::context();
    let order: common::OrderLog = Arc::new(Mutex::new(Vec::new()));

    // Created in reverse priority so ids do not line up with the order
    let kinds = [
        (SubscriberKind::SwitchGroup, "switch"),
        (SubscriberKind::CrossfadeLayer, "crossfade"),
        (SubscriberKind::Layer, "layer"),
        (SubscriberKind::Modulator, "modulator"),
        (SubscriberKind::Node, "node"),
        (SubscriberKind::PluginContext, "plugin"),
        (SubscriberKind::PlaybackInstance, "playback"),
    ];
    for (kind, tag) in kinds {
        let sub = common::volume_subscriber(&mut ctx, kind);
        ctx.register_parameter_target(
            common::tagged_target(tag, &order),
            obj(1),
            wants(&[ParamId::VOLUME]),
            sub,
            false,
        )
        .unwrap();
    }

    ctx.set_value(driver(), 0.5, &obj(1), TransitionParams::immediate())
        .unwrap();

    assert_eq!(
        *order.lock().unwrap(),
        vec!["playback", "plugin", "node", "modulator", "layer", "crossfade", "switch"]
    );
}

#[test]
fn test_subscription_scope_limits_dispatch() {
    let mut ctx = common::context();
    let sub = ctx.add_subscriber(SubscriberKind::PlaybackInstance).unwrap();
    ctx.subscribe(
        sub,
        ParamId::VOLUME,
        CurveId::new(1),
        Accumulation::Additive,
        obj(1),
        driver(),
        SourceKind::GameParameter,
        common::volume_curve(),
    )
    .unwrap();
    let (target, log) = common::recording_target();
    ctx.register_parameter_target(target, obj(1), wants(&[ParamId::VOLUME]), sub, false)
        .unwrap();

    ctx.set_value(driver(), 0.5, &obj(2), TransitionParams::immediate())
        .unwrap();
    assert!(updates(&log).is_empty());

    ctx.set_value(driver(), 0.5, &obj(1), TransitionParams::immediate())
        .unwrap();
    assert_eq!(updates(&log).len(), 1);
}

#[test]
fn test_unwanted_params_are_not_delivered() {
    let mut ctx = common::context();
    let node = common::volume_subscriber(&mut ctx, SubscriberKind::Node);
    ctx.subscribe(
        node,
        ParamId::PITCH,
        CurveId::new(2),
        Accumulation::Additive,
        RtpcKey::any(),
        driver(),
        SourceKind::GameParameter,
        Curve::linear(0.0, -1200.0, 1.0, 1200.0),
    )
    .unwrap();

    let (volume_only, volume_log) = common::recording_target();
    let (both, both_log) = common::recording_target();
    ctx.register_parameter_target(volume_only, obj(1), wants(&[ParamId::VOLUME]), node, false)
        .unwrap();
    ctx.register_parameter_target(
        both,
        obj(2),
        wants(&[ParamId::VOLUME, ParamId::PITCH]),
        node,
        false,
    )
    .unwrap();

    ctx.set_value(driver(), 1.0, &RtpcKey::any(), TransitionParams::immediate())
        .unwrap();

    let params: Vec<ParamId> = updates(&volume_log).iter().map(|u| u.param).collect();
    assert_eq!(params, vec![ParamId::VOLUME]);
    let mut params: Vec<ParamId> = updates(&both_log).iter().map(|u| u.param).collect();
    params.sort();
    assert_eq!(params, vec![ParamId::VOLUME, ParamId::PITCH]);
}

#[test]
fn test_accumulation_over_two_curves() {
    let mut ctx = common::context();
    let sub = ctx.add_subscriber(SubscriberKind::Node).unwrap();
    for (curve, source) in [(1, ParamId::new(100)), (2, ParamId::new(101))] {
        ctx.subscribe(
            sub,
            ParamId::VOLUME,
            CurveId::new(curve),
            Accumulation::Additive,
            RtpcKey::any(),
            source,
            SourceKind::GameParameter,
            common::volume_curve(),
        )
        .unwrap();
    }
    ctx.set_value(ParamId::new(100), 0.5, &RtpcKey::any(), TransitionParams::immediate())
        .unwrap();
    ctx.set_value(ParamId::new(101), 0.75, &RtpcKey::any(), TransitionParams::immediate())
        .unwrap();
    assert!(approx(ctx.converted_value(sub, ParamId::VOLUME, &obj(1)), -72.0));

    // Dropping one curve leaves the other in place
    assert!(ctx.unsubscribe_curve(sub, ParamId::VOLUME, CurveId::new(1)));
    assert!(approx(ctx.converted_value(sub, ParamId::VOLUME, &obj(1)), -24.0));
}

#[test]
fn test_channel_target_receives_updates() {
    let mut ctx = common::context();
    let node = common::volume_subscriber(&mut ctx, SubscriberKind::Node);
    let (tx, rx) = crossbeam_channel::bounded(8);
    ctx.register_parameter_target(
        Box::new(ChannelTarget::new(tx)),
        obj(1),
        wants(&[ParamId::VOLUME]),
        node,
        false,
    )
    .unwrap();

    ctx.set_value(driver(), 1.0, &obj(1), TransitionParams::immediate())
        .unwrap();

    let update = rx.try_recv().unwrap();
    assert_eq!(update.param, ParamId::VOLUME);
    assert!(approx(update.value, 0.0));
}

#[test]
fn test_error_paths() {
    let mut ctx = common::context();
    let ghost = SubscriberId::new(999);

    let err = ctx
        .subscribe(
            ghost,
            ParamId::VOLUME,
            CurveId::new(1),
            Accumulation::Additive,
            RtpcKey::any(),
            driver(),
            SourceKind::GameParameter,
            common::volume_curve(),
        )
        .unwrap_err();
    assert_eq!(err, RtpcError::UnknownSubscriber(ghost));

    let node = ctx.add_subscriber(SubscriberKind::Node).unwrap();
    let err = ctx
        .subscribe(
            node,
            ParamId::new(500),
            CurveId::new(1),
            Accumulation::Additive,
            RtpcKey::any(),
            driver(),
            SourceKind::GameParameter,
            common::volume_curve(),
        )
        .unwrap_err();
    assert_eq!(err, RtpcError::ParamOutOfRange(ParamId::new(500)));

    let (target, _log) = common::recording_target();
    assert!(matches!(
        ctx.register_parameter_target(target, obj(1), wants(&[ParamId::VOLUME]), ghost, true),
        Err(RtpcError::UnknownSubscriber(_))
    ));
    assert_eq!(ctx.target_count(), 0);
}

#[test]
fn test_failed_subscribe_leaves_nothing_behind() {
    let mut ctx = common::context();
    let node = ctx.add_subscriber(SubscriberKind::Node).unwrap();
    let (target, log) = common::recording_target();
    let handle = ctx
        .register_parameter_target(target, obj(1), wants(&[ParamId::VOLUME]), node, false)
        .unwrap();

    let out_of_range = ParamId::new(500);
    assert!(ctx
        .subscribe(
            node,
            out_of_range,
            CurveId::new(1),
            Accumulation::Additive,
            RtpcKey::any(),
            driver(),
            SourceKind::GameParameter,
            common::volume_curve(),
        )
        .is_err());
    assert!(!ctx.is_active(node, out_of_range));
    assert!(!ctx.has_target(node, handle));

    ctx.set_value(driver(), 1.0, &obj(1), TransitionParams::immediate())
        .unwrap();
    assert!(updates(&log).is_empty());
}
