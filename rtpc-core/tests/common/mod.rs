#![allow(dead_code)]
//! Test harness utilities for rtpc-core integration tests.

use std::sync::{Arc, Mutex};

use rtpc_core::{Config, ParameterTarget, RtpcContext};
use rtpc_types::{
    Accumulation, Curve, CurveId, GameObjectId, ParamBits, ParamId, PlayingId, RtpcKey,
    SourceKind, SubscriberId, SubscriberKind,
};

/// Game parameter driving the volume curve in most tests.
pub fn driver() -> ParamId {
    ParamId::new(100)
}

/// Second game parameter, used for bus-level subscriptions.
pub fn bus_driver() -> ParamId {
    ParamId::new(101)
}

pub fn obj(id: u64) -> RtpcKey {
    RtpcKey::for_object(GameObjectId::new(id))
}

pub fn play(obj_id: u64, playing: u32) -> RtpcKey {
    obj(obj_id).with_playing(PlayingId::new(playing))
}

pub fn wants(params: &[ParamId]) -> ParamBits {
    ParamBits::from_params(params.iter().copied())
}

pub fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-3
}

/// Context on the built-in config only, so a user file cannot leak in.
pub fn context() -> RtpcContext {
    RtpcContext::new(Config::default())
}

/// Volume in dB from the driver's 0..1 range: -96 dB at 0, 0 dB at 1.
pub fn volume_curve() -> Curve {
    Curve::linear(0.0, -96.0, 1.0, 0.0)
}

/// Subscriber of `kind` whose VOLUME follows the driver through the volume curve.
pub fn volume_subscriber(ctx: &mut RtpcContext, kind: SubscriberKind) -> SubscriberId {
    let sub = ctx.add_subscriber(kind).unwrap();
    ctx.subscribe(
        sub,
        ParamId::VOLUME,
        CurveId::new(1),
        Accumulation::Additive,
        RtpcKey::any(),
        driver(),
        SourceKind::GameParameter,
        volume_curve(),
    )
    .unwrap();
    sub
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Update {
    pub param: ParamId,
    pub value: f32,
    pub delta: f32,
}

pub type UpdateLog = Arc<Mutex<Vec<Update>>>;

/// Target that records every update it receives.
pub struct RecordingTarget {
    log: UpdateLog,
}

impl ParameterTarget for RecordingTarget {
    fn update_target_param(&mut self, param: ParamId, value: f32, delta: f32) {
        self.log.lock().unwrap().push(Update { param, value, delta });
    }
}

pub fn recording_target() -> (Box<dyn ParameterTarget>, UpdateLog) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let target = RecordingTarget {
        log: Arc::clone(&log),
    };
    (Box::new(target), log)
}

pub fn updates(log: &UpdateLog) -> Vec<Update> {
    log.lock().unwrap().clone()
}

pub type OrderLog = Arc<Mutex<Vec<&'static str>>>;

/// Target that appends its tag to a log shared with other targets.
pub struct TaggedTarget {
    tag: &'static str,
    log: OrderLog,
}

impl ParameterTarget for TaggedTarget {
    fn update_target_param(&mut self, _param: ParamId, _value: f32, _delta: f32) {
        self.log.lock().unwrap().push(self.tag);
    }
}

pub fn tagged_target(tag: &'static str, log: &OrderLog) -> Box<dyn ParameterTarget> {
    Box::new(TaggedTarget {
        tag,
        log: Arc::clone(log),
    })
}
