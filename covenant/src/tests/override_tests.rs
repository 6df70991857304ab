//! Guarded calls checked against an override chain

use super::support::Recorder;
use crate::{
    ensure, guard, BaseType, Capabilities, CheckPoint, CheckResult, ConditionSet, ContractKind, Contracted,
    Level, OldValues, UsageError,
};

struct Shape {
    sides: u32,
}

impl Contracted for Shape {
    const CAPABILITIES: Capabilities = Capabilities::NONE.with_instance_invariant();

    fn invariant(&self) -> CheckResult {
        ensure(self.sides >= 3, "a shape needs three sides")
    }
}

struct Polygon {
    shape: Shape,
    max_sides: u32,
}

impl Contracted for Polygon {
    const CAPABILITIES: Capabilities = Capabilities::NONE
        .with_instance_invariant()
        .with_base_types();

    fn invariant(&self) -> CheckResult {
        ensure(self.shape.sides <= self.max_sides, "too many sides")
    }

    fn base_types() -> Vec<BaseType<Self>> {
        vec![BaseType::of::<Shape>(|polygon| &polygon.shape)]
    }
}

fn polygon(sides: u32) -> Polygon {
    Polygon {
        shape: Shape { sides },
        max_sides: 12,
    }
}

/// `Shape::set_sides` accepts 3..=10 and promises the new side count
fn shape_contract(sides: u32) -> ConditionSet<'static, Shape, ()> {
    let mut conditions = ConditionSet::new();
    conditions.set_precondition(move |_: &Shape| ensure((3..=10).contains(&sides), "sides out of range"));
    conditions
        .set_postcondition_void(move |shape: &Shape, _: &OldValues| ensure(shape.sides == sides, "sides not set"))
        .unwrap();
    conditions
}

#[test]
fn test_derived_precondition_widens_base() {
    let recorder = Recorder::new();
    let ctx = recorder.context();
    let sides = 11;
    let mut subject = polygon(4);

    let mut call = guard::public_function::<_, ()>(&ctx, "set_sides", &mut subject)
        .level_name("Polygon")
        .precondition(move |polygon| ensure(sides <= polygon.max_sides, "more sides than allowed"))
        .overrides("Shape", |polygon| &polygon.shape, shape_contract(sides))
        .check()
        .unwrap();
    assert_eq!(call.levels(), 2);
    call.subject_mut().unwrap().shape.sides = sides;
    let report = call.close();

    // Only the derived level accepts 11; the base is never asked.
    assert!(report.precondition.is_satisfied());
    assert!(report.levels[0].precondition.is_satisfied());
    assert!(report.levels[1].precondition.is_skipped());
    // The base still promised the side count and it holds.
    assert!(report.levels[1].postcondition.is_satisfied());
    assert_eq!(recorder.count(), 0);
}

#[test]
fn test_base_precondition_alone_satisfies_call() {
    let recorder = Recorder::new();
    let ctx = recorder.context();
    let sides = 5;
    let mut subject = polygon(4);

    let result: Result<(), ()> = guard::public_function::<_, ()>(&ctx, "set_sides", &mut subject)
        .level_name("Polygon")
        .precondition(move |_| ensure(sides % 2 == 0, "even sides only"))
        .overrides("Shape", |polygon| &polygon.shape, shape_contract(sides))
        .check()
        .unwrap()
        .call(|call| {
            call.subject_mut().unwrap().shape.sides = sides;
            Ok(())
        });

    assert_eq!(result, Ok(()));
    assert_eq!(recorder.count(), 0);
    assert_eq!(subject.shape.sides, 5);
}

#[test]
fn test_precondition_failing_everywhere_blames_root_level() {
    let recorder = Recorder::new();
    let ctx = recorder.context();
    let sides = 40;
    let mut subject = polygon(4);

    let report = guard::public_function::<_, ()>(&ctx, "set_sides", &mut subject)
        .level_name("Polygon")
        .precondition(move |polygon| ensure(sides <= polygon.max_sides, "more sides than allowed"))
        .overrides("Shape", |polygon| &polygon.shape, shape_contract(sides))
        .check()
        .unwrap()
        .close();

    assert!(report.levels[0].precondition.is_violated());
    assert!(report.levels[1].precondition.is_violated());
    let violations = recorder.violations();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].kind, ContractKind::Precondition);
    assert_eq!(violations[0].level(), Some(1));
    assert_eq!(
        violations[0].site.to_string(),
        "public function `set_sides` (level 1: `Shape`)"
    );
}

#[test]
fn test_base_postcondition_not_masked_by_derived() {
    let recorder = Recorder::new();
    let ctx = recorder.context();
    let sides = 6;
    let mut subject = polygon(4);

    let mut call = guard::public_function::<_, ()>(&ctx, "set_sides", &mut subject)
        .level_name("Polygon")
        .postcondition_void(|polygon, _| ensure(polygon.shape.sides <= polygon.max_sides, "too many sides"))
        .overrides("Shape", |polygon| &polygon.shape, shape_contract(sides))
        .check()
        .unwrap();
    // Derived guarantee holds, the base promise of `sides` does not.
    call.subject_mut().unwrap().shape.sides = sides + 1;
    let report = call.close();

    assert!(report.levels[0].postcondition.is_satisfied());
    assert!(report.levels[1].postcondition.is_violated());
    let violation = report.postcondition.violation().unwrap();
    assert_eq!(violation.level(), Some(1));
    assert_eq!(recorder.kinds(), vec![ContractKind::Postcondition]);
}

#[test]
fn test_base_level_sees_only_its_own_old_values() {
    let recorder = Recorder::new();
    let ctx = recorder.context();
    let mut subject = polygon(4);

    let mut base = ConditionSet::<Shape, ()>::new();
    base.set_postcondition_void(|shape: &Shape, old: &OldValues| {
        ensure(shape.sides > *old.get::<u32>("sides")?, "did not grow")
    })
    .unwrap();

    let mut call = guard::public_function::<_, ()>(&ctx, "grow", &mut subject)
        .level_name("Polygon")
        .old(|polygon, old| {
            old.capture("sides", polygon.shape.sides)?;
            Ok(())
        })
        .postcondition_void(|polygon, old| {
            ensure(polygon.shape.sides == *old.get::<u32>("sides")? + 1, "grew by more than one")
        })
        .overrides("Shape", |polygon| &polygon.shape, base)
        .check()
        .unwrap();
    call.subject_mut().unwrap().shape.sides += 1;
    let report = call.close();

    assert!(report.levels[0].postcondition.is_satisfied());
    assert!(report.levels[1].postcondition.is_usage_error());
    assert_eq!(
        recorder.usage_errors(),
        vec![UsageError::MissingOldValue("sides".to_string())]
    );
}

#[test]
fn test_each_level_checks_its_own_invariants() {
    let recorder = Recorder::new();
    let ctx = recorder.context();
    let mut subject = polygon(2);

    let report = guard::public_function::<_, ()>(&ctx, "set_sides", &mut subject)
        .level_name("Polygon")
        .overrides("Shape", |polygon| &polygon.shape, ConditionSet::new())
        .check()
        .unwrap()
        .close();

    assert!(report.levels[0].entry_invariant.is_satisfied());
    assert!(report.levels[1].entry_invariant.is_violated());
    let violation = report.entry_invariant.violation().unwrap();
    assert_eq!(violation.point, Some(CheckPoint::Entry));
    assert_eq!(violation.site.level.as_ref().unwrap().name, "Shape");
}

#[test]
fn test_level_names_follow_chain_order() {
    let recorder = Recorder::new();
    let ctx = recorder.context();
    let mut subject = polygon(4);

    let call = guard::public_function::<_, ()>(&ctx, "set_sides", &mut subject)
        .level_name("Polygon")
        .overrides("Shape", |polygon| &polygon.shape, ConditionSet::new())
        .check()
        .unwrap();

    let names: Vec<&str> = call.report().levels.iter().map(|level| level.name.as_str()).collect();
    assert_eq!(names, vec!["Polygon", "Shape"]);
}

struct Frame {
    width: i32,
}

impl Contracted for Frame {
    const CAPABILITIES: Capabilities = Capabilities::NONE.with_instance_invariant();

    fn invariant(&self) -> CheckResult {
        ensure(self.width > 0, "frame has no width")
    }
}

struct Label {
    length: i32,
}

impl Contracted for Label {
    const CAPABILITIES: Capabilities = Capabilities::NONE.with_instance_invariant();

    fn invariant(&self) -> CheckResult {
        ensure(self.length >= 0, "negative label length")
    }
}

struct Button {
    frame: Frame,
    label: Label,
}

impl Contracted for Button {
    const CAPABILITIES: Capabilities = Capabilities::NONE.with_base_types();

    fn base_types() -> Vec<BaseType<Self>> {
        vec![
            BaseType::of::<Frame>(|button| &button.frame),
            BaseType::of::<Label>(|button| &button.label),
        ]
    }
}

#[test]
fn test_bases_outside_the_chain_keep_their_invariants() {
    let recorder = Recorder::new();
    let ctx = recorder.context();
    let mut button = Button {
        frame: Frame { width: 10 },
        label: Label { length: -1 },
    };

    let report = guard::public_function::<_, ()>(&ctx, "resize", &mut button)
        .level_name("Button")
        .overrides("Frame", |button| &button.frame, ConditionSet::new())
        .check()
        .unwrap()
        .close();

    // Label is not overridden, so the most-derived level still checks it.
    assert!(report.levels[0].entry_invariant.is_violated());
    assert!(report.levels[1].entry_invariant.is_skipped());
    assert_eq!(recorder.kinds(), vec![ContractKind::Invariant]);
    let violation = report.entry_invariant.violation().unwrap();
    assert_eq!(violation.level(), Some(0));
}

#[test]
fn test_overridden_base_is_checked_once_by_its_level() {
    let recorder = Recorder::new();
    let ctx = recorder.context();
    let mut button = Button {
        frame: Frame { width: 0 },
        label: Label { length: 3 },
    };

    let report = guard::public_function::<_, ()>(&ctx, "resize", &mut button)
        .level_name("Button")
        .overrides("Frame", |button| &button.frame, ConditionSet::new())
        .check()
        .unwrap()
        .close();

    assert!(report.levels[0].entry_invariant.is_satisfied());
    assert!(report.levels[1].entry_invariant.is_violated());
    assert_eq!(recorder.count(), 1);
}

#[test]
fn test_plain_base_level_leaves_invariants_to_the_derived_level() {
    let recorder = Recorder::new();
    let ctx = recorder.context();
    let mut button = Button {
        frame: Frame { width: 0 },
        label: Label { length: 3 },
    };

    let report = guard::public_function::<_, ()>(&ctx, "resize", &mut button)
        .level_name("Button")
        .base_level(Level::new("Frame", ConditionSet::new()))
        .check()
        .unwrap()
        .close();

    assert!(report.levels[0].entry_invariant.is_violated());
    assert_eq!(recorder.kinds(), vec![ContractKind::Invariant]);
}
