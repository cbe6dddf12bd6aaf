use super::*;
use pretty_assertions::assert_eq;
use smallvec::smallvec;

fn unify(expected: Idx, found: Idx) -> Obligation {
    Obligation::Unify {
        expected,
        found,
        depth: 0,
        span: Span::DUMMY,
    }
}

fn expected_of(ob: &Obligation) -> Idx {
    match ob {
        Obligation::Unify { expected, .. } => *expected,
        other => panic!("expected a unification, got {other:?}"),
    }
}

#[test]
fn waking_a_blocker_readies_its_waiters() {
    let (a, b) = (MetaId::from_raw(0), MetaId::from_raw(1));
    let mut queue = PostponeQueue::new();
    queue.push(unify(Idx::INT, Idx::BOOL), smallvec![a]);
    queue.push(unify(Idx::STRING, Idx::BOOL), smallvec![b]);
    assert_eq!(queue.pending(), 2);
    assert!(queue.pop_ready().is_none());

    queue.wake(&[a]);
    let woken = queue.pop_ready().unwrap_or_else(|| panic!("a woken obligation"));
    assert_eq!(expected_of(&woken), Idx::INT);
    assert_eq!(queue.pop_ready().map(|ob| expected_of(&ob)), None);
    assert_eq!(queue.pending(), 1);

    // `a` has no waiters left; `b` still does.
    queue.wake(&[a]);
    assert!(queue.pop_ready().is_none());
    queue.wake(&[b]);
    assert_eq!(queue.pop_ready().map(|ob| expected_of(&ob)), Some(Idx::STRING));
}

#[test]
fn obligation_with_several_blockers_wakes_once() {
    let (a, b) = (MetaId::from_raw(0), MetaId::from_raw(1));
    let mut queue = PostponeQueue::new();
    queue.push(unify(Idx::INT, Idx::BOOL), smallvec![a, b]);

    queue.wake(&[a, b]);
    assert!(queue.pop_ready().is_some());
    assert!(queue.pop_ready().is_none());
    assert_eq!(queue.pending(), 0);
    // The other blocker no longer refers to the taken obligation.
    queue.wake(&[b]);
    assert!(queue.pop_ready().is_none());
}

#[test]
fn waking_an_unrelated_variable_does_nothing() {
    let mut queue = PostponeQueue::new();
    queue.push(unify(Idx::INT, Idx::BOOL), smallvec![MetaId::from_raw(0)]);
    queue.wake(&[MetaId::from_raw(7)]);
    assert!(queue.pop_ready().is_none());
    assert_eq!(queue.pending(), 1);
}

#[test]
fn drain_returns_everything_in_order() {
    let a = MetaId::from_raw(0);
    let mut queue = PostponeQueue::new();
    queue.push(unify(Idx::INT, Idx::BOOL), smallvec![a]);
    queue.push(unify(Idx::STRING, Idx::BOOL), SmallVec::new());
    queue.push(unify(Idx::CHAR, Idx::BOOL), smallvec![a]);
    queue.wake(&[a]);

    let drained: Vec<Idx> = queue
        .drain()
        .into_iter()
        .map(|(ob, _)| expected_of(&ob))
        .collect();
    assert_eq!(drained, vec![Idx::INT, Idx::STRING, Idx::CHAR]);
    assert_eq!(queue.pending(), 0);
    assert!(queue.pop_ready().is_none());
}

#[test]
fn repushed_obligation_waits_again() {
    let (a, b) = (MetaId::from_raw(0), MetaId::from_raw(1));
    let mut queue = PostponeQueue::new();
    queue.push(unify(Idx::INT, Idx::BOOL), smallvec![a]);
    queue.wake(&[a]);
    let ob = queue.pop_ready().unwrap_or_else(|| panic!("a woken obligation"));
    queue.push(ob, smallvec![b]);
    queue.wake(&[a]);
    assert!(queue.pop_ready().is_none());
    queue.wake(&[b]);
    assert!(queue.pop_ready().is_some());
}

#[test]
fn dictionary_slots_start_empty_and_remember_their_goal() {
    let mut queue = PostponeQueue::new();
    let first = queue.new_slot(Idx::INT);
    let second = queue.new_slot(Idx::BOOL);
    assert_eq!(first, SlotId::from_raw(0));
    assert_eq!(second.raw(), 1);
    assert_eq!(queue.slot(first), None);

    queue.fill_slot(second, Dict::Local { index: 3 });
    assert_eq!(queue.slot(second), Some(&Dict::Local { index: 3 }));
    assert_eq!(queue.slot(first), None);
    assert_eq!(queue.slot(SlotId::from_raw(9)), None);

    assert_eq!(queue.slot_goal(first), Some(Idx::INT));
    assert_eq!(queue.slot_goal(second), Some(Idx::BOOL));
    assert_eq!(queue.slot_goal(SlotId::from_raw(9)), None);
}

#[test]
fn obligations_report_span_and_depth() {
    let ob = Obligation::Disjoint {
        left: Idx::EMPTY_ROW,
        right: Idx::EMPTY_ROW,
        depth: 3,
        facts: Rc::from(Vec::new()),
        span: Span::DUMMY,
    };
    assert_eq!(ob.depth(), 3);
    assert_eq!(ob.span(), Span::DUMMY);
}
