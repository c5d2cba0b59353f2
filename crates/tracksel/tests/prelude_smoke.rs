#![forbid(unsafe_code)]

//! The prelude is enough to wire observables, events, computed values, and
//! observations together.

use std::cell::RefCell;
use std::rc::Rc;

use tracksel::prelude::*;

#[test]
fn prelude_covers_the_pipeline() {
    let saved: Event<String> = Event::new();
    let draft = Observable::new(String::from("hello"));
    let length = Computed::from_observable(&draft, String::len);

    let log = Rc::new(RefCell::new(Vec::new()));
    let (l, len, ev) = (Rc::clone(&log), length.clone(), saved.clone());
    let dispose = observe(move |_: &mut ObserveEvent<()>| {
        l.borrow_mut().push((len.get(), ev.get()));
    });

    draft.set(String::from("hello world"));
    saved.fire_with(draft.peek());

    assert_eq!(*log.borrow(), vec![(5, 0), (11, 0), (11, 1)]);
    assert!(NodeSource::is_event(&saved));
    assert!(!NodeSource::is_event(&draft));

    dispose.dispose();
    assert_eq!(saved.node().listener_count(), 0);
    assert_eq!(length.node().listener_count(), 0);
}

#[test]
fn untracked_reads_are_invisible() {
    let a = Observable::new(1);
    let b = Observable::new(2);
    let (sum, frame) = track(|| a.get() + untracked(|| b.get()));
    assert_eq!(sum, 3);
    assert_eq!(frame.nodes().ids(), vec![a.node().id()]);
}
