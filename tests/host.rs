//! Integration exercises for the pump protocol, driven end to end through a
//! scripted mock stack on real kernel tasks.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration as StdDuration, Instant};

use bt_rtos::time::{Duration, NoWait};
use bt_rtos::{BleHost, BleStack, CommandHeader, Config, ResponseHandler, SleepHint};

/// How the mock answers `sleep_hint`.
#[derive(Clone, Copy, Debug)]
enum HintMode {
    /// Idle indefinitely.
    Idle,
    /// No sleep while undelivered events remain, idle once drained.
    Drain,
    /// No sleep, unconditionally.
    Busy,
    /// A fixed budget, in stack ticks.
    Periodic(u64),
}

/// A stack whose externally visible behavior is scripted by the test and
/// whose entry points count their invocations.
#[derive(Clone)]
struct ScriptedStack(Arc<Inner>);

struct Inner {
    ll_steps: AtomicUsize,
    peeks: AtomicUsize,
    hints: AtomicUsize,
    events: Mutex<VecDeque<u32>>,
    dispatched: Mutex<Vec<(u32, Vec<u8>)>>,
    hint_mode: Mutex<HintMode>,
}

impl ScriptedStack {
    fn new(mode: HintMode) -> ScriptedStack {
        ScriptedStack(Arc::new(Inner {
            ll_steps: AtomicUsize::new(0),
            peeks: AtomicUsize::new(0),
            hints: AtomicUsize::new(0),
            events: Mutex::new(VecDeque::new()),
            dispatched: Mutex::new(Vec::new()),
            hint_mode: Mutex::new(mode),
        }))
    }

    fn with_events(mode: HintMode, events: &[u32]) -> ScriptedStack {
        let stack = ScriptedStack::new(mode);
        stack.0.events.lock().unwrap().extend(events);
        stack
    }

    fn push_event(&self, event: u32) {
        self.0.events.lock().unwrap().push_back(event);
    }

    fn set_mode(&self, mode: HintMode) {
        *self.0.hint_mode.lock().unwrap() = mode;
    }

    fn ll_steps(&self) -> usize {
        self.0.ll_steps.load(Ordering::SeqCst)
    }

    fn peeks(&self) -> usize {
        self.0.peeks.load(Ordering::SeqCst)
    }

    fn hints(&self) -> usize {
        self.0.hints.load(Ordering::SeqCst)
    }

    fn dispatched(&self) -> Vec<(u32, Vec<u8>)> {
        self.0.dispatched.lock().unwrap().clone()
    }
}

impl BleStack for ScriptedStack {
    type Event = u32;

    fn pump_link_layer(&self) {
        self.0.ll_steps.fetch_add(1, Ordering::SeqCst);
    }

    fn peek_event(&self) -> Option<u32> {
        self.0.peeks.fetch_add(1, Ordering::SeqCst);
        self.0.events.lock().unwrap().pop_front()
    }

    fn sleep_hint(&self) -> SleepHint {
        self.0.hints.fetch_add(1, Ordering::SeqCst);
        match *self.0.hint_mode.lock().unwrap() {
            HintMode::Idle => SleepHint::Infinite,
            HintMode::Drain => {
                if self.0.events.lock().unwrap().is_empty() {
                    SleepHint::Infinite
                } else {
                    SleepHint::Zero
                }
            }
            HintMode::Busy => SleepHint::Zero,
            HintMode::Periodic(ticks) => SleepHint::Ticks(ticks),
        }
    }

    fn dispatch_command(
        &self,
        header: CommandHeader,
        _handler: Option<ResponseHandler>,
        payload: &[u8],
    ) {
        // Widen the race window: a caller must stay parked through this.
        thread::sleep(StdDuration::from_millis(2));
        self.0
            .dispatched
            .lock()
            .unwrap()
            .push((header.0, payload.to_vec()));
    }
}

fn start(stack: &ScriptedStack) -> BleHost<ScriptedStack> {
    BleHost::start(stack.clone(), Config::default(), |_| {}).expect("startup failed")
}

/// Poll `condition` until it holds or `deadline_ms` elapses.
fn wait_until(deadline_ms: u64, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + StdDuration::from_millis(deadline_ms);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(StdDuration::from_millis(1));
    }
    condition()
}

#[test]
fn one_link_layer_step_per_consumed_signal() {
    let stack = ScriptedStack::new(HintMode::Idle);
    let host = start(&stack);

    for expected in 1..=5 {
        host.notify_link_layer();
        assert!(
            wait_until(1_000, || stack.ll_steps() == expected),
            "step {} never ran",
            expected
        );
    }

    // No step without a preceding signal.
    thread::sleep(StdDuration::from_millis(50));
    assert_eq!(stack.ll_steps(), 5);
}

#[test]
fn events_deliver_in_order_one_at_a_time() {
    let stack = ScriptedStack::with_events(HintMode::Drain, &[10, 20, 30]);
    let host = start(&stack);

    // The pump drains the queue on its own; the initial poll needs no
    // external signal.
    let first = host.wait_event(Duration::from_ticks(2_000)).expect("no event");
    assert_eq!(*first, 10);

    // While the first event is unacknowledged the pump must hold position:
    // nothing new is published and the stack is not peeked again.
    thread::sleep(StdDuration::from_millis(50));
    assert!(host.wait_event(NoWait).is_none());
    assert_eq!(stack.peeks(), 1);
    drop(first);

    let second = host.wait_event(Duration::from_ticks(2_000)).expect("no event");
    assert_eq!(*second, 20);
    drop(second);

    let third = host.wait_event(Duration::from_ticks(2_000)).expect("no event");
    assert_eq!(*third, 30);
    drop(third);

    // Final acknowledgment lets the pump discover the drained queue.
    assert!(wait_until(1_000, || stack.peeks() == 4));
    assert!(host.wait_event(NoWait).is_none());
}

#[test]
fn wait_event_times_out_empty() {
    let stack = ScriptedStack::new(HintMode::Idle);
    let host = start(&stack);

    assert!(host.wait_event(Duration::from_ticks(30)).is_none());
}

#[test]
fn commands_dispatch_exactly_once_in_lock_order() {
    const CALLERS: usize = 4;

    let stack = ScriptedStack::new(HintMode::Idle);
    let host = start(&stack);
    let log: Arc<Mutex<Vec<(char, u32)>>> = Arc::new(Mutex::new(Vec::new()));

    let callers: Vec<_> = (0..CALLERS as u32)
        .map(|id| {
            let host = host.clone();
            let stack = stack.clone();
            let log = log.clone();
            thread::spawn(move || {
                // The payload lives on this caller's stack frame; the relay
                // borrows it for the dispatch.
                let payload = [id as u8; 5];
                let access = host.acquire();
                log.lock().unwrap().push(('s', id));
                access.submit(CommandHeader(id), None, &payload);
                // The caller is released only after its own dispatch.
                assert!(stack
                    .dispatched()
                    .iter()
                    .any(|(header, seen)| *header == id && seen == &payload));
                log.lock().unwrap().push(('d', id));
            })
        })
        .collect();
    for caller in callers {
        caller.join().unwrap();
    }

    let dispatched = stack.dispatched();
    assert_eq!(dispatched.len(), CALLERS);

    // The access lock admits one caller at a time: submit/release pairs
    // never interleave, and dispatch order is lock acquisition order.
    let log = log.lock().unwrap();
    let starts: Vec<u32> = log
        .chunks(2)
        .map(|pair| {
            assert_eq!(pair[0].0, 's');
            assert_eq!(pair[1].0, 'd');
            assert_eq!(pair[0].1, pair[1].1);
            pair[0].1
        })
        .collect();
    let order: Vec<u32> = dispatched.iter().map(|(header, _)| *header).collect();
    assert_eq!(order, starts);
}

#[test]
fn wakeup_callback_fires_once_per_publication() {
    let stack = ScriptedStack::new(HintMode::Drain);
    let host = start(&stack);

    let wakeups = Arc::new(AtomicUsize::new(0));
    let counter = wakeups.clone();
    host.set_wakeup_callback(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    stack.push_event(1);
    host.notify_stack_update();
    assert!(wait_until(1_000, || wakeups.load(Ordering::SeqCst) == 1));

    // No second wakeup until the next publication.
    let event = host.wait_event(Duration::from_ticks(2_000)).expect("no event");
    assert_eq!(*event, 1);
    drop(event);
    thread::sleep(StdDuration::from_millis(30));
    assert_eq!(wakeups.load(Ordering::SeqCst), 1);

    stack.push_event(2);
    host.notify_stack_update();
    assert!(wait_until(1_000, || wakeups.load(Ordering::SeqCst) == 2));
    drop(host.wait_event(Duration::from_ticks(2_000)).expect("no event"));

    // A cleared hook stays silent; delivery still works.
    host.clear_wakeup_callback();
    stack.push_event(3);
    host.notify_stack_update();
    let event = host.wait_event(Duration::from_ticks(2_000)).expect("no event");
    assert_eq!(*event, 3);
    drop(event);
    assert_eq!(wakeups.load(Ordering::SeqCst), 2);
}

#[test]
fn zero_hint_with_occupied_slot_blocks_instead_of_spinning() {
    let stack = ScriptedStack::with_events(HintMode::Busy, &[7]);
    let host = start(&stack);

    let event = host.wait_event(Duration::from_ticks(2_000)).expect("no event");
    assert_eq!(*event, 7);

    // Zero sleep budget but an unacknowledged event: the pump must park,
    // not poll.
    let hints_before = stack.hints();
    thread::sleep(StdDuration::from_millis(100));
    assert!(
        stack.hints() - hints_before <= 1,
        "stack pump spun while the slot was occupied"
    );

    // Settle the script before releasing the slot; a stack that reports a
    // zero budget forever while producing nothing would legitimately spin.
    stack.set_mode(HintMode::Idle);
    drop(event);

    // Acknowledgment resumes the pump, which discovers the empty queue.
    assert!(wait_until(1_000, || stack.peeks() == 2));
}

#[test]
fn finite_hint_timeout_repolls_the_stack() {
    // 64 stack ticks is two kernel ticks; with no signals at all the pump
    // must keep re-polling on that period for the stack's internal timers.
    let stack = ScriptedStack::new(HintMode::Periodic(64));
    let _host = start(&stack);

    assert!(wait_until(1_000, || stack.peeks() >= 5));
    assert_eq!(stack.ll_steps(), 0);
}

#[test]
fn hosts_are_independent() {
    let first = ScriptedStack::new(HintMode::Idle);
    let second = ScriptedStack::new(HintMode::Idle);
    let host_a = start(&first);
    let host_b = start(&second);

    host_a.notify_link_layer();
    assert!(wait_until(1_000, || first.ll_steps() == 1));
    assert_eq!(second.ll_steps(), 0);

    host_b.notify_link_layer();
    assert!(wait_until(1_000, || second.ll_steps() == 1));
    assert_eq!(first.ll_steps(), 1);

    host_a.acquire().submit_without_response(CommandHeader(9), &[]);
    assert_eq!(first.dispatched().len(), 1);
    assert!(second.dispatched().is_empty());
}
