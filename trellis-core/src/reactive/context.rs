//! Reactive Context
//!
//! The reactive context tracks which effect is currently running.
//! This enables automatic dependency tracking: when a reactive location is
//! read, the innermost running effect is registered as a subscriber.
//!
//! # Implementation
//!
//! We use a thread-local stack of frames. Running an effect pushes a tracking
//! frame; [`untrack`] pushes a frame that suspends tracking without forgetting
//! which effect is active. Frames are popped by a guard, so the previous
//! effect is restored even when an effect body panics.

use std::cell::RefCell;
use std::rc::Rc;

use super::effect::EffectInner;
use super::subscriber::EffectId;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

enum Frame {
    /// An effect is running and its reads are recorded.
    Tracking(Rc<EffectInner>),
    /// Reads are not recorded until this frame is popped.
    Untracked,
}

/// Guard that pops its frame when dropped.
pub struct ReactiveContext {
    depth: usize,
}

impl ReactiveContext {
    /// Enter a tracking frame for the given effect.
    pub(crate) fn enter(effect: Rc<EffectInner>) -> Self {
        Self::push(Frame::Tracking(effect))
    }

    /// Enter a frame in which reads are not tracked.
    pub fn untracked() -> Self {
        Self::push(Frame::Untracked)
    }

    fn push(frame: Frame) -> Self {
        let depth = CONTEXT_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            stack.push(frame);
            stack.len()
        });
        Self { depth }
    }

    /// Whether a read right now would be recorded.
    pub fn is_tracking() -> bool {
        CONTEXT_STACK.with(|stack| matches!(stack.borrow().last(), Some(Frame::Tracking(_))))
    }

    /// The effect that reads are attributed to, if tracking is active.
    pub(crate) fn current_effect() -> Option<Rc<EffectInner>> {
        CONTEXT_STACK.with(|stack| match stack.borrow().last() {
            Some(Frame::Tracking(effect)) => Some(Rc::clone(effect)),
            _ => None,
        })
    }

    /// The innermost running effect, even while tracking is suspended.
    pub fn active_effect() -> Option<EffectId> {
        CONTEXT_STACK.with(|stack| {
            stack.borrow().iter().rev().find_map(|frame| match frame {
                Frame::Tracking(effect) => Some(effect.id()),
                Frame::Untracked => None,
            })
        })
    }

    /// Whether the given effect is anywhere on the stack.
    pub fn is_running(id: EffectId) -> bool {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .iter()
                .any(|frame| matches!(frame, Frame::Tracking(effect) if effect.id() == id))
        })
    }

    /// Number of frames on the stack.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        // The stack may already be gone during thread teardown.
        let popped = CONTEXT_STACK.try_with(|stack| {
            let mut stack = stack.borrow_mut();
            debug_assert_eq!(
                stack.len(),
                self.depth,
                "ReactiveContext frames dropped out of order"
            );
            stack.pop()
        });
        // Dropping an effect can purge graph entries; do it outside the borrow.
        drop(popped);
    }
}

/// Run `f` without recording any reads.
pub fn untrack<T>(f: impl FnOnce() -> T) -> T {
    let _frame = ReactiveContext::untracked();
    f()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{Effect, EffectOptions};

    #[test]
    fn untracked_frame_suspends_tracking() {
        assert!(!ReactiveContext::is_tracking());
        {
            let _frame = ReactiveContext::untracked();
            assert!(!ReactiveContext::is_tracking());
            assert_eq!(ReactiveContext::depth(), 1);
        }
        assert_eq!(ReactiveContext::depth(), 0);
    }

    #[test]
    fn nested_effects_restore_outer() {
        let observed = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&observed);
        let inner = Effect::with_options(
            move || log.borrow_mut().push(("inner", ReactiveContext::active_effect())),
            EffectOptions::lazy(),
        );
        let inner_id = inner.id();

        let log = Rc::clone(&observed);
        let outer = Effect::new(move || {
            log.borrow_mut().push(("before", ReactiveContext::active_effect()));
            inner.run();
            log.borrow_mut().push(("after", ReactiveContext::active_effect()));
        });

        let observed = observed.borrow();
        assert_eq!(observed[0], ("before", Some(outer.id())));
        assert_eq!(observed[1], ("inner", Some(inner_id)));
        assert_eq!(observed[2], ("after", Some(outer.id())));
        assert_eq!(ReactiveContext::depth(), 0);
    }

    #[test]
    fn untrack_keeps_active_effect_visible() {
        let seen = Rc::new(RefCell::new(None));
        let slot = Rc::clone(&seen);
        let effect = Effect::new(move || {
            untrack(|| {
                *slot.borrow_mut() = Some((
                    ReactiveContext::is_tracking(),
                    ReactiveContext::active_effect(),
                ));
            });
        });
        assert_eq!(*seen.borrow(), Some((false, Some(effect.id()))));
    }
}
