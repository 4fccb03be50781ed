use std::cell::Cell;

/// Which host context the current thread belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadKind {
    Audio,
    Message,
    ScriptPool,
    Timer,
}

thread_local! {
    static CURRENT_KIND: Cell<ThreadKind> = Cell::new(ThreadKind::Message);
}

pub fn current_thread_kind() -> ThreadKind {
    CURRENT_KIND.with(|k| k.get())
}

pub fn is_audio_thread() -> bool {
    current_thread_kind() == ThreadKind::Audio
}

/// Marks the current thread for the guard's lifetime.
pub struct ThreadKindGuard {
    previous: ThreadKind,
}

impl ThreadKindGuard {
    pub fn enter(kind: ThreadKind) -> Self {
        let previous = CURRENT_KIND.with(|k| k.replace(kind));
        ThreadKindGuard { previous }
    }
}

impl Drop for ThreadKindGuard {
    fn drop(&mut self) {
        let previous = self.previous;
        CURRENT_KIND.with(|k| k.set(previous));
    }
}

const STACK_PER_CALL_LEVEL: usize = 64 * 1024;
const MIN_SCRIPT_STACK: usize = 8 * 1024 * 1024;

/// Stack size for worker threads that run script code, large enough for
/// `max_call_depth` nested script calls in unoptimised builds.
pub fn script_stack_size(max_call_depth: usize) -> usize {
    max_call_depth
        .saturating_mul(STACK_PER_CALL_LEVEL)
        .max(MIN_SCRIPT_STACK)
}

/// Permanently marks the current thread; used by worker thread start handlers.
pub(crate) fn set_thread_kind(kind: ThreadKind) {
    CURRENT_KIND.with(|k| k.set(kind));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_stack_size_grows_with_depth() {
        assert_eq!(script_stack_size(0), MIN_SCRIPT_STACK);
        assert_eq!(script_stack_size(1024), 1024 * STACK_PER_CALL_LEVEL);
        assert_eq!(script_stack_size(usize::MAX), usize::MAX);
    }

    #[test]
    fn test_guard_restores_previous_kind() {
        assert_eq!(current_thread_kind(), ThreadKind::Message);
        {
            let _audio = ThreadKindGuard::enter(ThreadKind::Audio);
            assert!(is_audio_thread());
            {
                let _timer = ThreadKindGuard::enter(ThreadKind::Timer);
                assert_eq!(current_thread_kind(), ThreadKind::Timer);
            }
            assert!(is_audio_thread());
        }
        assert_eq!(current_thread_kind(), ThreadKind::Message);
    }
}
