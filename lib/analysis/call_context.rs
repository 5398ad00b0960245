//! Bounded call strings for context-sensitive interprocedural analyses.
//!
//! Pass `CallContext` explicitly along call edges wherever possible.
//! `CallContextHolder` is the fallback for leaf code, such as a transfer
//! function keying allocation sites by context, which cannot receive it.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::mem;

/// Separates the frames of a rendered call string.
pub const CALL_STRING_SEPARATOR: &str = " -> ";

/// Render the last `k` frames of `call_stack`, oldest first.
///
/// Returns the empty string when the stack is empty or `k <= 0`. Two call
/// sites with the same retained suffix share a signature, and therefore an
/// analysis context.
pub fn build_k_cfa_signature<S: AsRef<str>>(call_stack: &[S], k: isize) -> String {
    if call_stack.is_empty() || k <= 0 {
        return String::new();
    }
    let retained = (k as usize).min(call_stack.len());
    call_stack[call_stack.len() - retained..]
        .iter()
        .map(|frame| frame.as_ref())
        .collect::<Vec<&str>>()
        .join(CALL_STRING_SEPARATOR)
}

/// A call stack, most recent caller last, with its signature and the
/// abstract values of the actual arguments.
///
/// Contexts are values: the stack is copied on the way in and on the way out.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct CallContext<A> {
    call_stack: Vec<String>,
    signature: Option<String>,
    actual_args: Vec<A>,
}

impl<A> CallContext<A> {
    pub fn new(
        call_stack: &[String],
        signature: Option<String>,
        actual_args: Option<Vec<A>>,
    ) -> CallContext<A> {
        CallContext {
            call_stack: call_stack.to_vec(),
            signature,
            actual_args: actual_args.unwrap_or_default(),
        }
    }

    /// The context of an analysis root: no callers, no arguments.
    pub fn root() -> CallContext<A> {
        CallContext {
            call_stack: Vec::new(),
            signature: None,
            actual_args: Vec::new(),
        }
    }

    /// A copy of the call stack.
    pub fn call_stack(&self) -> Vec<String> {
        self.call_stack.clone()
    }

    /// The precomputed signature, or the whole stack rendered as a call
    /// string.
    pub fn signature(&self) -> String {
        match self.signature {
            Some(ref signature) => signature.clone(),
            None => self.call_stack.join(CALL_STRING_SEPARATOR),
        }
    }

    pub fn actual_args(&self) -> &[A] {
        &self.actual_args
    }

    pub fn depth(&self) -> usize {
        self.call_stack.len()
    }

    /// The context of a callee invoked from `caller` under this context.
    ///
    /// The stack grows by `caller`; the signature keeps only the last `k`
    /// frames.
    pub fn push<S: Into<String>>(
        &self,
        caller: S,
        k: usize,
        actual_args: Option<Vec<A>>,
    ) -> CallContext<A> {
        let mut call_stack = self.call_stack.clone();
        call_stack.push(caller.into());
        let k = isize::try_from(k).unwrap_or(isize::MAX);
        let signature = build_k_cfa_signature(&call_stack, k);
        CallContext {
            call_stack,
            signature: Some(signature),
            actual_args: actual_args.unwrap_or_default(),
        }
    }
}

impl<A> Default for CallContext<A> {
    fn default() -> CallContext<A> {
        CallContext::root()
    }
}

impl<A> fmt::Display for CallContext<A> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}]", self.signature())
    }
}

struct Installed {
    generation: u64,
    signature: String,
    call_stack: Vec<String>,
    context: Box<dyn Any>,
}

// Contexts installed on this thread, innermost last. Each scope owns the
// entry tagged with its generation and every entry installed after it.
#[derive(Default)]
struct Installations {
    next_generation: u64,
    installed: Vec<Installed>,
}

impl Installations {
    fn current(&self) -> Option<&Installed> {
        self.installed.last()
    }
}

thread_local! {
    static INSTALLATIONS: RefCell<Installations> = RefCell::new(Installations::default());
}

/// The current `CallContext` of this thread.
///
/// Each thread sees only its own context. Absence is never an error: the
/// signature of no context is the empty string.
pub struct CallContextHolder;

impl CallContextHolder {
    /// Make `context` current until the returned scope is dropped.
    ///
    /// Dropping the scope, including while unwinding, uninstalls `context`
    /// together with every context installed after it, whatever order the
    /// scopes are dropped in. Once every scope is gone the holder is empty.
    pub fn set<A: Clone + 'static>(context: CallContext<A>) -> CallContextScope {
        let generation = INSTALLATIONS.with(|cell| {
            let mut installations = cell.borrow_mut();
            let generation = installations.next_generation;
            installations.next_generation += 1;
            installations.installed.push(Installed {
                generation,
                signature: context.signature(),
                call_stack: context.call_stack(),
                context: Box::new(context),
            });
            generation
        });
        CallContextScope {
            generation,
            _thread_bound: PhantomData,
        }
    }

    /// A copy of the current context, if one is set and its arguments are of
    /// type `A`.
    pub fn get<A: Clone + 'static>() -> Option<CallContext<A>> {
        INSTALLATIONS.with(|cell| {
            cell.borrow()
                .current()
                .and_then(|current| current.context.downcast_ref::<CallContext<A>>())
                .cloned()
        })
    }

    /// The signature of the current context, or `""`.
    pub fn signature() -> String {
        INSTALLATIONS.with(|cell| {
            cell.borrow()
                .current()
                .map(|current| current.signature.clone())
                .unwrap_or_default()
        })
    }

    /// The call stack of the current context, or an empty stack.
    pub fn call_stack() -> Vec<String> {
        INSTALLATIONS.with(|cell| {
            cell.borrow()
                .current()
                .map(|current| current.call_stack.clone())
                .unwrap_or_default()
        })
    }

    pub fn is_set() -> bool {
        INSTALLATIONS.with(|cell| cell.borrow().current().is_some())
    }

    /// Remove every installed context, whatever scopes are still alive.
    pub fn clear() {
        let installed = INSTALLATIONS.with(|cell| mem::take(&mut cell.borrow_mut().installed));
        drop(installed);
    }
}

/// Uninstalls its context, and every context installed after it, when
/// dropped.
#[must_use = "the context is uninstalled as soon as the scope is dropped"]
pub struct CallContextScope {
    generation: u64,
    // The scope belongs to the thread whose context it installed.
    _thread_bound: PhantomData<*const ()>,
}

impl Drop for CallContextScope {
    fn drop(&mut self) {
        let generation = self.generation;
        // `try_with` fails only while the thread's locals are being torn down.
        let uninstalled = INSTALLATIONS.try_with(|cell| {
            let mut installations = cell.try_borrow_mut().ok()?;
            let position = installations
                .installed
                .iter()
                .position(|installed| installed.generation == generation)?;
            Some(installations.installed.split_off(position))
        });
        // Contexts are dropped once the holder is released again.
        drop(uninstalled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic;

    fn stack(frames: &[&str]) -> Vec<String> {
        frames.iter().map(|frame| frame.to_string()).collect()
    }

    #[test]
    fn signature_keeps_the_last_k_frames() {
        let frames = stack(&["main", "parse", "lex"]);

        assert_eq!(build_k_cfa_signature(&frames, 1), "lex");
        assert_eq!(build_k_cfa_signature(&frames, 2), "parse -> lex");
        assert_eq!(build_k_cfa_signature(&frames, 3), "main -> parse -> lex");
        assert_eq!(build_k_cfa_signature(&frames, 10), "main -> parse -> lex");
    }

    #[test]
    fn signature_of_nothing_is_empty() {
        let frames = stack(&["main"]);
        let empty: Vec<String> = Vec::new();

        assert_eq!(build_k_cfa_signature(&frames, 0), "");
        assert_eq!(build_k_cfa_signature(&frames, -3), "");
        assert_eq!(build_k_cfa_signature(&empty, 2), "");
    }

    #[test]
    fn equal_suffixes_share_a_signature() {
        let a = stack(&["main", "foo", "bar"]);
        let b = stack(&["init", "foo", "bar"]);

        assert_eq!(build_k_cfa_signature(&a, 2), build_k_cfa_signature(&b, 2));
        assert_ne!(build_k_cfa_signature(&a, 3), build_k_cfa_signature(&b, 3));
    }

    #[test]
    fn contexts_copy_their_stack() {
        let mut frames = stack(&["main", "foo"]);
        let context: CallContext<i64> = CallContext::new(&frames, None, None);
        frames.push("bar".to_string());

        let mut copy = context.call_stack();
        copy.clear();

        assert_eq!(context.call_stack(), stack(&["main", "foo"]));
        assert_eq!(context.signature(), "main -> foo");
        assert!(context.actual_args().is_empty());
        assert_eq!(context.depth(), 2);
    }

    #[test]
    fn precomputed_signature_wins() {
        let context = CallContext::new(&stack(&["main"]), Some("k".to_string()), Some(vec![1, 2]));

        assert_eq!(context.signature(), "k");
        assert_eq!(context.actual_args(), &[1, 2]);
        assert_eq!(context.to_string(), "[k]");
    }

    #[test]
    fn push_bounds_the_signature() {
        let root: CallContext<i64> = CallContext::root();
        let callee = root.push("main", 2, None).push("foo", 2, None).push("bar", 2, Some(vec![7]));

        assert_eq!(callee.depth(), 3);
        assert_eq!(callee.signature(), "foo -> bar");
        assert_eq!(callee.actual_args(), &[7]);
        assert_eq!(root.depth(), 0);
    }

    #[test]
    fn holder_is_empty_by_default() {
        assert!(!CallContextHolder::is_set());
        assert_eq!(CallContextHolder::signature(), "");
        assert!(CallContextHolder::call_stack().is_empty());
        assert_eq!(CallContextHolder::get::<i64>(), None);
    }

    #[test]
    fn scope_installs_and_restores() {
        let outer: CallContext<i64> = CallContext::root().push("main", 1, None);
        let inner = outer.push("foo", 1, Some(vec![3]));

        {
            let _outer = CallContextHolder::set(outer.clone());
            assert_eq!(CallContextHolder::signature(), "main");
            {
                let _inner = CallContextHolder::set(inner.clone());
                assert_eq!(CallContextHolder::signature(), "foo");
                assert_eq!(CallContextHolder::call_stack(), stack(&["main", "foo"]));
                assert_eq!(CallContextHolder::get::<i64>(), Some(inner));
                assert_eq!(CallContextHolder::get::<String>(), None);
            }
            assert_eq!(CallContextHolder::get::<i64>(), Some(outer));
        }

        assert!(!CallContextHolder::is_set());
    }

    #[test]
    fn scope_is_cleared_when_unwinding() {
        let result = panic::catch_unwind(|| {
            let context: CallContext<i64> = CallContext::root().push("main", 1, None);
            let _scope = CallContextHolder::set(context);
            assert!(CallContextHolder::is_set());
            panic!("transfer function failed");
        });

        assert!(result.is_err());
        assert!(!CallContextHolder::is_set());
    }

    #[test]
    fn contexts_do_not_cross_threads() {
        let context: CallContext<i64> = CallContext::root().push("main", 1, None);
        let _scope = CallContextHolder::set(context);

        let seen = std::thread::spawn(CallContextHolder::is_set).join().unwrap();

        assert!(!seen);
        assert!(CallContextHolder::is_set());
    }

    #[test]
    fn clear_drops_the_context() {
        let _scope = CallContextHolder::set(CallContext::<i64>::root().push("main", 1, None));
        CallContextHolder::clear();

        assert!(!CallContextHolder::is_set());
    }

    fn chain(frames: &[&str]) -> Vec<CallContext<i64>> {
        let mut contexts = Vec::new();
        let mut context = CallContext::root();
        for frame in frames {
            context = context.push(*frame, 2, None);
            contexts.push(context.clone());
        }
        contexts
    }

    #[test]
    fn outer_scope_dropped_first_leaves_nothing_behind() {
        let contexts = chain(&["main", "foo"]);

        let outer = CallContextHolder::set(contexts[0].clone());
        let inner = CallContextHolder::set(contexts[1].clone());
        drop(outer);

        assert!(!CallContextHolder::is_set());

        drop(inner);

        assert!(!CallContextHolder::is_set());
        assert_eq!(CallContextHolder::signature(), "");
    }

    #[test]
    fn scopes_kept_in_a_vec_unwind_completely() {
        let scopes: Vec<CallContextScope> = chain(&["main", "foo", "bar"])
            .into_iter()
            .map(CallContextHolder::set)
            .collect();

        assert_eq!(CallContextHolder::signature(), "foo -> bar");

        // a Vec drops its elements front to back
        drop(scopes);

        assert!(!CallContextHolder::is_set());
    }

    #[test]
    fn stale_scopes_do_not_touch_newer_contexts() {
        let contexts = chain(&["main", "foo"]);

        let outer = CallContextHolder::set(contexts[0].clone());
        let inner = CallContextHolder::set(contexts[1].clone());
        drop(outer);

        let fresh = CallContextHolder::set(contexts[0].clone());
        let nested = CallContextHolder::set(contexts[1].clone());
        drop(inner);

        assert_eq!(CallContextHolder::get::<i64>(), Some(contexts[1].clone()));

        drop(nested);
        assert_eq!(CallContextHolder::get::<i64>(), Some(contexts[0].clone()));

        drop(fresh);
        assert!(!CallContextHolder::is_set());
    }

    #[test]
    fn scopes_dropped_after_clear_stay_cleared() {
        let contexts = chain(&["main", "foo"]);

        let outer = CallContextHolder::set(contexts[0].clone());
        let inner = CallContextHolder::set(contexts[1].clone());
        CallContextHolder::clear();
        drop(inner);
        drop(outer);

        assert!(!CallContextHolder::is_set());

        let _scope = CallContextHolder::set(contexts[1].clone());
        assert_eq!(CallContextHolder::signature(), "main -> foo");
    }
}
