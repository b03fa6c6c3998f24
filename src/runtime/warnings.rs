//! Runtime warnings for mismatches reported under warning severity
//!
//! Every warning is logged through `tracing`. Callers that need to inspect
//! warnings (tests, batch validators) can also capture them per thread with
//! `catch_warnings`.

use std::cell::RefCell;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeWarning {
    pub function: String,
    pub message: String,
}

impl fmt::Display for RuntimeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RuntimeWarning: {}", self.message)
    }
}

thread_local! {
    static CAPTURED: RefCell<Vec<Vec<RuntimeWarning>>> = RefCell::new(Vec::new());
}

pub fn warn(warning: RuntimeWarning) {
    tracing::warn!(
        target: "typthon_guard::warnings",
        function = %warning.function,
        "{}",
        warning.message
    );
    CAPTURED.with(|stack| {
        if let Some(frame) = stack.borrow_mut().last_mut() {
            frame.push(warning);
        }
    });
}

/// Pops the capture frame even if the closure panics
struct CaptureFrame;

impl Drop for CaptureFrame {
    fn drop(&mut self) {
        CAPTURED.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Run `f`, returning its result and the warnings emitted on this thread meanwhile
pub fn catch_warnings<R>(f: impl FnOnce() -> R) -> (R, Vec<RuntimeWarning>) {
    CAPTURED.with(|stack| stack.borrow_mut().push(Vec::new()));
    let frame = CaptureFrame;
    let result = f();
    let warnings = CAPTURED.with(|stack| stack.borrow_mut().last_mut().map(std::mem::take).unwrap_or_default());
    drop(frame);
    (result, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn warning(message: &str) -> RuntimeWarning {
        RuntimeWarning {
            function: "f".to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn test_capture_is_scoped() {
        warn(warning("outside"));
        let ((), caught) = catch_warnings(|| {
            warn(warning("inside"));
        });
        assert_eq!(caught, vec![warning("inside")]);
    }

    #[test]
    fn test_nested_capture() {
        let (inner, outer) = catch_warnings(|| {
            warn(warning("a"));
            let ((), inner) = catch_warnings(|| warn(warning("b")));
            inner
        });
        assert_eq!(inner, vec![warning("b")]);
        assert_eq!(outer, vec![warning("a")]);
    }
}
