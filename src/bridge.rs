// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Calls from rendered content back into the server.
//!
//! The bridge is a fixed, versioned method set. Interactive widgets emit a
//! [`BridgeCall`]; the server routes it through [`Bridge::dispatch`], which
//! schedules a bounded retry when the popup window is not wired up yet and
//! gives up (with a visible toast) after [`MAX_ATTEMPTS`].

use std::time::Duration;

/// Version of the method set below.
pub const BRIDGE_VERSION: u32 = 1;

/// Attempts before a call made too early is abandoned.
pub const MAX_ATTEMPTS: u32 = 5;

/// Delay before the first retry; doubles on every further attempt.
pub const BASE_BACKOFF: Duration = Duration::from_millis(40);

/// Methods exposed to content, with the bridge version that introduced them.
pub const METHODS: &[(&str, u32)] = &[("selectSink", 1), ("log", 1)];

/// A call from rendered content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeCall {
    /// Make `name` the default output.
    SelectSink { name: String },
    /// Forward a message to the server log.
    Log { message: String },
}

impl BridgeCall {
    /// Method name as listed in [`METHODS`].
    pub fn method(&self) -> &'static str {
        match self {
            BridgeCall::SelectSink { .. } => "selectSink",
            BridgeCall::Log { .. } => "log",
        }
    }
}

/// Routing decision for one attempt of a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Bridge is ready: execute now.
    Run(BridgeCall),
    /// Not wired yet: try again after `after`.
    Retry {
        call: BridgeCall,
        attempt: u32,
        after: Duration,
    },
    /// Out of attempts.
    GiveUp(BridgeCall),
}

/// Wiring state of the bridge.
#[derive(Debug, Clone, Default)]
pub struct Bridge {
    wired: bool,
}

impl Bridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// The popup surface exists and can receive results.
    pub fn wire(&mut self) {
        self.wired = true;
    }

    /// The popup surface went away.
    pub fn unwire(&mut self) {
        self.wired = false;
    }

    /// Decide what to do with `call` on its `attempt`-th try (0-based).
    pub fn dispatch(&self, call: BridgeCall, attempt: u32) -> Dispatch {
        if self.wired {
            Dispatch::Run(call)
        } else if attempt + 1 < MAX_ATTEMPTS {
            Dispatch::Retry {
                call,
                attempt: attempt + 1,
                after: backoff(attempt),
            }
        } else {
            Dispatch::GiveUp(call)
        }
    }
}

/// Delay before retry number `attempt + 1`.
pub fn backoff(attempt: u32) -> Duration {
    BASE_BACKOFF * 2u32.saturating_pow(attempt.min(10))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn select(name: &str) -> BridgeCall {
        BridgeCall::SelectSink {
            name: name.to_string(),
        }
    }

    #[test]
    fn test_wired_runs_immediately() {
        let mut bridge = Bridge::new();
        bridge.wire();
        assert_eq!(bridge.dispatch(select("b"), 0), Dispatch::Run(select("b")));
    }

    #[test]
    fn test_early_call_retries_then_gives_up() {
        let bridge = Bridge::new();
        let mut attempt = 0;
        let mut delays = Vec::new();
        loop {
            match bridge.dispatch(select("b"), attempt) {
                Dispatch::Retry {
                    attempt: next,
                    after,
                    ..
                } => {
                    delays.push(after);
                    attempt = next;
                }
                Dispatch::GiveUp(call) => {
                    assert_eq!(call, select("b"));
                    break;
                }
                Dispatch::Run(_) => panic!("unwired bridge must not run"),
            }
        }
        assert_eq!(delays.len() as u32, MAX_ATTEMPTS - 1);
        assert!(delays.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_late_wiring_succeeds() {
        let mut bridge = Bridge::new();
        let Dispatch::Retry { call, attempt, .. } = bridge.dispatch(select("b"), 0) else {
            panic!("expected retry");
        };
        bridge.wire();
        assert_eq!(bridge.dispatch(call, attempt), Dispatch::Run(select("b")));
    }

    #[test]
    fn test_method_table() {
        for call in [select("x"), BridgeCall::Log { message: "hi".into() }] {
            assert!(METHODS
                .iter()
                .any(|(name, since)| *name == call.method() && *since <= BRIDGE_VERSION));
        }
    }

    #[test]
    fn test_backoff_doubles() {
        assert_eq!(backoff(0), BASE_BACKOFF);
        assert_eq!(backoff(2), BASE_BACKOFF * 4);
    }
}
