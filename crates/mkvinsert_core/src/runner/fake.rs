//! Scripted runner for tests.

use parking_lot::Mutex;

use super::{RunError, RunResult, ToolOutput, ToolRunner};
use crate::models::Invocation;

type Matcher = Box<dyn Fn(&Invocation) -> bool + Send + Sync>;

enum Reply {
    Output(ToolOutput),
    Bytes(Vec<u8>),
}

/// Records every invocation and answers from a script.
///
/// The first matching rule wins; unmatched invocations succeed with empty output.
#[derive(Default)]
pub struct FakeRunner {
    rules: Mutex<Vec<(Matcher, Reply)>>,
    calls: Mutex<Vec<Invocation>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer matching `run` calls with `output`.
    pub fn on<F>(self, matcher: F, output: ToolOutput) -> Self
    where
        F: Fn(&Invocation) -> bool + Send + Sync + 'static,
    {
        self.rules.lock().push((Box::new(matcher), Reply::Output(output)));
        self
    }

    /// Answer matching `stream_stdout` calls with `bytes`.
    pub fn on_stream<F>(self, matcher: F, bytes: impl Into<Vec<u8>>) -> Self
    where
        F: Fn(&Invocation) -> bool + Send + Sync + 'static,
    {
        self.rules
            .lock()
            .push((Box::new(matcher), Reply::Bytes(bytes.into())));
        self
    }

    /// Invocations seen so far, in call order.
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().clone()
    }
}

impl ToolRunner for FakeRunner {
    fn run(&self, invocation: &Invocation) -> RunResult<ToolOutput> {
        self.calls.lock().push(invocation.clone());
        let rules = self.rules.lock();
        for (matcher, reply) in rules.iter() {
            if let Reply::Output(out) = reply {
                if matcher(invocation) {
                    return Ok(out.clone());
                }
            }
        }
        Ok(ToolOutput::default())
    }

    fn stream_stdout(
        &self,
        invocation: &Invocation,
        sink: &mut dyn FnMut(&[u8]),
    ) -> RunResult<()> {
        self.calls.lock().push(invocation.clone());
        let rules = self.rules.lock();
        for (matcher, reply) in rules.iter() {
            match reply {
                Reply::Bytes(bytes) if matcher(invocation) => {
                    sink(bytes);
                    return Ok(());
                }
                Reply::Output(out) if matcher(invocation) && !out.success() => {
                    return Err(RunError::failed(
                        invocation.tool,
                        out.exit_code,
                        out.diagnostic(),
                    ));
                }
                _ => {}
            }
        }
        Ok(())
    }
}
