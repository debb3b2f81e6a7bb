//! External tool invocations and the emitted merge plan.

use serde::Serialize;

/// External binary an invocation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    Mkvmerge,
    Ffmpeg,
    Ffprobe,
}

impl std::fmt::Display for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tool::Mkvmerge => write!(f, "mkvmerge"),
            Tool::Ffmpeg => write!(f, "ffmpeg"),
            Tool::Ffprobe => write!(f, "ffprobe"),
        }
    }
}

/// One process invocation: a tool plus its argument tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invocation {
    pub tool: Tool,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(tool: Tool) -> Self {
        Self {
            tool,
            args: Vec::new(),
        }
    }

    /// Append one token.
    pub fn arg(mut self, token: impl Into<String>) -> Self {
        self.args.push(token.into());
        self
    }

    /// Append several tokens.
    pub fn args<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(tokens.into_iter().map(Into::into));
        self
    }

    /// Shell-like rendering for logs.
    pub fn display(&self) -> String {
        let mut line = self.tool.to_string();
        for arg in &self.args {
            line.push(' ');
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                line.push('"');
                line.push_str(arg);
                line.push('"');
            } else {
                line.push_str(arg);
            }
        }
        line
    }
}

/// Which stage of the run an invocation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStage {
    Extract,
    Convert,
    IntermediateMux,
    Verify,
    FinalMux,
}

/// A planned invocation tagged with its stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedCommand {
    pub stage: PlanStage,
    pub invocation: Invocation,
}

/// Ordered command list plus the final track order.
///
/// Built once by the emitter; there are no mutating methods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergePlan {
    commands: Vec<PlannedCommand>,
    track_order: Vec<String>,
}

impl MergePlan {
    pub fn new(commands: Vec<PlannedCommand>, track_order: Vec<String>) -> Self {
        Self {
            commands,
            track_order,
        }
    }

    pub fn commands(&self) -> &[PlannedCommand] {
        &self.commands
    }

    /// Entries of the `--track-order` directive, e.g. `["0:0", "1:2", "1:0"]`.
    pub fn track_order(&self) -> &[String] {
        &self.track_order
    }

    /// Commands of one stage, in order.
    pub fn stage(&self, stage: PlanStage) -> impl Iterator<Item = &Invocation> {
        self.commands
            .iter()
            .filter(move |c| c.stage == stage)
            .map(|c| &c.invocation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_quotes_whitespace() {
        let inv = Invocation::new(Tool::Mkvmerge)
            .args(["-o", "/tmp/out file.mkv"])
            .arg("in.mkv");
        assert_eq!(inv.display(), "mkvmerge -o \"/tmp/out file.mkv\" in.mkv");
    }

    #[test]
    fn plan_filters_by_stage() {
        let plan = MergePlan::new(
            vec![
                PlannedCommand {
                    stage: PlanStage::Extract,
                    invocation: Invocation::new(Tool::Mkvmerge).arg("a"),
                },
                PlannedCommand {
                    stage: PlanStage::Convert,
                    invocation: Invocation::new(Tool::Ffmpeg).arg("b"),
                },
            ],
            vec!["0:0".into()],
        );
        let extract: Vec<_> = plan.stage(PlanStage::Extract).collect();
        assert_eq!(extract.len(), 1);
        assert_eq!(extract[0].args, vec!["a"]);
        assert_eq!(plan.track_order(), &["0:0".to_string()]);
    }
}
