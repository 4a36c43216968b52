//! Operator capability and step payload resolution.
//!
//! A step payload is matched against every known operator schema in a fixed
//! order. The first schema that decodes and carries a non-empty
//! discriminating field wins; a payload matching nothing becomes
//! [`Operator::Null`]. The order matters where schemas overlap: a cron
//! payload also has a `cmd` field and would otherwise read as a command.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_yaml::Value;

use crate::context::OperatorContext;
use crate::error::OperatorError;
use crate::ops::{
    ApiOp, CommandOp, CopyOp, CronOp, GitOp, LoopOp, RecursiveCopyOp, RemoteExecOp, SleepOp,
    TarballOp, TemplateOp,
};

/// A unit of work run by a pipeline step.
#[async_trait]
pub trait Execute: Send + Sync {
    /// Run the operator.
    async fn execute(&self, ctx: &OperatorContext) -> Result<(), OperatorError>;
}

/// Operator schemas that can be probed for.
pub trait Schema: DeserializeOwned {
    /// Whether the discriminating field carries a non-empty value.
    fn is_selected(&self) -> bool;
}

/// A resolved step operator.
#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    Cron(CronOp),
    Command(CommandOp),
    Tarball(TarballOp),
    Copy(CopyOp),
    Template(TemplateOp),
    Git(GitOp),
    RecursiveCopy(RecursiveCopyOp),
    Loop(LoopOp),
    RemoteExec(RemoteExecOp),
    Api(ApiOp),
    Sleep(SleepOp),
    Null,
}

type Probe = fn(&Value) -> Option<Operator>;

/// Schemas in resolution priority order.
const PROBES: &[(&str, Probe)] = &[
    ("cron", |v| probe(v).map(Operator::Cron)),
    ("command", |v| probe(v).map(Operator::Command)),
    ("tarball", |v| probe(v).map(Operator::Tarball)),
    ("copy", |v| probe(v).map(Operator::Copy)),
    ("template", |v| probe(v).map(Operator::Template)),
    ("git", |v| probe(v).map(Operator::Git)),
    ("recursive_copy", |v| probe(v).map(Operator::RecursiveCopy)),
    ("loop", |v| probe(v).map(Operator::Loop)),
    ("remote_exec", |v| probe(v).map(Operator::RemoteExec)),
    ("api", |v| probe(v).map(Operator::Api)),
    ("sleep", |v| probe(v).map(Operator::Sleep)),
];

fn probe<T: Schema>(payload: &Value) -> Option<T> {
    serde_yaml::from_value::<T>(payload.clone())
        .ok()
        .filter(Schema::is_selected)
}

impl Operator {
    /// Resolve a step payload to an operator. Never fails.
    pub fn resolve(payload: &Value) -> Operator {
        for (kind, probe) in PROBES {
            if let Some(operator) = probe(payload) {
                tracing::debug!(operator = %kind, "Matched operator");
                return operator;
            }
        }
        tracing::debug!("No matching operator found, using null operator");
        Operator::Null
    }

    /// Short name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Operator::Cron(_) => "cron",
            Operator::Command(_) => "command",
            Operator::Tarball(_) => "tarball",
            Operator::Copy(_) => "copy",
            Operator::Template(_) => "template",
            Operator::Git(_) => "git",
            Operator::RecursiveCopy(_) => "recursive_copy",
            Operator::Loop(_) => "loop",
            Operator::RemoteExec(_) => "remote_exec",
            Operator::Api(_) => "api",
            Operator::Sleep(_) => "sleep",
            Operator::Null => "null",
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind())
    }
}

#[async_trait]
impl Execute for Operator {
    async fn execute(&self, ctx: &OperatorContext) -> Result<(), OperatorError> {
        match self {
            Operator::Cron(op) => op.execute(ctx).await,
            Operator::Command(op) => op.execute(ctx).await,
            Operator::Tarball(op) => op.execute(ctx).await,
            Operator::Copy(op) => op.execute(ctx).await,
            Operator::Template(op) => op.execute(ctx).await,
            Operator::Git(op) => op.execute(ctx).await,
            Operator::RecursiveCopy(op) => op.execute(ctx).await,
            Operator::Loop(op) => op.execute(ctx).await,
            Operator::RemoteExec(op) => op.execute(ctx).await,
            Operator::Api(op) => op.execute(ctx).await,
            Operator::Sleep(op) => op.execute(ctx).await,
            Operator::Null => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(yaml: &str) -> Operator {
        let value: Value = serde_yaml::from_str(yaml).unwrap();
        Operator::resolve(&value)
    }

    #[test]
    fn test_resolve_each_variant() {
        let cases = [
            ("{name: a, schedule: '* * * * *', cron: job, cmd: ls}", "cron"),
            ("{name: a, cmd: echo ok}", "command"),
            ("{name: a, tarball: /tmp/a.tgz, dest: /opt/a}", "tarball"),
            ("{name: a, copy: /tmp/a, dest: /tmp/b}", "copy"),
            ("{name: a, template: /etc/a.conf, source: a.tmpl}", "template"),
            ("{name: a, git: https://example.com/r.git, dest: /src}", "git"),
            ("{name: a, copyRecursive: /tmp/a, dest: /tmp/b}", "recursive_copy"),
            ("{name: a, loop: echo hi, count: 2}", "loop"),
            ("{name: a, remoteCmd: uptime, host: web1}", "remote_exec"),
            ("{name: a, api: https://example.com/hook}", "api"),
            ("{name: a, sleep: 3}", "sleep"),
        ];

        for (yaml, kind) in cases {
            assert_eq!(resolve(yaml).kind(), kind, "payload: {}", yaml);
        }
    }

    #[test]
    fn test_unknown_shape_is_null() {
        assert_eq!(resolve("{name: a, frobnicate: yes}"), Operator::Null);
        assert_eq!(resolve("{name: a}"), Operator::Null);
        assert_eq!(resolve("just a string"), Operator::Null);
    }

    #[test]
    fn test_empty_discriminator_is_not_a_match() {
        assert_eq!(resolve("{name: a, cmd: ''}"), Operator::Null);
        assert_eq!(resolve("{name: a, sleep: 0}"), Operator::Null);
    }

    #[test]
    fn test_structural_mismatch_falls_through() {
        // `sleep` must be a number; the payload still resolves to the next match.
        assert_eq!(resolve("{name: a, sleep: soon}"), Operator::Null);
        assert_eq!(resolve("{name: a, cmd: ls, sleep: soon}").kind(), "command");
    }

    #[test]
    fn test_priority_on_overlapping_schemas() {
        // Matches both cron and command; cron comes first.
        let op = resolve("{name: a, cron: backup, schedule: '0 3 * * *', cmd: /bin/backup}");
        assert_eq!(op.kind(), "cron");

        // Matches both command and sleep; command comes first.
        let op = resolve("{name: a, cmd: ls, sleep: 5}");
        assert_eq!(op.kind(), "command");

        // Resolution is deterministic.
        for _ in 0..10 {
            let op = resolve("{name: a, tarball: x.tgz, copy: y, dest: /d}");
            assert_eq!(op.kind(), "tarball");
        }
    }

    #[tokio::test]
    async fn test_null_operator_succeeds() {
        let ctx = OperatorContext::default();
        assert!(Operator::Null.execute(&ctx).await.is_ok());
        assert!(resolve("{name: a, unknown: 1}").execute(&ctx).await.is_ok());
    }
}
