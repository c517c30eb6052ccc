//! `calc <expr…>`: evaluates arithmetic in a child process.
//!
//! The child is this executable run with `--eval`, so a pathological
//! expression cannot stall the bot: output is capped and the child is killed
//! when it overruns its time limit.

use std::process::Stdio;
use std::time::Duration;

use banter::prelude::*;
use tokio::io::AsyncReadExt;
use tokio::process::Command as Process;
use tracing::{debug, warn};

const EVAL_TIMEOUT: Duration = Duration::from_secs(3);

/// Bytes of child output kept; the rest is discarded.
const OUTPUT_LIMIT: usize = 512;

/// Exit status of `--eval` for an expression it could not evaluate.
const EXIT_REJECTED: i32 = 2;

#[derive(Debug, PartialEq, Eq)]
enum Evaluation {
    Value(String),
    Rejected(String),
    TimedOut,
}

async fn run_capped(mut process: Process, limit: Duration) -> Result<Evaluation, BoxError> {
    process
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);
    let mut child = process.spawn()?;
    let mut stdout = child.stdout.take().ok_or("child has no stdout")?;

    let work = async {
        let mut buf = [0u8; OUTPUT_LIMIT];
        let mut len = 0;
        while len < buf.len() {
            let n = stdout.read(&mut buf[len..]).await?;
            if n == 0 {
                break;
            }
            len += n;
        }
        drop(stdout);
        let status = child.wait().await?;
        let output = String::from_utf8_lossy(&buf[..len]).trim().to_string();
        Ok::<_, std::io::Error>((status, output))
    };

    let (status, output) = match tokio::time::timeout(limit, work).await {
        Ok(result) => result?,
        Err(_) => {
            if let Err(e) = child.kill().await {
                warn!(error = %e, "Failed to kill evaluator");
            }
            return Ok(Evaluation::TimedOut);
        }
    };

    debug!(%status, "Evaluator finished");
    match status.code() {
        Some(0) => Ok(Evaluation::Value(output)),
        Some(EXIT_REJECTED) => Ok(Evaluation::Rejected(output)),
        _ => Err(format!("evaluator failed with {status}").into()),
    }
}

pub struct CalcPlugin {
    ctx: PluginContext,
}

impl PluginFactory for CalcPlugin {
    const NAME: &'static str = "calc";
    const DESCRIPTION: &'static str = "Arithmetic in a sandboxed child process";

    fn create(ctx: PluginContext, _old: Option<Arc<dyn Plugin>>) -> Result<Arc<Self>, BoxError> {
        ctx.commands().register(
            Command::new("calc", |msg: Message, argv: Vec<String>| async move {
                let expr = argv[1..].join(" ");
                let mut process = Process::new(std::env::current_exe()?);
                process.arg("--eval").arg(&expr);

                match run_capped(process, EVAL_TIMEOUT).await? {
                    Evaluation::Value(value) => {
                        msg.reply(&value).await?;
                    }
                    Evaluation::Rejected(reason) => {
                        return Err(CommandError::syntax(reason).into());
                    }
                    Evaluation::TimedOut => {
                        msg.reply("Timed out.").await?;
                    }
                }
                Ok(())
            })
            .min_args(1)
            .help("calc <expression>: evaluates + - * / % ^ and parentheses."),
        )?;
        Ok(Arc::new(CalcPlugin { ctx }))
    }
}

#[async_trait]
impl Plugin for CalcPlugin {
    async fn quit(&self) -> Result<(), BoxError> {
        self.ctx.commands().unregister("calc");
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

register_plugin!(CalcPlugin);
