//! Text menu driving the job store and the supervisor.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::{
    context::AppContext,
    dialogs,
    filter::KeywordSet,
    jobs::{parse_chat_id, parse_chat_ids},
    supervisor::StartOutcome,
    Result,
};

const MENU: &str = "\nOptions:\n\
1. List Chats\n\
2. Add Forwarding Job\n\
3. List Forwarding Jobs\n\
4. Start Forwarding\n\
5. Stop Forwarding\n\
6. Exit\n";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Command {
    ListChats,
    AddJob,
    ListJobs,
    StartAll,
    StopAll,
    Exit,
}

impl Command {
    fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "1" | "list" | "chats" => Some(Self::ListChats),
            "2" | "add" => Some(Self::AddJob),
            "3" | "jobs" => Some(Self::ListJobs),
            "4" | "start" => Some(Self::StartAll),
            "5" | "stop" => Some(Self::StopAll),
            "6" | "exit" | "quit" => Some(Self::Exit),
            _ => None,
        }
    }
}

/// Interactive read loop.
///
/// Errors from individual commands are printed and the loop continues; only
/// I/O errors on the console itself end it. Exiting (or EOF) stops every
/// runner first.
pub struct Shell<R, W> {
    input: R,
    output: W,
}

impl<R, W> Shell<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    pub async fn run(&mut self, ctx: &mut AppContext) -> Result<()> {
        loop {
            self.report_exited(ctx).await?;
            self.say(MENU).await?;
            let Some(choice) = self.ask("Choice: ").await? else {
                tracing::info!("input closed, exiting");
                break;
            };

            match Command::parse(&choice) {
                Some(Command::ListChats) => self.list_chats(ctx).await?,
                Some(Command::AddJob) => {
                    if !self.add_job(ctx).await? {
                        break;
                    }
                }
                Some(Command::ListJobs) => self.list_jobs(ctx).await?,
                Some(Command::StartAll) => self.start_all(ctx).await?,
                Some(Command::StopAll) => self.stop_all(ctx).await?,
                Some(Command::Exit) => break,
                None => self.say("Invalid choice.\n").await?,
            }
        }

        if !ctx.supervisor.is_idle() {
            self.stop_all(ctx).await?;
        }
        self.say("Exiting.\n").await
    }

    async fn list_chats(&mut self, ctx: &mut AppContext) -> Result<()> {
        let dialogs = match ctx.platform.list_dialogs().await {
            Ok(d) => d,
            Err(e) => return self.say(&format!("Could not list chats: {e}\n")).await,
        };

        for d in &dialogs {
            self.say(&format!("Chat ID: {}, Title: {}\n", d.chat_id, d.title))
                .await?;
        }
        if !ctx.platform.capabilities().full_dialog_listing {
            self.say("(only chats seen since startup are listed)\n").await?;
        }

        let path = dialogs::export_path(&ctx.config.dialogs_dir, &ctx.account());
        match dialogs::write_export(&path, &dialogs) {
            Ok(()) => self.say(&format!("Chats saved to {}\n", path.display())).await,
            Err(e) => self.say(&format!("Could not save chats: {e}\n")).await,
        }
    }

    /// Returns `false` if input closed mid-dialog.
    async fn add_job(&mut self, ctx: &mut AppContext) -> Result<bool> {
        let Some(src) = self.ask("Source chat IDs (comma-separated): ").await? else {
            return Ok(false);
        };
        let Some(dest) = self.ask("Destination chat/channel ID: ").await? else {
            return Ok(false);
        };
        let Some(kws) = self
            .ask("Keywords (comma-separated, leave blank for all): ")
            .await?
        else {
            return Ok(false);
        };

        let parsed = parse_chat_ids(&src).and_then(|sources| {
            let destination = match dest.trim() {
                "" => None,
                d => Some(parse_chat_id(d)?),
            };
            ctx.jobs
                .add_job(sources, destination, KeywordSet::parse_csv(&kws))
        });

        match parsed {
            Ok(job) => {
                tracing::info!(job = %job.id(), "job added");
                self.say(&format!("Added job #{}\n", job.id().0)).await?;
                if !ctx.supervisor.is_idle() {
                    self.say("Forwarding is running; start again to include it.\n")
                        .await?;
                }
            }
            Err(e) => self.say(&format!("Job not added: {e}\n")).await?,
        }
        Ok(true)
    }

    async fn list_jobs(&mut self, ctx: &mut AppContext) -> Result<()> {
        if ctx.jobs.is_empty() {
            return self.say("No jobs.\n").await;
        }
        let status = ctx.supervisor.status();
        let lines: Vec<String> = ctx
            .jobs
            .list_jobs()
            .map(|job| match status.iter().find(|s| s.job_id == job.id()) {
                Some(s) if s.running => format!(
                    "{job} (running: {} relayed, {} filtered, {} failed, {} dropped)\n",
                    s.stats.relayed, s.stats.filtered, s.stats.failed, s.stats.dropped
                ),
                _ => format!("{job}\n"),
            })
            .collect();
        for line in lines {
            self.say(&line).await?;
        }
        Ok(())
    }

    async fn start_all(&mut self, ctx: &mut AppContext) -> Result<()> {
        if ctx.jobs.is_empty() {
            return self.say("No jobs defined.\n").await;
        }

        let reports = ctx.supervisor.start_all(&ctx.jobs).await;
        let mut started = 0usize;
        for r in &reports {
            match &r.outcome {
                StartOutcome::Started => started += 1,
                StartOutcome::AlreadyRunning => {
                    self.say(&format!("Job #{}: already running.\n", r.job_id.0))
                        .await?
                }
                StartOutcome::Failed(e) => {
                    self.say(&format!("Job #{}: failed to start: {e}\n", r.job_id.0))
                        .await?
                }
            }
        }

        if started > 0 {
            self.say(&format!(
                "Forwarding started in background ({started} job(s)).\n"
            ))
            .await
        } else if reports
            .iter()
            .all(|r| matches!(r.outcome, StartOutcome::AlreadyRunning))
        {
            self.say("Already running.\n").await
        } else {
            Ok(())
        }
    }

    async fn stop_all(&mut self, ctx: &mut AppContext) -> Result<()> {
        let report = ctx.supervisor.stop_all().await;
        if report.is_empty() {
            return self.say("Nothing to stop.\n").await;
        }
        for job_id in &report.forced {
            self.say(&format!(
                "Job #{}: did not stop in time and was dropped.\n",
                job_id.0
            ))
            .await?;
        }
        self.say("All forwarding tasks stopped.\n").await
    }

    async fn report_exited(&mut self, ctx: &mut AppContext) -> Result<()> {
        for exit in ctx.supervisor.reap_finished().await {
            self.say(&format!(
                "Job #{} stopped unexpectedly: {}\n",
                exit.job_id.0, exit.error
            ))
            .await?;
        }
        Ok(())
    }

    async fn say(&mut self, text: &str) -> Result<()> {
        self.output.write_all(text.as_bytes()).await?;
        self.output.flush().await?;
        Ok(())
    }

    /// Prompt and read one line. `None` on EOF.
    async fn ask(&mut self, prompt: &str) -> Result<Option<String>> {
        self.say(prompt).await?;
        let mut line = String::new();
        if self.input.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}
